use anyhow::Result;
use clap::Parser;
use compactor::{Settings, A0};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "A0 compaction of software-based self-test programs", long_about = None)]
struct Args {
    /// Path to the campaign settings file
    #[arg(short, long)]
    config: PathBuf,

    /// Override the number of candidate permutations
    #[arg(long)]
    times_to_shuffle: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_file(&args.config)?;
    if let Some(times) = args.times_to_shuffle {
        settings.times_to_shuffle = times;
    }

    let mut a0 = A0::new(settings)?;

    let initial_stl_stats = a0.pre_run().await?;
    println!(
        "Initial TaT: {} | Initial coverage: {}",
        initial_stl_stats.0, initial_stl_stats.1
    );

    let outcome = a0.run(initial_stl_stats).await;
    a0.post_run();
    outcome
}
