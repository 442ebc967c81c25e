//! The A0 compaction loop.
//!
//! Greedy, randomised, restore-on-regression search over the removable
//! instructions of a self-test program: remove one instruction, re-assemble,
//! re-simulate, and keep the removal only when neither the test application
//! time nor the fault coverage regresses.

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::{debug, error, info};

use crate::asm::{AssemblyHandler, Codeline, Isa};
use crate::config::Settings;
use crate::fault_report::FaultReport;
use crate::preprocessor::Preprocessor;
use crate::simulator::{Compilation, FaultSimulation, Invoker, LogicSimulation};
use crate::stats::{CompactionStatistics, IterationStats};
use crate::tools;

const COVERAGE_PRECISION: u32 = 4;

pub struct A0 {
    settings: Settings,
    handlers: Vec<AssemblyHandler>,
    all_instructions: Vec<Codeline>,
    path_to_id: BTreeMap<String, usize>,
    invoker: Invoker,
}

impl A0 {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let isa = Isa::from_file(&settings.isa_spec)?;

        let mut handlers = Vec::with_capacity(settings.asm_sources.len());
        for source in &settings.asm_sources {
            handlers.push(AssemblyHandler::new(isa.clone(), source.clone())?);
        }
        debug!(count = handlers.len(), "assembly handlers created");

        let all_instructions: Vec<Codeline> = handlers
            .iter()
            .enumerate()
            .flat_map(|(asm_id, handler)| {
                handler
                    .get_code()
                    .into_iter()
                    .map(move |line_index| Codeline { asm_id, line_index })
            })
            .collect();

        let path_to_id = handlers
            .iter()
            .enumerate()
            .map(|(asm_id, handler)| (handler.source_name(), asm_id))
            .collect();

        Ok(Self {
            settings,
            handlers,
            all_instructions,
            path_to_id,
            invoker: Invoker::new(),
        })
    }

    /// Accept a removal iff the test application time did not grow and the
    /// coverage did not drop.
    pub fn evaluate(previous: (u64, f64), new: (u64, f64)) -> bool {
        let (old_tat, old_coverage) = previous;
        let (new_tat, new_coverage) = new;
        new_tat <= old_tat && new_coverage >= old_coverage
    }

    fn coverage(&self) -> anyhow::Result<f64> {
        let report = FaultReport::from_file(&self.settings.fsim_report)?;
        let coverage = report
            .compute_coverage(&self.settings.coverage_formula, COVERAGE_PRECISION)?;
        Ok(coverage)
    }

    /// Measures the unmodified program: assemble, optionally compile the HDL
    /// sources, logic-simulate for the initial TaT and fault-simulate for
    /// the initial coverage. Every failure here is fatal.
    pub async fn pre_run(&mut self) -> anyhow::Result<(u64, f64)> {
        let assembled = self
            .invoker
            .compile_assembly(&self.settings.assembly_compilation_instructions)
            .await?;
        if !assembled {
            error!("unable to compile the assembly sources");
            bail!("initial assembly compilation failed");
        }

        if let Some(argv) = &self.settings.vcs_compilation_instructions {
            if self.invoker.compile_sources(argv).await? == Compilation::Error {
                error!("unable to compile the HDL sources");
                bail!("initial HDL compilation failed");
            }
        }

        println!("Initial logic simulation for TaT computation.");
        let mut tat_sink = Vec::new();
        let lsim = self
            .invoker
            .logic_simulate(
                &self.settings.vcs_logic_simulation_instructions,
                &self.settings.vcs_logic_simulation_control,
                &mut tat_sink,
            )
            .await
            .context("unable to perform the initial logic simulation")?;
        if lsim != LogicSimulation::Success {
            error!(%lsim, "initial logic simulation failed");
            bail!("initial logic simulation ended in {lsim}");
        }

        println!("Initial fault simulation for coverage computation.");
        let fsim = self
            .invoker
            .fault_simulate(
                &self.settings.zoix_fault_simulation_instructions,
                &self.settings.zoix_fault_simulation_control,
            )
            .await?;
        if fsim != FaultSimulation::Success {
            error!(%fsim, "initial fault simulation failed");
            bail!("initial fault simulation ended in {fsim}");
        }

        let coverage = self.coverage().context("initial coverage computation failed")?;
        let tat = tat_sink
            .pop()
            .context("logic simulation reported no test application time")?;
        info!(tat, coverage, "initial STL statistics");
        Ok((tat, coverage))
    }

    /// Runs the compaction loop against the initial statistics.
    pub async fn run(&mut self, initial_stl_stats: (u64, f64)) -> anyhow::Result<()> {
        // Suffix for every artefact this run produces.
        let run_id = Utc::now().format("%d_%b_%H%M").to_string();

        let (initial_tat, initial_coverage) = initial_stl_stats;
        debug!(initial_tat, initial_coverage, "starting compaction");

        let stats_path = format!("a0_statistics_{run_id}.csv");
        let mut stats = CompactionStatistics::create(stats_path.as_ref())?;

        // The sources are mutated in place, so archive them exactly once
        // before the first removal.
        let sources: Vec<_> = self.handlers.iter().map(|h| h.source_path()).collect();
        tools::zip_archive(
            &format!("../backup_{run_id}"),
            &sources,
            self.settings.archive_instructions.as_deref(),
        )?;

        // Withdraw the candidates the trace places near a detected fault.
        let report = FaultReport::from_file(&self.settings.fsim_report)?;
        let preprocessor = Preprocessor::new(report.faults, &self.settings)?;
        preprocessor.prune_candidates(&mut self.all_instructions, &self.path_to_id);

        // Randomise the candidate order.
        let mut rng = rand::thread_rng();
        for _ in 0..self.settings.times_to_shuffle {
            self.all_instructions.shuffle(&mut rng);
        }

        let total_iterations = self.all_instructions.len();
        let mut old_stl_stats = (initial_tat, initial_coverage);

        while !self.all_instructions.is_empty() {
            let iteration = total_iterations - self.all_instructions.len() + 1;
            println!("\n#############\n# ITERATION {iteration} / {total_iterations}\n#############\n");

            let codeline = self.all_instructions.remove(0);
            let asm_source_file = self.handlers[codeline.asm_id].source_name();

            let mut row = IterationStats {
                asm_source: asm_source_file.clone(),
                removed_codeline: codeline.line_index.to_string(),
                ..IterationStats::default()
            };

            println!("Removing {codeline} of assembly source {asm_source_file}");
            self.handlers[codeline.asm_id].remove(codeline.line_index)?;

            println!("\tCross-compiling assembly sources.");
            let assembled = self
                .invoker
                .compile_assembly(&self.settings.assembly_compilation_instructions)
                .await?;
            if !assembled {
                println!(
                    "\t{asm_source_file} does not compile after the removal of {codeline}. Restoring!"
                );
                row.compiles = "NO".to_string();
                row.verdict = "Restore".to_string();
                self.handlers[codeline.asm_id].restore()?;
                stats.append(&row)?;
                continue;
            }
            row.compiles = "YES".to_string();

            if let Some(argv) = &self.settings.vcs_compilation_instructions {
                if self.invoker.compile_sources(argv).await? == Compilation::Error {
                    error!("unable to compile the HDL sources");
                    bail!("HDL compilation failed mid-loop");
                }
            }

            println!("\tInitiating logic simulation.");
            let mut tat_sink = Vec::new();
            let lsim = self
                .invoker
                .logic_simulate(
                    &self.settings.vcs_logic_simulation_instructions,
                    &self.settings.vcs_logic_simulation_control,
                    &mut tat_sink,
                )
                .await?;
            if lsim != LogicSimulation::Success {
                println!(
                    "\tLogic simulation of {asm_source_file} resulted in {lsim} after removing {codeline}.\n\tRestoring."
                );
                row.lsim_ok = format!("NO-{lsim}");
                row.verdict = "Restore".to_string();
                self.handlers[codeline.asm_id].restore()?;
                stats.append(&row)?;
                continue;
            }
            row.lsim_ok = "YES".to_string();
            let tat = tat_sink
                .pop()
                .context("logic simulation reported no test application time")?;
            row.tat = tat.to_string();

            println!("\tInitiating fault simulation.");
            let fsim = self
                .invoker
                .fault_simulate(
                    &self.settings.zoix_fault_simulation_instructions,
                    &self.settings.zoix_fault_simulation_control,
                )
                .await?;
            if fsim != FaultSimulation::Success {
                println!(
                    "\tFault simulation of {asm_source_file} resulted in {fsim} after removing {codeline}.\n\tRestoring."
                );
                row.fsim_ok = format!("NO-{fsim}");
                row.verdict = "Restore".to_string();
                self.handlers[codeline.asm_id].restore()?;
                stats.append(&row)?;
                continue;
            }
            row.fsim_ok = "YES".to_string();

            println!("\t\tComputing coverage.");
            let coverage = self.coverage()?;
            row.coverage = coverage.to_string();

            let new_stl_stats = (tat, coverage);
            if Self::evaluate(old_stl_stats, new_stl_stats) {
                println!(
                    "\tSTL has better stats than before!\n\t\tOld TaT: {} | Old Coverage: {}\n\t\tNew TaT: {} | New Coverage: {}\n\tProceeding!",
                    old_stl_stats.0, old_stl_stats.1, new_stl_stats.0, new_stl_stats.1
                );
                old_stl_stats = new_stl_stats;
                row.verdict = "Proceed".to_string();
                renumber_after_accept(&mut self.all_instructions, codeline);
            } else {
                println!(
                    "\tSTL has worse stats than before!\n\t\tOld TaT: {} | Old Coverage: {}\n\t\tNew TaT: {} | New Coverage: {}\n\tRestoring!",
                    old_stl_stats.0, old_stl_stats.1, new_stl_stats.0, new_stl_stats.1
                );
                row.verdict = "Restore".to_string();
                self.handlers[codeline.asm_id].restore()?;
            }
            stats.append(&row)?;
        }

        info!(
            tat = old_stl_stats.0,
            coverage = old_stl_stats.1,
            stats = %stats_path,
            "compaction finished"
        );
        Ok(())
    }

    /// Kills any simulator process tree still attached to the run.
    pub fn post_run(&mut self) {
        self.invoker.reap();
    }
}

/// An accepted removal shrinks that source's live-line view, so every
/// pending candidate below the removed line slides up by one.
fn renumber_after_accept(pending: &mut [Codeline], accepted: Codeline) {
    for candidate in pending {
        if candidate.asm_id == accepted.asm_id && candidate.line_index > accepted.line_index {
            candidate.line_index -= 1;
        }
    }
}
