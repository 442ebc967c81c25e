//! Per-run CSV statistics log.
//!
//! One row per compaction iteration, flushed immediately so the file can be
//! tail-read while the run is in progress and survives a crash.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;

pub const STATS_HEADER: [&str; 8] = [
    "asm_source",
    "removed_codeline",
    "compiles",
    "lsim_ok",
    "tat",
    "fsim_ok",
    "coverage",
    "verdict",
];

/// One iteration's outcome. Fields that were never reached stay blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationStats {
    pub asm_source: String,
    pub removed_codeline: String,
    pub compiles: String,
    pub lsim_ok: String,
    pub tat: String,
    pub fsim_ok: String,
    pub coverage: String,
    pub verdict: String,
}

impl IterationStats {
    fn fields(&self) -> [&str; 8] {
        [
            &self.asm_source,
            &self.removed_codeline,
            &self.compiles,
            &self.lsim_ok,
            &self.tat,
            &self.fsim_ok,
            &self.coverage,
            &self.verdict,
        ]
    }
}

pub struct CompactionStatistics {
    file: File,
}

impl CompactionStatistics {
    /// Creates the statistics file and writes the header row.
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create statistics file {}", path.display()))?;
        let mut stats = Self { file };
        stats.write_row(&STATS_HEADER)?;
        Ok(stats)
    }

    /// Appends one iteration row and flushes it to disk.
    pub fn append(&mut self, row: &IterationStats) -> anyhow::Result<()> {
        self.write_row(&row.fields())
    }

    fn write_row(&mut self, fields: &[&str; 8]) -> anyhow::Result<()> {
        writeln!(self.file, "{}", fields.join(","))
            .context("failed to append statistics row")?;
        self.file.flush().context("failed to flush statistics row")
    }
}
