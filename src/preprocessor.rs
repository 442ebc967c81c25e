//! Candidate pruning against the execution trace.
//!
//! Instructions that retire near a fault's recorded program counter are the
//! ones most likely to be detecting it, so they are withdrawn from the
//! candidate list before the compaction loop starts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::asm::Codeline;
use crate::config::Settings;
use crate::fault_report::Fault;
use crate::tools;
use crate::trace::transformer_for;
use crate::trace_db::TraceTable;

/// Ephemeral trace database in the working directory.
pub const TRACE_DB: &str = ".trace.db";

/// Rows preceding each fault location that are considered protected.
const PC_HISTORY: usize = 4;

pub struct Preprocessor {
    table: TraceTable,
    faults: Vec<Fault>,
    elf: PathBuf,
    zoix_to_trace: BTreeMap<String, String>,
    pc_column: String,
}

impl Preprocessor {
    /// Parses the processor trace named by the settings and materialises it
    /// into the ephemeral trace table.
    pub fn new(faults: Vec<Fault>, settings: &Settings) -> anyhow::Result<Self> {
        let transformer = transformer_for(&settings.processor_name)?;
        let raw = std::fs::read_to_string(&settings.processor_trace).with_context(|| {
            format!(
                "failed to read processor trace {}",
                settings.processor_trace.display()
            )
        })?;
        let lines = transformer.parse(&raw)?;
        let table = TraceTable::materialise(
            &lines,
            Path::new(TRACE_DB),
            &[settings.pc_column.as_str(), "Time"],
        )?;
        info!(rows = table.row_count(), "trace materialised into {TRACE_DB}");

        Ok(Self {
            table,
            faults,
            elf: settings.elf_file.clone(),
            zoix_to_trace: settings.zoix_to_trace.clone(),
            pc_column: settings.pc_column.clone(),
        })
    }

    pub fn table(&self) -> &TraceTable {
        &self.table
    }

    /// Removes from `candidates` every line the fault attributes point at,
    /// resolving trace PCs to source lines through the external resolver.
    /// `path_map` maps source file names to handler ids.
    pub fn prune_candidates(
        &self,
        candidates: &mut Vec<Codeline>,
        path_map: &BTreeMap<String, usize>,
    ) {
        let elf = self.elf.clone();
        self.prune_candidates_with(candidates, path_map, |pc| tools::addr2line(&elf, pc));
    }

    /// Pruning core with an injectable PC resolver.
    pub fn prune_candidates_with<R>(
        &self,
        candidates: &mut Vec<Codeline>,
        path_map: &BTreeMap<String, usize>,
        resolve: R,
    ) where
        R: Fn(&str) -> Option<(String, usize)>,
    {
        // Distinct attribute tuples, in order of first appearance, translated
        // to trace column names.
        let mut attributes: Vec<BTreeMap<String, String>> = Vec::new();
        for fault in &self.faults {
            let Some(fault_attributes) = &fault.fault_attributes else {
                continue;
            };
            let mut entry = BTreeMap::new();
            for (zoix_name, trace_column) in &self.zoix_to_trace {
                match fault_attributes.get(zoix_name) {
                    Some(value) => {
                        entry.insert(trace_column.clone(), value.clone());
                    }
                    None => {
                        debug!(%zoix_name, "fault attribute missing, skipping fault");
                        entry.clear();
                        break;
                    }
                }
            }
            if !entry.is_empty() && !attributes.contains(&entry) {
                attributes.push(entry);
            }
        }

        // One PC window per attribute tuple; failed lookups are skipped.
        let mut windows: Vec<Vec<String>> = Vec::new();
        for entry in &attributes {
            match self
                .table
                .query(&self.pc_column, entry, PC_HISTORY, false)
            {
                Ok(rows) => {
                    let window: Vec<String> =
                        rows.into_iter().map(|mut r| r.swap_remove(0)).collect();
                    if !windows.contains(&window) {
                        windows.push(window);
                    }
                }
                Err(err) => {
                    warn!(%err, "trace query failed, skipping attribute tuple");
                }
            }
        }
        let pcs: Vec<String> = windows.into_iter().flatten().collect();

        // Resolve each PC and withdraw the matching candidate.
        let mut removed_lines: Vec<usize> = Vec::new();
        for pc in &pcs {
            let Some((source_file, lineno)) = resolve(pc) else {
                warn!(%pc, elf = %self.elf.display(), "program counter not found in ELF");
                continue;
            };
            if removed_lines.contains(&lineno) {
                warn!(lineno, "line has already been removed, skipping");
                continue;
            }
            let Some(&asm_id) = path_map.get(&source_file) else {
                warn!(
                    %pc,
                    lineno,
                    %source_file,
                    "PC maps to a file that is not among the assembly sources, skipping"
                );
                continue;
            };

            let before = candidates.len();
            candidates.retain(|c| !(c.asm_id == asm_id && c.line_index == lineno - 1));
            if candidates.len() != before {
                debug!(%pc, %source_file, lineno, "candidate withdrawn");
                removed_lines.push(lineno);
            }
        }

        info!(
            protected = removed_lines.len(),
            remaining = candidates.len(),
            "candidate pruning finished"
        );
    }
}
