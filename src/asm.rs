//! In-place assembly source mutation with an undo stack.
//!
//! Each handler owns one source file at single-line granularity: any line
//! the ISA description classifies as an instruction can be removed and later
//! restored, and the file on disk is rewritten after every mutation.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

/// Names one removable line: the handler it belongs to and the 0-based index
/// into that handler's current live-line view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codeline {
    pub asm_id: usize,
    pub line_index: usize,
}

impl fmt::Display for Codeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line_index)
    }
}

/// Minimal ISA description: what distinguishes an instruction line from the
/// rest of an assembly source. Loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Isa {
    /// Token that starts a comment, e.g. `#` or `;`.
    #[serde(default = "default_comment_prefix")]
    pub comment_prefix: String,
    /// Prefix of assembler directives, e.g. `.`.
    #[serde(default = "default_directive_prefix")]
    pub directive_prefix: String,
}

impl Default for Isa {
    fn default() -> Self {
        Self {
            comment_prefix: default_comment_prefix(),
            directive_prefix: default_directive_prefix(),
        }
    }
}

impl Isa {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ISA spec {}", path.display()))?;
        let isa: Isa = toml::from_str(&content)?;
        Ok(isa)
    }

    /// True when the line holds a removable instruction: not blank, not a
    /// comment, not a label definition, not an assembler directive.
    pub fn is_instruction(&self, line: &str) -> bool {
        let code = match line.find(&self.comment_prefix) {
            Some(pos) => &line[..pos],
            None => line,
        };
        let code = code.trim();
        if code.is_empty() || code.starts_with(&self.directive_prefix) {
            return false;
        }
        // Label definitions (with or without a trailing instruction) stay.
        if code.split_whitespace().next().is_some_and(|t| t.ends_with(':')) {
            return false;
        }
        true
    }
}

fn default_comment_prefix() -> String {
    "#".to_string()
}

fn default_directive_prefix() -> String {
    ".".to_string()
}

/// One assembly source with its current line view and pending undo records.
#[derive(Debug)]
pub struct AssemblyHandler {
    isa: Isa,
    path: PathBuf,
    /// Raw line segments including their original terminators, so rewrites
    /// are byte-exact.
    lines: Vec<String>,
    undo: Vec<(usize, String)>,
}

impl AssemblyHandler {
    pub fn new(isa: Isa, path: PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read assembly source {}", path.display()))?;
        let lines = content.split_inclusive('\n').map(str::to_string).collect();
        Ok(Self {
            isa,
            path,
            lines,
            undo: Vec::new(),
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.path
    }

    /// File name of the source, as used in the statistics log and the
    /// PC-to-source mapping.
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Indices of the currently-live removable lines.
    pub fn get_code(&self) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, raw)| self.isa.is_instruction(raw.trim_end_matches(['\n', '\r'])))
            .map(|(index, _)| index)
            .collect()
    }

    /// Deletes the line at `line_index`, rewrites the file and pushes an
    /// undo record.
    pub fn remove(&mut self, line_index: usize) -> anyhow::Result<()> {
        anyhow::ensure!(
            line_index < self.lines.len(),
            "line {line_index} out of range for {}",
            self.path.display()
        );
        let raw = self.lines.remove(line_index);
        debug!(source = %self.path.display(), line_index, "removing {:?}", raw.trim_end());
        self.undo.push((line_index, raw));
        self.rewrite()
    }

    /// Pops the most recent undo record, re-inserts the line at its original
    /// index and rewrites the file.
    ///
    /// # Panics
    ///
    /// Panics when no removal is pending; unbalanced restores are a
    /// programmer error.
    pub fn restore(&mut self) -> anyhow::Result<()> {
        let (line_index, raw) = self
            .undo
            .pop()
            .expect("restore() called without a matching remove()");
        debug!(source = %self.path.display(), line_index, "restoring {:?}", raw.trim_end());
        self.lines.insert(line_index, raw);
        self.rewrite()
    }

    fn rewrite(&self) -> anyhow::Result<()> {
        std::fs::write(&self.path, self.lines.concat())
            .with_context(|| format!("failed to rewrite {}", self.path.display()))
    }
}
