//! Materialised trace table.
//!
//! The transformed trace is held as an in-memory column-oriented table with
//! a row-id ordering and optional per-column equality indexes, and mirrored
//! to an ephemeral `.trace.db` file in the working directory. Queries return
//! history windows: for each row matching the `where` predicates, the
//! `history` consecutive rows ending at that row, in ascending order.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::error::TraceQueryError;

/// Row-count threshold above which equality indexes are built.
const INDEX_ROW_THRESHOLD: usize = 4096;

#[derive(Debug)]
pub struct TraceTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    indexes: HashMap<usize, HashMap<String, Vec<usize>>>,
    db_path: PathBuf,
}

impl TraceTable {
    /// Materialises transformer output (header line plus body lines) into a
    /// table, replacing any stale on-disk copy of the ephemeral database.
    pub fn materialise(
        lines: &[String],
        db_path: &Path,
        indexed_columns: &[&str],
    ) -> anyhow::Result<Self> {
        let (header, body) = lines
            .split_first()
            .context("trace is empty, not even a header")?;
        let columns: Vec<String> = header.split(',').map(str::to_string).collect();

        let mut rows = Vec::with_capacity(body.len());
        for line in body {
            let row = split_csv_row(line);
            if row.len() != columns.len() {
                anyhow::bail!(
                    "trace row has {} fields, schema has {}: {line}",
                    row.len(),
                    columns.len()
                );
            }
            rows.push(row);
        }

        if db_path.exists() {
            debug!(path = %db_path.display(), "stale trace database found, overwriting");
            std::fs::remove_file(db_path)
                .with_context(|| format!("failed to delete stale {}", db_path.display()))?;
        }
        std::fs::write(db_path, lines.join("\n"))
            .with_context(|| format!("failed to write {}", db_path.display()))?;

        let mut table = Self {
            columns,
            rows,
            indexes: HashMap::new(),
            db_path: db_path.to_path_buf(),
        };
        if table.rows.len() >= INDEX_ROW_THRESHOLD {
            for column in indexed_columns {
                table.build_index(column);
            }
        }
        Ok(table)
    }

    fn build_index(&mut self, column: &str) {
        let Some(col) = self.column_index(column) else {
            return;
        };
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (rowid, row) in self.rows.iter().enumerate() {
            index.entry(row[col].clone()).or_default().push(rowid);
        }
        debug!(column, keys = index.len(), "trace index built");
        self.indexes.insert(col, index);
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Finds the row ids matching every `where` predicate, in ascending order.
    fn matching_rowids(
        &self,
        where_: &BTreeMap<String, String>,
    ) -> Result<Vec<usize>, TraceQueryError> {
        let mut predicates = Vec::with_capacity(where_.len());
        for (column, value) in where_ {
            let col = self
                .column_index(column)
                .ok_or_else(|| TraceQueryError::UnknownColumn(column.clone()))?;
            predicates.push((col, value.as_str()));
        }

        // Seed from an index when one of the predicate columns has one.
        if let Some((col, value)) = predicates
            .iter()
            .find(|(col, _)| self.indexes.contains_key(col))
        {
            let seed = self.indexes[col]
                .get(*value)
                .cloned()
                .unwrap_or_default();
            return Ok(seed
                .into_iter()
                .filter(|&rowid| {
                    predicates
                        .iter()
                        .all(|(c, v)| self.rows[rowid][*c] == **v)
                })
                .collect());
        }

        Ok((0..self.rows.len())
            .filter(|&rowid| {
                predicates
                    .iter()
                    .all(|(c, v)| self.rows[rowid][*c] == **v)
            })
            .collect())
    }

    /// Windowed lookup. For each row matching `where_`, the `history`
    /// consecutive rows ending at it (ascending), projected onto `select`
    /// (a column name, or `*` for the full row); windows are concatenated in
    /// match order.
    pub fn query(
        &self,
        select: &str,
        where_: &BTreeMap<String, String>,
        history: usize,
        allow_multiple: bool,
    ) -> Result<Vec<Vec<String>>, TraceQueryError> {
        if self.columns.is_empty() || !self.db_path.exists() {
            return Err(TraceQueryError::NotInitialised);
        }
        let projection = if select == "*" {
            None
        } else {
            Some(
                self.column_index(select)
                    .ok_or_else(|| TraceQueryError::UnknownColumn(select.to_string()))?,
            )
        };

        let rowids = self.matching_rowids(where_)?;
        let describe = || {
            where_
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        if rowids.is_empty() {
            return Err(TraceQueryError::NotFound(describe()));
        }
        if rowids.len() > 1 && !allow_multiple {
            return Err(TraceQueryError::Ambiguous(describe()));
        }

        let mut result = Vec::new();
        for rowid in rowids {
            let start = (rowid + 1).saturating_sub(history);
            for row in &self.rows[start..=rowid] {
                match projection {
                    Some(col) => result.push(vec![row[col].clone()]),
                    None => result.push(row.clone()),
                }
            }
        }
        Ok(result)
    }
}

/// Splits one materialised row. Quoted fields may contain commas; quotes are
/// not nested.
fn split_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn where_(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_lines() -> Vec<String> {
        [
            "Time,Cycle,PC,Instr,Decoded instruction,Register and memory contents",
            r#"10ns,1,00000004,00000013,"and","""#,
            r#"20ns,2,00000008,00000013,"or","""#,
            r#"30ns,3,0000000c,00000013,"xor","""#,
            r#"40ns,4,00000010,00000013,"sll","""#,
            r#"50ns,5,00000014,00000013,"j","""#,
            r#"60ns,6,0000004c,00000013,"addi x1, x0, 1","x1=00000001""#,
            r#"70ns,7,00000050,00000013,"wfi","""#,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn sample_table(dir: &Path) -> TraceTable {
        TraceTable::materialise(&sample_lines(), &dir.join(".trace.db"), &["PC", "Time"]).unwrap()
    }

    #[test]
    fn quoted_fields_keep_their_commas() {
        let row = split_csv_row(r#"60ns,6,0000004c,13,"addi x1, x0, 1","x1=00000001, x0:0""#);
        assert_eq!(
            row,
            vec!["60ns", "6", "0000004c", "13", "addi x1, x0, 1", "x1=00000001, x0:0"]
        );
    }

    #[test]
    fn window_ends_at_the_matching_row() {
        let dir = tempdir().unwrap();
        let table = sample_table(dir.path());

        let result = table
            .query("PC", &where_(&[("PC", "0000004c"), ("Time", "60ns")]), 5, false)
            .unwrap();
        let pcs: Vec<&str> = result.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(
            pcs,
            vec!["00000008", "0000000c", "00000010", "00000014", "0000004c"]
        );
    }

    #[test]
    fn window_is_clamped_at_the_table_start() {
        let dir = tempdir().unwrap();
        let table = sample_table(dir.path());

        let result = table.query("PC", &where_(&[("Time", "20ns")]), 5, false).unwrap();
        let pcs: Vec<&str> = result.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(pcs, vec!["00000004", "00000008"]);
    }

    #[test]
    fn star_projects_full_rows() {
        let dir = tempdir().unwrap();
        let table = sample_table(dir.path());

        let result = table.query("*", &where_(&[("Time", "10ns")]), 1, false).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), table.columns().len());
        assert_eq!(result[0][2], "00000004");
    }

    #[test]
    fn no_match_and_ambiguity_are_errors() {
        let dir = tempdir().unwrap();
        let table = sample_table(dir.path());

        assert!(matches!(
            table.query("PC", &where_(&[("Time", "999ns")]), 5, false),
            Err(TraceQueryError::NotFound(_))
        ));
        assert!(matches!(
            table.query("PC", &where_(&[("Instr", "00000013")]), 5, false),
            Err(TraceQueryError::Ambiguous(_))
        ));
        assert!(matches!(
            table.query("PC", &where_(&[("Nope", "1")]), 5, false),
            Err(TraceQueryError::UnknownColumn(_))
        ));
    }

    #[test]
    fn allow_multiple_concatenates_windows() {
        let dir = tempdir().unwrap();
        let table = sample_table(dir.path());

        let result = table
            .query("PC", &where_(&[("Instr", "00000013")]), 1, true)
            .unwrap();
        assert_eq!(result.len(), table.row_count());
    }

    #[test]
    fn deleting_the_ephemeral_file_deinitialises_the_table() {
        let dir = tempdir().unwrap();
        let table = sample_table(dir.path());
        std::fs::remove_file(dir.path().join(".trace.db")).unwrap();
        assert!(matches!(
            table.query("PC", &where_(&[("Time", "10ns")]), 1, false),
            Err(TraceQueryError::NotInitialised)
        ));
    }

    #[test]
    fn stale_database_is_replaced_and_contents_identical() {
        let dir = tempdir().unwrap();
        let db = dir.path().join(".trace.db");
        std::fs::write(&db, "junk from a previous run").unwrap();

        let first = TraceTable::materialise(&sample_lines(), &db, &[]).unwrap();
        let on_disk_first = std::fs::read_to_string(&db).unwrap();
        let second = TraceTable::materialise(&sample_lines(), &db, &[]).unwrap();
        let on_disk_second = std::fs::read_to_string(&db).unwrap();

        assert_eq!(first.row_count(), second.row_count());
        assert_eq!(on_disk_first, on_disk_second);
        assert!(on_disk_first.starts_with("Time,Cycle,PC"));
    }

    #[test]
    fn indexed_lookup_matches_scan() {
        let dir = tempdir().unwrap();
        let db = dir.path().join(".trace.db");

        let mut lines = vec!["Time,Cycle,PC".to_string()];
        for i in 0..INDEX_ROW_THRESHOLD + 10 {
            lines.push(format!("{}ns,{},{:08x}", i * 10, i, i % 97));
        }
        let table = TraceTable::materialise(&lines, &db, &["PC"]).unwrap();

        let needle = format!("{:08x}", 42);
        let result = table
            .query("Time", &where_(&[("PC", needle.as_str())]), 1, true)
            .unwrap();
        let expected: Vec<Vec<String>> = (0..INDEX_ROW_THRESHOLD + 10)
            .filter(|i| i % 97 == 42)
            .map(|i| vec![format!("{}ns", i * 10)])
            .collect();
        assert_eq!(result, expected);
    }
}
