//! Vendor variable names mapped onto the names a solver writes.
//!
//! A synonym file is tab-separated; one column holds the canonical (computed)
//! name and another holds one alternate (reference) name per row. A canonical
//! name may repeat to register several alternates.

use crate::common::SynonymColumns;
use crate::domain::{XcheckError, XcheckResult};
use csv::ReaderBuilder;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymTable {
    // (canonical, alternate) in insertion order
    entries: Vec<(String, String)>,
}

impl SynonymTable {
    pub fn read(path: impl AsRef<Path>, columns: SynonymColumns) -> XcheckResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            XcheckError::parse(
                "PARSE.SYNONYM_READ",
                format!("failed to read synonym table '{}': {}", path.display(), source),
            )
        })?;
        Self::parse_str(&source, &path.display().to_string(), columns)
    }

    pub fn parse_str(source: &str, origin: &str, columns: SynonymColumns) -> XcheckResult<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .from_reader(source.as_bytes());

        let required = columns.canonical.max(columns.alternate) + 1;
        let mut table = Self::default();
        for record in reader.records() {
            let record = record.map_err(|source| {
                XcheckError::parse(
                    "PARSE.SYNONYM_ROW",
                    format!("{}: malformed row: {}", origin, source),
                )
            })?;
            if record.iter().all(|token| token.trim().is_empty()) {
                continue;
            }

            let line = record
                .position()
                .map(|position| position.line())
                .unwrap_or_default();
            let (Some(canonical), Some(alternate)) =
                (record.get(columns.canonical), record.get(columns.alternate))
            else {
                return Err(XcheckError::parse(
                    "PARSE.SYNONYM_ROW",
                    format!(
                        "{}: row at line {} has {} columns, expected at least {}",
                        origin,
                        line,
                        record.len(),
                        required
                    ),
                ));
            };

            table.insert(canonical.trim(), alternate.trim());
        }

        Ok(table)
    }

    pub fn insert(&mut self, canonical: impl Into<String>, alternate: impl Into<String>) {
        self.entries.push((canonical.into(), alternate.into()));
    }

    /// Canonical name registered for `alternate`, or `None` when unresolved.
    ///
    /// An alternate registered under two canonicals resolves to the one inserted last.
    pub fn resolve(&self, alternate: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(_, candidate)| candidate == alternate)
            .map(|(canonical, _)| canonical.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SynonymTable;
    use crate::common::SynonymColumns;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn one_canonical_registers_several_alternates() {
        let table = SynonymTable::parse_str(
            "BouncingBall\th\theight\nBouncingBall\th\tball.h\n\nBouncingBall\tv\tvelocity\n",
            "synonymous_variables.txt",
            SynonymColumns::default(),
        )
        .expect("synonyms should parse");

        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve("height"), Some("h"));
        assert_eq!(table.resolve("ball.h"), Some("h"));
        assert_eq!(table.resolve("velocity"), Some("v"));
        assert_eq!(table.resolve("h"), None);
    }

    #[test]
    fn duplicate_alternate_resolves_to_latest_insert() {
        let mut table = SynonymTable::default();
        table.insert("a", "x");
        table.insert("b", "x");
        assert_eq!(table.resolve("x"), Some("b"));
    }

    #[test]
    fn short_row_is_a_parse_error() {
        let error = SynonymTable::parse_str(
            "model\th\theight\nmodel\tv\n",
            "synonymous_variables.txt",
            SynonymColumns::default(),
        )
        .expect_err("short row should fail");

        assert_eq!(error.placeholder(), "PARSE.SYNONYM_ROW");
        assert!(error.message().contains("line 2"));
    }

    #[test]
    fn honours_configured_columns() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("synonyms.txt");
        fs::write(&path, "height\th\r\n").expect("synonyms should be written");

        let table = SynonymTable::read(
            &path,
            SynonymColumns {
                canonical: 1,
                alternate: 0,
            },
        )
        .expect("synonyms should load");
        assert_eq!(table.resolve("height"), Some("h"));
    }
}
