//! Persisted per-case outcomes, one tab-separated row per case identity.

mod markers;

pub use markers::{CaseMarker, read_case_marker, write_case_marker};

use crate::common::constants::{LEDGER_DATE_FORMAT, LEDGER_HEADER, LEDGER_HEADER_TOKEN};
use crate::domain::{CaseIdentity, CaseOutcome, CaseResult, XcheckError};
use chrono::NaiveDateTime;
use csv::{QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PENDING_NOTE: &str = "not calculated yet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LedgerSummary {
    pub passed: usize,
    pub failed: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl LedgerSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.rejected + self.pending
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultLedger {
    entries: BTreeMap<CaseIdentity, CaseResult>,
    dropped_rows: usize,
}

impl ResultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a ledger; a missing file yields an empty ledger.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No ledger at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let source = fs::read_to_string(path).map_err(|source| LedgerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&source, &path.display().to_string())
    }

    pub fn parse_str(source: &str, origin: &str) -> Result<Self, LedgerError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(source.as_bytes());

        let mut ledger = Self::new();
        for (row_index, record) in reader.records().enumerate() {
            let record = record.map_err(|source| LedgerError::Csv {
                origin: origin.to_string(),
                source,
            })?;
            let line = record
                .position()
                .map(|position| position.line())
                .unwrap_or_default();

            if row_index == 0 && record.iter().any(|field| field == LEDGER_HEADER_TOKEN) {
                continue;
            }
            if record.len() != LEDGER_HEADER.len() {
                warn!(
                    "Dropping ledger row at {}:{} with {} fields, expected {}",
                    origin,
                    line,
                    record.len(),
                    LEDGER_HEADER.len()
                );
                ledger.dropped_rows += 1;
                continue;
            }

            let malformed = |reason: String| LedgerError::MalformedRow {
                origin: origin.to_string(),
                line,
                reason,
            };
            let date = NaiveDateTime::parse_from_str(&record[0], LEDGER_DATE_FORMAT)
                .map_err(|error| malformed(format!("invalid date '{}': {}", &record[0], error)))?;
            let outcome = CaseOutcome::from_label(&record[5])
                .ok_or_else(|| malformed(format!("unknown result '{}'", &record[5])))?;

            ledger.record(CaseResult {
                identity: CaseIdentity::new(&record[1], &record[3], &record[4]),
                date,
                cs_version: record[2].to_string(),
                outcome,
                note: record[6].to_string(),
            });
        }

        Ok(ledger)
    }

    /// Inserts or replaces the entry for the result's identity; returns the replaced entry.
    pub fn record(&mut self, result: CaseResult) -> Option<CaseResult> {
        self.entries.insert(result.identity.clone(), result)
    }

    pub fn get(&self, identity: &CaseIdentity) -> Option<&CaseResult> {
        self.entries.get(identity)
    }

    pub fn is_passed(&self, identity: &CaseIdentity) -> bool {
        self.get(identity)
            .is_some_and(|result| result.outcome == CaseOutcome::Passed)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CaseResult> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows discarded during ingestion because of a wrong field count.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        for result in self.entries.values() {
            match result.outcome {
                CaseOutcome::Passed => summary.passed += 1,
                CaseOutcome::Failed => summary.failed += 1,
                CaseOutcome::Rejected => summary.rejected += 1,
                CaseOutcome::Pending => summary.pending += 1,
            }
        }
        summary
    }

    /// Renders the full ledger, header first, rows sorted by identity.
    pub fn render(&self) -> Result<String, LedgerError> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        let encode = |source: csv::Error| LedgerError::Encode(source.to_string());
        writer.write_record(LEDGER_HEADER).map_err(encode)?;
        for result in self.entries.values() {
            let (label, note) = match result.outcome {
                CaseOutcome::Pending => (result.outcome.ledger_label(), PENDING_NOTE.to_string()),
                outcome => (outcome.ledger_label(), sanitize_note(&result.note)),
            };
            let date = result.date.format(LEDGER_DATE_FORMAT).to_string();
            writer
                .write_record([
                    date.as_str(),
                    result.identity.case_path.as_str(),
                    result.cs_version.as_str(),
                    result.identity.platform.as_str(),
                    result.identity.tool.as_str(),
                    label,
                    note.as_str(),
                ])
                .map_err(encode)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|error| LedgerError::Encode(error.to_string()))?;
        String::from_utf8(bytes).map_err(|error| LedgerError::Encode(error.to_string()))
    }

    /// Rewrites the ledger file wholesale.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LedgerError> {
        let path = path.as_ref();
        let rendered = self.render()?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| LedgerError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, rendered).map_err(|source| LedgerError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Notes must stay on one row.
pub fn sanitize_note(note: &str) -> String {
    note.trim()
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to read ledger '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read ledger '{origin}': {source}")]
    Csv { origin: String, source: csv::Error },
    #[error("malformed ledger row at {origin}:{line}: {reason}")]
    MalformedRow {
        origin: String,
        line: u64,
        reason: String,
    },
    #[error("failed to encode ledger: {0}")]
    Encode(String),
    #[error("failed to write ledger '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<LedgerError> for XcheckError {
    fn from(error: LedgerError) -> Self {
        let message = error.to_string();
        match error {
            LedgerError::Read { .. } | LedgerError::Csv { .. } => {
                XcheckError::ledger_io("IO.LEDGER_READ", message)
            }
            LedgerError::MalformedRow { .. } => XcheckError::ledger_io("IO.LEDGER_ROW", message),
            LedgerError::Encode(_) | LedgerError::Write { .. } => {
                XcheckError::ledger_io("IO.LEDGER_WRITE", message)
            }
        }
    }
}
