//! `passed` / `rejected` / `failed` files in a case directory record an outcome
//! that does not need to be recomputed.

use super::LedgerError;
use crate::common::constants::{FAILED_MARKER, PASSED_MARKER, REJECTED_MARKER};
use crate::domain::CaseOutcome;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::Path;

pub const README_FILE: &str = "README.md";

const MARKER_ORDER: [(&str, CaseOutcome); 3] = [
    (PASSED_MARKER, CaseOutcome::Passed),
    (REJECTED_MARKER, CaseOutcome::Rejected),
    (FAILED_MARKER, CaseOutcome::Failed),
];

#[derive(Debug, Clone, PartialEq)]
pub struct CaseMarker {
    pub outcome: CaseOutcome,
    pub note: String,
    pub modified: NaiveDateTime,
}

/// First marker present in `dir`, checked in the order passed, rejected, failed.
///
/// The note of a `passed` marker is the accompanying `README.md` with its lines
/// joined by `;`; other markers carry their own lines joined by `,`.
pub fn read_case_marker(dir: impl AsRef<Path>) -> Result<Option<CaseMarker>, LedgerError> {
    let dir = dir.as_ref();
    for (name, outcome) in MARKER_ORDER {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }

        let read_error = |source| LedgerError::Read {
            path: path.clone(),
            source,
        };
        let content = fs::read_to_string(&path).map_err(read_error)?;
        let modified = fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .map_err(read_error)?;

        let note = match outcome {
            // `passed` holds the solver label; the WRMS list lives in the README.
            CaseOutcome::Passed => {
                let readme = dir.join(README_FILE);
                if readme.is_file() {
                    let content = fs::read_to_string(&readme).map_err(|source| {
                        LedgerError::Read {
                            path: readme.clone(),
                            source,
                        }
                    })?;
                    joined_lines(&content, ";")
                } else {
                    String::new()
                }
            }
            _ => joined_lines(&content, ","),
        };
        return Ok(Some(CaseMarker {
            outcome,
            note,
            modified: DateTime::<Local>::from(modified).naive_local(),
        }));
    }

    Ok(None)
}

fn joined_lines(content: &str, separator: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Writes the marker for `outcome`. A `passed` marker holds `solver_label`
/// and is accompanied by a `README.md` carrying `note`; the other markers
/// hold `note` directly.
pub fn write_case_marker(
    dir: impl AsRef<Path>,
    outcome: CaseOutcome,
    note: &str,
    solver_label: &str,
) -> Result<(), LedgerError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|source| LedgerError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let write = |name: &str, content: String| {
        let path = dir.join(name);
        fs::write(&path, content).map_err(|source| LedgerError::Write { path, source })
    };

    match outcome {
        CaseOutcome::Passed => {
            write(PASSED_MARKER, format!("{}\n", solver_label))?;
            write(README_FILE, format!("{}\n", note))
        }
        other => write(other.ledger_label(), note.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{README_FILE, read_case_marker, write_case_marker};
    use crate::domain::CaseOutcome;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn no_marker_reads_as_none() {
        let temp = TempDir::new().expect("tempdir should be created");
        assert_eq!(
            read_case_marker(temp.path()).expect("marker scan should succeed"),
            None
        );
    }

    #[test]
    fn rejected_note_joins_trimmed_lines() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(
            temp.path().join("rejected"),
            "  FMU crashes on init  \n\nsee log\n",
        )
        .expect("marker should be written");

        let marker = read_case_marker(temp.path())
            .expect("marker scan should succeed")
            .expect("marker should be found");
        assert_eq!(marker.outcome, CaseOutcome::Rejected);
        assert_eq!(marker.note, "FMU crashes on init,see log");
    }

    #[test]
    fn passed_marker_takes_precedence() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(temp.path().join("failed"), "old failure").expect("marker should be written");
        fs::write(temp.path().join("passed"), "MasterSim_0.7.0").expect("marker should be written");

        let marker = read_case_marker(temp.path())
            .expect("marker scan should succeed")
            .expect("marker should be found");
        assert_eq!(marker.outcome, CaseOutcome::Passed);
    }

    #[test]
    fn passed_marker_writes_solver_label_and_readme() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dir = temp.path().join("results").join("BouncingBall");

        write_case_marker(&dir, CaseOutcome::Passed, "WRMS(h) = 0", "MasterSim_0.7.0")
            .expect("marker should be written");

        assert_eq!(
            fs::read_to_string(dir.join("passed")).expect("passed should exist"),
            "MasterSim_0.7.0\n"
        );
        assert_eq!(
            fs::read_to_string(dir.join(README_FILE)).expect("readme should exist"),
            "WRMS(h) = 0\n"
        );
    }

    #[test]
    fn passed_marker_note_comes_from_readme_not_solver_label() {
        let temp = TempDir::new().expect("tempdir should be created");
        write_case_marker(
            temp.path(),
            CaseOutcome::Passed,
            "WRMS(h) = 0\nWRMS(v) = 0.25",
            "MasterSim_0.7.0",
        )
        .expect("marker should be written");

        let marker = read_case_marker(temp.path())
            .expect("marker scan should succeed")
            .expect("marker should be found");
        assert_eq!(marker.outcome, CaseOutcome::Passed);
        assert_eq!(marker.note, "WRMS(h) = 0;WRMS(v) = 0.25");

        fs::remove_file(temp.path().join(README_FILE)).expect("readme should be removed");
        let bare = read_case_marker(temp.path())
            .expect("marker scan should succeed")
            .expect("marker should be found");
        assert_eq!(bare.note, "");
    }

    #[test]
    fn failed_marker_roundtrips_note() {
        let temp = TempDir::new().expect("tempdir should be created");
        write_case_marker(temp.path(), CaseOutcome::Failed, "Results mismatch", "MasterSim_0.7.0")
            .expect("marker should be written");

        let marker = read_case_marker(temp.path())
            .expect("marker scan should succeed")
            .expect("marker should be found");
        assert_eq!(marker.outcome, CaseOutcome::Failed);
        assert_eq!(marker.note, "Results mismatch");
        assert!(!temp.path().join(README_FILE).exists());
    }
}
