pub mod errors;

pub use errors::{XcheckError, XcheckErrorCategory, XcheckResult};

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseOutcome {
    #[default]
    Pending,
    Passed,
    Failed,
    Rejected,
}

impl CaseOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    /// Label persisted in the ledger; an unfinished case is stored as failed.
    pub const fn ledger_label(self) -> &'static str {
        match self {
            Self::Pending => "failed",
            other => other.as_str(),
        }
    }

    /// Parses a persisted ledger label. `pending` is never written, so it is not accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for CaseOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Ledger key. The case path alone is not unique across platform/tool combinations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseIdentity {
    pub case_path: String,
    pub platform: String,
    pub tool: String,
}

impl CaseIdentity {
    pub fn new(
        case_path: impl Into<String>,
        platform: impl Into<String>,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            case_path: case_path.into(),
            platform: platform.into(),
            tool: tool.into(),
        }
    }
}

impl Display for CaseIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.case_path, self.platform, self.tool)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub identity: CaseIdentity,
    pub date: NaiveDateTime,
    pub cs_version: String,
    pub outcome: CaseOutcome,
    pub note: String,
}

impl CaseResult {
    pub fn pending(
        identity: CaseIdentity,
        cs_version: impl Into<String>,
        date: NaiveDateTime,
    ) -> Self {
        Self {
            identity,
            date,
            cs_version: cs_version.into(),
            outcome: CaseOutcome::Pending,
            note: String::new(),
        }
    }

    pub fn conclude(&mut self, outcome: CaseOutcome, note: impl Into<String>, date: NaiveDateTime) {
        self.outcome = outcome;
        self.note = note.into();
        self.date = date;
    }
}

#[cfg(test)]
mod tests {
    use super::{CaseIdentity, CaseOutcome, CaseResult};
    use chrono::NaiveDate;

    #[test]
    fn outcome_labels_roundtrip_and_pending_persists_as_failed() {
        for outcome in [
            CaseOutcome::Passed,
            CaseOutcome::Failed,
            CaseOutcome::Rejected,
        ] {
            assert_eq!(CaseOutcome::from_label(outcome.as_str()), Some(outcome));
            assert_eq!(outcome.ledger_label(), outcome.as_str());
        }
        assert_eq!(CaseOutcome::Pending.ledger_label(), "failed");
        assert_eq!(CaseOutcome::from_label("pass"), None);
        assert_eq!(CaseOutcome::from_label("pending"), None);
    }

    #[test]
    fn identities_differ_by_platform_and_tool() {
        let linux = CaseIdentity::new("2.0_cs_Dymola_BouncingBall", "linux64", "Dymola-2019");
        let win = CaseIdentity::new("2.0_cs_Dymola_BouncingBall", "win64", "Dymola-2019");
        assert_ne!(linux, win);
        assert!(linux < win);
    }

    #[test]
    fn conclude_moves_pending_case_to_terminal_outcome() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("valid date");
        let finished = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(8, 5, 0))
            .expect("valid date");

        let mut result = CaseResult::pending(
            CaseIdentity::new("case", "linux64", "tool"),
            "2.0",
            started,
        );
        assert!(!result.outcome.is_terminal());

        result.conclude(CaseOutcome::Failed, "Results mismatch", finished);
        assert!(result.outcome.is_terminal());
        assert_eq!(result.date, finished);
        assert_eq!(result.note, "Results mismatch");
    }
}
