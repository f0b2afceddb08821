//! Fixed values shared by the comparison engine, the ledger and the case layout.
//!
//! The WRMS pass threshold lives here rather than in the runtime configuration so
//! every comparison in a deployment is judged against the same limit.

pub const WRMS_PASS_THRESHOLD: f64 = 1.0;

pub const DEFAULT_REL_TOL: f64 = 1.0e-3;
pub const DEFAULT_ABS_TOL_SCALE: f64 = 1.0e-3;
pub const DEFAULT_ABS_TOL_FLOOR: f64 = 1.0e-20;

pub const LEDGER_HEADER: [&str; 7] = [
    "Date",
    "FMUCase",
    "CS-Version",
    "Platform",
    "Tool",
    "Result",
    "Notes",
];
pub const LEDGER_HEADER_TOKEN: &str = "FMUCase";
pub const LEDGER_DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

pub const PASSED_MARKER: &str = "passed";
pub const FAILED_MARKER: &str = "failed";
pub const REJECTED_MARKER: &str = "rejected";

pub const TIME_COLUMN_SIGNIFICANT_DIGITS: usize = 6;

#[cfg(test)]
mod tests {
    use super::{LEDGER_HEADER, LEDGER_HEADER_TOKEN, WRMS_PASS_THRESHOLD};

    #[test]
    fn ledger_header_contains_detection_token() {
        assert_eq!(LEDGER_HEADER.len(), 7);
        assert!(LEDGER_HEADER.contains(&LEDGER_HEADER_TOKEN));
    }

    #[test]
    fn pass_threshold_is_unit_norm() {
        assert_eq!(WRMS_PASS_THRESHOLD, 1.0);
    }
}
