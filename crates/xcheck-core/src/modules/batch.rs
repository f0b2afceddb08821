use super::comparator::{CaseComparison, ComparisonEngine};
use super::ledger::{ResultLedger, read_case_marker, write_case_marker};
use super::project::{FmiVersion, ProjectGenerator};
use super::structured::{GeometryStore, StructuredResultFile};
use super::synonyms::SynonymTable;
use super::timeseries::TimeSeriesFile;
use crate::common::XcheckConfig;
use crate::domain::{CaseIdentity, CaseOutcome, CaseResult, XcheckError, XcheckResult};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const OUTPUT_FILE_STEM: &str = "values";

/// One case of a batch: where its FMU and reference files live and where the
/// solver works on it.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSpec {
    pub identity: CaseIdentity,
    /// Path of the FMU without extension; `<case_base>_ref.csv` etc. sit beside it.
    pub case_base: PathBuf,
    pub working_dir: PathBuf,
    pub cs_version: String,
    pub fmi_version: FmiVersion,
}

impl CaseSpec {
    pub fn model_name(&self) -> String {
        self.case_base
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Produces the output file for a prepared project. Running the solver itself is
/// the implementor's business.
pub trait SolverRunner {
    fn run(&mut self, case: &CaseSpec, project_path: &Path) -> XcheckResult<PathBuf>;
}

/// Picks up outputs written by an earlier, external solver run:
/// `<working_dir>/<model>/results/values.csv`, or `values.d6o` beside it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedOutputs;

impl SolverRunner for PrecomputedOutputs {
    fn run(&mut self, case: &CaseSpec, _project_path: &Path) -> XcheckResult<PathBuf> {
        let results_dir = case.working_dir.join(case.model_name()).join("results");
        ["csv", "d6o"]
            .iter()
            .map(|extension| results_dir.join(format!("{}.{}", OUTPUT_FILE_STEM, extension)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                XcheckError::external_tool(
                    "EXTERNAL.SOLVER_OUTPUT",
                    format!("missing result file in '{}'", results_dir.display()),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub case: String,
    pub outcome: CaseOutcome,
    pub skipped: bool,
    pub note: String,
    pub comparison: Option<CaseComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub passed: bool,
    pub case_count: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    pub rejected_count: usize,
    pub skipped_count: usize,
    pub cases: Vec<CaseReport>,
}

impl BatchReport {
    fn from_cases(cases: Vec<CaseReport>) -> Self {
        let count = |outcome: CaseOutcome| cases.iter().filter(|case| case.outcome == outcome).count();
        let passed_count = count(CaseOutcome::Passed);
        let failed_count = count(CaseOutcome::Failed) + count(CaseOutcome::Pending);
        let rejected_count = count(CaseOutcome::Rejected);
        let skipped_count = cases.iter().filter(|case| case.skipped).count();
        Self {
            passed: passed_count == cases.len(),
            case_count: cases.len(),
            passed_count,
            failed_count,
            rejected_count,
            skipped_count,
            cases,
        }
    }
}

pub fn render_human_summary(report: &BatchReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Cross-check status: {}", status));
    lines.push(format!(
        "Cases: {} total ({} passed, {} failed, {} rejected, {} skipped)",
        report.case_count,
        report.passed_count,
        report.failed_count,
        report.rejected_count,
        report.skipped_count
    ));

    for case in report
        .cases
        .iter()
        .filter(|case| case.outcome != CaseOutcome::Passed)
    {
        let note = if case.note.is_empty() {
            "no note"
        } else {
            case.note.as_str()
        };
        lines.push(format!("Case {}: {} ({})", case.case, case.outcome, note));
    }

    lines.join("\n")
}

/// Drives every case through setup, solver, comparison and ledger update.
pub struct BatchRunner {
    config: XcheckConfig,
    engine: ComparisonEngine,
    geometry: GeometryStore,
    clock: Box<dyn Fn() -> NaiveDateTime>,
}

impl BatchRunner {
    pub fn new(config: XcheckConfig) -> Self {
        let engine = ComparisonEngine::new(config.tolerance);
        Self {
            config,
            engine,
            geometry: GeometryStore::new(),
            clock: Box::new(|| Local::now().naive_local()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &XcheckConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GeometryStore {
        &self.geometry
    }

    pub fn solver_label(&self) -> String {
        format!("{}_{}", self.config.solver_name, self.config.solver_version)
    }

    /// Processes `cases` in order. A failing case becomes a ledger entry and never
    /// stops the batch.
    pub fn run(
        &mut self,
        cases: &[CaseSpec],
        ledger: &mut ResultLedger,
        solver: &mut dyn SolverRunner,
    ) -> BatchReport {
        let reports = cases
            .iter()
            .map(|case| self.process_case(case, ledger, solver))
            .collect::<Vec<_>>();
        let report = BatchReport::from_cases(reports);
        info!(
            "Batch finished: {} passed, {} failed, {} rejected",
            report.passed_count, report.failed_count, report.rejected_count
        );
        report
    }

    fn process_case(
        &mut self,
        case: &CaseSpec,
        ledger: &mut ResultLedger,
        solver: &mut dyn SolverRunner,
    ) -> CaseReport {
        let identity = case.identity.to_string();

        if self.config.skip_passed && ledger.is_passed(&case.identity) {
            info!("{}: already passed", identity);
            return recorded_pass(identity, ledger, &case.identity);
        }

        let mut result = CaseResult::pending(case.identity.clone(), &case.cs_version, (self.clock)());

        match read_case_marker(&case.working_dir) {
            Ok(Some(marker)) => {
                info!("{}: {} (marker file)", identity, marker.outcome);
                // A recorded pass already holds the WRMS list and the date it was computed.
                if marker.outcome == CaseOutcome::Passed && ledger.is_passed(&case.identity) {
                    return recorded_pass(identity, ledger, &case.identity);
                }
                result.conclude(marker.outcome, marker.note, marker.modified);
                ledger.record(result.clone());
                return CaseReport {
                    case: identity,
                    outcome: result.outcome,
                    skipped: true,
                    note: result.note,
                    comparison: None,
                };
            }
            Ok(None) => {}
            Err(error) => warn!("{}: ignoring unreadable marker: {}", identity, error),
        }

        let (outcome, note, comparison) = match self.evaluate(case, solver) {
            Ok(evaluation) => self.conclude_comparison(case, &identity, evaluation),
            Err(CaseFailure { outcome, error }) => {
                info!("{}: {} ({})", identity, outcome, error);
                (outcome, error.to_string(), None)
            }
        };

        result.conclude(outcome, note, (self.clock)());
        ledger.record(result.clone());
        CaseReport {
            case: identity,
            outcome,
            skipped: false,
            note: result.note,
            comparison,
        }
    }

    fn evaluate(
        &mut self,
        case: &CaseSpec,
        solver: &mut dyn SolverRunner,
    ) -> Result<Evaluation, CaseFailure> {
        let prefix = self.config.instance_prefix.as_deref();

        let generator =
            ProjectGenerator::setup(&case.case_base, prefix).map_err(CaseFailure::rejected)?;
        if !generator
            .generate(&case.working_dir, case.fmi_version)
            .map_err(CaseFailure::rejected)?
        {
            debug!("Project for {} exists already", case.identity);
        }

        info!("{}: running", case.identity);
        let output_path = solver
            .run(case, &generator.project_path(&case.working_dir))
            .map_err(CaseFailure::failed)?;

        let output = self.load_output(&output_path).map_err(CaseFailure::failed)?;
        let synonyms = self
            .load_synonyms(&output_path, &case.case_base)
            .map_err(CaseFailure::failed)?;

        let reference = generator.reference();
        let comparison = self
            .engine
            .compare(reference.series(), output.series(), &synonyms);

        Ok(Evaluation {
            comparison,
            output,
            synonyms,
            reference_captions: reference.captions().to_vec(),
        })
    }

    fn conclude_comparison(
        &self,
        case: &CaseSpec,
        identity: &str,
        evaluation: Evaluation,
    ) -> (CaseOutcome, String, Option<CaseComparison>) {
        let comparison = evaluation.comparison;
        let Some(reason) = comparison.failure_reason() else {
            info!("{}: passed", identity);
            let export_path = case
                .working_dir
                .join(format!("{}_out.csv", case.model_name()));
            let readme = comparison
                .notes()
                .split(';')
                .collect::<Vec<_>>()
                .join("\n");
            let artifacts = evaluation
                .output
                .write(&export_path, &evaluation.reference_captions, &evaluation.synonyms)
                .and_then(|()| {
                    write_case_marker(
                        &case.working_dir,
                        CaseOutcome::Passed,
                        &readme,
                        &self.solver_label(),
                    )
                    .map_err(XcheckError::from)
                });
            // The comparison stays in the report even when its artifacts cannot be written.
            if let Err(error) = artifacts {
                warn!("{}: {}", identity, error);
                let note = format!("{}: {}", error, comparison.notes());
                return (CaseOutcome::Failed, note, Some(comparison));
            }
            return (CaseOutcome::Passed, comparison.notes(), Some(comparison));
        };

        if let Some(error) = comparison.resolution_error() {
            info!("{}: {}", identity, error);
        }
        info!("{}: failed ({})", identity, reason);
        let note = format!("{}: {}", reason, comparison.notes());
        (CaseOutcome::Failed, note, Some(comparison))
    }

    fn load_output(&mut self, path: &Path) -> XcheckResult<TimeSeriesFile> {
        let structured = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("d6o"));
        if structured {
            let file = StructuredResultFile::read(path, &mut self.geometry)?;
            return Ok(TimeSeriesFile::from_series(file.to_time_series()?, path));
        }
        TimeSeriesFile::read(path, self.config.instance_prefix.as_deref())
    }

    /// The synonym file is looked up beside the output, then beside the FMU.
    fn load_synonyms(&self, output_path: &Path, case_base: &Path) -> XcheckResult<SynonymTable> {
        let candidate = [output_path.parent(), case_base.parent()]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(&self.config.synonym_file_name))
            .find(|path| path.is_file());
        match candidate {
            Some(path) => {
                debug!("Using synonyms from {}", path.display());
                SynonymTable::read(path, self.config.synonym_columns)
            }
            None => Ok(SynonymTable::default()),
        }
    }
}

fn recorded_pass(case: String, ledger: &ResultLedger, identity: &CaseIdentity) -> CaseReport {
    let note = ledger
        .get(identity)
        .map(|previous| previous.note.clone())
        .unwrap_or_default();
    CaseReport {
        case,
        outcome: CaseOutcome::Passed,
        skipped: true,
        note,
        comparison: None,
    }
}

struct Evaluation {
    comparison: CaseComparison,
    output: TimeSeriesFile,
    synonyms: SynonymTable,
    reference_captions: Vec<String>,
}

struct CaseFailure {
    outcome: CaseOutcome,
    error: XcheckError,
}

impl CaseFailure {
    fn rejected(error: XcheckError) -> Self {
        Self {
            outcome: CaseOutcome::Rejected,
            error,
        }
    }

    fn failed(error: XcheckError) -> Self {
        Self {
            outcome: CaseOutcome::Failed,
            error,
        }
    }
}

/// JSON list of cases handed over by an external case enumerator.
///
/// Relative paths are resolved against the manifest's directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseManifest {
    #[serde(default)]
    pub cases: Vec<ManifestCase>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCase {
    pub case_path: String,
    pub platform: String,
    pub tool: String,
    pub case_base: PathBuf,
    pub working_dir: PathBuf,
    pub cs_version: String,
    pub fmi_version: FmiVersion,
}

impl CaseManifest {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Vec<CaseSpec>, ManifestError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Self =
            serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(manifest.into_cases(root))
    }

    pub fn into_cases(self, root: &Path) -> Vec<CaseSpec> {
        self.cases
            .into_iter()
            .map(|case| CaseSpec {
                identity: CaseIdentity::new(case.case_path, case.platform, case.tool),
                case_base: root.join(case.case_base),
                working_dir: root.join(case.working_dir),
                cs_version: case.cs_version,
                fmi_version: case.fmi_version,
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse manifest '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ManifestError> for XcheckError {
    fn from(error: ManifestError) -> Self {
        let message = error.to_string();
        match error {
            ManifestError::Read { .. } => XcheckError::config("CONFIG.MANIFEST_READ", message),
            ManifestError::Parse { .. } => XcheckError::config("CONFIG.MANIFEST_PARSE", message),
        }
    }
}
