//! Solver project synthesis from a case's option, reference and input files.
//!
//! A case is addressed by its base path (`/fmus/2.0/cs/.../BouncingBall`); the
//! FMU and auxiliary files are found by suffix.

use super::timeseries::TimeSeriesFile;
use crate::domain::{XcheckError, XcheckResult};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const OPTION_KEYWORDS: [&str; 4] = ["StartTime", "StopTime", "StepSize", "RelTol"];

const DEFAULT_OUTPUT_INTERVAL: f64 = 0.001;
const FALLBACK_STEP_LIMIT: f64 = 0.001;
const OUTPUT_INTERVAL_TOLERANCE: f64 = 1.0e-8;

const FIXED_STEP_TEMPLATE: &str = "
tStart               ${StartTime} s
tEnd                 ${StopTime} s
hMax                 30 min
hMin                 1e-6 s
hFallBackLimit       0.001 s
hStart               ${StepSize} s
hOutputMin           ${OutputInterval} s
binaryOutputFiles    no
adjustStepSize       no
absTol               1e-06
relTol               ${RelTol}
MasterMode           GAUSS_JACOBI
ErrorControlMode     NONE
maxIterations        1

${FMU-Definition}
";

const ADAPTIVE_STEP_TEMPLATE: &str = "
tStart               ${StartTime} s
tEnd                 ${StopTime} s
hMax                 30 min
hMin                 1e-6 s
hFallBackLimit       ${FallBackLimit} s
hStart               ${StepSize} s
hOutputMin           ${OutputInterval} s
binaryOutputFiles    no
adjustStepSize       yes
absTol               0
relTol               ${RelTol}
MasterMode           GAUSS_JACOBI
ErrorControlMode     NONE
maxIterations        1

${FMU-Definition}
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum FmiVersion {
    #[serde(rename = "1.0", alias = "1")]
    V1,
    #[serde(rename = "2.0", alias = "2")]
    V2,
}

impl FmiVersion {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1.0",
            Self::V2 => "2.0",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    pub start_time: f64,
    pub stop_time: f64,
    pub step_size: f64,
    pub rel_tol: f64,
    /// Keywords beyond the required four.
    pub extra: BTreeMap<String, f64>,
}

impl SimulationOptions {
    pub fn read(path: impl AsRef<Path>) -> XcheckResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            XcheckError::config(
                "CONFIG.OPTIONS_MISSING",
                format!("opt-file '{}' expected: {}", path.display(), source),
            )
        })?;
        Self::parse_str(&source, &path.display().to_string())
    }

    /// Parses `Keyword, value` lines. Lines without exactly two comma-separated
    /// tokens are ignored.
    pub fn parse_str(source: &str, origin: &str) -> XcheckResult<Self> {
        let mut values = BTreeMap::new();
        for line in source.lines() {
            let tokens = line.split(',').collect::<Vec<_>>();
            let [keyword, value] = tokens.as_slice() else {
                continue;
            };
            let keyword = keyword.trim();
            let value = value.trim().parse::<f64>().map_err(|_| {
                XcheckError::config(
                    "CONFIG.OPTION_VALUE",
                    format!("{}: invalid value '{}' for '{}'", origin, value.trim(), keyword),
                )
            })?;
            values.insert(keyword.to_string(), value);
        }

        let mut take = |keyword: &str| {
            values.remove(keyword).ok_or_else(|| {
                XcheckError::config(
                    "CONFIG.OPTION_MISSING",
                    format!("{}: missing '{}' in opt file", origin, keyword),
                )
            })
        };
        let [start_key, stop_key, step_key, rel_tol_key] = OPTION_KEYWORDS;
        let start_time = take(start_key)?;
        let stop_time = take(stop_key)?;
        let step_size = take(step_key)?;
        let rel_tol = take(rel_tol_key)?;

        if start_time >= stop_time {
            return Err(XcheckError::config(
                "CONFIG.OPTION_RANGE",
                format!(
                    "{}: invalid 'StartTime' or 'StopTime' parameter ({} >= {})",
                    origin, start_time, stop_time
                ),
            ));
        }
        if step_size < 0.0 {
            return Err(XcheckError::config(
                "CONFIG.OPTION_RANGE",
                format!("{}: invalid 'StepSize' parameter {}", origin, step_size),
            ));
        }

        Ok(Self {
            start_time,
            stop_time,
            step_size,
            rel_tol,
            extra: values,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProjectGenerator {
    case_base: PathBuf,
    fmu_path: PathBuf,
    options: SimulationOptions,
    reference: TimeSeriesFile,
    input_variables: Vec<String>,
}

impl ProjectGenerator {
    /// Reads `<base>.fmu` (existence only), `<base>_ref.opt`, `<base>_ref.csv`
    /// and the optional `<base>_in.csv`.
    pub fn setup(case_base: impl AsRef<Path>, instance_prefix: Option<&str>) -> XcheckResult<Self> {
        let case_base = case_base.as_ref().to_path_buf();

        let fmu_path = with_suffix(&case_base, ".fmu");
        if !fmu_path.is_file() {
            return Err(XcheckError::config(
                "CONFIG.FMU_MISSING",
                format!("fmu-file '{}' not found", fmu_path.display()),
            ));
        }

        let options = SimulationOptions::read(with_suffix(&case_base, "_ref.opt"))?;

        let reference_path = with_suffix(&case_base, "_ref.csv");
        if !reference_path.is_file() {
            return Err(XcheckError::config(
                "CONFIG.REFERENCE_MISSING",
                format!("reference result file '{}' expected", reference_path.display()),
            ));
        }
        let reference = TimeSeriesFile::read(&reference_path, instance_prefix)?;

        let input_path = with_suffix(&case_base, "_in.csv");
        let input_variables = if input_path.is_file() {
            read_input_captions(&input_path)?
        } else {
            Vec::new()
        };

        debug!(
            "Set up {} ({} reference samples, {} inputs)",
            case_base.display(),
            reference.series().sample_count(),
            input_variables.len()
        );

        Ok(Self {
            case_base,
            fmu_path,
            options,
            reference,
            input_variables,
        })
    }

    pub fn case_base(&self) -> &Path {
        &self.case_base
    }

    pub fn fmu_path(&self) -> &Path {
        &self.fmu_path
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    pub fn reference(&self) -> &TimeSeriesFile {
        &self.reference
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn model_name(&self) -> String {
        self.case_base
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Smallest spacing of the reference time grid.
    pub fn output_interval(&self) -> Option<f64> {
        minimum_output_interval(self.reference.series().time())
    }

    pub fn project_path(&self, target_dir: impl AsRef<Path>) -> PathBuf {
        target_dir
            .as_ref()
            .join(format!("{}.msim", self.model_name()))
    }

    pub fn render(&self, target_dir: impl AsRef<Path>, fmi_version: FmiVersion) -> XcheckResult<String> {
        let template = match fmi_version {
            FmiVersion::V1 => FIXED_STEP_TEMPLATE,
            FmiVersion::V2 => ADAPTIVE_STEP_TEMPLATE,
        };
        let fmu_relative = relative_path(target_dir.as_ref(), &self.fmu_path)?;
        let simulator_line = format!("simulator 0 0 slave1 #ffff8c00 \"{}\"", fmu_relative);

        let substitutions = [
            ("${StartTime}", format_option(self.options.start_time)),
            ("${StopTime}", format_option(self.options.stop_time)),
            ("${StepSize}", format_option(self.options.step_size)),
            ("${RelTol}", format_option(self.options.rel_tol)),
            (
                "${OutputInterval}",
                format_option(self.output_interval().unwrap_or(DEFAULT_OUTPUT_INTERVAL)),
            ),
            ("${FallBackLimit}", format_option(FALLBACK_STEP_LIMIT)),
            ("${FMU-Definition}", simulator_line),
        ];
        Ok(substitutions
            .iter()
            .fold(template.to_string(), |content, (placeholder, value)| {
                content.replace(placeholder, value)
            }))
    }

    /// Writes `<target_dir>/<model>.msim`. Returns `false` without touching the
    /// file when it already exists.
    pub fn generate(&self, target_dir: impl AsRef<Path>, fmi_version: FmiVersion) -> XcheckResult<bool> {
        let target_dir = target_dir.as_ref();
        if target_dir.is_file() {
            return Err(XcheckError::config(
                "CONFIG.TARGET_DIR",
                format!("target directory '{}' exists already as file", target_dir.display()),
            ));
        }

        let project_path = self.project_path(target_dir);
        if project_path.exists() {
            debug!("Project {} exists, skipping", project_path.display());
            return Ok(false);
        }

        fs::create_dir_all(target_dir).map_err(|source| {
            XcheckError::config(
                "CONFIG.PROJECT_WRITE",
                format!("failed to create '{}': {}", target_dir.display(), source),
            )
        })?;
        let content = self.render(target_dir, fmi_version)?;
        fs::write(&project_path, content).map_err(|source| {
            XcheckError::config(
                "CONFIG.PROJECT_WRITE",
                format!("failed to write '{}': {}", project_path.display(), source),
            )
        })?;
        Ok(true)
    }
}

pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(base.as_os_str());
    raw.push(suffix);
    PathBuf::from(raw)
}

/// `to` expressed relative to the directory `from`, with `/` separators.
pub fn relative_path(from: &Path, to: &Path) -> XcheckResult<String> {
    let absolute = |path: &Path| {
        std::path::absolute(path).map_err(|source| {
            XcheckError::config(
                "CONFIG.PATH",
                format!("cannot resolve '{}': {}", path.display(), source),
            )
        })
    };
    let from = normalized_components(&absolute(from)?);
    let to = normalized_components(&absolute(to)?);

    let common = from
        .iter()
        .zip(&to)
        .take_while(|(left, right)| left == right)
        .count();
    let parts = std::iter::repeat_n("..".to_string(), from.len() - common)
        .chain(to[common..].iter().cloned())
        .collect::<Vec<_>>();

    Ok(if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    })
}

fn normalized_components(path: &Path) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    parts
}

fn minimum_output_interval(time: &[f64]) -> Option<f64> {
    let mut interval: Option<f64> = None;
    for step in time.windows(2).map(|pair| pair[1] - pair[0]) {
        if step <= 0.0 {
            continue;
        }
        interval = match interval {
            Some(current) if (step - current).abs() > OUTPUT_INTERVAL_TOLERANCE => {
                Some(current.min(step))
            }
            Some(current) => Some(current),
            None => Some(step),
        };
    }
    interval
}

fn read_input_captions(path: &Path) -> XcheckResult<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|source| {
            XcheckError::parse(
                "PARSE.INPUT_CAPTIONS",
                format!("failed to read '{}': {}", path.display(), source),
            )
        })?;
    let headers = reader.headers().map_err(|source| {
        XcheckError::parse(
            "PARSE.INPUT_CAPTIONS",
            format!("failed to read captions of '{}': {}", path.display(), source),
        )
    })?;
    Ok(headers.iter().map(|caption| caption.trim().to_string()).collect())
}

// Matches the way the option file spelled whole numbers (`0.0`, `10.0`).
fn format_option(value: f64) -> String {
    format!("{:?}", value)
}
