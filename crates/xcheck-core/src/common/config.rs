//! Run-wide configuration, loaded once per batch from a JSON file.
//!
//! Every field has a default, so an empty object (`{}`) is a valid configuration.

use super::constants::{DEFAULT_ABS_TOL_FLOOR, DEFAULT_ABS_TOL_SCALE, DEFAULT_REL_TOL};
use crate::domain::XcheckError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ComparisonTolerance {
    #[serde(rename = "relTol", default = "default_rel_tol")]
    pub rel_tol: f64,
    #[serde(rename = "absTolScale", default = "default_abs_tol_scale")]
    pub abs_tol_scale: f64,
    #[serde(rename = "absTolFloor", default = "default_abs_tol_floor")]
    pub abs_tol_floor: f64,
}

impl Default for ComparisonTolerance {
    fn default() -> Self {
        Self {
            rel_tol: DEFAULT_REL_TOL,
            abs_tol_scale: DEFAULT_ABS_TOL_SCALE,
            abs_tol_floor: DEFAULT_ABS_TOL_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SynonymColumns {
    pub canonical: usize,
    pub alternate: usize,
}

impl Default for SynonymColumns {
    fn default() -> Self {
        Self {
            canonical: 1,
            alternate: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XcheckConfig {
    pub tolerance: ComparisonTolerance,
    /// Simulator instance prefix stripped from namespaced captions (`slave1.h` -> `h`).
    pub instance_prefix: Option<String>,
    pub solver_name: String,
    pub solver_version: String,
    pub skip_passed: bool,
    pub synonym_file_name: String,
    pub synonym_columns: SynonymColumns,
}

impl Default for XcheckConfig {
    fn default() -> Self {
        Self {
            tolerance: ComparisonTolerance::default(),
            instance_prefix: Some("slave1".to_string()),
            solver_name: "MasterSim".to_string(),
            solver_version: "0.7.0".to_string(),
            skip_passed: true,
            synonym_file_name: "synonymous_variables.txt".to_string(),
            synonym_columns: SynonymColumns::default(),
        }
    }
}

impl XcheckConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|source| ConfigLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        let config: Self =
            serde_json::from_str(json).map_err(|source| ConfigLoadError::Parse {
                path: PathBuf::from("<inline-config>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        let tolerance = self.tolerance;
        if !(tolerance.rel_tol >= 0.0 && tolerance.abs_tol_scale >= 0.0) {
            return Err(ConfigLoadError::Invalid(format!(
                "tolerances must be non-negative (relTol={}, absTolScale={})",
                tolerance.rel_tol, tolerance.abs_tol_scale
            )));
        }
        if !(tolerance.abs_tol_floor > 0.0) {
            return Err(ConfigLoadError::Invalid(format!(
                "absTolFloor must be positive, got {}",
                tolerance.abs_tol_floor
            )));
        }
        if self.synonym_columns.canonical == self.synonym_columns.alternate {
            return Err(ConfigLoadError::Invalid(
                "synonym canonical and alternate columns must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigLoadError> for XcheckError {
    fn from(error: ConfigLoadError) -> Self {
        let message = error.to_string();
        match error {
            ConfigLoadError::Read { .. } => XcheckError::config("CONFIG.READ", message),
            ConfigLoadError::Parse { .. } => XcheckError::config("CONFIG.PARSE", message),
            ConfigLoadError::Invalid(_) => XcheckError::config("CONFIG.INVALID", message),
        }
    }
}

fn default_rel_tol() -> f64 {
    DEFAULT_REL_TOL
}

fn default_abs_tol_scale() -> f64 {
    DEFAULT_ABS_TOL_SCALE
}

fn default_abs_tol_floor() -> f64 {
    DEFAULT_ABS_TOL_FLOOR
}

#[cfg(test)]
mod tests {
    use super::{ConfigLoadError, XcheckConfig};
    use crate::domain::XcheckErrorCategory;
    use crate::domain::XcheckError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_object_yields_defaults() {
        let config = XcheckConfig::from_json("{}").expect("empty config should parse");
        assert_eq!(config, XcheckConfig::default());
        assert_eq!(config.tolerance.rel_tol, 1.0e-3);
        assert_eq!(config.instance_prefix.as_deref(), Some("slave1"));
        assert_eq!(config.synonym_columns.canonical, 1);
        assert_eq!(config.synonym_columns.alternate, 2);
    }

    #[test]
    fn partial_tolerance_keeps_remaining_defaults() {
        let config = XcheckConfig::from_json(
            r#"
            {
              "tolerance": { "relTol": 1e-4 },
              "instancePrefix": null,
              "skipPassed": false
            }
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.tolerance.rel_tol, 1.0e-4);
        assert_eq!(config.tolerance.abs_tol_scale, 1.0e-3);
        assert_eq!(config.instance_prefix, None);
        assert!(!config.skip_passed);
    }

    #[test]
    fn loads_configuration_from_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("xcheck.json");
        fs::write(&path, r#"{ "solverVersion": "0.8.1" }"#).expect("config should be written");

        let config = XcheckConfig::from_path(&path).expect("config should load");
        assert_eq!(config.solver_version, "0.8.1");
    }

    #[test]
    fn rejects_non_positive_absolute_floor() {
        let result = XcheckConfig::from_json(r#"{ "tolerance": { "absTolFloor": 0.0 } }"#);
        assert!(matches!(result, Err(ConfigLoadError::Invalid(_))));
    }

    #[test]
    fn missing_file_maps_to_config_category() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = XcheckConfig::from_path(temp.path().join("missing.json"))
            .expect_err("missing config should fail");
        let error = XcheckError::from(error);
        assert_eq!(error.category(), XcheckErrorCategory::ConfigError);
        assert_eq!(error.placeholder(), "CONFIG.READ");
    }
}
