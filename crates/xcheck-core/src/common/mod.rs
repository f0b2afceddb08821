pub mod config;
pub mod constants;

pub use config::{ComparisonTolerance, ConfigLoadError, SynonymColumns, XcheckConfig};
