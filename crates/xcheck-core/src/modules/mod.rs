pub mod batch;
pub mod comparator;
pub mod ledger;
pub mod project;
pub mod structured;
pub mod synonyms;
pub mod timeseries;

pub use batch::{
    BatchReport, BatchRunner, CaseManifest, CaseReport, CaseSpec, PrecomputedOutputs,
    SolverRunner, render_human_summary,
};
pub use comparator::{CaseComparison, ComparisonEngine, VariableComparison, VariableStatus};
pub use ledger::{LedgerSummary, ResultLedger};
pub use project::{FmiVersion, ProjectGenerator, SimulationOptions};
pub use structured::{GeometryModel, GeometryStore, StructuredResultFile};
pub use synonyms::SynonymTable;
pub use timeseries::{TimeSeries, TimeSeriesFile};
