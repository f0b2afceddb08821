use super::CliError;
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;
use xcheck_core::common::XcheckConfig;
use xcheck_core::domain::XcheckError;
use xcheck_core::modules::ledger::ResultLedger;
use xcheck_core::modules::{BatchRunner, CaseManifest, PrecomputedOutputs, render_human_summary};

#[derive(clap::Args)]
pub(super) struct ValidateArgs {
    /// Case manifest (JSON) listing the cases to check
    #[arg(long)]
    manifest: PathBuf,

    /// Result ledger, merged with this run and rewritten afterwards
    #[arg(long, default_value = "results.tsv")]
    ledger: PathBuf,

    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the batch report as JSON instead of the summary
    #[arg(long)]
    json: bool,
}

pub(super) fn run_validate_command(args: ValidateArgs) -> Result<i32, CliError> {
    let config = match &args.config {
        Some(path) => XcheckConfig::from_path(path).map_err(XcheckError::from)?,
        None => XcheckConfig::default(),
    };
    let cases = CaseManifest::from_path(&args.manifest).map_err(XcheckError::from)?;
    let mut ledger = ResultLedger::load(&args.ledger).map_err(XcheckError::from)?;
    info!(
        "Validating {} cases against {} ledger entries",
        cases.len(),
        ledger.len()
    );

    let report = BatchRunner::new(config).run(&cases, &mut ledger, &mut PrecomputedOutputs);
    ledger.save(&args.ledger).map_err(XcheckError::from)?;
    let summary = ledger.summary();
    info!(
        "Ledger {}: {} passed, {} failed, {} rejected",
        args.ledger.display(),
        summary.passed,
        summary.failed + summary.pending,
        summary.rejected
    );

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to serialize batch report")?;
        println!("{}", rendered);
    } else {
        println!("{}", render_human_summary(&report));
        println!(
            "Ledger: {} ({} entries: {} passed, {} failed, {} rejected)",
            args.ledger.display(),
            summary.total(),
            summary.passed,
            summary.failed + summary.pending,
            summary.rejected
        );
    }

    if report.passed { Ok(0) } else { Ok(1) }
}
