mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use xcheck_core::domain::XcheckError;

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let error = error.as_xcheck_error();
            eprintln!("{}", error.diagnostic_line());
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("xcheck".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();

    match Cli::try_parse_from(&full_args) {
        Ok(cli) => {
            init_tracing(&cli.log_level);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "xcheck", about = "Co-simulation cross-check validation")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Validate pre-computed solver outputs for the cases of a manifest
    Validate(commands::ValidateArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Validate(args) => commands::run_validate_command(args),
    }
}

// Logs go to stderr so the summary on stdout stays machine-readable.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Validation(XcheckError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_xcheck_error(&self) -> XcheckError {
        match self {
            Self::Usage(message) => XcheckError::config("CONFIG.CLI_USAGE", message.trim_end()),
            Self::Validation(error) => error.clone(),
            Self::Internal(error) => XcheckError::ledger_io("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<XcheckError> for CliError {
    fn from(error: XcheckError) -> Self {
        Self::Validation(error)
    }
}
