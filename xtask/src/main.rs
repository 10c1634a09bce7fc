mod quantize;
mod show;
mod utils;

#[macro_use]
extern crate clap;
use clap::Parser;
use fp8_quants::QuantizeError;
use std::{fmt, io, process::ExitCode};

fn main() -> ExitCode {
    use Commands::*;
    let result = match Cli::parse().command {
        Quantize(args) => args.quantize().map(|_| ()),
        Show(args) => args.show(),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{ERR}{e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Parser)]
#[clap(name = "fp8-utils")]
#[clap(version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quantize a raw row-major tensor into FP8
    Quantize(quantize::QuantizeArgs),
    /// Summarize a quantized file token by token
    Show(show::ShowArgs),
}

const YES: &str = "✔️  ";
const ERR: &str = "❌  ";

#[derive(Args, Default)]
struct LogArgs {
    /// Log level, may be "off", "trace", "debug", "info", "warn" or "error"
    #[clap(long)]
    log: Option<String>,
}

impl LogArgs {
    fn init(self) {
        use log::LevelFilter;
        use simple_logger::SimpleLogger;
        use time::UtcOffset;

        let level = self
            .log
            .as_deref()
            .and_then(|level| match level.to_lowercase().as_str() {
                "off" | "none" => Some(LevelFilter::Off),
                "trace" | "all" => Some(LevelFilter::Trace),
                "debug" => Some(LevelFilter::Debug),
                "info" => Some(LevelFilter::Info),
                "warn" => Some(LevelFilter::Warn),
                "error" => Some(LevelFilter::Error),
                _ => None,
            })
            .unwrap_or(LevelFilter::Warn);

        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        // a second subcommand run in the same process keeps the first logger
        let _ = SimpleLogger::new()
            .with_level(level)
            .with_utc_offset(offset)
            .init();
    }
}

#[derive(Debug)]
pub(crate) enum XtaskError {
    Io(io::Error),
    Quantize(QuantizeError),
    Args(String),
}

impl From<io::Error> for XtaskError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<QuantizeError> for XtaskError {
    fn from(e: QuantizeError) -> Self {
        Self::Quantize(e)
    }
}

impl fmt::Display for XtaskError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Quantize(e) => write!(f, "quantize error: {e}"),
            Self::Args(msg) => write!(f, "{msg}"),
        }
    }
}

macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::XtaskError::Args(format!($($arg)*)))
    };
}
pub(crate) use bail;
