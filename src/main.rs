//! Times repeated tokenize → validate → parse runs over one file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info};

use json_reader::{JsonError, JsonReader};

/// Benchmark the batched JSON reader on one document.
#[derive(Debug, Parser)]
#[command(name = "json_reader", version)]
struct Cli {
    /// JSON document to read.
    path: PathBuf,

    /// How many times to read the document.
    #[arg(long, short = 'n', default_value_t = 10)]
    iterations: u32,

    /// Fixed batch size in bytes; the size-based policy applies when absent.
    #[arg(long, short = 'b', allow_negative_numbers = true)]
    batch_size: Option<i64>,
}

fn run(path: &Path, iterations: u32, batch_size: Option<i64>) -> Result<(), JsonError> {
    let mut reader = JsonReader::new();
    if let Some(size) = batch_size {
        reader.set_batch_size(size)?;
    }

    let mut total = Duration::ZERO;
    for _ in 0..iterations {
        let start = Instant::now();
        let mut tokens = reader.tokenize(File::open(path)?)?;
        let value = reader.parse(&mut tokens)?;
        total += start.elapsed();
        log::debug!("{} top-level keys", value.as_object().map_or(0, |m| m.len()));
    }

    info!(
        "total time for {iterations} iterations of {}: {} ms",
        path.display(),
        total.as_millis()
    );
    info!(
        "average time per iteration: {} ms",
        total.as_millis() / u128::from(iterations.max(1))
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli.path, cli.iterations, cli.batch_size) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
