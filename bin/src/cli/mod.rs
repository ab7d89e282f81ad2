use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simplelog::{CombinedLogger, LevelFilter, SharedLogger, WriteLogger};

mod extract;
mod fields;
mod text;

/// Extracts registry fields from EGRN extract PDFs.
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Logging level for messages written to stderr.
    #[arg(long, default_value = "Warn")]
    log_level: LevelFilter,

    /// Also write log messages to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Logging level for messages written to --log-file.
    #[arg(long, default_value = "Debug")]
    log_file_level: LevelFilter,
}

#[derive(Subcommand)]
enum Command {
    Extract(extract::Command),
    Text(text::Command),
    Fields(fields::Command),
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(&args).with_context(|| "configuring logging")?;

    use Command::*;
    match &args.command {
        Extract(cmd) => extract::run(cmd),
        Text(cmd) => text::run(cmd),
        Fields(cmd) => fields::run(cmd),
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let config = simplelog::Config::default();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(WriteLogger::new(
        args.log_level,
        config.clone(),
        std::io::stderr(),
    ));
    if let Some(log_file) = &args.log_file {
        let file = File::create(log_file)
            .with_context(|| format!("creating log file {:?}", log_file))?;
        loggers.push(WriteLogger::new(args.log_file_level, config, file));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}
