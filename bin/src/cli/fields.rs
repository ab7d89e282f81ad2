use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Args;
use extraction::{ExtractionRecord, fields::FieldExtractor, patterns::PatternRegistry};

/// Prints the fields found in extract text as JSON.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to a text file, or "-" to read standard input.
    input: PathBuf,

    /// Path to a YAML pattern table to use instead of the builtin one.
    #[arg(long)]
    patterns: Option<PathBuf>,
}

pub fn run(cmd: &Command) -> Result<()> {
    let text = read_input(&cmd.input)?;

    let loaded_patterns = cmd
        .patterns
        .as_deref()
        .map(PatternRegistry::from_yaml_file)
        .transpose()?;
    let registry = loaded_patterns
        .as_ref()
        .unwrap_or_else(|| PatternRegistry::builtin());

    let record = FieldExtractor::new(registry).extract_all(&text);
    write_record(&mut std::io::stdout().lock(), &record)
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .with_context(|| "reading standard input")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {:?}", input))
    }
}

fn write_record(w: &mut impl Write, record: &ExtractionRecord) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, record)?;
    writeln!(w)?;
    Ok(())
}
