use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::backends::{self, BackendArgs};

/// Prints the text acquired from a single PDF.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to input PDF.
    pdf: PathBuf,

    /// Fall back to OCR if the PDF has too little embedded text.
    #[arg(long)]
    ocr: bool,

    #[command(flatten)]
    backends: BackendArgs,
}

pub fn run(cmd: &Command) -> Result<()> {
    let settings = cmd.backends.load_settings()?;

    let text = backends::with_coordinator(&cmd.backends, settings, |coordinator| {
        coordinator
            .acquire(&cmd.pdf, cmd.ocr)
            .with_context(|| format!("reading text from {:?}", cmd.pdf))
    })?;

    log::info!(
        "Read {} characters from {:?} as {}.",
        text.char_count,
        cmd.pdf,
        text.strategy
    );
    println!("{}", text.content);
    Ok(())
}
