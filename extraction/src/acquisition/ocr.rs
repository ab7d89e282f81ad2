//! Optical character recognition by the `tesseract` executable.

use std::{path::PathBuf, process::Command};

use anyhow::{Context, Result, bail};

use super::{OcrEngine, PageImage};

/// [OcrEngine] that runs `tesseract` once per page image.
#[derive(Clone, Debug)]
pub struct TesseractOcr {
    binary: PathBuf,
}

impl TesseractOcr {
    /// Locates `tesseract` on the `PATH`, returning `None` if it is not installed.
    pub fn probe() -> Option<Self> {
        match which::which("tesseract") {
            Ok(binary) => {
                log::debug!("Found tesseract at {:?}.", binary);
                Some(Self { binary })
            }
            Err(err) => {
                log::info!("OCR is unavailable: tesseract not found ({}).", err);
                None
            }
        }
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &PageImage, languages: &[String]) -> Result<String> {
        let image_file = tempfile::Builder::new()
            .prefix("egrn-page-")
            .suffix(".png")
            .tempfile()
            .context("creating temporary page image file")?;
        image
            .save_with_format(image_file.path(), image::ImageFormat::Png)
            .context("writing page image")?;

        let output = Command::new(&self.binary)
            .arg(image_file.path())
            .arg("stdout")
            .arg("-l")
            .arg(languages.join("+"))
            .output()
            .with_context(|| format!("running {:?}", self.binary))?;
        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
