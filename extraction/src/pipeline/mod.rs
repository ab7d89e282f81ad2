//! Drives a single document through text acquisition and field extraction.

#[cfg(test)]
mod tests;

use std::path::Path;

use crate::{
    acquisition::{AcquireError, AcquiredText, AcquisitionChain, Backends},
    fields::{ExtractionRecord, FieldExtractor},
    patterns::PatternRegistry,
    settings::Settings,
};

/// Why a document produced no [ExtractionRecord].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum_macros::Display)]
pub enum FailureReason {
    InvalidInput,
    UnreadableFile,
    InsufficientText,
    EmptyOrUnreadable,
}

/// Failure to process a single document.
#[derive(Debug, thiserror::Error)]
pub enum ProcessFailure {
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error("acquired text is too short to extract fields from ({chars} characters)")]
    EmptyOrUnreadable { chars: usize },
}

impl ProcessFailure {
    pub fn reason(&self) -> FailureReason {
        match self {
            ProcessFailure::Acquire(err) => err.reason(),
            ProcessFailure::EmptyOrUnreadable { .. } => FailureReason::EmptyOrUnreadable,
        }
    }
}

/// Processes documents with a fixed set of backends, settings and pattern rules. Holds no
/// per-document state, so it may be shared between threads processing different documents.
pub struct Coordinator<'r> {
    backends: Backends,
    settings: Settings,
    extractor: FieldExtractor<'r>,
}

impl<'r> Coordinator<'r> {
    pub fn new(backends: Backends, settings: Settings, registry: &'r PatternRegistry) -> Self {
        Self {
            backends,
            settings,
            extractor: FieldExtractor::new(registry),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of pages in the document, if it passes the input checks and can be opened.
    pub fn page_count(&self, path: &Path) -> Option<usize> {
        self.backends.page_count(path, &self.settings)
    }

    /// Runs the acquisition chain once over the document.
    pub fn acquire(&self, path: &Path, allow_ocr: bool) -> Result<AcquiredText, AcquireError> {
        AcquisitionChain::new(&self.backends, &self.settings, path, allow_ocr).run()
    }

    /// Returns the document's text, or `None` (logging why) if no acceptable text was acquired.
    pub fn extract_text_from_pdf(&self, path: &Path, allow_ocr: bool) -> Option<String> {
        match self.acquire(path, allow_ocr) {
            Ok(text) => Some(text.content),
            Err(err) => {
                log::warn!("{:?}: {}: {}", path, err.reason(), err);
                None
            }
        }
    }

    pub fn extract_all_data(&self, text: &str) -> ExtractionRecord {
        self.extractor.extract_all(text)
    }

    /// Acquires the document's text and extracts its fields. OCR is used if the settings permit.
    pub fn process(&self, path: &Path) -> Result<ExtractionRecord, ProcessFailure> {
        let text = self.acquire(path, self.settings.allow_ocr)?;
        if text.char_count <= self.settings.extraction_floor {
            return Err(ProcessFailure::EmptyOrUnreadable {
                chars: text.char_count,
            });
        }

        let record = self.extract_all_data(&text.content);
        log::debug!(
            "{:?}: read by {}, cadastral number {:?}, address {:?}.",
            path,
            text.strategy,
            record.cadastral_number,
            record.address,
        );
        Ok(record)
    }
}
