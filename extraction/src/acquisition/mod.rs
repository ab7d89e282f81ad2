//! Text acquisition from a PDF through a chain of increasingly expensive strategies.
//!
//! The chain first reads structured page text (with table cells for near-empty pages), then
//! plain page text, and finally, only when the caller permits it, OCR of rendered pages. The
//! first strategy whose text reaches the quality threshold ends the chain.

#[cfg(any(test, feature = "testing"))]
pub mod fakes;
pub mod ocr;
pub mod pdfium;
pub mod plaintext;
pub mod tabula;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::{pipeline::FailureReason, settings::Settings, table::Table};

/// Rendered page, as handed to an [OcrEngine].
pub type PageImage = image::RgbImage;

/// A PDF opened by a [StructuredReader]. Resources are released when it is dropped.
pub trait StructuredDocument {
    fn page_count(&self) -> usize;

    /// Text of the page at zero-based `index`.
    fn page_text(&self, index: usize) -> Result<String>;

    /// Tables found on the page at zero-based `index`.
    fn page_tables(&self, index: usize) -> Result<Vec<Table>>;
}

/// Layout-aware reader of page text and page tables.
pub trait StructuredReader: Send + Sync {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn StructuredDocument + 'a>>;
}

/// Simplest reader of page text.
pub trait PlainReader: Send + Sync {
    /// Text of every page, in page order.
    fn page_texts(&self, path: &Path) -> Result<Vec<String>>;

    /// Number of pages, without reading their text.
    fn page_count(&self, path: &Path) -> Result<usize>;
}

/// Renders the pages of a PDF to images.
pub trait Rasterizer: Send + Sync {
    /// Renders each page in order, passing it to `on_page` with its zero-based index before the
    /// next page is rendered. Stops at the first error from `on_page`.
    fn render_pages(
        &self,
        path: &Path,
        dpi: u32,
        on_page: &mut dyn FnMut(usize, PageImage) -> Result<()>,
    ) -> Result<()>;
}

/// Recognises text in an image.
pub trait OcrEngine: Send + Sync {
    /// Recognises using all of `languages` at once.
    fn recognize(&self, image: &PageImage, languages: &[String]) -> Result<String>;
}

/// Backends available to the acquisition strategies. A strategy whose backends are absent is
/// skipped.
#[derive(Default)]
pub struct Backends {
    pub structured: Option<Box<dyn StructuredReader>>,
    pub plain: Option<Box<dyn PlainReader>>,
    pub rasterizer: Option<Box<dyn Rasterizer>>,
    pub ocr: Option<Box<dyn OcrEngine>>,
}

impl Backends {
    /// Resolves the backends available in this environment. Called once at startup.
    pub fn probe(
        pdfium: Option<pdfium::PdfiumClient>,
        tables: Option<tabula::TabulaClient>,
    ) -> Self {
        if tables.is_none() {
            log::info!("Tabula is not available; tables will not be read from near-empty pages.");
        }
        let backends = Self {
            structured: pdfium.clone().map(|client| {
                Box::new(pdfium::PdfiumStructuredReader::new(client, tables))
                    as Box<dyn StructuredReader>
            }),
            plain: Some(Box::new(plaintext::LopdfReader)),
            rasterizer: pdfium.map(|client| Box::new(client) as Box<dyn Rasterizer>),
            ocr: ocr::TesseractOcr::probe().map(|ocr| Box::new(ocr) as Box<dyn OcrEngine>),
        };
        log::info!("Acquisition backends: {}.", backends.describe());
        backends
    }

    /// Lists which strategies can run.
    pub fn describe(&self) -> String {
        [
            (Strategy::Structured, self.structured.is_some()),
            (Strategy::Plain, self.plain.is_some()),
            (
                Strategy::Ocr,
                self.rasterizer.is_some() && self.ocr.is_some(),
            ),
        ]
        .into_iter()
        .map(|(strategy, available)| {
            format!(
                "{} {}",
                strategy,
                if available { "available" } else { "unavailable" }
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Number of pages in the document, if it passes [preflight] and a reader can open it.
    pub fn page_count(&self, path: &Path, settings: &Settings) -> Option<usize> {
        if let Err(err) = preflight(path, settings) {
            log::debug!("Not counting pages: {}", err);
            return None;
        }
        if let Some(structured) = &self.structured {
            if let Ok(document) = structured.open(path) {
                return Some(document.page_count());
            }
        }
        self.plain
            .as_ref()
            .and_then(|plain| plain.page_count(path).ok())
    }
}

/// An acquisition strategy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum Strategy {
    #[strum(to_string = "structured text")]
    Structured,
    #[strum(to_string = "plain text")]
    Plain,
    #[strum(to_string = "OCR")]
    Ocr,
}

/// Result of a single strategy attempt.
#[derive(Debug)]
pub enum AcquisitionOutcome {
    Text { content: String, char_count: usize },
    Failed(StrategyFailure),
}

impl AcquisitionOutcome {
    fn from_text(content: String) -> Self {
        let char_count = count_chars(&content);
        AcquisitionOutcome::Text {
            content,
            char_count,
        }
    }
}

/// Why a strategy produced no text.
#[derive(Debug)]
pub enum StrategyFailure {
    /// The strategy's backends are not available.
    Unavailable,
    Error(anyhow::Error),
}

/// Number of characters in `text`, disregarding leading and trailing whitespace.
pub fn count_chars(text: &str) -> usize {
    text.trim().chars().count()
}

/// Text accepted by the chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AcquiredText {
    pub content: String,
    pub char_count: usize,
    pub strategy: Strategy,
}

/// Problem found by the checks that run before any strategy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum InputProblem {
    #[strum(to_string = "file does not exist")]
    Missing,
    #[strum(to_string = "not a regular file")]
    NotAFile,
    #[strum(to_string = "file extension is not allowed")]
    Extension,
    #[strum(to_string = "file is empty")]
    Empty,
    #[strum(to_string = "file exceeds the maximum size")]
    TooLarge,
}

/// Failure to acquire text from a document.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("invalid input {path:?}: {problem}")]
    InvalidInput { path: PathBuf, problem: InputProblem },
    #[error("unreadable file: {0:#}")]
    UnreadableFile(anyhow::Error),
    #[error("insufficient text (best attempt had {best_chars} characters)")]
    InsufficientText { best_chars: usize },
}

impl AcquireError {
    pub fn reason(&self) -> FailureReason {
        match self {
            AcquireError::InvalidInput { .. } => FailureReason::InvalidInput,
            AcquireError::UnreadableFile(_) => FailureReason::UnreadableFile,
            AcquireError::InsufficientText { .. } => FailureReason::InsufficientText,
        }
    }
}

/// Checks that `path` is acceptable input before any strategy runs.
pub fn preflight(path: &Path, settings: &Settings) -> Result<(), AcquireError> {
    let invalid = |problem| AcquireError::InvalidInput {
        path: path.to_path_buf(),
        problem,
    };

    let metadata = std::fs::metadata(path).map_err(|_| invalid(InputProblem::Missing))?;
    if !metadata.is_file() {
        return Err(invalid(InputProblem::NotAFile));
    }
    if !settings.extension_allowed(path) {
        return Err(invalid(InputProblem::Extension));
    }
    if metadata.len() == 0 {
        return Err(invalid(InputProblem::Empty));
    }
    if metadata.len() > settings.max_file_size_bytes() {
        return Err(invalid(InputProblem::TooLarge));
    }
    Ok(())
}

/// State of an [AcquisitionChain].
#[derive(Debug)]
pub enum ChainState {
    NotStarted,
    TryingStructured,
    TryingPlain,
    TryingOcr,
    Done(AcquiredText),
    Exhausted(AcquireError),
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChainState::Done(_) | ChainState::Exhausted(_))
    }
}

/// Drives a single document through the acquisition strategies.
pub struct AcquisitionChain<'a> {
    backends: &'a Backends,
    settings: &'a Settings,
    path: &'a Path,
    allow_ocr: bool,
    state: ChainState,
    /// Longest under-threshold text seen so far.
    best_chars: Option<usize>,
    errors: Vec<(Strategy, anyhow::Error)>,
}

impl<'a> AcquisitionChain<'a> {
    pub fn new(
        backends: &'a Backends,
        settings: &'a Settings,
        path: &'a Path,
        allow_ocr: bool,
    ) -> Self {
        Self {
            backends,
            settings,
            path,
            allow_ocr,
            state: ChainState::NotStarted,
            best_chars: None,
            errors: Vec::new(),
        }
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Runs the chain to completion.
    pub fn run(mut self) -> Result<AcquiredText, AcquireError> {
        loop {
            match std::mem::replace(&mut self.state, ChainState::NotStarted) {
                ChainState::Done(text) => return Ok(text),
                ChainState::Exhausted(err) => return Err(err),
                state => {
                    self.state = state;
                    self.step();
                }
            }
        }
    }

    /// Advances the chain by one state. Does nothing in a terminal state.
    pub fn step(&mut self) {
        let state = std::mem::replace(&mut self.state, ChainState::NotStarted);
        self.state = match state {
            ChainState::NotStarted => match preflight(self.path, self.settings) {
                Ok(()) => ChainState::TryingStructured,
                Err(err) => ChainState::Exhausted(err),
            },
            ChainState::TryingStructured => {
                let outcome = self.try_structured();
                self.after_threshold_attempt(
                    Strategy::Structured,
                    outcome,
                    Some(ChainState::TryingPlain),
                )
            }
            ChainState::TryingPlain => {
                let outcome = self.try_plain();
                let next = self.allow_ocr.then_some(ChainState::TryingOcr);
                self.after_threshold_attempt(Strategy::Plain, outcome, next)
            }
            ChainState::TryingOcr => {
                let outcome = self.try_ocr();
                self.after_ocr(outcome)
            }
            terminal @ (ChainState::Done(_) | ChainState::Exhausted(_)) => terminal,
        };
    }

    /// Accepts text that reaches the quality threshold, otherwise moves on to `next`, or exhausts
    /// the chain if there is no next strategy.
    fn after_threshold_attempt(
        &mut self,
        strategy: Strategy,
        outcome: AcquisitionOutcome,
        next: Option<ChainState>,
    ) -> ChainState {
        match outcome {
            AcquisitionOutcome::Text {
                content,
                char_count,
            } if char_count >= self.settings.quality_threshold => {
                log::debug!(
                    "{:?}: {} accepted with {} characters.",
                    self.path,
                    strategy,
                    char_count
                );
                return ChainState::Done(AcquiredText {
                    content,
                    char_count,
                    strategy,
                });
            }
            AcquisitionOutcome::Text { char_count, .. } => {
                log::warn!(
                    "{:?}: {} gave only {} characters; possibly scanned or access-restricted.",
                    self.path,
                    strategy,
                    char_count
                );
                self.note_candidate(char_count);
            }
            AcquisitionOutcome::Failed(StrategyFailure::Unavailable) => {
                log::debug!("{:?}: {} unavailable, skipping.", self.path, strategy);
            }
            AcquisitionOutcome::Failed(StrategyFailure::Error(err)) => {
                log::warn!("{:?}: {} failed: {:#}", self.path, strategy, err);
                self.errors.push((strategy, err));
            }
        }

        next.unwrap_or_else(|| ChainState::Exhausted(self.exhausted_error()))
    }

    /// OCR text is accepted without the quality threshold, but text too short to count as any
    /// text at all exhausts the chain.
    fn after_ocr(&mut self, outcome: AcquisitionOutcome) -> ChainState {
        match outcome {
            AcquisitionOutcome::Text {
                content,
                char_count,
            } if char_count >= self.settings.min_acquired_chars => {
                log::debug!("{:?}: OCR gave {} characters.", self.path, char_count);
                ChainState::Done(AcquiredText {
                    content,
                    char_count,
                    strategy: Strategy::Ocr,
                })
            }
            AcquisitionOutcome::Text { char_count, .. } => {
                log::warn!("{:?}: OCR gave only {} characters.", self.path, char_count);
                self.note_candidate(char_count);
                ChainState::Exhausted(self.exhausted_error())
            }
            AcquisitionOutcome::Failed(StrategyFailure::Unavailable) => {
                log::warn!("{:?}: OCR requested but unavailable.", self.path);
                ChainState::Exhausted(self.exhausted_error())
            }
            AcquisitionOutcome::Failed(StrategyFailure::Error(err)) => {
                log::warn!("{:?}: OCR failed: {:#}", self.path, err);
                self.errors.push((Strategy::Ocr, err));
                ChainState::Exhausted(self.exhausted_error())
            }
        }
    }

    fn note_candidate(&mut self, char_count: usize) {
        self.best_chars = Some(self.best_chars.map_or(char_count, |best| best.max(char_count)));
    }

    /// A document is unreadable when no strategy produced any text; otherwise it just has too
    /// little text.
    fn exhausted_error(&mut self) -> AcquireError {
        match self.best_chars {
            Some(best_chars) => AcquireError::InsufficientText { best_chars },
            None => {
                let err = if self.errors.is_empty() {
                    anyhow!("no text acquisition backend is available")
                } else {
                    let (strategy, err) = self.errors.remove(0);
                    err.context(format!("{} failed", strategy))
                };
                AcquireError::UnreadableFile(err)
            }
        }
    }

    fn try_structured(&self) -> AcquisitionOutcome {
        let Some(reader) = &self.backends.structured else {
            return AcquisitionOutcome::Failed(StrategyFailure::Unavailable);
        };
        match read_structured(reader.as_ref(), self.path, self.settings.page_table_floor) {
            Ok(content) => AcquisitionOutcome::from_text(content),
            Err(err) => AcquisitionOutcome::Failed(StrategyFailure::Error(err)),
        }
    }

    fn try_plain(&self) -> AcquisitionOutcome {
        let Some(reader) = &self.backends.plain else {
            return AcquisitionOutcome::Failed(StrategyFailure::Unavailable);
        };
        match reader.page_texts(self.path) {
            Ok(pages) => AcquisitionOutcome::from_text(pages.join("\n")),
            Err(err) => AcquisitionOutcome::Failed(StrategyFailure::Error(err)),
        }
    }

    fn try_ocr(&self) -> AcquisitionOutcome {
        let (Some(rasterizer), Some(ocr)) = (&self.backends.rasterizer, &self.backends.ocr) else {
            return AcquisitionOutcome::Failed(StrategyFailure::Unavailable);
        };
        log::info!("{:?}: running OCR.", self.path);
        match read_ocr(
            rasterizer.as_ref(),
            ocr.as_ref(),
            self.path,
            self.settings.ocr_dpi,
            &self.settings.ocr_languages,
        ) {
            Ok(content) => AcquisitionOutcome::from_text(content),
            Err(err) => AcquisitionOutcome::Failed(StrategyFailure::Error(err)),
        }
    }
}

fn read_structured(
    reader: &dyn StructuredReader,
    path: &Path,
    page_table_floor: usize,
) -> Result<String> {
    let document = reader.open(path)?;
    let mut pages = Vec::with_capacity(document.page_count());
    for index in 0..document.page_count() {
        let mut page = document.page_text(index)?;
        if count_chars(&page) < page_table_floor {
            match document.page_tables(index) {
                Ok(tables) => {
                    for row in tables.iter().flat_map(Table::pipe_joined_rows) {
                        if !page.is_empty() {
                            page.push('\n');
                        }
                        page.push_str(&row);
                    }
                }
                Err(err) => log::warn!(
                    "{:?}: could not read tables on page {}: {:#}",
                    path,
                    index + 1,
                    err
                ),
            }
        }
        pages.push(page);
    }
    Ok(pages.join("\n"))
}

fn read_ocr(
    rasterizer: &dyn Rasterizer,
    ocr: &dyn OcrEngine,
    path: &Path,
    dpi: u32,
    languages: &[String],
) -> Result<String> {
    let mut pages = Vec::new();
    rasterizer.render_pages(path, dpi, &mut |index, image| {
        let text = ocr
            .recognize(&image, languages)
            .with_context(|| format!("recognising page {}", index + 1))?;
        pages.push(text);
        Ok(())
    })?;
    Ok(pages.join("\n"))
}
