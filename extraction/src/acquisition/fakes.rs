//! In-memory backends for tests. Each records how often it was called.

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow};

use super::{
    Backends, OcrEngine, PageImage, PlainReader, Rasterizer, StructuredDocument, StructuredReader,
};
use crate::table::Table;

/// A page served by [FakeStructuredReader].
#[derive(Clone, Debug, Default)]
pub struct FakePage {
    pub text: String,
    pub tables: Vec<Table>,
}

impl FakePage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tables: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeStructuredReader {
    pages: Vec<FakePage>,
    /// When set, opening a document fails with this message.
    open_error: Option<String>,
    pub opens: AtomicUsize,
    pub table_reads: AtomicUsize,
}

impl FakeStructuredReader {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            open_error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

impl StructuredReader for FakeStructuredReader {
    fn open<'a>(&'a self, _path: &Path) -> Result<Box<dyn StructuredDocument + 'a>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.open_error {
            return Err(anyhow!("{}", message));
        }
        Ok(Box::new(FakeStructuredDocument { reader: self }))
    }
}

struct FakeStructuredDocument<'a> {
    reader: &'a FakeStructuredReader,
}

impl FakeStructuredDocument<'_> {
    fn page(&self, index: usize) -> Result<&FakePage> {
        self.reader
            .pages
            .get(index)
            .ok_or_else(|| anyhow!("no page at index {}", index))
    }
}

impl StructuredDocument for FakeStructuredDocument<'_> {
    fn page_count(&self) -> usize {
        self.reader.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        Ok(self.page(index)?.text.clone())
    }

    fn page_tables(&self, index: usize) -> Result<Vec<Table>> {
        self.reader.table_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.page(index)?.tables.clone())
    }
}

#[derive(Debug)]
pub struct FakePlainReader {
    /// Page texts, or the error message to fail with.
    pages: std::result::Result<Vec<String>, String>,
    pub calls: AtomicUsize,
}

impl FakePlainReader {
    pub fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self {
            pages: Ok(pages.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            pages: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl PlainReader for FakePlainReader {
    fn page_texts(&self, _path: &Path) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages.clone().map_err(|message| anyhow!("{}", message))
    }

    fn page_count(&self, _path: &Path) -> Result<usize> {
        self.pages
            .as_ref()
            .map(Vec::len)
            .map_err(|message| anyhow!("{}", message))
    }
}

/// Renders the given number of blank pages.
#[derive(Debug, Default)]
pub struct FakeRasterizer {
    num_pages: usize,
    /// Resolution of each call.
    pub dpis: Mutex<Vec<u32>>,
    /// Pages rendered over all calls.
    pub rendered: AtomicUsize,
}

impl FakeRasterizer {
    pub fn new(num_pages: usize) -> Self {
        Self {
            num_pages,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.dpis.lock().map(|dpis| dpis.len()).unwrap_or_default()
    }
}

impl Rasterizer for FakeRasterizer {
    fn render_pages(
        &self,
        _path: &Path,
        dpi: u32,
        on_page: &mut dyn FnMut(usize, PageImage) -> Result<()>,
    ) -> Result<()> {
        self.dpis
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push(dpi);
        for index in 0..self.num_pages {
            self.rendered.fetch_add(1, Ordering::SeqCst);
            on_page(index, PageImage::new(1, 1))?;
        }
        Ok(())
    }
}

/// Recognises the same text on every page.
#[derive(Debug, Default)]
pub struct FakeOcrEngine {
    text: String,
    pub languages: Mutex<Vec<Vec<String>>>,
}

impl FakeOcrEngine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            languages: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.languages
            .lock()
            .map(|languages| languages.len())
            .unwrap_or_default()
    }
}

impl OcrEngine for FakeOcrEngine {
    fn recognize(&self, _image: &PageImage, languages: &[String]) -> Result<String> {
        self.languages
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push(languages.to_vec());
        Ok(self.text.clone())
    }
}

/// Lets a test keep a handle on a fake after handing it to [Backends].
impl<T: StructuredReader + ?Sized> StructuredReader for Arc<T> {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn StructuredDocument + 'a>> {
        (**self).open(path)
    }
}

impl<T: PlainReader + ?Sized> PlainReader for Arc<T> {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>> {
        (**self).page_texts(path)
    }

    fn page_count(&self, path: &Path) -> Result<usize> {
        (**self).page_count(path)
    }
}

impl<T: Rasterizer + ?Sized> Rasterizer for Arc<T> {
    fn render_pages(
        &self,
        path: &Path,
        dpi: u32,
        on_page: &mut dyn FnMut(usize, PageImage) -> Result<()>,
    ) -> Result<()> {
        (**self).render_pages(path, dpi, on_page)
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for Arc<T> {
    fn recognize(&self, image: &PageImage, languages: &[String]) -> Result<String> {
        (**self).recognize(image, languages)
    }
}

/// Shared handles to fake backends, and [Backends] built from them.
#[derive(Default)]
pub struct FakeBackends {
    pub structured: Option<Arc<FakeStructuredReader>>,
    pub plain: Option<Arc<FakePlainReader>>,
    pub rasterizer: Option<Arc<FakeRasterizer>>,
    pub ocr: Option<Arc<FakeOcrEngine>>,
}

impl FakeBackends {
    pub fn backends(&self) -> Backends {
        Backends {
            structured: self
                .structured
                .clone()
                .map(|b| Box::new(b) as Box<dyn StructuredReader>),
            plain: self
                .plain
                .clone()
                .map(|b| Box::new(b) as Box<dyn PlainReader>),
            rasterizer: self
                .rasterizer
                .clone()
                .map(|b| Box::new(b) as Box<dyn Rasterizer>),
            ocr: self.ocr.clone().map(|b| Box::new(b) as Box<dyn OcrEngine>),
        }
    }
}
