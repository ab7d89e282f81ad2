//! Structured page text and page rendering through Pdfium.
//!
//! Pdfium is not thread-safe, so a single [PdfiumServer] owns the library and every loaded
//! document, and any number of [PdfiumClient]s send it coarse-grained requests over a channel.

use std::{collections::HashMap, path::PathBuf, sync::mpsc, thread};

use anyhow::{Context, Result, anyhow};
use pdfium_render::prelude::{PdfDocument, PdfPageIndex, PdfRenderConfig, Pdfium};
use utils::mpscutil;

use super::{PageImage, Rasterizer, StructuredDocument, StructuredReader, tabula::TabulaClient};
use crate::table::Table;

/// Resolution of a PDF page at 1x scale.
const POINTS_PER_INCH: f32 = 72.0;

/// Identity of a loaded PDF document in the [PdfiumServer].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DocumentId(usize);

/// Information about a loaded PDF.
#[derive(Debug)]
pub struct PdfMetadata {
    pub id: DocumentId,
    pub num_pages: PdfPageIndex,
}

/// Requests coarsely serialised PDF operations against the [Pdfium] API.
#[derive(Clone)]
pub struct PdfiumClient {
    request_sender: mpsc::SyncSender<Request>,
}

impl PdfiumClient {
    /// Loads a PDF from the given file path.
    pub fn load_pdf(&self, path: PathBuf) -> Result<PdfMetadata> {
        mpscutil::request_response(&self.request_sender, "LoadPdf", |response_sender| {
            Request::LoadPdf {
                path,
                response_sender,
            }
        })?
    }

    /// Unloads a previously loaded PDF.
    pub fn unload_pdf(&self, id: DocumentId) -> Result<()> {
        mpscutil::request_response(&self.request_sender, "UnloadPdf", |response_sender| {
            Request::UnloadPdf {
                id,
                response_sender,
            }
        })?
    }

    /// Returns all text on a page of a loaded PDF.
    pub fn page_text(&self, id: DocumentId, page_index: PdfPageIndex) -> Result<String> {
        mpscutil::request_response(&self.request_sender, "PageText", |response_sender| {
            Request::PageText {
                id,
                page_index,
                response_sender,
            }
        })?
    }

    /// Renders a page from a loaded PDF at the given resolution.
    pub fn render_page(
        &self,
        id: DocumentId,
        page_index: PdfPageIndex,
        dpi: u32,
    ) -> Result<PageImage> {
        mpscutil::request_response(&self.request_sender, "RenderPage", |response_sender| {
            Request::RenderPage {
                id,
                page_index,
                dpi,
                response_sender,
            }
        })?
    }

    fn open_document(&self, path: &std::path::Path) -> Result<LoadedPdf<'_>> {
        let metadata = self
            .load_pdf(path.to_path_buf())
            .with_context(|| format!("loading {:?} into Pdfium", path))?;
        Ok(LoadedPdf {
            client: self,
            metadata,
        })
    }
}

impl Rasterizer for PdfiumClient {
    fn render_pages(
        &self,
        path: &std::path::Path,
        dpi: u32,
        on_page: &mut dyn FnMut(usize, PageImage) -> Result<()>,
    ) -> Result<()> {
        let pdf = self.open_document(path)?;
        for page_index in 0..pdf.metadata.num_pages {
            let image = self
                .render_page(pdf.metadata.id, page_index, dpi)
                .with_context(|| format!("rendering page {} of {:?}", page_index + 1, path))?;
            on_page(usize::from(page_index), image)?;
        }
        Ok(())
    }
}

/// A document loaded into the [PdfiumServer], unloaded again when dropped.
struct LoadedPdf<'c> {
    client: &'c PdfiumClient,
    metadata: PdfMetadata,
}

impl Drop for LoadedPdf<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.client.unload_pdf(self.metadata.id) {
            log::warn!("Failed to unload document {:?}: {:#}", self.metadata.id, err);
        }
    }
}

/// [StructuredReader] taking page text from Pdfium, and page tables from Tabula when available.
pub struct PdfiumStructuredReader {
    pdfium: PdfiumClient,
    tables: Option<TabulaClient>,
}

impl PdfiumStructuredReader {
    pub fn new(pdfium: PdfiumClient, tables: Option<TabulaClient>) -> Self {
        Self { pdfium, tables }
    }
}

impl StructuredReader for PdfiumStructuredReader {
    fn open<'a>(&'a self, path: &std::path::Path) -> Result<Box<dyn StructuredDocument + 'a>> {
        let pdf = self.pdfium.open_document(path)?;
        Ok(Box::new(PdfiumStructuredDocument {
            pdf,
            path: path.to_path_buf(),
            tables: self.tables.as_ref(),
        }))
    }
}

struct PdfiumStructuredDocument<'a> {
    pdf: LoadedPdf<'a>,
    path: PathBuf,
    tables: Option<&'a TabulaClient>,
}

impl StructuredDocument for PdfiumStructuredDocument<'_> {
    fn page_count(&self) -> usize {
        self.pdf.metadata.num_pages as usize
    }

    fn page_text(&self, index: usize) -> Result<String> {
        let page_index = PdfPageIndex::try_from(index)
            .with_context(|| format!("page index {} out of range", index))?;
        self.pdf.client.page_text(self.pdf.metadata.id, page_index)
    }

    fn page_tables(&self, index: usize) -> Result<Vec<Table>> {
        match self.tables {
            Some(tables) => tables.page_tables(&self.path, index),
            None => Ok(Vec::new()),
        }
    }
}

/// Starts a [PdfiumServer] on a thread in `s`, returning a client to it. The server stops once
/// every client has been dropped.
pub fn spawn_server<'scope>(s: &'scope thread::Scope<'scope, '_>) -> Result<PdfiumClient> {
    let (client_sender, client_receiver) = mpsc::sync_channel(0);

    s.spawn(move || {
        let server = match PdfiumServer::new() {
            Ok(server) => server,
            Err(err) => {
                mpscutil::send_or_log_warning(&client_sender, "PdfiumServer error", Err(err));
                return;
            }
        };
        mpscutil::send_or_log_warning(&client_sender, "PdfiumClient", Ok(server.client()));
        server.run();
    });

    client_receiver
        .recv()
        .context("receiving PdfiumClient or error")?
}

/// Serialises coarse-grained operations with the single-threaded Pdfium library.
pub struct PdfiumServer {
    pdfium: Pdfium,

    request_sender: mpsc::SyncSender<Request>,
    request_receiver: mpsc::Receiver<Request>,
}

impl PdfiumServer {
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_statically_linked_library()
            .context("binding to statically linked Pdfium")?;
        let (request_sender, request_receiver) = mpsc::sync_channel(0);
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            request_sender,
            request_receiver,
        })
    }

    pub fn client(&self) -> PdfiumClient {
        PdfiumClient {
            request_sender: self.request_sender.clone(),
        }
    }

    pub fn run(self) {
        // Terminates the loop below once every client has been dropped.
        drop(self.request_sender);

        let request_receiver = self.request_receiver;
        let mut state = ServerState::new(&self.pdfium);

        while let Ok(request) = request_receiver.recv() {
            state.handle_request(request);
        }
        log::debug!("Request channel closed; terminating PdfiumServer worker loop.");
    }
}

struct ServerState<'lib> {
    pdfium: &'lib Pdfium,
    loaded_documents: HashMap<DocumentId, PdfDocument<'lib>>,
    next_id: DocumentId,
}

impl<'lib> ServerState<'lib> {
    fn new(pdfium: &'lib Pdfium) -> Self {
        Self {
            pdfium,
            loaded_documents: HashMap::new(),
            next_id: DocumentId(0),
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::LoadPdf {
                path,
                response_sender,
            } => {
                mpscutil::send_or_log_warning(
                    &response_sender,
                    "LoadPdf response",
                    self.load_pdf(path),
                );
            }
            Request::UnloadPdf {
                id,
                response_sender,
            } => {
                mpscutil::send_or_log_warning(
                    &response_sender,
                    "UnloadPdf response",
                    self.unload_pdf(id),
                );
            }
            Request::PageText {
                id,
                page_index,
                response_sender,
            } => {
                mpscutil::send_or_log_warning(
                    &response_sender,
                    "PageText response",
                    self.page_text(id, page_index),
                );
            }
            Request::RenderPage {
                id,
                page_index,
                dpi,
                response_sender,
            } => {
                mpscutil::send_or_log_warning(
                    &response_sender,
                    "RenderPage response",
                    self.render_page(id, page_index, dpi),
                );
            }
        }
    }

    fn load_pdf(&mut self, path: PathBuf) -> Result<PdfMetadata> {
        let id = self.next_id;
        self.next_id.0 = self
            .next_id
            .0
            .checked_add(1)
            .ok_or_else(|| anyhow!("overflowed assigning DocumentIds"))?;
        let document = self.pdfium.load_pdf_from_file(&path, None)?;
        let metadata = PdfMetadata {
            id,
            num_pages: document.pages().len(),
        };
        self.loaded_documents.insert(id, document);
        Ok(metadata)
    }

    fn unload_pdf(&mut self, id: DocumentId) -> Result<()> {
        self.loaded_documents
            .remove(&id)
            .ok_or_else(|| anyhow!("document with ID {:?} not loaded", id))
            .map(|_| ())
    }

    fn document(&self, id: DocumentId) -> Result<&PdfDocument<'lib>> {
        self.loaded_documents
            .get(&id)
            .ok_or_else(|| anyhow!("document with ID {:?} not loaded", id))
    }

    fn page_text(&self, id: DocumentId, page_index: PdfPageIndex) -> Result<String> {
        let page = self.document(id)?.pages().get(page_index)?;
        Ok(page.text()?.all())
    }

    fn render_page(&self, id: DocumentId, page_index: PdfPageIndex, dpi: u32) -> Result<PageImage> {
        let page = self.document(id)?.pages().get(page_index)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);
        let pdf_image = page.render_with_config(&config)?;
        Ok(pdf_image.as_image().into_rgb8())
    }
}

enum Request {
    LoadPdf {
        path: PathBuf,
        response_sender: mpsc::SyncSender<Result<PdfMetadata>>,
    },
    UnloadPdf {
        id: DocumentId,
        response_sender: mpsc::SyncSender<Result<()>>,
    },
    PageText {
        id: DocumentId,
        page_index: PdfPageIndex,
        response_sender: mpsc::SyncSender<Result<String>>,
    },
    RenderPage {
        id: DocumentId,
        page_index: PdfPageIndex,
        dpi: u32,
        response_sender: mpsc::SyncSender<Result<PageImage>>,
    },
}
