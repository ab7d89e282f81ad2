//! Page tables read by Tabula, running in its own JVM on a dedicated thread.

use std::{
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use utils::mpscutil;

use crate::table::{Row, Table};

#[derive(Deserialize, Debug)]
#[serde(transparent)]
struct JsonTableSet(Vec<JsonTable>);

#[derive(Deserialize, Debug)]
struct JsonTable {
    data: Vec<JsonRow>,
}

#[derive(Deserialize, Debug)]
struct JsonRow(Vec<JsonCell>);

#[derive(Deserialize, Debug)]
struct JsonCell {
    text: String,
}

impl From<JsonTable> for Table {
    fn from(value: JsonTable) -> Self {
        Table(value.data.into_iter().map(Into::into).collect())
    }
}

impl From<JsonRow> for Row {
    fn from(value: JsonRow) -> Self {
        Row(value.0.into_iter().map(|cell| cell.text).collect())
    }
}

/// Requests page tables from the thread that owns the Tabula VM.
#[derive(Clone)]
pub struct TabulaClient {
    request_sender: mpsc::SyncSender<Request>,
}

impl TabulaClient {
    /// Returns the tables that Tabula guesses are on the page at (zero-based) `index`.
    pub fn page_tables(&self, pdf_path: &Path, index: usize) -> Result<Vec<Table>> {
        let page = i32::try_from(index + 1)
            .with_context(|| format!("page index {} out of range", index))?;
        mpscutil::request_response(&self.request_sender, "PageTables", |response_sender| {
            Request::PageTables {
                pdf_path: pdf_path.to_path_buf(),
                page,
                response_sender,
            }
        })?
    }
}

/// Starts the Tabula VM on a thread in `s`, loading the Tabula JAR at `libpath`. The thread
/// stops once every client has been dropped.
pub fn spawn_server<'scope>(
    s: &'scope thread::Scope<'scope, '_>,
    libpath: &Path,
) -> Result<TabulaClient> {
    let libpath = libpath
        .to_str()
        .with_context(|| format!("Tabula path {:?} is not valid UTF-8", libpath))?
        .to_string();
    let (client_sender, client_receiver) = mpsc::sync_channel(0);

    s.spawn(move || {
        let vm = match tabula::TabulaVM::new(&libpath, false) {
            Ok(vm) => vm,
            Err(err) => {
                mpscutil::send_or_log_warning(
                    &client_sender,
                    "TabulaVM error",
                    Err(anyhow::Error::from(err).context("starting TabulaVM")),
                );
                return;
            }
        };
        let (request_sender, request_receiver) = mpsc::sync_channel(0);
        mpscutil::send_or_log_warning(
            &client_sender,
            "TabulaClient",
            Ok(TabulaClient { request_sender }),
        );

        while let Ok(request) = request_receiver.recv() {
            match request {
                Request::PageTables {
                    pdf_path,
                    page,
                    response_sender,
                } => mpscutil::send_or_log_warning(
                    &response_sender,
                    "PageTables response",
                    read_page_tables(&vm, &pdf_path, page),
                ),
            }
        }
        log::debug!("Request channel closed; terminating Tabula worker loop.");
    });

    client_receiver
        .recv()
        .context("receiving TabulaClient or error")?
}

fn read_page_tables(vm: &tabula::TabulaVM, pdf_path: &Path, page: i32) -> Result<Vec<Table>> {
    let env = vm.attach().context("attaching to TabulaVM")?;
    let pages = [page];
    let tabula = env
        .configure_tabula(
            None,
            Some(&pages),
            tabula::OutputFormat::Json,
            true,
            tabula::ExtractionMethod::Decide,
            false,
            None,
        )
        .context("configuring Tabula to extract page tables")?;

    let extracted_file = tempfile::NamedTempFile::new()?;
    tabula
        .parse_document_into(pdf_path, extracted_file.path())
        .with_context(|| format!("extracting tables from page {} of {:?}", page, pdf_path))?;
    let result: JsonTableSet =
        serde_json::from_reader(extracted_file).context("parsing JSON output from Tabula")?;

    Ok(result.0.into_iter().map(Into::into).collect())
}

enum Request {
    PageTables {
        pdf_path: PathBuf,
        page: i32,
        response_sender: mpsc::SyncSender<Result<Vec<Table>>>,
    },
}
