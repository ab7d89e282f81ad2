
use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{
        Arc, mpsc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::Args;
use extraction::{Coordinator, ExtractionRecord, FailureReason};
use simple_bar::ProgressBar;

use crate::{
    backends::{self, BackendArgs},
    report::{self, ReportRow},
};

/// Extracts fields from every PDF in a directory into a CSV report, one row per PDF.
#[derive(Args, Debug)]
pub struct Command {
    /// Directory containing the extract PDFs. Subdirectories are not searched.
    input_dir: PathBuf,

    /// Path to write the CSV report to. Replaced if it already exists.
    output: PathBuf,

    /// Never use OCR, even when the settings allow it.
    #[arg(long)]
    no_ocr: bool,

    /// Number of PDFs to process concurrently.
    #[arg(long, default_value = "1")]
    jobs: NonZeroUsize,

    /// Do not show a progress bar.
    #[arg(long, default_value = "false")]
    no_progress: bool,

    #[command(flatten)]
    backends: BackendArgs,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let mut settings = cmd.backends.load_settings()?;
    if cmd.no_ocr {
        settings.allow_ocr = false;
    }

    let pdfs = discover_pdfs(&cmd.input_dir)?;
    if pdfs.is_empty() {
        log::warn!("No PDF files found in {:?}.", cmd.input_dir);
        eprintln!("No PDF files found in {:?}.", cmd.input_dir);
        return Ok(());
    }
    log::info!("Found {} PDF files in {:?}.", pdfs.len(), cmd.input_dir);

    let continue_intent = Arc::new(AtomicBool::new(true));
    let mut events = EventDisplayer::new(!cmd.no_progress, continue_intent.clone());
    ctrlc::set_handler(move || continue_intent.store(false, Ordering::SeqCst))?;

    let start = Instant::now();
    let outcome = backends::with_coordinator(&cmd.backends, settings, |coordinator| {
        Ok(process_batch(coordinator, &pdfs, cmd.jobs, &mut events))
    })?;

    report::write_csv(&cmd.output, &outcome.rows)
        .with_context(|| format!("writing report to {:?}", cmd.output))?;

    let summary = outcome.summary(pdfs.len(), start.elapsed(), &cmd.output);
    log::info!("{}", summary);
    eprintln!("{}", summary);
    Ok(())
}

/// Returns the `*.pdf` and `*.PDF` files directly inside `dir`, sorted by name.
fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("input directory {:?} does not exist", dir);
    }

    let mut pdfs = Vec::new();
    for dir_entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let dir_entry = dir_entry.with_context(|| format!("listing {:?}", dir))?;
        if !dir_entry.file_type().is_file() {
            continue;
        }
        let is_pdf = dir_entry
            .path()
            .extension()
            .is_some_and(|ext| ext == "pdf" || ext == "PDF");
        if is_pdf {
            pdfs.push(dir_entry.into_path());
        }
    }
    Ok(pdfs)
}

/// Receives progress of a batch on the thread that started it.
trait BatchEvents {
    /// A worker has started on the document at `index` of `total`.
    fn on_started(&mut self, index: usize, total: usize, name: &str, pages: Option<usize>);

    /// The document at `index` is done. `completed` documents are done in all.
    fn on_finished(&mut self, index: usize, completed: usize, total: usize);

    /// Returns `false` if no further documents should be started.
    fn do_continue(&self) -> bool;
}

/// Rows for the documents that were processed, in discovery order.
#[derive(Debug, Default)]
struct BatchOutcome {
    rows: Vec<ReportRow>,
    successful: usize,
    failed: usize,
    cancelled: bool,
}

impl BatchOutcome {
    fn summary(&self, total: usize, elapsed: Duration, output: &Path) -> String {
        let mut summary = format!(
            "Processed {} of {} PDF files in {:.1}s: {} successful, {} failed. Report written to {:?}.",
            self.successful + self.failed,
            total,
            elapsed.as_secs_f64(),
            self.successful,
            self.failed,
            output,
        );
        if self.cancelled {
            summary.push_str(" Processing was cancelled.");
        }
        summary
    }
}

enum WorkerMessage {
    Started {
        index: usize,
        pages: Option<usize>,
    },
    Finished {
        index: usize,
        result: std::result::Result<ExtractionRecord, FailureReason>,
    },
}

/// Processes the documents over `jobs` worker threads. A document that fails becomes an error
/// row; it does not stop the batch.
fn process_batch(
    coordinator: &Coordinator,
    pdfs: &[PathBuf],
    jobs: NonZeroUsize,
    events: &mut dyn BatchEvents,
) -> BatchOutcome {
    let total = pdfs.len();
    let next_index = &AtomicUsize::new(0);
    let stop = &AtomicBool::new(!events.do_continue());
    let mut results: Vec<Option<std::result::Result<ExtractionRecord, FailureReason>>> =
        std::iter::repeat_with(|| None).take(total).collect();

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        for _ in 0..jobs.get().min(total) {
            let tx = tx.clone();
            s.spawn(move || process_documents(coordinator, pdfs, next_index, stop, tx));
        }
        drop(tx);

        let mut completed = 0;
        for message in rx {
            match message {
                WorkerMessage::Started { index, pages } => {
                    events.on_started(index, total, &file_name(&pdfs[index]), pages);
                }
                WorkerMessage::Finished { index, result } => {
                    results[index] = Some(result);
                    completed += 1;
                    events.on_finished(index, completed, total);
                }
            }
            if !events.do_continue() {
                stop.store(true, Ordering::SeqCst);
            }
        }
    });

    // A stop requested while the last documents were in progress does not skip any of them.
    let mut outcome = BatchOutcome {
        cancelled: results.iter().any(Option::is_none),
        ..Default::default()
    };
    if outcome.cancelled {
        log::warn!("Cancelled before all PDF files were started.");
    }
    for (path, result) in pdfs.iter().zip(results) {
        let Some(result) = result else {
            continue;
        };
        let number = outcome.rows.len() + 1;
        let name = file_name(path);
        outcome.rows.push(match result {
            Ok(record) => {
                outcome.successful += 1;
                ReportRow::from_record(number, &name, &record)
            }
            Err(reason) => {
                outcome.failed += 1;
                ReportRow::error(number, &name, reason)
            }
        });
    }
    outcome
}

/// Worker thread body. Takes documents in order until none remain or `stop` is set.
fn process_documents(
    coordinator: &Coordinator,
    pdfs: &[PathBuf],
    next_index: &AtomicUsize,
    stop: &AtomicBool,
    tx: mpsc::Sender<WorkerMessage>,
) {
    while !stop.load(Ordering::SeqCst) {
        let index = next_index.fetch_add(1, Ordering::SeqCst);
        let Some(path) = pdfs.get(index) else {
            return;
        };

        let pages = coordinator.page_count(path);
        if tx.send(WorkerMessage::Started { index, pages }).is_err() {
            return;
        }

        let result = coordinator.process(path).map_err(|err| {
            log::warn!("{:?}: failed with {}: {}", path, err.reason(), err);
            err.reason()
        });
        if let Ok(record) = &result {
            if record.cadastral_number.is_none() {
                log::warn!("{:?}: cadastral number not found.", path);
            }
        }

        if tx.send(WorkerMessage::Finished { index, result }).is_err() {
            return;
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

struct EventDisplayer {
    show_progress: bool,
    progress_bar: Option<ProgressBar>,
    continue_intent: Arc<AtomicBool>,
}

impl EventDisplayer {
    fn new(show_progress: bool, continue_intent: Arc<AtomicBool>) -> Self {
        Self {
            show_progress,
            progress_bar: None,
            continue_intent,
        }
    }
}

impl BatchEvents for EventDisplayer {
    fn on_started(&mut self, index: usize, total: usize, name: &str, pages: Option<usize>) {
        match pages {
            Some(pages) => log::info!("[{}/{}] {} ({} pages)", index + 1, total, name, pages),
            None => log::info!("[{}/{}] {} (page count unknown)", index + 1, total, name),
        }
    }

    fn on_finished(&mut self, _index: usize, _completed: usize, total: usize) {
        if !self.show_progress {
            return;
        }
        self.progress_bar
            .get_or_insert_with(|| ProgressBar::cargo_style(total as u32, 80, true))
            .update();
    }

    fn do_continue(&self) -> bool {
        self.continue_intent.load(Ordering::Relaxed)
    }
}
