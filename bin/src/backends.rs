use std::{path::PathBuf, thread};

use anyhow::Result;
use clap::Args;
use extraction::{
    Coordinator,
    acquisition::{Backends, pdfium, tabula},
    patterns::PatternRegistry,
    settings::Settings,
};

use crate::distpaths;

/// Options controlling the acquisition backends, settings and pattern rules.
#[derive(Args, Debug, Default)]
pub struct BackendArgs {
    /// Path to Tabula JAR file. Defaults to a tabula.jar alongside the executable. Without it,
    /// tables are not read from near-empty pages.
    #[arg(long)]
    tabula_libpath: Option<PathBuf>,

    /// Do not read tables with Tabula, even if it is available.
    #[arg(long)]
    no_tabula: bool,

    /// Path to a YAML settings file. Keys that it omits take their default values.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Path to a YAML pattern table to use instead of the builtin one.
    #[arg(long)]
    patterns: Option<PathBuf>,
}

impl BackendArgs {
    pub fn load_settings(&self) -> Result<Settings> {
        match &self.settings {
            Some(path) => Settings::from_yaml_file(path),
            None => Ok(Settings::default()),
        }
    }

    pub fn load_patterns(&self) -> Result<Option<PatternRegistry>> {
        self.patterns
            .as_deref()
            .map(PatternRegistry::from_yaml_file)
            .transpose()
    }

    fn tabula_libpath(&self) -> Option<PathBuf> {
        if self.no_tabula {
            return None;
        }
        self.tabula_libpath.clone().or_else(distpaths::tabula_jar)
    }
}

/// Starts the backend worker threads, and calls `f` with a [Coordinator] using them. The worker
/// threads are stopped before returning.
pub fn with_coordinator<R>(
    args: &BackendArgs,
    settings: Settings,
    f: impl FnOnce(&Coordinator) -> Result<R>,
) -> Result<R> {
    let loaded_patterns = args.load_patterns()?;
    let registry = loaded_patterns
        .as_ref()
        .unwrap_or_else(|| PatternRegistry::builtin());
    let tabula_libpath = args.tabula_libpath();

    thread::scope(|s| {
        let pdfium_client = match pdfium::spawn_server(s) {
            Ok(client) => Some(client),
            Err(err) => {
                log::warn!("Pdfium is not available: {:#}", err);
                None
            }
        };
        let tabula_client = tabula_libpath.and_then(|libpath| {
            match tabula::spawn_server(s, &libpath) {
                Ok(client) => Some(client),
                Err(err) => {
                    log::warn!("Tabula is not available: {:#}", err);
                    None
                }
            }
        });

        let coordinator =
            Coordinator::new(Backends::probe(pdfium_client, tabula_client), settings, registry);
        let result = f(&coordinator);
        // Drops the backend clients, so that the worker threads exit.
        drop(coordinator);
        result
    })
}
