//! Plain page text read by lopdf, with no layout or table awareness.

use std::path::Path;

use anyhow::{Context, Result};

use super::PlainReader;

/// [PlainReader] backed by lopdf's content stream text extraction.
#[derive(Clone, Copy, Debug, Default)]
pub struct LopdfReader;

impl PlainReader for LopdfReader {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>> {
        let document = load(path)?;
        document
            .get_pages()
            .into_keys()
            .map(|page_number| {
                document
                    .extract_text(&[page_number])
                    .with_context(|| format!("extracting text from page {}", page_number))
            })
            .collect()
    }

    fn page_count(&self, path: &Path) -> Result<usize> {
        Ok(load(path)?.get_pages().len())
    }
}

fn load(path: &Path) -> Result<lopdf::Document> {
    lopdf::Document::load(path).with_context(|| format!("loading {:?} with lopdf", path))
}
