//! Extraction of registry fields from EGRN extract PDFs.
//!
//! Text is acquired from a PDF by an [acquisition::AcquisitionChain] of increasingly expensive
//! strategies, and then fields are pulled out of the text by a [fields::FieldExtractor] driven by
//! the rules in a [patterns::PatternRegistry]. The [pipeline::Coordinator] ties both together
//! for a single document.

pub mod acquisition;
pub mod fields;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod settings;
pub mod table;

pub use fields::{ExtractionRecord, RentalInfo};
pub use pipeline::{Coordinator, FailureReason, ProcessFailure};

/// Extracts every field from `text` using the builtin pattern table.
pub fn extract_all_data(text: &str) -> ExtractionRecord {
    fields::FieldExtractor::new(patterns::PatternRegistry::builtin()).extract_all(text)
}
