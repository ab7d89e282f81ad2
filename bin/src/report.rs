//! Rows of the summary report, one per processed document, and their CSV output.

use std::path::Path;

use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use extraction::{ExtractionRecord, FailureReason, RentalInfo};
use serde::{Deserialize, Serialize};

const ERROR_SOURCE_SUFFIX: &str = " [ОШИБКА]";
const RENT_TYPE_PREFIX: &str = "Тип: ";
const PERIOD_PREFIX: &str = "Период: ";
const PERIOD_DELIM: &str = " - ";
const RENTAL_PARTS_DELIM: &str = "; ";
const NO_CADASTRAL_NUMBER_NOTE: &str = "Кадастровый номер не найден";

/// A single row of the report. Absent values are empty strings.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "№ п/п")]
    pub number: usize,
    #[serde(rename = "PDF-источник")]
    pub source: String,
    #[serde(rename = "Кадастр. номер ЗУ")]
    pub cadastral_number: String,
    #[serde(rename = "Адрес, комплекс")]
    pub address: String,
    #[serde(rename = "Площадь (м²)")]
    pub area: String,
    #[serde(rename = "Собственник")]
    pub owner: String,
    #[serde(rename = "Предполагаемое назначение")]
    pub permitted_use: String,
    #[serde(rename = "Кадастровая стоимость (руб.)")]
    pub cadastral_cost: String,
    #[serde(rename = "Категория земель")]
    pub land_category: String,
    #[serde(rename = "Обременение (аренда)")]
    pub rental: String,
    #[serde(rename = "Арендатор")]
    pub tenant: String,
    #[serde(rename = "Примечания и расхождения")]
    pub notes: String,
}

impl ReportRow {
    /// Builds the row for a successfully processed document.
    ///
    /// * `number` Sequential number of the row in the report, starting at 1.
    /// * `source` File name of the document.
    pub fn from_record(number: usize, source: &str, record: &ExtractionRecord) -> Self {
        let rental = record.rental_info.as_ref();
        let notes = if record.cadastral_number.is_none() {
            NO_CADASTRAL_NUMBER_NOTE.to_string()
        } else {
            String::new()
        };

        Self {
            number,
            source: source.to_string(),
            cadastral_number: or_empty(&record.cadastral_number),
            address: or_empty(&record.address),
            area: or_empty(&record.area),
            owner: or_empty(&record.owner),
            permitted_use: or_empty(&record.permitted_use),
            cadastral_cost: or_empty(&record.cadastral_cost),
            land_category: or_empty(&record.land_category),
            rental: rental.map(format_rental).unwrap_or_default(),
            tenant: rental
                .and_then(RentalInfo::tenant)
                .unwrap_or_default()
                .to_string(),
            notes,
        }
    }

    /// Builds the row for a document that could not be processed.
    pub fn error(number: usize, source: &str, reason: FailureReason) -> Self {
        Self {
            number,
            source: format!("{}{}", source, ERROR_SOURCE_SUFFIX),
            notes: format!("Ошибка парсинга: {}", reason),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.source.ends_with(ERROR_SOURCE_SUFFIX)
    }

    /// Recovers the record that the row was built from. Empty cells decode as `None`.
    pub fn decode(&self) -> ExtractionRecord {
        let (rent_type, period) = parse_rental(&self.rental);
        let (period_start, period_end) = period.unzip();

        ExtractionRecord {
            cadastral_number: non_empty(&self.cadastral_number),
            address: non_empty(&self.address),
            area: non_empty(&self.area),
            owner: non_empty(&self.owner),
            permitted_use: non_empty(&self.permitted_use),
            cadastral_cost: non_empty(&self.cadastral_cost),
            land_category: non_empty(&self.land_category),
            rental_info: RentalInfo::from_parts(
                rent_type,
                period_start,
                period_end,
                non_empty(&self.tenant),
            ),
        }
    }
}

fn or_empty(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// The period is only shown when both of its ends are known.
fn format_rental(rental: &RentalInfo) -> String {
    let mut parts = Vec::new();
    if let Some(rent_type) = rental.rent_type() {
        parts.push(format!("{}{}", RENT_TYPE_PREFIX, rent_type));
    }
    if let (Some(start), Some(end)) = (rental.period_start(), rental.period_end()) {
        parts.push(format!("{}{}{}{}", PERIOD_PREFIX, start, PERIOD_DELIM, end));
    }
    parts.join(RENTAL_PARTS_DELIM)
}

type Period = (String, String);

fn parse_rental(cell: &str) -> (Option<String>, Option<Period>) {
    let mut rent_type = None;
    let mut period = None;
    for part in cell.split(RENTAL_PARTS_DELIM) {
        if let Some(value) = part.strip_prefix(RENT_TYPE_PREFIX) {
            rent_type = non_empty(value);
        } else if let Some(value) = part.strip_prefix(PERIOD_PREFIX) {
            period = value
                .split_once(PERIOD_DELIM)
                .map(|(start, end)| (start.to_string(), end.to_string()));
        }
    }
    (rent_type, period)
}

/// Writes the rows as CSV with a header line. The file at `path` is replaced only once every row
/// has been written.
pub fn write_csv(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("opening {:?} for writing", path))?;

    let mut w = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(&mut file);
    for row in rows {
        w.serialize(row)
            .with_context(|| format!("writing row {}", row.number))?;
    }
    w.flush()?;
    drop(w);

    file.commit()
        .with_context(|| format!("committing {:?}", path))
}
