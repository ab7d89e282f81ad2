//! Turns acquired extract text into an [ExtractionRecord].

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::{
    normalize,
    patterns::{PatternKey, PatternRegistry, PatternRule},
};

/// Fields found in a single extract. Every field is optional; a field that was not found (or was
/// explicitly marked as empty in the extract) is `None`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExtractionRecord {
    pub cadastral_number: Option<String>,
    pub address: Option<String>,
    pub area: Option<String>,
    pub owner: Option<String>,
    pub permitted_use: Option<String>,
    pub cadastral_cost: Option<String>,
    pub land_category: Option<String>,
    pub rental_info: Option<RentalInfo>,
}

impl ExtractionRecord {
    /// Number of top-level fields that have a value.
    pub fn found_count(&self) -> usize {
        [
            self.cadastral_number.is_some(),
            self.address.is_some(),
            self.area.is_some(),
            self.owner.is_some(),
            self.permitted_use.is_some(),
            self.cadastral_cost.is_some(),
            self.land_category.is_some(),
            self.rental_info.is_some(),
        ]
        .into_iter()
        .filter(|found| *found)
        .count()
    }
}

/// Rental encumbrance on the plot. Only constructed with at least one part present.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RentalInfo {
    rent_type: Option<String>,
    period_start: Option<String>,
    period_end: Option<String>,
    tenant: Option<String>,
}

impl RentalInfo {
    /// Returns `None` when every part is absent.
    pub fn from_parts(
        rent_type: Option<String>,
        period_start: Option<String>,
        period_end: Option<String>,
        tenant: Option<String>,
    ) -> Option<Self> {
        if rent_type.is_none() && period_start.is_none() && period_end.is_none() && tenant.is_none()
        {
            return None;
        }
        Some(Self {
            rent_type,
            period_start,
            period_end,
            tenant,
        })
    }

    pub fn rent_type(&self) -> Option<&str> {
        self.rent_type.as_deref()
    }

    pub fn period_start(&self) -> Option<&str> {
        self.period_start.as_deref()
    }

    pub fn period_end(&self) -> Option<&str> {
        self.period_end.as_deref()
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

/// Result of applying one rule to the text.
#[derive(Debug, Eq, PartialEq)]
enum Capture<T> {
    Value(T),
    EmptyMarker,
    NoMatch,
}

impl<T> Capture<T> {
    fn into_option(self) -> Option<T> {
        match self {
            Capture::Value(v) => Some(v),
            Capture::EmptyMarker | Capture::NoMatch => None,
        }
    }
}

/// Applies the rules of a [PatternRegistry] to text. Holds no per-document state, so a single
/// extractor may be shared between threads.
#[derive(Clone, Copy, Debug)]
pub struct FieldExtractor<'r> {
    registry: &'r PatternRegistry,
}

impl<'r> FieldExtractor<'r> {
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self { registry }
    }

    /// Extracts every field. Never fails; fields that are not found are `None`.
    pub fn extract_all(&self, text: &str) -> ExtractionRecord {
        let record = ExtractionRecord {
            cadastral_number: self.extract_cadastral_number(text),
            address: self.extract_address(text),
            area: self.extract_area(text),
            owner: self.extract_owner(text),
            permitted_use: self.extract_permitted_use(text),
            cadastral_cost: self.extract_cadastral_cost(text),
            land_category: self.extract_land_category(text),
            rental_info: self.extract_rental_info(text),
        };
        log::debug!("Found {} of 8 fields.", record.found_count());
        record
    }

    pub fn extract_cadastral_number(&self, text: &str) -> Option<String> {
        self.capture(PatternKey::CadastralNumber, text, normalize::strip_whitespace)
    }

    pub fn extract_address(&self, text: &str) -> Option<String> {
        self.capture(PatternKey::Address, text, normalize::clean)
    }

    /// The numeral keeps its format, including any tolerance suffix. Whitespace within the
    /// number and within the tolerance is removed, and a single space separates the two.
    pub fn extract_area(&self, text: &str) -> Option<String> {
        self.capture(PatternKey::Area, text, normalize_area)
    }

    pub fn extract_owner(&self, text: &str) -> Option<String> {
        self.capture(PatternKey::Owner, text, normalize::clean)
    }

    pub fn extract_permitted_use(&self, text: &str) -> Option<String> {
        self.capture(PatternKey::PermittedUse, text, normalize::clean)
    }

    pub fn extract_cadastral_cost(&self, text: &str) -> Option<String> {
        self.capture(PatternKey::CadastralCost, text, normalize::clean)
    }

    pub fn extract_land_category(&self, text: &str) -> Option<String> {
        self.capture(PatternKey::LandCategory, text, normalize::clean)
    }

    /// Merges three independent lookups: the rent type, the rental period and the tenant.
    pub fn extract_rental_info(&self, text: &str) -> Option<RentalInfo> {
        let rent_type = self.capture(PatternKey::RentType, text, normalize::clean);
        let (period_start, period_end) = self.capture_range(PatternKey::RentalPeriod, text).unzip();
        let tenant = self.capture(PatternKey::Tenant, text, normalize::clean);
        RentalInfo::from_parts(rent_type, period_start, period_end, tenant)
    }

    fn capture(&self, key: PatternKey, text: &str, tidy: fn(&str) -> String) -> Option<String> {
        let capture = match self.rule(key).and_then(|rule| rule.first_capture(text)) {
            None => Capture::NoMatch,
            Some(raw) if normalize::is_empty_marker(raw) => Capture::EmptyMarker,
            Some(raw) => {
                let value = tidy(raw);
                if value.is_empty() {
                    Capture::NoMatch
                } else {
                    Capture::Value(value)
                }
            }
        };
        log_capture(key, &capture);
        capture.into_option()
    }

    fn capture_range(&self, key: PatternKey, text: &str) -> Option<(String, String)> {
        let capture = match self.rule(key).and_then(|rule| rule.first_range_capture(text)) {
            None => Capture::NoMatch,
            Some((start, end)) => Capture::Value((normalize::clean(start), normalize::clean(end))),
        };
        log_capture(key, &capture);
        capture.into_option()
    }

    fn rule(&self, key: PatternKey) -> Option<&'r PatternRule> {
        let rule = self.registry.lookup(key);
        if rule.is_none() {
            log::warn!("No pattern rule registered for {}.", key);
        }
        rule
    }
}

fn log_capture<T: std::fmt::Debug>(key: PatternKey, capture: &Capture<T>) {
    match capture {
        Capture::Value(value) => log::debug!("{}: found {:?}.", key, value),
        Capture::EmptyMarker => log::debug!("{}: explicitly empty in extract.", key),
        Capture::NoMatch => log::debug!("{}: not found.", key),
    }
}

fn normalize_area(raw: &str) -> String {
    let (number, tolerance) = match raw.find(['+', '±']) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    };
    let number = normalize::strip_whitespace(number);
    let tolerance = normalize::strip_whitespace(tolerance);
    if tolerance.is_empty() {
        number
    } else {
        format!("{} {}", number, tolerance)
    }
}
