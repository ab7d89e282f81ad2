//! Registry of the pattern rules that locate each field within extract text.
//!
//! The registry is built once, at startup, from a versioned table. The builtin table is embedded
//! in the binary, and may be replaced by a table loaded from a file. Either way it is validated
//! before use so that every [PatternKey] has a usable rule, and is read-only thereafter.

#[cfg(test)]
mod tests;

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, bail};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use strum::IntoEnumIterator;

/// Version of the pattern table format understood by this build.
pub const SUPPORTED_VERSION: u32 = 1;

const BUILTIN_TABLE_YAML: &str = include_str!("builtin.yaml");

lazy_static! {
    static ref BUILTIN: PatternRegistry = PatternRegistry::from_yaml_str(BUILTIN_TABLE_YAML)
        .expect("bug: builtin pattern table is invalid");
}

/// Identifies a single pattern rule.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatternKey {
    CadastralNumber,
    Address,
    Area,
    Owner,
    PermittedUse,
    CadastralCost,
    LandCategory,
    RentType,
    RentalPeriod,
    Tenant,
}

impl PatternKey {
    /// Returns true for rules that capture a start and an end value in a single match.
    pub fn is_ranged(self) -> bool {
        matches!(self, PatternKey::RentalPeriod)
    }
}

/// Problems with a pattern table that make it unusable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error(
        "pattern table version {0} is not supported (expected {expected})",
        expected = SUPPORTED_VERSION
    )]
    UnsupportedVersion(u32),
    #[error("pattern table has no rule for {0}")]
    MissingRule(PatternKey),
    #[error("pattern rule for {0} refers to a capture group that the pattern does not have")]
    GroupOutOfRange(PatternKey),
    #[error("pattern rule for ranged field {0} does not name an end group")]
    MissingEndGroup(PatternKey),
}

/// A compiled pattern, and which of its capture groups hold the field value.
#[derive(Debug)]
pub struct PatternRule {
    pub key: PatternKey,
    pub regex: Regex,
    /// Capture group holding the value (or the start of the range for ranged rules).
    pub group: usize,
    /// Capture group holding the end of the range, for ranged rules.
    pub end_group: Option<usize>,
}

impl PatternRule {
    /// Returns the value captured by the first match in `text`, if any.
    pub fn first_capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .captures(text)
            .and_then(|captures| captures.get(self.group))
            .map(|m| m.as_str())
    }

    /// Returns the (start, end) values captured by the first match in `text`, if any. Both groups
    /// must have participated in the match.
    pub fn first_range_capture<'t>(&self, text: &'t str) -> Option<(&'t str, &'t str)> {
        let end_group = self.end_group?;
        let captures = self.regex.captures(text)?;
        let start = captures.get(self.group)?.as_str();
        let end = captures.get(end_group)?.as_str();
        Some((start, end))
    }
}

/// Read-only mapping from [PatternKey] to [PatternRule].
#[derive(Debug)]
pub struct PatternRegistry {
    version: u32,
    rules: HashMap<PatternKey, PatternRule>,
}

impl PatternRegistry {
    /// Returns the registry built from the embedded pattern table.
    pub fn builtin() -> &'static PatternRegistry {
        &BUILTIN
    }

    /// Parses and validates a pattern table in YAML form.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let table: PatternTable =
            serde_yaml_ng::from_str(yaml).context("parsing pattern table")?;
        Self::from_table(table)
    }

    /// Reads, parses and validates a pattern table YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading pattern table {:?}", path))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("loading pattern table {:?}", path))
    }

    fn from_table(table: PatternTable) -> Result<Self> {
        if table.version != SUPPORTED_VERSION {
            bail!(RegistryError::UnsupportedVersion(table.version));
        }

        let mut rules = HashMap::with_capacity(table.rules.len());
        for (key, spec) in table.rules {
            let rule = spec.compile(key)?;
            rules.insert(key, rule);
        }

        for key in PatternKey::iter() {
            if !rules.contains_key(&key) {
                bail!(RegistryError::MissingRule(key));
            }
        }

        log::debug!(
            "Loaded pattern table version {} with {} rules.",
            table.version,
            rules.len()
        );

        Ok(Self {
            version: table.version,
            rules,
        })
    }

    /// Version of the table that the registry was built from.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the rule for `key`. A validated registry has a rule for every key.
    pub fn lookup(&self, key: PatternKey) -> Option<&PatternRule> {
        self.rules.get(&key)
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct PatternTable {
    version: u32,
    rules: HashMap<PatternKey, RuleSpec>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    pattern: String,
    group: usize,
    #[serde(default)]
    end_group: Option<usize>,
}

impl RuleSpec {
    fn compile(self, key: PatternKey) -> Result<PatternRule> {
        let regex = Regex::new(&self.pattern)
            .with_context(|| format!("compiling pattern for {}", key))?;

        let groups = regex.captures_len();
        if self.group == 0 || self.group >= groups {
            bail!(RegistryError::GroupOutOfRange(key));
        }
        match (key.is_ranged(), self.end_group) {
            (true, None) => bail!(RegistryError::MissingEndGroup(key)),
            (_, Some(end_group)) if end_group == 0 || end_group >= groups => {
                bail!(RegistryError::GroupOutOfRange(key))
            }
            _ => {}
        }

        Ok(PatternRule {
            key,
            regex,
            group: self.group,
            end_group: self.end_group,
        })
    }
}
