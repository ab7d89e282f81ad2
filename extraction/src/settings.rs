//! Tunable thresholds and limits for text acquisition.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Settings read at startup and shared read-only by every document.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Minimum character count for a strategy's text to be accepted.
    pub quality_threshold: usize,
    /// Pages with less text than this have their tables appended by the structured strategy.
    pub page_table_floor: usize,
    /// Below this many characters the best acquired text is treated as no text at all.
    pub min_acquired_chars: usize,
    /// Acquired text must be longer than this for fields to be extracted from it.
    pub extraction_floor: usize,
    pub max_file_size_mb: u64,
    /// Lower-case file extensions accepted by pre-flight checks, without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Tesseract language codes, recognised together.
    pub ocr_languages: Vec<String>,
    pub ocr_dpi: u32,
    pub allow_ocr: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality_threshold: 50,
            page_table_floor: 5,
            min_acquired_chars: 5,
            extraction_floor: 20,
            max_file_size_mb: 50,
            allowed_extensions: vec!["pdf".to_string()],
            ocr_languages: vec!["rus".to_string(), "eng".to_string()],
            ocr_dpi: 300,
            allow_ocr: true,
        }
    }
}

/// Reasons that [Settings] are unusable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("quality_threshold must be greater than zero")]
    ZeroQualityThreshold,
    #[error("{0} must not exceed quality_threshold")]
    FloorAboveThreshold(&'static str),
    #[error("allowed_extensions must not be empty")]
    NoAllowedExtensions,
    #[error("ocr_languages must name at least one language")]
    NoOcrLanguages,
    #[error("ocr_dpi must be greater than zero")]
    ZeroDpi,
    #[error("max_file_size_mb must be greater than zero")]
    ZeroMaxFileSize,
}

impl Settings {
    /// Reads, parses and validates settings from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let rdr = std::fs::File::open(path)
            .with_context(|| format!("opening settings file {:?}", path))?;
        let settings: Settings = serde_yaml_ng::from_reader(rdr)
            .with_context(|| format!("parsing settings file {:?}", path))?;
        settings
            .validate()
            .with_context(|| format!("validating settings file {:?}", path))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        use SettingsError::*;

        if self.quality_threshold == 0 {
            bail!(ZeroQualityThreshold);
        }
        for (name, floor) in [
            ("page_table_floor", self.page_table_floor),
            ("min_acquired_chars", self.min_acquired_chars),
            ("extraction_floor", self.extraction_floor),
        ] {
            if floor > self.quality_threshold {
                bail!(FloorAboveThreshold(name));
            }
        }
        if self.allowed_extensions.is_empty() {
            bail!(NoAllowedExtensions);
        }
        if self.ocr_languages.is_empty() {
            bail!(NoOcrLanguages);
        }
        if self.ocr_dpi == 0 {
            bail!(ZeroDpi);
        }
        if self.max_file_size_mb == 0 {
            bail!(ZeroMaxFileSize);
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Returns true if `path` has one of the allowed extensions, compared case-insensitively.
    pub fn extension_allowed(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use googletest::prelude::*;
    use testutils::{anyhow_downcasts_to, fixture_dir, write_fixture};

    use super::*;

    #[gtest]
    fn test_defaults_are_valid() {
        expect_that!(Settings::default().validate(), ok(anything()));
    }

    #[gtest]
    fn test_partial_file_takes_defaults() -> anyhow::Result<()> {
        let dir = fixture_dir()?;
        let path = write_fixture(
            dir.path(),
            "settings.yaml",
            "allow_ocr: false\nocr_dpi: 200\n",
        )?;

        let settings = Settings::from_yaml_file(&path)?;

        expect_that!(
            settings,
            eq(&Settings {
                allow_ocr: false,
                ocr_dpi: 200,
                ..Settings::default()
            })
        );
        Ok(())
    }

    #[gtest]
    fn test_file_with_invalid_settings_is_rejected() -> anyhow::Result<()> {
        let dir = fixture_dir()?;
        let path = write_fixture(dir.path(), "settings.yaml", "ocr_languages: []\n")?;

        expect_that!(
            Settings::from_yaml_file(&path),
            err(anyhow_downcasts_to::<SettingsError, _>(eq(
                SettingsError::NoOcrLanguages
            )))
        );
        Ok(())
    }

    #[gtest]
    fn test_unknown_key_is_rejected() -> anyhow::Result<()> {
        let dir = fixture_dir()?;
        let path = write_fixture(dir.path(), "settings.yaml", "quality_treshold: 10\n")?;

        expect_that!(Settings::from_yaml_file(&path), err(anything()));
        Ok(())
    }

    #[gtest]
    fn test_validate_rejects_floor_above_threshold() {
        let settings = Settings {
            quality_threshold: 10,
            extraction_floor: 20,
            ..Settings::default()
        };

        expect_that!(
            settings.validate(),
            err(anyhow_downcasts_to::<SettingsError, _>(eq(
                SettingsError::FloorAboveThreshold("extraction_floor")
            )))
        );
    }

    #[gtest]
    fn test_validate_rejects_zero_threshold() {
        let settings = Settings {
            quality_threshold: 0,
            ..Settings::default()
        };

        expect_that!(
            settings.validate(),
            err(anyhow_downcasts_to::<SettingsError, _>(eq(
                SettingsError::ZeroQualityThreshold
            )))
        );
    }

    #[gtest]
    fn test_extension_allowed_ignores_case() {
        let settings = Settings::default();
        expect_true!(settings.extension_allowed(Path::new("/data/extract.PDF")));
        expect_true!(settings.extension_allowed(Path::new("extract.pdf")));
        expect_false!(settings.extension_allowed(Path::new("extract.docx")));
        expect_false!(settings.extension_allowed(Path::new("extract")));
    }
}
