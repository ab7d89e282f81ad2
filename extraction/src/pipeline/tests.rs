use std::{path::Path, sync::Arc};

use anyhow::Result;
use googletest::prelude::*;
use testutils::{fixture_dir, write_fixture};

use super::*;
use crate::acquisition::fakes::*;

const EXTRACT_TEXT: &str = "\
Кадастровый номер: 74:36:0303005:454
Площадь: 13351 +/-40 м²
Категория земель: Земли населенных пунктов
Срок действия: с 02.09.2025 по 31.12.2040
Арендатор: ООО \"УК ТЕХНОПАРК ЛД\"";

fn coordinator(fakes: &FakeBackends, settings: Settings) -> Coordinator<'static> {
    Coordinator::new(fakes.backends(), settings, PatternRegistry::builtin())
}

fn structured_only(text: &str) -> FakeBackends {
    FakeBackends {
        structured: Some(Arc::new(FakeStructuredReader::new(vec![FakePage::text(
            text,
        )]))),
        ..Default::default()
    }
}

#[gtest]
#[test_log::test]
fn test_process_extracts_fields() -> Result<()> {
    let dir = fixture_dir()?;
    let pdf = write_fixture(dir.path(), "extract.pdf", "%PDF-1.7")?;
    let fakes = structured_only(EXTRACT_TEXT);

    let record = coordinator(&fakes, Settings::default()).process(&pdf)?;

    expect_that!(record.cadastral_number, some(eq("74:36:0303005:454")));
    expect_that!(record.area, some(eq("13351 +/-40")));
    expect_that!(record.land_category, some(eq("Земли населенных пунктов")));
    expect_that!(
        record.rental_info.as_ref().and_then(|rental| rental.tenant()),
        some(eq("ООО \"УК ТЕХНОПАРК ЛД\""))
    );
    expect_that!(record.owner, none());
    Ok(())
}

#[gtest]
fn test_process_rejects_text_at_extraction_floor() -> Result<()> {
    let dir = fixture_dir()?;
    let pdf = write_fixture(dir.path(), "scan.pdf", "%PDF-1.7")?;
    // GIVEN: OCR is the only strategy, and recognises exactly 20 characters.
    let fakes = FakeBackends {
        rasterizer: Some(Arc::new(FakeRasterizer::new(1))),
        ocr: Some(Arc::new(FakeOcrEngine::new("12345678901234567890"))),
        ..Default::default()
    };

    // WHEN: the document is processed.
    let result = coordinator(&fakes, Settings::default()).process(&pdf);

    // THEN: no fields are extracted from the text.
    expect_that!(
        result.as_ref().err().map(ProcessFailure::reason),
        some(eq(FailureReason::EmptyOrUnreadable))
    );
    expect_true!(matches!(
        result,
        Err(ProcessFailure::EmptyOrUnreadable { chars: 20 })
    ));
    Ok(())
}

#[gtest]
fn test_process_honours_ocr_setting() -> Result<()> {
    let dir = fixture_dir()?;
    let pdf = write_fixture(dir.path(), "scan.pdf", "%PDF-1.7")?;
    let fakes = FakeBackends {
        rasterizer: Some(Arc::new(FakeRasterizer::new(1))),
        ocr: Some(Arc::new(FakeOcrEngine::new(EXTRACT_TEXT))),
        ..Default::default()
    };
    let settings = Settings {
        allow_ocr: false,
        ..Settings::default()
    };

    let result = coordinator(&fakes, settings).process(&pdf);

    expect_that!(
        result.as_ref().err().map(ProcessFailure::reason),
        some(eq(FailureReason::UnreadableFile))
    );
    expect_that!(fakes.ocr.as_ref().unwrap().calls(), eq(0));
    Ok(())
}

#[gtest]
#[test_log::test]
fn test_extract_text_from_missing_pdf_is_none() {
    let fakes = structured_only(EXTRACT_TEXT);

    expect_that!(
        coordinator(&fakes, Settings::default())
            .extract_text_from_pdf(Path::new("/nonexistent/extract.pdf"), true),
        none()
    );
}

#[gtest]
fn test_extract_text_from_pdf_without_ocr_is_none_under_threshold() -> Result<()> {
    let dir = fixture_dir()?;
    let pdf = write_fixture(dir.path(), "scan.pdf", "%PDF-1.7")?;
    let fakes = FakeBackends {
        structured: Some(Arc::new(FakeStructuredReader::new(vec![FakePage::text(
            "Выписка из ЕГРН",
        )]))),
        rasterizer: Some(Arc::new(FakeRasterizer::new(1))),
        ocr: Some(Arc::new(FakeOcrEngine::new(EXTRACT_TEXT))),
        ..Default::default()
    };
    let coordinator = coordinator(&fakes, Settings::default());

    expect_that!(coordinator.extract_text_from_pdf(&pdf, false), none());
    expect_that!(
        coordinator.extract_text_from_pdf(&pdf, true),
        some(eq(EXTRACT_TEXT))
    );
    Ok(())
}

#[gtest]
fn test_extract_all_data_matches_library_entry_point() {
    let fakes = FakeBackends::default();

    expect_that!(
        coordinator(&fakes, Settings::default()).extract_all_data(EXTRACT_TEXT),
        eq(&crate::extract_all_data(EXTRACT_TEXT))
    );
}

#[gtest]
fn test_failure_reasons_display_as_names() {
    expect_that!(
        ProcessFailure::EmptyOrUnreadable { chars: 3 }.reason(),
        displays_as(eq("EmptyOrUnreadable"))
    );
    expect_that!(
        ProcessFailure::from(AcquireError::InsufficientText { best_chars: 12 }).reason(),
        eq(FailureReason::InsufficientText)
    );
}
