use googletest::prelude::*;
use strum::IntoEnumIterator;
use testutils::anyhow_downcasts_to;

use super::{PatternKey, PatternRegistry, RegistryError, SUPPORTED_VERSION};

#[gtest]
fn test_builtin_has_rule_for_every_key() {
    let registry = PatternRegistry::builtin();
    expect_that!(registry.version(), eq(SUPPORTED_VERSION));
    for key in PatternKey::iter() {
        expect_that!(registry.lookup(key).map(|rule| rule.key), some(eq(key)));
    }
}

#[gtest]
fn test_builtin_is_shared() {
    let a: *const PatternRegistry = PatternRegistry::builtin();
    let b: *const PatternRegistry = PatternRegistry::builtin();
    expect_true!(std::ptr::eq(a, b));
}

#[gtest]
fn test_cadastral_rule_captures_number_in_prose() {
    let rule = PatternRegistry::builtin()
        .lookup(PatternKey::CadastralNumber)
        .unwrap();
    expect_that!(
        rule.first_capture("Земельный участок 74:36:0303005:454 расположен в городе"),
        some(eq("74:36:0303005:454"))
    );
}

#[gtest]
fn test_cadastral_rule_ignores_dates_and_times() {
    let rule = PatternRegistry::builtin()
        .lookup(PatternKey::CadastralNumber)
        .unwrap();
    expect_that!(
        rule.first_capture("Дата 02.09.2025, время 12:30:15"),
        none()
    );
    expect_that!(rule.first_capture("код 1:74:36:0303005:454"), none());
}

#[gtest]
fn test_rule_first_match_wins() {
    let rule = PatternRegistry::builtin()
        .lookup(PatternKey::CadastralNumber)
        .unwrap();
    expect_that!(
        rule.first_capture("74:36:0303005:454 и 74:36:0303005:999"),
        some(eq("74:36:0303005:454"))
    );
}

#[gtest]
fn test_rental_period_rule_captures_range() {
    let rule = PatternRegistry::builtin()
        .lookup(PatternKey::RentalPeriod)
        .unwrap();
    expect_that!(
        rule.first_range_capture("Срок действия: с 02.09.2025 по 31.12.2040"),
        some(eq(("02.09.2025", "31.12.2040")))
    );
}

const MINIMAL_RULES: &str = r#"
  cadastral_number: {pattern: '(\d+:\d+)', group: 1}
  address: {pattern: 'Адрес: (.+)', group: 1}
  area: {pattern: 'Площадь: (\d+)', group: 1}
  owner: {pattern: 'Правообладатель: (.+)', group: 1}
  permitted_use: {pattern: 'Использование: (.+)', group: 1}
  cadastral_cost: {pattern: 'Стоимость: (\d+)', group: 1}
  land_category: {pattern: 'Категория: (.+)', group: 1}
  rent_type: {pattern: 'вид: (.+)', group: 1}
  tenant: {pattern: 'Арендатор: (.+)', group: 1}
"#;

fn table_yaml(version: u32, rental_period_rule: &str) -> String {
    format!("version: {version}\nrules:{MINIMAL_RULES}{rental_period_rule}")
}

const VALID_RENTAL_PERIOD: &str =
    "  rental_period: {pattern: 'с (\\S+) по (\\S+)', group: 1, end_group: 2}\n";

#[gtest]
fn test_accepts_complete_table() {
    let registry = PatternRegistry::from_yaml_str(&table_yaml(1, VALID_RENTAL_PERIOD));
    expect_that!(registry, ok(anything()));
}

#[gtest]
fn test_rejects_missing_rule() {
    expect_that!(
        PatternRegistry::from_yaml_str(&table_yaml(1, "")),
        err(anyhow_downcasts_to::<RegistryError, _>(eq(
            RegistryError::MissingRule(PatternKey::RentalPeriod)
        )))
    );
}

#[gtest]
fn test_rejects_unsupported_version() {
    expect_that!(
        PatternRegistry::from_yaml_str(&table_yaml(99, VALID_RENTAL_PERIOD)),
        err(anyhow_downcasts_to::<RegistryError, _>(eq(
            RegistryError::UnsupportedVersion(99)
        )))
    );
    expect_that!(
        RegistryError::UnsupportedVersion(99).to_string(),
        eq("pattern table version 99 is not supported (expected 1)")
    );
}

#[gtest]
fn test_rejects_group_out_of_range() {
    let rule = "  rental_period: {pattern: 'с (\\S+) по (\\S+)', group: 3, end_group: 2}\n";
    expect_that!(
        PatternRegistry::from_yaml_str(&table_yaml(1, rule)),
        err(anyhow_downcasts_to::<RegistryError, _>(eq(
            RegistryError::GroupOutOfRange(PatternKey::RentalPeriod)
        )))
    );
}

#[gtest]
fn test_rejects_ranged_rule_without_end_group() {
    let rule = "  rental_period: {pattern: 'с (\\S+) по (\\S+)', group: 1}\n";
    expect_that!(
        PatternRegistry::from_yaml_str(&table_yaml(1, rule)),
        err(anyhow_downcasts_to::<RegistryError, _>(eq(
            RegistryError::MissingEndGroup(PatternKey::RentalPeriod)
        )))
    );
}

#[gtest]
fn test_rejects_invalid_regex() {
    let rule = "  rental_period: {pattern: 'с (\\S+ по (\\S+)', group: 1, end_group: 2}\n";
    expect_that!(
        PatternRegistry::from_yaml_str(&table_yaml(1, rule)),
        err(displays_as(contains_substring("compiling pattern for rental_period")))
    );
}

#[gtest]
fn test_rejects_unknown_field_key() {
    let rule = "  favourite_colour: {pattern: '(.+)', group: 1}\n";
    expect_that!(
        PatternRegistry::from_yaml_str(&table_yaml(1, rule)),
        err(anything())
    );
}

#[gtest]
fn test_loads_table_from_file() -> anyhow::Result<()> {
    let dir = testutils::fixture_dir()?;
    let path = testutils::write_fixture(
        dir.path(),
        "patterns.yaml",
        table_yaml(1, VALID_RENTAL_PERIOD),
    )?;

    let registry = PatternRegistry::from_yaml_file(&path)?;

    expect_that!(
        registry
            .lookup(PatternKey::Area)
            .and_then(|rule| rule.first_capture("Площадь: 42")),
        some(eq("42"))
    );
    Ok(())
}
