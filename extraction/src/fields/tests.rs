use googletest::prelude::*;
use test_casing::{TestCases, cases, test_casing};

use super::*;

const SAMPLE_EXTRACT: &str = "\
Выписка из Единого государственного реестра недвижимости об объекте недвижимости
Кадастровый номер: 74:36:0303005:454
Адрес (местоположение): Челябинская область, г. Челябинск,
  ул. Лесопарковая, д. 7

Площадь, кв.м: 13351 +/-40 м²
Кадастровая стоимость, руб.: 54 512 345,67
Категория земель: Земли населенных пунктов
Виды разрешенного использования: для размещения  технопарка
Правообладатель (правообладатели): 1.1 Муниципальное образование \"город Челябинск\"
Вид ограничения (обременения): Аренда
Срок действия: с 02.09.2025 по 31.12.2040
Арендатор: ООО \"УК ТЕХНОПАРК ЛД\"
";

fn extract(text: &str) -> ExtractionRecord {
    FieldExtractor::new(PatternRegistry::builtin()).extract_all(text)
}

#[gtest]
#[test_log::test]
fn test_extract_all_from_sample() {
    let record = extract(SAMPLE_EXTRACT);

    expect_that!(
        record,
        pat!(ExtractionRecord {
            cadastral_number: some(eq("74:36:0303005:454")),
            address: some(eq(
                "Челябинская область, г. Челябинск, ул. Лесопарковая, д. 7"
            )),
            area: some(eq("13351 +/-40")),
            owner: some(eq("Муниципальное образование \"город Челябинск\"")),
            permitted_use: some(eq("для размещения технопарка")),
            cadastral_cost: some(eq("54 512 345,67")),
            land_category: some(eq("Земли населенных пунктов")),
            rental_info: some(anything()),
        })
    );
    expect_that!(record.found_count(), eq(8));
}

#[gtest]
fn test_rental_info_from_sample() {
    let rental = extract(SAMPLE_EXTRACT).rental_info;

    expect_that!(
        rental,
        some(pat!(RentalInfo {
            rent_type: some(eq("Аренда")),
            period_start: some(eq("02.09.2025")),
            period_end: some(eq("31.12.2040")),
            tenant: some(eq("ООО \"УК ТЕХНОПАРК ЛД\"")),
        }))
    );
}

#[gtest]
fn test_rental_info_without_type() {
    let text = "Период аренды с 02.09.2025 по 31.12.2040\nАрендатор: ООО \"УК ТЕХНОПАРК ЛД\"";

    let rental = FieldExtractor::new(PatternRegistry::builtin()).extract_rental_info(text);

    expect_that!(rental, some(anything()));
    let rental = rental.unwrap();
    expect_that!(rental.period_start(), some(eq("02.09.2025")));
    expect_that!(rental.period_end(), some(eq("31.12.2040")));
    expect_that!(rental.tenant(), some(eq("ООО \"УК ТЕХНОПАРК ЛД\"")));
}

#[gtest]
fn test_no_rental_lines_gives_no_rental_info() {
    let text = "Кадастровый номер: 74:36:0303005:454\nКатегория земель: Земли промышленности";

    expect_that!(
        FieldExtractor::new(PatternRegistry::builtin()).extract_rental_info(text),
        none()
    );
}

#[gtest]
fn test_all_keys_serialized_when_nothing_matches() -> anyhow::Result<()> {
    let record = extract("совершенно посторонний текст");

    expect_that!(record, eq(&ExtractionRecord::default()));
    let value = serde_json::to_value(&record)?;
    let object = value.as_object().unwrap();
    expect_that!(
        object.keys().cloned().collect::<Vec<String>>(),
        unordered_elements_are![
            eq("cadastral_number"),
            eq("address"),
            eq("area"),
            eq("owner"),
            eq("permitted_use"),
            eq("cadastral_cost"),
            eq("land_category"),
            eq("rental_info"),
        ]
    );
    expect_true!(object.values().all(|v| v.is_null()));
    Ok(())
}

#[gtest]
fn test_cadastral_number_whitespace_removed() {
    let extractor = FieldExtractor::new(PatternRegistry::builtin());
    expect_that!(
        extractor.extract_cadastral_number("номер 74:36 :0303005: 454 участка"),
        some(eq("74:36:0303005:454"))
    );
}

#[gtest]
fn test_cadastral_number_after_label_colon() {
    let extractor = FieldExtractor::new(PatternRegistry::builtin());
    expect_that!(
        extractor.extract_cadastral_number("Кадастровый номер:74:36:0303005:454"),
        some(eq("74:36:0303005:454"))
    );
    expect_that!(
        extractor.extract_cadastral_number("Кадастровый номер:\n74:36:0303005:454"),
        some(eq("74:36:0303005:454"))
    );
}

const AREA_CASES: TestCases<(&str, &str)> = cases! {
    [
        ("Площадь: 13351 +/-40 м²", "13351 +/-40"),
        ("Площадь: 13351+/-40", "13351 +/-40"),
        ("Площадь, м2: 1 250 ± 12", "1250 ±12"),
        ("Площадь: 800", "800"),
        ("Площадь: 45.6 кв. м", "45.6"),
        ("Площадь (м²): 500", "500"),
    ]
};

#[test_casing(6, AREA_CASES)]
fn test_area_keeps_numeral_format(text: &str, expected: &str) {
    let extractor = FieldExtractor::new(PatternRegistry::builtin());
    assert_that!(extractor.extract_area(text), some(eq(expected)));
}

#[gtest]
fn test_empty_marker_is_not_a_value() {
    let text = "Категория земель: -\nВиды разрешенного использования: Отсутствует";

    let record = extract(text);

    expect_that!(record.land_category, none());
    expect_that!(record.permitted_use, none());
}

#[gtest]
fn test_rental_info_from_parts_all_absent() {
    expect_that!(RentalInfo::from_parts(None, None, None, None), none());
    expect_that!(
        RentalInfo::from_parts(None, None, None, Some("ИП Иванов".to_string()))
            .as_ref()
            .and_then(RentalInfo::tenant),
        some(eq("ИП Иванов"))
    );
}
