use std::str::FromStr;

use chrono::NaiveDate;
use hazmat_questions::{
    data::{Value, parse_typed_value},
    layout::FieldType,
    translate::{TranslationTable, canonicalize},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn field_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Commod_Long_Name"),
        Just("C_R_Name"),
        Just("Ship_Name"),
        Just("Mode_Transpo"),
    ]
}

proptest! {
    #[test]
    fn lowercase_names_are_never_rewritten(field in field_strategy(), raw in "[a-z0-9 .-]{0,40}") {
        prop_assert_eq!(canonicalize(field, &raw), raw.as_str());
    }

    #[test]
    fn canonical_names_are_fixed_points(field in field_strategy(), raw in "[A-Z .]{1,40}") {
        let once = canonicalize(field, &raw);
        let twice = canonicalize(field, once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn custom_table_lookups_are_exact(raw in "[A-Z]{1,12}", canonical in "[A-Z]{1,12}") {
        let mut table = TranslationTable::default();
        table.insert("C_R_Name", &raw, &canonical);
        prop_assert_eq!(table.canonicalize("C_R_Name", &raw), canonical.as_str());
        let padded = format!(" {raw}");
        prop_assert_eq!(table.canonicalize("C_R_Name", &padded), padded.as_str());
        prop_assert_eq!(table.canonicalize("Ship_Name", &raw), raw.as_str());
    }

    #[test]
    fn numeric_cells_keep_their_decimal_value(
        whole in -1_000_000_000i64..1_000_000_000,
        cents in 0u32..100,
    ) {
        let text = format!("{whole}.{cents:02}");
        let expected = Decimal::from_str(&text).unwrap();
        let padded = format!("  {text} ");
        prop_assert_eq!(
            parse_typed_value(&padded, FieldType::Numeric).unwrap(),
            Some(Value::Numeric(expected))
        );
    }

    #[test]
    fn iso_and_slash_dates_agree(day in 0i64..20_000) {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Duration::days(day);
        let iso = date.format("%Y-%m-%d").to_string();
        let slash = date.format("%m/%d/%Y").to_string();
        prop_assert_eq!(
            parse_typed_value(&iso, FieldType::Date).unwrap(),
            Some(Value::Date(date))
        );
        prop_assert_eq!(
            parse_typed_value(&slash, FieldType::Date).unwrap(),
            Some(Value::Date(date))
        );
    }

    #[test]
    fn text_cells_are_trimmed_but_never_absent(raw in "[ A-Za-z0-9]{0,20}") {
        prop_assume!(raw != "NULL");
        prop_assert_eq!(
            parse_typed_value(&raw, FieldType::Text).unwrap(),
            Some(Value::Text(raw.trim().to_string()))
        );
    }
}
