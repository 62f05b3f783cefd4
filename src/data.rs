use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow, ensure};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::{layout::FieldType, schema::NUMERIC_SPEC};

/// Raw token that marks an absent value regardless of declared type.
pub const NULL_TOKEN: &str = "NULL";

/// A coerced incident cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Numeric(Decimal),
    Date(NaiveDate),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Numeric(d) => d.normalize().to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_decimal(value: &str) -> Result<Decimal> {
    let trimmed = value.trim();
    let parsed = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| anyhow!("Failed to parse '{value}' as decimal"))?
        .round_dp(NUMERIC_SPEC.scale);
    ensure!(
        NUMERIC_SPEC.fits(&parsed),
        "'{value}' does not fit {}",
        NUMERIC_SPEC.signature()
    );
    Ok(parsed)
}

/// Parses a calendar date from the spellings found in incident exports.
/// Slash forms are read month-first. Two-digit-year formats are tried before
/// their four-digit counterparts because `%Y` would otherwise accept `14` as
/// the year 14.
pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%m/%d/%y",
        "%m/%d/%Y",
        "%Y/%m/%d",
        "%d-%b-%y",
        "%d-%b-%Y",
        "%d-%m-%Y",
        "%b %d, %Y",
        "%B %d, %Y",
        "%b %d %Y",
        "%Y%m%d",
    ];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    parse_naive_datetime(trimmed)
        .map(|dt| dt.date())
        .map_err(|_| anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_local());
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Coerces one raw cell according to its declared type.
///
/// `NULL` is absent for every type. Blank numeric and date cells are absent
/// too; blank text stays an empty string.
pub fn parse_typed_value(value: &str, ty: FieldType) -> Result<Option<Value>> {
    if value == NULL_TOKEN {
        return Ok(None);
    }
    let trimmed = value.trim();
    let parsed = match ty {
        FieldType::Text => Value::Text(trimmed.to_string()),
        FieldType::Numeric => {
            if trimmed.is_empty() {
                return Ok(None);
            }
            Value::Numeric(parse_decimal(trimmed)?)
        }
        FieldType::Date => {
            if trimmed.is_empty() {
                return Ok(None);
            }
            Value::Date(parse_naive_date(trimmed)?)
        }
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_token_is_absent_for_every_type() {
        for ty in [FieldType::Text, FieldType::Numeric, FieldType::Date] {
            assert_eq!(parse_typed_value("NULL", ty).unwrap(), None);
        }
        assert_eq!(
            parse_typed_value("null", FieldType::Text).unwrap(),
            Some(Value::Text("null".to_string()))
        );
    }

    #[test]
    fn blank_cells() {
        assert_eq!(parse_typed_value("  ", FieldType::Numeric).unwrap(), None);
        assert_eq!(parse_typed_value("", FieldType::Date).unwrap(), None);
        assert_eq!(
            parse_typed_value("  ", FieldType::Text).unwrap(),
            Some(Value::Text(String::new()))
        );
    }

    #[test]
    fn numeric_values_are_exact_decimals() {
        let parsed = parse_typed_value(" 1234.56 ", FieldType::Numeric)
            .unwrap()
            .unwrap();
        assert_eq!(parsed, Value::Numeric(Decimal::from_str("1234.56").unwrap()));
        assert_eq!(parse_decimal("1.5e3").unwrap(), Decimal::from(1500));
        assert!(parse_typed_value("12 gallons", FieldType::Numeric).is_err());
    }

    #[test]
    fn numeric_values_beyond_storage_precision_are_rejected() {
        assert!(parse_decimal("99999999999999999999.5").is_ok());
        assert!(parse_decimal("100000000000000000000").is_err());
        assert!(parse_decimal("1e21").is_err());
        assert!(parse_decimal("-1e20").is_err());
    }

    #[test]
    fn parse_naive_date_supports_export_formats() {
        let expected = NaiveDate::from_ymd_opt(2014, 3, 1).unwrap();
        for raw in [
            "2014-03-01",
            "3/1/2014",
            "03/01/14",
            "2014/03/01",
            "01-MAR-14",
            "01-Mar-2014",
            "Mar 1, 2014",
            "20140301",
            "2014-03-01 00:00:00",
            "3/1/2014 12:00:00 AM",
            "2014-03-01T08:30:00Z",
        ] {
            assert_eq!(parse_naive_date(raw).unwrap(), expected, "input {raw}");
        }
        assert!(parse_naive_date("sometime in March").is_err());
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(
            parse_typed_value("  UPS GROUND FREIGHT  INC. ", FieldType::Text).unwrap(),
            Some(Value::Text("UPS GROUND FREIGHT  INC.".to_string()))
        );
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            Value::Numeric(Decimal::from_str("1234.56000000").unwrap()).as_display(),
            "1234.56"
        );
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2014, 3, 1).unwrap()).as_display(),
            "2014-03-01"
        );
    }
}
