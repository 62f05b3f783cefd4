//! Name canonicalization tables.
//!
//! Data entry across reports is inconsistent, so carrier, shipper and
//! commodity names that very likely denote the same entity are collapsed to
//! one representative spelling. Only the more common variants are covered.
//! Lookups are exact and case-sensitive; anything unmapped passes through.

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const COMMODITY_GROUPS: &[(&str, &str)] = &[
    (
        "PAINT INCLUDING PAINT  LACQUER  ENAMEL  STAIN  SHELLAC SOLUTIONS  VARNISH  POLISH  LIQUID FILLER AND LIQUID LACQUER BASE",
        "PAINT OR RELATED",
    ),
    (
        "PAINT RELATED MATERIAL INCLUDING PAINT THINNING  DRYING  REMOVING  OR REDUCING COMPOUND",
        "PAINT OR RELATED",
    ),
    ("PAINT", "PAINT OR RELATED"),
    (
        "GASOLINE INCLUDES GASOLINE MIXED WITH ETHYL ALCOHOL  WITH NOT MORE THAN 10% ALCOHOL",
        "GASOLINE",
    ),
    (
        "GASOHOL GASOLINE MIXED WITH ETHYL ALCOHOL  WITH NOT MORE THAN 10% ALCOHOL",
        "GASOLINE",
    ),
    (
        "PRINTING INK  FLAMMABLE OR PRINTING INK RELATED MATERIAL (INCLUDING PRINTING INK THINNING OR REDUCING COMPOUND)  FLAMMABLE",
        "PRINTING INK OR RELATED",
    ),
];

const CARRIER_GROUPS: &[(&str, &str)] = &[
    ("FEDEX GROUND PACKAGE SYSTEM  INC.", "FEDEX"),
    ("FEDEX FREIGHT  INC.", "FEDEX"),
    ("FEDERAL EXPRESS CORPORATION", "FEDEX"),
    ("UNITED PARCEL SERVICE", "UPS"),
    ("UNITED PARCEL SERVICE  INC.", "UPS"),
    ("UNITED PARCEL SERVICE OF AMERICA  INC.", "UPS"),
    ("UPS GROUND FREIGHT  INC.", "UPS"),
    ("UNITED PARCEL SERVICE CO.", "UPS"),
    ("YRC WORLDWIDE INC.", "YRC"),
    ("YRC INC.", "YRC"),
    ("YRC GLOBAL", "YRC"),
    ("CON-WAY FREIGHT INC.", "CON-WAY"),
    ("CON-WAY FREIGHT INC", "CON-WAY"),
    ("CON-WAY FREIGHT  INC", "CON-WAY"),
    ("CON-WAY CENTRAL EXPRESS INC.", "CON-WAY"),
    ("CONWAY CENTRAL EXPRESS", "CON-WAY"),
];

const SHIPPER_GROUPS: &[(&str, &str)] = &[
    ("FUJIFILM NORTH AMERICA CORPORATION", "FUJIFILM"),
    ("FUJIFILM CORP", "FUJIFILM"),
    ("FUJIFILM ELECTRONIC MATERIALS U.S.A.  INC.", "FUJIFILM"),
    ("FUJIFILM U.S.A.  INC.", "FUJIFILM"),
    ("FUJI PHOTO FILM", "FUJIFILM"),
    ("FUJI FILM PHOTO", "FUJIFILM"),
    ("THE SHERWIN-WILLIAMS COMPANY", "THE SHERWIN-WILLIAMS COMPANY"),
    (
        "SHERWIN-WILLIAMS AUTOMOTIVE FINISHES CORP.",
        "THE SHERWIN-WILLIAMS COMPANY",
    ),
    ("THE VALSPAR CORPORATION", "VALSPAR"),
    ("VALSPAR CORP", "VALSPAR"),
    ("VALSPAR", "VALSPAR"),
    ("FISHER SCIENTIFIC COMPANY LLC", "FISHER SCIENTIFIC COMPANY"),
    (
        "FISHER SCIENTIFIC INTERNATIONAL  INC.",
        "FISHER SCIENTIFIC COMPANY",
    ),
    ("FISHER SCIENTIFIC COMPANY L.L.C.", "FISHER SCIENTIFIC COMPANY"),
    ("VWR INTERNATIONAL  LLC", "VWR INTERNATIONAL"),
    ("VWR INTERNATIONAL LLC", "VWR INTERNATIONAL"),
];

static BUILTIN: OnceLock<TranslationTable> = OnceLock::new();

/// `field name → raw value → canonical value`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationTable {
    fields: BTreeMap<String, HashMap<String, String>>,
}

impl TranslationTable {
    /// The compiled-in tables, built on first use.
    pub fn builtin() -> &'static TranslationTable {
        BUILTIN.get_or_init(|| {
            let mut table = TranslationTable::default();
            for (field, groups) in [
                ("Commod_Long_Name", COMMODITY_GROUPS),
                ("C_R_Name", CARRIER_GROUPS),
                ("Ship_Name", SHIPPER_GROUPS),
            ] {
                for (raw, canonical) in groups {
                    table.insert(field, raw, canonical);
                }
            }
            table
        })
    }

    /// Loads replacement tables from a YAML map of maps.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Opening translations file {path:?}"))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing translations file {path:?}"))
    }

    pub fn insert(&mut self, field: &str, raw: &str, canonical: &str) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .insert(raw.to_string(), canonical.to_string());
    }

    pub fn canonicalize<'a>(&'a self, field: &str, raw: &'a str) -> &'a str {
        self.fields
            .get(field)
            .and_then(|values| values.get(raw))
            .map(String::as_str)
            .unwrap_or(raw)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.fields.values().map(HashMap::len).sum()
    }
}

/// Looks `raw` up in the built-in tables.
pub fn canonicalize<'a>(field: &str, raw: &'a str) -> &'a str {
    TranslationTable::builtin().canonicalize(field, raw)
}
