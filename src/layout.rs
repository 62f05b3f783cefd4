//! Layout loader.
//!
//! The layout file describes every incident column as a
//! `(name, title, type, description)` row. The first row is a header and is
//! skipped, as are rows with an empty name. Type tokens are matched
//! case-sensitively; anything other than `Numeric` or `Date` is text.

use std::{fmt, io::Read, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{error::LayoutError, io_utils};

const LAYOUT_COLUMNS: usize = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Numeric,
    Date,
}

impl FieldType {
    pub fn from_token(token: &str) -> Self {
        match token {
            "Numeric" => FieldType::Numeric,
            "Date" => FieldType::Date,
            _ => FieldType::Text,
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::Numeric => "Numeric",
            FieldType::Date => "Date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub title: String,
    pub declared_type: FieldType,
    pub description: String,
}

impl FieldDefinition {
    pub fn new(name: &str, declared_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            title: name.to_string(),
            declared_type,
            description: String::new(),
        }
    }
}

pub fn load_layout(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<FieldDefinition>> {
    let reader = io_utils::open_csv_reader_from_path(path, delimiter, true, true)?;
    read_layout(reader, encoding).with_context(|| format!("Loading layout from {path:?}"))
}

/// Reads field definitions from an already-open reader whose header row has
/// not been consumed yet.
pub fn read_layout<R: Read>(
    mut reader: csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<FieldDefinition>> {
    let mut fields: Vec<FieldDefinition> = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .context("Reading layout row")?
    {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record.len() < LAYOUT_COLUMNS {
            return Err(LayoutError::Malformed {
                line,
                found: record.len(),
            }
            .into());
        }
        let (cells, damaged) = io_utils::decode_record_lossy(&record, encoding);
        if !damaged.is_empty() {
            warn!("Discarded invalid bytes in layout row at line {line}");
        }
        let cell = |idx: usize| cells[idx].trim().to_string();
        let name = cell(0);
        if name.is_empty() {
            debug!("Skipping layout row at line {line} with empty name");
            continue;
        }
        let definition = FieldDefinition {
            name,
            title: cell(1),
            declared_type: FieldType::from_token(cells[2].trim()),
            description: cell(3),
        };
        match fields.iter_mut().find(|f| f.name == definition.name) {
            Some(existing) => {
                warn!(
                    "Layout field '{}' defined more than once; line {line} replaces the earlier definition",
                    definition.name
                );
                *existing = definition;
            }
            None => fields.push(definition),
        }
    }
    Ok(fields)
}
