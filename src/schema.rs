//! Incident table descriptor derived from the layout.
//!
//! [`IncidentSchema`] is built once from the loaded [`FieldDefinition`]s and
//! is the single source of truth for the storage DDL, per-value coercion and
//! the field checks done by the question catalog.
//!
//! ## Responsibilities
//!
//! - Mapping declared layout types onto storage column kinds
//! - Appending the generated columns (`id` and the `grouped_*` names)
//! - Rendering `CREATE TABLE` statements for the three tables
//! - Decimal precision/scale used for numeric columns

use std::fmt;

use anyhow::Result;
use rust_decimal::Decimal;

use crate::{
    error::LayoutError,
    layout::{FieldDefinition, FieldType},
};

pub const INCIDENTS_TABLE: &str = "incidents";
pub const REPORTS_TABLE: &str = "reports";
pub const LAYOUT_TABLE: &str = "layout";

pub const ID_COLUMN: &str = "id";
pub const REPORT_NUMBER_FIELD: &str = "Rpt_Num";

/// Fields that receive a canonicalized `grouped_<field>` companion column.
pub const GROUPED_FIELDS: [&str; 3] = ["Commod_Long_Name", "C_R_Name", "Ship_Name"];

/// Storage precision for every numeric layout field.
pub const NUMERIC_SPEC: DecimalSpec = DecimalSpec {
    precision: 28,
    scale: 8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalSpec {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalSpec {
    /// Whether `value` has few enough integer digits to be stored.
    pub fn fits(&self, value: &Decimal) -> bool {
        10i128
            .checked_pow(self.precision.saturating_sub(self.scale))
            .and_then(|bound| Decimal::try_from_i128_with_scale(bound, 0).ok())
            .is_none_or(|bound| value.abs() < bound)
    }

    pub fn signature(&self) -> String {
        format!("DECIMAL({},{})", self.precision, self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Numeric,
    Date,
    Integer,
}

impl ColumnKind {
    pub fn sql_type(&self) -> String {
        match self {
            ColumnKind::Text => "TEXT".to_string(),
            ColumnKind::Numeric => NUMERIC_SPEC.signature(),
            ColumnKind::Date => "DATE".to_string(),
            ColumnKind::Integer => "BIGINT".to_string(),
        }
    }
}

impl From<FieldType> for ColumnKind {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::Text => ColumnKind::Text,
            FieldType::Numeric => ColumnKind::Numeric,
            FieldType::Date => ColumnKind::Date,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone)]
pub struct IncidentSchema {
    fields: Vec<FieldDefinition>,
    columns: Vec<ColumnDef>,
}

impl IncidentSchema {
    pub fn from_fields(fields: &[FieldDefinition]) -> Result<Self> {
        let grouped = GROUPED_FIELDS.map(grouped_column_name);
        let mut columns = Vec::with_capacity(fields.len() + grouped.len() + 1);
        columns.push(ColumnDef {
            name: ID_COLUMN.to_string(),
            kind: ColumnKind::Integer,
        });
        for (idx, field) in fields.iter().enumerate() {
            // Storage identifiers are case-insensitive.
            let reserved = field.name.eq_ignore_ascii_case(ID_COLUMN)
                || grouped.iter().any(|g| g.eq_ignore_ascii_case(&field.name));
            if reserved {
                return Err(LayoutError::ReservedName {
                    name: field.name.clone(),
                }
                .into());
            }
            if let Some(existing) = fields[..idx]
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(&field.name))
            {
                return Err(LayoutError::NameCollision {
                    name: field.name.clone(),
                    existing: existing.name.clone(),
                }
                .into());
            }
            columns.push(ColumnDef {
                name: field.name.clone(),
                kind: field.declared_type.into(),
            });
        }
        for name in grouped {
            columns.push(ColumnDef {
                name,
                kind: ColumnKind::Text,
            });
        }
        Ok(Self {
            fields: fields.to_vec(),
            columns,
        })
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All incident columns: `id`, one per layout field, then the grouped
    /// columns.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn create_incidents_sql(&self) -> String {
        let body = self
            .columns
            .iter()
            .map(|column| {
                let mut line = format!("    {} {}", quote_ident(&column.name), column.kind);
                if column.name == ID_COLUMN {
                    line.push_str(" PRIMARY KEY");
                }
                line
            })
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE {INCIDENTS_TABLE} (\n{body}\n);")
    }
}

pub fn create_layout_sql() -> String {
    format!(
        "CREATE TABLE {LAYOUT_TABLE} (
    name TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    title TEXT,
    column_type TEXT,
    description TEXT
);"
    )
}

pub fn create_reports_sql() -> String {
    format!(
        "CREATE TABLE {REPORTS_TABLE} (\n    {} TEXT PRIMARY KEY\n);",
        quote_ident(REPORT_NUMBER_FIELD)
    )
}

pub fn grouped_column_name(field: &str) -> String {
    format!("grouped_{field}")
}

/// Quotes an identifier for use in SQL, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
