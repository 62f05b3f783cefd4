//! Runs catalog questions against the store and writes one JSON artifact per
//! question.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::ser::PrettyFormatter;

use crate::{
    cli::ReportArgs,
    query::{self, DEFAULT_MIN_YEAR, OutputColumn, QuerySpec},
    schema::{ColumnKind, INCIDENTS_TABLE, IncidentSchema, LAYOUT_TABLE, REPORTS_TABLE},
    store::Store,
};

/// One shaped result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl CellValue {
    /// Shapes a raw text cell according to the column it came from.
    pub fn from_raw(raw: Option<&str>, kind: ColumnKind) -> Result<Self> {
        let Some(raw) = raw else {
            return Ok(CellValue::Null);
        };
        Ok(match kind {
            ColumnKind::Text => CellValue::Text(raw.to_string()),
            ColumnKind::Integer => CellValue::Integer(
                raw.parse()
                    .with_context(|| format!("Parsing '{raw}' as integer"))?,
            ),
            ColumnKind::Numeric => CellValue::Decimal(
                Decimal::from_str(raw).with_context(|| format!("Parsing '{raw}' as decimal"))?,
            ),
            ColumnKind::Date => CellValue::Date(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("Parsing '{raw}' as date"))?,
            ),
        })
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Integer(i) => serializer.serialize_i64(*i),
            // Going through the decimal text gives the nearest f64.
            CellValue::Decimal(d) => match d.normalize().to_string().parse::<f64>() {
                Ok(f) => serializer.serialize_f64(f),
                Err(_) => serializer.serialize_none(),
            },
            CellValue::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
        }
    }
}

/// Ordered `(label, value)` pairs; serializes as a JSON object in column
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub cells: Vec<(String, CellValue)>,
}

impl ResultRow {
    pub fn get(&self, label: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| value)
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (label, value) in &self.cells {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

pub fn execute(args: &ReportArgs) -> Result<()> {
    ensure!(
        args.database.exists(),
        "Database {:?} does not exist; run the import first",
        args.database
    );
    let min_year = if args.all_years {
        None
    } else {
        Some(args.min_year.unwrap_or(DEFAULT_MIN_YEAR))
    };
    let specs = query::catalog(min_year);
    let selected = query::select(&specs, &args.only)?;

    let store = Store::open(&args.database)?;
    for table in [LAYOUT_TABLE, REPORTS_TABLE, INCIDENTS_TABLE] {
        ensure!(
            store.table_exists(table)?,
            "Database {:?} has no '{table}' table; run the import first",
            args.database
        );
    }
    let schema = IncidentSchema::from_fields(&store.load_layout()?)
        .context("Rebuilding incident schema from stored layout")?;
    let counts = store.counts()?;
    info!("Layout rows: {}", counts.layout);
    info!("Report rows: {}", counts.reports);
    info!("Incident rows: {}", counts.incidents);
    match min_year {
        Some(year) => info!("Restricting questions to incidents from {year} onward"),
        None => info!("Including incidents from all years"),
    }

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Creating output directory {:?}", args.output_dir))?;
    for spec in selected {
        let rows = run_query(&store, &schema, spec)?;
        let path = write_artifact(&args.output_dir, &spec.name, &rows)?;
        info!("Question '{}': {} row(s) written to {path:?}", spec.name, rows.len());
    }
    store.close()
}

/// Executes one question and shapes its rows.
pub fn run_query(
    store: &Store,
    schema: &IncidentSchema,
    spec: &QuerySpec,
) -> Result<Vec<ResultRow>> {
    let compiled = query::compile(spec, schema)?;
    debug!("Question '{}':\n{}", spec.name, compiled.sql);
    let raw = store
        .query_rows(&compiled.sql, &compiled.params, compiled.columns.len())
        .with_context(|| format!("Running question '{}'", spec.name))?;
    raw.into_iter()
        .map(|cells| shape_row(&compiled.columns, cells))
        .collect()
}

fn shape_row(columns: &[OutputColumn], cells: Vec<Option<String>>) -> Result<ResultRow> {
    let cells = columns
        .iter()
        .zip(cells)
        .map(|(column, raw)| {
            CellValue::from_raw(raw.as_deref(), column.kind)
                .with_context(|| format!("Shaping column '{}'", column.label))
                .map(|value| (column.label.clone(), value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ResultRow { cells })
}

pub fn artifact_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("question-{name}.json"))
}

/// Writes `rows` as a 4-space indented JSON array and returns the file path.
pub fn write_artifact(dir: &Path, name: &str, rows: &[ResultRow]) -> Result<PathBuf> {
    let path = artifact_path(dir, name);
    let file = File::create(&path).with_context(|| format!("Creating artifact {path:?}"))?;
    let mut writer = BufWriter::new(file);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    rows.serialize(&mut serializer)
        .with_context(|| format!("Serializing artifact {path:?}"))?;
    writer
        .flush()
        .with_context(|| format!("Flushing artifact {path:?}"))?;
    Ok(path)
}
