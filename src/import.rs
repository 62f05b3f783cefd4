//! Full-reload import of the layout and incident files.
//!
//! Every run drops and recreates the three tables, writes the layout, then
//! streams the incident file row by row: each cell is coerced according to
//! its declared type, the grouped names are looked up in the translation
//! tables, and rows are committed in transactions of [`BATCH_SIZE`]. A
//! failure inside a batch leaves only earlier batches durable; rerunning the
//! import rebuilds identical contents.

use std::{collections::HashSet, io::Read};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info, warn};

use crate::{
    cli::ImportArgs,
    data::{Value, parse_typed_value},
    error::{EncodingError, ImportError},
    io_utils,
    layout::{self, FieldDefinition, FieldType},
    schema::{GROUPED_FIELDS, IncidentSchema, REPORT_NUMBER_FIELD, grouped_column_name},
    store::{IncidentRecord, Store, StoreCounts},
    translate::TranslationTable,
};

/// Rows per committed transaction.
pub const BATCH_SIZE: usize = 100;

/// Verified table counts after a successful import.
pub type ImportSummary = StoreCounts;

pub fn execute(args: &ImportArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let layout_delimiter = io_utils::resolve_input_delimiter(&args.layout, args.delimiter);
    let fields = layout::load_layout(&args.layout, layout_delimiter, encoding)?;
    info!(
        "Loaded {} field definition(s) from {:?}",
        fields.len(),
        args.layout
    );

    let loaded;
    let translations = match &args.translations {
        Some(path) => {
            loaded = TranslationTable::load(path)?;
            info!(
                "Using {} translation(s) across {} field(s) from {path:?}",
                loaded.mapping_count(),
                loaded.field_count()
            );
            &loaded
        }
        None => TranslationTable::builtin(),
    };

    let data_delimiter = io_utils::resolve_input_delimiter(&args.data, args.delimiter);
    let reader = io_utils::open_csv_reader_from_path(&args.data, data_delimiter, true, false)?;

    let mut store = Store::open(&args.database)?;
    let counts = import_dataset(&mut store, &fields, reader, encoding, translations)
        .with_context(|| format!("Importing {:?} into {:?}", args.data, args.database))?;
    store.close()?;

    info!("Layout rows: {}", counts.layout);
    info!("Report rows: {}", counts.reports);
    info!("Incident rows: {}", counts.incidents);
    Ok(())
}

/// Replaces the stored dataset with `fields` and the rows of `reader`.
///
/// Returns the verified table counts.
pub fn import_dataset<R: Read>(
    store: &mut Store,
    fields: &[FieldDefinition],
    mut reader: csv::Reader<R>,
    encoding: &'static Encoding,
    translations: &TranslationTable,
) -> Result<ImportSummary> {
    let schema = IncidentSchema::from_fields(fields)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let plan = ColumnPlan::new(&schema, &headers)?;

    store.reset(&schema)?;
    store.write_layout(schema.fields())?;
    info!("Imported {} layout row(s)", schema.fields().len());

    info!("Importing incident data...");
    let mut seen_reports: HashSet<String> = HashSet::new();
    let mut pending_reports: Vec<String> = Vec::new();
    let mut pending: Vec<IncidentRecord> = Vec::with_capacity(BATCH_SIZE);
    let mut processed: u64 = 0;

    let mut record = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("Reading row {}", processed + 2))?
    {
        let line = record.position().map_or(processed + 2, |p| p.line());
        let id = i64::try_from(processed + 1).context("Incident identifier overflow")?;
        let incident = plan.build_record(id, &record, line, encoding, translations)?;

        match incident.get(REPORT_NUMBER_FIELD) {
            Some(report) => {
                let report = report.as_display();
                if seen_reports.insert(report.clone()) {
                    pending_reports.push(report);
                }
            }
            None => warn!("Line {line}: incident has no report number"),
        }
        pending.push(incident);
        processed += 1;

        if pending.len() == BATCH_SIZE {
            store.write_batch(&schema, &pending_reports, &pending)?;
            pending.clear();
            pending_reports.clear();
            debug!("{processed} incident row(s) committed");
        }
    }
    if !pending.is_empty() || !pending_reports.is_empty() {
        store.write_batch(&schema, &pending_reports, &pending)?;
        debug!("{processed} incident row(s) committed");
    }

    let counts = store.counts()?;
    verify_count("layout", schema.fields().len() as u64, counts.layout)?;
    verify_count("reports", seen_reports.len() as u64, counts.reports)?;
    verify_count("incidents", processed, counts.incidents)?;
    Ok(counts)
}

fn verify_count(table: &'static str, expected: u64, actual: u64) -> Result<()> {
    if expected != actual {
        return Err(ImportError::CountMismatch {
            table,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Maps data header positions onto declared fields and grouped columns.
struct ColumnPlan {
    columns: Vec<(String, FieldType)>,
    grouped: Vec<(String, Option<usize>)>,
}

impl ColumnPlan {
    fn new(schema: &IncidentSchema, headers: &[String]) -> Result<Self> {
        let mut columns: Vec<(String, FieldType)> = Vec::with_capacity(headers.len());
        for header in headers {
            let field = schema
                .field(header)
                .ok_or_else(|| ImportError::UnknownColumn {
                    column: header.clone(),
                })?;
            if columns.iter().any(|(name, _)| name == header) {
                return Err(ImportError::DuplicateColumn {
                    column: header.clone(),
                }
                .into());
            }
            columns.push((field.name.clone(), field.declared_type));
        }
        if !headers.iter().any(|h| h == REPORT_NUMBER_FIELD) {
            return Err(ImportError::MissingReportNumber {
                column: REPORT_NUMBER_FIELD.to_string(),
            }
            .into());
        }
        let grouped = GROUPED_FIELDS
            .iter()
            .map(|field| (field.to_string(), headers.iter().position(|h| h == *field)))
            .collect();
        Ok(Self { columns, grouped })
    }

    fn build_record(
        &self,
        id: i64,
        record: &csv::ByteRecord,
        line: u64,
        encoding: &'static Encoding,
        translations: &TranslationTable,
    ) -> Result<IncidentRecord> {
        let (cells, damaged) = io_utils::decode_record_lossy(record, encoding);
        for idx in damaged {
            if let Some((name, _)) = self.columns.get(idx) {
                warn!(
                    "{}",
                    EncodingError {
                        field: name.clone(),
                        line,
                    }
                );
            }
        }

        let mut values = Vec::with_capacity(self.columns.len() + self.grouped.len());
        for ((name, ty), raw) in self.columns.iter().zip(&cells) {
            let value = parse_typed_value(raw, *ty).map_err(|source| {
                debug!("{source:#}");
                ImportError::TypeCoercion {
                    field: name.clone(),
                    value: raw.clone(),
                    expected: *ty,
                    line,
                }
            })?;
            values.push((name.clone(), value));
        }

        for (field, position) in &self.grouped {
            let grouped = position
                .and_then(|idx| values.get(idx))
                .and_then(|(_, value)| value.as_ref())
                .map(|value| match value {
                    Value::Text(text) => translations.canonicalize(field, text).to_string(),
                    other => other.as_display(),
                });
            values.push((grouped_column_name(field), grouped.map(Value::Text)));
        }

        Ok(IncidentRecord { id, values })
    }
}
