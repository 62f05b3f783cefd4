//! `DuckDB` storage handle.
//!
//! One database file holds three tables: `layout` (the persisted field
//! definitions), `reports` (one row per distinct report number) and
//! `incidents` (one row per source CSV line, columns derived from the
//! layout). The handle is opened at the start of a batch job and closed
//! explicitly at its end.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use duckdb::{Connection, params, params_from_iter, types::Value as SqlValue};
use log::debug;

use crate::{
    data::Value,
    layout::{FieldDefinition, FieldType},
    schema::{
        self, ColumnKind, INCIDENTS_TABLE, ID_COLUMN, IncidentSchema, LAYOUT_TABLE,
        REPORT_NUMBER_FIELD, REPORTS_TABLE, quote_ident,
    },
};

/// One incident row ready for storage. `values` is an ordered association
/// of column name to coerced value; every record in a batch carries the same
/// column names in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentRecord {
    pub id: i64,
    pub values: Vec<(String, Option<Value>)>,
}

impl IncidentRecord {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_ref())
    }
}

/// Row counts of the three tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub layout: u64,
    pub reports: u64,
    pub incidents: u64,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating database directory {parent:?}"))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("Opening database {path:?}"))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Opening in-memory database")?;
        Ok(Self { conn })
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| err)
            .context("Closing database")
    }

    /// Drops every table (children before parents) and recreates them from
    /// `schema`.
    pub fn reset(&mut self, schema: &IncidentSchema) -> Result<()> {
        let sql = format!(
            "DROP TABLE IF EXISTS {INCIDENTS_TABLE};
             DROP TABLE IF EXISTS {REPORTS_TABLE};
             DROP TABLE IF EXISTS {LAYOUT_TABLE};
             {}
             {}
             {}",
            schema::create_layout_sql(),
            schema::create_reports_sql(),
            schema.create_incidents_sql(),
        );
        debug!("Recreating tables:\n{sql}");
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql).context("Recreating tables")?;
        tx.commit().context("Committing table reset")?;
        Ok(())
    }

    pub fn write_layout(&mut self, fields: &[FieldDefinition]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {LAYOUT_TABLE} (name, position, title, column_type, description)
                 VALUES (?, ?, ?, ?, ?)"
            ))?;
            for (position, field) in fields.iter().enumerate() {
                stmt.execute(params![
                    field.name,
                    position as i64,
                    field.title,
                    field.declared_type.as_token(),
                    field.description,
                ])
                .with_context(|| format!("Writing layout row '{}'", field.name))?;
            }
        }
        tx.commit().context("Committing layout rows")?;
        Ok(())
    }

    /// Writes one batch in a single transaction: new report numbers first,
    /// then the incident rows. Nothing from the batch is visible unless the
    /// whole batch commits.
    pub fn write_batch(
        &mut self,
        schema: &IncidentSchema,
        reports: &[String],
        records: &[IncidentRecord],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut report_stmt = tx.prepare(&format!(
                "INSERT INTO {REPORTS_TABLE} ({}) VALUES (?) ON CONFLICT DO NOTHING",
                quote_ident(REPORT_NUMBER_FIELD)
            ))?;
            for report in reports {
                report_stmt
                    .execute(params![report])
                    .with_context(|| format!("Writing report '{report}'"))?;
            }

            if let Some(first) = records.first() {
                let sql = insert_incident_sql(schema, first);
                let mut incident_stmt = tx.prepare(&sql)?;
                for record in records {
                    let mut values = Vec::with_capacity(record.values.len() + 1);
                    values.push(SqlValue::BigInt(record.id));
                    values.extend(record.values.iter().map(|(_, v)| to_sql_value(v.as_ref())));
                    incident_stmt
                        .execute(params_from_iter(values))
                        .with_context(|| format!("Writing incident {}", record.id))?;
                }
            }
        }
        tx.commit().context("Committing incident batch")?;
        Ok(())
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            layout: self.count_rows(LAYOUT_TABLE)?,
            reports: self.count_rows(REPORTS_TABLE)?,
            incidents: self.count_rows(INCIDENTS_TABLE)?,
        })
    }

    fn count_rows(&self, table: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))
            .with_context(|| format!("Counting rows in {table}"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Reads the persisted layout back in its original order.
    pub fn load_layout(&self) -> Result<Vec<FieldDefinition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, title, column_type, description FROM {LAYOUT_TABLE} ORDER BY position"
        ))?;
        let rows = stmt.query_map([], |row| {
            let column_type: Option<String> = row.get(2)?;
            Ok(FieldDefinition {
                name: row.get(0)?,
                title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                declared_type: FieldType::from_token(column_type.as_deref().unwrap_or_default()),
                description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?;
        let mut fields = Vec::new();
        for row in rows {
            fields.push(row.context("Reading layout row")?);
        }
        Ok(fields)
    }

    /// Runs a query whose result columns are all text and returns the raw
    /// cells. `width` is the number of selected columns.
    pub fn query_rows(
        &self,
        sql: &str,
        params: &[String],
        width: usize,
    ) -> Result<Vec<Vec<Option<String>>>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Preparing query:\n{sql}"))?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            (0..width)
                .map(|idx| row.get::<_, Option<String>>(idx))
                .collect::<duckdb::Result<Vec<_>>>()
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Reading query row")?);
        }
        Ok(out)
    }

    /// Fetches one incident by identifier, mainly for inspection and tests.
    pub fn incident(
        &self,
        schema: &IncidentSchema,
        id: i64,
    ) -> Result<Option<Vec<Option<String>>>> {
        let select = schema
            .columns()
            .iter()
            .map(|c| format!("CAST({} AS VARCHAR)", quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select} FROM {INCIDENTS_TABLE} WHERE {} = CAST(? AS BIGINT)",
            quote_ident(ID_COLUMN)
        );
        let rows = self.query_rows(&sql, &[id.to_string()], schema.columns().len())?;
        Ok(rows.into_iter().next())
    }
}

fn insert_incident_sql(schema: &IncidentSchema, template: &IncidentRecord) -> String {
    let mut columns = vec![quote_ident(ID_COLUMN)];
    let mut placeholders = vec!["?".to_string()];
    for (name, _) in &template.values {
        columns.push(quote_ident(name));
        let kind = schema.column(name).map_or(ColumnKind::Text, |c| c.kind);
        placeholders.push(match kind {
            ColumnKind::Text => "?".to_string(),
            other => format!("CAST(? AS {})", other.sql_type()),
        });
    }
    format!(
        "INSERT OR REPLACE INTO {INCIDENTS_TABLE} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn to_sql_value(value: Option<&Value>) -> SqlValue {
    match value {
        None => SqlValue::Null,
        Some(Value::Text(s)) => SqlValue::Text(s.clone()),
        Some(Value::Numeric(d)) => SqlValue::Text(d.to_string()),
        Some(Value::Date(d)) => SqlValue::Text(d.format("%Y-%m-%d").to_string()),
    }
}
