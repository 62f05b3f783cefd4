//! Question catalog and SQL compilation.
//!
//! Each [`QuerySpec`] is a declarative description of one report question.
//! [`compile`] checks every referenced field against the stored schema and
//! renders a single `SELECT` whose result columns are all cast to text; the
//! accompanying [`OutputColumn`]s tell the report writer how to shape them.
//!
//! Counting is always by distinct report number, and record questions keep
//! only the lowest-`id` row of each report so a multi-row report shows up
//! once.

use anyhow::{Result, bail};

use crate::{
    error::QueryError,
    schema::{
        ColumnKind, ID_COLUMN, INCIDENTS_TABLE, IncidentSchema, NUMERIC_SPEC,
        REPORT_NUMBER_FIELD, grouped_column_name, quote_ident,
    },
};

/// Earliest incident year included unless the caller overrides it.
pub const DEFAULT_MIN_YEAR: i32 = 2000;

const DATE_FIELD: &str = "Date_Inc";
const TIME_FIELD: &str = "Time_Inc";
const DAMAGES_FIELD: &str = "Tot_Amt_of_Damages";
const RELEASED_FIELD: &str = "Quant_Released";
const UNIT_FIELD: &str = "Unit_of_Measure";

/// Columns emitted by every record question.
pub const RECORD_COLUMNS: [&str; 13] = [
    "Rpt_Num",
    "C_R_Name",
    "Ship_Name",
    "Mode_Transpo",
    "Tot_Amt_of_Damages",
    "Date_Inc",
    "Time_Inc",
    "What_Failed_Desc",
    "How_Failed_Desc",
    "Commod_Long_Name",
    "Quant_Released",
    "Unit_of_Measure",
    "Desc_of_Events",
];

const COUNT_LABEL: &str = "count";
const KEY_ALIAS: &str = "key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Field(String),
    /// Calendar year of a date field.
    Year(String),
    /// Hour of an `HHMM` time value.
    Hour(String),
    /// Value truncated toward zero to a multiple of 1000.
    Thousands(String),
}

impl Expr {
    pub fn field(&self) -> &str {
        match self {
            Expr::Field(f) | Expr::Year(f) | Expr::Hour(f) | Expr::Thousands(f) => f,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Expr::Field(f) => f,
            Expr::Year(_) => "year",
            Expr::Hour(_) => "hour",
            Expr::Thousands(_) => "money_thousands",
        }
    }

    fn output_kind(&self, schema: &IncidentSchema) -> ColumnKind {
        match self {
            Expr::Field(f) => schema.column(f).map_or(ColumnKind::Text, |c| c.kind),
            Expr::Year(_) | Expr::Hour(_) | Expr::Thousands(_) => ColumnKind::Integer,
        }
    }

    fn sql(&self) -> String {
        let column = quote_ident(self.field());
        let numeric = NUMERIC_SPEC.signature();
        match self {
            Expr::Field(_) => column,
            Expr::Year(_) => format!("CAST(year(TRY_CAST({column} AS DATE)) AS BIGINT)"),
            Expr::Hour(_) => {
                format!("CAST(trunc(TRY_CAST({column} AS {numeric}) / 100) AS BIGINT)")
            }
            Expr::Thousands(_) => {
                format!("CAST(trunc(TRY_CAST({column} AS {numeric}) / 1000) * 1000 AS BIGINT)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Equals { field: String, value: String },
    YearAtLeast { field: String, year: i32 },
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(field: &str, value: &str) -> Self {
        Predicate::Equals {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Equals { field, .. } | Predicate::YearAtLeast { field, .. } => {
                out.push(field)
            }
            Predicate::All(parts) => parts.iter().for_each(|p| p.collect_fields(out)),
        }
    }

    fn sql(&self, schema: &IncidentSchema, params: &mut Vec<String>) -> String {
        match self {
            Predicate::Equals { field, value } => {
                params.push(value.clone());
                let placeholder = match schema.column(field).map(|c| c.kind) {
                    None | Some(ColumnKind::Text) => "?".to_string(),
                    Some(kind) => format!("CAST(? AS {})", kind.sql_type()),
                };
                format!("{} = {placeholder}", quote_ident(field))
            }
            Predicate::YearAtLeast { field, year } => {
                params.push(year.to_string());
                format!(
                    "{} >= CAST(? AS BIGINT)",
                    Expr::Year(field.clone()).sql()
                )
            }
            Predicate::All(parts) if parts.is_empty() => "TRUE".to_string(),
            Predicate::All(parts) => parts
                .iter()
                .map(|p| format!("({})", p.sql(schema, params)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Total,
    Grouped { key: Expr },
    Records { columns: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    Count,
    Key,
    Column(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub name: String,
    pub kind: QueryKind,
    pub filter: Option<Predicate>,
    pub ordering: Option<(OrderKey, Direction)>,
    pub limit: Option<usize>,
}

impl QuerySpec {
    fn new(name: &str, kind: QueryKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            filter: None,
            ordering: None,
            limit: None,
        }
    }

    pub fn grouped(name: &str, key: Expr) -> Self {
        Self::new(name, QueryKind::Grouped { key })
    }

    pub fn records(name: &str) -> Self {
        Self::new(
            name,
            QueryKind::Records {
                columns: RECORD_COLUMNS.iter().map(|c| c.to_string()).collect(),
            },
        )
    }

    pub fn with_filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            None => predicate,
            Some(Predicate::All(mut parts)) => {
                parts.push(predicate);
                Predicate::All(parts)
            }
            Some(existing) => Predicate::All(vec![existing, predicate]),
        });
        self
    }

    pub fn order_by(mut self, key: OrderKey, direction: Direction) -> Self {
        self.ordering = Some((key, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Every stored column this question reads.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = vec![REPORT_NUMBER_FIELD];
        match &self.kind {
            QueryKind::Total => {}
            QueryKind::Grouped { key } => fields.push(key.field()),
            QueryKind::Records { columns } => fields.extend(columns.iter().map(String::as_str)),
        }
        if let Some(filter) = &self.filter {
            filter.collect_fields(&mut fields);
        }
        if let Some((OrderKey::Column(column), _)) = &self.ordering {
            fields.push(column);
        }
        fields
    }
}

/// The full question list. `min_year` restricts every question to incidents
/// dated in or after that year; `None` keeps all years.
pub fn catalog(min_year: Option<i32>) -> Vec<QuerySpec> {
    let count_desc = |spec: QuerySpec| spec.order_by(OrderKey::Count, Direction::Desc);
    let field = |name: &str| Expr::Field(name.to_string());
    let grouped = |name: &str| Expr::Field(grouped_column_name(name));
    let column = |name: &str| OrderKey::Column(name.to_string());

    let mut specs = vec![
        QuerySpec::new("incidents_total", QueryKind::Total),
        QuerySpec::grouped("incidents_by_year", Expr::Year(DATE_FIELD.to_string()))
            .order_by(OrderKey::Key, Direction::Asc),
        count_desc(QuerySpec::grouped(
            "incidents_by_hour",
            Expr::Hour(TIME_FIELD.to_string()),
        )),
        count_desc(QuerySpec::grouped(
            "incidents_by_transportation",
            field("Mode_Transpo"),
        )),
        count_desc(QuerySpec::grouped("incidents_by_zip", field("Inc_Zip"))),
        count_desc(QuerySpec::grouped("incidents_by_city", field("Inc_City"))),
        count_desc(QuerySpec::grouped(
            "incidents_by_orig_state",
            field("Orig_State"),
        )),
        count_desc(QuerySpec::grouped(
            "incidents_by_weather_cond",
            field("Weather_Cond"),
        )),
        count_desc(QuerySpec::grouped(
            "incidents_by_monetary_damage",
            Expr::Thousands(DAMAGES_FIELD.to_string()),
        )),
        count_desc(QuerySpec::grouped(
            "incidents_by_material",
            grouped("Commod_Long_Name"),
        ))
        .limit(100),
        count_desc(QuerySpec::grouped(
            "incidents_by_carrier",
            grouped("C_R_Name"),
        ))
        .limit(100),
        count_desc(QuerySpec::grouped(
            "incidents_by_shipper",
            grouped("Ship_Name"),
        ))
        .limit(100),
        QuerySpec::records("explosion_incidents")
            .with_filter(Predicate::equals("Explosion_Result_Ind", "Yes"))
            .order_by(column(DATE_FIELD), Direction::Asc),
        QuerySpec::records("fatal_incidents")
            .with_filter(Predicate::equals("HMIS_Serious_Fatal", "Yes"))
            .order_by(column("Tot_Hazmat_Fatal"), Direction::Desc),
        QuerySpec::records("undeclared_incidents")
            .with_filter(Predicate::equals("Undeclared_Shpmt", "Yes"))
            .order_by(column(DATE_FIELD), Direction::Asc),
        QuerySpec::records("most_expensive_incidents")
            .order_by(column(DAMAGES_FIELD), Direction::Desc)
            .limit(10),
        QuerySpec::records("most_released_incidents")
            .order_by(column(RELEASED_FIELD), Direction::Desc)
            .limit(20),
    ];
    for unit in ["SLB", "LGA", "GCF", "CI"] {
        specs.push(
            QuerySpec::records(&format!(
                "most_released_incidents_{}",
                unit.to_ascii_lowercase()
            ))
            .with_filter(Predicate::equals(UNIT_FIELD, unit))
            .order_by(column(RELEASED_FIELD), Direction::Desc)
            .limit(10),
        );
    }

    match min_year {
        Some(year) => specs
            .into_iter()
            .map(|spec| {
                spec.with_filter(Predicate::YearAtLeast {
                    field: DATE_FIELD.to_string(),
                    year,
                })
            })
            .collect(),
        None => specs,
    }
}

/// Picks catalog entries by name, keeping catalog order.
pub fn select<'a>(specs: &'a [QuerySpec], names: &[String]) -> Result<Vec<&'a QuerySpec>> {
    if names.is_empty() {
        return Ok(specs.iter().collect());
    }
    for name in names {
        if !specs.iter().any(|s| &s.name == name) {
            return Err(QueryError::UnknownQuery { name: name.clone() }.into());
        }
    }
    Ok(specs.iter().filter(|s| names.contains(&s.name)).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub label: String,
    pub kind: ColumnKind,
}

impl OutputColumn {
    fn new(label: &str, kind: ColumnKind) -> Self {
        Self {
            label: label.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<String>,
    pub columns: Vec<OutputColumn>,
}

/// Validates `spec` against `schema` and renders it as SQL.
pub fn compile(spec: &QuerySpec, schema: &IncidentSchema) -> Result<CompiledQuery> {
    for field in spec.referenced_fields() {
        if schema.column(field).is_none() {
            return Err(QueryError::UnknownField {
                query: spec.name.clone(),
                field: field.to_string(),
            }
            .into());
        }
    }

    let mut params = Vec::new();
    let where_clause = spec
        .filter
        .as_ref()
        .map(|f| format!(" WHERE {}", f.sql(schema, &mut params)))
        .unwrap_or_default();
    let limit_clause = spec
        .limit
        .map(|n| format!(" LIMIT {n}"))
        .unwrap_or_default();
    let report = quote_ident(REPORT_NUMBER_FIELD);
    let count = quote_ident(COUNT_LABEL);

    let (sql, columns) = match &spec.kind {
        QueryKind::Total => (
            format!(
                "SELECT CAST(count(DISTINCT {report}) AS VARCHAR) FROM {INCIDENTS_TABLE}{where_clause}"
            ),
            vec![OutputColumn::new(COUNT_LABEL, ColumnKind::Integer)],
        ),
        QueryKind::Grouped { key } => {
            let key_alias = quote_ident(KEY_ALIAS);
            let order = match &spec.ordering {
                Some((OrderKey::Count, dir)) => format!("{count} {} NULLS LAST, ", dir.sql()),
                Some((OrderKey::Key, dir)) => format!("{key_alias} {} NULLS LAST, ", dir.sql()),
                Some((OrderKey::Column(column), _)) => {
                    bail!(
                        "Query '{}' orders by column '{column}' but groups by '{}'",
                        spec.name,
                        key.label()
                    )
                }
                None => String::new(),
            };
            (
                format!(
                    "SELECT CAST({key_alias} AS VARCHAR), CAST({count} AS VARCHAR) FROM (\
                     SELECT {} AS {key_alias}, count(DISTINCT {report}) AS {count} \
                     FROM {INCIDENTS_TABLE}{where_clause} GROUP BY {key_alias}\
                     ) ORDER BY {order}{key_alias} ASC NULLS LAST{limit_clause}",
                    key.sql()
                ),
                vec![
                    OutputColumn::new(key.label(), key.output_kind(schema)),
                    OutputColumn::new(COUNT_LABEL, ColumnKind::Integer),
                ],
            )
        }
        QueryKind::Records { columns } => {
            let id = quote_ident(ID_COLUMN);
            let order = match &spec.ordering {
                Some((OrderKey::Column(column), dir)) => {
                    format!("{} {} NULLS LAST, ", quote_ident(column), dir.sql())
                }
                Some((other, _)) => {
                    bail!(
                        "Query '{}' lists records but orders by {other:?}",
                        spec.name
                    )
                }
                None => String::new(),
            };
            let select = columns
                .iter()
                .map(|c| format!("CAST({} AS VARCHAR)", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            let output = columns
                .iter()
                .map(|c| {
                    let kind = schema.column(c).map_or(ColumnKind::Text, |col| col.kind);
                    OutputColumn::new(c, kind)
                })
                .collect();
            (
                format!(
                    "SELECT {select} FROM (\
                     SELECT * FROM {INCIDENTS_TABLE}{where_clause} \
                     QUALIFY row_number() OVER (PARTITION BY {report} ORDER BY {id}) = 1\
                     ) ORDER BY {order}{id} ASC{limit_clause}"
                ),
                output,
            )
        }
    };

    Ok(CompiledQuery {
        sql,
        params,
        columns,
    })
}
