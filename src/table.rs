//! Plain-text column-aligned tables for console output.

use std::{borrow::Cow, fmt::Write as _};

use crate::layout::FieldDefinition;

const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; missing trailing cells render blank and extra cells are
    /// dropped.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells
            .into_iter()
            .take(self.headers.len())
            .map(Into::into)
            .collect();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| display_width(h)).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(display_width(cell));
            }
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", format_row(&self.headers, &widths));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
        let rule_widths: Vec<usize> = widths.iter().map(|w| (*w).max(3)).collect();
        let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
        for row in &self.rows {
            let _ = writeln!(output, "{}", format_row(row, &widths));
        }
        output
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

/// Stored layout in position order.
pub fn layout_table(fields: &[FieldDefinition]) -> Table {
    let mut table = Table::new(["#", "name", "type", "title", "description"]);
    for (idx, field) in fields.iter().enumerate() {
        table.push_row([
            (idx + 1).to_string(),
            field.name.clone(),
            field.declared_type.to_string(),
            field.title.clone(),
            field.description.clone(),
        ]);
    }
    table
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.truncate(line.trim_end().len());
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

/// Layout descriptions are free text; keep each row on one line.
fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
