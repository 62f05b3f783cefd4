//! I/O utilities for CSV reading, decoding, and delimiter resolution.
//!
//! Both input files (the layout description and the incident data) flow
//! through this module. It provides:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//!   Invalid byte sequences are discarded instead of failing the run.
//! - **Reader construction**: `open_csv_reader` and `open_csv_reader_from_path`.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const BYTE_ORDER_MARK: char = '\u{feff}';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Builds a CSV reader. `flexible` readers accept rows whose length differs
/// from the header, which the layout loader needs in order to report short
/// rows itself.
pub fn open_csv_reader<R>(
    reader: R,
    delimiter: u8,
    has_headers: bool,
    flexible: bool,
) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(flexible);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
    flexible: bool,
) -> Result<csv::Reader<BufReader<File>>> {
    let reader =
        BufReader::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?);
    Ok(open_csv_reader(reader, delimiter, has_headers, flexible))
}

/// Decodes one cell, dropping any byte sequence that is invalid in
/// `encoding`. The flag is `true` when something was discarded.
pub fn decode_lossy(bytes: &[u8], encoding: &'static Encoding) -> (String, bool) {
    if encoding == UTF_8 {
        let mut text = String::with_capacity(bytes.len());
        let mut discarded = false;
        for chunk in bytes.utf8_chunks() {
            text.push_str(chunk.valid());
            discarded |= !chunk.invalid().is_empty();
        }
        return (text, discarded);
    }
    let (decoded, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        let cleaned = decoded
            .chars()
            .filter(|ch| *ch != char::REPLACEMENT_CHARACTER)
            .collect();
        (cleaned, true)
    } else {
        (decoded.into_owned(), false)
    }
}

/// Decodes a whole record. Returns the decoded cells and the positions of
/// cells that lost bytes during decoding.
pub fn decode_record_lossy(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> (Vec<String>, Vec<usize>) {
    let mut cells = Vec::with_capacity(record.len());
    let mut damaged = Vec::new();
    for (idx, field) in record.iter().enumerate() {
        let (text, discarded) = decode_lossy(field, encoding);
        if discarded {
            damaged.push(idx);
        }
        cells.push(text);
    }
    (cells, damaged)
}

/// Reads and decodes the header row, trimming names and removing a leading
/// byte order mark.
pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers().context("Reading header row")?.clone();
    let (cells, _) = decode_record_lossy(&headers, encoding);
    Ok(cells
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let name = if idx == 0 {
                name.trim_start_matches(BYTE_ORDER_MARK).to_string()
            } else {
                name
            };
            name.trim().to_string()
        })
        .collect())
}
