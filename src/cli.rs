use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load hazardous-materials incident exports and answer canned questions about them",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rebuild the database from a layout file and an incident export
    Import(ImportArgs),
    /// Run the question catalog and write one JSON file per question
    Report(ReportArgs),
    /// Print the stored layout as a table
    Columns(ColumnsArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Layout file describing each incident column (name, title, type, description)
    #[arg(short, long)]
    pub layout: PathBuf,
    /// Incident data file whose header matches the layout names
    #[arg(short = 'i', long = "data")]
    pub data: PathBuf,
    /// Database file to (re)create
    #[arg(short, long)]
    pub database: PathBuf,
    /// YAML file replacing the built-in name translation tables
    #[arg(long)]
    pub translations: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Database file produced by `import`
    #[arg(short, long)]
    pub database: PathBuf,
    /// Directory receiving the question-<name>.json files
    #[arg(short, long = "output-dir")]
    pub output_dir: PathBuf,
    /// Earliest incident year to include (defaults to 2000)
    #[arg(long = "min-year", conflicts_with = "all_years")]
    pub min_year: Option<i32>,
    /// Include incidents from every year
    #[arg(long = "all-years")]
    pub all_years: bool,
    /// Only run the named questions (repeatable or comma-separated)
    #[arg(long = "only", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub only: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Database file produced by `import`
    #[arg(short, long)]
    pub database: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
