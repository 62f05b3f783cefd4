pub mod cli;
pub mod data;
pub mod error;
pub mod import;
pub mod io_utils;
pub mod layout;
pub mod query;
pub mod report;
pub mod schema;
pub mod store;
pub mod table;
pub mod translate;

use std::{env, sync::OnceLock};

use anyhow::{Result, ensure};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("hazmat_questions", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => {
            info!(
                "Importing '{}' with layout '{}'",
                args.data.display(),
                args.layout.display()
            );
            import::execute(&args)
        }
        Commands::Report(args) => report::execute(&args),
        Commands::Columns(args) => handle_columns(&args),
    }
}

fn handle_columns(args: &cli::ColumnsArgs) -> Result<()> {
    ensure!(
        args.database.exists(),
        "Database {:?} does not exist; run the import first",
        args.database
    );
    let store = store::Store::open(&args.database)?;
    ensure!(
        store.table_exists(schema::LAYOUT_TABLE)?,
        "Database {:?} has no stored layout",
        args.database
    );
    let fields = store.load_layout()?;
    store.close()?;
    table::layout_table(&fields).print();
    Ok(())
}
