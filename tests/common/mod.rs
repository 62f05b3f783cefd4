#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use encoding_rs::UTF_8;
use hazmat_questions::{
    import::import_dataset,
    io_utils,
    layout::{self, FieldDefinition},
    store::{Store, StoreCounts},
    translate::TranslationTable,
};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Field definitions from the bundled layout fixture.
pub fn fixture_layout() -> Vec<FieldDefinition> {
    layout::load_layout(&fixture_path("layout.csv"), b',', UTF_8).expect("fixture layout")
}

/// Imports CSV text into `store` with the built-in translations.
pub fn import_str(
    store: &mut Store,
    fields: &[FieldDefinition],
    data: &str,
) -> anyhow::Result<StoreCounts> {
    import_with(store, fields, data, TranslationTable::builtin())
}

pub fn import_with(
    store: &mut Store,
    fields: &[FieldDefinition],
    data: &str,
    translations: &TranslationTable,
) -> anyhow::Result<StoreCounts> {
    let reader = io_utils::open_csv_reader(data.as_bytes(), b',', true, false);
    import_dataset(store, fields, reader, UTF_8, translations)
}

/// A store loaded with the incident fixture.
pub fn fixture_store() -> Store {
    let mut store = Store::open_in_memory().expect("store");
    let data = std::fs::read_to_string(fixture_path("incidents.csv")).expect("fixture data");
    import_str(&mut store, &fixture_layout(), &data).expect("import fixture");
    store
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
