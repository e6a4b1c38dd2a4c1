use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

pub const TESTS_TABLE: &str = "Tests";
pub const QUESTIONS_TABLE: &str = "Questions";
pub const WRITING_PROMPTS_TABLE: &str = "WritingPrompts";
pub const SUBMISSIONS_TABLE: &str = "Submissions";

pub type Row = Vec<String>;

/// The whole storage contract: whole-range read, append, clear+rewrite.
/// No indexes, no row updates, no transactions. Everything above this trait
/// has to live with that.
pub trait RowStore {
    fn get_rows(&self, table: &str) -> Result<Vec<Row>, StoreError>;
    fn append_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<(), StoreError>;
    fn clear_and_rewrite(&mut self, table: &str, rows: Vec<Row>) -> Result<(), StoreError>;
}

const WORKBOOK_FILE: &str = "examdesk.workbook.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkbookFile {
    tables: BTreeMap<String, Vec<Row>>,
}

/// File-backed row store: all tables in one JSON workbook under the selected
/// workspace directory. Every call reads and rewrites the whole file, which
/// matches the cost model of the storage contract rather than fighting it.
pub struct WorkbookStore {
    path: PathBuf,
}

impl WorkbookStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(workspace)?;
        let path = workspace.join(WORKBOOK_FILE);
        if !path.is_file() {
            let empty = WorkbookFile::default();
            fs::write(&path, serde_json::to_vec_pretty(&empty)?)?;
            debug!(path = %path.display(), "created empty workbook");
        }
        Ok(WorkbookStore { path })
    }

    fn load(&self) -> Result<WorkbookFile, StoreError> {
        let bytes = fs::read(&self.path)
            .map_err(|e| StoreError::Unavailable(format!("read workbook: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Unavailable(format!("parse workbook: {}", e)))
    }

    fn save(&self, file: &WorkbookFile) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(file)
            .map_err(|e| StoreError::Unavailable(format!("serialize workbook: {}", e)))?;
        fs::write(&self.path, bytes)
            .map_err(|e| StoreError::Unavailable(format!("write workbook: {}", e)))
    }
}

impl RowStore for WorkbookStore {
    fn get_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let file = self.load()?;
        Ok(file.tables.get(table).cloned().unwrap_or_default())
    }

    fn append_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut file = self.load()?;
        file.tables.entry(table.to_string()).or_default().extend(rows);
        self.save(&file)
    }

    fn clear_and_rewrite(&mut self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let mut file = self.load()?;
        file.tables.insert(table.to_string(), rows);
        self.save(&file)
    }
}

/// In-memory row store with the same contract, for unit tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowStore for MemoryStore {
    fn get_rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    fn append_rows(&mut self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        self.tables.entry(table.to_string()).or_default().extend(rows);
        Ok(())
    }

    fn clear_and_rewrite(&mut self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        self.tables.insert(table.to_string(), rows);
        Ok(())
    }
}
