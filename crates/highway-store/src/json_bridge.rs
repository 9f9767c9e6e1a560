use std::fs;
use std::path::Path;

use highway_core::{Tables, export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Import a JSON table export file, replacing the stored tables.
    pub fn import_json_file(&self, path: &Path) -> Result<Tables> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {e}", path.display()),
            ))
        })?;
        self.import_json_str(&json)
    }

    /// Import a JSON table export. Tables that would not restore are rejected
    /// before anything is written.
    pub fn import_json_str(&self, json: &str) -> Result<Tables> {
        let tables =
            import_json(json).map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        tables.clone().into_state()?;
        self.save_tables(&tables)?;
        tracing::info!(
            metas = tables.metas.len(),
            instances = tables.instances.len(),
            edges = tables.edges.len(),
            "imported JSON tables"
        );
        Ok(tables)
    }

    pub fn export_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json_string()?;
        fs::write(path, json).map_err(|e| {
            StoreError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to write {}: {e}", path.display()),
            ))
        })
    }

    pub fn export_json_string(&self) -> Result<String> {
        let tables = self.load_tables()?;
        export_json(&tables).map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }
}
