use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rusqlite::{Connection, params};
use serde::de::DeserializeOwned;

use highway_core::{
    Category, EdgeKind, EdgeRecord, InstanceId, InstanceNode, MetaEntry, MetaId, Tables, Vector,
};

use crate::error::{Result, StoreError};
use crate::schema;

pub struct Store {
    conn: Connection,
}

type MetaRow = (u64, String, String, f64, f64, u32, u32, String, String);
type InstanceRow = (u64, u64, String, u32, u32, u32, f64, String);

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Save ---

    /// Replace every stored row with `tables` in one transaction.
    pub fn save_tables(&self, tables: &Tables) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(
            "DELETE FROM graph_edges; DELETE FROM instance_nodes; DELETE FROM meta_entries;",
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO meta_entries (id, key, text, global_freq, private_freq, level,
                     crystallized_count, labels, category_vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for meta in &tables.metas {
                stmt.execute(params![
                    meta.id.0 as i64,
                    meta.key,
                    meta.text,
                    meta.global_freq,
                    meta.private_freq,
                    meta.level,
                    meta.crystallized_count,
                    to_json(&meta.labels)?,
                    to_json(meta.category_vector.as_slice())?,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO instance_nodes (id, meta_id, position, use_count, pass_count,
                     refractory, hub_penalty, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for node in &tables.instances {
                stmt.execute(params![
                    node.id.0 as i64,
                    node.meta_id.0 as i64,
                    to_json(node.position().as_slice())?,
                    node.stats.use_count,
                    node.stats.pass_count,
                    node.stats.refractory,
                    node.hub_penalty,
                    to_json(&node.payload)?,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO graph_edges (src_id, dst_id, kind, walk_count) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for edge in &tables.edges {
                stmt.execute(params![
                    edge.src.0 as i64,
                    edge.dst.0 as i64,
                    edge.kind.as_str(),
                    edge.walk_count,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            metas = tables.metas.len(),
            instances = tables.instances.len(),
            edges = tables.edges.len(),
            "tables saved"
        );
        Ok(())
    }

    // --- Load ---

    pub fn load_tables(&self) -> Result<Tables> {
        let mut metas = self.load_metas()?;
        let instances = self.load_instances()?;
        // Ownership is stored only on the instance side.
        for node in &instances {
            if let Some(meta) = metas
                .get_mut(node.meta_id.0 as usize)
                .filter(|m| m.id == node.meta_id)
            {
                meta.instances.insert(node.id);
            }
        }
        Ok(Tables {
            metas,
            instances,
            edges: self.load_edges()?,
        })
    }

    fn load_metas(&self) -> Result<Vec<MetaEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, key, text, global_freq, private_freq, level, crystallized_count,
                    labels, category_vector
             FROM meta_entries ORDER BY id",
        )?;

        let rows: Vec<MetaRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(
                |(id, key, text, global_freq, private_freq, level, crystallized_count, labels, vector)|
                 -> Result<MetaEntry> {
                    let vector: Vec<f64> = from_json(&vector, "category_vector")?;
                    let mut meta =
                        MetaEntry::new(MetaId(id), key, text, global_freq, Vector::new(vector));
                    meta.private_freq = private_freq;
                    meta.level = level;
                    meta.crystallized_count = crystallized_count;
                    meta.labels = parse_labels(&labels)?;
                    Ok(meta)
                },
            )
            .collect()
    }

    fn load_instances(&self) -> Result<Vec<InstanceNode>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meta_id, position, use_count, pass_count, refractory, hub_penalty, payload
             FROM instance_nodes ORDER BY id",
        )?;

        let rows: Vec<InstanceRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, i64>(1)? as u64,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(
                |(id, meta_id, position, use_count, pass_count, refractory, hub_penalty, payload)|
                 -> Result<InstanceNode> {
                    let position: Vec<f64> = from_json(&position, "position")?;
                    let mut node =
                        InstanceNode::new(InstanceId(id), MetaId(meta_id), Vector::new(position));
                    node.stats.use_count = use_count;
                    node.stats.pass_count = pass_count;
                    node.stats.refractory = refractory;
                    node.hub_penalty = hub_penalty;
                    node.payload = from_json::<BTreeMap<String, String>>(&payload, "payload")?;
                    Ok(node)
                },
            )
            .collect()
    }

    fn load_edges(&self) -> Result<Vec<EdgeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT src_id, dst_id, kind, walk_count FROM graph_edges
             ORDER BY src_id, dst_id, kind",
        )?;

        stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)? as u64,
                row.get::<_, i64>(1)? as u64,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?
        .map(|r| -> Result<EdgeRecord> {
            let (src, dst, kind, walk_count) = r?;
            let kind = EdgeKind::parse(&kind)
                .ok_or_else(|| StoreError::InvalidData(format!("unknown edge kind '{kind}'")))?;
            Ok(EdgeRecord {
                src: InstanceId(src),
                dst: InstanceId(dst),
                kind,
                walk_count,
            })
        })
        .collect()
    }

    // --- Counts ---

    pub fn count_rows(&self) -> Result<(usize, usize, usize)> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok((
            count("meta_entries")?,
            count("instance_nodes")?,
            count("graph_edges")?,
        ))
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::InvalidData(format!("JSON encode failed: {e}")))
}

fn from_json<T: DeserializeOwned>(raw: &str, column: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::InvalidData(format!("invalid {column} '{raw}': {e}")))
}

/// Unknown label names are dropped.
fn parse_labels(raw: &str) -> Result<BTreeSet<Category>> {
    let names: Vec<String> = from_json(raw, "labels")?;
    Ok(names.iter().filter_map(|n| Category::parse(n)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use highway_core::{CharSegmenter, MemoryConfig, MemorySystem};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn make_system() -> MemorySystem {
        let mut sys = MemorySystem::builder(MemoryConfig {
            vector_dim: 4,
            ..MemoryConfig::default()
        })
        .segmenter(Box::new(CharSegmenter))
        .build();
        sys.recite_text("上山，下山。", &mut rng()).unwrap();
        sys
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let sys = make_system();
        let tables = sys.snapshot();

        store.save_tables(&tables).unwrap();
        let loaded = store.load_tables().unwrap();

        assert_eq!(loaded, tables);
    }

    #[test]
    fn test_empty_store_loads_empty_tables() {
        let store = Store::open_in_memory().unwrap();
        let tables = store.load_tables().unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn test_save_replaces_previous_rows() {
        let store = Store::open_in_memory().unwrap();
        store.save_tables(&make_system().snapshot()).unwrap();

        let mut small = MemorySystem::new(MemoryConfig {
            vector_dim: 4,
            ..MemoryConfig::default()
        });
        small.write_text("水", &mut rng()).unwrap();
        store.save_tables(&small.snapshot()).unwrap();

        assert_eq!(store.count_rows().unwrap(), (1, 1, 0));
        assert_eq!(store.load_tables().unwrap(), small.snapshot());
    }

    #[test]
    fn test_loaded_tables_restore() {
        let store = Store::open_in_memory().unwrap();
        let sys = make_system();
        store.save_tables(&sys.snapshot()).unwrap();

        let mut restored = MemorySystem::new(MemoryConfig {
            vector_dim: 4,
            ..MemoryConfig::default()
        });
        restored.restore(store.load_tables().unwrap()).unwrap();
        assert_eq!(restored.stats(), sys.stats());
    }

    #[test]
    fn test_unknown_edge_kind_rejected() {
        let store = Store::open_in_memory().unwrap();
        let sys = make_system();
        store.save_tables(&sys.snapshot()).unwrap();
        store
            .conn()
            .execute("UPDATE graph_edges SET kind = 'diagonal'", [])
            .unwrap();

        match store.load_tables() {
            Err(StoreError::InvalidData(msg)) => assert!(msg.contains("diagonal")),
            other => panic!("expected InvalidData, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_labels_dropped() {
        let store = Store::open_in_memory().unwrap();
        store.save_tables(&make_system().snapshot()).unwrap();
        store
            .conn()
            .execute(
                "UPDATE meta_entries SET labels = '[\"phrase\",\"stanza\"]' WHERE key = '上'",
                [],
            )
            .unwrap();

        let tables = store.load_tables().unwrap();
        let meta = tables.metas.iter().find(|m| m.key == "上").unwrap();
        assert_eq!(meta.labels, BTreeSet::from([Category::Phrase]));
    }

    #[test]
    fn test_metadata() {
        let store = Store::open_in_memory().unwrap();
        store.set_metadata("vector_dim", "4").unwrap();
        assert_eq!(
            store.get_metadata("vector_dim").unwrap(),
            Some("4".to_string())
        );
        assert_eq!(store.get_metadata("missing").unwrap(), None);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("highway.db");
        let tables = make_system().snapshot();
        {
            let store = Store::open(&path).unwrap();
            store.save_tables(&tables).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.load_tables().unwrap(), tables);
    }

    #[test]
    fn test_newer_schema_file_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("highway.db");
        {
            let store = Store::open(&path).unwrap();
            store.set_metadata("schema_version", "99").unwrap();
        }
        match Store::open(&path) {
            Err(StoreError::InvalidData(msg)) => assert!(msg.contains("99"), "{msg}"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("a newer schema must not open"),
        }
    }
}
