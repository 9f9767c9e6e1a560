use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, StoreError};

/// Layout version written to `metadata`. A database stamped with a newer
/// version is refused rather than read with the wrong column meanings.
pub const SCHEMA_VERSION: i64 = 1;

const VERSION_KEY: &str = "schema_version";

/// Applied to every connection before the tables are touched.
const CONNECTION_PRAGMAS: &[(&str, i64)] = &[("foreign_keys", 1), ("busy_timeout", 5000)];

// Vectors, labels and payloads are JSON text columns.
const TABLES: &str = "
    CREATE TABLE IF NOT EXISTS metadata (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS meta_entries (
        id                 INTEGER PRIMARY KEY,
        key                TEXT NOT NULL UNIQUE,
        text               TEXT NOT NULL,
        global_freq        REAL NOT NULL,
        private_freq       REAL NOT NULL DEFAULT 1.0,
        level              INTEGER NOT NULL DEFAULT 0,
        crystallized_count INTEGER NOT NULL DEFAULT 1,
        labels             TEXT NOT NULL DEFAULT '[]',
        category_vector    TEXT NOT NULL DEFAULT '[]'
    );

    CREATE TABLE IF NOT EXISTS instance_nodes (
        id          INTEGER PRIMARY KEY,
        meta_id     INTEGER NOT NULL REFERENCES meta_entries(id),
        position    TEXT NOT NULL,
        use_count   INTEGER NOT NULL DEFAULT 0,
        pass_count  INTEGER NOT NULL DEFAULT 0,
        refractory  INTEGER NOT NULL DEFAULT 0,
        hub_penalty REAL NOT NULL DEFAULT 0.0,
        payload     TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS graph_edges (
        src_id     INTEGER NOT NULL REFERENCES instance_nodes(id),
        dst_id     INTEGER NOT NULL REFERENCES instance_nodes(id),
        kind       TEXT NOT NULL,
        walk_count INTEGER NOT NULL,
        PRIMARY KEY (src_id, dst_id, kind)
    );

    CREATE INDEX IF NOT EXISTS idx_inst_meta ON instance_nodes(meta_id);
    CREATE INDEX IF NOT EXISTS idx_edge_dst ON graph_edges(dst_id);
";

/// Configure the connection, create missing tables and check the stored
/// layout version.
pub fn initialize(conn: &Connection) -> Result<()> {
    for &(name, value) in CONNECTION_PRAGMAS {
        conn.pragma_update(None, name, value)?;
    }
    // In-memory databases answer "memory" and keep it.
    let journal: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!(journal = %journal, "connection configured");

    conn.execute_batch(TABLES)?;

    match stored_version(conn)? {
        Some(found) if found > SCHEMA_VERSION => Err(StoreError::InvalidData(format!(
            "database schema version {found} is newer than supported version {SCHEMA_VERSION}"
        ))),
        Some(found) if found == SCHEMA_VERSION => Ok(()),
        previous => {
            conn.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![VERSION_KEY, SCHEMA_VERSION.to_string()],
            )?;
            tracing::info!(?previous, version = SCHEMA_VERSION, "schema version stamped");
            Ok(())
        }
    }
}

/// Layout version stamped in `metadata`, `None` before the first stamp.
pub fn stored_version(conn: &Connection) -> Result<Option<i64>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|value| {
        value.parse::<i64>().map_err(|_| {
            StoreError::InvalidData(format!("schema version '{value}' is not an integer"))
        })
    })
    .transpose()
}
