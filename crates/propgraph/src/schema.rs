//! Schema bootstrap and connection setup for the SQLite backend.
//!
//! [`SchemaManager`] provisions the node and edge tables of one logical graph,
//! their indexes, and the timestamp triggers. Every statement is guarded with
//! `IF NOT EXISTS`, so bootstrapping an already provisioned database is a
//! no-op. Index and trigger names are prefixed with their table name so that
//! several graphs can share one database.

use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::config::GraphConfig;
use crate::error::{ErrorKind, GraphError, Result};

/// Millisecond-precision `'NOW'`, shared by column defaults, the update
/// trigger and upsert assignments.
pub(crate) const NOW_MILLIS: &str = "STRFTIME('%Y-%m-%d %H:%M:%f', 'NOW')";

/// Opens (or creates) a SQLite database at `path` with WAL mode and foreign
/// keys enabled. Does not bootstrap the schema.
pub fn open_database(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    configure(&conn)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database with foreign keys enabled.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    // Off by default in SQLite; edge endpoints and cascade deletes rely on it.
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Idempotent DDL bootstrap for one node/edge table pair.
#[derive(Debug, Clone, Default)]
pub struct SchemaManager {
    config: GraphConfig,
}

impl SchemaManager {
    pub fn new(config: GraphConfig) -> Self {
        SchemaManager { config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Provisions both tables in a single transaction.
    ///
    /// Any failing statement rolls the whole bootstrap back; the returned
    /// error carries the rollback outcome. If the final commit fails, rusqlite
    /// rolls the transaction back when it is dropped.
    #[instrument(
        skip_all,
        fields(node = %self.config.node_table(), edge = %self.config.edge_table())
    )]
    pub fn build_schema(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn
            .transaction()
            .map_err(|e| GraphError::from(ErrorKind::Transaction(e)))?;

        for statement in self.statements() {
            debug!(sql = %statement, "bootstrap");
            if let Err(err) = tx.execute_batch(&statement) {
                return Err(GraphError::abort(&tx, err.into()));
            }
        }

        tx.commit()
            .map_err(|e| GraphError::from(ErrorKind::Transaction(e)))
    }

    /// The DDL statements [`build_schema`](Self::build_schema) executes, in order.
    pub fn statements(&self) -> Vec<String> {
        let node = self.config.node_table();
        let edge = self.config.edge_table();

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {node} (
                id TEXT NOT NULL PRIMARY KEY,
                active BOOLEAN,
                type TEXT NOT NULL,
                properties TEXT,
                time_created TIMESTAMP DEFAULT ({NOW_MILLIS}),
                time_updated TIMESTAMP DEFAULT ({NOW_MILLIS})
            )"
        )];
        statements.push(time_updated_trigger(node));
        statements.extend(indexes(node, &["id", "type", "time_created", "time_updated"]));

        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {edge} (
                id TEXT NOT NULL PRIMARY KEY,
                active BOOLEAN,
                type TEXT NOT NULL,
                in_id TEXT NOT NULL,
                out_id TEXT NOT NULL,
                properties TEXT,
                time_created TIMESTAMP DEFAULT ({NOW_MILLIS}),
                time_updated TIMESTAMP DEFAULT ({NOW_MILLIS}),
                UNIQUE(type, in_id, out_id, properties) ON CONFLICT REPLACE,
                FOREIGN KEY(in_id) REFERENCES {node}(id) ON DELETE CASCADE,
                FOREIGN KEY(out_id) REFERENCES {node}(id) ON DELETE CASCADE
            )"
        ));
        statements.push(time_updated_trigger(edge));
        statements.extend(indexes(
            edge,
            &["id", "type", "in_id", "out_id", "time_created", "time_updated"],
        ));

        statements
    }
}

fn indexes(table: &str, columns: &[&str]) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            format!("CREATE INDEX IF NOT EXISTS {table}_{column}_idx ON {table}({column})")
        })
        .collect()
}

/// Inserts take both stamps from the column defaults, so `RETURNING` already
/// sees them. Updates get a fresh `time_updated` here.
fn time_updated_trigger(table: &str) -> String {
    format!(
        "CREATE TRIGGER IF NOT EXISTS {table}_time_updated_trigger
        AFTER UPDATE ON {table}
        BEGIN
            UPDATE {table}
            SET time_updated = {NOW_MILLIS}
            WHERE id = NEW.id;
        END"
    )
}
