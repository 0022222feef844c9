//! Table-name configuration bound into [`SchemaManager`](crate::SchemaManager)
//! and [`Graph`](crate::Graph) at construction.
//!
//! Table names are interpolated into generated SQL, so they are validated as
//! plain identifiers up front. Several configurations with distinct names can
//! share one SQLite database as independent logical graphs.
//!
//! Environment overrides:
//! - `PROPGRAPH_NODE_TABLE`: node table name (default: "node")
//! - `PROPGRAPH_EDGE_TABLE`: edge table name (default: "edge")

use crate::error::ErrorKind;

pub const DEFAULT_NODE_TABLE: &str = "node";
pub const DEFAULT_EDGE_TABLE: &str = "edge";

pub const NODE_TABLE_ENV: &str = "PROPGRAPH_NODE_TABLE";
pub const EDGE_TABLE_ENV: &str = "PROPGRAPH_EDGE_TABLE";

/// Names of the two backing tables of one logical graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    node_table: String,
    edge_table: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            node_table: DEFAULT_NODE_TABLE.to_string(),
            edge_table: DEFAULT_EDGE_TABLE.to_string(),
        }
    }
}

impl GraphConfig {
    /// Creates a configuration with custom table names.
    ///
    /// Both names must be plain SQL identifiers and must differ.
    pub fn new(
        node_table: impl Into<String>,
        edge_table: impl Into<String>,
    ) -> Result<Self, ErrorKind> {
        let node_table = node_table.into();
        let edge_table = edge_table.into();
        validate_identifier(&node_table)?;
        validate_identifier(&edge_table)?;
        if node_table.eq_ignore_ascii_case(&edge_table) {
            return Err(ErrorKind::Validation(format!(
                "node and edge tables must differ, both are `{node_table}`"
            )));
        }
        Ok(GraphConfig {
            node_table,
            edge_table,
        })
    }

    /// Reads table names from the environment, falling back to the defaults.
    pub fn from_env() -> Result<Self, ErrorKind> {
        let node_table =
            std::env::var(NODE_TABLE_ENV).unwrap_or_else(|_| DEFAULT_NODE_TABLE.to_string());
        let edge_table =
            std::env::var(EDGE_TABLE_ENV).unwrap_or_else(|_| DEFAULT_EDGE_TABLE.to_string());
        Self::new(node_table, edge_table)
    }

    pub fn node_table(&self) -> &str {
        &self.node_table
    }

    pub fn edge_table(&self) -> &str {
        &self.edge_table
    }
}

fn validate_identifier(name: &str) -> Result<(), ErrorKind> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ErrorKind::Validation(format!(
            "`{name}` is not a valid table name"
        )))
    }
}
