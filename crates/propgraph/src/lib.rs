//! Embeddable property graph on top of SQLite.
//!
//! Nodes and edges live in two tables whose `properties` column holds JSON
//! text. Each call site picks the Rust type its kind of entity decodes to, so
//! one table can host users, tweets, and anything else while every caller
//! keeps static types.
//!
//! # Architecture
//!
//! The caller owns the connection and its transactions:
//! 1. [`SchemaManager::build_schema`] provisions the tables once (idempotent).
//! 2. The caller begins a transaction and hands it to [`Graph`] operations.
//! 3. On failure the operation rolls the transaction back and returns a
//!    [`GraphError`] carrying both the cause and the rollback outcome.
//! 4. On success the caller decides when to commit.
//!
//! # Modules
//!
//! - [`config`]: GraphConfig table names, validated and injectable
//! - [`error`]: ErrorKind taxonomy, Rollback outcome, GraphError
//! - [`codec`]: JSON encode/decode of typed properties
//! - [`entity`]: Node, Edge, EdgeNode and their set aliases
//! - [`filter`]: Filter/FilterSet predicate builder
//! - [`schema`]: SchemaManager and connection helpers
//! - [`engine`]: Graph create/read/update/upsert
//! - [`traverse`]: Direction and single-hop traversal on Graph

pub mod codec;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod filter;
pub mod schema;
pub mod traverse;

// Re-export key types for ergonomic use.
pub use codec::Properties;
pub use config::GraphConfig;
pub use engine::Graph;
pub use entity::{
    Edge, EdgeNode, EdgeSet, Entity, GenericEdgeNode, GenericEdgeNodeSet, Node, NodeSet,
};
pub use error::{ErrorKind, GraphError, Result, Rollback};
pub use filter::{Filter, FilterSet, Operator};
pub use schema::{open_database, open_in_memory, SchemaManager};
pub use traverse::Direction;
