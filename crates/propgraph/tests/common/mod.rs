//! Shared fixtures for the propgraph integration tests.

#![allow(dead_code)]

use propgraph::{open_in_memory, Graph};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub loc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follows {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wrote {}

pub fn user(username: &str) -> User {
    User {
        username: username.to_string(),
        loc: String::new(),
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// In-memory database with the default schema provisioned.
pub fn setup() -> (Connection, Graph) {
    let mut conn = open_in_memory().expect("failed to open in-memory database");
    let graph = Graph::default();
    graph
        .schema()
        .build_schema(&mut conn)
        .expect("failed to build schema");
    (conn, graph)
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}
