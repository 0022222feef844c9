//! Typed create/read/update/upsert over the node and edge tables.
//!
//! Every operation runs inside a transaction owned by the caller. The engine
//! never begins or commits; on failure it issues a `ROLLBACK` on that
//! transaction and reports the outcome in the returned [`GraphError`]. After a
//! failure the transaction is finished and must not be committed.
//!
//! Properties are encoded before any SQL runs and decoded eagerly as rows are
//! materialized, so a batch that fails to encode persists nothing and a row
//! that fails to decode aborts the transaction.
//!
//! Batches larger than the connection's bind-variable limit are written as
//! several `INSERT` statements inside the same transaction.

use rusqlite::limits::Limit;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use tracing::{debug, instrument};

use crate::codec::{self, Properties};
use crate::config::GraphConfig;
use crate::entity::{Edge, EdgeSet, Node, NodeSet, RawEdge, RawNode};
use crate::error::{ErrorKind, GraphError, Result};
use crate::filter::{Filter, FilterSet};
use crate::schema::{SchemaManager, NOW_MILLIS};

/// Column list and placeholder group of one inserted row.
struct Columns {
    names: &'static str,
    group: &'static str,
    width: usize,
}

const NODE_COLUMNS: Columns = Columns {
    names: "id, active, type, properties",
    group: "(?, ?, ?, ?)",
    width: 4,
};

const EDGE_COLUMNS: Columns = Columns {
    names: "id, active, type, in_id, out_id, properties",
    group: "(?, ?, ?, ?, ?, ?)",
    width: 6,
};

/// Entry point for typed graph operations against one node/edge table pair.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    config: GraphConfig,
}

/// Maps an inner result onto the public error, rolling back on failure.
pub(crate) fn guard<T>(tx: &Connection, result: Result<T, ErrorKind>) -> Result<T> {
    result.map_err(|kind| GraphError::abort(tx, kind))
}

impl Graph {
    pub fn new(config: GraphConfig) -> Self {
        Graph { config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// A schema manager bound to the same tables.
    pub fn schema(&self) -> SchemaManager {
        SchemaManager::new(self.config.clone())
    }

    // -------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------

    /// Inserts one node and returns it as stored.
    pub fn node_create<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        node: &Node<T>,
    ) -> Result<Node<T>> {
        let nodes = self.nodes_create(tx, std::slice::from_ref(node))?;
        first_or_not_found(tx, nodes, self.config.node_table())
    }

    /// Inserts every node with multi-row `INSERT`s. All or nothing.
    #[instrument(skip_all, fields(table = %self.config.node_table(), count = nodes.len()))]
    pub fn nodes_create<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        nodes: &[Node<T>],
    ) -> Result<NodeSet<T>> {
        guard(tx, self.insert_nodes(tx, nodes, None))
    }

    pub fn node_get_by_id<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        id: &str,
    ) -> Result<Node<T>> {
        guard(tx, self.find_node(tx, &by_id(id)))
    }

    /// Returns the first node matching `filters`; zero matches is NotFound.
    pub fn node_get_by<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        filters: &FilterSet,
    ) -> Result<Node<T>> {
        guard(tx, self.find_node(tx, filters))
    }

    /// Returns every node matching `filters` in result-set order. An empty
    /// set matches the whole table.
    #[instrument(skip_all, fields(table = %self.config.node_table(), filters = filters.len()))]
    pub fn nodes_get_by<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        filters: &FilterSet,
    ) -> Result<NodeSet<T>> {
        guard(tx, self.select_nodes(tx, filters))
    }

    /// Writes `active` and `properties` for `node.id`.
    ///
    /// With `with_return` the row is re-read so the result carries the
    /// trigger-refreshed `time_updated`; without it nothing is fetched and
    /// `None` is returned.
    #[instrument(skip_all, fields(table = %self.config.node_table(), id = %node.entity.id))]
    pub fn node_update<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        node: &Node<T>,
        with_return: bool,
    ) -> Result<Option<Node<T>>> {
        guard(tx, self.update_node(tx, node, with_return))
    }

    pub fn node_upsert<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        conflict_columns: &str,
        conflict_clause: Option<&str>,
        node: &Node<T>,
    ) -> Result<Node<T>> {
        let nodes = self.nodes_upsert(
            tx,
            conflict_columns,
            conflict_clause,
            std::slice::from_ref(node),
        )?;
        first_or_not_found(tx, nodes, self.config.node_table())
    }

    /// Inserts each node, or on a conflict over `conflict_columns` updates
    /// `active` and `properties` of the existing row. The returned rows carry
    /// the stored timestamps, including the refreshed `time_updated` of
    /// updated rows.
    ///
    /// `conflict_clause` scopes the target to a partial unique index, e.g.
    /// `Some("type = 'user'")` with
    /// `conflict_columns = "type, json_extract(properties, '$.username')"`.
    #[instrument(
        skip_all,
        fields(table = %self.config.node_table(), conflict = conflict_columns, count = nodes.len())
    )]
    pub fn nodes_upsert<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        conflict_columns: &str,
        conflict_clause: Option<&str>,
        nodes: &[Node<T>],
    ) -> Result<NodeSet<T>> {
        let result = on_conflict(conflict_columns, conflict_clause)
            .and_then(|upsert| self.insert_nodes(tx, nodes, Some(upsert)));
        guard(tx, result)
    }

    // -------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------

    /// Inserts one edge. Both endpoints must already exist (or have been
    /// created earlier in the same transaction).
    pub fn edge_create<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        edge: &Edge<T>,
    ) -> Result<Edge<T>> {
        let edges = self.edges_create(tx, std::slice::from_ref(edge))?;
        first_or_not_found(tx, edges, self.config.edge_table())
    }

    /// Inserts every edge with multi-row `INSERT`s. All or nothing.
    ///
    /// An edge whose `(type, in_id, out_id, properties)` matches an existing
    /// row replaces that row.
    #[instrument(skip_all, fields(table = %self.config.edge_table(), count = edges.len()))]
    pub fn edges_create<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        edges: &[Edge<T>],
    ) -> Result<EdgeSet<T>> {
        guard(tx, self.insert_edges(tx, edges, None))
    }

    pub fn edge_get_by_id<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        id: &str,
    ) -> Result<Edge<T>> {
        guard(tx, self.find_edge(tx, &by_id(id)))
    }

    pub fn edge_get_by<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        filters: &FilterSet,
    ) -> Result<Edge<T>> {
        guard(tx, self.find_edge(tx, filters))
    }

    #[instrument(skip_all, fields(table = %self.config.edge_table(), filters = filters.len()))]
    pub fn edges_get_by<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        filters: &FilterSet,
    ) -> Result<EdgeSet<T>> {
        guard(tx, self.select_edges(tx, filters))
    }

    /// Writes `active` and `properties` for `edge.id`. Endpoints and type are
    /// immutable through this call.
    #[instrument(skip_all, fields(table = %self.config.edge_table(), id = %edge.entity.id))]
    pub fn edge_update<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        edge: &Edge<T>,
        with_return: bool,
    ) -> Result<Option<Edge<T>>> {
        guard(tx, self.update_edge(tx, edge, with_return))
    }

    pub fn edge_upsert<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        conflict_columns: &str,
        conflict_clause: Option<&str>,
        edge: &Edge<T>,
    ) -> Result<Edge<T>> {
        let edges = self.edges_upsert(
            tx,
            conflict_columns,
            conflict_clause,
            std::slice::from_ref(edge),
        )?;
        first_or_not_found(tx, edges, self.config.edge_table())
    }

    /// Edge counterpart of [`nodes_upsert`](Self::nodes_upsert).
    ///
    /// The table's content-uniqueness rule still applies to constraints other
    /// than the declared target: an edge with a new id but the same
    /// `(type, in_id, out_id, properties)` as an existing row replaces it.
    #[instrument(
        skip_all,
        fields(table = %self.config.edge_table(), conflict = conflict_columns, count = edges.len())
    )]
    pub fn edges_upsert<T: Properties>(
        &self,
        tx: &Transaction<'_>,
        conflict_columns: &str,
        conflict_clause: Option<&str>,
        edges: &[Edge<T>],
    ) -> Result<EdgeSet<T>> {
        let result = on_conflict(conflict_columns, conflict_clause)
            .and_then(|upsert| self.insert_edges(tx, edges, Some(upsert)));
        guard(tx, result)
    }

    // -------------------------------------------------------------------
    // Internal helpers (no rollback; the public wrappers own that)
    // -------------------------------------------------------------------

    fn insert_nodes<T: Properties>(
        &self,
        tx: &Connection,
        nodes: &[Node<T>],
        upsert: Option<String>,
    ) -> Result<NodeSet<T>, ErrorKind> {
        let mut params = Vec::with_capacity(nodes.len() * NODE_COLUMNS.width);
        for node in nodes {
            let properties = codec::encode(&node.properties)?;
            params.push(Value::Text(node.entity.id.clone()));
            params.push(Value::from(node.entity.active));
            params.push(Value::Text(node.entity.kind.clone()));
            params.push(Value::Text(properties));
        }
        let table = self.config.node_table();
        insert_rows(tx, table, &NODE_COLUMNS, &params, upsert.as_deref(), |row| {
            RawNode::from_row(row, "")
        })?
        .into_iter()
        .map(RawNode::decode)
        .collect()
    }

    fn insert_edges<T: Properties>(
        &self,
        tx: &Connection,
        edges: &[Edge<T>],
        upsert: Option<String>,
    ) -> Result<EdgeSet<T>, ErrorKind> {
        let mut params = Vec::with_capacity(edges.len() * EDGE_COLUMNS.width);
        for edge in edges {
            let properties = codec::encode(&edge.properties)?;
            params.push(Value::Text(edge.entity.id.clone()));
            params.push(Value::from(edge.entity.active));
            params.push(Value::Text(edge.entity.kind.clone()));
            params.push(Value::Text(edge.in_id.clone()));
            params.push(Value::Text(edge.out_id.clone()));
            params.push(Value::Text(properties));
        }
        let table = self.config.edge_table();
        insert_rows(tx, table, &EDGE_COLUMNS, &params, upsert.as_deref(), |row| {
            RawEdge::from_row(row, "")
        })?
        .into_iter()
        .map(RawEdge::decode)
        .collect()
    }

    fn select_nodes<T: Properties>(
        &self,
        tx: &Connection,
        filters: &FilterSet,
    ) -> Result<NodeSet<T>, ErrorKind> {
        let mut params = Vec::new();
        let sql = select_sql(self.config.node_table(), filters, &mut params);
        query(tx, &sql, &params, |row| RawNode::from_row(row, ""))?
            .into_iter()
            .map(RawNode::decode)
            .collect()
    }

    fn select_edges<T: Properties>(
        &self,
        tx: &Connection,
        filters: &FilterSet,
    ) -> Result<EdgeSet<T>, ErrorKind> {
        let mut params = Vec::new();
        let sql = select_sql(self.config.edge_table(), filters, &mut params);
        query(tx, &sql, &params, |row| RawEdge::from_row(row, ""))?
            .into_iter()
            .map(RawEdge::decode)
            .collect()
    }

    fn update_node<T: Properties>(
        &self,
        tx: &Connection,
        node: &Node<T>,
        with_return: bool,
    ) -> Result<Option<Node<T>>, ErrorKind> {
        let table = self.config.node_table();
        update_row(tx, table, &node.entity.id, node.entity.active, &node.properties)?;
        if !with_return {
            return Ok(None);
        }
        self.find_node(tx, &by_id(&node.entity.id)).map(Some)
    }

    fn update_edge<T: Properties>(
        &self,
        tx: &Connection,
        edge: &Edge<T>,
        with_return: bool,
    ) -> Result<Option<Edge<T>>, ErrorKind> {
        let table = self.config.edge_table();
        update_row(tx, table, &edge.entity.id, edge.entity.active, &edge.properties)?;
        if !with_return {
            return Ok(None);
        }
        self.find_edge(tx, &by_id(&edge.entity.id)).map(Some)
    }

    fn find_node<T: Properties>(
        &self,
        tx: &Connection,
        filters: &FilterSet,
    ) -> Result<Node<T>, ErrorKind> {
        self.select_nodes(tx, filters)?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(self.config.node_table()))
    }

    fn find_edge<T: Properties>(
        &self,
        tx: &Connection,
        filters: &FilterSet,
    ) -> Result<Edge<T>, ErrorKind> {
        self.select_edges(tx, filters)?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(self.config.edge_table()))
    }
}

fn by_id(id: &str) -> FilterSet {
    FilterSet::new().with(Filter::new("id", id.to_string()))
}

fn not_found(table: &str) -> ErrorKind {
    ErrorKind::NotFound {
        table: table.to_string(),
    }
}

/// Single-entity wrappers: a write that returned no row is NotFound.
fn first_or_not_found<T>(tx: &Connection, rows: Vec<T>, table: &str) -> Result<T> {
    let first = rows.into_iter().next().ok_or_else(|| not_found(table));
    guard(tx, first)
}

/// Builds the `ON CONFLICT ... DO UPDATE` tail of an upsert.
///
/// `time_updated` is assigned here as well as by the update trigger. Both
/// read `'NOW'` within one statement step, so `RETURNING` sees the value the
/// trigger stores.
fn on_conflict(
    conflict_columns: &str,
    conflict_clause: Option<&str>,
) -> Result<String, ErrorKind> {
    let columns = conflict_columns.trim();
    if columns.is_empty() {
        return Err(ErrorKind::Validation(
            "upsert requires at least one conflict column".to_string(),
        ));
    }
    let scope = match conflict_clause.map(str::trim) {
        Some(clause) if !clause.is_empty() => format!(" WHERE {clause}"),
        _ => String::new(),
    };
    Ok(format!(
        "ON CONFLICT({columns}){scope} DO UPDATE SET \
         active = excluded.active, \
         properties = excluded.properties, \
         time_updated = {NOW_MILLIS}"
    ))
}

/// Writes row-major `params` with as few `INSERT ... RETURNING *` statements
/// as the connection's bind-variable limit allows, collecting every returned
/// row.
fn insert_rows<R>(
    tx: &Connection,
    table: &str,
    columns: &Columns,
    params: &[Value],
    upsert: Option<&str>,
    read: fn(&Row<'_>) -> rusqlite::Result<R>,
) -> Result<Vec<R>, ErrorKind> {
    let per_statement = rows_per_statement(tx, columns.width);
    let mut rows = Vec::with_capacity(params.len() / columns.width);
    for chunk in params.chunks(per_statement * columns.width) {
        let sql = insert_sql(table, columns, chunk.len() / columns.width, upsert);
        rows.extend(query(tx, &sql, chunk, read)?);
    }
    Ok(rows)
}

fn rows_per_statement(tx: &Connection, width: usize) -> usize {
    let limit = usize::try_from(tx.limit(Limit::SQLITE_LIMIT_VARIABLE_NUMBER)).unwrap_or(0);
    (limit / width).max(1)
}

fn insert_sql(table: &str, columns: &Columns, rows: usize, upsert: Option<&str>) -> String {
    let values = vec![columns.group; rows].join(", ");
    let upsert = upsert.map(|tail| format!(" {tail}")).unwrap_or_default();
    let names = columns.names;
    format!("INSERT INTO {table} ({names}) VALUES {values}{upsert} RETURNING *")
}

fn select_sql(table: &str, filters: &FilterSet, params: &mut Vec<Value>) -> String {
    let where_clause = filters.where_clause(params);
    if where_clause.is_empty() {
        format!("SELECT * FROM {table}")
    } else {
        format!("SELECT * FROM {table} {where_clause}")
    }
}

/// `UPDATE` by id; zero affected rows is NotFound.
fn update_row<T: Properties>(
    tx: &Connection,
    table: &str,
    id: &str,
    active: bool,
    properties: &T,
) -> Result<(), ErrorKind> {
    let properties = codec::encode(properties)?;
    let sql = format!("UPDATE {table} SET active = ?1, properties = ?2 WHERE id = ?3");
    debug!(sql = %sql, "execute");
    let changed = tx.execute(&sql, params![active, properties, id])?;
    if changed == 0 {
        return Err(not_found(table));
    }
    Ok(())
}

/// Runs `sql` and collects every row through `read`.
pub(crate) fn query<R>(
    tx: &Connection,
    sql: &str,
    params: &[Value],
    read: impl FnMut(&Row<'_>) -> rusqlite::Result<R>,
) -> Result<Vec<R>, ErrorKind> {
    debug!(sql = %sql, params = params.len(), "query");
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), read)?;
    let collected = rows.collect::<rusqlite::Result<Vec<R>>>()?;
    Ok(collected)
}
