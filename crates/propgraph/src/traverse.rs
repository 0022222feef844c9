//! Directional single-hop traversal.
//!
//! An edge points from `in_id` to `out_id`. An [`Direction::Out`] hop from a
//! node follows edges whose `in_id` is that node and yields the nodes at
//! `out_id` ("who do I point to"). An [`Direction::In`] hop follows edges
//! whose `out_id` is the node and yields the nodes at `in_id` ("who points to
//! me").
//!
//! Optional filters apply to the joined row, with the edge table aliased as
//! `e` and the node table as `n`. Multi-hop queries are composed by the caller.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value;
use rusqlite::Transaction;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::engine::{guard, query, Graph};
use crate::entity::{EdgeNode, GenericEdgeNodeSet, RawEdge, RawNode};
use crate::error::{ErrorKind, Result};
use crate::filter::FilterSet;

/// Which end of an edge a hop starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// `(column matched against the origin, column joined to the node table)`.
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            Direction::Out => ("in_id", "out_id"),
            Direction::In => ("out_id", "in_id"),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

impl FromStr for Direction {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(ErrorKind::Validation(format!(
                "unknown direction `{other}`, expected `in` or `out`"
            ))),
        }
    }
}

impl Graph {
    /// Out hop from `node_id` across edges of `edge_type`.
    pub fn nodes_out_related_by(
        &self,
        tx: &Transaction<'_>,
        node_id: &str,
        edge_type: &str,
        filters: Option<&FilterSet>,
    ) -> Result<GenericEdgeNodeSet> {
        self.nodes_related_by(tx, node_id, Direction::Out, edge_type, filters)
    }

    /// In hop to `node_id` across edges of `edge_type`.
    pub fn nodes_in_related_by(
        &self,
        tx: &Transaction<'_>,
        node_id: &str,
        edge_type: &str,
        filters: Option<&FilterSet>,
    ) -> Result<GenericEdgeNodeSet> {
        self.nodes_related_by(tx, node_id, Direction::In, edge_type, filters)
    }

    /// Single hop with opaque payloads on both sides.
    pub fn nodes_related_by(
        &self,
        tx: &Transaction<'_>,
        node_id: &str,
        direction: Direction,
        edge_type: &str,
        filters: Option<&FilterSet>,
    ) -> Result<GenericEdgeNodeSet> {
        self.related_by(tx, node_id, direction, edge_type, filters)
    }

    /// Single hop decoding the edge payload as `E` and the node payload as `N`.
    #[instrument(
        skip_all,
        fields(origin = %node_id, direction = %direction, edge_type = %edge_type)
    )]
    pub fn related_by<E: DeserializeOwned, N: DeserializeOwned>(
        &self,
        tx: &Transaction<'_>,
        node_id: &str,
        direction: Direction,
        edge_type: &str,
        filters: Option<&FilterSet>,
    ) -> Result<Vec<EdgeNode<E, N>>> {
        let (origin, far_end) = direction.columns();
        let mut params = vec![
            Value::Text(node_id.to_string()),
            Value::Text(edge_type.to_string()),
        ];
        let extra = filters
            .map(|filters| filters.build(&mut params))
            .filter(|fragment| !fragment.is_empty())
            .map(|fragment| format!(" AND {fragment}"))
            .unwrap_or_default();

        let sql = format!(
            "SELECT
                e.id AS edge_id,
                e.active AS edge_active,
                e.type AS edge_type,
                e.in_id AS edge_in_id,
                e.out_id AS edge_out_id,
                e.properties AS edge_properties,
                e.time_created AS edge_time_created,
                e.time_updated AS edge_time_updated,
                n.id AS node_id,
                n.active AS node_active,
                n.type AS node_type,
                n.properties AS node_properties,
                n.time_created AS node_time_created,
                n.time_updated AS node_time_updated
            FROM {edges} e
            JOIN {nodes} n ON n.id = e.{far_end}
            WHERE e.{origin} = ? AND e.type = ?{extra}",
            edges = self.config().edge_table(),
            nodes = self.config().node_table(),
        );

        let result = query(tx, &sql, &params, |row| {
            Ok((RawEdge::from_row(row, "edge_")?, RawNode::from_row(row, "node_")?))
        })
        .and_then(|rows| {
            rows.into_iter()
                .map(|(edge, node)| decode_hop(edge, node))
                .collect::<Result<Vec<_>, ErrorKind>>()
        });
        guard(tx, result)
    }
}

fn decode_hop<E: DeserializeOwned, N: DeserializeOwned>(
    edge: RawEdge,
    node: RawNode,
) -> Result<EdgeNode<E, N>, ErrorKind> {
    Ok(EdgeNode {
        edge: edge.decode()?,
        node: node.decode()?,
    })
}
