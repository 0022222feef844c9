//! Typed graph entities.
//!
//! [`Node`] and [`Edge`] share the [`Entity`] header and carry a typed
//! `properties` payload stored as JSON text. [`EdgeNode`] pairs one traversed
//! edge with the node at its far end; its two payload slots are typed
//! independently, defaulting to opaque [`serde_json::Value`]s.

use chrono::NaiveDateTime;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec;
use crate::error::ErrorKind;

/// Columns shared by nodes and edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Caller-supplied primary key.
    pub id: String,
    /// Soft-delete / enable flag.
    pub active: bool,
    /// Free-form discriminator (`"user"`, `"follows"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Assigned by the store; `None` until the entity has been persisted.
    pub time_created: Option<NaiveDateTime>,
    /// Refreshed by the store on every mutation.
    pub time_updated: Option<NaiveDateTime>,
}

impl Entity {
    /// An active, not yet persisted entity.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            active: true,
            kind: kind.into(),
            time_created: None,
            time_updated: None,
        }
    }

    /// Reads the shared columns, each looked up as `{prefix}{column}`.
    pub(crate) fn from_row(row: &Row<'_>, prefix: &str) -> rusqlite::Result<Self> {
        let column = |name: &str| format!("{prefix}{name}");
        Ok(Entity {
            id: row.get(column("id").as_str())?,
            active: row
                .get::<_, Option<bool>>(column("active").as_str())?
                .unwrap_or(false),
            kind: row.get(column("type").as_str())?,
            time_created: row.get(column("time_created").as_str())?,
            time_updated: row.get(column("time_updated").as_str())?,
        })
    }
}

/// A graph vertex with typed properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node<T> {
    #[serde(flatten)]
    pub entity: Entity,
    pub properties: T,
}

impl<T> Node<T> {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, properties: T) -> Self {
        Node {
            entity: Entity::new(id, kind),
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.entity.id
    }

    pub fn kind(&self) -> &str {
        &self.entity.kind
    }
}

impl Node<Value> {
    /// Decodes opaque properties into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Node<T>, ErrorKind> {
        let properties =
            serde_json::from_value(self.properties).map_err(ErrorKind::Deserialization)?;
        Ok(Node {
            entity: self.entity,
            properties,
        })
    }
}

/// A directed, typed relationship from `in_id` to `out_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<T> {
    #[serde(flatten)]
    pub entity: Entity,
    pub in_id: String,
    pub out_id: String,
    pub properties: T,
}

impl<T> Edge<T> {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        in_id: impl Into<String>,
        out_id: impl Into<String>,
        properties: T,
    ) -> Self {
        Edge {
            entity: Entity::new(id, kind),
            in_id: in_id.into(),
            out_id: out_id.into(),
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.entity.id
    }

    pub fn kind(&self) -> &str {
        &self.entity.kind
    }
}

impl Edge<Value> {
    /// Decodes opaque properties into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Edge<T>, ErrorKind> {
        let properties =
            serde_json::from_value(self.properties).map_err(ErrorKind::Deserialization)?;
        Ok(Edge {
            entity: self.entity,
            in_id: self.in_id,
            out_id: self.out_id,
            properties,
        })
    }
}

pub type NodeSet<T> = Vec<Node<T>>;
pub type EdgeSet<T> = Vec<Edge<T>>;

/// One hop: the edge that was followed and the node it led to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeNode<E = Value, N = Value> {
    pub edge: Edge<E>,
    pub node: Node<N>,
}

/// Traversal record whose payloads are not assumed known at the call site.
pub type GenericEdgeNode = EdgeNode<Value, Value>;
pub type GenericEdgeNodeSet = Vec<GenericEdgeNode>;

impl GenericEdgeNode {
    /// Decodes both payloads. Use [`Edge::decode`] or [`Node::decode`] on the
    /// fields to decode only one side.
    pub fn decode<E: DeserializeOwned, N: DeserializeOwned>(
        self,
    ) -> Result<EdgeNode<E, N>, ErrorKind> {
        Ok(EdgeNode {
            edge: self.edge.decode()?,
            node: self.node.decode()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Row materialization
// ---------------------------------------------------------------------------

/// A node row with its properties still encoded.
pub(crate) struct RawNode {
    entity: Entity,
    properties: Option<String>,
}

impl RawNode {
    pub(crate) fn from_row(row: &Row<'_>, prefix: &str) -> rusqlite::Result<Self> {
        Ok(RawNode {
            entity: Entity::from_row(row, prefix)?,
            properties: row.get(format!("{prefix}properties").as_str())?,
        })
    }

    pub(crate) fn decode<T: DeserializeOwned>(self) -> Result<Node<T>, ErrorKind> {
        Ok(Node {
            entity: self.entity,
            properties: codec::decode(self.properties.as_deref())?,
        })
    }
}

/// An edge row with its properties still encoded.
pub(crate) struct RawEdge {
    entity: Entity,
    in_id: String,
    out_id: String,
    properties: Option<String>,
}

impl RawEdge {
    pub(crate) fn from_row(row: &Row<'_>, prefix: &str) -> rusqlite::Result<Self> {
        Ok(RawEdge {
            entity: Entity::from_row(row, prefix)?,
            in_id: row.get(format!("{prefix}in_id").as_str())?,
            out_id: row.get(format!("{prefix}out_id").as_str())?,
            properties: row.get(format!("{prefix}properties").as_str())?,
        })
    }

    pub(crate) fn decode<T: DeserializeOwned>(self) -> Result<Edge<T>, ErrorKind> {
        Ok(Edge {
            entity: self.entity,
            in_id: self.in_id,
            out_id: self.out_id,
            properties: codec::decode(self.properties.as_deref())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct User {
        username: String,
    }

    #[test]
    fn constructors_produce_active_unpersisted_entities() {
        let node = Node::new("n1", "user", ());
        assert!(node.entity.active);
        assert_eq!(node.kind(), "user");
        assert!(node.entity.time_created.is_none());

        let edge = Edge::new("e1", "follows", "a", "b", ());
        assert_eq!((edge.in_id.as_str(), edge.out_id.as_str()), ("a", "b"));
        assert!(edge.entity.active);
    }

    #[test]
    fn generic_record_decodes_each_side_independently() {
        let record = GenericEdgeNode {
            edge: Edge::new("e1", "follows", "a", "b", json!({})),
            node: Node::new("b", "user", json!({ "username": "kram" })),
        };

        let node: Node<User> = record.node.clone().decode().unwrap();
        assert_eq!(node.properties.username, "kram");

        let typed: EdgeNode<Value, User> = record.decode().unwrap();
        assert_eq!(typed.node.id(), "b");
    }

    #[test]
    fn mismatched_payload_fails_to_decode() {
        let node = Node::new("x", "tweet", json!({ "body": "hi" }));
        assert!(matches!(
            node.decode::<User>(),
            Err(ErrorKind::Deserialization(_))
        ));
    }
}
