use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::{Entity, NodeStatus, Value};
use crate::catalog::{EntityDescriptor, NODE, NODE_TYPE};

/// Hierarchical content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: i64,
    pub node_name: String,
    pub status: NodeStatus,
    pub visible: bool,
    pub position: f64,
    pub parent_id: Option<i64>,
    pub node_type_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ContentNode {
    /// Create a draft node with defaults.
    pub fn new(id: i64, node_name: impl Into<String>) -> Self {
        Self {
            id,
            node_name: node_name.into(),
            status: NodeStatus::Draft,
            visible: true,
            position: 0.0,
            parent_id: None,
            node_type_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Set the workflow status.
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the parent node.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the node type.
    pub fn with_node_type(mut self, node_type_id: i64) -> Self {
        self.node_type_id = Some(node_type_id);
        self
    }

    /// Set the sibling position.
    pub fn with_position(mut self, position: f64) -> Self {
        self.position = position;
        self
    }

    /// Whether anonymous visitors may see this node.
    pub fn is_published(&self) -> bool {
        self.status == NodeStatus::Published
    }
}

impl Entity for ContentNode {
    fn descriptor() -> &'static EntityDescriptor {
        &NODE
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            node_name: row.get("node_name")?,
            status: row.get("status")?,
            visible: row.get("visible")?,
            position: row.get("position")?,
            parent_id: row.get("parent_id")?,
            node_type_id: row.get("node_type_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("node_name", self.node_name.clone().into()),
            ("status", self.status.into()),
            ("visible", self.visible.into()),
            ("position", self.position.into()),
            ("parent_id", self.parent_id.into()),
            ("node_type_id", self.node_type_id.into()),
            ("created_at", self.created_at.into()),
            ("updated_at", self.updated_at.into()),
        ]
    }
}

/// Schema-level classification of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub publishable: bool,
    pub visible: bool,
}

impl NodeType {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            display_name: name.clone(),
            name,
            publishable: false,
            visible: true,
        }
    }
}

impl Entity for NodeType {
    fn descriptor() -> &'static EntityDescriptor {
        &NODE_TYPE
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            display_name: row.get("display_name")?,
            publishable: row.get("publishable")?,
            visible: row.get("visible")?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("name", self.name.clone().into()),
            ("display_name", self.display_name.clone().into()),
            ("publishable", self.publishable.into()),
            ("visible", self.visible.into()),
        ]
    }
}
