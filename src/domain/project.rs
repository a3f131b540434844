//! Project documents (a named graph of nodes and edges owned by one user).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored project row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default = "empty_graph")]
    pub nodes: Value,
    #[serde(default = "empty_graph")]
    pub edges: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn empty_graph() -> Value {
    Value::Array(Vec::new())
}

/// Row inserted for a new project
#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub user_id: String,
    pub name: String,
    pub nodes: Value,
    pub edges: Value,
}

impl NewProject {
    /// A project with an empty graph
    pub fn empty(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            nodes: empty_graph(),
            edges: empty_graph(),
        }
    }
}

/// Partial update; absent fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Value>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.nodes.is_none() && self.edges.is_none()
    }

    /// Apply the present fields to a project
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(ref name) = self.name {
            project.name = name.clone();
        }
        if let Some(ref nodes) = self.nodes {
            project.nodes = nodes.clone();
        }
        if let Some(ref edges) = self.edges {
            project.edges = edges.clone();
        }
    }
}
