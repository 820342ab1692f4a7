use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;

// Products that can be attached to workflows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Workflow templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stage of exactly one workflow. `order` is unique among the steps of that
/// workflow and is what detail views sort by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub workflow_id: i64,
    /// Name of the owning workflow, loaded alongside the row.
    pub workflow_name: String,
    pub name: String,
    pub description: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Directed edge between two steps of the same workflow. The condition is
/// opaque text and is never evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: i64,
    pub workflow_id: i64,
    pub workflow_name: String,
    pub from_step_id: i64,
    pub from_step_name: String,
    pub to_step_id: i64,
    pub to_step_name: String,
    pub condition: Option<String>,
}

/// A product's position inside one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductWorkflow {
    pub id: i64,
    pub product_id: i64,
    pub workflow_id: i64,
    pub current_step_id: Option<i64>,
    /// Name of the current step, loaded alongside the row.
    pub current_step_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} (Order: {})", self.workflow_name, self.name, self.order)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (Workflow: {})",
            self.from_step_name, self.to_step_name, self.workflow_name
        )
    }
}

impl ProductWorkflow {
    /// Name of the current step, or `"None"` when no step is set.
    ///
    /// Only the identifiers and the name already held by this value are used,
    /// so rendering a label never goes back to the store.
    pub fn current_step_label(&self) -> &str {
        match (self.current_step_id, self.current_step_name.as_deref()) {
            (Some(_), Some(name)) => name,
            _ => "None",
        }
    }
}

impl fmt::Display for ProductWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Product ID:{} - Workflow ID:{} (Current Step: {})",
            self.product_id,
            self.workflow_id,
            self.current_step_label()
        )
    }
}

// Write payloads

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStep {
    pub workflow_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: u32,
}

/// Editable fields of a step. A step never moves to another workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpdate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransition {
    pub workflow_id: i64,
    pub from_step_id: i64,
    pub to_step_id: i64,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionUpdate {
    pub from_step_id: i64,
    pub to_step_id: i64,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductWorkflow {
    pub product_id: i64,
    pub workflow_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWorkflowUpdate {
    pub product_id: i64,
    pub workflow_id: i64,
    #[serde(default)]
    pub current_step_id: Option<i64>,
}

// Admin list queries

/// Search, filter and pagination options shared by every list endpoint.
///
/// `search` is a case-insensitive substring match over the entity's search
/// fields. `workflow_id` is ignored by entities without a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default, rename = "q")]
    pub search: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<i64>,
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn for_workflow(workflow_id: i64) -> Self {
        Self {
            workflow_id: Some(workflow_id),
            ..Default::default()
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// LIKE pattern for the search term with `\` as the escape character.
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{}%", escaped))
    }
}
