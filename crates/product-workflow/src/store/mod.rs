mod config;
mod models;
mod sqlite;
mod postgres;
mod factory;

pub use config::{DatabaseConfig, DatabaseType, DEFAULT_SQLITE_PATH};
pub use models::*;
pub use sqlite::SqliteStore;
pub use postgres::PostgresStore;
pub use factory::create_store;

use async_trait::async_trait;

pub const UNIQUE_PRODUCT_NAME: &str = "unique_product_name";
pub const UNIQUE_WORKFLOW_NAME: &str = "unique_workflow_name";
pub const UNIQUE_STEP_NAME: &str = "unique_step_name_per_workflow";
pub const UNIQUE_STEP_ORDER: &str = "unique_step_order_per_workflow";
pub const UNIQUE_TRANSITION: &str = "unique_transition_per_workflow";
pub const UNIQUE_PRODUCT_WORKFLOW: &str = "unique_product_workflow";

/// Relational storage for the five workflow entities.
///
/// Implementations enforce uniqueness and cascade rules with database
/// constraints. Cross-entity checks such as step/workflow membership live in
/// `WorkflowService`. `update_*` and `delete_*` return `None`/`false` when the
/// row does not exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    // Initialize database schema
    async fn init(&self) -> crate::Result<()>;

    // Product operations
    async fn create_product(&self, product: NewProduct) -> crate::Result<Product>;
    async fn get_product(&self, id: i64) -> crate::Result<Option<Product>>;
    async fn find_product_by_name(&self, name: &str) -> crate::Result<Option<Product>>;
    async fn update_product(&self, id: i64, product: NewProduct) -> crate::Result<Option<Product>>;
    async fn delete_product(&self, id: i64) -> crate::Result<bool>;
    async fn list_products(&self, query: &ListQuery) -> crate::Result<Vec<Product>>;

    // Workflow operations
    async fn create_workflow(&self, workflow: NewWorkflow) -> crate::Result<Workflow>;
    async fn get_workflow(&self, id: i64) -> crate::Result<Option<Workflow>>;
    async fn find_workflow_by_name(&self, name: &str) -> crate::Result<Option<Workflow>>;
    async fn update_workflow(&self, id: i64, workflow: NewWorkflow) -> crate::Result<Option<Workflow>>;
    async fn delete_workflow(&self, id: i64) -> crate::Result<bool>;
    async fn list_workflows(&self, query: &ListQuery) -> crate::Result<Vec<Workflow>>;

    // Step operations
    async fn create_step(&self, step: NewStep) -> crate::Result<Step>;
    async fn get_step(&self, id: i64) -> crate::Result<Option<Step>>;
    async fn find_step_by_name(&self, workflow_id: i64, name: &str) -> crate::Result<Option<Step>>;
    async fn find_step_by_order(&self, workflow_id: i64, order: u32) -> crate::Result<Option<Step>>;
    async fn update_step(&self, id: i64, step: StepUpdate) -> crate::Result<Option<Step>>;
    async fn delete_step(&self, id: i64) -> crate::Result<bool>;
    async fn list_steps(&self, query: &ListQuery) -> crate::Result<Vec<Step>>;
    /// All steps of a workflow, ascending by `order`.
    async fn list_workflow_steps(&self, workflow_id: i64) -> crate::Result<Vec<Step>>;

    // Transition operations
    async fn create_transition(&self, transition: NewTransition) -> crate::Result<Transition>;
    async fn get_transition(&self, id: i64) -> crate::Result<Option<Transition>>;
    async fn find_transition(&self, workflow_id: i64, from_step_id: i64, to_step_id: i64) -> crate::Result<Option<Transition>>;
    async fn update_transition(&self, id: i64, transition: TransitionUpdate) -> crate::Result<Option<Transition>>;
    async fn delete_transition(&self, id: i64) -> crate::Result<bool>;
    async fn list_transitions(&self, query: &ListQuery) -> crate::Result<Vec<Transition>>;
    async fn list_workflow_transitions(&self, workflow_id: i64) -> crate::Result<Vec<Transition>>;

    // Product workflow operations
    async fn create_product_workflow(&self, product_workflow: NewProductWorkflow) -> crate::Result<ProductWorkflow>;
    async fn get_product_workflow(&self, id: i64) -> crate::Result<Option<ProductWorkflow>>;
    async fn find_product_workflow(&self, product_id: i64, workflow_id: i64) -> crate::Result<Option<ProductWorkflow>>;
    async fn update_product_workflow(&self, id: i64, update: ProductWorkflowUpdate) -> crate::Result<Option<ProductWorkflow>>;
    /// Writes only when `step_id` is `None` or a step of the row's workflow,
    /// checked in the same statement; a foreign step is a `Domain` error.
    async fn set_current_step(&self, id: i64, step_id: Option<i64>) -> crate::Result<Option<ProductWorkflow>>;
    async fn delete_product_workflow(&self, id: i64) -> crate::Result<bool>;
    async fn list_product_workflows(&self, query: &ListQuery) -> crate::Result<Vec<ProductWorkflow>>;
}

/// Translate a failed write into the crate error, naming the violated
/// constraint when the database reports a uniqueness conflict.
pub(crate) fn map_write_error(err: sqlx::Error) -> crate::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err
                .constraint()
                .map(str::to_string)
                .or_else(|| constraint_from_message(db_err.message()).map(str::to_string))
                .unwrap_or_else(|| "unique".to_string());
            let message = constraint_message(&constraint)
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string());
            return crate::Error::ConstraintViolation {
                field: constraint_field(&constraint).map(str::to_string),
                constraint,
                message,
            };
        }
        if db_err.is_foreign_key_violation() {
            return crate::Error::Validation(format!(
                "referenced row does not exist: {}",
                db_err.message()
            ));
        }
    }
    crate::Error::Sqlx(err)
}

// SQLite reports the offending columns instead of the constraint name,
// e.g. "UNIQUE constraint failed: steps.workflow_id, steps.name".
fn constraint_from_message(message: &str) -> Option<&'static str> {
    let columns = message.split("constraint failed:").nth(1)?.trim();
    match columns {
        "products.name" => Some(UNIQUE_PRODUCT_NAME),
        "workflows.name" => Some(UNIQUE_WORKFLOW_NAME),
        "steps.workflow_id, steps.name" => Some(UNIQUE_STEP_NAME),
        "steps.workflow_id, steps.step_order" => Some(UNIQUE_STEP_ORDER),
        "transitions.workflow_id, transitions.from_step_id, transitions.to_step_id" => {
            Some(UNIQUE_TRANSITION)
        }
        "product_workflows.product_id, product_workflows.workflow_id" => {
            Some(UNIQUE_PRODUCT_WORKFLOW)
        }
        _ => None,
    }
}

pub(crate) fn constraint_field(constraint: &str) -> Option<&'static str> {
    match constraint {
        UNIQUE_PRODUCT_NAME | UNIQUE_WORKFLOW_NAME | UNIQUE_STEP_NAME => Some("name"),
        UNIQUE_STEP_ORDER => Some("order"),
        UNIQUE_TRANSITION => Some("to_step"),
        UNIQUE_PRODUCT_WORKFLOW => Some("workflow"),
        _ => None,
    }
}

pub(crate) fn constraint_message(constraint: &str) -> Option<&'static str> {
    match constraint {
        UNIQUE_PRODUCT_NAME => Some("A product with this name already exists."),
        UNIQUE_WORKFLOW_NAME => Some("A workflow with this name already exists."),
        UNIQUE_STEP_NAME => Some("A step with this name already exists in the workflow."),
        UNIQUE_STEP_ORDER => Some("A step with this order already exists in the workflow."),
        UNIQUE_TRANSITION => Some("This transition already exists in the workflow."),
        UNIQUE_PRODUCT_WORKFLOW => Some("A product can only be associated with a workflow once."),
        _ => None,
    }
}

/// A guarded current-step write found `step_id` outside the row's workflow.
pub(crate) fn foreign_step_error(step_id: i64) -> crate::Error {
    crate::Error::Domain(format!(
        "Step {} does not belong to the product workflow's workflow.",
        step_id
    ))
}

/// Error for a uniqueness conflict found before writing.
pub(crate) fn constraint_error(constraint: &str) -> crate::Error {
    crate::Error::constraint(
        constraint,
        constraint_field(constraint),
        constraint_message(constraint).unwrap_or("Uniqueness constraint violated."),
    )
}

pub(crate) fn order_from_db(value: i64) -> crate::Result<u32> {
    u32::try_from(value)
        .map_err(|_| crate::Error::Internal(format!("Invalid step order in database: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_messages_map_to_constraint_names() {
        assert_eq!(
            constraint_from_message("UNIQUE constraint failed: steps.workflow_id, steps.step_order"),
            Some(UNIQUE_STEP_ORDER)
        );
        assert_eq!(
            constraint_from_message(
                "UNIQUE constraint failed: product_workflows.product_id, product_workflows.workflow_id"
            ),
            Some(UNIQUE_PRODUCT_WORKFLOW)
        );
        assert_eq!(constraint_from_message("no such table: steps"), None);
    }

    #[test]
    fn constraint_error_is_field_scoped() {
        match constraint_error(UNIQUE_PRODUCT_WORKFLOW) {
            crate::Error::ConstraintViolation { constraint, field, message } => {
                assert_eq!(constraint, UNIQUE_PRODUCT_WORKFLOW);
                assert_eq!(field.as_deref(), Some("workflow"));
                assert_eq!(message, "A product can only be associated with a workflow once.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn negative_order_is_rejected() {
        assert_eq!(order_from_db(3).unwrap(), 3);
        assert!(order_from_db(-1).is_err());
    }
}
