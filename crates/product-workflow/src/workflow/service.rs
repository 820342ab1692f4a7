use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    metrics,
    store::{
        constraint_error, ListQuery, NewProduct, NewProductWorkflow, NewStep, NewTransition,
        NewWorkflow, Product, ProductWorkflow, ProductWorkflowUpdate, Step, StepUpdate, Store,
        Transition, TransitionUpdate, Workflow, UNIQUE_PRODUCT_NAME, UNIQUE_PRODUCT_WORKFLOW,
        UNIQUE_STEP_NAME, UNIQUE_STEP_ORDER, UNIQUE_TRANSITION, UNIQUE_WORKFLOW_NAME,
    },
    workflow::{
        graph::TransitionGraph,
        validation::{
            ensure_step_in_workflow, ensure_transition_scoped, transition_is_consistent,
            validate_name,
        },
    },
    Error, Result,
};

/// Everything a detail page needs about one product workflow.
#[derive(Debug, Clone, Serialize)]
pub struct ProductWorkflowDetail {
    pub product_workflow: ProductWorkflow,
    pub label: String,
    pub product: Product,
    pub workflow: Workflow,
    /// Ascending by `order`.
    pub steps: Vec<Step>,
    pub transitions: Vec<Transition>,
    /// Transitions leaving the current step, empty when no step is set.
    pub available_transitions: Vec<Transition>,
    /// Steps that no transition leads into.
    pub entry_step_ids: Vec<i64>,
}

/// Application layer over a [`Store`].
///
/// Every mutation path runs its uniqueness and membership checks here before
/// touching storage, so callers get a field-scoped error instead of a raw
/// database failure. The database constraints remain the last line.
#[derive(Clone)]
pub struct WorkflowService {
    store: Arc<dyn Store>,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // Products

    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = NewProduct {
            name: validate_name("Product", &product.name)?,
            description: product.description,
        };
        self.check(self.ensure_product_name_free(&product.name, None).await)?;

        let created = self.check(self.store.create_product(product).await)?;
        info!("Created product {} ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn get_product(&self, id: i64) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| Error::not_found("Product", id))
    }

    pub async fn update_product(&self, id: i64, product: NewProduct) -> Result<Product> {
        let product = NewProduct {
            name: validate_name("Product", &product.name)?,
            description: product.description,
        };
        self.check(self.ensure_product_name_free(&product.name, Some(id)).await)?;

        self.check(self.store.update_product(id, product).await)?
            .ok_or_else(|| Error::not_found("Product", id))
    }

    /// Deleting a product also removes its product workflows.
    pub async fn delete_product(&self, id: i64) -> Result<()> {
        if !self.store.delete_product(id).await? {
            return Err(Error::not_found("Product", id));
        }
        info!("Deleted product {}", id);
        Ok(())
    }

    pub async fn list_products(&self, query: &ListQuery) -> Result<Vec<Product>> {
        self.store.list_products(query).await
    }

    // Workflows

    pub async fn create_workflow(&self, workflow: NewWorkflow) -> Result<Workflow> {
        let workflow = NewWorkflow {
            name: validate_name("Workflow", &workflow.name)?,
            description: workflow.description,
        };
        self.check(self.ensure_workflow_name_free(&workflow.name, None).await)?;

        let created = self.check(self.store.create_workflow(workflow).await)?;
        info!("Created workflow {} ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn get_workflow(&self, id: i64) -> Result<Workflow> {
        self.store
            .get_workflow(id)
            .await?
            .ok_or_else(|| Error::not_found("Workflow", id))
    }

    pub async fn update_workflow(&self, id: i64, workflow: NewWorkflow) -> Result<Workflow> {
        let workflow = NewWorkflow {
            name: validate_name("Workflow", &workflow.name)?,
            description: workflow.description,
        };
        self.check(self.ensure_workflow_name_free(&workflow.name, Some(id)).await)?;

        self.check(self.store.update_workflow(id, workflow).await)?
            .ok_or_else(|| Error::not_found("Workflow", id))
    }

    /// Cascades to the workflow's steps, transitions and product workflows.
    pub async fn delete_workflow(&self, id: i64) -> Result<()> {
        if !self.store.delete_workflow(id).await? {
            return Err(Error::not_found("Workflow", id));
        }
        info!("Deleted workflow {} with its steps, transitions and product workflows", id);
        Ok(())
    }

    pub async fn list_workflows(&self, query: &ListQuery) -> Result<Vec<Workflow>> {
        self.store.list_workflows(query).await
    }

    // Steps

    pub async fn add_step(&self, step: NewStep) -> Result<Step> {
        let step = NewStep {
            name: validate_name("Step", &step.name)?,
            ..step
        };
        self.get_workflow(step.workflow_id).await?;
        self.check(
            self.ensure_step_slot_free(step.workflow_id, &step.name, step.order, None)
                .await,
        )?;

        let created = self.check(self.store.create_step(step).await)?;
        info!(
            "Added step {} ({}) to workflow {} at order {}",
            created.id, created.name, created.workflow_id, created.order
        );
        Ok(created)
    }

    pub async fn get_step(&self, id: i64) -> Result<Step> {
        self.store
            .get_step(id)
            .await?
            .ok_or_else(|| Error::not_found("Step", id))
    }

    pub async fn update_step(&self, id: i64, update: StepUpdate) -> Result<Step> {
        let update = StepUpdate {
            name: validate_name("Step", &update.name)?,
            ..update
        };
        let existing = self.get_step(id).await?;
        self.check(
            self.ensure_step_slot_free(existing.workflow_id, &update.name, update.order, Some(id))
                .await,
        )?;

        self.check(self.store.update_step(id, update).await)?
            .ok_or_else(|| Error::not_found("Step", id))
    }

    /// Removes the step's transitions and clears it as anyone's current step.
    pub async fn delete_step(&self, id: i64) -> Result<()> {
        if !self.store.delete_step(id).await? {
            return Err(Error::not_found("Step", id));
        }
        info!("Deleted step {}", id);
        Ok(())
    }

    pub async fn list_steps(&self, query: &ListQuery) -> Result<Vec<Step>> {
        self.store.list_steps(query).await
    }

    // Transitions

    pub async fn add_transition(&self, transition: NewTransition) -> Result<Transition> {
        let transition = NewTransition {
            condition: normalize_condition(transition.condition),
            ..transition
        };
        self.get_workflow(transition.workflow_id).await?;
        self.check(
            self.validate_transition(
                transition.workflow_id,
                transition.from_step_id,
                transition.to_step_id,
                None,
            )
            .await,
        )?;

        let created = self.check(self.store.create_transition(transition).await)?;
        info!(
            "Added transition {}: {} -> {} in workflow {}",
            created.id, created.from_step_id, created.to_step_id, created.workflow_id
        );
        Ok(created)
    }

    pub async fn get_transition(&self, id: i64) -> Result<Transition> {
        self.store
            .get_transition(id)
            .await?
            .ok_or_else(|| Error::not_found("Transition", id))
    }

    pub async fn update_transition(&self, id: i64, update: TransitionUpdate) -> Result<Transition> {
        let update = TransitionUpdate {
            condition: normalize_condition(update.condition),
            ..update
        };
        let existing = self.get_transition(id).await?;
        self.check(
            self.validate_transition(
                existing.workflow_id,
                update.from_step_id,
                update.to_step_id,
                Some(id),
            )
            .await,
        )?;

        self.check(self.store.update_transition(id, update).await)?
            .ok_or_else(|| Error::not_found("Transition", id))
    }

    pub async fn delete_transition(&self, id: i64) -> Result<()> {
        if !self.store.delete_transition(id).await? {
            return Err(Error::not_found("Transition", id));
        }
        info!("Deleted transition {}", id);
        Ok(())
    }

    pub async fn list_transitions(&self, query: &ListQuery) -> Result<Vec<Transition>> {
        self.store.list_transitions(query).await
    }

    // Product workflows

    /// Attach a product to a workflow. The current step starts unset.
    pub async fn create_product_workflow(&self, new: NewProductWorkflow) -> Result<ProductWorkflow> {
        self.get_product(new.product_id).await?;
        self.get_workflow(new.workflow_id).await?;
        self.check(
            self.validate_product_workflow(new.product_id, new.workflow_id, None)
                .await,
        )?;

        let created = self.check(self.store.create_product_workflow(new).await)?;
        info!("Created product workflow {}", created);
        Ok(created)
    }

    pub async fn get_product_workflow(&self, id: i64) -> Result<ProductWorkflow> {
        self.store
            .get_product_workflow(id)
            .await?
            .ok_or_else(|| Error::not_found("ProductWorkflow", id))
    }

    /// Administrative edit of all three references at once.
    pub async fn update_product_workflow(
        &self,
        id: i64,
        update: ProductWorkflowUpdate,
    ) -> Result<ProductWorkflow> {
        self.get_product_workflow(id).await?;
        self.get_product(update.product_id).await?;
        self.get_workflow(update.workflow_id).await?;
        self.check(
            self.validate_product_workflow(update.product_id, update.workflow_id, Some(id))
                .await,
        )?;
        if let Some(step_id) = update.current_step_id {
            let step = self.get_step(step_id).await?;
            self.check(ensure_step_in_workflow(update.workflow_id, &step))?;
        }

        let updated = self
            .check(self.store.update_product_workflow(id, update).await)?
            .ok_or_else(|| Error::not_found("ProductWorkflow", id))?;
        info!("Updated product workflow {}", updated);
        Ok(updated)
    }

    /// Move a product workflow to `step_id`, or clear its position with
    /// `None`. The step must belong to the product workflow's own workflow.
    /// Concurrent calls are last write wins.
    pub async fn set_current_step(&self, id: i64, step_id: Option<i64>) -> Result<ProductWorkflow> {
        let product_workflow = self.get_product_workflow(id).await?;
        if let Some(step_id) = step_id {
            let step = self.get_step(step_id).await?;
            self.check(ensure_step_in_workflow(product_workflow.workflow_id, &step))?;
        }

        let updated = self
            .check(self.store.set_current_step(id, step_id).await)?
            .ok_or_else(|| Error::not_found("ProductWorkflow", id))?;
        metrics::CURRENT_STEP_CHANGES_TOTAL.inc();
        info!("Moved product workflow {}", updated);
        Ok(updated)
    }

    pub async fn delete_product_workflow(&self, id: i64) -> Result<()> {
        if !self.store.delete_product_workflow(id).await? {
            return Err(Error::not_found("ProductWorkflow", id));
        }
        info!("Deleted product workflow {}", id);
        Ok(())
    }

    pub async fn list_product_workflows(&self, query: &ListQuery) -> Result<Vec<ProductWorkflow>> {
        self.store.list_product_workflows(query).await
    }

    /// Product workflow plus its workflow's ordered steps and transitions.
    pub async fn product_workflow_detail(&self, id: i64) -> Result<ProductWorkflowDetail> {
        let product_workflow = match self.store.get_product_workflow(id).await? {
            Some(pw) => pw,
            None => {
                metrics::DETAIL_LOOKUPS_TOTAL
                    .with_label_values(&["not_found"])
                    .inc();
                return Err(Error::not_found("ProductWorkflow", id));
            }
        };

        let product = self.get_product(product_workflow.product_id).await?;
        let workflow = self.get_workflow(product_workflow.workflow_id).await?;
        let mut steps = self.store.list_workflow_steps(workflow.id).await?;
        steps.sort_by_key(|step| step.order);
        let transitions = self.store.list_workflow_transitions(workflow.id).await?;

        for transition in &transitions {
            let from = steps.iter().find(|s| s.id == transition.from_step_id);
            let to = steps.iter().find(|s| s.id == transition.to_step_id);
            let consistent = match (from, to) {
                (Some(from), Some(to)) => transition_is_consistent(transition, from, to),
                _ => false,
            };
            if !consistent {
                warn!(
                    "Transition {} of workflow {} references steps outside the workflow",
                    transition.id, workflow.id
                );
            }
        }

        let graph = TransitionGraph::new(&steps, &transitions);
        let available_transitions = product_workflow
            .current_step_id
            .map(|step_id| {
                graph
                    .outgoing_transitions(step_id, &transitions)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        metrics::DETAIL_LOOKUPS_TOTAL.with_label_values(&["found"]).inc();
        debug!(
            "Loaded detail for product workflow {}: {} steps, {} transitions",
            id,
            steps.len(),
            transitions.len()
        );

        Ok(ProductWorkflowDetail {
            label: product_workflow.to_string(),
            entry_step_ids: graph.entry_steps().to_vec(),
            product_workflow,
            product,
            workflow,
            steps,
            transitions,
            available_transitions,
        })
    }

    // Pre-save checks

    async fn ensure_product_name_free(&self, name: &str, exclude: Option<i64>) -> Result<()> {
        match self.store.find_product_by_name(name).await? {
            Some(existing) if Some(existing.id) != exclude => Err(constraint_error(UNIQUE_PRODUCT_NAME)),
            _ => Ok(()),
        }
    }

    async fn ensure_workflow_name_free(&self, name: &str, exclude: Option<i64>) -> Result<()> {
        match self.store.find_workflow_by_name(name).await? {
            Some(existing) if Some(existing.id) != exclude => Err(constraint_error(UNIQUE_WORKFLOW_NAME)),
            _ => Ok(()),
        }
    }

    async fn ensure_step_slot_free(
        &self,
        workflow_id: i64,
        name: &str,
        order: u32,
        exclude: Option<i64>,
    ) -> Result<()> {
        if let Some(existing) = self.store.find_step_by_name(workflow_id, name).await? {
            if Some(existing.id) != exclude {
                return Err(constraint_error(UNIQUE_STEP_NAME));
            }
        }
        if let Some(existing) = self.store.find_step_by_order(workflow_id, order).await? {
            if Some(existing.id) != exclude {
                return Err(constraint_error(UNIQUE_STEP_ORDER));
            }
        }
        Ok(())
    }

    async fn validate_transition(
        &self,
        workflow_id: i64,
        from_step_id: i64,
        to_step_id: i64,
        exclude: Option<i64>,
    ) -> Result<()> {
        let from_step = self.get_step(from_step_id).await?;
        let to_step = self.get_step(to_step_id).await?;
        ensure_transition_scoped(workflow_id, &from_step, &to_step)?;

        match self
            .store
            .find_transition(workflow_id, from_step_id, to_step_id)
            .await?
        {
            Some(existing) if Some(existing.id) != exclude => Err(constraint_error(UNIQUE_TRANSITION)),
            _ => Ok(()),
        }
    }

    /// Application-level twin of the `unique_product_workflow` constraint.
    async fn validate_product_workflow(
        &self,
        product_id: i64,
        workflow_id: i64,
        exclude: Option<i64>,
    ) -> Result<()> {
        match self.store.find_product_workflow(product_id, workflow_id).await? {
            Some(existing) if Some(existing.id) != exclude => {
                debug!(
                    "Product {} already has workflow {} as product workflow {}",
                    product_id, workflow_id, existing.id
                );
                Err(constraint_error(UNIQUE_PRODUCT_WORKFLOW))
            }
            _ => Ok(()),
        }
    }

    fn check<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            metrics::record_error(err);
        }
        result
    }
}

fn normalize_condition(condition: Option<String>) -> Option<String> {
    condition.filter(|c| !c.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockStore;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn product(id: i64) -> Product {
        Product {
            id,
            name: format!("product-{}", id),
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn workflow(id: i64) -> Workflow {
        Workflow {
            id,
            name: format!("workflow-{}", id),
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn step(id: i64, workflow_id: i64, order: u32) -> Step {
        Step {
            id,
            workflow_id,
            workflow_name: "Release".to_string(),
            name: format!("step-{}", id),
            description: String::new(),
            order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product_workflow(id: i64, product_id: i64, workflow_id: i64) -> ProductWorkflow {
        ProductWorkflow {
            id,
            product_id,
            workflow_id,
            current_step_id: None,
            current_step_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(store: MockStore) -> WorkflowService {
        WorkflowService::new(Arc::new(store))
    }

    #[tokio::test]
    async fn duplicate_product_workflow_is_rejected_before_writing() {
        let mut store = MockStore::new();
        store
            .expect_get_product()
            .with(eq(1))
            .returning(|id| Ok(Some(product(id))));
        store
            .expect_get_workflow()
            .with(eq(2))
            .returning(|id| Ok(Some(workflow(id))));
        store
            .expect_find_product_workflow()
            .with(eq(1), eq(2))
            .returning(|p, w| Ok(Some(product_workflow(9, p, w))));
        store.expect_create_product_workflow().never();

        let err = service(store)
            .create_product_workflow(NewProductWorkflow {
                product_id: 1,
                workflow_id: 2,
            })
            .await
            .unwrap_err();

        match err {
            Error::ConstraintViolation { constraint, field, message } => {
                assert_eq!(constraint, UNIQUE_PRODUCT_WORKFLOW);
                assert_eq!(field.as_deref(), Some("workflow"));
                assert_eq!(message, "A product can only be associated with a workflow once.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn cross_workflow_transition_is_a_domain_error() {
        let mut store = MockStore::new();
        store
            .expect_get_workflow()
            .returning(|id| Ok(Some(workflow(id))));
        store
            .expect_get_step()
            .with(eq(10))
            .returning(|id| Ok(Some(step(id, 1, 0))));
        store
            .expect_get_step()
            .with(eq(20))
            .returning(|id| Ok(Some(step(id, 2, 0))));
        store.expect_find_transition().never();
        store.expect_create_transition().never();

        let err = service(store)
            .add_transition(NewTransition {
                workflow_id: 1,
                from_step_id: 10,
                to_step_id: 20,
                condition: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Domain(_)));
    }

    #[tokio::test]
    async fn current_step_from_another_workflow_is_rejected() {
        let mut store = MockStore::new();
        store
            .expect_get_product_workflow()
            .with(eq(5))
            .returning(|id| Ok(Some(product_workflow(id, 1, 1))));
        store
            .expect_get_step()
            .with(eq(30))
            .returning(|id| Ok(Some(step(id, 2, 0))));
        store.expect_set_current_step().never();

        let err = service(store)
            .set_current_step(5, Some(30))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Domain(_)));
    }

    #[tokio::test]
    async fn clearing_current_step_skips_step_lookup() {
        let mut store = MockStore::new();
        store
            .expect_get_product_workflow()
            .returning(|id| Ok(Some(product_workflow(id, 1, 1))));
        store.expect_get_step().never();
        store
            .expect_set_current_step()
            .with(eq(5), eq(None::<i64>))
            .times(1)
            .returning(|id, _| Ok(Some(product_workflow(id, 1, 1))));

        let updated = service(store).set_current_step(5, None).await.unwrap();
        assert_eq!(updated.current_step_id, None);
    }

    #[tokio::test]
    async fn admin_update_checks_step_against_the_new_workflow() {
        let mut store = MockStore::new();
        store
            .expect_get_product_workflow()
            .with(eq(5))
            .returning(|id| Ok(Some(product_workflow(id, 1, 1))));
        store
            .expect_get_product()
            .returning(|id| Ok(Some(product(id))));
        store
            .expect_get_workflow()
            .returning(|id| Ok(Some(workflow(id))));
        store
            .expect_find_product_workflow()
            .with(eq(1), eq(2))
            .returning(|_, _| Ok(None));
        // Step 30 belongs to the old workflow
        store
            .expect_get_step()
            .with(eq(30))
            .returning(|id| Ok(Some(step(id, 1, 0))));
        store.expect_update_product_workflow().never();

        let err = service(store)
            .update_product_workflow(
                5,
                ProductWorkflowUpdate {
                    product_id: 1,
                    workflow_id: 2,
                    current_step_id: Some(30),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Domain(_)));
    }

    #[tokio::test]
    async fn step_order_collision_is_reported_per_constraint() {
        let mut store = MockStore::new();
        store
            .expect_get_workflow()
            .returning(|id| Ok(Some(workflow(id))));
        store
            .expect_find_step_by_name()
            .returning(|_, _| Ok(None));
        store
            .expect_find_step_by_order()
            .with(eq(1), eq(3))
            .returning(|w, order| Ok(Some(step(77, w, order))));
        store.expect_create_step().never();

        let err = service(store)
            .add_step(NewStep {
                workflow_id: 1,
                name: "Review".to_string(),
                description: String::new(),
                order: 3,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::ConstraintViolation { ref constraint, .. } if constraint == UNIQUE_STEP_ORDER
        ));
    }

    #[tokio::test]
    async fn step_may_keep_its_own_name_and_order() {
        let mut store = MockStore::new();
        store
            .expect_get_step()
            .with(eq(4))
            .returning(|id| Ok(Some(step(id, 1, 2))));
        store
            .expect_find_step_by_name()
            .returning(|w, _| Ok(Some(step(4, w, 2))));
        store
            .expect_find_step_by_order()
            .returning(|w, order| Ok(Some(step(4, w, order))));
        store
            .expect_update_step()
            .times(1)
            .returning(|id, update| {
                let mut updated = step(id, 1, update.order);
                updated.name = update.name;
                Ok(Some(updated))
            });

        let updated = service(store)
            .update_step(
                4,
                StepUpdate {
                    name: "step-4".to_string(),
                    description: "now documented".to_string(),
                    order: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.order, 2);
    }

    #[tokio::test]
    async fn missing_detail_is_not_found() {
        let mut store = MockStore::new();
        store
            .expect_get_product_workflow()
            .with(eq(42))
            .returning(|_| Ok(None));
        store.expect_list_workflow_steps().never();

        let err = service(store).product_workflow_detail(42).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_product_name_never_reaches_the_store() {
        let mut store = MockStore::new();
        store.expect_find_product_by_name().never();
        store.expect_create_product().never();

        let err = service(store)
            .create_product(NewProduct {
                name: "  ".to_string(),
                description: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn blank_conditions_are_dropped() {
        assert_eq!(normalize_condition(Some("  ".to_string())), None);
        assert_eq!(
            normalize_condition(Some("approved".to_string())).as_deref(),
            Some("approved")
        );
    }
}
