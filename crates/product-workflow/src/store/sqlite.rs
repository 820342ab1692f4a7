use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, QueryBuilder, Row, Sqlite,
};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, error, info};

use crate::{
    store::{
        foreign_step_error, map_write_error, order_from_db, ListQuery, NewProduct, NewProductWorkflow, NewStep,
        NewTransition, NewWorkflow, Product, ProductWorkflow, ProductWorkflowUpdate, Step,
        StepUpdate, Store, Transition, TransitionUpdate, Workflow,
    },
    Error, Result,
};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.created_at, p.updated_at";
const WORKFLOW_COLUMNS: &str = "w.id, w.name, w.description, w.created_at, w.updated_at";
const STEP_COLUMNS: &str =
    "s.id, s.workflow_id, w.name AS workflow_name, s.name, s.description, s.step_order, s.created_at, s.updated_at";
const TRANSITION_COLUMNS: &str =
    "t.id, t.workflow_id, w.name AS workflow_name, t.from_step_id, fs.name AS from_step_name, \
     t.to_step_id, ts.name AS to_step_name, t.condition";
const STEP_FROM: &str = "steps s JOIN workflows w ON w.id = s.workflow_id";
const TRANSITION_FROM: &str = "transitions t \
     JOIN workflows w ON w.id = t.workflow_id \
     JOIN steps fs ON fs.id = t.from_step_id \
     JOIN steps ts ON ts.id = t.to_step_id";
const PRODUCT_WORKFLOW_SELECT: &str = r#"
    SELECT pw.id, pw.product_id, pw.workflow_id, pw.current_step_id,
           cs.name AS current_step_name, pw.created_at, pw.updated_at
    FROM product_workflows pw
    LEFT JOIN steps cs ON cs.id = pw.current_step_id
"#;

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. `:memory:` yields a private
    /// in-memory database held by a single pooled connection.
    pub async fn new(path: &Path, max_connections: u32) -> Result<Self> {
        info!("Connecting to SQLite database: {}", path.display());

        let in_memory = path.as_os_str() == ":memory:";
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };
        let options = options.foreign_keys(true);

        let pool_options = if in_memory {
            // The database lives only as long as its connection.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to connect to SQLite: {}", e);
                Error::Sqlx(e)
            })?;

        Ok(Self { pool })
    }
}

impl SqliteStore {
    /// Explains an UPDATE of a product workflow that matched no row: either
    /// the row is gone or `step_id` is not a step of its workflow.
    async fn unchanged_product_workflow(
        &self,
        id: i64,
        step_id: Option<i64>,
    ) -> Result<Option<ProductWorkflow>> {
        match (step_id, self.get_product_workflow(id).await?) {
            (Some(step_id), Some(_)) => Err(foreign_step_error(step_id)),
            _ => Ok(None),
        }
    }
}

fn product_from_row(r: &SqliteRow) -> Product {
    Product {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn workflow_from_row(r: &SqliteRow) -> Workflow {
    Workflow {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn step_from_row(r: &SqliteRow) -> Result<Step> {
    Ok(Step {
        id: r.get("id"),
        workflow_id: r.get("workflow_id"),
        workflow_name: r.get("workflow_name"),
        name: r.get("name"),
        description: r.get("description"),
        order: order_from_db(r.get("step_order"))?,
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn transition_from_row(r: &SqliteRow) -> Transition {
    Transition {
        id: r.get("id"),
        workflow_id: r.get("workflow_id"),
        workflow_name: r.get("workflow_name"),
        from_step_id: r.get("from_step_id"),
        from_step_name: r.get("from_step_name"),
        to_step_id: r.get("to_step_id"),
        to_step_name: r.get("to_step_name"),
        condition: r.get("condition"),
    }
}

fn product_workflow_from_row(r: &SqliteRow) -> ProductWorkflow {
    ProductWorkflow {
        id: r.get("id"),
        product_id: r.get("product_id"),
        workflow_id: r.get("workflow_id"),
        current_step_id: r.get("current_step_id"),
        current_step_name: r.get("current_step_name"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn push_search(qb: &mut QueryBuilder<'_, Sqlite>, columns: &[&str], query: &ListQuery) {
    let Some(pattern) = query.search_pattern() else {
        return;
    };
    qb.push(" AND (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(*column)
            .push(" LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\'");
    }
    qb.push(")");
}

fn push_timestamp_filters(qb: &mut QueryBuilder<'_, Sqlite>, alias: &str, query: &ListQuery) {
    if let Some(after) = query.created_after {
        qb.push(format!(" AND {}.created_at >= ", alias)).push_bind(after);
    }
    if let Some(before) = query.created_before {
        qb.push(format!(" AND {}.created_at <= ", alias)).push_bind(before);
    }
    if let Some(after) = query.updated_after {
        qb.push(format!(" AND {}.updated_at >= ", alias)).push_bind(after);
    }
    if let Some(before) = query.updated_before {
        qb.push(format!(" AND {}.updated_at <= ", alias)).push_bind(before);
    }
}

fn push_workflow_filter(qb: &mut QueryBuilder<'_, Sqlite>, alias: &str, query: &ListQuery) {
    if let Some(workflow_id) = query.workflow_id {
        qb.push(format!(" AND {}.workflow_id = ", alias)).push_bind(workflow_id);
    }
}

fn push_pagination(qb: &mut QueryBuilder<'_, Sqlite>, query: &ListQuery) {
    qb.push(" LIMIT ")
        .push_bind(query.limit())
        .push(" OFFSET ")
        .push_bind(query.offset());
}

#[async_trait]
impl Store for SqliteStore {
    async fn init(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                Error::Migrate(e)
            })?;

        Ok(())
    }

    // Product operations
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        debug!("Creating product: {}", product.name);

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO products (name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        let id = result.last_insert_rowid();
        self.get_product(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Product {} missing after insert", id)))
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        debug!("Getting product: {}", id);

        let row = sqlx::query(&format!("SELECT {} FROM products p WHERE p.id = ?1", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(product_from_row))
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {} FROM products p WHERE p.name = ?1", PRODUCT_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(product_from_row))
    }

    async fn update_product(&self, id: i64, product: NewProduct) -> Result<Option<Product>> {
        debug!("Updating product: {}", id);

        let result = sqlx::query(
            "UPDATE products SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_product(id).await
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        debug!("Deleting product: {}", id);

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&self, query: &ListQuery) -> Result<Vec<Product>> {
        debug!("Listing products: {:?}", query);

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM products p WHERE 1 = 1",
            PRODUCT_COLUMNS
        ));
        push_search(&mut qb, &["p.name", "p.description"], query);
        push_timestamp_filters(&mut qb, "p", query);
        qb.push(" ORDER BY p.name");
        push_pagination(&mut qb, query);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    // Workflow operations
    async fn create_workflow(&self, workflow: NewWorkflow) -> Result<Workflow> {
        debug!("Creating workflow: {}", workflow.name);

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO workflows (name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        let id = result.last_insert_rowid();
        self.get_workflow(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Workflow {} missing after insert", id)))
    }

    async fn get_workflow(&self, id: i64) -> Result<Option<Workflow>> {
        debug!("Getting workflow: {}", id);

        let row = sqlx::query(&format!("SELECT {} FROM workflows w WHERE w.id = ?1", WORKFLOW_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(workflow_from_row))
    }

    async fn find_workflow_by_name(&self, name: &str) -> Result<Option<Workflow>> {
        let row = sqlx::query(&format!("SELECT {} FROM workflows w WHERE w.name = ?1", WORKFLOW_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(workflow_from_row))
    }

    async fn update_workflow(&self, id: i64, workflow: NewWorkflow) -> Result<Option<Workflow>> {
        debug!("Updating workflow: {}", id);

        let result = sqlx::query(
            "UPDATE workflows SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_workflow(id).await
    }

    async fn delete_workflow(&self, id: i64) -> Result<bool> {
        debug!("Deleting workflow: {}", id);

        let result = sqlx::query("DELETE FROM workflows WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_workflows(&self, query: &ListQuery) -> Result<Vec<Workflow>> {
        debug!("Listing workflows: {:?}", query);

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM workflows w WHERE 1 = 1",
            WORKFLOW_COLUMNS
        ));
        push_search(&mut qb, &["w.name", "w.description"], query);
        push_timestamp_filters(&mut qb, "w", query);
        qb.push(" ORDER BY w.name");
        push_pagination(&mut qb, query);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(workflow_from_row).collect())
    }

    // Step operations
    async fn create_step(&self, step: NewStep) -> Result<Step> {
        debug!("Creating step {} in workflow {}", step.name, step.workflow_id);

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO steps (workflow_id, name, description, step_order, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(step.workflow_id)
        .bind(&step.name)
        .bind(&step.description)
        .bind(i64::from(step.order))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        let id = result.last_insert_rowid();
        self.get_step(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Step {} missing after insert", id)))
    }

    async fn get_step(&self, id: i64) -> Result<Option<Step>> {
        debug!("Getting step: {}", id);

        let row = sqlx::query(&format!("SELECT {} FROM {} WHERE s.id = ?1", STEP_COLUMNS, STEP_FROM))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(step_from_row).transpose()
    }

    async fn find_step_by_name(&self, workflow_id: i64, name: &str) -> Result<Option<Step>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE s.workflow_id = ?1 AND s.name = ?2",
            STEP_COLUMNS, STEP_FROM
        ))
        .bind(workflow_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(step_from_row).transpose()
    }

    async fn find_step_by_order(&self, workflow_id: i64, order: u32) -> Result<Option<Step>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE s.workflow_id = ?1 AND s.step_order = ?2",
            STEP_COLUMNS, STEP_FROM
        ))
        .bind(workflow_id)
        .bind(i64::from(order))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(step_from_row).transpose()
    }

    async fn update_step(&self, id: i64, step: StepUpdate) -> Result<Option<Step>> {
        debug!("Updating step: {}", id);

        let result = sqlx::query(
            "UPDATE steps SET name = ?1, description = ?2, step_order = ?3, updated_at = ?4 WHERE id = ?5",
        )
        .bind(&step.name)
        .bind(&step.description)
        .bind(i64::from(step.order))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_step(id).await
    }

    async fn delete_step(&self, id: i64) -> Result<bool> {
        debug!("Deleting step: {}", id);

        let result = sqlx::query("DELETE FROM steps WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_steps(&self, query: &ListQuery) -> Result<Vec<Step>> {
        debug!("Listing steps: {:?}", query);

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM {} WHERE 1 = 1",
            STEP_COLUMNS, STEP_FROM
        ));
        push_workflow_filter(&mut qb, "s", query);
        push_search(&mut qb, &["s.name", "s.description", "w.name"], query);
        push_timestamp_filters(&mut qb, "s", query);
        qb.push(" ORDER BY w.name, s.step_order");
        push_pagination(&mut qb, query);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(step_from_row).collect()
    }

    async fn list_workflow_steps(&self, workflow_id: i64) -> Result<Vec<Step>> {
        debug!("Listing steps of workflow: {}", workflow_id);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE s.workflow_id = ?1 ORDER BY s.step_order ASC",
            STEP_COLUMNS, STEP_FROM
        ))
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(step_from_row).collect()
    }

    // Transition operations
    async fn create_transition(&self, transition: NewTransition) -> Result<Transition> {
        debug!(
            "Creating transition {} -> {} in workflow {}",
            transition.from_step_id, transition.to_step_id, transition.workflow_id
        );

        let result = sqlx::query(
            r#"
            INSERT INTO transitions (workflow_id, from_step_id, to_step_id, condition)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(transition.workflow_id)
        .bind(transition.from_step_id)
        .bind(transition.to_step_id)
        .bind(&transition.condition)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        let id = result.last_insert_rowid();
        self.get_transition(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Transition {} missing after insert", id)))
    }

    async fn get_transition(&self, id: i64) -> Result<Option<Transition>> {
        debug!("Getting transition: {}", id);

        let row = sqlx::query(&format!("SELECT {} FROM {} WHERE t.id = ?1", TRANSITION_COLUMNS, TRANSITION_FROM))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(transition_from_row))
    }

    async fn find_transition(&self, workflow_id: i64, from_step_id: i64, to_step_id: i64) -> Result<Option<Transition>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE t.workflow_id = ?1 AND t.from_step_id = ?2 AND t.to_step_id = ?3",
            TRANSITION_COLUMNS, TRANSITION_FROM
        ))
        .bind(workflow_id)
        .bind(from_step_id)
        .bind(to_step_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(transition_from_row))
    }

    async fn update_transition(&self, id: i64, transition: TransitionUpdate) -> Result<Option<Transition>> {
        debug!("Updating transition: {}", id);

        let result = sqlx::query(
            "UPDATE transitions SET from_step_id = ?1, to_step_id = ?2, condition = ?3 WHERE id = ?4",
        )
        .bind(transition.from_step_id)
        .bind(transition.to_step_id)
        .bind(&transition.condition)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_transition(id).await
    }

    async fn delete_transition(&self, id: i64) -> Result<bool> {
        debug!("Deleting transition: {}", id);

        let result = sqlx::query("DELETE FROM transitions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_transitions(&self, query: &ListQuery) -> Result<Vec<Transition>> {
        debug!("Listing transitions: {:?}", query);

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM {} WHERE 1 = 1",
            TRANSITION_COLUMNS, TRANSITION_FROM
        ));
        push_workflow_filter(&mut qb, "t", query);
        push_search(&mut qb, &["w.name", "fs.name", "ts.name"], query);
        qb.push(" ORDER BY w.name, fs.step_order, ts.step_order, t.id");
        push_pagination(&mut qb, query);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(transition_from_row).collect())
    }

    async fn list_workflow_transitions(&self, workflow_id: i64) -> Result<Vec<Transition>> {
        debug!("Listing transitions of workflow: {}", workflow_id);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE t.workflow_id = ?1 ORDER BY t.id",
            TRANSITION_COLUMNS, TRANSITION_FROM
        ))
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(transition_from_row).collect())
    }

    // Product workflow operations
    async fn create_product_workflow(&self, product_workflow: NewProductWorkflow) -> Result<ProductWorkflow> {
        debug!(
            "Creating product workflow: product {} workflow {}",
            product_workflow.product_id, product_workflow.workflow_id
        );

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO product_workflows (product_id, workflow_id, current_step_id, created_at, updated_at)
            VALUES (?1, ?2, NULL, ?3, ?4)
            "#,
        )
        .bind(product_workflow.product_id)
        .bind(product_workflow.workflow_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        let id = result.last_insert_rowid();
        self.get_product_workflow(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Product workflow {} missing after insert", id)))
    }

    async fn get_product_workflow(&self, id: i64) -> Result<Option<ProductWorkflow>> {
        debug!("Getting product workflow: {}", id);

        let row = sqlx::query(&format!("{} WHERE pw.id = ?1", PRODUCT_WORKFLOW_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(product_workflow_from_row))
    }

    async fn find_product_workflow(&self, product_id: i64, workflow_id: i64) -> Result<Option<ProductWorkflow>> {
        let row = sqlx::query(&format!(
            "{} WHERE pw.product_id = ?1 AND pw.workflow_id = ?2",
            PRODUCT_WORKFLOW_SELECT
        ))
        .bind(product_id)
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(product_workflow_from_row))
    }

    async fn update_product_workflow(&self, id: i64, update: ProductWorkflowUpdate) -> Result<Option<ProductWorkflow>> {
        debug!("Updating product workflow: {}", id);

        let result = sqlx::query(
            r#"
            UPDATE product_workflows
            SET product_id = ?1, workflow_id = ?2, current_step_id = ?3, updated_at = ?4
            WHERE id = ?5
              AND (?3 IS NULL
                   OR EXISTS (SELECT 1 FROM steps s WHERE s.id = ?3 AND s.workflow_id = ?2))
            "#,
        )
        .bind(update.product_id)
        .bind(update.workflow_id)
        .bind(update.current_step_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return self.unchanged_product_workflow(id, update.current_step_id).await;
        }
        self.get_product_workflow(id).await
    }

    async fn set_current_step(&self, id: i64, step_id: Option<i64>) -> Result<Option<ProductWorkflow>> {
        debug!("Setting current step of product workflow {}: {:?}", id, step_id);

        let result = sqlx::query(
            r#"
            UPDATE product_workflows SET current_step_id = ?1, updated_at = ?2
            WHERE id = ?3
              AND (?1 IS NULL
                   OR EXISTS (SELECT 1 FROM steps s
                              WHERE s.id = ?1 AND s.workflow_id = product_workflows.workflow_id))
            "#,
        )
        .bind(step_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return self.unchanged_product_workflow(id, step_id).await;
        }
        self.get_product_workflow(id).await
    }

    async fn delete_product_workflow(&self, id: i64) -> Result<bool> {
        debug!("Deleting product workflow: {}", id);

        let result = sqlx::query("DELETE FROM product_workflows WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_product_workflows(&self, query: &ListQuery) -> Result<Vec<ProductWorkflow>> {
        debug!("Listing product workflows: {:?}", query);

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            r#"
            {}
            JOIN products p ON p.id = pw.product_id
            JOIN workflows w ON w.id = pw.workflow_id
            WHERE 1 = 1
            "#,
            PRODUCT_WORKFLOW_SELECT
        ));
        push_workflow_filter(&mut qb, "pw", query);
        push_search(&mut qb, &["p.name", "w.name", "cs.name"], query);
        push_timestamp_filters(&mut qb, "pw", query);
        qb.push(" ORDER BY p.name, w.name");
        push_pagination(&mut qb, query);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(product_workflow_from_row).collect())
    }
}
