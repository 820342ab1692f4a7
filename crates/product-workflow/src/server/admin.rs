//! JSON CRUD surface over every entity, with the list/search/filter options
//! of [`ListQuery`].

use axum::{
    extract::State,
    Json,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    store::{
        ListQuery, NewProduct, NewProductWorkflow, NewStep, NewTransition, NewWorkflow, Product,
        ProductWorkflow, ProductWorkflowUpdate, Step, StepUpdate, Transition, TransitionUpdate,
        Workflow,
    },
    Result,
};

use super::{
    extract::{ApiJson, ApiPath, ApiQuery},
    AppState,
};

type Created<T> = (StatusCode, Json<T>);

#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentStepRequest {
    pub step_id: Option<i64>,
}

/// List rows carry the admin display label next to the record.
#[derive(Debug, Serialize)]
pub struct Labeled<T> {
    pub label: String,
    #[serde(flatten)]
    pub record: T,
}

fn labeled<T: std::fmt::Display>(records: Vec<T>) -> Vec<Labeled<T>> {
    records
        .into_iter()
        .map(|record| Labeled {
            label: record.to_string(),
            record,
        })
        .collect()
}

// Products

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Labeled<Product>>>> {
    Ok(Json(labeled(state.service.list_products(&query).await?)))
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    ApiJson(product): ApiJson<NewProduct>,
) -> Result<Created<Product>> {
    let product = state.service.create_product(product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Product>> {
    Ok(Json(state.service.get_product(id).await?))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(product): ApiJson<NewProduct>,
) -> Result<Json<Product>> {
    Ok(Json(state.service.update_product(id, product).await?))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode> {
    state.service.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Workflows

pub async fn list_workflows(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Labeled<Workflow>>>> {
    Ok(Json(labeled(state.service.list_workflows(&query).await?)))
}

pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    ApiJson(workflow): ApiJson<NewWorkflow>,
) -> Result<Created<Workflow>> {
    let workflow = state.service.create_workflow(workflow).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Workflow>> {
    Ok(Json(state.service.get_workflow(id).await?))
}

pub async fn update_workflow(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(workflow): ApiJson<NewWorkflow>,
) -> Result<Json<Workflow>> {
    Ok(Json(state.service.update_workflow(id, workflow).await?))
}

pub async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode> {
    state.service.delete_workflow(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Steps

pub async fn list_steps(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Labeled<Step>>>> {
    Ok(Json(labeled(state.service.list_steps(&query).await?)))
}

pub async fn create_step(
    State(state): State<Arc<AppState>>,
    ApiJson(step): ApiJson<NewStep>,
) -> Result<Created<Step>> {
    let step = state.service.add_step(step).await?;
    Ok((StatusCode::CREATED, Json(step)))
}

pub async fn get_step(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Step>> {
    Ok(Json(state.service.get_step(id).await?))
}

pub async fn update_step(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(step): ApiJson<StepUpdate>,
) -> Result<Json<Step>> {
    Ok(Json(state.service.update_step(id, step).await?))
}

pub async fn delete_step(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode> {
    state.service.delete_step(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Transitions

pub async fn list_transitions(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Labeled<Transition>>>> {
    Ok(Json(labeled(state.service.list_transitions(&query).await?)))
}

pub async fn create_transition(
    State(state): State<Arc<AppState>>,
    ApiJson(transition): ApiJson<NewTransition>,
) -> Result<Created<Transition>> {
    let transition = state.service.add_transition(transition).await?;
    Ok((StatusCode::CREATED, Json(transition)))
}

pub async fn get_transition(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Transition>> {
    Ok(Json(state.service.get_transition(id).await?))
}

pub async fn update_transition(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(transition): ApiJson<TransitionUpdate>,
) -> Result<Json<Transition>> {
    Ok(Json(state.service.update_transition(id, transition).await?))
}

pub async fn delete_transition(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode> {
    state.service.delete_transition(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Product workflows

pub async fn list_product_workflows(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<Labeled<ProductWorkflow>>>> {
    Ok(Json(labeled(state.service.list_product_workflows(&query).await?)))
}

pub async fn create_product_workflow(
    State(state): State<Arc<AppState>>,
    ApiJson(product_workflow): ApiJson<NewProductWorkflow>,
) -> Result<Created<ProductWorkflow>> {
    let product_workflow = state.service.create_product_workflow(product_workflow).await?;
    Ok((StatusCode::CREATED, Json(product_workflow)))
}

pub async fn get_product_workflow(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ProductWorkflow>> {
    Ok(Json(state.service.get_product_workflow(id).await?))
}

pub async fn update_product_workflow(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<ProductWorkflowUpdate>,
) -> Result<Json<ProductWorkflow>> {
    Ok(Json(state.service.update_product_workflow(id, update).await?))
}

pub async fn set_current_step(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<CurrentStepRequest>,
) -> Result<Json<ProductWorkflow>> {
    Ok(Json(state.service.set_current_step(id, request.step_id).await?))
}

pub async fn delete_product_workflow(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode> {
    state.service.delete_product_workflow(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
