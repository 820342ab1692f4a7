use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    Json,
};
use http::{header, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::{metrics, workflow::ProductWorkflowDetail, Result};

use super::{extract::ApiPath, AppState};

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics() -> Result<Response> {
    let body = metrics::gather_metrics()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// `GET /product_workflow/{id}/`
pub async fn product_workflow_detail_page(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Html<String>> {
    debug!("Rendering detail page for product workflow {}", id);
    let detail = state.service.product_workflow_detail(id).await?;
    Ok(Html(state.renderer.render(&detail)?))
}

/// `GET /api/product_workflows/{id}/detail`
pub async fn product_workflow_detail(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ProductWorkflowDetail>> {
    let detail = state.service.product_workflow_detail(id).await?;
    Ok(Json(detail))
}
