mod admin;
mod error;
mod extract;
mod routes;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    store::Store,
    template::DetailRenderer,
    workflow::WorkflowService,
    Result,
};

pub use admin::CurrentStepRequest;

pub struct AppState {
    pub service: WorkflowService,
    pub renderer: DetailRenderer,
}

pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(store: Arc<dyn Store>) -> Result<Self> {
        let state = AppState {
            service: WorkflowService::new(store),
            renderer: DetailRenderer::new()?,
        };
        Ok(Self {
            state: Arc::new(state),
        })
    }

    /// Register the detail views and every entity's admin routes.
    pub fn build_router(self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .route(
                "/product_workflow/{id}/",
                get(routes::product_workflow_detail_page),
            )
            .route(
                "/api/product_workflows/{id}/detail",
                get(routes::product_workflow_detail),
            )
            .route(
                "/api/products",
                get(admin::list_products).post(admin::create_product),
            )
            .route(
                "/api/products/{id}",
                get(admin::get_product)
                    .put(admin::update_product)
                    .delete(admin::delete_product),
            )
            .route(
                "/api/workflows",
                get(admin::list_workflows).post(admin::create_workflow),
            )
            .route(
                "/api/workflows/{id}",
                get(admin::get_workflow)
                    .put(admin::update_workflow)
                    .delete(admin::delete_workflow),
            )
            .route("/api/steps", get(admin::list_steps).post(admin::create_step))
            .route(
                "/api/steps/{id}",
                get(admin::get_step)
                    .put(admin::update_step)
                    .delete(admin::delete_step),
            )
            .route(
                "/api/transitions",
                get(admin::list_transitions).post(admin::create_transition),
            )
            .route(
                "/api/transitions/{id}",
                get(admin::get_transition)
                    .put(admin::update_transition)
                    .delete(admin::delete_transition),
            )
            .route(
                "/api/product_workflows",
                get(admin::list_product_workflows).post(admin::create_product_workflow),
            )
            .route(
                "/api/product_workflows/{id}",
                get(admin::get_product_workflow)
                    .put(admin::update_product_workflow)
                    .delete(admin::delete_product_workflow),
            )
            .route(
                "/api/product_workflows/{id}/current_step",
                axum::routing::put(admin::set_current_step),
            )
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(self.state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
