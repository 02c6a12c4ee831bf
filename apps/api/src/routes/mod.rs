pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::entities::handlers as entities;
use crate::resumes::handlers as resumes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resumes (versioned)
        .route(
            "/api/v1/resumes",
            post(resumes::handle_create).get(resumes::handle_list),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resumes::handle_get)
                .put(resumes::handle_replace)
                .patch(resumes::handle_update)
                .delete(resumes::handle_delete),
        )
        .route("/api/v1/resumes/:id/history", get(resumes::handle_history))
        .route(
            "/api/v1/resumes/:id/versions/:v",
            get(resumes::handle_get_version),
        )
        .route(
            "/api/v1/resumes/:id/restore/:v",
            post(resumes::handle_restore),
        )
        .route(
            "/api/v1/resumes/:id/approval",
            patch(resumes::handle_approval),
        )
        // Users, templates and standalone resume sections
        .route(
            "/api/v1/:kind",
            post(entities::handle_create).get(entities::handle_list),
        )
        .route(
            "/api/v1/:kind/:id",
            get(entities::handle_get)
                .patch(entities::handle_update)
                .delete(entities::handle_delete),
        )
        .with_state(state)
}
