use std::sync::Arc;

use crate::entities::store::DocumentStore;
use crate::resumes::store::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Versioned resume documents and their history.
    pub resumes: Arc<dyn ResumeStore>,
    /// Users, templates and the standalone resume sections.
    pub documents: Arc<dyn DocumentStore>,
}
