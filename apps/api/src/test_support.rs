//! Router harness backed by the in-memory stores.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use bson::oid::ObjectId;
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::{USER_ID_HEADER, USER_ROLE_HEADER};
use crate::entities::store::MemoryDocumentStore;
use crate::resumes::store::MemoryResumeStore;
use crate::routes::build_router;
use crate::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_state(AppState {
            resumes: Arc::new(MemoryResumeStore::default()),
            documents: Arc::new(MemoryDocumentStore::default()),
        })
    }

    pub fn with_state(state: AppState) -> Self {
        TestApp {
            router: build_router(state.clone()),
            state,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        actor: Option<(ObjectId, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send_with(method, uri, actor, &[], body).await
    }

    pub async fn send_with(
        &self,
        method: Method,
        uri: &str,
        actor: Option<(ObjectId, &str)>,
        extra_headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = actor {
            builder = builder
                .header(USER_ID_HEADER, id.to_hex())
                .header(USER_ROLE_HEADER, role);
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

/// The hex id of a relaxed extended JSON `{"$oid": ..}` value.
pub fn oid(value: &Value) -> ObjectId {
    ObjectId::parse_str(value["$oid"].as_str().unwrap()).unwrap()
}
