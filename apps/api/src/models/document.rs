//! Conversions between request/storage JSON and BSON documents.
//!
//! Inbound bodies and stored rows are parsed as extended JSON, so `{"$oid": ..}`
//! and `{"$date": ..}` markers come back as typed values. Storage uses the
//! canonical form (lossless), responses use the relaxed form.

use anyhow::anyhow;
use bson::{oid::ObjectId, Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub kind: String,
    pub user_id: Option<String>,
    pub resume_id: Option<String>,
    pub document: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parses a client-supplied JSON body. Anything but an object is rejected.
pub fn document_from_json(value: Value) -> Result<Document, AppError> {
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(_) => Err(AppError::BadRequest(
            "request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(AppError::BadRequest(format!("malformed document: {e}"))),
    }
}

/// Parses a stored JSONB column back into a document.
pub fn document_from_storage(value: Value) -> Result<Document, AppError> {
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(AppError::Internal(anyhow!(
            "stored document is not an object: {other}"
        ))),
        Err(e) => Err(AppError::Internal(anyhow!("corrupt stored document: {e}"))),
    }
}

pub fn document_to_storage(doc: &Document) -> Value {
    Bson::Document(doc.clone()).into_canonical_extjson()
}

pub fn document_to_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

pub fn parse_object_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::BadRequest(format!("'{raw}' is not a valid id")))
}

pub fn stored_object_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|e| AppError::Internal(anyhow!("corrupt stored id '{raw}': {e}")))
}
