use anyhow::anyhow;
use async_trait::async_trait;
use bson::{oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::models::document::{
    document_from_storage, document_to_json, document_to_storage, stored_object_id, DocumentRow,
};
use crate::models::entity::EntityKind;

/// A non-versioned document: a user, a template or a standalone resume section.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: ObjectId,
    pub kind: EntityKind,
    pub body: Document,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    pub fn new(kind: EntityKind, mut body: Document, now: DateTime<Utc>) -> Self {
        strip_store_fields(&mut body);
        StoredDocument {
            id: ObjectId::new(),
            kind,
            body,
            created_at: now,
            updated_at: now,
        }
    }

    /// The user this document belongs to. A user document belongs to itself.
    pub fn user(&self) -> Option<ObjectId> {
        match self.kind {
            EntityKind::User => Some(self.id),
            _ => self.body.get_object_id("user").ok(),
        }
    }

    pub fn resume(&self) -> Option<ObjectId> {
        self.body.get_object_id("resume").ok()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut doc = Document::new();
        doc.insert("_id", self.id);
        for (key, value) in &self.body {
            doc.insert(key.clone(), value.clone());
        }
        doc.insert("createdAt", bson::DateTime::from_chrono(self.created_at));
        doc.insert("updatedAt", bson::DateTime::from_chrono(self.updated_at));
        document_to_json(doc)
    }
}

pub fn strip_store_fields(body: &mut Document) {
    for field in ["_id", "id", "__v", "createdAt", "updatedAt"] {
        body.remove(field);
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, doc: &StoredDocument) -> Result<(), AppError>;

    async fn find(&self, kind: EntityKind, id: ObjectId) -> Result<Option<StoredDocument>, AppError>;

    /// All documents of `kind`, optionally restricted to one user's.
    async fn list(
        &self,
        kind: EntityKind,
        user: Option<ObjectId>,
    ) -> Result<Vec<StoredDocument>, AppError>;

    async fn replace(&self, doc: &StoredDocument) -> Result<(), AppError>;

    async fn delete(&self, kind: EntityKind, id: ObjectId) -> Result<bool, AppError>;

    /// Removes every resume section owned by `user`.
    async fn delete_by_user(&self, user: ObjectId) -> Result<u64, AppError>;

    /// Removes every resume section pointing at `resume`.
    async fn delete_by_resume(&self, resume: ObjectId) -> Result<u64, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredDocument>, AppError>;
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, doc: &StoredDocument) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, kind, user_id, resume_id, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(doc.id.to_hex())
        .bind(doc.kind.as_str())
        .bind(doc.user().map(|id| id.to_hex()))
        .bind(doc.resume().map(|id| id.to_hex()))
        .bind(document_to_storage(&doc.body))
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation_as_conflict)?;

        info!("Inserted {} {}", doc.kind.as_str(), doc.id);
        Ok(())
    }

    async fn find(&self, kind: EntityKind, id: ObjectId) -> Result<Option<StoredDocument>, AppError> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT * FROM documents WHERE kind = $1 AND id = $2")
                .bind(kind.as_str())
                .bind(id.to_hex())
                .fetch_optional(&self.pool)
                .await?;
        row.map(hydrate).transpose()
    }

    async fn list(
        &self,
        kind: EntityKind,
        user: Option<ObjectId>,
    ) -> Result<Vec<StoredDocument>, AppError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT * FROM documents
            WHERE kind = $1 AND ($2::TEXT IS NULL OR user_id = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(user.map(|id| id.to_hex()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(hydrate).collect()
    }

    async fn replace(&self, doc: &StoredDocument) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET user_id = $1, resume_id = $2, document = $3, updated_at = $4
            WHERE kind = $5 AND id = $6
            "#,
        )
        .bind(doc.user().map(|id| id.to_hex()))
        .bind(doc.resume().map(|id| id.to_hex()))
        .bind(document_to_storage(&doc.body))
        .bind(doc.updated_at)
        .bind(doc.kind.as_str())
        .bind(doc.id.to_hex())
        .execute(&self.pool)
        .await
        .map_err(unique_violation_as_conflict)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                doc.kind.as_str(),
                doc.id
            )));
        }
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: ObjectId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_user(&self, user: ObjectId) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE user_id = $1 AND kind <> 'user'")
            .bind(user.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_resume(&self, resume: ObjectId) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE resume_id = $1")
            .bind(resume.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredDocument>, AppError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT * FROM documents WHERE kind = 'user' AND lower(document ->> 'email') = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(hydrate).transpose()
    }
}

fn hydrate(row: DocumentRow) -> Result<StoredDocument, AppError> {
    let kind = EntityKind::from_stored(&row.kind)
        .ok_or_else(|| AppError::Internal(anyhow!("unknown stored kind '{}'", row.kind)))?;
    Ok(StoredDocument {
        id: stored_object_id(&row.id)?,
        kind,
        body: document_from_storage(row.document)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn unique_violation_as_conflict(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return AppError::Conflict("a document with this email already exists".to_string());
        }
    }
    AppError::Database(e)
}

#[cfg(test)]
pub use memory::MemoryDocumentStore;
