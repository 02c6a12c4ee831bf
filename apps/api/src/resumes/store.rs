use async_trait::async_trait;
use bson::oid::ObjectId;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::{document_from_storage, document_to_storage, stored_object_id};
use crate::models::resume::{ResumeRow, ResumeVersionRow};
use crate::resumes::versioning::{PreviousVersion, VersionedResume};

/// Persistence for versioned resumes.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn insert(&self, resume: &VersionedResume) -> Result<(), AppError>;

    async fn find(&self, id: ObjectId) -> Result<Option<VersionedResume>, AppError>;

    async fn list_by_owner(&self, owner: ObjectId) -> Result<Vec<VersionedResume>, AppError>;

    /// Persists a revision produced by [`VersionedResume::save`]: appends
    /// `snapshot` and writes the new body and version together.
    ///
    /// The write only succeeds while the stored version still equals
    /// `snapshot.version`. Otherwise another writer got there first and the
    /// call fails with [`AppError::Conflict`] without writing anything.
    async fn commit_revision(
        &self,
        resume: &VersionedResume,
        snapshot: &PreviousVersion,
    ) -> Result<(), AppError>;

    /// Deletes a resume together with its history.
    async fn delete(&self, id: ObjectId) -> Result<bool, AppError>;

    async fn delete_by_owner(&self, owner: ObjectId) -> Result<u64, AppError>;
}

pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn history_for(&self, ids: &[String]) -> Result<Vec<ResumeVersionRow>, AppError> {
        Ok(sqlx::query_as::<_, ResumeVersionRow>(
            "SELECT * FROM resume_versions WHERE resume_id = ANY($1) ORDER BY resume_id, version ASC",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn insert(&self, resume: &VersionedResume) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO resumes (id, user_id, version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(resume.id.to_hex())
        .bind(resume.owner.to_hex())
        .bind(resume.version)
        .bind(document_to_storage(&resume.body))
        .bind(resume.created_at)
        .bind(resume.updated_at)
        .execute(&self.pool)
        .await?;

        info!("Inserted resume {} version {} for user {}", resume.id, resume.version, resume.owner);
        Ok(())
    }

    async fn find(&self, id: ObjectId) -> Result<Option<VersionedResume>, AppError> {
        let row: Option<ResumeRow> = sqlx::query_as("SELECT * FROM resumes WHERE id = $1")
            .bind(id.to_hex())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let history = self.history_for(&[row.id.clone()]).await?;
        hydrate(row, history).map(Some)
    }

    async fn list_by_owner(&self, owner: ObjectId) -> Result<Vec<VersionedResume>, AppError> {
        let rows: Vec<ResumeRow> =
            sqlx::query_as("SELECT * FROM resumes WHERE user_id = $1 ORDER BY updated_at DESC")
                .bind(owner.to_hex())
                .fetch_all(&self.pool)
                .await?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut history = self.history_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let (own, rest): (Vec<_>, Vec<_>) =
                    history.drain(..).partition(|v| v.resume_id == row.id);
                history = rest;
                hydrate(row, own)
            })
            .collect()
    }

    async fn commit_revision(
        &self,
        resume: &VersionedResume,
        snapshot: &PreviousVersion,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-swap on the version column.
        let updated = sqlx::query(
            r#"
            UPDATE resumes
            SET version = $1, document = $2, updated_at = $3
            WHERE id = $4 AND version = $5
            "#,
        )
        .bind(resume.version)
        .bind(document_to_storage(&resume.body))
        .bind(resume.updated_at)
        .bind(resume.id.to_hex())
        .bind(snapshot.version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "resume {} is no longer at version {}",
                resume.id, snapshot.version
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO resume_versions (id, resume_id, version, snapshot, snapshot_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume.id.to_hex())
        .bind(snapshot.version)
        .bind(document_to_storage(&snapshot.snapshot))
        .bind(snapshot.snapshot_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Committed resume {} version {} (snapshot of v{})",
            resume.id, resume.version, snapshot.version
        );
        Ok(())
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM resumes WHERE id = $1")
            .bind(id.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_owner(&self, owner: ObjectId) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM resumes WHERE user_id = $1")
            .bind(owner.to_hex())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn hydrate(row: ResumeRow, history: Vec<ResumeVersionRow>) -> Result<VersionedResume, AppError> {
    let previous_versions = history
        .into_iter()
        .map(|v| {
            Ok(PreviousVersion {
                version: v.version,
                snapshot: document_from_storage(v.snapshot)?,
                snapshot_at: v.snapshot_at,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(VersionedResume {
        id: stored_object_id(&row.id)?,
        owner: stored_object_id(&row.user_id)?,
        version: row.version,
        body: document_from_storage(row.document)?,
        previous_versions,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
pub use memory::MemoryResumeStore;
