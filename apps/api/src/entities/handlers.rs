use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bson::{oid::ObjectId, Document};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::auth::Actor;
use crate::entities::store::StoredDocument;
use crate::errors::AppError;
use crate::models::document::{document_from_json, parse_object_id};
use crate::models::entity::EntityKind;
use crate::normalize::convert;
use crate::normalize::operators::{apply_update, touched_roots};
use crate::schema::{rules::schema_for, ValidationMode};
use crate::state::AppState;

const SERVER_FIELDS: &[&str] = &["_id", "id", "__v", "createdAt", "updatedAt"];

#[derive(Deserialize)]
pub struct ListQuery {
    pub user: Option<String>,
}

/// POST /api/v1/:kind
pub async fn handle_create(
    State(state): State<AppState>,
    actor: Actor,
    Path(segment): Path<String>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let kind = kind_from_segment(&segment)?;
    let mut body = convert(kind, document_from_json(payload)?);

    match kind {
        EntityKind::User => actor.require_admin("create users")?,
        EntityKind::Template => {
            actor.require_admin("create templates")?;
            if !body.contains_key("createdBy") {
                body.insert("createdBy", actor.user_id);
            }
        }
        _ => {
            if !body.contains_key("user") {
                body.insert("user", actor.user_id);
            }
        }
    }

    let schema = schema_for(kind);
    schema.sanitize(&mut body);
    schema.validate(&body, ValidationMode::Create)?;

    if kind.is_resume_section() {
        let owner = body.get_object_id("user").map_err(|_| {
            AppError::BadRequest("user must be a valid identifier".to_string())
        })?;
        actor.require_access(owner, &format!("this {}", kind.as_str()))?;
        check_references(&state, &body).await?;
    }
    if kind == EntityKind::User {
        ensure_email_available(&state, &body, None).await?;
    }

    let doc = StoredDocument::new(kind, body, Utc::now());
    state.documents.insert(&doc).await?;

    Ok((StatusCode::CREATED, Json(doc.to_json())))
}

/// GET /api/v1/:kind
///
/// Users see their own sections; administrators may list anyone's.
/// Templates are listed for everyone and ignore `?user=`.
pub async fn handle_list(
    State(state): State<AppState>,
    actor: Actor,
    Path(segment): Path<String>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let kind = kind_from_segment(&segment)?;
    let requested = params.user.as_deref().map(parse_object_id).transpose()?;

    let filter = match kind {
        // Templates are shared and carry no owner.
        EntityKind::Template => None,
        EntityKind::User => {
            actor.require_admin("list users")?;
            None
        }
        _ if actor.is_admin() => requested,
        _ => {
            let owner = requested.unwrap_or(actor.user_id);
            actor.require_access(owner, &format!("these {}", kind.segment()))?;
            Some(owner)
        }
    };

    let docs = state.documents.list(kind, filter).await?;
    Ok(Json(docs.iter().map(StoredDocument::to_json).collect()))
}

/// GET /api/v1/:kind/:id
pub async fn handle_get(
    State(state): State<AppState>,
    actor: Actor,
    Path((segment, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let kind = kind_from_segment(&segment)?;
    let doc = load(&state, kind, &id).await?;
    if kind != EntityKind::Template {
        require_owner(&actor, &doc)?;
    }
    Ok(Json(doc.to_json()))
}

/// PATCH /api/v1/:kind/:id
pub async fn handle_update(
    State(state): State<AppState>,
    actor: Actor,
    Path((segment, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let kind = kind_from_segment(&segment)?;
    let mut doc = load(&state, kind, &id).await?;
    match kind {
        EntityKind::Template => actor.require_admin("modify templates")?,
        _ => require_owner(&actor, &doc)?,
    }

    let update = document_from_json(payload)?;
    let roots = touched_roots(&update);
    for root in &roots {
        if SERVER_FIELDS.contains(&root.as_str()) {
            return Err(AppError::BadRequest(format!(
                "'{root}' is managed by the server"
            )));
        }
        match (kind, root.as_str()) {
            (EntityKind::User, "role") => actor.require_admin("change roles")?,
            (k, "user") if k.is_resume_section() => {
                actor.require_admin("move documents between users")?
            }
            _ => {}
        }
    }

    let applied = apply_update(doc.body.clone(), update)?;
    let mut body = convert(kind, applied.document);
    let schema = schema_for(kind);
    schema.sanitize(&mut body);
    schema.validate(
        &body,
        ValidationMode::Update {
            touched: &applied.touched,
        },
    )?;

    if kind.is_resume_section() && roots.iter().any(|r| r == "user" || r == "resume") {
        check_references(&state, &body).await?;
    }
    if kind == EntityKind::User && roots.iter().any(|r| r == "email") {
        ensure_email_available(&state, &body, Some(doc.id)).await?;
    }

    doc.body = body;
    doc.updated_at = Utc::now();
    state.documents.replace(&doc).await?;

    Ok(Json(doc.to_json()))
}

/// DELETE /api/v1/:kind/:id
///
/// Deleting a user also removes their resumes (with history) and sections.
pub async fn handle_delete(
    State(state): State<AppState>,
    actor: Actor,
    Path((segment, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let kind = kind_from_segment(&segment)?;
    let doc = load(&state, kind, &id).await?;
    match kind {
        EntityKind::Template => actor.require_admin("delete templates")?,
        _ => require_owner(&actor, &doc)?,
    }

    if kind == EntityKind::User {
        cascade_user_delete(&state, doc.id).await?;
    }
    state.documents.delete(kind, doc.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Removes everything a user owns. The user row itself is deleted by the
/// caller afterwards, so a failed cascade leaves the user in place and the
/// delete can be retried.
async fn cascade_user_delete(state: &AppState, user: ObjectId) -> Result<(), AppError> {
    let resumes = state.resumes.delete_by_owner(user).await.map_err(|e| {
        error!("Cascade for user {user} failed before removing resumes: {e}");
        e
    })?;
    let sections = state.documents.delete_by_user(user).await.map_err(|e| {
        error!("Cascade for user {user} failed after removing {resumes} resumes: {e}");
        e
    })?;
    info!("Cascaded delete of user {user}: {resumes} resumes, {sections} sections");
    Ok(())
}

fn kind_from_segment(segment: &str) -> Result<EntityKind, AppError> {
    EntityKind::from_segment(segment)
        .ok_or_else(|| AppError::NotFound(format!("Unknown collection '{segment}'")))
}

async fn load(state: &AppState, kind: EntityKind, raw_id: &str) -> Result<StoredDocument, AppError> {
    let id = parse_object_id(raw_id)?;
    state
        .documents
        .find(kind, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", kind.as_str())))
}

fn require_owner(actor: &Actor, doc: &StoredDocument) -> Result<(), AppError> {
    match doc.user() {
        Some(owner) => actor.require_access(owner, &format!("this {}", doc.kind.as_str())),
        None => actor.require_admin(&format!("access this {}", doc.kind.as_str())),
    }
}

/// `user` must name an existing user and `resume` an existing resume of that
/// user.
async fn check_references(state: &AppState, body: &Document) -> Result<(), AppError> {
    let user = referenced_id(body, "user")?;
    if state.documents.find(EntityKind::User, user).await?.is_none() {
        return Err(AppError::BadRequest(format!("user {user} does not exist")));
    }

    let resume_id = referenced_id(body, "resume")?;
    let resume = state
        .resumes
        .find(resume_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("resume {resume_id} does not exist")))?;
    if resume.owner != user {
        return Err(AppError::BadRequest(format!(
            "resume {resume_id} does not belong to user {user}"
        )));
    }
    Ok(())
}

fn referenced_id(body: &Document, field: &str) -> Result<ObjectId, AppError> {
    body.get_object_id(field)
        .map_err(|_| AppError::BadRequest(format!("{field} must be a valid identifier")))
}

async fn ensure_email_available(
    state: &AppState,
    body: &Document,
    this: Option<ObjectId>,
) -> Result<(), AppError> {
    let Ok(email) = body.get_str("email") else {
        return Ok(());
    };
    match state.documents.find_user_by_email(email).await? {
        Some(existing) if Some(existing.id) != this => Err(AppError::Conflict(format!(
            "a user with email {email} already exists"
        ))),
        _ => Ok(()),
    }
}
