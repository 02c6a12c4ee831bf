use axum::{
    extract::{Path, Query, State},
    http::{header::IF_MATCH, HeaderMap, StatusCode},
    Json,
};
use bson::{Bson, Document};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Actor;
use crate::errors::AppError;
use crate::models::document::{document_from_json, document_to_json, parse_object_id};
use crate::models::entity::EntityKind;
use crate::models::resume::ApprovalStatus;
use crate::normalize::operators::{apply_update, touched_roots};
use crate::normalize::{convert, screenshots};
use crate::resumes::versioning::{SaveOutcome, VersionedResume, RESERVED_FIELDS};
use crate::schema::{rules::RESUME, ValidationMode};
use crate::state::AppState;

const APPROVAL_FIELD: &str = "adminApproval";

#[derive(Deserialize)]
pub struct ListQuery {
    pub user: Option<String>,
}

#[derive(Deserialize)]
pub struct ApprovalRequest {
    pub status: ApprovalStatus,
    pub comments: Option<String>,
}

/// POST /api/v1/resumes
pub async fn handle_create(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut body = convert(EntityKind::Resume, document_from_json(payload)?);

    let owner = match body.get("user") {
        None | Some(Bson::Null) => actor.user_id,
        Some(Bson::ObjectId(id)) => *id,
        Some(_) => {
            return Err(AppError::BadRequest(
                "user must be a valid identifier".to_string(),
            ))
        }
    };
    if owner != actor.user_id {
        actor.require_admin("create resumes for another user")?;
        if state.documents.find(EntityKind::User, owner).await?.is_none() {
            return Err(AppError::BadRequest(format!("user {owner} does not exist")));
        }
    }
    if body.contains_key(APPROVAL_FIELD) {
        actor.require_admin("set adminApproval")?;
    }

    body.insert("user", owner);
    RESUME.sanitize(&mut body);
    RESUME.validate(&body, ValidationMode::Create)?;

    let resume = VersionedResume::create(owner, body, Utc::now());
    state.resumes.insert(&resume).await?;

    Ok((StatusCode::CREATED, Json(resume.to_json(false))))
}

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let owner = match params.user.as_deref() {
        Some(raw) => parse_object_id(raw)?,
        None => actor.user_id,
    };
    actor.require_access(owner, "these resumes")?;

    let resumes = state.resumes.list_by_owner(owner).await?;
    Ok(Json(resumes.iter().map(|r| r.to_json(false)).collect()))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let resume = load(&state, &actor, &id).await?;
    Ok(Json(resume.to_json(false)))
}

/// PUT /api/v1/resumes/:id
///
/// Full replacement. Validated with the same rules as creation.
pub async fn handle_replace(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let mut resume = load(&state, &actor, &id).await?;
    check_expected_version(&headers, &resume)?;

    let mut body = convert(EntityKind::Resume, document_from_json(payload)?);
    match body.get("user") {
        None | Some(Bson::Null) => {}
        Some(Bson::ObjectId(user)) if *user == resume.owner => {}
        Some(_) => {
            return Err(AppError::BadRequest(
                "the owner of a resume cannot be changed".to_string(),
            ))
        }
    }
    guard_approval(&actor, &resume.body, &mut body)?;

    body.insert("user", resume.owner);
    RESUME.sanitize(&mut body);
    RESUME.validate(&body, ValidationMode::Create)?;

    commit(&state, &mut resume, body).await?;
    Ok(Json(resume.to_json(false)))
}

/// PATCH /api/v1/resumes/:id
///
/// Accepts `$set`, `$unset` and `$push` payloads; bare keys are direct
/// replacements. Only the rules for touched paths are checked.
pub async fn handle_update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let mut resume = load(&state, &actor, &id).await?;
    check_expected_version(&headers, &resume)?;

    let mut update = document_from_json(payload)?;
    screenshots::normalize_update(&mut update, bson::DateTime::now());

    for root in touched_roots(&update) {
        if root == "user" {
            return Err(AppError::BadRequest(
                "the owner of a resume cannot be changed".to_string(),
            ));
        }
        if RESERVED_FIELDS.contains(&root.as_str()) {
            return Err(AppError::BadRequest(format!(
                "'{root}' is managed by the server"
            )));
        }
        if root == APPROVAL_FIELD {
            actor.require_admin("set adminApproval")?;
        }
    }

    let applied = apply_update(resume.body.clone(), update)?;
    let mut body = convert(EntityKind::Resume, applied.document);
    RESUME.sanitize(&mut body);
    RESUME.validate(
        &body,
        ValidationMode::Update {
            touched: &applied.touched,
        },
    )?;

    commit(&state, &mut resume, body).await?;
    Ok(Json(resume.to_json(false)))
}

/// DELETE /api/v1/resumes/:id
///
/// Removes the resume, its history, and the standalone sections pointing at it.
pub async fn handle_delete(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let resume = load(&state, &actor, &id).await?;

    state.resumes.delete(resume.id).await?;
    let sections = state.documents.delete_by_resume(resume.id).await?;
    info!(
        "Deleted resume {} at version {} ({} dependent sections)",
        resume.id, resume.version, sections
    );

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/resumes/:id/history
pub async fn handle_history(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let resume = load(&state, &actor, &id).await?;
    let history: Vec<Value> = resume
        .previous_versions
        .iter()
        .map(|p| document_to_json(p.to_document()))
        .collect();

    Ok(Json(json!({
        "resumeId": resume.id.to_hex(),
        "version": resume.version,
        "previousVersions": history,
    })))
}

/// GET /api/v1/resumes/:id/versions/:v
pub async fn handle_get_version(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, version)): Path<(String, i32)>,
) -> Result<Json<Value>, AppError> {
    let resume = load(&state, &actor, &id).await?;
    let body = resume.at_version(version).ok_or_else(|| {
        AppError::NotFound(format!("Resume {} has no version {version}", resume.id))
    })?;

    Ok(Json(json!({
        "resumeId": resume.id.to_hex(),
        "version": version,
        "current": version == resume.version,
        "document": document_to_json(body.clone()),
    })))
}

/// POST /api/v1/resumes/:id/restore/:v
///
/// Saves snapshot `v` as a new revision; history is never rewritten.
pub async fn handle_restore(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, version)): Path<(String, i32)>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let mut resume = load(&state, &actor, &id).await?;
    check_expected_version(&headers, &resume)?;

    let mut body = resume.at_version(version).cloned().ok_or_else(|| {
        AppError::NotFound(format!("Resume {} has no version {version}", resume.id))
    })?;
    if !actor.is_admin() {
        carry_approval(&resume.body, &mut body);
    }

    commit(&state, &mut resume, body).await?;
    info!("Restored resume {} to the content of version {version}", resume.id);
    Ok(Json(resume.to_json(false)))
}

/// PATCH /api/v1/resumes/:id/approval
pub async fn handle_approval(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ApprovalRequest>,
) -> Result<Json<Value>, AppError> {
    actor.require_admin("review resumes")?;
    let mut resume = load(&state, &actor, &id).await?;
    check_expected_version(&headers, &resume)?;

    let mut approval = Document::new();
    approval.insert("status", req.status.as_str());
    approval.insert("reviewedBy", actor.user_id);
    approval.insert("reviewedAt", bson::DateTime::now());
    if let Some(comments) = req.comments {
        approval.insert("comments", comments);
    }

    let mut body = resume.body.clone();
    body.insert(APPROVAL_FIELD, approval);
    body.insert("status", req.status.resume_status().as_str());
    RESUME.sanitize(&mut body);
    RESUME.validate(
        &body,
        ValidationMode::Update {
            touched: &[APPROVAL_FIELD.to_string(), "status".to_string()],
        },
    )?;

    commit(&state, &mut resume, body).await?;
    info!(
        "Resume {} marked {} by {}",
        resume.id,
        req.status.as_str(),
        actor.user_id
    );
    Ok(Json(resume.to_json(false)))
}

async fn load(state: &AppState, actor: &Actor, raw_id: &str) -> Result<VersionedResume, AppError> {
    let id = parse_object_id(raw_id)?;
    let resume = state
        .resumes
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    actor.require_access(resume.owner, "this resume")?;
    Ok(resume)
}

/// Runs the versioning save and persists the revision, if there is one.
async fn commit(
    state: &AppState,
    resume: &mut VersionedResume,
    body: Document,
) -> Result<(), AppError> {
    match resume.save(body, Utc::now()) {
        SaveOutcome::Unchanged => {
            info!("Resume {} unchanged at version {}", resume.id, resume.version);
            Ok(())
        }
        SaveOutcome::Revised(snapshot) => state.resumes.commit_revision(resume, &snapshot).await,
    }
}

/// Non-administrators cannot alter `adminApproval`; an omitted value keeps the
/// current review.
fn guard_approval(actor: &Actor, current: &Document, next: &mut Document) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }
    if let Some(requested) = next.get(APPROVAL_FIELD) {
        if current.get(APPROVAL_FIELD) != Some(requested) {
            actor.require_admin("set adminApproval")?;
        }
    }
    carry_approval(current, next);
    Ok(())
}

fn carry_approval(current: &Document, next: &mut Document) {
    match current.get(APPROVAL_FIELD) {
        Some(approval) => {
            next.insert(APPROVAL_FIELD, approval.clone());
        }
        None => {
            next.remove(APPROVAL_FIELD);
        }
    }
}

/// Reads the optional `If-Match` precondition. Accepts `3`, `"3"` and `W/"3"`.
fn expected_version(headers: &HeaderMap) -> Result<Option<i32>, AppError> {
    let Some(raw) = headers.get(IF_MATCH) else {
        return Ok(None);
    };
    let text = raw
        .to_str()
        .map_err(|_| AppError::BadRequest("If-Match is not valid text".to_string()))?;
    let trimmed = text.trim().trim_start_matches("W/").trim_matches('"');
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("If-Match '{text}' is not a version number")))
}

fn check_expected_version(headers: &HeaderMap, resume: &VersionedResume) -> Result<(), AppError> {
    match expected_version(headers)? {
        Some(expected) if expected != resume.version => Err(AppError::Conflict(format!(
            "resume {} is at version {}, not {expected}",
            resume.id, resume.version
        ))),
        _ => Ok(()),
    }
}
