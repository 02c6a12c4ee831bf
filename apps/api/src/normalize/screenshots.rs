//! Project screenshots arrive either as bare URL strings (legacy clients) or as
//! `{url, caption, uploadedAt, publicId?}` objects. Only the object form is
//! stored.
//!
//! The normalizer runs at three independent points: the resume converter, the
//! pre-save hook of the versioning save path, and the pre-update hook over
//! update-operator payloads. Operator payloads never pass through the
//! converter, so none of the three can be dropped.

use bson::{doc, Bson, Document};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum Screenshot {
    /// A bare URL string.
    RawUrl(String),
    /// An object with a non-empty `url`.
    Canonical(Document),
    /// Anything else. Kept as-is so no data is lost.
    Malformed(Bson),
}

impl Screenshot {
    pub fn classify(value: Bson) -> Self {
        match value {
            Bson::String(url) => Screenshot::RawUrl(url),
            Bson::Document(entry) if has_url(&entry) => Screenshot::Canonical(entry),
            other => Screenshot::Malformed(other),
        }
    }

    pub fn into_canonical(self, uploaded_at: bson::DateTime) -> Bson {
        match self {
            Screenshot::RawUrl(url) => Bson::Document(doc! {
                "url": url,
                "caption": "",
                "uploadedAt": uploaded_at,
            }),
            Screenshot::Canonical(entry) => Bson::Document(entry),
            Screenshot::Malformed(value) => {
                // Kept as sent; no caption or uploadedAt is added.
                warn!(entry = %value, "Screenshot entry has no url; stored unnormalized");
                value
            }
        }
    }
}

fn has_url(entry: &Document) -> bool {
    matches!(entry.get("url"), Some(Bson::String(url)) if !url.is_empty())
}

/// Normalizes each element of a screenshots list.
pub fn normalize_list(items: Vec<Bson>, uploaded_at: bson::DateTime) -> Vec<Bson> {
    items
        .into_iter()
        .map(|item| Screenshot::classify(item).into_canonical(uploaded_at))
        .collect()
}

fn normalize_value(value: &mut Bson, uploaded_at: bson::DateTime) {
    let taken = std::mem::replace(value, Bson::Null);
    *value = Screenshot::classify(taken).into_canonical(uploaded_at);
}

fn normalize_list_in_place(value: &mut Bson, uploaded_at: bson::DateTime) {
    if let Bson::Array(items) = value {
        *items = normalize_list(std::mem::take(items), uploaded_at);
    }
}

/// Normalizes `screenshots` on a single project object.
pub fn normalize_project(project: &mut Document, uploaded_at: bson::DateTime) {
    if let Some(screenshots) = project.get_mut("screenshots") {
        normalize_list_in_place(screenshots, uploaded_at);
    }
}

fn normalize_project_value(value: &mut Bson, uploaded_at: bson::DateTime) {
    if let Bson::Document(project) = value {
        normalize_project(project, uploaded_at);
    }
}

fn normalize_projects_value(value: &mut Bson, uploaded_at: bson::DateTime) {
    if let Bson::Array(projects) = value {
        for project in projects.iter_mut() {
            normalize_project_value(project, uploaded_at);
        }
    }
}

/// Normalizes every project of a full resume document.
pub fn normalize_resume(resume: &mut Document, uploaded_at: bson::DateTime) {
    if let Some(projects) = resume.get_mut("projects") {
        normalize_projects_value(projects, uploaded_at);
    }
}

/// Normalizes screenshots inside an update-operator payload. Bare top-level
/// keys are direct replacements; `$set` and `$push` are inspected by path.
pub fn normalize_update(update: &mut Document, uploaded_at: bson::DateTime) {
    let keys: Vec<String> = update.keys().cloned().collect();
    for key in keys {
        let Some(value) = update.get_mut(&key) else {
            continue;
        };
        match key.as_str() {
            "$set" | "$setOnInsert" => {
                if let Bson::Document(fields) = value {
                    normalize_assignments(fields, uploaded_at);
                }
            }
            "$push" | "$addToSet" => {
                if let Bson::Document(fields) = value {
                    normalize_pushes(fields, uploaded_at);
                }
            }
            k if k.starts_with('$') => {}
            k => normalize_assignment(k, value, uploaded_at),
        }
    }
}

fn normalize_assignments(fields: &mut Document, uploaded_at: bson::DateTime) {
    let keys: Vec<String> = fields.keys().cloned().collect();
    for key in keys {
        if let Some(value) = fields.get_mut(&key) {
            normalize_assignment(&key, value, uploaded_at);
        }
    }
}

fn normalize_pushes(fields: &mut Document, uploaded_at: bson::DateTime) {
    let keys: Vec<String> = fields.keys().cloned().collect();
    for key in keys {
        let Some(value) = fields.get_mut(&key) else {
            continue;
        };
        let target = classify_path(&key);
        let per_item: fn(&mut Bson, bson::DateTime) = match target {
            // Pushing onto `projects` appends whole projects.
            PathTarget::Projects => normalize_project_value,
            // Pushing onto a screenshots list appends single entries.
            PathTarget::Screenshots => normalize_value,
            _ => continue,
        };
        match value {
            Bson::Document(modifiers) if modifiers.contains_key("$each") => {
                if let Some(Bson::Array(items)) = modifiers.get_mut("$each") {
                    for item in items.iter_mut() {
                        per_item(item, uploaded_at);
                    }
                }
            }
            other => per_item(other, uploaded_at),
        }
    }
}

fn normalize_assignment(path: &str, value: &mut Bson, uploaded_at: bson::DateTime) {
    match classify_path(path) {
        PathTarget::Projects => normalize_projects_value(value, uploaded_at),
        PathTarget::Project => normalize_project_value(value, uploaded_at),
        PathTarget::Screenshots => normalize_list_in_place(value, uploaded_at),
        PathTarget::Screenshot => normalize_value(value, uploaded_at),
        PathTarget::Other => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathTarget {
    Projects,
    Project,
    Screenshots,
    Screenshot,
    Other,
}

/// What a dotted update path points at, relative to the screenshots shape.
fn classify_path(path: &str) -> PathTarget {
    let segments: Vec<&str> = path.split('.').collect();
    let is_position = |s: &str| s == "$" || s == "$[]" || s.parse::<usize>().is_ok();
    match segments.as_slice() {
        ["projects"] => PathTarget::Projects,
        ["projects", p] if is_position(p) => PathTarget::Project,
        ["projects", p, "screenshots"] if is_position(p) => PathTarget::Screenshots,
        ["projects", p, "screenshots", s] if is_position(p) && is_position(s) => {
            PathTarget::Screenshot
        }
        _ => PathTarget::Other,
    }
}
