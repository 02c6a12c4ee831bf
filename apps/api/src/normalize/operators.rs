//! Applies update-operator payloads (`$set`, `$unset`, `$push`) to a stored
//! document. Keys without a `$` prefix are direct replacements, i.e. `$set`.

use bson::{Bson, Document};

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub document: Document,
    /// Every path the payload wrote to, as given by the client.
    pub touched: Vec<String>,
}

pub fn apply_update(mut doc: Document, update: Document) -> Result<AppliedUpdate, AppError> {
    let mut touched = Vec::new();

    for (key, value) in update {
        let Some(op) = key.strip_prefix('$') else {
            set_path(&mut doc, &key, value)?;
            touched.push(key);
            continue;
        };

        let Bson::Document(fields) = value else {
            return Err(AppError::BadRequest(format!(
                "operator '{key}' expects an object of paths"
            )));
        };
        for (path, value) in fields {
            match op {
                "set" => set_path(&mut doc, &path, value)?,
                "unset" => unset_path(&mut doc, &path)?,
                "push" => push_path(&mut doc, &path, value)?,
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "unsupported update operator '{key}'"
                    )))
                }
            }
            touched.push(path);
        }
    }

    Ok(AppliedUpdate {
        document: doc,
        touched,
    })
}

/// Top-level field names written by a payload, without applying it.
pub fn touched_roots(update: &Document) -> Vec<String> {
    let mut roots = Vec::new();
    for (key, value) in update {
        if key.starts_with('$') {
            if let Bson::Document(fields) = value {
                roots.extend(fields.keys().map(|p| root_of(p).to_string()));
            }
        } else {
            roots.push(root_of(key).to_string());
        }
    }
    roots.sort();
    roots.dedup();
    roots
}

fn root_of(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

fn split(path: &str) -> Result<Vec<&str>, AppError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(AppError::BadRequest(format!("invalid update path '{path}'")));
    }
    if segments.contains(&"$") {
        return Err(AppError::BadRequest(format!(
            "positional '$' needs a query filter; use an index or '$[]' in '{path}'"
        )));
    }
    Ok(segments)
}

fn path_error(path: &str, reason: &str) -> AppError {
    AppError::BadRequest(format!("cannot apply update at '{path}': {reason}"))
}

fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<(), AppError> {
    let segments = split(path)?;
    set_in_document(doc, &segments, value).map_err(|reason| path_error(path, reason))
}

fn set_in_document(
    doc: &mut Document,
    segments: &[&str],
    value: Bson,
) -> Result<(), &'static str> {
    let Some((head, rest)) = segments.split_first() else {
        return Err("empty path");
    };
    if rest.is_empty() {
        doc.insert(*head, value);
        return Ok(());
    }
    let child = doc
        .entry(head.to_string())
        .or_insert_with(|| Bson::Document(Document::new()));
    set_in_value(child, rest, value)
}

fn set_in_value(target: &mut Bson, segments: &[&str], value: Bson) -> Result<(), &'static str> {
    match target {
        Bson::Document(inner) => set_in_document(inner, segments, value),
        Bson::Array(items) => {
            let Some((head, rest)) = segments.split_first() else {
                return Err("empty path");
            };
            if *head == "$[]" {
                for item in items.iter_mut() {
                    if rest.is_empty() {
                        *item = value.clone();
                    } else {
                        set_in_value(item, rest, value.clone())?;
                    }
                }
                return Ok(());
            }
            let index = head
                .parse::<usize>()
                .map_err(|_| "array elements are addressed by index")?;
            while items.len() <= index {
                items.push(Bson::Null);
            }
            let slot = &mut items[index];
            if rest.is_empty() {
                *slot = value;
                return Ok(());
            }
            if matches!(slot, Bson::Null) {
                *slot = Bson::Document(Document::new());
            }
            set_in_value(slot, rest, value)
        }
        _ => Err("cannot create a field inside a non-object value"),
    }
}

fn unset_path(doc: &mut Document, path: &str) -> Result<(), AppError> {
    let segments = split(path)?;
    unset_in_document(doc, &segments);
    Ok(())
}

fn unset_in_document(doc: &mut Document, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        doc.remove(*head);
        return;
    }
    if let Some(child) = doc.get_mut(*head) {
        unset_in_value(child, rest);
    }
}

fn unset_in_value(target: &mut Bson, segments: &[&str]) {
    match target {
        Bson::Document(inner) => unset_in_document(inner, segments),
        Bson::Array(items) => {
            let Some((head, rest)) = segments.split_first() else {
                return;
            };
            if *head == "$[]" {
                for item in items.iter_mut() {
                    if rest.is_empty() {
                        *item = Bson::Null;
                    } else {
                        unset_in_value(item, rest);
                    }
                }
                return;
            }
            let Ok(index) = head.parse::<usize>() else {
                return;
            };
            let Some(item) = items.get_mut(index) else {
                return;
            };
            // Unsetting an array element keeps its slot, as MongoDB does.
            if rest.is_empty() {
                *item = Bson::Null;
            } else {
                unset_in_value(item, rest);
            }
        }
        _ => {}
    }
}

fn push_path(doc: &mut Document, path: &str, value: Bson) -> Result<(), AppError> {
    let segments = split(path)?;
    let items = match value {
        Bson::Document(mut modifiers) if modifiers.contains_key("$each") => {
            match modifiers.remove("$each") {
                Some(Bson::Array(items)) => items,
                _ => return Err(path_error(path, "'$each' must be an array")),
            }
        }
        single => vec![single],
    };
    push_in_document(doc, &segments, items).map_err(|reason| path_error(path, reason))
}

fn push_in_document(
    doc: &mut Document,
    segments: &[&str],
    items: Vec<Bson>,
) -> Result<(), &'static str> {
    let Some((head, rest)) = segments.split_first() else {
        return Err("empty path");
    };
    if rest.is_empty() {
        let target = doc
            .entry(head.to_string())
            .or_insert_with(|| Bson::Array(Vec::new()));
        return match target {
            Bson::Array(existing) => {
                existing.extend(items);
                Ok(())
            }
            _ => Err("'$push' target is not an array"),
        };
    }
    let child = doc
        .entry(head.to_string())
        .or_insert_with(|| Bson::Document(Document::new()));
    push_in_value(child, rest, items)
}

fn push_in_value(target: &mut Bson, segments: &[&str], items: Vec<Bson>) -> Result<(), &'static str> {
    match target {
        Bson::Document(inner) => push_in_document(inner, segments, items),
        Bson::Array(elements) => {
            let Some((head, rest)) = segments.split_first() else {
                return Err("empty path");
            };
            if *head == "$[]" {
                for element in elements.iter_mut() {
                    push_element(element, rest, items.clone())?;
                }
                return Ok(());
            }
            let index = head
                .parse::<usize>()
                .map_err(|_| "array elements are addressed by index")?;
            let element = elements
                .get_mut(index)
                .ok_or("array index out of range")?;
            push_element(element, rest, items)
        }
        _ => Err("cannot create a field inside a non-object value"),
    }
}

fn push_element(element: &mut Bson, rest: &[&str], items: Vec<Bson>) -> Result<(), &'static str> {
    if rest.is_empty() {
        return match element {
            Bson::Array(existing) => {
                existing.extend(items);
                Ok(())
            }
            _ => Err("'$push' target is not an array"),
        };
    }
    push_in_value(element, rest, items)
}
