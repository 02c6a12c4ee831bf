//! Resume revision history.
//!
//! A resume is created at version 1 with no history. Every save that changes
//! the document first appends a snapshot of the current state, tagged with the
//! current version, then bumps the version and applies the new values. A save
//! that changes nothing is a no-op. History is append-only and never pruned.
//!
//! Invariant: `version == previous_versions.len() + 1`.

use bson::{oid::ObjectId, Bson, Document};
use chrono::{DateTime, Utc};

use crate::models::document::document_to_json;
use crate::normalize::screenshots;

/// Fields owned by the store rather than the client. They are never part of
/// the document body and never snapshotted.
pub const RESERVED_FIELDS: &[&str] = &[
    "_id",
    "id",
    "__v",
    "version",
    "previousVersions",
    "createdAt",
    "updatedAt",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PreviousVersion {
    pub version: i32,
    pub snapshot: Document,
    pub snapshot_at: DateTime<Utc>,
}

impl PreviousVersion {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("version", self.version);
        doc.insert("snapshot", self.snapshot.clone());
        doc.insert("snapshotAt", bson::DateTime::from_chrono(self.snapshot_at));
        doc
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Nothing changed; no snapshot, no version bump.
    Unchanged,
    /// The pre-save state was snapshotted and the version advanced.
    Revised(PreviousVersion),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionedResume {
    pub id: ObjectId,
    pub owner: ObjectId,
    pub version: i32,
    pub body: Document,
    pub previous_versions: Vec<PreviousVersion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VersionedResume {
    /// A new, unsaved resume at version 1.
    pub fn create(owner: ObjectId, body: Document, now: DateTime<Utc>) -> Self {
        let body = pre_save(body, owner, now);
        VersionedResume {
            id: ObjectId::new(),
            owner,
            version: 1,
            body,
            previous_versions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the body with `next`, snapshotting the current state first if
    /// anything changed.
    pub fn save(&mut self, next: Document, now: DateTime<Utc>) -> SaveOutcome {
        let next = pre_save(next, self.owner, now);
        if next == self.body {
            return SaveOutcome::Unchanged;
        }

        let snapshot = PreviousVersion {
            version: self.version,
            snapshot: self.body.clone(),
            snapshot_at: now,
        };
        self.previous_versions.push(snapshot.clone());
        self.version += 1;
        self.body = next;
        self.updated_at = now;
        SaveOutcome::Revised(snapshot)
    }

    /// The body as it was at `version`, or the live body for the current one.
    pub fn at_version(&self, version: i32) -> Option<&Document> {
        if version == self.version {
            return Some(&self.body);
        }
        self.previous_versions
            .iter()
            .find(|p| p.version == version)
            .map(|p| &p.snapshot)
    }

    pub fn to_document(&self, with_history: bool) -> Document {
        let mut doc = Document::new();
        doc.insert("_id", self.id);
        for (key, value) in &self.body {
            doc.insert(key.clone(), value.clone());
        }
        doc.insert("version", self.version);
        if with_history {
            let history: Vec<Bson> = self
                .previous_versions
                .iter()
                .map(|p| Bson::Document(p.to_document()))
                .collect();
            doc.insert("previousVersions", history);
        }
        doc.insert("createdAt", bson::DateTime::from_chrono(self.created_at));
        doc.insert("updatedAt", bson::DateTime::from_chrono(self.updated_at));
        doc
    }

    pub fn to_json(&self, with_history: bool) -> serde_json::Value {
        document_to_json(self.to_document(with_history))
    }
}

/// Pre-save hook: drops store-owned fields, pins ownership, and normalizes
/// screenshots for writes that bypassed the converter.
fn pre_save(mut body: Document, owner: ObjectId, now: DateTime<Utc>) -> Document {
    for field in RESERVED_FIELDS {
        body.remove(*field);
    }
    body.insert("user", owner);
    screenshots::normalize_resume(&mut body, bson::DateTime::from_chrono(now));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn new_resume(title: &str) -> VersionedResume {
        VersionedResume::create(ObjectId::new(), doc! { "title": title }, t0())
    }

    fn assert_invariant(resume: &VersionedResume) {
        assert_eq!(resume.version as usize, resume.previous_versions.len() + 1);
        for (i, p) in resume.previous_versions.iter().enumerate() {
            assert_eq!(p.version as usize, i + 1);
        }
    }

    #[test]
    fn test_create_starts_at_version_one() {
        let resume = new_resume("A");
        assert_eq!(resume.version, 1);
        assert!(resume.previous_versions.is_empty());
        assert_eq!(resume.body.get_object_id("user"), Ok(resume.owner));
        assert_invariant(&resume);
    }

    #[test]
    fn test_updates_append_ordered_snapshots() {
        let mut resume = new_resume("A");

        let outcome = resume.save(doc! { "title": "B" }, t0() + Duration::minutes(1));
        assert!(matches!(outcome, SaveOutcome::Revised(ref p) if p.version == 1));
        assert_eq!(resume.version, 2);
        assert_eq!(resume.previous_versions.len(), 1);
        assert_eq!(resume.previous_versions[0].snapshot.get_str("title"), Ok("A"));

        resume.save(doc! { "title": "C" }, t0() + Duration::minutes(2));
        assert_eq!(resume.version, 3);
        let versions: Vec<i32> = resume.previous_versions.iter().map(|p| p.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(resume.previous_versions[1].snapshot.get_str("title"), Ok("B"));
        assert_eq!(resume.body.get_str("title"), Ok("C"));
        assert_invariant(&resume);
    }

    #[test]
    fn test_unchanged_save_is_noop() {
        let mut resume = new_resume("A");
        let before = resume.clone();
        let outcome = resume.save(doc! { "title": "A" }, t0() + Duration::hours(1));
        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert_eq!(resume, before);
    }

    #[test]
    fn test_key_order_does_not_count_as_change() {
        let owner = ObjectId::new();
        let mut resume =
            VersionedResume::create(owner, doc! { "title": "A", "template": "modern" }, t0());
        let outcome = resume.save(doc! { "template": "modern", "title": "A" }, t0());
        assert_eq!(outcome, SaveOutcome::Unchanged);
    }

    #[test]
    fn test_reserved_fields_are_ignored() {
        let mut resume = new_resume("A");
        let outcome = resume.save(
            doc! { "title": "A", "version": 99, "_id": ObjectId::new(), "updatedAt": "now" },
            t0(),
        );
        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert_eq!(resume.version, 1);
    }

    #[test]
    fn test_snapshot_excludes_store_fields() {
        let mut resume = new_resume("A");
        resume.save(doc! { "title": "B" }, t0());
        let snapshot = &resume.previous_versions[0].snapshot;
        for field in RESERVED_FIELDS {
            assert!(!snapshot.contains_key(*field), "{field} leaked into snapshot");
        }
    }

    #[test]
    fn test_ownership_cannot_change_through_save() {
        let mut resume = new_resume("A");
        let owner = resume.owner;
        resume.save(doc! { "title": "B", "user": ObjectId::new() }, t0());
        assert_eq!(resume.body.get_object_id("user"), Ok(owner));
    }

    #[test]
    fn test_pre_save_normalizes_screenshots() {
        let mut resume = new_resume("A");
        let now = t0() + Duration::days(1);
        resume.save(
            doc! { "title": "A", "projects": [{ "name": "p", "screenshots": ["http://x/y.png"] }] },
            now,
        );
        let project = resume.body.get_array("projects").unwrap()[0]
            .as_document()
            .unwrap();
        let shot = project.get_array("screenshots").unwrap()[0]
            .as_document()
            .unwrap();
        assert_eq!(
            shot.get_datetime("uploadedAt"),
            Ok(&bson::DateTime::from_chrono(now))
        );
    }

    #[test]
    fn test_at_version() {
        let mut resume = new_resume("A");
        resume.save(doc! { "title": "B" }, t0());
        assert_eq!(resume.at_version(1).unwrap().get_str("title"), Ok("A"));
        assert_eq!(resume.at_version(2).unwrap().get_str("title"), Ok("B"));
        assert!(resume.at_version(3).is_none());
    }

    #[test]
    fn test_to_document_shape() {
        let mut resume = new_resume("A");
        resume.save(doc! { "title": "B" }, t0());
        let doc = resume.to_document(true);
        assert_eq!(doc.get_object_id("_id"), Ok(resume.id));
        assert_eq!(doc.get_i32("version"), Ok(2));
        let history = doc.get_array("previousVersions").unwrap();
        assert_eq!(history[0].as_document().unwrap().get_i32("version"), Ok(1));
        assert!(!resume.to_document(false).contains_key("previousVersions"));
    }
}
