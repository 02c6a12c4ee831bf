//! Declarative per-entity field constraints, checked at the persistence
//! boundary.
//!
//! Validation collects every failing field instead of stopping at the first.
//! Creates enforce every rule. Partial updates only check rules whose path
//! overlaps a path the update wrote, so `required` never forces a client to
//! resend fields it did not touch.

pub mod rules;

use std::fmt;

use bson::{Bson, Document};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("phone regex"));
static GITHUB_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?github\.com/[A-Za-z0-9_.-]+(/[A-Za-z0-9_.-]+)*/?$")
        .expect("github regex")
});
static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url regex")
});
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex")
});
static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("color regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// E.164-style international number.
    Phone,
    GithubUrl,
    Url,
    Email,
    HexColor,
}

impl Pattern {
    fn regex(self) -> &'static Regex {
        match self {
            Pattern::Phone => &PHONE,
            Pattern::GithubUrl => &GITHUB_URL,
            Pattern::Url => &URL,
            Pattern::Email => &EMAIL,
            Pattern::HexColor => &HEX_COLOR,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Pattern::Phone => "a valid international phone number",
            Pattern::GithubUrl => "a valid GitHub URL",
            Pattern::Url => "a valid URL",
            Pattern::Email => "a valid email address",
            Pattern::HexColor => "a hex color such as #1a2b3c",
        }
    }
}

/// Expected BSON type after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Number,
    Boolean,
    Date,
    Identifier,
    Array,
    Object,
}

impl Kind {
    fn matches(self, value: &Bson) -> bool {
        match self {
            Kind::String => matches!(value, Bson::String(_)),
            Kind::Number => match value {
                Bson::Int32(_) | Bson::Int64(_) => true,
                Bson::Double(n) => !n.is_nan(),
                _ => false,
            },
            Kind::Boolean => matches!(value, Bson::Boolean(_)),
            Kind::Date => matches!(value, Bson::DateTime(_)),
            Kind::Identifier => matches!(value, Bson::ObjectId(_)),
            Kind::Array => matches!(value, Bson::Array(_)),
            Kind::Object => matches!(value, Bson::Document(_)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Kind::String => "a string",
            Kind::Number => "a number",
            Kind::Boolean => "true or false",
            Kind::Date => "a valid date",
            Kind::Identifier => "a valid identifier",
            Kind::Array => "a list",
            Kind::Object => "an object",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Required,
    /// Whitespace is trimmed before validation.
    Trim,
    Type(Kind),
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Pattern(Pattern),
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub path: &'static str,
    pub rules: &'static [Rule],
}

#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    /// Paths holding lists of sub-documents. A missing list means "no
    /// elements", so element rules do not fire.
    pub collections: &'static [&'static str],
    pub fields: &'static [FieldSchema],
}

#[derive(Debug, Clone, Copy)]
pub enum ValidationMode<'a> {
    Create,
    Update { touched: &'a [String] },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    #[cfg(test)]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{}", error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl EntitySchema {
    /// Applies write-time transforms (trimming).
    pub fn sanitize(&self, doc: &mut Document) {
        for field in self.fields {
            if field.rules.contains(&Rule::Trim) {
                let segments: Vec<&str> = field.path.split('.').collect();
                trim_at(doc, &segments);
            }
        }
    }

    pub fn validate(&self, doc: &Document, mode: ValidationMode<'_>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for field in self.fields {
            if let ValidationMode::Update { touched } = mode {
                if !touched.iter().any(|t| paths_overlap(field.path, t)) {
                    continue;
                }
            }
            let mut resolved = Vec::new();
            let segments: Vec<&str> = field.path.split('.').collect();
            self.resolve(doc, &segments, "", &mut resolved);
            for (path, value) in resolved {
                check_field(&path, value, field.rules, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Expands `path` to concrete, index-qualified paths and their values.
    fn resolve<'a>(
        &self,
        doc: &'a Document,
        segments: &[&str],
        prefix: &str,
        out: &mut Vec<(String, Option<&'a Bson>)>,
    ) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        let path = join(prefix, head);
        let value = doc.get(*head);
        if rest.is_empty() {
            out.push((path, value));
            return;
        }
        match value {
            Some(Bson::Document(inner)) => self.resolve(inner, rest, &path, out),
            Some(Bson::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if let Bson::Document(inner) = item {
                        self.resolve(inner, rest, &format!("{path}.{i}"), out);
                    }
                }
            }
            _ if self.is_collection(&path) => {}
            _ => out.push((join(&path, &rest.join(".")), None)),
        }
    }

    fn is_collection(&self, concrete: &str) -> bool {
        let generic = strip_indices(concrete);
        self.collections.contains(&generic.as_str())
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// `projects.0.screenshots.$[]` → `projects.screenshots`
/// Trims the strings at `segments`, entering every object element of a list
/// the same way validation resolves collection paths.
fn trim_at(doc: &mut Document, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = doc.get_mut(*head) else {
        return;
    };
    match value {
        Bson::String(s) if rest.is_empty() => {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
        Bson::Document(inner) => trim_at(inner, rest),
        Bson::Array(items) => {
            for item in items.iter_mut() {
                if let Bson::Document(inner) = item {
                    trim_at(inner, rest);
                }
            }
        }
        _ => {}
    }
}

fn strip_indices(path: &str) -> String {
    path.split('.')
        .filter(|s| s.parse::<usize>().is_err() && *s != "$[]" && *s != "$")
        .collect::<Vec<_>>()
        .join(".")
}

/// True when one path is a segment-wise prefix of the other, ignoring array
/// positions.
fn paths_overlap(rule_path: &str, touched: &str) -> bool {
    let touched = strip_indices(touched);
    let a: Vec<&str> = rule_path.split('.').collect();
    let b: Vec<&str> = touched.split('.').collect();
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

fn is_blank(value: Option<&Bson>) -> bool {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => true,
        Some(Bson::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn check_field(path: &str, value: Option<&Bson>, rules: &[Rule], errors: &mut ValidationErrors) {
    if is_blank(value) {
        if rules.contains(&Rule::Required) {
            errors.push(path, format!("{path} is required"));
        }
        return;
    }
    let Some(value) = value else {
        return;
    };

    for rule in rules {
        let failure = match *rule {
            Rule::Required | Rule::Trim => None,
            Rule::Type(kind) => (!kind.matches(value)).then(|| format!("{path} must be {}", kind.describe())),
            Rule::MinLength(min) => match value {
                Bson::String(s) if s.chars().count() < min => {
                    Some(format!("{path} must be at least {min} characters"))
                }
                _ => None,
            },
            Rule::MaxLength(max) => match value {
                Bson::String(s) if s.chars().count() > max => {
                    Some(format!("{path} must be at most {max} characters"))
                }
                _ => None,
            },
            Rule::Min(min) => as_number(value)
                .filter(|n| *n < min)
                .map(|_| format!("{path} must be at least {min}")),
            Rule::Max(max) => as_number(value)
                .filter(|n| *n > max)
                .map(|_| format!("{path} must be at most {max}")),
            Rule::Pattern(pattern) => match value {
                Bson::String(s) if !pattern.regex().is_match(s) => {
                    Some(format!("{path} must be {}", pattern.describe()))
                }
                _ => None,
            },
            Rule::OneOf(allowed) => match value {
                Bson::String(s) if !allowed.contains(&s.as_str()) => Some(format!(
                    "{path} must be one of: {}",
                    allowed.join(", ")
                )),
                Bson::String(_) => None,
                _ => Some(format!("{path} must be one of: {}", allowed.join(", "))),
            },
        };
        if let Some(message) = failure {
            errors.push(path, message);
            // One message per field keeps the list readable.
            break;
        }
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    const SAMPLE: EntitySchema = EntitySchema {
        collections: &["items"],
        fields: &[
            FieldSchema {
                path: "title",
                rules: &[Rule::Required, Rule::Trim, Rule::Type(Kind::String), Rule::MaxLength(5)],
            },
            FieldSchema {
                path: "contact.phone",
                rules: &[Rule::Trim, Rule::Pattern(Pattern::Phone)],
            },
            FieldSchema {
                path: "contact.name",
                rules: &[Rule::Required],
            },
            FieldSchema {
                path: "items.name",
                rules: &[Rule::Required, Rule::MinLength(2)],
            },
            FieldSchema {
                path: "items.score",
                rules: &[Rule::Type(Kind::Number), Rule::Min(0.0), Rule::Max(10.0)],
            },
            FieldSchema {
                path: "status",
                rules: &[Rule::OneOf(&["draft", "done"])],
            },
        ],
    };

    #[test]
    fn test_valid_document_passes() {
        let doc = doc! {
            "title": "CV",
            "contact": { "name": "Ada", "phone": "+4915112345678" },
            "items": [ { "name": "ok", "score": 7 } ],
            "status": "draft",
        };
        assert!(SAMPLE.validate(&doc, ValidationMode::Create).is_ok());
    }

    #[test]
    fn test_all_failures_are_collected() {
        let doc = doc! {
            "title": "far too long",
            "contact": { "phone": "call me" },
            "items": [ { "name": "x", "score": 11 }, { "score": "high" } ],
            "status": "lost",
        };
        let errors = SAMPLE.validate(&doc, ValidationMode::Create).unwrap_err();
        for field in [
            "title",
            "contact.phone",
            "contact.name",
            "items.0.name",
            "items.0.score",
            "items.1.name",
            "items.1.score",
            "status",
        ] {
            assert!(errors.has_field(field), "missing error for {field}: {errors}");
        }
        assert_eq!(errors.errors.len(), 8);
    }

    #[test]
    fn test_missing_parent_reports_required_leaf() {
        let doc = doc! { "title": "CV" };
        let errors = SAMPLE.validate(&doc, ValidationMode::Create).unwrap_err();
        assert_eq!(
            errors.errors,
            vec![FieldError {
                field: "contact.name".to_string(),
                message: "contact.name is required".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let doc = doc! { "title": "", "contact": { "name": "Ada" } };
        let errors = SAMPLE.validate(&doc, ValidationMode::Create).unwrap_err();
        assert!(errors.has_field("title"));
    }

    #[test]
    fn test_update_skips_untouched_required_fields() {
        let doc = doc! { "contact": { "phone": "+4915112345678" } };
        let touched = vec!["contact.phone".to_string()];
        assert!(SAMPLE
            .validate(&doc, ValidationMode::Update { touched: &touched })
            .is_ok());
        assert!(SAMPLE.validate(&doc, ValidationMode::Create).is_err());
    }

    #[test]
    fn test_update_still_checks_touched_fields() {
        let doc = doc! { "title": "CV", "items": [ { "name": "ok" }, { "name": "" } ] };
        let touched = vec!["items.1".to_string()];
        let errors = SAMPLE
            .validate(&doc, ValidationMode::Update { touched: &touched })
            .unwrap_err();
        assert!(errors.has_field("items.1.name"));
        assert!(!errors.has_field("contact.name"));
    }

    #[test]
    fn test_unsetting_required_field_fails_update() {
        let doc = doc! { "contact": { "name": "Ada" } };
        let touched = vec!["title".to_string()];
        let errors = SAMPLE
            .validate(&doc, ValidationMode::Update { touched: &touched })
            .unwrap_err();
        assert!(errors.has_field("title"));
    }

    #[test]
    fn test_sanitize_trims_strings() {
        let mut doc = doc! { "title": "  CV  ", "contact": { "phone": " +4915112345678 " } };
        SAMPLE.sanitize(&mut doc);
        assert_eq!(doc.get_str("title"), Ok("CV"));
        assert_eq!(
            doc.get_document("contact").unwrap().get_str("phone"),
            Ok("+4915112345678")
        );
    }

    #[test]
    fn test_sanitize_trims_every_list_element() {
        const LIST: EntitySchema = EntitySchema {
            collections: &["items"],
            fields: &[FieldSchema {
                path: "items.name",
                rules: &[Rule::Trim],
            }],
        };
        let mut doc = doc! { "items": [ { "name": " a " }, "skip", { "name": "b  " } ] };
        LIST.sanitize(&mut doc);
        assert_eq!(doc, doc! { "items": [ { "name": "a" }, "skip", { "name": "b" } ] });
    }

    #[test]
    fn test_paths_overlap() {
        assert!(paths_overlap("projects.name", "projects"));
        assert!(paths_overlap("projects.name", "projects.0.name"));
        assert!(paths_overlap("personalInfo", "personalInfo.phone"));
        assert!(!paths_overlap("personalInfo.email", "personalInfo.phone"));
        assert!(!paths_overlap("title", "template"));
    }

    #[test]
    fn test_display_lists_every_message() {
        let mut errors = ValidationErrors::default();
        errors.push("a", "a is required");
        errors.push("b", "b must be a number");
        assert_eq!(
            errors.to_string(),
            "Validation failed: a is required; b must be a number"
        );
    }

    #[test]
    fn test_patterns() {
        assert!(Pattern::Phone.regex().is_match("+442071234567"));
        assert!(!Pattern::Phone.regex().is_match("020 7123 4567"));
        assert!(Pattern::GithubUrl.regex().is_match("https://github.com/rust-lang/rust"));
        assert!(!Pattern::GithubUrl.regex().is_match("https://gitlab.com/x"));
        assert!(Pattern::Url.regex().is_match("http://x/y.png"));
        assert!(!Pattern::Url.regex().is_match("ftp://x"));
        assert!(Pattern::Email.regex().is_match("ada@example.com"));
        assert!(!Pattern::Email.regex().is_match("ada@"));
    }
}
