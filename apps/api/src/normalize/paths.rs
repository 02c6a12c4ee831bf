//! Dotted-path coercion over BSON documents.
//!
//! A path such as `personalInfo.address.coordinates.lat` is walked segment by
//! segment. A missing segment, or one that holds a scalar, ends the walk for
//! that path only. An array is only entered through a numeric segment; any
//! other segment ends the walk there too. Per-element coercion of a list is
//! declared with [`ElementPaths`] instead.
//!
//! Coercion is best-effort. A value that cannot be converted is left exactly
//! as it was.

use bson::{oid::ObjectId, Bson, Document};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// String → BSON date when it parses.
    Date,
    /// String → double when it has a numeric prefix.
    Number,
    /// 24-char hex string → ObjectId.
    Identifier,
    /// Truthy non-array → empty array.
    ArrayPresence,
}

impl Coercion {
    pub fn apply(self, value: &mut Bson) {
        match self {
            Coercion::Date => {
                if let Bson::String(raw) = value {
                    if let Some(date) = parse_date(raw) {
                        *value = Bson::DateTime(date);
                    }
                }
            }
            Coercion::Number => {
                if let Bson::String(raw) = value {
                    if let Some(number) = parse_float(raw) {
                        *value = Bson::Double(number);
                    }
                }
            }
            Coercion::Identifier => {
                if let Bson::String(raw) = value {
                    if let Ok(id) = ObjectId::parse_str(raw.as_str()) {
                        *value = Bson::ObjectId(id);
                    }
                }
            }
            Coercion::ArrayPresence => {
                if is_truthy(value) && !matches!(value, Bson::Array(_)) {
                    *value = Bson::Array(Vec::new());
                }
            }
        }
    }
}

/// Per-entity lists of paths for each coercion kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldPaths {
    pub dates: &'static [&'static str],
    pub numbers: &'static [&'static str],
    pub identifiers: &'static [&'static str],
    pub arrays: &'static [&'static str],
    /// Lists whose object elements get their own path set, applied after the
    /// four coercions above.
    pub elements: &'static [ElementPaths],
}

impl FieldPaths {
    pub const EMPTY: FieldPaths = FieldPaths {
        dates: &[],
        numbers: &[],
        identifiers: &[],
        arrays: &[],
        elements: &[],
    };

    pub fn apply(&self, doc: Document) -> Document {
        let doc = coerce_paths(doc, self.dates, Coercion::Date);
        let doc = coerce_paths(doc, self.numbers, Coercion::Number);
        let doc = coerce_paths(doc, self.identifiers, Coercion::Identifier);
        let mut doc = coerce_paths(doc, self.arrays, Coercion::ArrayPresence);
        for list in self.elements {
            list.apply(&mut doc);
        }
        doc
    }
}

/// Paths relative to each element of the list at `list`.
#[derive(Debug, Clone, Copy)]
pub struct ElementPaths {
    pub list: &'static str,
    pub paths: FieldPaths,
}

impl ElementPaths {
    fn apply(&self, doc: &mut Document) {
        visit_path(doc, self.list, &mut |value| {
            if let Bson::Array(items) = value {
                for item in items.iter_mut() {
                    if let Bson::Document(element) = item {
                        *element = self.paths.apply(std::mem::take(element));
                    }
                }
            }
        });
    }
}

/// Applies `coercion` at every path. Takes the document by value, so the
/// caller's copy can never be touched through a shared nested reference.
pub fn coerce_paths(mut doc: Document, paths: &[&str], coercion: Coercion) -> Document {
    for path in paths {
        visit_path(&mut doc, path, &mut |value| coercion.apply(value));
    }
    doc
}

/// Calls `f` on every value addressed by `path`. Never creates anything.
pub fn visit_path<F>(doc: &mut Document, path: &str, f: &mut F)
where
    F: FnMut(&mut Bson),
{
    let segments: Vec<&str> = path.split('.').collect();
    visit_document(doc, &segments, f);
}

fn visit_document<F>(doc: &mut Document, segments: &[&str], f: &mut F)
where
    F: FnMut(&mut Bson),
{
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = doc.get_mut(*head) else {
        return;
    };
    if rest.is_empty() {
        f(value);
    } else {
        descend(value, rest, f);
    }
}

fn descend<F>(value: &mut Bson, segments: &[&str], f: &mut F)
where
    F: FnMut(&mut Bson),
{
    match value {
        Bson::Document(inner) => visit_document(inner, segments, f),
        Bson::Array(items) => visit_array(items, segments, f),
        _ => {}
    }
}

fn visit_array<F>(items: &mut [Bson], segments: &[&str], f: &mut F)
where
    F: FnMut(&mut Bson),
{
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Ok(index) = head.parse::<usize>() else {
        return;
    };
    let Some(item) = items.get_mut(index) else {
        return;
    };
    if rest.is_empty() {
        f(item);
    } else {
        descend(item, rest, f);
    }
}

/// JavaScript truthiness, as the array-presence rule is defined in those terms.
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::String(s) => !s.is_empty(),
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0 && !n.is_nan(),
        _ => true,
    }
}

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];

/// Parses the date shapes clients actually send. Values without an offset are
/// taken as UTC.
pub fn parse_date(raw: &str) -> Option<bson::DateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(bson::DateTime::from_chrono(dt));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(bson::DateTime::from_chrono(dt));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(bson::DateTime::from_chrono(dt));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(bson::DateTime::from_chrono(Utc.from_utc_datetime(&naive)));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return midnight(date);
        }
    }

    // "2020-01" and "2020" mean the first day of the month / year.
    if s.len() == 7 {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
            return midnight(date);
        }
    }
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s.parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1).and_then(midnight);
    }

    None
}

fn midnight(date: NaiveDate) -> Option<bson::DateTime> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(bson::DateTime::from_chrono(Utc.from_utc_datetime(&naive)))
}

/// `parseFloat` semantics: the longest numeric prefix after leading
/// whitespace wins, trailing garbage is ignored.
pub fn parse_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            end = 1;
            true
        }
        Some(b'+') => {
            end = 1;
            false
        }
        _ => false,
    };

    if s[end..].starts_with("Infinity") {
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }

    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        let mut frac_digits = 0;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
            frac_digits += 1;
        }
        if digits + frac_digits > 0 {
            end = frac_end;
            digits += frac_digits;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn date(y: i32, m: u32, d: u32) -> Bson {
        Bson::DateTime(midnight(NaiveDate::from_ymd_opt(y, m, d).unwrap()).unwrap())
    }

    #[test]
    fn test_missing_intermediate_segment_is_noop() {
        let original = doc! { "address": { "city": "Berlin" } };
        let out = coerce_paths(
            original.clone(),
            &["address.coordinates.lat", "personalInfo.startDate"],
            Coercion::Number,
        );
        assert_eq!(out, original);
    }

    #[test]
    fn test_scalar_intermediate_aborts_only_that_path() {
        let input = doc! { "address": "not an object", "startDate": "2020-01-15" };
        let out = coerce_paths(input, &["address.city", "startDate"], Coercion::Date);
        assert_eq!(out.get("address"), Some(&Bson::String("not an object".into())));
        assert_eq!(out.get("startDate"), Some(&date(2020, 1, 15)));
    }

    #[test]
    fn test_valid_date_is_converted() {
        let out = coerce_paths(
            doc! { "personalInfo": { "startDate": "2020-01-15" } },
            &["personalInfo.startDate"],
            Coercion::Date,
        );
        assert_eq!(
            out.get_document("personalInfo").unwrap().get("startDate"),
            Some(&date(2020, 1, 15))
        );
    }

    #[test]
    fn test_invalid_date_left_untouched() {
        let out = coerce_paths(
            doc! { "issueDate": "not a date" },
            &["issueDate"],
            Coercion::Date,
        );
        assert_eq!(out.get_str("issueDate"), Ok("not a date"));
    }

    #[test]
    fn test_non_string_date_left_untouched() {
        let out = coerce_paths(doc! { "issueDate": 42 }, &["issueDate"], Coercion::Date);
        assert_eq!(out.get("issueDate"), Some(&Bson::Int32(42)));
    }

    #[test]
    fn test_date_shapes() {
        let expected = bson::DateTime::from_millis(1_579_046_400_000); // 2020-01-15T00:00:00Z
        assert_eq!(parse_date("2020-01-15"), Some(expected));
        assert_eq!(parse_date("2020-01-15T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("2020-01-15T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_date("2020-01-15T00:00:00.000Z"), Some(expected));
        assert_eq!(parse_date("01/15/2020"), Some(expected));
        assert_eq!(parse_date("  2020-01-15 "), Some(expected));
        assert!(parse_date("2020-01").is_some());
        assert!(parse_date("2020").is_some());
        assert_eq!(parse_date("2020-13-45"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_number_coercion() {
        let out = coerce_paths(
            doc! { "gpa": "3.75", "years": "abc", "lat": 52.5 },
            &["gpa", "years", "lat"],
            Coercion::Number,
        );
        assert_eq!(out.get("gpa"), Some(&Bson::Double(3.75)));
        assert_eq!(out.get_str("years"), Ok("abc"));
        assert_eq!(out.get("lat"), Some(&Bson::Double(52.5)));
    }

    #[test]
    fn test_parse_float_prefix_semantics() {
        assert_eq!(parse_float("42"), Some(42.0));
        assert_eq!(parse_float("  -1.5e3xyz"), Some(-1500.0));
        assert_eq!(parse_float("12px"), Some(12.0));
        assert_eq!(parse_float(".5"), Some(0.5));
        assert_eq!(parse_float("5."), Some(5.0));
        assert_eq!(parse_float("1e"), Some(1.0));
        assert_eq!(parse_float("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float("."), None);
        assert_eq!(parse_float("-"), None);
        assert_eq!(parse_float("abc"), None);
        assert_eq!(parse_float(""), None);
    }

    #[test]
    fn test_identifier_coercion() {
        let hex = "507f1f77bcf86cd799439011";
        let out = coerce_paths(
            doc! { "user": hex, "resume": "xyz", "template": "507f1f77bcf86cd79943901" },
            &["user", "resume", "template"],
            Coercion::Identifier,
        );
        let id = out.get_object_id("user").unwrap();
        assert_eq!(id.to_hex(), hex);
        assert_eq!(id.bytes().to_vec(), vec![0x50, 0x7f, 0x1f, 0x77, 0xbc, 0xf8, 0x6c, 0xd7, 0x99, 0x43, 0x90, 0x11]);
        assert_eq!(out.get_str("resume"), Ok("xyz"));
        assert_eq!(out.get_str("template"), Ok("507f1f77bcf86cd79943901"));
    }

    #[test]
    fn test_array_presence() {
        let out = coerce_paths(
            doc! { "a": "x", "b": ["x"], "c": Bson::Null, "d": "", "e": { "k": 1 } },
            &["a", "b", "c", "d", "e", "missing"],
            Coercion::ArrayPresence,
        );
        assert_eq!(out.get_array("a").unwrap().len(), 0);
        assert_eq!(out.get_array("b").unwrap(), &vec![Bson::String("x".into())]);
        assert_eq!(out.get("c"), Some(&Bson::Null));
        assert_eq!(out.get_str("d"), Ok(""));
        assert_eq!(out.get_array("e").unwrap().len(), 0);
        assert!(!out.contains_key("missing"));
    }

    #[test]
    fn test_named_segment_stops_at_array() {
        let input = doc! { "certifications": [
            { "issueDate": "2021-03-01" },
            "not a document",
        ] };
        let out = coerce_paths(input.clone(), &["certifications.issueDate"], Coercion::Date);
        assert_eq!(out, input);
    }

    #[test]
    fn test_element_paths_apply_to_each_object_element() {
        const PATHS: FieldPaths = FieldPaths {
            elements: &[ElementPaths {
                list: "certifications",
                paths: FieldPaths {
                    dates: &["issueDate"],
                    ..FieldPaths::EMPTY
                },
            }],
            ..FieldPaths::EMPTY
        };
        let out = PATHS.apply(doc! { "certifications": [
            { "issueDate": "2021-03-01" },
            { "issueDate": "bogus" },
            "not a document",
        ] });
        let certs = out.get_array("certifications").unwrap();
        assert_eq!(certs[0].as_document().unwrap().get("issueDate"), Some(&date(2021, 3, 1)));
        assert_eq!(certs[1].as_document().unwrap().get_str("issueDate"), Ok("bogus"));
        assert_eq!(certs[2], Bson::String("not a document".into()));
    }

    #[test]
    fn test_numeric_segment_indexes_array() {
        let out = coerce_paths(
            doc! { "skills": [ { "years": "1" }, { "years": "2" } ] },
            &["skills.1.years", "skills.7.years"],
            Coercion::Number,
        );
        let skills = out.get_array("skills").unwrap();
        assert_eq!(skills[0].as_document().unwrap().get_str("years"), Ok("1"));
        assert_eq!(skills[1].as_document().unwrap().get("years"), Some(&Bson::Double(2.0)));
    }

    #[test]
    fn test_caller_copy_is_never_mutated() {
        let original = doc! { "personalInfo": { "startDate": "2020-01-15" } };
        let _ = coerce_paths(original.clone(), &["personalInfo.startDate"], Coercion::Date);
        assert_eq!(
            original.get_document("personalInfo").unwrap().get_str("startDate"),
            Ok("2020-01-15")
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Bson::Null));
        assert!(!is_truthy(&Bson::Boolean(false)));
        assert!(!is_truthy(&Bson::Int32(0)));
        assert!(!is_truthy(&Bson::Double(f64::NAN)));
        assert!(is_truthy(&Bson::String("0".into())));
        assert!(is_truthy(&Bson::Document(Document::new())));
    }
}
