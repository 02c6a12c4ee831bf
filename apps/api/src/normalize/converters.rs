//! Per-entity normalization: which paths get which coercion.

use bson::Document;

use crate::models::entity::EntityKind;
use crate::normalize::paths::{coerce_paths, Coercion, ElementPaths, FieldPaths};
use crate::normalize::screenshots;

pub const RESUME_PATHS: FieldPaths = FieldPaths {
    dates: &[
        "personalInfo.startDate",
        "personalInfo.dateOfBirth",
        "adminApproval.reviewedAt",
    ],
    numbers: &[],
    identifiers: &["user", "adminApproval.reviewedBy"],
    arrays: &[
        "education",
        "experience",
        "projects",
        "skills",
        "hobbies",
        "socialMedia",
        "languages",
        "certifications",
    ],
    elements: RESUME_ELEMENTS,
};

/// Collections of a resume, coerced element by element.
const RESUME_ELEMENTS: &[ElementPaths] = &[
    ElementPaths {
        list: "education",
        paths: FieldPaths {
            dates: &["startDate", "endDate"],
            numbers: &["gpa"],
            ..FieldPaths::EMPTY
        },
    },
    ElementPaths {
        list: "experience",
        paths: FieldPaths {
            dates: &["startDate", "endDate"],
            arrays: &["achievements"],
            ..FieldPaths::EMPTY
        },
    },
    ElementPaths {
        list: "projects",
        paths: FieldPaths {
            dates: &["startDate", "endDate"],
            arrays: &["technologies"],
            elements: &[ElementPaths {
                list: "screenshots",
                paths: FieldPaths {
                    dates: &["uploadedAt"],
                    ..FieldPaths::EMPTY
                },
            }],
            ..FieldPaths::EMPTY
        },
    },
    ElementPaths {
        list: "skills",
        paths: FieldPaths {
            numbers: &["yearsOfExperience"],
            ..FieldPaths::EMPTY
        },
    },
    ElementPaths {
        list: "hobbies",
        paths: FieldPaths {
            dates: &["startedAt"],
            ..FieldPaths::EMPTY
        },
    },
    ElementPaths {
        list: "certifications",
        paths: FieldPaths {
            dates: &["issueDate", "expiryDate"],
            ..FieldPaths::EMPTY
        },
    },
];

/// Coordinates are coerced at these two fixed parents, independent of the
/// path list above.
const COORDINATE_PARENTS: &[&str] = &["address.coordinates", "personalInfo.address.coordinates"];

pub const USER_PATHS: FieldPaths = FieldPaths {
    dates: &[
        "dateOfBirth",
        "lastLogin",
        "resetPasswordExpires",
        "emailVerificationExpires",
    ],
    numbers: &["address.coordinates.lat", "address.coordinates.lng"],
    identifiers: &[],
    arrays: &["resumes"],
    elements: &[],
};

pub const HOBBY_PATHS: FieldPaths = FieldPaths {
    dates: &["startedAt"],
    numbers: &[],
    identifiers: &["user", "resume"],
    arrays: &[],
    elements: &[],
};

pub const SKILL_PATHS: FieldPaths = FieldPaths {
    dates: &["lastUsed"],
    numbers: &["yearsOfExperience"],
    identifiers: &["user", "resume"],
    arrays: &["keywords"],
    elements: &[],
};

pub const SOCIAL_MEDIA_PATHS: FieldPaths = FieldPaths {
    dates: &[],
    numbers: &["followers"],
    identifiers: &["user", "resume"],
    arrays: &[],
    elements: &[],
};

pub const LANGUAGE_PATHS: FieldPaths = FieldPaths {
    dates: &["certifiedAt"],
    numbers: &[],
    identifiers: &["user", "resume"],
    arrays: &[],
    elements: &[],
};

pub const CERTIFICATION_PATHS: FieldPaths = FieldPaths {
    dates: &["issueDate", "expiryDate"],
    numbers: &[],
    identifiers: &["user", "resume"],
    arrays: &["skills"],
    elements: &[],
};

pub const TEMPLATE_PATHS: FieldPaths = FieldPaths {
    dates: &[],
    numbers: &["usageCount", "rating"],
    identifiers: &["createdBy"],
    arrays: &["tags", "sections"],
    elements: &[],
};

pub fn field_paths(kind: EntityKind) -> &'static FieldPaths {
    match kind {
        EntityKind::Resume => &RESUME_PATHS,
        EntityKind::User => &USER_PATHS,
        EntityKind::Hobby => &HOBBY_PATHS,
        EntityKind::Skill => &SKILL_PATHS,
        EntityKind::SocialMedia => &SOCIAL_MEDIA_PATHS,
        EntityKind::Language => &LANGUAGE_PATHS,
        EntityKind::Certification => &CERTIFICATION_PATHS,
        EntityKind::Template => &TEMPLATE_PATHS,
    }
}

/// Normalizes a raw request document for `kind`. Pure: no I/O, and the input
/// is consumed rather than shared.
pub fn convert(kind: EntityKind, raw: Document) -> Document {
    let doc = field_paths(kind).apply(raw);
    match kind {
        EntityKind::Resume => convert_resume_extras(doc),
        _ => doc,
    }
}

fn convert_resume_extras(doc: Document) -> Document {
    let mut doc = coerce_coordinates(doc);
    screenshots::normalize_resume(&mut doc, bson::DateTime::now());
    doc
}

fn coerce_coordinates(mut doc: Document) -> Document {
    for parent in COORDINATE_PARENTS {
        for axis in ["lat", "lng"] {
            let path = format!("{parent}.{axis}");
            doc = coerce_paths(doc, &[path.as_str()], Coercion::Number);
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId, Bson};

    #[test]
    fn test_resume_end_to_end() {
        let raw = doc! {
            "personalInfo": { "startDate": "2020-01-15" },
            "education": "notanarray",
            "user": "507f1f77bcf86cd799439011",
        };
        let out = convert(EntityKind::Resume, raw);

        let start = out
            .get_document("personalInfo")
            .unwrap()
            .get_datetime("startDate")
            .unwrap();
        assert_eq!(start.timestamp_millis(), 1_579_046_400_000);
        assert_eq!(out.get_array("education").unwrap().len(), 0);
        assert_eq!(
            out.get_object_id("user"),
            Ok(ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap())
        );
    }

    #[test]
    fn test_resume_coordinates_at_both_parents() {
        let raw = doc! {
            "address": { "coordinates": { "lat": "52.52", "lng": "13.405" } },
            "personalInfo": { "address": { "coordinates": { "lat": "-33.9", "lng": "north" } } },
        };
        let out = convert(EntityKind::Resume, raw);
        let top = out
            .get_document("address")
            .unwrap()
            .get_document("coordinates")
            .unwrap();
        assert_eq!(top.get_f64("lat"), Ok(52.52));
        assert_eq!(top.get_f64("lng"), Ok(13.405));
        let nested = out
            .get_document("personalInfo")
            .unwrap()
            .get_document("address")
            .unwrap()
            .get_document("coordinates")
            .unwrap();
        assert_eq!(nested.get_f64("lat"), Ok(-33.9));
        assert_eq!(nested.get_str("lng"), Ok("north"));
    }

    #[test]
    fn test_resume_screenshots_and_nested_dates() {
        let raw = doc! {
            "projects": [{
                "name": "site",
                "startDate": "2021-06-01",
                "technologies": "rust",
                "screenshots": ["http://x/y.png"],
            }],
        };
        let out = convert(EntityKind::Resume, raw);
        let project = out.get_array("projects").unwrap()[0].as_document().unwrap();
        assert!(project.get_datetime("startDate").is_ok());
        assert_eq!(project.get_array("technologies").unwrap().len(), 0);
        let shot = project.get_array("screenshots").unwrap()[0]
            .as_document()
            .unwrap();
        assert_eq!(shot.get_str("url"), Ok("http://x/y.png"));
    }

    #[test]
    fn test_resume_collection_elements_are_coerced() {
        let raw = doc! {
            "education": [{ "institution": "MIT", "gpa": "3.9", "startDate": "2015-09-01" }],
            "experience": [{ "company": "Acme", "startDate": "2019-01", "achievements": "many" }],
            "skills": [{ "name": "Rust", "yearsOfExperience": "4 years" }],
            "certifications": [{ "name": "CKA", "issueDate": "2022-05-01", "expiryDate": "never" }],
        };
        let out = convert(EntityKind::Resume, raw);

        let element = |list: &str| out.get_array(list).unwrap()[0].as_document().unwrap().clone();
        assert_eq!(element("education").get_f64("gpa"), Ok(3.9));
        assert!(element("education").get_datetime("startDate").is_ok());
        assert!(element("experience").get_datetime("startDate").is_ok());
        assert_eq!(element("experience").get_array("achievements").unwrap().len(), 0);
        assert_eq!(element("skills").get_f64("yearsOfExperience"), Ok(4.0));
        assert!(element("certifications").get_datetime("issueDate").is_ok());
        assert_eq!(element("certifications").get_str("expiryDate"), Ok("never"));
    }

    #[test]
    fn test_coordinates_are_resume_only() {
        let raw = doc! { "personalInfo": { "address": { "coordinates": { "lat": "1.5" } } } };
        let out = convert(EntityKind::Template, raw.clone());
        assert_eq!(out, raw);
    }

    #[test]
    fn test_standalone_references() {
        let user = ObjectId::new();
        let raw = doc! {
            "user": user.to_hex(),
            "resume": "not-an-id",
            "issueDate": "2022-02-02",
            "expiryDate": "soon",
        };
        let out = convert(EntityKind::Certification, raw);
        assert_eq!(out.get_object_id("user"), Ok(user));
        assert_eq!(out.get_str("resume"), Ok("not-an-id"));
        assert!(out.get_datetime("issueDate").is_ok());
        assert_eq!(out.get_str("expiryDate"), Ok("soon"));
    }

    #[test]
    fn test_user_address_coordinates() {
        let raw = doc! {
            "address": { "street": "1 Main", "coordinates": { "lat": "10", "lng": 20 } },
            "resetPasswordExpires": "2030-01-01T00:00:00Z",
        };
        let out = convert(EntityKind::User, raw);
        let coords = out
            .get_document("address")
            .unwrap()
            .get_document("coordinates")
            .unwrap();
        assert_eq!(coords.get("lat"), Some(&Bson::Double(10.0)));
        assert_eq!(coords.get("lng"), Some(&Bson::Int32(20)));
        assert!(out.get_datetime("resetPasswordExpires").is_ok());
    }
}
