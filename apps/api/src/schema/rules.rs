use crate::models::entity::EntityKind;
use crate::models::resume::{ApprovalStatus, ResumeStatus};
use crate::models::user::Role;
use crate::schema::{EntitySchema, FieldSchema, Kind, Pattern, Rule};

const SKILL_LEVELS: &[&str] = &["beginner", "intermediate", "advanced", "expert"];
const LANGUAGE_LEVELS: &[&str] = &["basic", "conversational", "professional", "fluent", "native"];
const HOBBY_FREQUENCIES: &[&str] = &["daily", "weekly", "monthly", "occasionally"];
const SOCIAL_PLATFORMS: &[&str] = &[
    "linkedin",
    "github",
    "twitter",
    "facebook",
    "instagram",
    "youtube",
    "portfolio",
    "other",
];
const TEMPLATE_CATEGORIES: &[&str] = &["professional", "creative", "modern", "minimal", "academic"];

const fn field(path: &'static str, rules: &'static [Rule]) -> FieldSchema {
    FieldSchema { path, rules }
}

const REQUIRED_TEXT: &[Rule] = &[Rule::Required, Rule::Trim, Rule::Type(Kind::String), Rule::MaxLength(100)];
const SHORT_TEXT: &[Rule] = &[Rule::Trim, Rule::Type(Kind::String), Rule::MaxLength(100)];
const LONG_TEXT: &[Rule] = &[Rule::Trim, Rule::Type(Kind::String), Rule::MaxLength(2000)];
const DATE: &[Rule] = &[Rule::Type(Kind::Date)];
const FLAG: &[Rule] = &[Rule::Type(Kind::Boolean)];
const URL: &[Rule] = &[Rule::Trim, Rule::Pattern(Pattern::Url)];
const LATITUDE: &[Rule] = &[Rule::Type(Kind::Number), Rule::Min(-90.0), Rule::Max(90.0)];
const LONGITUDE: &[Rule] = &[Rule::Type(Kind::Number), Rule::Min(-180.0), Rule::Max(180.0)];
const OWNER: &[Rule] = &[Rule::Required, Rule::Type(Kind::Identifier)];

pub static RESUME: EntitySchema = EntitySchema {
    collections: &[
        "education",
        "experience",
        "projects",
        "projects.screenshots",
        "skills",
        "hobbies",
        "socialMedia",
        "languages",
        "certifications",
    ],
    fields: &[
        field("user", OWNER),
        field("title", REQUIRED_TEXT),
        field("template", SHORT_TEXT),
        field("status", &[Rule::OneOf(ResumeStatus::NAMES)]),
        field("isPublic", FLAG),
        field("isDefault", FLAG),
        field("personalInfo", &[Rule::Required, Rule::Type(Kind::Object)]),
        field("personalInfo.fullName", REQUIRED_TEXT),
        field("personalInfo.email", &[Rule::Required, Rule::Trim, Rule::Pattern(Pattern::Email)]),
        field("personalInfo.phone", &[Rule::Trim, Rule::Pattern(Pattern::Phone)]),
        field("personalInfo.summary", LONG_TEXT),
        field("personalInfo.startDate", DATE),
        field("personalInfo.dateOfBirth", DATE),
        field("personalInfo.address.street", SHORT_TEXT),
        field("personalInfo.address.city", SHORT_TEXT),
        field("personalInfo.address.state", SHORT_TEXT),
        field("personalInfo.address.zipCode", &[Rule::Trim, Rule::MaxLength(20)]),
        field("personalInfo.address.country", SHORT_TEXT),
        field("personalInfo.address.coordinates.lat", LATITUDE),
        field("personalInfo.address.coordinates.lng", LONGITUDE),
        field("address.coordinates.lat", LATITUDE),
        field("address.coordinates.lng", LONGITUDE),
        field("education", &[Rule::Type(Kind::Array)]),
        field("education.institution", &[Rule::Required, Rule::Trim, Rule::MaxLength(200)]),
        field("education.degree", REQUIRED_TEXT),
        field("education.fieldOfStudy", SHORT_TEXT),
        field("education.startDate", DATE),
        field("education.endDate", DATE),
        field("education.gpa", &[Rule::Type(Kind::Number), Rule::Min(0.0), Rule::Max(10.0)]),
        field("experience", &[Rule::Type(Kind::Array)]),
        field("experience.company", REQUIRED_TEXT),
        field("experience.position", REQUIRED_TEXT),
        field("experience.startDate", &[Rule::Required, Rule::Type(Kind::Date)]),
        field("experience.endDate", DATE),
        field("experience.description", LONG_TEXT),
        field("projects", &[Rule::Type(Kind::Array)]),
        field("projects.name", REQUIRED_TEXT),
        field("projects.description", LONG_TEXT),
        field("projects.githubUrl", &[Rule::Trim, Rule::Pattern(Pattern::GithubUrl)]),
        field("projects.liveUrl", URL),
        field("projects.startDate", DATE),
        field("projects.endDate", DATE),
        field("projects.screenshots.url", &[Rule::Type(Kind::String)]),
        field("projects.screenshots.caption", &[Rule::Type(Kind::String), Rule::MaxLength(200)]),
        field("projects.screenshots.uploadedAt", DATE),
        field("skills", &[Rule::Type(Kind::Array)]),
        field("skills.name", REQUIRED_TEXT),
        field("skills.level", &[Rule::OneOf(SKILL_LEVELS)]),
        field("skills.yearsOfExperience", &[Rule::Type(Kind::Number), Rule::Min(0.0), Rule::Max(70.0)]),
        field("hobbies", &[Rule::Type(Kind::Array)]),
        field("hobbies.name", REQUIRED_TEXT),
        field("socialMedia", &[Rule::Type(Kind::Array)]),
        field("socialMedia.platform", &[Rule::Required, Rule::OneOf(SOCIAL_PLATFORMS)]),
        field("socialMedia.url", &[Rule::Required, Rule::Trim, Rule::Pattern(Pattern::Url)]),
        field("languages", &[Rule::Type(Kind::Array)]),
        field("languages.name", REQUIRED_TEXT),
        field("languages.proficiency", &[Rule::OneOf(LANGUAGE_LEVELS)]),
        field("certifications", &[Rule::Type(Kind::Array)]),
        field("certifications.name", REQUIRED_TEXT),
        field("certifications.issuer", REQUIRED_TEXT),
        field("certifications.issueDate", DATE),
        field("certifications.expiryDate", DATE),
        field("certifications.credentialUrl", URL),
        field("adminApproval.status", &[Rule::OneOf(ApprovalStatus::NAMES)]),
        field("adminApproval.reviewedBy", &[Rule::Type(Kind::Identifier)]),
        field("adminApproval.reviewedAt", DATE),
        field("adminApproval.comments", &[Rule::Trim, Rule::MaxLength(1000)]),
    ],
};

pub static USER: EntitySchema = EntitySchema {
    collections: &["resumes"],
    fields: &[
        field("name", &[Rule::Required, Rule::Trim, Rule::MinLength(2), Rule::MaxLength(50)]),
        field("email", &[Rule::Required, Rule::Trim, Rule::Pattern(Pattern::Email)]),
        field("phone", &[Rule::Trim, Rule::Pattern(Pattern::Phone)]),
        field("role", &[Rule::OneOf(Role::NAMES)]),
        field("isActive", FLAG),
        field("isVerified", FLAG),
        field("dateOfBirth", DATE),
        field("lastLogin", DATE),
        field("resetPasswordExpires", DATE),
        field("emailVerificationExpires", DATE),
        field("address", &[Rule::Required, Rule::Type(Kind::Object)]),
        field("address.street", REQUIRED_TEXT),
        field("address.city", REQUIRED_TEXT),
        field("address.state", SHORT_TEXT),
        field("address.zipCode", &[Rule::Trim, Rule::MaxLength(20)]),
        field("address.country", REQUIRED_TEXT),
        field("address.coordinates.lat", LATITUDE),
        field("address.coordinates.lng", LONGITUDE),
    ],
};

pub static HOBBY: EntitySchema = EntitySchema {
    collections: &[],
    fields: &[
        field("user", OWNER),
        field("resume", OWNER),
        field("name", REQUIRED_TEXT),
        field("description", &[Rule::Trim, Rule::MaxLength(500)]),
        field("frequency", &[Rule::OneOf(HOBBY_FREQUENCIES)]),
        field("startedAt", DATE),
    ],
};

pub static SKILL: EntitySchema = EntitySchema {
    collections: &[],
    fields: &[
        field("user", OWNER),
        field("resume", OWNER),
        field("name", REQUIRED_TEXT),
        field("category", SHORT_TEXT),
        field("level", &[Rule::OneOf(SKILL_LEVELS)]),
        field("yearsOfExperience", &[Rule::Type(Kind::Number), Rule::Min(0.0), Rule::Max(70.0)]),
        field("lastUsed", DATE),
        field("keywords", &[Rule::Type(Kind::Array)]),
    ],
};

pub static SOCIAL_MEDIA: EntitySchema = EntitySchema {
    collections: &[],
    fields: &[
        field("user", OWNER),
        field("resume", OWNER),
        field("platform", &[Rule::Required, Rule::Trim, Rule::OneOf(SOCIAL_PLATFORMS)]),
        field("url", &[Rule::Required, Rule::Trim, Rule::Pattern(Pattern::Url)]),
        field("username", SHORT_TEXT),
        field("followers", &[Rule::Type(Kind::Number), Rule::Min(0.0)]),
    ],
};

pub static LANGUAGE: EntitySchema = EntitySchema {
    collections: &[],
    fields: &[
        field("user", OWNER),
        field("resume", OWNER),
        field("name", &[Rule::Required, Rule::Trim, Rule::MaxLength(50)]),
        field("proficiency", &[Rule::Required, Rule::OneOf(LANGUAGE_LEVELS)]),
        field("certifiedAt", DATE),
    ],
};

pub static CERTIFICATION: EntitySchema = EntitySchema {
    collections: &[],
    fields: &[
        field("user", OWNER),
        field("resume", OWNER),
        field("name", &[Rule::Required, Rule::Trim, Rule::MaxLength(200)]),
        field("issuer", REQUIRED_TEXT),
        field("issueDate", &[Rule::Required, Rule::Type(Kind::Date)]),
        field("expiryDate", DATE),
        field("credentialId", SHORT_TEXT),
        field("credentialUrl", URL),
        field("skills", &[Rule::Type(Kind::Array)]),
    ],
};

pub static TEMPLATE: EntitySchema = EntitySchema {
    collections: &[],
    fields: &[
        field("name", REQUIRED_TEXT),
        field("description", &[Rule::Trim, Rule::MaxLength(500)]),
        field("category", &[Rule::Required, Rule::OneOf(TEMPLATE_CATEGORIES)]),
        field("previewImage", URL),
        field("primaryColor", &[Rule::Trim, Rule::Pattern(Pattern::HexColor)]),
        field("isActive", FLAG),
        field("isPremium", FLAG),
        field("usageCount", &[Rule::Type(Kind::Number), Rule::Min(0.0)]),
        field("rating", &[Rule::Type(Kind::Number), Rule::Min(0.0), Rule::Max(5.0)]),
        field("createdBy", &[Rule::Type(Kind::Identifier)]),
        field("tags", &[Rule::Type(Kind::Array)]),
    ],
};

pub fn schema_for(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::Resume => &RESUME,
        EntityKind::User => &USER,
        EntityKind::Hobby => &HOBBY,
        EntityKind::Skill => &SKILL,
        EntityKind::SocialMedia => &SOCIAL_MEDIA,
        EntityKind::Language => &LANGUAGE,
        EntityKind::Certification => &CERTIFICATION,
        EntityKind::Template => &TEMPLATE,
    }
}
