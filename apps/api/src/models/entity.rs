use serde::{Deserialize, Serialize};

/// Every document type that passes through the normalization pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Resume,
    User,
    Hobby,
    Skill,
    SocialMedia,
    Language,
    Certification,
    Template,
}

impl EntityKind {
    /// Kinds stored in the generic document collection and served under
    /// `/api/v1/:kind`. Resumes have their own versioned store.
    pub const STORED: &'static [EntityKind] = &[
        EntityKind::User,
        EntityKind::Hobby,
        EntityKind::Skill,
        EntityKind::SocialMedia,
        EntityKind::Language,
        EntityKind::Certification,
        EntityKind::Template,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Resume => "resume",
            EntityKind::User => "user",
            EntityKind::Hobby => "hobby",
            EntityKind::Skill => "skill",
            EntityKind::SocialMedia => "social_media",
            EntityKind::Language => "language",
            EntityKind::Certification => "certification",
            EntityKind::Template => "template",
        }
    }

    /// URL path segment for the collection.
    pub fn segment(self) -> &'static str {
        match self {
            EntityKind::Resume => "resumes",
            EntityKind::User => "users",
            EntityKind::Hobby => "hobbies",
            EntityKind::Skill => "skills",
            EntityKind::SocialMedia => "social-media",
            EntityKind::Language => "languages",
            EntityKind::Certification => "certifications",
            EntityKind::Template => "templates",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::STORED.iter().copied().find(|k| k.segment() == segment)
    }

    pub fn from_stored(kind: &str) -> Option<Self> {
        Self::STORED.iter().copied().find(|k| k.as_str() == kind)
    }

    /// Standalone resume sections reference both a user and a resume.
    pub fn is_resume_section(self) -> bool {
        matches!(
            self,
            EntityKind::Hobby
                | EntityKind::Skill
                | EntityKind::SocialMedia
                | EntityKind::Language
                | EntityKind::Certification
        )
    }
}
