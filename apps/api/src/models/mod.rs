pub mod document;
pub mod entity;
pub mod resume;
pub mod user;
