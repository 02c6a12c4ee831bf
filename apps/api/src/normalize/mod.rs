//! Inbound document normalization: type coercion at declared paths, the
//! screenshot shape fix-up, and update-operator application.

pub mod converters;
pub mod operators;
pub mod paths;
pub mod screenshots;

pub use converters::convert;
