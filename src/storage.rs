//! On-disk formats for audit inputs.

/// Requirement document loading.
pub mod requirement;
/// YAML transcript serialization.
pub mod transcript;

pub use transcript::Transcript;
