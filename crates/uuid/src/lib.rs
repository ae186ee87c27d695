//! Canonical identifiers and sharded-path utilities for orderchain.
//!
//! Orders, patients and encounters are all identified by a UUID held in a *canonical*
//! representation: **32 lowercase hexadecimal characters** without hyphens, the same value
//! produced by `Uuid::new_v4().simple().to_string()`. Externally supplied identifiers (CLI
//! arguments, form fields, ledger files) must already be canonical; nothing is normalised.
//!
//! The file-backed order store keeps one ledger per patient under
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`, which bounds directory fan-out.

mod service;

pub use service::{ShardableUuid, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
