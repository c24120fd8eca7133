//! Facility-prefixed patient identifier generation.
//!
//! Unique patient numbers are a facility code (from the national Master
//! Facility List) followed by a sequential identifier drawn from a named
//! source, with a Luhn mod-N check digit over the source's character set.
//! This crate owns only identifier arithmetic; nothing here touches the
//! clinical data model.

pub mod service;

pub use service::{luhn_check_digit, validate_identifier, FacilityCode, IdentifierSource};

/// Errors that can occur generating or validating identifiers.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    #[error("facility code must be 1-10 ASCII digits, got '{0}'")]
    InvalidFacilityCode(String),
    #[error("identifier character set must contain at least two distinct characters")]
    CharacterSetTooSmall,
    #[error("identifier character set contains duplicate character '{0}'")]
    DuplicateCharacter(char),
    #[error("character '{0}' is not in the identifier character set")]
    CharacterNotInSet(char),
    #[error("identifier is empty")]
    Empty,
}

pub type IdentifierResult<T> = std::result::Result<T, IdentifierError>;
