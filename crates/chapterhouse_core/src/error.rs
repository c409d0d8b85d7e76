//! crates/chapterhouse_core/src/error.rs
//!
//! The error taxonomy every core operation reports.

use crate::ports::PortError;
use crate::validation::FieldErrors;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller-correctable input problems. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("You must be signed in to perform this action.")]
    Unauthenticated,

    #[error("You are not authorized to perform this action.")]
    Forbidden,

    #[error("Please enter your email address")]
    EmptyEmail,

    #[error("Invalid email address")]
    InvalidEmailFormat,

    /// No pending sign-in is attached to the session.
    #[error("Session expired. Please sign in again.")]
    SessionExpired,

    #[error("Invalid verification code. Please check and try again.")]
    InvalidCode,

    #[error("Your verification code has expired. Please request a new one below.")]
    ExpiredCode,

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Port(PortError),
}

impl From<PortError> for CoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => CoreError::NotFound(what),
            other => CoreError::Port(other),
        }
    }
}

impl From<FieldErrors> for CoreError {
    fn from(errors: FieldErrors) -> Self {
        CoreError::Validation(errors)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Re-reports a store-level uniqueness violation as a validation failure on `field`.
pub(crate) fn conflict_as_field(field: &'static str) -> impl FnOnce(PortError) -> CoreError {
    move |err| match err {
        PortError::Conflict(_) => {
            CoreError::Validation(FieldErrors::single(field, "has already been taken"))
        }
        other => other.into(),
    }
}
