//! The instance registry's closed-set error enum.

use navigator_kernel::TransitionError;
use navigator_storage::{BlobError, EventLogError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("instance not found")]
    NotFound,

    #[error("unknown fsm kind: {0}")]
    KindUnknown(String),

    #[error("no transition for the current state and event")]
    InvalidTransition,

    #[error("guard denied: {name}")]
    GuardDenied { name: String },

    #[error("hook failed: {name}")]
    HookFailed { name: String },

    #[error("store error: {0}")]
    StoreError(String),
}

impl RegistryError {
    /// The closed-set error-reason string used in event-log records.
    pub fn reason(&self) -> &'static str {
        match self {
            RegistryError::NotFound => "not_found",
            RegistryError::KindUnknown(_) => "kind_unknown",
            RegistryError::InvalidTransition => "invalid_transition",
            RegistryError::GuardDenied {.. } => "guard_denied",
            RegistryError::HookFailed {.. } => "hook_failed",
            RegistryError::StoreError(_) => "store_error",
        }
    }
}

impl From<TransitionError> for RegistryError {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::NoTransition {.. } => RegistryError::InvalidTransition,
            TransitionError::GuardDenied { name } => RegistryError::GuardDenied { name },
            TransitionError::HookFailed { name } => RegistryError::HookFailed { name },
        }
    }
}

impl From<BlobError> for RegistryError {
    fn from(error: BlobError) -> Self {
        RegistryError::StoreError(error.to_string())
    }
}

impl From<EventLogError> for RegistryError {
    fn from(error: EventLogError) -> Self {
        RegistryError::StoreError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_match_closed_set() {
        assert_eq!(RegistryError::NotFound.reason(), "not_found");
        assert_eq!(RegistryError::KindUnknown("x".into()).reason(), "kind_unknown");
        assert_eq!(RegistryError::InvalidTransition.reason(), "invalid_transition");
        assert_eq!(
            RegistryError::GuardDenied { name: "g".into() }.reason(),
            "guard_denied"
        );
        assert_eq!(
            RegistryError::HookFailed { name: "h".into() }.reason(),
            "hook_failed"
        );
        assert_eq!(RegistryError::StoreError("x".into()).reason(), "store_error");
    }

    #[test]
    fn transition_error_converts_preserving_reason() {
        let err: RegistryError = TransitionError::GuardDenied { name: "locked".into() }.into();
        assert_eq!(err.reason(), "guard_denied");
    }
}
