//! Manager-level error taxonomy, unifying the registry and the effects
//! engine onto one closed set of error reasons.

use navigator_effects::EffectError;
use navigator_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ManagerError {
    #[error("instance not found")]
    NotFound,

    #[error("kind `{0}` is not registered")]
    KindUnknown(String),

    #[error("no transition for the current state and event")]
    InvalidTransition,

    #[error("guard `{name}` denied the transition")]
    GuardDenied { name: String },

    #[error("hook `{name}` failed")]
    HookFailed { name: String },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("effect execution cancelled")]
    Cancelled,

    #[error("effect timed out")]
    Timeout,

    #[error("retry exhausted after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    #[error("capability `{module}.{function}` is not exported")]
    FunctionNotExported { module: String, function: String },

    #[error("capability raised: {reason}")]
    Raised { reason: String },

    #[error("store error: {0}")]
    StoreError(String),
}

impl ManagerError {
    /// The closed-set error reason string, stable for telemetry and API consumers.
    pub fn reason(&self) -> &'static str {
        match self {
            ManagerError::NotFound => "not_found",
            ManagerError::KindUnknown(_) => "kind_unknown",
            ManagerError::InvalidTransition => "invalid_transition",
            ManagerError::GuardDenied {.. } => "guard_denied",
            ManagerError::HookFailed {.. } => "hook_failed",
            ManagerError::ValidationError(_) => "validation_error",
            ManagerError::Cancelled => "cancelled",
            ManagerError::Timeout => "timeout",
            ManagerError::MaxRetriesExceeded {.. } => "max_retries_exceeded",
            ManagerError::FunctionNotExported {.. } => "function_not_exported",
            ManagerError::Raised {.. } => "raised",
            ManagerError::StoreError(_) => "store_error",
        }
    }
}

impl From<RegistryError> for ManagerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => ManagerError::NotFound,
            RegistryError::KindUnknown(name) => ManagerError::KindUnknown(name),
            RegistryError::InvalidTransition => ManagerError::InvalidTransition,
            RegistryError::GuardDenied { name } => ManagerError::GuardDenied { name },
            RegistryError::HookFailed { name } => ManagerError::HookFailed { name },
            RegistryError::StoreError(msg) => ManagerError::StoreError(msg),
        }
    }
}

impl From<EffectError> for ManagerError {
    fn from(err: EffectError) -> Self {
        match err {
            EffectError::Validation(msg) => ManagerError::ValidationError(msg),
            EffectError::Cancelled => ManagerError::Cancelled,
            EffectError::Timeout => ManagerError::Timeout,
            EffectError::MaxRetriesExceeded { attempts } => ManagerError::MaxRetriesExceeded { attempts },
            EffectError::FunctionNotExported { module, function } => {
                ManagerError::FunctionNotExported { module, function }
            }
            EffectError::Raised { reason } => ManagerError::Raised { reason },
            EffectError::StoreError(msg) => ManagerError::StoreError(msg),
            EffectError::UnboundKey(key) => ManagerError::ValidationError(format!("unbound key `{key}`")),
        }
    }
}
