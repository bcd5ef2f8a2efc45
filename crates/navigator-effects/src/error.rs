//! The effect-engine error taxonomy.

use thiserror::Error;

/// Errors produced while validating or executing an effect tree.
///
/// These convert into [`navigator_types::FsmError`] at the Manager boundary;
/// this crate never assumes the caller is `navigator`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EffectError {
    #[error("effect tree failed validation: {0}")]
    Validation(String),

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

    #[error("get_data referenced unbound key `{0}`")]
    UnboundKey(String),
}

impl EffectError {
    /// The closed-set error reason string, stable for telemetry and API consumers.
    pub fn reason(&self) -> &'static str {
        match self {
            EffectError::Validation(_) => "validation_error",
            EffectError::Cancelled => "cancelled",
            EffectError::Timeout => "timeout",
            EffectError::MaxRetriesExceeded {.. } => "max_retries_exceeded",
            EffectError::FunctionNotExported {.. } => "function_not_exported",
            EffectError::Raised {.. } => "raised",
            EffectError::StoreError(_) => "store_error",
            EffectError::UnboundKey(_) => "validation_error",
        }
    }
}
