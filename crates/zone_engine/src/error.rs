//! Zone engine errors

use crate::config::ConfigError;
use crate::registry::ZoneId;
use crate::scene::{ExecutionContext, SceneError};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ZoneError>;

/// Errors raised at the zone API boundary
///
/// Misuse fails immediately and synchronously; nothing is clamped to a
/// default and no zone state is modified by a failing call.
#[derive(thiserror::Error, Debug)]
pub enum ZoneError {
    /// Empty or invalid body/container input
    #[error("cannot construct zone: {reason}")]
    Construction {
        /// What was wrong with the input
        reason: String,
    },

    /// Accuracy or detection value outside the fixed enumerations
    #[error("invalid {kind} value: {value}")]
    InvalidTier {
        /// Which enumeration was being parsed
        kind: &'static str,
        /// The offending input
        value: String,
    },

    /// Operation restricted to another execution context
    #[error("{operation} is only available in the {required:?} context")]
    Context {
        /// The rejected operation
        operation: &'static str,
        /// The context it requires
        required: ExecutionContext,
    },

    /// Operation addressed to a destroyed zone
    #[error("zone {0:?} has been destroyed")]
    UseAfterDestroy(ZoneId),

    /// A scene collaborator primitive failed
    #[error("scene query failed: {0}")]
    Scene(#[from] SceneError),

    /// Configuration could not be loaded or saved
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ZoneError {
    /// Shorthand for a [`ZoneError::Construction`]
    pub fn construction(reason: impl Into<String>) -> Self {
        Self::Construction {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ZoneError::InvalidTier`]
    pub fn invalid_tier(kind: &'static str, value: impl ToString) -> Self {
        Self::InvalidTier {
            kind,
            value: value.to_string(),
        }
    }
}
