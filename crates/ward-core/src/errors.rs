//! Unified error type for the wardchain trust chain engine.
//!
//! Every crate in the workspace returns [`WardError`] (aliased as
//! [`Result`]) so that callers never need to match on per-crate error
//! types. New failure categories should extend this enum rather than
//! growing a parallel error type in a downstream crate.

use serde::{Deserialize, Serialize};

/// Unified error type for all wardchain operations.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum WardError {
    /// Caller supplied an invalid argument or violated a precondition.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of what was invalid.
        message: String,
    },

    /// The session is not in a state that allows this operation.
    #[error("invalid session status: {message}")]
    InvalidSessionStatus {
        /// Description of the state mismatch.
        message: String,
    },

    /// A resource, device, user, or group could not be found.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// An AEAD authentication tag failed to verify.
    #[error("decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failed decryption attempt.
        message: String,
    },

    /// A block failed chain-of-trust verification.
    #[error("invalid block ({code:?}): {message}")]
    InvalidBlock {
        /// Structured failure subcode (spec.md §4.2).
        code: InvalidBlockCode,
        /// Human-readable description.
        message: String,
    },

    /// Wire format could not be parsed or exceeded a size/version bound.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format violation.
        message: String,
    },

    /// Block or envelope version/nature is newer than this build supports.
    #[error("upgrade required: {message}")]
    UpgradeRequired {
        /// Description of the unsupported version/nature.
        message: String,
    },

    /// The local device has been revoked; the session must be torn down.
    #[error("device revoked")]
    DeviceRevoked,

    /// Network/transport failure; retriable at the caller's discretion.
    #[error("network error: {message}")]
    NetworkError {
        /// Description of the network failure.
        message: String,
    },

    /// An operation was canceled (e.g. the session was closed).
    #[error("operation canceled")]
    OperationCanceled,

    /// A precondition required by the caller's workflow was not met.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the unmet precondition.
        message: String,
    },

    /// An internal invariant was violated; indicates a bug in the core.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

/// Structured verification failure subcodes (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidBlockCode {
    /// `author` field does not match the expected signer.
    InvalidAuthor,
    /// Block signature did not verify under the expected key.
    InvalidSignature,
    /// Delegation signature over `(ephemeralPub, userId)` did not verify.
    InvalidDelegationSignature,
    /// Unknown or unsupported nature discriminant.
    InvalidNature,
    /// Referenced user public key does not exist or is superseded.
    InvalidUserPublicKey,
    /// Operation is forbidden by the current state (e.g. duplicate device).
    Forbidden,
    /// Authoring device was revoked at the block's index.
    RevokedAuthor,
    /// A group with this id already exists and announces a different key.
    GroupAlreadyExists,
    /// `previousGroupBlock` does not match the group's current head.
    InvalidPreviousGroupBlock,
    /// Group self-signature did not verify under the group's own key.
    InvalidSelfSignature,
    /// Revocation targets a device that is already revoked or unknown.
    InvalidRevokedDevice,
    /// Device-creation version requires user-keys that are missing (or vice versa).
    MissingUserKeys,
    /// Declared nature version does not match required preconditions.
    VersionMismatch,
}

impl WardError {
    /// Construct an [`InvalidArgument`](Self::InvalidArgument) error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Construct an [`InvalidSessionStatus`](Self::InvalidSessionStatus) error.
    pub fn invalid_session_status(message: impl Into<String>) -> Self {
        Self::InvalidSessionStatus {
            message: message.into(),
        }
    }

    /// Construct a [`NotFound`](Self::NotFound) error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Construct a [`DecryptionFailed`](Self::DecryptionFailed) error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Construct an [`InvalidBlock`](Self::InvalidBlock) error.
    pub fn invalid_block(code: InvalidBlockCode, message: impl Into<String>) -> Self {
        Self::InvalidBlock {
            code,
            message: message.into(),
        }
    }

    /// Construct an [`InvalidFormat`](Self::InvalidFormat) error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Construct an [`UpgradeRequired`](Self::UpgradeRequired) error.
    pub fn upgrade_required(message: impl Into<String>) -> Self {
        Self::UpgradeRequired {
            message: message.into(),
        }
    }

    /// Construct a [`NetworkError`](Self::NetworkError) error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Construct a [`PreconditionFailed`](Self::PreconditionFailed) error.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Construct an [`Internal`](Self::Internal) error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a caller might reasonably retry this operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError { .. })
    }

    /// Stable category string, useful for metrics/log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::InvalidSessionStatus { .. } => "invalid_session_status",
            Self::NotFound { .. } => "not_found",
            Self::DecryptionFailed { .. } => "decryption_failed",
            Self::InvalidBlock { .. } => "invalid_block",
            Self::InvalidFormat { .. } => "invalid_format",
            Self::UpgradeRequired { .. } => "upgrade_required",
            Self::DeviceRevoked => "device_revoked",
            Self::NetworkError { .. } => "network_error",
            Self::OperationCanceled => "operation_canceled",
            Self::PreconditionFailed { .. } => "precondition_failed",
            Self::Internal { .. } => "internal_error",
        }
    }
}

/// Standard result type for wardchain operations.
pub type Result<T> = std::result::Result<T, WardError>;

impl From<bincode::Error> for WardError {
    fn from(err: bincode::Error) -> Self {
        Self::invalid_format(err.to_string())
    }
}

impl From<std::io::Error> for WardError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for WardError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_format(err.to_string())
    }
}

impl From<base64::DecodeError> for WardError {
    fn from(err: base64::DecodeError) -> Self {
        Self::invalid_format(format!("base64 decode: {err}"))
    }
}

impl From<toml::de::Error> for WardError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_format(format!("toml decode: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_is_stable_per_variant() {
        assert_eq!(WardError::invalid_argument("x").category(), "invalid_argument");
        assert_eq!(WardError::DeviceRevoked.category(), "device_revoked");
    }

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(WardError::network("timeout").is_retryable());
        assert!(!WardError::not_found("x").is_retryable());
    }
}
