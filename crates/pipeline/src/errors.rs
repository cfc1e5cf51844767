//! Error types for the apiwire request pipeline.
//!
//! Three layers, matching where a failure originates:
//!
//! - [`ConfigError`] is returned synchronously while a [`crate::Client`] is
//!   being built.
//! - [`TransportError`] is produced by transport adapters. The dispatch step
//!   captures it into the call's response slot instead of propagating it, so
//!   the unwind phase of the middleware chain always runs.
//! - [`ApiError`] is what an [`crate::ApiFunction`] call resolves to on
//!   failure. Hook and middleware errors use it directly and propagate with `?`.
//!
//! The messages `invalid reqType` and `Unknown Method: <METHOD>!!!` are part of
//! the public contract and must not change.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Construction-time errors
// ---------------------------------------------------------------------------

/// Errors raised while building a client from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configured transport kind is outside the supported set.
    #[error("invalid reqType")]
    InvalidReqType {
        /// The rejected value, as written in the configuration.
        req_type: String,
    },
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures reported by a transport adapter.
///
/// Adapters map their library-specific errors into one of these variants.
/// The dispatcher never inspects them; it stores them on the response slot
/// and the call rejects with the same value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The HTTP verb is not supported by the transport. The verb is kept
    /// uppercase.
    #[error("Unknown Method: {0}!!!")]
    UnknownMethod(String),

    /// The descriptor routes to a transport the client was built without.
    #[error("{0} transport is not configured")]
    NotConfigured(&'static str),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// Any other transport-level failure (network, timeout, decoding).
    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    /// Creates a [`TransportError::Failed`] from any displayable message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

// ---------------------------------------------------------------------------
// Call errors
// ---------------------------------------------------------------------------

/// Errors an API call can reject with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint's transport kind is invalid. Raised by the dispatcher and
    /// captured like any other transport failure.
    #[error("invalid reqType")]
    InvalidReqType {
        /// The rejected value, as written in the endpoint configuration.
        req_type: String,
    },

    /// A transport failure captured by the dispatcher, passed through unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A parameter declared as required was not supplied.
    #[error("{api} requires param `{param}`")]
    MissingParam {
        /// Name of the API being called.
        api: String,
        /// Name of the missing parameter.
        param: String,
    },

    /// Call arguments were neither `null` nor a JSON object.
    #[error("arguments for {api} must be a JSON object or null")]
    InvalidArgs {
        /// Name of the API being called.
        api: String,
    },

    /// The pipeline completed without any middleware populating a response.
    #[error("{api} finished without a response")]
    NoResponse {
        /// Name of the API being called.
        api: String,
    },

    /// A plain failure raised by a hook or a user middleware.
    #[error("{0}")]
    Custom(String),
}

impl ApiError {
    /// Creates an [`ApiError::Custom`] carrying only a message.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}
