//! Domain-specific error types for the reconcile engine.
//!
//! Internal modules return typed errors ([`ValidationError`],
//! [`CollaboratorError`], [`AmbiguousStateError`]) while command handlers at
//! the CLI boundary convert them to [`anyhow::Error`] via the standard `?`
//! operator.
//!
//! # Error hierarchy
//!
//! ```text
//! ReconcileError
//! ├── Validation(ValidationError)       — malformed or missing input
//! ├── Collaborator(CollaboratorError)   — device / filesystem call failures
//! └── Ambiguous(AmbiguousStateError)    — more than one entry matches a key
//! ```
//!
//! Every variant is terminal for the current invocation; nothing is retried.

use thiserror::Error;

/// Top-level error type for a single reconciliation.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Input parameters failed validation; no system call was attempted.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A read or write against the external system failed.
    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// The external system holds several entries where exactly one was expected.
    #[error("ambiguous state: {0}")]
    Ambiguous(#[from] AmbiguousStateError),
}

/// Errors raised while validating user-supplied parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required parameter was not supplied.
    #[error("missing required parameter '{0}'")]
    Missing(&'static str),

    /// A parameter was supplied but its value is outside the allowed domain.
    #[error("invalid value for '{param}': {reason}")]
    InvalidValue {
        /// Parameter name as the user spelled it.
        param: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The argument record could not be parsed at all (syntax, unknown key, wrong type).
    #[error("invalid arguments in {source_name}: {message}")]
    Malformed {
        /// Where the arguments came from (file path or `"command line"`).
        source_name: String,
        /// Parser message.
        message: String,
    },
}

/// Errors raised by the external system a reconciler talks to.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// The transport failed before a response was received.
    #[error("request to {target} failed: {message}")]
    Transport {
        /// Host or URL that was contacted.
        target: String,
        /// Underlying transport message.
        message: String,
    },

    /// The management API answered with a non-success status.
    #[error("{target} returned HTTP {status}")]
    Status {
        /// URL that was requested.
        target: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response could not be interpreted.
    #[error("unexpected response from {target}: {message}")]
    InvalidResponse {
        /// URL or command that produced the response.
        target: String,
        /// What was wrong with it.
        message: String,
    },

    /// An entity that must exist was not found.
    #[error("{0} does not exist")]
    NotFound(String),

    /// A local command (e.g. `PowerShell`) failed.
    #[error("command '{program}' failed: {stderr}")]
    Command {
        /// Program that was invoked.
        program: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// A create call returned success but the entity is still absent.
    #[error("failed to create {0}")]
    CreateFailed(String),

    /// The collaborator is not available on this platform.
    #[error("{what} is not supported on {platform}")]
    Unsupported {
        /// Name of the capability.
        what: String,
        /// Platform name.
        platform: String,
    },
}

/// More than one entry matched an identifying key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{count} entries match {key}, expected at most one")]
pub struct AmbiguousStateError {
    /// Identifying key that was looked up.
    pub key: String,
    /// Number of entries that matched.
    pub count: usize,
}
