//! Error types for Settee
//!
//! Errors that abort an operation. Store responses that are merely negative
//! (a 404 while probing for an id, a revision conflict) are not errors here;
//! they travel as [`Outcome::Rejected`](crate::Outcome::Rejected).
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for Settee operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors raised by the document source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The session could not be established
    #[error("Missing connection: {reason}")]
    MissingConnection {
        /// Underlying failure message
        reason: String,
    },

    /// The store answered with an error that must abort the operation
    #[error("Fatal store error: {description}")]
    Fatal {
        /// Composed error-set description
        description: String,
    },

    /// The request never produced a response (connection refused, timeout, ...)
    #[error("Transport error: {reason}")]
    Transport {
        /// Transport failure message
        reason: String,
    },

    /// An update was attempted without any way to name the document
    #[error("No identifier available for {entity}")]
    MissingIdentifier {
        /// Entity kind of the record
        entity: String,
    },

    /// A pagination view could not be queried
    #[error("View {design}/{view} unavailable: {description}")]
    ViewUnavailable {
        /// Design document name
        design: String,
        /// View name
        view: String,
        /// Composed error-set description
        description: String,
    },

    /// Configuration could not be read or is inconsistent
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it
        reason: String,
    },

    /// A request body could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Serialization(e.to_string())
    }
}

impl SourceError {
    /// Create an InvalidConfig error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        SourceError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// True when the failure happened while establishing the session
    pub fn is_connection_error(&self) -> bool {
        matches!(self, SourceError::MissingConnection { .. })
    }
}
