//! Error handling for the CookEase session core

use std::fmt;
use thiserror::Error;

/// Unified error type for the session core
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Credential or auth service errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Table query errors
    #[error("Database error: {0}")]
    Database(String),

    /// Form input rejected before any remote call
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A record that must exist was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote call answered with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new database error
    pub fn database<T: fmt::Display>(msg: T) -> Self {
        Error::Database(msg.to_string())
    }

    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Whether a retry has a chance of succeeding.
    ///
    /// Connection failures and 5xx answers are transient; a missing row is
    /// treated as transient too because the row may still be in the middle
    /// of being created by the sign-up flow.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::Status { status, .. } => *status >= 500,
            Error::NotFound(_) => true,
            _ => false,
        }
    }

    /// Static message shown to the user in an alert.
    ///
    /// No structured codes ever reach the UI layer.
    pub fn alert_message(&self) -> &'static str {
        match self {
            Error::Validation(_) => "Please check the highlighted fields and try again.",
            Error::Auth(_) => "Authentication failed. Please try again.",
            Error::Http(_) | Error::Status { .. } => {
                "Network error. Please check your connection and try again."
            }
            Error::NotFound(_) => "We could not find your profile. Please sign in again.",
            _ => "Something went wrong. Please try again.",
        }
    }
}

/// A single rejected form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name as used by the form
    pub field: &'static str,
    /// Human readable message
    pub message: String,
}

/// Every field error found in one form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field`
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// First message recorded for `field`
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}
