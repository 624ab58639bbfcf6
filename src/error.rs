//! Unified client error handling for msgsched.
//!
//! Every API call, store write and form submission funnels its failures into
//! [`ClientError`]. Screen controllers turn it into a user-facing string with
//! [`ClientError::user_message`], preferring whatever the backend put in the
//! response body over the screen's fixed fallback.

use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors produced by the client library
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to reach the API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication failed ({status})")]
    Unauthorized {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Server returned error {status}")]
    Server {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("No organization selected")]
    NoTenantSelected,

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Credential contains characters that cannot be sent in a header")]
    InvalidToken,

    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Validation(ValidationErrors),
}

impl ClientError {
    /// Build the error for a non-success HTTP response
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_message(body);
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            ClientError::Unauthorized { status, message }
        } else {
            ClientError::Server { status, message }
        }
    }

    /// Message the backend reported in the response body, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Unauthorized { message, .. } | ClientError::Server { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    /// HTTP status of a rejected request
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Unauthorized { status, .. } | ClientError::Server { status, .. } => {
                Some(*status)
            }
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// The string a screen shows for this error.
    ///
    /// Local validation errors are shown as-is, backend errors show the body
    /// message when there is one, anything else shows `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self.local_message() {
            Some(message) => message,
            None => self
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    /// Like [`user_message`](Self::user_message) but ignores the response body
    pub fn fixed_message(&self, fallback: &str) -> String {
        self.local_message()
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Failures detected before anything was sent
    fn local_message(&self) -> Option<String> {
        match self {
            ClientError::Validation(errors) => Some(errors.message()),
            ClientError::NotAuthenticated | ClientError::NoTenantSelected => {
                Some(self.to_string())
            }
            _ => None,
        }
    }
}

/// Shapes of error bodies the backend is known to return
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Message { message: String },
    Nested { error: NestedError },
    Flat { error: String },
}

#[derive(Debug, Deserialize)]
struct NestedError {
    message: String,
}

/// Pull a human-readable message out of an error response body
pub fn extract_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match parsed {
        ErrorBody::Message { message } => message,
        ErrorBody::Nested { error } => error.message,
        ErrorBody::Flat { error } => error,
    };
    let message = message.trim();
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

// -------------------------------------------------------------------------
// Form validation errors
// -------------------------------------------------------------------------

/// Field-level validation failures collected before a form is submitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the outcome of a field validator
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages recorded for one field
    pub fn field(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Summary line shown to the user
    pub fn message(&self) -> String {
        if self.errors.len() == 1 {
            self.errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", self.errors.len())
        }
    }

    /// Return Ok(()) if no errors, or the collected errors otherwise
    pub fn finish(self) -> Result<(), ClientError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
