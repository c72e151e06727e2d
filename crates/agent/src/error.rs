use domain::models::DomainError;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Error body returned by the backend: either a plain message or a list of
/// field errors for rejected payloads.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Fields(Vec<FieldError>),
}

#[derive(Debug, Deserialize)]
struct FieldError {
    #[serde(default)]
    loc: Vec<serde_json::Value>,
    msg: String,
}

impl AgentError {
    /// Maps a non-success backend response to an error variant.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                detail: ErrorDetail::Message(msg),
            }) => msg,
            Ok(ErrorBody {
                detail: ErrorDetail::Fields(fields),
            }) => fields
                .iter()
                .map(|f| match f.loc.last() {
                    Some(serde_json::Value::String(field)) => format!("{}: {}", field, f.msg),
                    _ => f.msg.clone(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
            Err(_) => body.trim().to_string(),
        };

        match status {
            400 | 422 => AgentError::Validation(message),
            401 => AgentError::Unauthorized(message),
            403 => AgentError::Forbidden(message),
            404 => AgentError::NotFound(message),
            409 => AgentError::Conflict(message),
            _ => AgentError::Backend { status, message },
        }
    }

    /// Transient errors may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            AgentError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for AgentError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        details.sort();

        let message = if details.len() == 1 {
            details.remove(0)
        } else {
            format!("{} validation errors: {}", details.len(), details.join("; "))
        };

        AgentError::Validation(message)
    }
}
