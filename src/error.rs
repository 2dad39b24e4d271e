use reqwest::StatusCode;
use thiserror::Error;

use crate::model::SubmissionId;

/// Input problems detected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no dataset file selected")]
    MissingFile,
    #[error("target column is empty")]
    EmptyTargetColumn,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("submission {0} is still in flight")]
    InFlight(SubmissionId),
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    #[error(
        "server returned {status}{}",
        .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
    )]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("request interrupted: {0}")]
    Interrupted(String),
}

impl SubmitError {
    /// True when the input was refused and nothing was sent.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SubmitError::Validation(_) | SubmitError::InFlight(_))
    }

    pub fn transport(endpoint: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "timed out".to_string()
        } else if err.is_connect() {
            format!("could not connect ({})", root_cause(err))
        } else {
            root_cause(err)
        };
        SubmitError::Transport {
            endpoint: endpoint.to_string(),
            message,
        }
    }
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}
