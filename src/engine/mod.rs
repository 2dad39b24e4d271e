mod http;
mod response;

pub use http::HttpClassifier;
pub(crate) use response::{decode_response, server_error_message};

use crate::error::SubmitError;
use crate::model::{ClassificationResult, SubmissionRequest};
use async_trait::async_trait;

/// The remote collaborator that trains a model on a dataset and reports on it.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    async fn classify(
        &self,
        request: &SubmissionRequest,
    ) -> Result<ClassificationResult, SubmitError>;
}
