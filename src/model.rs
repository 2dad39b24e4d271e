use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::ValidationError;

/// Upload endpoint of the local classification service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/upload";

#[derive(Debug, Clone)]
pub struct SubmitConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(120),
            user_agent: format!("dataset-classify-cli/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A dataset picked by the user, held in memory for the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub name: String,
    pub content: Bytes,
}

impl DatasetFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let content = std::fs::read(path)
            .with_context(|| format!("read dataset file {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("dataset.csv")
            .to_string();
        Ok(Self::new(name, content))
    }

    /// The service only parses CSV; other extensions are sent anyway.
    pub fn looks_like_csv(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionInput {
    pub file: Option<DatasetFile>,
    pub target_column: String,
}

impl SubmissionInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.file.is_none() {
            return Err(ValidationError::MissingFile);
        }
        if self.target_column.is_empty() {
            return Err(ValidationError::EmptyTargetColumn);
        }
        Ok(())
    }
}

/// Monotonic identifier handed out for every issued submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionId(pub u64);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the service needs for one classification request.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub id: SubmissionId,
    pub file: DatasetFile,
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionStatus {
    Idle,
    Submitting { id: SubmissionId },
    Succeeded(ClassificationResult),
    Failed(String),
}

impl SubmissionStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SubmissionStatus::Submitting { .. })
    }
}

/// Per-class (or averaged) row of the classification report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub actual: Value,
    pub predicted: Value,
}

impl Prediction {
    pub fn is_hit(&self) -> bool {
        self.actual == self.predicted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub best_model: String,
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(with = "crate::images::base64_bytes")]
    pub confusion_matrix_image: Bytes,
    #[serde(
        default,
        with = "crate::images::base64_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub feature_importance_image: Option<Bytes>,
    #[serde(
        default,
        with = "crate::images::base64_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub shap_summary_image: Option<Bytes>,
    #[serde(
        default,
        deserialize_with = "deserialize_report",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub report: Vec<ClassMetrics>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub predictions: Vec<Prediction>,
}

impl ClassificationResult {
    /// Checks the parts of the payload serde cannot express.
    pub fn check(&self) -> Result<(), String> {
        if !self.accuracy.is_finite() || !(0.0..=1.0).contains(&self.accuracy) {
            return Err(format!("accuracy {} is outside [0, 1]", self.accuracy));
        }
        Ok(())
    }
}

/// Body returned by the upload endpoint on success.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    pub result: ClassificationResult,
}

/// Notifications emitted by the controller and consumed by CLI/TUI layers.
#[derive(Debug, Clone)]
pub enum SubmissionEvent {
    Started {
        id: SubmissionId,
        file_name: String,
        target_column: String,
    },
    Succeeded {
        id: SubmissionId,
        best_model: String,
        accuracy: f64,
    },
    Failed {
        id: SubmissionId,
        reason: String,
    },
    Rejected(String),
    Hint(String),
}

pub const VALIDATION_NOTICE: &str = "Selecione um arquivo e a coluna alvo.";
pub const FAILURE_NOTICE: &str = "Erro ao processar o arquivo.";

impl SubmissionEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            SubmissionEvent::Started {
                id,
                file_name,
                target_column,
            } => format!("Enviando {file_name} (coluna alvo: {target_column}) {id}"),
            SubmissionEvent::Succeeded {
                id,
                best_model,
                accuracy,
            } => format!(
                "Concluído: {best_model} ({}) {id}",
                crate::metrics::format_accuracy(*accuracy)
            ),
            SubmissionEvent::Failed { id, reason } => format!("{FAILURE_NOTICE} {reason} {id}"),
            SubmissionEvent::Rejected(reason) => reason.clone(),
            SubmissionEvent::Hint(msg) => msg.clone(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Flattens a classification-report dictionary into rows, class rows first and
/// `* avg` rows last. Scalar entries such as `accuracy` are skipped.
fn deserialize_report<'de, D>(deserializer: D) -> Result<Vec<ClassMetrics>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Map<String, Value>>::deserialize(deserializer)?
        .unwrap_or_default();
    let mut classes = Vec::new();
    let mut averages = Vec::new();
    for (label, value) in raw {
        let Value::Object(fields) = value else {
            continue;
        };
        let metric = |key: &str| fields.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        let row = ClassMetrics {
            precision: metric("precision"),
            recall: metric("recall"),
            f1_score: metric("f1-score"),
            support: metric("support"),
            label,
        };
        if row.label.ends_with(" avg") {
            averages.push(row);
        } else {
            classes.push(row);
        }
    }
    classes.extend(averages);
    Ok(classes)
}
