//! Text summary builder for CLI and TUI output.
//!
//! Formats a classification result into human-readable lines: model, accuracy,
//! one line per diagnostic image, and the per-class report when the service
//! sent one.

use crate::images::{self, ImageKind, SavedImage};
use crate::metrics;
use crate::model::ClassificationResult;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(
    result: &ClassificationResult,
    saved: &[SavedImage],
) -> TextSummary {
    let mut lines = Vec::new();

    if let Some(job_id) = result.job_id.as_deref() {
        lines.push(format!("Job: {job_id}"));
    }
    if let Some(problem_type) = result.problem_type.as_deref() {
        lines.push(format!("Tipo de problema: {problem_type}"));
    }
    lines.push(format!("Modelo: {}", result.best_model));
    lines.push(format!(
        "Acurácia: {}",
        metrics::format_accuracy(result.accuracy)
    ));

    for (kind, bytes) in images::result_images(result) {
        let info = images::inspect(bytes);
        let mut line = format!("{}: {}", kind.title(), info.describe());
        if let Some(saved) = saved.iter().find(|s| s.kind == kind) {
            line.push_str(&format!(" -> {}", saved.path.display()));
        }
        lines.push(line);
    }
    if result.feature_importance_image.is_none() {
        lines.push(format!(
            "{}: indisponível para este modelo",
            ImageKind::FeatureImportance.title()
        ));
    }

    if !result.report.is_empty() {
        lines.push("Relatório por classe:".to_string());
        lines.push(format!(
            "  {:<14} {:>9} {:>9} {:>9} {:>8}",
            "classe", "precisão", "recall", "f1", "suporte"
        ));
        for row in &result.report {
            lines.push(format!(
                "  {:<14} {:>9.2} {:>9.2} {:>9.2} {:>8}",
                row.label, row.precision, row.recall, row.f1_score, row.support
            ));
        }
    }

    let (hits, total) = metrics::prediction_hits(&result.predictions);
    if total > 0 {
        lines.push(format!(
            "Previsões: {hits}/{total} corretas ({})",
            metrics::format_accuracy(hits as f64 / total as f64)
        ));
    }

    TextSummary { lines }
}
