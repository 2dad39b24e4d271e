//! Post-submission processing.
//!
//! Turns a successful result into presentation lines and, when asked, writes
//! the decoded images to disk.

use crate::images::{self, SavedImage};
use crate::model::ClassificationResult;
use crate::text_summary::build_text_summary;
use std::path::Path;
use tracing::warn;

/// Result of post-submission processing, ready for presentation layers.
pub(crate) struct ProcessedResult {
    pub lines: Vec<String>,
    pub saved_images: Vec<SavedImage>,
    pub export_messages: Vec<String>,
}

pub(crate) fn process_result(
    image_dir: Option<&Path>,
    result: &ClassificationResult,
) -> ProcessedResult {
    let mut export_messages = Vec::new();
    let saved_images = match image_dir {
        Some(dir) => match images::save_images(dir, result) {
            Ok(saved) => {
                export_messages.push(format!(
                    "Imagens salvas em {} ({})",
                    dir.display(),
                    saved.len()
                ));
                saved
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %format!("{e:#}"), "saving images failed");
                export_messages.push(format!("Falha ao salvar imagens: {e:#}"));
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let lines = build_text_summary(result, &saved_images).lines;
    ProcessedResult {
        lines,
        saved_images,
        export_messages,
    }
}
