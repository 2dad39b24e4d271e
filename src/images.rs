//! Diagnostic images embedded in a classification result.
//!
//! The service ships each image as base64 text. Decoding happens while the
//! response is parsed, so a result only exists once every image decoded.

use crate::model::ClassificationResult;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageKind {
    ConfusionMatrix,
    FeatureImportance,
    ShapSummary,
}

impl ImageKind {
    pub fn title(self) -> &'static str {
        match self {
            ImageKind::ConfusionMatrix => "Matriz de Confusão",
            ImageKind::FeatureImportance => "Importância das Features",
            ImageKind::ShapSummary => "Resumo SHAP",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ImageKind::ConfusionMatrix => "confusion_matrix.png",
            ImageKind::FeatureImportance => "feature_importance.png",
            ImageKind::ShapSummary => "shap_summary.png",
        }
    }
}

/// Images to show for a result, in display order. Optional images only when present.
pub fn result_images(result: &ClassificationResult) -> Vec<(ImageKind, &Bytes)> {
    let mut images = vec![(ImageKind::ConfusionMatrix, &result.confusion_matrix_image)];
    if let Some(importance) = result.feature_importance_image.as_ref() {
        images.push((ImageKind::FeatureImportance, importance));
    }
    if let Some(shap) = result.shap_summary_image.as_ref() {
        images.push((ImageKind::ShapSummary, shap));
    }
    images
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: Option<ImageFormat>,
    pub dimensions: Option<(u32, u32)>,
    pub len: usize,
}

impl ImageInfo {
    pub fn describe(&self) -> String {
        let size = crate::metrics::format_bytes(self.len as u64);
        let format = self
            .format
            .and_then(|f| f.extensions_str().first().copied())
            .map(|ext| ext.to_uppercase());
        match (format, self.dimensions) {
            (Some(fmt), Some((w, h))) => format!("{fmt} {w}x{h}, {size}"),
            (Some(fmt), None) => format!("{fmt}, {size}"),
            _ => size,
        }
    }
}

/// Sniff format and dimensions without decoding pixel data.
pub fn inspect(bytes: &[u8]) -> ImageInfo {
    let format = image::guess_format(bytes).ok();
    let dimensions = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());
    ImageInfo {
        format,
        dimensions,
        len: bytes.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub kind: ImageKind,
    pub path: PathBuf,
}

/// Write every image of `result` into `dir`, creating it if needed.
pub fn save_images(dir: &Path, result: &ClassificationResult) -> Result<Vec<SavedImage>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create image directory {}", dir.display()))?;
    let mut saved = Vec::new();
    for (kind, bytes) in result_images(result) {
        let path = dir.join(kind.file_name());
        std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        saved.push(SavedImage { kind, path });
    }
    Ok(saved)
}

/// Decode base64 image text. A `data:<mime>;base64,` prefix is accepted.
pub fn decode_base64(text: &str) -> Result<Bytes, base64::DecodeError> {
    let text = text.trim();
    let payload = match text.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => text,
    };
    STANDARD.decode(payload).map(Bytes::from)
}

pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.trim().is_empty() {
            return Err(D::Error::custom("image data is empty"));
        }
        super::decode_base64(&text)
            .map_err(|e| D::Error::custom(format!("invalid base64 image data: {e}")))
    }
}

pub(crate) mod base64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Bytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    /// Absent, null and empty strings all mean "no image".
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Bytes>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        match text {
            Some(text) if !text.trim().is_empty() => super::decode_base64(&text)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid base64 image data: {e}"))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png fixture");
    buf
}
