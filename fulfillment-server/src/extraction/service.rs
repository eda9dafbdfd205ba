//! Extractor implementations

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use serde::Deserialize;

use super::{Candidate, CodeExtractor, ExtractError};

/// Contrast boost applied before recognition
const CONTRAST: f32 = 20.0;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OcrResponse {
    Candidates(Vec<Candidate>),
    Wrapped { results: Vec<Candidate> },
}

/// Extractor backed by an OCR service
///
/// The image is converted to high-contrast grayscale PNG and posted as the
/// request body; the service answers with `[{text, confidence}]` (optionally
/// wrapped in `{results: [...]}`).
pub struct HttpOcrExtractor {
    client: Client,
    url: String,
}

impl HttpOcrExtractor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractError::Service(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

/// Grayscale and contrast-boost an image for recognition
pub fn preprocess(image: &[u8]) -> Result<Vec<u8>, ExtractError> {
    let img = image::load_from_memory(image)?;
    let gray = image::imageops::contrast(&img.to_luma8(), CONTRAST);
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(gray).write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

#[async_trait]
impl CodeExtractor for HttpOcrExtractor {
    async fn extract(&self, image: &[u8]) -> Result<Vec<Candidate>, ExtractError> {
        let body = preprocess(image)?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(body)
            .send()
            .await
            .map_err(|e| ExtractError::Service(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Service(format!("status {status}: {body}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExtractError::Service(e.to_string()))?;
        let parsed: OcrResponse = serde_json::from_str(&text)
            .map_err(|e| ExtractError::Service(format!("invalid response: {e}")))?;

        Ok(match parsed {
            OcrResponse::Candidates(candidates) | OcrResponse::Wrapped { results: candidates } => {
                candidates
            }
        })
    }
}

/// Used when no OCR service is configured
pub struct DisabledExtractor;

#[async_trait]
impl CodeExtractor for DisabledExtractor {
    async fn extract(&self, _image: &[u8]) -> Result<Vec<Candidate>, ExtractError> {
        Err(ExtractError::NotConfigured)
    }
}
