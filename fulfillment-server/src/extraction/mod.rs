//! Voucher Code Extraction
//!
//! A [`CodeExtractor`] turns an uploaded image into text candidates with a
//! confidence score. Which candidates become vouchers is decided here, by
//! [`harvest_codes`], independently of the extractor.

mod service;
pub mod validate;

pub use service::{DisabledExtractor, HttpOcrExtractor};
pub use validate::validate_code_format;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Candidates at or above this confidence are accepted as whole strings
pub const AUTO_ACCEPT_CONFIDENCE: f32 = 0.3;

/// Code shapes searched for inside noisy candidates, most specific first
///
/// Matches found this way must also contain a digit, so plain words such as
/// `PURCHASE` are not mistaken for codes.
static CODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b[A-Z0-9]{4}(?:-[A-Z0-9]{4}){2,3}\b",
        r"\b[A-Z0-9]{3}-[A-Z0-9]{3}-[A-Z0-9]{3}\b",
        r"\b[A-Z]{2,6}-[A-Z0-9]{4,10}\b",
        r"\b[A-Z0-9]{8,16}\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// One piece of recognised text
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
}

impl Candidate {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Text extraction is not configured")]
    NotConfigured,

    #[error("Invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("Extraction service error: {0}")]
    Service(String),
}

/// Image to text candidates
#[async_trait]
pub trait CodeExtractor: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Result<Vec<Candidate>, ExtractError>;
}

/// Pick valid voucher codes out of extraction candidates
///
/// Confident candidates that validate as a whole are taken as-is; the rest
/// are scanned for known code shapes. The result is deduplicated, keeping
/// first-seen order.
pub fn harvest_codes(candidates: &[Candidate]) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    let mut push = |code: String| {
        if !codes.contains(&code) {
            codes.push(code);
        }
    };

    for candidate in candidates {
        let text = candidate.text.trim().to_uppercase();
        if text.is_empty() {
            continue;
        }

        if candidate.confidence >= AUTO_ACCEPT_CONFIDENCE && validate_code_format(&text) {
            push(text);
            continue;
        }

        for pattern in CODE_PATTERNS.iter() {
            let found: Vec<String> = pattern
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .filter(|code| code.chars().any(|c| c.is_ascii_digit()))
                .filter(|code| validate_code_format(code))
                .collect();
            if !found.is_empty() {
                found.into_iter().for_each(&mut push);
                break;
            }
        }
    }

    codes
}

/// Run the extractor and keep the valid codes
pub async fn extract_codes(
    extractor: &dyn CodeExtractor,
    image: &[u8],
) -> Result<Vec<String>, ExtractError> {
    let candidates = extractor.extract(image).await?;
    let codes = harvest_codes(&candidates);
    tracing::info!(
        candidates = candidates.len(),
        accepted = codes.len(),
        "Extracted voucher codes from image"
    );
    Ok(codes)
}

/// Lines of an imported text file that pass the format validator
pub fn parse_text_file_lines(content: &str) -> (Vec<String>, usize) {
    let mut codes = Vec::new();
    let mut rejected = 0;
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let code = line.to_uppercase();
        if validate_code_format(&code) {
            codes.push(code);
        } else {
            rejected += 1;
        }
    }
    (codes, rejected)
}
