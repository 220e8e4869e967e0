//! HTTP client for the food analysis service
//!
//! Photos are posted as `multipart/form-data` (field `image`). The service
//! answers with `{ results: [{ ingredient, quantity, calories }], totalCalories }`
//! where quantities are usually strings such as `"100g"`.

use async_trait::async_trait;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AdapterResult, AnalysisReport, ImageAnalyzer};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{AnalysisConfig, RecoveryConfig};
use crate::errors::AdapterError;
use crate::ledger::FoodEntry;

const UPLOAD_FIELD: &str = "image";
const UPLOAD_FILE_NAME: &str = "image.jpg";

lazy_static! {
    static ref LEADING_NUMBER: Regex =
        Regex::new(r"^\s*(-?\d+(?:\.\d+)?)").expect("leading number pattern should be valid");
}

/// Check if image data is in a format the analysis service accepts
pub fn is_supported_image(bytes: &[u8]) -> bool {
    match image::guess_format(bytes) {
        Ok(format) => matches!(
            format,
            image::ImageFormat::Png
                | image::ImageFormat::Jpeg
                | image::ImageFormat::WebP
                | image::ImageFormat::Bmp
                | image::ImageFormat::Gif
                | image::ImageFormat::Tiff
        ),
        Err(_) => false,
    }
}

/// Delay before retry number `attempt` (1-based): exponential backoff capped at
/// `max_retry_delay_ms`, plus up to 10% random jitter
pub fn calculate_retry_delay(attempt: u32, config: &RecoveryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = config
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(config.max_retry_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=delay / 10);
    delay + jitter
}

/// Raw answer of the analysis service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(default)]
    pub results: Vec<AnalysisItem>,
    #[serde(default)]
    pub total_calories: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisItem {
    pub ingredient: String,
    #[serde(default)]
    pub quantity: Value,
    #[serde(default)]
    pub calories: Value,
}

fn leading_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => LEADING_NUMBER
            .captures(s)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    }
}

impl AnalysisResponse {
    /// Normalize the service's loosely typed lines into ledger entries.
    ///
    /// Lines without a positive quantity are dropped; unreadable or negative
    /// calories count as 0.
    pub fn into_report(self) -> AnalysisReport {
        let mut entries = Vec::with_capacity(self.results.len());

        for item in self.results {
            let Some(quantity) = leading_number(&item.quantity).filter(|q| *q > 0.0) else {
                warn!(ingredient = %item.ingredient, quantity = %item.quantity, "Dropping analysis line without quantity");
                continue;
            };
            let calories = match leading_number(&item.calories) {
                Some(c) if c.is_finite() && c >= 0.0 => c,
                _ => {
                    warn!(ingredient = %item.ingredient, calories = %item.calories, "Invalid calorie value, using 0");
                    0.0
                }
            };
            match FoodEntry::new(item.ingredient, quantity, calories) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "Dropping invalid analysis line"),
            }
        }

        let total_calories = leading_number(&self.total_calories)
            .unwrap_or_else(|| entries.iter().map(|e| e.calories).sum());

        AnalysisReport {
            entries,
            total_calories,
        }
    }
}

/// `ImageAnalyzer` backed by the HTTP analysis endpoint
pub struct HttpImageAnalyzer {
    client: reqwest::Client,
    config: AnalysisConfig,
    breaker: CircuitBreaker,
}

impl HttpImageAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        let breaker = CircuitBreaker::new(&config.recovery);
        Self {
            client: reqwest::Client::new(),
            config,
            breaker,
        }
    }

    async fn post_once(&self, image: Vec<u8>) -> AdapterResult<AnalysisResponse> {
        let part = Part::bytes(image)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("image/jpeg")
            .map_err(|e| AdapterError::Analysis(e.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD, part);
        let timeout = self.config.recovery.operation_timeout();

        let request = async {
            let response = self
                .client
                .post(&self.config.endpoint)
                .multipart(form)
                .send()
                .await
                .map_err(|e| AdapterError::Analysis(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AdapterError::Analysis(format!(
                    "analysis service answered {status}"
                )));
            }

            response
                .json::<AnalysisResponse>()
                .await
                .map_err(|e| AdapterError::Analysis(format!("invalid analysis response: {e}")))
        };

        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout(timeout.as_secs())),
        }
    }
}

#[async_trait]
impl ImageAnalyzer for HttpImageAnalyzer {
    async fn analyze(&self, image: Vec<u8>) -> AdapterResult<AnalysisReport> {
        if image.len() > self.config.max_image_size || !is_supported_image(&image) {
            warn!(size = image.len(), "Rejecting image before upload");
            return Err(AdapterError::UnsupportedImage);
        }

        if self.breaker.is_open() {
            warn!("Circuit breaker open, skipping analysis request");
            return Err(AdapterError::CircuitOpen);
        }

        let recovery = &self.config.recovery;
        let mut attempt = 0;
        loop {
            match self.post_once(image.clone()).await {
                Ok(response) => {
                    self.breaker.record_success();
                    let report = response.into_report();
                    info!(entries = report.entries.len(), "Image analysis completed");
                    return Ok(report);
                }
                Err(e) => {
                    self.breaker.record_failure();
                    if !e.is_transient() || attempt >= recovery.max_retries || self.breaker.is_open() {
                        warn!(error = %e, attempts = attempt + 1, "Image analysis failed");
                        return Err(e);
                    }
                    attempt += 1;
                    let delay = calculate_retry_delay(attempt, recovery);
                    debug!(error = %e, attempt, delay_ms = delay, "Retrying image analysis");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_supported_formats() {
        assert!(is_supported_image(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]));
        assert!(is_supported_image(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]));
        assert!(!is_supported_image(b"definitely not an image"));
        assert!(!is_supported_image(&[]));
    }

    #[test]
    fn test_calculate_retry_delay() {
        let recovery = RecoveryConfig::default();

        let delay1 = calculate_retry_delay(1, &recovery);
        assert!(delay1 >= recovery.base_retry_delay_ms);

        let delay2 = calculate_retry_delay(2, &recovery);
        assert!(delay2 >= recovery.base_retry_delay_ms * 2);

        let delay_max = calculate_retry_delay(30, &recovery);
        assert!(delay_max <= recovery.max_retry_delay_ms + recovery.max_retry_delay_ms / 10);
    }

    #[test]
    fn test_response_normalization() {
        let response: AnalysisResponse = serde_json::from_value(json!({
            "results": [
                { "ingredient": "rice", "quantity": "100g", "calories": 130 },
                { "ingredient": "sauce", "quantity": 50, "calories": "not known" },
                { "ingredient": "air", "quantity": "some", "calories": 1 },
                { "ingredient": "salt", "quantity": "0g", "calories": 0 }
            ],
            "totalCalories": 131
        }))
        .unwrap();

        let report = response.into_report();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0], FoodEntry::new("rice", 100.0, 130.0).unwrap());
        assert_eq!(report.entries[1].calories, 0.0);
        assert_eq!(report.total_calories, 131.0);
    }

    #[test]
    fn test_missing_total_is_summed() {
        let response: AnalysisResponse = serde_json::from_value(json!({
            "results": [{ "ingredient": "apple", "quantity": "150 g", "calories": "95.5" }]
        }))
        .unwrap();
        let report = response.into_report();
        assert_eq!(report.total_calories, 95.5);
    }
}
