//! Google Cloud Vision `images:annotate` provider.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OcrError, RcptError};
use crate::models::config::OcrConfig;

use super::{validate_image, OcrProvider, RawOcrResult};

/// gRPC status code for INVALID_ARGUMENT.
const GRPC_INVALID_ARGUMENT: i64 = 3;
/// gRPC status code for RESOURCE_EXHAUSTED.
const GRPC_RESOURCE_EXHAUSTED: i64 = 8;

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
    image_context: ImageContext,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext {
    language_hints: Vec<&'static str>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AnnotateResponse {
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    text_annotations: Vec<TextAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FullTextAnnotation {
    text: String,
    pages: Vec<Page>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Page {
    confidence: Option<f32>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TextAnnotation {
    description: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiStatus,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ApiStatus {
    code: Option<i64>,
    message: String,
    status: Option<String>,
}

/// OCR through the Cloud Vision REST API.
pub struct VisionProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    max_image_bytes: usize,
}

impl VisionProvider {
    /// Create a provider with the default endpoint and limits.
    pub fn new(api_key: impl Into<String>) -> crate::error::Result<Self> {
        Self::with_config(api_key, &OcrConfig::default())
    }

    /// Create a provider reading the API key from `config.api_key_env`.
    pub fn from_config(config: &OcrConfig) -> crate::error::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RcptError::Config(format!("{} is not set", config.api_key_env))
        })?;
        Self::with_config(api_key, config)
    }

    /// Create a provider with an explicit key and the rest of `config`.
    pub fn with_config(api_key: impl Into<String>, config: &OcrConfig) -> crate::error::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RcptError::Config("Vision API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("rcpt/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| RcptError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            timeout: config.timeout(),
            max_image_bytes: config.max_image_bytes,
        })
    }

    /// Set the `images:annotate` endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(image: &[u8]) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: vec![Feature {
                    kind: "DOCUMENT_TEXT_DETECTION",
                }],
                image_context: ImageContext {
                    language_hints: vec!["en", "zh-TW"],
                },
            }],
        }
    }
}

#[async_trait]
impl OcrProvider for VisionProvider {
    async fn recognize(&self, image: &[u8]) -> Result<RawOcrResult, OcrError> {
        validate_image(image, self.max_image_bytes)?;

        debug!("Sending {} byte image to Vision", image.len());

        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let response = self
            .client
            .post(&url)
            .json(&Self::request_body(image))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::Timeout(self.timeout)
                } else {
                    // Drop the URL, it carries the key
                    OcrError::Unavailable(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OcrError::Unavailable(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &body));
        }

        parse_response(&body)
    }

    fn name(&self) -> &str {
        "vision"
    }
}

/// Turn an `images:annotate` response body into OCR text and confidence.
///
/// Confidence is the mean page confidence scaled to 0-100; 100 when text
/// came back without a confidence, 0 when no text came back.
pub fn parse_response(body: &str) -> Result<RawOcrResult, OcrError> {
    let parsed: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| OcrError::Unavailable(format!("malformed Vision response: {e}")))?;

    let Some(response) = parsed.responses.into_iter().next() else {
        return Ok(RawOcrResult::empty());
    };

    if let Some(error) = response.error {
        return Err(error_from_api_status(None, error));
    }

    let (text, confidences) = match response.full_text_annotation {
        Some(full) if !full.text.trim().is_empty() => {
            let confidences: Vec<f32> = full.pages.iter().filter_map(|p| p.confidence).collect();
            (full.text, confidences)
        }
        _ => {
            let text = response
                .text_annotations
                .into_iter()
                .next()
                .map(|a| a.description)
                .unwrap_or_default();
            (text, Vec::new())
        }
    };

    if text.trim().is_empty() {
        return Ok(RawOcrResult::empty());
    }

    let confidence = if confidences.is_empty() {
        100.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32 * 100.0
    };

    Ok(RawOcrResult::new(text.trim_end(), confidence.clamp(0.0, 100.0)))
}

fn error_from_status(http_status: u16, body: &str) -> OcrError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => error_from_api_status(Some(http_status), envelope.error),
        Err(_) => error_from_api_status(
            Some(http_status),
            ApiStatus {
                message: body.chars().take(200).collect(),
                ..Default::default()
            },
        ),
    }
}

fn error_from_api_status(http_status: Option<u16>, error: ApiStatus) -> OcrError {
    let status = error.status.as_deref().unwrap_or("");
    let message = if error.message.is_empty() {
        match http_status {
            Some(code) => format!("HTTP {code}"),
            None => "unknown error".to_string(),
        }
    } else {
        error.message
    };

    if http_status == Some(429) || status == "RESOURCE_EXHAUSTED" || error.code == Some(GRPC_RESOURCE_EXHAUSTED) {
        OcrError::QuotaExceeded(message)
    } else if http_status == Some(400) || status == "INVALID_ARGUMENT" || error.code == Some(GRPC_INVALID_ARGUMENT) {
        OcrError::InvalidImage(message)
    } else {
        OcrError::Unavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_text() {
        let body = r#"{"responses":[{"fullTextAnnotation":{"text":"STARBUCKS\n2024-03-15\n","pages":[{"confidence":0.9},{"confidence":0.7}]}}]}"#;
        let result = parse_response(body).unwrap();

        assert_eq!(result.text, "STARBUCKS\n2024-03-15");
        assert!((result.confidence - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_text_annotations_fallback() {
        let body = r#"{"responses":[{"textAnnotations":[{"description":"7-ELEVEN\nTotal 45"},{"description":"7-ELEVEN"}]}]}"#;
        let result = parse_response(body).unwrap();

        assert_eq!(result.text, "7-ELEVEN\nTotal 45");
        assert_eq!(result.confidence, 100.0);
    }

    #[test]
    fn test_parse_no_text() {
        assert_eq!(parse_response(r#"{"responses":[{}]}"#).unwrap(), RawOcrResult::empty());
        assert_eq!(parse_response(r#"{"responses":[]}"#).unwrap(), RawOcrResult::empty());
    }

    #[test]
    fn test_parse_embedded_error() {
        let body = r#"{"responses":[{"error":{"code":8,"message":"Quota exceeded for quota metric"}}]}"#;
        assert!(matches!(parse_response(body), Err(OcrError::QuotaExceeded(_))));

        let body = r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#;
        assert_eq!(
            parse_response(body),
            Err(OcrError::InvalidImage("Bad image data.".to_string()))
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_response("<html>"), Err(OcrError::Unavailable(_))));
    }

    #[test]
    fn test_http_error_mapping() {
        let body = r#"{"error":{"code":429,"message":"Too many requests","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            error_from_status(429, body),
            OcrError::QuotaExceeded("Too many requests".to_string())
        );

        let body = r#"{"error":{"code":400,"message":"Request must specify image","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(error_from_status(400, body), OcrError::InvalidImage(_)));

        assert_eq!(
            error_from_status(503, ""),
            OcrError::Unavailable("HTTP 503".to_string())
        );
        assert_eq!(
            error_from_status(502, "Bad Gateway"),
            OcrError::Unavailable("Bad Gateway".to_string())
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(VisionProvider::request_body(b"abc")).unwrap();
        let request = &body["requests"][0];

        assert_eq!(request["image"]["content"], "YWJj");
        assert_eq!(request["features"][0]["type"], "DOCUMENT_TEXT_DETECTION");
        assert_eq!(request["imageContext"]["languageHints"][1], "zh-TW");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(VisionProvider::new("  "), Err(RcptError::Config(_))));
    }
}
