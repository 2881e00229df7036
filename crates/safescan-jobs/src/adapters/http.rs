//! HTTP clients for OCR, label, and symbol-reading services.
//!
//! Each service accepts `POST {base_url}/{endpoint}` with a JSON body
//! `{"image": "<base64>"}`:
//!
//! | Endpoint | Response |
//! |----------|----------|
//! | `/ocr` | `{"text": "...", "confidence": 0.0..1.0}` |
//! | `/labels` | `{"labels": [{"name", "confidence"}], "categories": [...]}` |
//! | `/symbols` | `{"symbols": [{"payload", "symbology"?}]}` |

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use safescan_core::{
    Error, LabelBackend, LabelOutput, OcrBackend, OcrOutput, Result, SymbolPayload, SymbolReader,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one HTTP extraction service.
#[derive(Debug, Clone)]
pub struct HttpServiceConfig {
    pub base_url: String,
    /// Provider name reported in results and logs.
    pub name: String,
    pub timeout: Duration,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
}

impl HttpServiceConfig {
    pub fn new(base_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            name: name.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_key: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Read `{PREFIX}_URL`, `{PREFIX}_NAME`, `{PREFIX}_TIMEOUT_SECS` and
    /// `{PREFIX}_API_KEY`. Returns `None` when the URL is unset or empty.
    ///
    /// e.g. `OCR_SERVICE_URL=http://ocr:8080`.
    pub fn from_env(prefix: &str) -> Option<Self> {
        let url = std::env::var(format!("{}_URL", prefix)).ok()?;
        if url.trim().is_empty() {
            return None;
        }
        let name = std::env::var(format!("{}_NAME", prefix))
            .unwrap_or_else(|_| prefix.to_lowercase());
        let mut config = Self::new(url.trim(), name);
        if let Some(secs) = std::env::var(format!("{}_TIMEOUT_SECS", prefix))
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(key) = std::env::var(format!("{}_API_KEY", prefix)) {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }
        Some(config)
    }
}

#[derive(Serialize)]
struct ImageRequest {
    image: String, // base64 encoded
}

#[derive(Deserialize)]
struct OcrResponse {
    text: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Deserialize)]
struct SymbolsResponse {
    #[serde(default)]
    symbols: Vec<SymbolPayload>,
}

/// Shared request path: base64 body, status classification, JSON decode.
struct ServiceClient {
    config: HttpServiceConfig,
    client: reqwest::Client,
}

impl ServiceClient {
    fn new(config: HttpServiceConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn post_image<T: DeserializeOwned>(&self, endpoint: &str, image: &[u8]) -> Result<T> {
        let name = &self.config.name;
        let url = format!("{}/{}", self.config.base_url, endpoint);
        let body = ImageRequest {
            image: base64::engine::general_purpose::STANDARD.encode(image),
        };

        let mut request = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.config.timeout);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::ServiceUnavailable(format!("{} timed out", name))
            } else {
                Error::ServiceUnavailable(format!("{} request failed: {}", name, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("{} returned {}: {}", name, status, text);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                Error::ServiceUnavailable(message)
            } else {
                Error::Request(message)
            });
        }

        debug!(provider = %name, endpoint, "Service call succeeded");
        response.json::<T>().await.map_err(|e| {
            Error::Serialization(format!("Failed to parse {} response: {}", name, e))
        })
    }
}

/// OCR over HTTP.
pub struct HttpOcrBackend {
    inner: ServiceClient,
}

impl HttpOcrBackend {
    pub fn new(config: HttpServiceConfig) -> Self {
        Self {
            inner: ServiceClient::new(config),
        }
    }

    /// From `OCR_SERVICE_*` variables; `None` if `OCR_SERVICE_URL` is unset.
    pub fn from_env() -> Option<Self> {
        HttpServiceConfig::from_env("OCR_SERVICE").map(Self::new)
    }
}

#[async_trait]
impl OcrBackend for HttpOcrBackend {
    async fn extract_text(&self, image: &[u8]) -> Result<OcrOutput> {
        let response: OcrResponse = self.inner.post_image("ocr", image).await?;
        Ok(OcrOutput {
            text: response.text,
            confidence: response.confidence.clamp(0.0, 1.0),
            provider: self.inner.config.name.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.inner.config.name
    }
}

/// Label detection over HTTP.
pub struct HttpLabelBackend {
    inner: ServiceClient,
}

impl HttpLabelBackend {
    pub fn new(config: HttpServiceConfig) -> Self {
        Self {
            inner: ServiceClient::new(config),
        }
    }

    /// From `LABEL_SERVICE_*` variables.
    pub fn from_env() -> Option<Self> {
        HttpServiceConfig::from_env("LABEL_SERVICE").map(Self::new)
    }
}

#[async_trait]
impl LabelBackend for HttpLabelBackend {
    async fn extract_labels(&self, image: &[u8]) -> Result<LabelOutput> {
        self.inner.post_image("labels", image).await
    }

    fn name(&self) -> &str {
        &self.inner.config.name
    }
}

/// Barcode/QR symbol reading over HTTP.
pub struct HttpSymbolReader {
    inner: ServiceClient,
}

impl HttpSymbolReader {
    pub fn new(config: HttpServiceConfig) -> Self {
        Self {
            inner: ServiceClient::new(config),
        }
    }

    /// From `SYMBOL_SERVICE_*` variables.
    pub fn from_env() -> Option<Self> {
        HttpServiceConfig::from_env("SYMBOL_SERVICE").map(Self::new)
    }
}

#[async_trait]
impl SymbolReader for HttpSymbolReader {
    async fn read_symbols(&self, image: &[u8]) -> Result<Vec<SymbolPayload>> {
        let response: SymbolsResponse = self.inner.post_image("symbols", image).await?;
        Ok(response.symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = HttpServiceConfig::new("http://ocr:8080/", "ocr");
        assert_eq!(config.base_url, "http://ocr:8080");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_image_request_serialization() {
        let req = ImageRequest {
            image: base64::engine::general_purpose::STANDARD.encode(b"hi"),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["image"], "aGk=");
    }

    #[test]
    fn test_ocr_response_confidence_defaults() {
        let response: OcrResponse = serde_json::from_str(r#"{"text": "LOT 1"}"#).unwrap();
        assert_eq!(response.text, "LOT 1");
        assert_eq!(response.confidence, 0.0);
    }
}
