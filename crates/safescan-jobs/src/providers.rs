//! Ordered provider chains for the OCR and label boundaries.
//!
//! Each chain tries its providers in order and returns the first success.
//! A chain is itself a backend, so the pipeline never knows how many
//! providers stand behind it.

use std::sync::Arc;

use async_trait::async_trait;
use safescan_core::{
    Error, LabelBackend, LabelOutput, OcrBackend, OcrOutput, Result, SymbolPayload, SymbolReader,
};
use tracing::{debug, warn};

/// OCR providers tried in order until one succeeds.
#[derive(Clone, Default)]
pub struct OcrChain {
    providers: Vec<Arc<dyn OcrBackend>>,
}

impl OcrChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider at the lowest priority.
    pub fn with_provider(mut self, provider: Arc<dyn OcrBackend>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl OcrBackend for OcrChain {
    async fn extract_text(&self, image: &[u8]) -> Result<OcrOutput> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.extract_text(image).await {
                Ok(output) => {
                    debug!(provider = provider.name(), "OCR provider succeeded");
                    return Ok(output);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "OCR provider failed, trying next");
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(exhausted("OCR", failures))
    }

    fn name(&self) -> &str {
        "ocr_chain"
    }
}

/// Label providers tried in order until one succeeds.
#[derive(Clone, Default)]
pub struct LabelChain {
    providers: Vec<Arc<dyn LabelBackend>>,
}

impl LabelChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn LabelBackend>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl LabelBackend for LabelChain {
    async fn extract_labels(&self, image: &[u8]) -> Result<LabelOutput> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.extract_labels(image).await {
                Ok(output) => return Ok(output),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Label provider failed, trying next");
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(exhausted("label", failures))
    }

    fn name(&self) -> &str {
        "label_chain"
    }
}

/// Symbol reader for deployments without barcode hardware or service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbolReader;

#[async_trait]
impl SymbolReader for NoSymbolReader {
    async fn read_symbols(&self, _image: &[u8]) -> Result<Vec<SymbolPayload>> {
        Ok(Vec::new())
    }
}

fn exhausted(kind: &str, failures: Vec<String>) -> Error {
    if failures.is_empty() {
        Error::ServiceUnavailable(format!("no {} providers configured", kind))
    } else {
        Error::ServiceUnavailable(format!("all {} providers failed: {}", kind, failures.join("; ")))
    }
}
