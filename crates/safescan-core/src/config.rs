//! Explicit configuration structs.
//!
//! Business logic receives these by value or reference; environment variables
//! are read only by the `from_env` constructors at process edges.

use std::time::Duration;

use crate::defaults;
use crate::error::{Error, Result};

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Extraction pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum accepted source image size in bytes.
    pub max_image_bytes: usize,
    /// Longest side of a normalized image, in pixels.
    pub max_image_dimension: u32,
    /// Soft budget for the whole step sequence.
    pub job_soft_budget: Duration,
    /// Soft deadline for one OCR/label provider call.
    pub provider_soft_deadline: Duration,
    /// Hard deadline for one OCR/label provider call.
    pub provider_hard_deadline: Duration,
    /// Deliveries before a ServiceUnavailable degrades instead of retrying.
    pub max_deliveries: u32,
    /// Object-store key prefix for normalized copies.
    pub normalized_key_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: defaults::MAX_IMAGE_BYTES,
            max_image_dimension: defaults::MAX_IMAGE_DIMENSION,
            job_soft_budget: Duration::from_secs(defaults::JOB_SOFT_BUDGET_SECS),
            provider_soft_deadline: Duration::from_secs(defaults::PROVIDER_SOFT_DEADLINE_SECS),
            provider_hard_deadline: Duration::from_secs(defaults::PROVIDER_HARD_DEADLINE_SECS),
            max_deliveries: defaults::JOB_MAX_DELIVERIES,
            normalized_key_prefix: defaults::NORMALIZED_KEY_PREFIX.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PIPELINE_MAX_IMAGE_BYTES` | `20971520` | Size ceiling for uploads |
    /// | `PIPELINE_MAX_IMAGE_DIMENSION` | `2048` | Longest normalized side |
    /// | `PIPELINE_JOB_BUDGET_SECS` | `120` | Soft budget per job |
    /// | `PIPELINE_PROVIDER_SOFT_SECS` | `30` | Provider soft deadline |
    /// | `PIPELINE_PROVIDER_HARD_SECS` | `45` | Provider hard deadline |
    /// | `PIPELINE_MAX_DELIVERIES` | `3` | Redeliveries on ServiceUnavailable |
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_image_bytes: env_parse("PIPELINE_MAX_IMAGE_BYTES").unwrap_or(d.max_image_bytes),
            max_image_dimension: env_parse("PIPELINE_MAX_IMAGE_DIMENSION")
                .unwrap_or(d.max_image_dimension),
            job_soft_budget: env_parse("PIPELINE_JOB_BUDGET_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.job_soft_budget),
            provider_soft_deadline: env_parse("PIPELINE_PROVIDER_SOFT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.provider_soft_deadline),
            provider_hard_deadline: env_parse("PIPELINE_PROVIDER_HARD_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.provider_hard_deadline),
            max_deliveries: env_parse::<u32>("PIPELINE_MAX_DELIVERIES")
                .unwrap_or(d.max_deliveries)
                .max(1),
            normalized_key_prefix: d.normalized_key_prefix,
        }
    }

    pub fn with_max_image_bytes(mut self, bytes: usize) -> Self {
        self.max_image_bytes = bytes;
        self
    }

    pub fn with_max_image_dimension(mut self, px: u32) -> Self {
        self.max_image_dimension = px;
        self
    }

    pub fn with_job_soft_budget(mut self, budget: Duration) -> Self {
        self.job_soft_budget = budget;
        self
    }

    /// Set provider soft and hard deadlines together.
    pub fn with_provider_deadlines(mut self, soft: Duration, hard: Duration) -> Self {
        self.provider_soft_deadline = soft;
        self.provider_hard_deadline = hard;
        self
    }

    pub fn with_max_deliveries(mut self, max: u32) -> Self {
        self.max_deliveries = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_image_bytes == 0 {
            return Err(Error::Config("max_image_bytes must be positive".into()));
        }
        if self.max_image_dimension == 0 {
            return Err(Error::Config("max_image_dimension must be positive".into()));
        }
        if self.provider_soft_deadline > self.provider_hard_deadline {
            return Err(Error::Config(
                "provider soft deadline exceeds hard deadline".into(),
            ));
        }
        if self.max_deliveries == 0 {
            return Err(Error::Config("max_deliveries must be at least 1".into()));
        }
        Ok(())
    }
}

/// Confidence scoring configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub high_threshold: f64,
    pub medium_threshold: f64,
    /// Barcode confidence weight relative to OCR (OCR weight is 1.0).
    pub barcode_weight: f64,
    /// Weight of the completeness ratio in the final score.
    pub completeness_weight: f64,
    /// Confidence ceiling for a symbol decode that yielded no product code.
    pub partial_decode_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            high_threshold: defaults::SCORE_HIGH_THRESHOLD,
            medium_threshold: defaults::SCORE_MEDIUM_THRESHOLD,
            barcode_weight: defaults::SCORE_BARCODE_WEIGHT,
            completeness_weight: defaults::SCORE_COMPLETENESS_WEIGHT,
            partial_decode_cap: defaults::SCORE_PARTIAL_DECODE_CAP,
        }
    }
}

impl ScoringConfig {
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SCORE_HIGH_THRESHOLD` | `0.85` |
    /// | `SCORE_MEDIUM_THRESHOLD` | `0.60` |
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            high_threshold: env_parse("SCORE_HIGH_THRESHOLD").unwrap_or(d.high_threshold),
            medium_threshold: env_parse("SCORE_MEDIUM_THRESHOLD").unwrap_or(d.medium_threshold),
            ..d
        }
    }

    pub fn with_thresholds(mut self, high: f64, medium: f64) -> Self {
        self.high_threshold = high;
        self.medium_threshold = medium;
        self
    }

    pub fn with_barcode_weight(mut self, weight: f64) -> Self {
        self.barcode_weight = weight;
        self
    }

    pub fn with_completeness_weight(mut self, weight: f64) -> Self {
        self.completeness_weight = weight;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.high_threshold) || !in_unit(self.medium_threshold) {
            return Err(Error::Config("thresholds must lie in [0, 1]".into()));
        }
        if self.medium_threshold >= self.high_threshold {
            return Err(Error::Config(
                "medium threshold must be below high threshold".into(),
            ));
        }
        if self.barcode_weight <= 0.0 {
            return Err(Error::Config("barcode weight must be positive".into()));
        }
        if !in_unit(self.completeness_weight) {
            return Err(Error::Config("completeness weight must lie in [0, 1]".into()));
        }
        if !in_unit(self.partial_decode_cap) {
            return Err(Error::Config("partial decode cap must lie in [0, 1]".into()));
        }
        Ok(())
    }
}

/// Verification session configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationConfig {
    /// Match score required to pass.
    pub pass_threshold: f64,
    /// Lifetime of an unconfirmed session.
    pub session_ttl: chrono::Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            pass_threshold: defaults::VERIFICATION_PASS_THRESHOLD,
            session_ttl: chrono::Duration::seconds(defaults::VERIFICATION_SESSION_TTL_SECS),
        }
    }
}

impl VerificationConfig {
    /// | Variable | Default |
    /// |----------|---------|
    /// | `VERIFICATION_PASS_THRESHOLD` | `0.6` |
    /// | `VERIFICATION_SESSION_TTL_SECS` | `900` |
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            pass_threshold: env_parse("VERIFICATION_PASS_THRESHOLD").unwrap_or(d.pass_threshold),
            session_ttl: env_parse::<i64>("VERIFICATION_SESSION_TTL_SECS")
                .map(chrono::Duration::seconds)
                .unwrap_or(d.session_ttl),
        }
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(Error::Config("pass threshold must lie in [0, 1]".into()));
        }
        if self.session_ttl <= chrono::Duration::zero() {
            return Err(Error::Config("session TTL must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(ScoringConfig::default().validate().is_ok());
        assert!(VerificationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pipeline_deadline_order_enforced() {
        let config = PipelineConfig::default()
            .with_provider_deadlines(Duration::from_secs(10), Duration::from_secs(5));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_pipeline_builders() {
        let config = PipelineConfig::default()
            .with_max_image_bytes(1024)
            .with_max_image_dimension(512)
            .with_max_deliveries(5);
        assert_eq!(config.max_image_bytes, 1024);
        assert_eq!(config.max_image_dimension, 512);
        assert_eq!(config.max_deliveries, 5);
    }

    #[test]
    fn test_scoring_threshold_order_enforced() {
        let config = ScoringConfig::default().with_thresholds(0.5, 0.7);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_verification_ttl_must_be_positive() {
        let config = VerificationConfig::default().with_session_ttl(chrono::Duration::zero());
        assert!(config.validate().is_err());
    }
}
