//! Application configuration

use crate::auto_detect::DEFAULT_PERIOD_MS;
use crate::capture_orchestrator::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::frame_sampler::DEFAULT_JPEG_QUALITY;
use crate::media_device::FacingMode;
use crate::models::ModelSelector;
use crate::prediction_client::{PredictionClient, DEFAULT_TIMEOUT_SECS};
use std::str::FromStr;
use std::time::Duration;

/// Default inference service
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Inference service base URL
    pub api_url: String,
    /// Base URL processed videos are served from
    pub media_url: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Auto-detect period
    pub auto_detect_interval: Duration,
    /// Still-frame JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Model selected at startup
    pub default_model: ModelSelector,
}

impl AppConfig {
    /// Read from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("PREDICT_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let media_url = lookup("PREDICT_MEDIA_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| api_url.clone());

        Self {
            api_url,
            media_url,
            request_timeout: Duration::from_secs(parse_or(&lookup, "PREDICT_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            auto_detect_interval: Duration::from_millis(parse_or(
                &lookup,
                "AUTO_DETECT_INTERVAL_MS",
                DEFAULT_PERIOD_MS,
            )),
            jpeg_quality: parse_or(&lookup, "JPEG_QUALITY", DEFAULT_JPEG_QUALITY),
            default_model: parse_or(&lookup, "PREDICT_MODEL", ModelSelector::default()),
        }
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "JPEG_QUALITY must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.auto_detect_interval.is_zero() {
            return Err(Error::Config(
                "AUTO_DETECT_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "PREDICT_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Orchestrator settings derived from this configuration
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            auto_detect_period: self.auto_detect_interval,
            jpeg_quality: self.jpeg_quality,
            facing_modes: FacingMode::PREFERENCE.to_vec(),
            default_model: self.default_model,
        }
    }

    /// HTTP client for the configured service
    pub fn prediction_client(&self) -> Result<PredictionClient> {
        Ok(PredictionClient::with_timeout(&self.api_url, self.request_timeout)?
            .with_media_base(&self.media_url))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = key, value = %raw, error = %e, "Invalid setting, using default");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.media_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.auto_detect_interval, Duration::from_millis(500));
        assert_eq!(config.jpeg_quality, 95);
        assert_eq!(config.default_model, ModelSelector::Primary);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PREDICT_API_URL", "http://infer:8000"),
            ("AUTO_DETECT_INTERVAL_MS", "250"),
            ("PREDICT_MODEL", "old"),
            ("JPEG_QUALITY", "80"),
        ]));
        assert_eq!(config.api_url, "http://infer:8000");
        assert_eq!(config.media_url, "http://infer:8000");
        assert_eq!(config.auto_detect_interval, Duration::from_millis(250));
        assert_eq!(config.default_model, ModelSelector::Alternate);

        let orch = config.orchestrator();
        assert_eq!(orch.auto_detect_period, Duration::from_millis(250));
        assert_eq!(orch.jpeg_quality, 80);
        assert_eq!(orch.facing_modes[0], FacingMode::Environment);
    }

    #[test]
    fn test_garbage_falls_back() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PREDICT_TIMEOUT_SECS", "soon"),
            ("PREDICT_MODEL", "newest"),
        ]));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.default_model, ModelSelector::Primary);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = AppConfig::from_lookup(lookup(&[("JPEG_QUALITY", "0")]));
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = AppConfig::from_lookup(lookup(&[("AUTO_DETECT_INTERVAL_MS", "0")]));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_separate_media_base() {
        let config = AppConfig::from_lookup(lookup(&[("PREDICT_MEDIA_URL", "http://cdn.local")]));
        let client = config.prediction_client().unwrap();
        assert_eq!(client.video_url("a.mp4"), "http://cdn.local/video/a.mp4");
    }
}
