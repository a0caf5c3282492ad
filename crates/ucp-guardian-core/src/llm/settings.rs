use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Endpoint and model configuration for the audit pipeline.
///
/// The API key is deliberately absent: it is supplied per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianSettings {
    pub endpoint: String,
    pub model: String,
    pub fallback_model: String,
    pub patch_model: String,
    pub timeout: Duration,
}

impl Default for GuardianSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            patch_model: DEFAULT_FALLBACK_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GuardianSettings {
    pub const API_KEY_ENV: &'static str = "UCP_GUARDIAN_API_KEY";
    const ENDPOINT_ENV: &'static str = "UCP_GUARDIAN_ENDPOINT";
    const MODEL_ENV: &'static str = "UCP_GUARDIAN_MODEL";
    const FALLBACK_MODEL_ENV: &'static str = "UCP_GUARDIAN_FALLBACK_MODEL";
    const PATCH_MODEL_ENV: &'static str = "UCP_GUARDIAN_PATCH_MODEL";
    const TIMEOUT_ENV: &'static str = "UCP_GUARDIAN_TIMEOUT";

    /// Load settings from environment variables on top of the defaults.
    ///
    /// * `UCP_GUARDIAN_ENDPOINT` — Base URL of the Gemini API.
    /// * `UCP_GUARDIAN_MODEL` — Primary audit model.
    /// * `UCP_GUARDIAN_FALLBACK_MODEL` — Model used when the primary attempt fails.
    /// * `UCP_GUARDIAN_PATCH_MODEL` — Model used for patch snippets.
    /// * `UCP_GUARDIAN_TIMEOUT` — Transport timeout, e.g. `90s` or `2m`.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env(std::env::vars().collect())
    }

    /// Overlay values from an environment-style map; blank values are ignored.
    pub fn merge_env(mut self, vars: HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(endpoint) = get(Self::ENDPOINT_ENV) {
            self.endpoint = endpoint;
        }
        if let Some(model) = get(Self::MODEL_ENV) {
            self.model = model;
        }
        if let Some(model) = get(Self::FALLBACK_MODEL_ENV) {
            self.fallback_model = model;
        }
        if let Some(model) = get(Self::PATCH_MODEL_ENV) {
            self.patch_model = model;
        }
        if let Some(raw) = get(Self::TIMEOUT_ENV) {
            self.timeout = parse_timeout(&raw)
                .with_context(|| format!("invalid {} value `{raw}`", Self::TIMEOUT_ENV))?;
        }
        Ok(self)
    }

    /// Read the API key from the environment, if set and non-blank.
    pub fn api_key_from_env() -> Option<String> {
        std::env::var(Self::API_KEY_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Accepts humantime durations (`90s`, `2m`) or a bare number of seconds.
pub fn parse_timeout(raw: &str) -> Result<Duration> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    Ok(humantime::parse_duration(raw)?)
}
