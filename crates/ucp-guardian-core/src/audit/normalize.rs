use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::{null_as_default, Artifacts, AuditResult, AuditStatus, Issue, Scores};

const SCAN_ID_LEN: usize = 7;

/// Which attempt produced a payload; selects the generated scan id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Primary,
    Fallback,
}

impl AttemptKind {
    fn scan_id_prefix(self) -> &'static str {
        match self {
            Self::Primary => "gen",
            Self::Fallback => "fallback",
        }
    }
}

/// Audit fields as decoded from model output, before request metadata is attached.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPayload {
    #[serde(default)]
    pub scan_id: Option<String>,
    #[serde(default)]
    pub status: AuditStatus,
    pub scores: Scores,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Issue>,
    pub artifacts: Artifacts,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("model output does not match the audit schema: {0}")]
    Schema(#[from] serde_json::Error),
}

impl AuditPayload {
    /// Decode an extracted object, clamping scores and coercing enumerations.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Attach request-derived fields to a decoded payload.
///
/// `url` always comes from the request rather than anything the model echoed.
pub fn normalize(
    payload: AuditPayload,
    target_url: &str,
    model_used: &str,
    attempt: AttemptKind,
) -> AuditResult {
    let scan_id = payload
        .scan_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| generate_scan_id(attempt));

    AuditResult {
        scan_id,
        url: target_url.to_string(),
        status: payload.status,
        scores: payload.scores,
        issues: payload.issues,
        artifacts: payload.artifacts,
        model_used: Some(model_used.to_string()),
    }
}

fn generate_scan_id(attempt: AttemptKind) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SCAN_ID_LEN)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("{}-{}", attempt.scan_id_prefix(), suffix)
}
