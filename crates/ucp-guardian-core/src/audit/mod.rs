use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::credential::Credential;
use crate::llm::SafetySetting;
use crate::report::{classify_failure, FailureClass};

pub mod extract;
pub mod normalize;
pub mod prompt;
pub mod requester;

/// A single user-initiated scan. Never persisted.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub target_url: String,
    pub model_id: String,
    pub credential: Credential,
}

/// Lifecycle of an audit as reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum AuditStatus {
    Processing,
    #[default]
    Completed,
    Failed,
}

impl From<String> for AuditStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "processing" => Self::Processing,
            "failed" => Self::Failed,
            _ => Self::Completed,
        }
    }
}

impl From<Option<String>> for AuditStatus {
    fn from(value: Option<String>) -> Self {
        value.map(Self::from).unwrap_or_default()
    }
}

/// Issue severity. Values outside the closed set are read as `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "warning" => Self::Warning,
            _ => Self::Info,
        }
    }
}

impl From<Option<String>> for Severity {
    fn from(value: Option<String>) -> Self {
        value.map(Self::from).unwrap_or(Self::Info)
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Agent-readiness scores, each clamped into `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    #[serde(deserialize_with = "deserialize_score")]
    pub total: u8,
    #[serde(deserialize_with = "deserialize_score")]
    pub discovery: u8,
    #[serde(deserialize_with = "deserialize_score")]
    pub offer_clarity: u8,
    #[serde(deserialize_with = "deserialize_score")]
    pub transaction: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_id: Option<String>,
}

/// Generated artifacts. Both are required for a payload to be accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    /// Contents of the storefront's `ucp.json` manifest.
    pub manifest_content: Map<String, Value>,
    /// Markdown remediation guide.
    pub migration_guide: String,
}

/// Completed audit handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub scan_id: String,
    pub url: String,
    pub status: AuditStatus,
    pub scores: Scores,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Issue>,
    pub artifacts: Artifacts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/// Echo of the primary request for troubleshooting. Holds no credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    pub model: String,
    pub tools: Vec<String>,
    pub safety_settings: Vec<SafetySetting>,
}

/// Redacted account of why both attempts failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDiagnostic {
    pub request_meta: RequestMeta,
    pub primary_error: String,
    pub primary_finish_reason: Option<String>,
    pub fallback_model: String,
    pub fallback_error: String,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("MISSING_API_KEY: a Gemini API key is required for a live audit")]
    MissingCredential,
    #[error("{summary}")]
    Exhausted {
        summary: String,
        diagnostic: Box<FailureDiagnostic>,
    },
}

impl AuditError {
    pub fn diagnostic(&self) -> Option<&FailureDiagnostic> {
        match self {
            Self::MissingCredential => None,
            Self::Exhausted { diagnostic, .. } => Some(diagnostic),
        }
    }

    /// Rate-limit and unknown-model failures call for a different model; anything else for a retry.
    ///
    /// Only the redacted attempt errors are inspected. The summary also carries
    /// the target URL, whose digits say nothing about why the call failed.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::MissingCredential => FailureClass::Generic,
            Self::Exhausted { diagnostic, .. } => {
                let seen = [
                    classify_failure(&diagnostic.primary_error),
                    classify_failure(&diagnostic.fallback_error),
                ];
                [FailureClass::RateLimited, FailureClass::ModelNotFound]
                    .into_iter()
                    .find(|class| seen.contains(class))
                    .unwrap_or(FailureClass::Generic)
            }
        }
    }
}

fn default_severity() -> Severity {
    Severity::Info
}

/// Models emit `null` for fields they have nothing to say about.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let raw = match &value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    raw.map(clamp_score)
        .ok_or_else(|| serde::de::Error::custom(format!("score must be numeric (got {value})")))
}

/// Round and clamp an arbitrary model-emitted score into `0..=100`.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scores_clamp_out_of_range_values() {
        let scores: Scores = serde_json::from_value(json!({
            "total": 140,
            "discovery": -5,
            "offerClarity": 72.6,
            "transaction": "45%"
        }))
        .expect("lenient scores should decode");
        assert_eq!(scores.total, 100);
        assert_eq!(scores.discovery, 0);
        assert_eq!(scores.offer_clarity, 73);
        assert_eq!(scores.transaction, 45);
    }

    #[test]
    fn non_numeric_score_is_rejected() {
        let err = serde_json::from_value::<Scores>(json!({
            "total": "high",
            "discovery": 1,
            "offerClarity": 1,
            "transaction": 1
        }))
        .expect_err("text score should fail");
        assert!(err.to_string().contains("numeric"));
    }

    #[test]
    fn unknown_severity_reads_as_info() {
        let issue: Issue = serde_json::from_value(json!({
            "severity": "BLOCKER",
            "title": "t",
            "description": "d"
        }))
        .unwrap();
        assert_eq!(issue.severity, Severity::Info);

        let issue: Issue = serde_json::from_value(json!({"severity": "Critical"})).unwrap();
        assert_eq!(issue.severity, Severity::Critical);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(AuditStatus::Processing).unwrap(),
            json!("processing")
        );
        assert_eq!(AuditStatus::from("weird".to_string()), AuditStatus::Completed);
    }

    #[test]
    fn null_enumerations_take_defaults() {
        let issue: Issue = serde_json::from_value(json!({
            "severity": null,
            "title": "t",
            "description": "d"
        }))
        .expect("null severity should decode");
        assert_eq!(issue.severity, Severity::Info);

        let status: AuditStatus = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(status, AuditStatus::Completed);
    }

    #[test]
    fn null_issue_text_reads_as_empty() {
        let issue: Issue = serde_json::from_value(json!({
            "severity": "warning",
            "title": null,
            "description": null,
            "remediationId": null
        }))
        .expect("null text fields should decode");
        assert_eq!(issue.severity, Severity::Warning);
        assert!(issue.title.is_empty());
        assert!(issue.description.is_empty());
        assert!(issue.remediation_id.is_none());
    }

    fn exhausted(primary_error: &str, fallback_error: &str) -> AuditError {
        AuditError::Exhausted {
            summary: "audit of https://shop.example.com/products/14290 failed (quota page)".into(),
            diagnostic: Box::new(FailureDiagnostic {
                request_meta: RequestMeta {
                    model: "gemini-3-flash-preview".into(),
                    tools: vec!["googleSearch".into()],
                    safety_settings: Vec::new(),
                },
                primary_error: primary_error.into(),
                primary_finish_reason: None,
                fallback_model: "gemini-2.5-flash".into(),
                fallback_error: fallback_error.into(),
            }),
        }
    }

    #[test]
    fn failure_class_ignores_target_url() {
        let err = exhausted("connection reset by peer", "connection reset by peer");
        assert_eq!(err.failure_class(), FailureClass::Generic);
    }

    #[test]
    fn failure_class_prefers_rate_limit_over_missing_model() {
        let err = exhausted(
            "Gemini API error (404 Not Found): model not found",
            "Gemini API error (429 Too Many Requests): RESOURCE_EXHAUSTED",
        );
        assert_eq!(err.failure_class(), FailureClass::RateLimited);

        let err = exhausted(
            "Gemini API error (404 Not Found): NOT_FOUND",
            "connection reset by peer",
        );
        assert_eq!(err.failure_class(), FailureClass::ModelNotFound);
    }

    #[test]
    fn missing_credential_is_generic_failure() {
        assert_eq!(
            AuditError::MissingCredential.failure_class(),
            FailureClass::Generic
        );
        assert!(AuditError::MissingCredential.diagnostic().is_none());
    }
}
