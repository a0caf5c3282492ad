use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::audit::{AuditResult, Issue, Scores};

/// Format styles supported by [`render_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Produce a report string from an `AuditResult` using the desired format.
pub fn render_report(result: &AuditResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(result),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(result)?),
    }
}

fn render_human(result: &AuditResult) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Target: {}", result.url)?;
    writeln!(out, "Scan ID: {}", result.scan_id)?;
    if let Some(model) = &result.model_used {
        writeln!(out, "Model: {model}")?;
    }
    writeln!(out)?;

    let Scores {
        total,
        discovery,
        offer_clarity,
        transaction,
    } = result.scores;
    writeln!(out, "Scores:")?;
    writeln!(out, "  Overall Readiness {total:>3}/100")?;
    writeln!(out, "  Discovery         {discovery:>3}/100")?;
    writeln!(out, "  Offer Clarity     {offer_clarity:>3}/100")?;
    writeln!(out, "  Transaction       {transaction:>3}/100")?;
    writeln!(out)?;

    if result.issues.is_empty() {
        writeln!(out, "No issues detected.")?;
    } else {
        writeln!(out, "Issues:")?;
        let mut issues: Vec<&Issue> = result.issues.iter().collect();
        issues.sort_by_key(|issue| issue.severity);
        for issue in issues {
            let remediation = issue
                .remediation_id
                .as_deref()
                .map(|id| format!(" (fix: {id})"))
                .unwrap_or_default();
            writeln!(
                out,
                "  - [{severity:8}] {title}{remediation}",
                severity = issue.severity.as_str(),
                title = issue.title,
            )?;
            if !issue.description.trim().is_empty() {
                writeln!(out, "    {}", single_line(&issue.description))?;
            }
        }
    }

    Ok(out)
}

fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

/// Summary written as `audit_report_{scanId}.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedReport<'a> {
    target: &'a str,
    scan_id: &'a str,
    timestamp: String,
    scores: &'a Scores,
    issues: &'a [Issue],
}

/// Write the manifest, migration guide and report summary into `dir`.
pub async fn export_artifacts(result: &AuditResult, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let manifest = serde_json::to_string_pretty(&result.artifacts.manifest_content)?;
    let report = serde_json::to_string_pretty(&ExportedReport {
        target: &result.url,
        scan_id: &result.scan_id,
        timestamp: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
        scores: &result.scores,
        issues: &result.issues,
    })?;

    let files = [
        (dir.join("ucp.json"), manifest),
        (
            dir.join("migration_guide.md"),
            result.artifacts.migration_guide.clone(),
        ),
        (
            dir.join(format!("audit_report_{}.json", file_safe(&result.scan_id))),
            report,
        ),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (path, content) in files {
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Model-supplied scan ids end up in file names; keep them to one path segment.
fn file_safe(scan_id: &str) -> String {
    scan_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Coarse failure classes used to pick the user-facing advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    RateLimited,
    ModelNotFound,
    Generic,
}

impl FailureClass {
    pub fn advice(&self) -> &'static str {
        match self {
            Self::RateLimited => {
                "RATE LIMIT: the selected model is throttled. Pick a different, less constrained model and try again."
            }
            Self::ModelNotFound => {
                "MODEL NOT FOUND: the selected model is unavailable to this key. Pick a different model and try again."
            }
            Self::Generic => "SCAN FAILED: the audit could not be completed. Please try again.",
        }
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "resource_exhausted",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "quota",
    "too many requests",
];

static RATE_LIMIT: Lazy<Option<AhoCorasick>> = Lazy::new(|| {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(RATE_LIMIT_MARKERS)
        .ok()
});

const NOT_FOUND_MARKERS: &[&str] = &["not found", "not_found", "is not supported for"];

static NOT_FOUND: Lazy<Option<AhoCorasick>> = Lazy::new(|| {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(NOT_FOUND_MARKERS)
        .ok()
});

// Bare status codes only count as whole numbers, so "14290" is not a 429.
static STATUS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(429|404)\b").expect("valid status code regex"));

/// Classify an error message by looking for rate-limit and missing-model indicators.
pub fn classify_failure(message: &str) -> FailureClass {
    let has_status = |code: &str| {
        STATUS_CODE
            .find_iter(message)
            .any(|found| found.as_str() == code)
    };

    if has_status("429") || has_marker(&RATE_LIMIT, message) {
        FailureClass::RateLimited
    } else if has_status("404") || has_marker(&NOT_FOUND, message) {
        FailureClass::ModelNotFound
    } else {
        FailureClass::Generic
    }
}

fn has_marker(automaton: &Option<AhoCorasick>, message: &str) -> bool {
    automaton
        .as_ref()
        .is_some_and(|automaton| automaton.is_match(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Artifacts, AuditStatus, Severity};
    use serde_json::json;

    fn sample_result() -> AuditResult {
        AuditResult {
            scan_id: "scan_x92a".into(),
            url: "https://store.example.com".into(),
            status: AuditStatus::Completed,
            scores: Scores {
                total: 68,
                discovery: 85,
                offer_clarity: 45,
                transaction: 20,
            },
            issues: vec![
                Issue {
                    severity: Severity::Warning,
                    title: "Incomplete Schema.org".into(),
                    description: "Missing 'sku'\nand 'priceValidUntil'.".into(),
                    remediation_id: None,
                },
                Issue {
                    severity: Severity::Critical,
                    title: "Missing UCP Manifest".into(),
                    description: "ucp.json is missing.".into(),
                    remediation_id: Some("fix_manifest".into()),
                },
            ],
            artifacts: Artifacts {
                manifest_content: json!({"ucp_version": "1.0"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                migration_guide: "# Migration Guide\n".into(),
            },
            model_used: Some("gemini-2.5-flash".into()),
        }
    }

    #[test]
    fn human_report_orders_issues_by_severity() {
        let output = render_report(&sample_result(), OutputFormat::Human).unwrap();
        assert!(output.contains("Overall Readiness  68/100"));
        assert!(output.contains("Model: gemini-2.5-flash"));
        let critical = output.find("Missing UCP Manifest (fix: fix_manifest)").unwrap();
        let warning = output.find("Incomplete Schema.org").unwrap();
        assert!(critical < warning);
        assert!(output.contains("Missing 'sku' and 'priceValidUntil'."));
    }

    #[test]
    fn json_report_uses_camel_case() {
        let output = render_report(&sample_result(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["scores"]["offerClarity"], json!(45));
        assert_eq!(value["modelUsed"], json!("gemini-2.5-flash"));
        assert_eq!(value["issues"][1]["remediationId"], json!("fix_manifest"));
    }

    #[test]
    fn yaml_report_round_trips() {
        let output = render_report(&sample_result(), OutputFormat::Yaml).unwrap();
        let parsed: AuditResult = serde_yaml::from_str(&output).unwrap();
        assert_eq!(parsed, sample_result());
    }

    #[tokio::test]
    async fn export_writes_three_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();
        let written = export_artifacts(&result, dir.path()).await.unwrap();
        assert_eq!(written.len(), 3);

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("ucp.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["ucp_version"], json!("1.0"));

        let guide = std::fs::read_to_string(dir.path().join("migration_guide.md")).unwrap();
        assert_eq!(guide, "# Migration Guide\n");

        let report: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("audit_report_scan_x92a.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(report["target"], json!("https://store.example.com"));
        assert_eq!(report["scanId"], json!("scan_x92a"));
        assert!(report["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(report["issues"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn export_file_name_cannot_escape_directory() {
        assert_eq!(file_safe("../../etc/passwd"), "______etc_passwd");
        assert_eq!(file_safe("gen-ab12_x"), "gen-ab12_x");
    }

    #[test]
    fn classifies_rate_limit_messages() {
        assert_eq!(
            classify_failure("Gemini API error (429 Too Many Requests)"),
            FailureClass::RateLimited
        );
        assert_eq!(
            classify_failure("status: Resource_Exhausted"),
            FailureClass::RateLimited
        );
        assert_eq!(
            classify_failure("connection reset by peer"),
            FailureClass::Generic
        );
    }

    #[test]
    fn status_codes_must_stand_alone() {
        assert_eq!(
            classify_failure("failed to call Gemini generateContent for https://shop.example.com/p/14290"),
            FailureClass::Generic
        );
        assert_eq!(classify_failure("status 429"), FailureClass::RateLimited);
    }

    #[test]
    fn classifies_missing_model_messages() {
        assert_eq!(
            classify_failure("Gemini API error (404 Not Found): models/gemini-9 is not found"),
            FailureClass::ModelNotFound
        );
        assert_eq!(classify_failure("status: NOT_FOUND"), FailureClass::ModelNotFound);
        assert!(FailureClass::ModelNotFound
            .advice()
            .contains("Pick a different model"));
    }
}
