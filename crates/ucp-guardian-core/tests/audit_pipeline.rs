use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use ucp_guardian_core::{AuditError, Auditor, FailureClass, GeminiClient, GuardianSettings};

const SECRET: &str = "pipeline-test-key";

fn settings(server: &MockServer) -> GuardianSettings {
    GuardianSettings {
        endpoint: server.base_url(),
        model: "gemini-primary".into(),
        fallback_model: "gemini-fallback".into(),
        timeout: Duration::from_secs(5),
        ..GuardianSettings::default()
    }
}

fn audit_body() -> serde_json::Value {
    let payload = json!({
        "status": "completed",
        "scores": {"total": 55, "discovery": 60, "offerClarity": 50, "transaction": 40},
        "issues": [],
        "artifacts": {"manifestContent": {"ucp_version": "1.0"}, "migrationGuide": "# Guide"}
    });
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": format!("Audit follows.\n{payload}")}]},
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires loopback networking"]
async fn rate_limited_primary_falls_back_to_fixed_model() {
    let server = MockServer::start();
    let primary = server.mock(|when, then| {
        when.method(POST)
            .path("/v1beta/models/gemini-primary:generateContent")
            .body_contains("googleSearch");
        then.status(429).body("{\"error\":{\"status\":\"RESOURCE_EXHAUSTED\"}}");
    });
    let fallback = server.mock(|when, then| {
        when.method(POST)
            .path("/v1beta/models/gemini-fallback:generateContent")
            .body_contains("Live browsing is unavailable");
        then.status(200).json_body(audit_body());
    });

    let settings = settings(&server);
    let auditor = Auditor::new(GeminiClient::new(&settings).unwrap(), &settings);
    let result = auditor
        .perform_audit("https://shop.example.com", &settings.model, SECRET)
        .await
        .expect("fallback should rescue the audit");

    assert_eq!(result.model_used.as_deref(), Some("gemini-fallback"));
    assert_eq!(result.url, "https://shop.example.com");
    assert!(result.scan_id.starts_with("fallback-"));
    primary.assert_hits(1);
    fallback.assert_hits(1);
}

#[tokio::test(flavor = "current_thread")]
#[ignore = "requires loopback networking"]
async fn both_attempts_failing_yields_redacted_diagnostic() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST);
        then.status(429).body(format!("quota exceeded for key {SECRET}"));
    });

    let settings = settings(&server);
    let auditor = Auditor::new(GeminiClient::new(&settings).unwrap(), &settings);
    let err = auditor
        .perform_audit("https://shop.example.com", &settings.model, SECRET)
        .await
        .expect_err("both attempts should fail");

    assert!(matches!(err, AuditError::Exhausted { .. }));
    assert_eq!(err.failure_class(), FailureClass::RateLimited);
    let diagnostic = serde_json::to_string(err.diagnostic().unwrap()).unwrap();
    assert!(!diagnostic.contains(SECRET));
    assert!(diagnostic.contains("gemini-fallback"));
    mock.assert_hits(2);
}
