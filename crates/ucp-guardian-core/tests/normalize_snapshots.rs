use std::{fs, path::PathBuf};

use insta::assert_json_snapshot;
use ucp_guardian_core::{extract_json, normalize, AttemptKind, AuditPayload, AuditResult};

const TARGET_URL: &str = "https://store.example.com";

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn normalize_fixture(name: &str) -> AuditResult {
    let fixture_path = fixture_dir().join(name);
    let raw = fs::read_to_string(&fixture_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {err}", fixture_path.display()));

    let value = extract_json(Some(raw.as_str()))
        .unwrap_or_else(|| panic!("no JSON object recovered from fixture {name}"));
    let payload = AuditPayload::from_value(value)
        .unwrap_or_else(|err| panic!("fixture {name} failed schema decoding: {err}"));
    normalize(payload, TARGET_URL, "gemini-test", AttemptKind::Primary)
}

#[test]
fn prose_wrapped_snapshot() {
    let result = normalize_fixture("prose_wrapped.txt");
    assert_json_snapshot!("prose_wrapped", result);
}

#[test]
fn fenced_out_of_range_snapshot() {
    let result = normalize_fixture("fenced_out_of_range.txt");
    assert!(result
        .scores
        .total
        .max(result.scores.discovery)
        .max(result.scores.offer_clarity)
        .max(result.scores.transaction)
        <= 100);
    assert_json_snapshot!("fenced_out_of_range", result);
}
