use std::fmt;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use once_cell::sync::Lazy;

const REDACTED: &str = "[REDACTED]";

/// Fragments found in template `.env` files and copy-pasted setup docs.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "your_actual_api_key",
    "your_api_key",
    "your-api-key",
    "api_key_here",
    "<api_key>",
    "changeme",
];

static PLACEHOLDERS: Lazy<Option<AhoCorasick>> = Lazy::new(|| {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(PLACEHOLDER_MARKERS)
        .ok()
});

/// API key supplied by the caller for a single model call.
///
/// The value is never serialized and its `Debug` output is redacted, so a
/// credential can travel inside request structs without leaking into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A credential is usable when it is non-blank and not a template placeholder.
    pub fn is_usable(&self) -> bool {
        if self.0.is_empty() {
            return false;
        }
        match PLACEHOLDERS.as_ref() {
            Some(automaton) => !automaton.is_match(&self.0),
            None => true,
        }
    }

    /// Replace every occurrence of the credential in `text` with a marker.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, REDACTED)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(")?;
        f.write_str(REDACTED)?;
        f.write_str(")")
    }
}
