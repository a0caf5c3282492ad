use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetUrlError {
    #[error("please enter a storefront URL")]
    Empty,
    #[error("invalid URL format `{input}`; include http:// or https://")]
    Invalid { input: String },
}

/// Normalize user input into an absolute storefront URL.
///
/// Input without an `http` scheme prefix is assumed to be `https://`.
pub fn normalize_target_url(input: &str) -> Result<String, TargetUrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TargetUrlError::Empty);
    }
    let candidate = if trimmed.to_ascii_lowercase().starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let invalid = || TargetUrlError::Invalid {
        input: trimmed.to_string(),
    };
    let url = Url::parse(&candidate).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(candidate)
}
