use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::audit::AuditResult;

const MAX_SEGMENT_CHARS: usize = 80;

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://").expect("valid scheme regex"));
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9.-]+").expect("valid segment regex"));

/// Write-only blob storage for generated artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `content` under the slash-separated relative `path`.
    async fn put(&self, path: &str, content: &str, content_type: &str) -> Result<()>;
}

/// Stores artifacts as files beneath a root directory.
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            bail!("artifact path `{path}` must be relative without `..`");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn put(&self, path: &str, content: &str, content_type: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&target, content)
            .await
            .with_context(|| format!("failed to write artifact {}", target.display()))?;
        info!(path = %target.display(), content_type, "artifact archived");
        Ok(())
    }
}

/// Reduce a URL to a single safe path segment.
pub fn sanitize_path_segment(value: &str) -> String {
    let lower = value.to_lowercase();
    let without_scheme = SCHEME.replace_all(&lower, "");
    let replaced = DISALLOWED.replace_all(&without_scheme, "-");
    let segment: String = replaced
        .trim_matches('-')
        .chars()
        .take(MAX_SEGMENT_CHARS)
        .collect();
    if segment.is_empty() {
        "unknown".to_string()
    } else {
        segment
    }
}

/// Archive the migration guide under `audits/{url}/{scanId}/migration_guide.md`.
///
/// Returns the path the guide was stored at.
pub async fn archive_migration_guide(
    store: &dyn ArtifactStore,
    result: &AuditResult,
) -> Result<String> {
    let url_segment = sanitize_path_segment(&result.url);
    let scan_id = if result.scan_id.trim().is_empty() {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        format!("scan-{millis}")
    } else {
        sanitize_path_segment(&result.scan_id)
    };
    let path = format!("audits/{url_segment}/{scan_id}/migration_guide.md");

    let content = format!(
        "# UCP Guardian Audit\nTarget URL: {}\nScan ID: {}\nModel: {}\n\n{}",
        result.url,
        result.scan_id,
        result.model_used.as_deref().unwrap_or("unknown"),
        result.artifacts.migration_guide
    );
    store.put(&path, &content, "text/markdown").await?;
    Ok(path)
}
