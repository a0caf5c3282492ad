pub mod archive;
pub mod audit;
pub mod credential;
pub mod llm;
pub mod report;
pub mod target;

pub use archive::{archive_migration_guide, sanitize_path_segment, ArtifactStore, FileArtifactStore};
pub use audit::{
    extract::extract_json,
    normalize::{normalize, AttemptKind, AuditPayload, PayloadError},
    prompt::{build_audit_prompt, build_fallback_prompt, build_patch_prompt},
    requester::Auditor,
    Artifacts, AuditError, AuditRequest, AuditResult, AuditStatus, FailureDiagnostic, Issue,
    RequestMeta, Scores, Severity,
};
pub use credential::Credential;
pub use llm::{
    GeminiClient, Generation, GenerationRequest, GenerativeModel, GuardianSettings, ModelSummary,
};
pub use report::{classify_failure, export_artifacts, render_report, FailureClass, OutputFormat};
pub use target::{normalize_target_url, TargetUrlError};
