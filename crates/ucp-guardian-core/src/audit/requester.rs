use anyhow::{anyhow, Result};
use tracing::{error, info, instrument, warn};

use super::extract::extract_json;
use super::normalize::{normalize, AttemptKind, AuditPayload};
use super::prompt::{build_audit_prompt, build_fallback_prompt, build_patch_prompt};
use super::{AuditError, AuditRequest, AuditResult, FailureDiagnostic, RequestMeta};
use crate::credential::Credential;
use crate::llm::{
    permissive_safety_settings, GenerationRequest, GenerativeModel, GuardianSettings,
};

/// Returned by `generate_patch` when no credential is available.
const PLACEHOLDER_PATCH: &str = r#"<!-- UCP Guardian placeholder patch: add an API key for a generated fix -->
<link rel="ucp-manifest" type="application/json" href="/ucp.json">
<meta name="ucp:version" content="1.0">"#;

/// Why a single attempt produced no usable result.
#[derive(Debug)]
struct AttemptFailure {
    error: String,
    finish_reason: Option<String>,
}

/// Runs the two-tier audit pipeline against a generative model.
///
/// Stateless between calls: concurrent audits share only the model client.
pub struct Auditor<M> {
    model: M,
    fallback_model: String,
    patch_model: String,
}

impl<M: GenerativeModel> Auditor<M> {
    pub fn new(model: M, settings: &GuardianSettings) -> Self {
        Self {
            model,
            fallback_model: settings.fallback_model.clone(),
            patch_model: settings.patch_model.clone(),
        }
    }

    pub fn fallback_model(&self) -> &str {
        &self.fallback_model
    }

    /// Audit `target_url` with `model_id`, falling back once to the fixed fallback model.
    #[instrument(name = "perform_audit", skip(self, credential), fields(model = %model_id))]
    pub async fn perform_audit(
        &self,
        target_url: &str,
        model_id: &str,
        credential: &str,
    ) -> Result<AuditResult, AuditError> {
        let credential = Credential::new(credential);
        if !credential.is_usable() {
            return Err(AuditError::MissingCredential);
        }
        let request = AuditRequest {
            target_url: target_url.to_string(),
            model_id: model_id.to_string(),
            credential,
        };

        let primary = GenerationRequest {
            model: request.model_id.clone(),
            prompt: build_audit_prompt(&request.target_url),
            search_grounding: true,
            safety_settings: permissive_safety_settings(),
            credential: request.credential.clone(),
        };
        info!(model = %primary.model, "starting audit with search grounding");
        let primary_failure = match self.attempt(&primary, &request, AttemptKind::Primary).await {
            Ok(result) => return Ok(result),
            Err(failure) => failure,
        };
        warn!(
            error = %request.credential.redact(&primary_failure.error),
            finish_reason = primary_failure.finish_reason.as_deref().unwrap_or("-"),
            fallback = %self.fallback_model,
            "grounded audit failed; falling back to reasoning-only model"
        );

        let fallback = GenerationRequest {
            model: self.fallback_model.clone(),
            prompt: build_fallback_prompt(&request.target_url),
            search_grounding: false,
            safety_settings: permissive_safety_settings(),
            credential: request.credential.clone(),
        };
        let fallback_failure = match self.attempt(&fallback, &request, AttemptKind::Fallback).await
        {
            Ok(result) => return Ok(result),
            Err(failure) => failure,
        };

        let diagnostic = FailureDiagnostic {
            request_meta: RequestMeta {
                model: primary.model.clone(),
                tools: primary.tool_names(),
                safety_settings: primary.safety_settings.clone(),
            },
            primary_error: request.credential.redact(&primary_failure.error),
            primary_finish_reason: primary_failure.finish_reason,
            fallback_model: self.fallback_model.clone(),
            fallback_error: request.credential.redact(&fallback_failure.error),
        };
        let summary = format!(
            "audit of {} failed: primary model {} ({}); fallback model {} ({})",
            request.target_url,
            diagnostic.request_meta.model,
            diagnostic.primary_error,
            diagnostic.fallback_model,
            diagnostic.fallback_error
        );
        error!(%summary, "both audit attempts exhausted");
        Err(AuditError::Exhausted {
            summary,
            diagnostic: Box::new(diagnostic),
        })
    }

    async fn attempt(
        &self,
        generation_request: &GenerationRequest,
        request: &AuditRequest,
        kind: AttemptKind,
    ) -> Result<AuditResult, AttemptFailure> {
        let generation = self
            .model
            .generate(generation_request)
            .await
            .map_err(|err| AttemptFailure {
                error: format!("{err:#}"),
                finish_reason: None,
            })?;

        let finish_reason = generation.finish_reason;
        let Some(text) = generation.text.filter(|text| !text.trim().is_empty()) else {
            return Err(AttemptFailure {
                error: format!("model {} returned no text", generation_request.model),
                finish_reason,
            });
        };

        let Some(value) = extract_json(Some(text.as_str())) else {
            return Err(AttemptFailure {
                error: format!(
                    "no structured data in response from {}",
                    generation_request.model
                ),
                finish_reason,
            });
        };

        let payload = AuditPayload::from_value(value).map_err(|err| AttemptFailure {
            error: err.to_string(),
            finish_reason: finish_reason.clone(),
        })?;

        Ok(normalize(
            payload,
            &request.target_url,
            &generation_request.model,
            kind,
        ))
    }

    /// Generate a bare code snippet fixing one issue.
    ///
    /// Without a usable credential a canned placeholder is returned and no
    /// model call is made.
    #[instrument(name = "generate_patch", skip_all, fields(issue = %issue_title))]
    pub async fn generate_patch(
        &self,
        target_url: &str,
        issue_title: &str,
        issue_description: &str,
        credential: Option<&str>,
    ) -> Result<String> {
        let Some(credential) = credential.map(Credential::new).filter(Credential::is_usable) else {
            info!("no API key supplied; returning placeholder patch");
            return Ok(PLACEHOLDER_PATCH.to_string());
        };

        let request = GenerationRequest {
            model: self.patch_model.clone(),
            prompt: build_patch_prompt(target_url, issue_title, issue_description),
            search_grounding: false,
            safety_settings: permissive_safety_settings(),
            credential,
        };
        let generation = self.model.generate(&request).await.map_err(|err| {
            anyhow!(
                "patch generation with {} failed: {}",
                request.model,
                request.credential.redact(&format!("{err:#}"))
            )
        })?;
        let text = generation
            .text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("patch model {} returned no text", request.model))?;
        Ok(strip_code_fence(&text))
    }
}

/// Remove a surrounding Markdown code fence (with optional language tag).
fn strip_code_fence(input: &str) -> String {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}
