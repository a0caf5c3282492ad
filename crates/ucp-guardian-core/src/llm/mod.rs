pub mod gemini;
mod settings;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::credential::Credential;

pub use gemini::{GeminiClient, ModelSummary};
pub use settings::{parse_timeout, GuardianSettings, DEFAULT_FALLBACK_MODEL, DEFAULT_MODEL};

/// Harm categories accepted by the Gemini safety filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmCategory {
    HarmCategoryHarassment,
    HarmCategoryHateSpeech,
    HarmCategorySexuallyExplicit,
    HarmCategoryDangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Audits discuss vulnerabilities and attack terminology, so every category is unblocked.
pub fn permissive_safety_settings() -> Vec<SafetySetting> {
    [
        HarmCategory::HarmCategoryHarassment,
        HarmCategory::HarmCategoryHateSpeech,
        HarmCategory::HarmCategorySexuallyExplicit,
        HarmCategory::HarmCategoryDangerousContent,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockNone,
    })
    .collect()
}

/// One generation call against a model endpoint.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    /// Let the model consult live web search before answering.
    pub search_grounding: bool,
    pub safety_settings: Vec<SafetySetting>,
    pub credential: Credential,
}

impl GenerationRequest {
    pub fn tool_names(&self) -> Vec<String> {
        if self.search_grounding {
            vec!["googleSearch".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Raw model output: the text (if any) and why generation stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: Option<String>,
    pub finish_reason: Option<String>,
}

/// Abstraction over generative model endpoints used by the audit pipeline.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Issue a single generation request. No retries are performed here.
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}
