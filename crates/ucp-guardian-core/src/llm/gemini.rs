use super::{Generation, GenerationRequest, GenerativeModel, GuardianSettings, SafetySetting};
use crate::credential::Credential;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client for the Gemini `generateContent` and `models` endpoints.
///
/// The API key travels per request in a header, never in the URL, so
/// transport errors that echo the URL cannot leak it.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(settings: &GuardianSettings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("ucp-guardian/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            model.trim_start_matches("models/")
        )
    }

    /// List the Gemini models visible to `credential`, without the `models/` prefix.
    pub async fn list_models(&self, credential: &Credential) -> Result<Vec<ModelSummary>> {
        let response = self
            .http
            .get(format!("{}/v1beta/models", self.base_url))
            .header(API_KEY_HEADER, credential.expose())
            .send()
            .await
            .context("failed to call Gemini models API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini API error ({}): {}", status, body);
        }

        let listing: ModelListResponse = response
            .json()
            .await
            .context("failed to parse Gemini models response")?;
        Ok(listing
            .models
            .into_iter()
            .filter(|model| model.name.contains("gemini"))
            .map(|model| ModelSummary {
                name: model.name.trim_start_matches("models/").to_string(),
                display_name: model.display_name,
            })
            .collect())
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let payload = GeminiRequest {
            contents: vec![GeminiRequestContent {
                role: "user",
                parts: vec![GeminiRequestPart {
                    text: &request.prompt,
                }],
            }],
            tools: if request.search_grounding {
                vec![GeminiTool {
                    google_search: GoogleSearch {},
                }]
            } else {
                Vec::new()
            },
            safety_settings: &request.safety_settings,
        };

        let response = self
            .http
            .post(self.generate_url(&request.model))
            .header(API_KEY_HEADER, request.credential.expose())
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("failed to call Gemini generateContent for {}", request.model))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini API error ({}): {}", status, body);
        }

        let message: GeminiResponse = response
            .json()
            .await
            .context("failed to parse Gemini response")?;
        let generation = message.into_generation();
        debug!(
            model = %request.model,
            text_len = generation.text.as_ref().map_or(0, String::len),
            finish_reason = generation.finish_reason.as_deref().unwrap_or("-"),
            "Gemini generation received"
        );
        Ok(generation)
    }
}

/// Model entry returned by [`GeminiClient::list_models`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiRequestContent<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    safety_settings: &'a [SafetySetting],
}

#[derive(Serialize)]
struct GeminiRequestContent<'a> {
    role: &'static str,
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GeminiResponse {
    fn into_generation(self) -> Generation {
        let block_reason = self.prompt_feedback.and_then(|feedback| feedback.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Generation {
                text: None,
                finish_reason: block_reason,
            };
        };
        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty());
        Generation {
            text,
            finish_reason: candidate.finish_reason.or(block_reason),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    models: Vec<ModelListEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelListEntry {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
}
