//! Volunteer-opportunity suggestions from an external text-generation API.
//!
//! One prompt, one interpolated field, one attempt per request. Failures
//! surface as [`ClientError::Generation`]; nothing here retries.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{error::ApiError, protocol::SuggestionResponse};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    error::ClientError,
    notify::{NotificationSink, Toast},
};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const PROMPT_TEMPLATE: &str = "You are an assistant helping nonprofit administrators match people who \
contacted the organization with suitable volunteer opportunities.

Read the contact's message below and suggest a few volunteer opportunities that fit their interests. \
Answer with JSON only, shaped as {\"suggestedOpportunities\": [\"...\", \"...\"]}.

Contact Message: {{contactMessage}}

Suggested Volunteer Opportunities:
";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ClientError>;
}

/// Calls the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Generation(format!("failed to build http client: {err}")))?;
        Ok(self)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ClientError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ClientError::Generation("suggestion request timed out".to_string())
                } else {
                    ClientError::Generation(format!("suggestion request failed: {err}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ClientError::Generation(format!(
                "suggestion service returned {}: {body_text}",
                status.as_u16()
            )));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|err| {
            ClientError::Generation(format!("failed to parse suggestion response: {err}"))
        })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ClientError::Generation(
                "suggestion service returned no text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

pub fn render_prompt(contact_message: &str) -> String {
    PROMPT_TEMPLATE.replace("{{contactMessage}}", contact_message.trim())
}

/// Accepts the JSON object the prompt asks for, a bare JSON array, or a
/// numbered/bulleted list.
pub fn parse_suggestions(raw: &str) -> Result<Vec<String>, ClientError> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let suggestions = if let Ok(parsed) = serde_json::from_str::<SuggestionResponse>(trimmed) {
        parsed.suggested_opportunities
    } else if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
        list
    } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Err(ClientError::Generation(
            "suggestion service returned malformed output".to_string(),
        ));
    } else {
        trimmed.lines().map(strip_list_marker).collect()
    };

    let suggestions: Vec<String> = suggestions
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if suggestions.is_empty() {
        return Err(ClientError::Generation(
            "suggestion service returned no suggestions".to_string(),
        ));
    }
    Ok(suggestions)
}

fn strip_list_marker(line: &str) -> String {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .unwrap_or(line);
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim().to_string();
        }
    }
    line.to_string()
}

pub struct OpportunitySuggester {
    generator: Arc<dyn TextGenerator>,
}

impl OpportunitySuggester {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn suggest(&self, contact_message: &str) -> Result<Vec<String>, ClientError> {
        if contact_message.trim().is_empty() {
            return Err(ClientError::Validation(
                "contactMessage: is required".to_string(),
            ));
        }
        let raw = self.generator.generate(&render_prompt(contact_message)).await?;
        let suggestions = parse_suggestions(&raw)?;
        info!(count = suggestions.len(), "volunteer opportunities suggested");
        Ok(suggestions)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SuggestionState {
    #[default]
    Idle,
    Generating,
    Ready(Vec<String>),
    Failed(ApiError),
}

/// Presentation-side state for the "suggest opportunities" dialog.
pub struct SuggestionPanel {
    suggester: OpportunitySuggester,
    notifier: Arc<dyn NotificationSink>,
    state: watch::Sender<SuggestionState>,
}

impl SuggestionPanel {
    pub fn new(suggester: OpportunitySuggester, notifier: Arc<dyn NotificationSink>) -> Self {
        let (state, _) = watch::channel(SuggestionState::Idle);
        Self {
            suggester,
            notifier,
            state,
        }
    }

    pub fn state(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        *self.state.borrow() == SuggestionState::Generating
    }

    /// Clears suggestions when the dialog is reopened for another contact.
    pub fn reset(&self) {
        self.state.send_replace(SuggestionState::Idle);
    }

    /// One attempt per click; ignored while a previous one is running.
    pub async fn generate(&self, contact_message: &str) -> SuggestionState {
        let started = self.state.send_if_modified(|state| {
            if *state == SuggestionState::Generating {
                return false;
            }
            *state = SuggestionState::Generating;
            true
        });
        if !started {
            return self.state();
        }

        let next = match self.suggester.suggest(contact_message).await {
            Ok(suggestions) => SuggestionState::Ready(suggestions),
            Err(err) => {
                let err = err.to_api_error();
                warn!(message = %err.message, "suggestion failed");
                self.notifier
                    .notify(Toast::error("Failed to get suggestions", &err));
                SuggestionState::Failed(err)
            }
        };
        self.state.send_replace(next.clone());
        next
    }
}
