use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL};
use crate::db::NOT_AVAILABLE;

/// Condenses text with a Gemini `generateContent` call.
pub struct Summarizer {
    client: reqwest::Client,
    api_key: SecretString,
    api_base: String,
    model: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

pub fn prompt(text: &str) -> String {
    format!("Summarize this text: {}", text)
}

impl Summarizer {
    pub fn new(client: reqwest::Client, api_key: SecretString) -> Self {
        Self {
            client,
            api_key,
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Never fails: returns `"N/A"` when the service answers without text,
    /// and the input unchanged when the call itself fails.
    pub async fn summarize(&self, text: &str) -> String {
        match self.generate(&prompt(text)).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                debug!("Summarizer returned no text");
                NOT_AVAILABLE.to_string()
            }
            Err(e) => {
                warn!("Error during text summarization: {}", e);
                text.to_string()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<Option<String>, reqwest::Error> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response: GenerateContentResponse = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.text())
    }
}
