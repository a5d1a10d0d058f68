use crate::quizforge::APP_USER_AGENT;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument};

// Fixed sampling configuration, matching the quiz prompts' expectations
const TEMPERATURE: f64 = 0.9;
const TOP_P: f64 = 1.0;
const TOP_K: i32 = 1;
const MAX_OUTPUT_TOKENS: u32 = 2048;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const HARM_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

/// Any failure of a generation round trip: transport, API-side, or a
/// response without usable text (safety-blocked or empty).
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation API returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("generation API returned no usable candidate")]
    EmptyCandidate,
}

/// A single prompt-in, text-out round trip to a generative model.
#[async_trait]
pub trait GenerateContent: Send + Sync {
    async fn generate_content(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Debug)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
struct Part {
    text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: i32,
    max_output_tokens: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for the generative language `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    endpoint: Url,
    api_key: SecretString,
}

impl GeminiClient {
    /// # Errors
    /// Returns an error if the endpoint URL is invalid or the HTTP client
    /// cannot be created.
    pub fn new(model_url: &str, model: &str, api_key: SecretString) -> Result<Self> {
        let endpoint = endpoint_url(model_url, model)?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build generation HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl GenerateContent for GeminiClient {
    #[instrument(skip(self, prompt))]
    async fn generate_content(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();

            error!("Generation API error {}: {}", status, message);

            return Err(GenerationError::Api { status, message });
        }

        let body: GenerateContentResponse = response.json().await?;

        extract_text(&body).ok_or(GenerationError::EmptyCandidate)
    }
}

fn endpoint_url(model_url: &str, model: &str) -> Result<Url> {
    let base = Url::parse(model_url).context("invalid model URL")?;
    let base = base.as_str().trim_end_matches('/');

    Url::parse(&format!("{base}/v1beta/models/{model}:generateContent"))
        .context("invalid model endpoint")
}

fn build_request(prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        },
        safety_settings: HARM_CATEGORIES
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold: HARM_THRESHOLD,
            })
            .collect(),
    }
}

fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let text = content
        .parts
        .iter()
        .map(|part| part.text.as_str())
        .collect::<String>();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let url = endpoint_url("https://generativelanguage.googleapis.com", "gemini-pro").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn test_endpoint_url_trailing_slash() {
        let url = endpoint_url("http://localhost:8606/", "gemini-pro").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8606/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn test_endpoint_url_invalid() {
        assert!(endpoint_url("not a url", "gemini-pro").is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = serde_json::to_value(build_request("What is borrow checking?")).unwrap();

        assert_eq!(
            request["contents"][0]["parts"][0]["text"],
            "What is borrow checking?"
        );
        assert_eq!(request["generationConfig"]["temperature"], 0.9);
        assert_eq!(request["generationConfig"]["topP"], 1.0);
        assert_eq!(request["generationConfig"]["topK"], 1);
        assert_eq!(request["generationConfig"]["maxOutputTokens"], 2048);

        let safety = request["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        for setting in safety {
            assert_eq!(setting["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
        }
    }

    #[test]
    fn test_extract_text() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "Q1. What"}, {"text": " is Rust?"}]}}
            ]
        }))
        .unwrap();

        assert_eq!(extract_text(&response).unwrap(), "Q1. What is Rust?");
    }

    #[test]
    fn test_extract_text_no_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(extract_text(&response).is_none());
    }

    #[test]
    fn test_extract_text_blocked_candidate() {
        // Safety-blocked candidates come back with no content
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        assert!(extract_text(&response).is_none());
    }
}
