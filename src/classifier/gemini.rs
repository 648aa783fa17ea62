use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("{0} is not set")]
    MissingKey(String),
    #[error("classification request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classification service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("classification service returned no text")]
    EmptyResponse,
}

/// Text-completion collaborator used to label job titles.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Send a prompt, get back the raw answer text.
    async fn complete(&self, prompt: &str) -> Result<String, ClassificationError>;
}

/// Google Gemini `generateContent` over REST.
pub struct GeminiService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiService {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Read the API key from the environment variable `key_var`.
    pub fn from_env(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        key_var: &str,
    ) -> Result<Self, ClassificationError> {
        let api_key = std::env::var(key_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ClassificationError::MissingKey(key_var.to_string()))?;
        Ok(Self::new(endpoint, model, api_key))
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[async_trait]
impl ClassificationService for GeminiService {
    async fn complete(&self, prompt: &str) -> Result<String, ClassificationError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        debug!("POST {} ({} prompt chars)", self.url(), prompt.len());
        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: GenerateResponse = response.json().await?;
        parsed.text().ok_or(ClassificationError::EmptyResponse)
    }
}
