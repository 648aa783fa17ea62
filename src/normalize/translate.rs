use async_trait::async_trait;
use tracing::warn;

use super::Rendered;

/// Titles longer than this are cut before translation.
pub const MAX_TRANSLATION_CHARS: usize = 1000;

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("translation service returned status {0}")]
    Status(u16),
    #[error("unexpected translation payload")]
    Payload,
}

/// External translation collaborator (source language auto-detected).
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &str) -> Result<String, TranslationError>;
}

/// Google Translate's public `gtx` endpoint.
pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(endpoint: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String, TranslationError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("client", "gtx"), ("sl", "auto"), ("tl", target), ("dt", "t"), ("q", text)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TranslationError::Status(response.status().as_u16()));
        }
        let payload: serde_json::Value = response.json().await?;
        parse_gtx_payload(&payload)
    }
}

// Shape: [[["translated", "original", ...], ...], ...]
fn parse_gtx_payload(payload: &serde_json::Value) -> Result<String, TranslationError> {
    let segments = payload
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or(TranslationError::Payload)?;
    let translated: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(|s| s.as_str()))
        .collect();
    if translated.trim().is_empty() {
        Err(TranslationError::Payload)
    } else {
        Ok(translated)
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Translate a title to English, falling back to the original text on any failure.
pub async fn translate_title(translator: &dyn Translator, text: &str) -> Rendered {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return Rendered::Unchanged(text.to_string());
    }
    let input = truncate_chars(cleaned, MAX_TRANSLATION_CHARS);
    match translator.translate(input, "en").await {
        Ok(translated) => Rendered::Converted(translated.trim().to_string()),
        Err(e) => {
            warn!("Translation failed, keeping original title: {}", e);
            Rendered::Unchanged(text.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Translator for Recording {
        async fn translate(&self, text: &str, _target: &str) -> Result<String, TranslationError> {
            self.seen.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(TranslationError::Status(503))
            } else {
                Ok(format!("EN:{}", text))
            }
        }
    }

    fn recording(fail: bool) -> Recording {
        Recording {
            seen: Mutex::new(Vec::new()),
            fail,
        }
    }

    #[tokio::test]
    async fn translates() {
        let t = recording(false);
        let r = translate_title(&t, " Программист ").await;
        assert_eq!(r, Rendered::Converted("EN:Программист".into()));
    }

    #[tokio::test]
    async fn failure_keeps_original() {
        let t = recording(true);
        let r = translate_title(&t, "Программист").await;
        assert_eq!(r, Rendered::Unchanged("Программист".into()));
    }

    #[tokio::test]
    async fn empty_input_skips_the_call() {
        let t = recording(false);
        let r = translate_title(&t, "   ").await;
        assert!(matches!(r, Rendered::Unchanged(_)));
        assert!(t.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_input_is_truncated() {
        let t = recording(false);
        let long = "я".repeat(MAX_TRANSLATION_CHARS + 50);
        translate_title(&t, &long).await;
        let seen = t.seen.lock().unwrap();
        assert_eq!(seen[0].chars().count(), MAX_TRANSLATION_CHARS);
    }

    #[test]
    fn gtx_payload() {
        let payload = serde_json::json!([[["Senior ", "Старший ", null], ["developer", "разработчик", null]], null, "ru"]);
        assert_eq!(parse_gtx_payload(&payload).unwrap(), "Senior developer");
        assert!(parse_gtx_payload(&serde_json::json!({})).is_err());
    }
}
