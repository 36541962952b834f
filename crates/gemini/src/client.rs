use crate::types::{
    Blob, ErrorResponse, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};

pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// A client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// Sends one `generateContent` request.
    ///
    /// Non-2xx responses are turned into errors carrying the HTTP status and
    /// the provider's message, e.g. `status 429 Too Many Requests: quota exceeded`.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        tracing::debug!("generateContent request to model {}", model);

        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .context("Failed to reach the Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .context("Failed to deserialize Gemini response")
    }

    /// Asks for structured output and returns the parsed JSON value.
    pub async fn generate_json(
        &self,
        model: &str,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let request = GenerateContentRequest::user(vec![Part::text(prompt)])
            .with_generation_config(GenerationConfig::json(schema));

        let response = self.generate_content(model, &request).await?;
        let text = response_text(&response)?;
        serde_json::from_str(&text)
            .with_context(|| format!("Model returned invalid JSON: {text}"))
    }

    /// Sends an audio clip together with an instruction and returns the text answer.
    pub async fn transcribe(&self, model: &str, audio: Blob, instruction: &str) -> Result<String> {
        let request = GenerateContentRequest::user(vec![
            Part::inline(audio.mime_type, audio.data),
            Part::text(instruction),
        ]);

        let response = self.generate_content(model, &request).await?;
        response_text(&response).map(|t| t.trim().to_string())
    }

    /// Synthesizes `text` with a prebuilt voice, returning the raw audio blob.
    pub async fn synthesize_speech(&self, model: &str, text: &str, voice_name: &str) -> Result<Blob> {
        let request = GenerateContentRequest::user(vec![Part::text(text)])
            .with_generation_config(GenerationConfig::speech(voice_name));

        let response = self.generate_content(model, &request).await?;
        response
            .inline_data()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("TTS model did not return audio media"))
    }
}

fn response_text(response: &GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.block_reason() {
        anyhow::bail!("Gemini blocked the prompt: {reason}");
    }
    response.text().ok_or_else(|| match response.finish_reason() {
        Some(reason) => {
            anyhow::anyhow!("The AI model did not return a valid response (finish reason {reason})")
        }
        None => anyhow::anyhow!("The AI model did not return a valid response"),
    })
}

fn api_error(status: StatusCode, body: &str) -> anyhow::Error {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.trim().to_string());
    tracing::warn!("Gemini API returned {}: {}", status, message);
    anyhow::anyhow!("Gemini API request failed with status {status}: {message}")
}
