use crate::prompt::PromptLibrary;
use crate::scenario::Voice;
use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_client::types::Blob;
use gemini_client::{DEFAULT_TEXT_MODEL, DEFAULT_TTS_MODEL, GeminiClient};
use interview_native_utils::data_uri;
#[cfg(test)]
use mockall::automock;
use secrecy::SecretString;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_TRANSCRIBE_INSTRUCTION: &str = "Transcribe the audio.";

/// Mime type assumed for recorded clips that arrive without one.
const FALLBACK_AUDIO_MIME: &str = "audio/webm";

/// The three model capabilities the coach relies on.
///
/// Sessions and flows only see this trait, so tests drive them with
/// `MockGenerativeModel` and the services can swap the provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GenerativeModel {
    /// Returns the JSON object produced for `prompt` under `schema`.
    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<Value>;

    /// Turns a recorded clip (`data:` URI) into text.
    async fn transcribe(&self, audio_data_uri: &str) -> Result<String>;

    /// Synthesizes `text`, returning the raw PCM as a `data:` URI whose mime
    /// type carries the sample rate.
    async fn synthesize_speech(&self, text: &str, voice: Voice) -> Result<String>;
}

pub type SharedModel = Arc<dyn GenerativeModel + Send + Sync>;

/// Endpoint, models and prompt overrides shared by every binary.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub text_model: String,
    pub tts_model: String,
    pub prompts_dir: Option<PathBuf>,
}

impl ModelSettings {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: None,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            prompts_dir: None,
        }
    }

    /// Applies `GEMINI_BASE_URL`, `TEXT_MODEL`, `TTS_MODEL` and `PROMPTS_DIR`.
    /// Blank values leave the default in place.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        self.base_url = var("GEMINI_BASE_URL").or(self.base_url);
        if let Some(text_model) = var("TEXT_MODEL") {
            self.text_model = text_model;
        }
        if let Some(tts_model) = var("TTS_MODEL") {
            self.tts_model = tts_model;
        }
        self.prompts_dir = var("PROMPTS_DIR").map(PathBuf::from).or(self.prompts_dir);
        self
    }

    pub fn prompts(&self) -> Result<PromptLibrary> {
        match &self.prompts_dir {
            Some(dir) => PromptLibrary::from_dir(dir),
            None => Ok(PromptLibrary::default()),
        }
    }
}

/// `GenerativeModel` backed by the Gemini REST API.
pub struct GeminiModel {
    client: GeminiClient,
    text_model: String,
    tts_model: String,
    transcribe_instruction: String,
}

impl GeminiModel {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            transcribe_instruction: DEFAULT_TRANSCRIBE_INSTRUCTION.to_string(),
        }
    }

    /// Client and models from `settings`, transcribing with the library's instruction.
    pub fn from_settings(settings: &ModelSettings, prompts: &PromptLibrary) -> Self {
        let mut client = GeminiClient::new(settings.api_key.clone());
        if let Some(base_url) = &settings.base_url {
            client = client.with_base_url(base_url);
        }
        Self::new(client)
            .with_models(&settings.text_model, &settings.tts_model)
            .with_transcribe_instruction(prompts.transcribe_instruction())
    }

    pub fn with_models(mut self, text_model: impl Into<String>, tts_model: impl Into<String>) -> Self {
        self.text_model = text_model.into();
        self.tts_model = tts_model.into();
        self
    }

    pub fn with_transcribe_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.transcribe_instruction = instruction.into();
        self
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<Value> {
        self.client
            .generate_json(&self.text_model, prompt, schema.clone())
            .await
    }

    async fn transcribe(&self, audio_data_uri: &str) -> Result<String> {
        let audio = audio_blob(audio_data_uri)?;
        tracing::debug!("Transcribing {} audio", audio.mime_type);
        self.client
            .transcribe(&self.text_model, audio, &self.transcribe_instruction)
            .await
    }

    async fn synthesize_speech(&self, text: &str, voice: Voice) -> Result<String> {
        let blob = self
            .client
            .synthesize_speech(&self.tts_model, text, voice.name())
            .await?;
        Ok(blob.to_data_uri())
    }
}

fn audio_blob(audio_data_uri: &str) -> Result<Blob> {
    let (mime_type, payload) =
        data_uri::split(audio_data_uri).context("User audio is not a valid data URI")?;
    Ok(Blob {
        mime_type: mime_type.unwrap_or(FALLBACK_AUDIO_MIME).to_string(),
        data: payload.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_blob_from_data_uri() {
        let blob = audio_blob("data:audio/ogg;codecs=opus;base64,AAEC").unwrap();
        assert_eq!(blob.mime_type, "audio/ogg");
        assert_eq!(blob.data, "AAEC");
    }

    #[test]
    fn test_audio_blob_without_header_gets_fallback_mime() {
        let blob = audio_blob("AAEC").unwrap();
        assert_eq!(blob.mime_type, FALLBACK_AUDIO_MIME);
    }

    #[test]
    fn test_audio_blob_rejects_unknown_scheme() {
        assert!(audio_blob("file:/tmp/a.wav,AAEC").is_err());
    }

    #[test]
    fn test_settings_overrides_skip_blank_values() {
        let settings = ModelSettings::new(SecretString::from("key".to_string())).with_overrides(|key| {
            match key {
                "TEXT_MODEL" => Some("gemini-2.0-flash".to_string()),
                "TTS_MODEL" => Some("   ".to_string()),
                "GEMINI_BASE_URL" => Some("http://localhost:9000/v1beta".to_string()),
                _ => None,
            }
        });

        assert_eq!(settings.text_model, "gemini-2.0-flash");
        assert_eq!(settings.tts_model, DEFAULT_TTS_MODEL);
        assert_eq!(settings.prompts_dir, None);

        let model = GeminiModel::from_settings(&settings, &PromptLibrary::default());
        assert_eq!(model.client.base_url(), "http://localhost:9000/v1beta");
        assert_eq!(model.text_model, "gemini-2.0-flash");
        assert_eq!(model.tts_model, DEFAULT_TTS_MODEL);
        assert_eq!(model.transcribe_instruction, "Transcribe the audio.");
    }

    #[test]
    fn test_settings_load_prompt_overrides() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("transcribe.md"), "Write down every word.")?;
        let mut settings = ModelSettings::new(SecretString::from("key".to_string()));
        settings.prompts_dir = Some(dir.path().to_path_buf());

        let prompts = settings.prompts()?;
        let model = GeminiModel::from_settings(&settings, &prompts);

        assert_eq!(model.transcribe_instruction, "Write down every word.");
        Ok(())
    }
}
