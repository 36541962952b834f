//! One conversational turn of a spoken practice session.
//!
//! A turn is strictly sequential: transcribe the user's clip (if any), ask the
//! model for the next line, then synthesize that line unless the model ended
//! the session with feedback.

use crate::ai::GenerativeModel;
use crate::cues::strip_cues;
use crate::model::{ChatMessage, PracticeFeedback};
use crate::prompt::PromptLibrary;
use crate::scenario::PracticeConfig;
use anyhow::{Context, Result};
use interview_native_utils::PcmFormat;
use interview_native_utils::data_uri;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// What the user contributed to a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserInput {
    /// A recorded clip as a `data:` URI.
    Audio(String),
    /// Typed text, used as-is without transcription.
    Text(String),
}

/// Structured output requested from the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTurn {
    /// Full line including bracketed delivery cues.
    pub response: String,
    #[serde(default)]
    pub is_session_complete: bool,
    #[serde(default)]
    pub feedback: Option<PracticeFeedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    /// The line as synthesized, cues included.
    pub spoken_response: String,
    /// The line with cues removed.
    pub display_response: String,
    /// WAV audio as a `data:audio/wav;base64,` URI.
    pub audio_data_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcribed_user_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TurnOutcome {
    Reply(AssistantReply),
    Complete { feedback: PracticeFeedback },
}

pub struct TurnRequest<'a> {
    pub config: &'a PracticeConfig,
    /// Conversation so far, not including `input`.
    pub history: &'a [ChatMessage],
    pub input: Option<&'a UserInput>,
}

/// JSON schema for `ModelTurn`, in the subset the structured-output API accepts.
pub fn model_turn_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "response": {
                "type": "STRING",
                "description": "The full response including expressive cues in brackets like [short pause] or [sigh]. If the session is over, the concluding remark."
            },
            "isSessionComplete": {
                "type": "BOOLEAN",
                "description": "True only when the conversation has reached its natural conclusion and feedback is due."
            },
            "feedback": {
                "type": "OBJECT",
                "description": "Structured feedback, provided only when isSessionComplete is true.",
                "properties": {
                    "overallSummary": { "type": "STRING" },
                    "clarity": { "type": "STRING" },
                    "relevance": { "type": "STRING" },
                    "problemSolving": { "type": "STRING" }
                },
                "required": ["overallSummary", "clarity", "relevance", "problemSolving"]
            }
        },
        "required": ["response", "isSessionComplete"]
    })
}

pub async fn run_turn<M>(model: &M, prompts: &PromptLibrary, request: TurnRequest<'_>) -> Result<TurnOutcome>
where
    M: GenerativeModel + ?Sized,
{
    let user_text = match request.input {
        Some(UserInput::Audio(audio_data_uri)) => Some(
            model
                .transcribe(audio_data_uri)
                .await
                .context("Failed to transcribe the user's audio")?
                .trim()
                .to_string(),
        ),
        Some(UserInput::Text(text)) => Some(text.trim().to_string()),
        None => None,
    };
    // A turn with nothing said would read to the model as a fresh session.
    if user_text.as_deref().is_some_and(str::is_empty) {
        anyhow::bail!("The AI model did not return a valid response");
    }

    let prompt = prompts.practice_turn(request.config, request.history, user_text.as_deref());
    let value = model
        .generate_structured(&prompt, &model_turn_schema())
        .await
        .context("Failed to generate the conversation response")?;
    let turn: ModelTurn =
        serde_json::from_value(value).context("The AI model did not return a valid response")?;

    if turn.is_session_complete {
        match turn.feedback {
            Some(feedback) => {
                tracing::info!("Practice session concluded by the model");
                return Ok(TurnOutcome::Complete { feedback });
            }
            None => tracing::warn!("Model marked the session complete without feedback"),
        }
    }

    let display_response = strip_cues(&turn.response);
    if display_response.is_empty() {
        anyhow::bail!("The AI model did not return a valid response");
    }

    let pcm_uri = model
        .synthesize_speech(&turn.response, request.config.voice)
        .await
        .context("Failed to synthesize the spoken response")?;
    let audio_data_uri = data_uri::pcm_uri_to_wav_uri(&pcm_uri, PcmFormat::default())
        .context("Failed to convert synthesized audio to WAV")?;

    Ok(TurnOutcome::Reply(AssistantReply {
        spoken_response: turn.response,
        display_response,
        audio_data_uri,
        transcribed_user_text: user_text,
    }))
}
