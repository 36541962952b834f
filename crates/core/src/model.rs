use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    #[serde(rename = "user")]
    User,
    /// Older history entries call the interviewer "ai". They are read as
    /// `Assistant` and written back as "assistant", so a history file saved
    /// here no longer matches what those older writers produced.
    #[serde(rename = "assistant", alias = "ai")]
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    /// Spoken version of the message as a `data:` URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            audio_url: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
            audio_url: None,
        }
    }

    pub fn with_audio(mut self, audio_url: impl Into<String>) -> Self {
        self.audio_url = Some(audio_url.into());
        self
    }
}

/// Feedback attached to a finished role-specific interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewFeedback {
    pub communication_skills: String,
    pub technical_knowledge: String,
    pub areas_for_improvement: String,
    pub overall_feedback: String,
}

/// Feedback returned when a spoken practice conversation concludes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeFeedback {
    pub overall_summary: String,
    pub clarity: String,
    pub relevance: String,
    pub problem_solving: String,
}

/// One persisted mock interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    pub id: String,
    pub job_role: String,
    pub messages: Vec<ChatMessage>,
    /// Epoch milliseconds.
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<InterviewFeedback>,
}

impl InterviewSession {
    pub fn new(id: impl Into<String>, job_role: impl Into<String>, start_time: i64) -> Self {
        Self {
            id: id.into(),
            job_role: job_role.into(),
            messages: Vec::new(),
            start_time,
            end_time: None,
            feedback: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Number of questions the interviewer has asked so far.
    pub fn questions_asked(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .count()
    }

    /// The conversation as `role: text` lines.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
