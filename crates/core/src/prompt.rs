//! Prompt templates and their interpolation.
//!
//! Templates are Markdown with `{placeholder}` markers. The defaults are
//! compiled in; a prompts directory can replace any of them by file stem.

use crate::model::ChatMessage;
use crate::prompt_loader::load_prompts;
use crate::scenario::PracticeConfig;
use anyhow::Result;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

pub const PRACTICE_TURN: &str = "practice_turn";
pub const OPENING_QUESTION: &str = "opening_question";
pub const FOLLOW_UP_QUESTION: &str = "follow_up_question";
pub const INTERVIEW_FEEDBACK: &str = "interview_feedback";
pub const EXPRESSIVE_SPEECH: &str = "expressive_speech";
pub const TRANSCRIBE: &str = "transcribe";

const DEFAULT_TEMPLATES: [(&str, &str); 6] = [
    (PRACTICE_TURN, include_str!("../prompts/practice_turn.md")),
    (OPENING_QUESTION, include_str!("../prompts/opening_question.md")),
    (FOLLOW_UP_QUESTION, include_str!("../prompts/follow_up_question.md")),
    (INTERVIEW_FEEDBACK, include_str!("../prompts/interview_feedback.md")),
    (EXPRESSIVE_SPEECH, include_str!("../prompts/expressive_speech.md")),
    (TRANSCRIBE, include_str!("../prompts/transcribe.md")),
];

const RANDOM_TOPIC_SECTION: &str = "**Conversation Topic:** You MUST invent a creative, engaging, and random conversation starter. Be creative and avoid repeating the same subject every time, for example \"What if humans could photosynthesize?\", \"What's the most useless superpower you can think of?\" or \"Describe the perfect sandwich.\"";
const NEW_SESSION_SECTION: &str = "**This is a new session. Your task is to start the conversation based on the rules and scenario above.**";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<String, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self {
            templates: DEFAULT_TEMPLATES
                .iter()
                .map(|(key, body)| (key.to_string(), body.to_string()))
                .collect(),
        }
    }
}

impl PromptLibrary {
    /// Defaults overridden by the `*.md` files found in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Ok(Self::default().with_overrides(load_prompts(dir)?))
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        for (key, body) in overrides {
            if self.templates.contains_key(&key) {
                tracing::info!("Using prompt override for '{}'", key);
                self.templates.insert(key, body);
            } else {
                tracing::warn!("Ignoring unknown prompt template '{}'", key);
            }
        }
        self
    }

    fn template(&self, key: &str) -> &str {
        self.templates.get(key).map(String::as_str).unwrap_or_default()
    }

    /// Instruction for one practice turn.
    ///
    /// `latest_user_text` is `None` (or empty) when the conversation is just starting.
    pub fn practice_turn(
        &self,
        config: &PracticeConfig,
        history: &[ChatMessage],
        latest_user_text: Option<&str>,
    ) -> String {
        let topic_section = if config.is_random_topic() {
            RANDOM_TOPIC_SECTION.to_string()
        } else {
            match config.topic.as_deref().map(str::trim) {
                Some(topic) if !topic.is_empty() => format!("**Conversation Topic:** {topic}"),
                _ => String::new(),
            }
        };
        let setting_section = config
            .setting
            .map(|setting| format!("**Setting:** {setting}"))
            .unwrap_or_default();
        let latest_section = match latest_user_text.filter(|text| !text.is_empty()) {
            Some(text) => format!("**LATEST USER RESPONSE (from transcription):**\nuser: {text}"),
            None => NEW_SESSION_SECTION.to_string(),
        };
        let history = render_history(history);

        render(
            self.template(PRACTICE_TURN),
            &[
                ("scenario", config.scenario.persona()),
                ("topic_section", &topic_section),
                ("setting_section", &setting_section),
                ("history", &history),
                ("latest_section", &latest_section),
            ],
        )
    }

    pub fn opening_question(&self, job_role: &str) -> String {
        render(self.template(OPENING_QUESTION), &[("job_role", job_role)])
    }

    pub fn follow_up_question(
        &self,
        job_role: &str,
        previous_question: &str,
        user_response: &str,
        transcript: &str,
    ) -> String {
        render(
            self.template(FOLLOW_UP_QUESTION),
            &[
                ("job_role", job_role),
                ("previous_question", previous_question),
                ("user_response", user_response),
                ("transcript", transcript),
            ],
        )
    }

    pub fn interview_feedback(&self, job_description: &str, transcript: &str) -> String {
        render(
            self.template(INTERVIEW_FEEDBACK),
            &[("job_description", job_description), ("transcript", transcript)],
        )
    }

    pub fn expressive_speech(&self, text: &str) -> String {
        render(self.template(EXPRESSIVE_SPEECH), &[("text", text)])
    }

    pub fn transcribe_instruction(&self) -> &str {
        self.template(TRANSCRIBE).trim()
    }
}

/// Substitutes `{name}` markers in a single pass. Unknown markers are left as-is,
/// and substituted values are never re-scanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match vars.iter().find(|(key, _)| *key == name) {
                Some((_, value)) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// `role: content` lines, skipping messages without content.
pub fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .filter(|message| !message.text.is_empty())
        .map(|message| format!("{}: {}", message.role.as_str(), message.text))
        .collect::<Vec<_>>()
        .join("\n")
}
