//! Text-based role-specific mock interview: one opening question, follow-ups
//! until the question limit, then written feedback.

use crate::ai::GenerativeModel;
use crate::model::{ChatMessage, InterviewFeedback, InterviewSession, MessageRole, now_millis};
use crate::prompt::PromptLibrary;
use crate::scenario::Voice;
use crate::storage::{KeyValueStore, SessionHistory};
use anyhow::{Context, Result};
use interview_native_utils::PcmFormat;
use interview_native_utils::data_uri;
use serde::Deserialize;
use serde_json::{Value, json};

pub const MAX_QUESTIONS: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningQuestion {
    question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowUpQuestion {
    follow_up_question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpressiveText {
    #[serde(default)]
    expressive_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// Blank answers are dropped without touching the session.
    Ignored,
    NextQuestion(String),
    Finished,
}

/// Object schema with a single required string property.
fn string_schema(field: &str) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(field.to_string(), json!({ "type": "STRING" }));
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": [field]
    })
}

fn feedback_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "communicationSkills": {
                "type": "STRING",
                "description": "Clarity, conciseness and active listening."
            },
            "technicalKnowledge": {
                "type": "STRING",
                "description": "Technical knowledge relevant to the job role."
            },
            "areasForImprovement": { "type": "STRING" },
            "overallFeedback": { "type": "STRING" }
        },
        "required": ["communicationSkills", "technicalKnowledge", "areasForImprovement", "overallFeedback"]
    })
}

pub struct InterviewCoach<'a, M: ?Sized, S> {
    model: &'a M,
    prompts: &'a PromptLibrary,
    history: &'a SessionHistory<S>,
}

impl<'a, M, S> InterviewCoach<'a, M, S>
where
    M: GenerativeModel + ?Sized,
    S: KeyValueStore,
{
    pub fn new(model: &'a M, prompts: &'a PromptLibrary, history: &'a SessionHistory<S>) -> Self {
        Self {
            model,
            prompts,
            history,
        }
    }

    /// Resumes the stored session `id`, or opens a new one with its first question.
    pub async fn begin(&self, id: &str, job_role: &str) -> Result<InterviewSession> {
        if let Some(existing) = self.history.find(id) {
            tracing::info!("Resuming interview {}", id);
            return Ok(existing);
        }

        let value = self
            .model
            .generate_structured(&self.prompts.opening_question(job_role), &string_schema("question"))
            .await
            .context("Failed to generate the opening question")?;
        let opening: OpeningQuestion =
            serde_json::from_value(value).context("The AI model did not return a valid question")?;

        let mut session = InterviewSession::new(id, job_role, now_millis());
        session
            .messages
            .push(ChatMessage::assistant(opening.question));
        self.history.save(&session);
        tracing::info!("Started interview {} for '{}'", id, job_role);
        Ok(session)
    }

    /// Records an answer, then either asks the next question or finishes the interview.
    pub async fn answer(&self, session: &mut InterviewSession, text: &str) -> Result<AnswerOutcome> {
        let text = text.trim();
        if text.is_empty() || session.is_finished() {
            return Ok(AnswerOutcome::Ignored);
        }

        session.messages.push(ChatMessage::user(text));
        self.history.save(session);

        if session.questions_asked() >= MAX_QUESTIONS {
            self.finish(session).await?;
            return Ok(AnswerOutcome::Finished);
        }

        let previous_question = session
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.text.clone())
            .unwrap_or_default();
        let prompt = self.prompts.follow_up_question(
            &session.job_role,
            &previous_question,
            text,
            &session.transcript(),
        );
        let value = self
            .model
            .generate_structured(&prompt, &string_schema("followUpQuestion"))
            .await
            .context("Failed to generate the next question")?;
        let next: FollowUpQuestion =
            serde_json::from_value(value).context("The AI model did not return a valid question")?;

        session
            .messages
            .push(ChatMessage::assistant(&next.follow_up_question));
        self.history.save(session);
        Ok(AnswerOutcome::NextQuestion(next.follow_up_question))
    }

    /// Closes the interview. The end time is recorded and saved even when
    /// feedback generation fails; that failure is still returned.
    pub async fn finish(&self, session: &mut InterviewSession) -> Result<()> {
        let prompt = self
            .prompts
            .interview_feedback(&session.job_role, &session.transcript());
        let feedback = self
            .model
            .generate_structured(&prompt, &feedback_schema())
            .await
            .context("Failed to generate interview feedback")
            .and_then(|value| {
                serde_json::from_value::<InterviewFeedback>(value)
                    .context("The AI model did not return valid feedback")
            });

        session.end_time = Some(now_millis());
        match feedback {
            Ok(feedback) => {
                session.feedback = Some(feedback);
                self.history.save(session);
                tracing::info!("Interview {} finished", session.id);
                Ok(())
            }
            Err(e) => {
                self.history.save(session);
                Err(e)
            }
        }
    }

    /// Reads `text` aloud in the coach's voice, returning a WAV `data:` URI.
    pub async fn speak(&self, text: &str) -> Result<String> {
        let rewritten = self
            .model
            .generate_structured(&self.prompts.expressive_speech(text), &string_schema("expressiveText"))
            .await
            .context("Failed to add expressive cues")?;
        let expressive: ExpressiveText = serde_json::from_value(rewritten)
            .context("The AI model did not return valid expressive text")?;
        let to_speak = if expressive.expressive_text.trim().is_empty() {
            text
        } else {
            expressive.expressive_text.as_str()
        };

        let pcm_uri = self
            .model
            .synthesize_speech(to_speak, Voice::default())
            .await
            .context("Failed to synthesize speech")?;
        Ok(data_uri::pcm_uri_to_wav_uri(&pcm_uri, PcmFormat::default())?)
    }
}

/// `(asked, limit)` for progress displays.
pub fn progress(session: &InterviewSession) -> (usize, usize) {
    (session.questions_asked().min(MAX_QUESTIONS), MAX_QUESTIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockGenerativeModel;
    use crate::practice::tests::PCM_URI;
    use crate::storage::MemoryStore;
    use mockall::predicate::eq;

    fn feedback_json() -> Value {
        json!({
            "communicationSkills": "Concise.",
            "technicalKnowledge": "Strong SQL.",
            "areasForImprovement": "Quantify impact.",
            "overallFeedback": "Well done."
        })
    }

    fn session_with_questions(n: usize) -> InterviewSession {
        let mut session = InterviewSession::new("s1", "Data Analyst", 10);
        for i in 0..n {
            session.messages.push(ChatMessage::assistant(format!("Q{i}")));
            if i + 1 < n {
                session.messages.push(ChatMessage::user(format!("A{i}")));
            }
        }
        session
    }

    #[tokio::test]
    async fn test_begin_asks_opening_question_and_saves() {
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_structured()
            .withf(|prompt, _| prompt.contains("Data Analyst"))
            .times(1)
            .returning(|_, _| Ok(json!({"question": "How do you clean messy data?"})));
        let prompts = PromptLibrary::default();
        let history = SessionHistory::new(MemoryStore::default());
        let coach = InterviewCoach::new(&model, &prompts, &history);

        let session = coach.begin("s1", "Data Analyst").await.unwrap();

        assert_eq!(session.messages, vec![ChatMessage::assistant("How do you clean messy data?")]);
        assert_eq!(history.find("s1"), Some(session.clone()));

        // A second begin resumes without another model call.
        let resumed = coach.begin("s1", "Data Analyst").await.unwrap();
        assert_eq!(resumed, session);
    }

    #[tokio::test]
    async fn test_blank_answer_is_ignored() {
        let mut model = MockGenerativeModel::new();
        model.expect_generate_structured().never();
        let prompts = PromptLibrary::default();
        let history = SessionHistory::new(MemoryStore::default());
        let coach = InterviewCoach::new(&model, &prompts, &history);
        let mut session = session_with_questions(1);

        let outcome = coach.answer(&mut session, "   ").await.unwrap();

        assert_eq!(outcome, AnswerOutcome::Ignored);
        assert_eq!(session.messages.len(), 1);
        assert!(history.find("s1").is_none());
    }

    #[tokio::test]
    async fn test_answer_asks_follow_up() {
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_structured()
            .withf(|prompt, _| prompt.contains("Q0") && prompt.contains("I use pandas."))
            .times(1)
            .returning(|_, _| Ok(json!({"followUpQuestion": "Why pandas over SQL?"})));
        let prompts = PromptLibrary::default();
        let history = SessionHistory::new(MemoryStore::default());
        let coach = InterviewCoach::new(&model, &prompts, &history);
        let mut session = session_with_questions(1);

        let outcome = coach.answer(&mut session, "I use pandas.").await.unwrap();

        assert_eq!(outcome, AnswerOutcome::NextQuestion("Why pandas over SQL?".to_string()));
        assert_eq!(session.messages.len(), 3);
        assert_eq!(progress(&session), (2, MAX_QUESTIONS));
        assert_eq!(history.find("s1").unwrap().messages.len(), 3);
    }

    #[tokio::test]
    async fn test_answer_to_last_question_finishes() {
        // Arrange: five questions asked, the last one unanswered.
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_structured()
            .withf(|prompt, _| prompt.contains("experienced interview coach"))
            .times(1)
            .returning(|_, _| Ok(feedback_json()));
        let prompts = PromptLibrary::default();
        let history = SessionHistory::new(MemoryStore::default());
        let coach = InterviewCoach::new(&model, &prompts, &history);
        let mut session = session_with_questions(MAX_QUESTIONS);

        // Act
        let outcome = coach.answer(&mut session, "Final answer.").await.unwrap();

        // Assert
        assert_eq!(outcome, AnswerOutcome::Finished);
        assert!(session.end_time.is_some());
        assert_eq!(session.feedback.as_ref().unwrap().overall_feedback, "Well done.");
        assert_eq!(history.find("s1"), Some(session));
    }

    #[tokio::test]
    async fn test_finish_failure_still_ends_session() {
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_structured()
            .returning(|_, _| Err(anyhow::anyhow!("status 500 Internal Server Error")));
        let prompts = PromptLibrary::default();
        let history = SessionHistory::new(MemoryStore::default());
        let coach = InterviewCoach::new(&model, &prompts, &history);
        let mut session = session_with_questions(2);

        assert!(coach.finish(&mut session).await.is_err());

        let stored = history.find("s1").unwrap();
        assert!(stored.end_time.is_some());
        assert!(stored.feedback.is_none());
    }

    #[tokio::test]
    async fn test_speak_falls_back_to_original_text() {
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_structured()
            .returning(|_, _| Ok(json!({"expressiveText": ""})));
        model
            .expect_synthesize_speech()
            .with(eq("Great answer."), eq(Voice::Algenib))
            .times(1)
            .returning(|_, _| Ok(PCM_URI.to_string()));
        let prompts = PromptLibrary::default();
        let history = SessionHistory::new(MemoryStore::default());
        let coach = InterviewCoach::new(&model, &prompts, &history);

        let uri = coach.speak("Great answer.").await.unwrap();

        assert!(uri.starts_with("data:audio/wav;base64,"));
    }
}
