use crate::ai::GenerativeModel;
use crate::error::SessionError;
use crate::model::{ChatMessage, PracticeFeedback};
use crate::practice::{AssistantReply, TurnOutcome, TurnRequest, UserInput, run_turn};
use crate::prompt::PromptLibrary;
use crate::scenario::PracticeConfig;
use anyhow::Result;
use serde::Serialize;

/// Shown in place of the user's words while their turn is processed.
pub const PENDING_USER_TEXT: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Listening,
    Processing,
    Speaking,
    Paused,
    ReadyToListen,
}

/// Conversation state of one spoken practice session.
///
/// The runtime owns playback and recording; it reports those through the
/// `playback_*` and `listening_started` methods while this type owns the
/// transcript and decides which phase comes next.
#[derive(Debug)]
pub struct PracticeSession {
    config: PracticeConfig,
    messages: Vec<ChatMessage>,
    phase: SessionPhase,
    feedback: Option<PracticeFeedback>,
    started: bool,
}

impl PracticeSession {
    pub fn new(config: PracticeConfig) -> Self {
        Self {
            config,
            messages: Vec::new(),
            phase: SessionPhase::Idle,
            feedback: None,
            started: false,
        }
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn feedback(&self) -> Option<&PracticeFeedback> {
        self.feedback.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.feedback.is_some()
    }

    /// Asks the model for its opening line.
    ///
    /// On success the opening becomes the only message and the session is
    /// `Speaking`. On failure it falls back to `Idle` with no messages.
    pub async fn start<M>(&mut self, model: &M, prompts: &PromptLibrary) -> Result<AssistantReply>
    where
        M: GenerativeModel + ?Sized,
    {
        if self.phase == SessionPhase::Processing {
            return Err(SessionError::Busy.into());
        }
        self.phase = SessionPhase::Processing;
        self.messages.clear();
        self.feedback = None;

        let request = TurnRequest {
            config: &self.config,
            history: &[],
            input: None,
        };
        let result = match run_turn(model, prompts, request).await {
            Ok(TurnOutcome::Reply(reply)) => Ok(reply),
            Ok(TurnOutcome::Complete { .. }) => Err(anyhow::anyhow!(
                "The AI model ended the session before it started"
            )),
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => {
                self.messages = vec![
                    ChatMessage::assistant(&reply.display_response).with_audio(&reply.audio_data_uri),
                ];
                self.started = true;
                self.phase = SessionPhase::Speaking;
                tracing::info!("Practice session started ({})", self.config.scenario);
                Ok(reply)
            }
            Err(e) => {
                tracing::error!("Failed to start practice session: {:#}", e);
                self.phase = SessionPhase::Idle;
                Err(e)
            }
        }
    }

    /// Sends the user's turn and applies the outcome.
    ///
    /// While the turn is in flight a `"..."` placeholder stands in for the
    /// user's message. A reply replaces it with the real text and appends the
    /// assistant line. Completion stores the feedback and ends the session.
    /// On failure the messages are restored and the session is ready to
    /// listen again.
    pub async fn respond<M>(
        &mut self,
        model: &M,
        prompts: &PromptLibrary,
        input: &UserInput,
    ) -> Result<TurnOutcome>
    where
        M: GenerativeModel + ?Sized,
    {
        if !self.started {
            return Err(SessionError::NotStarted.into());
        }
        if self.phase == SessionPhase::Processing {
            return Err(SessionError::Busy.into());
        }

        self.phase = SessionPhase::Processing;
        let history = self.messages.clone();
        self.messages.push(ChatMessage::user(PENDING_USER_TEXT));

        let request = TurnRequest {
            config: &self.config,
            history: &history,
            input: Some(input),
        };
        let result = run_turn(model, prompts, request).await;
        self.messages = history;

        match result {
            Ok(TurnOutcome::Complete { feedback }) => {
                self.feedback = Some(feedback.clone());
                self.phase = SessionPhase::Idle;
                Ok(TurnOutcome::Complete { feedback })
            }
            Ok(TurnOutcome::Reply(reply)) => {
                let user_text = reply.transcribed_user_text.clone().unwrap_or_default();
                self.messages.push(ChatMessage::user(user_text));
                self.messages.push(
                    ChatMessage::assistant(&reply.display_response).with_audio(&reply.audio_data_uri),
                );
                self.phase = SessionPhase::Speaking;
                Ok(TurnOutcome::Reply(reply))
            }
            Err(e) => {
                tracing::warn!("Practice turn failed: {:#}", e);
                self.phase = SessionPhase::ReadyToListen;
                Err(e)
            }
        }
    }

    pub fn listening_started(&mut self) {
        if matches!(self.phase, SessionPhase::ReadyToListen | SessionPhase::Speaking) {
            self.phase = SessionPhase::Listening;
        }
    }

    pub fn playback_started(&mut self) {
        if self.phase != SessionPhase::Idle {
            self.phase = SessionPhase::Speaking;
        }
    }

    pub fn playback_paused(&mut self) {
        if self.phase == SessionPhase::Speaking {
            self.phase = SessionPhase::Paused;
        }
    }

    pub fn playback_finished(&mut self) {
        if matches!(self.phase, SessionPhase::Speaking | SessionPhase::Paused) {
            self.phase = SessionPhase::ReadyToListen;
        }
    }

    /// Cuts the assistant off so the user can speak.
    pub fn interrupt(&mut self) {
        if matches!(self.phase, SessionPhase::Speaking | SessionPhase::Paused) {
            tracing::debug!("Assistant interrupted");
            self.phase = SessionPhase::ReadyToListen;
        }
    }

    /// Discards the conversation and returns to `Idle`.
    pub fn end(&mut self) {
        self.messages.clear();
        self.feedback = None;
        self.started = false;
        self.phase = SessionPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockGenerativeModel;
    use crate::practice::tests::{PCM_URI, sample_feedback};
    use crate::scenario::Scenario;
    use serde_json::json;

    fn reply_model(response: &'static str) -> MockGenerativeModel {
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_structured()
            .returning(move |_, _| Ok(json!({"response": response, "isSessionComplete": false})));
        model
            .expect_synthesize_speech()
            .returning(|_, _| Ok(PCM_URI.to_string()));
        model
    }

    async fn started_session() -> PracticeSession {
        let mut session = PracticeSession::new(PracticeConfig::new(Scenario::Random));
        session
            .start(&reply_model("[uhm] What if humans could fly?"), &PromptLibrary::default())
            .await
            .unwrap();
        session.playback_finished();
        session
    }

    #[tokio::test]
    async fn test_start_sets_single_opening_message() {
        let session = started_session().await;

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].text, "What if humans could fly?");
        assert!(session.messages()[0].audio_url.is_some());
        assert_eq!(session.phase(), SessionPhase::ReadyToListen);
    }

    #[tokio::test]
    async fn test_start_failure_returns_to_idle() {
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_structured()
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));
        let mut session = PracticeSession::new(PracticeConfig::new(Scenario::Random));

        assert!(session.start(&model, &PromptLibrary::default()).await.is_err());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_respond_before_start_is_rejected() {
        let model = MockGenerativeModel::new();
        let mut session = PracticeSession::new(PracticeConfig::new(Scenario::Random));

        let err = session
            .respond(&model, &PromptLibrary::default(), &UserInput::Text("hi".into()))
            .await
            .unwrap_err();

        assert_eq!(err.downcast_ref::<SessionError>(), Some(&SessionError::NotStarted));
    }

    #[tokio::test]
    async fn test_reply_appends_user_and_assistant_messages() {
        // Arrange
        let mut session = started_session().await;
        let mut model = MockGenerativeModel::new();
        model
            .expect_transcribe()
            .returning(|_| Ok("I'd never take the bus again.".to_string()));
        model
            .expect_generate_structured()
            .returning(|_, _| Ok(json!({"response": "[laughing] Fair enough!", "isSessionComplete": false})));
        model
            .expect_synthesize_speech()
            .returning(|_, _| Ok(PCM_URI.to_string()));

        // Act
        session.listening_started();
        let outcome = session
            .respond(&model, &PromptLibrary::default(), &UserInput::Audio("data:audio/webm;base64,AAAA".into()))
            .await
            .unwrap();

        // Assert
        assert!(matches!(outcome, TurnOutcome::Reply(_)));
        let texts: Vec<&str> = session.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["What if humans could fly?", "I'd never take the bus again.", "Fair enough!"]
        );
        assert_eq!(session.phase(), SessionPhase::Speaking);
    }

    #[tokio::test]
    async fn test_failed_turn_restores_messages() {
        let mut session = started_session().await;
        let mut model = MockGenerativeModel::new();
        model
            .expect_generate_structured()
            .returning(|_, _| Err(anyhow::anyhow!("status 503 Service Unavailable")));
        model.expect_synthesize_speech().never();

        let result = session
            .respond(&model, &PromptLibrary::default(), &UserInput::Text("Hello?".into()))
            .await;

        assert!(result.is_err());
        assert_eq!(session.messages().len(), 1);
        assert!(session.messages().iter().all(|m| m.text != PENDING_USER_TEXT));
        assert_eq!(session.phase(), SessionPhase::ReadyToListen);
    }

    #[tokio::test]
    async fn test_silent_recording_is_rejected() {
        let mut session = started_session().await;
        let mut model = MockGenerativeModel::new();
        model.expect_transcribe().returning(|_| Ok("  ".to_string()));
        model.expect_generate_structured().never();
        model.expect_synthesize_speech().never();

        session.listening_started();
        let err = session
            .respond(&model, &PromptLibrary::default(), &UserInput::Audio("data:audio/webm;base64,AAAA".into()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("did not return a valid response"));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].text, "What if humans could fly?");
        assert_eq!(session.phase(), SessionPhase::ReadyToListen);
    }

    #[tokio::test]
    async fn test_completion_stores_feedback() {
        let mut session = started_session().await;
        let mut model = MockGenerativeModel::new();
        model.expect_generate_structured().returning(|_, _| {
            Ok(json!({
                "response": "Thanks!",
                "isSessionComplete": true,
                "feedback": serde_json::to_value(sample_feedback()).unwrap()
            }))
        });
        model.expect_synthesize_speech().never();

        let outcome = session
            .respond(&model, &PromptLibrary::default(), &UserInput::Text("Bye.".into()))
            .await
            .unwrap();

        assert_eq!(outcome, TurnOutcome::Complete { feedback: sample_feedback() });
        assert_eq!(session.feedback(), Some(&sample_feedback()));
        assert!(session.is_complete());
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_playback_transitions() {
        let mut session = PracticeSession::new(PracticeConfig::new(Scenario::Random));
        session.phase = SessionPhase::Speaking;

        session.playback_paused();
        assert_eq!(session.phase(), SessionPhase::Paused);

        session.playback_started();
        assert_eq!(session.phase(), SessionPhase::Speaking);

        session.interrupt();
        assert_eq!(session.phase(), SessionPhase::ReadyToListen);

        session.listening_started();
        assert_eq!(session.phase(), SessionPhase::Listening);

        session.end();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.messages().is_empty());
    }
}
