use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use interview_core::interview::InterviewCoach;
use interview_core::practice::{TurnOutcome, UserInput};
use interview_core::session::{PracticeSession, SessionPhase};
use interview_core::storage::{KeyValueStore, SessionHistory};
use interview_core::{
    GenerativeModel, InterviewSession, PracticeConfig, PromptLibrary, SessionError, SharedModel,
    UserNotice,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

type SharedPractice = Arc<Mutex<PracticeSession>>;

/// Practice sessions untouched for this long are dropped when a new one starts.
pub const PRACTICE_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct PracticeEntry {
    session: SharedPractice,
    last_used: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub model: SharedModel,
    pub prompts: Arc<PromptLibrary>,
    pub history: Arc<SessionHistory<Arc<dyn KeyValueStore>>>,
    practice: Arc<Mutex<HashMap<String, PracticeEntry>>>,
    practice_idle_timeout: Duration,
    /// Serializes interview updates; history saves are read-modify-write.
    interviews: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(model: SharedModel, prompts: PromptLibrary, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            model,
            prompts: Arc::new(prompts),
            history: Arc::new(SessionHistory::new(store)),
            practice: Arc::default(),
            practice_idle_timeout: PRACTICE_IDLE_TIMEOUT,
            interviews: Arc::default(),
        }
    }

    pub fn with_practice_idle_timeout(mut self, timeout: Duration) -> Self {
        self.practice_idle_timeout = timeout;
        self
    }

    fn coach(&self) -> InterviewCoach<'_, dyn GenerativeModel + Send + Sync, Arc<dyn KeyValueStore>> {
        InterviewCoach::new(self.model.as_ref(), self.prompts.as_ref(), self.history.as_ref())
    }

    async fn practice_session(&self, id: &str) -> Result<SharedPractice, ApiError> {
        let mut sessions = self.practice.lock().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("practice session {id}")))?;
        entry.last_used = Instant::now();
        Ok(entry.session.clone())
    }

    /// Stores a new session and drops any left idle past the timeout.
    async fn insert_practice(&self, id: String, session: PracticeSession) {
        let mut sessions = self.practice.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_used.elapsed() < self.practice_idle_timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!("Dropped {} idle practice session(s)", evicted);
        }
        sessions.insert(
            id,
            PracticeEntry {
                session: Arc::new(Mutex::new(session)),
                last_used: Instant::now(),
            },
        );
    }
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Busy(SessionError),
    #[error("{0:#}")]
    Ai(anyhow::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<SessionError>() {
            Some(SessionError::Busy) => ApiError::Busy(SessionError::Busy),
            Some(SessionError::NotStarted) => ApiError::BadRequest(err.to_string()),
            None => ApiError::Ai(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Busy(err) => (StatusCode::CONFLICT, err.to_string()),
            ApiError::Ai(err) => {
                tracing::error!("AI request failed: {:#}", err);
                let notice = UserNotice::classify(&err);
                let status = match notice {
                    UserNotice::HighDemand => StatusCode::TOO_MANY_REQUESTS,
                    UserNotice::CommunicationError => StatusCode::BAD_GATEWAY,
                };
                (status, notice.to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!("{}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeResponse {
    pub id: String,
    pub phase: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TurnOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub audio: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInterviewRequest {
    pub job_role: String,
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechResponse {
    pub audio_data_uri: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/practice", post(start_practice))
        .route("/api/practice/{id}", axum::routing::delete(end_practice))
        .route("/api/practice/{id}/turn", post(practice_turn))
        .route("/api/practice/{id}/interrupt", post(interrupt_practice))
        .route("/api/interviews", post(start_interview).get(list_interviews))
        .route("/api/interviews/{id}", get(get_interview))
        .route("/api/interviews/{id}/answers", post(answer_interview))
        .route("/api/interviews/{id}/finish", post(finish_interview))
        .route("/api/speech", post(speak))
        .with_state(state)
}

/// Handler for `POST /api/practice`.
async fn start_practice(
    State(state): State<AppState>,
    Json(config): Json<PracticeConfig>,
) -> Result<Json<PracticeResponse>, ApiError> {
    if config.scenario.needs_topic()
        && config.topic.as_deref().is_none_or(|t| t.trim().is_empty())
    {
        return Err(ApiError::BadRequest(format!(
            "a topic is required for the {} scenario",
            config.scenario
        )));
    }

    let mut session = PracticeSession::new(config);
    let reply = session.start(state.model.as_ref(), &state.prompts).await?;

    let id = uuid::Uuid::new_v4().to_string();
    let phase = session.phase();
    state.insert_practice(id.clone(), session).await;
    tracing::info!("Practice session {} started", id);

    Ok(Json(PracticeResponse {
        id,
        phase,
        outcome: Some(TurnOutcome::Reply(reply)),
    }))
}

/// Handler for `POST /api/practice/{id}/turn`.
///
/// The turn runs on its own task so a dropped connection cannot leave the
/// session half-updated.
async fn practice_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TurnRequest>,
) -> Result<Json<PracticeResponse>, ApiError> {
    let input = match (body.audio, body.text) {
        (Some(audio), _) if !audio.trim().is_empty() => UserInput::Audio(audio),
        (_, Some(text)) if !text.trim().is_empty() => UserInput::Text(text),
        _ => return Err(ApiError::BadRequest("either audio or text is required".to_string())),
    };

    let session = state.practice_session(&id).await?;
    let mut guard = session
        .try_lock_owned()
        .map_err(|_| ApiError::Busy(SessionError::Busy))?;

    let model = state.model.clone();
    let prompts = state.prompts.clone();
    let (outcome, phase) = tokio::spawn(async move {
        guard.listening_started();
        let outcome = guard.respond(model.as_ref(), &prompts, &input).await;
        outcome.map(|o| (o, guard.phase()))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("practice turn task failed: {e}")))??;

    if matches!(outcome, TurnOutcome::Complete { .. }) {
        state.practice.lock().await.remove(&id);
        tracing::info!("Practice session {} completed", id);
    }

    Ok(Json(PracticeResponse {
        id,
        phase,
        outcome: Some(outcome),
    }))
}

/// Handler for `POST /api/practice/{id}/interrupt`.
async fn interrupt_practice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PracticeResponse>, ApiError> {
    let session = state.practice_session(&id).await?;
    let mut guard = session
        .try_lock()
        .map_err(|_| ApiError::Busy(SessionError::Busy))?;
    guard.interrupt();

    Ok(Json(PracticeResponse {
        id,
        phase: guard.phase(),
        outcome: None,
    }))
}

/// Handler for `DELETE /api/practice/{id}`.
async fn end_practice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state.practice.lock().await.remove(&id);
    match removed {
        Some(_) => {
            tracing::info!("Practice session {} ended", id);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::NotFound(format!("practice session {id}"))),
    }
}

/// Handler for `POST /api/interviews`.
async fn start_interview(
    State(state): State<AppState>,
    Json(body): Json<StartInterviewRequest>,
) -> Result<Json<InterviewSession>, ApiError> {
    let job_role = body.job_role.trim();
    if job_role.is_empty() {
        return Err(ApiError::BadRequest("jobRole must not be empty".to_string()));
    }
    let id = body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let _writes = state.interviews.lock().await;
    let coach = state.coach();
    Ok(Json(coach.begin(&id, job_role).await?))
}

/// Handler for `POST /api/interviews/{id}/answers`.
async fn answer_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<InterviewSession>, ApiError> {
    let _writes = state.interviews.lock().await;
    let mut session = state
        .history
        .find(&id)
        .ok_or_else(|| ApiError::NotFound(format!("interview {id}")))?;

    let coach = state.coach();
    coach.answer(&mut session, &body.text).await?;
    Ok(Json(session))
}

/// Handler for `POST /api/interviews/{id}/finish`.
async fn finish_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InterviewSession>, ApiError> {
    let _writes = state.interviews.lock().await;
    let mut session = state
        .history
        .find(&id)
        .ok_or_else(|| ApiError::NotFound(format!("interview {id}")))?;

    if session.feedback.is_none() {
        let coach = state.coach();
        coach.finish(&mut session).await?;
    }
    Ok(Json(session))
}

/// Handler for `GET /api/interviews`.
async fn list_interviews(State(state): State<AppState>) -> Json<Vec<InterviewSession>> {
    Json(state.history.list())
}

/// Handler for `GET /api/interviews/{id}`.
async fn get_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InterviewSession>, ApiError> {
    state
        .history
        .find(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("interview {id}")))
}

/// Handler for `POST /api/speech`.
async fn speak(
    State(state): State<AppState>,
    Json(body): Json<SpeechRequest>,
) -> Result<Json<SpeechResponse>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    let coach = state.coach();
    let audio_data_uri = coach.speak(&body.text).await?;
    Ok(Json(SpeechResponse { audio_data_uri }))
}
