pub mod ai;
pub mod cues;
pub mod error;
pub mod interview;
pub mod model;
pub mod practice;
pub mod prompt;
pub mod prompt_loader;
pub mod recording;
pub mod scenario;
pub mod session;
pub mod storage;

pub use ai::{GeminiModel, GenerativeModel, ModelSettings, SharedModel};
pub use error::{SessionError, UserNotice};
pub use model::{ChatMessage, InterviewFeedback, InterviewSession, MessageRole, PracticeFeedback};
pub use prompt::PromptLibrary;
pub use scenario::{PracticeConfig, Scenario, Setting, Voice};
