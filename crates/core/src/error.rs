use std::fmt;
use thiserror::Error;

/// Failures of the practice session state machine itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a request is already being processed")]
    Busy,
    #[error("the practice session has not been started")]
    NotStarted,
}

/// What the user is told when a model call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserNotice {
    HighDemand,
    CommunicationError,
}

impl UserNotice {
    /// Rate limiting is recognised by a `429` status or the word "quota"
    /// anywhere in the error chain.
    pub fn classify(err: &anyhow::Error) -> Self {
        let text = format!("{err:#}");
        if text.contains("429") || text.to_lowercase().contains("quota") {
            UserNotice::HighDemand
        } else {
            UserNotice::CommunicationError
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            UserNotice::HighDemand => {
                "Our AI is currently experiencing high demand. Please try again in a few moments."
            }
            UserNotice::CommunicationError => {
                "An error occurred while communicating with the AI. Please try again."
            }
        }
    }
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn test_rate_limit_is_high_demand() {
        let err = anyhow!("Gemini API request failed with status 429 Too Many Requests: slow down");
        assert_eq!(UserNotice::classify(&err), UserNotice::HighDemand);

        let err = anyhow!("Resource exhausted: QUOTA exceeded");
        assert_eq!(UserNotice::classify(&err), UserNotice::HighDemand);
    }

    #[test]
    fn test_cause_chain_is_inspected() {
        let err: anyhow::Error = Err::<(), _>(anyhow!("status 429"))
            .context("Failed to generate the conversation response")
            .unwrap_err();
        assert_eq!(UserNotice::classify(&err), UserNotice::HighDemand);
    }

    #[test]
    fn test_other_failures_are_generic() {
        let err = anyhow!("connection reset by peer");
        let notice = UserNotice::classify(&err);

        assert_eq!(notice, UserNotice::CommunicationError);
        assert_eq!(
            notice.to_string(),
            "An error occurred while communicating with the AI. Please try again."
        );
    }
}
