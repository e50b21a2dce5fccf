//! Failure taxonomy for the matching pipeline.
//!
//! Every failure is classified so the boundary in `matcher` can turn it into
//! a single user-facing message. Nothing in this crate panics on bad input or
//! bad model output.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("brief is empty")]
    EmptyBrief,

    #[error("reference library is empty")]
    EmptyLibrary,

    #[error("model call failed: {message}")]
    Transport { message: String },

    #[error("model response is not valid JSON: {detail}")]
    Malformed { detail: String, preview: String },

    #[error("model response has the wrong shape: {detail}")]
    Schema { detail: String },
}

/// Broad class of a failure, used to pick the user-facing message policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input from the caller. Reported, no retry suggested.
    Input,
    /// The model call itself failed or timed out. Reported with a retry
    /// suggestion, never retried automatically.
    Transport,
    /// The model answered but the answer could not be used. Raw payload is
    /// logged for diagnosis; not retried automatically.
    Format,
}

impl MatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            MatchError::EmptyBrief | MatchError::EmptyLibrary => ErrorClass::Input,
            MatchError::Transport { .. } => ErrorClass::Transport,
            MatchError::Malformed { .. } | MatchError::Schema { .. } => ErrorClass::Format,
        }
    }

    /// The single message shown to the end user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            MatchError::EmptyBrief => "Please paste a brief to match.".to_string(),
            MatchError::EmptyLibrary => {
                "The reference library is empty, so there is nothing to match against.".to_string()
            }
            MatchError::Transport { .. } => {
                "Could not reach the matching service. Please try again in a moment.".to_string()
            }
            MatchError::Malformed { .. } | MatchError::Schema { .. } => {
                "The matching service returned an answer we couldn't read. Please try again."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_classified() {
        assert_eq!(MatchError::EmptyBrief.class(), ErrorClass::Input);
        assert_eq!(MatchError::EmptyLibrary.class(), ErrorClass::Input);
    }

    #[test]
    fn test_format_errors_classified() {
        let err = MatchError::Malformed {
            detail: "expected value".to_string(),
            preview: "not json".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Format);
        let err = MatchError::Schema {
            detail: "entry missing id".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Format);
    }

    #[test]
    fn test_transport_message_suggests_retry() {
        let err = MatchError::Transport {
            message: "timeout".to_string(),
        };
        assert!(err.user_message().contains("try again"));
    }
}
