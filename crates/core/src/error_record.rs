//! Error records tracked by the error-learning system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of recorded conversational errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    IntentError,
    ResponseError,
    TransferError,
    TimeoutError,
    NegativeFeedback,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::IntentError,
        ErrorKind::ResponseError,
        ErrorKind::TransferError,
        ErrorKind::TimeoutError,
        ErrorKind::NegativeFeedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::IntentError => "intent_error",
            ErrorKind::ResponseError => "response_error",
            ErrorKind::TransferError => "transfer_error",
            ErrorKind::TimeoutError => "timeout_error",
            ErrorKind::NegativeFeedback => "negative_feedback",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Utterance that could not be classified (or was misclassified)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentErrorRecord {
    pub call_id: String,
    pub utterance: String,
    pub detected_intent: String,
    #[serde(default)]
    pub expected_intent: Option<String>,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

/// Reply that failed or had to be replaced by a fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseErrorRecord {
    pub call_id: String,
    pub intent: String,
    pub response: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Transfer attempt that did not complete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferErrorRecord {
    pub call_id: String,
    pub target: String,
    #[serde(default)]
    pub store_name: Option<String>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Call abandoned after repeated silence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutErrorRecord {
    pub call_id: String,
    #[serde(default)]
    pub last_intent: Option<String>,
    pub silence_count: u32,
    pub turn_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Caller expressed dissatisfaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegativeFeedbackRecord {
    pub call_id: String,
    pub text: String,
    #[serde(default)]
    pub last_intent: Option<String>,
    #[serde(default)]
    pub last_response: Option<String>,
    pub timestamp: DateTime<Utc>,
}
