//! Conversation types: replies, gateway directives and dialogue states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::intent::Intent;

/// Reply selected for a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// Speak content to the caller
    Say { text: String },
    /// Connect the caller to a store line
    Transfer {
        message: String,
        target: String,
        store_name: String,
    },
}

impl Reply {
    pub fn say(text: impl Into<String>) -> Self {
        Reply::Say { text: text.into() }
    }

    /// Text that will be spoken for this reply
    pub fn spoken_text(&self) -> &str {
        match self {
            Reply::Say { text } => text,
            Reply::Transfer { message, .. } => message,
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Reply::Transfer { .. })
    }
}

/// Instruction sent back to the voice gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    /// Speak and do not wait for input
    Say { text: String },
    /// Speak, then listen for the caller's answer
    SayThenGather { text: String },
    /// Announce and transfer the call
    Transfer { message: String, target: String },
    /// End the call
    Hangup,
}

impl Directive {
    pub fn say(text: impl Into<String>) -> Self {
        Directive::Say { text: text.into() }
    }

    pub fn say_then_gather(text: impl Into<String>) -> Self {
        Directive::SayThenGather { text: text.into() }
    }
}

/// Inbound webhook event from the voice gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub call_id: String,
    #[serde(default)]
    pub caller_address: Option<String>,
    #[serde(default)]
    pub utterance_text: Option<String>,
    /// Speech recognition confidence reported by the gateway
    #[serde(default)]
    pub recognition_confidence: Option<f32>,
}

impl GatewayEvent {
    pub fn utterance(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            utterance_text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Utterance text, empty when the gateway sent none
    pub fn text(&self) -> &str {
        self.utterance_text.as_deref().unwrap_or("")
    }

    pub fn has_utterance(&self) -> bool {
        !self.text().trim().is_empty()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.call_id.trim().is_empty() {
            return Err(CoreError::InvalidEvent("missing call_id".to_string()));
        }
        if let Some(confidence) = self.recognition_confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(CoreError::InvalidEvent(format!(
                    "recognition_confidence out of range: {}",
                    confidence
                )));
            }
        }
        Ok(())
    }
}

/// Per-call dialogue state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogueState {
    #[default]
    AwaitInput,
    ProcessTurn,
    Transferring,
    Closing,
    Terminated,
}

impl DialogueState {
    pub fn display_name(&self) -> &'static str {
        match self {
            DialogueState::AwaitInput => "AWAIT_INPUT",
            DialogueState::ProcessTurn => "PROCESS_TURN",
            DialogueState::Transferring => "TRANSFERRING",
            DialogueState::Closing => "CLOSING",
            DialogueState::Terminated => "TERMINATED",
        }
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Caller satisfaction tracked per call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Satisfaction {
    #[default]
    Unknown,
    Positive,
    Negative,
}

/// Status reported by the gateway after a transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    /// Any other gateway status (busy, no-answer, failed, ...)
    Failed(String),
}

impl TransferStatus {
    pub fn parse(status: &str) -> Self {
        let normalized = status.trim().to_lowercase();
        if normalized == "completed" {
            TransferStatus::Completed
        } else {
            TransferStatus::Failed(normalized)
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TransferStatus::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransferStatus::Completed => "completed",
            TransferStatus::Failed(status) => status,
        }
    }
}

/// One observed turn outcome fed to the auto-learning engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub call_id: String,
    pub utterance: String,
    pub intent: Intent,
    pub confidence: f32,
    pub success: bool,
    #[serde(default)]
    pub store_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
