//! Dialogue and Learning Engine
//!
//! Features:
//! - Keyword-cascade intent detection with store entity extraction
//! - Per-call conversation contexts with idle eviction sweep
//! - Template-based response generation
//! - Auto-learning from turn outcomes (keywords, missing intents, confidence)
//! - Error-pattern learning (intent, response, transfer, timeout, negative feedback)
//! - Turn state machine driving gateway directives

pub mod context;
pub mod error_learning;
pub mod intent;
pub mod keywords;
pub mod learning;
pub mod orchestrator;
pub mod patterns;
pub mod response;
pub mod traits;

pub use context::{CallSummary, Context, ContextManager, HistoryEntry, PendingTransfer};
pub use error_learning::{
    ErrorCounts, ErrorLearningSystem, ErrorReport, RankedCount, RecentErrors,
};
pub use intent::IntentDetector;
pub use keywords::KeywordExtractor;
pub use learning::{
    AutoLearningEngine, ConfidenceAdjustment, FailureRecord, IntentSuggestion,
    KeywordSuggestion, LearningReport,
};
pub use orchestrator::{DialogueEvent, DialogueOrchestrator, OrchestratorConfig, TurnResponse};
pub use patterns::{PatternAnalyzer, PatternMatch};
pub use response::ResponseGenerator;
pub use traits::{ConversationLog, ConversationLogEntry, InMemoryConversationLog, TracingConversationLog};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Context error: {0}")]
    Context(String),

    #[error("Response error: {0}")]
    Response(String),

    #[error("Conversation log error: {0}")]
    Log(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Configuration error: {0}")]
    Config(#[from] mall_voice_config::ConfigError),
}

impl From<mall_voice_core::CoreError> for AgentError {
    fn from(err: mall_voice_core::CoreError) -> Self {
        match err {
            mall_voice_core::CoreError::InvalidEvent(msg) => AgentError::InvalidEvent(msg),
            other => AgentError::Context(other.to_string()),
        }
    }
}
