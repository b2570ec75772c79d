//! Conversation log sink
//!
//! Turn records are handed to an external store through [`ConversationLog`].
//! Writes happen off the turn path; a failing sink never affects the call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mall_voice_core::{DialogueState, Intent};

use crate::AgentError;

/// One logged turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLogEntry {
    pub id: Uuid,
    pub call_id: String,
    #[serde(default)]
    pub caller_address: Option<String>,
    pub utterance: String,
    pub intent: Intent,
    pub confidence: f32,
    pub response: String,
    pub state: DialogueState,
    pub timestamp: DateTime<Utc>,
}

impl ConversationLogEntry {
    pub fn new(
        call_id: impl Into<String>,
        utterance: impl Into<String>,
        intent: Intent,
        confidence: f32,
        response: impl Into<String>,
        state: DialogueState,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            call_id: call_id.into(),
            caller_address: None,
            utterance: utterance.into(),
            intent,
            confidence,
            response: response.into(),
            state,
            timestamp: Utc::now(),
        }
    }

    pub fn with_caller(mut self, caller_address: Option<String>) -> Self {
        self.caller_address = caller_address;
        self
    }
}

/// Persistent conversation-log store
///
/// # Example
///
/// ```ignore
/// struct DbLog { pool: PgPool }
///
/// #[async_trait]
/// impl ConversationLog for DbLog {
///     async fn append(&self, entry: ConversationLogEntry) -> Result<(), AgentError> {
///         // INSERT INTO conversation_log ...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn append(&self, entry: ConversationLogEntry) -> Result<(), AgentError>;
}

/// Writes turns to the tracing pipeline
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConversationLog;

#[async_trait]
impl ConversationLog for TracingConversationLog {
    async fn append(&self, entry: ConversationLogEntry) -> Result<(), AgentError> {
        tracing::info!(
            target: "conversation_log",
            call_id = %entry.call_id,
            intent = %entry.intent,
            confidence = entry.confidence,
            state = %entry.state,
            utterance = %entry.utterance,
            response = %entry.response,
            "Turn"
        );
        Ok(())
    }
}

/// Keeps turns in memory (tests and local runs)
#[derive(Debug, Default)]
pub struct InMemoryConversationLog {
    entries: Mutex<Vec<ConversationLogEntry>>,
}

impl InMemoryConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ConversationLogEntry> {
        self.entries.lock().clone()
    }

    pub fn entries_for(&self, call_id: &str) -> Vec<ConversationLogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.call_id == call_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn append(&self, entry: ConversationLogEntry) -> Result<(), AgentError> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_log() {
        let log = InMemoryConversationLog::new();
        log.append(ConversationLogEntry::new(
            "call-1",
            "busco nike",
            Intent::SearchStore,
            0.85,
            "Nike está en el piso 2",
            DialogueState::AwaitInput,
        ))
        .await
        .unwrap();
        log.append(ConversationLogEntry::new(
            "call-2",
            "hola",
            Intent::Unknown,
            0.2,
            "¿Me repite?",
            DialogueState::AwaitInput,
        ))
        .await
        .unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries_for("call-1").len(), 1);
    }

    #[tokio::test]
    async fn test_tracing_log_never_fails() {
        let log = TracingConversationLog;
        let entry = ConversationLogEntry::new(
            "call-1",
            "hola",
            Intent::Unknown,
            0.2,
            "Hola",
            DialogueState::AwaitInput,
        );
        assert!(log.append(entry).await.is_ok());
    }
}
