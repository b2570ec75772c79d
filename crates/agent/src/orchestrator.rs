//! Dialogue Orchestrator
//!
//! Per-call turn state machine:
//!
//! ```text
//! AWAIT_INPUT --utterance--> PROCESS_TURN --+--> AWAIT_INPUT   (reply + follow-up)
//!                                           +--> TRANSFERRING  (transfer directive)
//!                                           +--> CLOSING       (farewell / decline / limits)
//! TRANSFERRING --completed--> TERMINATED
//! TRANSFERRING --failed-----> AWAIT_INPUT (apology)
//! CLOSING --final utterance--> TERMINATED (context flushed)
//! ```
//!
//! Each handler returns the gateway directives for the turn. Faults inside a
//! turn never drop the call: the caller hears one apology and the greeting.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use mall_voice_config::template_keys as keys;
use mall_voice_config::DialogueConfig;
use mall_voice_core::{
    DetectionResult, DialogueState, Directive, GatewayEvent, Intent, Reply, TransferStatus,
};

use crate::context::{CallSummary, ContextManager, PendingTransfer};
use crate::error_learning::ErrorLearningSystem;
use crate::intent::IntentDetector;
use crate::response::ResponseGenerator;
use crate::traits::{ConversationLog, ConversationLogEntry};
use crate::AgentError;

/// Turn policy
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_turns: u32,
    pub silence_escalation_threshold: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&DialogueConfig::default())
    }
}

impl From<&DialogueConfig> for OrchestratorConfig {
    fn from(config: &DialogueConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            silence_escalation_threshold: config.silence_escalation_threshold,
        }
    }
}

/// Directives for one handled event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub call_id: String,
    pub state: DialogueState,
    pub directives: Vec<Directive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl TurnResponse {
    fn new(call_id: &str, state: DialogueState, directives: Vec<Directive>) -> Self {
        Self {
            call_id: call_id.to_string(),
            state,
            directives,
            intent: None,
            confidence: None,
        }
    }

    fn with_detection(mut self, detection: &DetectionResult) -> Self {
        self.intent = Some(detection.intent);
        self.confidence = Some(detection.confidence);
        self
    }

    /// Whether the gateway should end the call
    pub fn hangs_up(&self) -> bool {
        self.directives.iter().any(|d| matches!(d, Directive::Hangup))
    }
}

/// Events published to observers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueEvent {
    StateChanged {
        call_id: String,
        from: DialogueState,
        to: DialogueState,
    },
    TurnCompleted {
        call_id: String,
        intent: Intent,
        confidence: f32,
    },
    TransferRequested {
        call_id: String,
        target: String,
        store_name: String,
    },
    CallEnded {
        call_id: String,
        reason: String,
        summary: Option<CallSummary>,
    },
}

/// Per-call dialogue state machine
pub struct DialogueOrchestrator {
    config: OrchestratorConfig,
    detector: IntentDetector,
    generator: ResponseGenerator,
    contexts: Arc<ContextManager>,
    errors: Arc<ErrorLearningSystem>,
    log: Arc<dyn ConversationLog>,
    event_tx: broadcast::Sender<DialogueEvent>,
}

impl DialogueOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        detector: IntentDetector,
        generator: ResponseGenerator,
        contexts: Arc<ContextManager>,
        errors: Arc<ErrorLearningSystem>,
        log: Arc<dyn ConversationLog>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            detector,
            generator,
            contexts,
            errors,
            log,
            event_tx,
        }
    }

    /// Subscribe to dialogue events
    pub fn subscribe(&self) -> broadcast::Receiver<DialogueEvent> {
        self.event_tx.subscribe()
    }

    pub fn contexts(&self) -> &Arc<ContextManager> {
        &self.contexts
    }

    /// Handle an inbound gateway event (greeting or utterance)
    pub async fn handle_incoming(&self, event: GatewayEvent) -> Result<TurnResponse, AgentError> {
        event.validate()?;

        match self.process_turn(&event) {
            Ok(response) => Ok(response),
            Err(err) => Ok(self.fault_response(&event.call_id, &err)),
        }
    }

    /// Handle a silence timeout reported by the gateway
    pub async fn handle_silence_timeout(&self, call_id: &str) -> Result<TurnResponse, AgentError> {
        validate_call_id(call_id)?;

        if self.contexts.has_goodbye(call_id) {
            return Ok(self.close_after_goodbye(call_id));
        }

        let silence_count = self.contexts.increment_silence(call_id);
        tracing::debug!(call_id = %call_id, silence_count, "Silence timeout");

        if silence_count < self.config.silence_escalation_threshold {
            return Ok(self.ask(call_id, self.generator.phrase(keys::SILENCE_PROMPT)));
        }

        let (last_intent, turn_count) = self
            .contexts
            .with_context(call_id, |ctx| (ctx.last_intent, ctx.turn_count));
        self.errors
            .record_timeout_error(call_id, last_intent, silence_count, turn_count);
        self.contexts.record_error(call_id, "silence timeout");

        tracing::info!(call_id = %call_id, silence_count, "Closing call after repeated silence");
        Ok(self.close(
            call_id,
            vec![Directive::say(self.generator.phrase(keys::SILENCE_CLOSING))],
            "silence_timeout",
        ))
    }

    /// Handle the gateway's report on a transfer attempt
    pub async fn handle_transfer_status(
        &self,
        call_id: &str,
        status: &str,
    ) -> Result<TurnResponse, AgentError> {
        validate_call_id(call_id)?;

        let status = TransferStatus::parse(status);
        let pending = self
            .contexts
            .with_context(call_id, |ctx| ctx.pending_transfer.take());

        if status.is_completed() {
            tracing::info!(call_id = %call_id, "Transfer completed");
            self.set_state(call_id, DialogueState::Closing);
            let summary = self.contexts.clear(call_id);
            self.publish_end(call_id, "transfer_completed", summary);
            return Ok(TurnResponse::new(call_id, DialogueState::Terminated, Vec::new()));
        }

        let (target, store_name) = match &pending {
            Some(p) => (p.target.as_str(), Some(p.store_name.as_str())),
            None => ("unknown", None),
        };
        tracing::warn!(call_id = %call_id, target = %target, status = %status.as_str(), "Transfer failed");
        self.errors
            .record_transfer_error(call_id, target, store_name, status.as_str());
        self.contexts
            .record_error(call_id, format!("transfer failed: {}", status.as_str()));

        let text = format!(
            "{} {}",
            self.generator.phrase(keys::TRANSFER_FAILED),
            self.generator.phrase(keys::FOLLOW_UP)
        );
        Ok(self.ask(call_id, text))
    }

    /// Handle the end of a call initiated by the gateway
    pub async fn handle_hangup(&self, call_id: &str) -> Option<CallSummary> {
        let summary = self.contexts.clear(call_id);
        if summary.is_some() {
            tracing::info!(call_id = %call_id, "Call ended by gateway");
            self.publish_end(call_id, "hangup", summary.clone());
        }
        summary
    }

    /// Flush every live call (process shutdown)
    pub async fn shutdown(&self) -> usize {
        self.contexts.flush_all()
    }

    fn close_after_goodbye(&self, call_id: &str) -> TurnResponse {
        tracing::debug!(call_id = %call_id, "Goodbye already received, closing");
        self.close(
            call_id,
            vec![Directive::say(self.generator.phrase(keys::FAREWELL))],
            "farewell",
        )
    }

    fn process_turn(&self, event: &GatewayEvent) -> Result<TurnResponse, AgentError> {
        let call_id = event.call_id.as_str();

        // Caller already said goodbye: finish regardless of what they say now
        if self.contexts.has_goodbye(call_id) {
            return Ok(self.close_after_goodbye(call_id));
        }

        if !event.has_utterance() {
            return Ok(self.handle_empty(call_id));
        }

        let utterance = event.text().trim();
        self.contexts.reset_silence(call_id);
        self.set_state(call_id, DialogueState::ProcessTurn);

        let negative = self.contexts.detect_negative_feedback(call_id, utterance);
        let detection = self.detector.detect(utterance);
        let reply = self.contexts.with_context(call_id, |ctx| {
            ctx.greeted = true;
            self.generator
                .generate(detection.intent, &detection.entities, ctx)
        });

        if reply.spoken_text().trim().is_empty() {
            return Err(AgentError::Response(format!(
                "empty reply for intent {}",
                detection.intent
            )));
        }

        self.contexts.update(call_id, utterance, &detection, &reply);

        if detection.intent == Intent::Unknown {
            self.errors.record_intent_error(
                call_id,
                utterance,
                detection.intent,
                None,
                detection.confidence,
            );
            self.contexts.record_error(call_id, "unrecognized utterance");
        }

        tracing::info!(
            call_id = %call_id,
            intent = %detection.intent,
            confidence = detection.confidence,
            store = ?detection.entities.store_id,
            "Turn processed"
        );
        let _ = self.event_tx.send(DialogueEvent::TurnCompleted {
            call_id: call_id.to_string(),
            intent: detection.intent,
            confidence: detection.confidence,
        });

        let prefix = if negative {
            format!("{} ", self.generator.phrase(keys::APOLOGY))
        } else {
            String::new()
        };
        let turn_count = self
            .contexts
            .get(call_id)
            .map(|ctx| ctx.turn_count)
            .unwrap_or_default();

        let response = match (&reply, detection.intent) {
            (Reply::Transfer { message, target, store_name }, _) => {
                self.contexts.with_context(call_id, |ctx| {
                    ctx.pending_transfer = Some(PendingTransfer {
                        target: target.clone(),
                        store_name: store_name.clone(),
                    });
                });
                self.set_state(call_id, DialogueState::Transferring);
                let _ = self.event_tx.send(DialogueEvent::TransferRequested {
                    call_id: call_id.to_string(),
                    target: target.clone(),
                    store_name: store_name.clone(),
                });
                TurnResponse::new(
                    call_id,
                    DialogueState::Transferring,
                    vec![Directive::Transfer {
                        message: format!("{}{}", prefix, message),
                        target: target.clone(),
                    }],
                )
            },
            (Reply::Say { text }, Intent::Farewell) => {
                // Context stays until hangup so the goodbye flag can short-circuit
                self.contexts.mark_goodbye(call_id);
                self.set_state(call_id, DialogueState::Closing);
                TurnResponse::new(
                    call_id,
                    DialogueState::Closing,
                    vec![Directive::say(format!("{}{}", prefix, text)), Directive::Hangup],
                )
            },
            (Reply::Say { text }, Intent::Decline) => self.close(
                call_id,
                vec![Directive::say(format!("{}{}", prefix, text))],
                "declined",
            ),
            (Reply::Say { text }, _) if turn_count >= self.config.max_turns => {
                tracing::info!(call_id = %call_id, turn_count, "Turn limit reached");
                self.close(
                    call_id,
                    vec![
                        Directive::say(format!("{}{}", prefix, text)),
                        Directive::say(self.generator.phrase(keys::MAX_TURNS)),
                    ],
                    "max_turns",
                )
            },
            (Reply::Say { text }, _) => {
                let follow_up = self.generator.phrase(keys::FOLLOW_UP);
                self.ask(call_id, format!("{}{} {}", prefix, text, follow_up))
            },
        };

        self.write_log(event, &detection, &reply, response.state);
        Ok(response.with_detection(&detection))
    }

    /// Event without an utterance: greet once, otherwise re-prompt
    fn handle_empty(&self, call_id: &str) -> TurnResponse {
        let first = self.contexts.with_context(call_id, |ctx| {
            let first = !ctx.greeted;
            ctx.greeted = true;
            first
        });

        if first {
            tracing::info!(call_id = %call_id, "New call");
            self.ask(call_id, self.generator.greeting())
        } else {
            self.ask(call_id, self.generator.phrase(keys::CLARIFY))
        }
    }

    /// Speak and listen; state returns to AWAIT_INPUT
    fn ask(&self, call_id: &str, text: String) -> TurnResponse {
        self.set_state(call_id, DialogueState::AwaitInput);
        self.contexts
            .with_context(call_id, |ctx| ctx.last_response = Some(text.clone()));
        TurnResponse::new(
            call_id,
            DialogueState::AwaitInput,
            vec![Directive::say_then_gather(text)],
        )
    }

    /// Final utterance, hang up and flush the context
    fn close(&self, call_id: &str, mut directives: Vec<Directive>, reason: &str) -> TurnResponse {
        self.set_state(call_id, DialogueState::Closing);
        directives.push(Directive::Hangup);
        let summary = self.contexts.clear(call_id);
        self.publish_end(call_id, reason, summary);
        TurnResponse::new(call_id, DialogueState::Terminated, directives)
    }

    /// Generic apology plus the greeting prompt; the call stays up
    fn fault_response(&self, call_id: &str, err: &AgentError) -> TurnResponse {
        tracing::error!(call_id = %call_id, error = %err, "Turn failed, falling back to apology");
        let intent = self
            .contexts
            .get(call_id)
            .and_then(|ctx| ctx.last_intent)
            .unwrap_or_default();
        let text = format!(
            "{} {}",
            self.generator.phrase(keys::FAULT),
            self.generator.greeting()
        );
        self.errors
            .record_response_error(call_id, intent, &text, &err.to_string());
        self.contexts.record_error(call_id, err.to_string());
        self.ask(call_id, text)
    }

    fn set_state(&self, call_id: &str, to: DialogueState) {
        let from = self.contexts.with_context(call_id, |ctx| {
            let from = ctx.state;
            ctx.state = to;
            from
        });
        if from != to {
            tracing::debug!(call_id = %call_id, from = %from, to = %to, "State transition");
            let _ = self.event_tx.send(DialogueEvent::StateChanged {
                call_id: call_id.to_string(),
                from,
                to,
            });
        }
    }

    fn publish_end(&self, call_id: &str, reason: &str, summary: Option<CallSummary>) {
        let _ = self.event_tx.send(DialogueEvent::CallEnded {
            call_id: call_id.to_string(),
            reason: reason.to_string(),
            summary,
        });
    }

    /// Hand the turn to the conversation log without blocking the reply
    fn write_log(
        &self,
        event: &GatewayEvent,
        detection: &DetectionResult,
        reply: &Reply,
        state: DialogueState,
    ) {
        let entry = ConversationLogEntry::new(
            event.call_id.clone(),
            event.text().trim(),
            detection.intent,
            detection.confidence,
            reply.spoken_text(),
            state,
        )
        .with_caller(event.caller_address.clone());

        let log = Arc::clone(&self.log);
        tokio::spawn(async move {
            let call_id = entry.call_id.clone();
            if let Err(e) = log.append(entry).await {
                tracing::warn!(call_id = %call_id, error = %e, "Conversation log write failed");
            }
        });
    }
}

fn validate_call_id(call_id: &str) -> Result<(), AgentError> {
    if call_id.trim().is_empty() {
        return Err(AgentError::InvalidEvent("missing call_id".to_string()));
    }
    Ok(())
}
