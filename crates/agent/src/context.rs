//! Call Context Management
//!
//! One [`Context`] per live call id, created lazily and serialized behind a
//! per-call mutex. Contexts are destroyed on explicit call end or after
//! sitting idle; destruction always flushes the turn history to the
//! auto-learning engine first.
//!
//! Lock order: the map shard is never acquired while a context lock is held.
//! Eviction removes an entry only if its lock can be taken without waiting
//! and it is still idle, then marks the context evicted so any caller that
//! raced on the stale handle retries against a fresh entry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use mall_voice_config::DialogueConfig;
use mall_voice_core::{
    DetectionResult, DialogueState, Entities, Intent, Reply, Satisfaction, TurnOutcome,
};

use crate::error_learning::ErrorLearningSystem;
use crate::learning::AutoLearningEngine;

/// One classified turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub utterance: String,
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Entities,
    pub timestamp: DateTime<Utc>,
}

/// Transfer awaiting a status callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub target: String,
    pub store_name: String,
}

/// Per-call conversational state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub call_id: String,
    pub turn_count: u32,
    pub silence_count: u32,
    pub goodbye: bool,
    /// Store ids in first-mention order
    pub stores_mentioned: Vec<String>,
    pub topics: Vec<String>,
    pub history: Vec<HistoryEntry>,
    pub last_intent: Option<Intent>,
    pub last_entities: Entities,
    pub last_response: Option<String>,
    pub satisfaction: Satisfaction,
    pub error_log: Vec<String>,
    pub state: DialogueState,
    pub greeted: bool,
    pub pending_transfer: Option<PendingTransfer>,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    #[serde(skip)]
    evicted: bool,
}

impl Context {
    pub fn new(call_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            call_id: call_id.into(),
            turn_count: 0,
            silence_count: 0,
            goodbye: false,
            stores_mentioned: Vec::new(),
            topics: Vec::new(),
            history: Vec::new(),
            last_intent: None,
            last_entities: Entities::default(),
            last_response: None,
            satisfaction: Satisfaction::Unknown,
            error_log: Vec::new(),
            state: DialogueState::AwaitInput,
            greeted: false,
            pending_transfer: None,
            created_at: now,
            last_access_at: now,
            evicted: false,
        }
    }

    fn touch(&mut self) {
        self.last_access_at = Utc::now();
    }

    /// Whether the context has not been accessed for at least `timeout`
    pub fn is_idle(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        (now - self.last_access_at)
            .to_std()
            .map(|idle| idle >= timeout)
            .unwrap_or(false)
    }

    /// Most recently mentioned store id
    pub fn last_store_id(&self) -> Option<&str> {
        self.last_entities
            .store_id
            .as_deref()
            .or_else(|| self.stores_mentioned.last().map(String::as_str))
    }

    /// Apply one classified turn
    pub fn record_turn(&mut self, utterance: &str, detection: &DetectionResult, reply: &Reply) {
        self.turn_count += 1;
        self.history.push(HistoryEntry {
            utterance: utterance.to_string(),
            intent: detection.intent,
            confidence: detection.confidence,
            entities: detection.entities.clone(),
            timestamp: Utc::now(),
        });

        if let Some(store_id) = &detection.entities.store_id {
            if !self.stores_mentioned.contains(store_id) {
                self.stores_mentioned.push(store_id.clone());
            }
        }
        if let Some(topic) = detection.intent.topic() {
            if !self.topics.iter().any(|t| t == topic) {
                self.topics.push(topic.to_string());
            }
        }

        self.last_intent = Some(detection.intent);
        if !detection.entities.is_empty() {
            self.last_entities = detection.entities.clone();
        }
        self.last_response = Some(reply.spoken_text().to_string());
    }

    /// Whether flushed turns count as successful
    pub fn is_successful(&self) -> bool {
        self.satisfaction != Satisfaction::Negative && self.error_log.is_empty()
    }

    /// Convert the history into learning outcomes, leaving it empty
    fn drain_outcomes(&mut self) -> Vec<TurnOutcome> {
        let success = self.is_successful();
        let call_id = self.call_id.clone();
        self.history
            .drain(..)
            .map(|entry| TurnOutcome {
                call_id: call_id.clone(),
                utterance: entry.utterance,
                intent: entry.intent,
                confidence: entry.confidence,
                success,
                store_id: entry.entities.store_id,
                timestamp: entry.timestamp,
            })
            .collect()
    }
}

/// What was flushed when a context was destroyed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub call_id: String,
    pub turn_count: u32,
    pub outcomes_flushed: usize,
    pub successful: bool,
    pub duration_secs: i64,
}

type ContextHandle = Arc<Mutex<Context>>;

/// Live call contexts with idle eviction
pub struct ContextManager {
    contexts: DashMap<String, ContextHandle>,
    idle_timeout: Duration,
    sweep_interval: Duration,
    learning: Arc<AutoLearningEngine>,
    errors: Arc<ErrorLearningSystem>,
}

impl ContextManager {
    pub fn new(
        idle_timeout: Duration,
        sweep_interval: Duration,
        learning: Arc<AutoLearningEngine>,
        errors: Arc<ErrorLearningSystem>,
    ) -> Self {
        Self {
            contexts: DashMap::new(),
            idle_timeout,
            sweep_interval,
            learning,
            errors,
        }
    }

    pub fn from_config(
        config: &DialogueConfig,
        learning: Arc<AutoLearningEngine>,
        errors: Arc<ErrorLearningSystem>,
    ) -> Self {
        Self::new(config.idle_timeout(), config.sweep_interval(), learning, errors)
    }

    /// Start a background task that periodically evicts idle contexts.
    ///
    /// Returns a shutdown sender; sending `true` stops the task.
    pub fn start_sweep_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let manager = Arc::clone(self);
        let interval = manager.sweep_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let evicted = manager.sweep();
                        if evicted > 0 {
                            tracing::info!(
                                "Context sweep: evicted {} idle calls ({} remaining)",
                                evicted,
                                manager.count()
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Context sweep task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Run `f` on the live context for `call_id`, creating it if needed
    ///
    /// A context found idle past the timeout is evicted (with flush) and
    /// replaced by a fresh one before `f` runs.
    pub fn with_context<R>(&self, call_id: &str, f: impl FnOnce(&mut Context) -> R) -> R {
        loop {
            let handle = self.handle(call_id);
            let mut ctx = handle.lock();

            if ctx.evicted {
                continue;
            }

            if ctx.is_idle(self.idle_timeout, Utc::now()) {
                drop(ctx);
                if self.evict_if_idle(call_id).is_some() {
                    tracing::debug!(call_id = %call_id, "Evicted expired context on access");
                }
                continue;
            }

            ctx.touch();
            return f(&mut *ctx);
        }
    }

    /// Snapshot of the live context, creating it if needed
    pub fn get_or_create(&self, call_id: &str) -> Context {
        self.with_context(call_id, |ctx| ctx.clone())
    }

    /// Snapshot without creating or touching
    pub fn get(&self, call_id: &str) -> Option<Context> {
        let handle = self.contexts.get(call_id).map(|e| Arc::clone(e.value()))?;
        let ctx = handle.lock();
        (!ctx.evicted).then(|| ctx.clone())
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.contexts.contains_key(call_id)
    }

    /// Number of live contexts
    pub fn count(&self) -> usize {
        self.contexts.len()
    }

    /// Record a classified turn and its reply
    pub fn update(&self, call_id: &str, utterance: &str, detection: &DetectionResult, reply: &Reply) {
        self.with_context(call_id, |ctx| ctx.record_turn(utterance, detection, reply));
    }

    /// Increment and return the silence counter
    pub fn increment_silence(&self, call_id: &str) -> u32 {
        self.with_context(call_id, |ctx| {
            ctx.silence_count += 1;
            ctx.silence_count
        })
    }

    pub fn reset_silence(&self, call_id: &str) {
        self.with_context(call_id, |ctx| ctx.silence_count = 0);
    }

    pub fn mark_goodbye(&self, call_id: &str) {
        self.with_context(call_id, |ctx| ctx.goodbye = true);
    }

    pub fn has_goodbye(&self, call_id: &str) -> bool {
        self.get(call_id).map(|ctx| ctx.goodbye).unwrap_or(false)
    }

    /// Append to the call's error log
    pub fn record_error(&self, call_id: &str, message: impl Into<String>) {
        let message = message.into();
        self.with_context(call_id, |ctx| ctx.error_log.push(message));
    }

    /// Check `text` for dissatisfaction; on a match, mark the call negative
    /// and record the feedback
    pub fn detect_negative_feedback(&self, call_id: &str, text: &str) -> bool {
        if !self.errors.detect_negative_feedback(text) {
            return false;
        }

        let (last_intent, last_response) = self.with_context(call_id, |ctx| {
            ctx.satisfaction = Satisfaction::Negative;
            (ctx.last_intent, ctx.last_response.clone())
        });
        self.errors
            .record_negative_feedback(call_id, text, last_intent, last_response.as_deref());

        tracing::info!(call_id = %call_id, "Negative feedback detected");
        true
    }

    /// Flush and delete the context for an ended call
    pub fn clear(&self, call_id: &str) -> Option<CallSummary> {
        let (_, handle) = self.contexts.remove(call_id)?;
        let summary = self.finalize(&handle);
        tracing::debug!(call_id = %call_id, turns = summary.turn_count, "Cleared context");
        Some(summary)
    }

    /// Evict every context idle past the timeout
    pub fn sweep(&self) -> usize {
        let ids: Vec<String> = self.contexts.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter(|id| self.evict_if_idle(id).is_some())
            .count()
    }

    /// Flush and delete every live context
    pub fn flush_all(&self) -> usize {
        let ids: Vec<String> = self.contexts.iter().map(|e| e.key().clone()).collect();
        let mut flushed = 0;
        for id in ids {
            if let Some((_, handle)) = self.contexts.remove(&id) {
                self.finalize(&handle);
                flushed += 1;
            }
        }
        if flushed > 0 {
            tracing::info!(flushed, "Flushed all live contexts");
        }
        flushed
    }

    fn handle(&self, call_id: &str) -> ContextHandle {
        if let Some(entry) = self.contexts.get(call_id) {
            return Arc::clone(entry.value());
        }
        let entry = self
            .contexts
            .entry(call_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(call_id = %call_id, "Created context");
                Arc::new(Mutex::new(Context::new(call_id)))
            });
        Arc::clone(entry.value())
    }

    /// Remove the entry if it is unlocked and idle, then flush it
    fn evict_if_idle(&self, call_id: &str) -> Option<CallSummary> {
        let now = Utc::now();
        let timeout = self.idle_timeout;
        let (_, handle) = self.contexts.remove_if(call_id, |_, handle| {
            handle
                .try_lock()
                .map(|ctx| ctx.is_idle(timeout, now))
                .unwrap_or(false)
        })?;
        let summary = self.finalize(&handle);
        tracing::info!(call_id = %call_id, turns = summary.turn_count, "Evicted idle context");
        Some(summary)
    }

    /// Mark evicted and flush the history to the learning engine
    fn finalize(&self, handle: &ContextHandle) -> CallSummary {
        let (outcomes, summary) = {
            let mut ctx = handle.lock();
            ctx.evicted = true;
            let successful = ctx.is_successful();
            let outcomes = ctx.drain_outcomes();
            let summary = CallSummary {
                call_id: ctx.call_id.clone(),
                turn_count: ctx.turn_count,
                outcomes_flushed: outcomes.len(),
                successful,
                duration_secs: (Utc::now() - ctx.created_at).num_seconds(),
            };
            (outcomes, summary)
        };

        for outcome in &outcomes {
            self.learning.process_outcome(outcome);
        }
        summary
    }
}
