//! Error Learning System
//!
//! Keeps bounded logs of conversational errors and ranks the intents and
//! transfer targets that fail most often. Each log has its own lock, so
//! recording one kind never contends with another.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use mall_voice_config::constants::errors;
use mall_voice_config::ErrorLearningConfig;
use mall_voice_core::{
    Intent, IntentErrorRecord, NegativeFeedbackRecord, ResponseErrorRecord, RingBuffer,
    TimeoutErrorRecord, TransferErrorRecord,
};

/// Phrases that signal caller dissatisfaction (matched case-insensitively)
const NEGATIVE_FEEDBACK_KEYWORDS: &[&str] = &[
    "no me sirve",
    "no sirve",
    "no entiendes",
    "no me entiende",
    "no entiende",
    "no me ayuda",
    "no ayuda",
    "pésimo",
    "pesimo",
    "mal servicio",
    "malo",
    "no funciona",
    "terrible",
    "molesto",
    "inútil",
    "inutil",
    "useless",
    "not helpful",
    "doesn't work",
];

/// Key with its occurrence count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCount {
    pub key: String,
    pub count: usize,
}

/// Entries currently held per error kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub intent_errors: usize,
    pub response_errors: usize,
    pub transfer_errors: usize,
    pub timeout_errors: usize,
    pub negative_feedback: usize,
}

impl ErrorCounts {
    pub fn total(&self) -> usize {
        self.intent_errors
            + self.response_errors
            + self.transfer_errors
            + self.timeout_errors
            + self.negative_feedback
    }
}

/// Most recent entries of each kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentErrors {
    pub intent_errors: Vec<IntentErrorRecord>,
    pub response_errors: Vec<ResponseErrorRecord>,
    pub transfer_errors: Vec<TransferErrorRecord>,
    pub timeout_errors: Vec<TimeoutErrorRecord>,
    pub negative_feedback: Vec<NegativeFeedbackRecord>,
}

/// Snapshot returned by [`ErrorLearningSystem::report`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub generated_at: DateTime<Utc>,
    pub counts: ErrorCounts,
    pub top_intent_errors: Vec<RankedCount>,
    pub top_transfer_failures: Vec<RankedCount>,
    pub top_timeout_intents: Vec<RankedCount>,
    pub top_negative_feedback_intents: Vec<RankedCount>,
    pub recent: RecentErrors,
}

/// Bounded error logs with frequency analyses
pub struct ErrorLearningSystem {
    retention: Duration,
    intent_errors: Mutex<RingBuffer<IntentErrorRecord>>,
    response_errors: Mutex<RingBuffer<ResponseErrorRecord>>,
    transfer_errors: Mutex<RingBuffer<TransferErrorRecord>>,
    timeout_errors: Mutex<RingBuffer<TimeoutErrorRecord>>,
    negative_feedback: Mutex<RingBuffer<NegativeFeedbackRecord>>,
}

impl Default for ErrorLearningSystem {
    fn default() -> Self {
        Self::new(&ErrorLearningConfig::default())
    }
}

impl ErrorLearningSystem {
    pub fn new(config: &ErrorLearningConfig) -> Self {
        Self {
            retention: Duration::days(i64::from(config.retention_days)),
            intent_errors: Mutex::new(RingBuffer::new(errors::INTENT_ERRORS_CAPACITY)),
            response_errors: Mutex::new(RingBuffer::new(errors::RESPONSE_ERRORS_CAPACITY)),
            transfer_errors: Mutex::new(RingBuffer::new(errors::TRANSFER_ERRORS_CAPACITY)),
            timeout_errors: Mutex::new(RingBuffer::new(errors::TIMEOUT_ERRORS_CAPACITY)),
            negative_feedback: Mutex::new(RingBuffer::new(errors::NEGATIVE_FEEDBACK_CAPACITY)),
        }
    }

    pub fn record_intent_error(
        &self,
        call_id: &str,
        utterance: &str,
        detected: Intent,
        expected: Option<Intent>,
        confidence: f32,
    ) {
        tracing::debug!(call_id = %call_id, detected = %detected, "Recording intent error");
        self.intent_errors.lock().push(IntentErrorRecord {
            call_id: call_id.to_string(),
            utterance: utterance.to_string(),
            detected_intent: detected.as_str().to_string(),
            expected_intent: expected.map(|i| i.as_str().to_string()),
            confidence,
            timestamp: Utc::now(),
        });
    }

    pub fn record_response_error(&self, call_id: &str, intent: Intent, response: &str, reason: &str) {
        tracing::debug!(call_id = %call_id, intent = %intent, reason = %reason, "Recording response error");
        self.response_errors.lock().push(ResponseErrorRecord {
            call_id: call_id.to_string(),
            intent: intent.as_str().to_string(),
            response: response.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_transfer_error(
        &self,
        call_id: &str,
        target: &str,
        store_name: Option<&str>,
        status: &str,
    ) {
        tracing::debug!(call_id = %call_id, target = %target, status = %status, "Recording transfer error");
        self.transfer_errors.lock().push(TransferErrorRecord {
            call_id: call_id.to_string(),
            target: target.to_string(),
            store_name: store_name.map(str::to_string),
            status: status.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_timeout_error(
        &self,
        call_id: &str,
        last_intent: Option<Intent>,
        silence_count: u32,
        turn_count: u32,
    ) {
        tracing::debug!(call_id = %call_id, silence_count, "Recording timeout error");
        self.timeout_errors.lock().push(TimeoutErrorRecord {
            call_id: call_id.to_string(),
            last_intent: last_intent.map(|i| i.as_str().to_string()),
            silence_count,
            turn_count,
            timestamp: Utc::now(),
        });
    }

    pub fn record_negative_feedback(
        &self,
        call_id: &str,
        text: &str,
        last_intent: Option<Intent>,
        last_response: Option<&str>,
    ) {
        tracing::debug!(call_id = %call_id, "Recording negative feedback");
        self.negative_feedback.lock().push(NegativeFeedbackRecord {
            call_id: call_id.to_string(),
            text: text.to_string(),
            last_intent: last_intent.map(|i| i.as_str().to_string()),
            last_response: last_response.map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    /// Whether the text contains a dissatisfaction phrase
    pub fn detect_negative_feedback(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        NEGATIVE_FEEDBACK_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword))
    }

    pub fn counts(&self) -> ErrorCounts {
        ErrorCounts {
            intent_errors: self.intent_errors.lock().len(),
            response_errors: self.response_errors.lock().len(),
            transfer_errors: self.transfer_errors.lock().len(),
            timeout_errors: self.timeout_errors.lock().len(),
            negative_feedback: self.negative_feedback.lock().len(),
        }
    }

    /// Intents most often involved in intent errors
    pub fn top_intent_errors(&self) -> Vec<RankedCount> {
        let log = self.intent_errors.lock();
        rank(
            log.iter().map(|r| r.detected_intent.as_str()),
            errors::TOP_INTENT_ERRORS,
        )
    }

    /// Transfer targets that fail most often
    pub fn top_transfer_failures(&self) -> Vec<RankedCount> {
        let log = self.transfer_errors.lock();
        rank(
            log.iter().map(|r| r.target.as_str()),
            errors::TOP_TRANSFER_ERRORS,
        )
    }

    /// Last intents before callers went silent
    pub fn top_timeout_intents(&self) -> Vec<RankedCount> {
        let log = self.timeout_errors.lock();
        rank(
            log.iter()
                .map(|r| r.last_intent.as_deref().unwrap_or(Intent::Unknown.as_str())),
            errors::TOP_TIMEOUT_ERRORS,
        )
    }

    /// Intents preceding negative feedback
    pub fn top_negative_feedback_intents(&self) -> Vec<RankedCount> {
        let log = self.negative_feedback.lock();
        rank(
            log.iter()
                .map(|r| r.last_intent.as_deref().unwrap_or(Intent::Unknown.as_str())),
            errors::TOP_NEGATIVE_FEEDBACK,
        )
    }

    /// Purge entries older than the retention window
    pub fn cleanup(&self) -> usize {
        self.cleanup_before(Utc::now() - self.retention)
    }

    /// Purge entries recorded before `cutoff`
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> usize {
        let removed = self.intent_errors.lock().retain(|r| r.timestamp >= cutoff)
            + self.response_errors.lock().retain(|r| r.timestamp >= cutoff)
            + self.transfer_errors.lock().retain(|r| r.timestamp >= cutoff)
            + self.timeout_errors.lock().retain(|r| r.timestamp >= cutoff)
            + self.negative_feedback.lock().retain(|r| r.timestamp >= cutoff);

        if removed > 0 {
            tracing::info!(removed, cutoff = %cutoff, "Purged expired error records");
        }
        removed
    }

    pub fn report(&self) -> ErrorReport {
        let n = errors::REPORT_RECENT_ENTRIES;
        ErrorReport {
            generated_at: Utc::now(),
            counts: self.counts(),
            top_intent_errors: self.top_intent_errors(),
            top_transfer_failures: self.top_transfer_failures(),
            top_timeout_intents: self.top_timeout_intents(),
            top_negative_feedback_intents: self.top_negative_feedback_intents(),
            recent: RecentErrors {
                intent_errors: recent(&self.intent_errors, n),
                response_errors: recent(&self.response_errors, n),
                transfer_errors: recent(&self.transfer_errors, n),
                timeout_errors: recent(&self.timeout_errors, n),
                negative_feedback: recent(&self.negative_feedback, n),
            },
        }
    }
}

fn recent<T: Clone>(log: &Mutex<RingBuffer<T>>, n: usize) -> Vec<T> {
    log.lock().last_n(n).into_iter().cloned().collect()
}

/// Count keys and return the `limit` most frequent
///
/// Equal counts keep first-seen order.
fn rank<'a>(keys: impl Iterator<Item = &'a str>, limit: usize) -> Vec<RankedCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut ranked: Vec<RankedCount> = Vec::new();

    for key in keys {
        match index.get(key) {
            Some(&i) => ranked[i].count += 1,
            None => {
                index.insert(key, ranked.len());
                ranked.push(RankedCount {
                    key: key.to_string(),
                    count: 1,
                });
            },
        }
    }

    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}
