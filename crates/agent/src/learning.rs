//! Auto-Learning Engine
//!
//! Aggregates turn outcomes into advisory suggestions: frequent keywords per
//! intent, recurring unrecognized phrasings (candidate new intents), and
//! confidence adjustments for intents that succeed or fail consistently.
//! Nothing here is applied automatically; suggestions await human approval.
//!
//! All aggregates live behind one mutex so each outcome is applied
//! atomically and `reset` never interleaves with an update.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use mall_voice_config::constants::learning;
use mall_voice_config::LearningConfig;
use mall_voice_core::{Intent, RingBuffer, TurnOutcome};

use crate::keywords::KeywordExtractor;
use crate::patterns::PatternAnalyzer;

/// Keyword frequently seen with an intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSuggestion {
    pub intent: Intent,
    pub keyword: String,
    pub frequency: u32,
}

/// Recurring phrasing the classifier failed on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSuggestion {
    /// Normalized (lowercased, trimmed) utterance
    pub text: String,
    pub pattern_signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub frequency: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Observed performance of an intent and the suggested confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    pub intent: Intent,
    pub success_count: u32,
    pub failure_count: u32,
    pub avg_confidence: f32,
    pub current_confidence: f32,
    pub suggested_confidence: Option<f32>,
    /// Fraction of successful outcomes, 0.0..=1.0
    pub success_rate: f64,
    pub sample_count: u32,
}

/// Failed turn kept for the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub call_id: String,
    pub utterance: String,
    pub intent: Intent,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot returned by [`AutoLearningEngine::report`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningReport {
    pub generated_at: DateTime<Utc>,
    pub total_outcomes: u64,
    /// Percentage of successful outcomes, 0 when none observed
    pub success_rate: f64,
    pub suggested_keywords: Vec<KeywordSuggestion>,
    pub suggested_intents: Vec<IntentSuggestion>,
    pub confidence_adjustments: Vec<ConfidenceAdjustment>,
    pub recent_failures: Vec<FailureRecord>,
}

#[derive(Debug, Clone, Default)]
struct IntentStats {
    success_count: u32,
    failure_count: u32,
    confidence_sum: f64,
    current_confidence: f32,
    suggested_confidence: Option<f32>,
}

impl IntentStats {
    fn total(&self) -> u32 {
        self.success_count + self.failure_count
    }

    fn avg_confidence(&self) -> f32 {
        match self.total() {
            0 => 0.0,
            n => (self.confidence_sum / f64::from(n)) as f32,
        }
    }

    fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => f64::from(self.success_count) / f64::from(n),
        }
    }

    /// New suggestion when the success rate leaves the neutral band
    ///
    /// `None` means "no change": below the minimum sample count, or with a
    /// success rate between the low and high thresholds.
    fn compute_suggestion(&self) -> Option<f32> {
        if self.total() < learning::CONFIDENCE_MIN_SAMPLES {
            return None;
        }

        let rate = self.success_rate();
        let current = self.current_confidence;
        if rate > learning::HIGH_SUCCESS_RATE && current < learning::RAISE_BELOW {
            Some(round2((current + learning::CONFIDENCE_STEP).min(learning::CONFIDENCE_CEILING)))
        } else if rate < learning::LOW_SUCCESS_RATE && current > learning::LOWER_ABOVE {
            Some(round2((current - learning::CONFIDENCE_STEP).max(learning::CONFIDENCE_FLOOR)))
        } else {
            None
        }
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

struct LearningState {
    intent_stats: HashMap<Intent, IntentStats>,
    successful_phrases: HashMap<Intent, RingBuffer<String>>,
    failures: RingBuffer<FailureRecord>,
    /// Insertion-ordered suggestions plus a text index for upserts
    intent_suggestions: Vec<IntentSuggestion>,
    suggestion_index: HashMap<String, usize>,
    keyword_frequency: HashMap<Intent, HashMap<String, u32>>,
    total_success: u64,
    total_failure: u64,
}

impl Default for LearningState {
    fn default() -> Self {
        Self {
            intent_stats: HashMap::new(),
            successful_phrases: HashMap::new(),
            failures: RingBuffer::new(learning::FAILURES_CAPACITY),
            intent_suggestions: Vec::new(),
            suggestion_index: HashMap::new(),
            keyword_frequency: HashMap::new(),
            total_success: 0,
            total_failure: 0,
        }
    }
}

/// Online learning aggregator fed by flushed call histories
pub struct AutoLearningEngine {
    config: LearningConfig,
    extractor: KeywordExtractor,
    analyzer: PatternAnalyzer,
    state: Mutex<LearningState>,
}

impl Default for AutoLearningEngine {
    fn default() -> Self {
        Self::new(LearningConfig::default())
    }
}

impl AutoLearningEngine {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            extractor: KeywordExtractor::default(),
            analyzer: PatternAnalyzer::new(),
            state: Mutex::new(LearningState::default()),
        }
    }

    /// Fold one turn outcome into the aggregates
    pub fn process_outcome(&self, outcome: &TurnOutcome) {
        let normalized = outcome.utterance.trim().to_lowercase();
        let keywords = self.extractor.extract(&normalized);
        // Pattern analysis is pure; keep it outside the lock
        let pattern = if outcome.success || normalized.is_empty() {
            None
        } else {
            self.analyzer.analyze(&normalized)
        };

        let mut state = self.state.lock();

        if outcome.success {
            state.total_success += 1;
            state
                .successful_phrases
                .entry(outcome.intent)
                .or_insert_with(|| RingBuffer::new(learning::SUCCESSFUL_PHRASES_CAPACITY))
                .push(outcome.utterance.clone());
        } else {
            state.total_failure += 1;
            state.failures.push(FailureRecord {
                call_id: outcome.call_id.clone(),
                utterance: outcome.utterance.clone(),
                intent: outcome.intent,
                confidence: outcome.confidence,
                timestamp: outcome.timestamp,
            });

            if let Some(m) = pattern {
                upsert_suggestion(&mut state, &normalized, m.signature, Some(m.subject), outcome.timestamp);
            }
        }

        let table = state.keyword_frequency.entry(outcome.intent).or_default();
        for keyword in keywords {
            *table.entry(keyword).or_insert(0) += 1;
        }

        let stats = state.intent_stats.entry(outcome.intent).or_default();
        if outcome.success {
            stats.success_count += 1;
        } else {
            stats.failure_count += 1;
        }
        stats.confidence_sum += f64::from(outcome.confidence);
        stats.current_confidence = outcome.confidence;
        if let Some(suggested) = stats.compute_suggestion() {
            stats.suggested_confidence = Some(suggested);
        }

        tracing::trace!(
            call_id = %outcome.call_id,
            intent = %outcome.intent,
            success = outcome.success,
            "Processed turn outcome"
        );
    }

    /// Keywords seen at least `min_frequency` times, most frequent first
    pub fn suggested_keywords(&self, min_frequency: u32) -> Vec<KeywordSuggestion> {
        let state = self.state.lock();
        let mut suggestions: Vec<KeywordSuggestion> = state
            .keyword_frequency
            .iter()
            .flat_map(|(intent, table)| {
                table
                    .iter()
                    .filter(|(_, freq)| **freq >= min_frequency)
                    .map(move |(keyword, &frequency)| KeywordSuggestion {
                        intent: *intent,
                        keyword: keyword.clone(),
                        frequency,
                    })
            })
            .collect();

        suggestions.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.intent.as_str().cmp(b.intent.as_str()))
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        suggestions
    }

    /// Unrecognized phrasings seen at least `min_frequency` times
    ///
    /// Most frequent first; equal frequencies keep first-seen order.
    pub fn suggested_intents(&self, min_frequency: u32) -> Vec<IntentSuggestion> {
        let state = self.state.lock();
        let mut suggestions: Vec<IntentSuggestion> = state
            .intent_suggestions
            .iter()
            .filter(|s| s.frequency >= min_frequency)
            .cloned()
            .collect();
        suggestions.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        suggestions
    }

    /// Intents carrying a confidence suggestion, in intent declaration order
    pub fn confidence_adjustments(&self) -> Vec<ConfidenceAdjustment> {
        let state = self.state.lock();
        Intent::ALL
            .iter()
            .filter_map(|intent| {
                let stats = state.intent_stats.get(intent)?;
                stats.suggested_confidence.map(|suggested| ConfidenceAdjustment {
                    intent: *intent,
                    success_count: stats.success_count,
                    failure_count: stats.failure_count,
                    avg_confidence: round2(stats.avg_confidence()),
                    current_confidence: stats.current_confidence,
                    suggested_confidence: Some(suggested),
                    success_rate: (stats.success_rate() * 100.0).round() / 100.0,
                    sample_count: stats.total(),
                })
            })
            .collect()
    }

    /// Recent successful phrasings for an intent, oldest first
    pub fn successful_phrases(&self, intent: Intent) -> Vec<String> {
        self.state
            .lock()
            .successful_phrases
            .get(&intent)
            .map(RingBuffer::to_vec)
            .unwrap_or_default()
    }

    pub fn total_outcomes(&self) -> u64 {
        let state = self.state.lock();
        state.total_success + state.total_failure
    }

    pub fn report(&self) -> LearningReport {
        let (total_outcomes, success_rate, recent_failures) = {
            let state = self.state.lock();
            let total = state.total_success + state.total_failure;
            let rate = if total == 0 {
                0.0
            } else {
                (state.total_success as f64 / total as f64 * 10_000.0).round() / 100.0
            };
            let failures = state
                .failures
                .last_n(learning::REPORT_RECENT_FAILURES)
                .into_iter()
                .cloned()
                .collect();
            (total, rate, failures)
        };

        LearningReport {
            generated_at: Utc::now(),
            total_outcomes,
            success_rate,
            suggested_keywords: self.suggested_keywords(self.config.min_keyword_frequency),
            suggested_intents: self.suggested_intents(self.config.min_intent_frequency),
            confidence_adjustments: self.confidence_adjustments(),
            recent_failures,
        }
    }

    /// Drop all aggregates
    pub fn reset(&self) {
        *self.state.lock() = LearningState::default();
        tracing::info!("Auto-learning aggregates reset");
    }
}

fn upsert_suggestion(
    state: &mut LearningState,
    text: &str,
    signature: String,
    subject: Option<String>,
    seen_at: DateTime<Utc>,
) {
    match state.suggestion_index.get(text) {
        Some(&i) => {
            let suggestion = &mut state.intent_suggestions[i];
            suggestion.frequency += 1;
            suggestion.last_seen = seen_at;
        },
        None => {
            state
                .suggestion_index
                .insert(text.to_string(), state.intent_suggestions.len());
            state.intent_suggestions.push(IntentSuggestion {
                text: text.to_string(),
                pattern_signature: signature,
                subject,
                frequency: 1,
                first_seen: seen_at,
                last_seen: seen_at,
            });
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(utterance: &str, intent: Intent, confidence: f32, success: bool) -> TurnOutcome {
        TurnOutcome {
            call_id: "call-1".to_string(),
            utterance: utterance.to_string(),
            intent,
            confidence,
            success,
            store_id: None,
            timestamp: Utc::now(),
        }
    }

    fn suggestion_for(engine: &AutoLearningEngine, intent: Intent) -> Option<f32> {
        engine
            .confidence_adjustments()
            .into_iter()
            .find(|a| a.intent == intent)
            .and_then(|a| a.suggested_confidence)
    }

    #[test]
    fn test_confidence_raised_on_high_success() {
        let engine = AutoLearningEngine::default();
        for _ in 0..11 {
            engine.process_outcome(&outcome("busco nike", Intent::SearchStore, 0.7, true));
        }
        let suggested = suggestion_for(&engine, Intent::SearchStore).unwrap();
        assert!((suggested - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_lowered_on_low_success() {
        let engine = AutoLearningEngine::default();
        for _ in 0..4 {
            engine.process_outcome(&outcome("horario", Intent::Hours, 0.7, true));
        }
        for _ in 0..8 {
            engine.process_outcome(&outcome("horario", Intent::Hours, 0.7, false));
        }
        let suggested = suggestion_for(&engine, Intent::Hours).unwrap();
        assert!((suggested - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_no_suggestion_below_min_samples() {
        let engine = AutoLearningEngine::default();
        for _ in 0..9 {
            engine.process_outcome(&outcome("busco nike", Intent::SearchStore, 0.7, true));
        }
        assert_eq!(suggestion_for(&engine, Intent::SearchStore), None);
    }

    #[test]
    fn test_confidence_bounds() {
        let engine = AutoLearningEngine::default();
        for _ in 0..10 {
            engine.process_outcome(&outcome("wifi", Intent::Services, 0.88, true));
        }
        let suggested = suggestion_for(&engine, Intent::Services).unwrap();
        assert!((suggested - 0.95).abs() < 1e-6);

        let engine = AutoLearningEngine::default();
        for _ in 0..10 {
            engine.process_outcome(&outcome("baño", Intent::Location, 0.62, false));
        }
        let suggested = suggestion_for(&engine, Intent::Location).unwrap();
        assert!((suggested - 0.52).abs() < 1e-6);
    }

    #[test]
    fn test_missing_intent_dedup_by_text() {
        let engine = AutoLearningEngine::default();
        engine.process_outcome(&outcome("¿Dónde está la juguetería?", Intent::Unknown, 0.2, false));
        engine.process_outcome(&outcome("  ¿dónde está la juguetería? ", Intent::Unknown, 0.2, false));
        engine.process_outcome(&outcome("¿tienen lockers?", Intent::Unknown, 0.2, false));

        let suggestions = engine.suggested_intents(2);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].frequency, 2);
        assert_eq!(suggestions[0].pattern_signature, "where_is");
        assert_eq!(suggestions[0].subject.as_deref(), Some("juguetería"));

        let all = engine.suggested_intents(1);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].pattern_signature, "do_you_have");
    }

    #[test]
    fn test_unstructured_failure_creates_no_suggestion() {
        let engine = AutoLearningEngine::default();
        engine.process_outcome(&outcome("el clima está raro", Intent::Unknown, 0.2, false));
        engine.process_outcome(&outcome("blah", Intent::Unknown, 0.2, false));

        assert!(engine.suggested_intents(1).is_empty());
        // Still recorded as failures
        assert_eq!(engine.report().recent_failures.len(), 2);
    }

    #[test]
    fn test_neutral_band_keeps_prior_suggestion() {
        let engine = AutoLearningEngine::default();
        for _ in 0..11 {
            engine.process_outcome(&outcome("busco nike", Intent::SearchStore, 0.7, true));
        }
        // 11/14 successes lands between the thresholds
        for _ in 0..3 {
            engine.process_outcome(&outcome("busco nike", Intent::SearchStore, 0.7, false));
        }
        let suggested = suggestion_for(&engine, Intent::SearchStore).unwrap();
        assert!((suggested - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_neutral_band_without_prior_suggestion() {
        let engine = AutoLearningEngine::default();
        for _ in 0..7 {
            engine.process_outcome(&outcome("horario", Intent::Hours, 0.85, true));
        }
        for _ in 0..3 {
            engine.process_outcome(&outcome("horario", Intent::Hours, 0.85, false));
        }
        assert_eq!(suggestion_for(&engine, Intent::Hours), None);
        assert!(engine.confidence_adjustments().is_empty());
    }

    #[test]
    fn test_adjustments_list_only_suggested_intents() {
        let engine = AutoLearningEngine::default();
        engine.process_outcome(&outcome("wifi", Intent::Services, 0.9, true));
        for _ in 0..10 {
            engine.process_outcome(&outcome("busco nike", Intent::SearchStore, 0.7, true));
        }

        let adjustments = engine.confidence_adjustments();
        assert_eq!(adjustments.len(), 1);
        let adjustment = &adjustments[0];
        assert_eq!(adjustment.intent, Intent::SearchStore);
        assert_eq!(adjustment.sample_count, 10);
        assert!((adjustment.success_rate - 1.0).abs() < 1e-9);
        assert!(adjustment.suggested_confidence.is_some());
    }

    #[test]
    fn test_keyword_suggestions() {
        let engine = AutoLearningEngine::default();
        for _ in 0..3 {
            engine.process_outcome(&outcome("busco zapatillas nike", Intent::SearchStore, 0.85, true));
        }
        engine.process_outcome(&outcome("poleras rojas", Intent::SearchStore, 0.85, true));

        let keywords = engine.suggested_keywords(3);
        assert_eq!(keywords.len(), 3);
        assert!(keywords.iter().all(|k| k.frequency == 3));
        assert!(keywords.iter().any(|k| k.keyword == "zapatillas"));
        assert!(!keywords.iter().any(|k| k.keyword == "poleras"));
    }

    #[test]
    fn test_successful_phrases_bounded() {
        let engine = AutoLearningEngine::default();
        for i in 0..(learning::SUCCESSFUL_PHRASES_CAPACITY + 5) {
            engine.process_outcome(&outcome(&format!("frase {}", i), Intent::Hours, 0.9, true));
        }
        let phrases = engine.successful_phrases(Intent::Hours);
        assert_eq!(phrases.len(), learning::SUCCESSFUL_PHRASES_CAPACITY);
        assert_eq!(phrases[0], "frase 5");
    }

    #[test]
    fn test_report_and_reset() {
        let engine = AutoLearningEngine::default();
        engine.process_outcome(&outcome("busco nike", Intent::SearchStore, 0.85, true));
        engine.process_outcome(&outcome("¿dónde está la juguetería?", Intent::Unknown, 0.2, false));
        engine.process_outcome(&outcome("¿dónde está la juguetería?", Intent::Unknown, 0.2, false));
        engine.process_outcome(&outcome("blah", Intent::Unknown, 0.2, false));
        engine.process_outcome(&outcome("hora", Intent::Hours, 0.9, true));
        engine.process_outcome(&outcome("horario", Intent::Hours, 0.9, true));

        let report = engine.report();
        assert_eq!(report.total_outcomes, 6);
        assert!((report.success_rate - 50.0).abs() < 1e-9);
        assert_eq!(report.recent_failures.len(), 3);
        assert_eq!(report.suggested_intents.len(), 1);
        assert_eq!(report.suggested_intents[0].pattern_signature, "where_is");
        // Too few samples for any suggestion
        assert!(report.confidence_adjustments.is_empty());

        engine.reset();
        let report = engine.report();
        assert_eq!(report.total_outcomes, 0);
        assert_eq!(report.success_rate, 0.0);
        assert!(report.confidence_adjustments.is_empty());
        assert!(engine.successful_phrases(Intent::SearchStore).is_empty());
    }
}
