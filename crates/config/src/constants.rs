//! Centralized constants for the dialogue engine
//!
//! Single source of truth for the fixed classifier scores, buffer
//! capacities and default thresholds used across the workspace.

/// Fixed per-category confidence scores assigned by the keyword cascade
pub mod confidence {
    pub const FAREWELL: f32 = 0.95;
    pub const DECLINE: f32 = 0.9;
    pub const HOURS: f32 = 0.9;
    pub const SEARCH_STORE: f32 = 0.85;
    pub const TRANSFER: f32 = 0.9;
    pub const LOCATION: f32 = 0.85;
    pub const SERVICES: f32 = 0.8;

    /// Store matched but no category cue present
    pub const ENTITY_ONLY: f32 = 0.7;

    /// Nothing matched on a non-empty utterance
    pub const UNKNOWN: f32 = 0.2;

    /// Empty or whitespace-only utterance
    pub const EMPTY: f32 = 0.0;
}

/// Auto-learning engine tuning
pub mod learning {
    /// Successful phrases kept per intent
    pub const SUCCESSFUL_PHRASES_CAPACITY: usize = 100;

    /// Global failure log size
    pub const FAILURES_CAPACITY: usize = 100;

    /// Observations per intent before a confidence suggestion is computed
    pub const CONFIDENCE_MIN_SAMPLES: u32 = 10;

    pub const HIGH_SUCCESS_RATE: f64 = 0.9;
    pub const LOW_SUCCESS_RATE: f64 = 0.6;
    pub const CONFIDENCE_STEP: f32 = 0.1;
    pub const CONFIDENCE_CEILING: f32 = 0.95;
    pub const CONFIDENCE_FLOOR: f32 = 0.5;

    /// Raise suggestions only below this confidence
    pub const RAISE_BELOW: f32 = 0.9;

    /// Lower suggestions only above this confidence
    pub const LOWER_ABOVE: f32 = 0.6;

    /// Failures included in the report
    pub const REPORT_RECENT_FAILURES: usize = 10;

    pub const DEFAULT_MIN_KEYWORD_FREQUENCY: u32 = 3;
    pub const DEFAULT_MIN_INTENT_FREQUENCY: u32 = 2;
}

/// Error-learning ring buffer capacities and analysis sizes
pub mod errors {
    pub const INTENT_ERRORS_CAPACITY: usize = 200;
    pub const RESPONSE_ERRORS_CAPACITY: usize = 200;
    pub const TRANSFER_ERRORS_CAPACITY: usize = 100;
    pub const TIMEOUT_ERRORS_CAPACITY: usize = 100;
    pub const NEGATIVE_FEEDBACK_CAPACITY: usize = 200;

    pub const TOP_INTENT_ERRORS: usize = 10;
    pub const TOP_TRANSFER_ERRORS: usize = 10;
    pub const TOP_TIMEOUT_ERRORS: usize = 5;
    pub const TOP_NEGATIVE_FEEDBACK: usize = 10;

    /// Entries of each kind included in the report
    pub const REPORT_RECENT_ENTRIES: usize = 5;

    pub const DEFAULT_RETENTION_DAYS: u32 = 7;
}

/// Session lifecycle defaults
pub mod dialogue {
    /// Idle time before a call context is evicted (seconds)
    pub const IDLE_TIMEOUT_SECS: u64 = 600;

    /// Interval between eviction sweeps (seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 60;

    /// Silence-timeout events before the call is closed
    pub const SILENCE_ESCALATION_THRESHOLD: u32 = 3;

    pub const MAX_TURNS: u32 = 20;
}
