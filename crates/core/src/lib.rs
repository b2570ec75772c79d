//! Core types for the mall voice assistant
//!
//! This crate provides the foundational types shared across all other crates:
//! - Intent tags and detection results
//! - Store catalog records and extracted entities
//! - Replies and gateway directives
//! - Error records tracked by the error-learning system
//! - Fixed-capacity ring buffer used for bounded histories
//! - Error types

pub mod conversation;
pub mod error;
pub mod error_record;
pub mod intent;
pub mod ring_buffer;
pub mod store;

pub use conversation::{
    DialogueState, Directive, GatewayEvent, Reply, Satisfaction, TransferStatus, TurnOutcome,
};
pub use error::{CoreError, Result};
pub use error_record::{
    ErrorKind, IntentErrorRecord, NegativeFeedbackRecord, ResponseErrorRecord,
    TimeoutErrorRecord, TransferErrorRecord,
};
pub use intent::{DetectionResult, Entities, Intent};
pub use ring_buffer::RingBuffer;
pub use store::Store;
