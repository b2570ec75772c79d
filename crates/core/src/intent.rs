//! Intent tags and detection results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::store::Store;

/// Classified purpose of a caller utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Caller is looking for a store
    SearchStore,
    /// Opening hours of a store or of the mall
    Hours,
    /// Caller wants to be connected to a store
    Transfer,
    /// Facilities and directions (restrooms, parking, elevators)
    Location,
    /// Mall services (wifi, cinema, promotions)
    Services,
    /// Caller is saying goodbye
    Farewell,
    /// Caller declines further help
    Decline,
    /// Nothing matched
    #[default]
    Unknown,
}

impl Intent {
    /// All intents, in declaration order
    pub const ALL: [Intent; 8] = [
        Intent::SearchStore,
        Intent::Hours,
        Intent::Transfer,
        Intent::Location,
        Intent::Services,
        Intent::Farewell,
        Intent::Decline,
        Intent::Unknown,
    ];

    /// Stable tag used in reports and learning tables
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::SearchStore => "search_store",
            Intent::Hours => "hours",
            Intent::Transfer => "transfer",
            Intent::Location => "location",
            Intent::Services => "services",
            Intent::Farewell => "farewell",
            Intent::Decline => "decline",
            Intent::Unknown => "unknown",
        }
    }

    /// Topic tag recorded in the call context, if the intent maps to one
    pub fn topic(&self) -> Option<&'static str> {
        match self {
            Intent::SearchStore => Some("stores"),
            Intent::Hours => Some("schedule"),
            Intent::Transfer => Some("transfer"),
            Intent::Location => Some("facilities"),
            Intent::Services => Some("services"),
            Intent::Farewell | Intent::Decline | Intent::Unknown => None,
        }
    }

    /// Whether this intent ends the conversation
    pub fn is_closing(&self) -> bool {
        matches!(self, Intent::Farewell | Intent::Decline)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str() == s)
            .ok_or_else(|| CoreError::UnknownIntent(s.to_string()))
    }
}

/// Entities extracted from an utterance
///
/// Empty when no catalog store matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<Store>,
}

impl Entities {
    /// Entities resolved to a catalog store
    pub fn from_store(store: &Store) -> Self {
        Self {
            store_id: Some(store.id.clone()),
            store_name: Some(store.name.clone()),
            store: Some(store.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.store_id.is_none() && self.store_name.is_none() && self.store.is_none()
    }
}

/// Output of intent detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub intent: Intent,
    /// Fixed per-category score in [0, 1]
    pub confidence: f32,
    pub entities: Entities,
}

impl DetectionResult {
    pub fn unknown(confidence: f32) -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: confidence.clamp(0.0, 1.0),
            entities: Entities::default(),
        }
    }
}
