//! Structural pattern analysis
//!
//! Recognizes question shapes ("dónde está X", "do you have X") in utterances
//! the cascade failed on, so they can be proposed as new intents.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Question shape and the phrase it asks about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub signature: String,
    pub subject: String,
}

// (signature, pattern) in evaluation order; every pattern captures `subject`
const PATTERN_SOURCES: &[(&str, &str)] = &[
    (
        "where_is",
        r"\b(?:dónde|donde)\s+(?:está|esta|están|estan|queda|quedan|se encuentra|se encuentran|hay)\s+(?:el\s+|la\s+|los\s+|las\s+|un\s+|una\s+)?(?P<subject>.+)",
    ),
    (
        "where_is",
        r"\bwhere\s+(?:is|are|can i find)\s+(?:the\s+|a\s+)?(?P<subject>.+)",
    ),
    (
        "how_much",
        r"\b(?:cuánto|cuanto|cuánta|cuanta)\s+(?:cuesta|cuestan|vale|valen|sale|salen)\s+(?:el\s+|la\s+|los\s+|las\s+)?(?P<subject>.+)",
    ),
    (
        "how_much",
        r"\bhow\s+much\s+(?:is|are|does|do)\s+(?:the\s+|a\s+)?(?P<subject>.+)",
    ),
    (
        "do_you_have",
        r"\b(?:tienen|tiene|venden|hay)\s+(?P<subject>.+)",
    ),
    (
        "do_you_have",
        r"\bdo\s+you\s+(?:have|sell)\s+(?:any\s+)?(?P<subject>.+)",
    ),
    (
        "can_i",
        r"\b(?:puedo|se puede|se pueden)\s+(?P<subject>.+)",
    ),
    ("can_i", r"\bcan\s+i\s+(?P<subject>.+)"),
    (
        "need",
        r"\b(?:necesito|quiero|quisiera)\s+(?P<subject>.+)",
    ),
    ("need", r"\bi\s+(?:need|want)\s+(?:a\s+|an\s+|to\s+)?(?P<subject>.+)"),
];

static PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    PATTERN_SOURCES
        .iter()
        .map(|(signature, source)| {
            let regex = Regex::new(source).expect("structural pattern must compile");
            (*signature, regex)
        })
        .collect()
});

/// Ordered structural pattern matcher
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// First matching pattern, if any
    pub fn analyze(&self, text: &str) -> Option<PatternMatch> {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        PATTERNS.iter().find_map(|(signature, regex)| {
            let caps = regex.captures(&normalized)?;
            let subject = caps
                .name("subject")?
                .as_str()
                .trim_matches(|c: char| c.is_whitespace() || "?!.,¿¡".contains(c))
                .to_string();
            if subject.is_empty() {
                return None;
            }
            Some(PatternMatch {
                signature: signature.to_string(),
                subject,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_is() {
        let m = PatternAnalyzer::new()
            .analyze("¿Dónde está la juguetería?")
            .unwrap();
        assert_eq!(m.signature, "where_is");
        assert_eq!(m.subject, "juguetería");

        let m = PatternAnalyzer::new().analyze("Where is the pet shop?").unwrap();
        assert_eq!(m.signature, "where_is");
        assert_eq!(m.subject, "pet shop");
    }

    #[test]
    fn test_where_is_wins_over_do_you_have() {
        let m = PatternAnalyzer::new().analyze("donde hay cajeros").unwrap();
        assert_eq!(m.signature, "where_is");
        assert_eq!(m.subject, "cajeros");
    }

    #[test]
    fn test_other_shapes() {
        let analyzer = PatternAnalyzer::new();
        assert_eq!(
            analyzer.analyze("cuánto cuesta el estacionamiento").unwrap().signature,
            "how_much"
        );
        assert_eq!(
            analyzer.analyze("¿tienen lockers?").unwrap().subject,
            "lockers"
        );
        assert_eq!(
            analyzer.analyze("can I bring my dog").unwrap().signature,
            "can_i"
        );
    }

    #[test]
    fn test_no_match() {
        let analyzer = PatternAnalyzer::new();
        assert!(analyzer.analyze("el clima está raro").is_none());
        assert!(analyzer.analyze("blah").is_none());
        assert!(analyzer.analyze("").is_none());
    }
}
