//! Store catalog records
//!
//! The catalog is owned externally and consumed read-only by intent
//! detection (entity matching) and response generation (content).

use serde::{Deserialize, Serialize};

/// A store in the mall directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub floor: String,
    pub zone: String,
    /// Transfer target; empty when the store has no line
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub hours: String,
    /// Lowercase match terms besides the name
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl Store {
    /// Whether the store can be reached by transfer
    pub fn has_phone(&self) -> bool {
        !self.phone.trim().is_empty()
    }

    /// Whether the store name or any keyword occurs in an already-normalized utterance
    pub fn matches(&self, normalized: &str) -> bool {
        let name = self.name.to_lowercase();
        if !name.is_empty() && normalized.contains(&name) {
            return true;
        }
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && normalized.contains(&k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store {
            id: "nike".into(),
            name: "Nike".into(),
            category: "deportes".into(),
            floor: "2".into(),
            zone: "B".into(),
            phone: String::new(),
            hours: "10:00 a 21:00".into(),
            keywords: vec!["zapatillas".into(), "".into()],
            description: String::new(),
        }
    }

    #[test]
    fn test_matches_name_and_keywords() {
        let s = store();
        assert!(s.matches("busco nike"));
        assert!(s.matches("quiero zapatillas"));
        assert!(!s.matches("busco adidas"));
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let mut s = store();
        s.name = String::new();
        s.keywords = vec![String::new()];
        assert!(!s.matches("cualquier cosa"));
    }

    #[test]
    fn test_has_phone() {
        let mut s = store();
        assert!(!s.has_phone());
        s.phone = "+56 2 2345 6789".into();
        assert!(s.has_phone());
    }
}
