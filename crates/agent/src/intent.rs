//! Intent Detection
//!
//! Ordered keyword cascade over the normalized utterance. The first category
//! whose cue occurs wins with that category's fixed confidence; catalog
//! entity extraction runs independently and attaches the first matching
//! store. Detection is pure and never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use mall_voice_config::constants::confidence;
use mall_voice_config::StoreCatalog;
use mall_voice_core::{DetectionResult, Entities, Intent};

/// Cue list for one cascade step
struct CueSet {
    intent: Intent,
    confidence: f32,
    pattern: Regex,
}

impl CueSet {
    fn new(intent: Intent, confidence: f32, cues: &[&str]) -> Self {
        let alternation = cues
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");
        // Cue lists are constants; the pattern always compiles
        let pattern = Regex::new(&format!(r"\b(?:{})\b", alternation))
            .expect("cue list must compile to a valid regex");
        Self {
            intent,
            confidence,
            pattern,
        }
    }
}

const FAREWELL_CUES: &[&str] = &[
    "adiós",
    "adios",
    "hasta luego",
    "hasta pronto",
    "chao",
    "chau",
    "bye",
    "goodbye",
    "nos vemos",
];

const DECLINE_CUES: &[&str] = &[
    "nada más",
    "nada mas",
    "eso es todo",
    "es todo",
    "no necesito",
    "no gracias",
    "that's all",
    "nothing else",
];

const HOURS_CUES: &[&str] = &[
    "horario",
    "horarios",
    "hora",
    "abre",
    "abren",
    "cierra",
    "cierran",
    "abierto",
    "hours",
    "open",
    "close",
];

const SEARCH_CUES: &[&str] = &[
    "busco",
    "buscando",
    "tienda",
    "local",
    "encontrar",
    "looking for",
];

const TRANSFER_CUES: &[&str] = &[
    "comunicar",
    "comuníqueme",
    "comuniqueme",
    "comunicarme",
    "transferir",
    "hablar con",
    "llamar a",
    "conectar",
    "operador",
    "transfer",
];

const LOCATION_CUES: &[&str] = &[
    "baño",
    "baños",
    "bano",
    "estacionamiento",
    "cajero",
    "salida",
    "piso",
    "ascensor",
    "escalera",
    "patio de comidas",
    "food court",
    "parking",
    "restroom",
];

const SERVICES_CUES: &[&str] = &[
    "servicio",
    "servicios",
    "wifi",
    "cine",
    "promociones",
    "ofertas",
    "eventos",
    "guardarropa",
    "silla de ruedas",
    "información",
    "informacion",
];

/// Category cascade, evaluated in order
static CASCADE: Lazy<Vec<CueSet>> = Lazy::new(|| {
    vec![
        CueSet::new(Intent::Farewell, confidence::FAREWELL, FAREWELL_CUES),
        CueSet::new(Intent::Decline, confidence::DECLINE, DECLINE_CUES),
        CueSet::new(Intent::Hours, confidence::HOURS, HOURS_CUES),
        CueSet::new(Intent::SearchStore, confidence::SEARCH_STORE, SEARCH_CUES),
        CueSet::new(Intent::Transfer, confidence::TRANSFER, TRANSFER_CUES),
        CueSet::new(Intent::Location, confidence::LOCATION, LOCATION_CUES),
        CueSet::new(Intent::Services, confidence::SERVICES, SERVICES_CUES),
    ]
});

/// Keyword-cascade intent detector
#[derive(Clone)]
pub struct IntentDetector {
    catalog: Arc<StoreCatalog>,
}

impl IntentDetector {
    pub fn new(catalog: Arc<StoreCatalog>) -> Self {
        Self { catalog }
    }

    /// Classify an utterance
    pub fn detect(&self, utterance: &str) -> DetectionResult {
        let normalized = normalize(utterance);
        if normalized.is_empty() {
            return DetectionResult::unknown(confidence::EMPTY);
        }

        let entities = self
            .catalog
            .find_match(&normalized)
            .map(Entities::from_store)
            .unwrap_or_default();

        if let Some(cue_set) = CASCADE.iter().find(|c| c.pattern.is_match(&normalized)) {
            tracing::trace!(
                intent = %cue_set.intent,
                store = ?entities.store_id,
                "Category cue matched"
            );
            return DetectionResult {
                intent: cue_set.intent,
                confidence: cue_set.confidence,
                entities,
            };
        }

        if !entities.is_empty() {
            return DetectionResult {
                intent: Intent::SearchStore,
                confidence: confidence::ENTITY_ONLY,
                entities,
            };
        }

        DetectionResult::unknown(confidence::UNKNOWN)
    }

    pub fn catalog(&self) -> &StoreCatalog {
        &self.catalog
    }
}

/// Lowercase and trim
pub fn normalize(utterance: &str) -> String {
    utterance.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> IntentDetector {
        IntentDetector::new(Arc::new(StoreCatalog::default()))
    }

    #[test]
    fn test_empty_utterance() {
        let d = detector();
        for text in ["", "   ", "\t\n"] {
            let result = d.detect(text);
            assert_eq!(result.intent, Intent::Unknown);
            assert_eq!(result.confidence, 0.0);
            assert!(result.entities.is_empty());
        }
    }

    #[test]
    fn test_search_store_with_entity() {
        let result = detector().detect("busco Nike");
        assert_eq!(result.intent, Intent::SearchStore);
        assert_eq!(result.confidence, confidence::SEARCH_STORE);
        assert_eq!(result.entities.store_name.as_deref(), Some("Nike"));
        assert_eq!(result.entities.store_id.as_deref(), Some("nike"));
    }

    #[test]
    fn test_farewell_beats_hours() {
        let result = detector().detect("adiós, ¿a qué hora cierran?");
        assert_eq!(result.intent, Intent::Farewell);
        assert_eq!(result.confidence, confidence::FAREWELL);

        let result = detector().detect("adiós, gracias");
        assert_eq!(result.intent, Intent::Farewell);
    }

    #[test]
    fn test_hours_with_store() {
        let result = detector().detect("¿A qué hora abre Zara?");
        assert_eq!(result.intent, Intent::Hours);
        assert_eq!(result.entities.store_id.as_deref(), Some("zara"));
    }

    #[test]
    fn test_cues_respect_word_boundaries() {
        // "ahora" must not fire the "hora" cue
        let result = detector().detect("ahora sí");
        assert_eq!(result.intent, Intent::Unknown);
    }

    #[test]
    fn test_entity_only_is_search() {
        let result = detector().detect("starbucks");
        assert_eq!(result.intent, Intent::SearchStore);
        assert_eq!(result.confidence, confidence::ENTITY_ONLY);
    }

    #[test]
    fn test_other_categories() {
        let d = detector();
        assert_eq!(d.detect("quiero hablar con Nike").intent, Intent::Transfer);
        assert_eq!(d.detect("¿dónde está el baño?").intent, Intent::Location);
        assert_eq!(d.detect("¿tienen wifi?").intent, Intent::Services);
        assert_eq!(d.detect("no gracias, eso es todo").intent, Intent::Decline);
    }

    #[test]
    fn test_unknown() {
        let result = detector().detect("el clima está raro");
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, confidence::UNKNOWN);
    }

    #[test]
    fn test_deterministic_and_bounded() {
        let d = detector();
        for text in ["busco nike", "hola", "adiós", "¿tienen cine?", "xyz"] {
            let a = d.detect(text);
            let b = d.detect(text);
            assert_eq!(a, b);
            assert!((0.0..=1.0).contains(&a.confidence));
        }
    }
}
