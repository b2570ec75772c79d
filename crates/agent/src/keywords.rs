//! Keyword extraction for the learning tables

use once_cell::sync::Lazy;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Maximum keywords taken from one utterance
pub const DEFAULT_MAX_KEYWORDS: usize = 10;

const MIN_KEYWORD_CHARS: usize = 3;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Spanish
        "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "al", "a", "en",
        "y", "o", "que", "qué", "por", "para", "con", "sin", "se", "su", "sus", "me", "mi",
        "mis", "te", "tu", "lo", "le", "les", "es", "son", "está", "esta", "están", "estan",
        "hay", "muy", "más", "mas", "pero", "como", "cómo", "este", "esto", "eso", "esa",
        "ese", "hola", "buenas", "buenos", "días", "dias", "tardes", "noches", "gracias",
        "favor", "quiero", "quisiera", "necesito", "puede", "podría", "usted", "ustedes",
        "dónde", "donde", "cuál", "cual", "cuándo", "cuando", "sí", "si", "no", "ahí", "aquí",
        "tienen", "tiene",
        // English
        "the", "and", "for", "you", "are", "is", "was", "what", "where", "when", "how", "can",
        "have", "has", "with", "this", "that", "please", "thanks", "thank", "hello", "want",
        "need", "there", "your", "does", "from",
    ]
    .into_iter()
    .collect()
});

/// Unicode-aware keyword extractor
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    max_keywords: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYWORDS)
    }
}

impl KeywordExtractor {
    pub fn new(max_keywords: usize) -> Self {
        Self { max_keywords }
    }

    /// Content words in first-occurrence order, deduplicated and capped
    pub fn extract(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut seen = HashSet::new();
        let mut keywords = Vec::new();

        for word in lowered.unicode_words() {
            if keywords.len() >= self.max_keywords {
                break;
            }
            if word.chars().count() < MIN_KEYWORD_CHARS
                || STOPWORDS.contains(word)
                || word.chars().all(|c| c.is_numeric())
            {
                continue;
            }
            if seen.insert(word) {
                keywords.push(word.to_string());
            }
        }

        keywords
    }
}
