//! Response Templates
//!
//! Paraphrase variants per reply kind, loaded from YAML. Placeholders use
//! `{name}` syntax and are filled by [`ResponseTemplates::render`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::ConfigError;

/// Template keys understood by the response generator and orchestrator
pub mod template_keys {
    pub const GREETING: &str = "greeting";
    pub const CLARIFY: &str = "clarify";
    pub const FOLLOW_UP: &str = "follow_up";
    pub const SEARCH_FOUND: &str = "search_found";
    pub const SEARCH_ASK_STORE: &str = "search_ask_store";
    pub const HOURS_STORE: &str = "hours_store";
    pub const HOURS_MALL: &str = "hours_mall";
    pub const TRANSFER: &str = "transfer";
    pub const TRANSFER_ASK_STORE: &str = "transfer_ask_store";
    pub const TRANSFER_NO_PHONE: &str = "transfer_no_phone";
    pub const TRANSFER_FAILED: &str = "transfer_failed";
    pub const LOCATION_STORE: &str = "location_store";
    pub const LOCATION_FACILITIES: &str = "location_facilities";
    pub const SERVICES: &str = "services";
    pub const FAREWELL: &str = "farewell";
    pub const DECLINE: &str = "decline";
    pub const SILENCE_PROMPT: &str = "silence_prompt";
    pub const SILENCE_CLOSING: &str = "silence_closing";
    pub const MAX_TURNS: &str = "max_turns";
    pub const APOLOGY: &str = "apology";
    pub const FAULT: &str = "fault";

    /// Keys that must have at least one variant
    pub const REQUIRED: &[&str] = &[
        GREETING,
        CLARIFY,
        FOLLOW_UP,
        SEARCH_FOUND,
        SEARCH_ASK_STORE,
        HOURS_STORE,
        HOURS_MALL,
        TRANSFER,
        TRANSFER_ASK_STORE,
        TRANSFER_NO_PHONE,
        TRANSFER_FAILED,
        LOCATION_STORE,
        LOCATION_FACILITIES,
        SERVICES,
        FAREWELL,
        DECLINE,
        SILENCE_PROMPT,
        SILENCE_CLOSING,
        MAX_TURNS,
        APOLOGY,
        FAULT,
    ];
}

/// Paraphrase variants keyed by template key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTemplates {
    #[serde(default)]
    pub templates: HashMap<String, Vec<String>>,
}

impl ResponseTemplates {
    /// Load from a YAML file
    ///
    /// Keys absent from the file keep their built-in variants.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let loaded: ResponseTemplates = serde_yaml::from_str(&content)?;
        let mut templates = Self::default();
        for (key, variants) in loaded.templates {
            let variants: Vec<String> = variants
                .into_iter()
                .filter(|v| !v.trim().is_empty())
                .collect();
            if variants.is_empty() {
                tracing::warn!(key = %key, "Template has no variants, keeping default");
                continue;
            }
            templates.templates.insert(key, variants);
        }

        tracing::info!(path = %path.display(), keys = templates.templates.len(), "Loaded response templates");
        Ok(templates)
    }

    /// Load from a YAML file, falling back to built-in templates when absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "Templates file missing, using built-in templates");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Variants for a key, empty when unknown
    pub fn variants(&self, key: &str) -> &[String] {
        self.templates.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fill `{placeholder}` occurrences with the given values
    pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
        let mut out = template.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }
}

impl Default for ResponseTemplates {
    fn default() -> Self {
        use template_keys::*;

        let entries: &[(&str, &[&str])] = &[
            (
                GREETING,
                &[
                    "Bienvenido a {mall}. ¿En qué le puedo ayudar?",
                    "Hola, gracias por llamar a {mall}. ¿En qué puedo ayudarle?",
                ],
            ),
            (
                CLARIFY,
                &[
                    "Disculpe, no le entendí. ¿Busca un local, un horario o algún servicio?",
                    "Perdón, ¿me lo puede repetir? Puedo ayudarle con locales, horarios y servicios.",
                ],
            ),
            (FOLLOW_UP, &["¿Hay algo más en que pueda ayudarle?"]),
            (
                SEARCH_FOUND,
                &[
                    "{name} está en el piso {floor}, zona {zone}.",
                    "Encuentra {name} en el piso {floor}, en la zona {zone}.",
                ],
            ),
            (SEARCH_ASK_STORE, &["¿Qué local está buscando?"]),
            (
                HOURS_STORE,
                &[
                    "{name} atiende de {hours}.",
                    "El horario de {name} es de {hours}.",
                ],
            ),
            (
                HOURS_MALL,
                &[
                    "{mall} abre {hours}.",
                    "Nuestro horario es {hours}.",
                ],
            ),
            (
                TRANSFER,
                &[
                    "Le comunico con {name}, un momento por favor.",
                    "Un momento, lo transfiero con {name}.",
                ],
            ),
            (
                TRANSFER_ASK_STORE,
                &["¿Con qué local desea que le comunique?"],
            ),
            (
                TRANSFER_NO_PHONE,
                &["{name} no tiene línea telefónica, pero lo encuentra en el piso {floor}, zona {zone}."],
            ),
            (
                TRANSFER_FAILED,
                &["Lo siento, no pude comunicarle en este momento."],
            ),
            (
                LOCATION_STORE,
                &["{name} se ubica en el piso {floor}, zona {zone}."],
            ),
            (
                LOCATION_FACILITIES,
                &[
                    "Los baños, cajeros y ascensores están en cada piso junto al patio central. El estacionamiento tiene acceso por el nivel -1.",
                ],
            ),
            (
                SERVICES,
                &[
                    "Contamos con wifi gratuito, cine, guardarropa, préstamo de sillas de ruedas y mesón de información en el primer piso.",
                ],
            ),
            (
                FAREWELL,
                &[
                    "Gracias por llamar, que tenga un buen día.",
                    "Fue un gusto ayudarle. ¡Hasta luego!",
                ],
            ),
            (DECLINE, &["Perfecto, gracias por llamar. ¡Que tenga un buen día!"]),
            (SILENCE_PROMPT, &["¿Sigue ahí?", "¿Me escucha?"]),
            (
                SILENCE_CLOSING,
                &["Como no le escucho, voy a finalizar la llamada. Gracias por llamar."],
            ),
            (
                MAX_TURNS,
                &["Para seguir ayudándole, le sugiero acercarse al mesón de información. Gracias por llamar."],
            ),
            (APOLOGY, &["Lamento las molestias."]),
            (FAULT, &["Disculpe, tuvimos un problema."]),
        ];

        let templates = entries
            .iter()
            .map(|(key, variants)| {
                (
                    key.to_string(),
                    variants.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect();

        Self { templates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_cover_required_keys() {
        let templates = ResponseTemplates::default();
        for key in template_keys::REQUIRED {
            assert!(!templates.variants(key).is_empty(), "missing {}", key);
        }
        assert!(templates.variants("nonexistent").is_empty());
    }

    #[test]
    fn test_render() {
        let text = ResponseTemplates::render(
            "{name} está en el piso {floor}, zona {zone}.",
            &[("name", "Nike"), ("floor", "2"), ("zone", "B")],
        );
        assert_eq!(text, "Nike está en el piso 2, zona B.");
    }

    #[test]
    fn test_load_overrides_and_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
templates:
  greeting:
    - "Hola, ¿qué necesita?"
  clarify: []
"#
        )
        .unwrap();

        let templates = ResponseTemplates::load(file.path()).unwrap();
        assert_eq!(templates.variants("greeting"), &["Hola, ¿qué necesita?".to_string()]);
        // Empty override falls back to the built-in variants
        assert!(!templates.variants("clarify").is_empty());
        assert!(!templates.variants("farewell").is_empty());
    }

    #[test]
    fn test_load_or_default_missing() {
        let templates = ResponseTemplates::load_or_default("/nonexistent/templates.yaml").unwrap();
        assert!(!templates.variants("greeting").is_empty());
    }
}
