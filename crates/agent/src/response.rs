//! Response Generation
//!
//! Maps a classified turn to a [`Reply`] using the store catalog and the
//! paraphrase templates. Generation is total: any intent, with or without a
//! resolved store, produces a reply.

use rand::seq::SliceRandom;
use std::sync::Arc;

use mall_voice_config::template_keys as keys;
use mall_voice_config::{ResponseTemplates, StoreCatalog};
use mall_voice_core::{Entities, Intent, Reply, Store};

use crate::context::Context;

/// Spoken when a template key has no variants
const LAST_RESORT: &str = "Disculpe, ¿me lo puede repetir?";

/// Template-based reply generator
#[derive(Clone)]
pub struct ResponseGenerator {
    catalog: Arc<StoreCatalog>,
    templates: Arc<ResponseTemplates>,
}

impl ResponseGenerator {
    pub fn new(catalog: Arc<StoreCatalog>, templates: Arc<ResponseTemplates>) -> Self {
        Self { catalog, templates }
    }

    /// Produce the reply for a classified turn
    ///
    /// Hours and transfer requests without a store in the utterance fall
    /// back to the last store mentioned in the call.
    pub fn generate(&self, intent: Intent, entities: &Entities, context: &Context) -> Reply {
        let mentioned = self.resolve_store(entities);

        match intent {
            Intent::SearchStore => match mentioned {
                Some(store) => Reply::say(self.render_store(keys::SEARCH_FOUND, store)),
                None => Reply::say(self.phrase(keys::SEARCH_ASK_STORE)),
            },
            Intent::Hours => match mentioned.or_else(|| self.context_store(context)) {
                Some(store) if !store.hours.trim().is_empty() => {
                    Reply::say(self.render_store(keys::HOURS_STORE, store))
                },
                _ => Reply::say(self.mall_hours()),
            },
            Intent::Transfer => match mentioned.or_else(|| self.context_store(context)) {
                Some(store) if store.has_phone() => Reply::Transfer {
                    message: self.render_store(keys::TRANSFER, store),
                    target: store.phone.clone(),
                    store_name: store.name.clone(),
                },
                Some(store) => Reply::say(self.render_store(keys::TRANSFER_NO_PHONE, store)),
                None => Reply::say(self.phrase(keys::TRANSFER_ASK_STORE)),
            },
            Intent::Location => match mentioned {
                Some(store) => Reply::say(self.render_store(keys::LOCATION_STORE, store)),
                None => Reply::say(self.phrase(keys::LOCATION_FACILITIES)),
            },
            Intent::Services => Reply::say(self.phrase(keys::SERVICES)),
            Intent::Farewell => Reply::say(self.phrase(keys::FAREWELL)),
            Intent::Decline => Reply::say(self.phrase(keys::DECLINE)),
            Intent::Unknown => Reply::say(self.phrase(keys::CLARIFY)),
        }
    }

    /// Random variant for a template key, with mall placeholders filled
    pub fn phrase(&self, key: &str) -> String {
        self.render(key, &[])
    }

    pub fn greeting(&self) -> String {
        self.phrase(keys::GREETING)
    }

    fn mall_hours(&self) -> String {
        self.render(keys::HOURS_MALL, &[("hours", self.catalog.mall.hours.as_str())])
    }

    fn render_store(&self, key: &str, store: &Store) -> String {
        self.render(
            key,
            &[
                ("name", store.name.as_str()),
                ("floor", store.floor.as_str()),
                ("zone", store.zone.as_str()),
                ("hours", store.hours.as_str()),
                ("category", store.category.as_str()),
            ],
        )
    }

    fn render(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let variants = self.templates.variants(key);
        let Some(template) = variants.choose(&mut rand::thread_rng()) else {
            tracing::warn!(key = %key, "No template variants configured");
            return LAST_RESORT.to_string();
        };

        let mut all_vars = vars.to_vec();
        all_vars.push(("mall", self.catalog.mall.name.as_str()));
        ResponseTemplates::render(template, &all_vars)
    }

    /// Catalog record for the store in the utterance
    fn resolve_store<'a>(&'a self, entities: &'a Entities) -> Option<&'a Store> {
        entities.store.as_ref().or_else(|| {
            entities
                .store_id
                .as_deref()
                .and_then(|id| self.catalog.get(id))
        })
    }

    fn context_store(&self, context: &Context) -> Option<&Store> {
        context.last_store_id().and_then(|id| self.catalog.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mall_voice_core::DetectionResult;

    fn generator() -> ResponseGenerator {
        ResponseGenerator::new(
            Arc::new(StoreCatalog::default()),
            Arc::new(ResponseTemplates::default()),
        )
    }

    fn entities(store_id: &str) -> Entities {
        let catalog = StoreCatalog::default();
        Entities::from_store(catalog.get(store_id).unwrap())
    }

    #[test]
    fn test_search_found_mentions_floor_and_zone() {
        let reply = generator().generate(Intent::SearchStore, &entities("nike"), &Context::new("c"));
        let text = reply.spoken_text();
        assert!(text.contains("Nike"));
        assert!(text.contains("piso 2"));
        assert!(text.contains("zona B"));
    }

    #[test]
    fn test_search_without_store_asks() {
        let reply = generator().generate(Intent::SearchStore, &Entities::default(), &Context::new("c"));
        assert_eq!(reply.spoken_text(), "¿Qué local está buscando?");
    }

    #[test]
    fn test_transfer_with_phone() {
        let reply = generator().generate(Intent::Transfer, &entities("zara"), &Context::new("c"));
        match reply {
            Reply::Transfer { target, store_name, message } => {
                assert_eq!(target, "+56 2 2345 1002");
                assert_eq!(store_name, "Zara");
                assert!(message.contains("Zara"));
            },
            other => panic!("expected transfer, got {:?}", other),
        }
    }

    #[test]
    fn test_transfer_without_phone_gives_location() {
        let reply = generator().generate(Intent::Transfer, &entities("starbucks"), &Context::new("c"));
        assert!(!reply.is_transfer());
        assert!(reply.spoken_text().contains("Starbucks"));
    }

    #[test]
    fn test_transfer_without_store_clarifies() {
        let reply = generator().generate(Intent::Transfer, &Entities::default(), &Context::new("c"));
        assert!(!reply.is_transfer());
        assert_eq!(reply.spoken_text(), "¿Con qué local desea que le comunique?");
    }

    #[test]
    fn test_hours_fall_back_to_context_store() {
        let mut context = Context::new("c");
        let detection = DetectionResult {
            intent: Intent::SearchStore,
            confidence: 0.85,
            entities: entities("zara"),
        };
        context.record_turn("busco zara", &detection, &Reply::say("ok"));

        let reply = generator().generate(Intent::Hours, &Entities::default(), &context);
        assert!(reply.spoken_text().contains("Zara"));
        assert!(reply.spoken_text().contains("10:00 a 21:00"));
    }

    #[test]
    fn test_hours_without_store_uses_mall_hours() {
        let reply = generator().generate(Intent::Hours, &Entities::default(), &Context::new("c"));
        assert!(reply.spoken_text().contains("de lunes a domingo"));
    }

    #[test]
    fn test_every_intent_produces_text() {
        let g = generator();
        let context = Context::new("c");
        for intent in Intent::ALL {
            let reply = g.generate(intent, &Entities::default(), &context);
            assert!(!reply.spoken_text().is_empty());
            assert!(!reply.spoken_text().contains('{'));
        }
    }

    #[test]
    fn test_missing_template_uses_last_resort() {
        let mut templates = ResponseTemplates::default();
        templates.templates.remove(keys::CLARIFY);
        let g = ResponseGenerator::new(Arc::new(StoreCatalog::default()), Arc::new(templates));
        let reply = g.generate(Intent::Unknown, &Entities::default(), &Context::new("c"));
        assert_eq!(reply.spoken_text(), LAST_RESORT);
    }
}
