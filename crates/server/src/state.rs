//! Application State
//!
//! Shared state across all handlers.

use parking_lot::RwLock;
use std::sync::Arc;

use mall_voice_agent::{
    AutoLearningEngine, ContextManager, ConversationLog, DialogueOrchestrator,
    ErrorLearningSystem, IntentDetector, OrchestratorConfig, ResponseGenerator,
    TracingConversationLog,
};
use mall_voice_config::{load_settings, ResponseTemplates, Settings, StoreCatalog};

use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration wrapped in RwLock for reload support
    pub config: Arc<RwLock<Settings>>,
    pub orchestrator: Arc<DialogueOrchestrator>,
    pub contexts: Arc<ContextManager>,
    pub learning: Arc<AutoLearningEngine>,
    pub errors: Arc<ErrorLearningSystem>,
    pub catalog: Arc<StoreCatalog>,
    /// Environment name for config reload
    env: Option<String>,
}

impl AppState {
    /// Build state with the given catalog and templates
    pub fn new(config: Settings, catalog: StoreCatalog, templates: ResponseTemplates) -> Self {
        Self::with_log(config, catalog, templates, Arc::new(TracingConversationLog))
    }

    /// Build state with a custom conversation log sink
    pub fn with_log(
        config: Settings,
        catalog: StoreCatalog,
        templates: ResponseTemplates,
        log: Arc<dyn ConversationLog>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let templates = Arc::new(templates);

        let learning = Arc::new(AutoLearningEngine::new(config.learning.clone()));
        let errors = Arc::new(ErrorLearningSystem::new(&config.errors));
        let contexts = Arc::new(ContextManager::from_config(
            &config.dialogue,
            Arc::clone(&learning),
            Arc::clone(&errors),
        ));

        let orchestrator = Arc::new(DialogueOrchestrator::new(
            OrchestratorConfig::from(&config.dialogue),
            IntentDetector::new(Arc::clone(&catalog)),
            ResponseGenerator::new(Arc::clone(&catalog), templates),
            Arc::clone(&contexts),
            Arc::clone(&errors),
            log,
        ));

        Self {
            config: Arc::new(RwLock::new(config)),
            orchestrator,
            contexts,
            learning,
            errors,
            catalog,
            env: None,
        }
    }

    /// Load catalog and templates from the paths in `config`
    pub fn from_settings(config: Settings, env: Option<String>) -> Result<Self, ServerError> {
        let catalog = StoreCatalog::load_or_default(&config.catalog_path)?;
        let templates = ResponseTemplates::load_or_default(&config.templates_path)?;

        let mut state = Self::new(config, catalog, templates);
        state.env = env;
        Ok(state)
    }

    /// Reload settings from disk
    ///
    /// Dialogue policy, catalog and templates are fixed at startup; the
    /// reloaded values take effect for settings read per request (report
    /// thresholds).
    pub fn reload_config(&self) -> Result<(), ServerError> {
        let new_config = load_settings(self.env.as_deref())?;

        let mut config = self.config.write();
        *config = new_config;

        tracing::info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Get a read guard to the current configuration
    pub fn get_config(&self) -> parking_lot::RwLockReadGuard<'_, Settings> {
        self.config.read()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            Settings::default(),
            StoreCatalog::default(),
            ResponseTemplates::default(),
        )
    }
}
