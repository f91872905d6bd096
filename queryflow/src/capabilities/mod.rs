//! Server-side implementations of the pipeline stages.
//!
//! A capability takes the structured input of one stage and returns the
//! stage's reply text. Capabilities are collected in a
//! [`CapabilityRegistry`] and served through a session, either in-process
//! or over stdio.
//!
//! The generative stages are thin prompt-in, text-out wrappers over a
//! [`LanguageModel`]. Query execution and schema introspection go through a
//! [`DataStore`].

mod dictionary;
mod generative;
mod llm;
mod prompts;
mod registry;
mod store;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use dictionary::{describe_dictionary, ColumnDictionary, DictionaryEntry};
pub use generative::{
    AnswerWriter, EntityExtractor, GenerationSettings, QueryRepairer, QueryValidator, QueryWriter,
};
pub use llm::LanguageModel;
#[cfg(feature = "anthropic")]
pub use llm::AnthropicClient;
#[cfg(test)]
pub use llm::MockLanguageModel;
pub use registry::{CapabilityInfo, CapabilityRegistry};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{DataStore, QueryExecutor};

use crate::errors::InvocationError;
use async_trait::async_trait;
use std::sync::Arc;

/// One stage implementation, addressed by name.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The capability name clients call.
    fn name(&self) -> &str;

    /// What the capability does.
    fn description(&self) -> &str;

    /// JSON Schema of the input object.
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    /// Runs the capability.
    async fn invoke(&self, input: serde_json::Value) -> Result<String, InvocationError>;
}

/// Assembles the six pipeline capabilities.
#[must_use]
pub fn build_registry(
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn DataStore>,
    dictionary: impl Into<String>,
    settings: GenerationSettings,
) -> CapabilityRegistry {
    CapabilityRegistry::new()
        .with(Arc::new(EntityExtractor::new(
            Arc::clone(&model),
            dictionary,
            settings,
        )))
        .with(Arc::new(QueryWriter::new(Arc::clone(&model), settings)))
        .with(Arc::new(QueryValidator::new(
            Arc::clone(&model),
            Arc::clone(&store),
            settings,
        )))
        .with(Arc::new(QueryExecutor::new(store)))
        .with(Arc::new(QueryRepairer::new(Arc::clone(&model), settings)))
        .with(Arc::new(AnswerWriter::new(model, settings)))
}

/// Builds the capability registry described by the application config.
///
/// Uses the Anthropic Messages API for the generative stages and the
/// configured SQLite file for execution.
#[cfg(all(feature = "anthropic", feature = "sqlite"))]
pub fn registry_from_config(
    config: &crate::config::AppConfig,
) -> Result<CapabilityRegistry, crate::errors::QueryflowError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| crate::errors::ConfigError::Missing(crate::config::ENV_API_KEY.to_string()))?;
    let model = AnthropicClient::new(api_key, config.model.clone())?;
    let store = SqliteStore::new(&config.db_path);
    let dictionary = describe_dictionary(&config.dictionary_path);

    Ok(build_registry(
        Arc::new(model),
        Arc::new(store),
        dictionary,
        GenerationSettings {
            max_tokens: config.max_tokens,
            answer_max_tokens: config.answer_max_tokens,
        },
    ))
}
