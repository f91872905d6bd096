//! The five language-model-backed stages.
//!
//! Structured stages run the model text through the response parser and
//! reply with the decoded object, or with `{"error": ...}` when the model
//! call or the parse fails. Query synthesis asks for raw SQL and wraps it
//! itself. Answer synthesis replies with plain text.

use super::{prompts, Capability, DataStore, LanguageModel};
use crate::errors::InvocationError;
use crate::parser;
use crate::stages::{
    ExtractEntitiesInput, RepairQueryInput, StageName, SynthesizeAnswerInput,
    SynthesizeQueryInput, ValidateQueryInput,
};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Token limits for the generative stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Limit for the structured stages and query synthesis.
    pub max_tokens: u32,
    /// Limit for answer synthesis.
    pub answer_max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            answer_max_tokens: 2048,
        }
    }
}

#[allow(clippy::expect_used)]
fn code_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z]*[ \t]*\r?\n(.*?)\s*```\s*$").expect("Valid regex pattern")
    })
}

/// Removes a surrounding markdown code fence, if there is one.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    code_fence()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| text.trim(), |m| m.as_str().trim())
}

fn decode_input<T: DeserializeOwned>(
    stage: StageName,
    input: serde_json::Value,
) -> Result<T, InvocationError> {
    serde_json::from_value(input)
        .map_err(|e| InvocationError::new(stage.as_str(), format!("Invalid input: {e}")))
}

fn error_reply(message: impl std::fmt::Display) -> String {
    serde_json::json!({ "error": message.to_string() }).to_string()
}

/// Re-serializes the object embedded in model text, or reports why not.
fn structured_reply(stage: StageName, text: &str) -> String {
    match parser::parse(text) {
        Ok(payload) => serde_json::Value::Object(payload).to_string(),
        Err(failure) => {
            warn!(stage = %stage, error = %failure, "Model reply was not a JSON object");
            error_reply(failure.message)
        }
    }
}

fn object_schema(required: &[&str]) -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = required
        .iter()
        .map(|name| ((*name).to_string(), serde_json::json!({})))
        .collect();
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// `extract_entities`: question to table, columns and filters.
pub struct EntityExtractor {
    model: Arc<dyn LanguageModel>,
    dictionary: String,
    settings: GenerationSettings,
}

impl EntityExtractor {
    /// Creates the extractor with the rendered column dictionary.
    #[must_use]
    pub fn new(
        model: Arc<dyn LanguageModel>,
        dictionary: impl Into<String>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            model,
            dictionary: dictionary.into(),
            settings,
        }
    }
}

#[async_trait]
impl Capability for EntityExtractor {
    fn name(&self) -> &str {
        StageName::ExtractEntities.as_str()
    }

    fn description(&self) -> &str {
        "Extracts the table, columns and filters a question refers to"
    }

    fn input_schema(&self) -> serde_json::Value {
        object_schema(&["question"])
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<String, InvocationError> {
        let input: ExtractEntitiesInput = decode_input(StageName::ExtractEntities, input)?;
        let prompt = prompts::extract_entities(&input.question, &self.dictionary);

        match self.model.complete(&prompt, self.settings.max_tokens).await {
            Ok(text) => Ok(structured_reply(StageName::ExtractEntities, &text)),
            Err(e) => Ok(error_reply(format!("Error in extract_entities: {e}"))),
        }
    }
}

/// `synthesize_query`: question and entities to SQL.
pub struct QueryWriter {
    model: Arc<dyn LanguageModel>,
    settings: GenerationSettings,
}

impl QueryWriter {
    /// Creates the query writer.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, settings: GenerationSettings) -> Self {
        Self { model, settings }
    }
}

#[async_trait]
impl Capability for QueryWriter {
    fn name(&self) -> &str {
        StageName::SynthesizeQuery.as_str()
    }

    fn description(&self) -> &str {
        "Writes a SQLite query for a question and its extracted entities"
    }

    fn input_schema(&self) -> serde_json::Value {
        object_schema(&["question", "entities"])
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<String, InvocationError> {
        let input: SynthesizeQueryInput = decode_input(StageName::SynthesizeQuery, input)?;
        let prompt = prompts::synthesize_query(&input.question, &input.entities);

        match self.model.complete(&prompt, self.settings.max_tokens).await {
            Ok(text) => {
                let sql = strip_code_fence(&text);
                debug!(sql, "Synthesized query");
                Ok(serde_json::json!({ "sql_query": sql }).to_string())
            }
            Err(e) => Ok(error_reply(format!("LLM Error in synthesize_query: {e}"))),
        }
    }
}

/// `validate_query`: checks a query against the live schema.
pub struct QueryValidator {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn DataStore>,
    settings: GenerationSettings,
}

impl QueryValidator {
    /// Creates the validator.
    #[must_use]
    pub fn new(
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn DataStore>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            model,
            store,
            settings,
        }
    }
}

#[async_trait]
impl Capability for QueryValidator {
    fn name(&self) -> &str {
        StageName::ValidateQuery.as_str()
    }

    fn description(&self) -> &str {
        "Validates a query against the schema and returns a corrected version"
    }

    fn input_schema(&self) -> serde_json::Value {
        object_schema(&["question", "entities", "query"])
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<String, InvocationError> {
        let input: ValidateQueryInput = decode_input(StageName::ValidateQuery, input)?;
        let schema = self
            .store
            .describe_schema()
            .await
            .map_err(|e| InvocationError::new(self.name(), format!("Schema unavailable: {e}")))?;
        let prompt =
            prompts::validate_query(&input.question, &input.entities, &input.query, &schema);

        match self.model.complete(&prompt, self.settings.max_tokens).await {
            Ok(text) => Ok(structured_reply(StageName::ValidateQuery, &text)),
            Err(e) => Ok(error_reply(format!("LLM Error in validate_query: {e}"))),
        }
    }
}

/// `repair_query`: fixes a query given the error it produced.
pub struct QueryRepairer {
    model: Arc<dyn LanguageModel>,
    settings: GenerationSettings,
}

impl QueryRepairer {
    /// Creates the repairer.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, settings: GenerationSettings) -> Self {
        Self { model, settings }
    }
}

#[async_trait]
impl Capability for QueryRepairer {
    fn name(&self) -> &str {
        StageName::RepairQuery.as_str()
    }

    fn description(&self) -> &str {
        "Fixes a failed query using the database error message"
    }

    fn input_schema(&self) -> serde_json::Value {
        object_schema(&["query", "error_message"])
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<String, InvocationError> {
        let input: RepairQueryInput = decode_input(StageName::RepairQuery, input)?;
        let failed = if input.query.is_executable() {
            input.query.sql()
        } else {
            "Query not provided"
        };
        let prompt = prompts::repair_query(failed, &input.error_message);

        match self.model.complete(&prompt, self.settings.max_tokens).await {
            Ok(text) => Ok(structured_reply(StageName::RepairQuery, &text)),
            Err(e) => Ok(error_reply(format!("LLM Error in repair_query: {e}"))),
        }
    }
}

/// `synthesize_answer`: rows to a natural-language answer.
pub struct AnswerWriter {
    model: Arc<dyn LanguageModel>,
    settings: GenerationSettings,
}

impl AnswerWriter {
    /// Creates the answer writer.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, settings: GenerationSettings) -> Self {
        Self { model, settings }
    }
}

#[async_trait]
impl Capability for AnswerWriter {
    fn name(&self) -> &str {
        StageName::SynthesizeAnswer.as_str()
    }

    fn description(&self) -> &str {
        "Writes a human-readable answer from the query result"
    }

    fn input_schema(&self) -> serde_json::Value {
        object_schema(&["question", "result"])
    }

    /// Replies with plain text. A model failure is an invocation error,
    /// since there is no structured channel to report it through.
    async fn invoke(&self, input: serde_json::Value) -> Result<String, InvocationError> {
        let input: SynthesizeAnswerInput = decode_input(StageName::SynthesizeAnswer, input)?;
        let prompt = prompts::synthesize_answer(&input.question, &input.result);

        self.model
            .complete(&prompt, self.settings.answer_max_tokens)
            .await
            .map_err(|e| {
                InvocationError::new(self.name(), format!("Error formulating final answer: {e}"))
            })
    }
}
