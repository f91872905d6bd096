//! Registry of capabilities served by a stage-execution environment.

use super::Capability;
use crate::errors::InvocationError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Describes a registered capability to a remote client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    /// The capability name.
    pub name: String,
    /// What the capability does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the expected input object.
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Registry of capability instances, keyed by name.
///
/// Names are kept sorted so listings are stable.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: RwLock<BTreeMap<String, Arc<dyn Capability>>>,
}

impl CapabilityRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability, replacing any previous one with the same name.
    pub fn register(&self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        self.capabilities.write().insert(name, capability);
    }

    /// Registers a capability and returns the registry, for chaining.
    #[must_use]
    pub fn with(self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    /// Gets a capability by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.read().get(name).cloned()
    }

    /// Checks if a capability is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.read().contains_key(name)
    }

    /// Lists registered capability names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.capabilities.read().keys().cloned().collect()
    }

    /// Returns the number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.read().is_empty()
    }

    /// Describes every registered capability.
    #[must_use]
    pub fn describe(&self) -> Vec<CapabilityInfo> {
        self.capabilities
            .read()
            .values()
            .map(|c| CapabilityInfo {
                name: c.name().to_string(),
                description: Some(c.description().to_string()),
                input_schema: c.input_schema(),
            })
            .collect()
    }

    /// Invokes a capability by name.
    ///
    /// The lock is released before the capability runs.
    pub async fn invoke(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<String, InvocationError> {
        let capability = self
            .get(name)
            .ok_or_else(|| InvocationError::unknown_capability(name))?;
        capability.invoke(input).await
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}
