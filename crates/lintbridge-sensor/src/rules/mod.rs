//! Static registry of the rules the engine understands.
//!
//! Rules are declared explicitly by the host, never discovered at runtime.
//! The [`RuleRegistry`] is built once from a list of [`RuleDefinition`]s and
//! rejects duplicate keys up front.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::RegistryError;

/// Metadata for one engine rule.
///
/// # Example
///
/// ```
/// use lintbridge_sensor::rules::RuleDefinition;
/// use serde_json::json;
///
/// let rule = RuleDefinition::new("S3776", "Cognitive Complexity")
///     .with_default_parameter("threshold", json!(15));
/// assert_eq!(rule.key(), "S3776");
/// assert_eq!(rule.default_parameters().get("threshold"), Some(&json!(15)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    key: String,
    name: String,
    default_parameters: BTreeMap<String, Value>,
}

impl RuleDefinition {
    /// Creates a definition without parameters.
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            default_parameters: BTreeMap::new(),
        }
    }

    /// Adds a parameter with its default value.
    #[must_use]
    pub fn with_default_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.default_parameters.insert(name.into(), value);
        self
    }

    /// Rule key shared with the engine.
    #[must_use]
    pub const fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Parameters applied when activation does not override them.
    #[must_use]
    pub const fn default_parameters(&self) -> &BTreeMap<String, Value> {
        &self.default_parameters
    }
}

/// Rules known to the host, keyed by rule key.
///
/// # Example
///
/// ```
/// use lintbridge_sensor::rules::{RuleDefinition, RuleRegistry};
///
/// let registry = RuleRegistry::new([
///     RuleDefinition::new("S3776", "Cognitive Complexity"),
///     RuleDefinition::new("S4275", "Getters and setters should access the expected fields"),
/// ])
/// .unwrap();
/// assert_eq!(registry.len(), 2);
/// assert!(RuleRegistry::new([
///     RuleDefinition::new("S3776", "a"),
///     RuleDefinition::new("S3776", "b"),
/// ])
/// .is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, RuleDefinition>,
}

impl RuleRegistry {
    /// Builds a registry, validating every definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyKey`] for a definition without a key and
    /// [`RegistryError::DuplicateRule`] when two definitions share a key.
    pub fn new<I>(definitions: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = RuleDefinition>,
    {
        let mut rules = BTreeMap::new();
        for definition in definitions {
            if definition.key.trim().is_empty() {
                return Err(RegistryError::EmptyKey {
                    name: definition.name,
                });
            }
            if rules.contains_key(&definition.key) {
                return Err(RegistryError::DuplicateRule {
                    key: definition.key,
                });
            }
            rules.insert(definition.key.clone(), definition);
        }
        Ok(Self { rules })
    }

    /// Looks up a rule by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RuleDefinition> {
        self.rules.get(key)
    }

    /// Registered keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` when no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests;
