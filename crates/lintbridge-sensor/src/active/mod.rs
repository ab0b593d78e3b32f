//! The set of rules activated for one analysis.

use std::collections::BTreeMap;

use serde_json::Value;

use lintbridge_engine::RuleConfig;

use crate::error::RegistryError;
use crate::rules::RuleRegistry;

/// An activated rule with its effective parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRule {
    key: String,
    parameters: BTreeMap<String, Value>,
}

impl ActiveRule {
    /// Activates `key` without parameters.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Sets one parameter, replacing any previous value.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Rule key.
    #[must_use]
    pub const fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Effective parameters.
    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    fn to_rule_config(&self) -> RuleConfig {
        RuleConfig::new(self.key.clone()).with_parameters(self.parameters.clone())
    }
}

/// Rule key to activation mapping, read-only once built.
///
/// Only active rules are stored. A key that is absent is inactive, whether or
/// not the [`RuleRegistry`] defines it, so there is no per-rule enabled flag:
/// deactivating a rule means building the set without it.
///
/// The set is `Send + Sync` and can be shared between the thread driving a
/// run and any observer.
///
/// # Example
///
/// ```
/// use lintbridge_sensor::active::{ActiveRule, ActiveRuleSet};
///
/// let rules = ActiveRuleSet::new().with_rule(ActiveRule::new("S4275"));
/// assert!(rules.is_active("S4275"));
/// assert!(!rules.is_active("S3776"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveRuleSet {
    rules: BTreeMap<String, ActiveRule>,
}

impl ActiveRuleSet {
    /// Creates a set with no active rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates registered rules by key, starting from their default
    /// parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRule`] when a key is not registered.
    pub fn from_registry<'a, I>(registry: &RuleRegistry, keys: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = Self::new();
        for key in keys {
            let definition = registry.get(key).ok_or_else(|| RegistryError::UnknownRule {
                key: key.to_owned(),
            })?;
            let rule = ActiveRule {
                key: definition.key().to_owned(),
                parameters: definition.default_parameters().clone(),
            };
            set.rules.insert(rule.key.clone(), rule);
        }
        Ok(set)
    }

    /// Activates `rule`, replacing an earlier activation of the same key.
    #[must_use]
    pub fn with_rule(mut self, rule: ActiveRule) -> Self {
        self.rules.insert(rule.key.clone(), rule);
        self
    }

    /// Overrides one parameter of an already active rule.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRule`] when `key` is not active.
    pub fn set_parameter(
        &mut self,
        key: &str,
        name: impl Into<String>,
        value: Value,
    ) -> Result<(), RegistryError> {
        let rule = self
            .rules
            .get_mut(key)
            .ok_or_else(|| RegistryError::UnknownRule {
                key: key.to_owned(),
            })?;
        rule.parameters.insert(name.into(), value);
        Ok(())
    }

    /// Returns `true` when `key` is active. Registered rules that were not
    /// activated, and keys the registry has never seen, are both inactive.
    #[must_use]
    pub fn is_active(&self, key: &str) -> bool {
        self.rules.contains_key(key)
    }

    /// Looks up an active rule.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ActiveRule> {
        self.rules.get(key)
    }

    /// Active rules in key order.
    pub fn iter(&self) -> impl Iterator<Item = &ActiveRule> {
        self.rules.values()
    }

    /// Number of active rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` when no rule is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule entries for the engine request, in key order.
    #[must_use]
    pub fn to_rule_configs(&self) -> Vec<RuleConfig> {
        self.rules.values().map(ActiveRule::to_rule_config).collect()
    }
}
