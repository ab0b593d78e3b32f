//! Unit tests for the rule registry.

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;

#[fixture]
fn registry() -> RuleRegistry {
    RuleRegistry::new([
        RuleDefinition::new("S4275", "Getters and setters should access the expected fields"),
        RuleDefinition::new("S3776", "Cognitive Complexity")
            .with_default_parameter("threshold", json!(15)),
    ])
    .expect("valid registry")
}

#[rstest]
fn keys_are_sorted(registry: RuleRegistry) {
    let keys: Vec<&str> = registry.keys().collect();
    assert_eq!(keys, ["S3776", "S4275"]);
}

#[rstest]
fn lookup_returns_definition(registry: RuleRegistry) {
    let rule = registry.get("S3776").expect("registered");
    assert_eq!(rule.name(), "Cognitive Complexity");
    assert!(registry.get("S0000").is_none());
}

#[test]
fn duplicate_keys_are_rejected() {
    let result = RuleRegistry::new([
        RuleDefinition::new("S1066", "Collapsible if"),
        RuleDefinition::new("S1066", "Collapsible if, again"),
    ]);
    assert_eq!(
        result.as_ref().map(RuleRegistry::len),
        Err(&RegistryError::DuplicateRule {
            key: String::from("S1066")
        })
    );
}

#[rstest]
#[case::empty("")]
#[case::blank("   ")]
fn blank_keys_are_rejected(#[case] key: &str) {
    let result = RuleRegistry::new([RuleDefinition::new(key, "Nameless")]);
    assert!(matches!(result, Err(RegistryError::EmptyKey { .. })));
}

#[test]
fn empty_registry_is_valid() {
    let registry = RuleRegistry::new([]).expect("empty registry");
    assert!(registry.is_empty());
}
