//! Integration tests for schema version resolution across threads and
//! across the full version space.

use kpack_core::SemVer;
use kpack_schema::{Entity, RegistryError, SchemaRegistry, ToolType, Vocabulary};
use proptest::prelude::*;

#[test]
fn registry_is_shared_across_threads() {
    let registry = SchemaRegistry::shared();
    let handles: Vec<_> = (0..8u64)
        .map(|minor| {
            std::thread::spawn(move || {
                SchemaRegistry::shared()
                    .rules_for(&SemVer::new(2, minor, 0))
                    .map(|r| r.version())
            })
        })
        .collect();

    for handle in handles {
        let resolved = handle.join().unwrap().unwrap();
        assert_eq!(resolved, registry.latest().version());
    }
}

#[test]
fn every_rule_set_allows_all_tool_types() {
    let registry = SchemaRegistry::builtin();
    for version in registry.versions() {
        let rules = registry.get(&version).unwrap();
        for t in ToolType::all() {
            assert!(rules.tool_types().contains(t), "{version} lacks {t}");
        }
    }
}

#[test]
fn guardrail_entities_only_exist_where_supported() {
    let registry = SchemaRegistry::builtin();
    for version in registry.versions() {
        let rules = registry.get(&version).unwrap();
        let has_fields = rules.known_fields(Entity::PatternGroup).next().is_some();
        assert_eq!(has_fields, rules.supports_guardrails(), "{version}");
    }
}

proptest! {
    #[test]
    fn resolution_never_exceeds_request(major in 0u64..5, minor in 0u64..20, patch in 0u64..20) {
        let registry = SchemaRegistry::builtin();
        let requested = SemVer::new(major, minor, patch);
        match registry.rules_for(&requested) {
            Ok(rules) => {
                prop_assert!(rules.version() <= requested);
                prop_assert_eq!(rules.version().major, requested.major);
            }
            Err(RegistryError::UnknownSchemaVersion { closest, .. }) => {
                prop_assert!(registry.get(&closest).is_some());
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }
}
