//! JSON helpers shared by the settings loader and the dispatch normalizer.

use serde_json::Value;

/// Recursive deep merge of two JSON values, for layering settings.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply a partial entity update over a cached entity.
///
/// Same as [`deep_merge`] except that a `null` in `patch` removes the key,
/// so an update can clear an optional field.
pub fn merge_patch(target: Value, patch: Value) -> Value {
    match (target, patch) {
        (Value::Object(mut target_map), Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    let _ = target_map.remove(&key);
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => merge_patch(target_val, patch_val),
                    None => patch_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, patch) => patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_override_keeps_siblings() {
        let merged = deep_merge(
            json!({"gateway": {"apiVersion": 10, "intents": 1}}),
            json!({"gateway": {"intents": 513}}),
        );
        assert_eq!(merged, json!({"gateway": {"apiVersion": 10, "intents": 513}}));
    }

    #[test]
    fn null_preserves_target() {
        let merged = deep_merge(json!({"a": 1, "b": 2}), json!({"a": null}));
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn arrays_are_replaced() {
        let merged = deep_merge(json!({"items": [1, 2, 3]}), json!({"items": [4]}));
        assert_eq!(merged["items"], json!([4]));
    }

    #[test]
    fn new_keys_are_added() {
        let merged = deep_merge(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn object_replaces_primitive_and_back() {
        assert_eq!(
            deep_merge(json!({"a": "s"}), json!({"a": {"n": true}})),
            json!({"a": {"n": true}})
        );
        assert_eq!(deep_merge(json!({"a": {"n": true}}), json!({"a": 42})), json!({"a": 42}));
    }

    #[test]
    fn empty_source_is_identity() {
        let target = json!({"a": 1, "b": {"c": 2}});
        assert_eq!(deep_merge(target.clone(), json!({})), target);
    }

    #[test]
    fn patch_null_clears_key() {
        let patched = merge_patch(json!({"nick": "old", "roles": ["1"]}), json!({"nick": null}));
        assert_eq!(patched, json!({"roles": ["1"]}));
    }

    #[test]
    fn patch_null_clears_nested_key_only() {
        let patched = merge_patch(
            json!({"user": {"id": "2", "avatar": "a"}, "topic": "t"}),
            json!({"user": {"avatar": null}}),
        );
        assert_eq!(patched, json!({"user": {"id": "2"}, "topic": "t"}));
    }

    #[test]
    fn patch_null_for_missing_key_is_noop() {
        assert_eq!(merge_patch(json!({"a": 1}), json!({"b": null})), json!({"a": 1}));
    }

    #[test]
    fn patch_overrides_like_deep_merge() {
        let target = json!({"a": {"b": 1, "c": [1, 2]}});
        let patch = json!({"a": {"c": [3]}, "d": true});
        assert_eq!(merge_patch(target.clone(), patch.clone()), deep_merge(target, patch));
    }
}
