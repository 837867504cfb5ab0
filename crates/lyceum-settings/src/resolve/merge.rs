//! Merge primitives used throughout resolution.
//!
//! Every document key resolves through exactly one of these policies:
//!
//! - [`overlay`] / [`overlay_opt`]: the document value, when present,
//!   replaces the default wholesale.
//! - [`merge_map`]: map entries merge one key at a time, document wins.
//! - [`deep_merge`]: like [`merge_map`], but nested maps merge one level
//!   deeper instead of being replaced.
//! - [`extend_list`]: document entries append to the default list.

use std::collections::BTreeMap;

use serde_yaml::Value;

/// Replaces the slot when the document supplies a value.
pub(crate) fn overlay<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

/// Replaces an optional slot when the document supplies a value.
///
/// An absent key keeps whatever the slot held; there is no way to unset a
/// defaulted `Some` through this policy.
pub(crate) fn overlay_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

/// Merges document entries into the map one key at a time.
pub(crate) fn merge_map<V: Clone>(
    base: &mut BTreeMap<String, V>,
    additions: &Option<BTreeMap<String, V>>,
) {
    if let Some(additions) = additions {
        for (key, value) in additions {
            base.insert(key.clone(), value.clone());
        }
    }
}

/// Merges document entries two levels deep.
///
/// When both sides hold a mapping under the same key, the sub-keys merge;
/// any other combination replaces. Nesting deeper than two levels still
/// replaces, matching how sandbox options have always resolved.
pub(crate) fn deep_merge(
    base: &mut BTreeMap<String, Value>,
    additions: &Option<BTreeMap<String, Value>>,
) {
    let Some(additions) = additions else {
        return;
    };
    for (key, value) in additions {
        match (base.get_mut(key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                for (sub_key, sub_value) in incoming {
                    existing.insert(sub_key.clone(), sub_value.clone());
                }
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Appends document entries to the list.
pub(crate) fn extend_list<T: Clone>(base: &mut Vec<T>, additions: &Option<Vec<T>>) {
    if let Some(additions) = additions {
        base.extend(additions.iter().cloned());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay() {
        let mut slot = "default".to_string();
        overlay(&mut slot, &None);
        assert_eq!(slot, "default");

        overlay(&mut slot, &Some("override".to_string()));
        assert_eq!(slot, "override");

        // An explicitly empty value is still a value.
        overlay(&mut slot, &Some(String::new()));
        assert_eq!(slot, "");
    }

    #[test]
    fn test_overlay_opt_cannot_unset() {
        let mut slot = Some("default".to_string());
        overlay_opt(&mut slot, &None);
        assert_eq!(slot.as_deref(), Some("default"));

        overlay_opt(&mut slot, &Some("override".to_string()));
        assert_eq!(slot.as_deref(), Some("override"));
    }

    #[test]
    fn test_merge_map_document_wins() {
        let mut base: BTreeMap<String, i32> =
            [("kept".to_string(), 1), ("beaten".to_string(), 2)].into();
        let additions = Some([("beaten".to_string(), 20), ("new".to_string(), 3)].into());

        merge_map(&mut base, &additions);

        assert_eq!(base["kept"], 1);
        assert_eq!(base["beaten"], 20);
        assert_eq!(base["new"], 3);
    }

    #[test]
    fn test_deep_merge_merges_nested_maps() {
        let mut base: BTreeMap<String, Value> = BTreeMap::new();
        base.insert(
            "limits".to_string(),
            serde_yaml::from_str("{CPU: 1, REALTIME: 3}").unwrap(),
        );
        base.insert("python_bin".to_string(), Value::from("/usr/bin/python"));

        let additions: BTreeMap<String, Value> =
            serde_yaml::from_str("{limits: {REALTIME: 5}, python_bin: /opt/bin/python}").unwrap();
        deep_merge(&mut base, &Some(additions));

        let limits = base["limits"].as_mapping().unwrap();
        assert_eq!(limits.get("REALTIME"), Some(&Value::from(5)));
        assert_eq!(limits.get("CPU"), Some(&Value::from(1)));
        assert_eq!(base["python_bin"], Value::from("/opt/bin/python"));
    }

    #[test]
    fn test_deep_merge_scalar_replaces_map() {
        let mut base: BTreeMap<String, Value> = BTreeMap::new();
        base.insert("limits".to_string(), serde_yaml::from_str("{CPU: 1}").unwrap());

        let additions: BTreeMap<String, Value> =
            serde_yaml::from_str("{limits: disabled}").unwrap();
        deep_merge(&mut base, &Some(additions));

        assert_eq!(base["limits"], Value::from("disabled"));
    }

    #[test]
    fn test_extend_list_appends() {
        let mut base = vec!["a".to_string()];
        extend_list(&mut base, &None);
        assert_eq!(base, ["a"]);

        extend_list(&mut base, &Some(vec!["b".to_string()]));
        assert_eq!(base, ["a", "b"]);
    }
}
