//! Partial-match comparison of desired and observed units
//!
//! An observed value satisfies a desired one when every field the desired
//! side declares is present on the observed side and recursively satisfied.
//! Fields only present on the observed side are ignored, so a router that
//! reports defaults or runtime attributes is not considered divergent.
//!
//! Arrays are compared as objects indexed by position: every index present
//! in the desired array must be satisfied at the same index of the observed
//! one. Extra trailing observed elements are ignored and reordered elements
//! are reported as divergent. There is no set or multiset semantics.

use serde_json::{Map, Value};

/// Whether `actual` satisfies `desired` under partial-match semantics.
///
/// Stops at the first failing field.
pub fn as_expected(desired: &Value, actual: &Value) -> bool {
    if let (Value::Object(wanted), Value::Object(observed)) = (desired, actual) {
        return fields_match(wanted, observed);
    }
    if is_structured(desired) && is_structured(actual) {
        return fields(desired).all(|(key, wanted)| match field(actual, &key) {
            Some(observed) => as_expected(wanted, observed),
            None => false,
        });
    }

    match (desired, actual) {
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        _ => desired == actual,
    }
}

/// Whether every field of `desired` is present on `actual` and satisfied
pub fn fields_match(desired: &Map<String, Value>, actual: &Map<String, Value>) -> bool {
    desired.iter().all(|(key, wanted)| match actual.get(key) {
        Some(observed) => as_expected(wanted, observed),
        None => false,
    })
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Fields of a structured value keyed the way a field lookup expects them
fn fields(value: &Value) -> Box<dyn Iterator<Item = (String, &Value)> + '_> {
    match value {
        Value::Object(map) => Box::new(map.iter().map(|(k, v)| (k.clone(), v))),
        Value::Array(items) => Box::new(items.iter().enumerate().map(|(i, v)| (i.to_string(), v))),
        _ => Box::new(std::iter::empty()),
    }
}

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extra_observed_fields_are_ignored() {
        assert!(as_expected(&json!({"x": 1}), &json!({"x": 1, "y": 2})));
    }

    #[test]
    fn test_missing_observed_field_fails() {
        assert!(!as_expected(&json!({"x": 1, "y": 2}), &json!({"x": 1})));
    }

    #[test]
    fn test_differing_scalar_fails() {
        assert!(!as_expected(&json!({"x": 2}), &json!({"x": 1})));
    }

    #[test]
    fn test_nested_partial_match() {
        let desired = json!({"name": "a", "groups": {"$default": {"users": "*"}}});
        let actual = json!({
            "name": "a",
            "identity": "vhost/a",
            "groups": {"$default": {"users": "*", "remoteHosts": "*"}}
        });
        assert!(as_expected(&desired, &actual));

        let actual = json!({"name": "a", "groups": {"$default": {"users": "admin"}}});
        assert!(!as_expected(&desired, &actual));
    }

    #[test]
    fn test_empty_desired_object_matches_any_object() {
        assert!(as_expected(&json!({}), &json!({"anything": true})));
    }

    #[test]
    fn test_null_is_a_scalar() {
        assert!(as_expected(&Value::Null, &Value::Null));
        assert!(!as_expected(&json!({"x": null}), &json!({"x": {}})));
        assert!(!as_expected(&json!({"x": null}), &json!({})));
    }

    #[test]
    fn test_object_against_scalar_fails() {
        assert!(!as_expected(&json!({"x": {"y": 1}}), &json!({"x": 1})));
        assert!(!as_expected(&json!({"x": 1}), &json!({"x": {"y": 1}})));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(as_expected(&json!({"x": 1}), &json!({"x": 1.0})));
        assert!(!as_expected(&json!({"x": 1}), &json!({"x": 1.5})));
    }

    #[test]
    fn test_string_and_number_differ() {
        assert!(!as_expected(&json!({"x": "1"}), &json!({"x": 1})));
    }

    #[test]
    fn test_arrays_are_positional_prefixes() {
        assert!(as_expected(&json!([1, 2]), &json!([1, 2, 3])));
        assert!(!as_expected(&json!([1, 2]), &json!([2, 1])));
        assert!(!as_expected(&json!([1, 2, 3]), &json!([1, 2])));
        // An empty desired array is satisfied by any array
        assert!(as_expected(&json!([]), &json!([1])));
    }

    #[test]
    fn test_array_against_index_keyed_object() {
        assert!(as_expected(&json!(["a"]), &json!({"0": "a"})));
    }

    #[test]
    fn test_fields_match_agrees_with_as_expected() {
        let desired = json!({"x": 1, "y": {"z": null}});
        let actual = json!({"x": 1.0, "y": {"z": null, "w": 2}, "extra": true});
        let (Value::Object(d), Value::Object(a)) = (&desired, &actual) else {
            panic!("not objects");
        };
        assert!(fields_match(d, a));
        assert!(as_expected(&desired, &actual));
        assert!(!fields_match(a, d));
    }
}
