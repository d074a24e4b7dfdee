//! Inheritance compilation: folding an ancestor chain into one effective
//! document.
//!
//! The chain is ordered root-first; each successive document overlays the
//! accumulated result. Scalars and arrays of scalars replace, objects merge
//! key-by-key, identity-keyed record lists splice through
//! [`crate::align::merge_records`], and an explicit null in a descendant
//! removes the field instead of inheriting it.

use crate::{align, EngineConfig};
use serde_json::{Map, Value};

/// Compile the effective document visible at the end of an ancestor chain
/// (pure function).
///
/// `chain` is root-first and excludes the node itself; pass the node's own
/// document as `self_doc` for the "compiled including self" view. Top-level
/// service fields (`cfg.strip_fields`) never inherit from ancestors; only the
/// node's own document may carry them into the result.
///
/// # Examples
///
/// ```
/// use doc_cascade::{compile_chain, EngineConfig};
/// use serde_json::json;
///
/// let cfg = EngineConfig::new();
/// let root = json!({"currency": "USD", "feed": {"enabled": true}});
/// let folder = json!({"feed": {"delay": 900}});
///
/// let compiled = compile_chain(&[root, folder], None, &cfg);
/// assert_eq!(compiled["currency"], "USD");
/// assert_eq!(compiled["feed"], json!({"enabled": true, "delay": 900}));
/// ```
pub fn compile_chain(chain: &[Value], self_doc: Option<&Value>, cfg: &EngineConfig) -> Value {
    let mut compiled = Value::Object(Map::new());
    for layer in chain {
        compiled = merge_value(&compiled, layer, cfg);
    }
    // Service fields never inherit; only the node's own document may carry
    // them into the result.
    if let Value::Object(obj) = &mut compiled {
        obj.retain(|key, _| !cfg.strip_fields.contains(key));
    }
    match self_doc {
        Some(own) => merge_value(&compiled, own, cfg),
        None => compiled,
    }
}

/// Merge a descendant value over an ancestor value.
pub(crate) fn merge_value(ancestor: &Value, descendant: &Value, cfg: &EngineConfig) -> Value {
    match (ancestor, descendant) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                // Explicit null is the unset sentinel: the field does not
                // inherit and does not appear in the merged result.
                if value.is_null() {
                    merged.remove(key);
                    continue;
                }
                match merged.remove(key) {
                    Some(existing) => {
                        merged.insert(key.clone(), merge_value(&existing, value, cfg));
                    }
                    None => {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
            Value::Object(merged)
        }
        (Value::Array(base), Value::Array(overlay)) => {
            if align::is_identity_keyed(overlay, cfg) && align::is_identity_keyed(base, cfg) {
                Value::Array(align::merge_records(base, overlay, cfg, |a, d| {
                    merge_value(a, d, cfg)
                }))
            } else {
                // Scalar and non-identity lists replace wholesale.
                descendant.clone()
            }
        }
        _ => descendant.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> EngineConfig {
        EngineConfig::new().with_override_bags(["gateway", "account"])
    }

    #[test]
    fn test_scalar_override() {
        let cfg = cfg();
        let chain = [
            json!({"currency": "USD", "lotSize": 1}),
            json!({"lotSize": 100}),
        ];
        let compiled = compile_chain(&chain, None, &cfg);
        assert_eq!(compiled, json!({"currency": "USD", "lotSize": 100}));
    }

    #[test]
    fn test_object_merges_recursively() {
        let cfg = cfg();
        let chain = [
            json!({"feed": {"enabled": true, "source": "reuters"}}),
            json!({"feed": {"source": "dxfeed"}}),
        ];
        let compiled = compile_chain(&chain, None, &cfg);
        assert_eq!(compiled["feed"], json!({"enabled": true, "source": "dxfeed"}));
    }

    #[test]
    fn test_scalar_array_replaces() {
        let cfg = cfg();
        let chain = [
            json!({"forbiddenTags": ["a", "b", "c"]}),
            json!({"forbiddenTags": ["z"]}),
        ];
        let compiled = compile_chain(&chain, None, &cfg);
        assert_eq!(compiled["forbiddenTags"], json!(["z"]));
    }

    #[test]
    fn test_null_unsets_inherited_field() {
        let cfg = cfg();
        let chain = [json!({"maturity": "2024-06"}), json!({"maturity": null})];
        let compiled = compile_chain(&chain, None, &cfg);
        assert!(compiled.get("maturity").is_none());
    }

    #[test]
    fn test_record_list_merges_by_identity() {
        let cfg = cfg();
        let chain = [
            json!({"gateways": [
                {"gatewayId": "A", "gateway": {"enabled": true, "delay": 0}},
                {"gatewayId": "B", "gateway": {"enabled": true}}
            ]}),
            json!({"gateways": [
                {"gatewayId": "B", "gateway": {"enabled": false}}
            ]}),
        ];
        let compiled = compile_chain(&chain, None, &cfg);
        let gateways = compiled["gateways"].as_array().unwrap();
        // Descendant-specified entries move to the front, merged with the
        // ancestor's content; untouched ancestor entries follow.
        assert_eq!(gateways.len(), 2);
        assert_eq!(gateways[0]["gatewayId"], "B");
        assert_eq!(gateways[0]["gateway"]["enabled"], false);
        assert_eq!(gateways[1]["gatewayId"], "A");
    }

    #[test]
    fn test_include_self_keeps_service_fields() {
        let cfg = cfg();
        let chain = [json!({"_id": "root-id", "currency": "USD", "name": "ROOT"})];
        let own = json!({"_id": "leaf-id", "name": "LEAF", "strikePrice": 50});

        let ancestors_only = compile_chain(&chain, None, &cfg);
        assert!(ancestors_only.get("_id").is_none());
        assert!(ancestors_only.get("name").is_none());
        assert_eq!(ancestors_only["currency"], "USD");

        let with_self = compile_chain(&chain, Some(&own), &cfg);
        assert_eq!(with_self["_id"], "leaf-id");
        assert_eq!(with_self["name"], "LEAF");
        assert_eq!(with_self["strikePrice"], 50);
    }

    #[test]
    fn test_template_object_overrides_plain_string() {
        let cfg = cfg();
        let chain = [
            json!({"symbolName": "PLAIN"}),
            json!({"symbolName": {"$template": "ticker .. '.' .. exchange"}}),
        ];
        let compiled = compile_chain(&chain, None, &cfg);
        assert_eq!(
            compiled["symbolName"],
            json!({"$template": "ticker .. '.' .. exchange"})
        );
    }

    #[test]
    fn test_inputs_not_mutated() {
        let cfg = cfg();
        let chain = [json!({"a": {"x": 1}}), json!({"a": {"x": 2}})];
        let before = chain.clone();
        let _ = compile_chain(&chain, None, &cfg);
        assert_eq!(chain, before);
    }

    #[test]
    fn test_empty_chain() {
        let cfg = cfg();
        assert_eq!(compile_chain(&[], None, &cfg), json!({}));
    }
}
