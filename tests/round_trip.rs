//! End-to-end inheritance round trips.
//!
//! The contract under test: for any candidate document, merging
//! `reduce(candidate, compile(chain))` back over the compiled ancestors
//! reproduces the candidate's effective content.

use doc_cascade::{compile_chain, reduce, EngineConfig};
use serde_json::{json, Value};

fn cfg() -> EngineConfig {
    EngineConfig::new()
        .with_preserved_keys(["gatewayId", "accountId", "providerId", "isAbstract", "path"])
        .with_override_bags(["gateway", "account"])
}

/// Merge the override back over the compiled ancestors and return the
/// resulting effective document.
fn replay(chain: &[Value], override_doc: &Value, cfg: &EngineConfig) -> Value {
    compile_chain(chain, Some(override_doc), cfg)
}

// ============================================================================
// Basic round trips
// ============================================================================

#[test]
fn test_fully_inherited_node_reduces_to_nothing() {
    let cfg = cfg();
    let chain = vec![
        json!({"currency": "USD", "feed": {"enabled": true, "delay": 900}}),
        json!({"feed": {"delay": 0}}),
    ];
    let compiled = compile_chain(&chain, None, &cfg);

    assert_eq!(reduce(&compiled, &compiled, &cfg).unwrap(), None);
}

#[test]
fn test_single_scalar_change_round_trips() {
    let cfg = cfg();
    let chain = vec![json!({"currency": "USD", "lotSize": 1, "tickSize": 0.25})];
    let compiled = compile_chain(&chain, None, &cfg);

    let mut candidate = compiled.clone();
    candidate["lotSize"] = json!(100);

    let override_doc = reduce(&candidate, &compiled, &cfg).unwrap().unwrap();
    assert_eq!(override_doc, json!({"lotSize": 100}));

    let replayed = replay(&chain, &override_doc, &cfg);
    assert_eq!(replayed, candidate);
}

#[test]
fn test_nested_object_change_round_trips() {
    let cfg = cfg();
    let chain = vec![
        json!({"feed": {"enabled": true, "source": "reuters", "delay": 900}}),
        json!({"feed": {"delay": 0}}),
    ];
    let compiled = compile_chain(&chain, None, &cfg);

    let mut candidate = compiled.clone();
    candidate["feed"]["source"] = json!("dxfeed");

    let override_doc = reduce(&candidate, &compiled, &cfg).unwrap().unwrap();
    assert_eq!(override_doc, json!({"feed": {"source": "dxfeed"}}));
    assert_eq!(replay(&chain, &override_doc, &cfg), candidate);
}

#[test]
fn test_new_field_round_trips() {
    let cfg = cfg();
    let chain = vec![json!({"currency": "USD"})];
    let compiled = compile_chain(&chain, None, &cfg);

    let mut candidate = compiled.clone();
    candidate["strikePrice"] = json!(4500);

    let override_doc = reduce(&candidate, &compiled, &cfg).unwrap().unwrap();
    assert_eq!(override_doc, json!({"strikePrice": 4500}));
    assert_eq!(replay(&chain, &override_doc, &cfg), candidate);
}

// ============================================================================
// Record lists
// ============================================================================

fn gateway_chain() -> Vec<Value> {
    vec![json!({
        "currency": "USD",
        "gateways": [
            {"gatewayId": "gw-a", "gateway": {"enabled": true, "delay": 0}},
            {"gatewayId": "gw-b", "gateway": {"enabled": true}},
            {"gatewayId": "gw-c", "gateway": {"enabled": false}}
        ]
    })]
}

#[test]
fn test_record_list_field_change_round_trips() {
    let cfg = cfg();
    let chain = gateway_chain();
    let compiled = compile_chain(&chain, None, &cfg);

    let mut candidate = compiled.clone();
    candidate["gateways"][1]["gateway"]["enabled"] = json!(false);

    let override_doc = reduce(&candidate, &compiled, &cfg).unwrap().unwrap();
    let list = override_doc["gateways"].as_array().unwrap();
    // Only the prefix up to the changed record is written, and the unchanged
    // head collapses to its identity.
    assert_eq!(list.len(), 2);
    assert_eq!(list[0], json!({"gatewayId": "gw-a"}));
    assert_eq!(list[1]["gateway"]["enabled"], false);

    let replayed = replay(&chain, &override_doc, &cfg);
    assert_eq!(replayed["gateways"], candidate["gateways"]);
}

#[test]
fn test_record_list_reorder_round_trips() {
    let cfg = cfg();
    let chain = gateway_chain();
    let compiled = compile_chain(&chain, None, &cfg);

    // Move gw-c to the front.
    let mut candidate = compiled.clone();
    let list = candidate["gateways"].as_array_mut().unwrap();
    let last = list.remove(2);
    list.insert(0, last);

    let override_doc = reduce(&candidate, &compiled, &cfg).unwrap().unwrap();
    assert_eq!(override_doc, json!({"gateways": [{"gatewayId": "gw-c"}]}));

    let replayed = replay(&chain, &override_doc, &cfg);
    assert_eq!(replayed["gateways"], candidate["gateways"]);
}

#[test]
fn test_record_list_new_entry_round_trips() {
    let cfg = cfg();
    let chain = gateway_chain();
    let compiled = compile_chain(&chain, None, &cfg);

    let mut candidate = compiled.clone();
    let list = candidate["gateways"].as_array_mut().unwrap();
    list.insert(
        0,
        json!({"gatewayId": "gw-new", "gateway": {"enabled": true}}),
    );

    let override_doc = reduce(&candidate, &compiled, &cfg).unwrap().unwrap();
    let reduced = override_doc["gateways"].as_array().unwrap();
    assert_eq!(reduced.len(), 1);
    assert_eq!(reduced[0]["gatewayId"], "gw-new");

    let replayed = replay(&chain, &override_doc, &cfg);
    assert_eq!(replayed["gateways"], candidate["gateways"]);
}

#[test]
fn test_unchanged_record_list_emits_nothing() {
    let cfg = cfg();
    let chain = gateway_chain();
    let compiled = compile_chain(&chain, None, &cfg);

    assert_eq!(reduce(&compiled, &compiled, &cfg).unwrap(), None);
}

// ============================================================================
// Templates and base wrappers
// ============================================================================

#[test]
fn test_template_equivalent_literal_is_inherited() {
    let cfg = cfg();
    let chain = vec![json!({
        "ticker": "ES",
        "exchange": "CME",
        "symbolName": {"$template": "ticker .. '.' .. exchange"}
    })];
    let compiled = compile_chain(&chain, None, &cfg);

    // The editor materialized the formula's result; nothing to write.
    let candidate = json!({
        "ticker": "ES",
        "exchange": "CME",
        "symbolName": "ES.CME"
    });
    assert_eq!(reduce(&candidate, &compiled, &cfg).unwrap(), None);
}

#[test]
fn test_template_diverging_literal_is_written() {
    let cfg = cfg();
    let chain = vec![json!({
        "rate": 3,
        "fee": {"$template": "rate * 2"}
    })];
    let compiled = compile_chain(&chain, None, &cfg);

    let candidate = json!({"rate": 3, "fee": 10});
    let override_doc = reduce(&candidate, &compiled, &cfg).unwrap().unwrap();
    assert_eq!(override_doc, json!({"fee": 10}));
}

#[test]
fn test_template_reads_fields_from_the_candidate() {
    let cfg = cfg();
    let chain = vec![json!({
        "rate": 3,
        "fee": {"$template": "rate * 2"}
    })];
    let compiled = compile_chain(&chain, None, &cfg);

    // The candidate changed the input field; the formula is re-evaluated
    // against the candidate, so fee = 8 is still the formula's own result.
    let candidate = json!({"rate": 4, "fee": 8});
    let override_doc = reduce(&candidate, &compiled, &cfg).unwrap().unwrap();
    assert_eq!(override_doc, json!({"rate": 4}));
}

// ============================================================================
// Null handling
// ============================================================================

#[test]
fn test_null_override_unsets_inherited_field() {
    let cfg = cfg();
    let chain = vec![
        json!({"maturity": "2024-06", "currency": "USD"}),
        json!({"maturity": null}),
    ];
    let compiled = compile_chain(&chain, None, &cfg);
    assert_eq!(compiled, json!({"currency": "USD"}));
}

#[test]
fn test_preserved_keys_survive_reduction() {
    let cfg = cfg();
    let chain = vec![json!({"isAbstract": true, "currency": "USD"})];
    let compiled = compile_chain(&chain, None, &cfg);

    let override_doc = reduce(&compiled, &compiled, &cfg).unwrap().unwrap();
    assert_eq!(override_doc, json!({"isAbstract": true}));
}

// ============================================================================
// Service fields
// ============================================================================

#[test]
fn test_service_fields_do_not_inherit() {
    let cfg = cfg();
    let chain = vec![json!({
        "_id": "root",
        "_rev": "1-abc",
        "name": "ROOT",
        "currency": "USD"
    })];
    let compiled = compile_chain(&chain, None, &cfg);
    assert_eq!(compiled, json!({"currency": "USD"}));

    let own = json!({"_id": "leaf", "name": "LEAF"});
    let with_self = compile_chain(&chain, Some(&own), &cfg);
    assert_eq!(with_self["_id"], "leaf");
    assert_eq!(with_self["name"], "LEAF");
    assert_eq!(with_self["currency"], "USD");
}
