//! Reduction: computing the minimal override document.
//!
//! Given a full candidate document and the document compiled from its
//! ancestors alone, [`reduce`] returns the smallest document that, merged
//! over the compiled ancestors, reproduces the candidate — or `None` when
//! inheritance already explains everything.

use crate::{align, template, CascadeResult, EngineConfig};
use serde_json::{Map, Value};
use tracing::warn;

/// Compute the minimal override document (pure function).
///
/// `compiled_ancestors` is the ancestors-only compilation (see
/// [`crate::compile_chain`] with `self_doc = None`). Keys listed in
/// `cfg.preserved_keys` are written even when equal to the inherited value;
/// template-valued compiled fields are checked for formula equivalence
/// against the candidate before a literal is emitted.
///
/// # Examples
///
/// ```
/// use doc_cascade::{reduce, EngineConfig};
/// use serde_json::json;
///
/// let cfg = EngineConfig::new();
/// let compiled = json!({"a": 1, "b": {"x": true}});
/// let candidate = json!({"a": 1, "b": {"x": true, "y": 5}});
///
/// let override_doc = reduce(&candidate, &compiled, &cfg).unwrap();
/// assert_eq!(override_doc, Some(json!({"b": {"y": 5}})));
/// ```
pub fn reduce(
    candidate: &Value,
    compiled_ancestors: &Value,
    cfg: &EngineConfig,
) -> CascadeResult<Option<Value>> {
    reduce_value(candidate, non_empty(compiled_ancestors), cfg, candidate)
}

/// Nothing-to-inherit detection: null and empty containers count as absent.
fn non_empty(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Object(m) if m.is_empty() => None,
        Value::Array(a) if a.is_empty() => None,
        other => Some(other),
    }
}

/// A value worth writing when there is nothing to compare against.
/// Numeric zero is meaningful; unset optionals, bare false and empty
/// containers are not.
fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn finish(out: Map<String, Value>) -> Option<Value> {
    if out.is_empty() {
        None
    } else {
        Some(Value::Object(out))
    }
}

/// Recursive reduction of one value against its compiled counterpart.
///
/// `candidate_root` is the full candidate document; template formulas
/// reference fields through it no matter how deep the reduction currently is.
pub(crate) fn reduce_value(
    child: &Value,
    sibling: Option<&Value>,
    cfg: &EngineConfig,
    candidate_root: &Value,
) -> CascadeResult<Option<Value>> {
    match child {
        Value::Object(child_map) => {
            let sibling_map = sibling
                .and_then(Value::as_object)
                .filter(|m| !m.is_empty());
            let Some(sibling_map) = sibling_map else {
                let out: Map<String, Value> = child_map
                    .iter()
                    .filter(|(key, value)| {
                        cfg.preserved_keys.contains(*key) || is_meaningful(value)
                    })
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                return Ok(finish(out));
            };

            let mut out = Map::new();
            for (key, value) in child_map {
                match sibling_map.get(key) {
                    Some(inherited) if inherited == value => {
                        if cfg.preserved_keys.contains(key) {
                            out.insert(key.clone(), value.clone());
                        } else if cfg.override_bags.contains(key) {
                            // Full equality may still hide substructure that
                            // has to round-trip (identity fields inside the
                            // bag); recurse instead of short-circuiting.
                            if let Some(payload) =
                                reduce_value(value, Some(inherited), cfg, candidate_root)?
                            {
                                out.insert(key.clone(), payload);
                            }
                        }
                    }
                    Some(inherited) if !value.is_object() && !value.is_array() => {
                        if value.is_null() {
                            // Removal is not representable in an override.
                            continue;
                        }
                        if let Some(emit) =
                            reduce_scalar(value, inherited, candidate_root)
                        {
                            out.insert(key.clone(), emit);
                        }
                    }
                    Some(inherited) => {
                        if let Some(payload) =
                            reduce_value(value, Some(inherited), cfg, candidate_root)?
                        {
                            out.insert(key.clone(), payload);
                        }
                    }
                    None => {
                        if cfg.preserved_keys.contains(key)
                            || (!value.is_null() && value != &Value::Bool(false))
                        {
                            out.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            Ok(finish(out))
        }

        Value::Array(child_list) => {
            let sibling_list = sibling.and_then(Value::as_array).filter(|a| !a.is_empty());
            let Some(sibling_list) = sibling_list else {
                return Ok(if child_list.is_empty() {
                    None
                } else {
                    Some(child.clone())
                });
            };
            if align::is_identity_keyed(child_list, cfg)
                && align::is_identity_keyed(sibling_list, cfg)
            {
                Ok(align_and_reduce_list(
                    child_list,
                    sibling_list,
                    cfg,
                    candidate_root,
                )?)
            } else if child_list != sibling_list {
                // Non-identity lists are replace-only: any positional or
                // length difference writes the whole list.
                Ok(Some(child.clone()))
            } else {
                Ok(None)
            }
        }

        scalar => Ok(match sibling {
            Some(inherited) if inherited == scalar => None,
            _ if scalar.is_null() => None,
            _ => Some(scalar.clone()),
        }),
    }
}

fn align_and_reduce_list(
    child: &[Value],
    sibling: &[Value],
    cfg: &EngineConfig,
    candidate_root: &Value,
) -> CascadeResult<Option<Value>> {
    Ok(align::align_and_reduce(child, sibling, cfg, candidate_root)?.map(Value::Array))
}

/// Decide whether a changed scalar actually needs writing.
///
/// The compiled counterpart may be a base-wrapped value or a template
/// formula; a literal equal to what the formula already produces is not an
/// override. A formula that fails to parse or evaluate is logged and treated
/// as a difference.
fn reduce_scalar(value: &Value, inherited: &Value, candidate_root: &Value) -> Option<Value> {
    let effective = template::base_value(inherited).unwrap_or(inherited);

    if let Some(source) = template::template_source(effective) {
        return match template::evaluate(source, candidate_root) {
            Ok(result) if template::results_equal(value, &result) => None,
            Ok(_) => Some(value.clone()),
            Err(error) => {
                warn!(%error, source, "template evaluation failed, writing literal");
                Some(value.clone())
            }
        };
    }

    if effective == value {
        return None;
    }
    Some(value.clone())
}
