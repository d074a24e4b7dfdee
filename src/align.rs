//! Record-list reconciliation.
//!
//! Lists of identity-keyed records (feed gateways, broker accounts, routes)
//! carry order that matters and entries that correlate across document
//! versions by an identity field rather than by position. Both the
//! inheritance compiler and the reducer go through this module:
//! [`merge_records`] splices descendant entries over ancestor entries, and
//! [`align_and_reduce`] computes the minimal partial list that preserves
//! order information.

use crate::{path, reduce, CascadeError, CascadeResult, EngineConfig, FieldPath};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Synthetic key under which a record's identity value is tagged in its
/// flattened form.
const IDENTITY_TAG: &str = "\u{0}identity";

/// Find the identity field of a record: the first key (sorted order) whose
/// value is a string and whose name follows the identity convention.
pub fn identity_field<'a>(record: &'a Value, cfg: &EngineConfig) -> Option<&'a str> {
    record.as_object()?.iter().find_map(|(key, value)| {
        (value.is_string() && cfg.is_identity_key(key)).then_some(key.as_str())
    })
}

/// True if `list` is a non-empty list of records correlated by identity.
pub fn is_identity_keyed(list: &[Value], cfg: &EngineConfig) -> bool {
    match list.first() {
        Some(first) => identity_field(first, cfg).is_some(),
        None => false,
    }
}

fn identity_of<'a>(record: &'a Value, cfg: &EngineConfig) -> Option<(&'a str, &'a str)> {
    let field = identity_field(record, cfg)?;
    let value = record.get(field)?.as_str()?;
    Some((field, value))
}

/// Merge a descendant record list over an ancestor record list.
///
/// Descendant entries come first, in descendant order, each merged
/// field-by-field with the ancestor record carrying the same identity;
/// ancestor records with no descendant counterpart follow unchanged, in
/// ancestor order.
pub fn merge_records(
    ancestor: &[Value],
    descendant: &[Value],
    cfg: &EngineConfig,
    merge_value: impl Fn(&Value, &Value) -> Value + Copy,
) -> Vec<Value> {
    let mut merged: Vec<Value> = ancestor.to_vec();
    for entry in descendant.iter().rev() {
        let id = identity_of(entry, cfg);
        let existing = id.and_then(|(field, value)| {
            merged
                .iter()
                .position(|m| m.get(field).and_then(Value::as_str) == Some(value))
        });
        match existing {
            Some(pos) => {
                let base = merged.remove(pos);
                merged.insert(0, merge_value(&base, entry));
            }
            None => merged.insert(0, entry.clone()),
        }
    }
    merged
}

/// Flatten a record to a single level: the identity value is tagged under a
/// synthetic key, nested object values are splatted into the flat map, other
/// scalars copy through.
fn flatten(record: &Value, cfg: &EngineConfig, path: &FieldPath) -> CascadeResult<Map<String, Value>> {
    let obj = record.as_object().ok_or_else(|| {
        CascadeError::malformed_document(path.clone(), "record list entry is not an object")
    })?;
    let identity = identity_field(record, cfg).ok_or_else(|| {
        CascadeError::malformed_document(
            path.clone(),
            "record has no identity field, but identity alignment was requested",
        )
    })?;

    let mut flat = Map::new();
    for (key, value) in obj {
        if key == identity {
            flat.insert(IDENTITY_TAG.to_owned(), value.clone());
        } else if let Some(nested) = value.as_object() {
            for (k, v) in nested {
                flat.insert(k.clone(), v.clone());
            }
        } else {
            flat.insert(key.clone(), value.clone());
        }
    }
    Ok(flat)
}

fn flat_identity(flat: &Map<String, Value>) -> &str {
    flat.get(IDENTITY_TAG)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// False in the child where the sibling has nothing is not a divergence:
/// an uninherited boolean already defaults to false.
fn fields_diverge(child: &Map<String, Value>, sibling: &Map<String, Value>) -> bool {
    child.iter().any(|(key, value)| {
        let sibling_value = sibling.get(key);
        if sibling_value == Some(value) {
            return false;
        }
        !(value == &Value::Bool(false)
            && matches!(sibling_value, None | Some(Value::Bool(false)) | Some(Value::Null)))
    })
}

/// Align two identity-keyed record lists and reduce the child against the
/// sibling, emitting the minimal partial list that reproduces the child's
/// content and order when merged back over the sibling.
///
/// Returns `None` when the child is fully explained by the sibling.
pub fn align_and_reduce(
    child: &[Value],
    sibling: &[Value],
    cfg: &EngineConfig,
    candidate_root: &Value,
) -> CascadeResult<Option<Vec<Value>>> {
    let at = path!();
    let flat_child = child
        .iter()
        .map(|record| flatten(record, cfg, &at))
        .collect::<CascadeResult<Vec<_>>>()?;
    let mut flat_sibling = sibling
        .iter()
        .map(|record| flatten(record, cfg, &at))
        .collect::<CascadeResult<Vec<_>>>()?;

    // Alignment pass: walk child positions left to right; at the first
    // mismatch either move the matching sibling record up or plant a
    // placeholder for a new entry, then rescan. Each pass fixes one position,
    // so the scan converges after at most len(child) rounds.
    let mut moved: BTreeSet<usize> = BTreeSet::new();
    loop {
        let mismatch = (0..flat_child.len()).find(|&i| {
            flat_sibling
                .get(i)
                .map(|s| flat_identity(s) != flat_identity(&flat_child[i]))
                .unwrap_or(true)
        });
        let Some(i) = mismatch else { break };
        moved.insert(i);
        let wanted = flat_identity(&flat_child[i]).to_owned();
        // Positions before i are already aligned, so the counterpart can only
        // live further down the sibling list.
        match (i + 1..flat_sibling.len()).find(|&j| flat_identity(&flat_sibling[j]) == wanted) {
            Some(found) => {
                let entry = flat_sibling.remove(found);
                flat_sibling.insert(i, entry);
            }
            None => {
                let mut placeholder = Map::new();
                placeholder.insert(IDENTITY_TAG.to_owned(), Value::String(wanted));
                let at = i.min(flat_sibling.len());
                flat_sibling.insert(at, placeholder);
            }
        }
    }

    // Divergence index: the last position that moved or differs in content
    // bounds the write; everything before it must be emitted to pin order.
    let mut boundary: Option<usize> = None;
    for i in 0..flat_child.len() {
        if moved.contains(&i) || fields_diverge(&flat_child[i], &flat_sibling[i]) {
            boundary = Some(i);
        }
    }
    let Some(boundary) = boundary else {
        return Ok(None);
    };

    let mut reduced = Vec::with_capacity(boundary + 1);
    for (position, record) in child.iter().enumerate().take(boundary + 1) {
        let (field, id) = identity_of(record, cfg).ok_or_else(|| {
            CascadeError::malformed_document(
                path!(position),
                "record has no identity field, but identity alignment was requested",
            )
        })?;
        // Reduce against the original (unflattened) sibling record carrying
        // this identity, if any.
        let counterpart = sibling
            .iter()
            .find(|s| s.get(field).and_then(Value::as_str) == Some(id));
        match reduce::reduce_value(record, counterpart, cfg, candidate_root)? {
            Some(mut value) => {
                // The identity must round-trip no matter how the preserve
                // list is configured; merging back is keyed on it.
                if let Some(obj) = value.as_object_mut() {
                    obj.entry(field.to_owned())
                        .or_insert_with(|| Value::String(id.to_owned()));
                }
                reduced.push(value);
            }
            // An unchanged record inside the write boundary still pins order:
            // emit its identity alone.
            None => {
                let mut minimal = Map::new();
                minimal.insert(field.to_owned(), Value::String(id.to_owned()));
                reduced.push(Value::Object(minimal));
            }
        }
    }

    Ok(Some(reduced))
}
