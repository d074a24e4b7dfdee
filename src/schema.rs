//! Schema parsing and navigation.
//!
//! [`SchemaIndex::build`] parses a declarative schema definition (objects,
//! arrays, keyed maps, named reusable sub-schemas, polymorphic `anyOf`
//! unions) into an immutable node graph. The index answers two questions:
//! what kind of value lives at a path ([`SchemaIndex::lookup`]) and what path
//! leads to a field ([`SchemaIndex::find_path`]).
//!
//! The raw definition format follows the JSON-Schema subset the document
//! store publishes: `type`, `title`, `properties`, `items`,
//! `additionalProperties`, `enum`, `anyOf`, `allOf`/`$ref` pointing into a
//! top-level `definitions` table.

use crate::{CascadeError, CascadeResult, FieldPath, Segment};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Wildcard segment name standing for the dynamic key of a keyed map,
/// produced by [`SchemaIndex::find_path`] where a concrete id is required.
pub const WILDCARD: &str = "*";

/// The kind of value a schema node describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    /// Boolean scalar.
    Boolean,
    /// Integer scalar.
    Integer,
    /// Floating-point scalar.
    Number,
    /// String scalar.
    String,
    /// Ordered list with a uniform item schema.
    Array,
    /// Object with a fixed property set.
    Object,
    /// Object with dynamic keys sharing one value schema
    /// (`additionalProperties` in the raw definition).
    Map,
    /// Polymorphic union of variant schemas (`anyOf`).
    Union,
}

impl SchemaKind {
    /// Lowercase name matching the raw definition's `type` vocabulary.
    pub fn name(&self) -> &'static str {
        match self {
            SchemaKind::Boolean => "boolean",
            SchemaKind::Integer => "integer",
            SchemaKind::Number => "number",
            SchemaKind::String => "string",
            SchemaKind::Array => "array",
            SchemaKind::Object => "object",
            SchemaKind::Map => "map",
            SchemaKind::Union => "union",
        }
    }
}

/// A node in the parsed schema graph.
///
/// Owned exclusively by the [`SchemaIndex`] that parsed it; read-only
/// afterward. References to named sub-schemas are resolved eagerly, so a node
/// embeds a full copy of everything it points at.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaNode {
    /// What kind of value lives here.
    pub kind: SchemaKind,
    /// Optional human-readable title (named sub-schemas keep their name here).
    pub title: Option<String>,
    /// Item schema for arrays, value schema for keyed maps.
    pub item: Option<Box<SchemaNode>>,
    /// Property schemas for objects.
    pub properties: BTreeMap<String, SchemaNode>,
    /// Variant schemas for unions.
    pub variants: Vec<SchemaNode>,
    /// Enumerated allowed values, if the definition restricts them.
    pub options: Option<Vec<Value>>,
}

impl SchemaNode {
    fn scalar(kind: SchemaKind) -> Self {
        SchemaNode {
            kind,
            title: None,
            item: None,
            properties: BTreeMap::new(),
            variants: Vec::new(),
            options: None,
        }
    }

    /// Short description used in ambiguity reports: title if present,
    /// otherwise the kind name.
    pub fn describe(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.kind.name().to_owned())
    }

    /// True if a hint string picks this node as a union variant, matching the
    /// title (case-insensitive) or the kind name.
    fn matches_hint(&self, hint: &str) -> bool {
        if hint.eq_ignore_ascii_case(self.kind.name()) {
            return true;
        }
        self.title
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(hint))
    }
}

/// Immutable, queryable index over a parsed schema.
///
/// Built once per schema; safe for unlimited concurrent read-only lookups.
#[derive(Clone, Debug)]
pub struct SchemaIndex {
    root: SchemaNode,
    definitions: BTreeMap<String, SchemaNode>,
    /// definition name -> (owner, referencing field) sites. Owner is a
    /// definition name or `"root"`.
    mentions: BTreeMap<String, Vec<(String, String)>>,
}

struct ParseCtx<'a> {
    raw_defs: &'a Map<String, Value>,
    built: BTreeMap<String, SchemaNode>,
    building: BTreeSet<String>,
}

impl SchemaIndex {
    /// Parse a raw schema definition into an index.
    ///
    /// Internal references are resolved eagerly and memoized, so `resolve`
    /// and lookups never re-parse. Unknown references and reference cycles
    /// are build errors.
    pub fn build(definition: &Value) -> CascadeResult<SchemaIndex> {
        let raw = definition
            .as_object()
            .ok_or_else(|| CascadeError::malformed_schema("schema definition must be an object"))?;
        let empty = Map::new();
        let raw_defs = raw
            .get("definitions")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let mut ctx = ParseCtx {
            raw_defs,
            built: BTreeMap::new(),
            building: BTreeSet::new(),
        };

        let root = parse_node(definition, &mut ctx)?;
        // Parse every definition even if the root never reaches it, so that
        // find_path can seed from any named sub-schema.
        for name in raw_defs.keys() {
            resolve_definition(name, &mut ctx)?;
        }
        let definitions = ctx.built;

        let mut mentions: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        collect_mentions("root", raw, &mut mentions);
        for (name, def_raw) in raw_defs {
            if let Some(obj) = def_raw.as_object() {
                collect_mentions(name, obj, &mut mentions);
            }
        }

        Ok(SchemaIndex {
            root,
            definitions,
            mentions,
        })
    }

    /// The root node of the parsed schema.
    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Resolve a named sub-schema by its identifier.
    pub fn resolve(&self, name: &str) -> Option<&SchemaNode> {
        self.definitions.get(name)
    }

    /// Resolve a path against the schema.
    ///
    /// Index segments are skipped (array item types are uniform). Walking
    /// into a union descends into the variant picked by `hint` (keyed by the
    /// field name that led into the union), or into every variant when no
    /// hint applies — the caller disambiguates multi-candidate results.
    ///
    /// An empty result means the path is invalid; this is logged, not raised.
    pub fn lookup<'a>(
        &'a self,
        path: &FieldPath,
        hint: Option<&BTreeMap<String, String>>,
    ) -> Vec<&'a SchemaNode> {
        let mut out = Vec::new();
        walk(&self.root, None, path.segments(), hint, &mut out);
        if out.is_empty() {
            warn!(path = %path, "schema lookup found no node");
        }
        out
    }

    /// Strict lookup: exactly one node or an error.
    pub fn lookup_one<'a>(
        &'a self,
        path: &FieldPath,
        hint: Option<&BTreeMap<String, String>>,
    ) -> CascadeResult<&'a SchemaNode> {
        let mut candidates = self.lookup(path, hint);
        match candidates.len() {
            0 => Err(CascadeError::schema_lookup(path.clone())),
            1 => Ok(candidates.remove(0)),
            _ => Err(CascadeError::ambiguous_path(
                path.clone(),
                candidates.iter().map(|n| n.describe()).collect(),
            )),
        }
    }

    /// Locate where a field lives in the full document.
    ///
    /// `target` is a field name or a dotted partial path counted from the end
    /// of the real path (e.g. `"quoteRic.base"`). When the field is reachable
    /// through more than one reference site, `context_hints` pick among them
    /// by definition name or referencing field name (case-insensitive).
    ///
    /// Where the assembled path crosses a keyed map, a [`WILDCARD`] segment
    /// stands for the dynamic key; the caller substitutes the concrete id.
    ///
    /// Returns `None` (logged) for unknown fields and unresolved ambiguity.
    pub fn find_path(&self, target: &str, context_hints: &[&str]) -> Option<FieldPath> {
        let tail = crate::parse_path(&target.replace('/', "."));
        if tail.is_empty() {
            return None;
        }

        // Maybe the target is already a full path from the root.
        if let Some(first) = tail[0].as_field() {
            if self.root.properties.contains_key(first) && self.lookup(&tail, None).len() == 1 {
                return Some(tail);
            }
        }

        let lookup_item = tail
            .iter()
            .find_map(|seg| seg.as_field().filter(|f| *f != WILDCARD))?;

        let seeds: Vec<&String> = self
            .definitions
            .iter()
            .filter(|(_, node)| node.properties.contains_key(lookup_item))
            .map(|(name, _)| name)
            .collect();
        let mut current = match seeds.len() {
            0 => {
                warn!(target, "field not found in any named sub-schema");
                return None;
            }
            1 => seeds[0].clone(),
            _ => {
                // A hint may name the definition itself or anything on its
                // reference trail (the owner or the referencing field).
                let matched: Vec<&&String> = seeds
                    .iter()
                    .filter(|name| self.seed_matches_hints(name, context_hints))
                    .collect();
                match matched.as_slice() {
                    [one] => (**one).clone(),
                    _ => {
                        warn!(target, candidates = ?seeds, "ambiguous field, provide a context hint");
                        return None;
                    }
                }
            }
        };

        let mut segments: Vec<Segment> = tail.segments().to_vec();
        let mut visited = BTreeSet::new();
        loop {
            if !visited.insert(current.clone()) {
                warn!(target, definition = %current, "reference trail loops");
                return None;
            }
            let sites = match self.mentions.get(&current) {
                Some(sites) if !sites.is_empty() => sites,
                _ => {
                    warn!(target, definition = %current, "sub-schema is not referenced anywhere");
                    return None;
                }
            };
            let (owner, field) = match pick_site(sites, context_hints) {
                Some(site) => site,
                None => {
                    warn!(target, definition = %current, sites = ?sites,
                          "ambiguous reference site, provide a context hint");
                    return None;
                }
            };
            // A keyed map interposes a dynamic key between the field and the
            // referenced sub-schema.
            if self
                .owner_node(owner)
                .and_then(|node| node.properties.get(field))
                .is_some_and(|n| n.kind == SchemaKind::Map)
            {
                segments.insert(0, Segment::field(WILDCARD));
            }
            segments.insert(0, Segment::field(field));
            if owner == "root" {
                break;
            }
            current = owner.to_owned();
        }

        let path = FieldPath::from_segments(segments);
        if self.lookup(&path, None).is_empty() {
            return None;
        }
        Some(path)
    }

    fn seed_matches_hints(&self, name: &str, hints: &[&str]) -> bool {
        if hints.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            return true;
        }
        self.mentions.get(name).is_some_and(|sites| {
            sites.iter().any(|(owner, field)| {
                hints
                    .iter()
                    .any(|h| h.eq_ignore_ascii_case(owner) || h.eq_ignore_ascii_case(field))
            })
        })
    }

    fn owner_node(&self, owner: &str) -> Option<&SchemaNode> {
        if owner == "root" {
            Some(&self.root)
        } else {
            self.definitions.get(owner)
        }
    }
}

fn pick_site<'a>(
    sites: &'a [(String, String)],
    hints: &[&str],
) -> Option<(&'a str, &'a str)> {
    if sites.len() == 1 {
        let (owner, field) = &sites[0];
        return Some((owner, field));
    }
    sites
        .iter()
        .find(|(owner, field)| {
            hints
                .iter()
                .any(|h| h.eq_ignore_ascii_case(owner) || h.eq_ignore_ascii_case(field))
        })
        .map(|(owner, field)| (owner.as_str(), field.as_str()))
}

fn walk<'a>(
    node: &'a SchemaNode,
    field_ctx: Option<&str>,
    segs: &[Segment],
    hint: Option<&BTreeMap<String, String>>,
    out: &mut Vec<&'a SchemaNode>,
) {
    if node.kind == SchemaKind::Union {
        let chosen = field_ctx
            .and_then(|f| hint.and_then(|h| h.get(f)))
            .and_then(|tag| node.variants.iter().find(|v| v.matches_hint(tag)));
        match chosen {
            Some(variant) => walk(variant, field_ctx, segs, hint, out),
            None => {
                for variant in &node.variants {
                    walk(variant, field_ctx, segs, hint, out);
                }
            }
        }
        return;
    }

    let Some(seg) = segs.first() else {
        out.push(node);
        return;
    };

    match seg {
        // Indices never change the schema node except to enter an array's
        // uniform item schema.
        Segment::Item(_) => match node.kind {
            SchemaKind::Array | SchemaKind::Map => {
                if let Some(item) = &node.item {
                    walk(item, field_ctx, &segs[1..], hint, out);
                }
            }
            _ => walk(node, field_ctx, &segs[1..], hint, out),
        },
        Segment::Field(name) => match node.kind {
            SchemaKind::Object => {
                if let Some(child) = node.properties.get(name) {
                    walk(child, Some(name), &segs[1..], hint, out);
                }
            }
            // The segment is the dynamic key; the value schema is uniform.
            SchemaKind::Map => {
                if let Some(item) = &node.item {
                    walk(item, field_ctx, &segs[1..], hint, out);
                }
            }
            // Field access through an array reaches into the item schema
            // without consuming the segment.
            SchemaKind::Array => {
                if let Some(item) = &node.item {
                    walk(item, field_ctx, segs, hint, out);
                }
            }
            _ => {}
        },
    }
}

fn ref_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

fn resolve_definition(name: &str, ctx: &mut ParseCtx<'_>) -> CascadeResult<SchemaNode> {
    if let Some(done) = ctx.built.get(name) {
        return Ok(done.clone());
    }
    if !ctx.building.insert(name.to_owned()) {
        return Err(CascadeError::malformed_schema(format!(
            "reference cycle through definition '{name}'"
        )));
    }
    let raw = ctx
        .raw_defs
        .get(name)
        .cloned()
        .ok_or_else(|| CascadeError::malformed_schema(format!("unknown reference '{name}'")))?;
    let mut node = parse_node(&raw, ctx)?;
    if node.title.is_none() {
        node.title = Some(name.to_owned());
    }
    ctx.building.remove(name);
    ctx.built.insert(name.to_owned(), node.clone());
    Ok(node)
}

fn parse_node(raw: &Value, ctx: &mut ParseCtx<'_>) -> CascadeResult<SchemaNode> {
    let obj = raw
        .as_object()
        .ok_or_else(|| CascadeError::malformed_schema("schema node must be an object"))?;

    if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
        return resolve_definition(ref_name(reference), ctx);
    }
    if let Some(all_of) = obj.get("allOf").and_then(Value::as_array) {
        let reference = all_of
            .iter()
            .find_map(|v| v.get("$ref").and_then(Value::as_str))
            .ok_or_else(|| CascadeError::malformed_schema("allOf without a $ref entry"))?;
        return resolve_definition(ref_name(reference), ctx);
    }
    if let Some(any_of) = obj.get("anyOf").and_then(Value::as_array) {
        let variants = any_of
            .iter()
            .map(|v| parse_node(v, ctx))
            .collect::<CascadeResult<Vec<_>>>()?;
        let mut node = SchemaNode::scalar(SchemaKind::Union);
        node.title = obj.get("title").and_then(Value::as_str).map(str::to_owned);
        node.variants = variants;
        return Ok(node);
    }

    let title = obj.get("title").and_then(Value::as_str).map(str::to_owned);
    let options = obj.get("enum").and_then(Value::as_array).cloned();
    let type_name = obj.get("type").and_then(Value::as_str);

    let kind = match type_name {
        Some("boolean") => SchemaKind::Boolean,
        Some("integer") => SchemaKind::Integer,
        Some("number") => SchemaKind::Number,
        Some("string") => SchemaKind::String,
        Some("array") => SchemaKind::Array,
        Some("object") => SchemaKind::Object,
        Some(other) => {
            return Err(CascadeError::malformed_schema(format!(
                "unsupported type '{other}'"
            )))
        }
        // Bare enums carry no type; infer from the first allowed value.
        None => match options.as_ref().and_then(|opts| opts.first()) {
            Some(Value::Bool(_)) => SchemaKind::Boolean,
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => SchemaKind::Integer,
            Some(Value::Number(_)) => SchemaKind::Number,
            _ => SchemaKind::String,
        },
    };

    let mut node = SchemaNode::scalar(kind);
    node.title = title;
    node.options = options;

    match kind {
        SchemaKind::Object => {
            if let Some(props) = obj.get("properties").and_then(Value::as_object) {
                for (name, prop_raw) in props {
                    node.properties
                        .insert(name.clone(), parse_node(prop_raw, ctx)?);
                }
            } else if let Some(additional) = obj.get("additionalProperties") {
                if additional.is_object() {
                    node.kind = SchemaKind::Map;
                    node.item = Some(Box::new(parse_node(additional, ctx)?));
                }
            }
        }
        SchemaKind::Array => {
            if let Some(items) = obj.get("items") {
                node.item = Some(Box::new(parse_node(items, ctx)?));
            }
        }
        _ => {}
    }

    Ok(node)
}

/// Record which fields of `owner` reference which named sub-schemas,
/// looking through `$ref`, `allOf`, `anyOf`, `items` and
/// `additionalProperties` exactly as they appear in the raw definition.
fn collect_mentions(
    owner: &str,
    raw: &Map<String, Value>,
    mentions: &mut BTreeMap<String, Vec<(String, String)>>,
) {
    let Some(props) = raw.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (field, prop) in props {
        for referenced in refs_of(prop) {
            mentions
                .entry(referenced)
                .or_default()
                .push((owner.to_owned(), field.clone()));
        }
    }
}

fn refs_of(prop: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    let Some(obj) = prop.as_object() else {
        return refs;
    };
    if let Some(r) = obj.get("$ref").and_then(Value::as_str) {
        refs.push(ref_name(r).to_owned());
    }
    for key in ["allOf", "anyOf"] {
        if let Some(entries) = obj.get(key).and_then(Value::as_array) {
            for entry in entries {
                if let Some(r) = entry.get("$ref").and_then(Value::as_str) {
                    refs.push(ref_name(r).to_owned());
                }
            }
        }
    }
    for key in ["items", "additionalProperties"] {
        if let Some(r) = obj
            .get(key)
            .and_then(|v| v.get("$ref"))
            .and_then(Value::as_str)
        {
            refs.push(ref_name(r).to_owned());
        }
    }
    refs
}
