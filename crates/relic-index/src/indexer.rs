//! The graph indexer: one output document per admitted entity.
//!
//! A single invocation owns all mutable state for the pass (the worklist
//! queue, the visited set, and the accumulated documents) and threads an
//! explicit per-document context through the mapping calls. Nothing here
//! survives between passes.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use relic_graph::{as_array, ref_id, Entity, GraphModel, Hop};

use crate::config::{FacetSpec, FieldConfig, FieldRule, ResolveSpec, Transform, TypeConfig, ValidateSpec};
use crate::rules::{filter_matches, CompiledRules};

/// One flat output document.
pub type Document = Map<String, Value>;

/// Resolves a logical content path inside the object to a readable file,
/// for fields configured with `load_file`.
pub trait FileResolver {
    fn resolve(&self, logical: &str) -> Option<PathBuf>;
}

impl<F> FileResolver for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn resolve(&self, logical: &str) -> Option<PathBuf> {
        self(logical)
    }
}

/// A resolver for objects with no loadable payload.
pub struct NoFiles;

impl FileResolver for NoFiles {
    fn resolve(&self, _logical: &str) -> Option<PathBuf> {
        None
    }
}

/// Result of one indexing pass over a graph.
#[derive(Debug, Default)]
pub struct IndexOutput {
    /// The configured type the root entity was indexed under, if any.
    pub root_type: Option<String>,
    /// Documents per type, in emission order.
    pub documents: BTreeMap<String, Vec<Document>>,
    /// Accumulated per-field conversion errors. These never abort a
    /// document.
    pub errors: Vec<String>,
}

impl IndexOutput {
    /// Total number of documents across all types.
    pub fn len(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.values().all(Vec::is_empty)
    }
}

/// Index a loaded graph under compiled rules.
///
/// The root entity's document is produced first, under a distinguished
/// identifier (a configured named identifier, or `default_id`). Every other
/// entity is swept once; entities discovered through reference resolution
/// are queued and swept in bypass-filter mode until the worklist drains.
pub fn index(
    graph: &GraphModel,
    rules: &CompiledRules,
    files: &dyn FileResolver,
    default_id: &str,
) -> IndexOutput {
    let root = graph.root();
    let root_orig_id = root.id.clone();
    let root_type = rules.config.types.iter().find(|t| root.has_type(&t.name));

    // Clone the root and rewrite its id to the configured named identifier
    // before anything is mapped.
    let mut root_item = root.clone();
    if let Some(namespace) = root_type.and_then(|t| t.id_namespace.as_ref()) {
        match graph.named_identifier(namespace) {
            Some(identifier) => {
                debug!(namespace = %namespace, identifier = %identifier, "named identifier replaces root id");
                root_item.id = identifier;
            }
            None => {
                info!(default_id, "no named identifier in record, using default id");
                root_item.id = default_id.to_string();
            }
        }
    }

    // Remap the root's license, preserving the unmapped original.
    let raw_licenses: Vec<Value> = root_item.values("license").into_iter().cloned().collect();
    let raw_refs: Vec<&Value> = raw_licenses.iter().collect();
    let labels = rules.licenses.map(&raw_refs);
    if let Some(original) = root_item.props.get("license").cloned() {
        root_item.props.insert("licenseOriginal".into(), original);
    }
    root_item.props.insert(
        "license".into(),
        Value::Array(labels.into_iter().map(Value::String).collect()),
    );

    let mut pass = Pass {
        graph,
        rules,
        files,
        root_item,
        root_orig_id: root_orig_id.clone(),
        visited: HashSet::from([root_orig_id.clone()]),
        queue: Vec::new(),
        output: IndexOutput::default(),
    };

    // Root document first.
    if let Some(type_config) = root_type {
        pass.output.root_type = Some(type_config.name.clone());
        let item = pass.root_item.clone();
        let doc = pass.map_item(type_config, &item);
        pass.output.documents.entry(type_config.name.clone()).or_default().push(doc);
    }

    // Single sweep over the rest of the graph.
    for entity in graph.entities() {
        if pass.visited.contains(&entity.id) {
            continue;
        }
        pass.index_entity(entity, false);
    }

    // Fixpoint over transitively discovered entities, admission filters
    // bypassed: being referenced is sufficient justification.
    while !pass.queue.is_empty() {
        for id in std::mem::take(&mut pass.queue) {
            if let Some(entity) = graph.get(&id) {
                pass.index_entity(entity, true);
            }
        }
    }

    pass.output
}

struct Pass<'a> {
    graph: &'a GraphModel,
    rules: &'a CompiledRules,
    files: &'a dyn FileResolver,
    /// Root entity with rewritten id and remapped license; the inheritance
    /// source.
    root_item: Entity,
    /// The root's id as it appears in the graph.
    root_orig_id: String,
    /// Ids already emitted or queued. Guarantees at-most-once admission
    /// per entity within the pass.
    visited: HashSet<String>,
    queue: Vec<String>,
    output: IndexOutput,
}

impl<'a> Pass<'a> {
    /// Emit a document for the first configured type the entity declares
    /// and is admitted under. The entity's type is frozen to that single
    /// match.
    fn index_entity(&mut self, entity: &Entity, bypass_filter: bool) {
        let rules = self.rules;
        for type_config in &rules.config.types {
            if !entity.has_type(&type_config.name) {
                continue;
            }
            if !bypass_filter && !rules.admits(type_config, entity, &self.root_orig_id) {
                // The next declared type may still admit it.
                continue;
            }
            let mut frozen = entity.clone();
            frozen.types = vec![type_config.name.clone()];
            self.visited.insert(entity.id.clone());
            let doc = self.map_item(type_config, &frozen);
            self.output.documents.entry(type_config.name.clone()).or_default().push(doc);
            break;
        }
    }

    /// Build the document for one entity under one type.
    fn map_item(&mut self, type_config: &'a TypeConfig, item: &Entity) -> Document {
        let rules = self.rules;
        let mut doc = Document::new();

        // Identity and record-type marker on every document.
        doc.insert("id".into(), json!([item.id]));
        doc.insert("record_type_s".into(), json!([type_config.name]));

        // Copies applied to every record.
        for (field, targets) in &rules.config.map_all {
            let value = self.unwrap_value(field_value(item, field).as_ref(), false);
            for target in targets {
                doc.insert(target.clone(), value.clone());
            }
        }

        // Reverse references, where the type config asks for them.
        if !type_config.reverse.is_empty() {
            for (property, refs) in self.graph.reverse_values(&item.id) {
                if let Some(field_config) = type_config.reverse_field(&property) {
                    let value = Value::Array(refs);
                    self.map_field(&mut doc, type_config, Some(field_config), item, &property, Some(&value));
                }
            }
        }

        // The identity pseudo-fields map like ordinary fields.
        for field in ["@id", "@type"] {
            let value = field_value(item, field);
            let field_config = type_config.field(field);
            self.map_field(&mut doc, type_config, field_config, item, field, value.as_ref());
        }

        for (field, value) in &item.props {
            // Reverse references are handled above, from the index.
            if field == "@reverse" {
                continue;
            }
            let field_config = type_config.field(field);
            self.map_field(&mut doc, type_config, field_config, item, field, Some(value));
        }

        // Fields marked inherit that ended up unset copy the root
        // document's value.
        for field_config in &type_config.fields {
            if field_config.is_alternatives() || !field_config.rule().inherit {
                continue;
            }
            let field = &field_config.field;
            if !is_unset(doc.get(field)) {
                continue;
            }
            info!(field = %field, "inheriting value from root");
            match self.root_item.get(field) {
                Some(value) => {
                    doc.insert(field.clone(), value.clone());
                }
                None => warn!(field = %field, "no value on root item to inherit"),
            }
        }

        doc
    }

    fn map_field(
        &mut self,
        doc: &mut Document,
        type_config: &'a TypeConfig,
        field_config: Option<&'a FieldConfig>,
        item: &Entity,
        field: &str,
        value: Option<&Value>,
    ) {
        let rules = self.rules;
        match field_config {
            // No config: plain copy under the field's own name.
            None => {
                doc.insert(field.to_string(), self.unwrap_value(value, false));
            }
            Some(fc) if fc.is_alternatives() => {
                for rule in &fc.alternatives {
                    let Some(index_as) = rule.index_as.as_deref() else { continue };
                    // Alternatives shadowed by a map_all source are left
                    // to the base mapping.
                    if rules.config.map_all.iter().any(|(f, _)| f == index_as) {
                        continue;
                    }
                    self.map_value(doc, type_config, rule, item, field, index_as, value);
                }
            }
            Some(fc) => {
                let rule = fc.rule();
                let index_as = rule.index_as.as_deref().unwrap_or(field).to_string();
                self.map_value(doc, type_config, rule, item, field, &index_as, value);
            }
        }
    }

    /// Apply one rule to one field value, writing the indexed value and
    /// any facet into the document.
    #[allow(clippy::too_many_arguments)]
    fn map_value(
        &mut self,
        doc: &mut Document,
        type_config: &'a TypeConfig,
        rule: &'a FieldRule,
        item: &Entity,
        field: &str,
        index_as: &str,
        value: Option<&Value>,
    ) {
        let type_name = &type_config.name;
        match &rule.transform {
            Transform::Skip => return,
            Transform::LoadFile => {
                let content = self.load_file(type_name, field, value);
                // Content lands under the source field name.
                doc.insert(field.to_string(), content);
            }
            Transform::Resolve(spec) => {
                let (resolved, ids) = self.resolve_values(type_name, spec, item, field, index_as);
                doc.insert(index_as.to_string(), resolved);
                doc.insert(format!("{index_as}_id"), Value::Array(ids));
            }
            Transform::Copy { escaped_json } => {
                doc.insert(index_as.to_string(), self.unwrap_value(value, *escaped_json));
            }
            Transform::Validate(spec) => {
                let values = self.unwrap_value(value, false);
                let validated = self.validate(type_name, field, spec, &values);
                doc.insert(index_as.to_string(), validated);
            }
        }

        if let Some(facet_spec) = &rule.facet {
            let facet_value = make_facet(facet_spec, value, doc.get(index_as));
            match self.rules.facet_field(type_name, index_as) {
                Some(facet_field) => {
                    if facet_is_empty(&facet_value) {
                        warn!(facet = %facet_field.name, "empty value for facet");
                    }
                    doc.insert(facet_field.name.clone(), facet_value);
                }
                // The facet table is derived from the same config, so a
                // miss here is a bug, not a data problem.
                None => error!(type_name = %type_name, index_as, "no facet config found"),
            }
        }
    }

    /// Flatten a reference chain into `{id, display, search}` JSON strings
    /// plus the parallel id list, queueing newly seen configured targets.
    fn resolve_values(
        &mut self,
        type_name: &str,
        spec: &ResolveSpec,
        item: &Entity,
        field: &str,
        index_as: &str,
    ) -> (Value, Vec<Value>) {
        let rules = self.rules;
        let graph = self.graph;

        let matcher = rules.item_filter(type_name, index_as).map(|filter| {
            let field = field.to_string();
            let root_id = self.root_orig_id.clone();
            move |entity: &Entity| filter_matches(filter, &field, entity, &root_id)
        });

        let mut hops: Vec<Hop<'_>> = std::iter::once(field)
            .chain(spec.via.iter().map(String::as_str))
            .map(Hop::new)
            .collect();
        if let Some(matcher) = &matcher {
            if let Some(last) = hops.last_mut() {
                last.filter = Some(matcher as &dyn Fn(&Entity) -> bool);
            }
        }

        let targets = graph.resolve_chain(item, &hops);
        if targets.is_empty() {
            warn!(item = %item.id, field, "reference resolution found no targets");
            return (Value::String(String::new()), Vec::new());
        }
        debug!(item = %item.id, field, targets = targets.len(), "resolved references");

        let mut flattened: Vec<Value> = Vec::with_capacity(targets.len());
        let mut ids: Vec<Value> = Vec::with_capacity(targets.len());
        for target in targets {
            let resolved = json!({
                "@id": target.id,
                "display": target.get(&spec.display).cloned().unwrap_or(Value::Null),
                "search": convert_search(target, &spec.search),
            });
            ids.push(Value::String(target.id.clone()));
            flattened.push(Value::String(resolved.to_string()));

            // Referenced entities with configured types join the worklist,
            // once per id.
            if !self.visited.contains(&target.id)
                && target.types.iter().any(|t| rules.config.has_type(t))
            {
                self.visited.insert(target.id.clone());
                self.queue.push(target.id.clone());
                debug!(id = %target.id, "queued referenced entity for indexing");
            }
        }

        let value = if spec.multi {
            Value::Array(flattened)
        } else {
            if flattened.len() > 1 {
                warn!(field, "resolves to multiple values but is not configured as multi");
            }
            flattened.into_iter().next().unwrap_or_default()
        };
        (value, ids)
    }

    /// Unwrap a field value: array-normalize, and replace entity
    /// references with the target's name (or its full JSON when asked, or
    /// when it has no name). Dangling references are dropped.
    fn unwrap_value(&self, value: Option<&Value>, escaped_json: bool) -> Value {
        let mut out: Vec<Value> = Vec::new();
        for val in as_array(value) {
            if let Some(id) = ref_id(val) {
                let Some(target) = self.graph.get(id) else { continue };
                match target.name() {
                    Some(name) if !escaped_json => out.push(Value::String(name.to_string())),
                    _ => out.push(Value::String(target.to_value().to_string())),
                }
            } else {
                out.push(val.clone());
            }
        }
        Value::Array(out)
    }

    fn load_file(&mut self, type_name: &str, field: &str, value: Option<&Value>) -> Value {
        let file_id = as_array(value).into_iter().next().and_then(ref_id);
        let Some(file_id) = file_id else {
            self.convert_error(type_name, field, "cannot find id on file value");
            return Value::String(String::new());
        };
        let Some(path) = self.files.resolve(file_id) else {
            self.convert_error(type_name, field, &format!("cannot resolve file {file_id}"));
            return Value::String(String::new());
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Value::String(content),
            Err(e) => {
                self.convert_error(type_name, field, &format!("error loading file {file_id}: {e}"));
                Value::String(String::new())
            }
        }
    }

    fn validate(
        &mut self,
        type_name: &str,
        field: &str,
        spec: &ValidateSpec,
        values: &Value,
    ) -> Value {
        let strings: Vec<&str> = as_array(Some(values))
            .into_iter()
            .filter_map(Value::as_str)
            .collect();
        match spec {
            ValidateSpec::Date => {
                let Some(first) = strings.first() else {
                    self.convert_error(type_name, field, "no value to validate as date");
                    return Value::String(String::new());
                };
                let digits: String =
                    first.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect();
                match date_pattern().find(&digits) {
                    Some(m) => Value::String(m.as_str().to_string()),
                    None => {
                        self.convert_error(type_name, field, &format!("invalid date: {first}"));
                        Value::String(String::new())
                    }
                }
            }
            ValidateSpec::Re(re) => {
                for value in &strings {
                    if let Some(captures) = re.captures(value) {
                        if let Some(group) = captures.get(1) {
                            return Value::String(group.as_str().to_string());
                        }
                    }
                }
                self.convert_error(
                    type_name,
                    field,
                    &format!("mismatch on validation pattern {re}"),
                );
                Value::String(String::new())
            }
        }
    }

    fn convert_error(&mut self, type_name: &str, field: &str, message: &str) {
        let entry = format!("[{}/{type_name}/{field}] {message}", self.root_orig_id);
        error!("convert: {entry}");
        self.output.errors.push(entry);
    }
}

/// The value a field carries, with the identity pseudo-fields addressable
/// like ordinary properties.
fn field_value(item: &Entity, field: &str) -> Option<Value> {
    match field {
        "@id" => Some(Value::String(item.id.clone())),
        "@type" => Some(Value::Array(
            item.types.iter().cloned().map(Value::String).collect(),
        )),
        _ => item.get(field).cloned(),
    }
}

/// Facet values: a tokenized split of the first raw value, or the
/// transformed value as-is.
fn make_facet(spec: &FacetSpec, raw: Option<&Value>, transformed: Option<&Value>) -> Value {
    if let Some(delim) = &spec.tokenize {
        let Some(first) = as_array(raw).into_iter().next().and_then(Value::as_str) else {
            return json!([]);
        };
        return Value::Array(
            delim.split(first).map(|token| Value::String(token.to_string())).collect(),
        );
    }
    transformed.cloned().unwrap_or_else(|| json!([]))
}

fn facet_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Whether a document slot counts as unset for inheritance: absent, null,
/// or an empty string. An empty array is still a present value.
fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn convert_search(target: &Entity, search: &str) -> Value {
    if search == "lat,lon" {
        let lat = target.first_str("latitude").unwrap_or_default();
        let lon = target.first_str("longitude").unwrap_or_default();
        return Value::String(format!("{lat},{lon}"));
    }
    target.get(search).cloned().unwrap_or(Value::Null)
}

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("static pattern compiles"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(doc: Value) -> GraphModel {
        GraphModel::load(&doc).unwrap()
    }

    fn rules(doc: Value) -> CompiledRules {
        CompiledRules::compile(&doc).unwrap()
    }

    fn two_entity_graph() -> GraphModel {
        graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "@type": "CreativeWork",
                  "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "Example",
                  "author": { "@id": "#alice" },
                  "license": "https://creativecommons.org/licenses/by/4.0" },
                { "@id": "#alice", "@type": "Person", "name": "Alice" }
            ]
        }))
    }

    #[test]
    fn root_document_is_produced_first_with_default_id() {
        let g = two_entity_graph();
        let r = rules(json!({
            "types": { "Dataset": { "@id": { "name": "doi" } } }
        }));
        let output = index(&g, &r, &NoFiles, "fallback-id");

        assert_eq!(output.root_type.as_deref(), Some("Dataset"));
        let datasets = &output.documents["Dataset"];
        assert_eq!(datasets.len(), 1);
        // No named identifier in the record: the default id applies.
        assert_eq!(datasets[0]["id"], json!(["fallback-id"]));
        assert_eq!(datasets[0]["record_type_s"], json!(["Dataset"]));
    }

    #[test]
    fn named_identifier_replaces_root_id() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "identifier": { "@id": "#doi" } },
                { "@id": "#doi", "@type": "PropertyValue",
                  "name": "doi", "value": "10.5/xyz" }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "@id": { "name": "doi" } } }
        }));
        let output = index(&g, &r, &NoFiles, "fallback");
        assert_eq!(output.documents["Dataset"][0]["id"], json!(["10.5/xyz"]));
    }

    #[test]
    fn author_resolution_emits_facet_and_person_document() {
        let g = two_entity_graph();
        let r = rules(json!({
            "types": {
                "Dataset": {
                    "author": {
                        "resolve": { "display": "name", "search": "name", "multi": true },
                        "facet": true, "multi": true
                    }
                },
                "Person": {}
            }
        }));
        let output = index(&g, &r, &NoFiles, "d1");

        let dataset = &output.documents["Dataset"][0];
        let facet = dataset["Dataset_author_facetmulti"].as_array().unwrap();
        assert_eq!(facet.len(), 1);
        let parsed: Value = serde_json::from_str(facet[0].as_str().unwrap()).unwrap();
        assert_eq!(parsed["@id"], "#alice");
        assert_eq!(parsed["display"], "Alice");

        // The id list parallels the resolved values.
        assert_eq!(dataset["author_id"], json!(["#alice"]));

        // The referenced Person was discovered and indexed.
        let people = &output.documents["Person"];
        assert_eq!(people.len(), 1);
        assert_eq!(people[0]["id"], json!(["#alice"]));
    }

    #[test]
    fn fixpoint_indexes_each_entity_once() {
        // Alice is reachable via two chains (author, and contributor) and
        // appears in the graph sweep too; she must be indexed exactly once.
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "author": { "@id": "#alice" },
                  "contributor": { "@id": "#alice" } },
                { "@id": "#alice", "@type": "Person", "name": "Alice" }
            ]
        }));
        let r = rules(json!({
            "types": {
                "Dataset": {
                    "author": { "resolve": "multi" },
                    "contributor": { "resolve": "multi" }
                },
                "Person": {}
            }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(output.documents["Person"].len(), 1);
    }

    #[test]
    fn resolved_entities_bypass_admission_filters() {
        // The Person filter admits nobody, but being referenced is itself
        // sufficient justification.
        let g = two_entity_graph();
        let r = rules(json!({
            "types": {
                "Dataset": { "author": { "resolve": "multi" } },
                "Person": { "name": { "filter": "Nobody" } }
            }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(output.documents["Person"].len(), 1);
    }

    #[test]
    fn unreferenced_entities_respect_admission_filters() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X" },
                { "@id": "#alice", "@type": "Person", "name": "Alice" },
                { "@id": "#bob", "@type": "Person", "name": "Bob" }
            ]
        }));
        let r = rules(json!({
            "types": {
                "Dataset": {},
                "Person": { "name": { "filter": "Alice" } }
            }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        let people = &output.documents["Person"];
        assert_eq!(people.len(), 1);
        assert_eq!(people[0]["id"], json!(["#alice"]));
    }

    #[test]
    fn first_declared_type_wins() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X" },
                { "@id": "#both", "@type": ["Organization", "Person"], "name": "Dual" }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": {}, "Person": {}, "Organization": {} }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        // Person is declared before Organization in the config, so the
        // entity freezes to Person.
        assert_eq!(output.documents["Person"].len(), 1);
        assert_eq!(output.documents["Person"][0]["record_type_s"], json!(["Person"]));
        assert!(!output.documents.contains_key("Organization"));
    }

    #[test]
    fn license_remap_preserves_original() {
        let g = two_entity_graph();
        let r = rules(json!({
            "types": { "Dataset": {} },
            "licenses": {
                "^https://creativecommons.org": "cc",
                "__default__": "private"
            }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        let dataset = &output.documents["Dataset"][0];
        assert_eq!(dataset["license"], json!(["cc"]));
        assert_eq!(
            dataset["licenseOriginal"],
            json!(["https://creativecommons.org/licenses/by/4.0"])
        );
    }

    #[test]
    fn inherit_copies_from_root() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "license": "https://creativecommons.org/licenses/by/4.0",
                  "author": { "@id": "#alice" } },
                { "@id": "#alice", "@type": "Person", "name": "Alice" }
            ]
        }));
        let r = rules(json!({
            "types": {
                "Dataset": { "author": { "resolve": "multi" } },
                "Person": { "license": { "inherit": true } }
            },
            "licenses": { "^https://creativecommons.org": "cc" }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        // Alice has no license of her own; the root's remapped labels are
        // inherited.
        assert_eq!(output.documents["Person"][0]["license"], json!(["cc"]));
    }

    #[test]
    fn skip_drops_the_field() {
        let g = two_entity_graph();
        let r = rules(json!({
            "types": { "Dataset": { "author": { "skip": true } } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert!(!output.documents["Dataset"][0].contains_key("author"));
    }

    #[test]
    fn index_as_renames_the_field() {
        let g = two_entity_graph();
        let r = rules(json!({
            "types": { "Dataset": { "name": { "index_as": "title" } } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        let dataset = &output.documents["Dataset"][0];
        assert_eq!(dataset["title"], json!(["Example"]));
    }

    #[test]
    fn copy_unwraps_references_to_names() {
        let g = two_entity_graph();
        let r = rules(json!({ "types": { "Dataset": {} } }));
        let output = index(&g, &r, &NoFiles, "d1");
        // No config on author: the reference unwraps to the target's name.
        assert_eq!(output.documents["Dataset"][0]["author"], json!(["Alice"]));
    }

    #[test]
    fn date_validation_extracts_the_date() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "datePublished": "Published approx. 2017-06-11 (stamped)" }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "datePublished": { "validate": "date" } } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(output.documents["Dataset"][0]["datePublished"], json!("2017-06-11"));
        assert!(output.errors.is_empty());
    }

    #[test]
    fn failed_validation_leaves_field_empty_but_emits_document() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "datePublished": "sometime last century" }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "datePublished": { "validate": "date" } } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(output.documents["Dataset"][0]["datePublished"], json!(""));
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn regex_validation_extracts_first_capture() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "accession": ["n/a", "code AB-1234 issued"] }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "accession": { "validate": { "re": "[A-Z]+-\\d+" } } } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(output.documents["Dataset"][0]["accession"], json!("AB-1234"));
    }

    #[test]
    fn tokenized_facet_splits_raw_value() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "keywords": "maps, surveys;charts" }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "keywords": {
                "facet": { "tokenize": { "delim": "[,;]\\s*" } }, "multi": true
            } } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(
            output.documents["Dataset"][0]["Dataset_keywords_facetmulti"],
            json!(["maps", "surveys", "charts"])
        );
    }

    #[test]
    fn failed_resolution_yields_empty_value() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "publisher": { "@id": "#missing" } }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "publisher": {
                "resolve": { "display": "name", "search": "name" }
            } } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(output.documents["Dataset"][0]["publisher"], json!(""));
    }

    #[test]
    fn via_chain_with_match_filter() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "about": [
                      { "@id": "http://vocab/anzsrc-for/06" },
                      { "@id": "http://vocab/anzsrc-seo/97" }
                  ] },
                { "@id": "http://vocab/anzsrc-for/06", "@type": "Thing", "name": "Biology" },
                { "@id": "http://vocab/anzsrc-seo/97", "@type": "Thing", "name": "Defence" }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "about": [
                { "match": { "@id": { "re": "anzsrc-for" } },
                  "index_as": "FOR",
                  "resolve": { "display": "name", "search": "name", "multi": true } },
                { "match": { "@id": { "re": "anzsrc-seo" } },
                  "index_as": "SEO",
                  "resolve": { "display": "name", "search": "name", "multi": true } }
            ] } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        let dataset = &output.documents["Dataset"][0];

        let fors = dataset["FOR"].as_array().unwrap();
        assert_eq!(fors.len(), 1);
        let parsed: Value = serde_json::from_str(fors[0].as_str().unwrap()).unwrap();
        assert_eq!(parsed["display"], "Biology");

        assert_eq!(dataset["SEO_id"], json!(["http://vocab/anzsrc-seo/97"]));
    }

    #[test]
    fn load_file_reads_resolved_content() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("notes.txt");
        std::fs::write(&payload, "full text body").unwrap();

        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "mainText": { "@id": "notes.txt" } },
                { "@id": "notes.txt", "@type": "File", "name": "notes" }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "mainText": { "load_file": true } } }
        }));

        let resolver = move |logical: &str| {
            (logical == "notes.txt").then(|| payload.clone())
        };
        let output = index(&g, &r, &resolver, "d1");
        assert_eq!(output.documents["Dataset"][0]["mainText"], json!("full text body"));
    }

    #[test]
    fn unresolvable_file_is_an_accumulated_error() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "mainText": { "@id": "gone.txt" } }
            ]
        }));
        let r = rules(json!({
            "types": { "Dataset": { "mainText": { "load_file": true } } }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(output.documents["Dataset"][0]["mainText"], json!(""));
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn map_all_copies_apply_to_every_document() {
        let g = two_entity_graph();
        let r = rules(json!({
            "map_all": { "name": ["main_search"] },
            "types": { "Dataset": {}, "Person": {} }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        assert_eq!(output.documents["Dataset"][0]["main_search"], json!(["Example"]));
    }

    #[test]
    fn reverse_references_map_through_reverse_config() {
        let g = graph(json!({
            "@graph": [
                { "@id": "ro-crate-metadata.jsonld", "about": { "@id": "./" } },
                { "@id": "./", "@type": "Dataset", "name": "X",
                  "hasMember": { "@id": "#item" } },
                { "@id": "#item", "@type": "RepositoryObject", "name": "Item one" }
            ]
        }));
        let r = rules(json!({
            "types": {
                "Dataset": {},
                "RepositoryObject": {
                    "@reverse": { "hasMember": { "index_as": "memberOf" } }
                }
            }
        }));
        let output = index(&g, &r, &NoFiles, "d1");
        let item = &output.documents["RepositoryObject"][0];
        // The back-edge value is a reference to the root, unwrapped to its
        // name.
        assert_eq!(item["memberOf"], json!(["X"]));
    }
}

