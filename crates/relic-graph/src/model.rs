//! The loaded graph: indexes and traversal.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::entity::{as_array, ref_id, Entity};
use crate::error::{GraphError, GraphResult};

/// Filenames that mark the metadata-descriptor entity pointing at the root.
const DESCRIPTOR_IDS: &[&str] = &["ro-crate-metadata.json", "ro-crate-metadata.jsonld"];

/// One back-edge in the reverse-reference index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReverseRef {
    /// Id of the entity holding the reference.
    pub source: String,
    /// Property the reference appears under.
    pub property: String,
}

/// One step of a reference-resolution chain: follow `property` references,
/// keeping only targets admitted by `filter` when one is given.
pub struct Hop<'a> {
    pub property: &'a str,
    pub filter: Option<&'a dyn Fn(&Entity) -> bool>,
}

impl<'a> Hop<'a> {
    pub fn new(property: &'a str) -> Self {
        Self { property, filter: None }
    }

    pub fn filtered(property: &'a str, filter: &'a dyn Fn(&Entity) -> bool) -> Self {
        Self { property, filter: Some(filter) }
    }
}

/// An object's linked-data graph, indexed for lookup and traversal.
pub struct GraphModel {
    entities: Vec<Entity>,
    by_id: HashMap<String, usize>,
    by_type: HashMap<String, Vec<usize>>,
    reverse: HashMap<String, Vec<ReverseRef>>,
    root: usize,
}

impl GraphModel {
    /// Load a graph document (`{ "@graph": [ ... ] }`), build the id and
    /// reverse-reference indexes, and identify the root entity.
    pub fn load(json: &Value) -> GraphResult<Self> {
        let graph = json
            .get("@graph")
            .and_then(Value::as_array)
            .ok_or_else(|| GraphError::Malformed("missing @graph array".into()))?;

        let mut entities: Vec<Entity> = Vec::with_capacity(graph.len());
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for element in graph {
            let Some(entity) = Entity::from_value(element) else {
                warn!("skipping graph element without @id");
                continue;
            };
            if by_id.contains_key(&entity.id) {
                warn!(id = %entity.id, "duplicate entity id; keeping first");
                continue;
            }
            by_id.insert(entity.id.clone(), entities.len());
            entities.push(entity);
        }

        let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entity) in entities.iter().enumerate() {
            for type_name in &entity.types {
                by_type.entry(type_name.clone()).or_default().push(idx);
            }
        }

        // Back-edges: one entry per reference value whose target is in the
        // graph.
        let mut reverse: HashMap<String, Vec<ReverseRef>> = HashMap::new();
        for entity in &entities {
            for (prop, value) in &entity.props {
                for v in as_array(Some(value)) {
                    if let Some(target) = ref_id(v) {
                        if by_id.contains_key(target) {
                            reverse.entry(target.to_string()).or_default().push(ReverseRef {
                                source: entity.id.clone(),
                                property: prop.clone(),
                            });
                        }
                    }
                }
            }
        }

        let root = find_root(&entities, &by_id)?;
        debug!(entities = entities.len(), root = %entities[root].id, "graph loaded");

        Ok(Self { entities, by_id, by_type, reverse, root })
    }

    /// Look an entity up by id.
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.by_id.get(id).map(|&i| &self.entities[i])
    }

    /// The distinguished root entity.
    pub fn root(&self) -> &Entity {
        &self.entities[self.root]
    }

    /// All entities, in graph declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities declaring a type, in graph declaration order.
    pub fn of_type(&self, type_name: &str) -> Vec<&Entity> {
        self.by_type
            .get(type_name)
            .map(|indexes| indexes.iter().map(|&i| &self.entities[i]).collect())
            .unwrap_or_default()
    }

    /// Back-edges pointing at `id`.
    pub fn reverse_refs(&self, id: &str) -> &[ReverseRef] {
        self.reverse.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Back-edges pointing at `id`, grouped by the referencing property.
    /// Each group's values are `{ "@id": source }` references, mirroring the
    /// forward reference shape.
    pub fn reverse_values(&self, id: &str) -> Vec<(String, Vec<Value>)> {
        let mut grouped: Vec<(String, Vec<Value>)> = Vec::new();
        for back in self.reverse_refs(id) {
            let reference = serde_json::json!({ "@id": back.source });
            match grouped.iter_mut().find(|(p, _)| p == &back.property) {
                Some((_, refs)) => refs.push(reference),
                None => grouped.push((back.property.clone(), vec![reference])),
            }
        }
        grouped
    }

    /// Look up a named identifier on the root entity: an `identifier`
    /// reference to a `PropertyValue` whose `name` matches `namespace`
    /// yields that entity's `value`.
    pub fn named_identifier(&self, namespace: &str) -> Option<String> {
        for value in self.root().values("identifier") {
            let Some(target) = ref_id(value).and_then(|id| self.get(id)) else {
                continue;
            };
            if target.has_type("PropertyValue") && target.name() == Some(namespace) {
                if let Some(v) = target.first_str("value") {
                    return Some(v.to_string());
                }
            }
        }
        None
    }

    /// Resolve a reference chain from `start` through `hops`, returning the
    /// entities reached at the end of the chain.
    ///
    /// At each hop, every reference value of the hop's property is followed;
    /// non-reference values and dangling references are skipped. A hop's
    /// filter prunes targets before the next hop runs.
    pub fn resolve_chain<'g>(&'g self, start: &'g Entity, hops: &[Hop<'_>]) -> Vec<&'g Entity> {
        let mut current: Vec<&Entity> = vec![start];
        for hop in hops {
            let mut next: Vec<&Entity> = Vec::new();
            for entity in &current {
                for value in entity.values(hop.property) {
                    let Some(target) = ref_id(value).and_then(|id| self.get(id)) else {
                        continue;
                    };
                    if hop.filter.map_or(true, |f| f(target)) {
                        next.push(target);
                    }
                }
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        // The start entity is only a seed; an empty hop list resolves to
        // nothing rather than to itself.
        if hops.is_empty() {
            Vec::new()
        } else {
            current
        }
    }
}

impl std::fmt::Debug for GraphModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphModel")
            .field("entities", &self.entities.len())
            .field("root", &self.entities[self.root].id)
            .finish()
    }
}

fn find_root(entities: &[Entity], by_id: &HashMap<String, usize>) -> GraphResult<usize> {
    for entity in entities {
        let is_descriptor = DESCRIPTOR_IDS.iter().any(|d| entity.id.ends_with(d));
        if !is_descriptor {
            continue;
        }
        for about in entity.values("about") {
            if let Some(idx) = ref_id(about).and_then(|id| by_id.get(id)) {
                return Ok(*idx);
            }
        }
    }
    Err(GraphError::NoRootFound)
}
