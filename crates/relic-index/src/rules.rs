//! Compiled rules: admission predicates, secondary match filters, and the
//! facet-name table.
//!
//! [`CompiledRules::compile`] is the single entry point turning the raw
//! mapping document into everything the indexer consults. All patterns are
//! compiled here, never during indexing.

use std::collections::HashMap;

use relic_graph::Entity;
use serde_json::Value;

use crate::config::{Condition, FieldRule, FilterSpec, MappingConfig, Transform, TypeConfig};
use crate::error::IndexResult;
use crate::licenses::LicenseMap;

/// Precomputed facet output field for one `(type, index_as)` pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FacetField {
    /// `{type}_{index_as}_facet` or `..._facetmulti`.
    pub name: String,
    /// Whether facet values are full resolved JSON objects rather than
    /// plain display strings.
    pub json: bool,
}

/// The compiled configuration.
#[derive(Debug)]
pub struct CompiledRules {
    pub config: MappingConfig,
    pub licenses: LicenseMap,
    /// type → index_as → facet output field.
    facets: HashMap<String, HashMap<String, FacetField>>,
}

impl CompiledRules {
    /// Parse and compile the mapping document.
    pub fn compile(doc: &Value) -> IndexResult<Self> {
        let config = MappingConfig::from_value(doc)?;
        let licenses = LicenseMap::from_value(config.licenses.as_ref())?;

        let mut facets: HashMap<String, HashMap<String, FacetField>> = HashMap::new();
        for type_config in &config.types {
            for field_config in type_config.fields.iter().chain(&type_config.reverse) {
                for rule in &field_config.alternatives {
                    if rule.facet.is_none() {
                        continue;
                    }
                    let facet_as =
                        rule.index_as.clone().unwrap_or_else(|| field_config.field.clone());
                    facets.entry(type_config.name.clone()).or_default().insert(
                        facet_as.clone(),
                        FacetField {
                            name: facet_field_name(&type_config.name, &facet_as, rule),
                            json: matches!(rule.transform, Transform::Resolve(_)),
                        },
                    );
                }
            }
        }

        Ok(Self { config, licenses, facets })
    }

    /// The admission predicate for a type: every configured field filter
    /// must hold. A type with no filters admits everything.
    pub fn admits(&self, type_config: &TypeConfig, entity: &Entity, root_id: &str) -> bool {
        type_config.fields.iter().all(|field_config| {
            // Alternative arrays carry match filters for resolution, not
            // admission filters.
            if field_config.is_alternatives() {
                return true;
            }
            match &field_config.rule().filter {
                Some(spec) => filter_matches(spec, &field_config.field, entity, root_id),
                None => true,
            }
        })
    }

    /// The secondary predicate compiled from an alternative's `match`
    /// clause, looked up by `(type, index_as)` during reference
    /// resolution.
    pub fn item_filter(&self, type_name: &str, index_as: &str) -> Option<&FilterSpec> {
        let type_config = self.config.type_config(type_name)?;
        for field_config in type_config.fields.iter().chain(&type_config.reverse) {
            for rule in &field_config.alternatives {
                if rule.index_as.as_deref() == Some(index_as) {
                    if let Some(filter) = &rule.match_filter {
                        return Some(filter);
                    }
                }
            }
        }
        None
    }

    /// Facet output field for a `(type, index_as)` pair.
    pub fn facet_field(&self, type_name: &str, index_as: &str) -> Option<&FacetField> {
        self.facets.get(type_name)?.get(index_as)
    }
}

fn facet_field_name(type_name: &str, facet_as: &str, rule: &FieldRule) -> String {
    let multi = rule.multi
        || matches!(&rule.transform, Transform::Resolve(spec) if spec.multi);
    let suffix = if multi { "facetmulti" } else { "facet" };
    format!("{type_name}_{facet_as}_{suffix}")
}

/// Evaluate a filter against an entity.
///
/// A bare-value filter matches the named field's content; a field map
/// requires every named field to match its condition.
pub fn filter_matches(spec: &FilterSpec, field: &str, entity: &Entity, root_id: &str) -> bool {
    match spec {
        FilterSpec::Value(cond) => condition_matches(cond, field, entity, root_id),
        FilterSpec::Fields(conds) => conds
            .iter()
            .all(|(f, cond)| condition_matches(cond, f, entity, root_id)),
    }
}

fn condition_matches(cond: &Condition, field: &str, entity: &Entity, root_id: &str) -> bool {
    match cond {
        Condition::IsRoot => entity.id == root_id,
        Condition::Eq(target) => field_strings(entity, field).any(|v| v == target),
        Condition::Re(re) => field_strings(entity, field).any(|v| re.is_match(v)),
    }
}

/// String values of an entity field, with `@id` and `@type` addressable
/// like ordinary fields.
fn field_strings<'e>(entity: &'e Entity, field: &str) -> Box<dyn Iterator<Item = &'e str> + 'e> {
    match field {
        "@id" => Box::new(std::iter::once(entity.id.as_str())),
        "@type" => Box::new(entity.types.iter().map(String::as_str)),
        _ => Box::new(entity.values(field).into_iter().filter_map(Value::as_str)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        Entity::from_value(&value).unwrap()
    }

    #[test]
    fn facet_field_names_follow_multiplicity() {
        let rules = CompiledRules::compile(&json!({
            "types": {
                "Dataset": {
                    "keywords": { "facet": true, "multi": true },
                    "publisher": { "facet": true }
                }
            }
        }))
        .unwrap();

        assert_eq!(
            rules.facet_field("Dataset", "keywords").unwrap().name,
            "Dataset_keywords_facetmulti"
        );
        assert_eq!(
            rules.facet_field("Dataset", "publisher").unwrap().name,
            "Dataset_publisher_facet"
        );
        assert!(rules.facet_field("Dataset", "name").is_none());
        assert!(rules.facet_field("Person", "keywords").is_none());
    }

    #[test]
    fn multi_resolve_makes_a_facetmulti() {
        let rules = CompiledRules::compile(&json!({
            "types": {
                "Dataset": {
                    "author": { "facet": true, "resolve": "multi" }
                }
            }
        }))
        .unwrap();
        let facet = rules.facet_field("Dataset", "author").unwrap();
        assert_eq!(facet.name, "Dataset_author_facetmulti");
        assert!(facet.json);
    }

    #[test]
    fn index_as_renames_the_facet() {
        let rules = CompiledRules::compile(&json!({
            "types": {
                "Dataset": {
                    "about": [
                        { "match": { "@id": { "re": "anzsrc-for" } },
                          "index_as": "FOR", "facet": true, "multi": true }
                    ]
                }
            }
        }))
        .unwrap();
        assert_eq!(
            rules.facet_field("Dataset", "FOR").unwrap().name,
            "Dataset_FOR_facetmulti"
        );
    }

    #[test]
    fn admission_with_no_filters_admits_everything() {
        let rules = CompiledRules::compile(&json!({
            "types": { "Person": { "name": {} } }
        }))
        .unwrap();
        let t = rules.config.type_config("Person").unwrap();
        let e = entity(json!({ "@id": "#p", "@type": "Person" }));
        assert!(rules.admits(t, &e, "./"));
    }

    #[test]
    fn admission_equality_filter() {
        let rules = CompiledRules::compile(&json!({
            "types": { "Person": { "status": { "filter": "active" } } }
        }))
        .unwrap();
        let t = rules.config.type_config("Person").unwrap();

        let active = entity(json!({ "@id": "#a", "status": "active" }));
        let retired = entity(json!({ "@id": "#b", "status": "retired" }));
        let listed = entity(json!({ "@id": "#c", "status": ["retired", "active"] }));
        let missing = entity(json!({ "@id": "#d" }));

        assert!(rules.admits(t, &active, "./"));
        assert!(!rules.admits(t, &retired, "./"));
        // Array-valued content matches if any element matches.
        assert!(rules.admits(t, &listed, "./"));
        assert!(!rules.admits(t, &missing, "./"));
    }

    #[test]
    fn admission_regex_filter() {
        let rules = CompiledRules::compile(&json!({
            "types": { "Person": { "@id": { "filter": { "re": "^#local-" } } } }
        }))
        .unwrap();
        let t = rules.config.type_config("Person").unwrap();

        assert!(rules.admits(t, &entity(json!({ "@id": "#local-1" })), "./"));
        assert!(!rules.admits(t, &entity(json!({ "@id": "http://x" })), "./"));
    }

    #[test]
    fn admission_is_root_filter() {
        let rules = CompiledRules::compile(&json!({
            "types": { "Dataset": { "name": { "filter": { "is_root": true } } } }
        }))
        .unwrap();
        let t = rules.config.type_config("Dataset").unwrap();

        let root = entity(json!({ "@id": "./", "name": "root" }));
        let other = entity(json!({ "@id": "#sub", "name": "sub" }));
        assert!(rules.admits(t, &root, "./"));
        assert!(!rules.admits(t, &other, "./"));
    }

    #[test]
    fn all_field_filters_must_hold() {
        let rules = CompiledRules::compile(&json!({
            "types": { "Person": {
                "status": { "filter": "active" },
                "@type": { "filter": { "re": "Person" } }
            } }
        }))
        .unwrap();
        let t = rules.config.type_config("Person").unwrap();

        let both = entity(json!({ "@id": "#a", "@type": "Person", "status": "active" }));
        let one = entity(json!({ "@id": "#b", "@type": "Person", "status": "retired" }));
        assert!(rules.admits(t, &both, "./"));
        assert!(!rules.admits(t, &one, "./"));
    }

    #[test]
    fn item_filter_lookup_by_index_as() {
        let rules = CompiledRules::compile(&json!({
            "types": { "Dataset": { "about": [
                { "match": { "@id": { "re": "anzsrc-for" } }, "index_as": "FOR" },
                { "match": { "@id": { "re": "anzsrc-seo" } }, "index_as": "SEO" }
            ] } }
        }))
        .unwrap();

        let filter = rules.item_filter("Dataset", "FOR").unwrap();
        let for_entity = entity(json!({ "@id": "http://x/anzsrc-for/06" }));
        let seo_entity = entity(json!({ "@id": "http://x/anzsrc-seo/97" }));
        assert!(filter_matches(filter, "about", &for_entity, "./"));
        assert!(!filter_matches(filter, "about", &seo_entity, "./"));

        assert!(rules.item_filter("Dataset", "nothing").is_none());
    }
}
