//! The typed form of the field-mapping configuration.
//!
//! The configuration arrives as a JSON document keyed by type name, each
//! value a map of field name → rule. Rules in the wild are duck-typed
//! property bags; parsing turns each one into a closed sum
//! ([`Transform`]) plus shared flags, compiling every configured pattern
//! exactly once. Invalid patterns and malformed rules fail the whole
//! configuration; nothing is compiled lazily during indexing.

use regex::Regex;
use serde_json::Value;

use crate::error::{IndexError, IndexResult};

/// The value transform a rule applies.
#[derive(Debug)]
pub enum Transform {
    /// Copy the (array-normalized, reference-unwrapped) value.
    Copy { escaped_json: bool },
    /// Drop the field entirely.
    Skip,
    /// Replace the value with the content of the file it references.
    LoadFile,
    /// Flatten a reference chain into searchable values.
    Resolve(ResolveSpec),
    /// Copy, then extract a validated form of the value.
    Validate(ValidateSpec),
}

/// Reference-chain resolution: follow `field`, then each `via` hop, and
/// flatten the targets into `{id, display, search}` triples.
#[derive(Debug)]
pub struct ResolveSpec {
    /// Additional hops after the field's own references.
    pub via: Vec<String>,
    /// Property of the target used as the display value.
    pub display: String,
    /// Property of the target used as the search value; the special
    /// spelling `lat,lon` renders a geopoint.
    pub search: String,
    /// Whether the field keeps every resolved value or just the first.
    pub multi: bool,
}

/// Validation transforms.
#[derive(Debug)]
pub enum ValidateSpec {
    /// Extract the first `YYYY-MM-DD`-shaped substring.
    Date,
    /// Extract the first capture group of the pattern. A pattern without a
    /// group is wrapped in one at compile time.
    Re(Regex),
}

/// Facet emission for a field.
#[derive(Debug)]
pub struct FacetSpec {
    /// Split the first raw value on this delimiter instead of using the
    /// transformed value.
    pub tokenize: Option<Regex>,
}

/// A single admission condition.
#[derive(Debug)]
pub enum Condition {
    Eq(String),
    Re(Regex),
    IsRoot,
}

/// Admission filter attached to a field: all conditions must hold.
#[derive(Debug)]
pub enum FilterSpec {
    /// Match the candidate itself against one condition (bare-string and
    /// bare-regex configs).
    Value(Condition),
    /// Match named fields of the candidate.
    Fields(Vec<(String, Condition)>),
}

/// One rule: a transform plus the shared flags.
#[derive(Debug)]
pub struct FieldRule {
    pub transform: Transform,
    pub filter: Option<FilterSpec>,
    /// Secondary filter for array alternatives, applied to resolution
    /// targets.
    pub match_filter: Option<FilterSpec>,
    pub facet: Option<FacetSpec>,
    pub index_as: Option<String>,
    pub multi: bool,
    pub inherit: bool,
}

/// A field with one rule, or several alternatives (each with its own
/// `match` and `index_as`).
#[derive(Debug)]
pub struct FieldConfig {
    pub field: String,
    pub alternatives: Vec<FieldRule>,
}

impl FieldConfig {
    pub fn is_alternatives(&self) -> bool {
        self.alternatives.len() > 1
    }

    /// The single rule of a non-alternative field.
    pub fn rule(&self) -> &FieldRule {
        &self.alternatives[0]
    }
}

/// Configuration for one type, fields in declaration order.
#[derive(Debug)]
pub struct TypeConfig {
    pub name: String,
    /// Namespace of the named identifier replacing the root entity's id.
    pub id_namespace: Option<String>,
    pub fields: Vec<FieldConfig>,
    /// Rules applied to reverse-reference values (the `@reverse` section).
    pub reverse: Vec<FieldConfig>,
}

impl TypeConfig {
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.field == name)
    }

    pub fn reverse_field(&self, name: &str) -> Option<&FieldConfig> {
        self.reverse.iter().find(|f| f.field == name)
    }
}

/// The whole mapping document in typed form. Declaration order of types
/// and fields is preserved: type admission tries types in this order.
#[derive(Debug, Default)]
pub struct MappingConfig {
    /// Copies applied to every document: source field → target fields.
    pub map_all: Vec<(String, Vec<String>)>,
    pub types: Vec<TypeConfig>,
    /// Raw license section, compiled separately by
    /// [`crate::licenses::LicenseMap`].
    pub licenses: Option<Value>,
}

impl MappingConfig {
    pub fn type_config(&self, name: &str) -> Option<&TypeConfig> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name == name)
    }

    /// Parse the JSON mapping document.
    ///
    /// Fails on the first malformed rule, on any invalid pattern, and on
    /// the ambiguous "licence" spelling (all offending types enumerated).
    pub fn from_value(doc: &Value) -> IndexResult<Self> {
        let obj = doc
            .as_object()
            .ok_or_else(|| IndexError::Config("mapping document is not an object".into()))?;

        let mut config = MappingConfig {
            licenses: obj.get("licenses").cloned(),
            ..Default::default()
        };

        if let Some(map_all) = obj.get("map_all") {
            let map_all = map_all
                .as_object()
                .ok_or_else(|| IndexError::Config("map_all is not an object".into()))?;
            for (field, targets) in map_all {
                config.map_all.push((field.clone(), string_list(targets)));
            }
        }

        let types = obj
            .get("types")
            .and_then(Value::as_object)
            .ok_or_else(|| IndexError::Config("missing types section".into()))?;

        let mut misspelled: Vec<String> = Vec::new();
        for (type_name, type_value) in types {
            let type_config = parse_type(type_name, type_value, &mut misspelled)?;
            config.types.push(type_config);
        }
        if !misspelled.is_empty() {
            return Err(IndexError::LicenceSpelling(misspelled.join(", ")));
        }

        Ok(config)
    }
}

fn parse_type(
    name: &str,
    value: &Value,
    misspelled: &mut Vec<String>,
) -> IndexResult<TypeConfig> {
    let fields_obj = value
        .as_object()
        .ok_or_else(|| IndexError::Config(format!("type {name} is not an object")))?;

    let mut config = TypeConfig {
        name: name.to_string(),
        id_namespace: None,
        fields: Vec::new(),
        reverse: Vec::new(),
    };

    for (field, rule_value) in fields_obj {
        match field.as_str() {
            "@id" => {
                config.id_namespace = rule_value
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            "@reverse" => {
                let reverse = rule_value.as_object().ok_or_else(|| {
                    IndexError::Config(format!("@reverse of type {name} is not an object"))
                })?;
                for (rfield, rvalue) in reverse {
                    config.reverse.push(parse_field(name, rfield, rvalue)?);
                }
            }
            "licence" => {
                misspelled.push(name.to_string());
            }
            _ => config.fields.push(parse_field(name, field, rule_value)?),
        }
    }

    Ok(config)
}

fn parse_field(type_name: &str, field: &str, value: &Value) -> IndexResult<FieldConfig> {
    let context = || format!("{type_name}.{field}");

    let alternatives = match value {
        Value::Array(alts) => {
            let mut rules = Vec::with_capacity(alts.len());
            for alt in alts {
                let rule = parse_rule(alt, &context())?;
                if rule.index_as.is_none() {
                    return Err(IndexError::Config(format!(
                        "{}: alternatives must each set index_as",
                        context()
                    )));
                }
                rules.push(rule);
            }
            if rules.is_empty() {
                return Err(IndexError::Config(format!("{}: empty alternatives", context())));
            }
            rules
        }
        other => vec![parse_rule(other, &context())?],
    };

    Ok(FieldConfig { field: field.to_string(), alternatives })
}

fn parse_rule(value: &Value, context: &str) -> IndexResult<FieldRule> {
    let obj = value
        .as_object()
        .ok_or_else(|| IndexError::Config(format!("{context}: rule is not an object")))?;

    let transform = if truthy(obj.get("skip")) {
        Transform::Skip
    } else if truthy(obj.get("load_file")) {
        Transform::LoadFile
    } else if let Some(resolve) = obj.get("resolve") {
        Transform::Resolve(parse_resolve(resolve, context)?)
    } else if let Some(validate) = obj.get("validate") {
        Transform::Validate(parse_validate(validate, context)?)
    } else {
        Transform::Copy { escaped_json: truthy(obj.get("escapedJSON")) }
    };

    let facet = match obj.get("facet") {
        None | Some(Value::Bool(false)) | Some(Value::Null) => None,
        Some(Value::Bool(true)) => Some(FacetSpec { tokenize: None }),
        Some(spec) => {
            let tokenize = match spec.get("tokenize").and_then(|t| t.get("delim")) {
                Some(delim) => {
                    let pattern = delim.as_str().ok_or_else(|| {
                        IndexError::Config(format!("{context}: tokenize delim is not a string"))
                    })?;
                    Some(compile_pattern(pattern)?)
                }
                None => None,
            };
            Some(FacetSpec { tokenize })
        }
    };

    Ok(FieldRule {
        transform,
        filter: obj.get("filter").map(|f| parse_filter(f, context)).transpose()?,
        match_filter: obj.get("match").map(|f| parse_filter(f, context)).transpose()?,
        facet,
        index_as: obj.get("index_as").and_then(Value::as_str).map(str::to_string),
        multi: truthy(obj.get("multi")),
        inherit: truthy(obj.get("inherit")),
    })
}

fn parse_resolve(value: &Value, context: &str) -> IndexResult<ResolveSpec> {
    match value {
        // The bare "multi" spelling: multi-valued resolve with name as
        // both display and search.
        Value::String(s) if s == "multi" => Ok(ResolveSpec {
            via: Vec::new(),
            display: "name".into(),
            search: "name".into(),
            multi: true,
        }),
        Value::Object(obj) => {
            let search = obj
                .get("search")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    IndexError::Config(format!("{context}: resolve config has no search value"))
                })?
                .to_string();
            let display = obj
                .get("display")
                .and_then(Value::as_str)
                .unwrap_or("name")
                .to_string();
            let mut via = Vec::new();
            for hop in obj.get("via").and_then(Value::as_array).into_iter().flatten() {
                // Hops are written either as { "property": "x" } or as the
                // bare property name.
                let property = hop
                    .get("property")
                    .and_then(Value::as_str)
                    .or_else(|| hop.as_str())
                    .ok_or_else(|| {
                        IndexError::Config(format!("{context}: via hop has no property"))
                    })?;
                via.push(property.to_string());
            }
            Ok(ResolveSpec { via, display, search, multi: truthy(obj.get("multi")) })
        }
        other => Err(IndexError::Config(format!(
            "{context}: unrecognized resolve config {other}"
        ))),
    }
}

fn parse_validate(value: &Value, context: &str) -> IndexResult<ValidateSpec> {
    match value {
        Value::String(s) if s == "date" => Ok(ValidateSpec::Date),
        Value::Object(obj) => {
            let pattern = obj.get("re").and_then(Value::as_str).ok_or_else(|| {
                IndexError::Config(format!("{context}: validate object has no re"))
            })?;
            // Ensure the pattern extracts something.
            let grouped = if pattern.contains('(') {
                pattern.to_string()
            } else {
                format!("({pattern})")
            };
            Ok(ValidateSpec::Re(compile_pattern(&grouped)?))
        }
        other => Err(IndexError::Config(format!(
            "{context}: unknown validation type {other}"
        ))),
    }
}

fn parse_filter(value: &Value, context: &str) -> IndexResult<FilterSpec> {
    match value {
        Value::String(s) => Ok(FilterSpec::Value(Condition::Eq(s.clone()))),
        Value::Object(obj) => {
            // A bare condition ({re} or {is_root}) rather than a map of
            // field conditions.
            if let Some(re) = obj.get("re").and_then(Value::as_str) {
                return Ok(FilterSpec::Value(Condition::Re(compile_pattern(re)?)));
            }
            if truthy(obj.get("is_root")) {
                return Ok(FilterSpec::Value(Condition::IsRoot));
            }
            let mut conditions = Vec::new();
            for (field, cond) in obj {
                conditions.push((field.clone(), parse_condition(cond, context)?));
            }
            Ok(FilterSpec::Fields(conditions))
        }
        other => Err(IndexError::Config(format!("{context}: unknown filter {other}"))),
    }
}

fn parse_condition(value: &Value, context: &str) -> IndexResult<Condition> {
    match value {
        Value::String(s) => Ok(Condition::Eq(s.clone())),
        Value::Object(obj) => {
            if let Some(re) = obj.get("re").and_then(Value::as_str) {
                Ok(Condition::Re(compile_pattern(re)?))
            } else if truthy(obj.get("is_root")) {
                Ok(Condition::IsRoot)
            } else {
                Err(IndexError::Config(format!("{context}: unknown filter condition {value}")))
            }
        }
        other => Err(IndexError::Config(format!("{context}: unknown filter condition {other}"))),
    }
}

fn compile_pattern(pattern: &str) -> IndexResult<Regex> {
    Regex::new(pattern).map_err(|source| IndexError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
