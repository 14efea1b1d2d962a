//! One node of the linked-data graph.

use serde_json::{Map, Value};

/// Normalize a JSON-LD value to a slice of values.
///
/// Properties may hold a scalar, an object, or an array of either; `None`
/// and JSON `null` normalize to the empty list.
pub fn as_array(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Extract the target id from an entity reference (`{ "@id": "..." }`).
pub fn ref_id(value: &Value) -> Option<&str> {
    value.as_object()?.get("@id")?.as_str()
}

/// A graph node: an id, a set of type names, and an arbitrary property map.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: String,
    pub types: Vec<String>,
    pub props: Map<String, Value>,
}

impl Entity {
    /// Build an entity from one `@graph` element. Returns `None` when the
    /// element has no usable `@id`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj.get("@id")?.as_str()?.to_string();
        let types = as_array(obj.get("@type"))
            .into_iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let props = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "@id" && k.as_str() != "@type")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(Self { id, types, props })
    }

    /// Array-normalized values of a property.
    pub fn values(&self, prop: &str) -> Vec<&Value> {
        as_array(self.props.get(prop))
    }

    /// The raw value of a property, if present.
    pub fn get(&self, prop: &str) -> Option<&Value> {
        self.props.get(prop)
    }

    /// First string value of a property.
    pub fn first_str(&self, prop: &str) -> Option<&str> {
        self.values(prop).into_iter().find_map(Value::as_str)
    }

    /// The entity's display name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.first_str("name")
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t == type_name)
    }

    /// Re-serialize the entity as a JSON object, `@id` and `@type` included.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("@id".into(), Value::String(self.id.clone()));
        obj.insert(
            "@type".into(),
            Value::Array(self.types.iter().cloned().map(Value::String).collect()),
        );
        for (k, v) in &self.props {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}
