//! License remapping.
//!
//! Raw license values on the root record (URLs, or references to license
//! entities) are mapped to a small set of access labels through an ordered
//! rule table. The unmapped originals are preserved by the indexer under a
//! separate field.

use regex::Regex;
use serde_json::Value;

use crate::error::{IndexError, IndexResult};

/// Key of the fallback label in the configuration.
const DEFAULT_KEY: &str = "__default__";

/// Compiled license rule table: a pure function over a raw license list.
#[derive(Debug, Default)]
pub struct LicenseMap {
    rules: Vec<(Regex, String)>,
    default: Option<String>,
}

impl LicenseMap {
    /// Compile the `licenses` section: a pattern → label map with an
    /// optional `__default__` entry. Rules fire in declaration order.
    /// A missing section compiles to a map that returns no labels.
    pub fn from_value(section: Option<&Value>) -> IndexResult<Self> {
        let Some(section) = section else {
            return Ok(Self::default());
        };
        let obj = section
            .as_object()
            .ok_or_else(|| IndexError::Config("licenses section is not an object".into()))?;

        let mut map = Self::default();
        for (pattern, label) in obj {
            let label = label
                .as_str()
                .ok_or_else(|| {
                    IndexError::Config(format!("license label for {pattern:?} is not a string"))
                })?
                .to_string();
            if pattern == DEFAULT_KEY {
                map.default = Some(label);
            } else {
                let re = Regex::new(pattern).map_err(|source| IndexError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                map.rules.push((re, label));
            }
        }
        Ok(map)
    }

    /// Map raw license values to deduplicated labels.
    ///
    /// Entity references are unwrapped to their id string; every matching
    /// rule contributes its label. An empty result falls back to the
    /// default label when one is configured.
    pub fn map(&self, raw: &[&Value]) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for value in raw {
            let Some(license) = license_string(value) else {
                continue;
            };
            for (re, label) in &self.rules {
                if re.is_match(license) && !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }
        if labels.is_empty() {
            return self.default.iter().cloned().collect();
        }
        labels
    }
}

/// A raw license entry is either a string or a `{ "@id": ... }` reference.
fn license_string(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(obj) => obj.get("@id").and_then(Value::as_str),
        _ => None,
    }
}
