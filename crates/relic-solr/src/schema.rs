//! Schema management against the Solr schema API.
//!
//! All operations are idempotent from the caller's point of view:
//! [`SolrClient::ensure_field`] checks for an existing definition and issues
//! an add or a replace accordingly. Copy-fields have no replace operation in
//! the schema API, so they are handled as a best-effort delete followed by an
//! add, where a `400` on the delete means the copy-field did not exist yet.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::{check_status, SolrClient};
use crate::error::{SolrError, SolrResult};

/// The kinds of schema entries the bridge manages.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Field,
    DynamicField,
    CopyField,
}

impl FieldKind {
    /// Parse a schema-document section key.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "field" => Some(Self::Field),
            "dynamicfield" | "dynamic-field" => Some(Self::DynamicField),
            "copyfield" | "copy-field" => Some(Self::CopyField),
            _ => None,
        }
    }

    fn lookup_segment(self) -> &'static str {
        match self {
            Self::Field => "fields",
            Self::DynamicField => "dynamicfields",
            Self::CopyField => "copyfields",
        }
    }

    fn add_op(self) -> &'static str {
        match self {
            Self::Field => "add-field",
            Self::DynamicField => "add-dynamic-field",
            Self::CopyField => "add-copy-field",
        }
    }

    fn replace_op(self) -> &'static str {
        match self {
            Self::Field => "replace-field",
            Self::DynamicField => "replace-dynamic-field",
            // No replace-copy-field exists; callers go through delete+add.
            Self::CopyField => "add-copy-field",
        }
    }
}

/// Build a full schema document from a base document plus generated
/// copy-fields feeding the `main_search` catch-all from each configured
/// source field.
pub fn build_schema(base: &Value, main_search_fields: &[String]) -> Value {
    let mut schema = base.clone();
    let copyfields: Vec<Value> = main_search_fields
        .iter()
        .map(|source| json!({ "source": source, "dest": ["main_search"] }))
        .collect();
    schema["copyfield"] = Value::Array(copyfields);
    schema
}

impl SolrClient {
    /// Whether a named field/dynamic-field already exists in the schema.
    pub async fn field_exists(&self, kind: FieldKind, name: &str) -> SolrResult<bool> {
        let url = self.url(&format!("/schema/{}/{}", kind.lookup_segment(), name));
        let resp = self.http().get(&url).send().await?;
        match resp.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(SolrError::Status { status, body })
            }
        }
    }

    /// Best-effort removal of a copy-field. Returns `true` if one was
    /// deleted; a `400` or `404` response means it did not exist and is not
    /// an error.
    pub async fn try_delete_copy_field(&self, spec: &Value) -> SolrResult<bool> {
        let body = json!({
            "delete-copy-field": {
                "source": spec.get("source").cloned().unwrap_or(Value::Null),
                "dest": spec.get("dest").cloned().unwrap_or(Value::Null),
            }
        });
        let resp = self.http().post(&self.url("/schema")).json(&body).send().await?;
        match resp.status().as_u16() {
            200 => Ok(true),
            400 | 404 => {
                debug!("copy-field delete rejected; treating as not present");
                Ok(false)
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(SolrError::Status { status, body })
            }
        }
    }

    /// Add or replace one schema entry.
    pub async fn ensure_field(&self, kind: FieldKind, spec: &Value) -> SolrResult<()> {
        let op = if kind == FieldKind::CopyField {
            self.try_delete_copy_field(spec).await?;
            kind.add_op()
        } else {
            let name = spec
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| SolrError::Unexpected("schema entry without a name".into()))?;
            if self.field_exists(kind, name).await? {
                debug!(name, "replacing schema field");
                kind.replace_op()
            } else {
                debug!(name, "adding schema field");
                kind.add_op()
            }
        };

        let body = json!({ op: spec });
        let resp = self.http().post(&self.url("/schema")).json(&body).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Apply a whole schema document, section by section.
    ///
    /// The document maps section keys (`field`, `dynamicfield`, `copyfield`)
    /// to arrays of entry specs; unknown sections are skipped with a warning.
    pub async fn update_schema(&self, schema: &Value) -> SolrResult<()> {
        let Some(sections) = schema.as_object() else {
            return Err(SolrError::Unexpected("schema document is not an object".into()));
        };
        for (key, entries) in sections {
            let Some(kind) = FieldKind::from_key(key) else {
                warn!(section = %key, "skipping unknown schema section");
                continue;
            };
            let Some(entries) = entries.as_array() else {
                warn!(section = %key, "schema section is not an array");
                continue;
            };
            for spec in entries {
                self.ensure_field(kind, spec).await?;
            }
        }
        Ok(())
    }
}
