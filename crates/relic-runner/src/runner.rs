//! The index runner proper.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use relic_graph::GraphModel;
use relic_index::{CompiledRules, Document, IndexOutput};
use relic_solr::{build_schema, SolrClient};

use crate::config::{RunnerConfig, UriIdMode};
use crate::error::{RunnerError, RunnerResult};
use crate::records::{load_records, CrateRecord};

/// Counters from one completed run.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunSummary {
    /// Objects enumerated in the repository.
    pub objects: usize,
    /// Documents delivered and committed.
    pub documents: usize,
    /// Documents that failed delivery (logged, possibly dumped, never
    /// fatal).
    pub failures: usize,
}

/// Drives one full indexing pass, strictly sequentially: one object at a
/// time, one update/commit round-trip pair per document.
pub struct IndexRunner {
    config: RunnerConfig,
    client: SolrClient,
    rules: CompiledRules,
    stop: Arc<AtomicBool>,
}

impl IndexRunner {
    /// Compile the mapping configuration and set up the client. Fails fast
    /// on any configuration problem.
    pub fn new(config: RunnerConfig) -> RunnerResult<Self> {
        let rules = CompiledRules::compile(&config.fields)?;
        let client = SolrClient::new(&config.solr_base, Duration::from_secs(config.timeout))?;
        Ok(Self { config, client, rules, stop: Arc::new(AtomicBool::new(false)) })
    }

    /// Cancellation handle: once set, the runner stops scheduling new
    /// objects and documents, letting the in-flight delivery finish.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Apply the schema: the configured base document plus generated
    /// `main_search` copy-fields.
    pub async fn update_solr_schema(&self) -> RunnerResult<()> {
        let Some(schema_base) = &self.config.schema_base else {
            return Err(RunnerError::Config(
                "schema update requires a schema_base document".into(),
            ));
        };
        if !self.health_check().await {
            return Err(RunnerError::EngineUnavailable);
        }
        let base: Value = serde_json::from_slice(&std::fs::read(schema_base)?)?;
        let schema = build_schema(&base, &self.config.main_search_fields());
        info!("updating solr schema");
        self.client.update_schema(&schema).await?;
        Ok(())
    }

    /// Run one full pass.
    pub async fn run(&self) -> RunnerResult<RunSummary> {
        if !self.health_check().await {
            return Err(RunnerError::EngineUnavailable);
        }

        if self.config.purge {
            info!("purging all records from solr");
            self.client.purge().await?;
        }

        info!(repo = %self.config.ocfl.display(), "loading repository");
        let records = load_records(&self.config.ocfl, &self.config.catalog_filename)?;
        if let Some(limit) = self.config.limit {
            warn!(limit, "only indexing up to the document limit");
        }

        let mut summary = RunSummary { objects: records.len(), ..RunSummary::default() };

        'run: for record in &records {
            if self.stopped() {
                info!("cancellation requested; not scheduling further objects");
                break;
            }
            info!(path = %record.path, "indexing object");
            let docs = self.object_documents(record);
            if docs.is_empty() {
                error!(path = %record.path, "object produced no documents");
            }

            for doc in docs {
                if self.stopped() {
                    info!("cancellation requested; not scheduling further documents");
                    break 'run;
                }
                let Some(id) = first_string(doc.get("id")) else {
                    error!("document without an id - skipping");
                    continue;
                };
                let id = id.to_string();
                if self.config.skip.iter().any(|s| *s == id) {
                    warn!(id = %id, "skipping document from skip list");
                    continue;
                }

                match self.deliver(&doc).await {
                    Ok(()) => {
                        summary.documents += 1;
                        info!(id = %id, sent = summary.documents, "document committed");
                    }
                    Err(e) => {
                        summary.failures += 1;
                        error!(id = %id, error = %e, "update failed");
                        self.dump_failed(&doc, &id);
                    }
                }

                if let Some(wait) = self.config.wait_interval {
                    tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                }
                if let Some(limit) = self.config.limit {
                    if summary.documents >= limit {
                        break 'run;
                    }
                }
            }
        }

        info!(
            objects = summary.objects,
            documents = summary.documents,
            failures = summary.failures,
            "indexing pass finished"
        );
        Ok(summary)
    }

    async fn health_check(&self) -> bool {
        self.client
            .health_check(self.config.retries, Duration::from_secs(self.config.retry_interval))
            .await
    }

    /// One update/commit round-trip pair.
    async fn deliver(&self, doc: &Value) -> RunnerResult<()> {
        self.client.update(std::slice::from_ref(doc)).await?;
        self.client.commit().await?;
        Ok(())
    }

    /// Index one object's graph into finalized, deliverable documents.
    ///
    /// Every failure here is contained: a broken graph yields no documents
    /// and the run continues with the next object.
    fn object_documents(&self, record: &CrateRecord) -> Vec<Value> {
        let graph = match GraphModel::load(&record.json) {
            Ok(graph) => graph,
            Err(e) => {
                error!(path = %record.path, error = %e, "indexing error");
                return Vec::new();
            }
        };

        let resolver = record.file_resolver();
        let output = relic_index::index(&graph, &self.rules, &resolver, &record.hash_path);
        for problem in &output.errors {
            warn!(path = %record.path, "conversion: {problem}");
        }

        if let Some(dump_dir) = &self.config.dump {
            if let Err(e) = dump_documents(dump_dir, record, &output) {
                warn!(path = %record.path, error = %e, "could not dump documents");
            }
        }

        let mut docs = Vec::new();
        for (type_name, type_docs) in &output.documents {
            let is_root_type = output.root_type.as_deref() == Some(type_name.as_str());
            for doc in type_docs {
                let mut doc = doc.clone();
                if is_root_type {
                    self.finalize_root_doc(&mut doc, record);
                }
                docs.push(Value::Object(doc));
            }
        }
        docs
    }

    /// Root-record documents carry the object's path and resolvable
    /// `uri_id`.
    fn finalize_root_doc(&self, doc: &mut Document, record: &CrateRecord) {
        doc.insert("path".into(), json!(record.path));
        match self.config.uri_ids {
            UriIdMode::HashPaths => {
                doc.insert("uri_id".into(), json!(record.hash_path));
            }
            UriIdMode::DatasetId => match first_string(doc.get("id")) {
                Some(id) => {
                    let id = id.to_string();
                    doc.insert("uri_id".into(), json!(id));
                }
                None => error!(path = %record.path, "couldn't find id for uri_id"),
            },
        }
    }

    /// Write a failed document to the dump directory for diagnosis.
    fn dump_failed(&self, doc: &Value, id: &str) {
        let Some(dump_dir) = &self.config.dump else {
            return;
        };
        let clean: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let path = dump_dir.join(format!("{clean}_error.json"));
        let result = std::fs::create_dir_all(dump_dir)
            .and_then(|()| serde_json::to_vec_pretty(doc).map_err(std::io::Error::other))
            .and_then(|data| std::fs::write(&path, data));
        match result {
            Ok(()) => error!(file = %path.display(), "wrote failed document"),
            Err(e) => warn!(file = %path.display(), error = %e, "could not write failure dump"),
        }
    }
}

/// Dump every document produced for one object.
fn dump_documents(dump_dir: &Path, record: &CrateRecord, output: &IndexOutput) -> std::io::Result<()> {
    std::fs::create_dir_all(dump_dir)?;
    let path = dump_dir.join(format!("{}.json", record.hash_path));
    let data = serde_json::to_vec_pretty(&output.documents)?;
    std::fs::write(path, data)
}

fn first_string(value: Option<&Value>) -> Option<&str> {
    match value? {
        Value::String(s) => Some(s),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}
