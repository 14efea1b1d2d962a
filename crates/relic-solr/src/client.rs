//! The Solr HTTP client proper.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{SolrError, SolrResult};

/// Characters with meaning in the Lucene query language.
///
/// Values interpolated into a query (e.g. an object identifier in a
/// `uri_id:<value>` lookup) must have all of these escaped, not just
/// spaces.
const QUERY_SPECIAL_CHARS: &[char] = &[
    '\\', '+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '/', '&',
    '|', ' ',
];

/// Escape a raw value for safe interpolation into a Solr query string.
pub fn escape_query(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if QUERY_SPECIAL_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Parameters for a `select` query.
#[derive(Clone, Debug, Default)]
pub struct SelectParams {
    pub q: String,
    pub fl: Vec<String>,
    pub fq: Option<String>,
    pub start: Option<u64>,
    pub rows: Option<u64>,
}

impl SelectParams {
    /// A query over all documents.
    pub fn all() -> Self {
        Self { q: "*:*".into(), ..Self::default() }
    }

    /// A query string with a field list.
    pub fn query(q: impl Into<String>, fl: &[&str]) -> Self {
        Self {
            q: q.into(),
            fl: fl.iter().map(|f| (*f).to_string()).collect(),
            ..Self::default()
        }
    }

    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("q".to_string(), self.q.clone())];
        if !self.fl.is_empty() {
            pairs.push(("fl".to_string(), self.fl.join(",")));
        }
        if let Some(fq) = &self.fq {
            pairs.push(("fq".to_string(), fq.clone()));
        }
        if let Some(start) = self.start {
            pairs.push(("start".to_string(), start.to_string()));
        }
        if let Some(rows) = self.rows {
            pairs.push(("rows".to_string(), rows.to_string()));
        }
        pairs
    }
}

/// The `response` section of a `select` result.
#[derive(Clone, Debug, Deserialize)]
pub struct SelectResponse {
    #[serde(rename = "numFound")]
    pub num_found: u64,
    #[serde(default)]
    pub start: u64,
    pub docs: Vec<Value>,
}

#[derive(Deserialize)]
struct SelectEnvelope {
    response: SelectResponse,
}

/// Client for one Solr core.
#[derive(Clone, Debug)]
pub struct SolrClient {
    base: String,
    http: reqwest::Client,
}

impl SolrClient {
    /// Create a client for the core at `base`
    /// (e.g. `http://localhost:8983/solr/ocfl`).
    pub fn new(base: &str, timeout: Duration) -> SolrResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base: base.trim_end_matches('/').to_string(), http })
    }

    /// The core base URL this client talks to.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// One-shot liveness probe: `GET /admin/ping` answered `200` with
    /// `status: OK`.
    pub async fn ping(&self) -> bool {
        let url = self.url("/admin/ping");
        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(body) => body.get("status").and_then(Value::as_str) == Some("OK"),
                Err(_) => false,
            },
            Ok(resp) => {
                debug!(status = resp.status().as_u16(), "ping rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, "ping failed");
                false
            }
        }
    }

    /// Poll [`ping`](Self::ping) until it succeeds, sleeping `interval`
    /// between attempts. Returns `false` after `retries` failures.
    ///
    /// This is the only retry loop in the client.
    pub async fn health_check(&self, retries: u32, interval: Duration) -> bool {
        for attempt in 1..=retries {
            debug!(attempt, retries, "pinging solr");
            if self.ping().await {
                info!("solr is up");
                return true;
            }
            tokio::time::sleep(interval).await;
        }
        warn!(retries, "solr did not come up");
        false
    }

    /// Run a `select` query and return the decoded `response` section.
    pub async fn select(&self, params: &SelectParams) -> SolrResult<SelectResponse> {
        let url = self.url("/select");
        let resp = self.http.get(&url).query(&params.to_pairs()).send().await?;
        let resp = check_status(resp).await?;
        let envelope: SelectEnvelope = resp
            .json()
            .await
            .map_err(|e| SolrError::Unexpected(format!("select decode: {e}")))?;
        Ok(envelope.response)
    }

    /// Post documents to `/update/json/docs`. Does not commit.
    pub async fn update(&self, docs: &[Value]) -> SolrResult<()> {
        let url = self.url("/update/json/docs");
        let resp = self.http.post(&url).json(docs).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Commit pending updates.
    pub async fn commit(&self) -> SolrResult<()> {
        let url = self.url("/update/json?commit=true&overwrite=true");
        let resp = self.http.get(&url).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Delete every document in the core and commit.
    pub async fn purge(&self) -> SolrResult<()> {
        let url = self.url("/update/json?commit=true");
        let body = serde_json::json!({ "delete": { "query": "*:*" } });
        let resp = self.http.post(&url).json(&body).send().await?;
        check_status(resp).await?;
        info!("all solr documents deleted");
        Ok(())
    }
}

pub(crate) async fn check_status(resp: reqwest::Response) -> SolrResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(SolrError::Status { status: status.as_u16(), body })
    }
}
