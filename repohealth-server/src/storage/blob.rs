//! Remote blob-store backend.
//!
//! Speaks a small key/value protocol: `PUT {base}/{store}/{key}` stores a
//! document, `GET {base}/{store}?prefix=..&cursor=..` pages through keys and
//! `GET {base}/{store}/{key}` fetches one document.

use std::collections::HashSet;

use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;

use super::{ReportStore, StoreError, StoredReport};
use crate::config::BlobConfig;

#[derive(Debug, Deserialize)]
struct BlobListing {
    #[serde(default)]
    blobs: Vec<BlobEntry>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobEntry {
    key: String,
}

/// Report store backed by a named store on a blob service.
#[derive(Debug, Clone)]
pub struct BlobReportStore {
    base_url: String,
    store: String,
    token: Option<String>,
    client: Client,
}

impl BlobReportStore {
    /// Build a store client. Must be called outside an async runtime.
    pub fn new(config: BlobConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            store: config.store,
            token: config.token,
            client: Client::new(),
        }
    }

    fn store_url(&self) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(&self.store))
    }

    fn blob_url(&self, key: &str) -> String {
        format!("{}/{}", self.store_url(), encode_key(key))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let mut url = format!("{}?prefix={}", self.store_url(), urlencoding::encode(prefix));
            if let Some(cursor) = &cursor {
                url.push_str("&cursor=");
                url.push_str(&urlencoding::encode(cursor));
            }
            let response = self.authorize(self.client.get(url)).send()?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                return Err(StoreError::new(format!(
                    "blob list error ({status}): {body}"
                )));
            }
            let listing: BlobListing = response
                .json()
                .map_err(|err| StoreError::new(format!("blob listing decode failed: {err}")))?;
            keys.extend(listing.blobs.into_iter().map(|entry| entry.key));
            match listing.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) if !seen.insert(next.clone()) => {
                    log::warn!("blob listing repeated cursor {next}, stopping");
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(keys)
    }
}

impl ReportStore for BlobReportStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.put(self.blob_url(key)))
            .header("Content-Type", "application/json")
            .body(bytes.to_vec())
            .send()?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(StoreError::new(format!("blob put error ({status}): {body}")));
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<StoredReport>, StoreError> {
        let mut reports = Vec::new();
        for key in self.list_keys(prefix)? {
            let response = self.authorize(self.client.get(self.blob_url(&key))).send()?;
            if !response.status().is_success() {
                log::warn!("skipping blob {key}: status {}", response.status());
                continue;
            }
            let bytes = response.bytes()?;
            reports.push(StoredReport {
                key,
                bytes: bytes.to_vec(),
            });
        }
        Ok(reports)
    }
}

/// Percent-encode each `/`-separated segment of a key.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
