//! Remote catalog source abstraction.
//!
//! The remote collection is the authoritative record set; this subsystem
//! only ever reads it. [`RemoteCatalog`] is the contract the reconciler
//! needs ("list all" for the id-set diff and the full per-pass scan);
//! [`HttpRemoteCatalog`] implements it against a JSON-over-HTTP collection
//! endpoint.

use std::time::Duration;

use crate::BoxFuture;
use crate::error::{KeepsakeError, Result};
use crate::record::MediaRecord;

/// Name of the remote media collection.
const MEDIA_COLLECTION: &str = "mediaItem";

/// Read-only access to the authoritative remote record set.
pub trait RemoteCatalog: Send + Sync {
    /// List every record in the remote collection.
    ///
    /// `token` is the session token of the identity performing the read,
    /// when the authentication bootstrap issued one. The returned documents
    /// carry remote media URLs; their local path fields are always empty.
    fn list_all<'a>(&'a self, token: Option<&'a str>)
    -> BoxFuture<'a, Result<Vec<MediaRecord>>>;
}

/// Remote catalog backed by an HTTP JSON collection endpoint.
///
/// Expects `GET {base_url}/mediaItem` to return a JSON array of record
/// documents. The session token, when present, is attached as a bearer
/// token on every read.
pub struct HttpRemoteCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteCatalog {
    /// Create a remote catalog for the given server base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_collection(&self, token: Option<&str>) -> Result<Vec<MediaRecord>> {
        let url = format!("{}/{}", self.base_url, MEDIA_COLLECTION);
        log::debug!("Listing remote collection: {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| KeepsakeError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeepsakeError::RemoteUnavailable(format!(
                "{} returned status {}",
                url, status
            )));
        }

        let documents: Vec<MediaRecord> = response
            .json()
            .await
            .map_err(|e| KeepsakeError::RemoteUnavailable(format!("invalid response: {e}")))?;

        log::debug!("Remote collection holds {} documents", documents.len());
        Ok(documents)
    }
}

impl RemoteCatalog for HttpRemoteCatalog {
    fn list_all<'a>(
        &'a self,
        token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<MediaRecord>>> {
        Box::pin(self.fetch_collection(token))
    }
}
