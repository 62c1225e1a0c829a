//! Authentication bootstrap.
//!
//! Remote reads require an ambient identity, but the catalog itself never
//! does: local reads and writes stay fully usable with no identity at all.
//! [`AuthProvider::ensure_identity`] is called once per sync pass, before
//! the remote catalog is touched; if no identity exists yet it establishes
//! an anonymous session and caches it for the rest of the process.

use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;

use crate::BoxFuture;
use crate::error::{KeepsakeError, Result};

/// An ambient identity established by the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Server-assigned user id.
    pub user_id: String,
    /// Session token for authenticated remote reads, when the server
    /// issues one.
    pub token: Option<String>,
    /// Whether this is an anonymous session.
    pub anonymous: bool,
}

/// Trait for identity bootstrap providers.
pub trait AuthProvider: Send + Sync {
    /// Return the current identity, establishing one if none exists.
    fn ensure_identity(&self) -> BoxFuture<'_, Result<Identity>>;
}

/// Shape of the anonymous session response.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: Option<String>,
    user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    id: String,
}

/// Identity bootstrap against the sync server's auth endpoint.
///
/// `POST {auth_url}` with an empty JSON body is expected to create an
/// anonymous session and answer with `{"token": ..., "user": {"id": ...}}`.
/// The identity is cached; later calls return it without a network round
/// trip.
pub struct HttpAuthProvider {
    client: reqwest::Client,
    auth_url: String,
    current: Mutex<Option<Identity>>,
}

impl HttpAuthProvider {
    /// Create a provider for the given anonymous-session endpoint.
    pub fn new(auth_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            auth_url: auth_url.into(),
            current: Mutex::new(None),
        })
    }

    async fn sign_in_anonymously(&self) -> Result<Identity> {
        if let Some(identity) = self.current.lock().unwrap().clone() {
            log::debug!("Already signed in as {}", identity.user_id);
            return Ok(identity);
        }

        log::debug!("No current identity, starting anonymous sign-in");
        let response = self
            .client
            .post(&self.auth_url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| KeepsakeError::AuthFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeepsakeError::AuthFailure(format!(
                "auth endpoint returned status {}",
                status
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| KeepsakeError::AuthFailure(format!("invalid session response: {e}")))?;

        let user_id = session
            .user
            .map(|u| u.id)
            .ok_or_else(|| KeepsakeError::AuthFailure("no user id in session response".into()))?;

        let identity = Identity {
            user_id,
            token: session.token,
            anonymous: true,
        };
        log::debug!("Anonymous sign-in succeeded, user id {}", identity.user_id);

        *self.current.lock().unwrap() = Some(identity.clone());
        Ok(identity)
    }
}

impl AuthProvider for HttpAuthProvider {
    fn ensure_identity(&self) -> BoxFuture<'_, Result<Identity>> {
        Box::pin(self.sign_in_anonymously())
    }
}

/// Provider that always returns a fixed identity.
///
/// For tests and for deployments where the remote collection allows
/// unauthenticated reads.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Identity);

impl StaticIdentity {
    /// An anonymous identity with the given user id and no token.
    pub fn anonymous(user_id: impl Into<String>) -> Self {
        Self(Identity {
            user_id: user_id.into(),
            token: None,
            anonymous: true,
        })
    }
}

impl AuthProvider for StaticIdentity {
    fn ensure_identity(&self) -> BoxFuture<'_, Result<Identity>> {
        let identity = self.0.clone();
        Box::pin(async move { Ok(identity) })
    }
}
