//! Handle to DID resolution over the public XRPC API.

use crate::error::ResolveError;
use crate::types::{is_did, Did};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_handle(&self, handle: &str) -> Result<Did, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct ResolveHandleResponse {
    did: String,
}

/// Resolver backed by `com.atproto.identity.resolveHandle`
pub struct XrpcResolver {
    client: reqwest::Client,
    base_url: String,
}

impl XrpcResolver {
    pub fn new(base_url: &str) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/xrpc/com.atproto.identity.resolveHandle", self.base_url)
    }
}

#[async_trait]
impl IdentityResolver for XrpcResolver {
    async fn resolve_handle(&self, handle: &str) -> Result<Did, ResolveError> {
        let handle = handle.trim_start_matches('@');
        let resp = self
            .client
            .get(self.endpoint())
            .query(&[("handle", handle)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ResolveError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ResolveHandleResponse = resp.json().await?;
        if !is_did(&body.did) {
            return Err(ResolveError::InvalidDid(body.did));
        }
        debug!(handle, did = %body.did, "Resolved handle");
        Ok(body.did)
    }
}
