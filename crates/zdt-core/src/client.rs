//! Typed CRUD client for one running asset service instance.
//!
//! Wire contract:
//! - `GET /health`: any 2xx means the instance can serve requests
//! - `POST /api/asset`: body is the asset, response is the canonical stored asset
//! - `GET /api/asset/{id}`: 200 with the asset, 404 when absent
//! - `PUT /api/asset/{id}`: body `{"source": ...}`
//! - `DELETE /api/asset/{id}`
//!
//! There are no retries here; a failed call is returned to the caller as is.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Asset, ClientError, HarnessError};

/// CRUD surface of the asset service, as seen by the harness.
#[async_trait]
pub trait AssetApi: Send + Sync {
    /// Address this client is bound to.
    fn address(&self) -> &str;

    /// Liveness probe.
    async fn health(&self) -> Result<(), ClientError>;

    /// Store an asset and return the server's canonical representation.
    async fn create(&self, asset: &Asset) -> Result<Asset, ClientError>;

    /// Read an asset. `Ok(None)` means the service confirmed it is absent.
    async fn read(&self, id: &str) -> Result<Option<Asset>, ClientError>;

    /// Replace the `source` field of an existing asset.
    async fn update_source(&self, id: &str, source: &str) -> Result<(), ClientError>;

    async fn delete(&self, id: &str) -> Result<(), ClientError>;
}

/// Binds clients to freshly started instances.
pub trait Connector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Arc<dyn AssetApi>, HarnessError>;
}

#[derive(Serialize)]
struct SourceUpdate<'a> {
    source: &'a str,
}

/// `reqwest`-backed [`AssetApi`].
#[derive(Debug, Clone)]
pub struct HttpAssetClient {
    address: String,
    base_url: String,
    http: reqwest::Client,
}

impl HttpAssetClient {
    /// Create a client for `address` (`host:port`, or a full `http://` URL).
    pub fn new(address: &str) -> Result<Self, HarnessError> {
        Ok(Self::with_client(address, build_http_client()?))
    }

    /// Create a client that shares an existing connection pool.
    pub fn with_client(address: &str, http: reqwest::Client) -> Self {
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address)
        };
        Self {
            address: address.to_string(),
            base_url,
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn asset_path(id: &str) -> String {
        format!("/api/asset/{}", id)
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        debug!(address = %self.address, endpoint = %endpoint, "asset service call");
        request.send().await.map_err(|e| ClientError::Transport {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        })
    }

    async fn expect_success(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn decode_asset(endpoint: &str, response: reqwest::Response) -> Result<Asset, ClientError> {
        let bytes = response.bytes().await.map_err(|e| ClientError::Transport {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl AssetApi for HttpAssetClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn health(&self) -> Result<(), ClientError> {
        let endpoint = "GET /health";
        let response = self.send(endpoint, self.http.get(self.url("/health"))).await?;
        Self::expect_success(endpoint, response).await?;
        Ok(())
    }

    async fn create(&self, asset: &Asset) -> Result<Asset, ClientError> {
        let endpoint = "POST /api/asset";
        let request = self.http.post(self.url("/api/asset")).json(asset);
        let response = self.send(endpoint, request).await?;
        let response = Self::expect_success(endpoint, response).await?;
        Self::decode_asset(endpoint, response).await
    }

    async fn read(&self, id: &str) -> Result<Option<Asset>, ClientError> {
        let path = Self::asset_path(id);
        let endpoint = format!("GET {}", path);
        let response = self.send(&endpoint, self.http.get(self.url(&path))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success(&endpoint, response).await?;
        Self::decode_asset(&endpoint, response).await.map(Some)
    }

    async fn update_source(&self, id: &str, source: &str) -> Result<(), ClientError> {
        let path = Self::asset_path(id);
        let endpoint = format!("PUT {}", path);
        let request = self
            .http
            .put(self.url(&path))
            .json(&SourceUpdate { source });
        let response = self.send(&endpoint, request).await?;
        Self::expect_success(&endpoint, response).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let path = Self::asset_path(id);
        let endpoint = format!("DELETE {}", path);
        let response = self.send(&endpoint, self.http.delete(self.url(&path))).await?;
        Self::expect_success(&endpoint, response).await?;
        Ok(())
    }
}

/// Production [`Connector`]: one shared `reqwest` pool for every instance.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> Result<Self, HarnessError> {
        Ok(Self {
            http: build_http_client()?,
        })
    }
}

impl Connector for HttpConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn AssetApi>, HarnessError> {
        Ok(Arc::new(HttpAssetClient::with_client(
            address,
            self.http.clone(),
        )))
    }
}

fn build_http_client() -> Result<reqwest::Client, HarnessError> {
    reqwest::Client::builder()
        .user_agent(concat!("zdt/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| HarnessError::Configuration(format!("failed to build HTTP client: {}", e)))
}
