//! Keystone Network Manager
//!
//! Authenticates with Keystone v3 password credentials and opens Neutron
//! sessions scoped to the requested tenant. Every session gets its own token,
//! which is revoked when the session is released.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::agents::subnet::{ConnectionOptions, NetworkManager, NetworkSession, ProviderError};
use crate::config::OpenStackConfig;

use super::neutron::{check_status, NeutronSession, TokenRevocation, SUBJECT_TOKEN_HEADER};

const NETWORK_SERVICE_TYPE: &str = "network";

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
    url: String,
}

/// Scoped token plus the Neutron endpoint it grants access to
#[derive(Debug, Clone)]
pub struct ScopedToken {
    pub token: String,
    pub network_endpoint: String,
}

/// OpenStack network manager backed by Keystone and Neutron
#[derive(Debug)]
pub struct KeystoneManager {
    id: u64,
    name: String,
    config: OpenStackConfig,
    http_client: Client,
}

impl KeystoneManager {
    pub fn new(id: u64, name: impl Into<String>, config: OpenStackConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            id,
            name: name.into(),
            config,
            http_client,
        })
    }

    /// `{auth_url}/v3/auth/tokens`, tolerating an auth URL that already names the version
    pub fn tokens_url(&self) -> String {
        let base = self.config.auth_url.trim_end_matches('/');
        let base = base.strip_suffix("/v3").unwrap_or(base);
        format!("{}/v3/auth/tokens", base)
    }

    fn auth_request(&self, tenant_name: Option<&str>) -> Value {
        let project = tenant_name.unwrap_or(&self.config.project_name);
        json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.config.username,
                            "domain": { "name": self.config.user_domain },
                            "password": self.config.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": project,
                        "domain": { "name": self.config.project_domain },
                    }
                }
            }
        })
    }

    /// Issue a token scoped to `tenant_name`, or the configured project when `None`
    pub async fn authenticate(&self, tenant_name: Option<&str>) -> Result<ScopedToken, ProviderError> {
        debug!(url = %self.tokens_url(), tenant = ?tenant_name, "Requesting Keystone token");
        let response = self
            .http_client
            .post(self.tokens_url())
            .json(&self.auth_request(tenant_name))
            .send()
            .await?;
        let response = check_status(response).await?;

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Authentication("Keystone response has no X-Subject-Token".to_string()))?;

        let body = response.text().await?;
        let envelope: TokenEnvelope = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Keystone token: {}", e)))?;
        let network_endpoint = self.network_endpoint(&envelope.token.catalog)?;

        Ok(ScopedToken {
            token,
            network_endpoint,
        })
    }

    fn network_endpoint(&self, catalog: &[CatalogEntry]) -> Result<String, ProviderError> {
        let region = self.config.region.as_deref();
        catalog
            .iter()
            .filter(|entry| entry.service_type == NETWORK_SERVICE_TYPE)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| {
                endpoint.interface == self.config.interface
                    && region.map_or(true, |r| {
                        endpoint.region.as_deref() == Some(r) || endpoint.region_id.as_deref() == Some(r)
                    })
            })
            .map(|endpoint| endpoint.url.clone())
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!(
                    "no {} network endpoint{} in the service catalog",
                    self.config.interface,
                    region.map(|r| format!(" for region {}", r)).unwrap_or_default()
                ))
            })
    }
}

#[async_trait]
impl NetworkManager for KeystoneManager {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn zone(&self) -> String {
        self.config.zone.clone()
    }

    async fn open_session(
        &self,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn NetworkSession>, ProviderError> {
        let scoped = self.authenticate(options.tenant_name.as_deref()).await?;
        info!(
            manager = %self.name,
            service = %options.service,
            endpoint = %scoped.network_endpoint,
            "Opened network session"
        );

        let revocation = TokenRevocation {
            tokens_url: self.tokens_url(),
            token: scoped.token.clone(),
        };
        let session = NeutronSession::new(self.http_client.clone(), &scoped.network_endpoint, scoped.token)
            .revoke_on_release(revocation);
        Ok(Box::new(session))
    }
}
