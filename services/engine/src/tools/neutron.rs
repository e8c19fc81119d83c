//! Neutron Subnet Session
//!
//! REST calls against the Neutron v2.0 API using a Keystone token.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::agents::subnet::{NetworkSession, ProviderError, SubnetOptions};
use crate::agents::subnet::types::ProviderSubnet;

pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

#[derive(Debug, Deserialize)]
struct SubnetEnvelope {
    subnet: ProviderSubnet,
}

/// Token revocation performed when the session is released
#[derive(Debug, Clone)]
pub struct TokenRevocation {
    pub tokens_url: String,
    pub token: String,
}

/// Authenticated session against one Neutron endpoint
pub struct NeutronSession {
    http_client: Client,
    base_url: String,
    token: String,
    revocation: Option<TokenRevocation>,
}

impl NeutronSession {
    /// `endpoint` is the catalog URL, with or without the `/v2.0` suffix
    pub fn new(http_client: Client, endpoint: &str, token: String) -> Self {
        let trimmed = endpoint.trim_end_matches('/');
        let base_url = if trimmed.ends_with("/v2.0") {
            trimmed.to_string()
        } else {
            format!("{}/v2.0", trimmed)
        };

        Self {
            http_client,
            base_url,
            token,
            revocation: None,
        }
    }

    pub fn revoke_on_release(mut self, revocation: TokenRevocation) -> Self {
        self.revocation = Some(revocation);
        self
    }

    fn subnets_url(&self) -> String {
        format!("{}/subnets", self.base_url)
    }

    fn subnet_url(&self, ems_ref: &str) -> String {
        format!("{}/subnets/{}", self.base_url, ems_ref)
    }
}

/// Pass successful responses through, turn anything else into `ProviderError::Response`
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Response {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl NetworkSession for NeutronSession {
    async fn create_subnet(&self, options: &SubnetOptions) -> Result<ProviderSubnet, ProviderError> {
        debug!(url = %self.subnets_url(), "POST subnet");
        let response = self
            .http_client
            .post(self.subnets_url())
            .header(AUTH_TOKEN_HEADER, &self.token)
            .json(&json!({ "subnet": options }))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        let created: SubnetEnvelope = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("subnet create: {}", e)))?;
        info!(ems_ref = %created.subnet.id, "Neutron subnet created");
        Ok(created.subnet)
    }

    async fn update_subnet(&self, ems_ref: &str, options: &SubnetOptions) -> Result<(), ProviderError> {
        debug!(url = %self.subnet_url(ems_ref), "PUT subnet");
        let response = self
            .http_client
            .put(self.subnet_url(ems_ref))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .json(&json!({ "subnet": options }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_subnet(&self, ems_ref: &str) -> Result<(), ProviderError> {
        debug!(url = %self.subnet_url(ems_ref), "DELETE subnet");
        let response = self
            .http_client
            .delete(self.subnet_url(ems_ref))
            .header(AUTH_TOKEN_HEADER, &self.token)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    fn release(&mut self) {
        let Some(revocation) = self.revocation.take() else {
            return;
        };

        // Best effort; an unrevoked token simply expires.
        match Handle::try_current() {
            Ok(handle) => {
                let http_client = self.http_client.clone();
                handle.spawn(async move {
                    let result = http_client
                        .delete(&revocation.tokens_url)
                        .header(AUTH_TOKEN_HEADER, &revocation.token)
                        .header(SUBJECT_TOKEN_HEADER, &revocation.token)
                        .send()
                        .await;
                    match result {
                        Ok(response) if response.status().is_success() => {
                            debug!("Revoked Keystone token")
                        }
                        Ok(response) => warn!(status = %response.status(), "Keystone token revocation rejected"),
                        Err(e) => warn!(error = %e, "Keystone token revocation failed"),
                    }
                });
            }
            Err(_) => debug!("No runtime available, leaving Keystone token to expire"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{post, put};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Neutron {
        requests: Arc<Mutex<Vec<(String, Value)>>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("x-auth-token")
            .and_then(|v| v.to_str().ok())
            == Some("token-1")
    }

    async fn create(
        State(neutron): State<Neutron>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "Authentication required"}})));
        }
        neutron.requests.lock().unwrap().push(("POST".to_string(), body.clone()));

        let subnet = &body["subnet"];
        if subnet["cidr"] == "10.0.0.0/8" {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"NeutronError": {"type": "InvalidInput", "message": "CIDR overlaps with another subnet", "detail": ""}})),
            );
        }
        (
            StatusCode::CREATED,
            Json(json!({"subnet": {
                "id": "abc-123",
                "name": subnet["name"],
                "cidr": subnet["cidr"],
                "network_id": subnet["network_id"],
            }})),
        )
    }

    async fn update(
        State(neutron): State<Neutron>,
        Path(id): Path<String>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        neutron.requests.lock().unwrap().push((format!("PUT {}", id), body.clone()));
        (StatusCode::OK, Json(json!({"subnet": {"id": id}})))
    }

    async fn delete(State(neutron): State<Neutron>, Path(id): Path<String>) -> Response {
        neutron.requests.lock().unwrap().push((format!("DELETE {}", id), Value::Null));
        if id == "in-use" {
            return (
                StatusCode::CONFLICT,
                Json(json!({"NeutronError": {"type": "SubnetInUse", "message": "Unable to complete operation on subnet in-use: One or more ports have an IP allocation from this subnet.", "detail": ""}})),
            )
                .into_response();
        }
        StatusCode::NO_CONTENT.into_response()
    }

    async fn serve(neutron: Neutron) -> SocketAddr {
        let app = Router::new()
            .route("/v2.0/subnets", post(create))
            .route("/v2.0/subnets/:id", put(update).delete(delete))
            .with_state(neutron);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn options(value: Value) -> SubnetOptions {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_base_url_normalization() {
        let client = Client::new();
        let plain = NeutronSession::new(client.clone(), "http://neutron:9696/", "t".to_string());
        assert_eq!(plain.subnets_url(), "http://neutron:9696/v2.0/subnets");

        let versioned = NeutronSession::new(client, "http://neutron:9696/v2.0", "t".to_string());
        assert_eq!(versioned.subnet_url("abc"), "http://neutron:9696/v2.0/subnets/abc");
    }

    #[tokio::test]
    async fn test_create_posts_wrapped_options() {
        let neutron = Neutron::default();
        let addr = serve(neutron.clone()).await;
        let session = NeutronSession::new(Client::new(), &format!("http://{}", addr), "token-1".to_string());

        let created = session
            .create_subnet(&options(json!({"name": "sub1", "cidr": "10.0.0.0/24", "network_id": "net-1"})))
            .await
            .unwrap();

        assert_eq!(created.id, "abc-123");
        assert_eq!(created.name, "sub1");
        assert_eq!(created.network_id.as_deref(), Some("net-1"));

        let requests = neutron.requests.lock().unwrap().clone();
        assert_eq!(requests[0].1["subnet"]["cidr"], "10.0.0.0/24");
    }

    #[tokio::test]
    async fn test_rejection_keeps_status_and_body() {
        let addr = serve(Neutron::default()).await;
        let session = NeutronSession::new(Client::new(), &format!("http://{}", addr), "token-1".to_string());

        let err = session
            .create_subnet(&options(json!({"name": "sub1", "cidr": "10.0.0.0/8"})))
            .await
            .unwrap_err();

        match &err {
            ProviderError::Response { status, body } => {
                assert_eq!(*status, 400);
                assert!(body.contains("CIDR overlaps with another subnet"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            crate::agents::subnet::error::error_message(&err),
            "CIDR overlaps with another subnet"
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_target_ems_ref() {
        let neutron = Neutron::default();
        let addr = serve(neutron.clone()).await;
        let session = NeutronSession::new(Client::new(), &format!("http://{}/v2.0", addr), "token-1".to_string());

        session
            .update_subnet("abc-123", &options(json!({"name": "renamed"})))
            .await
            .unwrap();
        session.delete_subnet("abc-123").await.unwrap();

        let err = session.delete_subnet("in-use").await.unwrap_err();
        assert!(matches!(err, ProviderError::Response { status: 409, .. }));

        let requests = neutron.requests.lock().unwrap().clone();
        assert_eq!(requests[0].0, "PUT abc-123");
        assert_eq!(requests[0].1, json!({"subnet": {"name": "renamed"}}));
        assert_eq!(requests[1].0, "DELETE abc-123");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let session = NeutronSession::new(Client::new(), &format!("http://{}", addr), "token-1".to_string());
        let err = session.delete_subnet("abc-123").await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }
}
