//! Spaceship DNS REST provider

use super::provider::{join_domain, DnsProvider};
use crate::error::{DnsError, DnsResult};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DnsRecordItem {
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
}

impl DnsRecordItem {
    fn a_record(name: &str, address: &str, ttl: Option<u32>) -> Self {
        Self {
            record_type: "A".to_string(),
            name: name.to_string(),
            address: Some(address.to_string()),
            ttl,
        }
    }
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    force: bool,
    items: Vec<DnsRecordItem>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<DnsRecordItem>,
}

/// Provider for the Spaceship DNS API
#[derive(Debug, Clone)]
pub struct SpaceshipProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    api_secret: String,
    base_domain: String,
}

impl SpaceshipProvider {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        base_domain: impl Into<String>,
    ) -> DnsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DnsError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_domain: base_domain.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_base, path);
        tracing::debug!(method = %method, url = %url, "Spaceship API request");
        self.client
            .request(method, url)
            .header("X-API-Key", &self.api_key)
            .header("X-API-Secret", &self.api_secret)
    }

    async fn send(&self, request: RequestBuilder) -> DnsResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DnsError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn records_path(&self) -> String {
        format!("/dns/records/{}", self.base_domain)
    }
}

#[async_trait]
impl DnsProvider for SpaceshipProvider {
    async fn upsert_record(&self, name: &str, address: &str, ttl: u32) -> DnsResult<String> {
        let body = UpsertRequest {
            force: false,
            items: vec![DnsRecordItem::a_record(name, address, Some(ttl))],
        };

        self.send(self.request(Method::PUT, &self.records_path()).json(&body))
            .await?;

        let domain = self.fqdn(name);
        tracing::info!(domain = %domain, address, "DNS record registered");
        Ok(domain)
    }

    async fn delete_record(&self, name: &str) -> DnsResult<bool> {
        let list_path = format!("{}?take=500&skip=0", self.records_path());
        let records: ListResponse = self
            .send(self.request(Method::GET, &list_path))
            .await?
            .json()
            .await?;

        let Some(record) = records
            .items
            .into_iter()
            .find(|r| r.name == name && r.record_type == "A")
        else {
            tracing::warn!(name, "DNS record not found for deletion");
            return Ok(false);
        };

        let address = record.address.unwrap_or_default();
        let body = vec![DnsRecordItem::a_record(name, &address, None)];
        self.send(self.request(Method::DELETE, &self.records_path()).json(&body))
            .await?;

        tracing::info!(domain = %self.fqdn(name), "DNS record deleted");
        Ok(true)
    }

    fn fqdn(&self, name: &str) -> String {
        join_domain(name, &self.base_domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::put,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct Recorded {
        calls: Arc<Mutex<Vec<(String, String, Value)>>>,
        reject: bool,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("X-API-Key").and_then(|v| v.to_str().ok()) == Some("key")
            && headers.get("X-API-Secret").and_then(|v| v.to_str().ok()) == Some("secret")
    }

    async fn upsert(
        State(state): State<Recorded>,
        Path(domain): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED;
        }
        state
            .calls
            .lock()
            .unwrap()
            .push(("PUT".to_string(), domain, body));
        if state.reject {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::NO_CONTENT
        }
    }

    async fn list(Path(_domain): Path<String>) -> Json<Value> {
        Json(json!({
            "items": [
                { "type": "A", "name": "desk1", "address": "10.0.0.5", "ttl": 600 },
                { "type": "TXT", "name": "desk2", "value": "x" }
            ],
            "total": 2
        }))
    }

    async fn remove(
        State(state): State<Recorded>,
        Path(domain): Path<String>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        state
            .calls
            .lock()
            .unwrap()
            .push(("DELETE".to_string(), domain, body));
        StatusCode::NO_CONTENT
    }

    async fn mock_api(state: Recorded) -> SocketAddr {
        let app = Router::new()
            .route(
                "/api/v1/dns/records/:domain",
                put(upsert).get(list).delete(remove),
            )
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn provider(addr: SocketAddr) -> SpaceshipProvider {
        SpaceshipProvider::new(
            format!("http://{}/api/v1/", addr),
            "key",
            "secret",
            "fleet.example",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_sends_a_record() {
        let state = Recorded::default();
        let addr = mock_api(state.clone()).await;

        let domain = provider(addr)
            .upsert_record("desk1", "10.0.0.5", 600)
            .await
            .unwrap();
        assert_eq!(domain, "desk1.fleet.example");

        let calls = state.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (method, zone, body) = &calls[0];
        assert_eq!(method, "PUT");
        assert_eq!(zone, "fleet.example");
        assert_eq!(
            *body,
            json!({
                "force": false,
                "items": [{ "type": "A", "name": "desk1", "address": "10.0.0.5", "ttl": 600 }]
            })
        );
    }

    #[tokio::test]
    async fn test_upsert_surfaces_api_errors() {
        let state = Recorded {
            reject: true,
            ..Default::default()
        };
        let addr = mock_api(state).await;

        let err = provider(addr)
            .upsert_record("desk1", "10.0.0.5", 600)
            .await
            .unwrap_err();
        assert!(matches!(err, DnsError::Api { status: 422, .. }));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_rejected() {
        let addr = mock_api(Recorded::default()).await;
        let provider = SpaceshipProvider::new(
            format!("http://{}/api/v1", addr),
            "key",
            "wrong",
            "fleet.example",
        )
        .unwrap();

        let err = provider
            .upsert_record("desk1", "10.0.0.5", 600)
            .await
            .unwrap_err();
        assert!(matches!(err, DnsError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_delete_looks_up_address_first() {
        let state = Recorded::default();
        let addr = mock_api(state.clone()).await;
        let provider = provider(addr);

        assert!(provider.delete_record("desk1").await.unwrap());
        assert!(!provider.delete_record("desk2").await.unwrap());

        let calls = state.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "DELETE");
        assert_eq!(
            calls[0].2,
            json!([{ "type": "A", "name": "desk1", "address": "10.0.0.5" }])
        );
    }

    #[tokio::test]
    async fn test_unreachable_api_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider(addr)
            .upsert_record("desk1", "10.0.0.5", 600)
            .await
            .unwrap_err();
        assert!(matches!(err, DnsError::Transport(_)));
    }
}
