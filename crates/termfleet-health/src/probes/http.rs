//! HTTP reachability probe.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{redirect, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{HealthProber, ProbeResult};
use crate::error::{HealthError, HealthResult};

/// HTTP prober configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProberConfig {
    /// URL scheme used to reach workstations.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Skip TLS certificate verification (development only).
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for HttpProberConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            accept_invalid_certs: false,
        }
    }
}

fn default_scheme() -> String {
    "https".to_string()
}

/// Probe that issues `GET {scheme}://{domain}/` and expects HTTP 200.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    scheme: String,
}

impl HttpProber {
    /// Build a prober. Redirects are not followed.
    pub fn new(config: &HttpProberConfig) -> HealthResult<Self> {
        if !matches!(config.scheme.as_str(), "http" | "https") {
            return Err(HealthError::ConfigurationError(format!(
                "unsupported probe scheme: {}",
                config.scheme
            )));
        }

        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("termfleet-probe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HealthError::Client(e.to_string()))?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
        })
    }

    fn url_for(&self, domain_name: &str) -> String {
        format!("{}://{}/", self.scheme, domain_name)
    }
}

#[async_trait]
impl HealthProber for HttpProber {
    async fn probe(&self, domain_name: &str, timeout: Duration) -> ProbeResult {
        let url = self.url_for(domain_name);
        let started = Instant::now();

        let outcome = tokio::time::timeout(timeout, self.client.get(&url).send()).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(response)) if response.status() == StatusCode::OK => {
                ProbeResult::success(StatusCode::OK.as_u16(), latency_ms)
            }
            Ok(Ok(response)) => {
                let status = response.status();
                ProbeResult::failure(
                    Some(status.as_u16()),
                    format!("unexpected status {}", status),
                    latency_ms,
                )
            }
            Ok(Err(e)) => ProbeResult::failure(None, e.to_string(), latency_ms),
            Err(_) => ProbeResult::timeout(timeout),
        };

        if !result.success {
            debug!(
                url = %url,
                error = result.message.as_deref().unwrap_or_default(),
                "Health check failed"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::get, Router};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn plain_http() -> HttpProber {
        HttpProber::new(&HttpProberConfig {
            scheme: "http".to_string(),
            accept_invalid_certs: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_ok_response_is_success() {
        let addr = serve(Router::new().route("/", get(|| async { "ttyd" }))).await;

        let result = plain_http()
            .probe(&addr.to_string(), Duration::from_secs(5))
            .await;
        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_non_200_is_failure() {
        let addr = serve(Router::new().route(
            "/",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "booting") }),
        ))
        .await;

        let result = plain_http()
            .probe(&addr.to_string(), Duration::from_secs(5))
            .await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(503));
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let addr = serve(
            Router::new()
                .route(
                    "/",
                    get(|| async { (AxumStatus::FOUND, [("location", "/login")]) }),
                )
                .route("/login", get(|| async { "login" })),
        )
        .await;

        let result = plain_http()
            .probe(&addr.to_string(), Duration::from_secs(5))
            .await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(302));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let addr = serve(Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;

        let result = plain_http()
            .probe(&addr.to_string(), Duration::from_millis(100))
            .await;
        assert!(!result.success);
        assert!(result.message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = plain_http()
            .probe(&addr.to_string(), Duration::from_secs(2))
            .await;
        assert!(!result.success);
        assert!(result.status_code.is_none());
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let config = HttpProberConfig {
            scheme: "ftp".to_string(),
            accept_invalid_certs: false,
        };
        assert!(matches!(
            HttpProber::new(&config),
            Err(HealthError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_url_for_domain() {
        let prober = HttpProber::new(&HttpProberConfig::default()).unwrap();
        assert_eq!(
            prober.url_for("desk1.fleet.example"),
            "https://desk1.fleet.example/"
        );
    }
}
