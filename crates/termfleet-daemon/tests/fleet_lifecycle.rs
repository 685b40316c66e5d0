//! End-to-end workstation lifecycle through the HTTP API and the reconciler

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use termfleet_daemon::dns::InMemoryDnsProvider;
use termfleet_daemon::{DaemonConfig, DnsResolver, InMemoryStorage, Server, TickOutcome};
use termfleet_health::{HealthProber, ProbeResult};
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Prober whose answer the test flips
#[derive(Default)]
struct SwitchProber {
    up: AtomicBool,
}

impl SwitchProber {
    fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthProber for SwitchProber {
    async fn probe(&self, _domain_name: &str, _timeout: Duration) -> ProbeResult {
        if self.up.load(Ordering::SeqCst) {
            ProbeResult::success(200, 3)
        } else {
            ProbeResult::failure(Some(502), "Bad Gateway", 3)
        }
    }
}

struct NeverResolves;

#[async_trait]
impl DnsResolver for NeverResolves {
    async fn resolves(&self, _domain: &str) -> bool {
        false
    }
}

struct Harness {
    server: Server,
    prober: Arc<SwitchProber>,
    dns: Arc<InMemoryDnsProvider>,
}

fn harness(config: DaemonConfig) -> Harness {
    let prober = Arc::new(SwitchProber::default());
    let dns = Arc::new(InMemoryDnsProvider::new(config.dns.base_domain.clone()));
    let server = Server::with_components(
        config,
        Arc::new(InMemoryStorage::new()),
        dns.clone(),
        Arc::new(NeverResolves),
        prober.clone(),
    );
    Harness {
        server,
        prober,
        dns,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let resp = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn status_of(app: &Router, name: &str) -> Option<String> {
    let (status, body) = call(app, "GET", &format!("/api/workstations/{}", name), None).await;
    (status == StatusCode::OK).then(|| body["data"]["status"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn workstation_moves_through_its_whole_lifecycle() {
    let h = harness(DaemonConfig::development("fleet.example"));
    let app = h.server.router();
    let reconciler = h.server.reconciler();

    let (status, _) = call(
        &app,
        "POST",
        "/api/workstations/register",
        Some(json!({ "name": "desk1", "ip": "10.0.0.5" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(h.dns.record("desk1").await.unwrap().address, "10.0.0.5");
    assert_eq!(status_of(&app, "desk1").await.as_deref(), Some("starting"));

    let t0 = Utc::now();

    h.prober.set_up(true);
    let TickOutcome::Completed(report) = reconciler.run_tick_at(t0).await else {
        panic!("tick skipped");
    };
    assert_eq!(report.checked, 1);
    assert_eq!(report.transitions, 1);
    assert_eq!(status_of(&app, "desk1").await.as_deref(), Some("online"));

    h.prober.set_up(false);

    // Within the online-silence window nothing changes.
    reconciler.run_tick_at(t0 + ChronoDuration::seconds(30)).await;
    assert_eq!(status_of(&app, "desk1").await.as_deref(), Some("online"));

    reconciler.run_tick_at(t0 + ChronoDuration::minutes(2)).await;
    assert_eq!(status_of(&app, "desk1").await.as_deref(), Some("unknown"));

    reconciler.run_tick_at(t0 + ChronoDuration::minutes(13)).await;
    assert_eq!(status_of(&app, "desk1").await.as_deref(), Some("terminated"));

    let (_, events) = call(&app, "GET", "/api/workstations/desk1/events", None).await;
    let transitions: Vec<(&str, &str)> = events["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event_type"] == "status_changed")
        .map(|e| {
            (
                e["old_status"].as_str().unwrap(),
                e["new_status"].as_str().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            ("unknown", "terminated"),
            ("online", "unknown"),
            ("starting", "online"),
        ]
    );

    let TickOutcome::Completed(report) =
        reconciler.run_tick_at(t0 + ChronoDuration::minutes(64)).await
    else {
        panic!("tick skipped");
    };
    assert_eq!(report.pruned, 1);
    assert_eq!(report.checked, 0);
    assert_eq!(status_of(&app, "desk1").await, None);

    let (status, _) = call(&app, "GET", "/api/workstations/desk1/events", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reregistration_recovers_dns_failure() {
    let h = harness(DaemonConfig::development("fleet.example"));
    let app = h.server.router();
    let register = json!({ "name": "desk2", "ip": "10.0.0.7" });

    h.dns.set_failing(true);
    let (status, body) = call(
        &app,
        "POST",
        "/api/workstations/register",
        Some(register.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "DNS_REGISTRATION_FAILED");
    assert_eq!(status_of(&app, "desk2").await.as_deref(), Some("dns_failed"));

    // Probes never move a workstation out of DNS_FAILED.
    h.prober.set_up(true);
    h.server.reconciler().run_tick().await;
    assert_eq!(status_of(&app, "desk2").await.as_deref(), Some("dns_failed"));

    h.dns.set_failing(false);
    let (status, body) = call(&app, "POST", "/api/workstations/register", Some(register)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "starting");
    assert_eq!(body["data"]["dns_error"], Value::Null);

    let (status, body) = call(&app, "GET", "/api/workstations/desk2/propagation", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["propagated"], false);
}

#[tokio::test]
async fn server_serves_and_shuts_down_cleanly() {
    let mut config = DaemonConfig::development("fleet.example");
    config.scheduler.tick_interval_ms = 50;
    let h = harness(config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(h.server.serve(listener, async move {
        let _ = stop_rx.await;
    }));

    let body: Value = reqwest::get(format!("http://{}/api/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
