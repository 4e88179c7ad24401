//! Per-rule alert handler that POSTs each event as JSON.
//!
//! A [`PostHandler`] is bound either to a literal URL or to the name of an
//! endpoint in the shared [`EndpointRegistry`]. Delivery is best effort:
//! [`AlertHandler::handle`] never reports failure to its caller. Every failure
//! is logged once at `error` level under this module's target, and a
//! successful POST is logged at `debug` level with the response status, which
//! is otherwise ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, error};

use crate::bufpool::BufferPool;
use crate::config::HandlerConfig;
use crate::event::AlertEvent;
use crate::payload::AlertPayload;
use crate::registry::EndpointRegistry;

/// Receives alert events from the alerting pipeline.
///
/// Implementations must not block the pipeline on delivery problems; there is
/// deliberately no error channel.
#[async_trait]
pub trait AlertHandler: Send + Sync {
    async fn handle(&self, event: &AlertEvent);
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to marshal alert data json: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("endpoint does not exist: {0}")]
    EndpointNotFound(String),
    #[error("failed to create POST request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("failed to POST alert data: {0}")]
    Transport(#[source] reqwest::Error),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serialize(_) => "serialize",
            Self::EndpointNotFound(_) => "endpoint_not_found",
            Self::Request(_) => "request",
            Self::Transport(_) => "transport",
        }
    }
}

/// Delivery counters, shared by all handlers created from one service.
#[derive(Debug, Default)]
pub struct DispatchStats {
    sent: AtomicU64,
    failed: AtomicU64,
}

impl DispatchStats {
    /// Requests that got any HTTP response, whatever its status.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct PostHandler {
    registry: Arc<EndpointRegistry>,
    client: Client,
    pool: BufferPool,
    stats: Arc<DispatchStats>,
    url: String,
    endpoint: String,
}

impl PostHandler {
    pub fn new(config: HandlerConfig, registry: Arc<EndpointRegistry>, client: Client) -> Self {
        Self {
            registry,
            client,
            pool: BufferPool::new(),
            stats: Arc::new(DispatchStats::default()),
            url: config.url,
            endpoint: config.endpoint,
        }
    }

    pub fn with_stats(mut self, stats: Arc<DispatchStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    async fn dispatch(&self, event: &AlertEvent) -> Result<StatusCode, DispatchError> {
        let body = {
            let mut buf = self.pool.get();
            serde_json::to_writer(&mut *buf, &AlertPayload::from_event(event))
                .map_err(DispatchError::Serialize)?;
            buf.push(b'\n');
            buf.to_vec()
        };

        let builder = if !self.url.is_empty() {
            self.client.post(&self.url).body(body)
        } else {
            let endpoint = self
                .registry
                .lookup(&self.endpoint)
                .await
                .ok_or_else(|| DispatchError::EndpointNotFound(self.endpoint.clone()))?;
            endpoint.new_request(&self.client, body)
        };

        let mut request = builder.build().map_err(DispatchError::Request)?;
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .client
            .execute(request)
            .await
            .map_err(DispatchError::Transport)?;
        Ok(response.status())
    }
}

#[async_trait]
impl AlertHandler for PostHandler {
    async fn handle(&self, event: &AlertEvent) {
        match self.dispatch(event).await {
            Ok(status) => {
                self.stats.record_sent();
                debug!(
                    alert_id = %event.id,
                    url = %self.url,
                    endpoint = %self.endpoint,
                    status = status.as_u16(),
                    "Alert data posted"
                );
            }
            Err(e) => {
                self.stats.record_failed();
                error!(
                    alert_id = %event.id,
                    url = %self.url,
                    endpoint = %self.endpoint,
                    kind = e.kind(),
                    error = %e,
                    "Alert delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tracing::field::{Field, Visit};
    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::EndpointConfig;
    use crate::event::Level;

    #[derive(Debug, Clone)]
    struct Captured {
        level: tracing::Level,
        fields: HashMap<String, String>,
    }

    #[derive(Clone, Default)]
    struct CaptureLayer(Arc<Mutex<Vec<Captured>>>);

    struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

    impl Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if !event.metadata().target().starts_with("alertpost_core") {
                return;
            }
            let mut fields = HashMap::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.0.lock().unwrap().push(Captured {
                level: *event.metadata().level(),
                fields,
            });
        }
    }

    impl CaptureLayer {
        fn install(&self) -> DefaultGuard {
            tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
        }

        fn events(&self) -> Vec<Captured> {
            self.0.lock().unwrap().clone()
        }

        fn errors(&self) -> Vec<Captured> {
            self.events()
                .into_iter()
                .filter(|e| e.level == tracing::Level::ERROR)
                .collect()
        }
    }

    fn event() -> AlertEvent {
        AlertEvent::new("disk:host=db1", Level::Critical)
            .with_message("disk almost full")
            .with_details("used_percent > 95")
            .with_time(Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap())
            .with_duration(Duration::from_secs(5))
            .with_result(json!({"series": [{"name": "disk", "values": [[1, 96.2]]}]}))
    }

    fn handler(config: HandlerConfig, endpoints: Vec<EndpointConfig>) -> PostHandler {
        PostHandler::new(config, Arc::new(EndpointRegistry::build(endpoints)), Client::new())
    }

    async fn mount_ok(server: &MockServer, expected: u64) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn literal_url_is_posted_with_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let h = handler(HandlerConfig::url(format!("{}/alerts", server.uri())), vec![]);
        let ev = event();
        h.handle(&ev).await;

        let received = server.received_requests().await.unwrap();
        let payload: AlertPayload = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(payload, AlertPayload::from_event(&ev));
        assert_eq!(h.stats().sent(), 1);
        assert_eq!(h.stats().failed(), 0);
    }

    #[tokio::test]
    async fn literal_url_takes_precedence_over_endpoint() {
        let literal = MockServer::start().await;
        let named = MockServer::start().await;
        mount_ok(&literal, 1).await;
        mount_ok(&named, 0).await;

        let h = handler(
            HandlerConfig {
                url: literal.uri(),
                endpoint: "ops".into(),
            },
            vec![EndpointConfig::new("ops", named.uri()).with_header("X-Secret", "s3cr3t")],
        );
        h.handle(&event()).await;

        let received = literal.received_requests().await.unwrap();
        assert!(received[0].headers.get("x-secret").is_none());
    }

    #[tokio::test]
    async fn endpoint_request_carries_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("authorization", "Bearer abc"))
            .and(header("x-team", "infra"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let h = handler(
            HandlerConfig::endpoint("ops"),
            vec![EndpointConfig::new("ops", format!("{}/hook", server.uri()))
                .with_header("Authorization", "Bearer abc")
                .with_header("X-Team", "infra")],
        );
        h.handle(&event()).await;
        assert_eq!(h.stats().sent(), 1);
    }

    #[tokio::test]
    async fn content_type_overrides_endpoint_header() {
        let server = MockServer::start().await;
        mount_ok(&server, 1).await;

        let h = handler(
            HandlerConfig::endpoint("ops"),
            vec![EndpointConfig::new("ops", server.uri()).with_header("Content-Type", "text/plain")],
        );
        h.handle(&event()).await;

        let received = server.received_requests().await.unwrap();
        let values: Vec<_> = received[0].headers.get_all("content-type").iter().collect();
        assert_eq!(values, vec!["application/json"]);
    }

    #[tokio::test]
    async fn missing_endpoint_sends_nothing_and_logs_once() {
        let server = MockServer::start().await;
        mount_ok(&server, 0).await;

        let capture = CaptureLayer::default();
        let _guard = capture.install();

        let h = handler(
            HandlerConfig::endpoint("missing"),
            vec![EndpointConfig::new("ops", server.uri())],
        );
        h.handle(&event()).await;

        let events = capture.events();
        assert_eq!(events.len(), 1, "{events:?}");
        assert_eq!(events[0].level, tracing::Level::ERROR);
        assert_eq!(events[0].fields["kind"], "endpoint_not_found");
        assert!(events[0].fields["error"].contains("missing"));
        assert_eq!(h.stats().failed(), 1);
        assert_eq!(h.stats().sent(), 0);
    }

    #[tokio::test]
    async fn invalid_literal_url_is_a_request_error() {
        let capture = CaptureLayer::default();
        let _guard = capture.install();

        let h = handler(HandlerConfig::url("not a url"), vec![]);
        h.handle(&event()).await;

        let errors = capture.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].fields["kind"], "request");
    }

    #[tokio::test]
    async fn transport_failure_is_logged_not_propagated() {
        let capture = CaptureLayer::default();
        let _guard = capture.install();

        // Nothing listens on the discard port.
        let h = handler(HandlerConfig::url("http://127.0.0.1:9/alerts"), vec![]);
        h.handle(&event()).await;

        let errors = capture.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].fields["kind"], "transport");
        assert_eq!(h.stats().failed(), 1);
    }

    #[tokio::test]
    async fn non_success_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let capture = CaptureLayer::default();
        let _guard = capture.install();

        let h = handler(HandlerConfig::url(server.uri()), vec![]);
        h.handle(&event()).await;

        assert!(capture.errors().is_empty());
        assert_eq!(h.stats().sent(), 1);
        assert_eq!(h.stats().failed(), 0);
    }

    #[tokio::test]
    async fn repeated_handle_sends_identical_bodies() {
        let server = MockServer::start().await;
        mount_ok(&server, 2).await;

        let h = handler(HandlerConfig::url(server.uri()), vec![]);
        let ev = event();
        h.handle(&ev).await;
        h.handle(&ev).await;

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].body, received[1].body);
        assert_eq!(h.pool.idle(), 1);
    }

    #[tokio::test]
    async fn handler_sees_registry_updates() {
        let before = MockServer::start().await;
        let after = MockServer::start().await;
        mount_ok(&before, 1).await;
        mount_ok(&after, 1).await;

        let registry = Arc::new(EndpointRegistry::build(vec![EndpointConfig::new(
            "ops",
            before.uri(),
        )]));
        let h = PostHandler::new(HandlerConfig::endpoint("ops"), Arc::clone(&registry), Client::new());

        h.handle(&event()).await;
        registry.replace(vec![EndpointConfig::new("ops", after.uri())]).await;
        h.handle(&event()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_handles_during_replace_use_whole_configs() {
        let a = MockServer::start().await;
        let b = MockServer::start().await;
        for server in [&a, &b] {
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200))
                .mount(server)
                .await;
        }

        let config_a = EndpointConfig::new("ops", a.uri()).with_header("X-Gen", "a");
        let config_b = EndpointConfig::new("ops", b.uri()).with_header("X-Gen", "b");
        let registry = Arc::new(EndpointRegistry::build(vec![config_a.clone()]));
        let h = Arc::new(PostHandler::new(
            HandlerConfig::endpoint("ops"),
            Arc::clone(&registry),
            Client::new(),
        ));

        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for i in 0..50 {
                    let next = if i % 2 == 0 { config_b.clone() } else { config_a.clone() };
                    registry.replace(vec![next]).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let sends = (0..40).map(|_| {
            let h = Arc::clone(&h);
            async move { h.handle(&event()).await }
        });
        futures::future::join_all(sends).await;
        writer.await.unwrap();

        let on_a = a.received_requests().await.unwrap();
        let on_b = b.received_requests().await.unwrap();
        assert_eq!(on_a.len() + on_b.len(), 40);
        assert!(on_a.iter().all(|r| r.headers["x-gen"] == "a"));
        assert!(on_b.iter().all(|r| r.headers["x-gen"] == "b"));
        assert_eq!(h.stats().sent(), 40);
    }
}
