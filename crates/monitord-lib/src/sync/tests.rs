//! Behavioural tests for the sync module
//!
//! These tests verify:
//! - Retry queue replay on reconnect
//! - Failure classification for send and call
//! - The post_stream loop against scripted and real HTTP servers

use super::*;
use crate::codec::{Shape, Value};
use crate::models::Cursor;
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

/// Transport that replays scripted outcomes and records every request
#[derive(Default)]
struct MockTransport {
    script: Mutex<VecDeque<TransportOutcome>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockTransport {
    fn scripted(outcomes: impl IntoIterator<Item = TransportOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn bodies(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.body.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn post(&self, request: &OutboundRequest) -> TransportOutcome {
        self.requests.lock().unwrap().push(request.clone());
        // Unscripted requests succeed with an empty body
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ok(""))
    }
}

fn ok(body: &str) -> TransportOutcome {
    TransportOutcome::Response {
        status: 200,
        body: body.to_string(),
    }
}

fn refused() -> TransportOutcome {
    TransportOutcome::Failed("connection refused".to_string())
}

fn connected_client(transport: Arc<MockTransport>) -> SyncClient {
    SyncClientBuilder::new()
        .endpoint("http://collector.test")
        .identity("app", "device+1", "bench[rig]")
        .transport(transport)
        .connect()
        .build()
        .unwrap()
}

mod client_tests {
    use super::*;

    #[test]
    fn test_connect_validates_host() {
        let mut client = SyncClient::new(ClientConfig::default(), MockTransport::scripted([]));
        assert!(matches!(client.connect("", None), Err(SyncError::Config(_))));
        assert!(matches!(
            client.connect("not a url", None),
            Err(SyncError::Config(_))
        ));
        assert_eq!(client.state(), ClientState::Disconnected);

        assert_ok!(client.connect("http://collector.test/", Some(8080)));
        assert_eq!(client.url_root(), Some("http://collector.test:8080"));
        assert_eq!(client.state(), ClientState::Connected);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_requires_connect() {
        let mut client = SyncClient::new(ClientConfig::default(), MockTransport::scripted([]));
        assert!(matches!(
            client.reconnect().await,
            Err(SyncError::NotConnected)
        ));
    }

    #[test]
    fn test_request_headers() {
        let client = connected_client(MockTransport::scripted([]));
        let request = client.build_request("syncollec", "{}".to_string()).unwrap();

        assert_eq!(request.url, "http://collector.test/api/syncollec");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert_eq!(request.header("C-App-Key"), Some("app"));
        assert_eq!(request.header("C-Token"), Some("device+1"));
        assert_eq!(request.header("C-Show-Name"), Some("bench[rig]"));
        assert_eq!(request.header("C-Mark"), Some("client"));
    }

    #[tokio::test]
    async fn test_failed_send_is_replayed_exactly_once() {
        let transport = MockTransport::scripted([refused()]);
        let mut client = connected_client(transport.clone());

        let first = client
            .send("syncollec", &[Value::Int(1)], &Shape::Any)
            .await;
        assert_eq!(assert_ok!(first), None);
        assert_eq!(client.pending_retries(), 1);
        assert!(!client.is_connected());

        assert_eq!(assert_ok!(client.reconnect().await), 1);
        assert_eq!(client.pending_retries(), 0);
        assert!(client.is_connected());

        assert_ok!(client.send("syncollec", &[Value::Int(2)], &Shape::Any).await);
        assert_eq!(assert_ok!(client.reconnect().await), 0);

        let bodies = transport.bodies();
        assert_eq!(
            bodies,
            vec![
                r#"{"an":1,"a1":1}"#,
                r#"{"an":1,"a1":1}"#,
                r#"{"an":1,"a1":2}"#
            ]
        );
        // Replays carry the original headers
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn test_send_reconnects_before_posting() {
        let transport = MockTransport::scripted([refused()]);
        let mut client = connected_client(transport.clone());

        assert_ok!(client.send("m", &[Value::from("a")], &Shape::Any).await);
        assert_ok!(client.send("m", &[Value::from("b")], &Shape::Any).await);

        assert_eq!(
            transport.bodies(),
            vec![
                r#"{"an":1,"a1":"a"}"#,
                r#"{"an":1,"a1":"a"}"#,
                r#"{"an":1,"a1":"b"}"#
            ]
        );
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_replay_failing_again_is_requeued() {
        let transport = MockTransport::scripted([refused(), refused()]);
        let mut client = connected_client(transport.clone());

        assert_ok!(client.send("m", &[], &Shape::Any).await);
        assert_eq!(assert_ok!(client.reconnect().await), 1);
        assert_eq!(client.pending_retries(), 1);

        assert_eq!(assert_ok!(client.reconnect().await), 1);
        assert_eq!(client.pending_retries(), 0);
        assert_eq!(transport.bodies().len(), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_not_requeued() {
        let transport = MockTransport::scripted([TransportOutcome::Response {
            status: 500,
            body: "boom".to_string(),
        }]);
        let mut client = connected_client(transport.clone());

        let err = assert_err!(client.send("m", &[], &Shape::Any).await);
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("boom"));
        assert_eq!(client.pending_retries(), 0);

        assert_eq!(assert_ok!(client.reconnect().await), 0);
        assert_eq!(transport.bodies().len(), 1);
    }

    #[tokio::test]
    async fn test_call_surfaces_transport_failure() {
        let transport = MockTransport::scripted([refused()]);
        let mut client = connected_client(transport);

        let err = assert_err!(client.call("m", &[], &Shape::Any).await);
        assert!(matches!(err, SyncError::Transport(_)));
        assert_eq!(client.pending_retries(), 0);
    }

    #[tokio::test]
    async fn test_call_decodes_response_shape() {
        let transport = MockTransport::scripted([ok(r#"{"a":true,"b":false}"#), ok("  ")]);
        let mut client = connected_client(transport);

        let value = assert_ok!(client.call("m", &[], &Shape::map(Shape::Bool)).await);
        assert_eq!(value.get("a"), Some(&Value::Bool(true)));

        let empty = assert_ok!(client.call("m", &[], &Shape::Int).await);
        assert_eq!(empty, Value::Null);
    }

    #[tokio::test]
    async fn test_call_reports_decode_error() {
        let transport = MockTransport::scripted([ok("[1,2")]);
        let mut client = connected_client(transport);

        let err = assert_err!(client.call("m", &[], &Shape::list(Shape::Int)).await);
        assert!(matches!(err, SyncError::Decode(_)));
    }

    #[tokio::test]
    async fn test_disconnect_drops_queue() {
        let transport = MockTransport::scripted([refused()]);
        let mut client = connected_client(transport);
        assert_ok!(client.send("m", &[], &Shape::Any).await);

        client.disconnect();
        assert_eq!(client.state(), ClientState::Disconnected);
        assert_eq!(client.pending_retries(), 0);
        assert!(!client.is_connected());
        assert!(matches!(
            client.send("m", &[], &Shape::Any).await,
            Err(SyncError::NotConnected)
        ));
    }

    #[test]
    fn test_builder_without_connect() {
        let client = SyncClientBuilder::new()
            .endpoint("http://collector.test")
            .port(9000)
            .request_timeout(Duration::from_secs(1))
            .transport(MockTransport::scripted([]))
            .build()
            .unwrap();
        assert_eq!(client.state(), ClientState::Disconnected);
        assert_eq!(client.config().port, Some(9000));
    }
}

mod post_stream_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stream_runs_until_producer_is_exhausted() {
        let transport = MockTransport::scripted([ok("1"), ok("2"), ok("3")]);
        let mut client = connected_client(transport.clone());
        let (_tx, rx) = broadcast::channel(1);

        let end = client
            .post_stream(
                "syncollec",
                |ack: &i64| (*ack < 3).then(|| format!("payload-{}", ack)),
                Duration::from_secs(3),
                0i64,
                rx,
            )
            .await;

        assert_eq!(assert_ok!(end), StreamEnd::Exhausted);
        assert_eq!(
            transport.bodies(),
            vec![
                r#"{"an":1,"a1":"payload-0"}"#,
                r#"{"an":1,"a1":"payload-1"}"#,
                r#"{"an":1,"a1":"payload-2"}"#
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_resends_same_payload() {
        let transport = MockTransport::scripted([refused(), refused(), ok("1")]);
        let mut client = connected_client(transport.clone());
        let (_tx, rx) = broadcast::channel(1);
        let produced = Cell::new(0);

        let end = client
            .post_stream(
                "syncollec",
                |ack: &i64| {
                    produced.set(produced.get() + 1);
                    (*ack == 0).then(|| vec![Value::from("only")])
                },
                Duration::from_secs(3),
                0i64,
                rx,
            )
            .await;

        assert_eq!(assert_ok!(end), StreamEnd::Exhausted);
        let bodies = transport.bodies();
        assert_eq!(bodies.len(), 3);
        assert!(bodies.iter().all(|b| b == r#"{"an":1,"a1":["only"]}"#));
        assert_eq!(produced.get(), 2);
        assert_eq!(client.pending_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_aborts_stream() {
        let transport = MockTransport::scripted([TransportOutcome::Response {
            status: 400,
            body: "bad pack".to_string(),
        }]);
        let mut client = connected_client(transport.clone());
        let (_tx, rx) = broadcast::channel(1);
        let produced = Cell::new(0);

        let end = client
            .post_stream(
                "syncollec",
                |_: &Value| {
                    produced.set(produced.get() + 1);
                    Some(1i64)
                },
                Duration::from_secs(3),
                Value::Null,
                rx,
            )
            .await;

        let err = assert_err!(end);
        assert_eq!(err.status(), Some(400));
        assert_eq!(client.state(), ClientState::Aborted);
        assert_eq!(produced.get(), 1);
        assert_eq!(transport.bodies().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledgement_feeds_next_payload() {
        let transport = MockTransport::scripted([ok(r#"{"logIndex":5,"statIndex":2}"#)]);
        let mut client = connected_client(transport);
        let (_tx, rx) = broadcast::channel(1);
        let mut seen = Vec::new();

        let end = client
            .post_stream(
                "syncollec",
                |cursor: &Cursor| {
                    seen.push(*cursor);
                    (cursor.log_index == 0).then_some(true)
                },
                Duration::from_secs(1),
                Cursor::default(),
                rx,
            )
            .await;

        assert_eq!(assert_ok!(end), StreamEnd::Exhausted);
        assert_eq!(
            seen,
            vec![
                Cursor::default(),
                Cursor {
                    log_index: 5,
                    stat_index: 2
                }
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_start() {
        let transport = MockTransport::scripted([]);
        let mut client = connected_client(transport.clone());
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let end = client
            .post_stream("syncollec", |_: &Value| Some(1i64), Duration::from_secs(1), Value::Null, rx)
            .await;

        assert_eq!(assert_ok!(end), StreamEnd::Stopped);
        assert!(transport.bodies().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_resend_wait() {
        let transport = MockTransport::scripted((0..100).map(|_| refused()));
        let mut client = connected_client(transport.clone());
        let (tx, rx) = broadcast::channel(1);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let _ = tx.send(());
        });

        let end = client
            .post_stream("syncollec", |_: &Value| Some(1i64), Duration::from_secs(3), Value::Null, rx)
            .await;

        assert_eq!(assert_ok!(end), StreamEnd::Stopped);
        let attempts = transport.bodies().len();
        assert!((1..=5).contains(&attempts), "attempts = {}", attempts);
        // The undelivered payload is held for replay
        assert_eq!(client.pending_retries(), 1);
    }

    /// Refuses every request after a delay
    struct SlowRefusal {
        delay: Duration,
        attempts: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl Transport for SlowRefusal {
        async fn post(&self, _request: &OutboundRequest) -> TransportOutcome {
            *self.attempts.lock().unwrap() += 1;
            tokio::time::sleep(self.delay).await;
            refused()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_failure_during_shutdown_is_queued() {
        let transport = Arc::new(SlowRefusal {
            delay: Duration::from_secs(5),
            attempts: Mutex::new(0),
        });
        let mut client = SyncClientBuilder::new()
            .endpoint("http://collector.test")
            .transport(transport.clone())
            .connect()
            .build()
            .unwrap();
        let (tx, rx) = broadcast::channel(1);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = tx.send(());
        });

        let end = client
            .post_stream("syncollec", |_: &Value| Some(1i64), Duration::from_secs(3), Value::Null, rx)
            .await;

        assert_eq!(assert_ok!(end), StreamEnd::Stopped);
        assert_eq!(*transport.attempts.lock().unwrap(), 1);
        assert_eq!(client.pending_retries(), 1);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_stream_requires_connect() {
        let mut client = SyncClient::new(ClientConfig::default(), MockTransport::scripted([]));
        let (_tx, rx) = broadcast::channel(1);

        let end = client
            .post_stream("syncollec", |_: &Value| Some(1i64), Duration::from_secs(1), Value::Null, rx)
            .await;
        assert!(matches!(end, Err(SyncError::NotConnected)));
    }
}

mod http_tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn http_client(url: &str) -> SyncClient {
        SyncClientBuilder::new()
            .endpoint(url)
            .identity("app", "device+1", "bench")
            .request_timeout(Duration::from_secs(5))
            .connect()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_over_http() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/syncollec")
            .match_header("content-type", "application/json")
            .match_header("c-app-key", "app")
            .match_header("c-token", "device+1")
            .match_header("c-mark", "client")
            .match_body(Matcher::Exact(r#"{"an":2,"a1":"s","a2":42}"#.to_string()))
            .with_status(200)
            .with_body(r#"{"logIndex":3,"statIndex":1}"#)
            .create_async()
            .await;

        let mut client = http_client(&server.url());
        let value = client
            .send(
                "syncollec",
                &[Value::from("s"), Value::Int(42)],
                &<Cursor as crate::codec::WireFormat>::shape(),
            )
            .await;

        let value = assert_ok!(value).unwrap();
        assert_eq!(value.get("logIndex"), Some(&Value::Int(3)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_server_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/syncollec")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let mut client = http_client(&server.url());
        let err = assert_err!(client.send("syncollec", &[], &Shape::Any).await);
        match err {
            SyncError::Server { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(client.pending_retries(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_host_is_queued() {
        // Nothing listens on the discard port
        let mut client = http_client("http://127.0.0.1:9");
        let sent = client.send("syncollec", &[Value::Int(1)], &Shape::Any).await;
        assert_eq!(assert_ok!(sent), None);
        assert_eq!(client.pending_retries(), 1);
    }
}
