//! End-to-end tests against a local mock HTTP server.
//!
//! The mock server runs on its own tokio runtime while the blocking client
//! is driven from the test thread. Behaviour wiremock cannot express (slow
//! bodies, TLS) is served by small hand-written servers on plain threads.

use reqwest::StatusCode;
use rest_common::{
    ClientFactory, ClientProfile, CorrelationContext, RestClient, RestClientConfig,
};
use rcgen::CertifiedKey;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use serde_json::Value;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use test_utils::capture_logs;
use test_utils::fixtures::{SAMPLE_ORDER_RESPONSE, member_context, sample_order_request};
use tokio::runtime::Runtime;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    runtime: Runtime,
}

impl Harness {
    fn start() -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.uri())
    }
}

fn client(config: RestClientConfig) -> RestClient {
    ClientFactory::new(config)
        .build_profile(ClientProfile::Short)
        .unwrap()
}

fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/v1/ping")
}

/// Read up to the end of the request head. False if the peer went away.
fn read_request_head(stream: &mut impl Read) -> bool {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return false,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    true
}

/// Serve one response whose body arrives a byte at a time, `delay` apart.
fn spawn_trickling_server(body: &'static [u8], delay: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        if !read_request_head(&mut stream) {
            return;
        }
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).unwrap();
        for byte in body {
            thread::sleep(delay);
            stream.write_all(&[*byte]).unwrap();
            stream.flush().unwrap();
        }
    });

    format!("http://{addr}/v1/report")
}

/// HTTPS server with a self-signed certificate issued for another host.
fn spawn_self_signed_server() -> String {
    let CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["wrong-host.invalid".to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert.der().clone()], key)
    .unwrap();
    let config = Arc::new(config);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let Ok(conn) = ServerConnection::new(Arc::clone(&config)) else {
                return;
            };
            let mut tls = StreamOwned::new(conn, stream);
            if read_request_head(&mut tls) {
                let _ = tls.write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\nsecure",
                );
                tls.conn.send_close_notify();
                let _ = tls.flush();
            }
        }
    });

    format!("https://{addr}/v1/secure")
}

#[test]
fn test_success_is_traced_once_and_body_stays_readable() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(query_param("dryRun", "true"))
            .and(body_string(r#"{"sku":"A-100","quantity":2}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_ORDER_RESPONSE)),
    );

    let client = client(RestClientConfig::default());
    let ctx = CorrelationContext::new("trace-ok", "member-1");
    let request = sample_order_request(&harness.server.uri());

    let (result, logs) = capture_logs(|| client.execute(&ctx, &request));
    let response = result.unwrap();

    let records = logs.rest_logs();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["traceId"], "trace-ok");
    assert_eq!(record["callerId"], "member-1");
    assert_eq!(record["request"]["host"], "127.0.0.1");
    assert_eq!(record["request"]["url"], "/v1/orders");
    assert_eq!(record["request"]["method"], "POST");
    assert_eq!(record["request"]["queryString"], "dryRun=true");
    assert_eq!(record["request"]["body"], r#"{"sku":"A-100","quantity":2}"#);
    assert_eq!(record["response"]["status"], 200);
    assert!(record["response"]["duration"].is_u64());

    // The caller reads exactly what was logged.
    let body = response.text().unwrap();
    assert_eq!(record["response"]["payload"], body.as_str());
    let parsed: Value = response.json().unwrap();
    assert_eq!(parsed["orderId"], "ord-1");
}

#[test]
fn test_non_200_is_returned_and_flagged_not_raised() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/v1/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here")),
    );

    let client = client(RestClientConfig::default());
    let (result, logs) = capture_logs(|| {
        client
            .get(&harness.url("/v1/missing"))?
            .send(&CorrelationContext::empty())
    });

    let response = result.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().unwrap(), "not here");

    let records = logs.rest_logs();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["response"]["status"], 404);
    assert_eq!(records[0]["traceId"], "");
    assert_eq!(records[0]["callerId"], "");
    assert_eq!(logs.containing("check rest client, http code=404").len(), 1);
}

#[test]
fn test_201_is_flagged_but_delivered() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("PUT"))
            .and(path("/v1/items/7"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created")),
    );

    let client = client(RestClientConfig::default());
    let (result, logs) = capture_logs(|| {
        client
            .put(&harness.url("/v1/items/7"))?
            .body("payload")
            .send(&CorrelationContext::empty())
    });

    assert_eq!(result.unwrap().status(), StatusCode::CREATED);
    assert_eq!(logs.containing("check rest client, http code=201").len(), 1);
}

#[test]
fn test_connection_refused_raises_exchange_error_after_logging() {
    let client = client(RestClientConfig::default());
    let url = unused_local_url();

    let (result, logs) = capture_logs(|| {
        client
            .get(&url)?
            .send(&CorrelationContext::new("trace-down", "member-2"))
    });

    let err = result.unwrap_err();
    assert!(err.is_exchange_error());
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(err.code(), "E-COM-0003");

    let records = logs.rest_logs();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["traceId"], "trace-down");
    assert!(records[0]["response"]["status"].is_null());
    assert!(records[0]["response"]["duration"].is_null());
    assert_eq!(records[0]["response"]["payload"], "");
}

#[test]
fn test_read_timeout_raises_exchange_error() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/v1/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3))),
    );

    let client = ClientFactory::new(RestClientConfig::default())
        .build_client(Duration::from_millis(500))
        .unwrap();

    let (result, logs) = capture_logs(|| {
        client
            .get(&harness.url("/v1/slow"))?
            .send(&CorrelationContext::empty())
    });

    assert!(result.unwrap_err().is_exchange_error());
    assert_eq!(logs.rest_logs().len(), 1);
}

#[test]
fn test_pool_capacity_serializes_concurrent_calls() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/v1/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300))),
    );

    let client = client(RestClientConfig::default().with_pool_limits(1, 1));
    let url = harness.url("/v1/slow");
    let started = Instant::now();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            thread::spawn(move || {
                client
                    .get(&url)
                    .and_then(|request| request.send(&member_context("member-7")))
                    .map(|response| response.status())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), StatusCode::OK);
    }
    assert!(started.elapsed() >= Duration::from_millis(550));
}

#[test]
fn test_read_timeout_applies_per_read_not_to_whole_body() {
    let url = spawn_trickling_server(b"abcdef", Duration::from_millis(250));
    let client = ClientFactory::new(RestClientConfig::default())
        .build_client(Duration::from_secs(1))
        .unwrap();

    let started = Instant::now();
    let response = client
        .get(&url)
        .and_then(|request| request.send(&CorrelationContext::empty()))
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(1_400));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().unwrap(), "abcdef");
}

#[test]
fn test_insecure_skip_verify_accepts_self_signed_certificate_for_other_host() {
    let url = spawn_self_signed_server();
    let client = client(RestClientConfig::default().with_insecure_skip_verify(true));

    let response = client
        .get(&url)
        .and_then(|request| request.send(&CorrelationContext::empty()))
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().unwrap(), "secure");
}

#[test]
fn test_verification_rejects_self_signed_certificate_when_enabled() {
    let url = spawn_self_signed_server();
    let client = client(RestClientConfig::default().with_insecure_skip_verify(false));

    let (result, logs) = capture_logs(|| {
        client
            .get(&url)?
            .send(&CorrelationContext::new("trace-tls", "member-3"))
    });

    let err = result.unwrap_err();
    assert!(err.is_exchange_error());
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));

    let records = logs.rest_logs();
    assert_eq!(records.len(), 1);
    assert!(records[0]["response"]["status"].is_null());
}
