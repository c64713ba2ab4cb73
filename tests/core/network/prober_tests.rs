use ccswitch::core::network::prober::{classify_status, StatusClass};
use ccswitch::core::network::{
    CapabilityProbe, NetworkError, Prober, ProberOptions, TransportError, ALL_PROBES_FAILED,
};
use ccswitch::profiles::Profile;
use std::time::Duration;

use crate::common::{fast_options, ok, profile, refused, MockHttpClient};

const BASE: &str = "https://api.one.test";

fn prober(client: &MockHttpClient, options: ProberOptions) -> Prober {
    Prober::with_client(Box::new(client.clone()), options)
}

#[tokio::test]
async fn test_first_probe_success_short_circuits() {
    let client = MockHttpClient::new().script(BASE, vec![ok(200)]);
    let verdict = prober(&client, fast_options())
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert!(verdict.available);
    assert_eq!(verdict.status_code, Some(200));
    assert_eq!(verdict.capabilities, vec!["Claude".to_string()]);
    assert_eq!(verdict.probed_endpoint, "Claude:/v1/messages");
    assert_eq!(verdict.error_message, None);
    assert_eq!(verdict.latency_ms, Some(42));
    assert_eq!(client.call_count(), 1, "no retries and no second probe");
}

#[tokio::test]
async fn test_connection_refused_everywhere() {
    let client = MockHttpClient::new().script(BASE, vec![refused()]);
    let verdict = prober(&client, fast_options())
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert!(!verdict.available);
    assert_eq!(verdict.status_code, None);
    assert_eq!(verdict.error_message.as_deref(), Some("connection refused"));
    assert_eq!(verdict.probed_endpoint, ALL_PROBES_FAILED);
    assert!(verdict.capabilities.is_empty());

    // N + 1 attempts for each capability probe
    assert_eq!(client.calls_for_model("claude-sonnet-4-20250514"), 3);
    assert_eq!(client.calls_for_model("gpt-5"), 3);
}

#[tokio::test]
async fn test_rate_limited_is_reachable_without_capabilities() {
    let client = MockHttpClient::new().script(BASE, vec![ok(429)]);
    let verdict = prober(&client, fast_options())
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert!(verdict.available);
    assert_eq!(verdict.status_code, Some(429));
    assert!(verdict.capabilities.is_empty());
    assert_eq!(
        verdict.error_message.as_deref(),
        Some("rate limited, service reachable")
    );
    // A recognized status is conclusive: one attempt per probe
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn test_retry_bound_respects_configuration() {
    let client = MockHttpClient::new().script(BASE, vec![ok(503)]);
    let options = ProberOptions {
        max_retries: 4,
        capabilities: vec![CapabilityProbe::new("Claude", "claude-sonnet-4-20250514")],
        ..fast_options()
    };

    let verdict = prober(&client, options)
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert_eq!(client.call_count(), 5);
    assert!(!verdict.available);
    assert_eq!(verdict.status_code, Some(503));
    assert_eq!(verdict.error_message.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let client = MockHttpClient::new().script(BASE, vec![refused(), ok(502), ok(200)]);
    let verdict = prober(&client, fast_options())
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert!(verdict.available);
    assert_eq!(verdict.capabilities, vec!["Claude".to_string()]);
    assert_eq!(client.call_count(), 3);
}

#[tokio::test]
async fn test_success_on_second_probe_beats_restricted_first() {
    let client = MockHttpClient::new().script(BASE, vec![ok(400), ok(200)]);
    let verdict = prober(&client, fast_options())
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert!(verdict.is_full_success());
    assert_eq!(verdict.status_code, Some(200));
    assert_eq!(verdict.probed_endpoint, "GPT:/v1/messages");
    assert_eq!(verdict.capabilities, vec!["GPT".to_string()]);
    assert_eq!(verdict.error_message, None);
}

#[tokio::test]
async fn test_first_restricted_verdict_wins_tie() {
    let client = MockHttpClient::new().script(BASE, vec![ok(422), ok(429)]);
    let verdict = prober(&client, fast_options())
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert!(verdict.available);
    assert_eq!(verdict.status_code, Some(422));
    assert_eq!(verdict.error_message.as_deref(), Some("model not supported"));
    assert_eq!(verdict.probed_endpoint, "Claude:/v1/messages");
}

#[tokio::test]
async fn test_exhaustive_mode_collects_every_capability() {
    let client = MockHttpClient::new().script(BASE, vec![ok(200), ok(200)]);
    let options = ProberOptions {
        exhaustive: true,
        ..fast_options()
    };

    let verdict = prober(&client, options)
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert_eq!(
        verdict.capabilities,
        vec!["Claude".to_string(), "GPT".to_string()]
    );
    assert_eq!(verdict.probed_endpoint, "Claude:/v1/messages");
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn test_mixed_failures_use_generic_reason() {
    let client = MockHttpClient::new().script(
        BASE,
        vec![refused(), refused(), refused(), ok(500), ok(500), ok(500)],
    );
    let verdict = prober(&client, fast_options())
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert!(!verdict.available);
    assert_eq!(
        verdict.error_message.as_deref(),
        Some("all capability probes failed")
    );
    assert_eq!(verdict.status_code, Some(500));
}

#[tokio::test]
async fn test_attempt_timeout_is_enforced() {
    let client = MockHttpClient::new()
        .script(BASE, vec![ok(200)])
        .with_delay(BASE, Duration::from_millis(500));
    let options = ProberOptions {
        timeout_ms: 50,
        max_retries: 0,
        capabilities: vec![CapabilityProbe::new("Claude", "claude-sonnet-4-20250514")],
        ..fast_options()
    };

    let verdict = prober(&client, options)
        .probe(&profile("one", BASE))
        .await
        .unwrap();

    assert!(!verdict.available);
    assert_eq!(verdict.status_code, None);
    assert_eq!(verdict.error_message.as_deref(), Some("Timeout (50ms)"));
}

#[tokio::test]
async fn test_request_shape() {
    let client = MockHttpClient::new().script(BASE, vec![ok(200)]);
    let p = profile("one", &format!("{}/", BASE));
    prober(&client, fast_options()).probe(&p).await.unwrap();

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.url, "https://api.one.test/v1/messages");
    assert_eq!(
        request.headers.get("Authorization"),
        Some(&format!("Bearer {}", p.credential))
    );
    assert_eq!(request.body["model"], "claude-sonnet-4-20250514");
    assert_eq!(request.body["max_tokens"], 1);
    assert_eq!(request.body["messages"][0]["role"], "user");
    assert_eq!(request.body["messages"][0]["content"], "test");
}

#[tokio::test]
async fn test_malformed_profile_is_an_error() {
    let client = MockHttpClient::new();
    let prober = prober(&client, fast_options());

    let missing_url = Profile::new("bad", "", "sk-test-0123456789");
    assert!(matches!(
        prober.probe(&missing_url).await,
        Err(NetworkError::InvalidProfile(_))
    ));

    let wrong_scheme = Profile::new("bad", "ftp://files.test", "sk-test-0123456789");
    assert!(matches!(
        prober.probe(&wrong_scheme).await,
        Err(NetworkError::InvalidProfile(_))
    ));

    let empty_key = Profile::new("bad", BASE, "  ");
    assert!(matches!(
        prober.probe(&empty_key).await,
        Err(NetworkError::InvalidProfile(_))
    ));

    assert_eq!(client.call_count(), 0);
}

#[test]
fn test_status_classification() {
    assert_eq!(classify_status(200), StatusClass::Supported);
    assert_eq!(classify_status(204), StatusClass::Supported);
    for status in [400, 401, 403, 422, 429] {
        assert!(matches!(classify_status(status), StatusClass::Restricted(_)));
    }
    assert_eq!(classify_status(404), StatusClass::Inconclusive);
    assert_eq!(classify_status(500), StatusClass::Inconclusive);
    assert_eq!(
        classify_status(401),
        StatusClass::Restricted("authentication failed, check the API key")
    );
}

#[test]
fn test_transport_error_reasons() {
    assert_eq!(TransportError::Timeout.reason(8000), "Timeout (8s)");
    assert_eq!(
        TransportError::from_message("getaddrinfo ENOTFOUND api.test").reason(8000),
        "DNS resolution failed"
    );
    assert_eq!(
        TransportError::from_message("Connection refused (os error 111)").reason(8000),
        "connection refused"
    );
    assert_eq!(
        TransportError::from_message("connect ETIMEDOUT").reason(8000),
        "connection timed out"
    );
    assert_eq!(
        TransportError::from_message("tls handshake failed").reason(8000),
        "tls handshake failed"
    );
}

#[tokio::test(start_paused = true)]
async fn test_default_backoff_waits_between_attempts_only() {
    let client = MockHttpClient::new().script(BASE, vec![refused()]);
    let prober = prober(&client, ProberOptions::default());

    let started = tokio::time::Instant::now();
    let verdict = prober.probe(&profile("one", BASE)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(!verdict.available);
    assert_eq!(client.call_count(), 6);
    // Two probes, two 1s sleeps each, nothing after the final attempt
    assert!(elapsed >= Duration::from_secs(4), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "elapsed {:?}", elapsed);
}

/// Serve canned HTTP responses on a loopback port, reading each full request first
#[cfg(feature = "network-monitoring")]
async fn serve_loopback(status_line: &'static str, body: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                if let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&received[..end]).to_lowercase();
                    let length = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if received.len() >= end + 4 + length {
                        break;
                    }
                }
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&buf[..n]),
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{}", addr)
}

#[cfg(feature = "network-monitoring")]
#[tokio::test]
#[serial_test::serial]
async fn test_isahc_client_reads_status_and_drains_body() {
    let saved = std::env::var("NO_PROXY").ok();
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let base_url = serve_loopback("200 OK", r#"{"id":"msg_1","type":"message"}"#).await;
    let verdict = Prober::new(fast_options())
        .unwrap()
        .probe(&profile("local", &base_url))
        .await
        .unwrap();

    let limited = serve_loopback("429 Too Many Requests", r#"{"error":"slow down"}"#).await;
    let restricted = Prober::new(fast_options())
        .unwrap()
        .probe(&profile("limited", &limited))
        .await
        .unwrap();

    match saved {
        Some(value) => std::env::set_var("NO_PROXY", value),
        None => std::env::remove_var("NO_PROXY"),
    }

    assert!(verdict.available);
    assert_eq!(verdict.status_code, Some(200));
    assert_eq!(verdict.capabilities, vec!["Claude".to_string()]);

    assert!(restricted.available);
    assert_eq!(restricted.status_code, Some(429));
    assert!(restricted.capabilities.is_empty());
}
