mod common;

use common::{proxy_config, spawn_proxy, start_programmable_backend};
use reqwest::StatusCode;
use sdk_rust::ProxyClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_breaker_opens_without_backend_call() {
    let backend = start_programmable_backend(|_| async { (500, "{}".to_string()) }).await;
    let proxy = spawn_proxy(proxy_config(&[(backend.addr, None)])).await;
    let client = ProxyClient::new(&proxy.url);

    for _ in 0..20 {
        let resp = client.get_user(1, None).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(backend.hits(), 20);

    let resp = client.get_user(1, None).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.bytes().await.unwrap().is_empty());
    assert_eq!(backend.hits(), 20);
}

#[tokio::test]
async fn test_breaker_counts_not_found_as_failure() {
    let backend = start_programmable_backend(|_| async { (404, "{}".to_string()) }).await;
    let mut config = proxy_config(&[(backend.addr, None)]);
    config.circuit_breaker.sliding_window_size = 4;
    let proxy = spawn_proxy(config).await;
    let client = ProxyClient::new(&proxy.url);

    for _ in 0..4 {
        let resp = client.get_user(9, None).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
    let resp = client.get_user(9, None).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(backend.hits(), 4);
}

#[tokio::test]
async fn test_slow_backend_opens_breaker() {
    let backend = start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(250)).await;
        (200, r#"{"id":1}"#.to_string())
    })
    .await;
    let mut config = proxy_config(&[(backend.addr, None)]);
    config.circuit_breaker.sliding_window_size = 4;
    config.circuit_breaker.slow_call_duration_ms = 100;
    let proxy = spawn_proxy(config).await;
    let client = ProxyClient::new(&proxy.url);

    // Successful but slow; only the slow-call rate trips the breaker.
    for _ in 0..4 {
        let resp = client.get_user(1, None).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let resp = client.get_user(1, None).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(backend.hits(), 4);
}

#[tokio::test]
async fn test_other_routes_are_not_guarded() {
    let backend = start_programmable_backend(|_| async { (500, "\"boom\"".to_string()) }).await;
    let mut config = proxy_config(&[(backend.addr, None)]);
    config.circuit_breaker.sliding_window_size = 2;
    let proxy = spawn_proxy(config).await;
    let client = ProxyClient::new(&proxy.url);

    for _ in 0..5 {
        let resp = client.http_status(500).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(backend.hits(), 5);
}

#[tokio::test]
async fn test_half_open_recovers() {
    let healthy = Arc::new(AtomicBool::new(false));
    let flag = healthy.clone();
    let backend = start_programmable_backend(move |_| {
        let ok = flag.load(Ordering::SeqCst);
        async move {
            if ok {
                (200, r#"{"id":1}"#.to_string())
            } else {
                (503, "{}".to_string())
            }
        }
    })
    .await;

    let mut config = proxy_config(&[(backend.addr, None)]);
    config.circuit_breaker.sliding_window_size = 4;
    config.circuit_breaker.wait_duration_in_open_ms = 200;
    let proxy = spawn_proxy(config).await;
    let client = ProxyClient::new(&proxy.url);

    for _ in 0..4 {
        client.get_user(1, None).await.unwrap();
    }
    let resp = client.get_user(1, None).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(backend.hits(), 4);

    healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Five sequential trial calls, then the breaker is closed again.
    for _ in 0..5 {
        let resp = client.get_user(1, None).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    for _ in 0..3 {
        let resp = client.get_user(1, None).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    assert_eq!(backend.hits(), 12);
}
