use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use host_recon_rs::config::ScanConfig;
use host_recon_rs::geoip::DisabledGeo;
use host_recon_rs::server::router;
use host_recon_rs::session::ScanSession;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

fn app() -> axum::Router {
    let cfg = ScanConfig {
        connect_timeout: Duration::from_millis(300),
        banner_timeout: Duration::from_millis(200),
        max_range_width: 1_024,
        ..ScanConfig::default()
    };
    let session = Arc::new(ScanSession::new(cfg, Arc::new(DisabledGeo)).unwrap());
    router(session, "static")
}

fn scan_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn spawn_greeter() -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = sock.write_all(b"SSH-2.0-OpenSSH_8.9\r\n").await;
                tokio::time::sleep(Duration::from_secs(1)).await;
            });
        }
    });
    port
}

#[tokio::test]
async fn export_before_scan_is_404() {
    let resp = app()
        .oneshot(Request::get("/export/json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let v = body_json(resp).await;
    assert_eq!(v["error"], "no_result_available");
}

#[tokio::test]
async fn inverted_range_is_400() {
    let resp = app()
        .oneshot(scan_request(
            "/scan",
            serde_json::json!({ "target": "127.0.0.1", "start": 500, "end": 100 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "invalid_range");
}

#[tokio::test]
async fn malformed_scan_body_is_json_400() {
    let app = app();
    for body in [
        serde_json::json!({ "target": "127.0.0.1", "start": null, "end": 10 }),
        serde_json::json!({ "target": "127.0.0.1", "start": "one", "end": 10 }),
        serde_json::json!({ "start": 1, "end": 10 }),
    ] {
        let resp = app.clone().oneshot(scan_request("/scan", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v = body_json(resp).await;
        assert_eq!(v["error"], "invalid_request");
        assert!(!v["message"].as_str().unwrap().is_empty());
    }

    let resp = app
        .oneshot(
            Request::post("/scan")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "invalid_request");
}

#[tokio::test]
async fn scan_then_export_csv() {
    let port = spawn_greeter().await;
    let app = app();

    let resp = app
        .clone()
        .oneshot(scan_request(
            "/scan",
            serde_json::json!({ "target": "127.0.0.1", "start": port, "end": port }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["ports"][0]["port"], port);
    assert_eq!(v["ports"][0]["service"], "SSH");
    assert!(v["ports"][0]["response_ms"].is_u64());
    assert!(v.get("geoip").is_none());

    let resp = app
        .clone()
        .oneshot(Request::get("/export/csv").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=scan_result.csv"
    );
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-store");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.starts_with("Target,IP,Country"));
    assert!(body.contains("SSH-2.0-OpenSSH_8.9\\r\\n"));

    let resp = app
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = body_json(resp).await;
    assert_eq!(status["state"], "done");
    assert_eq!(status["open"], 1);
}

#[tokio::test]
async fn minimal_mode_returns_open_port_list() {
    let port = spawn_greeter().await;
    let resp = app()
        .oneshot(scan_request(
            "/scan?mode=minimal",
            serde_json::json!({ "target": "127.0.0.1", "start": port, "end": port }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, serde_json::json!({ "open_ports": [port] }));
}
