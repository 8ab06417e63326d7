//! HTTP-level behaviour of the intake endpoints.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use nepi_core::{BackendError, Config, PdfBackend};
use nepi_facts::HeuristicStrategy;
use nepi_ingest::{Pipeline, RemoteFetcher, TextExtractor};
use nepi_web::{AppState, LocalBlobStore, router};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "nepi-test-boundary";

struct FixedBackend(Option<&'static str>);

impl PdfBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    fn extract_text(&self, _data: &[u8]) -> Result<String, BackendError> {
        self.0
            .map(String::from)
            .ok_or_else(|| BackendError::ExtractionError("no text layer".into()))
    }
}

fn state(upload_dir: &Path, base_url: Option<&str>, primary: FixedBackend, fallback: FixedBackend) -> Arc<AppState> {
    let config = Config {
        upload_dir: upload_dir.to_path_buf(),
        ..Config::default()
    };
    let pipeline = Pipeline::new(
        TextExtractor::new(Arc::new(primary), Arc::new(fallback), 50, 200_000),
        Arc::new(HeuristicStrategy::new()),
        4000,
    );
    let mut fetcher = RemoteFetcher::new(reqwest::Client::new(), Duration::from_secs(5), 1024 * 1024);
    if let Some(base) = base_url {
        fetcher = fetcher.with_base_url(base.parse().unwrap());
    }
    Arc::new(AppState {
        blobs: Arc::new(LocalBlobStore::new(upload_dir)),
        config,
        pipeline,
        fetcher,
    })
}

fn default_state(upload_dir: &Path) -> Arc<AppState> {
    state(upload_dir, None, FixedBackend(None), FixedBackend(None))
}

/// Encode `(field, filename, content type, data)` parts as multipart/form-data.
fn multipart(parts: &[(&str, Option<&str>, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content_type, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{name}\"");
        if let Some(f) = filename {
            disposition.push_str(&format!("; filename=\"{f}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(ct) = content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart(&[("file", Some(filename), Some(content_type), data)])))
        .unwrap()
}

fn json_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/extract")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(state: Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn text_upload_yields_meter_and_usage() {
    let dir = tempfile::tempdir().unwrap();
    let text = b"Electricity account\nNMI: 6305123456\nTotal usage 1200 kWh\n";
    let (status, body) = send(
        default_state(dir.path()),
        upload_request("/api/extract", "bill.txt", "text/plain", text),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["keyInfo"]["nmi"], "6305123456");
    assert_eq!(body["keyInfo"]["electricity_kwh"], 1200.0);
    assert!(body["keyInfo"].get("has_pv").is_none());
    assert_eq!(body["meta"]["filename"], "bill.txt");
    assert_eq!(body["meta"]["contentType"], "text/plain");
    assert_eq!(body["meta"]["size"], text.len());
    assert_eq!(body["extractionMethod"], "rawDecode");
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn inverter_mention_sets_pv() {
    let dir = tempfile::tempdir().unwrap();
    let text = b"Site audit notes: 5 kW inverter on the north roof.";
    let (_, body) = send(
        default_state(dir.path()),
        upload_request("/api/extract", "audit.txt", "text/plain", text),
    )
    .await;

    assert_eq!(body["keyInfo"]["has_pv"], true);
}

#[tokio::test]
async fn unreadable_pdf_returns_empty_record() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(dir.path(), None, FixedBackend(None), FixedBackend(Some("")));
    let (status, body) = send(
        state,
        upload_request("/api/extract", "scan.pdf", "application/pdf", b"%PDF-1.4 scanned"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["preview"], "");
    assert_eq!(body["previewChars"], 0);
    assert_eq!(body["keyInfo"], serde_json::json!({}));
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn remote_404_fails_with_status_in_message() {
    let dir = tempfile::tempdir().unwrap();
    let remote = serve(axum::Router::new()).await;
    let (status, body) = send(
        default_state(dir.path()),
        json_request(&format!(r#"{{"url": "{remote}/missing.pdf"}}"#)),
    )
    .await;

    assert!(!status.is_success());
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn zip_upload_is_noted_without_key_info() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        default_state(dir.path()),
        upload_request("/api/extract", "bills.zip", "application/zip", b"PK\x03\x04rest"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["note"].as_str().unwrap().contains("Unsupported file type"));
    assert!(body.get("keyInfo").is_none());
    assert!(body.get("preview").is_none());
    assert_eq!(body["meta"]["filename"], "bills.zip");
}

#[tokio::test]
async fn thousands_separators_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    let (_, body) = send(
        default_state(dir.path()),
        upload_request("/api/extract", "q.txt", "text/plain", b"Quarterly usage: 14,500.5 kWh"),
    )
    .await;

    assert_eq!(body["keyInfo"]["electricity_kwh"], 14500.5);
}

#[tokio::test]
async fn no_source_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/api/extract")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(default_state(dir.path()), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().starts_with("No file provided"));
}

#[tokio::test]
async fn malformed_json_without_query_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(default_state(dir.path()), json_request("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn query_url_is_used_for_get() {
    let dir = tempfile::tempdir().unwrap();
    let remote = serve(axum::Router::new().route(
        "/usage.csv",
        get(|| async { ([(CONTENT_TYPE, "text/csv")], "mirn,mj\nMIRN 5330098765,38200 MJ\n") }),
    ))
    .await;
    let req = Request::builder()
        .uri(format!("/api/extract?url={}", urlencoding::encode(&format!("{remote}/usage.csv"))))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(default_state(dir.path()), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["filename"], "usage.csv");
    assert_eq!(body["keyInfo"]["mirn"], "5330098765");
    assert_eq!(body["keyInfo"]["gas_mj"], 38200.0);
}

#[tokio::test]
async fn multipart_url_field_is_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let remote = serve(axum::Router::new().route(
        "/water.txt",
        get(|| async { ([(CONTENT_TYPE, "text/plain")], "Water consumed: 12.5 kL") }),
    ))
    .await;
    let url = format!("{remote}/water.txt");
    let req = Request::builder()
        .method("POST")
        .uri("/api/extract")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart(&[("blobUrl", None, None, url.as_bytes())])))
        .unwrap();
    let (status, body) = send(default_state(dir.path()), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keyInfo"]["water_kl"], 12.5);
}

#[tokio::test]
async fn non_http_url_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(default_state(dir.path()), json_request(r#"{"url": "ftp://x.test/a.pdf"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ftp"));
}

#[tokio::test]
async fn upload_rejects_non_multipart_body_with_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"url":"https://x.test/a.pdf"}"#))
        .unwrap();
    let (status, body) = send(default_state(dir.path()), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart(&[("note", None, None, b"hello")])))
        .unwrap();
    let (status, body) = send(default_state(dir.path()), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn uploaded_file_can_be_extracted_by_relative_url() {
    let dir = tempfile::tempdir().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = router(state(dir.path(), Some(&base), FixedBackend(None), FixedBackend(None)));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let client = reqwest::Client::new();

    let uploaded: Value = client
        .post(format!("{base}/api/upload"))
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(multipart(&[(
            "file",
            Some("Q1 bill.txt"),
            Some("text/plain"),
            b"NMI 6305123456 used 980 kWh",
        )]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(uploaded["ok"], true);
    assert_eq!(uploaded["fileUrl"], "/uploads/Q1%20bill.txt");
    assert_eq!(uploaded["meta"]["type"], "text/plain");
    assert_eq!(uploaded["message"], "Upload successful");
    assert!(dir.path().join("Q1 bill.txt").exists());

    let extracted: Value = client
        .post(format!("{base}/api/extract"))
        .json(&serde_json::json!({ "url": uploaded["fileUrl"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(extracted["ok"], true);
    assert_eq!(extracted["meta"]["filename"], "Q1 bill.txt");
    assert_eq!(extracted["keyInfo"]["electricity_kwh"], 980.0);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let base = default_state(dir.path());
    let state = Arc::new(AppState {
        config: Config {
            max_source_bytes: 16,
            ..base.config.clone()
        },
        pipeline: Pipeline::new(
            TextExtractor::new(Arc::new(FixedBackend(None)), Arc::new(FixedBackend(None)), 50, 200_000),
            Arc::new(HeuristicStrategy::new()),
            4000,
        ),
        fetcher: base.fetcher.clone(),
        blobs: Arc::new(LocalBlobStore::new(dir.path())),
    });
    let (status, body) = send(
        state,
        upload_request("/api/extract", "big.txt", "text/plain", &[b'a'; 64]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["ok"], false);
}
