mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use campaign_pipeline::server::{create_server, AppState};
use common::{harness, Harness, CAMPAIGN_CSV};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "campaign-form-boundary";

fn app(h: &Harness) -> Router {
    let state = AppState::new(h.pipeline.clone(), None, 25 * 1024 * 1024);
    create_server(Arc::new(state))
}

fn multipart_upload(file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> Result<String> {
    let bytes = hyper::body::to_bytes(response.into_body()).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let h = harness();
    let response = app(&h).oneshot(get("/health")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await?)?;
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_index_serves_upload_form() -> Result<()> {
    let h = harness();
    let response = app(&h).oneshot(get("/")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await?;
    assert!(html.contains("enctype=\"multipart/form-data\""));
    assert!(html.contains("No runs recorded yet"));
    Ok(())
}

#[tokio::test]
async fn test_upload_runs_pipeline_and_offers_download() -> Result<()> {
    let h = harness();
    let app = app(&h);

    let response = app
        .clone()
        .oneshot(multipart_upload("campaigns.csv", CAMPAIGN_CSV.as_bytes()))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await?;
    assert!(html.contains("Pipeline completed!"));
    assert!(html.contains("facebook_spring"));

    let start = html.find("/runs/").expect("download link") + "/runs/".len();
    let run_id = &html[start..start + 36];

    let response = app
        .clone()
        .oneshot(get(&format!("/runs/{run_id}/download")))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()?
        .starts_with("text/csv"));
    let csv = body_text(response).await?;
    assert!(csv.starts_with("id,c_date,campaign_name"));
    assert_eq!(csv.lines().count(), 4);

    // the run now shows up in the history on the form page
    let html = body_text(app.oneshot(get("/")).await?).await?;
    assert!(html.contains("campaigns.csv"));
    assert!(html.contains("succeeded"));
    Ok(())
}

#[tokio::test]
async fn test_unsupported_upload_is_a_bad_request() -> Result<()> {
    let h = harness();
    let response = app(&h)
        .oneshot(multipart_upload("report.pdf", b"%PDF-1.4"))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await?;
    assert!(html.contains("Pipeline failed"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_run_download_is_not_found() -> Result<()> {
    let h = harness();
    let response = app(&h)
        .oneshot(get("/runs/00000000-0000-0000-0000-000000000000/download"))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_metrics_without_recorder_is_not_found() -> Result<()> {
    let h = harness();
    let response = app(&h).oneshot(get("/metrics")).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
