//! Review router: upload form, HTML and JSON review endpoints, health.
//!
//! Both review endpoints take a multipart body with `spec` and `submittal`
//! files and run the pipeline off the async runtime.

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::render::{render_report_html, UPLOAD_PAGE_HTML};
use crate::api::types::AppState;
use crate::config::APP_VERSION;
use crate::pipeline::types::Report;

pub fn review_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_upload_page))
        .route("/health", get(health))
        .route("/review", post(review_html))
        .route("/api/review", post(review_json))
        .layer(DefaultBodyLimit::max(state.body_limit()))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: APP_VERSION,
        model: state.pipeline.model_name().to_string(),
    })
}

async fn serve_upload_page() -> Html<&'static str> {
    Html(UPLOAD_PAGE_HTML)
}

async fn review_html(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, ApiError> {
    let report = review(&state, multipart).await?;
    Ok(Html(render_report_html(&report)))
}

async fn review_json(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Report>, ApiError> {
    let report = review(&state, multipart).await?;
    Ok(Json(report))
}

struct Uploads {
    spec: Vec<u8>,
    submittal: Vec<u8>,
}

async fn review(state: &AppState, multipart: Multipart) -> Result<Report, ApiError> {
    let uploads = read_uploads(multipart, state.max_upload_bytes).await?;
    tracing::info!(
        spec_bytes = uploads.spec.len(),
        submittal_bytes = uploads.submittal.len(),
        "Review request received"
    );

    let pipeline = state.pipeline.clone();
    let text = state.text.clone();
    tokio::task::spawn_blocking(move || {
        pipeline.run_documents(text.as_ref(), &uploads.spec, &uploads.submittal)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("review task failed: {e}")))
}

async fn read_uploads(mut multipart: Multipart, limit: usize) -> Result<Uploads, ApiError> {
    let mut spec = None;
    let mut submittal = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(upload_error("request", limit, e)),
        };
        let name = field.name().unwrap_or("").to_string();
        let slot = match name.as_str() {
            "spec" => &mut spec,
            "submittal" => &mut submittal,
            _ => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error(&name, limit, e))?;
        if bytes.len() > limit {
            return Err(ApiError::PayloadTooLarge { field: name, limit });
        }
        *slot = Some(bytes.to_vec());
    }

    match (spec, submittal) {
        (Some(spec), Some(submittal)) => Ok(Uploads { spec, submittal }),
        (None, _) => Err(ApiError::BadRequest("Missing 'spec' file".into())),
        (_, None) => Err(ApiError::BadRequest("Missing 'submittal' file".into())),
    }
}

fn upload_error(field: &str, limit: usize, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            field: field.to_string(),
            limit,
        }
    } else {
        tracing::warn!("Failed to read upload: {err}");
        ApiError::BadRequest(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::PipelineConfig;
    use crate::pipeline::cache::MemoryRequirementCache;
    use crate::pipeline::llm::{CallIntent, LlmError, MockLlmClient};
    use crate::pipeline::retry::RetryPolicy;
    use crate::pipeline::CompliancePipeline;

    const BOUNDARY: &str = "submittal-check-test-boundary";

    fn test_state() -> AppState {
        let llm = MockLlmClient::from_fn(|req| match req.intent {
            CallIntent::ExtractVerbatim => Ok(r#"["Concrete shall be 4000 psi."]"#.into()),
            CallIntent::CompareBatch => Ok(
                r#"[{"requirement":"x","provided":"3000 psi <mix>","compliant":false,"comment":"Low."}]"#
                    .into(),
            ),
            CallIntent::Summarize => Ok("The concrete strength is below specification.".into()),
            _ => Err(LlmError::MalformedResponse("unexpected intent".into())),
        });
        let config = PipelineConfig {
            max_concurrency: 1,
            retry: RetryPolicy::new(2, Duration::from_millis(1)),
            ..PipelineConfig::default()
        };
        let pipeline = CompliancePipeline::new(
            Arc::new(llm),
            Arc::new(MemoryRequirementCache::default()),
            config,
        );
        AppState {
            max_upload_bytes: 4096,
            ..AppState::new(Arc::new(pipeline))
        }
    }

    fn multipart_request(uri: &str, parts: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, data) in parts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.txt\"\r\nContent-Type: text/plain\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn long_text(word: &str) -> Vec<u8> {
        format!("{word} ").repeat(40).into_bytes()
    }

    #[tokio::test]
    async fn health_reports_model() {
        let app = review_router(test_state());
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "mock");
    }

    #[tokio::test]
    async fn upload_page_served() {
        let app = review_router(test_state());
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("Submittal Review"));
    }

    #[tokio::test]
    async fn json_review_returns_report() {
        let app = review_router(test_state());
        let spec = long_text("Specification");
        let submittal = long_text("Submittal");
        let req = multipart_request("/api/review", &[("spec", &spec), ("submittal", &submittal)]);
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["total"], 1);
        assert_eq!(json["verdicts"][0]["requirement"], "Concrete shall be 4000 psi.");
        assert_eq!(json["verdicts"][0]["compliant"], false);
        assert_eq!(json["summary"], "The concrete strength is below specification.");
    }

    #[tokio::test]
    async fn html_review_escapes_model_text() {
        let app = review_router(test_state());
        let spec = long_text("Specification");
        let submittal = long_text("Submittal");
        let req = multipart_request("/review", &[("spec", &spec), ("submittal", &submittal)]);
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&bytes);
        assert!(html.contains("3000 psi &lt;mix&gt;"));
        assert!(html.contains("0 of 1 requirements compliant"));
    }

    #[tokio::test]
    async fn short_document_yields_failure_report() {
        let app = review_router(test_state());
        let submittal = long_text("Submittal");
        let req = multipart_request("/api/review", &[("spec", b"x"), ("submittal", &submittal)]);
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "failure");
        assert_eq!(json["failure"], "invalid_input");
        assert_eq!(json["verdicts"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn missing_submittal_is_bad_request() {
        let app = review_router(test_state());
        let spec = long_text("Specification");
        let req = multipart_request("/api/review", &[("spec", &spec)]);
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Missing 'submittal' file");
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let app = review_router(test_state());
        let spec = vec![b'a'; 5000];
        let submittal = long_text("Submittal");
        let req = multipart_request("/api/review", &[("spec", &spec), ("submittal", &submittal)]);
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "PAYLOAD_TOO_LARGE");
    }
}
