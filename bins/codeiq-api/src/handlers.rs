// HTTP route handlers for the CodeIQ API

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use codeiq_common::{Language, TestCase};
use codeiq_engine::{into_response, into_sample_response, Toolchain};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub language: Language,
    #[serde(alias = "sourceCode")]
    pub code: String,
    #[serde(default)]
    pub input_array: Vec<TestCase>,
    /// Present for sample runs; echoed back next to the outputs
    #[serde(default)]
    pub expected_output: Option<Vec<TestCase>>,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse<'a> {
    pub languages: Vec<&'a Toolchain>,
}

/// POST /run - Execute a submission against its test cases
///
/// Always 200: failures are reported in the body as `status: "error"`.
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> impl IntoResponse {
    info!(
        language = %payload.language,
        test_cases = payload.input_array.len(),
        sample = payload.expected_output.is_some(),
        "Run requested"
    );

    let result = state
        .engine
        .execute(&payload.code, payload.language, &payload.input_array)
        .await;

    let response = match payload.expected_output {
        Some(expected) => into_sample_response(result, &payload.input_array, Some(expected)),
        None => into_response(result),
    };
    (StatusCode::OK, Json(response))
}

/// GET /health - Liveness check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /languages - Configured toolchains
pub async fn list_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let toolchains = state.engine.toolchains();
    let languages = toolchains
        .list_languages()
        .into_iter()
        .map(|lang| toolchains.get(lang))
        .collect();
    let body = serde_json::to_value(LanguagesResponse { languages })
        .unwrap_or_else(|_| serde_json::json!({ "languages": [] }));
    (StatusCode::OK, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use codeiq_engine::{Engine, EngineConfig};
    use tower::ServiceExt;

    fn state(root: &std::path::Path) -> Arc<AppState> {
        Arc::new(AppState {
            engine: Engine::new(EngineConfig::with_root(root)),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_run(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/run")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_run_request_wire_names() {
        let req: RunRequest = serde_json::from_str(
            r#"{"language":"py","code":"print(1)","inputArray":[{"name":"testcase 1","data":"1"}]}"#,
        )
        .unwrap();
        assert_eq!(req.language, Language::Python);
        assert_eq!(req.input_array, vec![TestCase::new("testcase 1", "1")]);
        assert!(req.expected_output.is_none());

        let req: RunRequest =
            serde_json::from_str(r#"{"language":"javascript","sourceCode":"1"}"#).unwrap();
        assert_eq!(req.language, Language::JavaScript);
        assert!(req.input_array.is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(state(tmp.path()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_languages_lists_every_toolchain() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(state(tmp.path()))
            .oneshot(Request::builder().uri("/languages").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        let names: Vec<_> = json["languages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["cpp", "py", "java", "js"]);
    }

    #[tokio::test]
    async fn test_unknown_language_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(state(tmp.path()))
            .oneshot(post_run(serde_json::json!({
                "language": "ruby",
                "code": "puts 1",
                "inputArray": []
            })))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_sample_run_without_cases_echoes_expected() {
        let tmp = tempfile::tempdir().unwrap();
        let response = app(state(tmp.path()))
            .oneshot(post_run(serde_json::json!({
                "language": "py",
                "code": "print(1)",
                "inputArray": [],
                "expectedOutput": [{"name": "testcase 1", "data": "1"}]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["output"], serde_json::json!([]));
        assert_eq!(json["input"], serde_json::json!([]));
        assert_eq!(json["expectedOutput"][0]["data"], "1");
    }
}
