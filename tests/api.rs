use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use llm_predict_serve::api::create_router;
use llm_predict_serve::llm::TextGenerator;
use llm_predict_serve::{AppState, GenerationParams, InferenceError};

/// Returns a scripted decode and records the prompts it was given.
struct ScriptedGenerator {
    reply: fn(&str) -> Result<String, InferenceError>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl TextGenerator for ScriptedGenerator {
    fn generate_text(&self, prompt: &str, _params: &GenerationParams) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.reply)(prompt)
    }
}

fn app_with(reply: fn(&str) -> Result<String, InferenceError>) -> (Router, Arc<Mutex<Vec<String>>>) {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let generator = ScriptedGenerator {
        reply,
        prompts: Arc::clone(&prompts),
    };
    let state = AppState::new(
        Box::new(generator),
        "checkpoint-100".to_string(),
        GenerationParams::default(),
    );
    (create_router(Arc::new(state)), prompts)
}

fn erp_answer(prompt: &str) -> Result<String, InferenceError> {
    Ok(format!("{} Un ERP est un logiciel...", prompt))
}

async fn post_predict(app: Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_checkpoint_name() {
    let (app, _) = app_with(erp_answer);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"status": "healthy", "model": "checkpoint-100"}));
}

#[tokio::test]
async fn health_is_unaffected_by_failed_predictions() {
    let (app, _) = app_with(|_| Err(InferenceError::Sampling("boom".to_string())));

    let (status, _) = post_predict(app.clone(), r#"{"prompt": "hi"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn predict_extracts_text_after_marker() {
    let (app, prompts) = app_with(erp_answer);

    let (status, body) = post_predict(app, r#"{"prompt": "C'est quoi un ERP ? Réponse :"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"response": "Un ERP est un logiciel...", "model": "gpt2", "status": "success"})
    );
    assert_eq!(*prompts.lock().unwrap(), vec!["C'est quoi un ERP ? Réponse :".to_string()]);
}

#[tokio::test]
async fn predict_echoes_model_label() {
    let (app, _) = app_with(erp_answer);

    let (status, body) =
        post_predict(app, r#"{"prompt": "Réponse :", "model": "fine-tuned-erp"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "fine-tuned-erp");
}

#[tokio::test]
async fn predict_accepts_legacy_question_field() {
    let (app, prompts) = app_with(erp_answer);

    let (status, body) = post_predict(app, r#"{"prompt": "", "question": "ERP ?"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Un ERP est un logiciel...");
    assert_eq!(*prompts.lock().unwrap(), vec!["ERP ?".to_string()]);
}

#[tokio::test]
async fn predict_strips_prompt_prefix_without_marker() {
    let (app, _) = app_with(|prompt| Ok(format!("{}   the continuation ", prompt)));

    let (status, body) = post_predict(app, r#"{"prompt": "What is an ERP?"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "the continuation");
}

#[tokio::test]
async fn predict_returns_full_text_when_continuation_is_empty() {
    let (app, _) = app_with(|prompt| Ok(prompt.to_string()));

    let (status, body) = post_predict(app, r#"{"prompt": "What is an ERP?"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "What is an ERP?");
}

#[tokio::test]
async fn missing_prompt_is_a_client_error() {
    let (app, prompts) = app_with(erp_answer);

    let (status, body) = post_predict(app, "{}").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Empty prompt or question"}));
    assert!(prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn whitespace_prompt_is_a_client_error() {
    let (app, _) = app_with(erp_answer);

    let (status, body) = post_predict(app, r#"{"prompt": " \n\t "}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Empty prompt"));
    assert!(body.get("response").is_none());
}

#[tokio::test]
async fn empty_tokenization_is_a_client_error() {
    let (app, _) = app_with(|_| Err(InferenceError::EmptyInput));

    let (status, body) = post_predict(app, r#"{"prompt": "\u200b"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Empty input after tokenization"}));
}

#[tokio::test]
async fn generation_failure_is_a_server_error() {
    let (app, _) = app_with(|_| Err(InferenceError::Tokenizer("bad byte".to_string())));

    let (status, body) = post_predict(app, r#"{"prompt": "hello"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "Error generating response: Tokenizer error: bad byte");
    assert!(body.get("response").is_none());
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let (app, _) = app_with(erp_answer);

    let (status, body) = post_predict(app, r#"{"prompt": "#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn cross_origin_requests_are_allowed() {
    let (app, _) = app_with(erp_answer);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("origin", "http://localhost:4200")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}
