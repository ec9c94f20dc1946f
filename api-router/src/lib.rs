use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{health::health, query::query_index, reload::reload_index, root::root};
use tower_http::cors::CorsLayer;

pub mod api_state;
pub mod error;
mod routes;

pub use routes::root::WELCOME_MESSAGE;

/// Router for the question-answering API.
pub fn api_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/query", post(query_index))
        .route("/reload", post(reload_index))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::{
        storage::store::IndexStore,
        utils::{
            completion::CompletionProvider, config::AppConfig, embedding::EmbeddingProvider,
        },
    };
    use retrieval_pipeline::{IndexLifecycle, QueryGateway, VectorIndexer};
    use serde_json::Value;
    use std::{path::Path, sync::Arc};
    use tower::ServiceExt;

    fn write_sources(dir: &Path) {
        std::fs::create_dir_all(dir).expect("create source dir");
        for (name, content) in [
            ("one.txt", "X is the first chain text and it promises luck."),
            ("two.txt", "Forward this message to five friends before midnight."),
            ("three.txt", "Saint Patrick's Day greetings travel fast."),
        ] {
            std::fs::write(dir.join(name), content).expect("write source file");
        }
    }

    async fn test_app(source: &Path, persist: &Path) -> Router {
        let config = AppConfig {
            texts_data_path: source.to_string_lossy().into_owned(),
            persist_dir: persist.to_string_lossy().into_owned(),
            ..Default::default()
        };
        let indexer = VectorIndexer::from_config(
            &config,
            Arc::new(EmbeddingProvider::new_hashed(128).expect("hashed provider")),
            Arc::new(CompletionProvider::Extractive),
        );
        let store = IndexStore::local(persist).await.expect("index store");
        let lifecycle = Arc::new(IndexLifecycle::new(Arc::new(indexer), store, source));
        let api_state = ApiState::new(Arc::new(QueryGateway::new(lifecycle)));

        Router::new()
            .merge(api_routes())
            .with_state(api_state)
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn root_and_health_respond() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_app(&dir.path().join("source"), &dir.path().join("persist")).await;

        let (status, body) = send(&app, "GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], WELCOME_MESSAGE);
        assert_eq!(body["index"]["loaded"], false);

        let (status, body) = send(&app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "UP"}));
    }

    #[tokio::test]
    async fn query_builds_index_and_answers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source");
        write_sources(&source);
        let app = test_app(&source, &dir.path().join("persist")).await;

        let (status, body) = send(&app, "POST", "/query?prompt=what%20is%20X").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prompt"], "what is X");
        assert!(!body["response"].as_str().unwrap_or_default().is_empty());
        assert!(body["sources"].is_array());

        let (_, root) = send(&app, "GET", "/").await;
        assert_eq!(root["index"]["loaded"], true);
    }

    #[tokio::test]
    async fn query_without_prompt_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_app(&dir.path().join("source"), &dir.path().join("persist")).await;

        let (status, body) = send(&app, "POST", "/query").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn query_without_documents_reports_unavailable_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_app(&dir.path().join("source"), &dir.path().join("persist")).await;

        let (status, body) = send(&app, "POST", "/query?prompt=hello").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "index_unavailable");
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn reload_with_test_prompt_returns_verification_query() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source");
        write_sources(&source);
        let app = test_app(&source, &dir.path().join("persist")).await;

        let (status, body) = send(&app, "POST", "/reload?test_prompt=ping").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Index reloaded");
        assert_eq!(body["query"]["prompt"], "ping");
        assert!(!body["query"]["response"]
            .as_str()
            .unwrap_or_default()
            .is_empty());
    }

    #[tokio::test]
    async fn reload_without_test_prompt_has_null_query() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source");
        write_sources(&source);
        let app = test_app(&source, &dir.path().join("persist")).await;

        let (status, body) = send(&app, "POST", "/reload").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"message": "Index reloaded", "query": null})
        );
    }

    #[tokio::test]
    async fn reload_after_source_removed_reports_missing_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("source");
        let persist = dir.path().join("persist");
        write_sources(&source);
        let app = test_app(&source, &persist).await;

        let (status, _) = send(&app, "POST", "/reload").await;
        assert_eq!(status, StatusCode::OK);
        let persisted_before = std::fs::read(persist.join("index_store.json")).expect("read");

        std::fs::remove_dir_all(&source).expect("remove source");
        let (status, body) = send(&app, "POST", "/reload").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "missing_source");
        let persisted_after = std::fs::read(persist.join("index_store.json")).expect("read");
        assert_eq!(persisted_before, persisted_after);
    }
}
