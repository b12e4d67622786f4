use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use medsupply_api::{
    cache::InMemoryCache,
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};

/// Helper harness spinning up the full application router backed by a
/// throwaway SQLite database.
pub struct TestApp {
    router: Router,
    #[allow(dead_code)]
    pub state: AppState,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("failed to create temp dir for the test database");
        let db_path = db_dir.path().join("medsupply_test.db");

        let mut config = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18080,
            "test".to_string(),
        );
        // SQLite needs a single connection or concurrent writers trip over
        // the file lock.
        config.db_max_connections = 1;
        config.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&config)
            .await
            .expect("failed to open the test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations against the test database");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let cache = Arc::new(InMemoryCache::new());
        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            cache.clone(),
            config.cache_ttl(),
        );

        let state = AppState {
            db: db_arc,
            config,
            event_sender,
            services,
            cache,
        };

        let router = Router::new()
            .nest("/api/v1", medsupply_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Sends a request through the router without binding a socket.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("request body failed to serialize"))
            }
            None => Body::empty(),
        };

        let request = builder.body(body).expect("failed to build test request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router failed to produce a response")
    }

    #[allow(dead_code)]
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.request(Method::GET, uri, None).await
    }

    #[allow(dead_code)]
    pub async fn post(&self, uri: &str, body: Value) -> axum::response::Response {
        self.request(Method::POST, uri, Some(body)).await
    }

    #[allow(dead_code)]
    pub async fn put(&self, uri: &str, body: Value) -> axum::response::Response {
        self.request(Method::PUT, uri, Some(body)).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, uri: &str) -> axum::response::Response {
        self.request(Method::DELETE, uri, None).await
    }
}

/// Reads a response body as JSON.
#[allow(dead_code)]
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not valid JSON")
}

/// Reads a response body as text, for the CSV endpoints.
#[allow(dead_code)]
pub async fn response_text(response: axum::response::Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("response body was not UTF-8")
}
