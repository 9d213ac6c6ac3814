use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use student_store_api::{config::AppConfig, db, AppState};
use tower::ServiceExt;

/// Helper harness for spinning up the application against a private
/// in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with a freshly migrated database.
    pub async fn new() -> Self {
        // Every SQLite in-memory connection is its own database, so the pool
        // must hold exactly one.
        Self::with_database("sqlite::memory:", 1).await
    }

    /// Construct a test application on `database_url` with a pool of up to
    /// `max_connections`. Use a file-backed URL when more than one
    /// connection is needed.
    pub async fn with_database(database_url: &str, max_connections: u32) -> Self {
        let mut cfg = AppConfig::new(
            database_url.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = max_connections;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = student_store_api::app_router(state.clone());

        Self { router, state }
    }

    /// Sends one request through the full middleware stack.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router is infallible")
    }

    /// Sends a raw (possibly malformed) JSON body.
    #[allow(dead_code)]
    pub async fn request_raw(&self, method: Method, uri: &str, raw: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .expect("build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Sends a request and returns the status plus the parsed JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    /// Creates a product through the API and returns its id.
    pub async fn seed_product(&self, name: &str, price: &str, category: &str) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/products",
                Some(json!({
                    "name": name,
                    "description": format!("{name} for testing"),
                    "price": price,
                    "image_url": format!("/img/{}.png", name.to_lowercase().replace(' ', "-")),
                    "category": category,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "seed product failed: {body}");
        body["id"].as_i64().expect("product id")
    }

    /// Creates an order through the API and returns its body.
    #[allow(dead_code)]
    pub async fn seed_order(&self, customer: &str, items: Value) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/orders",
                Some(json!({ "customer": customer, "orderItems": items })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed order failed: {body}");
        body
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
