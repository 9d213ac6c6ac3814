mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::TestApp;

fn names(body: &Value) -> Vec<String> {
    body.as_array()
        .expect("array of products")
        .iter()
        .map(|p| p["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

async fn seeded_catalog() -> TestApp {
    let app = TestApp::new().await;
    app.seed_product("banana", "0.50", "food").await;
    app.seed_product("Apple", "1.25", "food").await;
    app.seed_product("hoodie", "45.00", "apparel").await;
    app.seed_product("apple juice", "0.50", "beverages").await;
    app
}

#[tokio::test]
async fn root_and_health_respond() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Welcome to the Student Store API!".into()));

    let (status, body) = app.call(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "up");
}

#[tokio::test]
async fn product_crud_round_trip() {
    let app = TestApp::new().await;

    let (status, created) = app
        .call(
            Method::POST,
            "/products",
            Some(json!({
                "name": "Hoodie",
                "description": "Fleece, school colors",
                "price": 39.99,
                "image_url": "/img/hoodie.png",
                "category": "apparel"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    assert_eq!(created["price"], "39.99");
    let id = created["id"].as_i64().expect("product id");

    let (status, fetched) = app
        .call(Method::GET, &format!("/products/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Hoodie");
    assert_eq!(fetched["image_url"], "/img/hoodie.png");

    let (status, updated) = app
        .call(
            Method::PUT,
            &format!("/products/{id}"),
            Some(json!({ "price": "34.50" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], "34.50");
    assert_eq!(updated["category"], "apparel");

    let response = app
        .request(Method::DELETE, &format!("/products/{id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(Method::GET, &format!("/products/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_products_are_not_found() {
    let app = TestApp::new().await;

    let (status, _) = app.call(Method::GET, "/products/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(Method::PUT, "/products/404", Some(json!({ "name": "Ghost" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::DELETE, "/products/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_products_are_rejected() {
    let app = TestApp::new().await;

    let payloads = [
        json!({ "name": "", "price": "1.00", "category": "food" }),
        json!({ "name": "Gum", "price": "-1.00", "category": "food" }),
        json!({ "name": "Gum", "price": "1.001", "category": "food" }),
        json!({ "name": "Gum", "category": "food" }),
        json!({ "name": "Gum", "price": "1.00", "category": "" }),
    ];
    for payload in payloads {
        let (status, body) = app.call(Method::POST, "/products", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload} gave {body}");
    }

    let (_, listed) = app.call(Method::GET, "/products", None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn listing_sorts_by_requested_key() {
    let app = seeded_catalog().await;

    let (status, body) = app.call(Method::GET, "/products?sort=price", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), ["banana", "apple juice", "Apple", "hoodie"]);

    let (_, body) = app.call(Method::GET, "/products?sort=name", None).await;
    assert_eq!(names(&body), ["Apple", "apple juice", "banana", "hoodie"]);

    let (_, body) = app.call(Method::GET, "/products?sort=category", None).await;
    assert_eq!(names(&body), ["hoodie", "apple juice", "banana", "Apple"]);

    let (_, body) = app.call(Method::GET, "/products?sort=rating", None).await;
    assert_eq!(names(&body), ["banana", "Apple", "hoodie", "apple juice"]);
}

#[tokio::test]
async fn listing_filters_by_exact_category() {
    let app = seeded_catalog().await;

    let (_, body) = app.call(Method::GET, "/products?category=food", None).await;
    assert_eq!(names(&body), ["banana", "Apple"]);

    let (_, body) = app.call(Method::GET, "/products?category=Food", None).await;
    assert_eq!(body, json!([]));

    let (_, body) = app.call(Method::GET, "/products", None).await;
    assert_eq!(names(&body).len(), 4);
}

#[tokio::test]
async fn sort_takes_precedence_over_category() {
    let app = seeded_catalog().await;

    let (_, body) = app
        .call(Method::GET, "/products?sort=price&category=apparel", None)
        .await;
    assert_eq!(names(&body), ["banana", "apple juice", "Apple", "hoodie"]);

    let (_, body) = app
        .call(Method::GET, "/products?sort=&category=apparel", None)
        .await;
    assert_eq!(names(&body), ["hoodie"]);
}

#[tokio::test]
async fn referenced_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Mug", "9.99", "kitchen").await;
    let order = app
        .seed_order("Ada", json!([{ "productId": mug, "quantity": 1 }]))
        .await;

    let (status, body) = app
        .call(Method::DELETE, &format!("/products/{mug}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, fetched) = app
        .call(Method::GET, &format!("/orders/{}", order["id"]), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["orderItems"][0]["product"]["name"], "Mug");
}

#[tokio::test]
async fn swagger_document_is_served() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/orders/{id}/items").is_some());
}
