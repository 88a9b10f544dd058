mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use pedalpoint_api::entities::{Order, OrderItem, OrderStatus, StockPolicy};

fn shipping() -> serde_json::Value {
    json!({
        "recipient_name": "Kim Rivera",
        "address_line": "12 Cedar Way",
        "city": "Portland",
        "postal_code": "97201"
    })
}

fn session_created_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "cs_test_abc123",
        "url": "https://pay.gateway.example/cs_test_abc123"
    }))
}

#[tokio::test]
async fn checkout_creates_session_and_provisional_order() {
    let app = TestApp::new().await;
    let product_id = app
        .seed_product("Apex Road Bike", dec!(899.99), 10, StockPolicy::Tracked)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(body_string_contains("89999"))
        .and(body_string_contains("Apex"))
        .respond_with(session_created_response())
        .expect(1)
        .mount(&app.gateway_server)
        .await;

    let buyer = Uuid::new_v4();
    let token = app.buyer_token(buyer);
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(&token),
            Some(json!({
                "cart": [{
                    "product_id": product_id,
                    "name": "Apex Road Bike",
                    "unit_price": "899.99",
                    "quantity": 1
                }],
                "shipping_details": shipping()
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["session_id"], json!("cs_test_abc123"));
    assert_eq!(
        body["checkout_url"],
        json!("https://pay.gateway.example/cs_test_abc123")
    );

    let orders = Order::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.payment_session_id, "cs_test_abc123");
    assert_eq!(order.customer_id, buyer);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, dec!(899.99));
    assert!(order.shipping_address.is_some());

    let items = OrderItem::find().all(&*app.state.db).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Apex Road Bike");
    assert_eq!(items[0].unit_price, dec!(899.99));
    assert_eq!(items[0].product_id, Some(product_id));
}

#[tokio::test]
async fn client_supplied_price_is_ignored() {
    let app = TestApp::new().await;
    let product_id = app
        .seed_product("Apex Road Bike", dec!(899.99), 10, StockPolicy::Tracked)
        .await;

    // The gateway must see the catalog price in minor units, not the
    // client's one-cent fantasy
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(body_string_contains("unit_amount%5D=89999"))
        .respond_with(session_created_response())
        .expect(1)
        .mount(&app.gateway_server)
        .await;

    let token = app.buyer_token(Uuid::new_v4());
    let (status, _body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(&token),
            Some(json!({
                "cart": [{
                    "product_id": product_id,
                    "name": "Apex Road Bike",
                    "unit_price": "0.01",
                    "quantity": 1
                }],
                "shipping_details": shipping()
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);

    let orders = Order::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders[0].total_amount, dec!(899.99));
}

#[tokio::test]
async fn unknown_product_fails_without_side_effects() {
    let app = TestApp::new().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(session_created_response())
        .expect(0)
        .mount(&app.gateway_server)
        .await;

    let token = app.buyer_token(Uuid::new_v4());
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(&token),
            Some(json!({
                "cart": [{
                    "product_id": Uuid::new_v4(),
                    "name": "Ghost Bike",
                    "unit_price": "1.00",
                    "quantity": 1
                }],
                "shipping_details": shipping()
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"].as_str().unwrap().contains("Ghost Bike"),
        "error should name the offending line: {body}"
    );
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn unauthenticated_checkout_is_rejected_before_the_gateway() {
    let app = TestApp::new().await;
    let product_id = app
        .seed_product("Apex Road Bike", dec!(899.99), 10, StockPolicy::Tracked)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(session_created_response())
        .expect(0)
        .mount(&app.gateway_server)
        .await;

    let (status, _body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            None,
            Some(json!({
                "cart": [{
                    "product_id": product_id,
                    "name": "Apex Road Bike",
                    "unit_price": "899.99",
                    "quantity": 1
                }],
                "shipping_details": shipping()
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let token = app.buyer_token(Uuid::new_v4());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(&token),
            Some(json!({ "cart": [], "shipping_details": shipping() })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("cart"));
}

#[tokio::test]
async fn blank_shipping_field_is_rejected() {
    let app = TestApp::new().await;
    let product_id = app
        .seed_product("Apex Road Bike", dec!(899.99), 10, StockPolicy::Tracked)
        .await;
    let token = app.buyer_token(Uuid::new_v4());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(&token),
            Some(json!({
                "cart": [{
                    "product_id": product_id,
                    "name": "Apex Road Bike",
                    "unit_price": "899.99",
                    "quantity": 1
                }],
                "shipping_details": {
                    "recipient_name": "Kim Rivera",
                    "address_line": "12 Cedar Way",
                    "city": "",
                    "postal_code": "97201"
                }
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("city"));
}

#[tokio::test]
async fn tracked_stock_is_enforced_and_untracked_is_not() {
    let app = TestApp::new().await;
    let tracked = app
        .seed_product("Apex Road Bike", dec!(899.99), 2, StockPolicy::Tracked)
        .await;
    let untracked = app
        .seed_product("Showcase Frame", dec!(450.00), 0, StockPolicy::Untracked)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(session_created_response())
        .expect(1)
        .mount(&app.gateway_server)
        .await;

    let token = app.buyer_token(Uuid::new_v4());

    // Over-ordering the tracked product fails with the line named
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(&token),
            Some(json!({
                "cart": [{
                    "product_id": tracked,
                    "name": "Apex Road Bike",
                    "unit_price": "899.99",
                    "quantity": 3
                }],
                "shipping_details": shipping()
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Apex Road Bike"));

    // The untracked showcase product is always orderable
    let (status, _body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(&token),
            Some(json!({
                "cart": [{
                    "product_id": untracked,
                    "name": "Showcase Frame",
                    "unit_price": "450.00",
                    "quantity": 25
                }],
                "shipping_details": shipping()
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn gateway_failure_surfaces_as_bad_gateway_without_an_order() {
    let app = TestApp::new().await;
    let product_id = app
        .seed_product("Apex Road Bike", dec!(899.99), 10, StockPolicy::Tracked)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway exploded"))
        .expect(1)
        .mount(&app.gateway_server)
        .await;

    let token = app.buyer_token(Uuid::new_v4());
    let (status, _body) = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(&token),
            Some(json!({
                "cart": [{
                    "product_id": product_id,
                    "name": "Apex Road Bike",
                    "unit_price": "899.99",
                    "quantity": 1
                }],
                "shipping_details": shipping()
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(app.order_count().await, 0);
}
