mod common;

use axum::http::StatusCode;
use common::{sign_webhook, TestApp, TEST_WEBHOOK_SECRET};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use pedalpoint_api::entities::{Order, OrderItem, OrderStatus, StockPolicy};
use pedalpoint_api::services::{NewOrder, NewOrderLine, ShippingDetails};

const SESSION_ID: &str = "cs_test_webhook_1";

fn completed_event(customer_id: &str) -> String {
    json!({
        "id": "evt_test_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": SESSION_ID,
                "amount_total": 89_999,
                "currency": "usd",
                "payment_status": "paid",
                "metadata": {
                    "customer_id": customer_id,
                    "recipient_name": "Kim Rivera",
                    "address_line": "12 Cedar Way",
                    "city": "Portland",
                    "postal_code": "97201"
                }
            }
        }
    })
    .to_string()
}

async fn mount_line_items(app: &TestApp, expect: u64) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/v1/checkout/sessions/{SESSION_ID}/line_items"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "li_1",
                "description": "Apex Road Bike",
                "quantity": 1,
                "amount_total": 89_999,
                "price": { "unit_amount": 89_999 }
            }],
            "has_more": false
        })))
        .expect(expect)
        .mount(&app.gateway_server)
        .await;
}

fn provisional_order(customer_id: Uuid) -> NewOrder {
    NewOrder {
        payment_session_id: SESSION_ID.to_string(),
        customer_id,
        status: OrderStatus::Pending,
        total_amount: dec!(899.99),
        currency: "usd".to_string(),
        shipping_address: Some(ShippingDetails {
            recipient_name: "Kim Rivera".into(),
            address_line: "12 Cedar Way".into(),
            city: "Portland".into(),
            postal_code: "97201".into(),
        }),
        lines: vec![NewOrderLine {
            product_id: None,
            name: "Apex Road Bike".into(),
            unit_price: dec!(899.99),
            quantity: 1,
        }],
    }
}

#[tokio::test]
async fn corrupted_signature_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let payload = completed_event(&Uuid::new_v4().to_string());

    let header = sign_webhook(&payload, "whsec_wrong_secret");
    let (status, _body) = app.post_webhook(&payload, Some(&header)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _body) = app.post_webhook(&payload, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn irrelevant_event_types_are_acknowledged() {
    let app = TestApp::new().await;
    let payload = json!({
        "id": "evt_other",
        "type": "invoice.paid",
        "data": { "object": { "id": "in_123" } }
    })
    .to_string();

    let header = sign_webhook(&payload, TEST_WEBHOOK_SECRET);
    let (status, body) = app.post_webhook(&payload, Some(&header)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("event type ignored"));
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn missing_customer_metadata_is_fatal() {
    let app = TestApp::new().await;
    let payload = json!({
        "id": "evt_no_meta",
        "type": "checkout.session.completed",
        "data": { "object": { "id": SESSION_ID, "amount_total": 89_999 } }
    })
    .to_string();

    let header = sign_webhook(&payload, TEST_WEBHOOK_SECRET);
    let (status, body) = app.post_webhook(&payload, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn malformed_customer_id_is_fatal() {
    let app = TestApp::new().await;
    let payload = completed_event("not-a-uuid");

    let header = sign_webhook(&payload, TEST_WEBHOOK_SECRET);
    let (status, _body) = app.post_webhook(&payload, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn fresh_session_creates_the_order_and_clears_the_cart() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();

    // The buyer still has a populated cart from before checkout
    let product_id = app
        .seed_product("Apex Road Bike", dec!(899.99), 10, StockPolicy::Tracked)
        .await;
    app.state
        .services
        .cart
        .add_item(buyer, product_id, 2)
        .await
        .expect("cart should accept the item");

    mount_line_items(&app, 1).await;

    let payload = completed_event(&buyer.to_string());
    let header = sign_webhook(&payload, TEST_WEBHOOK_SECRET);
    let (status, body) = app.post_webhook(&payload, Some(&header)).await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["message"], json!("order reconciled"));

    let orders = Order::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.payment_session_id, SESSION_ID);
    assert_eq!(order.customer_id, buyer);
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.total_amount, dec!(899.99));
    assert!(order.shipping_address.is_some());

    let items = OrderItem::find().all(&*app.state.db).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Apex Road Bike");
    assert_eq!(items[0].unit_price, dec!(899.99));

    // Property: the cart is empty after reconciliation
    let cart = app
        .state
        .services
        .cart
        .get_cart(buyer)
        .await
        .expect("cart should be readable");
    assert!(cart.items.is_empty());
}

#[tokio::test]
async fn replayed_delivery_is_idempotent() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();

    mount_line_items(&app, 1).await;

    let payload = completed_event(&buyer.to_string());
    let header = sign_webhook(&payload, TEST_WEBHOOK_SECRET);

    let (status, first) = app.post_webhook(&payload, Some(&header)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], json!("order reconciled"));

    let header = sign_webhook(&payload, TEST_WEBHOOK_SECRET);
    let (status, second) = app.post_webhook(&payload, Some(&header)).await;
    assert_eq!(status, StatusCode::OK, "replay must not error: {second}");
    assert_eq!(second["message"], json!("duplicate delivery acknowledged"));
    assert_eq!(second["order_id"], first["order_id"]);

    assert_eq!(app.order_count().await, 1);
}

#[tokio::test]
async fn provisional_order_is_advanced_to_processing() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();

    let provisional = app
        .state
        .services
        .orders
        .create_order(provisional_order(buyer))
        .await
        .expect("provisional order should persist");
    assert_eq!(provisional.status, OrderStatus::Pending);

    // The provisional order already carries the line snapshot, so the
    // reconciler must not re-fetch line items
    Mock::given(method("GET"))
        .and(path(format!(
            "/v1/checkout/sessions/{SESSION_ID}/line_items"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(0)
        .mount(&app.gateway_server)
        .await;

    let payload = completed_event(&buyer.to_string());
    let header = sign_webhook(&payload, TEST_WEBHOOK_SECRET);
    let (status, body) = app.post_webhook(&payload, Some(&header)).await;

    assert_eq!(status, StatusCode::OK, "body: {body}");

    let order = Order::find_by_id(provisional.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(app.order_count().await, 1);
}

#[tokio::test]
async fn completion_for_a_cancelled_order_stays_terminal() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();

    let provisional = app
        .state
        .services
        .orders
        .create_order(provisional_order(buyer))
        .await
        .unwrap();
    app.state
        .services
        .orders
        .transition_status(provisional.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let payload = completed_event(&buyer.to_string());
    let header = sign_webhook(&payload, TEST_WEBHOOK_SECRET);
    let (status, body) = app.post_webhook(&payload, Some(&header)).await;

    // Acknowledged so the gateway stops retrying, but the terminal state
    // is not disturbed
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("duplicate delivery acknowledged"));

    let order = Order::find_by_id(provisional.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(app.order_count().await, 1);
}
