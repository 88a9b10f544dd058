mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use pedalpoint_api::entities::OrderStatus;
use pedalpoint_api::services::{NewOrder, NewOrderLine};

async fn seed_order(app: &TestApp, status: OrderStatus) -> Uuid {
    let order = app
        .state
        .services
        .orders
        .create_order(NewOrder {
            payment_session_id: format!("cs_test_{}", Uuid::new_v4()),
            customer_id: Uuid::new_v4(),
            status,
            total_amount: dec!(899.99),
            currency: "usd".to_string(),
            shipping_address: None,
            lines: vec![NewOrderLine {
                product_id: None,
                name: "Apex Road Bike".into(),
                unit_price: dec!(899.99),
                quantity: 1,
            }],
        })
        .await
        .expect("order should persist");
    order.id
}

#[tokio::test]
async fn admin_advances_processing_to_completed() {
    let app = TestApp::new().await;
    let order_id = seed_order(&app, OrderStatus::Processing).await;
    let token = app.admin_token(Uuid::new_v4());

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&token),
            Some(json!({ "status": "completed" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["status"], json!("completed"));
}

#[tokio::test]
async fn pending_cannot_jump_to_completed() {
    let app = TestApp::new().await;
    let order_id = seed_order(&app, OrderStatus::Pending).await;
    let token = app.admin_token(Uuid::new_v4());

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&token),
            Some(json!({ "status": "completed" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("transition"));
}

#[tokio::test]
async fn cancel_works_once_and_only_once() {
    let app = TestApp::new().await;
    let order_id = seed_order(&app, OrderStatus::Pending).await;
    let token = app.admin_token(Uuid::new_v4());

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("cancelled"));

    // Terminal states stay terminal
    let (status, _body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_surface_requires_the_orders_permission() {
    let app = TestApp::new().await;
    let order_id = seed_order(&app, OrderStatus::Processing).await;
    let token = app.buyer_token(Uuid::new_v4());

    let (status, _body) = app
        .request(Method::GET, "/api/v1/orders", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&token),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn buyers_read_their_own_orders_only() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();

    let order = app
        .state
        .services
        .orders
        .create_order(NewOrder {
            payment_session_id: format!("cs_test_{}", Uuid::new_v4()),
            customer_id: buyer,
            status: OrderStatus::Processing,
            total_amount: dec!(45.00),
            currency: "usd".to_string(),
            shipping_address: None,
            lines: vec![],
        })
        .await
        .unwrap();

    let own_token = app.buyer_token(buyer);
    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order.id),
            Some(&own_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_session_id"], json!(order.payment_session_id));

    let stranger_token = app.buyer_token(Uuid::new_v4());
    let (status, _body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order.id),
            Some(&stranger_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.admin_token(Uuid::new_v4());
    let (status, _body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn list_orders_paginates() {
    let app = TestApp::new().await;
    for _ in 0..3 {
        seed_order(&app, OrderStatus::Processing).await;
    }
    let token = app.admin_token(Uuid::new_v4());

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/orders?page=1&per_page=2",
            Some(&token),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], json!(3));
    assert_eq!(body["pagination"]["total_pages"], json!(2));
}
