#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::MockServer;

use pedalpoint_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{product, Order, StockPolicy},
    events::EventSender,
    gateway::PaymentGateway,
    handlers::AppServices,
    AppState,
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test123secret456";
pub const TEST_JWT_SECRET: &str =
    "test_secret_key_for_testing_purposes_only_needs_sixty_four_chars_0123";

/// Helper harness: application state backed by an in-memory SQLite
/// database, with a wiremock server standing in for the payment gateway.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway_server: MockServer,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let gateway_server = MockServer::start().await;

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payment_api_base = gateway_server.uri();
        cfg.payment_webhook_secret = Some(TEST_WEBHOOK_SECRET.to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(pedalpoint_api::events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(cfg.jwt_expiration),
        )));

        let gateway = Arc::new(PaymentGateway::from_config(&cfg));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            auth_service,
            gateway,
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = pedalpoint_api::app_router(state.clone());

        Self {
            router,
            state,
            gateway_server,
            _event_task: event_task,
        }
    }

    /// Mints a buyer token for the given customer
    pub fn buyer_token(&self, customer_id: Uuid) -> String {
        self.state
            .services
            .auth
            .issue_token(
                customer_id,
                Some("rider@pedalpoint.example".to_string()),
                vec![],
            )
            .expect("token issuance should succeed")
    }

    /// Mints a token carrying the admin order permission
    pub fn admin_token(&self, customer_id: Uuid) -> String {
        self.state
            .services
            .auth
            .issue_token(customer_id, None, vec!["orders:manage".to_string()])
            .expect("token issuance should succeed")
    }

    /// Inserts a catalog product directly
    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        stock_on_hand: i32,
        stock_policy: StockPolicy,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let model = product::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            price: Set(price),
            image_url: Set(Some(format!("https://cdn.pedalpoint.example/{id}.jpg"))),
            stock_on_hand: Set(stock_on_hand),
            stock_policy: Set(stock_policy),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        model
            .insert(&*self.state.db)
            .await
            .expect("failed to seed product");
        id
    }

    /// Sends a request through the full router and returns status + JSON
    /// body (Null when the body is not JSON)
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request should build"),
            None => builder.body(Body::empty()).expect("request should build"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request should not fail");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Posts a raw webhook body with the given signature header
    pub async fn post_webhook(&self, body: &str, signature: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("Content-Type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("Stripe-Signature", signature);
        }

        let request = builder
            .body(Body::from(body.to_string()))
            .expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request should not fail");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Counts persisted orders
    pub async fn order_count(&self) -> usize {
        Order::find()
            .all(&*self.state.db)
            .await
            .expect("orders should be queryable")
            .len()
    }
}

/// Computes a valid `Stripe-Signature` header for a webhook payload
pub fn sign_webhook(payload: &str, secret: &str) -> String {
    type HmacSha256 = Hmac<Sha256>;

    let timestamp = Utc::now().timestamp().to_string();
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    let digest = hex::encode(mac.finalize().into_bytes());

    format!("t={timestamp},v1={digest}")
}
