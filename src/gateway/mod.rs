//! Hosted payment gateway integration.
//!
//! The gateway owns the payment UI and the money movement; this module
//! only creates checkout sessions, re-fetches their line items, and
//! verifies the signatures on the gateway's webhook deliveries.

pub mod signature;
pub mod types;

pub use signature::verify_signature;
pub use types::{
    CheckoutSession, CollectedAddress, CollectedShipping, CreateSessionRequest, GatewayEvent,
    SessionLineItem, SessionLineItemInput, SessionLineItemList,
};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use tracing::{debug, error};

/// HTTP client for the payment gateway API
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl PaymentGateway {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.payment_secret_key.clone(), cfg.payment_api_base.clone())
    }

    /// Creates a hosted checkout session. The returned session id is the
    /// correlation key for the provisional order and the later webhook.
    pub async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let form = request.to_form();

        debug!(line_items = request.line_items.len(), "creating checkout session");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("session create request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "checkout session creation rejected");
            return Err(ServiceError::GatewayError(format!(
                "session create returned {}",
                status
            )));
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("session create response: {}", e)))
    }

    /// Fetches the purchased line items for a session. The webhook payload
    /// is not trusted to carry full item detail, so the reconciler always
    /// re-fetches from this sub-resource.
    pub async fn list_line_items(
        &self,
        session_id: &str,
    ) -> Result<SessionLineItemList, ServiceError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}/line_items",
            self.api_base, session_id
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("line items request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, session_id, "line item fetch rejected");
            return Err(ServiceError::GatewayError(format!(
                "line items returned {}",
                status
            )));
        }

        response
            .json::<SessionLineItemList>()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("line items response: {}", e)))
    }
}
