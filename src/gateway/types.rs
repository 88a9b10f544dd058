use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One priced line in a session-create request. Amounts are in minor
/// currency units, as the gateway requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLineItemInput {
    pub name: String,
    pub image_url: Option<String>,
    pub unit_amount_minor: i64,
    pub quantity: i64,
}

/// Request to create a hosted checkout session
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub currency: String,
    pub line_items: Vec<SessionLineItemInput>,
    /// Round-tripped through the gateway; this is the only channel that
    /// reaches the webhook, so it carries the buyer id and shipping fields.
    pub metadata: Vec<(String, String)>,
}

impl CreateSessionRequest {
    /// Flattens the request into the gateway's form-encoded wire format.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        if let Some(email) = &self.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }

        for (i, item) in self.line_items.iter().enumerate() {
            form.push((
                format!("line_items[{}][price_data][currency]", i),
                self.currency.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount_minor.to_string(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            if let Some(image) = &item.image_url {
                form.push((
                    format!("line_items[{}][price_data][product_data][images][0]", i),
                    image.clone(),
                ));
            }
            form.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        for (key, value) in &self.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        form
    }
}

/// A hosted checkout session as the gateway reports it, both in the
/// session-create response and inside webhook payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub shipping_details: Option<CollectedShipping>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Shipping information the gateway collected from the buyer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedShipping {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<CollectedAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// A webhook event envelope. `data.object` stays untyped until the event
/// type has been inspected; irrelevant event types are acknowledged
/// without being parsed any further.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub object: serde_json::Value,
}

/// Line items re-fetched from the session's sub-resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLineItemList {
    #[serde(default)]
    pub data: Vec<SessionLineItem>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLineItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub price: Option<PriceRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRef {
    #[serde(default)]
    pub unit_amount: Option<i64>,
}
