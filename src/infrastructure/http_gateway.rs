//! `reqwest` implementation of [`RemoteGateway`] for the customer and
//! inventory services.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::errors::GatewayError;
use crate::domain::order::{Customer, InventoryItem};
use crate::domain::ports::RemoteGateway;
use crate::envelope::ApiResponse;

const CUSTOMER_SERVICE: &str = "customer";
const INVENTORY_SERVICE: &str = "inventory";

// ── Wire records ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ClientRecord {
    id: i32,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(rename = "telefono", default)]
    phone: String,
    #[serde(rename = "fecha_creacion", default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ProductRecord {
    id: i32,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(rename = "precio", deserialize_with = "decimal_from_json")]
    unit_price: BigDecimal,
    #[serde(rename = "stock")]
    available_quantity: i32,
    #[serde(rename = "fecha_creacion", default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct StockUpdate {
    stock: i32,
}

impl From<ClientRecord> for Customer {
    fn from(r: ClientRecord) -> Self {
        Customer {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            created_at: r.created_at,
        }
    }
}

impl From<ProductRecord> for InventoryItem {
    fn from(r: ProductRecord) -> Self {
        InventoryItem {
            id: r.id,
            name: r.name,
            unit_price: r.unit_price.round(2),
            available_quantity: r.available_quantity,
            created_at: r.created_at,
        }
    }
}

/// Prices come back as JSON numbers or as decimal strings depending on the
/// store behind the inventory service. Numbers are re-read from their
/// shortest textual form so `5.99` stays exactly `5.99`.
fn decimal_from_json<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s,
        other => {
            return Err(de::Error::custom(format!(
                "expected a decimal amount, got {}",
                other
            )))
        }
    };
    BigDecimal::from_str(text.trim()).map_err(de::Error::custom)
}

// ── Replies ───────────────────────────────────────────────────────────────────

/// What a remote endpoint answered, once the transport part succeeded.
#[derive(Debug)]
enum RemoteReply<T> {
    Success(T),
    /// Well-formed envelope with `success: false` or no `data`.
    Failed(String),
}

impl<T> RemoteReply<T> {
    fn or_not_found(self, resource: &'static str, id: i32) -> Result<T, GatewayError> {
        match self {
            RemoteReply::Success(value) => Ok(value),
            RemoteReply::Failed(message) => Err(GatewayError::NotFound {
                resource,
                id,
                message,
            }),
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────────────────

pub struct HttpGateway {
    client: Client,
    clients_url: String,
    products_url: String,
}

impl HttpGateway {
    /// Builds a gateway whose every call is bounded by `timeout`.
    pub fn new(clients_url: &str, products_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sales-service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            clients_url: clients_url.trim_end_matches('/').to_string(),
            products_url: products_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        service: &'static str,
        request: RequestBuilder,
    ) -> Result<RemoteReply<T>, GatewayError> {
        let unavailable = |reason: String| GatewayError::Unavailable { service, reason };

        let response = request
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(unavailable(format!("HTTP {}", status)));
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| unavailable(format!("malformed response (HTTP {}): {}", status, e)))?;

        Ok(match envelope {
            ApiResponse {
                success: true,
                data: Some(data),
                ..
            } => RemoteReply::Success(data),
            ApiResponse { message, error, .. } => RemoteReply::Failed(
                message
                    .or(error)
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            ),
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_customer(&self, id: i32) -> Result<Customer, GatewayError> {
        let url = format!("{}/clients/{}", self.clients_url, id);
        self.call::<ClientRecord>(CUSTOMER_SERVICE, self.client.get(url))
            .await?
            .or_not_found("customer", id)
            .map(Customer::from)
    }

    async fn fetch_item(&self, id: i32) -> Result<InventoryItem, GatewayError> {
        let url = format!("{}/products/{}", self.products_url, id);
        self.call::<ProductRecord>(INVENTORY_SERVICE, self.client.get(url))
            .await?
            .or_not_found("inventory item", id)
            .map(InventoryItem::from)
    }

    async fn set_item_quantity(
        &self,
        id: i32,
        new_quantity: i32,
    ) -> Result<InventoryItem, GatewayError> {
        let url = format!("{}/products/{}/stock", self.products_url, id);
        let request = self.client.put(url).json(&StockUpdate {
            stock: new_quantity,
        });
        self.call::<ProductRecord>(INVENTORY_SERVICE, request)
            .await?
            .or_not_found("inventory item", id)
            .map(InventoryItem::from)
    }
}
