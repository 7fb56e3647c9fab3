use std::collections::HashMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use super::errors::{DomainError, GatewayError};
use super::order::{Customer, InventoryItem, NewOrder, OrderView};

/// Persistence boundary for orders and their line items.
///
/// `create` and `update_total` only run inside a scope obtained from
/// `begin_scope`; nothing they write is visible until `commit`.
#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    type Scope: Send;

    async fn begin_scope(&self) -> Result<Self::Scope, DomainError>;
    async fn commit(&self, scope: Self::Scope) -> Result<(), DomainError>;
    async fn rollback(&self, scope: Self::Scope) -> Result<(), DomainError>;

    async fn create(&self, scope: &mut Self::Scope, order: &NewOrder) -> Result<i32, DomainError>;
    async fn update_total(
        &self,
        scope: &mut Self::Scope,
        id: i32,
        total: &BigDecimal,
    ) -> Result<(), DomainError>;

    async fn find_all(&self) -> Result<Vec<OrderView>, DomainError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<OrderView>, DomainError>;
    async fn find_by_customer_id(&self, customer_id: i32) -> Result<Vec<OrderView>, DomainError>;
    /// Removes the order and its line items. Returns `false` when no order
    /// had that id.
    async fn delete(&self, id: i32) -> Result<bool, DomainError>;
}

/// Outbound calls to the customer and inventory services.
#[async_trait]
pub trait RemoteGateway: Send + Sync + 'static {
    async fn fetch_customer(&self, id: i32) -> Result<Customer, GatewayError>;
    async fn fetch_item(&self, id: i32) -> Result<InventoryItem, GatewayError>;
    async fn set_item_quantity(
        &self,
        id: i32,
        new_quantity: i32,
    ) -> Result<InventoryItem, GatewayError>;

    /// Fetches each id in turn, keyed by the id that was asked for. Ids the
    /// inventory service does not know are left out of the result; a
    /// transport failure aborts the whole batch.
    async fn fetch_items(&self, ids: &[i32]) -> Result<HashMap<i32, InventoryItem>, GatewayError> {
        let mut items = HashMap::with_capacity(ids.len());
        for &id in ids {
            match self.fetch_item(id).await {
                Ok(item) => {
                    items.insert(id, item);
                }
                Err(GatewayError::NotFound { .. }) => {
                    log::debug!("inventory item {} not found", id);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(items)
    }
}
