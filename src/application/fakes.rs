//! In-memory stand-ins for the order store and the remote services.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;

use crate::domain::errors::{DomainError, GatewayError};
use crate::domain::order::{Customer, InventoryItem, LineItemView, NewOrder, OrderView};
use crate::domain::ports::{OrderRepository, RemoteGateway};

// ── Order store ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RepoState {
    orders: BTreeMap<i32, OrderView>,
    next_id: i32,
    rollbacks: usize,
    fail_update_total: bool,
}

/// Staged writes; only applied to the store on commit.
#[derive(Debug, Default)]
pub struct MemoryScope {
    pending: Option<OrderView>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<Mutex<RepoState>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    /// The id handed out by the most recent `create`, committed or not.
    pub fn last_assigned_id(&self) -> Option<i32> {
        let next = self.state.lock().unwrap().next_id;
        (next > 0).then_some(next)
    }

    pub fn fail_update_total(&self, fail: bool) {
        self.state.lock().unwrap().fail_update_total = fail;
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    type Scope = MemoryScope;

    async fn begin_scope(&self) -> Result<MemoryScope, DomainError> {
        Ok(MemoryScope::default())
    }

    async fn commit(&self, scope: MemoryScope) -> Result<(), DomainError> {
        if let Some(order) = scope.pending {
            self.state.lock().unwrap().orders.insert(order.id, order);
        }
        Ok(())
    }

    async fn rollback(&self, _scope: MemoryScope) -> Result<(), DomainError> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    async fn create(&self, scope: &mut MemoryScope, order: &NewOrder) -> Result<i32, DomainError> {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            state.next_id
        };
        scope.pending = Some(OrderView {
            id,
            customer_id: order.customer_id,
            total: BigDecimal::from(0),
            created_at: Utc::now(),
            lines: order
                .lines
                .iter()
                .map(|l| LineItemView {
                    item_id: l.item_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price.clone(),
                })
                .collect(),
        });
        Ok(id)
    }

    async fn update_total(
        &self,
        scope: &mut MemoryScope,
        id: i32,
        total: &BigDecimal,
    ) -> Result<(), DomainError> {
        if self.state.lock().unwrap().fail_update_total {
            return Err(DomainError::Internal("disk full".to_string()));
        }
        match scope.pending.as_mut() {
            Some(order) if order.id == id => {
                order.total = total.clone();
                Ok(())
            }
            _ => Err(DomainError::Internal(format!("order {} not in scope", id))),
        }
    }

    async fn find_all(&self) -> Result<Vec<OrderView>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .values()
            .rev()
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<OrderView>, DomainError> {
        Ok(self.state.lock().unwrap().orders.get(&id).cloned())
    }

    async fn find_by_customer_id(&self, customer_id: i32) -> Result<Vec<OrderView>, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .values()
            .rev()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i32) -> Result<bool, DomainError> {
        Ok(self.state.lock().unwrap().orders.remove(&id).is_some())
    }
}

// ── Remote services ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct GatewayState {
    customers: HashMap<i32, Customer>,
    items: HashMap<i32, InventoryItem>,
    unreachable: bool,
    failing_fetches: HashSet<i32>,
    failing_updates: HashSet<i32>,
    calls: usize,
    item_fetches: usize,
    updates: Vec<(i32, i32)>,
    update_delay: Option<Duration>,
    reported_ids: HashMap<i32, i32>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_customer(&self, id: i32, name: &str) {
        self.state.lock().unwrap().customers.insert(
            id,
            Customer {
                id,
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                phone: "555-0100".to_string(),
                created_at: Some(Utc::now()),
            },
        );
    }

    pub fn add_item(&self, id: i32, name: &str, price: &str, stock: i32) {
        self.state.lock().unwrap().items.insert(
            id,
            InventoryItem {
                id,
                name: name.to_string(),
                unit_price: BigDecimal::from_str(price).expect("valid price"),
                available_quantity: stock,
                created_at: Some(Utc::now()),
            },
        );
    }

    pub fn set_price(&self, id: i32, price: &str) {
        if let Some(item) = self.state.lock().unwrap().items.get_mut(&id) {
            item.unit_price = BigDecimal::from_str(price).expect("valid price");
        }
    }

    /// Every call fails as if the services were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn fail_fetch_of(&self, id: i32) {
        self.state.lock().unwrap().failing_fetches.insert(id);
    }

    pub fn fail_update_of(&self, id: i32) {
        self.state.lock().unwrap().failing_updates.insert(id);
    }

    /// Stock updates take `delay` before they answer.
    pub fn set_update_delay(&self, delay: Duration) {
        self.state.lock().unwrap().update_delay = Some(delay);
    }

    /// Fetching `requested` answers with the record of `reported`, as an
    /// inventory service with a routing bug would.
    pub fn misreport_id(&self, requested: i32, reported: i32) {
        self.state.lock().unwrap().reported_ids.insert(requested, reported);
    }

    pub fn stock_of(&self, id: i32) -> i32 {
        self.state.lock().unwrap().items[&id].available_quantity
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn item_fetches(&self) -> usize {
        self.state.lock().unwrap().item_fetches
    }

    /// `(item_id, new_quantity)` for every successful stock update, in order.
    pub fn updates(&self) -> Vec<(i32, i32)> {
        self.state.lock().unwrap().updates.clone()
    }
}

fn down(service: &'static str) -> GatewayError {
    GatewayError::Unavailable {
        service,
        reason: "connection refused".to_string(),
    }
}

fn missing(resource: &'static str, id: i32) -> GatewayError {
    GatewayError::NotFound {
        resource,
        id,
        message: format!("{} {} does not exist", resource, id),
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn fetch_customer(&self, id: i32) -> Result<Customer, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.unreachable {
            return Err(down("customer"));
        }
        state
            .customers
            .get(&id)
            .cloned()
            .ok_or_else(|| missing("customer", id))
    }

    async fn fetch_item(&self, id: i32) -> Result<InventoryItem, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.item_fetches += 1;
        if state.unreachable || state.failing_fetches.contains(&id) {
            return Err(down("inventory"));
        }
        let source = state.reported_ids.get(&id).copied().unwrap_or(id);
        state
            .items
            .get(&source)
            .cloned()
            .ok_or_else(|| missing("inventory item", id))
    }

    async fn set_item_quantity(
        &self,
        id: i32,
        new_quantity: i32,
    ) -> Result<InventoryItem, GatewayError> {
        let delay = self.state.lock().unwrap().update_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.unreachable || state.failing_updates.contains(&id) {
            return Err(down("inventory"));
        }
        let item = state
            .items
            .get_mut(&id)
            .ok_or_else(|| missing("inventory item", id))?;
        item.available_quantity = new_quantity;
        let updated = item.clone();
        state.updates.push((id, new_quantity));
        Ok(updated)
    }
}
