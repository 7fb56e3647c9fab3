use std::collections::{HashMap, HashSet};

use bigdecimal::{BigDecimal, Zero};

use crate::domain::errors::{DomainError, GatewayError};
use crate::domain::order::{InventoryItem, LineRequest, NewLineItem, NewOrder, OrderView};
use crate::domain::ports::{OrderRepository, RemoteGateway};

/// A line that passed validation, with the stock level to write back.
struct PricedLine {
    item_id: i32,
    quantity: i32,
    unit_price: BigDecimal,
    remaining: i32,
}

/// Coordinates order creation across the customer service, the inventory
/// service and the local order store.
///
/// Remote stock is read and then overwritten with `observed - requested`
/// without any lock or version check, so concurrent orders for the same item
/// can oversell. A failed decrement rolls back the local order but does not
/// restore stock already decremented for earlier lines.
pub struct OrderService<R, G> {
    repo: R,
    gateway: G,
}

impl<R: OrderRepository, G: RemoteGateway> OrderService<R, G> {
    pub fn new(repo: R, gateway: G) -> Self {
        Self { repo, gateway }
    }

    pub async fn list_orders(&self) -> Result<Vec<OrderView>, DomainError> {
        self.repo.find_all().await
    }

    pub async fn get_order(&self, id: i32) -> Result<OrderView, DomainError> {
        ensure_positive(id, "order id")?;
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id))
    }

    pub async fn get_orders_by_customer(
        &self,
        customer_id: i32,
    ) -> Result<Vec<OrderView>, DomainError> {
        ensure_positive(customer_id, "customer id")?;
        self.repo.find_by_customer_id(customer_id).await
    }

    /// Deletes an order and its line items. Remote stock is left as is.
    pub async fn delete_order(&self, id: i32) -> Result<(), DomainError> {
        ensure_positive(id, "order id")?;
        if self.repo.find_by_id(id).await?.is_none() || !self.repo.delete(id).await? {
            return Err(DomainError::not_found("order", id));
        }
        log::info!("Deleted order {}", id);
        Ok(())
    }

    pub async fn create_order(
        &self,
        customer_id: i32,
        lines: Vec<LineRequest>,
    ) -> Result<OrderView, DomainError> {
        ensure_positive(customer_id, "customer id")?;
        if lines.is_empty() {
            return Err(DomainError::InvalidRequest(
                "an order must contain at least one line item".to_string(),
            ));
        }

        self.gateway
            .fetch_customer(customer_id)
            .await
            .map_err(|e| lookup_failure(e, "customer", customer_id))?;

        let catalog = self.fetch_catalog(&lines).await?;
        let (priced, total) = price_lines(&lines, &catalog)?;

        let mut scope = self.repo.begin_scope().await?;
        let order_id = match self
            .record_order(&mut scope, customer_id, &priced, &total)
            .await
        {
            Ok(id) => {
                self.repo.commit(scope).await?;
                id
            }
            Err(err) => {
                if let Err(rollback_err) = self.repo.rollback(scope).await {
                    log::error!(
                        "Rollback of order for customer {} failed: {}",
                        customer_id,
                        rollback_err
                    );
                }
                return Err(err);
            }
        };

        log::info!(
            "Created order {} for customer {} with {} line(s), total {}",
            order_id,
            customer_id,
            priced.len(),
            total
        );

        self.repo.find_by_id(order_id).await?.ok_or_else(|| {
            DomainError::Internal(format!("order {} missing after commit", order_id))
        })
    }

    /// Resolves every distinct requested item, keyed by the id that was asked
    /// for. Fails with the exact set of ids the inventory service could not
    /// resolve.
    async fn fetch_catalog(
        &self,
        lines: &[LineRequest],
    ) -> Result<HashMap<i32, InventoryItem>, DomainError> {
        let mut seen = HashSet::new();
        let requested: Vec<i32> = lines
            .iter()
            .map(|l| l.item_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let catalog = self
            .gateway
            .fetch_items(&requested)
            .await
            .map_err(|e| DomainError::UpstreamUnavailable(e.to_string()))?;

        let missing: Vec<i32> = requested
            .into_iter()
            .filter(|id| !catalog.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::NotFound {
                resource: "inventory item",
                ids: missing,
            });
        }
        Ok(catalog)
    }

    /// Writes the order inside `scope` and pushes the stock decrements, one
    /// line at a time in request order.
    async fn record_order(
        &self,
        scope: &mut R::Scope,
        customer_id: i32,
        lines: &[PricedLine],
        total: &BigDecimal,
    ) -> Result<i32, DomainError> {
        let order = NewOrder {
            customer_id,
            lines: lines
                .iter()
                .map(|l| NewLineItem {
                    item_id: l.item_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price.clone(),
                })
                .collect(),
        };
        let order_id = self.repo.create(scope, &order).await?;

        let mut decremented = Vec::with_capacity(lines.len());
        for line in lines {
            if let Err(e) = self
                .gateway
                .set_item_quantity(line.item_id, line.remaining)
                .await
            {
                if !decremented.is_empty() {
                    log::warn!(
                        "Stock update for item {} failed after items {:?} were already decremented; \
                         those decrements are not restored",
                        line.item_id,
                        decremented
                    );
                }
                return Err(DomainError::RemoteUpdateFailed {
                    item_id: line.item_id,
                    reason: e.to_string(),
                    decremented,
                });
            }
            decremented.push(line.item_id);
        }

        self.repo.update_total(scope, order_id, total).await?;
        Ok(order_id)
    }
}

fn ensure_positive(id: i32, what: &str) -> Result<(), DomainError> {
    if id <= 0 {
        return Err(DomainError::InvalidRequest(format!(
            "{} must be a positive integer, got {}",
            what, id
        )));
    }
    Ok(())
}

fn lookup_failure(err: GatewayError, resource: &'static str, id: i32) -> DomainError {
    match err {
        GatewayError::NotFound { .. } => DomainError::not_found(resource, id),
        GatewayError::Unavailable { .. } => DomainError::UpstreamUnavailable(err.to_string()),
    }
}

/// Validates each line against the observed stock and sums the total with the
/// observed prices. Nothing is re-fetched between the check and the pricing.
fn price_lines(
    lines: &[LineRequest],
    catalog: &HashMap<i32, InventoryItem>,
) -> Result<(Vec<PricedLine>, BigDecimal), DomainError> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut total = BigDecimal::zero();

    for line in lines {
        let item = catalog
            .get(&line.item_id)
            .ok_or_else(|| DomainError::not_found("inventory item", line.item_id))?;

        if line.quantity <= 0 {
            return Err(DomainError::InvalidRequest(format!(
                "invalid quantity {} for {}",
                line.quantity, item.name
            )));
        }
        if line.quantity > item.available_quantity {
            return Err(DomainError::InsufficientStock {
                item_id: line.item_id,
                item_name: item.name.clone(),
                requested: line.quantity,
                available: item.available_quantity,
            });
        }

        total += &item.unit_price * BigDecimal::from(line.quantity);
        priced.push(PricedLine {
            item_id: line.item_id,
            quantity: line.quantity,
            unit_price: item.unit_price.clone(),
            remaining: item.available_quantity - line.quantity,
        });
    }

    let total = total.with_scale(2);
    if total > max_order_total() {
        return Err(DomainError::InvalidRequest(format!(
            "order total {} exceeds the maximum of {}",
            total,
            max_order_total()
        )));
    }
    Ok((priced, total))
}

/// Largest total a `NUMERIC(10,2)` column holds.
fn max_order_total() -> BigDecimal {
    BigDecimal::new(9_999_999_999_i64.into(), 2)
}
