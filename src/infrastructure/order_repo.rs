use async_trait::async_trait;
use bigdecimal::BigDecimal;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tokio::task;

use crate::db::{DbConnection, DbPool};
use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrder, OrderView};
use crate::domain::ports::OrderRepository;
use crate::schema::{order_lines, orders};

use super::models::{NewOrderLineRow, NewOrderRow, OrderLineRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<task::JoinError> for DomainError {
    fn from(e: task::JoinError) -> Self {
        DomainError::Internal(format!("database task failed: {}", e))
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// An open Postgres transaction on a connection checked out of the pool.
///
/// The connection is lent to the blocking pool for each statement and handed
/// back afterwards. Dropping a scope that was neither committed nor rolled
/// back rolls it back, so the connection never returns to the pool
/// mid-transaction.
pub struct DieselScope {
    conn: Option<DbConnection>,
}

impl DieselScope {
    /// Runs `work` on the scope's connection off the async worker thread.
    async fn run<T, F>(&mut self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| DomainError::Internal("order scope already closed".to_string()))?;

        let (conn, result) = task::spawn_blocking(move || {
            let result = work(&mut conn);
            (conn, result)
        })
        .await?;

        self.conn = Some(conn);
        result
    }

    async fn finish(mut self, commit: bool) -> Result<(), DomainError> {
        let Some(mut conn) = self.conn.take() else {
            return Err(DomainError::Internal("order scope already closed".to_string()));
        };
        task::spawn_blocking(move || end_transaction(&mut conn, commit)).await?
    }
}

fn end_transaction(conn: &mut DbConnection, commit: bool) -> Result<(), DomainError> {
    let conn: &mut PgConnection = conn;
    if commit {
        AnsiTransactionManager::commit_transaction(conn)?;
    } else {
        AnsiTransactionManager::rollback_transaction(conn)?;
    }
    Ok(())
}

impl Drop for DieselScope {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        let mut rollback = move || {
            if let Err(e) = end_transaction(&mut conn, false) {
                log::error!("Failed to roll back abandoned order scope: {}", e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(rollback);
            }
            Err(_) => rollback(),
        }
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Checks out a connection and runs `work` on the blocking pool.
    async fn run<T, F>(&self, work: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut conn)
        })
        .await?
    }

    fn attach_lines(
        conn: &mut PgConnection,
        orders: Vec<OrderRow>,
    ) -> Result<Vec<OrderView>, DomainError> {
        let lines = OrderLineRow::belonging_to(&orders)
            .select(OrderLineRow::as_select())
            .order(order_lines::id.asc())
            .load(conn)?;

        Ok(lines
            .grouped_by(&orders)
            .into_iter()
            .zip(orders)
            .map(|(lines, order)| order.into_view(lines))
            .collect())
    }
}

#[async_trait]
impl OrderRepository for DieselOrderRepository {
    type Scope = DieselScope;

    async fn begin_scope(&self) -> Result<DieselScope, DomainError> {
        let pool = self.pool.clone();
        let conn = task::spawn_blocking(move || -> Result<DbConnection, DomainError> {
            let mut conn = pool.get()?;
            AnsiTransactionManager::begin_transaction(&mut *conn)?;
            Ok(conn)
        })
        .await??;
        Ok(DieselScope { conn: Some(conn) })
    }

    async fn commit(&self, scope: DieselScope) -> Result<(), DomainError> {
        scope.finish(true).await
    }

    async fn rollback(&self, scope: DieselScope) -> Result<(), DomainError> {
        scope.finish(false).await
    }

    async fn create(&self, scope: &mut DieselScope, order: &NewOrder) -> Result<i32, DomainError> {
        let order = order.clone();
        scope
            .run(move |conn| {
                // The total is finalized later in the same scope.
                let order_id: i32 = diesel::insert_into(orders::table)
                    .values(&NewOrderRow {
                        customer_id: order.customer_id,
                        total: BigDecimal::from(0),
                    })
                    .returning(orders::id)
                    .get_result(conn)?;

                let new_lines: Vec<NewOrderLineRow> = order
                    .lines
                    .into_iter()
                    .map(|l| NewOrderLineRow {
                        order_id,
                        product_id: l.item_id,
                        quantity: l.quantity,
                        unit_price: l.unit_price,
                    })
                    .collect();
                diesel::insert_into(order_lines::table)
                    .values(&new_lines)
                    .execute(conn)?;

                Ok(order_id)
            })
            .await
    }

    async fn update_total(
        &self,
        scope: &mut DieselScope,
        id: i32,
        total: &BigDecimal,
    ) -> Result<(), DomainError> {
        let total = total.clone();
        scope
            .run(move |conn| {
                let updated = diesel::update(orders::table.find(id))
                    .set(orders::total.eq(&total))
                    .execute(conn)?;
                if updated == 0 {
                    return Err(DomainError::Internal(format!(
                        "order {} disappeared before its total was written",
                        id
                    )));
                }
                Ok(())
            })
            .await
    }

    async fn find_all(&self) -> Result<Vec<OrderView>, DomainError> {
        self.run(|conn| {
            let rows = orders::table
                .select(OrderRow::as_select())
                .order((orders::created_at.desc(), orders::id.desc()))
                .load(conn)?;

            Self::attach_lines(conn, rows)
        })
        .await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<OrderView>, DomainError> {
        self.run(move |conn| {
            let order = orders::table
                .find(id)
                .select(OrderRow::as_select())
                .first(conn)
                .optional()?;

            let Some(order) = order else {
                return Ok(None);
            };

            Ok(Self::attach_lines(conn, vec![order])?.pop())
        })
        .await
    }

    async fn find_by_customer_id(&self, customer_id: i32) -> Result<Vec<OrderView>, DomainError> {
        self.run(move |conn| {
            let rows = orders::table
                .filter(orders::customer_id.eq(customer_id))
                .select(OrderRow::as_select())
                .order((orders::created_at.desc(), orders::id.desc()))
                .load(conn)?;

            Self::attach_lines(conn, rows)
        })
        .await
    }

    async fn delete(&self, id: i32) -> Result<bool, DomainError> {
        self.run(move |conn| {
            conn.transaction::<_, DomainError, _>(|conn| {
                diesel::delete(order_lines::table.filter(order_lines::order_id.eq(id)))
                    .execute(conn)?;
                let deleted = diesel::delete(orders::table.find(id)).execute(conn)?;
                Ok(deleted > 0)
            })
        })
        .await
    }
}
