use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

/// One requested line of a new order, before it is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub item_id: i32,
    pub quantity: i32,
}

/// A validated line item carrying the unit price observed when the order was
/// priced.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub item_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: i32,
    pub lines: Vec<NewLineItem>,
}

#[derive(Debug, Clone)]
pub struct LineItemView {
    pub item_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: i32,
    pub customer_id: i32,
    pub total: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<LineItemView>,
}

/// Customer record owned by the customer service.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Inventory item owned by the inventory service.
#[derive(Debug, Clone)]
pub struct InventoryItem {
    pub id: i32,
    pub name: String,
    pub unit_price: BigDecimal,
    pub available_quantity: i32,
    pub created_at: Option<DateTime<Utc>>,
}
