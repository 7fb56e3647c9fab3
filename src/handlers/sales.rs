use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::order::{LineItemView, LineRequest, OrderView};
use crate::envelope::ApiResponse;
use crate::errors::AppError;
use crate::SalesService;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSaleLineRequest {
    #[serde(rename = "producto_id")]
    pub product_id: i32,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
}

/// Missing fields fall back to values the order service rejects, so an
/// incomplete body surfaces as `InvalidRequest` rather than a parse error.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSaleRequest {
    #[serde(rename = "cliente_id", default)]
    pub customer_id: i32,
    #[serde(rename = "productos", default)]
    pub products: Vec<CreateSaleLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleLineResponse {
    pub producto_id: i32,
    pub cantidad: i32,
    /// Unit price captured when the sale was made, e.g. "5.00"
    pub precio_unitario: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleResponse {
    pub id: i32,
    pub cliente_id: i32,
    /// Decimal total with two places, e.g. "20.00"
    pub total: String,
    pub fecha_venta: String,
    pub productos: Vec<SaleLineResponse>,
}

impl From<CreateSaleLineRequest> for LineRequest {
    fn from(l: CreateSaleLineRequest) -> Self {
        LineRequest {
            item_id: l.product_id,
            quantity: l.quantity,
        }
    }
}

impl From<LineItemView> for SaleLineResponse {
    fn from(l: LineItemView) -> Self {
        SaleLineResponse {
            producto_id: l.item_id,
            cantidad: l.quantity,
            precio_unitario: l.unit_price.with_scale(2).to_string(),
        }
    }
}

impl From<OrderView> for SaleResponse {
    fn from(o: OrderView) -> Self {
        SaleResponse {
            id: o.id,
            cliente_id: o.customer_id,
            total: o.total.with_scale(2).to_string(),
            fecha_venta: o.created_at.to_rfc3339(),
            productos: o.lines.into_iter().map(SaleLineResponse::from).collect(),
        }
    }
}

fn to_responses(orders: Vec<OrderView>) -> Vec<SaleResponse> {
    orders.into_iter().map(SaleResponse::from).collect()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /api/sales
///
/// Validates the sale against the customer and inventory services, stores it
/// and decrements remote stock for every line.
#[utoipa::path(
    post,
    path = "/api/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale created, wrapped in the success envelope", body = SaleResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Customer or inventory item not found"),
        (status = 409, description = "Insufficient stock"),
        (status = 502, description = "A stock update failed; the sale was not recorded"),
        (status = 503, description = "Customer or inventory service unreachable"),
    ),
    tag = "sales"
)]
pub async fn create_sale(
    service: web::Data<SalesService>,
    body: web::Json<CreateSaleRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let lines = body.products.into_iter().map(LineRequest::from).collect();

    let order = service.create_order(body.customer_id, lines).await?;

    Ok(HttpResponse::Created()
        .json(ApiResponse::ok(SaleResponse::from(order)).with_message("Sale created")))
}

/// GET /api/sales
#[utoipa::path(
    get,
    path = "/api/sales",
    responses(
        (status = 200, description = "All sales, newest first", body = [SaleResponse]),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sales"
)]
pub async fn list_sales(service: web::Data<SalesService>) -> Result<HttpResponse, AppError> {
    let orders = service.list_orders().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(to_responses(orders))))
}

/// GET /api/sales/{id}
#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    params(
        ("id" = i32, Path, description = "Sale id"),
    ),
    responses(
        (status = 200, description = "Sale found", body = SaleResponse),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Sale not found"),
    ),
    tag = "sales"
)]
pub async fn get_sale(
    service: web::Data<SalesService>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    let order = service.get_order(id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(SaleResponse::from(order))))
}

/// GET /api/sales/client/{id}
#[utoipa::path(
    get,
    path = "/api/sales/client/{id}",
    params(
        ("id" = i32, Path, description = "Customer id"),
    ),
    responses(
        (status = 200, description = "Sales of the customer", body = [SaleResponse]),
        (status = 400, description = "Invalid customer id"),
    ),
    tag = "sales"
)]
pub async fn get_sales_by_client(
    service: web::Data<SalesService>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();

    let orders = service.get_orders_by_customer(customer_id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(to_responses(orders))))
}

/// DELETE /api/sales/{id}
///
/// Removes the sale and its lines. Stock is not returned to inventory.
#[utoipa::path(
    delete,
    path = "/api/sales/{id}",
    params(
        ("id" = i32, Path, description = "Sale id"),
    ),
    responses(
        (status = 200, description = "Sale deleted"),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Sale not found"),
    ),
    tag = "sales"
)]
pub async fn delete_sale(
    service: web::Data<SalesService>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();

    service.delete_order(id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message_only("Sale deleted")))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn create_request_reads_wire_names() {
        let req: CreateSaleRequest = serde_json::from_str(
            r#"{"cliente_id":1,"productos":[{"producto_id":10,"cantidad":2},{"producto_id":11,"cantidad":4}]}"#,
        )
        .expect("parse");

        assert_eq!(req.customer_id, 1);
        let lines: Vec<LineRequest> = req.products.into_iter().map(LineRequest::from).collect();
        assert_eq!(
            lines,
            vec![
                LineRequest { item_id: 10, quantity: 2 },
                LineRequest { item_id: 11, quantity: 4 },
            ]
        );
    }

    #[test]
    fn create_request_with_missing_fields_defaults_to_rejected_values() {
        let req: CreateSaleRequest = serde_json::from_str("{}").expect("parse");
        assert_eq!(req.customer_id, 0);
        assert!(req.products.is_empty());
    }

    #[test]
    fn sale_response_renders_two_decimal_amounts() {
        let order = OrderView {
            id: 3,
            customer_id: 1,
            total: BigDecimal::from(20),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            lines: vec![LineItemView {
                item_id: 11,
                quantity: 4,
                unit_price: BigDecimal::from_str("2.5").unwrap(),
            }],
        };

        let body = serde_json::to_value(SaleResponse::from(order)).expect("serialize");

        assert_eq!(body["total"], "20.00");
        assert_eq!(body["cliente_id"], 1);
        assert_eq!(body["fecha_venta"], "2024-05-01T12:00:00+00:00");
        assert_eq!(body["productos"][0]["producto_id"], 11);
        assert_eq!(body["productos"][0]["precio_unitario"], "2.50");
    }
}
