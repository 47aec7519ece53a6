use axum::{
    extract::{Path, State},
    Json,
};
use metrics::counter;
use serde::Serialize;
use tracing::debug;

use folio_core::totals::Totals;
use folio_core::types::{Customer, OrderLineDetail, OrderSummary, Product};

use crate::problem::ProblemResponse;
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct CustomerOrders {
    pub customer_id: String,
    pub orders: Vec<OrderSummary>,
}

#[derive(Debug, Serialize)]
pub struct OrderLines {
    pub order_id: String,
    pub lines: Vec<OrderLineDetail>,
    pub totals: Totals,
}

fn record(kind: &'static str) {
    counter!("inquiry_requests_total", "kind" => kind).increment(1);
}

pub async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    record("products");
    Json(state.access().products().list().await)
}

pub async fn list_customers(State(state): State<AppState>) -> Json<Vec<Customer>> {
    record("customers");
    Json(state.access().customers().list().await)
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<Customer>, ProblemResponse> {
    record("customer");
    state
        .access()
        .customers()
        .get(&customer_id)
        .await
        .map(Json)
        .ok_or_else(|| customer_not_found(&customer_id))
}

/// Order history of a customer, newest first.
pub async fn customer_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<CustomerOrders>, ProblemResponse> {
    record("orders");
    if state.access().customers().get(&customer_id).await.is_none() {
        return Err(customer_not_found(&customer_id));
    }
    let orders = state.access().orders().list_for_customer(&customer_id).await;
    debug!(stage = "inquiry", customer_id = %customer_id, orders = orders.len(), "orders listed");
    Ok(Json(CustomerOrders {
        customer_id,
        orders,
    }))
}

/// Lines of one order with per-line and aggregate totals.
///
/// An unknown order yields an empty line list rather than an error.
pub async fn order_lines(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Json<OrderLines> {
    record("order_lines");
    let lines = state.access().orders().lines(&order_id).await;
    let totals = Totals::from_lines(lines.iter().map(|line| (line.quantity, line.unit_price)));
    Json(OrderLines {
        order_id,
        lines,
        totals,
    })
}

fn customer_not_found(customer_id: &str) -> ProblemResponse {
    ProblemResponse::not_found(
        "customer_not_found",
        format!("customer {customer_id} does not exist"),
    )
}
