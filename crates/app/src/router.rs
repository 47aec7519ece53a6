use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use chrono_tz::Tz;
use folio_storage::DataAccess;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::invoicing::{self, InvoiceWorkflow};
use crate::session::SessionRegistry;
use crate::{inquiry, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    access: DataAccess,
    invoices: InvoiceWorkflow,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        access: DataAccess,
        timezone: Tz,
        session_idle_timeout: Duration,
    ) -> Self {
        let invoices = InvoiceWorkflow::new(
            access.clone(),
            SessionRegistry::new(session_idle_timeout),
            timezone,
            Arc::new(Utc::now),
        );
        Self {
            metrics,
            access,
            invoices,
        }
    }

    #[cfg(test)]
    pub fn with_clock(
        mut self,
        clock: Arc<dyn Fn() -> chrono::DateTime<Utc> + Send + Sync>,
    ) -> Self {
        self.invoices = self.invoices.with_clock(clock);
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn access(&self) -> &DataAccess {
        &self.access
    }

    pub fn invoices(&self) -> &InvoiceWorkflow {
        &self.invoices
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/products", get(inquiry::list_products))
        .route("/customers", get(inquiry::list_customers))
        .route("/customers/:id", get(inquiry::get_customer))
        .route("/customers/:id/orders", get(inquiry::customer_orders))
        .route("/orders/:id/lines", get(inquiry::order_lines))
        .route("/sessions", post(invoicing::open_session))
        .route(
            "/sessions/:id",
            get(invoicing::get_session).delete(invoicing::discard_session),
        )
        .route("/sessions/:id/lines", post(invoicing::stage_line))
        .route("/sessions/:id/reset", post(invoicing::reset_session))
        .route("/sessions/:id/save", post(invoicing::save_session))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}
