use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use folio_core::folio::Folio;
use folio_core::session::{InvoiceSession, StagingError};
use folio_core::totals::Totals;
use folio_storage::{DataAccess, NewOrder, SaveOutcome};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::SessionRegistry;

/// Drives staged invoices from creation to persistence.
#[derive(Clone)]
pub struct InvoiceWorkflow {
    access: DataAccess,
    sessions: SessionRegistry,
    timezone: Tz,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

/// Staged invoice as returned to clients.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub folio: Folio,
    pub lines: Vec<StagedLineView>,
    pub totals: Totals,
}

#[derive(Debug, Serialize)]
pub struct StagedLineView {
    pub product_id: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub subtotal: f64,
}

impl SessionView {
    fn from_session(session_id: Uuid, session: &InvoiceSession) -> Self {
        Self {
            session_id,
            folio: session.folio().clone(),
            lines: session
                .lines()
                .iter()
                .map(|line| StagedLineView {
                    product_id: line.product_id.clone(),
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    subtotal: line.subtotal(),
                })
                .collect(),
            totals: session.totals(),
        }
    }
}

/// Summary of a persisted invoice plus the session state that follows it.
#[derive(Debug, Serialize)]
pub struct SavedInvoice {
    pub folio: String,
    pub customer_id: String,
    pub order_date: NaiveDate,
    pub lines: usize,
    pub totals: Totals,
    pub next: SessionView,
}

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoice session {0} does not exist")]
    SessionNotFound(Uuid),
    #[error("product {0} does not exist")]
    ProductNotFound(String),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error("invoice has no lines to save")]
    EmptyInvoice,
    #[error("store is not connected")]
    StoreUnavailable,
    #[error("invoice {folio} was not saved: {detail}")]
    SaveRejected { folio: String, detail: String },
}

impl From<InvoiceError> for ProblemResponse {
    fn from(err: InvoiceError) -> Self {
        let detail = err.to_string();
        match err {
            InvoiceError::SessionNotFound(_) => Self::not_found("session_not_found", detail),
            InvoiceError::ProductNotFound(_) => Self::not_found("product_not_found", detail),
            InvoiceError::Staging(_) => Self::bad_request("invalid_quantity", detail),
            InvoiceError::EmptyInvoice => Self::bad_request("empty_invoice", detail),
            InvoiceError::StoreUnavailable => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", detail)
            }
            InvoiceError::SaveRejected { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "save_rejected", detail)
            }
        }
    }
}

impl InvoiceWorkflow {
    pub fn new(
        access: DataAccess,
        sessions: SessionRegistry,
        timezone: Tz,
        clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        Self {
            access,
            sessions,
            timezone,
            clock,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Today's date in the configured timezone.
    fn today(&self) -> NaiveDate {
        (self.clock)().with_timezone(&self.timezone).date_naive()
    }

    async fn reserve_folio(&self) -> Folio {
        let folio = self.access.orders().next_folio().await;
        counter!("folio_generated_total").increment(1);
        folio
    }

    pub async fn open_session(&self) -> SessionView {
        let folio = self.reserve_folio().await;
        let (id, session) = self.sessions.open(folio);
        info!(
            stage = "invoice",
            session_id = %id,
            folio = %session.folio(),
            "invoice session opened"
        );
        SessionView::from_session(id, &session)
    }

    pub fn view(&self, id: Uuid) -> Result<SessionView, InvoiceError> {
        self.sessions
            .with_session(&id, |session| SessionView::from_session(id, session))
            .ok_or(InvoiceError::SessionNotFound(id))
    }

    pub async fn stage_line(
        &self,
        id: Uuid,
        product_id: &str,
        quantity: u32,
    ) -> Result<SessionView, InvoiceError> {
        if self.sessions.snapshot(&id).is_none() {
            return Err(InvoiceError::SessionNotFound(id));
        }
        let product = self
            .access
            .products()
            .get(product_id)
            .await
            .ok_or_else(|| InvoiceError::ProductNotFound(product_id.to_string()))?;

        let view = self
            .sessions
            .with_session(&id, |session| {
                session.add_line(&product, quantity)?;
                Ok::<_, InvoiceError>(SessionView::from_session(id, session))
            })
            .ok_or(InvoiceError::SessionNotFound(id))??;

        counter!("invoice_lines_staged_total").increment(1);
        info!(stage = "invoice", session_id = %id, product_id, quantity, "line staged");
        Ok(view)
    }

    /// Clears staged lines and reserves a fresh folio.
    pub async fn reset(&self, id: Uuid) -> Result<SessionView, InvoiceError> {
        if self.sessions.snapshot(&id).is_none() {
            return Err(InvoiceError::SessionNotFound(id));
        }
        let folio = self.reserve_folio().await;
        self.sessions
            .with_session(&id, |session| {
                session.reset(folio);
                SessionView::from_session(id, session)
            })
            .ok_or(InvoiceError::SessionNotFound(id))
    }

    pub fn discard(&self, id: Uuid) -> Result<(), InvoiceError> {
        if self.sessions.remove(&id) {
            Ok(())
        } else {
            Err(InvoiceError::SessionNotFound(id))
        }
    }

    /// Persists the staged invoice for `customer_id`.
    ///
    /// On success the session is cleared and takes the next folio. On
    /// failure the staged lines are kept so the caller can retry.
    pub async fn save(
        &self,
        id: Uuid,
        customer_id: &str,
        order_date: Option<NaiveDate>,
    ) -> Result<SavedInvoice, InvoiceError> {
        let session = self
            .sessions
            .snapshot(&id)
            .ok_or(InvoiceError::SessionNotFound(id))?;
        if session.is_empty() {
            return Err(InvoiceError::EmptyInvoice);
        }

        let order_date = order_date.unwrap_or_else(|| self.today());
        let lines = session.order_lines();
        let totals = session.totals();
        let outcome = self
            .access
            .orders()
            .save(&NewOrder {
                folio: session.folio().as_str(),
                customer_id,
                order_date,
                lines: &lines,
            })
            .await;

        let saved_lines = match outcome {
            SaveOutcome::Saved { lines, .. } => lines,
            SaveOutcome::Unavailable => return Err(InvoiceError::StoreUnavailable),
            SaveOutcome::NoLines => return Err(InvoiceError::EmptyInvoice),
            rejected => {
                counter!("order_save_failures_total", "reason" => rejected.kind_str())
                    .increment(1);
                warn!(
                    stage = "invoice",
                    session_id = %id,
                    folio = %session.folio(),
                    customer_id,
                    outcome = rejected.kind_str(),
                    "invoice save rejected"
                );
                return Err(InvoiceError::SaveRejected {
                    folio: session.folio().to_string(),
                    detail: describe_rejection(&rejected),
                });
            }
        };

        counter!("orders_saved_total").increment(1);
        let next_folio = self.reserve_folio().await;
        let next = self
            .sessions
            .with_session(&id, |current| {
                current.reset(next_folio.clone());
                SessionView::from_session(id, current)
            })
            .unwrap_or_else(|| SessionView::from_session(id, &InvoiceSession::new(next_folio)));

        info!(
            stage = "invoice",
            session_id = %id,
            folio = %session.folio(),
            customer_id,
            lines = saved_lines,
            total = totals.total,
            "invoice saved"
        );

        Ok(SavedInvoice {
            folio: session.folio().to_string(),
            customer_id: customer_id.to_string(),
            order_date,
            lines: saved_lines,
            totals,
            next,
        })
    }
}

fn describe_rejection(outcome: &SaveOutcome) -> String {
    match outcome {
        SaveOutcome::HeaderRejected { reason } => format!("order header rejected: {reason}"),
        SaveOutcome::LineRejected {
            position,
            product_id,
            reason,
        } => format!("line {} ({product_id}) rejected: {reason}", position + 1),
        other => other.kind_str().to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct StageLineRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub customer_id: String,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
}

pub async fn open_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let view = state.invoices().open_session().await;
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ProblemResponse> {
    Ok(Json(state.invoices().view(id)?))
}

pub async fn stage_line(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StageLineRequest>,
) -> Result<Json<SessionView>, ProblemResponse> {
    let view = state
        .invoices()
        .stage_line(id, &request.product_id, request.quantity)
        .await?;
    Ok(Json(view))
}

pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ProblemResponse> {
    Ok(Json(state.invoices().reset(id).await?))
}

pub async fn save_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SaveRequest>,
) -> Result<(StatusCode, Json<SavedInvoice>), ProblemResponse> {
    let saved = state
        .invoices()
        .save(id, &request.customer_id, request.order_date)
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn discard_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ProblemResponse> {
    state.invoices().discard(id)?;
    Ok(StatusCode::NO_CONTENT)
}
