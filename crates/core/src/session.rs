use serde::Serialize;
use thiserror::Error;

use crate::folio::Folio;
use crate::totals::Totals;
use crate::types::{OrderLineInput, Product};

/// In-progress invoice owned by one client session.
///
/// Holds the folio reserved for the invoice and the lines staged so far.
/// Nothing here touches the store; persistence happens only on save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceSession {
    folio: Folio,
    lines: Vec<StagedLine>,
}

/// A product line waiting to be saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedLine {
    pub product_id: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl StagedLine {
    pub fn subtotal(&self) -> f64 {
        Totals::for_line(self.quantity, self.unit_price).subtotal
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StagingError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("quantity for product {0} exceeds the supported range")]
    QuantityOverflow(String),
}

impl InvoiceSession {
    pub fn new(folio: Folio) -> Self {
        Self {
            folio,
            lines: Vec::new(),
        }
    }

    pub fn folio(&self) -> &Folio {
        &self.folio
    }

    pub fn lines(&self) -> &[StagedLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Stages `quantity` units of `product`.
    ///
    /// A product that is already staged has its quantity increased instead of
    /// gaining a second line, since an order holds each product at most once.
    pub fn add_line(
        &mut self,
        product: &Product,
        quantity: u32,
    ) -> Result<&StagedLine, StagingError> {
        if quantity == 0 {
            return Err(StagingError::ZeroQuantity);
        }

        let position = match self
            .lines
            .iter()
            .position(|line| line.product_id == product.id)
        {
            Some(position) => {
                let line = &mut self.lines[position];
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| StagingError::QuantityOverflow(product.id.clone()))?;
                position
            }
            None => {
                self.lines.push(StagedLine {
                    product_id: product.id.clone(),
                    description: product.description.clone(),
                    quantity,
                    unit_price: product.unit_price,
                });
                self.lines.len() - 1
            }
        };

        Ok(&self.lines[position])
    }

    pub fn totals(&self) -> Totals {
        Totals::from_lines(
            self.lines
                .iter()
                .map(|line| (line.quantity, line.unit_price)),
        )
    }

    /// Lines in staging order, ready to be written.
    pub fn order_lines(&self) -> Vec<OrderLineInput> {
        self.lines
            .iter()
            .map(|line| OrderLineInput {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            })
            .collect()
    }

    /// Drops staged lines and takes a freshly generated folio.
    pub fn reset(&mut self, next_folio: Folio) {
        self.lines.clear();
        self.folio = next_folio;
    }
}
