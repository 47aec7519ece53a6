use chrono::NaiveDate;
use sqlx::{Sqlite, Transaction};
use tracing::{error, info, warn};

use folio_core::folio::{next_folio, Folio};
use folio_core::totals::Totals;
use folio_core::types::{OrderDate, OrderLineDetail, OrderLineInput, OrderSummary};

use crate::access::{bind_params, DataAccess, Param, Value};
use crate::catalog::owned_text;

const INSERT_HEADER: &str =
    "INSERT INTO Cte_Pedido (Id_Pedido, Id_Cte, Fecha_Pedido) VALUES (?, ?, ?)";
const INSERT_LINE: &str =
    "INSERT INTO Detalle_Pedido (Id_Pedido, Id_Producto, Cantidad) VALUES (?, ?, ?)";

/// Order header plus the lines to persist with it.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub folio: &'a str,
    pub customer_id: &'a str,
    pub order_date: NaiveDate,
    pub lines: &'a [OrderLineInput],
}

/// Result of [`OrderRepository::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { folio: String, lines: usize },
    /// Nothing was written because the order has no lines.
    NoLines,
    /// The store is not connected.
    Unavailable,
    HeaderRejected { reason: String },
    /// Line at `position` was rejected; the header and earlier lines were rolled back.
    LineRejected {
        position: usize,
        product_id: String,
        reason: String,
    },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }

    /// Short label used in logs and metrics.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Saved { .. } => "saved",
            Self::NoLines => "no_lines",
            Self::Unavailable => "unavailable",
            Self::HeaderRejected { .. } => "header_rejected",
            Self::LineRejected { .. } => "line_rejected",
        }
    }
}

/// Repository for order headers and their lines.
#[derive(Clone)]
pub struct OrderRepository {
    access: DataAccess,
}

impl OrderRepository {
    pub(crate) fn new(access: DataAccess) -> Self {
        Self { access }
    }

    /// Derives the next folio from the largest stored order identifier.
    ///
    /// The maximum is taken over the text column, so ordering is only
    /// numeric while every folio keeps three digits.
    pub async fn next_folio(&self) -> Folio {
        let rows = self
            .access
            .query("SELECT MAX(Id_Pedido) AS MaxFolio FROM Cte_Pedido", &[])
            .await;
        let current = rows.first().and_then(|row| row.text("MaxFolio"));
        next_folio(current)
    }

    /// Writes the header and every line in a single transaction.
    ///
    /// Lines are inserted in input order and the first rejected line aborts
    /// the save; no header survives without its lines.
    pub async fn save(&self, order: &NewOrder<'_>) -> SaveOutcome {
        let Some(database) = self.access.database() else {
            warn!(stage = "storage", folio = order.folio, "save skipped: store is not connected");
            return SaveOutcome::Unavailable;
        };
        if order.lines.is_empty() {
            return SaveOutcome::NoLines;
        }

        let mut tx = match database.pool().begin().await {
            Ok(tx) => tx,
            Err(err) => {
                error!(
                    stage = "storage",
                    folio = order.folio,
                    error = %err,
                    "failed to begin order transaction"
                );
                return SaveOutcome::HeaderRejected {
                    reason: err.to_string(),
                };
            }
        };

        let header_params = [
            Param::from(order.folio),
            Param::from(order.customer_id),
            Param::from(order.order_date),
        ];
        if let Err(err) = bind_params(sqlx::query(INSERT_HEADER), &header_params)
            .execute(&mut *tx)
            .await
        {
            error!(
                stage = "storage",
                folio = order.folio,
                customer_id = order.customer_id,
                error = %err,
                "order header rejected"
            );
            rollback(tx, order.folio).await;
            return SaveOutcome::HeaderRejected {
                reason: err.to_string(),
            };
        }

        for (position, line) in order.lines.iter().enumerate() {
            let line_params = [
                Param::from(order.folio),
                Param::from(line.product_id.as_str()),
                Param::from(line.quantity),
            ];
            if let Err(err) = bind_params(sqlx::query(INSERT_LINE), &line_params)
                .execute(&mut *tx)
                .await
            {
                error!(
                    stage = "storage",
                    folio = order.folio,
                    position,
                    product_id = %line.product_id,
                    error = %err,
                    "order line rejected, rolling back order"
                );
                rollback(tx, order.folio).await;
                return SaveOutcome::LineRejected {
                    position,
                    product_id: line.product_id.clone(),
                    reason: err.to_string(),
                };
            }
        }

        if let Err(err) = tx.commit().await {
            error!(stage = "storage", folio = order.folio, error = %err, "order commit failed");
            return SaveOutcome::HeaderRejected {
                reason: err.to_string(),
            };
        }

        info!(stage = "storage", folio = order.folio, lines = order.lines.len(), "order saved");
        SaveOutcome::Saved {
            folio: order.folio.to_string(),
            lines: order.lines.len(),
        }
    }

    /// Lists a customer's orders, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> Vec<OrderSummary> {
        self.access
            .query(
                "SELECT Id_Pedido, Fecha_Pedido FROM Cte_Pedido \
                 WHERE Id_Cte = ? \
                 ORDER BY Fecha_Pedido DESC, Id_Pedido DESC",
                &[customer_id.into()],
            )
            .await
            .iter()
            .map(|record| OrderSummary {
                order_id: owned_text(record, "Id_Pedido"),
                order_date: match record.get("Fecha_Pedido") {
                    Some(Value::Date(date)) => Some(OrderDate::Parsed(*date)),
                    Some(Value::Text(raw)) => Some(OrderDate::Raw(raw.clone())),
                    _ => None,
                },
            })
            .collect()
    }

    /// Lines of one order ordered by product description, with totals
    /// recomputed from the current unit prices.
    pub async fn lines(&self, order_id: &str) -> Vec<OrderLineDetail> {
        self.access
            .query(
                "SELECT p.Id_Producto AS Codigo_Producto, \
                        p.Desc_Producto, \
                        dp.Cantidad, \
                        p.Precio_Unitario \
                   FROM Detalle_Pedido dp \
                   JOIN Productos p ON dp.Id_Producto = p.Id_Producto \
                  WHERE dp.Id_Pedido = ? \
                  ORDER BY p.Desc_Producto",
                &[order_id.into()],
            )
            .await
            .iter()
            .map(|record| {
                let quantity = record.number("Cantidad").unwrap_or_default().max(0.0) as u32;
                let unit_price = record.number("Precio_Unitario").unwrap_or_default();
                let totals = Totals::for_line(quantity, unit_price);
                OrderLineDetail {
                    product_code: owned_text(record, "Codigo_Producto"),
                    description: owned_text(record, "Desc_Producto"),
                    quantity,
                    unit_price,
                    subtotal: totals.subtotal,
                    tax: totals.tax,
                    total: totals.total,
                }
            })
            .collect()
    }
}

async fn rollback(tx: Transaction<'_, Sqlite>, folio: &str) {
    if let Err(err) = tx.rollback().await {
        warn!(stage = "storage", folio, error = %err, "order rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_access() -> DataAccess {
        let database = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        database.ensure_schema().await.expect("schema");
        database.seed_demo_data().await.expect("seed");
        DataAccess::new(database)
    }

    async fn empty_access() -> DataAccess {
        let database = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        database.ensure_schema().await.expect("schema");
        DataAccess::new(database)
    }

    async fn count_rows(access: &DataAccess, table: &str, folio: &str) -> usize {
        access
            .query(
                &format!("SELECT Id_Pedido FROM {table} WHERE Id_Pedido = ?"),
                &[folio.into()],
            )
            .await
            .len()
    }

    fn line(product_id: &str, quantity: u32) -> OrderLineInput {
        OrderLineInput {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn next_folio_on_empty_table_is_seed() {
        let access = empty_access().await;
        assert_eq!(access.orders().next_folio().await.as_str(), "F001");
    }

    #[tokio::test]
    async fn next_folio_follows_existing_maximum() {
        let access = empty_access().await;
        access.database().unwrap().seed_demo_data().await.expect("seed");
        assert_eq!(access.orders().next_folio().await.as_str(), "P006");

        assert!(
            access
                .execute(
                    "INSERT INTO Cte_Pedido (Id_Pedido, Id_Cte, Fecha_Pedido) VALUES ('F007', 'C01', '2024-06-01')",
                    &[],
                )
                .await
        );
        // "P005" still sorts after "F007".
        assert_eq!(access.orders().next_folio().await.as_str(), "P006");
    }

    #[tokio::test]
    async fn next_folio_after_f007_is_f008() {
        let access = empty_access().await;
        for sql in [
            "INSERT INTO Estados VALUES ('E01', 'CDMX')",
            "INSERT INTO Clientes VALUES ('C01', 'Juan', NULL, NULL, 'E01', '01000', 'RFC')",
            "INSERT INTO Cte_Pedido VALUES ('F007', 'C01', '2024-06-01')",
        ] {
            assert!(access.execute(sql, &[]).await, "{sql}");
        }
        assert_eq!(access.orders().next_folio().await.as_str(), "F008");
    }

    #[tokio::test]
    async fn next_folio_after_f999_widens_to_four_digits() {
        let access = empty_access().await;
        for sql in [
            "INSERT INTO Estados VALUES ('E01', 'CDMX')",
            "INSERT INTO Clientes VALUES ('C01', 'Juan', NULL, NULL, 'E01', '01000', 'RFC')",
            "INSERT INTO Productos VALUES ('PD01', 'Laptop', 12000.0)",
            "INSERT INTO Cte_Pedido VALUES ('F999', 'C01', '2024-06-01')",
            "INSERT INTO Cte_Pedido VALUES ('F1000', 'C01', '2024-06-02')",
        ] {
            assert!(access.execute(sql, &[]).await, "{sql}");
        }
        // Text ordering keeps "F999" as the maximum, so the sequence repeats
        // "F1000" and the next save collides on the primary key.
        let folio = access.orders().next_folio().await;
        assert_eq!(folio.as_str(), "F1000");

        let lines = [line("PD01", 1)];
        let outcome = access
            .orders()
            .save(&NewOrder {
                folio: folio.as_str(),
                customer_id: "C01",
                order_date: june_first(),
                lines: &lines,
            })
            .await;
        assert!(matches!(outcome, SaveOutcome::HeaderRejected { .. }));
        assert_eq!(count_rows(&access, "Cte_Pedido", "F1000").await, 1);
        assert_eq!(count_rows(&access, "Detalle_Pedido", "F1000").await, 0);
    }

    #[tokio::test]
    async fn save_persists_header_and_lines() {
        let access = setup_access().await;
        let orders = access.orders();
        let folio = orders.next_folio().await;
        let lines = [line("PD03", 2), line("PD08", 1), line("PD10", 1)];

        let outcome = orders
            .save(&NewOrder {
                folio: folio.as_str(),
                customer_id: "C03",
                order_date: june_first(),
                lines: &lines,
            })
            .await;

        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                folio: "P006".to_string(),
                lines: 3
            }
        );
        assert_eq!(count_rows(&access, "Cte_Pedido", "P006").await, 1);
        assert_eq!(count_rows(&access, "Detalle_Pedido", "P006").await, 3);

        let history = orders.list_for_customer("C03").await;
        assert_eq!(history[0].order_id, "P006");
        assert_eq!(
            history[0].order_date,
            Some(OrderDate::Parsed(june_first()))
        );
    }

    #[tokio::test]
    async fn failing_second_line_leaves_no_rows() {
        let access = setup_access().await;
        let orders = access.orders();
        let lines = [line("PD01", 1), line("PD99", 1), line("PD02", 1)];

        let outcome = orders
            .save(&NewOrder {
                folio: "P006",
                customer_id: "C01",
                order_date: june_first(),
                lines: &lines,
            })
            .await;

        match outcome {
            SaveOutcome::LineRejected {
                position,
                product_id,
                ..
            } => {
                assert_eq!(position, 1);
                assert_eq!(product_id, "PD99");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(count_rows(&access, "Cte_Pedido", "P006").await, 0);
        assert_eq!(count_rows(&access, "Detalle_Pedido", "P006").await, 0);
    }

    #[tokio::test]
    async fn zero_quantity_line_is_rejected_by_the_store() {
        let access = setup_access().await;
        let lines = [line("PD01", 0)];
        let outcome = access
            .orders()
            .save(&NewOrder {
                folio: "P006",
                customer_id: "C01",
                order_date: june_first(),
                lines: &lines,
            })
            .await;
        assert_eq!(outcome.kind_str(), "line_rejected");
        assert_eq!(count_rows(&access, "Cte_Pedido", "P006").await, 0);
    }

    #[tokio::test]
    async fn unknown_customer_rejects_header() {
        let access = setup_access().await;
        let lines = [line("PD01", 1)];
        let outcome = access
            .orders()
            .save(&NewOrder {
                folio: "P006",
                customer_id: "C99",
                order_date: june_first(),
                lines: &lines,
            })
            .await;
        assert!(matches!(outcome, SaveOutcome::HeaderRejected { .. }));
        assert_eq!(count_rows(&access, "Cte_Pedido", "P006").await, 0);
    }

    #[tokio::test]
    async fn duplicate_folio_rejects_header() {
        let access = setup_access().await;
        let lines = [line("PD05", 1)];
        let outcome = access
            .orders()
            .save(&NewOrder {
                folio: "P001",
                customer_id: "C01",
                order_date: june_first(),
                lines: &lines,
            })
            .await;
        assert_eq!(outcome.kind_str(), "header_rejected");
        assert_eq!(access.orders().lines("P001").await.len(), 2);
    }

    #[tokio::test]
    async fn empty_orders_are_not_written() {
        let access = setup_access().await;
        let outcome = access
            .orders()
            .save(&NewOrder {
                folio: "P006",
                customer_id: "C01",
                order_date: june_first(),
                lines: &[],
            })
            .await;
        assert_eq!(outcome, SaveOutcome::NoLines);
        assert_eq!(count_rows(&access, "Cte_Pedido", "P006").await, 0);
    }

    #[tokio::test]
    async fn disconnected_store_cannot_save() {
        let access = DataAccess::disconnected();
        let lines = [line("PD01", 1)];
        let outcome = access
            .orders()
            .save(&NewOrder {
                folio: "F001",
                customer_id: "C01",
                order_date: june_first(),
                lines: &lines,
            })
            .await;
        assert_eq!(outcome, SaveOutcome::Unavailable);
        assert!(!outcome.is_saved());
    }

    #[tokio::test]
    async fn list_for_customer_is_newest_first() {
        let access = setup_access().await;
        let history = access.orders().list_for_customer("C14").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].order_id, "P001");

        let lines = [line("PD04", 1)];
        let later = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        assert!(access
            .orders()
            .save(&NewOrder {
                folio: "P006",
                customer_id: "C14",
                order_date: later,
                lines: &lines,
            })
            .await
            .is_saved());

        let history = access.orders().list_for_customer("C14").await;
        let ids: Vec<&str> = history.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["P006", "P001"]);
    }

    #[tokio::test]
    async fn order_lines_are_sorted_by_description_with_totals() {
        let access = setup_access().await;
        let lines = access.orders().lines("P001").await;
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0].product_code, "PD01");
        assert_eq!(lines[0].quantity, 1);
        assert_eq!(lines[1].product_code, "PD02");
        assert_eq!(lines[1].quantity, 2);

        for detail in &lines {
            let expected = f64::from(detail.quantity) * detail.unit_price;
            assert!((detail.subtotal - expected).abs() < 1e-9);
            assert!((detail.total - detail.subtotal * 1.16).abs() < 0.01);
        }
    }

    #[tokio::test]
    async fn unknown_order_has_no_lines() {
        let access = setup_access().await;
        assert!(access.orders().lines("P999").await.is_empty());
    }
}
