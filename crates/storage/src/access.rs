use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteRow},
    Column, Row, Sqlite, TypeInfo, ValueRef,
};
use tracing::{debug, error, warn};

use crate::{CustomerRepository, Database, OrderRepository, ProductRepository};

/// Text format of every date persisted by the service.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parameter bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Param {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<NaiveDate> for Param {
    fn from(value: NaiveDate) -> Self {
        Self::Text(value.format(DATE_FORMAT).to_string())
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Normalized column value returned by [`DataAccess::query`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }
}

/// One result row: column names mapped to values, in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_f64)
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).and_then(Value::as_date)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

/// Per-column coercions applied to every row read through [`DataAccess`].
#[derive(Debug, Clone)]
pub struct Normalization {
    date_columns: Vec<String>,
    zero_when_null: Vec<String>,
}

impl Default for Normalization {
    fn default() -> Self {
        Self::new(["Fecha_Pedido"], ["Cantidad", "Precio_Unitario"])
    }
}

impl Normalization {
    pub fn new<D, Z>(date_columns: D, zero_when_null: Z) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        Z: IntoIterator,
        Z::Item: Into<String>,
    {
        Self {
            date_columns: date_columns.into_iter().map(Into::into).collect(),
            zero_when_null: zero_when_null.into_iter().map(Into::into).collect(),
        }
    }

    fn is_date_column(&self, column: &str) -> bool {
        self.date_columns.iter().any(|name| name == column)
    }

    fn zeroes_null(&self, column: &str) -> bool {
        self.zero_when_null.iter().any(|name| name == column)
    }

    /// Converts a SQLite row into a [`Record`].
    ///
    /// Integers and reals both become [`Value::Number`]. Text in a date
    /// column that does not parse as `YYYY-MM-DD` stays [`Value::Text`].
    pub fn normalize(&self, row: &SqliteRow) -> Result<Record, sqlx::Error> {
        let mut columns = Vec::with_capacity(row.len());
        for column in row.columns() {
            let name = column.name();
            let index = column.ordinal();
            let (is_null, type_name) = {
                let raw = row.try_get_raw(index)?;
                (raw.is_null(), raw.type_info().name().to_owned())
            };

            let value = if is_null {
                if self.zeroes_null(name) {
                    Value::Number(0.0)
                } else {
                    Value::Null
                }
            } else {
                match type_name.as_str() {
                    "INTEGER" | "BOOLEAN" => {
                        Value::Number(row.try_get_unchecked::<i64, _>(index)? as f64)
                    }
                    "REAL" | "NUMERIC" => Value::Number(row.try_get_unchecked::<f64, _>(index)?),
                    "BLOB" => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
                    _ => {
                        let text = row.try_get_unchecked::<String, _>(index)?;
                        if self.is_date_column(name) {
                            parse_date(text)
                        } else {
                            Value::Text(text)
                        }
                    }
                }
            };

            columns.push((name.to_string(), value));
        }

        Ok(Record { columns })
    }
}

fn parse_date(text: String) -> Value {
    match NaiveDate::parse_from_str(&text, DATE_FORMAT) {
        Ok(date) => Value::Date(date),
        Err(_) => Value::Text(text),
    }
}

/// Fault-tolerant gateway to the store.
///
/// Reads return an empty result and writes report `false` instead of
/// surfacing store errors; a handle built without a connection behaves the
/// same way for every call.
#[derive(Clone)]
pub struct DataAccess {
    database: Option<Database>,
    normalization: Arc<Normalization>,
}

impl DataAccess {
    pub fn new(database: Database) -> Self {
        Self {
            database: Some(database),
            normalization: Arc::new(Normalization::default()),
        }
    }

    /// Handle with no underlying connection.
    pub fn disconnected() -> Self {
        Self {
            database: None,
            normalization: Arc::new(Normalization::default()),
        }
    }

    /// Connects to `database_url`, logging and degrading to a disconnected
    /// handle when the store cannot be opened.
    pub async fn open(database_url: &str) -> Self {
        match Database::connect(database_url).await {
            Ok(database) => Self::new(database),
            Err(err) => {
                error!(stage = "storage", error = %err, "failed to open store");
                Self::disconnected()
            }
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = Arc::new(normalization);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.database.is_some()
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    /// Runs a parameterized read and returns normalized rows in query order.
    pub async fn query(&self, sql: &str, params: &[Param]) -> Vec<Record> {
        let Some(database) = &self.database else {
            warn!(stage = "storage", "query skipped: store is not connected");
            return Vec::new();
        };

        match self.try_query(database, sql, params).await {
            Ok(records) => records,
            Err(err) => {
                error!(stage = "storage", error = %err, sql, "query failed");
                Vec::new()
            }
        }
    }

    /// Runs a parameterized write in its own transaction.
    ///
    /// Returns `false` after rolling back when the store rejects the
    /// statement.
    pub async fn execute(&self, sql: &str, params: &[Param]) -> bool {
        let Some(database) = &self.database else {
            warn!(stage = "storage", "write skipped: store is not connected");
            return false;
        };

        match try_execute(database, sql, params).await {
            Ok(rows_affected) => {
                debug!(stage = "storage", rows_affected, sql, "write committed");
                true
            }
            Err(err) => {
                error!(stage = "storage", error = %err, sql, "write rolled back");
                false
            }
        }
    }

    async fn try_query(
        &self,
        database: &Database,
        sql: &str,
        params: &[Param],
    ) -> Result<Vec<Record>, sqlx::Error> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(database.pool())
            .await?;
        rows.iter()
            .map(|row| self.normalization.normalize(row))
            .collect()
    }

    /// Returns a handle for customer lookups.
    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.clone())
    }

    /// Returns a handle for the product catalogue.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.clone())
    }

    /// Returns a handle for order headers and lines.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.clone())
    }
}

async fn try_execute(
    database: &Database,
    sql: &str,
    params: &[Param],
) -> Result<u64, sqlx::Error> {
    let mut tx = database.pool().begin().await?;
    match bind_params(sqlx::query(sql), params)
        .execute(&mut *tx)
        .await
    {
        Ok(done) => {
            tx.commit().await?;
            Ok(done.rows_affected())
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(stage = "storage", error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

pub(crate) fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[Param],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Param::Text(value) => query.bind(value.clone()),
            Param::Integer(value) => query.bind(*value),
            Param::Real(value) => query.bind(*value),
            Param::Null => query.bind(None::<String>),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_access() -> DataAccess {
        let database = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        database.ensure_schema().await.expect("schema");
        database.seed_demo_data().await.expect("seed");
        DataAccess::new(database)
    }

    #[tokio::test]
    async fn numbers_are_read_as_floats() {
        let access = setup_access().await;
        let rows = access
            .query(
                "SELECT Cantidad, Precio_Unitario FROM Detalle_Pedido d \
                 JOIN Productos p ON p.Id_Producto = d.Id_Producto \
                 WHERE d.Id_Pedido = ? AND d.Id_Producto = ?",
                &["P001".into(), "PD02".into()],
            )
            .await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Cantidad"), Some(&Value::Number(2.0)));
        assert_eq!(rows[0].number("Precio_Unitario"), Some(350.0));
    }

    #[tokio::test]
    async fn date_column_is_parsed_or_kept_raw() {
        let access = setup_access().await;
        assert!(
            access
                .execute(
                    "INSERT INTO Cte_Pedido (Id_Pedido, Id_Cte, Fecha_Pedido) VALUES (?, ?, ?)",
                    &["X001".into(), "C01".into(), "not-a-date".into()],
                )
                .await
        );

        let rows = access
            .query(
                "SELECT Id_Pedido, Fecha_Pedido FROM Cte_Pedido WHERE Id_Pedido IN ('P001', 'X001') ORDER BY Id_Pedido",
                &[],
            )
            .await;
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].date("Fecha_Pedido"),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
        assert_eq!(rows[1].text("Fecha_Pedido"), Some("not-a-date"));
    }

    #[tokio::test]
    async fn nulls_in_quantity_and_price_become_zero() {
        let access = setup_access().await;
        let rows = access
            .query(
                "SELECT NULL AS Cantidad, NULL AS Precio_Unitario, NULL AS Direccion_Cte",
                &[],
            )
            .await;
        assert_eq!(rows[0].number("Cantidad"), Some(0.0));
        assert_eq!(rows[0].number("Precio_Unitario"), Some(0.0));
        assert_eq!(rows[0].get("Direccion_Cte"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn records_keep_select_order() {
        let access = setup_access().await;
        let rows = access
            .query("SELECT Id_Cte, Nombre_Cte, RFC_Cte FROM Clientes WHERE Id_Cte = ?", &["C01".into()])
            .await;
        let columns: Vec<&str> = rows[0].iter().map(|(name, _)| name).collect();
        assert_eq!(columns, vec!["Id_Cte", "Nombre_Cte", "RFC_Cte"]);
    }

    #[tokio::test]
    async fn custom_normalization_replaces_defaults() {
        let access = setup_access()
            .await
            .with_normalization(Normalization::new(["Creado"], Vec::<String>::new()));
        let rows = access
            .query(
                "SELECT '2024-02-29' AS Creado, '2024-05-01' AS Fecha_Pedido, NULL AS Cantidad",
                &[],
            )
            .await;
        assert_eq!(rows[0].date("Creado"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(rows[0].text("Fecha_Pedido"), Some("2024-05-01"));
        assert_eq!(rows[0].get("Cantidad"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn failed_read_returns_empty() {
        let access = setup_access().await;
        let rows = access.query("SELECT * FROM missing_table", &[]).await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn failed_write_reports_false_and_rolls_back() {
        let access = setup_access().await;
        let ok = access
            .execute(
                "INSERT INTO Cte_Pedido (Id_Pedido, Id_Cte, Fecha_Pedido) VALUES (?, ?, ?)",
                &["X002".into(), "C99".into(), "2024-06-01".into()],
            )
            .await;
        assert!(!ok, "foreign key violation must be reported");

        let rows = access
            .query("SELECT Id_Pedido FROM Cte_Pedido WHERE Id_Pedido = 'X002'", &[])
            .await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn disconnected_handle_is_inert() {
        let access = DataAccess::disconnected();
        assert!(!access.is_connected());
        assert!(access.query("SELECT 1", &[]).await.is_empty());
        assert!(!access.execute("DELETE FROM Clientes", &[]).await);
    }

    #[tokio::test]
    async fn open_degrades_when_store_is_unreachable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!(
            "sqlite://{}?mode=ro",
            dir.path().join("missing").join("absent.db").display()
        );
        let access = DataAccess::open(&url).await;
        assert!(!access.is_connected());
    }

    #[test]
    fn params_convert_from_common_types() {
        assert_eq!(Param::from("F001"), Param::Text("F001".to_string()));
        assert_eq!(Param::from(3u32), Param::Integer(3));
        assert_eq!(
            Param::from(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            Param::Text("2024-05-01".to_string())
        );
        assert_eq!(Param::from(None::<String>), Param::Null);
    }
}
