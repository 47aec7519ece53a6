use folio_core::types::{Customer, Product};

use crate::access::{DataAccess, Record};

const CUSTOMER_COLUMNS: &str = "c.Id_Cte, c.Nombre_Cte, c.Direccion_Cte, c.Ciudad_Cte, \
     c.Id_Estado, e.Estado_Cte, c.CP_Cte, c.RFC_Cte";

/// Repository for customer lookups.
#[derive(Clone)]
pub struct CustomerRepository {
    access: DataAccess,
}

impl CustomerRepository {
    pub(crate) fn new(access: DataAccess) -> Self {
        Self { access }
    }

    /// Loads one customer with the display name of its state.
    pub async fn get(&self, customer_id: &str) -> Option<Customer> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} \
               FROM Clientes c \
               JOIN Estados e ON c.Id_Estado = e.Id_Estado \
              WHERE c.Id_Cte = ?"
        );
        self.access
            .query(&sql, &[customer_id.into()])
            .await
            .first()
            .map(customer_from_record)
    }

    /// Lists every customer ordered by name.
    pub async fn list(&self) -> Vec<Customer> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} \
               FROM Clientes c \
               JOIN Estados e ON c.Id_Estado = e.Id_Estado \
              ORDER BY c.Nombre_Cte"
        );
        self.access
            .query(&sql, &[])
            .await
            .iter()
            .map(customer_from_record)
            .collect()
    }
}

/// Repository for the product catalogue.
#[derive(Clone)]
pub struct ProductRepository {
    access: DataAccess,
}

impl ProductRepository {
    pub(crate) fn new(access: DataAccess) -> Self {
        Self { access }
    }

    pub async fn get(&self, product_id: &str) -> Option<Product> {
        self.access
            .query(
                "SELECT Id_Producto, Desc_Producto, Precio_Unitario FROM Productos WHERE Id_Producto = ?",
                &[product_id.into()],
            )
            .await
            .first()
            .map(product_from_record)
    }

    /// Lists products ordered by description.
    pub async fn list(&self) -> Vec<Product> {
        self.access
            .query(
                "SELECT Id_Producto, Desc_Producto, Precio_Unitario FROM Productos ORDER BY Desc_Producto",
                &[],
            )
            .await
            .iter()
            .map(product_from_record)
            .collect()
    }
}

fn customer_from_record(record: &Record) -> Customer {
    Customer {
        id: owned_text(record, "Id_Cte"),
        name: owned_text(record, "Nombre_Cte"),
        address: optional_text(record, "Direccion_Cte"),
        city: optional_text(record, "Ciudad_Cte"),
        state_id: owned_text(record, "Id_Estado"),
        state_name: optional_text(record, "Estado_Cte"),
        postal_code: owned_text(record, "CP_Cte"),
        tax_id: owned_text(record, "RFC_Cte"),
    }
}

fn product_from_record(record: &Record) -> Product {
    Product {
        id: owned_text(record, "Id_Producto"),
        description: owned_text(record, "Desc_Producto"),
        unit_price: record.number("Precio_Unitario").unwrap_or_default(),
    }
}

/// Trimmed text of a column, empty when the column is missing or not text.
pub(crate) fn owned_text(record: &Record, column: &str) -> String {
    record.text(column).map(str::trim).unwrap_or_default().to_string()
}

pub(crate) fn optional_text(record: &Record, column: &str) -> Option<String> {
    record.text(column).map(str::to_string)
}
