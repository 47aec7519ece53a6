use tracing::info;

use crate::{Database, StorageError};

const STATES: &[(&str, &str)] = &[
    ("E01", "CDMX"),
    ("E02", "Jalisco"),
    ("E03", "Nuevo León"),
    ("E04", "Colima"),
    ("E05", "Sinaloa"),
];

const CUSTOMERS: &[(&str, &str, &str, &str, &str, &str, &str)] = &[
    ("C01", "Juan Pérez", "Calle 1", "CDMX", "E01", "01000", "JUAP850101ABC"),
    ("C02", "Ana Gómez", "Av. Siempre Viva", "Guadalajara", "E02", "44100", "ANGG920202XYZ"),
    ("C03", "Carlos Ruiz", "Insurgentes Sur 123", "Monterrey", "E03", "64000", "CARU900315DEF"),
    ("C04", "María Fernández", "Lopez Mateos 456", "Colima", "E04", "28000", "MAFE880720GHI"),
    ("C05", "Luis Torres", "Aquiles Serdán 789", "Culiacán", "E05", "80000", "LUIT951105JKL"),
    ("C06", "Sofía Ramírez", "Benito Juárez 101", "CDMX", "E01", "06000", "SORA910418MNO"),
    ("C07", "Ricardo Morales", "Revolución 202", "Guadalajara", "E02", "44200", "RIMO870925PQR"),
    ("C08", "Elena Castro", "Constitución 303", "Monterrey", "E03", "64100", "ELCA931201STU"),
    ("C09", "Francisco Jiménez", "Hidalgo 404", "Colima", "E04", "28100", "FAJI860608VWX"),
    ("C10", "Gabriela Vargas", "Zaragoza 505", "Culiacán", "E05", "80100", "GAVA940112YZA"),
    ("C11", "Pedro Herrera", "Madero 606", "CDMX", "E01", "07000", "PEHE890830BCD"),
    ("C12", "Laura Mendoza", "Carranza 707", "Guadalajara", "E02", "44300", "LAME960203EFG"),
    ("C13", "Diego Ortiz", "Morelos 808", "Monterrey", "E03", "64200", "DIOR900517HIJ"),
    ("C14", "Andrea Navarro", "Allende 909", "Colima", "E04", "28200", "ANNA921024KLM"),
    ("C15", "Sergio Soto", "Juárez 1010", "Culiacán", "E05", "80200", "SESO850307NOP"),
];

const PRODUCTS: &[(&str, &str, f64)] = &[
    ("PD01", "Laptop HP 15\"", 12000.00),
    ("PD02", "Mouse Inalámbrico", 350.00),
    ("PD03", "Teclado Mecánico", 1500.00),
    ("PD04", "Monitor 24\"", 3000.00),
    ("PD05", "Impresora Laser", 4500.00),
    ("PD06", "Disco Duro SSD 1TB", 2000.00),
    ("PD07", "Memoria RAM 16GB", 1800.00),
    ("PD08", "Webcam HD", 700.00),
    ("PD09", "Router WiFi", 900.00),
    ("PD10", "Tarjeta Gráfica", 8000.00),
];

const ORDER_HEADERS: &[(&str, &str, &str)] = &[
    ("P001", "C14", "2024-05-01"),
    ("P002", "C02", "2024-05-02"),
    ("P003", "C05", "2024-05-03"),
    ("P004", "C01", "2024-05-04"),
    ("P005", "C10", "2024-05-05"),
];

const ORDER_LINES: &[(&str, &str, i64)] = &[
    ("P001", "PD01", 1),
    ("P001", "PD02", 2),
    ("P002", "PD03", 1),
    ("P002", "PD04", 1),
    ("P003", "PD05", 1),
    ("P004", "PD01", 1),
    ("P004", "PD03", 1),
    ("P004", "PD06", 1),
    ("P005", "PD07", 2),
    ("P005", "PD08", 1),
    ("P005", "PD09", 1),
];

/// Rows inserted per table by [`Database::seed_demo_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub states: u64,
    pub customers: u64,
    pub products: u64,
    pub order_headers: u64,
    pub order_lines: u64,
}

impl SeedSummary {
    pub fn total(&self) -> u64 {
        self.states + self.customers + self.products + self.order_headers + self.order_lines
    }
}

impl Database {
    /// Inserts the demonstration rows, skipping any primary key already present.
    pub async fn seed_demo_data(&self) -> Result<SeedSummary, StorageError> {
        let mut tx = self.pool().begin().await?;
        let mut summary = SeedSummary::default();

        for &(id, name) in STATES {
            summary.states += sqlx::query(
                "INSERT OR IGNORE INTO Estados (Id_Estado, Estado_Cte) VALUES (?, ?)",
            )
            .bind(id)
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        for &(id, name, address, city, state, postal_code, tax_id) in CUSTOMERS {
            summary.customers += sqlx::query(
                "INSERT OR IGNORE INTO Clientes \
                 (Id_Cte, Nombre_Cte, Direccion_Cte, Ciudad_Cte, Id_Estado, CP_Cte, RFC_Cte) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(name)
            .bind(address)
            .bind(city)
            .bind(state)
            .bind(postal_code)
            .bind(tax_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        for &(id, description, unit_price) in PRODUCTS {
            summary.products += sqlx::query(
                "INSERT OR IGNORE INTO Productos (Id_Producto, Desc_Producto, Precio_Unitario) \
                 VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(description)
            .bind(unit_price)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        for &(id, customer_id, order_date) in ORDER_HEADERS {
            summary.order_headers += sqlx::query(
                "INSERT OR IGNORE INTO Cte_Pedido (Id_Pedido, Id_Cte, Fecha_Pedido) \
                 VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(customer_id)
            .bind(order_date)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        for &(order_id, product_id, quantity) in ORDER_LINES {
            summary.order_lines += sqlx::query(
                "INSERT OR IGNORE INTO Detalle_Pedido (Id_Pedido, Id_Producto, Cantidad) \
                 VALUES (?, ?, ?)",
            )
            .bind(order_id)
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        info!(
            stage = "storage",
            inserted = summary.total(),
            states = summary.states,
            customers = summary.customers,
            products = summary.products,
            order_headers = summary.order_headers,
            order_lines = summary.order_lines,
            "demo data verified"
        );
        Ok(summary)
    }
}
