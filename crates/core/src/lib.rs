//! Domain layer for the invoicing service.
//!
//! Pure types and rules shared by the storage and HTTP crates: folio
//! sequencing, invoice totals and the staged-invoice session object.
pub mod folio;
pub mod session;
pub mod totals;
pub mod types;
