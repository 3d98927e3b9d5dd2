//! NowPayments integration: invoice creation and IPN signature checks.

pub mod client;
pub mod ipn;

pub use client::InvoiceClient;
