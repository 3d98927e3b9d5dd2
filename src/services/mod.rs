pub mod checkout;

pub use checkout::{CheckoutError, CheckoutSessions, PaymentReport};
