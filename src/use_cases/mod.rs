pub mod initiate_payment;
pub mod update_status;

pub use initiate_payment::{InitiatePayment, PaymentError, PaymentOutcome, PaymentResult};
pub use update_status::{StatusUpdate, StatusUpdateError, UpdateStatus};
