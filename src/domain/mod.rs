pub mod destination;
pub mod flow;
pub mod quote;
pub mod transaction;
pub mod user;

pub use flow::{CheckoutFlow, FlowError, Step, TransactionDraft};
pub use quote::{quote, Quote, QuoteError};
pub use transaction::{
    OrderNumber, PaymentMethod, RecipientDetails, Transaction, TransactionDetails,
    TransactionStatus,
};
pub use user::User;
