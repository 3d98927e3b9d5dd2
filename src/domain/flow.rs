//! Checkout state machine.
//!
//! A [`CheckoutFlow`] carries one customer's partial transfer across the
//! checkout steps. It never touches storage; the payment step hands a
//! [`TransactionDraft`] to the dispatcher and feeds the result back in.

use serde::Serialize;
use thiserror::Error;

use crate::domain::destination::find_destination;
use crate::domain::quote::{quote, Quote, QuoteError};
use crate::domain::transaction::{
    OrderNumber, PaymentMethod, RecipientDetails, Transaction, TransactionDetails,
};
use crate::domain::user::User;
use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Step {
    #[default]
    Home,
    Warning,
    RecipientForm,
    Checkout,
    Receipt,
    History,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("the disclosure terms must be accepted")]
    TermsNotAccepted,
    #[error("unknown destination '{0}'")]
    UnknownDestination(String),
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a payment is already in progress")]
    PaymentInProgress,
    #[error("cannot {action} while at {from:?}")]
    InvalidTransition { from: Step, action: &'static str },
    #[error("payment result for order {0} no longer matches the checkout")]
    StalePayment(OrderNumber),
}

/// What the payment step needs: both halves of the order plus the order
/// number reserved for this submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionDraft {
    pub details: Option<TransactionDetails>,
    pub recipient: Option<RecipientDetails>,
    pub order_number: Option<OrderNumber>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutFlow {
    step: Step,
    quote: Option<Quote>,
    details: Option<TransactionDetails>,
    recipient: Option<RecipientDetails>,
    order_number: Option<OrderNumber>,
    payment_method: Option<PaymentMethod>,
    redirect_url: Option<String>,
    receipt: Option<Transaction>,
    #[serde(skip)]
    payment_in_flight: bool,
}

impl CheckoutFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn details(&self) -> Option<&TransactionDetails> {
        self.details.as_ref()
    }

    pub fn recipient(&self) -> Option<&RecipientDetails> {
        self.recipient.as_ref()
    }

    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    pub fn receipt(&self) -> Option<&Transaction> {
        self.receipt.as_ref()
    }

    fn expect_step(&self, allowed: &[Step], action: &'static str) -> Result<(), FlowError> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition {
                from: self.step,
                action,
            })
        }
    }

    /// Home → Warning. Without a session nothing changes and the caller must
    /// prompt for authentication.
    pub fn submit_quote(
        &mut self,
        session: Option<&User>,
        destination: &str,
        send_amount: u32,
    ) -> Result<&Quote, FlowError> {
        if session.is_none() {
            return Err(FlowError::AuthenticationRequired);
        }
        self.expect_step(&[Step::Home, Step::History], "submit a quote")?;

        let destination = find_destination(destination)
            .ok_or_else(|| FlowError::UnknownDestination(destination.trim().to_string()))?;
        let quote = quote(send_amount)?;

        *self = Self {
            step: Step::Warning,
            details: Some(TransactionDetails::from_quote(destination.name, &quote)),
            ..Self::default()
        };
        Ok(self.quote.insert(quote))
    }

    /// Warning → RecipientForm.
    pub fn accept_terms(&mut self, accepted: bool) -> Result<(), FlowError> {
        self.expect_step(&[Step::Warning], "accept the terms")?;
        if !accepted {
            return Err(FlowError::TermsNotAccepted);
        }
        self.step = Step::RecipientForm;
        Ok(())
    }

    /// RecipientForm → Checkout.
    pub fn submit_recipient(&mut self, recipient: RecipientDetails) -> Result<(), FlowError> {
        self.expect_step(&[Step::RecipientForm], "submit recipient details")?;
        recipient.validate()?;
        self.recipient = Some(recipient);
        self.step = Step::Checkout;
        Ok(())
    }

    /// Starts a payment attempt at Checkout. The order number is reserved
    /// here, once per submission, so retries reuse it. The returned order
    /// number identifies the attempt when its result comes back.
    pub fn begin_payment(
        &mut self,
        method: PaymentMethod,
    ) -> Result<(OrderNumber, TransactionDraft), FlowError> {
        self.expect_step(&[Step::Checkout], "start a payment")?;
        if self.payment_in_flight {
            return Err(FlowError::PaymentInProgress);
        }

        let order_number = self
            .order_number
            .get_or_insert_with(OrderNumber::generate)
            .clone();
        self.payment_in_flight = true;
        self.payment_method = Some(method);

        let draft = TransactionDraft {
            details: self.details.clone(),
            recipient: self.recipient.clone(),
            order_number: Some(order_number.clone()),
        };
        Ok((order_number, draft))
    }

    pub fn payment_in_flight(&self) -> bool {
        self.payment_in_flight
    }

    /// True while `attempt` is the payment this flow is waiting on. A result
    /// for any other attempt belongs to a submission that was cancelled or
    /// replaced.
    pub fn awaits(&self, attempt: &OrderNumber) -> bool {
        self.payment_in_flight && self.order_number.as_ref() == Some(attempt)
    }

    fn settle(&mut self, attempt: &OrderNumber) -> Result<(), FlowError> {
        if !self.awaits(attempt) {
            return Err(FlowError::StalePayment(attempt.clone()));
        }
        self.payment_in_flight = false;
        Ok(())
    }

    /// The attempt failed. When the dispatcher already persisted an order,
    /// remember it so the next attempt does not create another one.
    pub fn payment_failed(
        &mut self,
        attempt: &OrderNumber,
        persisted_order: Option<OrderNumber>,
    ) -> Result<(), FlowError> {
        self.settle(attempt)?;
        if let Some(order) = persisted_order {
            self.order_number = Some(order);
        }
        Ok(())
    }

    /// Redirect methods stay at Checkout until the provider calls back.
    pub fn payment_redirected(
        &mut self,
        attempt: &OrderNumber,
        transaction: &Transaction,
        invoice_url: impl Into<String>,
    ) -> Result<(), FlowError> {
        self.settle(attempt)?;
        self.order_number = Some(transaction.order_number.clone());
        self.redirect_url = Some(invoice_url.into());
        Ok(())
    }

    /// Checkout → Receipt.
    pub fn payment_succeeded(
        &mut self,
        attempt: &OrderNumber,
        transaction: Transaction,
    ) -> Result<(), FlowError> {
        self.settle(attempt)?;
        *self = Self {
            step: Step::Receipt,
            payment_method: transaction.payment_method,
            receipt: Some(transaction),
            ..Self::default()
        };
        Ok(())
    }

    /// Nothing worth keeping: no partial transfer, receipt or pending payment.
    pub fn is_blank(&self) -> bool {
        self.step == Step::Home && !self.payment_in_flight
    }

    /// Any step → Home, discarding the partial transaction.
    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    /// Any step → History. Leaving the checkout discards the partial
    /// transaction, as going back home does.
    pub fn show_history(&mut self) {
        *self = Self {
            step: Step::History,
            ..Self::default()
        };
    }
}
