//! Per-user checkout sessions.
//!
//! Each signed-in user owns one [`CheckoutFlow`]. The payment step runs the
//! dispatcher outside the lock; the flow's in-flight guard turns a second
//! concurrent submission into [`FlowError::PaymentInProgress`], and a result
//! is only applied while the flow still awaits that attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::{
    CheckoutFlow, FlowError, OrderNumber, PaymentMethod, RecipientDetails, User,
};
use crate::use_cases::{InitiatePayment, PaymentError, PaymentOutcome, PaymentResult};

/// Sessions untouched for this long are dropped, unless a payment is running.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
}

#[derive(Debug, Clone)]
pub struct PaymentReport {
    pub flow: CheckoutFlow,
    pub outcome: PaymentOutcome,
    pub sheet_log_error: Option<String>,
}

struct SessionEntry {
    flow: CheckoutFlow,
    touched_at: Instant,
}

struct Sessions {
    entries: HashMap<String, SessionEntry>,
    last_sweep: Instant,
}

impl Sessions {
    fn sweep(&mut self, idle_timeout: Duration) {
        if self.last_sweep.elapsed() < SWEEP_INTERVAL.min(idle_timeout) {
            return;
        }
        self.last_sweep = Instant::now();

        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.flow.payment_in_flight() || entry.touched_at.elapsed() < idle_timeout
        });
        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::debug!(dropped, "idle checkout sessions dropped");
        }
    }
}

pub struct CheckoutSessions {
    sessions: RwLock<Sessions>,
    payments: Arc<InitiatePayment>,
    idle_timeout: Duration,
}

impl CheckoutSessions {
    pub fn new(payments: Arc<InitiatePayment>) -> Self {
        Self {
            sessions: RwLock::new(Sessions {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            payments,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub async fn current(&self, user: &User) -> CheckoutFlow {
        self.sessions
            .read()
            .await
            .entries
            .get(&user.id)
            .map(|entry| entry.flow.clone())
            .unwrap_or_default()
    }

    /// Runs one step against the user's flow. Blank flows are not kept.
    async fn with_flow<T, F>(&self, user: &User, step: F) -> Result<(T, CheckoutFlow), FlowError>
    where
        F: FnOnce(&mut CheckoutFlow) -> Result<T, FlowError>,
    {
        let mut sessions = self.sessions.write().await;
        sessions.sweep(self.idle_timeout);

        let entry = sessions
            .entries
            .entry(user.id.clone())
            .or_insert_with(|| SessionEntry {
                flow: CheckoutFlow::new(),
                touched_at: Instant::now(),
            });
        let result = step(&mut entry.flow);
        entry.touched_at = Instant::now();
        let flow = entry.flow.clone();

        if flow.is_blank() {
            sessions.entries.remove(&user.id);
        }
        result.map(|value| (value, flow))
    }

    /// Without a session the request is refused before any flow is touched.
    pub async fn submit_quote(
        &self,
        user: Option<&User>,
        destination: &str,
        send_amount: u32,
    ) -> Result<CheckoutFlow, CheckoutError> {
        let Some(user) = user else {
            CheckoutFlow::new().submit_quote(None, destination, send_amount)?;
            return Err(FlowError::AuthenticationRequired.into());
        };

        let (_, flow) = self
            .with_flow(user, |flow| {
                flow.submit_quote(Some(user), destination, send_amount)
                    .map(|_| ())
            })
            .await?;
        Ok(flow)
    }

    pub async fn accept_terms(
        &self,
        user: &User,
        accepted: bool,
    ) -> Result<CheckoutFlow, CheckoutError> {
        let (_, flow) = self
            .with_flow(user, |flow| flow.accept_terms(accepted))
            .await?;
        Ok(flow)
    }

    pub async fn submit_recipient(
        &self,
        user: &User,
        recipient: RecipientDetails,
    ) -> Result<CheckoutFlow, CheckoutError> {
        let (_, flow) = self
            .with_flow(user, |flow| flow.submit_recipient(recipient))
            .await?;
        Ok(flow)
    }

    pub async fn pay(
        &self,
        user: &User,
        method: PaymentMethod,
    ) -> Result<PaymentReport, CheckoutError> {
        let ((attempt, draft), _) = self
            .with_flow(user, |flow| flow.begin_payment(method))
            .await?;

        let result = self.payments.execute(user, draft, method).await;

        {
            let mut sessions = self.sessions.write().await;
            if let Some(entry) = sessions
                .entries
                .get_mut(&user.id)
                .filter(|entry| entry.flow.awaits(&attempt))
            {
                entry.touched_at = Instant::now();
                return apply(&mut entry.flow, &attempt, result);
            }
        }

        // Cancelled or replaced while the dispatcher ran. The stored order
        // stands; the newer submission is left alone.
        tracing::warn!(
            user_id = %user.id,
            order_number = %attempt,
            "checkout moved on during payment, result not applied"
        );
        let payment = result?;
        Ok(PaymentReport {
            flow: self.current(user).await,
            outcome: payment.outcome,
            sheet_log_error: payment.sheet_log_error,
        })
    }

    pub async fn show_history(&self, user: &User) -> CheckoutFlow {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entries
            .entry(user.id.clone())
            .or_insert_with(|| SessionEntry {
                flow: CheckoutFlow::new(),
                touched_at: Instant::now(),
            });
        entry.flow.show_history();
        entry.touched_at = Instant::now();
        entry.flow.clone()
    }

    /// Back to Home; nothing is kept for the user afterwards.
    pub async fn cancel(&self, user: &User) -> CheckoutFlow {
        self.forget(&user.id).await;
        CheckoutFlow::new()
    }

    /// Drops the session of a user who signed out.
    pub async fn forget(&self, user_id: &str) {
        self.sessions.write().await.entries.remove(user_id);
    }
}

fn apply(
    flow: &mut CheckoutFlow,
    attempt: &OrderNumber,
    result: Result<PaymentResult, PaymentError>,
) -> Result<PaymentReport, CheckoutError> {
    match result {
        Ok(payment) => {
            match &payment.outcome {
                PaymentOutcome::Completed => {
                    flow.payment_succeeded(attempt, payment.transaction)?
                }
                PaymentOutcome::Redirect { invoice_url } => {
                    flow.payment_redirected(attempt, &payment.transaction, invoice_url.clone())?
                }
            }
            Ok(PaymentReport {
                flow: flow.clone(),
                outcome: payment.outcome,
                sheet_log_error: payment.sheet_log_error,
            })
        }
        Err(e) => {
            flow.payment_failed(attempt, e.persisted_order().cloned())?;
            Err(e.into())
        }
    }
}
