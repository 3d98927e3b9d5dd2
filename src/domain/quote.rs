//! Transfer quote engine.
//!
//! A quote is a pure function of the send amount: the sender pays the amount
//! plus a fixed commission and the beneficiary receives the amount unchanged.
//! All arithmetic is exact decimal; rounding is left to presentation.

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use serde::Serialize;
use thiserror::Error;

use crate::utils::money::format_usd;

/// Send amounts offered to customers, in whole USD.
pub const ALLOWED_AMOUNTS: [u32; 5] = [100, 200, 300, 400, 500];

/// Commission rate in hundredths (20%).
const COMMISSION_RATE_HUNDREDTHS: i32 = 20;

pub fn commission_rate() -> BigDecimal {
    BigDecimal::new(BigInt::from(COMMISSION_RATE_HUNDREDTHS), 2)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("send amount {0} is not one of the offered amounts")]
    AmountNotAllowed(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub send_amount: BigDecimal,
    pub commission: BigDecimal,
    pub total_to_pay: BigDecimal,
    pub receiver_gets: BigDecimal,
}

/// Rounded, human-readable rendering of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDisplay {
    pub commission: String,
    pub total_to_pay: String,
    pub receiver_gets: String,
}

pub fn quote(send_amount: u32) -> Result<Quote, QuoteError> {
    if !ALLOWED_AMOUNTS.contains(&send_amount) {
        return Err(QuoteError::AmountNotAllowed(send_amount));
    }

    let amount = BigDecimal::from(send_amount);
    let commission = &amount * commission_rate();
    let total_to_pay = &amount + &commission;

    Ok(Quote {
        send_amount: amount.clone(),
        commission,
        total_to_pay,
        receiver_gets: amount,
    })
}

impl Quote {
    pub fn display(&self) -> QuoteDisplay {
        QuoteDisplay {
            commission: format_usd(&self.commission),
            total_to_pay: format_usd(&self.total_to_pay),
            receiver_gets: format_usd(&self.receiver_gets),
        }
    }
}
