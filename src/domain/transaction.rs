//! Transaction domain entity.
//! Framework-agnostic representation of a money transfer order.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::quote::Quote;
use crate::domain::user::User;
use crate::validation::{
    sanitize_string, validate_email, validate_enum, validate_max_len, validate_required,
    ValidationError, ValidationResult, FULL_NAME_MAX_LEN, ID_NUMBER_MAX_LEN, PHONE_MAX_LEN,
};

const ORDER_NUMBER_PREFIX: &str = "RM-";
const ORDER_NUMBER_LEN: usize = 10;

/// External-facing order reference, distinct from the storage id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate() -> Self {
        let random = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("{}{}", ORDER_NUMBER_PREFIX, &random[..ORDER_NUMBER_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderNumber {
    fn from(value: String) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<&str> for OrderNumber {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[serde(alias = "Pendiente")]
    Pending,
    #[serde(alias = "En Proceso")]
    InProgress,
    #[serde(alias = "Entregado")]
    Delivered,
    #[serde(alias = "Completado")]
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::InProgress => "InProgress",
            TransactionStatus::Delivered => "Delivered",
            TransactionStatus::Completed => "Completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Delivered | TransactionStatus::Completed
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" | "Pendiente" => Ok(TransactionStatus::Pending),
            "InProgress" | "En Proceso" => Ok(TransactionStatus::InProgress),
            "Delivered" | "Entregado" => Ok(TransactionStatus::Delivered),
            "Completed" | "Completado" => Ok(TransactionStatus::Completed),
            other => Err(ValidationError::new(
                "status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    PayPal,
    Crypto,
}

impl PaymentMethod {
    pub const NAMES: &'static [&'static str] = &["Card", "PayPal", "Crypto"];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::Crypto => "Crypto",
        }
    }

    /// Redirect methods hand the customer to an externally hosted invoice and
    /// learn the outcome later through a callback.
    pub fn is_redirect(&self) -> bool {
        matches!(self, PaymentMethod::Crypto)
    }

    /// Status a freshly persisted order starts in for this method.
    pub fn initial_status(&self) -> TransactionStatus {
        if self.is_redirect() {
            TransactionStatus::Pending
        } else {
            TransactionStatus::InProgress
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        validate_enum("paymentMethod", s, Self::NAMES)?;
        Ok(match s {
            "Card" => PaymentMethod::Card,
            "PayPal" => PaymentMethod::PayPal,
            _ => PaymentMethod::Crypto,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub destination: String,
    pub total: BigDecimal,
    pub receive_amount: BigDecimal,
}

impl TransactionDetails {
    pub fn from_quote(destination: impl Into<String>, quote: &Quote) -> Self {
        Self {
            destination: destination.into(),
            total: quote.total_to_pay.clone(),
            receive_amount: quote.receiver_gets.clone(),
        }
    }

    pub fn commission(&self) -> BigDecimal {
        &self.total - &self.receive_amount
    }

    pub fn validate(&self) -> ValidationResult {
        validate_required("destination", &self.destination)?;
        if self.receive_amount <= BigDecimal::from(0) {
            return Err(ValidationError::new(
                "receiveAmount",
                "must be greater than zero",
            ));
        }
        if self.total < self.receive_amount {
            return Err(ValidationError::new(
                "total",
                "must not be lower than the amount received",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientDetails {
    pub full_name: String,
    pub id_number: String,
    pub email: String,
    pub whatsapp_phone: String,
}

impl RecipientDetails {
    /// Sanitizes every field and validates the result.
    pub fn new(
        full_name: &str,
        id_number: &str,
        email: &str,
        whatsapp_phone: &str,
    ) -> Result<Self, ValidationError> {
        let recipient = Self {
            full_name: sanitize_string(full_name),
            id_number: sanitize_string(id_number),
            email: sanitize_string(email),
            whatsapp_phone: sanitize_string(whatsapp_phone),
        };
        recipient.validate()?;
        Ok(recipient)
    }

    pub fn validate(&self) -> ValidationResult {
        validate_required("fullName", &self.full_name)?;
        validate_max_len("fullName", &self.full_name, FULL_NAME_MAX_LEN)?;
        validate_required("idNumber", &self.id_number)?;
        validate_max_len("idNumber", &self.id_number, ID_NUMBER_MAX_LEN)?;
        validate_email("email", &self.email)?;
        validate_required("whatsappPhone", &self.whatsapp_phone)?;
        validate_max_len("whatsappPhone", &self.whatsapp_phone, PHONE_MAX_LEN)?;
        Ok(())
    }
}

/// A persisted transfer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub order_number: OrderNumber,
    pub user_id: String,
    pub user_email: String,
    pub payment_method: Option<PaymentMethod>,
    pub details: TransactionDetails,
    pub recipient: RecipientDetails,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        owner: &User,
        order_number: OrderNumber,
        payment_method: PaymentMethod,
        details: TransactionDetails,
        recipient: RecipientDetails,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number,
            user_id: owner.id.clone(),
            user_email: owner.email.clone(),
            payment_method: Some(payment_method),
            details,
            recipient,
            status: payment_method.initial_status(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.user_id == user.id
    }
}
