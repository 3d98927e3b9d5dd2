//! Typed message catalogue.
//!
//! Every user-facing string is addressed by a [`MessageKey`] and resolved per
//! [`Locale`]. Templates may carry `{name}` placeholders filled by [`format`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl Locale {
    /// Picks a locale from a language tag or an `Accept-Language` value.
    /// Anything that does not start with English falls back to Spanish.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if primary.starts_with("en") {
            Locale::En
        } else {
            Locale::Es
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    DeliveryFourHours,
    DeliveryTwentyFourHours,
    FieldRequired,
    AuthenticationRequired,
    TermsNotAccepted,
    InvoiceUnavailable,
    PaymentInProgress,
    UnknownDestination,
}

fn template(locale: Locale, key: MessageKey) -> &'static str {
    use MessageKey::*;
    match (locale, key) {
        (Locale::Es, DeliveryFourHours) => "Entrega en 4 horas",
        (Locale::En, DeliveryFourHours) => "Delivery within 4 hours",
        (Locale::Es, DeliveryTwentyFourHours) => "Entrega en 24 horas",
        (Locale::En, DeliveryTwentyFourHours) => "Delivery within 24 hours",
        (Locale::Es, FieldRequired) => "El campo {field} es obligatorio",
        (Locale::En, FieldRequired) => "The {field} field is required",
        (Locale::Es, AuthenticationRequired) => "Inicia sesión para continuar",
        (Locale::En, AuthenticationRequired) => "Please sign in to continue",
        (Locale::Es, TermsNotAccepted) => "Debes aceptar los términos para continuar",
        (Locale::En, TermsNotAccepted) => "You must accept the terms to continue",
        (Locale::Es, InvoiceUnavailable) => {
            "No se pudo crear la factura del pedido {order}. Inténtalo de nuevo"
        }
        (Locale::En, InvoiceUnavailable) => {
            "Could not create the invoice for order {order}. Please try again"
        }
        (Locale::Es, PaymentInProgress) => "Ya hay un pago en curso",
        (Locale::En, PaymentInProgress) => "A payment is already in progress",
        (Locale::Es, UnknownDestination) => "La provincia {destination} no está disponible",
        (Locale::En, UnknownDestination) => "Province {destination} is not available",
    }
}

/// Resolves `key` for `locale` and substitutes each `{name}` placeholder.
/// Placeholders without a matching argument are left untouched.
pub fn format(locale: Locale, key: MessageKey, args: &[(&str, &str)]) -> String {
    let mut message = template(locale, key).to_string();
    for (name, value) in args {
        message = message.replace(&format!("{{{}}}", name), value);
    }
    message
}

pub fn translate(locale: Locale, key: MessageKey) -> String {
    format(locale, key, &[])
}
