use bigdecimal::BigDecimal;

/// Number of decimal places used whenever an amount leaves the service.
pub const DISPLAY_SCALE: i64 = 2;

/// Rounds to cents. Only call this at presentation boundaries, never before
/// summing amounts.
pub fn round_cents(value: &BigDecimal) -> BigDecimal {
    value.round(DISPLAY_SCALE).with_scale(DISPLAY_SCALE)
}

pub fn format_usd(value: &BigDecimal) -> String {
    format!("${}", round_cents(value))
}
