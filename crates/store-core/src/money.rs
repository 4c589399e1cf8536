//! # Money Helpers
//!
//! All amounts in this engine are integer minor currency units (cents).
//! Rate application is done in widened integer arithmetic with explicit
//! round-half-up, never in floating point, so results are deterministic
//! and auditable.

/// Rates are expressed in thousandths of a percent, i.e. a rate of
/// `13_000` over [`RATE_SCALE`] is 13%. This keeps Quebec's 9.975% QST
/// (`9_975`) exactly representable.
pub const RATE_SCALE: i64 = 100_000;

/// Apply a rate to an amount of cents, rounding half-up.
///
/// `apply_rate(81_378, 13_000)` is `round(81378 * 0.13)` = 10 579.
/// Negative amounts are treated as zero; tax never refunds on its own.
pub fn apply_rate(amount_cents: i64, rate: u32) -> i64 {
    if amount_cents <= 0 {
        return 0;
    }
    let widened = amount_cents as i128 * rate as i128;
    ((widened + (RATE_SCALE as i128 / 2)) / RATE_SCALE as i128) as i64
}

/// Format cents for human-readable output (e.g. `"$813.78"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// Convert cents to a decimal amount for external systems that want
/// dollar values (the accounting API). Only used at that boundary; all
/// internal math stays in cents.
pub fn cents_to_decimal(cents: i64) -> f64 {
    cents as f64 / 100.0
}
