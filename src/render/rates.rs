//! Annualized lending-rate lines.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use tracing::warn;

use crate::types::RateResult;

/// Hours in a (non-leap) year.
const HOURS_PER_YEAR: Decimal = dec!(8760);

/// Annualize an hourly fractional rate into a percentage, rounded half away
/// from zero to two decimals. Returns `None` for non-finite input.
pub fn annualized_percent(estimate: f64) -> Option<Decimal> {
    let hourly = Decimal::from_f64(estimate)?;
    let pct = hourly.checked_mul(HOURS_PER_YEAR)?.checked_mul(dec!(100))?;
    Some(pct.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Render one `[<coin>] Estimate: <pct>% ` line per present result.
///
/// Absent entries are skipped silently; an empty input yields `""`.
pub fn format_rates(results: &[Option<RateResult>]) -> String {
    let mut message = String::new();
    for result in results.iter().flatten() {
        let Some(pct) = annualized_percent(result.estimate) else {
            warn!(coin = %result.coin, estimate = result.estimate, "Skipping unrepresentable rate");
            continue;
        };
        message.push_str(&format!("[{}] Estimate: {:.2}% \n", result.coin, pct));
    }
    message
}
