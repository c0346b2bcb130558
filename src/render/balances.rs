//! Balance sheet rendering.

use rust_decimal::prelude::*;

use crate::types::Balance;

/// Reply used when every balance is zero (or there are none).
pub const NO_BALANCES: &str = "No balances";

/// Render non-zero balances as `[<coin>] Total: <total>, Value: USD$<usd> `
/// lines under a `Balances:` header.
pub fn format_balances(balances: &[Balance]) -> String {
    let mut message = String::from("Balances: \n");
    let mut counter = 0usize;

    for balance in balances.iter().filter(|b| b.total != 0.0) {
        counter += 1;
        message.push_str(&format!(
            "[{}] Total: {}, Value: USD${} \n",
            balance.coin,
            balance.total,
            usd(balance.usd_value),
        ));
    }

    if counter == 0 {
        NO_BALANCES.to_string()
    } else {
        message
    }
}

/// Two decimals, half away from zero.
fn usd(value: f64) -> String {
    match Decimal::from_f64(value) {
        Some(d) => format!(
            "{:.2}",
            d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        ),
        None => format!("{value:.2}"),
    }
}
