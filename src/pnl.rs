//! Unrealized P&L against a live quote. Realized P&L is never recomputed
//! here; it is only ever the accumulation produced by the ledger fold.

use rust_decimal::Decimal;

use crate::pricefeed::PriceQuote;
use crate::types::position::Position;

/// Unrealized P&L for a position. A flat position is "not applicable" rather
/// than a numeric zero, and a missing quote is "unavailable" rather than a
/// silent coercion to zero; callers can tell the three cases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unrealized {
    Amount(Decimal),
    Flat,
    PriceUnavailable,
}

impl Unrealized {
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Unrealized::Amount(amount) => Some(*amount),
            _ => None,
        }
    }
}

/// Unrealized P&L at a known price: `(price - avg) * qty`. The signed
/// quantity makes the same expression correct for long and short.
pub fn unrealized_at(position: &Position, price: Decimal) -> Unrealized {
    if position.is_flat() {
        return Unrealized::Flat;
    }
    Unrealized::Amount((price - position.average_cost) * position.quantity)
}

/// Unrealized P&L given an optional quote from the price feed.
pub fn unrealized(position: &Position, quote: Option<&PriceQuote>) -> Unrealized {
    if position.is_flat() {
        return Unrealized::Flat;
    }
    match quote {
        Some(quote) => unrealized_at(position, quote.price),
        None => Unrealized::PriceUnavailable,
    }
}

/// Realized P&L an immediate full close at `price` would release. Equals the
/// unrealized amount for any non-flat position; zero when flat.
pub fn liquidation_pnl(position: &Position, price: Decimal) -> Decimal {
    if position.is_flat() {
        return Decimal::ZERO;
    }
    let direction = if position.is_long() {
        Decimal::ONE
    } else {
        -Decimal::ONE
    };
    position.quantity.abs() * (price - position.average_cost) * direction
}

/// Market value of the open quantity: `|qty| * price`.
pub fn market_value(position: &Position, price: Decimal) -> Decimal {
    position.quantity.abs() * price
}
