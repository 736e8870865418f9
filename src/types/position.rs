use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position per (portfolio, ticker). Quantity is signed: positive = long,
/// negative = short, zero = flat. The average cost is meaningless while flat
/// and is held at zero. `realized_pnl` accumulates across the whole life of
/// the key, including fully closed round trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub portfolio_id: Uuid,
    pub ticker: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub realized_pnl: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Flat starting state for a key. Replaying a trade log always begins here.
    pub fn flat(portfolio_id: Uuid, ticker: &str) -> Self {
        Self {
            portfolio_id,
            ticker: ticker.to_uppercase(),
            quantity: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            updated_at: DateTime::UNIX_EPOCH,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.quantity < Decimal::ZERO
    }
}
