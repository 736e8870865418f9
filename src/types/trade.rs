use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One executed order in the append-only trade log. Immutable once recorded.
/// `realized_pnl` is set only when the trade closed existing exposure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub ticker: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub notional: Decimal,
    pub executed_at: DateTime<Utc>,
    pub realized_pnl: Option<Decimal>,
}

impl Trade {
    /// Build a validated trade. Quantity and price must be positive; the
    /// ticker is normalized to uppercase and the notional is derived.
    pub fn new(
        portfolio_id: Uuid,
        ticker: &str,
        side: TradeSide,
        quantity: Decimal,
        price: Decimal,
        executed_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidTrade("quantity must be positive"));
        }
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidTrade("price must be positive"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            portfolio_id,
            ticker: ticker.to_uppercase(),
            side,
            quantity,
            price,
            notional: quantity * price,
            executed_at,
            realized_pnl: None,
        })
    }

    /// Quantity signed by side: positive for Buy, negative for Sell.
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            TradeSide::Buy => self.quantity,
            TradeSide::Sell => -self.quantity,
        }
    }
}
