use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationAction {
    Buy,
    Sell,
    Watch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationStatus {
    Watchlist,
    Open,
    Closed,
}

/// Where the exit price came from when a recommendation was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitPriceSource {
    Supplied,
    Market,
    EntryFallback,
}

/// An advisory record bound to a ticker. Created in WATCHLIST or OPEN;
/// transitions to CLOSED exactly once, freezing prices and final return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub ticker: String,
    pub action: RecommendationAction,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub status: RecommendationStatus,
    pub entry_date: DateTime<Utc>,
    pub exit_date: Option<DateTime<Utc>>,
    pub final_return_pct: Option<Decimal>,
    pub exit_price_source: Option<ExitPriceSource>,
}

impl Recommendation {
    pub fn is_closed(&self) -> bool {
        self.status == RecommendationStatus::Closed
    }
}
