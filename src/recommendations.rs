//! Recommendation lifecycle: WATCHLIST -> OPEN -> CLOSED (terminal).
//! Closing freezes entry/exit prices and the final return percentage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::pricefeed::PriceQuote;
use crate::types::position::Position;
use crate::types::recommendation::{
    ExitPriceSource, Recommendation, RecommendationAction, RecommendationStatus,
};

/// Start tracking a ticker without a committed entry price.
pub fn watch(ticker: &str, entry_date: DateTime<Utc>) -> Recommendation {
    Recommendation {
        id: Uuid::new_v4(),
        ticker: ticker.to_uppercase(),
        action: RecommendationAction::Watch,
        entry_price: None,
        exit_price: None,
        status: RecommendationStatus::Watchlist,
        entry_date,
        exit_date: None,
        final_return_pct: None,
        exit_price_source: None,
    }
}

/// Open an active call. The entry price must be positive.
pub fn open(
    ticker: &str,
    action: RecommendationAction,
    entry_price: Decimal,
    entry_date: DateTime<Utc>,
) -> Result<Recommendation, LedgerError> {
    if entry_price <= Decimal::ZERO {
        return Err(LedgerError::MissingEntryPrice);
    }
    Ok(Recommendation {
        id: Uuid::new_v4(),
        ticker: ticker.to_uppercase(),
        action,
        entry_price: Some(entry_price),
        exit_price: None,
        status: RecommendationStatus::Open,
        entry_date,
        exit_date: None,
        final_return_pct: None,
        exit_price_source: None,
    })
}

/// Promote a watchlist item to an open call, fixing its entry price.
pub fn promote(
    rec: &mut Recommendation,
    action: RecommendationAction,
    entry_price: Decimal,
    opened_at: DateTime<Utc>,
) -> Result<(), LedgerError> {
    match rec.status {
        RecommendationStatus::Closed => return Err(LedgerError::AlreadyClosed),
        RecommendationStatus::Open => return Err(LedgerError::AlreadyOpen),
        RecommendationStatus::Watchlist => {}
    }
    if entry_price <= Decimal::ZERO {
        return Err(LedgerError::MissingEntryPrice);
    }
    rec.action = action;
    rec.entry_price = Some(entry_price);
    rec.entry_date = opened_at;
    rec.status = RecommendationStatus::Open;
    Ok(())
}

/// Close a recommendation. Exit price resolution order: supplied price, then
/// the market quote, then the entry price as last resort; the chosen source is
/// recorded so callers can tell which one was used. The final return is left
/// unset when the entry price is missing or non-positive.
pub fn close(
    rec: &mut Recommendation,
    supplied: Option<Decimal>,
    quote: Option<&PriceQuote>,
    closed_at: DateTime<Utc>,
) -> Result<(), LedgerError> {
    if rec.is_closed() {
        return Err(LedgerError::AlreadyClosed);
    }
    let resolved = supplied
        .map(|price| (price, ExitPriceSource::Supplied))
        .or_else(|| quote.map(|quote| (quote.price, ExitPriceSource::Market)))
        .or_else(|| {
            rec.entry_price
                .map(|price| (price, ExitPriceSource::EntryFallback))
        });

    rec.status = RecommendationStatus::Closed;
    rec.exit_date = Some(closed_at);
    if let Some((exit_price, source)) = resolved {
        rec.exit_price = Some(exit_price);
        rec.exit_price_source = Some(source);
        rec.final_return_pct = rec
            .entry_price
            .and_then(|entry| return_pct(rec.action, entry, exit_price));
    }
    Ok(())
}

/// Position-event binder: close the recommendation when a trade has fully
/// flattened the bound position. No-op (Ok(false)) for other tickers, open
/// quantity, or an already-closed recommendation.
pub fn close_if_flat(
    rec: &mut Recommendation,
    position: &Position,
    quote: Option<&PriceQuote>,
    closed_at: DateTime<Utc>,
) -> Result<bool, LedgerError> {
    if rec.is_closed()
        || !position.is_flat()
        || !rec.ticker.eq_ignore_ascii_case(&position.ticker)
    {
        return Ok(false);
    }
    close(rec, None, quote, closed_at)?;
    Ok(true)
}

/// Advisory return of a still-open call against a live price. Same sign
/// convention as the final figure.
pub fn current_return_pct(rec: &Recommendation, price: Decimal) -> Option<Decimal> {
    rec.entry_price
        .and_then(|entry| return_pct(rec.action, entry, price))
}

/// `((exit - entry) / entry) * 100`, negated for Sell calls so a positive
/// return always means the call was correct. `None` when the entry price
/// cannot anchor the ratio; never NaN or infinity.
fn return_pct(action: RecommendationAction, entry: Decimal, exit: Decimal) -> Option<Decimal> {
    if entry <= Decimal::ZERO {
        return None;
    }
    let pct = (exit - entry) / entry * Decimal::ONE_HUNDRED;
    Some(match action {
        RecommendationAction::Sell => -pct,
        _ => pct,
    })
}

/// Share of closed calls with a positive final return, as a percentage.
/// `None` until at least one closed call has a final return.
pub fn hit_rate(recs: &[Recommendation]) -> Option<Decimal> {
    let scored: Vec<Decimal> = recs
        .iter()
        .filter(|rec| rec.is_closed())
        .filter_map(|rec| rec.final_return_pct)
        .collect();
    if scored.is_empty() {
        return None;
    }
    let wins = scored.iter().filter(|pct| **pct > Decimal::ZERO).count();
    Some(Decimal::from(wins) / Decimal::from(scored.len()) * Decimal::ONE_HUNDRED)
}
