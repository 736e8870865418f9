//! Position aggregation: a pure fold of the trade log into per-key positions,
//! plus the shared `PositionBook` store with versioned, conflict-checked writes.
//! Testable without HTTP or a database.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use rust_decimal::Decimal;

use crate::error::LedgerError;
use crate::types::position::Position;
use crate::types::trade::Trade;

/// Result of folding one trade into a position. `released_pnl` is `Some`
/// whenever the trade closed existing exposure (reduction, flat close, or the
/// closing leg of a flip), even if the released amount is zero.
#[derive(Debug, Clone)]
pub struct AppliedTrade {
    pub position: Position,
    pub released_pnl: Option<Decimal>,
}

/// Fold one trade into a position. Pure and deterministic: the returned state
/// depends only on the inputs, so replaying an ordered log is reproducible.
///
/// Weighted-average-cost rules, with `delta` = quantity signed by side:
/// - same direction (or flat): new average = weighted mean, quantity grows;
/// - reduction: released P&L = closed * (price - avg) * sign(position),
///   average unchanged on the remainder;
/// - flip: close the whole position as above, remainder opens fresh at the
///   trade price;
/// - exact flat: quantity and average reset to zero, realized P&L kept.
pub fn apply(position: &Position, trade: &Trade) -> Result<AppliedTrade, LedgerError> {
    if trade.quantity <= Decimal::ZERO {
        return Err(LedgerError::InvalidTrade("quantity must be positive"));
    }
    if trade.price <= Decimal::ZERO {
        return Err(LedgerError::InvalidTrade("price must be positive"));
    }
    if trade.portfolio_id != position.portfolio_id
        || !trade.ticker.eq_ignore_ascii_case(&position.ticker)
    {
        return Err(LedgerError::KeyMismatch {
            trade_ticker: trade.ticker.clone(),
            position_ticker: position.ticker.clone(),
        });
    }

    let delta = trade.signed_quantity();
    let mut next = position.clone();
    next.updated_at = trade.executed_at;

    let same_direction =
        position.quantity.is_zero() || position.quantity.is_sign_positive() == delta.is_sign_positive();

    let released_pnl = if same_direction {
        let total = position.quantity.abs() + trade.quantity;
        next.average_cost =
            (position.quantity.abs() * position.average_cost + trade.quantity * trade.price) / total;
        next.quantity = position.quantity + delta;
        None
    } else {
        let closed = trade.quantity.min(position.quantity.abs());
        let direction = if position.quantity.is_sign_positive() {
            Decimal::ONE
        } else {
            -Decimal::ONE
        };
        let released = closed * (trade.price - position.average_cost) * direction;
        next.realized_pnl += released;

        let remaining = position.quantity + delta;
        if remaining.is_zero() {
            next.quantity = Decimal::ZERO;
            next.average_cost = Decimal::ZERO;
        } else if trade.quantity > position.quantity.abs() {
            // Flip: the leftover opens a fresh position in the other direction.
            next.quantity = remaining;
            next.average_cost = trade.price;
        } else {
            next.quantity = remaining;
        }
        Some(released)
    };

    Ok(AppliedTrade {
        position: next,
        released_pnl,
    })
}

/// Replay an ordered trade log for one key from a flat start.
pub fn replay<'a, I>(portfolio_id: Uuid, ticker: &str, trades: I) -> Result<Position, LedgerError>
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut position = Position::flat(portfolio_id, ticker);
    for trade in trades {
        position = apply(&position, trade)?.position;
    }
    Ok(position)
}

/// Point-in-time read of a book entry. The version is the count of trades
/// applied to the key; `commit` rejects snapshots the store has moved past.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub position: Position,
    pub version: u64,
    pub last_trade_id: Option<Uuid>,
}

type BookKey = (Uuid, String);

struct BookEntry {
    position: Position,
    version: u64,
    last_trade_id: Option<Uuid>,
}

pub type SharedPositionBook = Arc<PositionBook>;

/// Shared position store keyed by (portfolio, ticker). Writes to the same key
/// are serialized; stale read-modify-write cycles fail with a conflict instead
/// of silently applying against an outdated base.
#[derive(Default)]
pub struct PositionBook {
    inner: RwLock<HashMap<BookKey, BookEntry>>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(portfolio_id: Uuid, ticker: &str) -> BookKey {
        (portfolio_id, ticker.to_uppercase())
    }

    /// Current state of a key, flat at version 0 if never traded.
    pub async fn snapshot(&self, portfolio_id: Uuid, ticker: &str) -> PositionSnapshot {
        let guard = self.inner.read().await;
        match guard.get(&Self::key(portfolio_id, ticker)) {
            Some(entry) => PositionSnapshot {
                position: entry.position.clone(),
                version: entry.version,
                last_trade_id: entry.last_trade_id,
            },
            None => PositionSnapshot {
                position: Position::flat(portfolio_id, ticker),
                version: 0,
                last_trade_id: None,
            },
        }
    }

    /// Single-writer path: read, fold, and store under one write lock.
    /// Returns the applied trade and the key's new version.
    pub async fn record(&self, trade: &Trade) -> Result<(AppliedTrade, u64), LedgerError> {
        let mut guard = self.inner.write().await;
        let key = Self::key(trade.portfolio_id, &trade.ticker);
        let (base, version) = match guard.get(&key) {
            Some(entry) => (entry.position.clone(), entry.version),
            None => (Position::flat(trade.portfolio_id, &trade.ticker), 0),
        };
        let applied = apply(&base, trade)?;
        guard.insert(
            key,
            BookEntry {
                position: applied.position.clone(),
                version: version + 1,
                last_trade_id: Some(trade.id),
            },
        );
        Ok((applied, version + 1))
    }

    /// Optimistic path: fold against a previously taken snapshot. Fails with
    /// `Conflict` when another writer has advanced the key since the snapshot.
    pub async fn commit(
        &self,
        snapshot: &PositionSnapshot,
        trade: &Trade,
    ) -> Result<(AppliedTrade, u64), LedgerError> {
        let mut guard = self.inner.write().await;
        let key = Self::key(trade.portfolio_id, &trade.ticker);
        let found = guard.get(&key).map(|entry| entry.version).unwrap_or(0);
        if found != snapshot.version {
            return Err(LedgerError::Conflict {
                ticker: snapshot.position.ticker.clone(),
                expected: snapshot.version,
                found,
            });
        }
        let applied = apply(&snapshot.position, trade)?;
        guard.insert(
            key,
            BookEntry {
                position: applied.position.clone(),
                version: snapshot.version + 1,
                last_trade_id: Some(trade.id),
            },
        );
        Ok((applied, snapshot.version + 1))
    }

    /// Seed an entry from storage during hydration. The caller is expected to
    /// have reconciled the position against the trade log first.
    pub async fn load(&self, position: Position, version: u64, last_trade_id: Option<Uuid>) {
        let mut guard = self.inner.write().await;
        let key = Self::key(position.portfolio_id, &position.ticker);
        guard.insert(
            key,
            BookEntry {
                position,
                version,
                last_trade_id,
            },
        );
    }

    /// Positions for a portfolio, optionally filtered by ticker. Flat entries
    /// are included: they still carry cumulative realized P&L.
    pub async fn positions_for(
        &self,
        portfolio_id: Uuid,
        ticker_filter: Option<&str>,
    ) -> Vec<Position> {
        let guard = self.inner.read().await;
        let ticker_upper = ticker_filter.map(|t| t.to_uppercase());
        guard
            .iter()
            .filter(|((pid, ticker), _)| {
                *pid == portfolio_id && ticker_upper.as_ref().is_none_or(|t| ticker == t)
            })
            .map(|(_, entry)| entry.position.clone())
            .collect()
    }
}
