//! Position cache persistence. Rows are a cache of the trade-log fold;
//! writes carry an optimistic version check so a stale writer fails loudly
//! instead of clobbering a newer fold.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::types::position::Position;

#[derive(Debug, sqlx::FromRow)]
pub struct PositionRow {
    pub portfolio_id: Uuid,
    pub ticker: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub realized_pnl: Decimal,
    pub last_trade_id: Option<Uuid>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

pub fn position_row_to_position(row: &PositionRow) -> Position {
    Position {
        portfolio_id: row.portfolio_id,
        ticker: row.ticker.clone(),
        quantity: row.quantity,
        average_cost: row.average_cost,
        realized_pnl: row.realized_pnl,
        updated_at: row.updated_at,
    }
}

/// Upsert a position at `expected_version + 1`. Zero rows affected means
/// another writer got there first; the caller receives a conflict instead of
/// silently overwriting the newer state.
pub async fn upsert_position(
    pool: &PgPool,
    position: &Position,
    last_trade_id: Option<Uuid>,
    expected_version: u64,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        "INSERT INTO positions (portfolio_id, ticker, quantity, average_cost, realized_pnl, last_trade_id, version, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (portfolio_id, ticker) DO UPDATE \
         SET quantity = $3, average_cost = $4, realized_pnl = $5, last_trade_id = $6, version = $7, updated_at = $8 \
         WHERE positions.version = $9",
    )
    .bind(position.portfolio_id)
    .bind(&position.ticker)
    .bind(position.quantity)
    .bind(position.average_cost)
    .bind(position.realized_pnl)
    .bind(last_trade_id)
    .bind((expected_version + 1) as i64)
    .bind(position.updated_at)
    .bind(expected_version as i64)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM positions WHERE portfolio_id = $1 AND ticker = $2")
                .bind(position.portfolio_id)
                .bind(&position.ticker)
                .fetch_optional(pool)
                .await?;
        return Err(LedgerError::Conflict {
            ticker: position.ticker.clone(),
            expected: expected_version,
            found: found.map(|(v,)| v as u64).unwrap_or(0),
        });
    }
    Ok(())
}

/// List all position rows for hydration.
pub async fn list_positions(pool: &PgPool) -> Result<Vec<PositionRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PositionRow>(
        "SELECT portfolio_id, ticker, quantity, average_cost, realized_pnl, last_trade_id, version, updated_at \
         FROM positions",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
