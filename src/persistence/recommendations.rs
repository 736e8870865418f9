//! Recommendation persistence: insert on create, update on promote/close.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::recommendation::{
    ExitPriceSource, Recommendation, RecommendationAction, RecommendationStatus,
};

fn action_to_str(action: RecommendationAction) -> &'static str {
    match action {
        RecommendationAction::Buy => "BUY",
        RecommendationAction::Sell => "SELL",
        RecommendationAction::Watch => "WATCH",
    }
}

fn action_from_str(action: &str) -> RecommendationAction {
    match action {
        "SELL" => RecommendationAction::Sell,
        "WATCH" => RecommendationAction::Watch,
        _ => RecommendationAction::Buy,
    }
}

fn status_to_str(status: RecommendationStatus) -> &'static str {
    match status {
        RecommendationStatus::Watchlist => "WATCHLIST",
        RecommendationStatus::Open => "OPEN",
        RecommendationStatus::Closed => "CLOSED",
    }
}

fn status_from_str(status: &str) -> RecommendationStatus {
    match status {
        "OPEN" => RecommendationStatus::Open,
        "CLOSED" => RecommendationStatus::Closed,
        _ => RecommendationStatus::Watchlist,
    }
}

fn source_to_str(source: ExitPriceSource) -> &'static str {
    match source {
        ExitPriceSource::Supplied => "SUPPLIED",
        ExitPriceSource::Market => "MARKET",
        ExitPriceSource::EntryFallback => "ENTRY_FALLBACK",
    }
}

fn source_from_str(source: &str) -> ExitPriceSource {
    match source {
        "SUPPLIED" => ExitPriceSource::Supplied,
        "MARKET" => ExitPriceSource::Market,
        _ => ExitPriceSource::EntryFallback,
    }
}

#[derive(Debug, FromRow)]
pub struct RecommendationRow {
    pub id: Uuid,
    pub ticker: String,
    pub action: String,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub status: String,
    pub entry_date: DateTime<Utc>,
    pub exit_date: Option<DateTime<Utc>>,
    pub final_return_pct: Option<Decimal>,
    pub exit_price_source: Option<String>,
}

fn row_to_recommendation(row: &RecommendationRow) -> Recommendation {
    Recommendation {
        id: row.id,
        ticker: row.ticker.clone(),
        action: action_from_str(&row.action),
        entry_price: row.entry_price,
        exit_price: row.exit_price,
        status: status_from_str(&row.status),
        entry_date: row.entry_date,
        exit_date: row.exit_date,
        final_return_pct: row.final_return_pct,
        exit_price_source: row.exit_price_source.as_deref().map(source_from_str),
    }
}

/// Insert a freshly created recommendation.
pub async fn insert_recommendation(pool: &PgPool, rec: &Recommendation) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO recommendations (id, ticker, action, entry_price, exit_price, status, entry_date, exit_date, final_return_pct, exit_price_source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(rec.id)
    .bind(&rec.ticker)
    .bind(action_to_str(rec.action))
    .bind(rec.entry_price)
    .bind(rec.exit_price)
    .bind(status_to_str(rec.status))
    .bind(rec.entry_date)
    .bind(rec.exit_date)
    .bind(rec.final_return_pct)
    .bind(rec.exit_price_source.map(source_to_str))
    .execute(pool)
    .await?;
    Ok(())
}

/// Rewrite mutable lifecycle fields after a promote or close.
pub async fn update_recommendation(pool: &PgPool, rec: &Recommendation) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE recommendations \
         SET action = $2, entry_price = $3, exit_price = $4, status = $5, entry_date = $6, exit_date = $7, final_return_pct = $8, exit_price_source = $9 \
         WHERE id = $1",
    )
    .bind(rec.id)
    .bind(action_to_str(rec.action))
    .bind(rec.entry_price)
    .bind(rec.exit_price)
    .bind(status_to_str(rec.status))
    .bind(rec.entry_date)
    .bind(rec.exit_date)
    .bind(rec.final_return_pct)
    .bind(rec.exit_price_source.map(source_to_str))
    .execute(pool)
    .await?;
    Ok(())
}

/// List all recommendations for hydration.
pub async fn list_recommendations(pool: &PgPool) -> Result<Vec<Recommendation>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RecommendationRow>(
        "SELECT id, ticker, action, entry_price, exit_price, status, entry_date, exit_date, final_return_pct, exit_price_source \
         FROM recommendations ORDER BY entry_date ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_recommendation).collect())
}
