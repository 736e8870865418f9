use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use paper_ledger::api::routes::{AppState, SharedRecommendations, SharedTradeLog, app_router};
use paper_ledger::error::LedgerError;
use paper_ledger::ledger::{self, PositionBook};
use paper_ledger::persistence::{self, PgPool};
use paper_ledger::pricefeed::{BatchConfig, PriceFeed, QuoteCache, StaticPriceFeed};
use paper_ledger::types::trade::Trade;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let book = Arc::new(PositionBook::new());
    let trade_log: SharedTradeLog = Arc::new(RwLock::new(Vec::new()));
    let recommendations: SharedRecommendations = Arc::new(RwLock::new(HashMap::new()));

    let db = match std::env::var("DATABASE_URL") {
        Ok(url) => Some(
            persistence::create_pool_and_migrate(&url)
                .await
                .expect("database connection"),
        ),
        Err(_) => {
            info!("DATABASE_URL not set, running memory-only");
            None
        }
    };
    if let Some(pool) = &db {
        hydrate(pool, &book, &trade_log, &recommendations)
            .await
            .expect("hydration from database");
    }

    let feed: Arc<dyn PriceFeed> = Arc::new(QuoteCache::new(
        Arc::new(StaticPriceFeed::new()),
        Duration::from_secs(30),
    ));

    let state = AppState {
        book,
        trade_log,
        recommendations,
        feed,
        batch: BatchConfig::default(),
        db,
    };

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!(%addr, "listening");
    axum::serve(listener, app_router(state)).await.unwrap();
}

/// Rebuild in-memory state from storage. The trade log is authoritative:
/// every position is recomputed from it, and stored position rows are only
/// compared against the fold to report divergence.
async fn hydrate(
    pool: &PgPool,
    book: &PositionBook,
    trade_log: &SharedTradeLog,
    recommendations: &SharedRecommendations,
) -> Result<(), LedgerError> {
    let trades = persistence::list_trades(pool).await?;
    let stored: HashMap<(Uuid, String), persistence::PositionRow> = persistence::list_positions(pool)
        .await?
        .into_iter()
        .map(|row| ((row.portfolio_id, row.ticker.to_uppercase()), row))
        .collect();

    let mut groups: HashMap<(Uuid, String), Vec<&Trade>> = HashMap::new();
    for trade in &trades {
        groups
            .entry((trade.portfolio_id, trade.ticker.to_uppercase()))
            .or_default()
            .push(trade);
    }

    let key_count = groups.len();
    for ((portfolio_id, ticker), group) in &groups {
        let position = ledger::replay(*portfolio_id, ticker, group.iter().copied())?;
        let last_trade_id = group.last().map(|t| t.id);
        if let Some(row) = stored.get(&(*portfolio_id, ticker.clone())) {
            let cached = persistence::position_row_to_position(row);
            if row.last_trade_id != last_trade_id
                || cached.quantity != position.quantity
                || cached.average_cost != position.average_cost
                || cached.realized_pnl != position.realized_pnl
            {
                warn!(%ticker, "stored position diverged from trade log; using the fold");
            }
        }
        book.load(position, group.len() as u64, last_trade_id).await;
    }

    let trade_count = trades.len();
    trade_log.write().await.extend(trades);

    let recs = persistence::list_recommendations(pool).await?;
    let rec_count = recs.len();
    let mut guard = recommendations.write().await;
    for rec in recs {
        guard.insert(rec.id, rec);
    }

    info!(
        trades = trade_count,
        positions = key_count,
        recommendations = rec_count,
        "hydrated from database"
    );
    Ok(())
}
