//! HTTP surface over the accounting core: record trades, read positions and
//! summaries, drive the recommendation lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::SharedPositionBook;
use crate::persistence;
use crate::pricefeed::{BatchConfig, PriceFeed};
use crate::recommendations;
use crate::summary::{self, SortOrder, SummarySort, TickerSummary};
use crate::types::position::Position;
use crate::types::recommendation::{Recommendation, RecommendationAction, RecommendationStatus};
use crate::types::trade::{Trade, TradeSide};

pub type SharedTradeLog = Arc<RwLock<Vec<Trade>>>;
pub type SharedRecommendations = Arc<RwLock<HashMap<Uuid, Recommendation>>>;

#[derive(Clone)]
pub struct AppState {
    pub book: SharedPositionBook,
    pub trade_log: SharedTradeLog,
    pub recommendations: SharedRecommendations,
    pub feed: Arc<dyn PriceFeed>,
    pub batch: BatchConfig,
    pub db: Option<PgPool>,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::InvalidTrade(_)
            | LedgerError::MissingEntryPrice
            | LedgerError::KeyMismatch { .. } => StatusCode::BAD_REQUEST,
            LedgerError::Conflict { .. }
            | LedgerError::AlreadyClosed
            | LedgerError::AlreadyOpen => StatusCode::CONFLICT,
            LedgerError::RecommendationNotFound => StatusCode::NOT_FOUND,
            LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

async fn health() -> &'static str {
    "healthy"
}

#[derive(Debug, Deserialize)]
pub struct NewTradeRequest {
    pub portfolio_id: Uuid,
    pub ticker: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TradeAccepted {
    pub trade: Trade,
    pub position: Position,
}

/// Record one execution: validate, fold into the position book, append to the
/// trade log, and close any open recommendation whose position went flat.
async fn record_trade(
    State(state): State<AppState>,
    Json(req): Json<NewTradeRequest>,
) -> Result<(StatusCode, Json<TradeAccepted>), LedgerError> {
    let executed_at = req.executed_at.unwrap_or_else(Utc::now);
    let mut trade = Trade::new(
        req.portfolio_id,
        &req.ticker,
        req.side,
        req.quantity,
        req.price,
        executed_at,
    )?;

    let (applied, version) = state.book.record(&trade).await?;
    trade.realized_pnl = applied.released_pnl;
    state.trade_log.write().await.push(trade.clone());

    if let Some(pool) = &state.db {
        persistence::insert_trade(pool, &trade).await?;
        persistence::upsert_position(pool, &applied.position, Some(trade.id), version - 1).await?;
    }
    info!(
        ticker = %trade.ticker,
        side = ?trade.side,
        quantity = %trade.quantity,
        price = %trade.price,
        "trade recorded"
    );

    if applied.position.is_flat() {
        let quote = state.feed.get_price(&trade.ticker).await.ok();
        let mut recs = state.recommendations.write().await;
        for rec in recs.values_mut() {
            if recommendations::close_if_flat(rec, &applied.position, quote.as_ref(), Utc::now())? {
                info!(id = %rec.id, ticker = %rec.ticker, "recommendation closed on flat position");
                if let Some(pool) = &state.db {
                    persistence::update_recommendation(pool, rec).await?;
                }
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(TradeAccepted {
            trade,
            position: applied.position,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PositionsQuery {
    pub ticker: Option<String>,
}

async fn portfolio_positions(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
    Query(query): Query<PositionsQuery>,
) -> Json<Vec<Position>> {
    Json(
        state
            .book
            .positions_for(portfolio_id, query.ticker.as_deref())
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub sort: Option<SummarySort>,
    pub order: Option<SortOrder>,
}

async fn portfolio_summary(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Vec<TickerSummary>>, LedgerError> {
    let trades = state.trade_log.read().await.clone();
    let mut summaries = summary::build_summaries(
        portfolio_id,
        &trades,
        Some(&state.book),
        state.feed.as_ref(),
        &state.batch,
    )
    .await?;
    summary::sort_summaries(
        &mut summaries,
        query.sort.unwrap_or(SummarySort::Ticker),
        query.order.unwrap_or(SortOrder::Asc),
    );
    Ok(Json(summaries))
}

async fn portfolio_valuation(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
) -> Result<Json<summary::PortfolioValuation>, LedgerError> {
    let trades = state.trade_log.read().await.clone();
    let summaries = summary::build_summaries(
        portfolio_id,
        &trades,
        Some(&state.book),
        state.feed.as_ref(),
        &state.batch,
    )
    .await?;
    Ok(Json(summary::portfolio_valuation(&summaries)))
}

#[derive(Debug, Deserialize)]
pub struct NewRecommendationRequest {
    pub ticker: String,
    pub action: RecommendationAction,
    pub entry_price: Option<Decimal>,
}

async fn create_recommendation(
    State(state): State<AppState>,
    Json(req): Json<NewRecommendationRequest>,
) -> Result<(StatusCode, Json<Recommendation>), LedgerError> {
    let rec = match req.action {
        RecommendationAction::Watch => recommendations::watch(&req.ticker, Utc::now()),
        action => {
            let entry_price = req.entry_price.ok_or(LedgerError::MissingEntryPrice)?;
            recommendations::open(&req.ticker, action, entry_price, Utc::now())?
        }
    };
    if let Some(pool) = &state.db {
        persistence::insert_recommendation(pool, &rec).await?;
    }
    state
        .recommendations
        .write()
        .await
        .insert(rec.id, rec.clone());
    info!(id = %rec.id, ticker = %rec.ticker, status = ?rec.status, "recommendation created");
    Ok((StatusCode::CREATED, Json(rec)))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub status: Option<RecommendationStatus>,
}

async fn list_recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendationsQuery>,
) -> Json<Vec<Recommendation>> {
    let recs = state.recommendations.read().await;
    let mut list: Vec<Recommendation> = recs
        .values()
        .filter(|rec| query.status.is_none_or(|status| rec.status == status))
        .cloned()
        .collect();
    list.sort_by_key(|rec| rec.entry_date);
    Json(list)
}

async fn get_recommendation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Recommendation>, LedgerError> {
    let recs = state.recommendations.read().await;
    recs.get(&id)
        .cloned()
        .map(Json)
        .ok_or(LedgerError::RecommendationNotFound)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationStats {
    pub total: usize,
    pub watchlist: usize,
    pub open: usize,
    pub closed: usize,
    pub hit_rate_pct: Option<Decimal>,
}

async fn recommendation_stats(State(state): State<AppState>) -> Json<RecommendationStats> {
    let recs = state.recommendations.read().await;
    let all: Vec<Recommendation> = recs.values().cloned().collect();
    let count = |status: RecommendationStatus| all.iter().filter(|r| r.status == status).count();
    Json(RecommendationStats {
        total: all.len(),
        watchlist: count(RecommendationStatus::Watchlist),
        open: count(RecommendationStatus::Open),
        closed: count(RecommendationStatus::Closed),
        hit_rate_pct: recommendations::hit_rate(&all),
    })
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub action: RecommendationAction,
    pub entry_price: Decimal,
}

async fn promote_recommendation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PromoteRequest>,
) -> Result<Json<Recommendation>, LedgerError> {
    let mut recs = state.recommendations.write().await;
    let rec = recs
        .get_mut(&id)
        .ok_or(LedgerError::RecommendationNotFound)?;
    recommendations::promote(rec, req.action, req.entry_price, Utc::now())?;
    if let Some(pool) = &state.db {
        persistence::update_recommendation(pool, rec).await?;
    }
    info!(id = %rec.id, ticker = %rec.ticker, "recommendation promoted to open");
    Ok(Json(rec.clone()))
}

#[derive(Debug, Deserialize)]
pub struct CloseRecommendationRequest {
    pub exit_price: Option<Decimal>,
}

async fn close_recommendation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CloseRecommendationRequest>,
) -> Result<Json<Recommendation>, LedgerError> {
    let ticker = {
        let recs = state.recommendations.read().await;
        recs.get(&id)
            .ok_or(LedgerError::RecommendationNotFound)?
            .ticker
            .clone()
    };
    // Only reach for the market when no exit price was supplied.
    let quote = if req.exit_price.is_none() {
        state.feed.get_price(&ticker).await.ok()
    } else {
        None
    };

    let mut recs = state.recommendations.write().await;
    let rec = recs
        .get_mut(&id)
        .ok_or(LedgerError::RecommendationNotFound)?;
    recommendations::close(rec, req.exit_price, quote.as_ref(), Utc::now())?;
    if let Some(pool) = &state.db {
        persistence::update_recommendation(pool, rec).await?;
    }
    info!(
        id = %rec.id,
        ticker = %rec.ticker,
        source = ?rec.exit_price_source,
        "recommendation closed"
    );
    Ok(Json(rec.clone()))
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/trades", post(record_trade))
        .route("/portfolios/{portfolio_id}/positions", get(portfolio_positions))
        .route("/portfolios/{portfolio_id}/summary", get(portfolio_summary))
        .route("/portfolios/{portfolio_id}/valuation", get(portfolio_valuation))
        .route("/recommendations", post(create_recommendation).get(list_recommendations))
        .route("/recommendations/stats", get(recommendation_stats))
        .route("/recommendations/{id}", get(get_recommendation))
        .route("/recommendations/{id}/promote", post(promote_recommendation))
        .route("/recommendations/{id}/close", post(close_recommendation))
        .with_state(state)
}
