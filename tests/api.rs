//! HTTP integration tests: spawn the router on a random port and drive the
//! trade, summary, and recommendation endpoints end to end.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal_macros::dec;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use paper_ledger::api::routes::{AppState, TradeAccepted, app_router};
use paper_ledger::ledger::PositionBook;
use paper_ledger::pricefeed::{BatchConfig, StaticPriceFeed};
use paper_ledger::summary::TickerSummary;
use paper_ledger::types::recommendation::{
    ExitPriceSource, Recommendation, RecommendationStatus,
};

fn test_state(feed: Arc<StaticPriceFeed>) -> AppState {
    AppState {
        book: Arc::new(PositionBook::new()),
        trade_log: Arc::new(RwLock::new(Vec::new())),
        recommendations: Arc::new(RwLock::new(HashMap::new())),
        feed,
        batch: BatchConfig::default(),
        db: None,
    }
}

/// Spawn app on a random port and return (base_url, guard that keeps server running).
async fn spawn_app(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);
    let app = app_router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base_url, handle)
}

#[tokio::test]
async fn health_returns_healthy() {
    let (base_url, _handle) = spawn_app(test_state(Arc::new(StaticPriceFeed::new()))).await;
    let res = reqwest::get(format!("{base_url}/health")).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.text().await.unwrap(), "healthy");
}

#[tokio::test]
async fn recording_trades_updates_the_position() {
    let (base_url, _handle) = spawn_app(test_state(Arc::new(StaticPriceFeed::new()))).await;
    let client = reqwest::Client::new();
    let portfolio_id = Uuid::new_v4();

    let res = client
        .post(format!("{base_url}/trades"))
        .json(&json!({
            "portfolio_id": portfolio_id,
            "ticker": "aapl",
            "side": "BUY",
            "quantity": 100,
            "price": 10
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);
    let accepted: TradeAccepted = res.json().await.unwrap();
    assert_eq!(accepted.trade.ticker, "AAPL");
    assert_eq!(accepted.trade.notional, dec!(1000));
    assert_eq!(accepted.trade.realized_pnl, None);
    assert_eq!(accepted.position.quantity, dec!(100));
    assert_eq!(accepted.position.average_cost, dec!(10));

    let res = client
        .post(format!("{base_url}/trades"))
        .json(&json!({
            "portfolio_id": portfolio_id,
            "ticker": "AAPL",
            "side": "SELL",
            "quantity": 40,
            "price": 15
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);
    let accepted: TradeAccepted = res.json().await.unwrap();
    assert_eq!(accepted.trade.realized_pnl, Some(dec!(200)));
    assert_eq!(accepted.position.quantity, dec!(60));
    assert_eq!(accepted.position.realized_pnl, dec!(200));

    let res = client
        .get(format!("{base_url}/portfolios/{portfolio_id}/positions"))
        .send()
        .await
        .unwrap();
    let positions: Vec<paper_ledger::types::position::Position> = res.json().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].quantity, dec!(60));
}

#[tokio::test]
async fn malformed_trade_is_rejected_with_400() {
    let (base_url, _handle) = spawn_app(test_state(Arc::new(StaticPriceFeed::new()))).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base_url}/trades"))
        .json(&json!({
            "portfolio_id": Uuid::new_v4(),
            "ticker": "AAPL",
            "side": "BUY",
            "quantity": 0,
            "price": 10
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn summary_endpoint_sorts_by_requested_key() {
    let feed = Arc::new(StaticPriceFeed::new());
    feed.set_price("AAPL", dec!(120)).await;
    feed.set_price("MSFT", dec!(310)).await;
    let (base_url, _handle) = spawn_app(test_state(Arc::clone(&feed))).await;
    let client = reqwest::Client::new();
    let portfolio_id = Uuid::new_v4();

    for (ticker, qty, price) in [("MSFT", 2, 300), ("AAPL", 10, 100)] {
        let res = client
            .post(format!("{base_url}/trades"))
            .json(&json!({
                "portfolio_id": portfolio_id,
                "ticker": ticker,
                "side": "BUY",
                "quantity": qty,
                "price": price
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 201);
    }

    let res = client
        .get(format!(
            "{base_url}/portfolios/{portfolio_id}/summary?sort=market_value&order=desc"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let summaries: Vec<TickerSummary> = res.json().await.unwrap();
    assert_eq!(summaries.len(), 2);
    // AAPL: 10 * 120 = 1200 beats MSFT: 2 * 310 = 620.
    assert_eq!(summaries[0].ticker, "AAPL");
    assert_eq!(summaries[0].market_value, Some(dec!(1200)));
    assert_eq!(summaries[1].ticker, "MSFT");
}

#[tokio::test]
async fn recommendation_lifecycle_over_http() {
    let (base_url, _handle) = spawn_app(test_state(Arc::new(StaticPriceFeed::new()))).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base_url}/recommendations"))
        .json(&json!({ "ticker": "AAPL", "action": "BUY", "entry_price": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);
    let rec: Recommendation = res.json().await.unwrap();
    assert_eq!(rec.status, RecommendationStatus::Open);

    let res = client
        .post(format!("{base_url}/recommendations/{}/close", rec.id))
        .json(&json!({ "exit_price": 125 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let closed: Recommendation = res.json().await.unwrap();
    assert_eq!(closed.status, RecommendationStatus::Closed);
    assert_eq!(closed.exit_price_source, Some(ExitPriceSource::Supplied));
    assert_eq!(closed.final_return_pct, Some(dec!(25)));

    // Closed is terminal.
    let res = client
        .post(format!("{base_url}/recommendations/{}/close", rec.id))
        .json(&json!({ "exit_price": 200 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 409);
}

#[tokio::test]
async fn open_without_entry_price_is_rejected() {
    let (base_url, _handle) = spawn_app(test_state(Arc::new(StaticPriceFeed::new()))).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base_url}/recommendations"))
        .json(&json!({ "ticker": "AAPL", "action": "BUY" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);

    // WATCH needs no entry price.
    let res = client
        .post(format!("{base_url}/recommendations"))
        .json(&json!({ "ticker": "AAPL", "action": "WATCH" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 201);
    let rec: Recommendation = res.json().await.unwrap();
    assert_eq!(rec.status, RecommendationStatus::Watchlist);
}

#[tokio::test]
async fn flattening_trade_closes_open_recommendation() {
    let feed = Arc::new(StaticPriceFeed::new());
    feed.set_price("AAPL", dec!(110)).await;
    let (base_url, _handle) = spawn_app(test_state(Arc::clone(&feed))).await;
    let client = reqwest::Client::new();
    let portfolio_id = Uuid::new_v4();

    let res = client
        .post(format!("{base_url}/recommendations"))
        .json(&json!({ "ticker": "AAPL", "action": "BUY", "entry_price": 100 }))
        .send()
        .await
        .unwrap();
    let rec: Recommendation = res.json().await.unwrap();

    for (side, price) in [("BUY", 100), ("SELL", 110)] {
        let res = client
            .post(format!("{base_url}/trades"))
            .json(&json!({
                "portfolio_id": portfolio_id,
                "ticker": "AAPL",
                "side": side,
                "quantity": 10,
                "price": price
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 201);
    }

    let res = client
        .get(format!("{base_url}/recommendations/{}", rec.id))
        .send()
        .await
        .unwrap();
    let closed: Recommendation = res.json().await.unwrap();
    assert_eq!(closed.status, RecommendationStatus::Closed);
    assert_eq!(closed.exit_price_source, Some(ExitPriceSource::Market));
    assert_eq!(closed.exit_price, Some(dec!(110)));
    assert_eq!(closed.final_return_pct, Some(dec!(10)));
}

#[tokio::test]
async fn stats_report_counts_and_hit_rate() {
    let (base_url, _handle) = spawn_app(test_state(Arc::new(StaticPriceFeed::new()))).await;
    let client = reqwest::Client::new();

    for (ticker, entry, exit) in [("AAPL", 100, 120), ("MSFT", 100, 90)] {
        let res = client
            .post(format!("{base_url}/recommendations"))
            .json(&json!({ "ticker": ticker, "action": "BUY", "entry_price": entry }))
            .send()
            .await
            .unwrap();
        let rec: Recommendation = res.json().await.unwrap();
        client
            .post(format!("{base_url}/recommendations/{}/close", rec.id))
            .json(&json!({ "exit_price": exit }))
            .send()
            .await
            .unwrap();
    }
    client
        .post(format!("{base_url}/recommendations"))
        .json(&json!({ "ticker": "NVDA", "action": "WATCH" }))
        .send()
        .await
        .unwrap();

    let res = client
        .get(format!("{base_url}/recommendations/stats"))
        .send()
        .await
        .unwrap();
    let stats: serde_json::Value = res.json().await.unwrap();
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["watchlist"], 1);
    assert_eq!(stats["closed"], 2);
    let hit_rate: rust_decimal::Decimal = stats["hit_rate_pct"].as_str().unwrap().parse().unwrap();
    assert_eq!(hit_rate, dec!(50));
}
