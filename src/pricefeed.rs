//! Price feed seam: the only I/O in the accounting core. Lookups are
//! asynchronous and fallible; batch fetches run with bounded concurrency and
//! a per-lookup timeout so one slow ticker never stalls a whole summary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, Semaphore};
use tokio::time::{Instant, timeout};
use tracing::warn;

use crate::error::PriceFeedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Decimal,
    pub as_of: DateTime<Utc>,
}

/// External market-data collaborator.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_price(&self, ticker: &str) -> Result<PriceQuote, PriceFeedError>;
}

/// Limits for batch lookups.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_concurrent: usize,
    pub lookup_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

/// Fetch quotes for many tickers with at most `max_concurrent` lookups in
/// flight. A failed or timed-out lookup drops that ticker from the result and
/// the rest proceed.
pub async fn fetch_quotes(
    feed: &dyn PriceFeed,
    tickers: &[String],
    config: &BatchConfig,
) -> HashMap<String, PriceQuote> {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let lookups = tickers.iter().map(|ticker| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = semaphore.acquire().await.ok()?;
            match timeout(config.lookup_timeout, feed.get_price(ticker)).await {
                Ok(Ok(quote)) => Some((ticker.clone(), quote)),
                Ok(Err(err)) => {
                    warn!(%ticker, %err, "price lookup failed");
                    None
                }
                Err(_) => {
                    warn!(%ticker, "price lookup timed out");
                    None
                }
            }
        }
    });
    futures::future::join_all(lookups)
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// In-memory feed for tests and price-less local runs.
#[derive(Default)]
pub struct StaticPriceFeed {
    quotes: RwLock<HashMap<String, Decimal>>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, ticker: &str, price: Decimal) {
        self.quotes
            .write()
            .await
            .insert(ticker.to_uppercase(), price);
    }

    pub async fn clear_price(&self, ticker: &str) {
        self.quotes.write().await.remove(&ticker.to_uppercase());
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn get_price(&self, ticker: &str) -> Result<PriceQuote, PriceFeedError> {
        let guard = self.quotes.read().await;
        guard
            .get(&ticker.to_uppercase())
            .map(|price| PriceQuote {
                price: *price,
                as_of: Utc::now(),
            })
            .ok_or_else(|| PriceFeedError::Unavailable(ticker.to_string()))
    }
}

/// TTL cache in front of another feed. Derived values stay injectable: the
/// consuming layer decides the TTL, the fold never sees cached prices.
pub struct QuoteCache {
    inner: Arc<dyn PriceFeed>,
    ttl: Duration,
    entries: RwLock<HashMap<String, (PriceQuote, Instant)>>,
}

impl QuoteCache {
    pub fn new(inner: Arc<dyn PriceFeed>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PriceFeed for QuoteCache {
    async fn get_price(&self, ticker: &str) -> Result<PriceQuote, PriceFeedError> {
        let key = ticker.to_uppercase();
        {
            let guard = self.entries.read().await;
            if let Some((quote, fetched_at)) = guard.get(&key) {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(*quote);
                }
            }
        }
        let quote = self.inner.get_price(ticker).await?;
        self.entries
            .write()
            .await
            .insert(key, (quote, Instant::now()));
        Ok(quote)
    }
}
