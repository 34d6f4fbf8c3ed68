use crate::{MarketDataSource, error::DataError, market::MarketKind};
use async_trait::async_trait;
use fundflow_analysis::{Candle, Interval, OrderBookSummary, VolumeSplit};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Binance kline row model and candle decoding.
pub mod kline;

/// Binance order book depth model and summary decoding.
pub mod depth;

pub const DEFAULT_SPOT_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_FUTURES_BASE_URL: &str = "https://fapi.binance.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of a [`BinanceRestClient`].
#[derive(Clone, PartialEq, Debug)]
pub struct BinanceConfig {
    pub spot_base_url: String,
    pub futures_base_url: String,
    pub timeout: Duration,
    pub volume_split: VolumeSplit,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            spot_base_url: DEFAULT_SPOT_BASE_URL.to_string(),
            futures_base_url: DEFAULT_FUTURES_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            volume_split: VolumeSplit::default(),
        }
    }
}

impl BinanceConfig {
    /// Build a config from `BINANCE_SPOT_URL`, `BINANCE_FUTURES_URL` and
    /// `BINANCE_TIMEOUT_SECS`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, DataError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("BINANCE_SPOT_URL") {
            config = config.with_base_url(MarketKind::Spot, &url)?;
        }
        if let Ok(url) = std::env::var("BINANCE_FUTURES_URL") {
            config = config.with_base_url(MarketKind::Futures, &url)?;
        }
        if let Some(secs) = std::env::var("BINANCE_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse::<u64>().ok())
        {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Override the base URL of one market. Only `http` and `https` are accepted.
    pub fn with_base_url(mut self, market: MarketKind, url: &str) -> Result<Self, DataError> {
        let parsed = Url::parse(url).map_err(|error| DataError::InvalidBaseUrl {
            market,
            reason: error.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DataError::InvalidBaseUrl {
                market,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        match market {
            MarketKind::Spot => self.spot_base_url = url.to_string(),
            MarketKind::Futures => self.futures_base_url = url.to_string(),
        }
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_volume_split(mut self, volume_split: VolumeSplit) -> Self {
        self.volume_split = volume_split;
        self
    }

    pub fn base_url(&self, market: MarketKind) -> &str {
        match market {
            MarketKind::Spot => &self.spot_base_url,
            MarketKind::Futures => &self.futures_base_url,
        }
    }

    /// Full URL of the kline endpoint, requesting one extra bar for the in-progress one.
    pub fn klines_url(
        &self,
        symbol: &str,
        market: MarketKind,
        interval: Interval,
        limit: usize,
    ) -> Result<Url, DataError> {
        let mut url = self.endpoint(market, market.klines_path())?;
        url.query_pairs_mut()
            .append_pair("symbol", symbol)
            .append_pair("interval", interval.as_str())
            .append_pair("limit", &(limit + 1).to_string());
        Ok(url)
    }

    /// Full URL of the depth endpoint.
    pub fn depth_url(&self, symbol: &str, market: MarketKind, depth: usize) -> Result<Url, DataError> {
        let mut url = self.endpoint(market, market.depth_path())?;
        url.query_pairs_mut()
            .append_pair("symbol", symbol)
            .append_pair("limit", &depth.to_string());
        Ok(url)
    }

    fn endpoint(&self, market: MarketKind, path: &str) -> Result<Url, DataError> {
        Url::parse(self.base_url(market))
            .and_then(|base| base.join(path))
            .map_err(|error| DataError::InvalidBaseUrl {
                market,
                reason: error.to_string(),
            })
    }
}

/// [`MarketDataSource`] backed by the public Binance spot and USD-M futures REST APIs.
#[derive(Clone, Debug)]
pub struct BinanceRestClient {
    http: reqwest::Client,
    config: BinanceConfig,
}

impl BinanceRestClient {
    pub fn new(config: BinanceConfig) -> Result<Self, DataError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    async fn get(&self, url: Url) -> Result<String, DataError> {
        debug!(%url, "sending Binance request");

        let response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MarketDataSource for BinanceRestClient {
    async fn candles(
        &self,
        symbol: &str,
        market: MarketKind,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let url = self.config.klines_url(symbol, market, interval, limit)?;
        let body = self.get(url).await?;

        let candles =
            kline::parse_closed_candles(symbol, &body, limit, self.config.volume_split)?;
        debug!(symbol, %market, %interval, count = candles.len(), "decoded candles");

        Ok(candles)
    }

    async fn order_book(
        &self,
        symbol: &str,
        market: MarketKind,
        depth: usize,
    ) -> Result<OrderBookSummary, DataError> {
        let url = self.config.depth_url(symbol, market, depth)?;
        let body = self.get(url).await?;

        let summary = depth::parse_order_book(&body)?;
        debug!(
            symbol,
            %market,
            imbalance = summary.imbalance,
            "decoded order book"
        );

        Ok(summary)
    }
}
