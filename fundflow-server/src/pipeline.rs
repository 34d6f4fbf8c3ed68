use crate::error::ServerError;
use fundflow_analysis::{
    AnalysisConfig, AnalysisMetadata, AnalysisReport, Candle, Interval, OrderBookSummary,
    SymbolAnalysis,
};
use fundflow_data::{MarketDataSource, MarketKind};
use futures::future::try_join_all;
use tracing::info;

pub const DEFAULT_DEPTH_LIMIT: usize = 1000;

/// Parameters of one analysis run.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AnalysisRequest {
    pub symbols: Vec<String>,
    pub interval: Interval,
    /// Closed candles fetched per market
    pub klines_limit: usize,
    /// Order book levels fetched per side
    pub depth_limit: usize,
}

/// Raw inputs of one symbol on both markets.
struct SymbolSnapshot {
    spot_candles: Vec<Candle>,
    spot_book: OrderBookSummary,
    futures_candles: Vec<Candle>,
    futures_book: OrderBookSummary,
}

async fn fetch_snapshot<S>(
    source: &S,
    symbol: &str,
    request: &AnalysisRequest,
) -> Result<SymbolSnapshot, ServerError>
where
    S: MarketDataSource + ?Sized,
{
    info!(symbol, interval = %request.interval, "fetching spot and futures market data");

    let (spot_candles, futures_candles, spot_book, futures_book) = futures::try_join!(
        source.candles(symbol, MarketKind::Spot, request.interval, request.klines_limit),
        source.candles(symbol, MarketKind::Futures, request.interval, request.klines_limit),
        source.order_book(symbol, MarketKind::Spot, request.depth_limit),
        source.order_book(symbol, MarketKind::Futures, request.depth_limit),
    )?;

    Ok(SymbolSnapshot {
        spot_candles,
        spot_book,
        futures_candles,
        futures_book,
    })
}

/// Fetch every symbol's market data concurrently and assemble the [`AnalysisReport`].
///
/// Symbols appear in the report in request order. The first fetch failure aborts the
/// whole run.
pub async fn run_analysis<S>(
    source: &S,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, ServerError>
where
    S: MarketDataSource + ?Sized,
{
    let snapshots = try_join_all(
        request
            .symbols
            .iter()
            .map(|symbol| fetch_snapshot(source, symbol, request)),
    )
    .await?;

    let mut report = AnalysisReport::new(AnalysisMetadata::new(
        request.interval,
        request.symbols.clone(),
        request.klines_limit,
    ));

    for (symbol, snapshot) in request.symbols.iter().zip(snapshots) {
        info!(%symbol, "analysing fund flow trend, anomalies and pressure");

        let analysis = SymbolAnalysis::analyze(
            &snapshot.spot_candles,
            snapshot.spot_book,
            &snapshot.futures_candles,
            snapshot.futures_book,
            config,
        );

        info!(
            %symbol,
            spot_trend = %analysis.spot.funding_trend.trend,
            futures_trend = %analysis.futures.funding_trend.trend,
            "analysis complete"
        );
        report.insert(symbol.clone(), analysis);
    }

    Ok(report)
}
