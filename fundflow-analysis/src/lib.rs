/// Fundflow Analysis - Market State Classifiers
///
/// Turns a closed candle series plus an order book snapshot into advisory
/// classifications that downstream consumers (dashboards, narrative
/// generators) pattern-match on:
/// - trend: windowed net-inflow trend and coarse price stage
/// - anomaly: z-score outliers over volume, net inflow and price/volume mismatch
/// - pressure: order book imbalance combined with recent price momentum
///
/// Every classifier is a pure function of its inputs. Insufficient history,
/// empty input and zero variance all degrade to an "unknown"/neutral result
/// instead of an error, so a multi-symbol batch never aborts on one symbol.
pub mod anomaly;
pub mod candle;
pub mod format;
pub mod interval;
pub mod order_book;
pub mod pressure;
pub mod report;
pub mod rules;
pub mod stats;
pub mod trend;

// Re-export commonly used types for convenience
pub use anomaly::{
    Anomaly, AnomalyConfig, AnomalyReport, PriceVolumeMismatch, ZScoreDirection, ZScoreFlag,
    detect_anomalies,
};
pub use candle::{Bar, Candle, VolumeSplit};
pub use format::format_number;
pub use interval::{Interval, IntervalParseError};
pub use order_book::{Level, OrderBookSummary, PriceRange};
pub use pressure::{PressureAnalysis, PressureDirection, analyze_pressure};
pub use report::{
    AnalysisConfig, AnalysisMetadata, AnalysisReport, KlinesSummary, MarketAnalysis,
    MarketComparison, SymbolAnalysis,
};
pub use trend::{FlowTrend, PriceStage, TrendAnalysis, TrendConfig, analyze_trend};
