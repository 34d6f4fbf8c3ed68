use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Venue a symbol is traded on.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    #[display("spot")]
    Spot,
    #[display("futures")]
    Futures,
}

impl MarketKind {
    pub const ALL: [MarketKind; 2] = [MarketKind::Spot, MarketKind::Futures];

    /// Path of the kline endpoint on this market's REST API.
    pub fn klines_path(&self) -> &'static str {
        match self {
            MarketKind::Spot => "/api/v3/klines",
            MarketKind::Futures => "/fapi/v1/klines",
        }
    }

    /// Path of the depth endpoint on this market's REST API.
    pub fn depth_path(&self) -> &'static str {
        match self {
            MarketKind::Spot => "/api/v3/depth",
            MarketKind::Futures => "/fapi/v1/depth",
        }
    }
}
