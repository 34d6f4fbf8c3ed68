use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use thiserror::Error;

/// Candle interval supported by the analysis service.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Display)]
pub enum Interval {
    #[display("5m")]
    M5,
    #[display("15m")]
    M15,
    #[display("30m")]
    M30,
    #[default]
    #[display("1h")]
    H1,
    #[display("4h")]
    H4,
    #[display("1d")]
    D1,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported candle interval: {0}")]
pub struct IntervalParseError(pub String);

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H4,
        Interval::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
        }
    }
}

impl FromStr for Interval {
    type Err = IntervalParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalised = input.trim().to_lowercase();
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == normalised)
            .ok_or_else(|| IntervalParseError(input.to_string()))
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
