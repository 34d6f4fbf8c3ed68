use crate::{gate::DEFAULT_MAX_CONCURRENT_JOBS, pipeline::DEFAULT_DEPTH_LIMIT};
use fundflow_analysis::{AnalysisConfig, report::DEFAULT_KLINES_COUNT};
use std::{net::SocketAddr, str::FromStr};
use tracing::warn;

pub const DEFAULT_SYMBOLS: [&str; 2] = ["BTCUSDT", "ETHUSDT"];

/// Runtime configuration of the analysis server.
#[derive(Clone, PartialEq, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub max_concurrent_jobs: usize,
    pub klines_limit: usize,
    pub depth_limit: usize,
    pub default_symbols: Vec<String>,
    pub analysis: AnalysisConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 9002)),
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            klines_limit: DEFAULT_KLINES_COUNT,
            depth_limit: DEFAULT_DEPTH_LIMIT,
            default_symbols: DEFAULT_SYMBOLS.iter().map(|symbol| symbol.to_string()).collect(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build a config from `FUNDFLOW_*` environment variables.
    ///
    /// Unset variables use defaults, unparsable ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var(&lookup, "FUNDFLOW_ADDR") {
            config.addr = addr;
        }
        if let Some(max_jobs) = parse_var(&lookup, "FUNDFLOW_MAX_JOBS") {
            config = config.with_max_concurrent_jobs(max_jobs);
        }
        if let Some(limit) = parse_var(&lookup, "FUNDFLOW_KLINES_LIMIT") {
            config = config.with_klines_limit(limit);
        }
        if let Some(limit) = parse_var(&lookup, "FUNDFLOW_DEPTH_LIMIT") {
            config = config.with_depth_limit(limit);
        }
        if let Some(symbols) = lookup("FUNDFLOW_SYMBOLS") {
            config = config.with_default_symbols(symbols.split(','));
        }

        config
    }

    pub fn with_max_concurrent_jobs(mut self, max_concurrent_jobs: usize) -> Self {
        self.max_concurrent_jobs = max_concurrent_jobs.max(1);
        self
    }

    pub fn with_klines_limit(mut self, klines_limit: usize) -> Self {
        self.klines_limit = klines_limit.max(1);
        self
    }

    pub fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = depth_limit.max(1);
        self
    }

    /// Replace the default symbols, ignoring blanks. An empty result keeps the current list.
    pub fn with_default_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = normalise_symbols(symbols);
        if !symbols.is_empty() {
            self.default_symbols = symbols;
        }
        self
    }
}

/// Trim, uppercase and de-duplicate symbols, preserving first-seen order.
pub fn normalise_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalised = Vec::new();
    for symbol in symbols {
        let symbol = symbol.as_ref().trim().to_uppercase();
        if !symbol.is_empty() && !normalised.contains(&symbol) {
            normalised.push(symbol);
        }
    }
    normalised
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment variable");
            None
        }
    }
}
