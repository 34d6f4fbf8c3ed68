//! Natural-language interpretation of an [`AnalysisReport`].
//!
//! The report is embedded in a prompt tuned to the candle interval and sent to an
//! OpenAI-compatible chat-completions endpoint (DeepSeek by default).

use async_trait::async_trait;
use fundflow_analysis::{AnalysisReport, Interval};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_API_KEY_VAR: &str = "DEEPSEEK_API_KEY";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// All errors generated while producing a narrative.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrativeError {
    #[error("API key not set, export {0}")]
    MissingApiKey(String),

    #[error("invalid endpoint url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP error {status} from narrative provider")]
    Status { status: u16 },

    #[error("expected a JSON response, received content type {0:?}")]
    UnexpectedContentType(String),

    #[error("failed to encode or decode payload: {0}")]
    Decode(String),

    #[error("response contained no choices")]
    EmptyChoices,
}

impl From<reqwest::Error> for NarrativeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

/// Produces a narrative interpretation of an analysis report.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn interpret(
        &self,
        report: &AnalysisReport,
        interval: Interval,
    ) -> Result<String, NarrativeError>;
}

/// Interval dependent framing of the trading advice requested in the prompt.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IntervalSettings {
    pub forecast_period: &'static str,
    pub trade_horizon: &'static str,
    pub stop_loss_range: &'static str,
    pub analysis_depth: &'static str,
    pub position_sizing: &'static str,
}

impl IntervalSettings {
    pub fn for_interval(interval: Interval) -> Self {
        match interval {
            Interval::M5 => Self {
                forecast_period: "the next 2-6 hours",
                trade_horizon: "short term trades (within hours)",
                stop_loss_range: "tight (0.5%-1.5%)",
                analysis_depth: "micro market structure and short-term swings",
                position_sizing: "small positions (5%-15%)",
            },
            Interval::M15 => Self {
                forecast_period: "the next 6-12 hours",
                trade_horizon: "short to mid-short term trades (half a day to 1 day)",
                stop_loss_range: "small to medium (1%-2%)",
                analysis_depth: "short-term trend and support/resistance levels",
                position_sizing: "small to medium positions (10%-20%)",
            },
            Interval::M30 => Self {
                forecast_period: "the next 12-24 hours",
                trade_horizon: "mid-short term trades (1-2 days)",
                stop_loss_range: "medium (1.5%-3%)",
                analysis_depth: "intraday trend and key price zones",
                position_sizing: "medium positions (15%-25%)",
            },
            Interval::H1 => Self {
                forecast_period: "the next 1-3 days",
                trade_horizon: "mid term trades (2-5 days)",
                stop_loss_range: "medium (2%-4%)",
                analysis_depth: "mid-term trend and market structure shifts",
                position_sizing: "medium positions (20%-30%)",
            },
            Interval::H4 => Self {
                forecast_period: "the next 3-7 days",
                trade_horizon: "mid to long term trades (1-2 weeks)",
                stop_loss_range: "medium to wide (3%-6%)",
                analysis_depth: "mid to long-term trend and market cycles",
                position_sizing: "medium to large positions (25%-40%)",
            },
            Interval::D1 => Self {
                forecast_period: "the next 1-4 weeks",
                trade_horizon: "long term trades (2 weeks to 1 month)",
                stop_loss_range: "wide (5%-10%)",
                analysis_depth: "long-term trend, market cycles and macro drivers",
                position_sizing: "large positions or staged entries (30%-50%)",
            },
        }
    }
}

/// Render the prompt sent to the narrative provider.
pub fn build_prompt(report: &AnalysisReport, interval: Interval) -> Result<String, NarrativeError> {
    let settings = IntervalSettings::for_interval(interval);
    let data =
        serde_json::to_string_pretty(report).map_err(|error| NarrativeError::Decode(error.to_string()))?;
    let count = report.metadata.klines_count;

    Ok(format!(
        "## Binance fund flow analysis ({interval} candles)\n\n\
         Below is fund flow data for the last {count} closed {interval} candles on the Binance \
         spot and futures markets (the latest unfinished candle is excluded), covering:\n\
         - fund flow trend per symbol\n\
         - price stage (top, bottom, rising, falling, consolidating)\n\
         - order book imbalance\n\
         - fund pressure\n\
         - anomalous trading activity\n\n\
         Analyse it as a professional trader would, focusing on the {interval} timeframe:\n\n\
         1. **Major player behaviour**\n\
         \x20  - Identify accumulation or distribution from changes in the fund flow trend\n\
         \x20  - Use the order book to infer intent (accumulation, distribution, shakeouts)\n\
         \x20  - Highlight mismatches between fund flow and price\n\
         \x20  - Focus on {depth}\n\n\
         2. **Price stage**\n\
         \x20  - State the stage of each symbol with confidence and evidence\n\
         \x20  - Compare symbols and note possible rotation\n\n\
         3. **Outlook**\n\
         \x20  - Forecast the likely price path over {forecast}\n\
         \x20  - Call out reversal or continuation signals and price targets\n\n\
         4. **Trading plan**\n\
         \x20  - Give a concrete stance per symbol (wait, long, short, reduce)\n\
         \x20  - Suggest entries and stops suited to {horizon}\n\
         \x20  - Stop-loss range: {stop_loss}\n\
         \x20  - Position sizing: {sizing}\n\
         \x20  - Assess risk versus reward\n\n\
         Be concise and specific. Data:\n\n\
         {data}\n\n\
         Reply in markdown, highlight key points and use tables for comparisons.",
        depth = settings.analysis_depth,
        forecast = settings.forecast_period,
        horizon = settings.trade_horizon,
        stop_loss = settings.stop_loss_range,
        sizing = settings.position_sizing,
    ))
}

/// Configuration of a [`ChatCompletionsClient`].
#[derive(Clone, PartialEq, Debug)]
pub struct NarrativeConfig {
    pub api_url: String,
    pub model: String,
    /// Environment variable holding the bearer token, read on every call
    pub api_key_var: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl NarrativeConfig {
    /// Build a config from `DEEPSEEK_API_URL` and `DEEPSEEK_MODEL`.
    pub fn from_env() -> Result<Self, NarrativeError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DEEPSEEK_API_URL") {
            config = config.with_api_url(&url)?;
        }
        if let Ok(model) = std::env::var("DEEPSEEK_MODEL") {
            config = config.with_model(model);
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, url: &str) -> Result<Self, NarrativeError> {
        Url::parse(url).map_err(|error| NarrativeError::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        })?;
        self.api_url = url.to_string();
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key_var(mut self, api_key_var: impl Into<String>) -> Self {
        self.api_key_var = api_key_var.into();
        self
    }

    pub fn api_key(&self) -> Result<String, NarrativeError> {
        std::env::var(&self.api_key_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| NarrativeError::MissingApiKey(self.api_key_var.clone()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

/// Extract the first choice's content from a chat-completions response body.
fn parse_completion(body: &str) -> Result<String, NarrativeError> {
    serde_json::from_str::<ChatResponse>(body)
        .map_err(|error| NarrativeError::Decode(error.to_string()))?
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(NarrativeError::EmptyChoices)
}

/// [`NarrativeGenerator`] backed by an OpenAI-compatible chat-completions API.
#[derive(Clone, Debug)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    config: NarrativeConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: NarrativeConfig) -> Result<Self, NarrativeError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionsClient {
    async fn interpret(
        &self,
        report: &AnalysisReport,
        interval: Interval,
    ) -> Result<String, NarrativeError> {
        let api_key = self.config.api_key()?;
        let prompt = build_prompt(report, interval)?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        info!(model = %self.config.model, %interval, "requesting narrative");
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NarrativeError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("application/json") {
            return Err(NarrativeError::UnexpectedContentType(content_type));
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "received narrative response");
        parse_completion(&body)
    }
}
