use crate::error::ServerError;
use chrono::{DateTime, Utc};
use fundflow_analysis::{AnalysisMetadata, AnalysisReport, Interval};
use serde::{Deserialize, Serialize};

/// Client request frame, tagged by `type`.
///
/// ```json
/// {"type": "analyze", "symbols": ["BTCUSDT", "ETHUSDT"], "interval": "4h"}
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Symbols,
    Intervals,
    Health,
    Analyze {
        #[serde(default)]
        symbols: Vec<String>,
        #[serde(default)]
        interval: Interval,
    },
}

/// Request frame with an optional client chosen correlation `id`, echoed in the reply.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct RequestFrame {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(flatten)]
    pub request: ClientRequest,
}

/// Server reply frame.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct ReplyFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(flatten)]
    pub response: ServerResponse,
}

/// Outcome of a request, tagged by `status`.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServerResponse {
    Success { data: ResponseData },
    Error { code: u16, message: String },
}

impl From<ServerError> for ServerResponse {
    fn from(error: ServerError) -> Self {
        ServerResponse::Error {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl ServerResponse {
    pub fn success(data: impl Into<ResponseData>) -> Self {
        ServerResponse::Success { data: data.into() }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Symbols(Vec<String>),
    Intervals(Vec<Interval>),
    Health(HealthStatus),
    Analysis(Box<AnalysisOutcome>),
}

impl From<Vec<String>> for ResponseData {
    fn from(value: Vec<String>) -> Self {
        ResponseData::Symbols(value)
    }
}

impl From<Vec<Interval>> for ResponseData {
    fn from(value: Vec<Interval>) -> Self {
        ResponseData::Intervals(value)
    }
}

impl From<HealthStatus> for ResponseData {
    fn from(value: HealthStatus) -> Self {
        ResponseData::Health(value)
    }
}

impl From<AnalysisOutcome> for ResponseData {
    fn from(value: AnalysisOutcome) -> Self {
        ResponseData::Analysis(Box::new(value))
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct HealthStatus {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of an `analyze` request.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct AnalysisOutcome {
    pub raw_analysis: AnalysisReport,
    /// `None` when the narrative provider failed, see `narrative_error`
    pub ai_interpretation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative_error: Option<String>,
    pub metadata: OutcomeMetadata,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct OutcomeMetadata {
    #[serde(flatten)]
    pub analysis: AnalysisMetadata,
    /// Wall clock seconds spent serving the request
    pub duration: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_request_frame() {
        struct TestCase {
            input: &'static str,
            expected: Option<RequestFrame>,
        }

        let tests = vec![
            TestCase {
                // TC0: symbols
                input: r#"{"type":"symbols"}"#,
                expected: Some(RequestFrame {
                    id: None,
                    request: ClientRequest::Symbols,
                }),
            },
            TestCase {
                // TC1: health w/ id
                input: r#"{"type":"health","id":7}"#,
                expected: Some(RequestFrame {
                    id: Some(serde_json::json!(7)),
                    request: ClientRequest::Health,
                }),
            },
            TestCase {
                // TC2: analyze w/ explicit interval
                input: r#"{"type":"analyze","symbols":["BTCUSDT"],"interval":"4h"}"#,
                expected: Some(RequestFrame {
                    id: None,
                    request: ClientRequest::Analyze {
                        symbols: vec!["BTCUSDT".to_string()],
                        interval: Interval::H4,
                    },
                }),
            },
            TestCase {
                // TC3: analyze w/ default interval and no symbols
                input: r#"{"type":"analyze"}"#,
                expected: Some(RequestFrame {
                    id: None,
                    request: ClientRequest::Analyze {
                        symbols: vec![],
                        interval: Interval::H1,
                    },
                }),
            },
            TestCase {
                // TC4: unsupported interval
                input: r#"{"type":"analyze","symbols":["BTCUSDT"],"interval":"2h"}"#,
                expected: None,
            },
            TestCase {
                // TC5: unknown type
                input: r#"{"type":"subscribe"}"#,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<RequestFrame>(test.input).ok();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_ser_reply_frame() {
        let success = ReplyFrame {
            id: Some(serde_json::json!("abc")),
            response: ServerResponse::success(vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]),
        };
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            serde_json::json!({"id": "abc", "status": "success", "data": ["BTCUSDT", "ETHUSDT"]})
        );

        let error = ReplyFrame {
            id: None,
            response: ServerResponse::from(ServerError::Busy),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "status": "error",
                "code": 429,
                "message": "an analysis is already in progress, please retry once it completes"
            })
        );

        let intervals = ServerResponse::success(Interval::ALL.to_vec());
        assert_eq!(
            serde_json::to_value(&intervals).unwrap()["data"],
            serde_json::json!(["5m", "15m", "30m", "1h", "4h", "1d"])
        );
    }
}
