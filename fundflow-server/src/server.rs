use crate::{
    config::{ServerConfig, normalise_symbols},
    error::ServerError,
    gate::AnalysisGate,
    message::{
        AnalysisOutcome, ClientRequest, HealthStatus, OutcomeMetadata, ReplyFrame, RequestFrame,
        ServerResponse,
    },
    narrative::NarrativeGenerator,
    pipeline::{AnalysisRequest, run_analysis},
};
use chrono::Utc;
use fundflow_analysis::{Interval, format_number};
use fundflow_data::MarketDataSource;
use futures::{SinkExt, Stream, StreamExt};
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinSet,
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, info, warn};

/// Shared collaborators of every connection.
pub struct AppState {
    pub source: Arc<dyn MarketDataSource>,
    pub narrator: Arc<dyn NarrativeGenerator>,
    pub gate: AnalysisGate,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        narrator: Arc<dyn NarrativeGenerator>,
        config: ServerConfig,
    ) -> Self {
        Self {
            source,
            narrator,
            gate: AnalysisGate::new(config.max_concurrent_jobs),
            config,
        }
    }
}

/// Serve one decoded request.
pub async fn dispatch(state: &AppState, request: ClientRequest) -> ServerResponse {
    match request {
        ClientRequest::Symbols => ServerResponse::success(state.config.default_symbols.clone()),
        ClientRequest::Intervals => ServerResponse::success(Interval::ALL.to_vec()),
        ClientRequest::Health => ServerResponse::success(HealthStatus {
            message: "fundflow analysis service is running".to_string(),
            timestamp: Utc::now(),
        }),
        ClientRequest::Analyze { symbols, interval } => {
            match analyze(state, symbols, interval).await {
                Ok(outcome) => ServerResponse::success(outcome),
                Err(error) => {
                    error!(
                        %error,
                        code = error.code(),
                        transient = error.is_transient(),
                        "analysis request failed"
                    );
                    ServerResponse::from(error)
                }
            }
        }
    }
}

async fn analyze(
    state: &AppState,
    symbols: Vec<String>,
    interval: Interval,
) -> Result<AnalysisOutcome, ServerError> {
    let symbols = normalise_symbols(symbols);
    if symbols.is_empty() {
        return Err(ServerError::InvalidRequest("no symbols provided".to_string()));
    }

    let _permit = state.gate.try_enter()?;
    let started = Instant::now();
    info!(symbols = ?symbols, %interval, "starting analysis");

    let request = AnalysisRequest {
        symbols,
        interval,
        klines_limit: state.config.klines_limit,
        depth_limit: state.config.depth_limit,
    };
    let report = run_analysis(state.source.as_ref(), &request, &state.config.analysis).await?;

    info!("requesting narrative interpretation");
    let (ai_interpretation, narrative_error) =
        match state.narrator.interpret(&report, interval).await {
            Ok(narrative) => (Some(narrative), None),
            Err(error) => {
                warn!(%error, "narrative unavailable, returning raw analysis only");
                (None, Some(ServerError::from(error).to_string()))
            }
        };

    let duration = started.elapsed().as_secs_f64();
    info!(duration = %format_number(duration), "analysis finished");

    Ok(AnalysisOutcome {
        metadata: OutcomeMetadata {
            analysis: report.metadata.clone(),
            duration,
        },
        raw_analysis: report,
        ai_interpretation,
        narrative_error,
    })
}

/// Decode a text frame and serve it.
pub async fn handle_text(state: &AppState, text: &str) -> ReplyFrame {
    match serde_json::from_str::<RequestFrame>(text) {
        Ok(frame) => ReplyFrame {
            id: frame.id,
            response: dispatch(state, frame.request).await,
        },
        Err(error) => {
            debug!(%error, "rejecting malformed request");
            ReplyFrame {
                id: None,
                response: ServerResponse::from(ServerError::InvalidRequest(error.to_string())),
            }
        }
    }
}

/// Accept WebSocket clients until the listener fails.
pub async fn start_websocket_server(
    addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|error| ServerError::Bind {
            addr: addr.to_string(),
            reason: error.to_string(),
        })?;

    info!("WebSocket server bound to {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        info!("New WebSocket connection from {}", peer_addr);
        tokio::spawn(handle_client(stream, peer_addr, Arc::clone(&state)));
    }

    Ok(())
}

/// Serve the frames of one connection until the client goes away.
///
/// Each text frame is handled on its own task so a long analysis never blocks a
/// health check. Tasks still running when the connection ends are aborted, which
/// releases any [`AnalysisPermit`](crate::gate::AnalysisPermit) they hold.
async fn serve_requests<S>(
    state: Arc<AppState>,
    peer_addr: SocketAddr,
    mut incoming: S,
    replies: mpsc::UnboundedSender<ReplyFrame>,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let mut requests = JoinSet::new();

    loop {
        tokio::select! {
            msg = incoming.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    debug!("Received text from {}: {}", peer_addr, text);
                    let state = Arc::clone(&state);
                    let replies = replies.clone();
                    requests.spawn(async move {
                        let reply = handle_text(&state, text.as_str()).await;
                        let _ = replies.send(reply);
                    });
                }
                Some(Ok(Message::Ping(_))) => {
                    debug!("Received ping from {}", peer_addr);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    error!("WebSocket error for {}: {}", peer_addr, e);
                    break;
                }
                Some(Ok(_)) => {}
            },
            Some(_) = requests.join_next(), if !requests.is_empty() => {}
        }
    }

    if !requests.is_empty() {
        info!(
            pending = requests.len(),
            "Aborting unfinished requests for {}", peer_addr
        );
    }
    requests.shutdown().await;
}

/// Handle individual WebSocket client connection
async fn handle_client(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", peer_addr, e);
            return;
        }
    };

    info!("WebSocket handshake completed for {}", peer_addr);

    let (mut ws_sender, ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ReplyFrame>();

    let welcome = serde_json::json!({
        "type": "welcome",
        "message": "Connected to fundflow analysis service",
        "timestamp": Utc::now()
    });
    if let Ok(msg) = serde_json::to_string(&welcome) {
        let _ = ws_sender.send(Message::Text(msg.into())).await;
    }

    // Replies are written by one task so long analyses never block health checks
    let mut send_task = tokio::spawn(async move {
        while let Some(reply) = rx.recv().await {
            match serde_json::to_string(&reply) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to serialise reply for {}: {}", peer_addr, e),
            }
        }
    });

    let mut recv_task = tokio::spawn(serve_requests(state, peer_addr, ws_receiver, tx));

    tokio::select! {
        _ = &mut send_task => {
            info!("Send task completed for {}", peer_addr);
            recv_task.abort();
        }
        _ = &mut recv_task => {
            info!("Receive task completed for {}", peer_addr);
            send_task.abort();
        }
    }

    info!("WebSocket connection closed for {}", peer_addr);
}
