//! Gateway client
//!
//! Binds the session state machine to a live WebSocket connection and
//! supervises reconnection: one session per connection, exponential backoff
//! between failed starts, resume data carried across sessions.

use crate::error::{DecodeError, GatewayError};
use crate::frame::{FrameDecoder, TransportFrame};
use crate::protocol::{
    codec, CloseCode, GatewayMessage, RequestGuildMembersPayload, StatusUpdatePayload,
    VoiceStateUpdatePayload,
};
use crate::session::{GatewaySession, ResumeData, SessionOutcome};
use crate::settings::GatewaySettings;
use beacon_common::{AppConfig, GatewayConfig, ReconnectConfig};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Buffer for decoded inbound messages ahead of the state machine
const INBOUND_BUFFER: usize = 64;

/// Buffer for control messages from the state machine
const OUTBOUND_BUFFER: usize = 16;

/// Buffer for application-submitted sends
const APP_SEND_BUFFER: usize = 16;

/// Handle for submitting outbound messages from the application
///
/// Submissions are merged with the state machine's control messages ahead of
/// the codec; ordering is preserved within each producer but not between
/// them.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<GatewayMessage>,
}

impl GatewayHandle {
    /// Submit a message for sending
    ///
    /// # Errors
    ///
    /// Returns `AbruptTermination` if the client has shut down.
    pub async fn send(&self, message: GatewayMessage) -> Result<(), GatewayError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| GatewayError::AbruptTermination)
    }

    /// Update the client's presence
    ///
    /// # Errors
    ///
    /// Returns `AbruptTermination` if the client has shut down.
    pub async fn update_status(&self, presence: StatusUpdatePayload) -> Result<(), GatewayError> {
        self.send(GatewayMessage::StatusUpdate(presence)).await
    }

    /// Join, move, or leave a voice channel
    ///
    /// # Errors
    ///
    /// Returns `AbruptTermination` if the client has shut down.
    pub async fn update_voice_state(
        &self,
        payload: VoiceStateUpdatePayload,
    ) -> Result<(), GatewayError> {
        self.send(GatewayMessage::VoiceStateUpdate(payload)).await
    }

    /// Request guild member chunks
    ///
    /// # Errors
    ///
    /// Returns `AbruptTermination` if the client has shut down.
    pub async fn request_guild_members(
        &self,
        payload: RequestGuildMembersPayload,
    ) -> Result<(), GatewayError> {
        self.send(GatewayMessage::RequestGuildMembers(payload)).await
    }
}

/// What one connection attempt produced
struct SessionRun {
    outcome: Result<SessionOutcome, GatewayError>,
    started: bool,
    close_code: Option<CloseCode>,
}

/// Gateway client with automatic reconnection
pub struct GatewayClient {
    settings: GatewaySettings,
    url: String,
    log_received_ws: bool,
    log_sent_ws: bool,
    reconnect: ReconnectConfig,
    app_rx: mpsc::Receiver<GatewayMessage>,
}

impl GatewayClient {
    /// Create a client from loaded configuration
    #[must_use]
    pub fn new(config: &AppConfig) -> (Self, GatewayHandle) {
        Self::with_settings(
            GatewaySettings::from_config(&config.gateway),
            &config.gateway,
            config.reconnect.clone(),
        )
    }

    /// Create a client from explicit settings
    #[must_use]
    pub fn with_settings(
        settings: GatewaySettings,
        gateway: &GatewayConfig,
        reconnect: ReconnectConfig,
    ) -> (Self, GatewayHandle) {
        let (tx, rx) = mpsc::channel(APP_SEND_BUFFER);

        (
            Self {
                settings,
                url: gateway.url.clone(),
                log_received_ws: gateway.log_received_ws,
                log_sent_ws: gateway.log_sent_ws,
                reconnect,
                app_rx: rx,
            },
            GatewayHandle { tx },
        )
    }

    /// Run sessions until the gateway refuses the client outright
    ///
    /// Every inbound message of every session is forwarded to `dispatch_tx`
    /// in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Closed` when the server closes with a code that
    /// makes retrying pointless (bad token, bad shard tuple, bad intents).
    pub async fn run(
        mut self,
        dispatch_tx: mpsc::Sender<GatewayMessage>,
    ) -> Result<(), GatewayError> {
        let mut resume: Option<ResumeData> = None;
        let mut attempt: u32 = 0;

        loop {
            match self.run_once(resume.take(), dispatch_tx.clone()).await {
                Ok(run) => {
                    if run.started {
                        attempt = 0;
                    }

                    if let Some(code) = run.close_code {
                        if !code.should_reconnect() {
                            error!(close_code = %code, "gateway refused the session; giving up");
                            return Err(GatewayError::Closed(code));
                        }
                    }

                    match run.outcome {
                        Ok(outcome) => {
                            resume = outcome.resume;
                            if let Some(code) = run.close_code {
                                if !code.can_resume() {
                                    resume = None;
                                }
                            }

                            if outcome.wait {
                                let delay = self.reconnect.invalid_session_delay();
                                info!(
                                    delay_ms = delay.as_millis() as u64,
                                    "delaying reconnect after invalid session"
                                );
                                tokio::time::sleep(delay).await;
                            }

                            if !run.started {
                                let delay = self.reconnect.delay_for_attempt(attempt);
                                attempt += 1;
                                tokio::time::sleep(delay).await;
                            }
                        }
                        Err(error) => {
                            warn!(error = %error, "session failed");
                            let delay = self.reconnect.delay_for_attempt(attempt);
                            attempt += 1;
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
                Err(error) => {
                    warn!(error = %error, "connection attempt failed");
                    let delay = self.reconnect.delay_for_attempt(attempt);
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }

            info!(resuming = resume.is_some(), "reconnecting to the gateway");
        }
    }

    /// Connect once and drive a single session to completion
    async fn run_once(
        &mut self,
        resume: Option<ResumeData>,
        dispatch_tx: mpsc::Sender<GatewayMessage>,
    ) -> Result<SessionRun, GatewayError> {
        info!(url = %self.url, resuming = resume.is_some(), "connecting to gateway");

        let (ws, _) = connect_async(&self.url)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (control_tx, mut control_rx) = mpsc::channel(OUTBOUND_BUFFER);

        let (session, mut handles) =
            GatewaySession::new(self.settings.clone(), resume, control_tx, dispatch_tx);
        let machine = tokio::spawn(session.run(inbound_rx));

        // Reader: transport frames through the frame adapter into the machine
        let decoder = FrameDecoder::new(self.log_received_ws);
        let reader = tokio::spawn(async move {
            let mut close_code = None;

            while let Some(frame) = stream.next().await {
                let item = match frame {
                    Ok(Message::Text(text)) => {
                        match decoder.decode(TransportFrame::Text(text)) {
                            // Unknown opcodes are skipped, not fatal
                            Err(DecodeError::UnknownOp(op)) => {
                                debug!(op, "ignoring unknown opcode");
                                continue;
                            }
                            result => result.map_err(GatewayError::Decode),
                        }
                    }
                    Ok(Message::Binary(bytes)) => {
                        match decoder.decode(TransportFrame::Binary(bytes)) {
                            Err(DecodeError::UnknownOp(op)) => {
                                debug!(op, "ignoring unknown opcode");
                                continue;
                            }
                            result => result.map_err(GatewayError::Decode),
                        }
                    }
                    Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                    Ok(Message::Close(frame)) => {
                        close_code = frame.and_then(|f| CloseCode::from_u16(f.code.into()));
                        if let Some(code) = close_code {
                            warn!(close_code = %code, "server closed the connection");
                        }
                        break;
                    }
                    Err(e) => Err(GatewayError::Transport(e.to_string())),
                };

                let failed = item.is_err();
                if inbound_tx.send(item).await.is_err() || failed {
                    break;
                }
            }

            close_code
        });

        // Fan-in writer: machine control messages merged with application
        // submissions; ends when the machine does
        let log_sent = self.log_sent_ws;
        let writer_result: Result<(), GatewayError> = async {
            let mut app_open = true;
            loop {
                tokio::select! {
                    // Control messages take priority over application sends
                    biased;

                    control = control_rx.recv() => match control {
                        Some(message) => send_frame(&mut sink, &message, log_sent).await?,
                        None => break,
                    },
                    app = self.app_rx.recv(), if app_open => match app {
                        Some(message) => send_frame(&mut sink, &message, log_sent).await?,
                        None => app_open = false,
                    },
                }
            }

            let _ = sink.close().await;
            Ok(())
        }
        .await;

        if let Err(error) = writer_result {
            error!(error = %error, "outbound writer failed");
            machine.abort();
            reader.abort();
            return Err(error);
        }

        // The writer only ends cleanly once the machine has terminated
        let outcome = handles.outcome.wait().await;
        let started = matches!(handles.started.try_wait(), Some(Ok(())));

        let close_code = if reader.is_finished() {
            reader.await.ok().flatten()
        } else {
            reader.abort();
            None
        };

        let _ = machine.await;

        debug!(started, "session ended");
        Ok(SessionRun {
            outcome,
            started,
            close_code,
        })
    }
}

/// Encode and send one frame; the client always sends text
async fn send_frame(
    sink: &mut WsSink,
    message: &GatewayMessage,
    log_sent: bool,
) -> Result<(), GatewayError> {
    let text = codec::encode(message).map_err(GatewayError::Encode)?;

    if log_sent {
        debug!(raw = %text, "gateway frame sent");
    }

    sink.send(Message::Text(text))
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))
}
