//! Session state machine
//!
//! Consumes decoded inbound gateway messages, reacts per opcode, emits
//! outbound control messages, forwards every inbound message to the dispatch
//! sink, and completes with a resume-eligibility verdict.
//!
//! All state mutation happens on the stage's own task; the only cross-task
//! signals are the two completion handles, each written exactly once.

use crate::error::GatewayError;
use crate::events::DispatchEvent;
use crate::protocol::{GatewayMessage, ResumePayload};
use crate::session::handles::{completion_pair, CompletionSlot, SessionHandles, SessionOutcome};
use crate::session::state::{ResumeData, SessionState};
use crate::settings::GatewaySettings;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Whether the stage keeps running after a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

/// The gateway session state machine
///
/// One logical inbound port and two outbound ports (control and dispatch)
/// with independent demand. Both outputs are bounded channels, so a slow
/// consumer stalls the stage instead of buffering unboundedly.
pub struct GatewaySession {
    settings: GatewaySettings,
    state: SessionState,
    outbound: mpsc::Sender<GatewayMessage>,
    dispatch: mpsc::Sender<GatewayMessage>,
    outcome_slot: CompletionSlot<Result<SessionOutcome, GatewayError>>,
    started_slot: CompletionSlot<Result<(), GatewayError>>,
    hello_seen: bool,
}

impl GatewaySession {
    /// Create a session stage and the handles its supervisor observes
    pub fn new(
        settings: GatewaySettings,
        resume: Option<ResumeData>,
        outbound: mpsc::Sender<GatewayMessage>,
        dispatch: mpsc::Sender<GatewayMessage>,
    ) -> (Self, SessionHandles) {
        let (outcome_slot, started_slot, handles) = completion_pair();

        (
            Self {
                settings,
                state: SessionState::new(resume),
                outbound,
                dispatch,
                outcome_slot,
                started_slot,
                hello_seen: false,
            },
            handles,
        )
    }

    /// Run the stage to completion
    ///
    /// Inbound messages are processed strictly in arrival order; any control
    /// emission produced by a message is scheduled before the next message is
    /// pulled. The heartbeat timer only exists after Hello has been handled.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Result<GatewayMessage, GatewayError>>) {
        let mut heartbeat: Option<Interval> = None;

        loop {
            let flow = tokio::select! {
                biased;

                _ = next_tick(&mut heartbeat), if heartbeat.is_some() => {
                    self.heartbeat_tick().await
                }

                message = inbound.recv() => match message {
                    Some(Ok(message)) => self.handle_message(message, &mut heartbeat).await,
                    Some(Err(error)) => {
                        warn!(error = %error, "inbound stream failed");
                        self.fail(error)
                    }
                    None => {
                        debug!("inbound stream ended cleanly");
                        let resume = self.state.resume.clone();
                        self.complete(SessionOutcome { resume, wait: false })
                    }
                },
            };

            if flow == Flow::Done {
                break;
            }
        }
    }

    /// React to one inbound message, then tee it to the dispatch sink
    async fn handle_message(
        &mut self,
        message: GatewayMessage,
        heartbeat: &mut Option<Interval>,
    ) -> Flow {
        let flow = self.react(&message, heartbeat).await;

        if flow == Flow::Done {
            // Terminal reactions still forward the message downstream
            let _ = self.dispatch.send(message).await;
            return Flow::Done;
        }

        match self.dispatch.send(message).await {
            Ok(()) => Flow::Continue,
            Err(_) => {
                debug!("dispatch sink dropped; ending session");
                let resume = self.state.resume.clone();
                self.complete(SessionOutcome { resume, wait: false })
            }
        }
    }

    async fn react(
        &mut self,
        message: &GatewayMessage,
        heartbeat: &mut Option<Interval>,
    ) -> Flow {
        match message {
            GatewayMessage::Hello(hello) => {
                if self.hello_seen {
                    debug!("duplicate hello; restarting heartbeat timer only");
                } else {
                    let reply = match self.state.resume.clone() {
                        Some(prior) => GatewayMessage::Resume(ResumePayload {
                            token: prior.token,
                            session_id: prior.session_id,
                            seq: prior.seq,
                        }),
                        None => GatewayMessage::Identify(self.settings.identify()),
                    };
                    if self.send_control(reply).await == Flow::Done {
                        return Flow::Done;
                    }
                    self.hello_seen = true;
                }

                // Permit the immediate first tick to send
                self.state.ack_heartbeat();

                let mut interval =
                    time::interval(Duration::from_millis(hello.heartbeat_interval));
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                *heartbeat = Some(interval);
                Flow::Continue
            }
            GatewayMessage::Dispatch { seq, event } => {
                self.handle_dispatch(*seq, event);
                Flow::Continue
            }
            // The server may demand a heartbeat out of cadence
            GatewayMessage::Heartbeat(_) => self.heartbeat_tick().await,
            GatewayMessage::HeartbeatAck => {
                self.state.ack_heartbeat();
                Flow::Continue
            }
            GatewayMessage::Reconnect => {
                debug!("server requested reconnect");
                let resume = self.state.resume.clone();
                self.complete(SessionOutcome { resume, wait: false })
            }
            GatewayMessage::InvalidSession { resumable } => {
                warn!(resumable, "server invalidated the session");
                let resume = if *resumable {
                    self.state.resume.clone()
                } else {
                    None
                };
                self.complete(SessionOutcome { resume, wait: true })
            }
            // Client-side opcodes looped back inbound carry no control meaning
            _ => Flow::Continue,
        }
    }

    fn handle_dispatch(&mut self, seq: u64, event: &DispatchEvent) {
        if !self.hello_seen {
            warn!(seq, "dispatch received before hello; not tracked");
            return;
        }

        match event {
            DispatchEvent::Ready(ready) => {
                self.started_slot.complete(Ok(()));
                match &ready.session_id {
                    Some(session_id) => {
                        debug!(session_id = %session_id, seq, "session ready");
                        self.state.resume = Some(ResumeData {
                            token: self.settings.token.clone(),
                            session_id: session_id.clone(),
                            seq,
                        });
                    }
                    None => {
                        warn!("READY carried no session id; session will not be resumable");
                        self.state.resume = None;
                    }
                }
            }
            DispatchEvent::Resumed => {
                debug!(seq, "session resumed");
                self.started_slot.complete(Ok(()));
                self.state.record_dispatch(seq);
            }
            DispatchEvent::Other { .. } => self.state.record_dispatch(seq),
        }
    }

    /// One heartbeat tick: send if the previous round trip completed,
    /// otherwise the peer is gone
    async fn heartbeat_tick(&mut self) -> Flow {
        if self.state.heartbeat_acked {
            let seq = self.state.seq();
            self.state.await_heartbeat_ack();
            self.send_control(GatewayMessage::Heartbeat(seq)).await
        } else {
            warn!("heartbeat was not acknowledged within one interval");
            self.fail(GatewayError::LivenessTimeout)
        }
    }

    async fn send_control(&mut self, message: GatewayMessage) -> Flow {
        if self.outbound.send(message).await.is_err() {
            return self.fail(GatewayError::AbruptTermination);
        }
        Flow::Continue
    }

    /// Terminate with an error on both handles
    fn fail(&mut self, error: GatewayError) -> Flow {
        self.outcome_slot.complete(Err(error.clone()));
        self.started_slot.complete(Err(error));
        Flow::Done
    }

    /// Terminate with a resume verdict
    fn complete(&mut self, outcome: SessionOutcome) -> Flow {
        self.outcome_slot.complete(Ok(outcome));
        Flow::Done
    }
}

/// Await the next tick of the timer, if one is scheduled
async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::events::ReadyEvent;
    use crate::protocol::HelloPayload;

    struct Harness {
        inbound: mpsc::Sender<Result<GatewayMessage, GatewayError>>,
        outbound: mpsc::Receiver<GatewayMessage>,
        dispatch: mpsc::Receiver<GatewayMessage>,
        handles: SessionHandles,
    }

    fn spawn_session(resume: Option<ResumeData>) -> Harness {
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let (outbound_tx, outbound_rx) = mpsc::channel(16);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(16);

        let (session, handles) = GatewaySession::new(
            GatewaySettings::new("tok"),
            resume,
            outbound_tx,
            dispatch_tx,
        );
        tokio::spawn(session.run(inbound_rx));

        Harness {
            inbound: inbound_tx,
            outbound: outbound_rx,
            dispatch: dispatch_rx,
            handles,
        }
    }

    fn hello(interval_ms: u64) -> GatewayMessage {
        GatewayMessage::Hello(HelloPayload::with_interval(interval_ms))
    }

    fn ready(seq: u64, session_id: &str) -> GatewayMessage {
        GatewayMessage::Dispatch {
            seq,
            event: DispatchEvent::Ready(ReadyEvent {
                session_id: Some(session_id.to_string()),
                ..ReadyEvent::default()
            }),
        }
    }

    fn event(seq: u64, name: &str) -> GatewayMessage {
        GatewayMessage::Dispatch {
            seq,
            event: DispatchEvent::Other {
                event_type: name.to_string(),
                data: serde_json::Value::Null,
            },
        }
    }

    fn resume_data(session_id: &str, seq: u64) -> ResumeData {
        ResumeData {
            token: "tok".to_string(),
            session_id: session_id.to_string(),
            seq,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_identify_then_immediate_heartbeat() {
        let mut h = spawn_session(None);
        h.inbound.send(Ok(hello(100))).await.unwrap();

        match h.outbound.recv().await.unwrap() {
            GatewayMessage::Identify(identify) => {
                assert_eq!(identify.token, "tok");
                assert_eq!(identify.shard, (0, 1));
            }
            other => panic!("expected Identify first, got {other}"),
        }

        // First heartbeat fires at zero delay and carries no sequence yet
        assert_eq!(
            h.outbound.recv().await.unwrap(),
            GatewayMessage::Heartbeat(None)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_on_reconnect() {
        let mut h = spawn_session(Some(resume_data("sid", 42)));
        h.inbound.send(Ok(hello(100))).await.unwrap();

        assert_eq!(
            h.outbound.recv().await.unwrap(),
            GatewayMessage::Resume(ResumePayload {
                token: "tok".to_string(),
                session_id: "sid".to_string(),
                seq: 42,
            })
        );
        assert_eq!(
            h.outbound.recv().await.unwrap(),
            GatewayMessage::Heartbeat(Some(42))
        );
    }

    #[tokio::test]
    async fn test_sequence_tracking() {
        let Harness {
            inbound,
            outbound: _outbound,
            dispatch: _dispatch,
            mut handles,
        } = spawn_session(None);

        inbound.send(Ok(hello(30_000))).await.unwrap();
        inbound.send(Ok(ready(1, "A"))).await.unwrap();
        inbound.send(Ok(event(2, "X"))).await.unwrap();
        inbound.send(Ok(event(3, "Y"))).await.unwrap();
        drop(inbound);

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, Some(resume_data("A", 3)));
        assert!(!outcome.wait);
        assert_eq!(handles.started.try_wait(), Some(Ok(())));
    }

    #[tokio::test]
    async fn test_invalid_session_unresumable_waits() {
        let Harness {
            inbound,
            outbound: _outbound,
            dispatch: _dispatch,
            handles,
        } = spawn_session(None);

        inbound.send(Ok(hello(30_000))).await.unwrap();
        inbound
            .send(Ok(GatewayMessage::InvalidSession { resumable: false }))
            .await
            .unwrap();

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, None);
        assert!(outcome.wait);
    }

    #[tokio::test]
    async fn test_invalid_session_resumable_keeps_resume_data() {
        let Harness {
            inbound,
            outbound: _outbound,
            dispatch: _dispatch,
            handles,
        } = spawn_session(None);

        inbound.send(Ok(hello(30_000))).await.unwrap();
        inbound.send(Ok(ready(4, "C"))).await.unwrap();
        inbound
            .send(Ok(GatewayMessage::InvalidSession { resumable: true }))
            .await
            .unwrap();

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, Some(resume_data("C", 4)));
        assert!(outcome.wait);
    }

    #[tokio::test]
    async fn test_reconnect_is_resumable_without_wait() {
        let Harness {
            inbound,
            outbound: _outbound,
            dispatch: _dispatch,
            handles,
        } = spawn_session(None);

        inbound.send(Ok(hello(30_000))).await.unwrap();
        inbound.send(Ok(ready(1, "B"))).await.unwrap();
        inbound.send(Ok(GatewayMessage::Reconnect)).await.unwrap();

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, Some(resume_data("B", 1)));
        assert!(!outcome.wait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_ack_fails_liveness() {
        let Harness {
            inbound,
            mut outbound,
            dispatch: _dispatch,
            handles,
        } = spawn_session(None);

        inbound.send(Ok(hello(50))).await.unwrap();

        assert!(matches!(
            outbound.recv().await.unwrap(),
            GatewayMessage::Identify(_)
        ));
        assert_eq!(
            outbound.recv().await.unwrap(),
            GatewayMessage::Heartbeat(None)
        );

        // No ack ever arrives; the next tick must end the session
        assert_eq!(
            handles.outcome.wait().await,
            Err(GatewayError::LivenessTimeout)
        );
        assert_eq!(
            handles.started.wait().await,
            Err(GatewayError::LivenessTimeout)
        );

        drop(inbound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acked_heartbeats_keep_the_session_alive() {
        let Harness {
            inbound,
            mut outbound,
            dispatch: _dispatch,
            mut handles,
        } = spawn_session(None);

        inbound.send(Ok(hello(50))).await.unwrap();
        assert!(matches!(
            outbound.recv().await.unwrap(),
            GatewayMessage::Identify(_)
        ));

        // Three full heartbeat round trips
        for _ in 0..3 {
            assert_eq!(
                outbound.recv().await.unwrap(),
                GatewayMessage::Heartbeat(None)
            );
            inbound.send(Ok(GatewayMessage::HeartbeatAck)).await.unwrap();
        }

        assert!(handles.started.try_wait().is_none());
        drop(inbound);

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, None);
        assert!(!outcome.wait);
    }

    #[tokio::test]
    async fn test_server_heartbeat_request_forces_a_send() {
        let Harness {
            inbound,
            mut outbound,
            dispatch: _dispatch,
            ..
        } = spawn_session(None);

        inbound.send(Ok(hello(30_000))).await.unwrap();
        assert!(matches!(
            outbound.recv().await.unwrap(),
            GatewayMessage::Identify(_)
        ));
        assert_eq!(
            outbound.recv().await.unwrap(),
            GatewayMessage::Heartbeat(None)
        );

        // Ack the first, then let the server demand one out of cadence
        inbound.send(Ok(GatewayMessage::HeartbeatAck)).await.unwrap();
        inbound.send(Ok(ready(9, "S"))).await.unwrap();
        inbound
            .send(Ok(GatewayMessage::Heartbeat(None)))
            .await
            .unwrap();

        assert_eq!(
            outbound.recv().await.unwrap(),
            GatewayMessage::Heartbeat(Some(9))
        );
    }

    #[tokio::test]
    async fn test_dispatch_sink_sees_every_message_in_order() {
        let Harness {
            inbound,
            outbound: _outbound,
            mut dispatch,
            handles,
        } = spawn_session(None);

        let trace = vec![
            hello(30_000),
            ready(1, "A"),
            GatewayMessage::HeartbeatAck,
            event(2, "X"),
            GatewayMessage::Reconnect,
        ];
        for message in &trace {
            inbound.send(Ok(message.clone())).await.unwrap();
        }

        for expected in &trace {
            assert_eq!(&dispatch.recv().await.unwrap(), expected);
        }

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, Some(resume_data("A", 2)));
    }

    #[tokio::test]
    async fn test_exactly_one_identify_per_session() {
        let Harness {
            inbound,
            mut outbound,
            dispatch: _dispatch,
            handles,
        } = spawn_session(None);

        inbound.send(Ok(hello(30_000))).await.unwrap();
        inbound.send(Ok(hello(30_000))).await.unwrap();
        drop(inbound);

        handles.outcome.wait().await.unwrap();

        let mut sent = Vec::new();
        while let Some(message) = outbound.recv().await {
            sent.push(message);
        }

        let identifies = sent
            .iter()
            .filter(|m| matches!(m, GatewayMessage::Identify(_)))
            .count();
        assert_eq!(identifies, 1);
        assert!(matches!(sent[0], GatewayMessage::Identify(_)));
    }

    #[tokio::test]
    async fn test_upstream_failure_fails_both_handles() {
        let Harness {
            inbound, handles, ..
        } = spawn_session(None);

        let failure = GatewayError::Decode(DecodeError::BadDispatch("missing sequence number"));
        inbound.send(Err(failure.clone())).await.unwrap();

        assert_eq!(handles.outcome.wait().await, Err(failure.clone()));
        assert_eq!(handles.started.wait().await, Err(failure));
    }

    #[tokio::test]
    async fn test_dropped_dispatch_sink_ends_the_session() {
        let Harness {
            inbound,
            outbound: _outbound,
            dispatch,
            handles,
        } = spawn_session(None);

        drop(dispatch);
        inbound.send(Ok(hello(30_000))).await.unwrap();

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, None);
        assert!(!outcome.wait);
    }

    #[tokio::test]
    async fn test_dropped_outbound_is_abrupt_termination() {
        let Harness {
            inbound,
            outbound,
            dispatch: _dispatch,
            handles,
        } = spawn_session(None);

        drop(outbound);
        inbound.send(Ok(hello(30_000))).await.unwrap();

        assert_eq!(
            handles.outcome.wait().await,
            Err(GatewayError::AbruptTermination)
        );
        assert_eq!(
            handles.started.wait().await,
            Err(GatewayError::AbruptTermination)
        );
    }

    #[tokio::test]
    async fn test_dispatch_before_hello_is_not_tracked() {
        let Harness {
            inbound,
            outbound: _outbound,
            mut dispatch,
            mut handles,
        } = spawn_session(None);

        inbound.send(Ok(event(5, "EARLY"))).await.unwrap();

        // Still teed downstream, but no state effect
        assert_eq!(dispatch.recv().await.unwrap(), event(5, "EARLY"));
        assert!(handles.started.try_wait().is_none());

        inbound.send(Ok(hello(30_000))).await.unwrap();
        inbound.send(Ok(ready(1, "A"))).await.unwrap();
        drop(inbound);

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, Some(resume_data("A", 1)));
    }

    #[tokio::test]
    async fn test_ready_without_session_id_degrades_resumability() {
        let Harness {
            inbound,
            outbound: _outbound,
            dispatch: _dispatch,
            mut handles,
        } = spawn_session(Some(resume_data("old", 7)));

        inbound.send(Ok(hello(30_000))).await.unwrap();
        inbound
            .send(Ok(GatewayMessage::Dispatch {
                seq: 1,
                event: DispatchEvent::Ready(ReadyEvent::default()),
            }))
            .await
            .unwrap();
        drop(inbound);

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, None);
        // The session still counts as started
        assert_eq!(handles.started.try_wait(), Some(Ok(())));
    }

    #[tokio::test]
    async fn test_resumed_updates_sequence() {
        let Harness {
            inbound,
            outbound: _outbound,
            dispatch: _dispatch,
            mut handles,
        } = spawn_session(Some(resume_data("sid", 42)));

        inbound.send(Ok(hello(30_000))).await.unwrap();
        inbound
            .send(Ok(GatewayMessage::Dispatch {
                seq: 43,
                event: DispatchEvent::Resumed,
            }))
            .await
            .unwrap();
        drop(inbound);

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.resume, Some(resume_data("sid", 43)));
        assert_eq!(handles.started.try_wait(), Some(Ok(())));
    }
}
