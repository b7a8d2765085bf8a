//! Materialised completion handles
//!
//! Two single-shot futures the reconnect supervisor observes: the session
//! outcome and the successful-start signal. Each is written exactly once;
//! completion is idempotent at every termination site.

use crate::error::GatewayError;
use crate::session::ResumeData;
use tokio::sync::oneshot;

/// Terminal value of a session run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Resume data to hand to the next session, if the server allowed it
    pub resume: Option<ResumeData>,
    /// Whether the supervisor must delay before reconnecting
    pub wait: bool,
}

/// Write-once completion slot
///
/// Wraps a oneshot sender so that completing twice is a no-op instead of a
/// panic; every termination path can call it unconditionally.
#[derive(Debug)]
pub(crate) struct CompletionSlot<T> {
    tx: Option<oneshot::Sender<T>>,
}

impl<T> CompletionSlot<T> {
    fn new(tx: oneshot::Sender<T>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Complete the slot; returns false if it was already completed
    pub fn complete(&mut self, value: T) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // The receiver may already be gone; completion still counts.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Whether the slot has not been completed yet
    pub fn is_pending(&self) -> bool {
        self.tx.is_some()
    }
}

/// Future resolving to the session outcome
#[derive(Debug)]
pub struct OutcomeHandle {
    rx: oneshot::Receiver<Result<SessionOutcome, GatewayError>>,
}

impl OutcomeHandle {
    /// Wait for the session to terminate
    ///
    /// A dropped session task resolves as `AbruptTermination`.
    pub async fn wait(self) -> Result<SessionOutcome, GatewayError> {
        self.rx
            .await
            .unwrap_or(Err(GatewayError::AbruptTermination))
    }
}

/// Future resolving when the first Ready or Resumed arrives
#[derive(Debug)]
pub struct StartedHandle {
    rx: oneshot::Receiver<Result<(), GatewayError>>,
}

impl StartedHandle {
    /// Wait for the session to start successfully
    ///
    /// A dropped session task resolves as `AbruptTermination`.
    pub async fn wait(self) -> Result<(), GatewayError> {
        self.rx
            .await
            .unwrap_or(Err(GatewayError::AbruptTermination))
    }

    /// Poll without waiting; None while the signal is still pending
    pub fn try_wait(&mut self) -> Option<Result<(), GatewayError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(Err(GatewayError::AbruptTermination))
            }
        }
    }
}

/// The pair of handles materialised for one session run
#[derive(Debug)]
pub struct SessionHandles {
    /// Session outcome: resume data plus the pre-reconnect delay hint
    pub outcome: OutcomeHandle,
    /// Fires on the first Ready or Resumed
    pub started: StartedHandle,
}

/// Create the sender slots and their observing handles
pub(crate) fn completion_pair() -> (
    CompletionSlot<Result<SessionOutcome, GatewayError>>,
    CompletionSlot<Result<(), GatewayError>>,
    SessionHandles,
) {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (started_tx, started_rx) = oneshot::channel();

    (
        CompletionSlot::new(outcome_tx),
        CompletionSlot::new(started_tx),
        SessionHandles {
            outcome: OutcomeHandle { rx: outcome_rx },
            started: StartedHandle { rx: started_rx },
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_is_idempotent() {
        let (mut outcome_slot, _started_slot, handles) = completion_pair();

        assert!(outcome_slot.is_pending());
        assert!(outcome_slot.complete(Ok(SessionOutcome {
            resume: None,
            wait: false,
        })));
        assert!(!outcome_slot.is_pending());

        // Second completion is swallowed
        assert!(!outcome_slot.complete(Err(GatewayError::LivenessTimeout)));

        let outcome = handles.outcome.wait().await.unwrap();
        assert_eq!(outcome.wait, false);
        assert!(outcome.resume.is_none());
    }

    #[tokio::test]
    async fn test_dropped_slot_reads_as_abrupt_termination() {
        let (outcome_slot, started_slot, handles) = completion_pair();
        drop(outcome_slot);
        drop(started_slot);

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
    async fn test_started_try_wait() {
        let (_outcome_slot, mut started_slot, mut handles) = completion_pair();

        assert!(handles.started.try_wait().is_none());

        started_slot.complete(Ok(()));
        assert_eq!(handles.started.try_wait(), Some(Ok(())));
    }
}
