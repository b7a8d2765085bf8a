//! Session state
//!
//! The mutable record behind a running session. Mutated only by the state
//! machine on its own task.

/// Data required to resume a dropped session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeData {
    /// Bot authentication token
    pub token: String,
    /// Session ID issued in READY
    pub session_id: String,
    /// Last processed dispatch sequence number
    pub seq: u64,
}

/// Mutable per-session state
#[derive(Debug)]
pub struct SessionState {
    /// Resume data; the sole source of truth for resumability
    pub resume: Option<ResumeData>,
    /// Whether the last heartbeat was acknowledged
    ///
    /// Initialised `true` so the first tick after Hello always sends.
    pub heartbeat_acked: bool,
}

impl SessionState {
    /// Create session state, optionally seeded with prior resume data
    #[must_use]
    pub fn new(resume: Option<ResumeData>) -> Self {
        Self {
            resume,
            heartbeat_acked: true,
        }
    }

    /// Mark the outstanding heartbeat as acknowledged
    pub fn ack_heartbeat(&mut self) {
        self.heartbeat_acked = true;
    }

    /// Mark a heartbeat as sent and awaiting acknowledgement
    pub fn await_heartbeat_ack(&mut self) {
        self.heartbeat_acked = false;
    }

    /// Record the sequence number of a processed dispatch
    pub fn record_dispatch(&mut self, seq: u64) {
        if let Some(resume) = &mut self.resume {
            resume.seq = seq;
        }
    }

    /// The last processed sequence number, if any session is tracked
    #[must_use]
    pub fn seq(&self) -> Option<u64> {
        self.resume.as_ref().map(|r| r.seq)
    }
}
