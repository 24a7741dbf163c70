use gamehub_common::types::User;

/// Why a channel left the handshake without authenticating, or why an
/// authenticated channel was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Disconnected,
    AttemptsExhausted,
    ProtocolViolation,
    IdleTimeout,
    /// Dropped by the session for not draining its outbound queue.
    Evicted,
}

impl CloseReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::AttemptsExhausted => "attempts_exhausted",
            Self::ProtocolViolation => "protocol_violation",
            Self::IdleTimeout => "idle_timeout",
            Self::Evicted => "evicted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Unauthenticated { failed_attempts: u32 },
    Authenticated(User),
    Closed(CloseReason),
}

/// Result of feeding one authenticator verdict into the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    Authenticated(User),
    /// The client may try again.
    Rejected { failed_attempts: u32 },
    /// The attempt cap was reached; the channel must be closed.
    Exhausted { failed_attempts: u32 },
}

/// In-channel authentication state machine.
///
/// `Unauthenticated -> Authenticated` on the first credential that resolves to
/// a user, `Unauthenticated -> Closed` on disconnect, protocol violation or an
/// exhausted attempt cap. Both terminal states are final.
#[derive(Debug, Clone)]
pub struct Handshake {
    state: HandshakeState,
    max_attempts: Option<u32>,
}

impl Handshake {
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self { state: HandshakeState::Unauthenticated { failed_attempts: 0 }, max_attempts }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, HandshakeState::Unauthenticated { .. })
    }

    /// Returns `None` once the handshake has already settled.
    pub fn on_credential_result(&mut self, user: Option<User>) -> Option<HandshakeStep> {
        let HandshakeState::Unauthenticated { failed_attempts } = self.state else {
            return None;
        };

        let step = match user {
            Some(user) => {
                self.state = HandshakeState::Authenticated(user.clone());
                HandshakeStep::Authenticated(user)
            }
            None => {
                let failed_attempts = failed_attempts.saturating_add(1);
                if self.max_attempts.is_some_and(|max| failed_attempts >= max) {
                    self.state = HandshakeState::Closed(CloseReason::AttemptsExhausted);
                    HandshakeStep::Exhausted { failed_attempts }
                } else {
                    self.state = HandshakeState::Unauthenticated { failed_attempts };
                    HandshakeStep::Rejected { failed_attempts }
                }
            }
        };

        Some(step)
    }

    /// Abandon a pending handshake and hand back `reason`. A settled
    /// handshake keeps its state.
    pub fn abandon(&mut self, reason: CloseReason) -> CloseReason {
        if self.is_pending() {
            self.state = HandshakeState::Closed(reason);
        }
        reason
    }
}
