//! Session lifecycle as an enum plus a pure transition function.
//!
//! All policy lives here: which faults wipe which artifacts, when recovery
//! gives up, and which disconnects are free retries. The `SessionManager`
//! only applies the returned actions, so the whole lifecycle is testable
//! without a transport or a filesystem.

use std::time::Duration;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Pairing code shown, waiting for the operator to confirm on the phone.
    AwaitingPairing,
    /// Handshake done, history sync still in flight.
    Authenticated,
    /// Fully usable; `send` is permitted only here.
    Ready,
    /// Transient fault being healed: ephemeral artifacts wiped, reconnect
    /// scheduled with backoff.
    Recovering,
    /// Recovery attempts exhausted. Manual re-pairing required.
    Degraded,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingPairing => "awaiting_pairing",
            SessionState::Authenticated => "authenticated",
            SessionState::Ready => "ready",
            SessionState::Recovering => "recovering",
            SessionState::Degraded => "degraded",
        };
        write!(f, "{}", s)
    }
}

/// Everything that can happen to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Process start or manual restart. `artifacts_usable` is true when
    /// local session artifacts exist and pass the corruption check.
    Start { artifacts_usable: bool },
    /// Transport handshake completed.
    ConnectionOpened,
    /// Operator confirmed the pairing code on the device.
    PairingConfirmed,
    /// History sync finished; session fully usable.
    SessionSynced,
    /// Runtime fault matching the recoverable signature set.
    TransientFault,
    /// Connection dropped without a logout. Free retry.
    ConnectionClosed,
    /// Explicit logout from the remote side. Session is invalid.
    LoggedOut,
    /// Recovery backoff elapsed, time to reconnect.
    BackoffElapsed,
}

/// Side effects the manager must perform for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Remove lock files and the transaction log; keep credentials and keys.
    WipeEphemeral,
    /// Remove every session artifact. Next start requires pairing.
    WipeAll,
    /// Open the transport connection now.
    Connect,
    /// Fetch and surface a pairing code.
    RequestPairingCode,
    /// Reconnect after this delay.
    ReconnectAfter(Duration),
    /// Reset the recovery attempt counter.
    ResetAttempts,
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub actions: Vec<SessionAction>,
}

impl Transition {
    fn to(next: SessionState) -> Self {
        Self {
            next,
            actions: vec![],
        }
    }

    fn with(next: SessionState, actions: Vec<SessionAction>) -> Self {
        Self { next, actions }
    }
}

/// Recovery delay for the n-th attempt (0-based): base doubling per attempt.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base * (1u32 << attempt.min(16))
}

/// The transition table.
///
/// `attempts_used` counts recovery attempts consumed since the last Ready;
/// `max_attempts` is the cap before Degraded. Unknown (state, event) pairs
/// keep the current state with no actions.
pub fn transition(
    current: SessionState,
    event: &SessionEvent,
    attempts_used: u32,
    max_attempts: u32,
    backoff_base: Duration,
    reconnect_delay: Duration,
) -> Transition {
    use SessionAction::*;
    use SessionState::*;

    match (current, event) {
        // Startup: reuse a healthy session, otherwise pair from scratch.
        (Disconnected | Degraded, SessionEvent::Start { artifacts_usable: true }) => {
            Transition::with(Connecting, vec![ResetAttempts, Connect])
        }
        (Disconnected | Degraded, SessionEvent::Start { artifacts_usable: false }) => {
            Transition::with(AwaitingPairing, vec![ResetAttempts, Connect, RequestPairingCode])
        }

        (Connecting, SessionEvent::ConnectionOpened) => Transition::to(Authenticated),
        (AwaitingPairing, SessionEvent::PairingConfirmed) => Transition::to(Authenticated),
        (Authenticated, SessionEvent::SessionSynced) => {
            Transition::with(Ready, vec![ResetAttempts])
        }

        // Transient faults heal through an ephemeral wipe and a capped
        // backoff. Credentials and keys survive so no new pairing is needed.
        (
            Connecting | AwaitingPairing | Authenticated | Ready | Recovering,
            SessionEvent::TransientFault,
        ) => {
            if attempts_used >= max_attempts {
                Transition::to(Degraded)
            } else {
                Transition::with(
                    Recovering,
                    vec![
                        WipeEphemeral,
                        ReconnectAfter(backoff_delay(attempts_used, backoff_base)),
                    ],
                )
            }
        }
        (Connecting | Recovering, SessionEvent::BackoffElapsed) => {
            Transition::with(Connecting, vec![Connect])
        }

        // A plain drop is retried after a short fixed delay; no wipe and no
        // recovery attempt consumed.
        (
            Connecting | AwaitingPairing | Authenticated | Ready,
            SessionEvent::ConnectionClosed,
        ) => Transition::with(Connecting, vec![ReconnectAfter(reconnect_delay)]),

        // Logout invalidates everything.
        (_, SessionEvent::LoggedOut) => Transition::with(Disconnected, vec![WipeAll]),

        _ => Transition::to(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    const BASE: Duration = Duration::from_secs(3);
    const RECONNECT: Duration = Duration::from_secs(2);

    fn step(state: SessionState, event: SessionEvent, attempts: u32) -> Transition {
        transition(state, &event, attempts, 3, BASE, RECONNECT)
    }

    #[test]
    fn test_usable_artifacts_skip_pairing() {
        let t = step(Disconnected, SessionEvent::Start { artifacts_usable: true }, 0);
        assert_eq!(t.next, Connecting);
        assert!(!t.actions.contains(&SessionAction::RequestPairingCode));
    }

    #[test]
    fn test_fresh_start_requires_pairing() {
        let t = step(Disconnected, SessionEvent::Start { artifacts_usable: false }, 0);
        assert_eq!(t.next, AwaitingPairing);
        assert!(t.actions.contains(&SessionAction::RequestPairingCode));
    }

    #[test]
    fn test_happy_path_to_ready() {
        let t = step(Connecting, SessionEvent::ConnectionOpened, 0);
        assert_eq!(t.next, Authenticated);
        let t = step(Authenticated, SessionEvent::SessionSynced, 0);
        assert_eq!(t.next, Ready);
        assert!(t.actions.contains(&SessionAction::ResetAttempts));
    }

    #[test]
    fn test_transient_fault_wipes_only_ephemeral() {
        let t = step(Ready, SessionEvent::TransientFault, 0);
        assert_eq!(t.next, Recovering);
        assert!(t.actions.contains(&SessionAction::WipeEphemeral));
        assert!(!t.actions.contains(&SessionAction::WipeAll));
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        for (attempt, secs) in [(0u32, 3u64), (1, 6), (2, 12)] {
            let t = step(Ready, SessionEvent::TransientFault, attempt);
            assert_eq!(
                t.actions,
                vec![
                    SessionAction::WipeEphemeral,
                    SessionAction::ReconnectAfter(Duration::from_secs(secs))
                ]
            );
        }
    }

    #[test]
    fn test_exhausted_attempts_degrade() {
        let t = step(Recovering, SessionEvent::TransientFault, 3);
        assert_eq!(t.next, Degraded);
        assert!(t.actions.is_empty());
    }

    #[test]
    fn test_plain_disconnect_is_a_free_retry() {
        let t = step(Ready, SessionEvent::ConnectionClosed, 2);
        assert_eq!(t.next, Connecting);
        assert_eq!(
            t.actions,
            vec![SessionAction::ReconnectAfter(RECONNECT)]
        );
    }

    #[test]
    fn test_logout_wipes_everything_from_any_state() {
        for state in [Connecting, AwaitingPairing, Authenticated, Ready, Recovering] {
            let t = step(state, SessionEvent::LoggedOut, 0);
            assert_eq!(t.next, Disconnected);
            assert_eq!(t.actions, vec![SessionAction::WipeAll]);
        }
    }

    #[test]
    fn test_unknown_pair_is_a_no_op() {
        let t = step(Ready, SessionEvent::PairingConfirmed, 0);
        assert_eq!(t.next, Ready);
        assert!(t.actions.is_empty());
    }
}
