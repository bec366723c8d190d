//! Session manager: drives the lifecycle FSM against a real transport.
//!
//! The manager owns mutable session state (current FSM state, recovery
//! attempt counter, last pairing code) and applies the actions the pure
//! transition function returns. Events arrive from three places: the
//! supervision loop's status probes, delivery failures in `send`, and timer
//! tasks spawned for scheduled reconnects.

use crate::config;
use crate::error::GatewayError;
use crate::gateway::artifacts::SessionArtifacts;
use crate::gateway::fsm::{transition, SessionAction, SessionEvent, SessionState};
use crate::gateway::phone;
use crate::gateway::transport::{ConnectionStatus, GatewayTransport};
use crate::notify::MessageSender;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long a surfaced pairing code stays valid.
const PAIRING_CODE_TTL_SECS: i64 = 120;

/// Supervision loop probe interval.
const PROBE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct PairingCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub recovery_attempts_used: u32,
    pub pairing_pending: bool,
    /// Most recent transport fault, kept for the status endpoint.
    pub last_fault: Option<String>,
}

pub struct SessionManager {
    transport: Arc<dyn GatewayTransport>,
    artifacts: SessionArtifacts,
    state: Mutex<SessionState>,
    attempts: Mutex<u32>,
    pairing: Mutex<Option<PairingCode>>,
    last_fault: Mutex<Option<String>>,
    me: Weak<SessionManager>,
    backoff_base: Duration,
    reconnect_delay: Duration,
    max_attempts: u32,
    shutdown_grace: Duration,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        artifacts: SessionArtifacts,
        backoff_base: Duration,
        reconnect_delay: Duration,
        max_attempts: u32,
        shutdown_grace: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            transport,
            artifacts,
            state: Mutex::new(SessionState::Disconnected),
            attempts: Mutex::new(0),
            pairing: Mutex::new(None),
            last_fault: Mutex::new(None),
            me: me.clone(),
            backoff_base,
            reconnect_delay,
            max_attempts,
            shutdown_grace,
        })
    }

    pub fn from_config(transport: Arc<dyn GatewayTransport>) -> Arc<Self> {
        let cfg = &config::get().gateway;
        Self::new(
            transport,
            SessionArtifacts::new(cfg.session_dir.clone()),
            Duration::from_secs(cfg.backoff_base_secs),
            Duration::from_secs(cfg.reconnect_delay_secs),
            cfg.max_recovery_attempts,
            Duration::from_millis(cfg.shutdown_grace_ms),
        )
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state(),
            recovery_attempts_used: *self.attempts.lock().unwrap_or_else(|e| e.into_inner()),
            pairing_pending: self.pairing_code().is_some(),
            last_fault: self
                .last_fault
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    /// Current pairing code, if one was surfaced and has not expired.
    pub fn pairing_code(&self) -> Option<PairingCode> {
        let guard = self.pairing.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|p| p.expires_at > Utc::now())
            .cloned()
    }

    /// Kick off the session from cold: inspect local artifacts and either
    /// resume the pairing or start a fresh one.
    pub async fn start(&self) {
        let usable = self.artifacts.usable();
        if self.artifacts.exists() && !usable {
            warn!("Session artifacts are structurally corrupted, re-pairing");
            if let Err(e) = self.artifacts.wipe_all() {
                error!(error = %e, "Failed to clear corrupted session artifacts");
            }
        }
        self.dispatch(SessionEvent::Start {
            artifacts_usable: usable,
        })
        .await;
    }

    /// Feed one event through the FSM and perform the resulting actions.
    /// Actions can produce follow-up events (a connect attempt succeeds or
    /// fails), which are processed in the same call.
    pub async fn dispatch(&self, event: SessionEvent) {
        self.dispatch_inner(event).await;
    }

    // Boxed so the recursive dispatch -> spawn -> dispatch chain has a
    // concrete `Send` future type (breaks the auto-trait inference cycle).
    fn dispatch_inner(
        &self,
        event: SessionEvent,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let (from, t) = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                let attempts = *self.attempts.lock().unwrap_or_else(|e| e.into_inner());
                let t = transition(
                    *state,
                    &event,
                    attempts,
                    self.max_attempts,
                    self.backoff_base,
                    self.reconnect_delay,
                );
                let from = *state;
                *state = t.next;
                (from, t)
            };

            if from != t.next {
                info!(from = %from, to = %t.next, event = ?event, "Session transition");
            }
            if t.next == SessionState::Recovering && event == SessionEvent::TransientFault {
                *self.attempts.lock().unwrap_or_else(|e| e.into_inner()) += 1;
            }
            if t.next == SessionState::Degraded {
                error!("Session degraded, manual re-pairing required");
            }

            for action in t.actions {
                match action {
                    SessionAction::ResetAttempts => {
                        *self.attempts.lock().unwrap_or_else(|e| e.into_inner()) = 0;
                    }
                    SessionAction::WipeEphemeral => {
                        if let Err(e) = self.artifacts.wipe_ephemeral() {
                            error!(error = %e, "Ephemeral artifact wipe failed");
                        }
                    }
                    SessionAction::WipeAll => {
                        if let Err(e) = self.artifacts.wipe_all() {
                            error!(error = %e, "Session invalidation failed");
                        }
                    }
                    SessionAction::Connect => match self.transport.connect().await {
                        Ok(()) => queue.push_back(SessionEvent::ConnectionOpened),
                        Err(e) => queue.push_back(self.fault_event(&e)),
                    },
                    SessionAction::RequestPairingCode => {
                        match self.transport.request_pairing_code().await {
                            Ok(code) => {
                                info!(code = %code, "Pairing code available");
                                *self.pairing.lock().unwrap_or_else(|e| e.into_inner()) =
                                    Some(PairingCode {
                                        code,
                                        expires_at: Utc::now()
                                            + ChronoDuration::seconds(PAIRING_CODE_TTL_SECS),
                                    });
                            }
                            Err(e) => warn!(error = %e, "Pairing code request failed"),
                        }
                    }
                    SessionAction::ReconnectAfter(delay) => {
                        // Jitter up to 20% so repeated restarts don't sync up
                        // against the bridge.
                        let jitter_ms = rand::Rng::gen_range(
                            &mut rand::thread_rng(),
                            0..=(delay.as_millis() as u64 / 5).max(1),
                        );
                        let delay = delay + Duration::from_millis(jitter_ms);
                        if let Some(manager) = self.me.upgrade() {
                            tokio::spawn(async move {
                                sleep(delay).await;
                                manager.dispatch(SessionEvent::BackoffElapsed).await;
                            });
                        }
                    }
                }
            }
        }
        })
    }

    fn fault_event(&self, err: &GatewayError) -> SessionEvent {
        *self.last_fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(err.to_string());
        let message = err.to_string().to_lowercase();
        if message.contains("logged out") || message.contains("unauthorized") {
            SessionEvent::LoggedOut
        } else if err.is_transient() {
            SessionEvent::TransientFault
        } else {
            SessionEvent::ConnectionClosed
        }
    }

    /// Supervision loop: probes the bridge and converts status changes into
    /// FSM events. Runs until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(PROBE_INTERVAL) => {}
            }

            let state = self.state();
            if matches!(state, SessionState::Disconnected | SessionState::Degraded) {
                continue;
            }

            match self.transport.probe().await {
                Ok(ConnectionStatus::Open) => match state {
                    SessionState::AwaitingPairing => {
                        self.pairing.lock().unwrap_or_else(|e| e.into_inner()).take();
                        self.dispatch(SessionEvent::PairingConfirmed).await;
                    }
                    SessionState::Authenticated => {
                        self.dispatch(SessionEvent::SessionSynced).await;
                    }
                    _ => {}
                },
                Ok(ConnectionStatus::Pairing) => {}
                Ok(ConnectionStatus::Closed) => {
                    if !matches!(state, SessionState::Recovering) {
                        self.dispatch(SessionEvent::ConnectionClosed).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Status probe failed");
                    let event = self.fault_event(&e);
                    if event == SessionEvent::TransientFault || event == SessionEvent::LoggedOut {
                        self.dispatch(event).await;
                    }
                }
            }
        }
    }

    /// Deliver one message. Permitted only in Ready. Tries the destination's
    /// primary addressing scheme, then the ninth-digit alternate once on an
    /// unknown-recipient fault.
    pub async fn send(&self, destination: &str, text: &str) -> Result<(), GatewayError> {
        match self.state() {
            SessionState::Ready => {}
            SessionState::Degraded => return Err(GatewayError::Degraded),
            other => return Err(GatewayError::NotReady(other.to_string())),
        }

        let number = phone::normalize(destination)?;

        match self.transport.deliver(&number.primary, text).await {
            Ok(()) => Ok(()),
            Err(GatewayError::UnknownRecipient(_)) => {
                info!(
                    primary = %number.primary,
                    alternate = %number.alternate,
                    "Recipient unknown under primary scheme, trying alternate"
                );
                self.transport.deliver(&number.alternate, text).await
            }
            Err(e) => {
                *self.last_fault.lock().unwrap_or_else(|p| p.into_inner()) = Some(e.to_string());
                if e.is_transient() {
                    self.dispatch(SessionEvent::TransientFault).await;
                }
                Err(e)
            }
        }
    }

    /// Graceful shutdown: a short grace delay lets in-flight writes settle,
    /// then the session handle is closed so the artifacts stay structurally
    /// sound for the next start.
    pub async fn shutdown(&self) {
        sleep(self.shutdown_grace).await;
        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Session close failed during shutdown");
        } else {
            info!("Messaging session closed cleanly");
        }
    }
}

#[async_trait]
impl MessageSender for SessionManager {
    async fn send(&self, destination: &str, text: &str) -> Result<(), GatewayError> {
        SessionManager::send(self, destination, text).await
    }
}
