//! Messaging resilience layer.
//!
//! One session-based messaging connection, modeled as a pure state machine
//! (`fsm`) driven by a `SessionManager` against a `GatewayTransport`. The
//! design goal is surviving the faults this class of gateway actually
//! throws: transient stream errors that heal with an ephemeral wipe, plain
//! disconnects that just need a retry, and the rare true invalidation that
//! requires a fresh pairing.

pub mod artifacts;
pub mod fsm;
pub mod phone;
pub mod session;
pub mod transport;

pub use artifacts::SessionArtifacts;
pub use fsm::{SessionEvent, SessionState};
pub use session::{PairingCode, SessionManager, SessionStatus};
pub use transport::{BridgeClient, ConnectionStatus, GatewayTransport};
