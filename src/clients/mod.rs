//! Clients for the external systems the pipeline consumes.
//!
//! Each collaborator sits behind a trait so the orchestrator and tests never
//! touch a concrete HTTP client: the portal (scraper service), the CRM, and
//! the AI classification service. Production implementations are thin
//! reqwest wrappers with typed serde payloads.

pub mod ai;
pub mod crm;
pub mod portal;

pub use ai::{AiService, AiServiceClient, AiVerdict};
pub use crm::{CaseManager, CaseNote, CrmClient, NoteSeverity};
pub use portal::{CasePortal, PortalCase, PortalClient, PortalCredentials};
