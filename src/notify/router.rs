//! Notification router.
//!
//! Turns one classification outcome into at most one mirrored case note and
//! one outbound message. The note is the durable system of record: it is
//! written before any message goes out, and a note failure aborts the sends.
//! Messaging is best-effort; every per-destination result lands in the
//! notification audit either way.

use crate::clients::{CaseManager, NoteSeverity};
use crate::config;
use crate::error::{GatewayError, PipelineError};
use crate::notify::{dedup, templates};
use crate::storage::audit::{ChannelKind, DeliveryOutcome, NotificationAudit, NotificationRecord};
use crate::tags::REGION_TAG_PREFIX;
use crate::types::{CaseRecord, ClassificationOutcome, Disposition};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Outbound messaging seam. The production implementation is the gateway
/// session manager; tests use an in-memory stub.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Result<(), GatewayError>;
}

/// Resolved delivery target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub channel: ChannelKind,
    pub address: String,
}

/// What the router did for one disposition event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResult {
    /// Note created, message dispatch attempted (delivery result is in the
    /// audit trail).
    Delivered,
    /// Suppressed as a duplicate of a recent note.
    Suppressed,
}

/// Pick the destination for an outcome.
///
/// The routing table keys on disposition; a `REGIAO-*` tag on the case
/// overrides it with the matching partner channel, falling back to the
/// office channel when no partner is configured for that region.
pub fn resolve_destination(outcome: &ClassificationOutcome, case: &CaseRecord) -> Destination {
    let channels = &config::get().channels;

    if let Some(region) = case
        .tags
        .iter()
        .find_map(|t| t.strip_prefix(REGION_TAG_PREFIX))
    {
        return match channels.partners.get(region) {
            Some(address) => Destination {
                channel: ChannelKind::RegionalPartner,
                address: address.clone(),
            },
            None => Destination {
                channel: ChannelKind::Office,
                address: channels.office.clone(),
            },
        };
    }

    match outcome.disposition {
        Disposition::Requirement => Destination {
            channel: ChannelKind::Office,
            address: channels.office.clone(),
        },
        Disposition::Approved => Destination {
            channel: ChannelKind::Approval,
            address: channels.approval.clone(),
        },
        Disposition::Denied => Destination {
            channel: ChannelKind::Legal,
            address: channels.legal.clone(),
        },
    }
}

/// Note severity for the CRM mirror: denials wake the legal team.
fn note_severity(outcome: &ClassificationOutcome) -> NoteSeverity {
    match outcome.disposition {
        Disposition::Requirement => NoteSeverity::Warning,
        Disposition::Approved => NoteSeverity::Info,
        Disposition::Denied => NoteSeverity::Critical,
    }
}

pub struct NotificationRouter {
    crm: Arc<dyn CaseManager>,
    sender: Arc<dyn MessageSender>,
    audit: NotificationAudit,
}

impl NotificationRouter {
    pub fn new(
        crm: Arc<dyn CaseManager>,
        sender: Arc<dyn MessageSender>,
        audit: NotificationAudit,
    ) -> Self {
        Self { crm, sender, audit }
    }

    /// Mirror the outcome as a case note, then message the destination.
    pub async fn route(
        &self,
        case: &CaseRecord,
        outcome: &ClassificationOutcome,
        evidence_links: &[String],
    ) -> Result<RouteResult, PipelineError> {
        let cfg = &config::get().notify;
        let destination = resolve_destination(outcome, case);
        let title = templates::note_title(outcome, case);
        let body = templates::message_body(outcome, case, evidence_links);

        let existing = self
            .crm
            .list_notes(&case.crm_id)
            .await
            .map_err(|e| PipelineError::Transient(e.to_string()))?;

        if let Some(duplicate_of) = dedup::find_duplicate(
            &body,
            &case.protocol,
            &existing,
            cfg.recent_notes,
            cfg.dedup_window_days,
            cfg.dedup_overlap,
        ) {
            info!(
                protocol = %case.protocol,
                duplicate_of = %duplicate_of,
                "Suppressing duplicate notification"
            );
            self.record(
                case,
                outcome,
                &destination,
                &body,
                DeliveryOutcome::Skipped {
                    reason: format!("duplicate of '{}'", duplicate_of),
                },
            );
            return Ok(RouteResult::Suppressed);
        }

        // Note first. If this fails the event is not durably recorded, so no
        // message may go out for it.
        self.crm
            .create_note(&case.crm_id, &title, &body, note_severity(outcome))
            .await
            .map_err(|e| {
                warn!(protocol = %case.protocol, error = %e, "Note creation failed, aborting sends");
                PipelineError::Transient(format!("note creation failed: {}", e))
            })?;

        let delivery = match self.sender.send(&destination.address, &body).await {
            Ok(()) => DeliveryOutcome::Sent,
            Err(e) => {
                warn!(
                    protocol = %case.protocol,
                    destination = %destination.address,
                    error = %e,
                    "Message delivery failed"
                );
                DeliveryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        self.record(case, outcome, &destination, &body, delivery);

        Ok(RouteResult::Delivered)
    }

    fn record(
        &self,
        case: &CaseRecord,
        outcome: &ClassificationOutcome,
        destination: &Destination,
        body: &str,
        delivery: DeliveryOutcome,
    ) {
        let record = NotificationRecord {
            protocol: case.protocol.clone(),
            disposition: outcome.routing_label(),
            channel: destination.channel,
            destination: destination.address.clone(),
            body: body.to_string(),
            outcome: delivery,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.audit.append(&record) {
            warn!(protocol = %case.protocol, error = %e, "Audit append failed");
        }
    }
}
