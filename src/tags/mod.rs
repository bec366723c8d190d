//! Tag reconciliation engine.
//!
//! The CRM's tag endpoint is full-replace: whatever array we PATCH becomes
//! the case's entire tag set. Reconciliation therefore always writes
//! `manual ∪ new_system_tags`, so human annotations survive every pass while
//! system tags reflect the latest machine state.
//!
//! The mandatory baseline tag marks a case as pipeline-managed; downstream
//! routing depends on it, so a write that loses it aborts the whole job.

mod registry;

pub use registry::{
    is_system_tag, system_tags_for, MANDATORY_TAG, REGION_TAG_PREFIX,
};

use crate::clients::CaseManager;
use crate::error::{CrmError, PipelineError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reconciliation failures.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Crm(#[from] CrmError),

    /// The mandatory baseline tag did not survive the write even after a
    /// retry. Escalates to a job abort.
    #[error("mandatory tag '{MANDATORY_TAG}' missing on case {0} after write and retry")]
    MandatoryTagMissing(String),
}

impl From<ReconcileError> for PipelineError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::MandatoryTagMissing(_) => PipelineError::Validation(err.to_string()),
            ReconcileError::Crm(e) => PipelineError::Transient(e.to_string()),
        }
    }
}

/// Merges machine tags into the CRM record without erasing human ones.
pub struct TagReconciler {
    crm: Arc<dyn CaseManager>,
}

impl TagReconciler {
    pub fn new(crm: Arc<dyn CaseManager>) -> Self {
        Self { crm }
    }

    /// Reconcile the case's tag set with the new system tags.
    ///
    /// Reads current tags, partitions into manual vs system, writes
    /// `manual ∪ new_system_tags ∪ {mandatory}` as a full replace, then
    /// re-reads to confirm the mandatory tag landed. One retry; a second
    /// miss is a hard error.
    ///
    /// Returns the written tag set.
    pub async fn reconcile(
        &self,
        crm_id: &str,
        new_system_tags: &[String],
    ) -> Result<Vec<String>, ReconcileError> {
        let case = self.crm.get_case(crm_id).await?;

        let manual: Vec<String> = case
            .tags
            .iter()
            .filter(|t| !is_system_tag(t))
            .cloned()
            .collect();

        let mut merged = manual.clone();
        for tag in new_system_tags {
            if !merged.contains(tag) {
                merged.push(tag.clone());
            }
        }
        if !merged.iter().any(|t| t == MANDATORY_TAG) {
            merged.push(MANDATORY_TAG.to_string());
        }

        debug!(
            crm_id = %crm_id,
            manual = manual.len(),
            system = new_system_tags.len(),
            "Reconciling tags"
        );

        self.crm.replace_tags(crm_id, &merged).await?;

        if self.mandatory_present(crm_id).await? {
            return Ok(merged);
        }

        warn!(crm_id = %crm_id, "Mandatory tag missing after write, retrying once");
        self.crm.replace_tags(crm_id, &merged).await?;

        if self.mandatory_present(crm_id).await? {
            info!(crm_id = %crm_id, "Mandatory tag landed on retry");
            return Ok(merged);
        }

        Err(ReconcileError::MandatoryTagMissing(crm_id.to_string()))
    }

    async fn mandatory_present(&self, crm_id: &str) -> Result<bool, CrmError> {
        let case = self.crm.get_case(crm_id).await?;
        Ok(case.tags.iter().any(|t| t == MANDATORY_TAG))
    }
}
