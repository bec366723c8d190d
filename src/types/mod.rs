//! Domain model for the synchronization pipeline.

mod case;
mod job;

pub use case::{
    BenefitKind, CaseContext, CasePhase, CaseRecord, ClassificationOutcome, DenialSubtype,
    Disposition, StatusEntry, Tag, TagOrigin,
};
pub use job::{JobProgress, JobStatus, JobTrigger, SyncJob, SyncWindow};
