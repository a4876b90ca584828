use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadyDraining,
    Empty,
    StorageUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "report")]
pub enum DrainOutcome<R> {
    Skipped(SkipReason),
    Completed(R),
}

impl<R> DrainOutcome<R> {
    pub fn report(&self) -> Option<&R> {
        match self {
            DrainOutcome::Completed(report) => Some(report),
            DrainOutcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            DrainOutcome::Skipped(reason) => Some(*reason),
            DrainOutcome::Completed(_) => None,
        }
    }
}

/// One pass over the retry queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryDrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub discarded: usize,
    pub missing_handler: usize,
    pub remaining: usize,
}

/// One pass over the pending-change log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDrainReport {
    pub attempted: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// Held back because an earlier change for the same record failed in this pass.
    pub deferred: usize,
    pub remaining: usize,
}
