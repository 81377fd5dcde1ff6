use super::domain::{ApplicantId, HistoryRecord};
use super::session::CaseSession;

/// Failure modes shared by the backing stores. Implementations are expected
/// to enforce their own bounded deadline and report `Timeout` rather than
/// blocking a turn indefinitely.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store timed out")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("record not found")]
    NotFound,
}

/// Exact-key archive of closed cases. No similarity index; the verification
/// engine always looks up "this person", never "someone similar".
pub trait HistoryStore: Send + Sync {
    fn fetch(&self, identity: &ApplicantId) -> Result<Option<HistoryRecord>, StoreError>;

    /// Append-only write performed at case close. Must never run as part of a
    /// verification attempt.
    fn archive(&self, record: HistoryRecord) -> Result<(), StoreError>;
}

/// Session persistence. `save` must be all-or-nothing per turn: a partially
/// computed report or decision is never observable through this trait.
pub trait SessionStore: Send + Sync {
    fn load(&self, identity: &ApplicantId) -> Result<Option<CaseSession>, StoreError>;
    fn save(&self, session: &CaseSession) -> Result<(), StoreError>;
    fn remove(&self, identity: &ApplicantId) -> Result<(), StoreError>;
}
