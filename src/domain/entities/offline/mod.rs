pub mod drain_summary;
pub mod queue_stats;
pub mod queued_action;
pub mod reference;
pub mod session_payloads;
pub mod transition;

pub use drain_summary::{DrainSkipReason, DrainSummary};
pub use queue_stats::QueueStats;
pub use queued_action::{QueuedAction, QueuedActionDraft};
pub use reference::{CachedSchool, ReferenceEntry, SCHOOLS_COLLECTION, SESSIONS_COLLECTION};
pub use session_payloads::{CheckInPayload, CheckOutPayload, RemoteReceipt};
pub use transition::{CancelOutcome, TransitionOutcome};
