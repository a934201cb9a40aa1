//! Leave request approval workflow.
//!
//! A request is admitted only when the year's policy, the requester's balance, and the calendar
//! all allow it. It then moves through team lead, HR, and (for long absences) management
//! approval. Balance days are consumed exactly once, on final approval, and the per-day calendar
//! projection mirrors the request status at every step. Each service operation runs inside one
//! [`LeaveStore`] transaction.

pub mod approval;
pub mod calendar;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod notifications;
pub mod policy;
pub mod reports;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use approval::{
    ApprovalAction, ApprovalStage, ApprovalStateMachine, ApproverRole, TimelineAction,
    TimelineEvent, Transition, WorkflowStatus, MANAGEMENT_APPROVAL_THRESHOLD_DAYS,
};
pub use calendar::CalendarProjector;
pub use domain::{
    CalendarEntry, LeaveBalance, LeaveNotification, LeavePolicy, LeaveRequest, LeaveRequestDraft,
    LeaveRequestId, LeaveRequestPatch, LeaveStatus, LeaveType, NotificationId, NotificationKind,
    NotificationStatus, StageDecision,
};
pub use error::{LeaveError, PolicyViolation};
pub use ledger::BalanceLedger;
pub use memory::InMemoryLeaveStore;
pub use notifications::Notifier;
pub use policy::{default_policies, PolicyCheck, PolicyResolver, PolicyUpdate};
pub use reports::{CalendarStats, LeaveRequestSummary, UserRequestStats, UtilizationStats};
pub use repository::{CalendarFilter, LeaveStore, LeaveTransaction, RepositoryError, RequestFilter};
pub use router::leave_router;
pub use service::{Clock, DecisionOutcome, FixedClock, LeaveWorkflowService, SystemClock};
