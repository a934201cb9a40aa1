use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::access::UserId;

/// Identifier wrapper for submitted leave requests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LeaveRequestId(pub u64);

impl fmt::Display for LeaveRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leave request {}", self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    Annual,
    Sick,
    Personal,
    Emergency,
    Maternity,
    Paternity,
    Unpaid,
}

impl LeaveType {
    pub const ALL: [LeaveType; 7] = [
        LeaveType::Annual,
        LeaveType::Sick,
        LeaveType::Personal,
        LeaveType::Emergency,
        LeaveType::Maternity,
        LeaveType::Paternity,
        LeaveType::Unpaid,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LeaveType::Annual => "ANNUAL",
            LeaveType::Sick => "SICK",
            LeaveType::Personal => "PERSONAL",
            LeaveType::Emergency => "EMERGENCY",
            LeaveType::Maternity => "MATERNITY",
            LeaveType::Paternity => "PATERNITY",
            LeaveType::Unpaid => "UNPAID",
        }
    }
}

impl fmt::Display for LeaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    TeamLeadApproved,
    HrApproved,
    ManagementApproved,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub const ALL: [LeaveStatus; 7] = [
        LeaveStatus::Pending,
        LeaveStatus::TeamLeadApproved,
        LeaveStatus::HrApproved,
        LeaveStatus::ManagementApproved,
        LeaveStatus::Approved,
        LeaveStatus::Rejected,
        LeaveStatus::Cancelled,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LeaveStatus::Pending => "PENDING",
            LeaveStatus::TeamLeadApproved => "TEAM_LEAD_APPROVED",
            LeaveStatus::HrApproved => "HR_APPROVED",
            LeaveStatus::ManagementApproved => "MANAGEMENT_APPROVED",
            LeaveStatus::Approved => "APPROVED",
            LeaveStatus::Rejected => "REJECTED",
            LeaveStatus::Cancelled => "CANCELLED",
        }
    }

    /// Statuses that reserve calendar days against overlap checks.
    pub fn is_occupying(self) -> bool {
        !matches!(self, LeaveStatus::Rejected | LeaveStatus::Cancelled)
    }

    /// Settled approvals: the HR shortcut lands on `APPROVED`, management sign-off on
    /// `MANAGEMENT_APPROVED`.
    pub fn is_approved(self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::ManagementApproved)
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::TeamLeadApproved)
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive day count of `[start, end]`; zero or negative when `end < start`.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i32 {
    (end - start).num_days() as i32 + 1
}

/// Every date in `[start, end]`, in order.
pub fn expand_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Actor, time, and comment recorded when a stage approves or rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDecision {
    pub actor_id: UserId,
    pub decided_at: DateTime<Utc>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub user_id: UserId,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_requested: i32,
    pub reason: String,
    pub status: LeaveStatus,
    /// Lead of the requester's primary team at submission; never re-derived.
    pub team_lead_id: Option<UserId>,
    pub team_lead_decision: Option<StageDecision>,
    pub hr_decision: Option<StageDecision>,
    pub management_decision: Option<StageDecision>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Year whose balance and policy govern this request.
    pub fn year(&self) -> i32 {
        self.start_date.year()
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

/// Payload for a new leave request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequestDraft {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
}

/// Partial edit of a pending leave request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequestPatch {
    #[serde(default)]
    pub leave_type: Option<LeaveType>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl LeaveRequestPatch {
    pub fn apply_to(&self, draft: &mut LeaveRequestDraft) {
        if let Some(leave_type) = self.leave_type {
            draft.leave_type = leave_type;
        }
        if let Some(start_date) = self.start_date {
            draft.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            draft.end_date = end_date;
        }
        if let Some(reason) = &self.reason {
            draft.reason = reason.clone();
        }
    }
}

impl From<&LeaveRequest> for LeaveRequestDraft {
    fn from(request: &LeaveRequest) -> Self {
        Self {
            leave_type: request.leave_type,
            start_date: request.start_date,
            end_date: request.end_date,
            reason: request.reason.clone(),
        }
    }
}

/// Per-year rules for one leave type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePolicy {
    pub leave_type: LeaveType,
    pub year: i32,
    pub default_allocation: i32,
    pub max_allocation: i32,
    pub min_notice_days: i32,
    pub max_consecutive_days: i32,
    pub allow_carry_over: bool,
    pub max_carry_over: i32,
    pub requires_approval: bool,
    pub active: bool,
    pub description: String,
}

/// Allocated, used, and carried-over days for one (user, leave type, year).
///
/// `remaining_days` is derived on every mutation and cannot be set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveBalance {
    pub user_id: UserId,
    pub leave_type: LeaveType,
    pub year: i32,
    total_allocated: i32,
    used_days: i32,
    carry_over_days: i32,
    remaining_days: i32,
}

impl LeaveBalance {
    pub fn new(
        user_id: UserId,
        leave_type: LeaveType,
        year: i32,
        total_allocated: i32,
        carry_over_days: i32,
    ) -> Self {
        let mut balance = Self {
            user_id,
            leave_type,
            year,
            total_allocated,
            used_days: 0,
            carry_over_days,
            remaining_days: 0,
        };
        balance.recompute();
        balance
    }

    pub fn total_allocated(&self) -> i32 {
        self.total_allocated
    }

    pub fn used_days(&self) -> i32 {
        self.used_days
    }

    pub fn carry_over_days(&self) -> i32 {
        self.carry_over_days
    }

    pub fn remaining_days(&self) -> i32 {
        self.remaining_days
    }

    /// Adds consumed days without clamping; remaining may go negative.
    pub fn record_usage(&mut self, days: i32) {
        self.used_days += days;
        self.recompute();
    }

    /// Returns consumed days, never letting usage drop below zero.
    pub fn release_usage(&mut self, days: i32) {
        self.used_days = (self.used_days - days).max(0);
        self.recompute();
    }

    pub fn set_allocation(&mut self, total_allocated: i32, carry_over_days: i32) {
        self.total_allocated = total_allocated;
        self.carry_over_days = carry_over_days;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.remaining_days = self.total_allocated + self.carry_over_days - self.used_days;
    }

    pub fn is_consistent(&self) -> bool {
        self.remaining_days == self.total_allocated + self.carry_over_days - self.used_days
    }
}

/// One day of a leave request, mirroring the request's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub request_id: LeaveRequestId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub leave_type: LeaveType,
    pub status: LeaveStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    LeaveRequested,
    LeaveApproved,
    LeaveRejected,
    LeaveCancelled,
    ApprovalRequired,
    BalanceLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Unread,
    Read,
    Sent,
    Failed,
}

/// Record of a workflow event addressed to a user. Delivery is out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveNotification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub request_id: Option<LeaveRequestId>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub status: NotificationStatus,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LeaveNotification {
    /// Marks the notification read; an existing `read_at` is kept.
    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Read;
        if self.read_at.is_none() {
            self.read_at = Some(now);
        }
    }

    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}
