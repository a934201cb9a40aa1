use chrono::{DateTime, Utc};

use crate::access::UserId;

use super::approval::ApprovalStage;
use super::domain::{
    LeaveNotification, LeaveRequest, LeaveType, NotificationId, NotificationKind,
    NotificationStatus,
};
use super::error::LeaveError;
use super::repository::LeaveTransaction;

/// Writes notification records inside the caller's unit of work.
pub struct Notifier<'t> {
    tx: &'t mut dyn LeaveTransaction,
    now: DateTime<Utc>,
}

impl<'t> Notifier<'t> {
    pub fn new(tx: &'t mut dyn LeaveTransaction, now: DateTime<Utc>) -> Self {
        Self { tx, now }
    }

    pub fn leave_requested(
        &mut self,
        request: &LeaveRequest,
        approver: UserId,
    ) -> Result<LeaveNotification, LeaveError> {
        self.record(
            approver,
            Some(request),
            NotificationKind::LeaveRequested,
            "New Leave Request",
            format!(
                "A {} day {} leave request from {} requires your approval.",
                request.days_requested, request.leave_type, request.user_id
            ),
        )
    }

    /// A request moved past one stage and now waits on `approver` at `stage`.
    pub fn approval_required(
        &mut self,
        request: &LeaveRequest,
        approver: UserId,
        stage: ApprovalStage,
    ) -> Result<LeaveNotification, LeaveError> {
        let stage = match stage {
            ApprovalStage::TeamLead => "team lead",
            ApprovalStage::Hr => "HR",
            ApprovalStage::Management => "management",
        };
        self.record(
            approver,
            Some(request),
            NotificationKind::ApprovalRequired,
            "Leave Approval Required",
            format!(
                "A {} day {} leave request from {} awaits {stage} approval.",
                request.days_requested, request.leave_type, request.user_id
            ),
        )
    }

    pub fn decision(
        &mut self,
        request: &LeaveRequest,
        approved: bool,
    ) -> Result<LeaveNotification, LeaveError> {
        let (kind, title, verb) = if approved {
            (NotificationKind::LeaveApproved, "Leave Request Approved", "approved")
        } else {
            (NotificationKind::LeaveRejected, "Leave Request Rejected", "rejected")
        };
        self.record(
            request.user_id,
            Some(request),
            kind,
            title,
            format!(
                "Your {} leave from {} to {} has been {verb}.",
                request.leave_type, request.start_date, request.end_date
            ),
        )
    }

    pub fn cancelled(&mut self, request: &LeaveRequest) -> Result<LeaveNotification, LeaveError> {
        self.record(
            request.user_id,
            Some(request),
            NotificationKind::LeaveCancelled,
            "Leave Request Cancelled",
            format!(
                "Your {} leave from {} to {} has been cancelled.",
                request.leave_type, request.start_date, request.end_date
            ),
        )
    }

    pub fn balance_low(
        &mut self,
        user: UserId,
        leave_type: LeaveType,
        remaining_days: i32,
    ) -> Result<LeaveNotification, LeaveError> {
        self.record(
            user,
            None,
            NotificationKind::BalanceLow,
            "Low Leave Balance",
            format!("Your {leave_type} leave balance is low. You have {remaining_days} days remaining."),
        )
    }

    fn record(
        &mut self,
        user: UserId,
        request: Option<&LeaveRequest>,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) -> Result<LeaveNotification, LeaveError> {
        let notification = LeaveNotification {
            id: self.tx.next_notification_id()?,
            user_id: user,
            request_id: request.map(|request| request.id),
            kind,
            title: title.to_string(),
            message,
            status: NotificationStatus::Unread,
            read_at: None,
            created_at: self.now,
        };
        self.tx.insert_notification(notification.clone())?;
        Ok(notification)
    }

    /// Newest first.
    pub fn for_user(
        &self,
        user: UserId,
        unread_only: bool,
    ) -> Result<Vec<LeaveNotification>, LeaveError> {
        let mut notifications: Vec<LeaveNotification> = self
            .tx
            .notifications_for_user(user)?
            .into_iter()
            .filter(|notification| !unread_only || notification.is_unread())
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    pub fn unread_count(&self, user: UserId) -> Result<usize, LeaveError> {
        Ok(self
            .tx
            .notifications_for_user(user)?
            .iter()
            .filter(|notification| notification.is_unread())
            .count())
    }

    /// Only the addressee may mark a notification read.
    pub fn mark_read(
        &mut self,
        id: NotificationId,
        user: UserId,
    ) -> Result<LeaveNotification, LeaveError> {
        let mut notification = self
            .tx
            .notification(id)?
            .filter(|notification| notification.user_id == user)
            .ok_or_else(|| LeaveError::not_found(format!("notification {}", id.0)))?;
        notification.mark_read(self.now);
        self.tx.update_notification(notification.clone())?;
        Ok(notification)
    }

    pub fn mark_all_read(&mut self, user: UserId) -> Result<usize, LeaveError> {
        let mut marked = 0;
        for mut notification in self.tx.notifications_for_user(user)? {
            if notification.is_unread() {
                notification.mark_read(self.now);
                self.tx.update_notification(notification)?;
                marked += 1;
            }
        }
        Ok(marked)
    }
}
