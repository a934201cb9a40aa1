//! Approval pipeline: `PENDING → TEAM_LEAD_APPROVED → HR_APPROVED → MANAGEMENT_APPROVED`.
//!
//! HR approval is final for requests of at most [`MANAGEMENT_APPROVAL_THRESHOLD_DAYS`] days and
//! lands on `APPROVED`; longer requests wait at `HR_APPROVED` for a management decision, which
//! settles them at `MANAGEMENT_APPROVED`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::{IdentityProvider, Permission, UserId};

use super::domain::{LeaveRequest, LeaveRequestId, LeaveStatus, StageDecision};
use super::error::LeaveError;

/// Requests longer than this many days need management sign-off after HR.
pub const MANAGEMENT_APPROVAL_THRESHOLD_DAYS: i32 = 4;

pub fn requires_management(days_requested: i32) -> bool {
    days_requested > MANAGEMENT_APPROVAL_THRESHOLD_DAYS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

impl ApprovalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalAction::Approve => "approve",
            ApprovalAction::Reject => "reject",
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    TeamLead,
    Hr,
    Management,
}

/// Who is expected to act next on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRole {
    TeamLead,
    Hr,
    Management,
    None,
}

/// Stage awaiting a decision, or `None` when no approve/reject rule applies.
pub fn pending_stage(request: &LeaveRequest) -> Option<ApprovalStage> {
    match request.status {
        LeaveStatus::Pending => Some(ApprovalStage::TeamLead),
        LeaveStatus::TeamLeadApproved => Some(ApprovalStage::Hr),
        LeaveStatus::HrApproved if requires_management(request.days_requested) => {
            Some(ApprovalStage::Management)
        }
        _ => None,
    }
}

/// Terminal or terminal-equivalent: no further approval action is possible.
pub fn is_final(request: &LeaveRequest) -> bool {
    match request.status {
        LeaveStatus::Approved
        | LeaveStatus::Rejected
        | LeaveStatus::Cancelled
        | LeaveStatus::ManagementApproved => true,
        LeaveStatus::HrApproved => !requires_management(request.days_requested),
        LeaveStatus::Pending | LeaveStatus::TeamLeadApproved => false,
    }
}

/// Outcome of a permitted approve/reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub stage: ApprovalStage,
    pub action: ApprovalAction,
    pub from: LeaveStatus,
    pub to: LeaveStatus,
    /// Set when this approval consumes balance days.
    pub final_approval: bool,
}

/// Decides transitions, consulting the identity provider for actor checks.
pub struct ApprovalStateMachine<'a, I: ?Sized> {
    identity: &'a I,
}

impl<'a, I> ApprovalStateMachine<'a, I>
where
    I: IdentityProvider + ?Sized,
{
    pub fn new(identity: &'a I) -> Self {
        Self { identity }
    }

    /// Rule lookup first, then actor authorization.
    pub fn transition(
        &self,
        request: &LeaveRequest,
        actor: UserId,
        action: ApprovalAction,
    ) -> Result<Transition, LeaveError> {
        let stage = pending_stage(request).ok_or(LeaveError::InvalidTransition {
            status: request.status,
            action: action.as_str(),
        })?;

        self.authorize(request, stage, actor)?;

        let to = match (stage, action) {
            (_, ApprovalAction::Reject) => LeaveStatus::Rejected,
            (ApprovalStage::TeamLead, ApprovalAction::Approve) => LeaveStatus::TeamLeadApproved,
            (ApprovalStage::Hr, ApprovalAction::Approve) => {
                if requires_management(request.days_requested) {
                    LeaveStatus::HrApproved
                } else {
                    LeaveStatus::Approved
                }
            }
            (ApprovalStage::Management, ApprovalAction::Approve) => {
                LeaveStatus::ManagementApproved
            }
        };

        Ok(Transition {
            stage,
            action,
            from: request.status,
            to,
            final_approval: to.is_approved(),
        })
    }

    fn authorize(
        &self,
        request: &LeaveRequest,
        stage: ApprovalStage,
        actor: UserId,
    ) -> Result<(), LeaveError> {
        let permitted = match stage {
            ApprovalStage::TeamLead => match request.team_lead_id {
                Some(lead) => lead == actor && self.identity.is_team_lead(actor)?,
                None => self
                    .identity
                    .has_permission(actor, Permission::ApproveLeaveHr)?,
            },
            ApprovalStage::Hr => self
                .identity
                .has_permission(actor, Permission::ApproveLeaveHr)?,
            ApprovalStage::Management => self
                .identity
                .has_permission(actor, Permission::ApproveLeaveManagement)?,
        };

        if permitted {
            Ok(())
        } else {
            Err(LeaveError::Forbidden)
        }
    }
}

/// Records the stage decision and moves the request to the transition's status.
pub fn apply_transition(
    request: &mut LeaveRequest,
    transition: &Transition,
    actor: UserId,
    comment: &str,
    now: DateTime<Utc>,
) -> Result<(), LeaveError> {
    let slot = match transition.stage {
        ApprovalStage::TeamLead => &mut request.team_lead_decision,
        ApprovalStage::Hr => &mut request.hr_decision,
        ApprovalStage::Management => &mut request.management_decision,
    };
    if slot.is_some() {
        return Err(LeaveError::InvalidTransition {
            status: request.status,
            action: transition.action.as_str(),
        });
    }
    *slot = Some(StageDecision {
        actor_id: actor,
        decided_at: now,
        comment: comment.trim().to_string(),
    });
    request.status = transition.to;
    request.updated_at = now;
    Ok(())
}

/// Read-only view of where a request sits in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStatus {
    pub request_id: LeaveRequestId,
    pub current_status: LeaveStatus,
    pub next_approver: ApproverRole,
    pub requires_management: bool,
    pub is_final: bool,
}

pub fn workflow_status(request: &LeaveRequest) -> WorkflowStatus {
    let next_approver = match request.status {
        LeaveStatus::Pending if request.team_lead_id.is_some() => ApproverRole::TeamLead,
        LeaveStatus::Pending | LeaveStatus::TeamLeadApproved => ApproverRole::Hr,
        LeaveStatus::HrApproved if requires_management(request.days_requested) => {
            ApproverRole::Management
        }
        _ => ApproverRole::None,
    };

    WorkflowStatus {
        request_id: request.id,
        current_status: request.status,
        next_approver,
        requires_management: requires_management(request.days_requested),
        is_final: is_final(request),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineAction {
    Submitted,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    pub action: TimelineAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ApprovalStage>,
    pub actor_id: UserId,
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
    pub comment: String,
}

/// Reconstructs the ordered event history from the request's recorded decisions.
pub fn timeline<F>(request: &LeaveRequest, display_name: F) -> Vec<TimelineEvent>
where
    F: Fn(UserId) -> Option<String>,
{
    let name_of = |user: UserId| display_name(user).unwrap_or_else(|| user.to_string());

    let mut events = vec![TimelineEvent {
        action: TimelineAction::Submitted,
        stage: None,
        actor_id: request.user_id,
        actor_name: name_of(request.user_id),
        timestamp: request.created_at,
        comment: request.reason.clone(),
    }];

    let decisions: Vec<(ApprovalStage, &StageDecision)> = [
        (ApprovalStage::TeamLead, request.team_lead_decision.as_ref()),
        (ApprovalStage::Hr, request.hr_decision.as_ref()),
        (ApprovalStage::Management, request.management_decision.as_ref()),
    ]
    .into_iter()
    .filter_map(|(stage, decision)| decision.map(|decision| (stage, decision)))
    .collect();

    let last = decisions.len().saturating_sub(1);
    for (index, (stage, decision)) in decisions.into_iter().enumerate() {
        let action = if index == last && request.status == LeaveStatus::Rejected {
            TimelineAction::Rejected
        } else {
            TimelineAction::Approved
        };
        events.push(TimelineEvent {
            action,
            stage: Some(stage),
            actor_id: decision.actor_id,
            actor_name: name_of(decision.actor_id),
            timestamp: decision.decided_at,
            comment: decision.comment.clone(),
        });
    }

    if let Some(cancelled_at) = request.cancelled_at {
        events.push(TimelineEvent {
            action: TimelineAction::Cancelled,
            stage: None,
            actor_id: request.user_id,
            actor_name: name_of(request.user_id),
            timestamp: cancelled_at,
            comment: String::new(),
        });
    }

    events
}
