use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::access::{IdentityProvider, OrgDirectory, Permission, UserId};
use crate::config::LeaveConfig;

use super::approval::{
    apply_transition, pending_stage, requires_management, timeline, workflow_status,
    ApprovalAction, ApprovalStage, ApprovalStateMachine, TimelineEvent, Transition,
    WorkflowStatus,
};
use super::calendar::CalendarProjector;
use super::domain::{
    inclusive_days, CalendarEntry, LeaveBalance, LeaveNotification, LeavePolicy, LeaveRequest,
    LeaveRequestDraft, LeaveRequestId, LeaveRequestPatch, LeaveStatus, LeaveType, NotificationId,
};
use super::error::LeaveError;
use super::ledger::BalanceLedger;
use super::notifications::Notifier;
use super::policy::{PolicyCheck, PolicyResolver, PolicyUpdate};
use super::reports::{CalendarStats, LeaveRequestSummary, UserRequestStats, UtilizationStats};
use super::repository::{LeaveStore, LeaveTransaction, RequestFilter};

const MAX_REASON_LENGTH: usize = 500;
const MAX_AVAILABILITY_WINDOW_DAYS: i64 = 366;

/// Time source for notice calculations and audit stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Noon UTC on the given date.
    pub fn on(date: NaiveDate) -> Self {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        Self(DateTime::from_naive_utc_and_offset(noon, Utc))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Result of an approve or reject call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub request: LeaveRequest,
    pub workflow: WorkflowStatus,
    /// Balance after a final approval consumed the requested days.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<LeaveBalance>,
}

/// Façade composing policy validation, the balance ledger, the approval state machine, and the
/// calendar projection. Every operation runs in one store transaction.
pub struct LeaveWorkflowService<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    config: LeaveConfig,
}

impl<S, D> LeaveWorkflowService<S, D>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, config: LeaveConfig) -> Self {
        Self {
            store,
            directory,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &LeaveConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn current_year(&self) -> i32 {
        self.today().year()
    }

    fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T, LeaveError>
    where
        F: FnOnce(&mut dyn LeaveTransaction) -> Result<T, LeaveError>,
    {
        let result = self.store.transaction(work);
        log_fault(operation, &result);
        result
    }

    fn view<T, F>(&self, operation: &'static str, work: F) -> Result<T, LeaveError>
    where
        F: FnOnce(&dyn LeaveTransaction) -> Result<T, LeaveError>,
    {
        let result = self.store.read(work);
        log_fault(operation, &result);
        result
    }

    pub fn authenticate(&self, token: &str) -> Result<UserId, LeaveError> {
        Ok(self.directory.verify_actor(token)?)
    }

    pub fn authorize(&self, actor: UserId, permission: Permission) -> Result<(), LeaveError> {
        if self.directory.has_permission(actor, permission)? {
            Ok(())
        } else {
            Err(LeaveError::Forbidden)
        }
    }

    pub fn initialize_default_policies(&self, year: i32) -> Result<usize, LeaveError> {
        self.run("initialize_default_policies", |tx| {
            PolicyResolver::new(tx).initialize_default_policies(year)
        })
    }

    pub fn policies(&self, year: i32) -> Result<Vec<LeavePolicy>, LeaveError> {
        self.run("policies", |tx| PolicyResolver::new(tx).policies_by_year(year))
    }

    pub fn update_policy(
        &self,
        year: i32,
        leave_type: LeaveType,
        update: PolicyUpdate,
    ) -> Result<LeavePolicy, LeaveError> {
        let policy = self.run("update_policy", |tx| {
            PolicyResolver::new(tx).update_policy(year, leave_type, update)
        })?;
        info!(year, leave_type = %leave_type, active = policy.active, "leave policy updated");
        Ok(policy)
    }

    pub fn deactivate_policy(
        &self,
        year: i32,
        leave_type: LeaveType,
    ) -> Result<LeavePolicy, LeaveError> {
        self.run("deactivate_policy", |tx| {
            PolicyResolver::new(tx).deactivate_policy(year, leave_type)
        })
    }

    pub fn copy_policies(&self, from_year: i32, to_year: i32) -> Result<usize, LeaveError> {
        self.run("copy_policies", |tx| {
            PolicyResolver::new(tx).copy_from_year(from_year, to_year)
        })
    }

    /// Submit a new request as `requester`. The approver chain is frozen here.
    pub fn create_leave_request(
        &self,
        requester: UserId,
        draft: LeaveRequestDraft,
    ) -> Result<LeaveRequest, LeaveError> {
        let now = self.clock.now();
        let today = now.date_naive();
        validate_shape(&draft, today)?;

        let team_lead_id = self
            .directory
            .primary_team_lead(requester)?
            .filter(|lead| *lead != requester);
        let approvers = self.approvers_at(ApprovalStage::TeamLead, team_lead_id, &[requester])?;

        let request = self.run("create_leave_request", |tx| {
            let days_requested = admit(tx, requester, &draft, today, None)?;

            let request = LeaveRequest {
                id: tx.next_request_id()?,
                user_id: requester,
                leave_type: draft.leave_type,
                start_date: draft.start_date,
                end_date: draft.end_date,
                days_requested,
                reason: draft.reason.trim().to_string(),
                status: LeaveStatus::Pending,
                team_lead_id,
                team_lead_decision: None,
                hr_decision: None,
                management_decision: None,
                cancelled_at: None,
                created_at: now,
                updated_at: now,
            };
            tx.insert_request(request.clone())?;
            CalendarProjector::new(tx).project_for_request(&request)?;

            let mut notifier = Notifier::new(tx, now);
            for approver in &approvers {
                notifier.leave_requested(&request, *approver)?;
            }
            Ok(request)
        })?;

        info!(
            request = request.id.0,
            user = requester.0,
            leave_type = %request.leave_type,
            days = request.days_requested,
            "leave request submitted"
        );
        Ok(request)
    }

    pub fn get_leave_request(&self, id: LeaveRequestId) -> Result<LeaveRequest, LeaveError> {
        self.view("get_leave_request", |tx| load_request(tx, id))
    }

    /// Edit a pending request owned by `requester`; validation and projection are redone.
    pub fn update_leave_request(
        &self,
        id: LeaveRequestId,
        requester: UserId,
        patch: LeaveRequestPatch,
    ) -> Result<LeaveRequest, LeaveError> {
        let now = self.clock.now();
        let today = now.date_naive();

        self.run("update_leave_request", |tx| {
            let mut request = load_request(tx, id)?;
            if request.user_id != requester {
                return Err(LeaveError::Forbidden);
            }
            if request.status != LeaveStatus::Pending {
                return Err(LeaveError::InvalidTransition {
                    status: request.status,
                    action: "update",
                });
            }

            let mut draft = LeaveRequestDraft::from(&request);
            patch.apply_to(&mut draft);
            validate_shape(&draft, today)?;
            let days_requested = admit(tx, requester, &draft, today, Some(id))?;

            request.leave_type = draft.leave_type;
            request.start_date = draft.start_date;
            request.end_date = draft.end_date;
            request.reason = draft.reason.trim().to_string();
            request.days_requested = days_requested;
            request.updated_at = now;

            tx.update_request(request.clone())?;
            CalendarProjector::new(tx).project_for_request(&request)?;
            Ok(request)
        })
    }

    /// Requester-initiated cancellation while no approval beyond the team lead exists.
    pub fn cancel_leave_request(
        &self,
        id: LeaveRequestId,
        requester: UserId,
    ) -> Result<LeaveRequest, LeaveError> {
        let now = self.clock.now();

        let request = self.run("cancel_leave_request", |tx| {
            let mut request = load_request(tx, id)?;
            if request.user_id != requester {
                return Err(LeaveError::Forbidden);
            }
            if !request.status.is_cancellable() {
                return Err(LeaveError::InvalidTransition {
                    status: request.status,
                    action: "cancel",
                });
            }

            request.status = LeaveStatus::Cancelled;
            request.cancelled_at = Some(now);
            request.updated_at = now;

            tx.update_request(request.clone())?;
            CalendarProjector::new(tx).update_status(id, LeaveStatus::Cancelled)?;
            Notifier::new(tx, now).cancelled(&request)?;
            Ok(request)
        })?;

        info!(request = id.0, user = requester.0, "leave request cancelled");
        Ok(request)
    }

    pub fn approve(
        &self,
        id: LeaveRequestId,
        actor: UserId,
        comment: &str,
    ) -> Result<DecisionOutcome, LeaveError> {
        self.decide(id, actor, ApprovalAction::Approve, comment)
    }

    pub fn reject(
        &self,
        id: LeaveRequestId,
        actor: UserId,
        comment: &str,
    ) -> Result<DecisionOutcome, LeaveError> {
        self.decide(id, actor, ApprovalAction::Reject, comment)
    }

    fn decide(
        &self,
        id: LeaveRequestId,
        actor: UserId,
        action: ApprovalAction,
        comment: &str,
    ) -> Result<DecisionOutcome, LeaveError> {
        let now = self.clock.now();
        let threshold = self.config.low_balance_threshold;
        let machine = ApprovalStateMachine::new(self.directory.as_ref());

        let (outcome, transition) = self.run("decide_leave_request", |tx| {
            let mut request = load_request(tx, id)?;
            let transition = machine.transition(&request, actor, action)?;
            apply_transition(&mut request, &transition, actor, comment, now)?;
            let next_stage = pending_stage(&request);

            tx.update_request(request.clone())?;
            CalendarProjector::new(tx).update_status(id, request.status)?;

            let balance = if transition.final_approval {
                let balance = BalanceLedger::new(tx).increment_used(
                    request.user_id,
                    request.year(),
                    request.leave_type,
                    request.days_requested,
                )?;
                let mut notifier = Notifier::new(tx, now);
                notifier.decision(&request, true)?;
                if balance.remaining_days() <= threshold {
                    notifier.balance_low(
                        request.user_id,
                        request.leave_type,
                        balance.remaining_days(),
                    )?;
                }
                Some(balance)
            } else if transition.to == LeaveStatus::Rejected {
                Notifier::new(tx, now).decision(&request, false)?;
                None
            } else {
                if let Some(stage) = next_stage {
                    let approvers =
                        self.approvers_at(stage, request.team_lead_id, &[request.user_id, actor])?;
                    let mut notifier = Notifier::new(tx, now);
                    for approver in approvers {
                        notifier.approval_required(&request, approver, stage)?;
                    }
                }
                None
            };

            let outcome = DecisionOutcome {
                workflow: workflow_status(&request),
                request,
                balance,
            };
            Ok((outcome, transition))
        })?;

        log_transition(id, actor, &transition);
        Ok(outcome)
    }

    /// Users who may decide at `stage`, minus `skip`. The team-lead stage falls back to HR
    /// when no lead was frozen.
    fn approvers_at(
        &self,
        stage: ApprovalStage,
        team_lead: Option<UserId>,
        skip: &[UserId],
    ) -> Result<Vec<UserId>, LeaveError> {
        let approvers = match (stage, team_lead) {
            (ApprovalStage::TeamLead, Some(lead)) => vec![lead],
            (ApprovalStage::TeamLead, None) | (ApprovalStage::Hr, _) => self
                .directory
                .users_with_permission(Permission::ApproveLeaveHr)?,
            (ApprovalStage::Management, _) => self
                .directory
                .users_with_permission(Permission::ApproveLeaveManagement)?,
        };
        Ok(approvers
            .into_iter()
            .filter(|user| !skip.contains(user))
            .collect())
    }

    pub fn workflow_status(&self, id: LeaveRequestId) -> Result<WorkflowStatus, LeaveError> {
        let request = self.get_leave_request(id)?;
        Ok(workflow_status(&request))
    }

    pub fn timeline(&self, id: LeaveRequestId) -> Result<Vec<TimelineEvent>, LeaveError> {
        let request = self.get_leave_request(id)?;
        let directory = self.directory.as_ref();
        Ok(timeline(&request, |user| {
            directory.display_name(user).ok().flatten()
        }))
    }

    /// Stored balances for the year; empty when never initialized.
    pub fn balances(&self, user: UserId, year: i32) -> Result<Vec<LeaveBalance>, LeaveError> {
        self.run("balances", |tx| BalanceLedger::new(tx).balances_for_user(user, year))
    }

    /// Opens the year's balances (see [`BalanceLedger::open_year`]) and returns every balance the
    /// user holds for the year.
    pub fn initialize_or_reset_balance(
        &self,
        user: UserId,
        year: i32,
    ) -> Result<Vec<LeaveBalance>, LeaveError> {
        self.run("initialize_or_reset_balance", |tx| {
            if tx.policies_for_year(year)?.is_empty() {
                return Err(LeaveError::not_found(format!("policies for {year}")));
            }
            let mut ledger = BalanceLedger::new(tx);
            let (created, rollover) = ledger.open_year(user, year)?;
            if !created.is_empty() {
                info!(user = user.0, year, created = created.len(), rollover, "leave balances opened");
            }
            ledger.balances_for_user(user, year)
        })
    }

    pub fn adjust_balance(
        &self,
        user: UserId,
        year: i32,
        leave_type: LeaveType,
        total_allocated: i32,
        carry_over_days: i32,
    ) -> Result<LeaveBalance, LeaveError> {
        let balance = self.run("adjust_balance", |tx| {
            BalanceLedger::new(tx).adjust_allocation(
                user,
                year,
                leave_type,
                total_allocated,
                carry_over_days,
            )
        })?;
        info!(
            user = user.0,
            year,
            leave_type = %leave_type,
            total_allocated,
            carry_over_days,
            "leave balance adjusted"
        );
        Ok(balance)
    }

    pub fn utilization_stats(&self, year: i32) -> Result<Vec<UtilizationStats>, LeaveError> {
        self.run("utilization_stats", |tx| BalanceLedger::new(tx).utilization(year))
    }

    /// Balances at or below `threshold`, defaulting to the configured low-balance mark.
    pub fn low_balances(
        &self,
        year: i32,
        threshold: Option<i32>,
    ) -> Result<Vec<LeaveBalance>, LeaveError> {
        let threshold = threshold.unwrap_or(self.config.low_balance_threshold);
        self.run("low_balances", |tx| {
            BalanceLedger::new(tx).low_balances(year, threshold)
        })
    }

    /// The user's requests, newest start date first.
    pub fn requests_for_user(
        &self,
        user: UserId,
        year: Option<i32>,
    ) -> Result<Vec<LeaveRequest>, LeaveError> {
        let mut filter = RequestFilter::for_user(user);
        if let Some(year) = year {
            filter = filter.in_year(year);
        }
        let mut requests = self.view("requests_for_user", |tx| Ok(tx.requests(&filter)?))?;
        requests.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    pub fn request_stats(&self, user: UserId) -> Result<UserRequestStats, LeaveError> {
        let requests = self.view("request_stats", |tx| {
            Ok(tx.requests(&RequestFilter::for_user(user))?)
        })?;
        Ok(UserRequestStats::from_requests(user, &requests))
    }

    pub fn request_summary(&self, year: i32) -> Result<LeaveRequestSummary, LeaveError> {
        let requests = self.view("request_summary", |tx| {
            Ok(tx.requests(&RequestFilter::default().in_year(year))?)
        })?;
        Ok(LeaveRequestSummary::from_requests(year, &requests))
    }

    /// Requests waiting on `actor` at `stage`, oldest first.
    pub fn pending_approvals(
        &self,
        actor: UserId,
        stage: ApprovalStage,
    ) -> Result<Vec<LeaveRequest>, LeaveError> {
        match stage {
            ApprovalStage::TeamLead => {}
            ApprovalStage::Hr => self.authorize(actor, Permission::ApproveLeaveHr)?,
            ApprovalStage::Management => {
                self.authorize(actor, Permission::ApproveLeaveManagement)?
            }
        }

        let mut queue = self.view("pending_approvals", |tx| {
            let requests = match stage {
                ApprovalStage::TeamLead => tx.requests(
                    &RequestFilter::default()
                        .with_team_lead(actor)
                        .with_status(LeaveStatus::Pending),
                )?,
                ApprovalStage::Hr => {
                    let mut requests = tx.requests(
                        &RequestFilter::default().with_status(LeaveStatus::TeamLeadApproved),
                    )?;
                    requests.extend(
                        tx.requests(&RequestFilter::default().with_status(LeaveStatus::Pending))?
                            .into_iter()
                            .filter(|request| request.team_lead_id.is_none()),
                    );
                    requests
                }
                ApprovalStage::Management => tx
                    .requests(&RequestFilter::default().with_status(LeaveStatus::HrApproved))?
                    .into_iter()
                    .filter(|request| requires_management(request.days_requested))
                    .collect(),
            };
            Ok(requests)
        })?;
        queue.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(queue)
    }

    pub fn calendar(&self, user: UserId, year: i32) -> Result<Vec<CalendarEntry>, LeaveError> {
        self.run("calendar", |tx| {
            CalendarProjector::new(tx).entries_for_year(user, year)
        })
    }

    pub fn calendar_for_request(
        &self,
        id: LeaveRequestId,
    ) -> Result<Vec<CalendarEntry>, LeaveError> {
        self.run("calendar_for_request", |tx| {
            CalendarProjector::new(tx).entries_for_request(id)
        })
    }

    pub fn team_calendar(
        &self,
        team_lead: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarEntry>, LeaveError> {
        validate_window(from, to)?;
        self.run("team_calendar", |tx| {
            CalendarProjector::new(tx).team_entries(team_lead, from, to)
        })
    }

    pub fn calendar_stats(
        &self,
        user: UserId,
        year: i32,
    ) -> Result<CalendarStats, LeaveError> {
        self.run("calendar_stats", |tx| CalendarProjector::new(tx).stats(user, year))
    }

    pub fn is_date_available(&self, user: UserId, date: NaiveDate) -> Result<bool, LeaveError> {
        self.run("is_date_available", |tx| {
            CalendarProjector::new(tx).is_date_available(user, date)
        })
    }

    pub fn available_dates(
        &self,
        user: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, LeaveError> {
        validate_window(from, to)?;
        self.run("available_dates", |tx| {
            CalendarProjector::new(tx).available_dates(user, from, to)
        })
    }

    pub fn notifications(
        &self,
        user: UserId,
        unread_only: bool,
    ) -> Result<Vec<LeaveNotification>, LeaveError> {
        let now = self.clock.now();
        self.run("notifications", |tx| {
            Notifier::new(tx, now).for_user(user, unread_only)
        })
    }

    pub fn unread_notification_count(&self, user: UserId) -> Result<usize, LeaveError> {
        let now = self.clock.now();
        self.run("unread_notification_count", |tx| {
            Notifier::new(tx, now).unread_count(user)
        })
    }

    pub fn mark_notification_read(
        &self,
        id: NotificationId,
        user: UserId,
    ) -> Result<LeaveNotification, LeaveError> {
        let now = self.clock.now();
        self.run("mark_notification_read", |tx| {
            Notifier::new(tx, now).mark_read(id, user)
        })
    }

    pub fn mark_all_notifications_read(&self, user: UserId) -> Result<usize, LeaveError> {
        let now = self.clock.now();
        self.run("mark_all_notifications_read", |tx| {
            Notifier::new(tx, now).mark_all_read(user)
        })
    }
}

fn log_fault<T>(operation: &'static str, result: &Result<T, LeaveError>) {
    match result {
        Err(err @ (LeaveError::Storage(_) | LeaveError::Identity(_))) => {
            error!(operation, error = %err, "leave workflow system fault");
        }
        Err(err @ LeaveError::InvalidTransition { .. }) => {
            debug!(operation, error = %err, "stale or repeated workflow action");
        }
        _ => {}
    }
}

fn load_request(
    tx: &dyn LeaveTransaction,
    id: LeaveRequestId,
) -> Result<LeaveRequest, LeaveError> {
    tx.request(id)?.ok_or_else(|| LeaveError::not_found(id))
}

fn validate_shape(draft: &LeaveRequestDraft, today: NaiveDate) -> Result<(), LeaveError> {
    if draft.end_date < draft.start_date {
        return Err(LeaveError::Validation(
            "end date must not be before start date".to_string(),
        ));
    }
    if draft.start_date < today {
        return Err(LeaveError::Validation(
            "start date must not be in the past".to_string(),
        ));
    }
    if draft.reason.chars().count() > MAX_REASON_LENGTH {
        return Err(LeaveError::Validation(format!(
            "reason must be at most {MAX_REASON_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_window(from: NaiveDate, to: NaiveDate) -> Result<(), LeaveError> {
    if to < from {
        return Err(LeaveError::Validation(
            "window end must not be before its start".to_string(),
        ));
    }
    if (to - from).num_days() > MAX_AVAILABILITY_WINDOW_DAYS {
        return Err(LeaveError::Validation(format!(
            "window must span at most {MAX_AVAILABILITY_WINDOW_DAYS} days"
        )));
    }
    Ok(())
}

/// Policy, balance, and overlap checks shared by create and update. Returns the day count.
fn admit(
    tx: &mut dyn LeaveTransaction,
    requester: UserId,
    draft: &LeaveRequestDraft,
    today: NaiveDate,
    exclude: Option<LeaveRequestId>,
) -> Result<i32, LeaveError> {
    let days_requested = inclusive_days(draft.start_date, draft.end_date);
    let year = draft.start_date.year();

    PolicyResolver::new(tx).validate_against_policy(
        PolicyCheck {
            leave_type: draft.leave_type,
            start_date: draft.start_date,
            days_requested,
        },
        today,
    )?;

    let mut ledger = BalanceLedger::new(tx);
    ledger.open_year(requester, year)?;
    let balance = ledger.get_balance(requester, year, draft.leave_type)?;
    if balance.remaining_days() < days_requested {
        return Err(LeaveError::InsufficientBalance {
            remaining: balance.remaining_days(),
            requested: days_requested,
        });
    }

    if CalendarProjector::new(tx).has_overlap(
        requester,
        draft.start_date,
        draft.end_date,
        exclude,
    )? {
        return Err(LeaveError::OverlappingLeave);
    }

    Ok(days_requested)
}

fn log_transition(id: LeaveRequestId, actor: UserId, transition: &Transition) {
    info!(
        request = id.0,
        actor = actor.0,
        stage = ?transition.stage,
        from = %transition.from,
        to = %transition.to,
        final_approval = transition.final_approval,
        "leave request decided"
    );
}
