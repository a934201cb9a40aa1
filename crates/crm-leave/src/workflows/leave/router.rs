use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::access::{IdentityProvider, OrgDirectory, Permission, UserId};

use super::approval::ApprovalStage;
use super::domain::{
    LeaveRequest, LeaveRequestDraft, LeaveRequestId, LeaveRequestPatch, LeaveType, NotificationId,
};
use super::error::LeaveError;
use super::policy::PolicyUpdate;
use super::repository::LeaveStore;
use super::service::LeaveWorkflowService;

type Shared<S, D> = State<Arc<LeaveWorkflowService<S, D>>>;

/// Router builder exposing the leave workflow under `/api/v1/leave`.
pub fn leave_router<S, D>(service: Arc<LeaveWorkflowService<S, D>>) -> Router
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/leave/requests",
            post(create_handler::<S, D>).get(list_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/requests/:request_id",
            get(request_handler::<S, D>).put(update_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/requests/:request_id/cancel",
            post(cancel_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/requests/:request_id/approve",
            post(approve_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/requests/:request_id/reject",
            post(reject_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/requests/:request_id/workflow",
            get(workflow_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/requests/:request_id/timeline",
            get(timeline_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/approvals/:stage",
            get(approvals_handler::<S, D>),
        )
        .route("/api/v1/leave/balances", get(balances_handler::<S, D>))
        .route(
            "/api/v1/leave/balances/initialize",
            post(initialize_balances_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/admin/balances",
            put(adjust_balance_handler::<S, D>),
        )
        .route("/api/v1/leave/policies", get(policies_handler::<S, D>))
        .route(
            "/api/v1/leave/policies/initialize",
            post(initialize_policies_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/policies/copy",
            post(copy_policies_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/policies/:year/:leave_type",
            put(update_policy_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/reports/utilization",
            get(utilization_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/reports/summary",
            get(summary_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/reports/low-balances",
            get(low_balances_handler::<S, D>),
        )
        .route("/api/v1/leave/calendar", get(calendar_handler::<S, D>))
        .route(
            "/api/v1/leave/calendar/stats",
            get(calendar_stats_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/calendar/available",
            get(available_dates_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/calendar/team",
            get(team_calendar_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/notifications",
            get(notifications_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/notifications/count",
            get(unread_count_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/notifications/read-all",
            post(mark_all_read_handler::<S, D>),
        )
        .route(
            "/api/v1/leave/notifications/:notification_id/read",
            post(mark_read_handler::<S, D>),
        )
        .with_state(service)
}

/// Resolves the `Authorization: Bearer <token>` header to an actor.
fn actor<S, D>(
    service: &LeaveWorkflowService<S, D>,
    headers: &HeaderMap,
) -> Result<UserId, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(LeaveError::Unauthorized)?;
    service.authenticate(token)
}

/// Owner, frozen team lead, or a holder of `VIEW_LEAVE_REQUESTS`.
fn ensure_can_view<S, D>(
    service: &LeaveWorkflowService<S, D>,
    request: &LeaveRequest,
    actor: UserId,
) -> Result<(), LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    if request.user_id == actor || request.team_lead_id == Some(actor) {
        return Ok(());
    }
    service.authorize(actor, Permission::ViewLeaveRequests)
}

/// Acting on another user's data requires `VIEW_LEAVE_REPORTS`.
fn subject<S, D>(
    service: &LeaveWorkflowService<S, D>,
    actor: UserId,
    requested: Option<u64>,
) -> Result<UserId, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    match requested.map(UserId) {
        Some(user) if user != actor => {
            service.authorize(actor, Permission::ViewLeaveReports)?;
            Ok(user)
        }
        _ => Ok(actor),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct YearQuery {
    pub year: Option<i32>,
    pub user_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DecisionBody {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WindowQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub user_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LowBalanceQuery {
    pub year: Option<i32>,
    pub threshold: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CopyPoliciesBody {
    pub from_year: i32,
    pub to_year: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdjustBalanceBody {
    pub user_id: u64,
    pub year: i32,
    pub leave_type: LeaveType,
    pub total_allocated: i32,
    #[serde(default)]
    pub carry_over_days: i32,
}

pub(crate) async fn create_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Json(draft): Json<LeaveRequestDraft>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let requester = actor(&service, &headers)?;
    service.authorize(requester, Permission::AskLeave)?;
    let request = service.create_leave_request(requester, draft)?;
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

pub(crate) async fn list_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let user = subject(&service, caller, query.user_id)?;
    let requests = service.requests_for_user(user, query.year)?;
    Ok(Json(requests).into_response())
}

pub(crate) async fn request_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let request = service.get_leave_request(LeaveRequestId(request_id))?;
    ensure_can_view(&service, &request, caller)?;
    Ok(Json(request).into_response())
}

pub(crate) async fn update_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
    Json(patch): Json<LeaveRequestPatch>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let requester = actor(&service, &headers)?;
    let request = service.update_leave_request(LeaveRequestId(request_id), requester, patch)?;
    Ok(Json(request).into_response())
}

pub(crate) async fn cancel_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let requester = actor(&service, &headers)?;
    let request = service.cancel_leave_request(LeaveRequestId(request_id), requester)?;
    Ok(Json(request).into_response())
}

pub(crate) async fn approve_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
    body: Option<Json<DecisionBody>>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let approver = actor(&service, &headers)?;
    let comment = body.map(|Json(body)| body.comment).unwrap_or_default();
    let outcome = service.approve(LeaveRequestId(request_id), approver, &comment)?;
    Ok(Json(outcome).into_response())
}

pub(crate) async fn reject_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
    body: Option<Json<DecisionBody>>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let approver = actor(&service, &headers)?;
    let comment = body.map(|Json(body)| body.comment).unwrap_or_default();
    let outcome = service.reject(LeaveRequestId(request_id), approver, &comment)?;
    Ok(Json(outcome).into_response())
}

pub(crate) async fn workflow_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let id = LeaveRequestId(request_id);
    let request = service.get_leave_request(id)?;
    ensure_can_view(&service, &request, caller)?;
    Ok(Json(service.workflow_status(id)?).into_response())
}

pub(crate) async fn timeline_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let id = LeaveRequestId(request_id);
    let request = service.get_leave_request(id)?;
    ensure_can_view(&service, &request, caller)?;
    let events = service.timeline(id)?;
    Ok(Json(json!({
        "request_id": id,
        "events": events,
    }))
    .into_response())
}

pub(crate) async fn approvals_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(stage): Path<ApprovalStage>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let approver = actor(&service, &headers)?;
    let queue = service.pending_approvals(approver, stage)?;
    Ok(Json(queue).into_response())
}

pub(crate) async fn balances_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let user = subject(&service, caller, query.user_id)?;
    let year = query.year.unwrap_or_else(|| service.current_year());
    Ok(Json(service.balances(user, year)?).into_response())
}

pub(crate) async fn initialize_balances_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let user = match query.user_id.map(UserId) {
        Some(user) if user != caller => {
            service.authorize(caller, Permission::ManageLeavePolicies)?;
            user
        }
        _ => caller,
    };
    let year = query.year.unwrap_or_else(|| service.current_year());
    Ok(Json(service.initialize_or_reset_balance(user, year)?).into_response())
}

pub(crate) async fn adjust_balance_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Json(body): Json<AdjustBalanceBody>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let admin = actor(&service, &headers)?;
    service.authorize(admin, Permission::ManageLeavePolicies)?;
    let balance = service.adjust_balance(
        UserId(body.user_id),
        body.year,
        body.leave_type,
        body.total_allocated,
        body.carry_over_days,
    )?;
    Ok(Json(balance).into_response())
}

pub(crate) async fn policies_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    actor(&service, &headers)?;
    let year = query.year.unwrap_or_else(|| service.current_year());
    Ok(Json(service.policies(year)?).into_response())
}

pub(crate) async fn initialize_policies_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let admin = actor(&service, &headers)?;
    service.authorize(admin, Permission::ManageLeavePolicies)?;
    let year = query.year.unwrap_or_else(|| service.current_year());
    let created = service.initialize_default_policies(year)?;
    Ok(Json(json!({ "year": year, "created": created })).into_response())
}

pub(crate) async fn update_policy_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path((year, leave_type)): Path<(i32, LeaveType)>,
    Json(update): Json<PolicyUpdate>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let admin = actor(&service, &headers)?;
    service.authorize(admin, Permission::ManageLeavePolicies)?;
    Ok(Json(service.update_policy(year, leave_type, update)?).into_response())
}

pub(crate) async fn copy_policies_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Json(body): Json<CopyPoliciesBody>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let admin = actor(&service, &headers)?;
    service.authorize(admin, Permission::ManageLeavePolicies)?;
    let copied = service.copy_policies(body.from_year, body.to_year)?;
    Ok(Json(json!({
        "from_year": body.from_year,
        "to_year": body.to_year,
        "copied": copied,
    }))
    .into_response())
}

pub(crate) async fn utilization_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let viewer = actor(&service, &headers)?;
    service.authorize(viewer, Permission::ViewLeaveReports)?;
    let year = query.year.unwrap_or_else(|| service.current_year());
    Ok(Json(service.utilization_stats(year)?).into_response())
}

pub(crate) async fn summary_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let viewer = actor(&service, &headers)?;
    service.authorize(viewer, Permission::ViewLeaveReports)?;
    match query.user_id {
        Some(user) => Ok(Json(service.request_stats(UserId(user))?).into_response()),
        None => {
            let year = query.year.unwrap_or_else(|| service.current_year());
            Ok(Json(service.request_summary(year)?).into_response())
        }
    }
}

pub(crate) async fn low_balances_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<LowBalanceQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let viewer = actor(&service, &headers)?;
    service.authorize(viewer, Permission::ViewLeaveReports)?;
    let year = query.year.unwrap_or_else(|| service.current_year());
    Ok(Json(service.low_balances(year, query.threshold)?).into_response())
}

pub(crate) async fn calendar_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let user = subject(&service, caller, query.user_id)?;
    let year = query.year.unwrap_or_else(|| service.current_year());
    Ok(Json(service.calendar(user, year)?).into_response())
}

pub(crate) async fn calendar_stats_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<YearQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let user = subject(&service, caller, query.user_id)?;
    let year = query.year.unwrap_or_else(|| service.current_year());
    Ok(Json(service.calendar_stats(user, year)?).into_response())
}

pub(crate) async fn available_dates_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<WindowQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let user = subject(&service, caller, query.user_id)?;
    let dates = service.available_dates(user, query.from, query.to)?;
    Ok(Json(json!({
        "user_id": user,
        "from": query.from,
        "to": query.to,
        "available": dates,
    }))
    .into_response())
}

pub(crate) async fn team_calendar_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<WindowQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let caller = actor(&service, &headers)?;
    let lead = subject(&service, caller, query.user_id)?;
    Ok(Json(service.team_calendar(lead, query.from, query.to)?).into_response())
}

pub(crate) async fn notifications_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let user = actor(&service, &headers)?;
    Ok(Json(service.notifications(user, query.unread_only)?).into_response())
}

pub(crate) async fn unread_count_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let user = actor(&service, &headers)?;
    let unread = service.unread_notification_count(user)?;
    Ok(Json(json!({ "unread": unread })).into_response())
}

pub(crate) async fn mark_read_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
    Path(notification_id): Path<u64>,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let user = actor(&service, &headers)?;
    let notification = service.mark_notification_read(NotificationId(notification_id), user)?;
    Ok(Json(notification).into_response())
}

pub(crate) async fn mark_all_read_handler<S, D>(
    State(service): Shared<S, D>,
    headers: HeaderMap,
) -> Result<Response, LeaveError>
where
    S: LeaveStore + 'static,
    D: IdentityProvider + OrgDirectory + 'static,
{
    let user = actor(&service, &headers)?;
    let marked = service.mark_all_notifications_read(user)?;
    Ok(Json(json!({ "marked": marked })).into_response())
}
