use std::sync::Arc;

use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::access::{Directory, DirectoryUser, Role, RoleCatalog, UserId};
use crate::config::LeaveConfig;
use crate::workflows::leave::domain::{
    LeaveRequest, LeaveRequestDraft, LeaveRequestId, LeaveStatus, LeaveType,
};
use crate::workflows::leave::error::LeaveError;
use crate::workflows::leave::repository::{LeaveStore, LeaveTransaction, RepositoryError};
use crate::workflows::leave::{FixedClock, InMemoryLeaveStore, LeaveWorkflowService};

pub(super) const ALICE: UserId = UserId(1);
pub(super) const TOM: UserId = UserId(2);
pub(super) const HANNAH: UserId = UserId(3);
pub(super) const MAX: UserId = UserId(4);
pub(super) const BOB: UserId = UserId(5);

pub(super) type MemoryService = LeaveWorkflowService<InMemoryLeaveStore, Directory>;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Monday, 2 March 2026.
pub(super) fn today() -> NaiveDate {
    date(2026, 3, 2)
}

pub(super) fn now() -> DateTime<Utc> {
    FixedClock::on(today()).0
}

/// Alice and Bob report to Tom; Hannah is HR, Max is management.
pub(super) fn directory() -> Directory {
    let directory = Directory::new(Arc::new(RoleCatalog::predefined()));
    directory.add_team("DEVELOPMENT_TEAM", "Engineering", Some(TOM));
    directory.add_team("HR_TEAM", "Human resources", None);
    directory.add_team("MANAGEMENT_TEAM", "Leadership", None);

    directory.add_user(
        DirectoryUser::new(1, "Alice", "Martin", &[Role::Employee]).in_team("DEVELOPMENT_TEAM"),
    );
    directory.add_user(
        DirectoryUser::new(2, "Tom", "Reyes", &[Role::Employee, Role::TeamLead])
            .in_team("DEVELOPMENT_TEAM"),
    );
    directory.add_user(DirectoryUser::new(3, "Hannah", "Ode", &[Role::Hr]).in_team("HR_TEAM"));
    directory.add_user(
        DirectoryUser::new(4, "Max", "Lindqvist", &[Role::Management]).in_team("MANAGEMENT_TEAM"),
    );
    directory.add_user(
        DirectoryUser::new(5, "Bob", "Keller", &[Role::Employee]).in_team("DEVELOPMENT_TEAM"),
    );

    for (token, user) in [
        ("alice-token", ALICE),
        ("tom-token", TOM),
        ("hannah-token", HANNAH),
        ("max-token", MAX),
        ("bob-token", BOB),
    ] {
        directory.issue_token(token, user).expect("token issued");
    }
    directory
}

pub(super) fn service_with_store<S>(store: Arc<S>) -> LeaveWorkflowService<S, Directory>
where
    S: LeaveStore + 'static,
{
    LeaveWorkflowService::new(store, Arc::new(directory()), LeaveConfig::default())
        .with_clock(Arc::new(FixedClock::on(today())))
}

/// Service over a fresh in-memory store with 2026 and 2027 policies seeded.
pub(super) fn build_service() -> (Arc<MemoryService>, Arc<InMemoryLeaveStore>) {
    let store = Arc::new(InMemoryLeaveStore::new());
    let service = service_with_store(store.clone());
    for year in [2026, 2027] {
        service
            .initialize_default_policies(year)
            .expect("policies seeded");
    }
    (Arc::new(service), store)
}

pub(super) fn draft(leave_type: LeaveType, start: NaiveDate, end: NaiveDate) -> LeaveRequestDraft {
    LeaveRequestDraft {
        leave_type,
        start_date: start,
        end_date: end,
        reason: "Family trip".to_string(),
    }
}

/// Three annual days two weeks out.
pub(super) fn short_annual() -> LeaveRequestDraft {
    draft(LeaveType::Annual, date(2026, 3, 16), date(2026, 3, 18))
}

/// Five annual days in April, long enough to need management.
pub(super) fn long_annual() -> LeaveRequestDraft {
    draft(LeaveType::Annual, date(2026, 4, 6), date(2026, 4, 10))
}

pub(super) fn submit(service: &MemoryService, draft: LeaveRequestDraft) -> LeaveRequest {
    service
        .create_leave_request(ALICE, draft)
        .expect("request admitted")
}

pub(super) fn assert_status(service: &MemoryService, id: LeaveRequestId, expected: LeaveStatus) {
    let request = service.get_leave_request(id).expect("request loads");
    assert_eq!(request.status, expected);
}

/// Runs `work` in one store transaction.
pub(super) fn within<T>(
    store: &InMemoryLeaveStore,
    work: impl FnOnce(&mut dyn LeaveTransaction) -> Result<T, LeaveError>,
) -> Result<T, LeaveError> {
    store.transaction(work)
}

/// Bare store holding only the 2026 baseline policies.
pub(super) fn seeded_store() -> InMemoryLeaveStore {
    let store = InMemoryLeaveStore::new();
    within(&store, |tx| {
        for policy in crate::workflows::leave::default_policies(2026) {
            tx.insert_policy(policy)?;
        }
        Ok(())
    })
    .expect("policies seeded");
    store
}

/// Store whose every unit of work fails before touching data.
pub(super) struct UnavailableStore;

impl LeaveStore for UnavailableStore {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LeaveTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) fn authorized(
    request: axum::http::request::Builder,
    token: &str,
) -> axum::http::request::Builder {
    request.header(header::AUTHORIZATION, format!("Bearer {token}"))
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Request<axum::body::Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = authorized(builder, token);
    }
    builder
        .body(axum::body::Body::from(
            serde_json::to_vec(&body).expect("serialize body"),
        ))
        .expect("request builds")
}

pub(super) fn get_request(uri: &str, token: Option<&str>) -> Request<axum::body::Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = authorized(builder, token);
    }
    builder
        .body(axum::body::Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status_code(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
