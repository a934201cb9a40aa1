use chrono::NaiveDate;

use crate::access::UserId;

use super::domain::{
    CalendarEntry, LeaveBalance, LeaveNotification, LeavePolicy, LeaveRequest, LeaveRequestId,
    LeaveStatus, LeaveType, NotificationId,
};

/// Row-level operations available inside one unit of work.
///
/// Inserts fail with [`RepositoryError::Conflict`] when the key already exists and updates fail
/// with [`RepositoryError::NotFound`] when it does not.
pub trait LeaveTransaction {
    fn policies_for_year(&self, year: i32) -> Result<Vec<LeavePolicy>, RepositoryError>;
    fn policy(&self, year: i32, leave_type: LeaveType)
        -> Result<Option<LeavePolicy>, RepositoryError>;
    fn insert_policy(&mut self, policy: LeavePolicy) -> Result<(), RepositoryError>;
    fn update_policy(&mut self, policy: LeavePolicy) -> Result<(), RepositoryError>;

    fn balance(
        &self,
        user: UserId,
        year: i32,
        leave_type: LeaveType,
    ) -> Result<Option<LeaveBalance>, RepositoryError>;
    fn balances_for_user(&self, user: UserId, year: i32)
        -> Result<Vec<LeaveBalance>, RepositoryError>;
    fn balances_for_year(&self, year: i32) -> Result<Vec<LeaveBalance>, RepositoryError>;
    fn insert_balance(&mut self, balance: LeaveBalance) -> Result<(), RepositoryError>;
    fn update_balance(&mut self, balance: LeaveBalance) -> Result<(), RepositoryError>;

    fn next_request_id(&mut self) -> Result<LeaveRequestId, RepositoryError>;
    fn request(&self, id: LeaveRequestId) -> Result<Option<LeaveRequest>, RepositoryError>;
    fn requests(&self, filter: &RequestFilter) -> Result<Vec<LeaveRequest>, RepositoryError>;
    fn insert_request(&mut self, request: LeaveRequest) -> Result<(), RepositoryError>;
    fn update_request(&mut self, request: LeaveRequest) -> Result<(), RepositoryError>;

    fn calendar_entries(&self, filter: &CalendarFilter)
        -> Result<Vec<CalendarEntry>, RepositoryError>;
    fn delete_calendar_entries(&mut self, request: LeaveRequestId)
        -> Result<usize, RepositoryError>;
    fn insert_calendar_entries(&mut self, entries: Vec<CalendarEntry>)
        -> Result<(), RepositoryError>;
    fn update_calendar_status(
        &mut self,
        request: LeaveRequestId,
        status: LeaveStatus,
    ) -> Result<usize, RepositoryError>;

    fn next_notification_id(&mut self) -> Result<NotificationId, RepositoryError>;
    fn notification(&self, id: NotificationId)
        -> Result<Option<LeaveNotification>, RepositoryError>;
    fn notifications_for_user(&self, user: UserId)
        -> Result<Vec<LeaveNotification>, RepositoryError>;
    fn insert_notification(&mut self, notification: LeaveNotification)
        -> Result<(), RepositoryError>;
    fn update_notification(&mut self, notification: LeaveNotification)
        -> Result<(), RepositoryError>;
}

/// Storage abstraction handing out all-or-nothing units of work.
///
/// Implementations serialize writers and discard every effect of `work` when it returns `Err`.
pub trait LeaveStore: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LeaveTransaction) -> Result<T, E>,
        E: From<RepositoryError>;

    /// Read-only unit of work against committed state.
    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn LeaveTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.transaction(|tx| work(&*tx))
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("{0} not found")]
    NotFound(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Conjunctive request filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub user_id: Option<UserId>,
    pub status: Option<LeaveStatus>,
    pub team_lead_id: Option<UserId>,
    /// Matches requests whose start date falls in the year.
    pub year: Option<i32>,
}

impl RequestFilter {
    pub fn for_user(user: UserId) -> Self {
        Self {
            user_id: Some(user),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: LeaveStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_team_lead(mut self, lead: UserId) -> Self {
        self.team_lead_id = Some(lead);
        self
    }

    pub fn in_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn matches(&self, request: &LeaveRequest) -> bool {
        self.user_id.map_or(true, |user| request.user_id == user)
            && self.status.map_or(true, |status| request.status == status)
            && self
                .team_lead_id
                .map_or(true, |lead| request.team_lead_id == Some(lead))
            && self.year.map_or(true, |year| request.year() == year)
    }
}

/// Conjunctive calendar filter over an optional inclusive date window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarFilter {
    pub user_id: Option<UserId>,
    pub request_id: Option<LeaveRequestId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl CalendarFilter {
    pub fn for_request(request: LeaveRequestId) -> Self {
        Self {
            request_id: Some(request),
            ..Self::default()
        }
    }

    pub fn for_user(user: UserId) -> Self {
        Self {
            user_id: Some(user),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn matches(&self, entry: &CalendarEntry) -> bool {
        self.user_id.map_or(true, |user| entry.user_id == user)
            && self
                .request_id
                .map_or(true, |request| entry.request_id == request)
            && self.from.map_or(true, |from| entry.date >= from)
            && self.to.map_or(true, |to| entry.date <= to)
    }
}
