use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::access::UserId;

use super::domain::{
    CalendarEntry, LeaveBalance, LeaveNotification, LeavePolicy, LeaveRequest, LeaveRequestId,
    LeaveStatus, LeaveType, NotificationId,
};
use super::repository::{
    CalendarFilter, LeaveStore, LeaveTransaction, RepositoryError, RequestFilter,
};

#[derive(Debug, Clone, Default)]
struct LeaveTables {
    policies: BTreeMap<(i32, LeaveType), LeavePolicy>,
    balances: BTreeMap<(UserId, i32, LeaveType), LeaveBalance>,
    requests: BTreeMap<LeaveRequestId, LeaveRequest>,
    calendar: BTreeMap<(LeaveRequestId, NaiveDate), CalendarEntry>,
    notifications: BTreeMap<NotificationId, LeaveNotification>,
    request_sequence: u64,
    notification_sequence: u64,
}

/// Mutex-guarded store; each transaction works on a copy that replaces the committed tables
/// only when the work succeeds. The copy covers every table, so write cost grows with total
/// history; [`LeaveStore::read`] borrows the committed tables instead.
#[derive(Debug, Default)]
pub struct InMemoryLeaveStore {
    tables: Mutex<LeaveTables>,
}

impl InMemoryLeaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaveStore for InMemoryLeaveStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LeaveTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut committed = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("leave store mutex poisoned".to_string()))?;
        let mut working = committed.clone();
        let value = work(&mut working)?;
        *committed = working;
        Ok(value)
    }

    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn LeaveTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let committed = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("leave store mutex poisoned".to_string()))?;
        work(&*committed)
    }
}

impl LeaveTransaction for LeaveTables {
    fn policies_for_year(&self, year: i32) -> Result<Vec<LeavePolicy>, RepositoryError> {
        Ok(self
            .policies
            .range((year, LeaveType::Annual)..=(year, LeaveType::Unpaid))
            .map(|(_, policy)| policy.clone())
            .collect())
    }

    fn policy(
        &self,
        year: i32,
        leave_type: LeaveType,
    ) -> Result<Option<LeavePolicy>, RepositoryError> {
        Ok(self.policies.get(&(year, leave_type)).cloned())
    }

    fn insert_policy(&mut self, policy: LeavePolicy) -> Result<(), RepositoryError> {
        let key = (policy.year, policy.leave_type);
        if self.policies.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        self.policies.insert(key, policy);
        Ok(())
    }

    fn update_policy(&mut self, policy: LeavePolicy) -> Result<(), RepositoryError> {
        match self.policies.get_mut(&(policy.year, policy.leave_type)) {
            Some(slot) => {
                *slot = policy;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!(
                "{} policy for {}",
                policy.leave_type, policy.year
            ))),
        }
    }

    fn balance(
        &self,
        user: UserId,
        year: i32,
        leave_type: LeaveType,
    ) -> Result<Option<LeaveBalance>, RepositoryError> {
        Ok(self.balances.get(&(user, year, leave_type)).cloned())
    }

    fn balances_for_user(
        &self,
        user: UserId,
        year: i32,
    ) -> Result<Vec<LeaveBalance>, RepositoryError> {
        Ok(self
            .balances
            .range((user, year, LeaveType::Annual)..=(user, year, LeaveType::Unpaid))
            .map(|(_, balance)| balance.clone())
            .collect())
    }

    fn balances_for_year(&self, year: i32) -> Result<Vec<LeaveBalance>, RepositoryError> {
        Ok(self
            .balances
            .values()
            .filter(|balance| balance.year == year)
            .cloned()
            .collect())
    }

    fn insert_balance(&mut self, balance: LeaveBalance) -> Result<(), RepositoryError> {
        let key = (balance.user_id, balance.year, balance.leave_type);
        if self.balances.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        self.balances.insert(key, balance);
        Ok(())
    }

    fn update_balance(&mut self, balance: LeaveBalance) -> Result<(), RepositoryError> {
        match self
            .balances
            .get_mut(&(balance.user_id, balance.year, balance.leave_type))
        {
            Some(slot) => {
                *slot = balance;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!(
                "{} balance for {} in {}",
                balance.leave_type, balance.user_id, balance.year
            ))),
        }
    }

    fn next_request_id(&mut self) -> Result<LeaveRequestId, RepositoryError> {
        self.request_sequence += 1;
        Ok(LeaveRequestId(self.request_sequence))
    }

    fn request(&self, id: LeaveRequestId) -> Result<Option<LeaveRequest>, RepositoryError> {
        Ok(self.requests.get(&id).cloned())
    }

    fn requests(&self, filter: &RequestFilter) -> Result<Vec<LeaveRequest>, RepositoryError> {
        Ok(self
            .requests
            .values()
            .filter(|request| filter.matches(request))
            .cloned()
            .collect())
    }

    fn insert_request(&mut self, request: LeaveRequest) -> Result<(), RepositoryError> {
        if self.requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        self.requests.insert(request.id, request);
        Ok(())
    }

    fn update_request(&mut self, request: LeaveRequest) -> Result<(), RepositoryError> {
        match self.requests.get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(request.id.to_string())),
        }
    }

    fn calendar_entries(
        &self,
        filter: &CalendarFilter,
    ) -> Result<Vec<CalendarEntry>, RepositoryError> {
        let mut entries: Vec<CalendarEntry> = self
            .calendar
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.date, entry.request_id));
        Ok(entries)
    }

    fn delete_calendar_entries(
        &mut self,
        request: LeaveRequestId,
    ) -> Result<usize, RepositoryError> {
        let before = self.calendar.len();
        self.calendar.retain(|(owner, _), _| *owner != request);
        Ok(before - self.calendar.len())
    }

    fn insert_calendar_entries(
        &mut self,
        entries: Vec<CalendarEntry>,
    ) -> Result<(), RepositoryError> {
        if entries
            .iter()
            .any(|entry| self.calendar.contains_key(&(entry.request_id, entry.date)))
        {
            return Err(RepositoryError::Conflict);
        }
        for entry in entries {
            self.calendar.insert((entry.request_id, entry.date), entry);
        }
        Ok(())
    }

    fn update_calendar_status(
        &mut self,
        request: LeaveRequestId,
        status: LeaveStatus,
    ) -> Result<usize, RepositoryError> {
        let mut touched = 0;
        for ((owner, _), entry) in self.calendar.iter_mut() {
            if *owner == request {
                entry.status = status;
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn next_notification_id(&mut self) -> Result<NotificationId, RepositoryError> {
        self.notification_sequence += 1;
        Ok(NotificationId(self.notification_sequence))
    }

    fn notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<LeaveNotification>, RepositoryError> {
        Ok(self.notifications.get(&id).cloned())
    }

    fn notifications_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<LeaveNotification>, RepositoryError> {
        Ok(self
            .notifications
            .values()
            .filter(|notification| notification.user_id == user)
            .cloned()
            .collect())
    }

    fn insert_notification(
        &mut self,
        notification: LeaveNotification,
    ) -> Result<(), RepositoryError> {
        if self.notifications.contains_key(&notification.id) {
            return Err(RepositoryError::Conflict);
        }
        self.notifications.insert(notification.id, notification);
        Ok(())
    }

    fn update_notification(
        &mut self,
        notification: LeaveNotification,
    ) -> Result<(), RepositoryError> {
        match self.notifications.get_mut(&notification.id) {
            Some(slot) => {
                *slot = notification;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!(
                "notification {}",
                notification.id.0
            ))),
        }
    }
}
