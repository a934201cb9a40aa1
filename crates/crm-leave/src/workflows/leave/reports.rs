use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::access::UserId;

use super::domain::{CalendarEntry, LeaveBalance, LeaveRequest, LeaveStatus, LeaveType};

/// Balance totals for one leave type across all users in a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtilizationStats {
    pub leave_type: LeaveType,
    pub total_allocated: i32,
    pub total_used: i32,
    pub total_remaining: i32,
    pub total_carry_over: i32,
    pub balances: usize,
}

impl UtilizationStats {
    pub(crate) fn empty(leave_type: LeaveType) -> Self {
        Self {
            leave_type,
            total_allocated: 0,
            total_used: 0,
            total_remaining: 0,
            total_carry_over: 0,
            balances: 0,
        }
    }

    pub(crate) fn absorb(&mut self, balance: &LeaveBalance) {
        self.total_allocated += balance.total_allocated();
        self.total_used += balance.used_days();
        self.total_remaining += balance.remaining_days();
        self.total_carry_over += balance.carry_over_days();
        self.balances += 1;
    }
}

/// Request counts for a year, bucketed three ways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveRequestSummary {
    pub year: i32,
    pub total_requests: usize,
    pub by_status: BTreeMap<LeaveStatus, usize>,
    pub by_type: BTreeMap<LeaveType, usize>,
    /// Keyed by the month (1-12) the request starts in.
    pub by_month: BTreeMap<u32, usize>,
}

impl LeaveRequestSummary {
    pub fn from_requests(year: i32, requests: &[LeaveRequest]) -> Self {
        let mut summary = Self {
            year,
            total_requests: 0,
            by_status: BTreeMap::new(),
            by_type: BTreeMap::new(),
            by_month: BTreeMap::new(),
        };
        for request in requests.iter().filter(|request| request.year() == year) {
            summary.total_requests += 1;
            *summary.by_status.entry(request.status).or_default() += 1;
            *summary.by_type.entry(request.leave_type).or_default() += 1;
            *summary.by_month.entry(request.start_date.month()).or_default() += 1;
        }
        summary
    }
}

/// Per-status request counts for a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRequestStats {
    pub user_id: UserId,
    pub total_requests: usize,
    pub by_status: BTreeMap<LeaveStatus, usize>,
}

impl UserRequestStats {
    pub fn from_requests(user_id: UserId, requests: &[LeaveRequest]) -> Self {
        let mut by_status = BTreeMap::new();
        for status in LeaveStatus::ALL {
            by_status.insert(status, 0);
        }
        let mut total_requests = 0;
        for request in requests.iter().filter(|request| request.user_id == user_id) {
            total_requests += 1;
            *by_status.entry(request.status).or_default() += 1;
        }
        Self {
            user_id,
            total_requests,
            by_status,
        }
    }
}

/// Day counts derived from a user's calendar for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarStats {
    pub user_id: UserId,
    pub year: i32,
    pub total_days_on_leave: usize,
    pub days_by_type: BTreeMap<LeaveType, usize>,
    pub days_by_month: BTreeMap<u32, usize>,
    /// Days still moving through approval.
    pub pending_days: usize,
}

impl CalendarStats {
    pub fn from_entries(user_id: UserId, year: i32, entries: &[CalendarEntry]) -> Self {
        let mut stats = Self {
            user_id,
            year,
            total_days_on_leave: 0,
            days_by_type: LeaveType::ALL.iter().map(|kind| (*kind, 0)).collect(),
            days_by_month: (1..=12).map(|month| (month, 0)).collect(),
            pending_days: 0,
        };

        let in_year = |date: NaiveDate| date.year() == year;
        for entry in entries
            .iter()
            .filter(|entry| entry.user_id == user_id && in_year(entry.date))
        {
            match entry.status {
                status if status.is_approved() => {
                    stats.total_days_on_leave += 1;
                    *stats.days_by_type.entry(entry.leave_type).or_default() += 1;
                    *stats.days_by_month.entry(entry.date.month()).or_default() += 1;
                }
                status if status.is_occupying() => stats.pending_days += 1,
                _ => {}
            }
        }
        stats
    }
}
