use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::access::UserId;

use super::domain::{expand_dates, CalendarEntry, LeaveRequest, LeaveRequestId, LeaveStatus};
use super::error::LeaveError;
use super::reports::CalendarStats;
use super::repository::{CalendarFilter, LeaveTransaction, RequestFilter};

/// Maintains the per-day expansion of leave requests.
pub struct CalendarProjector<'t> {
    tx: &'t mut dyn LeaveTransaction,
}

impl<'t> CalendarProjector<'t> {
    pub fn new(tx: &'t mut dyn LeaveTransaction) -> Self {
        Self { tx }
    }

    /// Replaces the request's entries with one per day of `[start_date, end_date]`.
    pub fn project_for_request(
        &mut self,
        request: &LeaveRequest,
    ) -> Result<Vec<CalendarEntry>, LeaveError> {
        self.tx.delete_calendar_entries(request.id)?;

        let entries: Vec<CalendarEntry> = expand_dates(request.start_date, request.end_date)
            .into_iter()
            .map(|date| CalendarEntry {
                request_id: request.id,
                user_id: request.user_id,
                date,
                leave_type: request.leave_type,
                status: request.status,
            })
            .collect();
        self.tx.insert_calendar_entries(entries.clone())?;
        Ok(entries)
    }

    /// Sets the status on every entry of the request; dates are untouched.
    pub fn update_status(
        &mut self,
        request: LeaveRequestId,
        status: LeaveStatus,
    ) -> Result<usize, LeaveError> {
        Ok(self.tx.update_calendar_status(request, status)?)
    }

    pub fn is_date_available(&self, user: UserId, date: NaiveDate) -> Result<bool, LeaveError> {
        let entries = self
            .tx
            .calendar_entries(&CalendarFilter::for_user(user).between(date, date))?;
        Ok(!entries.iter().any(|entry| entry.status.is_occupying()))
    }

    /// True when any occupying request other than `exclude` intersects `[start, end]`.
    pub fn has_overlap(
        &self,
        user: UserId,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<LeaveRequestId>,
    ) -> Result<bool, LeaveError> {
        let entries = self
            .tx
            .calendar_entries(&CalendarFilter::for_user(user).between(start, end))?;
        Ok(entries
            .iter()
            .any(|entry| entry.status.is_occupying() && Some(entry.request_id) != exclude))
    }

    pub fn entries_for_user(
        &self,
        user: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarEntry>, LeaveError> {
        Ok(self
            .tx
            .calendar_entries(&CalendarFilter::for_user(user).between(from, to))?)
    }

    pub fn entries_for_year(&self, user: UserId, year: i32) -> Result<Vec<CalendarEntry>, LeaveError> {
        let (from, to) = year_bounds(year)?;
        self.entries_for_user(user, from, to)
    }

    pub fn entries_for_request(
        &self,
        request: LeaveRequestId,
    ) -> Result<Vec<CalendarEntry>, LeaveError> {
        Ok(self.tx.calendar_entries(&CalendarFilter::for_request(request))?)
    }

    /// Entries of every request routed to `team_lead` within the window.
    pub fn team_entries(
        &self,
        team_lead: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarEntry>, LeaveError> {
        let requests: BTreeSet<LeaveRequestId> = self
            .tx
            .requests(&RequestFilter::default().with_team_lead(team_lead))?
            .into_iter()
            .map(|request| request.id)
            .collect();
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let window = CalendarFilter::default().between(from, to);
        Ok(self
            .tx
            .calendar_entries(&window)?
            .into_iter()
            .filter(|entry| requests.contains(&entry.request_id))
            .collect())
    }

    /// Dates in `[from, to]` not reserved by any occupying entry.
    pub fn available_dates(
        &self,
        user: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, LeaveError> {
        let taken: BTreeSet<NaiveDate> = self
            .entries_for_user(user, from, to)?
            .into_iter()
            .filter(|entry| entry.status.is_occupying())
            .map(|entry| entry.date)
            .collect();
        Ok(expand_dates(from, to)
            .into_iter()
            .filter(|date| !taken.contains(date))
            .collect())
    }

    pub fn stats(&self, user: UserId, year: i32) -> Result<CalendarStats, LeaveError> {
        let entries = self.entries_for_year(user, year)?;
        Ok(CalendarStats::from_entries(user, year, &entries))
    }
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate), LeaveError> {
    let from = NaiveDate::from_ymd_opt(year, 1, 1);
    let to = NaiveDate::from_ymd_opt(year, 12, 31);
    match (from, to) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(LeaveError::Validation(format!("{year} is not a valid year"))),
    }
}
