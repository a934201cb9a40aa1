use std::collections::BTreeMap;

use crate::access::UserId;

use super::domain::{LeaveBalance, LeaveType};
use super::error::LeaveError;
use super::reports::UtilizationStats;
use super::repository::LeaveTransaction;

/// Allocated/used/remaining bookkeeping per (user, leave type, year).
///
/// The ledger reports state; deciding whether a request fits the remaining days is the
/// caller's job.
pub struct BalanceLedger<'t> {
    tx: &'t mut dyn LeaveTransaction,
}

impl<'t> BalanceLedger<'t> {
    pub fn new(tx: &'t mut dyn LeaveTransaction) -> Self {
        Self { tx }
    }

    pub fn get_balance(
        &self,
        user: UserId,
        year: i32,
        leave_type: LeaveType,
    ) -> Result<LeaveBalance, LeaveError> {
        self.tx
            .balance(user, year, leave_type)?
            .ok_or_else(|| LeaveError::not_found(format!("{leave_type} balance for {user} in {year}")))
    }

    pub fn balances_for_user(
        &self,
        user: UserId,
        year: i32,
    ) -> Result<Vec<LeaveBalance>, LeaveError> {
        Ok(self.tx.balances_for_user(user, year)?)
    }

    /// Creates a default row for each active policy lacking one. Existing rows are untouched.
    pub fn initialize(&mut self, user: UserId, year: i32) -> Result<Vec<LeaveBalance>, LeaveError> {
        let mut created = Vec::new();
        for policy in self.tx.policies_for_year(year)? {
            if !policy.active || self.tx.balance(user, year, policy.leave_type)?.is_some() {
                continue;
            }
            let balance =
                LeaveBalance::new(user, policy.leave_type, year, policy.default_allocation, 0);
            self.tx.insert_balance(balance.clone())?;
            created.push(balance);
        }
        Ok(created)
    }

    /// Opens the year's rows: a rollover from `year - 1` when that year holds balances, policy
    /// defaults otherwise. Returns the created rows and whether a rollover happened.
    pub fn open_year(
        &mut self,
        user: UserId,
        year: i32,
    ) -> Result<(Vec<LeaveBalance>, bool), LeaveError> {
        let rollover = !self.tx.balances_for_user(user, year - 1)?.is_empty();
        let created = if rollover {
            self.reset_for_new_year(user, year)?
        } else {
            self.initialize(user, year)?
        };
        Ok((created, rollover))
    }

    /// Adds consumed days. Remaining may go negative; that state is reported, never clamped.
    pub fn increment_used(
        &mut self,
        user: UserId,
        year: i32,
        leave_type: LeaveType,
        days: i32,
    ) -> Result<LeaveBalance, LeaveError> {
        let mut balance = self.get_balance(user, year, leave_type)?;
        balance.record_usage(days);
        if balance.remaining_days() < 0 {
            tracing::warn!(
                user = user.0,
                year,
                leave_type = %leave_type,
                remaining = balance.remaining_days(),
                "leave balance over-allocated"
            );
        }
        self.tx.update_balance(balance.clone())?;
        Ok(balance)
    }

    pub fn decrement_used(
        &mut self,
        user: UserId,
        year: i32,
        leave_type: LeaveType,
        days: i32,
    ) -> Result<LeaveBalance, LeaveError> {
        let mut balance = self.get_balance(user, year, leave_type)?;
        balance.release_usage(days);
        self.tx.update_balance(balance.clone())?;
        Ok(balance)
    }

    /// Opens `new_year` rows, carrying unused days from `new_year - 1` where policy allows.
    /// Rows already present for `new_year` are left as they are.
    pub fn reset_for_new_year(
        &mut self,
        user: UserId,
        new_year: i32,
    ) -> Result<Vec<LeaveBalance>, LeaveError> {
        let previous: BTreeMap<LeaveType, LeaveBalance> = self
            .tx
            .balances_for_user(user, new_year - 1)?
            .into_iter()
            .map(|balance| (balance.leave_type, balance))
            .collect();

        let mut created = Vec::new();
        for policy in self.tx.policies_for_year(new_year)? {
            if !policy.active || self.tx.balance(user, new_year, policy.leave_type)?.is_some() {
                continue;
            }

            let prev_remaining = previous
                .get(&policy.leave_type)
                .map(LeaveBalance::remaining_days)
                .unwrap_or(0);
            let carry_over = if policy.allow_carry_over && prev_remaining > 0 {
                prev_remaining.min(policy.max_carry_over)
            } else {
                0
            };

            let balance = LeaveBalance::new(
                user,
                policy.leave_type,
                new_year,
                policy.default_allocation,
                carry_over,
            );
            self.tx.insert_balance(balance.clone())?;
            created.push(balance);
        }
        Ok(created)
    }

    /// Administrative override of allocation and carry-over; usage is preserved.
    pub fn adjust_allocation(
        &mut self,
        user: UserId,
        year: i32,
        leave_type: LeaveType,
        total_allocated: i32,
        carry_over_days: i32,
    ) -> Result<LeaveBalance, LeaveError> {
        if total_allocated < 0 || carry_over_days < 0 {
            return Err(LeaveError::Validation(
                "allocation and carry-over must not be negative".to_string(),
            ));
        }
        let mut balance = self.get_balance(user, year, leave_type)?;
        balance.set_allocation(total_allocated, carry_over_days);
        self.tx.update_balance(balance.clone())?;
        Ok(balance)
    }

    /// Balances at or below `threshold` remaining days.
    pub fn low_balances(&self, year: i32, threshold: i32) -> Result<Vec<LeaveBalance>, LeaveError> {
        let mut low: Vec<LeaveBalance> = self
            .tx
            .balances_for_year(year)?
            .into_iter()
            .filter(|balance| balance.remaining_days() <= threshold)
            .collect();
        low.sort_by_key(|balance| (balance.remaining_days(), balance.user_id, balance.leave_type));
        Ok(low)
    }

    /// Totals per leave type across all users for the year.
    pub fn utilization(&self, year: i32) -> Result<Vec<UtilizationStats>, LeaveError> {
        let mut stats: BTreeMap<LeaveType, UtilizationStats> = BTreeMap::new();
        for balance in self.tx.balances_for_year(year)? {
            let entry = stats
                .entry(balance.leave_type)
                .or_insert_with(|| UtilizationStats::empty(balance.leave_type));
            entry.absorb(&balance);
        }
        Ok(stats.into_values().collect())
    }
}
