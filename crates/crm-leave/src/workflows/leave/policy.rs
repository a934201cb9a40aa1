use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{LeavePolicy, LeaveType};
use super::error::{LeaveError, PolicyViolation};
use super::repository::LeaveTransaction;

/// Baseline rules seeded for every new policy year.
pub fn default_policies(year: i32) -> Vec<LeavePolicy> {
    LeaveType::ALL
        .iter()
        .map(|leave_type| {
            let (default_allocation, max_allocation, min_notice, max_consecutive, carry, max_carry) =
                match leave_type {
                    LeaveType::Annual => (20, 30, 7, 15, true, 5),
                    LeaveType::Sick => (10, 15, 0, 5, false, 0),
                    LeaveType::Personal => (5, 10, 3, 3, false, 0),
                    LeaveType::Emergency => (3, 5, 0, 3, false, 0),
                    LeaveType::Maternity => (90, 120, 30, 90, false, 0),
                    LeaveType::Paternity => (15, 30, 14, 15, false, 0),
                    LeaveType::Unpaid => (0, 30, 14, 30, false, 0),
                };
            LeavePolicy {
                leave_type: *leave_type,
                year,
                default_allocation,
                max_allocation,
                min_notice_days: min_notice,
                max_consecutive_days: max_consecutive,
                allow_carry_over: carry,
                max_carry_over: max_carry,
                requires_approval: true,
                active: true,
                description: describe(*leave_type).to_string(),
            }
        })
        .collect()
}

fn describe(leave_type: LeaveType) -> &'static str {
    match leave_type {
        LeaveType::Annual => "Annual vacation leave policy",
        LeaveType::Sick => "Sick leave policy",
        LeaveType::Personal => "Personal leave policy",
        LeaveType::Emergency => "Emergency leave policy",
        LeaveType::Maternity => "Maternity leave policy",
        LeaveType::Paternity => "Paternity leave policy",
        LeaveType::Unpaid => "Unpaid leave policy",
    }
}

/// Editable policy fields. Unset fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    #[serde(default)]
    pub default_allocation: Option<i32>,
    #[serde(default)]
    pub max_allocation: Option<i32>,
    #[serde(default)]
    pub min_notice_days: Option<i32>,
    #[serde(default)]
    pub max_consecutive_days: Option<i32>,
    #[serde(default)]
    pub allow_carry_over: Option<bool>,
    #[serde(default)]
    pub max_carry_over: Option<i32>,
    #[serde(default)]
    pub requires_approval: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Candidate request as seen by policy validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyCheck {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub days_requested: i32,
}

/// Per-year, per-leave-type rule lookups and validation.
pub struct PolicyResolver<'t> {
    tx: &'t mut dyn LeaveTransaction,
}

impl<'t> PolicyResolver<'t> {
    pub fn new(tx: &'t mut dyn LeaveTransaction) -> Self {
        Self { tx }
    }

    /// Seeds the baseline table when `year` has no policy rows. Returns the rows created.
    pub fn initialize_default_policies(&mut self, year: i32) -> Result<usize, LeaveError> {
        if !self.tx.policies_for_year(year)?.is_empty() {
            return Ok(0);
        }

        let policies = default_policies(year);
        let created = policies.len();
        for policy in policies {
            self.tx.insert_policy(policy)?;
        }
        tracing::info!(year, created, "seeded default leave policies");
        Ok(created)
    }

    /// Active policies for the year, ordered by leave type.
    pub fn policies_by_year(&self, year: i32) -> Result<Vec<LeavePolicy>, LeaveError> {
        let mut policies: Vec<LeavePolicy> = self
            .tx
            .policies_for_year(year)?
            .into_iter()
            .filter(|policy| policy.active)
            .collect();
        policies.sort_by_key(|policy| policy.leave_type);
        Ok(policies)
    }

    pub fn active_policy(
        &self,
        year: i32,
        leave_type: LeaveType,
    ) -> Result<LeavePolicy, LeaveError> {
        match self.tx.policy(year, leave_type)? {
            Some(policy) if policy.active => Ok(policy),
            _ => Err(PolicyViolation::PolicyNotFound { leave_type, year }.into()),
        }
    }

    /// Checks notice and consecutive-day rules. Balance sufficiency is not considered here.
    pub fn validate_against_policy(
        &self,
        check: PolicyCheck,
        today: NaiveDate,
    ) -> Result<LeavePolicy, LeaveError> {
        use chrono::Datelike;

        let policy = self.active_policy(check.start_date.year(), check.leave_type)?;

        let notice = (check.start_date - today).num_days() as i32;
        if notice < policy.min_notice_days {
            return Err(PolicyViolation::InsufficientNotice {
                required: policy.min_notice_days,
                provided: notice,
            }
            .into());
        }

        if check.days_requested > policy.max_consecutive_days {
            return Err(PolicyViolation::ExceedsConsecutiveLimit {
                allowed: policy.max_consecutive_days,
                requested: check.days_requested,
            }
            .into());
        }

        Ok(policy)
    }

    pub fn update_policy(
        &mut self,
        year: i32,
        leave_type: LeaveType,
        update: PolicyUpdate,
    ) -> Result<LeavePolicy, LeaveError> {
        let mut policy = self
            .tx
            .policy(year, leave_type)?
            .ok_or_else(|| LeaveError::not_found(format!("{leave_type} policy for {year}")))?;

        if let Some(value) = update.default_allocation {
            policy.default_allocation = value;
        }
        if let Some(value) = update.max_allocation {
            policy.max_allocation = value;
        }
        if let Some(value) = update.min_notice_days {
            policy.min_notice_days = value;
        }
        if let Some(value) = update.max_consecutive_days {
            policy.max_consecutive_days = value;
        }
        if let Some(value) = update.allow_carry_over {
            policy.allow_carry_over = value;
        }
        if let Some(value) = update.max_carry_over {
            policy.max_carry_over = value;
        }
        if let Some(value) = update.requires_approval {
            policy.requires_approval = value;
        }
        if let Some(value) = update.active {
            policy.active = value;
        }
        if let Some(value) = update.description {
            policy.description = value;
        }

        validate_policy(&policy)?;
        self.tx.update_policy(policy.clone())?;
        Ok(policy)
    }

    pub fn deactivate_policy(
        &mut self,
        year: i32,
        leave_type: LeaveType,
    ) -> Result<LeavePolicy, LeaveError> {
        self.update_policy(
            year,
            leave_type,
            PolicyUpdate {
                active: Some(false),
                ..PolicyUpdate::default()
            },
        )
    }

    /// Copies every policy of `from_year` into `to_year` unless the target year already has rows.
    pub fn copy_from_year(&mut self, from_year: i32, to_year: i32) -> Result<usize, LeaveError> {
        if !self.tx.policies_for_year(to_year)?.is_empty() {
            return Ok(0);
        }

        let source = self.tx.policies_for_year(from_year)?;
        if source.is_empty() {
            return Err(LeaveError::not_found(format!("policies for {from_year}")));
        }

        let copied = source.len();
        for mut policy in source {
            policy.year = to_year;
            self.tx.insert_policy(policy)?;
        }
        Ok(copied)
    }
}

fn validate_policy(policy: &LeavePolicy) -> Result<(), LeaveError> {
    let non_negative = [
        policy.default_allocation,
        policy.max_allocation,
        policy.min_notice_days,
        policy.max_consecutive_days,
        policy.max_carry_over,
    ];
    if non_negative.iter().any(|value| *value < 0) {
        return Err(LeaveError::Validation(
            "policy day counts must not be negative".to_string(),
        ));
    }
    if policy.default_allocation > policy.max_allocation {
        return Err(LeaveError::Validation(
            "default allocation exceeds maximum allocation".to_string(),
        ));
    }
    Ok(())
}
