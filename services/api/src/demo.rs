use crate::infra::{seed_directory, DEVELOPER, DEVELOPMENT_LEAD, DIRECTOR, HR_OFFICER};
use chrono::{Datelike, Duration, Local, NaiveDate};
use clap::Args;
use crm_leave::access::UserId;
use crm_leave::config::LeaveConfig;
use crm_leave::error::AppError;
use crm_leave::workflows::leave::{
    default_policies, FixedClock, InMemoryLeaveStore, LeaveRequestDraft, LeaveType,
    LeaveWorkflowService,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct PoliciesArgs {
    /// Policy year to print (defaults to the current year)
    #[arg(long)]
    pub(crate) year: Option<i32>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// First day of the demo leave (YYYY-MM-DD). Defaults to today + 14 days.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Length of the demo leave in calendar days.
    #[arg(long, default_value_t = 6)]
    pub(crate) days: u32,
    /// Override the date the demo runs on (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn print_policies(args: PoliciesArgs) -> Result<(), AppError> {
    let year = args.year.unwrap_or_else(|| Local::now().year());

    println!("Baseline leave policies for {year}");
    println!(
        "{:<10} {:>7} {:>5} {:>7} {:>11} {:>10}",
        "type", "default", "max", "notice", "consecutive", "carry-over"
    );
    for policy in default_policies(year) {
        let carry_over = if policy.allow_carry_over {
            policy.max_carry_over.to_string()
        } else {
            "-".to_string()
        };
        println!(
            "{:<10} {:>7} {:>5} {:>7} {:>11} {:>10}",
            policy.leave_type.to_string(),
            policy.default_allocation,
            policy.max_allocation,
            policy.min_notice_days,
            policy.max_consecutive_days,
            carry_over
        );
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let start = args.start.unwrap_or_else(|| today + Duration::days(14));
    let end = start + Duration::days(i64::from(args.days.max(1)) - 1);

    let service = LeaveWorkflowService::new(
        Arc::new(InMemoryLeaveStore::new()),
        Arc::new(seed_directory()?),
        LeaveConfig::default(),
    )
    .with_clock(Arc::new(FixedClock::on(today)));
    service.initialize_default_policies(start.year())?;

    println!("Leave approval demo (running as of {today})");
    let draft = LeaveRequestDraft {
        leave_type: LeaveType::Annual,
        start_date: start,
        end_date: end,
        reason: "Family holiday".to_string(),
    };
    let request = match service.create_leave_request(DEVELOPER, draft) {
        Ok(request) => request,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Request {} for {} {} days ({} to {}) -> {}",
        request.id, request.leave_type, request.days_requested, start, end, request.status
    );

    let approvers: [(UserId, &str); 3] = [
        (DEVELOPMENT_LEAD, "team lead"),
        (HR_OFFICER, "HR"),
        (DIRECTOR, "management"),
    ];
    for (approver, label) in approvers {
        if service.workflow_status(request.id)?.is_final {
            break;
        }
        let outcome = match service.approve(request.id, approver, "approved in demo") {
            Ok(outcome) => outcome,
            Err(err) => {
                println!("  Approval by {label} failed: {err}");
                return Ok(());
            }
        };
        println!(
            "- Approved by {label} -> {} (next: {:?})",
            outcome.request.status, outcome.workflow.next_approver
        );
        if let Some(balance) = outcome.balance {
            println!(
                "  Balance consumed: {} used, {} remaining",
                balance.used_days(),
                balance.remaining_days()
            );
        }
    }

    println!("Timeline:");
    for event in service.timeline(request.id)? {
        println!(
            "  - {} {:?} by {}",
            event.timestamp.format("%Y-%m-%d %H:%M"),
            event.action,
            event.actor_name
        );
    }

    let stats = service.calendar_stats(DEVELOPER, start.year())?;
    println!(
        "Calendar: {} approved days, {} pending days in {}",
        stats.total_days_on_leave,
        stats.pending_days,
        start.year()
    );
    for notification in service.notifications(DEVELOPER, false)? {
        println!("Notification: {}", notification.title);
    }
    Ok(())
}
