use super::common::*;

use std::sync::Arc;

use crate::access::Permission;
use crate::workflows::leave::approval::{ApprovalStage, ApproverRole, TimelineAction};
use crate::workflows::leave::domain::{
    LeaveRequestPatch, LeaveStatus, LeaveType, NotificationKind,
};
use crate::workflows::leave::error::{LeaveError, PolicyViolation};
use crate::workflows::leave::policy::PolicyUpdate;

#[test]
fn short_request_is_final_after_hr_and_consumes_balance() {
    let (service, _) = build_service();
    service
        .initialize_or_reset_balance(ALICE, 2026)
        .expect("balances opened");
    service
        .adjust_balance(ALICE, 2026, LeaveType::Annual, 3, 0)
        .expect("allocation set");

    let request = submit(&service, short_annual());
    assert_eq!(request.status, LeaveStatus::Pending);
    assert_eq!(request.days_requested, 3);
    assert_eq!(request.team_lead_id, Some(TOM));

    let first = service
        .approve(request.id, TOM, "fine by me")
        .expect("lead approves");
    assert_eq!(first.request.status, LeaveStatus::TeamLeadApproved);
    assert!(first.balance.is_none());

    let outcome = service
        .approve(request.id, HANNAH, "approved")
        .expect("hr approves");
    assert_eq!(outcome.request.status, LeaveStatus::Approved);
    assert!(outcome.workflow.is_final);
    let balance = outcome.balance.expect("balance consumed");
    assert_eq!(balance.used_days(), 3);
    assert_eq!(balance.remaining_days(), 0);

    let entries = service
        .calendar_for_request(request.id)
        .expect("calendar loads");
    assert_eq!(entries.len(), 3);
    assert!(entries
        .iter()
        .all(|entry| entry.status == LeaveStatus::Approved));

    match service.create_leave_request(
        ALICE,
        draft(LeaveType::Annual, date(2026, 5, 4), date(2026, 5, 4)),
    ) {
        Err(LeaveError::InsufficientBalance {
            remaining: 0,
            requested: 1,
        }) => {}
        other => panic!("expected insufficient balance, got {other:?}"),
    }
}

#[test]
fn long_request_needs_management_before_balance_moves() {
    let (service, _) = build_service();
    let request = submit(&service, long_annual());

    service.approve(request.id, TOM, "").expect("lead approves");
    let hr = service
        .approve(request.id, HANNAH, "")
        .expect("hr approves");
    assert_eq!(hr.request.status, LeaveStatus::HrApproved);
    assert_eq!(hr.workflow.next_approver, ApproverRole::Management);
    assert!(hr.balance.is_none());

    let untouched = service.balances(ALICE, 2026).expect("balances load");
    let annual = untouched
        .iter()
        .find(|balance| balance.leave_type == LeaveType::Annual)
        .expect("annual balance");
    assert_eq!(annual.used_days(), 0);

    let outcome = service
        .approve(request.id, MAX, "enjoy")
        .expect("management approves");
    assert_eq!(outcome.request.status, LeaveStatus::ManagementApproved);
    assert!(outcome.request.management_decision.is_some());
    assert!(outcome.workflow.is_final);
    assert_eq!(outcome.workflow.next_approver, ApproverRole::None);
    let balance = outcome.balance.expect("balance consumed");
    assert_eq!(balance.used_days(), 5);
    assert_eq!(balance.remaining_days(), 15);

    let entries = service
        .calendar_for_request(request.id)
        .expect("calendar loads");
    assert_eq!(entries.len(), 5);
    assert!(entries
        .iter()
        .all(|entry| entry.status == LeaveStatus::ManagementApproved));
    let stats = service.calendar_stats(ALICE, 2026).expect("stats load");
    assert_eq!(stats.total_days_on_leave, 5);
    assert_eq!(stats.pending_days, 0);
}

#[test]
fn four_days_skip_management_five_days_do_not() {
    let (service, _) = build_service();
    let four = submit(
        &service,
        draft(LeaveType::Annual, date(2026, 6, 1), date(2026, 6, 4)),
    );
    let five = submit(
        &service,
        draft(LeaveType::Annual, date(2026, 6, 15), date(2026, 6, 19)),
    );

    for id in [four.id, five.id] {
        service.approve(id, TOM, "").expect("lead approves");
        service.approve(id, HANNAH, "").expect("hr approves");
    }

    assert_status(&service, four.id, LeaveStatus::Approved);
    assert_status(&service, five.id, LeaveStatus::HrApproved);
}

#[test]
fn short_notice_is_rejected_at_creation() {
    let (service, _) = build_service();

    match service.create_leave_request(
        ALICE,
        draft(LeaveType::Annual, date(2026, 3, 4), date(2026, 3, 5)),
    ) {
        Err(LeaveError::Policy(PolicyViolation::InsufficientNotice { .. })) => {}
        other => panic!("expected insufficient notice, got {other:?}"),
    }
}

#[test]
fn overlapping_requests_are_refused() {
    let (service, _) = build_service();
    submit(&service, long_annual());

    match service.create_leave_request(
        ALICE,
        draft(LeaveType::Annual, date(2026, 4, 10), date(2026, 4, 13)),
    ) {
        Err(LeaveError::OverlappingLeave) => {}
        other => panic!("expected overlap, got {other:?}"),
    }

    service
        .create_leave_request(BOB, long_annual())
        .expect("other users are unaffected");
}

#[test]
fn rejected_requests_release_their_days() {
    let (service, _) = build_service();
    let request = submit(&service, short_annual());

    let outcome = service
        .reject(request.id, TOM, "team offsite")
        .expect("lead rejects");
    assert_eq!(outcome.request.status, LeaveStatus::Rejected);
    assert!(outcome.balance.is_none());

    let entries = service
        .calendar_for_request(request.id)
        .expect("calendar loads");
    assert!(entries
        .iter()
        .all(|entry| entry.status == LeaveStatus::Rejected));

    submit(&service, short_annual());

    let notifications = service.notifications(ALICE, false).expect("notifications load");
    assert!(notifications
        .iter()
        .any(|notification| notification.kind == NotificationKind::LeaveRejected));
}

#[test]
fn shape_errors_are_validation_failures() {
    let (service, _) = build_service();

    let cases = [
        draft(LeaveType::Sick, date(2026, 3, 10), date(2026, 3, 9)),
        draft(LeaveType::Sick, date(2026, 3, 1), date(2026, 3, 3)),
        {
            let mut long_reason = draft(LeaveType::Sick, date(2026, 3, 10), date(2026, 3, 10));
            long_reason.reason = "x".repeat(501);
            long_reason
        },
    ];
    for case in cases {
        match service.create_leave_request(ALICE, case) {
            Err(LeaveError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}

#[test]
fn unpaid_leave_has_no_allocation_to_draw_on() {
    let (service, _) = build_service();

    match service.create_leave_request(
        ALICE,
        draft(LeaveType::Unpaid, date(2026, 4, 1), date(2026, 4, 1)),
    ) {
        Err(LeaveError::InsufficientBalance {
            remaining: 0,
            requested: 1,
        }) => {}
        other => panic!("expected insufficient balance, got {other:?}"),
    }
}

#[test]
fn failed_creation_leaves_no_partial_effects() {
    let (service, _) = build_service();

    service
        .create_leave_request(
            ALICE,
            draft(LeaveType::Unpaid, date(2026, 4, 1), date(2026, 4, 1)),
        )
        .expect_err("unpaid leave has no allocation");

    assert!(service
        .balances(ALICE, 2026)
        .expect("balances load")
        .is_empty());
    assert!(service
        .requests_for_user(ALICE, None)
        .expect("requests load")
        .is_empty());
}

#[test]
fn cancel_is_owner_only_and_status_limited() {
    let (service, _) = build_service();
    let request = submit(&service, long_annual());

    match service.cancel_leave_request(request.id, BOB) {
        Err(LeaveError::Forbidden) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }

    service.approve(request.id, TOM, "").expect("lead approves");
    let cancelled = service
        .cancel_leave_request(request.id, ALICE)
        .expect("owner cancels");
    assert_eq!(cancelled.status, LeaveStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    let available = service
        .available_dates(ALICE, date(2026, 4, 6), date(2026, 4, 10))
        .expect("availability loads");
    assert_eq!(available.len(), 5);

    match service.cancel_leave_request(request.id, ALICE) {
        Err(LeaveError::InvalidTransition {
            status: LeaveStatus::Cancelled,
            action: "cancel",
        }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn hr_approved_requests_cannot_be_cancelled() {
    let (service, _) = build_service();
    let request = submit(&service, long_annual());
    service.approve(request.id, TOM, "").expect("lead approves");
    service.approve(request.id, HANNAH, "").expect("hr approves");

    match service.cancel_leave_request(request.id, ALICE) {
        Err(LeaveError::InvalidTransition {
            status: LeaveStatus::HrApproved,
            ..
        }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn update_revalidates_and_reprojects() {
    let (service, _) = build_service();
    let request = submit(&service, long_annual());

    let updated = service
        .update_leave_request(
            request.id,
            ALICE,
            LeaveRequestPatch {
                start_date: Some(date(2026, 4, 8)),
                end_date: Some(date(2026, 4, 9)),
                ..LeaveRequestPatch::default()
            },
        )
        .expect("pending request updates");
    assert_eq!(updated.days_requested, 2);

    let entries = service
        .calendar_for_request(request.id)
        .expect("calendar loads");
    assert_eq!(entries.len(), 2);

    match service.update_leave_request(
        request.id,
        ALICE,
        LeaveRequestPatch {
            leave_type: Some(LeaveType::Personal),
            start_date: Some(date(2026, 4, 6)),
            end_date: Some(date(2026, 4, 10)),
            ..LeaveRequestPatch::default()
        },
    ) {
        Err(LeaveError::Policy(PolicyViolation::ExceedsConsecutiveLimit { .. })) => {}
        other => panic!("expected consecutive limit, got {other:?}"),
    }
    assert_eq!(
        service
            .get_leave_request(request.id)
            .expect("request loads")
            .days_requested,
        2
    );
}

#[test]
fn update_is_limited_to_pending_requests_of_the_owner() {
    let (service, _) = build_service();
    let request = submit(&service, long_annual());

    match service.update_leave_request(request.id, BOB, LeaveRequestPatch::default()) {
        Err(LeaveError::Forbidden) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }

    service.approve(request.id, TOM, "").expect("lead approves");
    match service.update_leave_request(request.id, ALICE, LeaveRequestPatch::default()) {
        Err(LeaveError::InvalidTransition {
            action: "update",
            ..
        }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn outsiders_cannot_approve() {
    let (service, _) = build_service();
    let request = submit(&service, short_annual());

    match service.approve(request.id, BOB, "") {
        Err(LeaveError::Forbidden) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
    assert_status(&service, request.id, LeaveStatus::Pending);
}

#[test]
fn approving_a_settled_request_is_an_invalid_transition() {
    let (service, _) = build_service();
    let request = submit(&service, short_annual());
    service.approve(request.id, TOM, "").expect("lead approves");
    service.approve(request.id, HANNAH, "").expect("hr approves");

    match service.approve(request.id, HANNAH, "") {
        Err(LeaveError::InvalidTransition {
            status: LeaveStatus::Approved,
            ..
        }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn team_lead_requests_route_to_hr() {
    let (service, _) = build_service();
    let request = service
        .create_leave_request(TOM, short_annual())
        .expect("lead submits");
    assert_eq!(request.team_lead_id, None);

    let queue = service
        .pending_approvals(HANNAH, ApprovalStage::Hr)
        .expect("hr queue loads");
    assert_eq!(queue.len(), 1);

    service
        .approve(request.id, HANNAH, "covering lead stage")
        .expect("hr covers lead stage");
    let outcome = service
        .approve(request.id, HANNAH, "")
        .expect("hr approves");
    assert_eq!(outcome.request.status, LeaveStatus::Approved);
}

#[test]
fn approval_queues_follow_the_pipeline() {
    let (service, _) = build_service();
    let short = submit(&service, short_annual());
    let long = submit(&service, long_annual());

    let lead_queue = service
        .pending_approvals(TOM, ApprovalStage::TeamLead)
        .expect("lead queue loads");
    assert_eq!(lead_queue.len(), 2);

    for id in [short.id, long.id] {
        service.approve(id, TOM, "").expect("lead approves");
        service.approve(id, HANNAH, "").expect("hr approves");
    }

    let management = service
        .pending_approvals(MAX, ApprovalStage::Management)
        .expect("management queue loads");
    let ids: Vec<_> = management.iter().map(|request| request.id).collect();
    assert_eq!(ids, vec![long.id]);

    match service.pending_approvals(ALICE, ApprovalStage::Hr) {
        Err(LeaveError::Forbidden) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[test]
fn balance_low_notification_follows_final_approval() {
    let (service, _) = build_service();
    service
        .initialize_or_reset_balance(ALICE, 2026)
        .expect("balances opened");
    service
        .adjust_balance(ALICE, 2026, LeaveType::Annual, 5, 0)
        .expect("allocation set");

    let request = submit(&service, short_annual());
    service.approve(request.id, TOM, "").expect("lead approves");
    service.approve(request.id, HANNAH, "").expect("hr approves");

    let kinds: Vec<NotificationKind> = service
        .notifications(ALICE, true)
        .expect("notifications load")
        .iter()
        .map(|notification| notification.kind)
        .collect();
    assert!(kinds.contains(&NotificationKind::LeaveApproved));
    assert!(kinds.contains(&NotificationKind::BalanceLow));
}

#[test]
fn team_lead_is_notified_and_can_mark_read() {
    let (service, _) = build_service();
    let request = submit(&service, short_annual());

    let inbox = service.notifications(TOM, true).expect("inbox loads");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::LeaveRequested);
    assert_eq!(inbox[0].request_id, Some(request.id));

    match service.mark_notification_read(inbox[0].id, ALICE) {
        Err(LeaveError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }

    let read = service
        .mark_notification_read(inbox[0].id, TOM)
        .expect("addressee marks read");
    assert!(read.read_at.is_some());
    assert_eq!(
        service.unread_notification_count(TOM).expect("count loads"),
        0
    );

    let again = service
        .mark_notification_read(inbox[0].id, TOM)
        .expect("marking twice is harmless");
    assert_eq!(again.read_at, read.read_at);
}

#[test]
fn mark_all_read_counts_changes() {
    let (service, _) = build_service();
    let first = submit(&service, short_annual());
    let second = submit(&service, long_annual());
    service.reject(first.id, TOM, "").expect("lead rejects");
    service.reject(second.id, TOM, "").expect("lead rejects");

    assert_eq!(
        service.unread_notification_count(ALICE).expect("count loads"),
        2
    );
    assert_eq!(
        service
            .mark_all_notifications_read(ALICE)
            .expect("mark all succeeds"),
        2
    );
    assert_eq!(
        service
            .mark_all_notifications_read(ALICE)
            .expect("mark all succeeds"),
        0
    );
}

#[test]
fn reset_opens_the_new_year_with_carry_over() {
    let (service, _) = build_service();
    service
        .initialize_default_policies(2025)
        .expect("2025 policies seeded");
    service
        .initialize_or_reset_balance(ALICE, 2025)
        .expect("2025 balances opened");
    service
        .adjust_balance(ALICE, 2025, LeaveType::Annual, 8, 0)
        .expect("2025 allocation set");

    let balances = service
        .initialize_or_reset_balance(ALICE, 2026)
        .expect("2026 balances opened");
    let annual = balances
        .iter()
        .find(|balance| balance.leave_type == LeaveType::Annual)
        .expect("annual balance");

    assert_eq!(annual.carry_over_days(), 5);
    assert_eq!(annual.used_days(), 0);
    assert_eq!(annual.remaining_days(), 25);
}

#[test]
fn initialize_without_policies_is_not_found() {
    let (service, _) = build_service();

    match service.initialize_or_reset_balance(ALICE, 2030) {
        Err(LeaveError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn timeline_names_each_actor() {
    let (service, _) = build_service();
    let request = submit(&service, long_annual());
    service.approve(request.id, TOM, "ok").expect("lead approves");
    service
        .reject(request.id, HANNAH, "coverage gap")
        .expect("hr rejects");

    let events = service.timeline(request.id).expect("timeline loads");
    let summary: Vec<(TimelineAction, String)> = events
        .iter()
        .map(|event| (event.action, event.actor_name.clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (TimelineAction::Submitted, "Alice Martin".to_string()),
            (TimelineAction::Approved, "Tom Reyes".to_string()),
            (TimelineAction::Rejected, "Hannah Ode".to_string()),
        ]
    );
    assert_eq!(events[2].comment, "coverage gap");
}

#[test]
fn reports_summarize_requests() {
    let (service, _) = build_service();
    let first = submit(&service, short_annual());
    submit(&service, long_annual());
    service.reject(first.id, TOM, "").expect("lead rejects");

    let summary = service.request_summary(2026).expect("summary loads");
    assert_eq!(summary.total_requests, 2);
    assert_eq!(summary.by_status.get(&LeaveStatus::Rejected), Some(&1));
    assert_eq!(summary.by_status.get(&LeaveStatus::Pending), Some(&1));
    assert_eq!(summary.by_month.get(&3), Some(&1));
    assert_eq!(summary.by_month.get(&4), Some(&1));

    let stats = service.request_stats(ALICE).expect("stats load");
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.by_status.get(&LeaveStatus::Approved), Some(&0));

    let listed = service
        .requests_for_user(ALICE, Some(2026))
        .expect("requests load");
    assert_eq!(listed[0].start_date, date(2026, 4, 6));
}

#[test]
fn low_balances_default_to_configured_threshold() {
    let (service, _) = build_service();
    service
        .initialize_or_reset_balance(ALICE, 2026)
        .expect("balances opened");

    let low = service.low_balances(2026, None).expect("report loads");
    let types: Vec<LeaveType> = low.iter().map(|balance| balance.leave_type).collect();
    assert_eq!(types, vec![LeaveType::Unpaid]);

    let wider = service.low_balances(2026, Some(3)).expect("report loads");
    assert_eq!(wider.len(), 2);
}

#[test]
fn policy_administration_round_trips_through_service() {
    let (service, _) = build_service();

    let updated = service
        .update_policy(
            2026,
            LeaveType::Annual,
            PolicyUpdate {
                min_notice_days: Some(1),
                ..PolicyUpdate::default()
            },
        )
        .expect("policy updates");
    assert_eq!(updated.min_notice_days, 1);

    service
        .create_leave_request(
            ALICE,
            draft(LeaveType::Annual, date(2026, 3, 3), date(2026, 3, 3)),
        )
        .expect("shorter notice now allowed");

    service
        .deactivate_policy(2026, LeaveType::Paternity)
        .expect("policy deactivates");
    assert_eq!(
        service.policies(2026).expect("policies load").len(),
        LeaveType::ALL.len() - 1
    );
    assert_eq!(service.copy_policies(2026, 2028).expect("copy succeeds"), 7);
}

#[test]
fn authorization_follows_role_catalog() {
    let (service, _) = build_service();

    service
        .authorize(HANNAH, Permission::ManageLeavePolicies)
        .expect("hr manages policies");
    match service.authorize(ALICE, Permission::ViewLeaveReports) {
        Err(LeaveError::Forbidden) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
    match service.authenticate("nobody") {
        Err(LeaveError::Unauthorized) => {}
        other => panic!("expected unauthorized, got {other:?}"),
    }
    assert_eq!(service.authenticate("alice-token").expect("token valid"), ALICE);
}

#[test]
fn storage_outage_surfaces_as_storage_error() {
    let service = service_with_store(Arc::new(UnavailableStore));

    match service.create_leave_request(ALICE, short_annual()) {
        Err(LeaveError::Storage(_)) => {}
        other => panic!("expected storage error, got {other:?}"),
    }
}

#[test]
fn concurrent_overlapping_submissions_admit_one() {
    let (service, _) = build_service();

    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                scope.spawn(move || service.create_leave_request(ALICE, long_annual()).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .collect()
    });

    assert_eq!(results.iter().filter(|admitted| **admitted).count(), 1);
    assert_eq!(
        service
            .requests_for_user(ALICE, None)
            .expect("requests load")
            .len(),
        1
    );
}

#[test]
fn next_year_request_before_rollover_keeps_carry_over() {
    let (service, _) = build_service();
    service
        .initialize_or_reset_balance(ALICE, 2026)
        .expect("2026 balances opened");

    let request = submit(
        &service,
        draft(LeaveType::Annual, date(2027, 2, 1), date(2027, 2, 3)),
    );
    assert_eq!(request.status, LeaveStatus::Pending);

    let opened = service
        .initialize_or_reset_balance(ALICE, 2027)
        .expect("2027 balances listed");
    let annual = opened
        .iter()
        .find(|balance| balance.leave_type == LeaveType::Annual)
        .expect("annual balance");
    assert_eq!(annual.carry_over_days(), 5);
    assert_eq!(annual.remaining_days(), 25);
}

#[test]
fn each_intermediate_approval_asks_the_next_stage() {
    let (service, _) = build_service();
    let request = submit(&service, long_annual());

    service.approve(request.id, TOM, "").expect("lead approves");
    let hr_inbox = service.notifications(HANNAH, true).expect("inbox loads");
    assert_eq!(hr_inbox.len(), 1);
    assert_eq!(hr_inbox[0].kind, NotificationKind::ApprovalRequired);
    assert_eq!(hr_inbox[0].request_id, Some(request.id));

    service.approve(request.id, HANNAH, "").expect("hr approves");
    let management_inbox = service.notifications(MAX, true).expect("inbox loads");
    assert_eq!(management_inbox.len(), 1);
    assert_eq!(management_inbox[0].kind, NotificationKind::ApprovalRequired);

    service.approve(request.id, MAX, "").expect("management approves");
    assert_eq!(
        service.unread_notification_count(MAX).expect("count loads"),
        1
    );
    assert_eq!(
        service.unread_notification_count(HANNAH).expect("count loads"),
        1
    );
}

#[test]
fn short_requests_do_not_reach_management() {
    let (service, _) = build_service();
    let request = submit(&service, short_annual());

    service.approve(request.id, TOM, "").expect("lead approves");
    service.approve(request.id, HANNAH, "").expect("hr approves");

    assert_eq!(
        service.unread_notification_count(MAX).expect("count loads"),
        0
    );
}

#[test]
fn requests_without_a_lead_notify_hr() {
    let (service, _) = build_service();
    let request = service
        .create_leave_request(TOM, short_annual())
        .expect("lead submits");

    let inbox = service.notifications(HANNAH, true).expect("inbox loads");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::LeaveRequested);
    assert_eq!(inbox[0].request_id, Some(request.id));
    assert_eq!(
        service.unread_notification_count(TOM).expect("count loads"),
        0
    );
}
