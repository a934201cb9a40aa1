use super::common::*;

use chrono::NaiveDate;

use crate::access::UserId;
use crate::workflows::leave::calendar::CalendarProjector;
use crate::workflows::leave::domain::{inclusive_days, LeaveRequest, LeaveStatus, LeaveType};
use crate::workflows::leave::repository::LeaveTransaction;

fn stored_request(
    tx: &mut dyn LeaveTransaction,
    user: UserId,
    start: NaiveDate,
    end: NaiveDate,
    status: LeaveStatus,
) -> LeaveRequest {
    let request = LeaveRequest {
        id: tx.next_request_id().expect("id issued"),
        user_id: user,
        leave_type: LeaveType::Annual,
        start_date: start,
        end_date: end,
        days_requested: inclusive_days(start, end),
        reason: String::new(),
        status,
        team_lead_id: Some(TOM),
        team_lead_decision: None,
        hr_decision: None,
        management_decision: None,
        cancelled_at: None,
        created_at: now(),
        updated_at: now(),
    };
    tx.insert_request(request.clone()).expect("request stored");
    request
}

#[test]
fn projection_has_one_entry_per_day() {
    let store = seeded_store();

    let entries = within(&store, |tx| {
        let request = stored_request(
            tx,
            ALICE,
            date(2026, 2, 27),
            date(2026, 3, 2),
            LeaveStatus::Pending,
        );
        CalendarProjector::new(tx).project_for_request(&request)
    })
    .expect("projection succeeds");

    let dates: Vec<NaiveDate> = entries.iter().map(|entry| entry.date).collect();
    assert_eq!(
        dates,
        vec![
            date(2026, 2, 27),
            date(2026, 2, 28),
            date(2026, 3, 1),
            date(2026, 3, 2),
        ]
    );
    assert!(entries
        .iter()
        .all(|entry| entry.status == LeaveStatus::Pending && entry.user_id == ALICE));
}

#[test]
fn reprojection_replaces_previous_dates() {
    let store = seeded_store();

    let entries = within(&store, |tx| {
        let mut request = stored_request(
            tx,
            ALICE,
            date(2026, 5, 4),
            date(2026, 5, 8),
            LeaveStatus::Pending,
        );
        CalendarProjector::new(tx).project_for_request(&request)?;
        request.start_date = date(2026, 5, 11);
        request.end_date = date(2026, 5, 12);
        CalendarProjector::new(tx).project_for_request(&request)?;
        CalendarProjector::new(tx).entries_for_request(request.id)
    })
    .expect("projection succeeds");

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].date, date(2026, 5, 11));
}

#[test]
fn status_updates_touch_every_entry() {
    let store = seeded_store();

    let entries = within(&store, |tx| {
        let request = stored_request(
            tx,
            ALICE,
            date(2026, 6, 1),
            date(2026, 6, 3),
            LeaveStatus::Pending,
        );
        let mut projector = CalendarProjector::new(tx);
        projector.project_for_request(&request)?;
        let updated = projector.update_status(request.id, LeaveStatus::Approved)?;
        assert_eq!(updated, 3);
        projector.entries_for_request(request.id)
    })
    .expect("update succeeds");

    assert!(entries
        .iter()
        .all(|entry| entry.status == LeaveStatus::Approved));
}

#[test]
fn overlap_ignores_released_and_excluded_requests() {
    let store = seeded_store();

    within(&store, |tx| {
        let pending = stored_request(
            tx,
            ALICE,
            date(2026, 7, 6),
            date(2026, 7, 10),
            LeaveStatus::Pending,
        );
        let rejected = stored_request(
            tx,
            ALICE,
            date(2026, 7, 20),
            date(2026, 7, 22),
            LeaveStatus::Rejected,
        );
        let mut projector = CalendarProjector::new(tx);
        projector.project_for_request(&pending)?;
        projector.project_for_request(&rejected)?;

        assert!(projector.has_overlap(ALICE, date(2026, 7, 10), date(2026, 7, 12), None)?);
        assert!(!projector.has_overlap(
            ALICE,
            date(2026, 7, 10),
            date(2026, 7, 12),
            Some(pending.id)
        )?);
        assert!(!projector.has_overlap(ALICE, date(2026, 7, 21), date(2026, 7, 21), None)?);
        assert!(!projector.has_overlap(BOB, date(2026, 7, 6), date(2026, 7, 10), None)?);
        assert!(!projector.is_date_available(ALICE, date(2026, 7, 8))?);
        assert!(projector.is_date_available(ALICE, date(2026, 7, 21))?);
        Ok(())
    })
    .expect("overlap checks succeed");
}

#[test]
fn available_dates_skip_reserved_days() {
    let store = seeded_store();

    let available = within(&store, |tx| {
        let request = stored_request(
            tx,
            ALICE,
            date(2026, 8, 4),
            date(2026, 8, 5),
            LeaveStatus::TeamLeadApproved,
        );
        let mut projector = CalendarProjector::new(tx);
        projector.project_for_request(&request)?;
        projector.available_dates(ALICE, date(2026, 8, 3), date(2026, 8, 6))
    })
    .expect("availability succeeds");

    assert_eq!(available, vec![date(2026, 8, 3), date(2026, 8, 6)]);
}

#[test]
fn team_entries_follow_the_frozen_lead() {
    let store = seeded_store();

    let entries = within(&store, |tx| {
        let alice = stored_request(
            tx,
            ALICE,
            date(2026, 9, 1),
            date(2026, 9, 2),
            LeaveStatus::Pending,
        );
        let bob = stored_request(
            tx,
            BOB,
            date(2026, 9, 2),
            date(2026, 9, 2),
            LeaveStatus::Approved,
        );
        let mut projector = CalendarProjector::new(tx);
        projector.project_for_request(&alice)?;
        projector.project_for_request(&bob)?;
        projector.team_entries(TOM, date(2026, 9, 2), date(2026, 9, 30))
    })
    .expect("team calendar succeeds");

    let owners: Vec<UserId> = entries.iter().map(|entry| entry.user_id).collect();
    assert_eq!(owners, vec![ALICE, BOB]);
}

#[test]
fn stats_split_approved_and_pending_days() {
    let store = seeded_store();

    let stats = within(&store, |tx| {
        let approved = stored_request(
            tx,
            ALICE,
            date(2026, 3, 30),
            date(2026, 4, 2),
            LeaveStatus::Approved,
        );
        let pending = stored_request(
            tx,
            ALICE,
            date(2026, 10, 5),
            date(2026, 10, 6),
            LeaveStatus::HrApproved,
        );
        let cancelled = stored_request(
            tx,
            ALICE,
            date(2026, 11, 2),
            date(2026, 11, 2),
            LeaveStatus::Cancelled,
        );
        let mut projector = CalendarProjector::new(tx);
        for request in [&approved, &pending, &cancelled] {
            projector.project_for_request(request)?;
        }
        projector.stats(ALICE, 2026)
    })
    .expect("stats succeed");

    assert_eq!(stats.total_days_on_leave, 4);
    assert_eq!(stats.pending_days, 2);
    assert_eq!(stats.days_by_month.get(&3), Some(&2));
    assert_eq!(stats.days_by_month.get(&4), Some(&2));
    assert_eq!(stats.days_by_month.get(&11), Some(&0));
    assert_eq!(stats.days_by_type.get(&LeaveType::Annual), Some(&4));
}

#[test]
fn entries_for_user_are_ordered_by_date() {
    let store = seeded_store();

    let entries = within(&store, |tx| {
        let later = stored_request(
            tx,
            ALICE,
            date(2026, 12, 21),
            date(2026, 12, 22),
            LeaveStatus::Pending,
        );
        let earlier = stored_request(
            tx,
            ALICE,
            date(2026, 12, 1),
            date(2026, 12, 1),
            LeaveStatus::Pending,
        );
        let mut projector = CalendarProjector::new(tx);
        projector.project_for_request(&later)?;
        projector.project_for_request(&earlier)?;
        projector.entries_for_user(ALICE, date(2026, 12, 1), date(2026, 12, 31))
    })
    .expect("entries load");

    let dates: Vec<NaiveDate> = entries.iter().map(|entry| entry.date).collect();
    assert_eq!(
        dates,
        vec![date(2026, 12, 1), date(2026, 12, 21), date(2026, 12, 22)]
    );
}

#[test]
fn year_entries_stop_at_the_year_boundary() {
    let store = seeded_store();

    let entries = within(&store, |tx| {
        let request = stored_request(
            tx,
            ALICE,
            date(2026, 12, 30),
            date(2027, 1, 2),
            LeaveStatus::Pending,
        );
        let mut projector = CalendarProjector::new(tx);
        projector.project_for_request(&request)?;
        projector.entries_for_year(ALICE, 2027)
    })
    .expect("entries load");

    let dates: Vec<NaiveDate> = entries.iter().map(|entry| entry.date).collect();
    assert_eq!(dates, vec![date(2027, 1, 1), date(2027, 1, 2)]);
}
