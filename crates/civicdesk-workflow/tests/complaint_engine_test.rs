//! Integration tests for the complaint lifecycle engine.

mod common;

use civicdesk_core::error::CivicError;
use civicdesk_core::models::complaint::{ComplaintStatus, SUBMITTED_NOTE, TransitionPolicy};
use civicdesk_core::models::user::{Role, UpdateUser};
use civicdesk_core::repository::{ComplaintRepository, Pagination, UserRepository};
use civicdesk_workflow::LifecycleConfig;
use civicdesk_workflow::complaint::{
    ASSIGNMENT_SUBJECT, STAFF_ASSIGNED_SUBJECT, STATUS_UPDATE_SUBJECT, StatusUpdate,
};
use common::*;

#[tokio::test]
async fn filing_seeds_a_single_pending_entry() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;

    let complaint = h
        .engine
        .file(&actor(&citizen), file_input("560001"))
        .await
        .unwrap();
    assert_eq!(complaint.timeline.len(), 1);
    assert_eq!(complaint.current_status(), ComplaintStatus::Pending);
    assert_eq!(complaint.timeline[0].note.as_deref(), Some(SUBMITTED_NOTE));
    assert_eq!(complaint.timeline[0].updated_by, citizen.id);
    assert_eq!(complaint.support.upvotes, 1);

    let mut reloaded = h.complaints.get_by_id(complaint.id).await.unwrap();
    assert!(!reloaded.seed_timeline());
    assert_eq!(reloaded.timeline.len(), 1);
}

#[tokio::test]
async fn filing_rejects_a_malformed_pincode() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;
    let err = h
        .engine
        .file(&actor(&citizen), file_input("56001"))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::InvalidPincode { .. }));
}

#[tokio::test]
async fn assignment_is_gated_by_jurisdiction_and_exclusive() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;
    let staff = seed_user(&h.users, Role::Staff, "Staff").await;
    let outsider = actor(
        &seed_user_with(&h.users, Role::MunicipalAdmin, "Out", None, &["560099"], None).await,
    );
    let insider = actor(
        &seed_user_with(&h.users, Role::MunicipalAdmin, "In", None, &["560001"], None).await,
    );
    let complaint = seed_complaint(&h.complaints, citizen.id, "560001", None).await;

    let err = h
        .engine
        .assign_staff(&outsider, complaint.id, staff.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::Forbidden { .. }));

    let assigned = h
        .engine
        .assign_staff(&insider, complaint.id, staff.id)
        .await
        .unwrap();
    assert_eq!(assigned.assigned_to, Some(staff.id));
    assert!(assigned.assigned_at.is_some());
    assert_eq!(assigned.current_status(), ComplaintStatus::Acknowledged);
    assert_eq!(
        assigned.timeline.last().unwrap().note,
        Some(format!("Assigned to staff {}", staff.full_name()))
    );

    let other = seed_user(&h.users, Role::Staff, "Other").await;
    let err = h
        .engine
        .assign_staff(&insider, complaint.id, other.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::AlreadyAssigned { .. }));

    let sent = h.notifier.sent();
    assert!(
        sent.iter()
            .any(|n| n.recipient == staff.email && n.subject == ASSIGNMENT_SUBJECT)
    );
    assert!(
        sent.iter()
            .any(|n| n.recipient == citizen.email && n.subject == STAFF_ASSIGNED_SUBJECT)
    );
}

#[tokio::test]
async fn assignment_checks_the_assignee() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;
    let insider = actor(
        &seed_user_with(&h.users, Role::MunicipalAdmin, "In", None, &["560001"], None).await,
    );
    let complaint = seed_complaint(&h.complaints, citizen.id, "560001", None).await;

    let err = h
        .engine
        .assign_staff(&insider, complaint.id, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "STAFF_NOT_FOUND");

    let err = h
        .engine
        .assign_staff(&insider, complaint.id, citizen.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::InvalidRole { .. }));

    let err = h
        .engine
        .assign_staff(&insider, uuid::Uuid::new_v4(), citizen.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "COMPLAINT_NOT_FOUND");
}

#[tokio::test]
async fn resolved_at_is_fixed_by_the_first_resolution() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;
    let admin = actor(&seed_user(&h.users, Role::Admin, "Admin").await);
    let complaint = seed_complaint(&h.complaints, citizen.id, "560001", None).await;
    assert!(complaint.resolved_at.is_none());

    let first = h
        .engine
        .update_status(&admin, complaint.id, StatusUpdate::to(ComplaintStatus::Resolved))
        .await
        .unwrap();
    let resolved_at = first.resolved_at.unwrap();
    assert_eq!(resolved_at, first.timeline.last().unwrap().updated_at);
    assert_eq!(
        first.timeline.last().unwrap().note.as_deref(),
        Some("Status changed to Resolved")
    );

    h.engine
        .update_status(&admin, complaint.id, StatusUpdate::to(ComplaintStatus::InProgress))
        .await
        .unwrap();
    let again = h
        .engine
        .update_status(&admin, complaint.id, StatusUpdate::to(ComplaintStatus::Resolved))
        .await
        .unwrap();
    assert_eq!(again.resolved_at, Some(resolved_at));
    assert_eq!(again.timeline.len(), 4);
}

#[tokio::test]
async fn permissive_policy_reopens_a_resolved_complaint() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;
    let staff_user = seed_user(&h.users, Role::Staff, "Staff").await;
    let insider = actor(
        &seed_user_with(&h.users, Role::MunicipalAdmin, "In", None, &["560001"], None).await,
    );
    let complaint = seed_complaint(&h.complaints, citizen.id, "560001", None).await;
    h.engine
        .assign_staff(&insider, complaint.id, staff_user.id)
        .await
        .unwrap();

    let staff = actor(&staff_user);
    h.engine
        .update_status(&staff, complaint.id, StatusUpdate::to(ComplaintStatus::Resolved))
        .await
        .unwrap();
    let reopened = h
        .engine
        .update_status(&staff, complaint.id, StatusUpdate::to(ComplaintStatus::Pending))
        .await
        .unwrap();

    assert_eq!(reopened.current_status(), ComplaintStatus::Pending);
    assert!(reopened.resolved_at.is_some());
    assert!(
        h.notifier
            .sent()
            .iter()
            .any(|n| n.subject == STATUS_UPDATE_SUBJECT)
    );
}

#[tokio::test]
async fn strict_policy_follows_the_lifecycle_graph() {
    let h = setup_with(LifecycleConfig {
        transition_policy: TransitionPolicy::Strict,
    })
    .await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;
    let admin = actor(&seed_user(&h.users, Role::Admin, "Admin").await);
    let complaint = seed_complaint(&h.complaints, citizen.id, "560001", None).await;

    let err = h
        .engine
        .update_status(&admin, complaint.id, StatusUpdate::to(ComplaintStatus::Resolved))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::InvalidStatus { .. }));

    for status in [
        ComplaintStatus::Acknowledged,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
    ] {
        h.engine
            .update_status(&admin, complaint.id, StatusUpdate::to(status))
            .await
            .unwrap();
    }
    let err = h
        .engine
        .update_status(&admin, complaint.id, StatusUpdate::to(ComplaintStatus::Pending))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::InvalidStatus { .. }));
}

#[tokio::test]
async fn unknown_status_and_unauthorised_updates_are_rejected() {
    let h = setup().await;
    let citizen_user = seed_user(&h.users, Role::Citizen, "Citizen").await;
    let complaint = seed_complaint(&h.complaints, citizen_user.id, "560001", None).await;

    let update = StatusUpdate {
        status: "Closed".into(),
        ..StatusUpdate::to(ComplaintStatus::Pending)
    };
    let admin = actor(&seed_user(&h.users, Role::Admin, "Admin").await);
    let err = h
        .engine
        .update_status(&admin, complaint.id, update)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATUS");

    let err = h
        .engine
        .update_status(
            &actor(&citizen_user),
            complaint.id,
            StatusUpdate::to(ComplaintStatus::Resolved),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::Forbidden { .. }));

    let stranger = actor(&seed_user(&h.users, Role::Staff, "Stranger").await);
    let err = h
        .engine
        .update_status(&stranger, complaint.id, StatusUpdate::to(ComplaintStatus::Resolved))
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::Forbidden { .. }));
}

#[tokio::test]
async fn complainants_who_opted_out_get_no_status_mail() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Quiet").await;
    let mut prefs = citizen.notification_preferences;
    prefs.email = false;
    h.users
        .update(
            citizen.id,
            UpdateUser {
                notification_preferences: Some(prefs),
                ..UpdateUser::default()
            },
        )
        .await
        .unwrap();
    let admin = actor(&seed_user(&h.users, Role::Admin, "Admin").await);
    let complaint = seed_complaint(&h.complaints, citizen.id, "560001", None).await;

    h.engine
        .update_status(&admin, complaint.id, StatusUpdate::to(ComplaintStatus::Acknowledged))
        .await
        .unwrap();
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn assignment_mail_reaches_complainants_who_opted_out() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Quiet").await;
    let mut prefs = citizen.notification_preferences;
    prefs.email = false;
    h.users
        .update(
            citizen.id,
            UpdateUser {
                notification_preferences: Some(prefs),
                ..UpdateUser::default()
            },
        )
        .await
        .unwrap();
    let staff = seed_user(&h.users, Role::Staff, "Staff").await;
    let insider = actor(
        &seed_user_with(&h.users, Role::MunicipalAdmin, "In", None, &["560001"], None).await,
    );
    let complaint = seed_complaint(&h.complaints, citizen.id, "560001", None).await;

    h.engine
        .assign_staff(&insider, complaint.id, staff.id)
        .await
        .unwrap();
    assert!(
        h.notifier
            .sent()
            .iter()
            .any(|n| n.recipient == citizen.email && n.subject == STAFF_ASSIGNED_SUBJECT)
    );
}

#[tokio::test]
async fn stale_revisions_lose_the_race() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;
    let complaint = seed_complaint(&h.complaints, citizen.id, "560001", None).await;

    let first = h.complaints.get_by_id(complaint.id).await.unwrap();
    let second = first.clone();
    h.complaints.save(first).await.unwrap();
    let err = h.complaints.save(second).await.unwrap_err();
    assert!(matches!(err, CivicError::Conflict { .. }));
}

#[tokio::test]
async fn jurisdiction_listing_groups_by_pincode() {
    let h = setup().await;
    let citizen = seed_user(&h.users, Role::Citizen, "Citizen").await;
    seed_complaint(&h.complaints, citizen.id, "560001", None).await;
    seed_complaint(&h.complaints, citizen.id, "560001", None).await;
    seed_complaint(&h.complaints, citizen.id, "560002", None).await;
    seed_complaint(&h.complaints, citizen.id, "560099", None).await;

    let municipal = actor(
        &seed_user_with(
            &h.users,
            Role::MunicipalAdmin,
            "Muni",
            None,
            &["560001", "560002"],
            None,
        )
        .await,
    );
    let listing = h.engine.list_by_jurisdiction(&municipal).await.unwrap();
    assert_eq!(listing.total, 3);
    assert_eq!(listing.by_pincode[&pin("560001")].len(), 2);
    assert_eq!(listing.by_pincode[&pin("560002")].len(), 1);
    assert!(
        listing
            .complaints
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at)
    );

    let stats = h.engine.assignment_stats(&municipal).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.unassigned, 3);
    assert_eq!(stats.by_status.get("Pending"), Some(&3));

    let idle = actor(&seed_user(&h.users, Role::MunicipalAdmin, "Idle").await);
    assert!(matches!(
        h.engine.list_by_jurisdiction(&idle).await,
        Err(CivicError::NoJurisdiction { .. })
    ));
}

#[tokio::test]
async fn viewing_counts_and_respects_ownership() {
    let h = setup().await;
    let owner = seed_user(&h.users, Role::Citizen, "Owner").await;
    let other = seed_user(&h.users, Role::Citizen, "Other").await;
    let complaint = seed_complaint(&h.complaints, owner.id, "560001", None).await;

    let viewed = h.engine.get(&actor(&owner), complaint.id).await.unwrap();
    assert_eq!(viewed.support.view_count, 1);
    assert!(matches!(
        h.engine.get(&actor(&other), complaint.id).await,
        Err(CivicError::Forbidden { .. })
    ));

    let mine = h
        .engine
        .list_mine(&actor(&owner), Pagination::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
}

#[tokio::test]
async fn support_is_once_per_user() {
    let h = setup().await;
    let owner = seed_user(&h.users, Role::Citizen, "Owner").await;
    let neighbour = actor(&seed_user(&h.users, Role::Citizen, "Neighbour").await);
    let complaint = seed_complaint(&h.complaints, owner.id, "560001", None).await;

    let supported = h.engine.support(&neighbour, complaint.id).await.unwrap();
    assert_eq!(supported.support.upvotes, 2);

    for who in [neighbour, actor(&owner)] {
        let err = h.engine.support(&who, complaint.id).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_SUPPORTED");
    }
}

#[tokio::test]
async fn feedback_follows_resolution() {
    let h = setup().await;
    let owner_user = seed_user(&h.users, Role::Citizen, "Owner").await;
    let owner = actor(&owner_user);
    let admin = actor(&seed_user(&h.users, Role::Admin, "Admin").await);
    let complaint = seed_complaint(&h.complaints, owner_user.id, "560001", None).await;

    let err = h
        .engine
        .add_feedback(&owner, complaint.id, 5, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_RESOLVED");

    h.engine
        .update_status(&admin, complaint.id, StatusUpdate::to(ComplaintStatus::Resolved))
        .await
        .unwrap();

    let err = h
        .engine
        .add_feedback(&owner, complaint.id, 6, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_RATING");

    let err = h
        .engine
        .add_feedback(&admin, complaint.id, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CivicError::Forbidden { .. }));

    let rated = h
        .engine
        .add_feedback(&owner, complaint.id, 4, Some("Fixed quickly".into()))
        .await
        .unwrap();
    assert_eq!(rated.feedback.len(), 1);
    assert_eq!(rated.feedback[0].rating, 4);

    let err = h
        .engine
        .add_feedback(&owner, complaint.id, 5, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FEEDBACK_EXISTS");
}
