//! Complaint lifecycle engine.
//!
//! The status of a complaint is never stored on its own: it is the
//! status of the last timeline entry. Every mutation here loads the
//! complaint, changes it in memory and saves it back with a revision
//! check, so two concurrent writers cannot both win.
//!
//! Notifications go out after the write has been persisted. A failed
//! notification is logged and otherwise ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use civicdesk_core::access::{Action, Actor, ComplaintView, authorize};
use civicdesk_core::error::{CivicError, CivicResult};
use civicdesk_core::models::complaint::{
    Complaint, ComplaintStatus, Feedback, FileComplaint, Supporter, TimelineEntry,
    validate_attachment, validate_feedback, validate_note,
};
use civicdesk_core::models::user::{Role, User};
use civicdesk_core::notifier::{Notification, Notifier, dispatch};
use civicdesk_core::pincode::{AreaSet, Pincode};
use civicdesk_core::repository::{
    ComplaintRepository, PaginatedResult, Pagination, UserRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::LifecycleConfig;

pub const ASSIGNMENT_SUBJECT: &str = "New Complaint Assignment";
pub const STAFF_ASSIGNED_SUBJECT: &str = "Complaint Update - Staff Assigned";
pub const STATUS_UPDATE_SUBJECT: &str = "Complaint Status Update";

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn to(status: ComplaintStatus) -> Self {
        Self {
            status: status.as_str().to_string(),
            note: None,
            attachments: Vec::new(),
            estimated_completion: None,
        }
    }
}

/// A municipal admin's complaints, newest first, plus the same list
/// grouped by pincode.
#[derive(Debug, Clone, Serialize)]
pub struct JurisdictionComplaints {
    pub pincodes: AreaSet,
    pub total: usize,
    pub complaints: Vec<Complaint>,
    pub by_pincode: BTreeMap<Pincode, Vec<Complaint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentStats {
    pub by_status: BTreeMap<String, u64>,
    pub assigned: u64,
    pub unassigned: u64,
    pub total: u64,
}

pub struct ComplaintEngine<C, U, N>
where
    C: ComplaintRepository,
    U: UserRepository,
    N: Notifier,
{
    complaints: C,
    users: U,
    notifier: N,
    config: LifecycleConfig,
}

impl<C, U, N> ComplaintEngine<C, U, N>
where
    C: ComplaintRepository,
    U: UserRepository,
    N: Notifier,
{
    pub fn new(complaints: C, users: U, notifier: N, config: LifecycleConfig) -> Self {
        Self {
            complaints,
            users,
            notifier,
            config,
        }
    }

    pub async fn file(&self, actor: &Actor, input: FileComplaint) -> CivicResult<Complaint> {
        authorize(actor, &Action::FileComplaint)?;
        let complaint = input.into_complaint(actor.user_id, Utc::now())?;
        let complaint = self.complaints.create(complaint).await?;
        info!(
            complaint_id = %complaint.id,
            user_id = %actor.user_id,
            category = %complaint.category,
            pin_code = %complaint.pin_code(),
            "Complaint filed"
        );
        Ok(complaint)
    }

    /// Append a status entry to the timeline. Under the permissive policy
    /// any status may follow any other, including leaving a terminal one.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        update: StatusUpdate,
    ) -> CivicResult<Complaint> {
        let status: ComplaintStatus = update.status.trim().parse()?;
        let note = update
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if let Some(note) = &note {
            validate_note(note)?;
        }
        for url in &update.attachments {
            validate_attachment(url)?;
        }

        let mut complaint = self.complaints.get_by_id(id).await?;
        authorize(
            actor,
            &Action::UpdateComplaintStatus(ComplaintView::from(&complaint)),
        )?;

        let from = complaint.current_status();
        if !self.config.transition_policy.permits(from, status) {
            return Err(CivicError::InvalidStatus {
                status: format!("{from} -> {status}"),
            });
        }

        complaint.append(TimelineEntry {
            status,
            updated_at: Utc::now(),
            updated_by: actor.user_id,
            note: Some(note.unwrap_or_else(|| format!("Status changed to {status}"))),
            attachments: update.attachments,
            estimated_completion: update.estimated_completion,
        });
        let complaint = self.complaints.save(complaint).await?;

        info!(
            complaint_id = %id,
            from = %from,
            to = %status,
            actor_id = %actor.user_id,
            "Complaint status updated"
        );

        self.notify_complainant(
            &complaint,
            OptOut::Honoured,
            STATUS_UPDATE_SUBJECT,
            format!(
                "The status of your complaint \"{}\" is now {status}.",
                complaint.title
            ),
        )
        .await;
        Ok(complaint)
    }

    /// Assign a staff member. Only a municipal admin with jurisdiction
    /// over the complaint's pincode may do this, and only once.
    pub async fn assign_staff(
        &self,
        actor: &Actor,
        id: Uuid,
        staff_id: Uuid,
    ) -> CivicResult<Complaint> {
        let mut complaint = self.complaints.get_by_id(id).await?;
        authorize(actor, &Action::AssignComplaint(ComplaintView::from(&complaint)))?;
        if complaint.assigned_to.is_some() {
            return Err(CivicError::AlreadyAssigned { complaint_id: id });
        }

        let staff = match self.users.get_by_id(staff_id).await {
            Ok(user) => user,
            Err(CivicError::NotFound { .. }) => {
                return Err(CivicError::not_found("staff", staff_id));
            }
            Err(e) => return Err(e),
        };
        if staff.role != Role::Staff {
            return Err(CivicError::InvalidRole {
                message: "complaints can only be assigned to staff".into(),
            });
        }

        let now = Utc::now();
        let status = match complaint.current_status() {
            ComplaintStatus::Pending => ComplaintStatus::Acknowledged,
            current => current,
        };
        complaint.assigned_to = Some(staff_id);
        complaint.assigned_at = Some(now);
        complaint.append(TimelineEntry {
            status,
            updated_at: now,
            updated_by: actor.user_id,
            note: Some(format!("Assigned to staff {}", staff.full_name())),
            attachments: Vec::new(),
            estimated_completion: None,
        });
        let complaint = self.complaints.save(complaint).await?;

        info!(
            complaint_id = %id,
            %staff_id,
            actor_id = %actor.user_id,
            "Staff assigned to complaint"
        );

        dispatch(
            &self.notifier,
            Notification::new(
                &staff.email,
                ASSIGNMENT_SUBJECT,
                format!(
                    "You have been assigned to handle complaint #{id}. \
                     Please check your dashboard for details."
                ),
            ),
        )
        .await;
        self.notify_complainant(
            &complaint,
            OptOut::Ignored,
            STAFF_ASSIGNED_SUBJECT,
            format!(
                "Your complaint #{id} has been assigned to our staff member. \
                 They will begin working on it shortly."
            ),
        )
        .await;
        Ok(complaint)
    }

    pub async fn list_by_jurisdiction(&self, actor: &Actor) -> CivicResult<JurisdictionComplaints> {
        let area = jurisdiction_of(actor)?;
        let complaints = self.complaints.list_by_pincodes(&area).await?;

        let mut by_pincode: BTreeMap<Pincode, Vec<Complaint>> = BTreeMap::new();
        for complaint in &complaints {
            by_pincode
                .entry(complaint.pin_code().clone())
                .or_default()
                .push(complaint.clone());
        }
        Ok(JurisdictionComplaints {
            pincodes: area,
            total: complaints.len(),
            complaints,
            by_pincode,
        })
    }

    pub async fn assignment_stats(&self, actor: &Actor) -> CivicResult<AssignmentStats> {
        let area = jurisdiction_of(actor)?;
        let complaints = self.complaints.list_by_pincodes(&area).await?;
        Ok(tally(&complaints))
    }

    /// Fetch a complaint the actor may see and count the view.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> CivicResult<Complaint> {
        let mut complaint = self.complaints.get_by_id(id).await?;
        authorize(actor, &Action::ViewComplaint(ComplaintView::from(&complaint)))?;

        let loaded = complaint.clone();
        complaint.support.view_count += 1;
        match self.complaints.save(complaint).await {
            Ok(saved) => Ok(saved),
            // A concurrent writer won; the view is not worth a retry.
            Err(CivicError::Conflict { .. }) => Ok(loaded),
            Err(e) => Err(e),
        }
    }

    pub async fn list_mine(
        &self,
        actor: &Actor,
        pagination: Pagination,
    ) -> CivicResult<PaginatedResult<Complaint>> {
        self.complaints.list_by_user(actor.user_id, pagination).await
    }

    /// Upvote another citizen's complaint, once per user.
    pub async fn support(&self, actor: &Actor, id: Uuid) -> CivicResult<Complaint> {
        let mut complaint = self.complaints.get_by_id(id).await?;
        if complaint.user_id == actor.user_id || complaint.has_supporter(actor.user_id) {
            return Err(CivicError::validation(
                "ALREADY_SUPPORTED",
                "you have already supported this complaint",
            ));
        }
        complaint.support.reported_by.push(Supporter {
            user_id: actor.user_id,
            reported_at: Utc::now(),
        });
        complaint.support.upvotes += 1;
        let complaint = self.complaints.save(complaint).await?;
        info!(complaint_id = %id, user_id = %actor.user_id, "Complaint supported");
        Ok(complaint)
    }

    pub async fn add_feedback(
        &self,
        actor: &Actor,
        id: Uuid,
        rating: u8,
        comment: Option<String>,
    ) -> CivicResult<Complaint> {
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        validate_feedback(rating, comment.as_deref())?;

        let mut complaint = self.complaints.get_by_id(id).await?;
        if complaint.user_id != actor.user_id {
            return Err(CivicError::forbidden(
                "only the complainant can leave feedback",
            ));
        }
        if complaint.current_status() != ComplaintStatus::Resolved {
            return Err(CivicError::validation(
                "NOT_RESOLVED",
                "feedback can only be given on a resolved complaint",
            ));
        }
        if complaint.feedback.iter().any(|f| f.user_id == actor.user_id) {
            return Err(CivicError::validation(
                "FEEDBACK_EXISTS",
                "feedback has already been submitted",
            ));
        }

        complaint.feedback.push(Feedback {
            user_id: actor.user_id,
            rating,
            comment,
            submitted_at: Utc::now(),
        });
        let complaint = self.complaints.save(complaint).await?;
        info!(complaint_id = %id, rating, "Feedback recorded");
        Ok(complaint)
    }

    async fn notify_complainant(
        &self,
        complaint: &Complaint,
        opt_out: OptOut,
        subject: &str,
        body: String,
    ) {
        let complainant: User = match self.users.get_by_id(complaint.user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(
                    complaint_id = %complaint.id,
                    error = %e,
                    "Complainant lookup failed; notification skipped"
                );
                return;
            }
        };
        if opt_out == OptOut::Honoured && !complainant.notification_preferences.email {
            return;
        }
        dispatch(
            &self.notifier,
            Notification::new(complainant.email, subject, body),
        )
        .await;
    }
}

/// Whether a complainant's e-mail opt-out suppresses a message.
/// Assignment notices are always sent; status updates respect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptOut {
    Honoured,
    Ignored,
}

fn jurisdiction_of(actor: &Actor) -> CivicResult<AreaSet> {
    if actor.role != Role::MunicipalAdmin {
        return Err(CivicError::forbidden("municipal admin role required"));
    }
    if actor.admin_area.is_empty() {
        return Err(CivicError::NoJurisdiction {
            reason: "no pincodes assigned to this municipal admin".into(),
        });
    }
    Ok(actor.admin_area.clone())
}

fn tally(complaints: &[Complaint]) -> AssignmentStats {
    let mut stats = AssignmentStats {
        total: complaints.len() as u64,
        ..AssignmentStats::default()
    };
    for complaint in complaints {
        *stats
            .by_status
            .entry(complaint.current_status().as_str().to_string())
            .or_default() += 1;
        if complaint.assigned_to.is_some() {
            stats.assigned += 1;
        } else {
            stats.unassigned += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use civicdesk_core::models::complaint::Category;

    fn complaint(pin: &str) -> Complaint {
        FileComplaint {
            title: "Pothole on 5th cross".into(),
            description: Some("Deep pothole near the bus stop".into()),
            category: Category::Road,
            priority: None,
            longitude: 77.59,
            latitude: 12.97,
            state: "Karnataka".into(),
            district: "Bengaluru Urban".into(),
            locality: "Jayanagar".into(),
            pin_code: pin.into(),
            address: None,
            landmark: None,
            media: Default::default(),
            department_id: None,
            related_complaints: Vec::new(),
            tags: Vec::new(),
        }
        .into_complaint(Uuid::new_v4(), Utc::now())
        .unwrap()
    }

    #[test]
    fn tally_counts_by_timeline_status() {
        let pending = complaint("560041");
        let mut acknowledged = complaint("560041");
        acknowledged.assigned_to = Some(Uuid::new_v4());
        acknowledged.append(TimelineEntry {
            status: ComplaintStatus::Acknowledged,
            updated_at: Utc::now(),
            updated_by: Uuid::new_v4(),
            note: None,
            attachments: Vec::new(),
            estimated_completion: None,
        });

        let stats = tally(&[pending, acknowledged]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.assigned, 1);
        assert_eq!(stats.unassigned, 1);
        assert_eq!(stats.by_status.get("Pending"), Some(&1));
        assert_eq!(stats.by_status.get("Acknowledged"), Some(&1));
    }

    #[test]
    fn jurisdiction_requires_a_populated_admin_area() {
        let mut actor = Actor {
            user_id: Uuid::new_v4(),
            role: Role::MunicipalAdmin,
            department_id: None,
            admin_area: AreaSet::new(),
        };
        assert!(matches!(
            jurisdiction_of(&actor),
            Err(CivicError::NoJurisdiction { .. })
        ));

        actor.role = Role::Admin;
        assert!(matches!(
            jurisdiction_of(&actor),
            Err(CivicError::Forbidden { .. })
        ));
    }
}
