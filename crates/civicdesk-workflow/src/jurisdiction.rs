//! Admin-area management for municipal admins.

use civicdesk_core::access::{Action, Actor, authorize};
use civicdesk_core::error::{CivicError, CivicResult};
use civicdesk_core::models::user::{Role, UpdateUser, User};
use civicdesk_core::pincode::{AreaSet, parse_area};
use civicdesk_core::repository::UserRepository;
use tracing::info;
use uuid::Uuid;

const FIELD: &str = "pincodes";

pub struct JurisdictionService<U: UserRepository> {
    users: U,
}

impl<U: UserRepository> JurisdictionService<U> {
    pub fn new(users: U) -> Self {
        Self { users }
    }

    /// Add pincodes to a municipal admin's area. Already present ones are
    /// kept once.
    pub async fn add_pincodes(
        &self,
        actor: &Actor,
        admin_id: Uuid,
        pincodes: &[String],
    ) -> CivicResult<AreaSet> {
        authorize(actor, &Action::ManageAdminArea)?;
        let added = non_empty(parse_area(FIELD, pincodes)?)?;
        let target = self.municipal_admin(admin_id).await?;

        let mut area = target.admin_area;
        area.extend(added);
        self.store(actor, admin_id, area).await
    }

    pub async fn remove_pincodes(
        &self,
        actor: &Actor,
        admin_id: Uuid,
        pincodes: &[String],
    ) -> CivicResult<AreaSet> {
        authorize(actor, &Action::ManageAdminArea)?;
        let removed = non_empty(parse_area(FIELD, pincodes)?)?;
        let target = self.municipal_admin(admin_id).await?;

        let area = target
            .admin_area
            .into_iter()
            .filter(|p| !removed.contains(p))
            .collect();
        self.store(actor, admin_id, area).await
    }

    /// Admins may read any area; a municipal admin may read their own.
    pub async fn get_pincodes(&self, actor: &Actor, admin_id: Uuid) -> CivicResult<AreaSet> {
        if actor.user_id != admin_id {
            authorize(actor, &Action::ManageAdminArea)?;
        }
        Ok(self.municipal_admin(admin_id).await?.admin_area)
    }

    /// Replace the whole area. An empty list clears it.
    pub async fn replace_pincodes(
        &self,
        actor: &Actor,
        admin_id: Uuid,
        pincodes: &[String],
    ) -> CivicResult<AreaSet> {
        authorize(actor, &Action::ManageAdminArea)?;
        let area = parse_area(FIELD, pincodes)?;
        self.municipal_admin(admin_id).await?;
        self.store(actor, admin_id, area).await
    }

    async fn municipal_admin(&self, id: Uuid) -> CivicResult<User> {
        match self.users.get_by_id(id).await {
            Ok(user) if user.role == Role::MunicipalAdmin => Ok(user),
            Ok(_) | Err(CivicError::NotFound { .. }) => {
                Err(CivicError::not_found("municipal_admin", id))
            }
            Err(e) => Err(e),
        }
    }

    async fn store(&self, actor: &Actor, admin_id: Uuid, area: AreaSet) -> CivicResult<AreaSet> {
        let user = self
            .users
            .update(
                admin_id,
                UpdateUser {
                    admin_area: Some(area),
                    ..UpdateUser::default()
                },
            )
            .await?;
        info!(
            %admin_id,
            actor_id = %actor.user_id,
            pincodes = user.admin_area.len(),
            "Admin area updated"
        );
        Ok(user.admin_area)
    }
}

fn non_empty(area: AreaSet) -> CivicResult<AreaSet> {
    if area.is_empty() {
        return Err(CivicError::validation(
            "MISSING_FIELDS",
            "at least one pincode is required",
        ));
    }
    Ok(area)
}
