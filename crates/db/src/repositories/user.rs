//! User repository for database operations.
//!
//! Also serves as the router's [`UserDirectory`].

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use claimflow_core::approval::{RoutingError, UserDirectory, UserRole as CoreUserRole};
use claimflow_shared::types::{OrganizationId, UserId};

use super::convert::db_err;
use crate::entities::{sea_orm_active_enums::UserRole, users};

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Organization the user belongs to.
    pub organization_id: Uuid,
    /// Login email, unique across the system.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role inside the organization.
    pub role: UserRole,
    /// Direct manager, if any.
    pub manager_id: Option<Uuid>,
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(&self.db).await
    }

    /// Finds a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
    }

    /// Lists the active members of an organization, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::OrganizationId.eq(organization_id))
            .filter(users::Column::IsActive.eq(true))
            .order_by_asc(users::Column::Id)
            .all(&self.db)
            .await
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, input: CreateUserInput) -> Result<users::Model, DbErr> {
        let now = chrono::Utc::now().into();
        let user = users::ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(input.organization_id),
            email: Set(input.email),
            full_name: Set(input.full_name),
            role: Set(input.role),
            manager_id: Set(input.manager_id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        user.insert(&self.db).await
    }

    /// Sets or clears a user's manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the update fails.
    pub async fn set_manager(
        &self,
        user_id: Uuid,
        manager_id: Option<Uuid>,
    ) -> Result<users::Model, DbErr> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user {user_id}")))?;

        let mut active: users::ActiveModel = user.into();
        active.manager_id = Set(manager_id);
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(&self.db).await
    }

    /// Deactivates a user; role lookups skip inactive users.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the update fails.
    pub async fn deactivate(&self, user_id: Uuid) -> Result<(), DbErr> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user {user_id}")))?;

        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(false);
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(&self.db).await?;
        Ok(())
    }
}

impl UserDirectory for UserRepository {
    async fn manager_of(&self, user_id: UserId) -> Result<Option<UserId>, RoutingError> {
        let manager = users::Entity::find_by_id(user_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .and_then(|u| u.manager_id);

        Ok(manager.map(UserId::from))
    }

    async fn find_by_role(
        &self,
        organization_id: OrganizationId,
        role: CoreUserRole,
    ) -> Result<Option<UserId>, RoutingError> {
        let user = users::Entity::find()
            .filter(users::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(users::Column::Role.eq(UserRole::from(role)))
            .filter(users::Column::IsActive.eq(true))
            .order_by_asc(users::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(user.map(|u| UserId::from(u.id)))
    }
}
