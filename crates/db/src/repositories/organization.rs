//! Organization repository for database operations.

use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::entities::organizations;

/// Organization repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    db: DatabaseConnection,
}

impl OrganizationRepository {
    /// Creates a new organization repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an organization by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<organizations::Model>, DbErr> {
        organizations::Entity::find_by_id(id).one(&self.db).await
    }

    /// Creates a new organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        name: &str,
        base_currency: &str,
    ) -> Result<organizations::Model, DbErr> {
        let now = chrono::Utc::now().into();
        let org = organizations::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.to_string()),
            base_currency: Set(base_currency.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        org.insert(&self.db).await
    }
}
