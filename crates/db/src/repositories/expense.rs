//! Expense repository.
//!
//! Expenses are created here; their status afterwards belongs to the router.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{expenses, sea_orm_active_enums::ApprovalStatus};

/// Input for creating an expense.
#[derive(Debug, Clone)]
pub struct CreateExpenseInput {
    /// Organization of the submitter.
    pub organization_id: Uuid,
    /// Employee claiming the expense.
    pub submitted_by: Uuid,
    /// Claimed amount, positive.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Expense category.
    pub category: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Date the expense was incurred.
    pub expense_date: NaiveDate,
}

/// Expense repository.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Creates a new expense repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a Pending expense. It is not routed until submitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (e.g. a non-positive amount).
    pub async fn create(&self, input: CreateExpenseInput) -> Result<expenses::Model, DbErr> {
        let now = chrono::Utc::now().into();
        let expense = expenses::ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(input.organization_id),
            submitted_by: Set(input.submitted_by),
            amount: Set(input.amount),
            currency: Set(input.currency),
            category: Set(input.category),
            description: Set(input.description),
            expense_date: Set(input.expense_date),
            status: Set(ApprovalStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        };

        expense.insert(&self.db).await
    }

    /// Finds an expense by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<expenses::Model>, DbErr> {
        expenses::Entity::find_by_id(id).one(&self.db).await
    }

    /// Lists an employee's expenses, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_submitter(&self, submitted_by: Uuid) -> Result<Vec<expenses::Model>, DbErr> {
        expenses::Entity::find()
            .filter(expenses::Column::SubmittedBy.eq(submitted_by))
            .order_by_desc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
    }
}
