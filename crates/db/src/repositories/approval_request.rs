//! Approval request repository.
//!
//! Implements [`ApprovalStore`] over PostgreSQL. Each routing transaction
//! holds a row lock on its expense (`SELECT ... FOR UPDATE`), which
//! serializes concurrent submits and decisions for the same expense. The
//! partial unique index on Pending requests backs that up at the schema
//! level.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use claimflow_core::approval::{
    ApprovalRequest, ApprovalStore, ApprovalTransaction, ExpenseRecord, ExpenseStatus,
    NewApprovalRequest, RequestStatus, RoutingError,
};
use claimflow_shared::types::{ApprovalRequestId, ExpenseId, OrganizationId, UserId};

use super::convert::{approval_request, db_err, expense_record, step_order_to_db};
use crate::entities::{
    expense_approval_requests, expenses, sea_orm_active_enums::ApprovalStatus,
};

/// Approval request repository.
#[derive(Debug, Clone)]
pub struct ApprovalRequestRepository {
    db: DatabaseConnection,
}

impl ApprovalRequestRepository {
    /// Creates a new approval request repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl ApprovalStore for ApprovalRequestRepository {
    type Transaction = SeaOrmTransaction;

    async fn begin(&self, expense_id: ExpenseId) -> Result<SeaOrmTransaction, RoutingError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let expense = expenses::Entity::find_by_id(expense_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?;

        match expense {
            Some(expense) => Ok(SeaOrmTransaction {
                txn,
                expense: expense_record(&expense),
            }),
            None => {
                txn.rollback().await.map_err(db_err)?;
                Err(RoutingError::ExpenseNotFound(expense_id))
            }
        }
    }

    async fn expense(&self, expense_id: ExpenseId) -> Result<Option<ExpenseRecord>, RoutingError> {
        let expense = expenses::Entity::find_by_id(expense_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(expense.as_ref().map(expense_record))
    }

    async fn history(&self, expense_id: ExpenseId) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let rows = expense_approval_requests::Entity::find()
            .filter(expense_approval_requests::Column::ExpenseId.eq(expense_id.into_inner()))
            .order_by_asc(expense_approval_requests::Column::StepOrder)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(approval_request).collect()
    }

    async fn pending_for_approver(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let rows = expense_approval_requests::Entity::find()
            .filter(expense_approval_requests::Column::ApproverId.eq(approver_id.into_inner()))
            .filter(expense_approval_requests::Column::Status.eq(ApprovalStatus::Pending))
            .order_by_desc(expense_approval_requests::Column::CreatedAt)
            .order_by_desc(expense_approval_requests::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(approval_request).collect()
    }

    async fn pending_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let rows = expense_approval_requests::Entity::find()
            .inner_join(expenses::Entity)
            .filter(expenses::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(expense_approval_requests::Column::Status.eq(ApprovalStatus::Pending))
            .order_by_desc(expense_approval_requests::Column::CreatedAt)
            .order_by_desc(expense_approval_requests::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(approval_request).collect()
    }

    async fn requests_for_submitter(
        &self,
        submitted_by: UserId,
    ) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let rows = expense_approval_requests::Entity::find()
            .inner_join(expenses::Entity)
            .filter(expenses::Column::SubmittedBy.eq(submitted_by.into_inner()))
            .order_by_desc(expense_approval_requests::Column::CreatedAt)
            .order_by_desc(expense_approval_requests::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(approval_request).collect()
    }
}

/// A database transaction holding the lock on one expense row.
#[derive(Debug)]
pub struct SeaOrmTransaction {
    txn: DatabaseTransaction,
    expense: ExpenseRecord,
}

impl SeaOrmTransaction {
    fn expense_uuid(&self) -> Uuid {
        self.expense.id.into_inner()
    }
}

impl ApprovalTransaction for SeaOrmTransaction {
    fn expense(&self) -> &ExpenseRecord {
        &self.expense
    }

    async fn list_for(&mut self) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let rows = expense_approval_requests::Entity::find()
            .filter(expense_approval_requests::Column::ExpenseId.eq(self.expense_uuid()))
            .order_by_asc(expense_approval_requests::Column::StepOrder)
            .all(&self.txn)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(approval_request).collect()
    }

    async fn find_pending_for(
        &mut self,
        approver_id: UserId,
    ) -> Result<Option<ApprovalRequest>, RoutingError> {
        let row = expense_approval_requests::Entity::find()
            .filter(expense_approval_requests::Column::ExpenseId.eq(self.expense_uuid()))
            .filter(expense_approval_requests::Column::ApproverId.eq(approver_id.into_inner()))
            .filter(expense_approval_requests::Column::Status.eq(ApprovalStatus::Pending))
            .one(&self.txn)
            .await
            .map_err(db_err)?;

        row.map(approval_request).transpose()
    }

    async fn create(&mut self, request: NewApprovalRequest) -> Result<ApprovalRequest, RoutingError> {
        let now = Utc::now().into();
        let row = expense_approval_requests::ActiveModel {
            id: Set(Uuid::now_v7()),
            expense_id: Set(request.expense_id.into_inner()),
            workflow_id: Set(request.workflow_id.into_inner()),
            approver_id: Set(request.approver_id.into_inner()),
            step_order: Set(step_order_to_db(request.step_order)?),
            status: Set(ApprovalStatus::Pending),
            comment: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.txn)
        .await
        .map_err(db_err)?;

        approval_request(row)
    }

    async fn record_decision(
        &mut self,
        request_id: ApprovalRequestId,
        status: RequestStatus,
        comment: Option<String>,
    ) -> Result<ApprovalRequest, RoutingError> {
        let pending = expense_approval_requests::Entity::find_by_id(request_id.into_inner())
            .filter(expense_approval_requests::Column::ExpenseId.eq(self.expense_uuid()))
            .filter(expense_approval_requests::Column::Status.eq(ApprovalStatus::Pending))
            .one(&self.txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| {
                RoutingError::Conflict(format!("approval request {request_id} is no longer pending"))
            })?;

        let mut active: expense_approval_requests::ActiveModel = pending.into();
        active.status = Set(status.into());
        active.comment = Set(comment);
        active.updated_at = Set(Utc::now().into());
        let row = active.update(&self.txn).await.map_err(db_err)?;

        approval_request(row)
    }

    async fn set_expense_status(&mut self, status: ExpenseStatus) -> Result<(), RoutingError> {
        expenses::ActiveModel {
            id: Set(self.expense_uuid()),
            status: Set(status.into()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&self.txn)
        .await
        .map_err(db_err)?;

        self.expense.status = status;
        Ok(())
    }

    async fn commit(self) -> Result<(), RoutingError> {
        self.txn.commit().await.map_err(db_err)
    }

    async fn rollback(self) -> Result<(), RoutingError> {
        self.txn.rollback().await.map_err(db_err)
    }
}
