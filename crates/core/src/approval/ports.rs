//! Capabilities the router consumes.
//!
//! These traits are implemented by the db crate against PostgreSQL and by
//! [`InMemoryStore`](crate::approval::memory::InMemoryStore) for tests and
//! local tooling.

use std::future::Future;

use claimflow_shared::types::{ApprovalRequestId, ExpenseId, OrganizationId, UserId, WorkflowId};

use super::error::RoutingError;
use super::rules::ApprovalRuleRecord;
use super::types::{
    ApprovalRequest, ExpenseRecord, ExpenseStatus, NewApprovalRequest, RequestStatus, UserRole,
    WorkflowDefinition,
};

/// Read access to workflow definitions.
pub trait WorkflowStore: Send + Sync {
    /// The organization's active workflow, if one is configured.
    fn get_active(
        &self,
        organization_id: OrganizationId,
    ) -> impl Future<Output = Result<Option<WorkflowDefinition>, RoutingError>> + Send;

    /// A workflow by id, active or not.
    ///
    /// Used to keep routing an expense on the workflow it started with.
    fn get(
        &self,
        workflow_id: WorkflowId,
    ) -> impl Future<Output = Result<Option<WorkflowDefinition>, RoutingError>> + Send;
}

/// Read access to auto-approval rules.
pub trait RuleStore: Send + Sync {
    /// The organization's active rules, as stored.
    fn get_active(
        &self,
        organization_id: OrganizationId,
    ) -> impl Future<Output = Result<Vec<ApprovalRuleRecord>, RoutingError>> + Send;
}

/// Lookup of users by reporting line and role.
pub trait UserDirectory: Send + Sync {
    /// The user's manager, if they have one.
    fn manager_of(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<UserId>, RoutingError>> + Send;

    /// An active member of the organization holding `role`.
    ///
    /// Implementations must return the member with the lowest identifier so
    /// routing is reproducible for a fixed membership.
    fn find_by_role(
        &self,
        organization_id: OrganizationId,
        role: UserRole,
    ) -> impl Future<Output = Result<Option<UserId>, RoutingError>> + Send;
}

/// Storage of approval requests and the expense status the router writes.
pub trait ApprovalStore: Send + Sync {
    /// Unit of work opened by [`ApprovalStore::begin`].
    type Transaction: ApprovalTransaction;

    /// Opens a transaction scoped to one expense.
    ///
    /// The expense is locked until the transaction commits or rolls back,
    /// so two mutations of the same expense never interleave.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::ExpenseNotFound` if the expense does not exist.
    fn begin(
        &self,
        expense_id: ExpenseId,
    ) -> impl Future<Output = Result<Self::Transaction, RoutingError>> + Send;

    /// The expense, read outside any transaction.
    fn expense(
        &self,
        expense_id: ExpenseId,
    ) -> impl Future<Output = Result<Option<ExpenseRecord>, RoutingError>> + Send;

    /// Committed request history for an expense, ordered by step.
    fn history(
        &self,
        expense_id: ExpenseId,
    ) -> impl Future<Output = Result<Vec<ApprovalRequest>, RoutingError>> + Send;

    /// Pending requests assigned to an approver, newest first.
    fn pending_for_approver(
        &self,
        approver_id: UserId,
    ) -> impl Future<Output = Result<Vec<ApprovalRequest>, RoutingError>> + Send;

    /// Pending requests on any expense of an organization, newest first.
    fn pending_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> impl Future<Output = Result<Vec<ApprovalRequest>, RoutingError>> + Send;

    /// Every request, decided or not, on expenses claimed by `submitted_by`,
    /// newest first.
    fn requests_for_submitter(
        &self,
        submitted_by: UserId,
    ) -> impl Future<Output = Result<Vec<ApprovalRequest>, RoutingError>> + Send;
}

/// Transactional view of one locked expense.
///
/// Nothing written through a transaction is visible to other readers until
/// [`commit`](ApprovalTransaction::commit).
pub trait ApprovalTransaction: Send {
    /// The locked expense as read when the transaction began.
    fn expense(&self) -> &ExpenseRecord;

    /// All requests for the expense, ordered by step.
    fn list_for(&mut self) -> impl Future<Output = Result<Vec<ApprovalRequest>, RoutingError>> + Send;

    /// The Pending request assigned to `approver_id`, if any.
    fn find_pending_for(
        &mut self,
        approver_id: UserId,
    ) -> impl Future<Output = Result<Option<ApprovalRequest>, RoutingError>> + Send;

    /// Creates a Pending request.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::Conflict` if the expense already has a Pending
    /// request or a request for the same step.
    fn create(
        &mut self,
        request: NewApprovalRequest,
    ) -> impl Future<Output = Result<ApprovalRequest, RoutingError>> + Send;

    /// Moves a Pending request to its terminal status.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::Conflict` if the request is no longer Pending.
    fn record_decision(
        &mut self,
        request_id: ApprovalRequestId,
        status: RequestStatus,
        comment: Option<String>,
    ) -> impl Future<Output = Result<ApprovalRequest, RoutingError>> + Send;

    /// Writes the expense status.
    fn set_expense_status(
        &mut self,
        status: ExpenseStatus,
    ) -> impl Future<Output = Result<(), RoutingError>> + Send;

    /// Makes every write of this transaction visible.
    fn commit(self) -> impl Future<Output = Result<(), RoutingError>> + Send;

    /// Discards every write of this transaction.
    fn rollback(self) -> impl Future<Output = Result<(), RoutingError>> + Send;
}
