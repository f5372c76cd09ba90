//! In-memory implementation of every routing capability.
//!
//! Approval state (expenses and requests) sits behind one async mutex that a
//! transaction holds until it commits or rolls back. Writes are staged on the
//! transaction and applied on commit, so readers never see a half-applied
//! decision. Users, workflows and rules live in a separate catalog that the
//! router can read while a transaction is open.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use claimflow_shared::types::{
    ApprovalRequestId, ExpenseId, OrganizationId, UserId, WorkflowId,
};

use super::error::RoutingError;
use super::ports::{ApprovalStore, ApprovalTransaction, RuleStore, UserDirectory, WorkflowStore};
use super::rules::ApprovalRuleRecord;
use super::types::{
    ApprovalRequest, ExpenseRecord, ExpenseStatus, NewApprovalRequest, RequestStatus, UserRole,
    WorkflowDefinition,
};

#[derive(Debug, Clone)]
struct UserEntry {
    organization_id: OrganizationId,
    role: UserRole,
    manager_id: Option<UserId>,
    is_active: bool,
}

#[derive(Debug, Default)]
struct Catalog {
    users: BTreeMap<UserId, UserEntry>,
    workflows: HashMap<WorkflowId, WorkflowDefinition>,
    rules: Vec<ApprovalRuleRecord>,
}

#[derive(Debug, Default)]
struct ApprovalState {
    expenses: HashMap<ExpenseId, ExpenseRecord>,
    requests: HashMap<ExpenseId, Vec<ApprovalRequest>>,
}

impl ApprovalState {
    /// Requests on the expenses accepted by `expense_matches`.
    fn requests_where(
        &self,
        expense_matches: impl Fn(&ExpenseRecord) -> bool,
    ) -> Vec<ApprovalRequest> {
        self.requests
            .iter()
            .filter(|(id, _)| self.expenses.get(id).is_some_and(&expense_matches))
            .flat_map(|(_, requests)| requests.iter().cloned())
            .collect()
    }
}

/// Process-local backend for the router.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    catalog: RwLock<Catalog>,
    state: Arc<Mutex<ApprovalState>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an active user and returns their id.
    pub async fn add_user(
        &self,
        organization_id: OrganizationId,
        role: UserRole,
        manager_id: Option<UserId>,
    ) -> UserId {
        let id = UserId::new();
        self.catalog.write().await.users.insert(
            id,
            UserEntry {
                organization_id,
                role,
                manager_id,
                is_active: true,
            },
        );
        id
    }

    /// Marks a user inactive so role lookups skip them.
    pub async fn deactivate_user(&self, user_id: UserId) {
        if let Some(user) = self.catalog.write().await.users.get_mut(&user_id) {
            user.is_active = false;
        }
    }

    /// Stores a workflow. An active workflow deactivates the organization's others.
    pub async fn add_workflow(&self, workflow: WorkflowDefinition) {
        let mut catalog = self.catalog.write().await;
        if workflow.is_active {
            for other in catalog.workflows.values_mut() {
                if other.organization_id == workflow.organization_id {
                    other.is_active = false;
                }
            }
        }
        catalog.workflows.insert(workflow.id, workflow);
    }

    /// Makes `workflow_id` the only active workflow of its organization.
    ///
    /// Returns false if the workflow does not exist.
    pub async fn activate_workflow(&self, workflow_id: WorkflowId) -> bool {
        let mut catalog = self.catalog.write().await;
        let Some(organization_id) = catalog.workflows.get(&workflow_id).map(|w| w.organization_id)
        else {
            return false;
        };
        for workflow in catalog.workflows.values_mut() {
            if workflow.organization_id == organization_id {
                workflow.is_active = workflow.id == workflow_id;
            }
        }
        true
    }

    /// Stores a rule record as-is, valid or not.
    pub async fn add_rule(&self, rule: ApprovalRuleRecord) {
        self.catalog.write().await.rules.push(rule);
    }

    /// Records a Pending expense and returns its id.
    pub async fn add_expense(
        &self,
        organization_id: OrganizationId,
        submitted_by: UserId,
    ) -> ExpenseId {
        let id = ExpenseId::new();
        self.state.lock().await.expenses.insert(
            id,
            ExpenseRecord {
                id,
                organization_id,
                submitted_by,
                status: ExpenseStatus::Pending,
            },
        );
        id
    }

    /// Committed status of an expense.
    pub async fn expense_status(&self, expense_id: ExpenseId) -> Option<ExpenseStatus> {
        self.state
            .lock()
            .await
            .expenses
            .get(&expense_id)
            .map(|e| e.status)
    }
}

impl WorkflowStore for InMemoryStore {
    async fn get_active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<WorkflowDefinition>, RoutingError> {
        Ok(self
            .catalog
            .read()
            .await
            .workflows
            .values()
            .find(|w| w.organization_id == organization_id && w.is_active)
            .cloned())
    }

    async fn get(&self, workflow_id: WorkflowId) -> Result<Option<WorkflowDefinition>, RoutingError> {
        Ok(self.catalog.read().await.workflows.get(&workflow_id).cloned())
    }
}

impl RuleStore for InMemoryStore {
    async fn get_active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<ApprovalRuleRecord>, RoutingError> {
        Ok(self
            .catalog
            .read()
            .await
            .rules
            .iter()
            .filter(|r| r.organization_id == organization_id && r.is_active)
            .cloned()
            .collect())
    }
}

impl UserDirectory for InMemoryStore {
    async fn manager_of(&self, user_id: UserId) -> Result<Option<UserId>, RoutingError> {
        Ok(self
            .catalog
            .read()
            .await
            .users
            .get(&user_id)
            .and_then(|u| u.manager_id))
    }

    async fn find_by_role(
        &self,
        organization_id: OrganizationId,
        role: UserRole,
    ) -> Result<Option<UserId>, RoutingError> {
        // BTreeMap iterates in ascending id order.
        Ok(self
            .catalog
            .read()
            .await
            .users
            .iter()
            .find(|(_, u)| u.organization_id == organization_id && u.role == role && u.is_active)
            .map(|(id, _)| *id))
    }
}

impl ApprovalStore for InMemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self, expense_id: ExpenseId) -> Result<MemoryTransaction, RoutingError> {
        let guard = self.state.clone().lock_owned().await;
        let expense = guard
            .expenses
            .get(&expense_id)
            .cloned()
            .ok_or(RoutingError::ExpenseNotFound(expense_id))?;
        let requests = guard.requests.get(&expense_id).cloned().unwrap_or_default();

        Ok(MemoryTransaction {
            guard,
            status: expense.status,
            expense,
            requests,
        })
    }

    async fn expense(&self, expense_id: ExpenseId) -> Result<Option<ExpenseRecord>, RoutingError> {
        Ok(self.state.lock().await.expenses.get(&expense_id).cloned())
    }

    async fn history(&self, expense_id: ExpenseId) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let mut history = self
            .state
            .lock()
            .await
            .requests
            .get(&expense_id)
            .cloned()
            .unwrap_or_default();
        history.sort_by_key(|r| r.step_order);
        Ok(history)
    }

    async fn pending_for_approver(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let state = self.state.lock().await;
        let mut pending: Vec<ApprovalRequest> = state
            .requests
            .values()
            .flatten()
            .filter(|r| r.approver_id == approver_id && r.status == RequestStatus::Pending)
            .cloned()
            .collect();
        newest_first(&mut pending);
        Ok(pending)
    }

    async fn pending_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let state = self.state.lock().await;
        let mut pending = state.requests_where(|e| e.organization_id == organization_id);
        pending.retain(|r| r.status == RequestStatus::Pending);
        newest_first(&mut pending);
        Ok(pending)
    }

    async fn requests_for_submitter(
        &self,
        submitted_by: UserId,
    ) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let state = self.state.lock().await;
        let mut requests = state.requests_where(|e| e.submitted_by == submitted_by);
        newest_first(&mut requests);
        Ok(requests)
    }
}

fn newest_first(requests: &mut [ApprovalRequest]) {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Transaction over one expense of an [`InMemoryStore`].
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<ApprovalState>,
    expense: ExpenseRecord,
    status: ExpenseStatus,
    requests: Vec<ApprovalRequest>,
}

impl ApprovalTransaction for MemoryTransaction {
    fn expense(&self) -> &ExpenseRecord {
        &self.expense
    }

    async fn list_for(&mut self) -> Result<Vec<ApprovalRequest>, RoutingError> {
        let mut requests = self.requests.clone();
        requests.sort_by_key(|r| r.step_order);
        Ok(requests)
    }

    async fn find_pending_for(
        &mut self,
        approver_id: UserId,
    ) -> Result<Option<ApprovalRequest>, RoutingError> {
        Ok(self
            .requests
            .iter()
            .find(|r| r.approver_id == approver_id && r.status == RequestStatus::Pending)
            .cloned())
    }

    async fn create(&mut self, request: NewApprovalRequest) -> Result<ApprovalRequest, RoutingError> {
        if self.requests.iter().any(|r| r.status == RequestStatus::Pending) {
            return Err(RoutingError::Conflict(format!(
                "expense {} already has a pending request",
                request.expense_id
            )));
        }
        if self.requests.iter().any(|r| r.step_order == request.step_order) {
            return Err(RoutingError::Conflict(format!(
                "expense {} already has a request for step {}",
                request.expense_id, request.step_order
            )));
        }

        let now = Utc::now();
        let created = ApprovalRequest {
            id: ApprovalRequestId::new(),
            expense_id: request.expense_id,
            workflow_id: request.workflow_id,
            approver_id: request.approver_id,
            step_order: request.step_order,
            status: RequestStatus::Pending,
            comment: None,
            created_at: now,
            updated_at: now,
        };
        self.requests.push(created.clone());
        Ok(created)
    }

    async fn record_decision(
        &mut self,
        request_id: ApprovalRequestId,
        status: RequestStatus,
        comment: Option<String>,
    ) -> Result<ApprovalRequest, RoutingError> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == RequestStatus::Pending)
            .ok_or_else(|| {
                RoutingError::Conflict(format!("approval request {request_id} is no longer pending"))
            })?;

        request.status = status;
        request.comment = comment;
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn set_expense_status(&mut self, status: ExpenseStatus) -> Result<(), RoutingError> {
        self.status = status;
        Ok(())
    }

    async fn commit(self) -> Result<(), RoutingError> {
        let Self {
            mut guard,
            expense,
            status,
            requests,
        } = self;

        if let Some(stored) = guard.expenses.get_mut(&expense.id) {
            stored.status = status;
        }
        guard.requests.insert(expense.id, requests);
        Ok(())
    }

    async fn rollback(self) -> Result<(), RoutingError> {
        Ok(())
    }
}
