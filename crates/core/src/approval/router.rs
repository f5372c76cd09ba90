//! The approval router.
//!
//! State machine per expense:
//!
//! ```text
//! NoActiveRequest ──submit──▶ Pending(1) ──approve──▶ Pending(2) ─ ... ─▶ Approved
//!                                 │                       │
//!                                 └──reject──▶ Rejected ◀─┘
//! ```
//!
//! An approval may also jump straight to Approved when an auto-approval rule
//! fires. Every mutation runs inside one [`ApprovalTransaction`]; if any
//! part fails the transaction is rolled back and nothing is written.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use claimflow_shared::types::{ExpenseId, OrganizationId, UserId};

use super::error::RoutingError;
use super::ports::{ApprovalStore, ApprovalTransaction, RuleStore, UserDirectory, WorkflowStore};
use super::projector::StatusProjector;
use super::resolver::ApproverResolver;
use super::rules::{ApprovalProgress, PercentageBasis, RuleEvaluator, RuleMatch};
use super::types::{
    ApprovalRequest, DecisionAction, ExpenseRecord, ExpenseStatus, NewApprovalRequest,
    WorkflowDefinition,
};

/// Tunables for routing decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingPolicy {
    /// Denominator used by percentage rules.
    pub percentage_basis: PercentageBasis,
}

/// Result of submitting an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The first step's request was created.
    Routed {
        /// The new Pending request.
        request: ApprovalRequest,
    },
    /// The organization has no active workflow; the expense stays Pending unrouted.
    NoActiveWorkflow,
}

/// How an expense reached Approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum ApprovalPath {
    /// The last workflow step was approved.
    FinalStep,
    /// An auto-approval rule fired.
    Rule {
        /// The rule that fired.
        matched: RuleMatch,
    },
}

/// Result of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// The step was approved and the next step's request was created.
    Advanced {
        /// The request just decided.
        decided: ApprovalRequest,
        /// The new Pending request.
        next: ApprovalRequest,
    },
    /// The expense is now Approved.
    Approved {
        /// The request just decided.
        decided: ApprovalRequest,
        /// Why routing stopped.
        path: ApprovalPath,
    },
    /// The expense is now Rejected.
    Rejected {
        /// The request just decided.
        decided: ApprovalRequest,
    },
}

impl DecisionOutcome {
    /// The request the decision was recorded on.
    #[must_use]
    pub fn decided(&self) -> &ApprovalRequest {
        match self {
            Self::Advanced { decided, .. }
            | Self::Approved { decided, .. }
            | Self::Rejected { decided } => decided,
        }
    }

    /// The expense status after the decision.
    #[must_use]
    pub fn expense_status(&self) -> ExpenseStatus {
        match self {
            Self::Advanced { .. } => ExpenseStatus::Pending,
            Self::Approved { .. } => ExpenseStatus::Approved,
            Self::Rejected { .. } => ExpenseStatus::Rejected,
        }
    }
}

/// Routes expenses through their organization's approval workflow.
pub struct ApprovalRouter<W, R, D, S>
where
    W: WorkflowStore,
    R: RuleStore,
    D: UserDirectory,
    S: ApprovalStore,
{
    workflows: Arc<W>,
    rules: Arc<R>,
    resolver: ApproverResolver<D>,
    store: Arc<S>,
    policy: RoutingPolicy,
}

impl<B> ApprovalRouter<B, B, B, B>
where
    B: WorkflowStore + RuleStore + UserDirectory + ApprovalStore,
{
    /// Creates a router over a single backend implementing every capability.
    #[must_use]
    pub fn with_backend(backend: Arc<B>, policy: RoutingPolicy) -> Self {
        Self::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend,
            policy,
        )
    }
}

impl<W, R, D, S> ApprovalRouter<W, R, D, S>
where
    W: WorkflowStore,
    R: RuleStore,
    D: UserDirectory,
    S: ApprovalStore,
{
    /// Creates a router.
    #[must_use]
    pub fn new(
        workflows: Arc<W>,
        rules: Arc<R>,
        directory: Arc<D>,
        store: Arc<S>,
        policy: RoutingPolicy,
    ) -> Self {
        Self {
            workflows,
            rules,
            resolver: ApproverResolver::new(directory),
            store,
            policy,
        }
    }

    /// The policy in effect.
    #[must_use]
    pub const fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    /// Routes a freshly submitted expense to the first step of its
    /// organization's active workflow.
    ///
    /// # Errors
    ///
    /// - `ExpenseNotFound` if the expense does not exist.
    /// - `ExpenseFinalized` / `AlreadySubmitted` if it was routed before.
    /// - `ApproverResolutionFailed` if step 1 has no approver; nothing is written.
    pub async fn submit(&self, expense_id: ExpenseId) -> Result<SubmitOutcome, RoutingError> {
        let mut tx = self.store.begin(expense_id).await?;
        let result = self.submit_in(&mut tx).await;
        finish(tx, result).await
    }

    async fn submit_in(&self, tx: &mut S::Transaction) -> Result<SubmitOutcome, RoutingError> {
        let expense = tx.expense().clone();
        if expense.status.is_final() {
            return Err(RoutingError::ExpenseFinalized {
                expense_id: expense.id,
                status: expense.status,
            });
        }
        if !tx.list_for().await?.is_empty() {
            return Err(RoutingError::AlreadySubmitted(expense.id));
        }

        let Some(workflow) = self.workflows.get_active(expense.organization_id).await? else {
            debug!(
                expense_id = %expense.id,
                organization_id = %expense.organization_id,
                "No active workflow, expense left unrouted"
            );
            return Ok(SubmitOutcome::NoActiveWorkflow);
        };

        let request = self
            .route_to(tx, &expense, &workflow, workflow.first_step().order)
            .await?;
        Ok(SubmitOutcome::Routed { request })
    }

    /// Records `approver_id`'s decision on the expense's Pending request and
    /// moves the expense forward.
    ///
    /// # Errors
    ///
    /// - `NoPendingRequest` if `approver_id` has no Pending request on the
    ///   expense (wrong approver, replayed decision, lost race).
    /// - `ApproverResolutionFailed` if the next step has no approver; the
    ///   decision is rolled back and the current request stays Pending.
    pub async fn decide(
        &self,
        expense_id: ExpenseId,
        approver_id: UserId,
        action: DecisionAction,
        comment: Option<String>,
    ) -> Result<DecisionOutcome, RoutingError> {
        let mut tx = self.store.begin(expense_id).await?;
        let result = self.decide_in(&mut tx, approver_id, action, comment).await;
        finish(tx, result).await
    }

    async fn decide_in(
        &self,
        tx: &mut S::Transaction,
        approver_id: UserId,
        action: DecisionAction,
        comment: Option<String>,
    ) -> Result<DecisionOutcome, RoutingError> {
        let expense = tx.expense().clone();
        let pending = tx
            .find_pending_for(approver_id)
            .await?
            .ok_or(RoutingError::NoPendingRequest {
                expense_id: expense.id,
                approver_id,
            })?;

        let decided = tx
            .record_decision(pending.id, action.resulting_status(), comment)
            .await?;

        if action == DecisionAction::Reject {
            tx.set_expense_status(ExpenseStatus::Rejected).await?;
            info!(
                expense_id = %expense.id,
                approver_id = %approver_id,
                step_order = decided.step_order,
                "Expense rejected"
            );
            return Ok(DecisionOutcome::Rejected { decided });
        }

        let workflow = self.pinned_workflow(&decided).await?;
        let history = tx.list_for().await?;
        let progress = ApprovalProgress::from_history(&history, workflow.total_steps());
        let rules = RuleEvaluator::compile(&self.rules.get_active(expense.organization_id).await?);

        if let Some(matched) =
            RuleEvaluator::first_match(&rules, &progress, self.policy.percentage_basis)
        {
            tx.set_expense_status(ExpenseStatus::Approved).await?;
            info!(
                expense_id = %expense.id,
                rule_id = %matched.rule_id,
                step_order = decided.step_order,
                total_steps = workflow.total_steps(),
                "Expense auto-approved by rule"
            );
            return Ok(DecisionOutcome::Approved {
                decided,
                path: ApprovalPath::Rule { matched },
            });
        }

        let Some(next) = workflow.next_step(decided.step_order) else {
            tx.set_expense_status(ExpenseStatus::Approved).await?;
            info!(
                expense_id = %expense.id,
                approver_id = %approver_id,
                step_order = decided.step_order,
                "Expense approved at final step"
            );
            return Ok(DecisionOutcome::Approved {
                decided,
                path: ApprovalPath::FinalStep,
            });
        };

        let next = self.route_to(tx, &expense, &workflow, next.order).await?;
        Ok(DecisionOutcome::Advanced { decided, next })
    }

    /// Committed request history of an expense, ordered by step.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn history(&self, expense_id: ExpenseId) -> Result<Vec<ApprovalRequest>, RoutingError> {
        self.store.history(expense_id).await
    }

    /// Pending requests waiting on `approver_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn pending_for(&self, approver_id: UserId) -> Result<Vec<ApprovalRequest>, RoutingError> {
        self.store.pending_for_approver(approver_id).await
    }

    /// Pending requests across an organization, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn pending_in_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<ApprovalRequest>, RoutingError> {
        self.store.pending_for_organization(organization_id).await
    }

    /// Requests raised on the claims of `submitted_by`, newest first.
    /// Decided requests are included so a submitter can follow each claim.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn requests_by_submitter(
        &self,
        submitted_by: UserId,
    ) -> Result<Vec<ApprovalRequest>, RoutingError> {
        self.store.requests_for_submitter(submitted_by).await
    }

    /// Recomputes the expense status from its committed history.
    ///
    /// Uses the workflow that routed the expense and the organization's
    /// currently active rules.
    ///
    /// # Errors
    ///
    /// - `ExpenseNotFound` if the expense does not exist.
    /// - `WorkflowNotFound` if the routing workflow was deleted.
    pub async fn project(&self, expense_id: ExpenseId) -> Result<ExpenseStatus, RoutingError> {
        let expense = self
            .store
            .expense(expense_id)
            .await?
            .ok_or(RoutingError::ExpenseNotFound(expense_id))?;
        let history = self.store.history(expense_id).await?;
        let Some(first) = history.first() else {
            return Ok(ExpenseStatus::Pending);
        };

        let workflow = self.pinned_workflow(first).await?;
        let rules = RuleEvaluator::compile(&self.rules.get_active(expense.organization_id).await?);
        Ok(StatusProjector::project(
            &history,
            &workflow,
            &rules,
            self.policy.percentage_basis,
        ))
    }

    async fn pinned_workflow(
        &self,
        request: &ApprovalRequest,
    ) -> Result<WorkflowDefinition, RoutingError> {
        self.workflows
            .get(request.workflow_id)
            .await?
            .ok_or(RoutingError::WorkflowNotFound(request.workflow_id))
    }

    async fn route_to(
        &self,
        tx: &mut S::Transaction,
        expense: &ExpenseRecord,
        workflow: &WorkflowDefinition,
        step_order: u32,
    ) -> Result<ApprovalRequest, RoutingError> {
        let step = workflow.step(step_order).ok_or_else(|| {
            RoutingError::InvalidWorkflow(format!(
                "workflow {} has no step {step_order}",
                workflow.id
            ))
        })?;
        let approver_id = self
            .resolver
            .resolve(step, expense.submitted_by, expense.organization_id)
            .await?;

        let request = tx
            .create(NewApprovalRequest {
                expense_id: expense.id,
                workflow_id: workflow.id,
                approver_id,
                step_order,
            })
            .await?;

        info!(
            expense_id = %expense.id,
            workflow_id = %workflow.id,
            approver_id = %approver_id,
            step_order,
            "Approval request created"
        );
        Ok(request)
    }
}

async fn finish<T, X: ApprovalTransaction>(
    tx: X,
    result: Result<T, RoutingError>,
) -> Result<T, RoutingError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
