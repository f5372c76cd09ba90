//! Routing error types for the expense approval lifecycle.
//!
//! This module defines all error types that can occur while submitting an
//! expense into its workflow or deciding one of its approval requests.

use rust_decimal::Decimal;
use thiserror::Error;

use claimflow_shared::AppError;
use claimflow_shared::types::{ApprovalRuleId, ExpenseId, UserId, WorkflowId};

use crate::approval::types::{ExpenseStatus, UserRole};

/// Why a step's approver could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    /// The step routes to the submitter's manager and there is none.
    #[error("submitter {submitter} has no manager")]
    SubmitterHasNoManager {
        /// The expense submitter.
        submitter: UserId,
    },

    /// Nobody in the organization holds the role the step needs.
    #[error("no user with role {role} in the organization")]
    NoUserWithRole {
        /// The role that was looked up.
        role: UserRole,
    },

    /// A specific-user step has no user bound to it.
    #[error("specific-user step has no bound user")]
    UnboundSpecificUser,
}

/// Why a rule's kind-specific payload is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulePayloadError {
    /// Percentage or hybrid rule without a threshold.
    #[error("percentage threshold is required")]
    MissingThreshold,

    /// Specific-approver or hybrid rule without an approver.
    #[error("approver is required")]
    MissingApprover,

    /// Threshold outside (0, 100].
    #[error("percentage threshold {0} must be greater than 0 and at most 100")]
    ThresholdOutOfRange(Decimal),
}

/// Errors that can occur during approval routing.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A step's approver cannot be determined; nothing was written.
    #[error("Cannot resolve approver for step {step_order}: {reason}")]
    ApproverResolutionFailed {
        /// The step being routed to.
        step_order: u32,
        /// Why resolution failed.
        reason: ResolutionFailure,
    },

    /// No Pending request exists for this expense and approver.
    #[error("No pending approval request for expense {expense_id} and approver {approver_id}")]
    NoPendingRequest {
        /// The expense.
        expense_id: ExpenseId,
        /// The user who tried to decide.
        approver_id: UserId,
    },

    /// A rule's kind-specific fields are missing or out of range.
    #[error("Approval rule {rule_id} has an invalid payload: {reason}")]
    InvalidRulePayload {
        /// The offending rule.
        rule_id: ApprovalRuleId,
        /// What is wrong with it.
        reason: RulePayloadError,
    },

    /// Workflow definition violates its step invariants.
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// The workflow that routed an expense no longer exists.
    #[error("Workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    /// Expense not found.
    #[error("Expense {0} not found")]
    ExpenseNotFound(ExpenseId),

    /// The expense has already been routed into a workflow.
    #[error("Expense {0} has already been submitted for approval")]
    AlreadySubmitted(ExpenseId),

    /// The expense already has a terminal status.
    #[error("Expense {expense_id} is already {status}")]
    ExpenseFinalized {
        /// The expense.
        expense_id: ExpenseId,
        /// Its terminal status.
        status: ExpenseStatus,
    },

    /// A concurrent decision won the race for this expense.
    #[error("Conflicting approval update: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl RoutingError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRulePayload { .. } | Self::InvalidWorkflow(_) => 400,

            Self::WorkflowNotFound(_) | Self::ExpenseNotFound(_) => 404,

            Self::NoPendingRequest { .. }
            | Self::AlreadySubmitted(_)
            | Self::ExpenseFinalized { .. }
            | Self::Conflict(_) => 409,

            Self::ApproverResolutionFailed { .. } => 422,

            Self::Database(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ApproverResolutionFailed { .. } => "APPROVER_RESOLUTION_FAILED",
            Self::NoPendingRequest { .. } => "NO_PENDING_REQUEST",
            Self::InvalidRulePayload { .. } => "INVALID_RULE_PAYLOAD",
            Self::InvalidWorkflow(_) => "INVALID_WORKFLOW",
            Self::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            Self::ExpenseNotFound(_) => "EXPENSE_NOT_FOUND",
            Self::AlreadySubmitted(_) => "ALREADY_SUBMITTED",
            Self::ExpenseFinalized { .. } => "EXPENSE_FINALIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true if the caller, not the system, is at fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<RoutingError> for AppError {
    fn from(err: RoutingError) -> Self {
        let message = err.to_string();
        match err {
            RoutingError::WorkflowNotFound(_) | RoutingError::ExpenseNotFound(_) => {
                Self::NotFound(message)
            }
            RoutingError::NoPendingRequest { .. }
            | RoutingError::AlreadySubmitted(_)
            | RoutingError::ExpenseFinalized { .. }
            | RoutingError::Conflict(_) => Self::Conflict(message),
            RoutingError::ApproverResolutionFailed { .. } => Self::BusinessRule(message),
            RoutingError::InvalidRulePayload { .. } | RoutingError::InvalidWorkflow(_) => {
                Self::Configuration(message)
            }
            RoutingError::Database(_) => Self::Database(message),
        }
    }
}
