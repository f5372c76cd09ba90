//! Approval routing domain types.
//!
//! This module defines the workflow definition an organization configures,
//! the per-step approval requests the router creates, and the statuses
//! both move through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use claimflow_shared::types::{
    ApprovalRequestId, ExpenseId, OrganizationId, UserId, WorkflowId,
};

use crate::approval::error::{ResolutionFailure, RoutingError};

/// Role a user holds inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Company administrator.
    Admin,
    /// People manager; approves reports' expenses through `Manager` steps.
    Manager,
    /// Regular employee submitting expenses.
    Employee,
    /// Finance department member.
    Finance,
    /// Director.
    Director,
}

impl UserRole {
    /// Parse a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "employee" => Some(Self::Employee),
            "finance" => Some(Self::Finance),
            "director" => Some(Self::Director),
            _ => None,
        }
    }

    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Employee => "employee",
            Self::Finance => "finance",
            Self::Director => "director",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Untagged approver kind, as stored next to an optional user reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverType {
    /// The submitter's manager.
    Manager,
    /// A member of the finance team.
    Finance,
    /// A director.
    Director,
    /// One named user.
    SpecificUser,
}

impl ApproverType {
    /// Parse an approver type from a string (`specific_user` and `specific-user` both accepted).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "manager" => Some(Self::Manager),
            "finance" => Some(Self::Finance),
            "director" => Some(Self::Director),
            "specific_user" => Some(Self::SpecificUser),
            _ => None,
        }
    }

    /// Returns the string representation of the approver type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Finance => "finance",
            Self::Director => "director",
            Self::SpecificUser => "specific_user",
        }
    }
}

/// Policy used to pick who approves a step.
///
/// Each variant carries only what it needs; resolution goes through
/// [`ApproverResolver::resolve`](crate::approval::resolver::ApproverResolver::resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApproverKind {
    /// The submitter's manager.
    Manager,
    /// The organization's finance approver.
    Finance,
    /// The organization's director.
    Director,
    /// A user bound to the step.
    SpecificUser {
        /// The bound approver.
        user_id: UserId,
    },
}

impl ApproverKind {
    /// Builds an approver kind from its stored parts.
    ///
    /// A user reference on a non-`SpecificUser` type is ignored.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionFailure::UnboundSpecificUser` if the type is
    /// `SpecificUser` and no user is given.
    pub fn from_parts(
        approver_type: ApproverType,
        specific_user: Option<UserId>,
    ) -> Result<Self, ResolutionFailure> {
        match approver_type {
            ApproverType::Manager => Ok(Self::Manager),
            ApproverType::Finance => Ok(Self::Finance),
            ApproverType::Director => Ok(Self::Director),
            ApproverType::SpecificUser => specific_user
                .map(|user_id| Self::SpecificUser { user_id })
                .ok_or(ResolutionFailure::UnboundSpecificUser),
        }
    }

    /// Returns the untagged approver type.
    #[must_use]
    pub fn approver_type(&self) -> ApproverType {
        match self {
            Self::Manager => ApproverType::Manager,
            Self::Finance => ApproverType::Finance,
            Self::Director => ApproverType::Director,
            Self::SpecificUser { .. } => ApproverType::SpecificUser,
        }
    }

    /// Returns the bound user for `SpecificUser` steps.
    #[must_use]
    pub fn specific_user(&self) -> Option<UserId> {
        match self {
            Self::SpecificUser { user_id } => Some(*user_id),
            _ => None,
        }
    }
}

/// One position in an ordered approval chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Position in the chain, starting at 1.
    pub order: u32,
    /// How the approver for this step is picked.
    pub approver: ApproverKind,
    /// Recorded with the step but not consulted by the router.
    pub manager_must_approve: bool,
}

impl Step {
    /// Creates a step.
    #[must_use]
    pub fn new(order: u32, approver: ApproverKind) -> Self {
        Self {
            order,
            approver,
            manager_must_approve: false,
        }
    }
}

/// A named, ordered approval chain configured for an organization.
///
/// Steps are kept sorted and always form the dense sequence `1..=N` with `N >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowDefinition {
    /// Workflow identifier.
    pub id: WorkflowId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Human-readable name.
    pub name: String,
    /// Whether this is the organization's active workflow.
    pub is_active: bool,
    steps: Vec<Step>,
}

impl WorkflowDefinition {
    /// Creates a workflow definition, validating the step sequence.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::InvalidWorkflow` if there are no steps or the
    /// step orders are not exactly `1..=N`.
    pub fn new(
        id: WorkflowId,
        organization_id: OrganizationId,
        name: impl Into<String>,
        mut steps: Vec<Step>,
        is_active: bool,
    ) -> Result<Self, RoutingError> {
        if steps.is_empty() {
            return Err(RoutingError::InvalidWorkflow(format!(
                "workflow {id} has no steps"
            )));
        }

        steps.sort_by_key(|s| s.order);
        for (expected, step) in (1u32..).zip(&steps) {
            if step.order != expected {
                return Err(RoutingError::InvalidWorkflow(format!(
                    "workflow {id} step orders must be 1..={}, found {} at position {expected}",
                    steps.len(),
                    step.order
                )));
            }
        }

        Ok(Self {
            id,
            organization_id,
            name: name.into(),
            is_active,
            steps,
        })
    }

    /// Steps in ascending order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Total number of steps defined.
    #[must_use]
    pub fn total_steps(&self) -> u32 {
        u32::try_from(self.steps.len()).unwrap_or(u32::MAX)
    }

    /// The step with the given order.
    #[must_use]
    pub fn step(&self, order: u32) -> Option<&Step> {
        let index = usize::try_from(order.checked_sub(1)?).ok()?;
        self.steps.get(index)
    }

    /// The first step of the chain.
    #[must_use]
    pub fn first_step(&self) -> &Step {
        &self.steps[0]
    }

    /// The step following `order`, if any.
    #[must_use]
    pub fn next_step(&self, order: u32) -> Option<&Step> {
        self.step(order.checked_add(1)?)
    }

    /// Returns true if `order` is the final step.
    #[must_use]
    pub fn is_last_step(&self, order: u32) -> bool {
        order >= self.total_steps()
    }
}

/// Status of a single approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Waiting on the assigned approver.
    Pending,
    /// Approved by the assigned approver.
    Approved,
    /// Rejected by the assigned approver.
    Rejected,
}

impl RequestStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true once the request has been decided.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of an expense claim as written by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    /// Awaiting a decision.
    Pending,
    /// Finally approved (terminal).
    Approved,
    /// Finally rejected (terminal).
    Rejected,
}

impl ExpenseStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true if the status can no longer change.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decision an approver makes on their pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    /// Approve the current step.
    Approve,
    /// Reject the expense.
    Reject,
}

impl DecisionAction {
    /// Parses an action from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    /// The request status this action produces.
    #[must_use]
    pub fn resulting_status(&self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

/// One per-step decision record for an expense.
///
/// Created Pending when its step becomes current, decided exactly once,
/// never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request identifier.
    pub id: ApprovalRequestId,
    /// The expense being approved.
    pub expense_id: ExpenseId,
    /// The workflow that routed this request.
    pub workflow_id: WorkflowId,
    /// The user expected to decide.
    pub approver_id: UserId,
    /// Workflow step this request corresponds to.
    pub step_order: u32,
    /// Current status.
    pub status: RequestStatus,
    /// Approver's comment, set with the decision.
    pub comment: Option<String>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a Pending approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApprovalRequest {
    /// The expense being approved.
    pub expense_id: ExpenseId,
    /// The workflow routing the expense.
    pub workflow_id: WorkflowId,
    /// The resolved approver.
    pub approver_id: UserId,
    /// Step the request corresponds to.
    pub step_order: u32,
}

/// The parts of an expense the router reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseRecord {
    /// Expense identifier.
    pub id: ExpenseId,
    /// Organization the submitter belongs to.
    pub organization_id: OrganizationId,
    /// The employee who submitted the claim.
    pub submitted_by: UserId,
    /// Current status.
    pub status: ExpenseStatus,
}
