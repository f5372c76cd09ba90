//! Expense approval routing for Claimflow.
//!
//! An organization configures one active workflow (an ordered chain of
//! steps) and any number of auto-approval rules. Submitting an expense
//! creates a Pending request for step 1; each decision either rejects the
//! expense, approves it (last step or a firing rule), or routes it on to
//! the next step.
//!
//! # Modules
//!
//! - `types` - Workflow, step, request and status types
//! - `error` - Routing error taxonomy
//! - `rules` - Auto-approval rule compilation and evaluation
//! - `ports` - Capabilities the router needs from storage
//! - `resolver` - Step approver resolution
//! - `router` - The approval state machine
//! - `projector` - Status recomputation from history
//! - `memory` - In-memory implementation of the ports

pub mod error;
pub mod memory;
pub mod ports;
pub mod projector;
pub mod resolver;
pub mod router;
pub mod rules;
pub mod types;

#[cfg(test)]
mod router_props;
#[cfg(test)]
mod rules_props;

pub use error::{ResolutionFailure, RoutingError, RulePayloadError};
pub use memory::InMemoryStore;
pub use ports::{ApprovalStore, ApprovalTransaction, RuleStore, UserDirectory, WorkflowStore};
pub use projector::StatusProjector;
pub use resolver::ApproverResolver;
pub use router::{ApprovalPath, ApprovalRouter, DecisionOutcome, RoutingPolicy, SubmitOutcome};
pub use rules::{
    ApprovalProgress, ApprovalRule, ApprovalRuleRecord, MatchReason, PercentageBasis,
    RuleCondition, RuleEvaluator, RuleKind, RuleMatch, Threshold,
};
pub use types::{
    ApprovalRequest, ApproverKind, ApproverType, DecisionAction, ExpenseRecord, ExpenseStatus,
    NewApprovalRequest, RequestStatus, Step, UserRole, WorkflowDefinition,
};
