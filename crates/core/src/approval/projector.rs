//! Expense status projection.
//!
//! Recomputes an expense's status from its request history by replaying the
//! decisions in step order. The router writes status incrementally; this is
//! the reference it must agree with.

use super::rules::{ApprovalProgress, ApprovalRule, PercentageBasis, RuleEvaluator};
use super::types::{ApprovalRequest, ExpenseStatus, RequestStatus, WorkflowDefinition};

/// Stateless projector from request history to expense status.
pub struct StatusProjector;

impl StatusProjector {
    /// Replays `history` against `workflow` and `rules`.
    ///
    /// - A Rejected request makes the expense Rejected.
    /// - After each Approved request, a firing rule or the last step makes it Approved.
    /// - Anything else leaves it Pending.
    ///
    /// Decisions after the first terminal one are ignored.
    #[must_use]
    pub fn project(
        history: &[ApprovalRequest],
        workflow: &WorkflowDefinition,
        rules: &[ApprovalRule],
        basis: PercentageBasis,
    ) -> ExpenseStatus {
        let mut ordered: Vec<ApprovalRequest> = history.to_vec();
        ordered.sort_by_key(|r| r.step_order);

        for (index, request) in ordered.iter().enumerate() {
            match request.status {
                RequestStatus::Pending => return ExpenseStatus::Pending,
                RequestStatus::Rejected => return ExpenseStatus::Rejected,
                RequestStatus::Approved => {
                    let progress =
                        ApprovalProgress::from_history(&ordered[..=index], workflow.total_steps());
                    if RuleEvaluator::first_match(rules, &progress, basis).is_some()
                        || workflow.is_last_step(request.step_order)
                    {
                        return ExpenseStatus::Approved;
                    }
                }
            }
        }

        ExpenseStatus::Pending
    }
}
