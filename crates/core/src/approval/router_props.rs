//! Property-based tests for ApprovalRouter.
//!
//! Random workflows, rules and decision sequences are replayed against the
//! in-memory store; after every decision the request history must still
//! describe a single forward walk through the chain.

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;

use claimflow_shared::types::{ApprovalRuleId, OrganizationId, UserId, WorkflowId};

use super::error::RoutingError;
use super::memory::InMemoryStore;
use super::router::{ApprovalRouter, RoutingPolicy};
use super::rules::{ApprovalRuleRecord, PercentageBasis, RuleKind};
use super::types::{
    ApprovalRequest, ApproverKind, DecisionAction, ExpenseStatus, RequestStatus, Step, UserRole,
    WorkflowDefinition,
};

/// Step approver choices; indexes 3 and 4 bind the two named users.
fn arb_step_kind() -> impl Strategy<Value = u8> {
    0u8..5
}

fn arb_action() -> impl Strategy<Value = DecisionAction> {
    prop_oneof![
        4 => Just(DecisionAction::Approve),
        1 => Just(DecisionAction::Reject),
    ]
}

fn arb_basis() -> impl Strategy<Value = PercentageBasis> {
    prop_oneof![
        Just(PercentageBasis::StepsDefined),
        Just(PercentageBasis::StepsReached),
    ]
}

#[derive(Debug, Clone)]
struct Scenario {
    steps: Vec<u8>,
    percentage: Option<u32>,
    named_rule: Option<u8>,
    basis: PercentageBasis,
    /// Each decision is made by the user at `pool[index % pool.len()]`.
    decisions: Vec<(usize, DecisionAction)>,
}

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    (
        prop::collection::vec(arb_step_kind(), 1..6),
        prop::option::of(1u32..=100),
        prop::option::of(0u8..5),
        arb_basis(),
        prop::collection::vec((0usize..8, arb_action()), 0..12),
    )
        .prop_map(|(steps, percentage, named_rule, basis, decisions)| Scenario {
            steps,
            percentage,
            named_rule,
            basis,
            decisions,
        })
}

/// Asserts the history is a forward walk: steps 1..=k, all but the last
/// Approved, at most one Pending.
fn assert_forward_walk(history: &[ApprovalRequest]) -> Result<(), TestCaseError> {
    let pending = history
        .iter()
        .filter(|r| r.status == RequestStatus::Pending)
        .count();
    prop_assert!(pending <= 1, "{} pending requests", pending);

    for (expected, request) in (1u32..).zip(history) {
        prop_assert_eq!(request.step_order, expected);
    }
    if let Some((_, earlier)) = history.split_last() {
        prop_assert!(earlier.iter().all(|r| r.status == RequestStatus::Approved));
    }
    Ok(())
}

fn run(scenario: Scenario) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

    runtime.block_on(async move {
        let store = Arc::new(InMemoryStore::new());
        let org = OrganizationId::new();
        let manager = store.add_user(org, UserRole::Manager, None).await;
        let employee = store.add_user(org, UserRole::Employee, Some(manager)).await;
        let finance = store.add_user(org, UserRole::Finance, None).await;
        let director = store.add_user(org, UserRole::Director, None).await;
        let named = [
            store.add_user(org, UserRole::Admin, None).await,
            store.add_user(org, UserRole::Employee, None).await,
        ];
        let pool = [manager, finance, director, named[0], named[1], employee, UserId::new(), manager];

        let steps = (1u32..)
            .zip(&scenario.steps)
            .map(|(order, &kind)| {
                let approver = match kind {
                    0 => ApproverKind::Manager,
                    1 => ApproverKind::Finance,
                    2 => ApproverKind::Director,
                    n => ApproverKind::SpecificUser {
                        user_id: named[usize::from(n - 3)],
                    },
                };
                Step::new(order, approver)
            })
            .collect();
        let workflow = WorkflowDefinition::new(WorkflowId::new(), org, "Random", steps, true)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        store.add_workflow(workflow).await;

        if let Some(threshold) = scenario.percentage {
            store
                .add_rule(ApprovalRuleRecord {
                    id: ApprovalRuleId::new(),
                    organization_id: org,
                    kind: RuleKind::Percentage,
                    threshold: Some(Decimal::from(threshold)),
                    approver_id: None,
                    is_active: true,
                })
                .await;
        }
        if let Some(index) = scenario.named_rule {
            store
                .add_rule(ApprovalRuleRecord {
                    id: ApprovalRuleId::new(),
                    organization_id: org,
                    kind: RuleKind::SpecificApprover,
                    threshold: None,
                    approver_id: Some(pool[usize::from(index)]),
                    is_active: true,
                })
                .await;
        }

        let router = ApprovalRouter::with_backend(
            store.clone(),
            RoutingPolicy {
                percentage_basis: scenario.basis,
            },
        );
        let expense = store.add_expense(org, employee).await;
        router
            .submit(expense)
            .await
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        for (index, action) in scenario.decisions {
            let approver = pool[index % pool.len()];
            let before = router.history(expense).await.unwrap_or_default();
            let status_before = store.expense_status(expense).await;

            let result = router.decide(expense, approver, action, None).await;
            let history = router.history(expense).await.unwrap_or_default();
            assert_forward_walk(&history)?;

            match result {
                Ok(outcome) => {
                    prop_assert_eq!(status_before, Some(ExpenseStatus::Pending));
                    prop_assert_eq!(
                        store.expense_status(expense).await,
                        Some(outcome.expense_status())
                    );
                }
                Err(RoutingError::NoPendingRequest { .. }) => {
                    // Nothing may change on a refused decision.
                    prop_assert_eq!(&history, &before);
                    prop_assert_eq!(store.expense_status(expense).await, status_before);
                }
                Err(other) => return Err(TestCaseError::fail(other.to_string())),
            }

            let status = store.expense_status(expense).await;
            if status.is_some_and(|s| s.is_final()) {
                prop_assert!(history.iter().all(|r| r.status != RequestStatus::Pending));
            }
            prop_assert_eq!(
                router.project(expense).await.ok(),
                status,
                "projection disagrees with router"
            );
        }

        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any decision sequence keeps at most one Pending request, strictly
    /// increasing step orders, and a status the projector reproduces.
    #[test]
    fn prop_router_walks_forward(scenario in arb_scenario()) {
        run(scenario)?;
    }

    /// Replaying the decision that was just applied never changes anything.
    #[test]
    fn prop_replay_is_refused(steps in 1usize..5, approve in any::<bool>()) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let org = OrganizationId::new();
            let finance = store.add_user(org, UserRole::Finance, None).await;
            let employee = store.add_user(org, UserRole::Employee, None).await;
            let workflow = WorkflowDefinition::new(
                WorkflowId::new(),
                org,
                "Finance only",
                (1u32..).take(steps).map(|o| Step::new(o, ApproverKind::Finance)).collect(),
                true,
            )
            .unwrap();
            store.add_workflow(workflow).await;
            let router = ApprovalRouter::with_backend(store.clone(), RoutingPolicy::default());
            let expense = store.add_expense(org, employee).await;
            router.submit(expense).await.unwrap();

            let action = if approve { DecisionAction::Approve } else { DecisionAction::Reject };
            router.decide(expense, finance, action, None).await.unwrap();
            let history = router.history(expense).await.unwrap();
            let status = store.expense_status(expense).await;

            // Finance owns every step, so a replay after Advanced hits the
            // next step; only terminal outcomes are checked for refusal.
            if status.is_some_and(|s| s.is_final()) {
                let replay = router.decide(expense, finance, action, None).await;
                assert!(matches!(replay, Err(RoutingError::NoPendingRequest { .. })));
                assert_eq!(router.history(expense).await.unwrap(), history);
                assert_eq!(store.expense_status(expense).await, status);
            } else {
                assert_eq!(history.len(), 2);
                assert_eq!(history[1].approver_id, finance);
            }
        });
    }
}
