//! Property-based tests for RuleEvaluator.

use proptest::prelude::*;
use rust_decimal::Decimal;

use claimflow_shared::types::{ApprovalRuleId, OrganizationId, UserId};

use super::rules::{
    ApprovalProgress, ApprovalRule, PercentageBasis, RuleCondition, RuleEvaluator, Threshold,
};

/// Thresholds in (0, 100] with two decimal places.
fn arb_threshold() -> impl Strategy<Value = Threshold> {
    (1i64..=10_000).prop_map(|n| Threshold::new(Decimal::new(n, 2)).unwrap())
}

fn arb_progress() -> impl Strategy<Value = ApprovalProgress> {
    (1u32..20)
        .prop_flat_map(|total| (Just(total), 0..=total))
        .prop_map(|(total, approved)| ApprovalProgress {
            approved_count: approved,
            reached_steps: (approved + 1).min(total),
            total_steps: total,
            approvers: std::iter::repeat_with(UserId::new)
                .take(approved as usize)
                .collect(),
        })
}

fn percentage_rule(threshold: Threshold) -> ApprovalRule {
    ApprovalRule {
        id: ApprovalRuleId::new(),
        organization_id: OrganizationId::new(),
        condition: RuleCondition::Percentage { threshold },
        is_active: true,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A percentage rule fires exactly when approved * 100 >= threshold * total.
    #[test]
    fn prop_percentage_matches_integer_comparison(
        threshold in arb_threshold(),
        progress in arb_progress(),
    ) {
        let rules = [percentage_rule(threshold)];
        let fired = RuleEvaluator::first_match(&rules, &progress, PercentageBasis::StepsDefined).is_some();
        let expected = Decimal::from(progress.approved_count) * Decimal::ONE_HUNDRED
            >= threshold.value() * Decimal::from(progress.total_steps);
        prop_assert_eq!(fired, expected);
    }

    /// One more approval never stops a rule from firing.
    #[test]
    fn prop_more_approvals_never_unfire(
        threshold in arb_threshold(),
        progress in arb_progress(),
        basis in prop_oneof![Just(PercentageBasis::StepsDefined), Just(PercentageBasis::StepsReached)],
    ) {
        prop_assume!(progress.approved_count < progress.total_steps);
        let rules = [percentage_rule(threshold)];

        let mut next = progress.clone();
        next.approved_count += 1;
        next.reached_steps = next.approved_count;
        next.approvers.insert(UserId::new());

        let mut current = progress;
        current.reached_steps = current.approved_count.max(1);

        if RuleEvaluator::first_match(&rules, &current, basis).is_some() {
            prop_assert!(RuleEvaluator::first_match(&rules, &next, basis).is_some());
        }
    }

    /// Steps-reached never divides by more than steps-defined, so it fires
    /// at least as often.
    #[test]
    fn prop_reached_basis_is_at_least_as_permissive(
        threshold in arb_threshold(),
        progress in arb_progress(),
    ) {
        let rules = [percentage_rule(threshold)];
        if RuleEvaluator::first_match(&rules, &progress, PercentageBasis::StepsDefined).is_some() {
            prop_assert!(
                RuleEvaluator::first_match(&rules, &progress, PercentageBasis::StepsReached).is_some()
            );
        }
    }

    /// Inactive rules never fire.
    #[test]
    fn prop_inactive_rules_never_fire(
        threshold in arb_threshold(),
        progress in arb_progress(),
    ) {
        let mut rule = percentage_rule(threshold);
        rule.is_active = false;
        prop_assert!(RuleEvaluator::first_match(&[rule], &progress, PercentageBasis::StepsDefined).is_none());
    }
}
