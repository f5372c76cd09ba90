//! Conditional auto-approval rules.
//!
//! Rules are stored as loose records (a kind plus optional columns) and
//! compiled into [`ApprovalRule`]s whose [`RuleCondition`] carries exactly
//! the fields its kind needs. Records that fail to compile are skipped and
//! logged, so one broken rule never blocks the approval flow.
//!
//! Evaluation takes the static workflow size and the dynamic approval count
//! as separate inputs through [`ApprovalProgress`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

use claimflow_shared::types::{ApprovalRuleId, OrganizationId, UserId};

use crate::approval::error::{RoutingError, RulePayloadError};
use crate::approval::types::{ApprovalRequest, RequestStatus};

/// Kind of an approval rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Fires once enough of the chain has approved.
    Percentage,
    /// Fires once a named approver has approved.
    SpecificApprover,
    /// Fires on either condition.
    Hybrid,
}

impl RuleKind {
    /// Parses a rule kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "percentage" => Some(Self::Percentage),
            "specific_approver" => Some(Self::SpecificApprover),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::SpecificApprover => "specific_approver",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A percentage in (0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(Decimal);

impl Threshold {
    /// Validates and wraps a threshold.
    ///
    /// # Errors
    ///
    /// Returns `RulePayloadError::ThresholdOutOfRange` outside (0, 100].
    pub fn new(value: Decimal) -> Result<Self, RulePayloadError> {
        if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(RulePayloadError::ThresholdOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// The percentage value.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }
}

/// Which denominator percentage rules divide by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentageBasis {
    /// All steps defined in the workflow ("X% of the whole chain").
    #[default]
    StepsDefined,
    /// Only the steps reached so far.
    StepsReached,
}

impl PercentageBasis {
    /// Parses a basis from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "steps_defined" => Some(Self::StepsDefined),
            "steps_reached" => Some(Self::StepsReached),
            _ => None,
        }
    }

    /// Returns the string representation of the basis.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StepsDefined => "steps_defined",
            Self::StepsReached => "steps_reached",
        }
    }
}

/// A rule as it comes out of storage.
///
/// Fields unrelated to `kind` are ignored when compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRuleRecord {
    /// Rule identifier.
    pub id: ApprovalRuleId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Rule kind.
    pub kind: RuleKind,
    /// Percentage threshold (Percentage, Hybrid).
    pub threshold: Option<Decimal>,
    /// Named approver (SpecificApprover, Hybrid).
    pub approver_id: Option<UserId>,
    /// Inactive rules are never evaluated.
    pub is_active: bool,
}

/// The condition a rule checks, carrying only its kind's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Share of approved steps reaches the threshold.
    Percentage {
        /// Required share.
        threshold: Threshold,
    },
    /// A named approver has approved.
    SpecificApprover {
        /// The approver whose sign-off suffices.
        approver_id: UserId,
    },
    /// Either of the above.
    Hybrid {
        /// Required share.
        threshold: Threshold,
        /// The approver whose sign-off suffices.
        approver_id: UserId,
    },
}

impl RuleCondition {
    /// Builds a condition from a kind and its optional payload fields.
    ///
    /// # Errors
    ///
    /// Returns a `RulePayloadError` if a field the kind requires is missing
    /// or the threshold is out of range.
    pub fn from_parts(
        kind: RuleKind,
        threshold: Option<Decimal>,
        approver_id: Option<UserId>,
    ) -> Result<Self, RulePayloadError> {
        let threshold = || {
            threshold
                .ok_or(RulePayloadError::MissingThreshold)
                .and_then(Threshold::new)
        };
        let approver = || approver_id.ok_or(RulePayloadError::MissingApprover);

        match kind {
            RuleKind::Percentage => Ok(Self::Percentage {
                threshold: threshold()?,
            }),
            RuleKind::SpecificApprover => Ok(Self::SpecificApprover {
                approver_id: approver()?,
            }),
            RuleKind::Hybrid => Ok(Self::Hybrid {
                threshold: threshold()?,
                approver_id: approver()?,
            }),
        }
    }

    /// The kind of this condition.
    #[must_use]
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Percentage { .. } => RuleKind::Percentage,
            Self::SpecificApprover { .. } => RuleKind::SpecificApprover,
            Self::Hybrid { .. } => RuleKind::Hybrid,
        }
    }

    /// Checks the condition against the approvals so far.
    #[must_use]
    pub fn evaluate(&self, progress: &ApprovalProgress, basis: PercentageBasis) -> Option<MatchReason> {
        match *self {
            Self::Percentage { threshold } => percentage_reached(progress, basis, threshold),
            Self::SpecificApprover { approver_id } => approver_signed(progress, approver_id),
            Self::Hybrid {
                threshold,
                approver_id,
            } => percentage_reached(progress, basis, threshold)
                .or_else(|| approver_signed(progress, approver_id)),
        }
    }
}

fn percentage_reached(
    progress: &ApprovalProgress,
    basis: PercentageBasis,
    threshold: Threshold,
) -> Option<MatchReason> {
    let percent = progress.approved_percentage(basis);
    (percent >= threshold.value()).then_some(MatchReason::PercentageReached { percent })
}

fn approver_signed(progress: &ApprovalProgress, approver_id: UserId) -> Option<MatchReason> {
    progress
        .has_approved(approver_id)
        .then_some(MatchReason::ApproverSigned { approver_id })
}

/// A compiled, valid approval rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Rule identifier.
    pub id: ApprovalRuleId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// What the rule checks.
    pub condition: RuleCondition,
    /// Inactive rules are never evaluated.
    pub is_active: bool,
}

impl ApprovalRule {
    /// Compiles a stored record.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::InvalidRulePayload` if the record's payload
    /// does not satisfy its kind.
    pub fn from_record(record: &ApprovalRuleRecord) -> Result<Self, RoutingError> {
        let condition = RuleCondition::from_parts(record.kind, record.threshold, record.approver_id)
            .map_err(|reason| RoutingError::InvalidRulePayload {
                rule_id: record.id,
                reason,
            })?;

        Ok(Self {
            id: record.id,
            organization_id: record.organization_id,
            condition,
            is_active: record.is_active,
        })
    }
}

/// Why a rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MatchReason {
    /// The approved share reached the threshold.
    PercentageReached {
        /// Approved share at evaluation time.
        percent: Decimal,
    },
    /// The named approver has approved.
    ApproverSigned {
        /// The approver.
        approver_id: UserId,
    },
}

/// A rule that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// The rule.
    pub rule_id: ApprovalRuleId,
    /// Why it fired.
    pub reason: MatchReason,
}

/// Approval progress of one expense, the input to rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApprovalProgress {
    /// Number of Approved requests.
    pub approved_count: u32,
    /// Number of distinct steps that received a request.
    pub reached_steps: u32,
    /// Number of steps in the workflow.
    pub total_steps: u32,
    /// Users with an Approved request.
    pub approvers: BTreeSet<UserId>,
}

impl ApprovalProgress {
    /// Summarizes an expense's request history against its workflow size.
    #[must_use]
    pub fn from_history(history: &[ApprovalRequest], total_steps: u32) -> Self {
        let approved: Vec<&ApprovalRequest> = history
            .iter()
            .filter(|r| r.status == RequestStatus::Approved)
            .collect();
        let reached: BTreeSet<u32> = history.iter().map(|r| r.step_order).collect();

        Self {
            approved_count: u32::try_from(approved.len()).unwrap_or(u32::MAX),
            reached_steps: u32::try_from(reached.len()).unwrap_or(u32::MAX),
            total_steps,
            approvers: approved.iter().map(|r| r.approver_id).collect(),
        }
    }

    /// Approved share in percent for the given basis; zero with an empty denominator.
    #[must_use]
    pub fn approved_percentage(&self, basis: PercentageBasis) -> Decimal {
        let denominator = match basis {
            PercentageBasis::StepsDefined => self.total_steps,
            PercentageBasis::StepsReached => self.reached_steps,
        };
        if denominator == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.approved_count) * Decimal::ONE_HUNDRED / Decimal::from(denominator)
    }

    /// Returns true if `user` has an Approved request.
    #[must_use]
    pub fn has_approved(&self, user: UserId) -> bool {
        self.approvers.contains(&user)
    }
}

/// Stateless engine for evaluating auto-approval rules.
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Compiles stored records into active rules.
    ///
    /// Inactive records are dropped. Invalid payloads are logged and skipped.
    #[must_use]
    pub fn compile(records: &[ApprovalRuleRecord]) -> Vec<ApprovalRule> {
        records
            .iter()
            .filter(|record| record.is_active)
            .filter_map(|record| match ApprovalRule::from_record(record) {
                Ok(rule) => Some(rule),
                Err(err) => {
                    warn!(
                        rule_id = %record.id,
                        organization_id = %record.organization_id,
                        kind = %record.kind,
                        error = %err,
                        "Skipping approval rule with invalid payload"
                    );
                    None
                }
            })
            .collect()
    }

    /// Returns the first active rule that fires, if any.
    ///
    /// Rules combine with logical OR, so the first match decides.
    #[must_use]
    pub fn first_match(
        rules: &[ApprovalRule],
        progress: &ApprovalProgress,
        basis: PercentageBasis,
    ) -> Option<RuleMatch> {
        rules
            .iter()
            .filter(|rule| rule.is_active)
            .find_map(|rule| {
                rule.condition
                    .evaluate(progress, basis)
                    .map(|reason| RuleMatch {
                        rule_id: rule.id,
                        reason,
                    })
            })
    }
}
