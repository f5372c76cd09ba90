//! Approval Rule Repository
//!
//! Administers auto-approval rules and serves as the router's [`RuleStore`].
//! Payloads are validated on the way in, so stored rules always compile.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use claimflow_core::approval::{
    ApprovalRuleRecord, RoutingError, RuleCondition, RuleKind, RulePayloadError, RuleStore,
};
use claimflow_shared::types::{OrganizationId, UserId};

use super::convert::db_err;
use crate::entities::approval_rules::{
    self, ActiveModel, Entity as ApprovalRuleEntity, Model as ApprovalRuleModel,
};

/// Errors that can occur during approval rule operations.
#[derive(Debug, Error)]
pub enum ApprovalRuleError {
    /// Approval rule not found.
    #[error("Approval rule {0} not found")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The payload does not satisfy the rule kind.
    #[error("Invalid rule payload: {0}")]
    InvalidPayload(#[from] RulePayloadError),
}

/// Input for creating an approval rule.
#[derive(Debug, Clone)]
pub struct CreateApprovalRuleInput {
    /// Rule kind.
    pub kind: RuleKind,
    /// Percentage threshold in (0, 100], for percentage and hybrid rules.
    pub threshold: Option<Decimal>,
    /// Named approver, for specific-approver and hybrid rules.
    pub approver_id: Option<Uuid>,
}

/// Repository for approval rule operations.
#[derive(Debug, Clone)]
pub struct ApprovalRuleRepository {
    db: DatabaseConnection,
}

impl ApprovalRuleRepository {
    /// Creates a new `ApprovalRuleRepository`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an active approval rule.
    ///
    /// Only the payload fields the kind uses are stored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` if a required field is missing or the
    /// threshold is out of range.
    pub async fn create_rule(
        &self,
        organization_id: Uuid,
        input: CreateApprovalRuleInput,
    ) -> Result<ApprovalRuleModel, ApprovalRuleError> {
        let condition = RuleCondition::from_parts(
            input.kind,
            input.threshold,
            input.approver_id.map(UserId::from),
        )?;
        let (threshold, approver_id) = payload_columns(&condition);

        let now = chrono::Utc::now().into();
        let rule = ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(organization_id),
            rule_type: Set(input.kind.into()),
            percentage_threshold: Set(threshold),
            specific_approver_id: Set(approver_id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = rule.insert(&self.db).await?;

        info!(
            organization_id = %organization_id,
            rule_id = %result.id,
            kind = %input.kind,
            "Approval rule created"
        );
        Ok(result)
    }

    /// Lists all active approval rules for an organization, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_rules(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<ApprovalRuleModel>, ApprovalRuleError> {
        let rules = ApprovalRuleEntity::find()
            .filter(approval_rules::Column::OrganizationId.eq(organization_id))
            .filter(approval_rules::Column::IsActive.eq(true))
            .order_by_asc(approval_rules::Column::CreatedAt)
            .order_by_asc(approval_rules::Column::Id)
            .all(&self.db)
            .await?;

        Ok(rules)
    }

    /// Gets a specific approval rule by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the rule is not in the organization.
    pub async fn get_rule(
        &self,
        organization_id: Uuid,
        rule_id: Uuid,
    ) -> Result<ApprovalRuleModel, ApprovalRuleError> {
        let rule = ApprovalRuleEntity::find_by_id(rule_id)
            .filter(approval_rules::Column::OrganizationId.eq(organization_id))
            .one(&self.db)
            .await?
            .ok_or(ApprovalRuleError::NotFound(rule_id))?;

        Ok(rule)
    }

    /// Soft deletes an approval rule by setting `is_active` to false.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the rule is not in the organization.
    pub async fn deactivate_rule(
        &self,
        organization_id: Uuid,
        rule_id: Uuid,
    ) -> Result<(), ApprovalRuleError> {
        let existing = self.get_rule(organization_id, rule_id).await?;

        let mut rule: ActiveModel = existing.into();
        rule.is_active = Set(false);
        rule.updated_at = Set(chrono::Utc::now().into());

        rule.update(&self.db).await?;
        Ok(())
    }
}

impl RuleStore for ApprovalRuleRepository {
    async fn get_active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<ApprovalRuleRecord>, RoutingError> {
        let rules = self
            .list_rules(organization_id.into_inner())
            .await
            .map_err(|err| match err {
                ApprovalRuleError::Database(err) => db_err(err),
                other => RoutingError::Database(other.to_string()),
            })?;

        Ok(rules.into_iter().map(rule_record).collect())
    }
}

/// Threshold and approver columns for a validated condition.
fn payload_columns(condition: &RuleCondition) -> (Option<Decimal>, Option<Uuid>) {
    match *condition {
        RuleCondition::Percentage { threshold } => (Some(threshold.value()), None),
        RuleCondition::SpecificApprover { approver_id } => (None, Some(approver_id.into_inner())),
        RuleCondition::Hybrid {
            threshold,
            approver_id,
        } => (Some(threshold.value()), Some(approver_id.into_inner())),
    }
}

fn rule_record(model: ApprovalRuleModel) -> ApprovalRuleRecord {
    ApprovalRuleRecord {
        id: model.id.into(),
        organization_id: model.organization_id.into(),
        kind: model.rule_type.into(),
        threshold: model.percentage_threshold,
        approver_id: model.specific_approver_id.map(UserId::from),
        is_active: model.is_active,
    }
}
