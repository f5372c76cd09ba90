//! Workflow repository for approval chain definitions.
//!
//! Administers workflows (create, list, activate, deactivate) and serves as
//! the router's [`WorkflowStore`].

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use claimflow_core::approval::{
    ApproverKind, ApproverType as CoreApproverType, RoutingError, Step, WorkflowDefinition,
    WorkflowStore,
};
use claimflow_shared::types::{OrganizationId, UserId, WorkflowId};

use super::convert::{db_err, step_order_from_db, step_order_to_db};
use crate::entities::{approval_steps, approval_workflows};

/// One step of a workflow being created, numbered by position.
#[derive(Debug, Clone)]
pub struct StepInput {
    /// How the approver is picked.
    pub approver_type: CoreApproverType,
    /// Bound user for `SpecificUser` steps; ignored otherwise.
    pub specific_user_id: Option<Uuid>,
    /// Recorded with the step, not consulted by routing.
    pub manager_must_approve: bool,
}

/// Input for creating a workflow.
#[derive(Debug, Clone)]
pub struct CreateWorkflowInput {
    /// Workflow name.
    pub name: String,
    /// Steps in approval order.
    pub steps: Vec<StepInput>,
    /// Make this the organization's active workflow.
    pub activate: bool,
}

/// Workflow repository.
#[derive(Debug, Clone)]
pub struct WorkflowRepository {
    db: DatabaseConnection,
}

impl WorkflowRepository {
    /// Creates a new workflow repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a workflow with its steps numbered 1..=N in input order.
    ///
    /// With `activate`, every other workflow of the organization is
    /// deactivated in the same transaction.
    ///
    /// # Errors
    ///
    /// - `InvalidWorkflow` if there are no steps.
    /// - `ApproverResolutionFailed` if a `SpecificUser` step has no user.
    /// - `Database` if a write fails.
    pub async fn create_workflow(
        &self,
        organization_id: Uuid,
        input: CreateWorkflowInput,
    ) -> Result<WorkflowDefinition, RoutingError> {
        let workflow_id = Uuid::now_v7();
        let steps = (1u32..)
            .zip(&input.steps)
            .map(|(order, step)| {
                let specific_user = step.specific_user_id.map(UserId::from);
                ApproverKind::from_parts(step.approver_type, specific_user)
                    .map(|approver| Step {
                        order,
                        approver,
                        manager_must_approve: step.manager_must_approve,
                    })
                    .map_err(|reason| RoutingError::ApproverResolutionFailed {
                        step_order: order,
                        reason,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Validates the chain before anything is written.
        let definition = WorkflowDefinition::new(
            workflow_id.into(),
            organization_id.into(),
            input.name.clone(),
            steps,
            input.activate,
        )?;

        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now().into();

        if input.activate {
            deactivate_all(&txn, organization_id).await?;
        }

        approval_workflows::ActiveModel {
            id: Set(workflow_id),
            organization_id: Set(organization_id),
            name: Set(input.name),
            is_active: Set(input.activate),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        for step in definition.steps() {
            approval_steps::ActiveModel {
                id: Set(Uuid::now_v7()),
                workflow_id: Set(workflow_id),
                step_order: Set(step_order_to_db(step.order)?),
                approver_type: Set(step.approver.approver_type().into()),
                specific_user_id: Set(step.approver.specific_user().map(UserId::into_inner)),
                manager_must_approve: Set(step.manager_must_approve),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;

        info!(
            organization_id = %organization_id,
            workflow_id = %workflow_id,
            steps = definition.total_steps(),
            active = input.activate,
            "Approval workflow created"
        );
        Ok(definition)
    }

    /// Lists the organization's workflows with their steps, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a stored workflow is malformed.
    pub async fn list_workflows(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<WorkflowDefinition>, RoutingError> {
        let workflows = approval_workflows::Entity::find()
            .filter(approval_workflows::Column::OrganizationId.eq(organization_id))
            .order_by_desc(approval_workflows::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut definitions = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            definitions.push(load_definition(&self.db, workflow).await?);
        }
        Ok(definitions)
    }

    /// Makes `workflow_id` the organization's only active workflow.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowNotFound` if the workflow is not in the organization.
    pub async fn activate(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<(), RoutingError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let workflow = find_in_org(&txn, organization_id, workflow_id).await?;

        deactivate_all(&txn, organization_id).await?;

        let mut active: approval_workflows::ActiveModel = workflow.into();
        active.is_active = Set(true);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await.map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        info!(
            organization_id = %organization_id,
            workflow_id = %workflow_id,
            "Approval workflow activated"
        );
        Ok(())
    }

    /// Deactivates a workflow; the organization is left with none active.
    ///
    /// Expenses already routed by it keep using it.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowNotFound` if the workflow is not in the organization.
    pub async fn deactivate(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<(), RoutingError> {
        let workflow = find_in_org(&self.db, organization_id, workflow_id).await?;

        let mut active: approval_workflows::ActiveModel = workflow.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }
}

impl WorkflowStore for WorkflowRepository {
    async fn get_active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<WorkflowDefinition>, RoutingError> {
        let workflow = approval_workflows::Entity::find()
            .filter(approval_workflows::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(approval_workflows::Column::IsActive.eq(true))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        match workflow {
            Some(workflow) => Ok(Some(load_definition(&self.db, workflow).await?)),
            None => Ok(None),
        }
    }

    async fn get(&self, workflow_id: WorkflowId) -> Result<Option<WorkflowDefinition>, RoutingError> {
        let workflow = approval_workflows::Entity::find_by_id(workflow_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?;

        match workflow {
            Some(workflow) => Ok(Some(load_definition(&self.db, workflow).await?)),
            None => Ok(None),
        }
    }
}

async fn find_in_org<C: ConnectionTrait>(
    db: &C,
    organization_id: Uuid,
    workflow_id: Uuid,
) -> Result<approval_workflows::Model, RoutingError> {
    approval_workflows::Entity::find_by_id(workflow_id)
        .filter(approval_workflows::Column::OrganizationId.eq(organization_id))
        .one(db)
        .await
        .map_err(db_err)?
        .ok_or(RoutingError::WorkflowNotFound(workflow_id.into()))
}

async fn deactivate_all<C: ConnectionTrait>(db: &C, organization_id: Uuid) -> Result<(), RoutingError> {
    approval_workflows::Entity::update_many()
        .col_expr(
            approval_workflows::Column::IsActive,
            sea_orm::sea_query::Expr::value(false),
        )
        .filter(approval_workflows::Column::OrganizationId.eq(organization_id))
        .filter(approval_workflows::Column::IsActive.eq(true))
        .exec(db)
        .await
        .map_err(db_err)?;
    Ok(())
}

/// Loads a workflow's steps and validates the chain.
async fn load_definition<C: ConnectionTrait>(
    db: &C,
    workflow: approval_workflows::Model,
) -> Result<WorkflowDefinition, RoutingError> {
    let rows = approval_steps::Entity::find()
        .filter(approval_steps::Column::WorkflowId.eq(workflow.id))
        .order_by_asc(approval_steps::Column::StepOrder)
        .all(db)
        .await
        .map_err(db_err)?;

    let steps = rows
        .into_iter()
        .map(step_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    WorkflowDefinition::new(
        workflow.id.into(),
        workflow.organization_id.into(),
        workflow.name,
        steps,
        workflow.is_active,
    )
}

fn step_from_row(row: approval_steps::Model) -> Result<Step, RoutingError> {
    let order = step_order_from_db(row.step_order)?;
    let approver = ApproverKind::from_parts(row.approver_type.into(), row.specific_user_id.map(UserId::from))
        .map_err(|reason| RoutingError::ApproverResolutionFailed {
            step_order: order,
            reason,
        })?;

    Ok(Step {
        order,
        approver,
        manager_must_approve: row.manager_must_approve,
    })
}
