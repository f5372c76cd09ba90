//! `SeaORM` Entity for approval_steps table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ApproverType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "approval_steps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub step_order: i32,
    pub approver_type: ApproverType,
    pub specific_user_id: Option<Uuid>,
    pub manager_must_approve: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::approval_workflows::Entity",
        from = "Column::WorkflowId",
        to = "super::approval_workflows::Column::Id"
    )]
    ApprovalWorkflows,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SpecificUserId",
        to = "super::users::Column::Id"
    )]
    Users,
}

impl Related<super::approval_workflows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApprovalWorkflows.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
