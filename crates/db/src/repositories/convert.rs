//! Conversions between database rows and routing types.

use sea_orm::{DbErr, SqlErr};

use claimflow_core::approval::{
    ApprovalRequest, ApproverType as CoreApproverType, ExpenseRecord, ExpenseStatus,
    RequestStatus, RoutingError, RuleKind, UserRole as CoreUserRole,
};

use crate::entities::{
    expense_approval_requests, expenses,
    sea_orm_active_enums::{ApprovalStatus, ApproverType, RuleType, UserRole},
};

/// Maps a database error, turning unique-index violations into `Conflict`.
pub(crate) fn db_err(err: DbErr) -> RoutingError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => RoutingError::Conflict(detail),
        _ => RoutingError::Database(err.to_string()),
    }
}

/// Step orders are positive `INTEGER`s in the database.
pub(crate) fn step_order_from_db(order: i32) -> Result<u32, RoutingError> {
    u32::try_from(order)
        .ok()
        .filter(|o| *o > 0)
        .ok_or_else(|| RoutingError::Database(format!("invalid step order {order}")))
}

pub(crate) fn step_order_to_db(order: u32) -> Result<i32, RoutingError> {
    i32::try_from(order).map_err(|_| RoutingError::InvalidWorkflow(format!("step order {order} is too large")))
}

impl From<CoreUserRole> for UserRole {
    fn from(role: CoreUserRole) -> Self {
        match role {
            CoreUserRole::Admin => Self::Admin,
            CoreUserRole::Manager => Self::Manager,
            CoreUserRole::Employee => Self::Employee,
            CoreUserRole::Finance => Self::Finance,
            CoreUserRole::Director => Self::Director,
        }
    }
}

impl From<UserRole> for CoreUserRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => Self::Admin,
            UserRole::Manager => Self::Manager,
            UserRole::Employee => Self::Employee,
            UserRole::Finance => Self::Finance,
            UserRole::Director => Self::Director,
        }
    }
}

impl From<CoreApproverType> for ApproverType {
    fn from(kind: CoreApproverType) -> Self {
        match kind {
            CoreApproverType::Manager => Self::Manager,
            CoreApproverType::Finance => Self::Finance,
            CoreApproverType::Director => Self::Director,
            CoreApproverType::SpecificUser => Self::SpecificUser,
        }
    }
}

impl From<ApproverType> for CoreApproverType {
    fn from(kind: ApproverType) -> Self {
        match kind {
            ApproverType::Manager => Self::Manager,
            ApproverType::Finance => Self::Finance,
            ApproverType::Director => Self::Director,
            ApproverType::SpecificUser => Self::SpecificUser,
        }
    }
}

impl From<RuleKind> for RuleType {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Percentage => Self::Percentage,
            RuleKind::SpecificApprover => Self::SpecificApprover,
            RuleKind::Hybrid => Self::Hybrid,
        }
    }
}

impl From<RuleType> for RuleKind {
    fn from(kind: RuleType) -> Self {
        match kind {
            RuleType::Percentage => Self::Percentage,
            RuleType::SpecificApprover => Self::SpecificApprover,
            RuleType::Hybrid => Self::Hybrid,
        }
    }
}

impl From<RequestStatus> for ApprovalStatus {
    fn from(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Pending => Self::Pending,
            RequestStatus::Approved => Self::Approved,
            RequestStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<ApprovalStatus> for RequestStatus {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Pending => Self::Pending,
            ApprovalStatus::Approved => Self::Approved,
            ApprovalStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<ExpenseStatus> for ApprovalStatus {
    fn from(status: ExpenseStatus) -> Self {
        match status {
            ExpenseStatus::Pending => Self::Pending,
            ExpenseStatus::Approved => Self::Approved,
            ExpenseStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<ApprovalStatus> for ExpenseStatus {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Pending => Self::Pending,
            ApprovalStatus::Approved => Self::Approved,
            ApprovalStatus::Rejected => Self::Rejected,
        }
    }
}

pub(crate) fn expense_record(model: &expenses::Model) -> ExpenseRecord {
    ExpenseRecord {
        id: model.id.into(),
        organization_id: model.organization_id.into(),
        submitted_by: model.submitted_by.into(),
        status: model.status.into(),
    }
}

pub(crate) fn approval_request(
    model: expense_approval_requests::Model,
) -> Result<ApprovalRequest, RoutingError> {
    Ok(ApprovalRequest {
        id: model.id.into(),
        expense_id: model.expense_id.into(),
        workflow_id: model.workflow_id.into(),
        approver_id: model.approver_id.into(),
        step_order: step_order_from_db(model.step_order)?,
        status: model.status.into(),
        comment: model.comment,
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_role_round_trip() {
        for role in [
            CoreUserRole::Admin,
            CoreUserRole::Manager,
            CoreUserRole::Employee,
            CoreUserRole::Finance,
            CoreUserRole::Director,
        ] {
            assert_eq!(CoreUserRole::from(UserRole::from(role)), role);
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApprovalStatus::from(RequestStatus::Approved), ApprovalStatus::Approved);
        assert_eq!(ExpenseStatus::from(ApprovalStatus::Rejected), ExpenseStatus::Rejected);
        assert_eq!(RuleKind::from(RuleType::Hybrid), RuleKind::Hybrid);
        assert_eq!(
            CoreApproverType::from(ApproverType::SpecificUser),
            CoreApproverType::SpecificUser
        );
    }

    #[test]
    fn test_step_order_bounds() {
        assert_eq!(step_order_from_db(3).unwrap(), 3);
        assert!(step_order_from_db(0).is_err());
        assert!(step_order_from_db(-1).is_err());
        assert_eq!(step_order_to_db(7).unwrap(), 7);
        assert!(step_order_to_db(u32::MAX).is_err());
    }

    #[test]
    fn test_request_from_model() {
        let now = Utc::now();
        let model = expense_approval_requests::Model {
            id: Uuid::now_v7(),
            expense_id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            approver_id: Uuid::now_v7(),
            step_order: 2,
            status: ApprovalStatus::Pending,
            comment: Some("needs receipt".to_string()),
            created_at: now.into(),
            updated_at: now.into(),
        };

        let request = approval_request(model.clone()).unwrap();
        assert_eq!(request.id.into_inner(), model.id);
        assert_eq!(request.step_order, 2);
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.comment.as_deref(), Some("needs receipt"));
        assert_eq!(request.created_at, now);
    }

    #[test]
    fn test_generic_db_error_maps_to_database() {
        let err = db_err(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, RoutingError::Database(msg) if msg.contains("boom")));
    }
}
