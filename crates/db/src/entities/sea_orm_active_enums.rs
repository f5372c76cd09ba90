//! Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `user_role` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
pub enum UserRole {
    /// Company administrator.
    #[sea_orm(string_value = "admin")]
    Admin,
    /// People manager.
    #[sea_orm(string_value = "manager")]
    Manager,
    /// Regular employee.
    #[sea_orm(string_value = "employee")]
    Employee,
    /// Finance department.
    #[sea_orm(string_value = "finance")]
    Finance,
    /// Director.
    #[sea_orm(string_value = "director")]
    Director,
}

/// `approver_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "approver_type")]
pub enum ApproverType {
    /// Submitter's manager.
    #[sea_orm(string_value = "manager")]
    Manager,
    /// Finance role lookup.
    #[sea_orm(string_value = "finance")]
    Finance,
    /// Director role lookup.
    #[sea_orm(string_value = "director")]
    Director,
    /// Bound user.
    #[sea_orm(string_value = "specific_user")]
    SpecificUser,
}

/// `rule_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "rule_type")]
pub enum RuleType {
    /// Share of approved steps.
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// Named approver.
    #[sea_orm(string_value = "specific_approver")]
    SpecificApprover,
    /// Either condition.
    #[sea_orm(string_value = "hybrid")]
    Hybrid,
}

/// `approval_status` enum, shared by expenses and approval requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "approval_status")]
pub enum ApprovalStatus {
    /// Awaiting a decision.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Approved.
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Rejected.
    #[sea_orm(string_value = "rejected")]
    Rejected,
}
