//! `SeaORM` entity definitions.

pub mod prelude;

pub mod approval_rules;
pub mod approval_steps;
pub mod approval_workflows;
pub mod expense_approval_requests;
pub mod expenses;
pub mod organizations;
pub mod sea_orm_active_enums;
pub mod users;
