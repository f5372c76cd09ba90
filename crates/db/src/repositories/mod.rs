//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! The approval repositories double as the router's storage ports.

pub mod approval_request;
pub mod approval_rule;
mod convert;
pub mod expense;
pub mod organization;
pub mod user;
pub mod workflow;

pub use approval_request::{ApprovalRequestRepository, SeaOrmTransaction};
pub use approval_rule::{ApprovalRuleError, ApprovalRuleRepository, CreateApprovalRuleInput};
pub use expense::{CreateExpenseInput, ExpenseRepository};
pub use organization::OrganizationRepository;
pub use user::{CreateUserInput, UserRepository};
pub use workflow::{CreateWorkflowInput, StepInput, WorkflowRepository};
