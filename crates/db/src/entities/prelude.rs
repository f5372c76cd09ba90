//! Entity re-exports.

pub use super::approval_rules::Entity as ApprovalRules;
pub use super::approval_steps::Entity as ApprovalSteps;
pub use super::approval_workflows::Entity as ApprovalWorkflows;
pub use super::expense_approval_requests::Entity as ExpenseApprovalRequests;
pub use super::expenses::Entity as Expenses;
pub use super::organizations::Entity as Organizations;
pub use super::users::Entity as Users;
