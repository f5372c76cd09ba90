//! Database seeder for Claimflow development and testing.
//!
//! Seeds a demo organization (reporting line, a four-step workflow and two
//! auto-approval rules) and walks a few expenses through the router so the
//! database holds approved, rejected and in-flight claims.
//!
//! Usage: cargo run --bin seeder (after `migrator up`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use claimflow_core::approval::{
    ApprovalRouter, ApproverType, DecisionAction, PercentageBasis, RoutingPolicy, RuleKind,
    SubmitOutcome,
};
use claimflow_db::entities::sea_orm_active_enums::UserRole;
use claimflow_db::repositories::{
    ApprovalRequestRepository, ApprovalRuleRepository, CreateApprovalRuleInput,
    CreateExpenseInput, CreateUserInput, CreateWorkflowInput, ExpenseRepository,
    OrganizationRepository, StepInput, UserRepository, WorkflowRepository,
};
use claimflow_shared::AppConfig;
use claimflow_shared::config::LoggingConfig;
use claimflow_shared::types::ExpenseId;

const MANAGER_EMAIL: &str = "alice.manager@acme.test";

type Router = ApprovalRouter<
    WorkflowRepository,
    ApprovalRuleRepository,
    UserRepository,
    ApprovalRequestRepository,
>;

/// The seeded cast.
struct Staff {
    org_id: Uuid,
    manager: Uuid,
    employee: Uuid,
    finance: Uuid,
    cfo: Uuid,
    director: Uuid,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter(&config.logging)))
        .with(config.logging.json.then(|| fmt::layer().json()))
        .with((!config.logging.json).then(fmt::layer))
        .init();

    let percentage_basis = PercentageBasis::parse(&config.routing.percentage_basis)
        .with_context(|| {
            format!(
                "Unknown percentage basis '{}'",
                config.routing.percentage_basis
            )
        })?;

    let db = claimflow_db::connect_with_pool(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
        Duration::from_secs(10),
    )
    .await
    .context("Failed to connect to database")?;
    info!("Connected to database");

    let users = UserRepository::new(db.clone());
    if users.find_by_email(MANAGER_EMAIL).await?.is_some() {
        info!("Demo organization already seeded, nothing to do");
        return Ok(());
    }

    let staff = seed_staff(&db).await?;
    seed_workflow(&db, &staff).await?;
    seed_rules(&db, &staff).await?;

    let router: Router = ApprovalRouter::new(
        Arc::new(WorkflowRepository::new(db.clone())),
        Arc::new(ApprovalRuleRepository::new(db.clone())),
        Arc::new(users),
        Arc::new(ApprovalRequestRepository::new(db.clone())),
        RoutingPolicy { percentage_basis },
    );
    let expenses = ExpenseRepository::new(db);

    // Manager and finance approve, then the CFO's sign-off fires a rule.
    let travel = create_expense(&expenses, &staff, dec!(1840.00), "Travel").await?;
    submit(&router, travel).await?;
    decide(&router, travel, staff.manager, DecisionAction::Approve, None).await?;
    decide(&router, travel, staff.finance, DecisionAction::Approve, None).await?;
    decide(&router, travel, staff.cfo, DecisionAction::Approve, Some("Approved for Q2 offsite")).await?;

    // Rejected by the manager at step 1.
    let meals = create_expense(&expenses, &staff, dec!(312.50), "Meals").await?;
    submit(&router, meals).await?;
    decide(&router, meals, staff.manager, DecisionAction::Reject, Some("Missing itemized receipt")).await?;

    // Left waiting on finance.
    let software = create_expense(&expenses, &staff, dec!(99.00), "Software").await?;
    submit(&router, software).await?;
    decide(&router, software, staff.manager, DecisionAction::Approve, None).await?;

    let inbox = router.pending_for(staff.finance.into()).await?;
    info!(
        approver_id = %staff.finance,
        pending = inbox.len(),
        "Finance inbox after seeding"
    );
    let open = router.pending_in_organization(staff.org_id.into()).await?;
    let claimed = router.requests_by_submitter(staff.employee.into()).await?;
    info!(
        organization_id = %staff.org_id,
        pending = open.len(),
        submitter_requests = claimed.len(),
        "Organization queue after seeding"
    );

    info!(organization_id = %staff.org_id, "Seeding complete");
    Ok(())
}

/// Filter used when `RUST_LOG` is unset. Events from this binary carry the
/// `seeder` target, so the configured directive has to name it.
fn log_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::new(&logging.filter)
}

async fn seed_staff(db: &sea_orm::DatabaseConnection) -> anyhow::Result<Staff> {
    let org = OrganizationRepository::new(db.clone())
        .create("Acme Travel Co.", "USD")
        .await?;
    info!(organization_id = %org.id, "Seeded organization");

    let users = UserRepository::new(db.clone());
    let person = |email: &str, name: &str, role: UserRole, manager_id: Option<Uuid>| {
        CreateUserInput {
            organization_id: org.id,
            email: email.to_string(),
            full_name: name.to_string(),
            role,
            manager_id,
        }
    };

    let manager = users
        .create(person(MANAGER_EMAIL, "Alice Manager", UserRole::Manager, None))
        .await?
        .id;
    let employee = users
        .create(person(
            "bob.employee@acme.test",
            "Bob Employee",
            UserRole::Employee,
            Some(manager),
        ))
        .await?
        .id;
    let finance = users
        .create(person("fiona.finance@acme.test", "Fiona Finance", UserRole::Finance, None))
        .await?
        .id;
    let cfo = users
        .create(person("carol.cfo@acme.test", "Carol CFO", UserRole::Admin, None))
        .await?
        .id;
    let director = users
        .create(person("dan.director@acme.test", "Dan Director", UserRole::Director, None))
        .await?
        .id;
    info!(count = 5, "Seeded users");

    Ok(Staff {
        org_id: org.id,
        manager,
        employee,
        finance,
        cfo,
        director,
    })
}

async fn seed_workflow(db: &sea_orm::DatabaseConnection, staff: &Staff) -> anyhow::Result<()> {
    let by_type = |approver_type| StepInput {
        approver_type,
        specific_user_id: None,
        manager_must_approve: false,
    };

    WorkflowRepository::new(db.clone())
        .create_workflow(
            staff.org_id,
            CreateWorkflowInput {
                name: "Standard expense approval".to_string(),
                steps: vec![
                    StepInput {
                        manager_must_approve: true,
                        ..by_type(ApproverType::Manager)
                    },
                    by_type(ApproverType::Finance),
                    StepInput {
                        specific_user_id: Some(staff.cfo),
                        ..by_type(ApproverType::SpecificUser)
                    },
                    by_type(ApproverType::Director),
                ],
                activate: true,
            },
        )
        .await?;
    Ok(())
}

async fn seed_rules(db: &sea_orm::DatabaseConnection, staff: &Staff) -> anyhow::Result<()> {
    let rules = ApprovalRuleRepository::new(db.clone());

    rules
        .create_rule(
            staff.org_id,
            CreateApprovalRuleInput {
                kind: RuleKind::SpecificApprover,
                threshold: None,
                approver_id: Some(staff.cfo),
            },
        )
        .await?;
    rules
        .create_rule(
            staff.org_id,
            CreateApprovalRuleInput {
                kind: RuleKind::Hybrid,
                threshold: Some(dec!(75)),
                approver_id: Some(staff.director),
            },
        )
        .await?;
    Ok(())
}

async fn create_expense(
    expenses: &ExpenseRepository,
    staff: &Staff,
    amount: Decimal,
    category: &str,
) -> anyhow::Result<ExpenseId> {
    let expense = expenses
        .create(CreateExpenseInput {
            organization_id: staff.org_id,
            submitted_by: staff.employee,
            amount,
            currency: "USD".to_string(),
            category: category.to_string(),
            description: None,
            expense_date: NaiveDate::from_ymd_opt(2026, 4, 2)
                .context("invalid seed date")?,
        })
        .await?;
    Ok(expense.id.into())
}

async fn submit(router: &Router, expense_id: ExpenseId) -> anyhow::Result<()> {
    match router.submit(expense_id).await? {
        SubmitOutcome::Routed { request } => info!(
            expense_id = %expense_id,
            approver_id = %request.approver_id,
            "Submitted"
        ),
        SubmitOutcome::NoActiveWorkflow => info!(expense_id = %expense_id, "Submitted, no workflow"),
    }
    Ok(())
}

async fn decide(
    router: &Router,
    expense_id: ExpenseId,
    approver: Uuid,
    action: DecisionAction,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    let outcome = router
        .decide(expense_id, approver.into(), action, comment.map(str::to_string))
        .await?;
    info!(
        expense_id = %expense_id,
        outcome = %serde_json::to_string(&outcome)?,
        "Decision recorded"
    );
    Ok(())
}
