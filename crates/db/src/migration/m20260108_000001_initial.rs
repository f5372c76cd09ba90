//! Initial database migration.
//!
//! Creates the enums, tables, constraints and indexes behind expense
//! approval routing.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: ORGANIZATIONS & USERS
        // ============================================================
        db.execute_unprepared(ORGANIZATIONS_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;

        // ============================================================
        // PART 3: WORKFLOWS & RULES
        // ============================================================
        db.execute_unprepared(APPROVAL_WORKFLOWS_SQL).await?;
        db.execute_unprepared(APPROVAL_STEPS_SQL).await?;
        db.execute_unprepared(APPROVAL_RULES_SQL).await?;

        // ============================================================
        // PART 4: EXPENSES & APPROVAL REQUESTS
        // ============================================================
        db.execute_unprepared(EXPENSES_SQL).await?;
        db.execute_unprepared(EXPENSE_APPROVAL_REQUESTS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- User roles
CREATE TYPE user_role AS ENUM (
    'admin',
    'manager',
    'employee',
    'finance',
    'director'
);

-- How a workflow step picks its approver
CREATE TYPE approver_type AS ENUM (
    'manager',
    'finance',
    'director',
    'specific_user'
);

-- Auto-approval rule kinds
CREATE TYPE rule_type AS ENUM (
    'percentage',
    'specific_approver',
    'hybrid'
);

-- Shared by expenses and approval requests
CREATE TYPE approval_status AS ENUM (
    'pending',
    'approved',
    'rejected'
);
";

const ORGANIZATIONS_SQL: &str = r"
CREATE TABLE organizations (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    base_currency CHAR(3) NOT NULL DEFAULT 'USD',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    email VARCHAR(255) NOT NULL UNIQUE,
    full_name VARCHAR(255) NOT NULL,
    role user_role NOT NULL DEFAULT 'employee',
    manager_id UUID REFERENCES users(id) ON DELETE SET NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_not_own_manager CHECK (manager_id IS NULL OR manager_id <> id)
);

-- Role lookups pick the lowest id, so the index leads with it
CREATE INDEX idx_users_org_role ON users(organization_id, role, id) WHERE is_active = true;
CREATE INDEX idx_users_manager ON users(manager_id) WHERE manager_id IS NOT NULL;
";

const APPROVAL_WORKFLOWS_SQL: &str = r"
CREATE TABLE approval_workflows (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Zero or one active workflow per organization
CREATE UNIQUE INDEX uq_approval_workflows_active ON approval_workflows(organization_id)
    WHERE is_active = true;
CREATE INDEX idx_approval_workflows_org ON approval_workflows(organization_id);
";

const APPROVAL_STEPS_SQL: &str = r"
CREATE TABLE approval_steps (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    workflow_id UUID NOT NULL REFERENCES approval_workflows(id) ON DELETE CASCADE,
    step_order INTEGER NOT NULL,
    approver_type approver_type NOT NULL,
    specific_user_id UUID REFERENCES users(id) ON DELETE RESTRICT,
    manager_must_approve BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_approval_steps_order UNIQUE (workflow_id, step_order),
    CONSTRAINT chk_step_order_positive CHECK (step_order > 0),
    CONSTRAINT chk_specific_user_binding CHECK (
        (approver_type = 'specific_user') = (specific_user_id IS NOT NULL)
    )
);
";

const APPROVAL_RULES_SQL: &str = r"
CREATE TABLE approval_rules (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    rule_type rule_type NOT NULL,
    percentage_threshold NUMERIC(5, 2),
    specific_approver_id UUID REFERENCES users(id) ON DELETE SET NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_threshold_range CHECK (
        percentage_threshold IS NULL
        OR (percentage_threshold > 0 AND percentage_threshold <= 100)
    ),
    CONSTRAINT chk_rule_payload CHECK (
        (rule_type <> 'percentage' OR percentage_threshold IS NOT NULL)
        AND (rule_type <> 'specific_approver' OR specific_approver_id IS NOT NULL)
        AND (rule_type <> 'hybrid'
             OR (percentage_threshold IS NOT NULL AND specific_approver_id IS NOT NULL))
    )
);

CREATE INDEX idx_approval_rules_org ON approval_rules(organization_id) WHERE is_active = true;
";

const EXPENSES_SQL: &str = r"
CREATE TABLE expenses (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    submitted_by UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
    amount NUMERIC(19, 4) NOT NULL,
    currency CHAR(3) NOT NULL,
    category VARCHAR(100) NOT NULL,
    description TEXT,
    expense_date DATE NOT NULL,
    status approval_status NOT NULL DEFAULT 'pending',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_expense_amount_positive CHECK (amount > 0)
);

CREATE INDEX idx_expenses_org_status ON expenses(organization_id, status);
CREATE INDEX idx_expenses_submitter ON expenses(submitted_by);
";

const EXPENSE_APPROVAL_REQUESTS_SQL: &str = r"
CREATE TABLE expense_approval_requests (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    expense_id UUID NOT NULL REFERENCES expenses(id) ON DELETE CASCADE,
    workflow_id UUID NOT NULL REFERENCES approval_workflows(id) ON DELETE RESTRICT,
    approver_id UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
    step_order INTEGER NOT NULL,
    status approval_status NOT NULL DEFAULT 'pending',
    comment TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT uq_expense_step UNIQUE (expense_id, step_order),
    CONSTRAINT chk_request_step_positive CHECK (step_order > 0)
);

-- At most one pending request per expense
CREATE UNIQUE INDEX uq_expense_pending_request ON expense_approval_requests(expense_id)
    WHERE status = 'pending';
CREATE INDEX idx_approval_requests_inbox ON expense_approval_requests(approver_id, created_at DESC)
    WHERE status = 'pending';
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_decided_request_modification
-- Decided requests form the audit trail and are never rewritten
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_decided_request_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status <> 'pending' THEN
        RAISE EXCEPTION 'Approval request % is already %', OLD.id, OLD.status;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_decided_request_mod
BEFORE UPDATE ON expense_approval_requests
FOR EACH ROW
EXECUTE FUNCTION prevent_decided_request_modification();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

-- Drop triggers
DROP TRIGGER IF EXISTS trg_prevent_decided_request_mod ON expense_approval_requests;

-- Drop functions
DROP FUNCTION IF EXISTS prevent_decided_request_modification();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS expense_approval_requests CASCADE;
DROP TABLE IF EXISTS expenses CASCADE;
DROP TABLE IF EXISTS approval_rules CASCADE;
DROP TABLE IF EXISTS approval_steps CASCADE;
DROP TABLE IF EXISTS approval_workflows CASCADE;
DROP TABLE IF EXISTS users CASCADE;
DROP TABLE IF EXISTS organizations CASCADE;

-- Drop enums
DROP TYPE IF EXISTS approval_status CASCADE;
DROP TYPE IF EXISTS rule_type CASCADE;
DROP TYPE IF EXISTS approver_type CASCADE;
DROP TYPE IF EXISTS user_role CASCADE;
";
