//! Core approval routing logic for Claimflow.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Storage is reached only through the capability traits in [`approval::ports`].
//!
//! # Modules
//!
//! - `approval` - Workflow steps, approver resolution, the approval router
//!   state machine, conditional auto-approval rules, and status projection

pub mod approval;
