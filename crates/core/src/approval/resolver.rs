//! Approver resolution.
//!
//! Turns a step's [`ApproverKind`] into the concrete user who must decide it.

use std::sync::Arc;

use tracing::warn;

use claimflow_shared::types::{OrganizationId, UserId};

use super::error::{ResolutionFailure, RoutingError};
use super::ports::UserDirectory;
use super::types::{ApproverKind, Step, UserRole};

/// Resolves step approvers through a [`UserDirectory`].
pub struct ApproverResolver<D: UserDirectory> {
    directory: Arc<D>,
}

impl<D: UserDirectory> ApproverResolver<D> {
    /// Creates a resolver.
    #[must_use]
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Determines who approves `step` for an expense submitted by `submitter`.
    ///
    /// - `Manager`: the submitter's manager.
    /// - `Finance` / `Director`: the organization member with that role and
    ///   the lowest identifier.
    /// - `SpecificUser`: the bound user.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::ApproverResolutionFailed` if nobody qualifies,
    /// or a store error from the directory.
    pub async fn resolve(
        &self,
        step: &Step,
        submitter: UserId,
        organization_id: OrganizationId,
    ) -> Result<UserId, RoutingError> {
        let resolved = match step.approver {
            ApproverKind::SpecificUser { user_id } => Ok(user_id),
            ApproverKind::Manager => self
                .directory
                .manager_of(submitter)
                .await?
                .ok_or(ResolutionFailure::SubmitterHasNoManager { submitter }),
            ApproverKind::Finance => self.by_role(organization_id, UserRole::Finance).await?,
            ApproverKind::Director => self.by_role(organization_id, UserRole::Director).await?,
        };

        resolved.map_err(|reason| {
            warn!(
                organization_id = %organization_id,
                submitter = %submitter,
                step_order = step.order,
                reason = %reason,
                "Approver resolution failed"
            );
            RoutingError::ApproverResolutionFailed {
                step_order: step.order,
                reason,
            }
        })
    }

    async fn by_role(
        &self,
        organization_id: OrganizationId,
        role: UserRole,
    ) -> Result<Result<UserId, ResolutionFailure>, RoutingError> {
        Ok(self
            .directory
            .find_by_role(organization_id, role)
            .await?
            .ok_or(ResolutionFailure::NoUserWithRole { role }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::memory::InMemoryStore;
    use rstest::rstest;

    struct Org {
        store: Arc<InMemoryStore>,
        org: OrganizationId,
        manager: UserId,
        employee: UserId,
        orphan: UserId,
    }

    async fn org() -> Org {
        let store = Arc::new(InMemoryStore::new());
        let org = OrganizationId::new();
        let manager = store.add_user(org, UserRole::Manager, None).await;
        let employee = store.add_user(org, UserRole::Employee, Some(manager)).await;
        let orphan = store.add_user(org, UserRole::Employee, None).await;
        Org {
            store,
            org,
            manager,
            employee,
            orphan,
        }
    }

    #[tokio::test]
    async fn test_manager_step_resolves_to_submitters_manager() {
        let o = org().await;
        let resolver = ApproverResolver::new(o.store.clone());
        let step = Step::new(1, ApproverKind::Manager);

        let approver = resolver.resolve(&step, o.employee, o.org).await.unwrap();
        assert_eq!(approver, o.manager);
    }

    #[tokio::test]
    async fn test_manager_step_without_manager_fails() {
        let o = org().await;
        let resolver = ApproverResolver::new(o.store.clone());
        let step = Step::new(2, ApproverKind::Manager);

        let err = resolver.resolve(&step, o.orphan, o.org).await.unwrap_err();
        match err {
            RoutingError::ApproverResolutionFailed { step_order, reason } => {
                assert_eq!(step_order, 2);
                assert_eq!(
                    reason,
                    ResolutionFailure::SubmitterHasNoManager { submitter: o.orphan }
                );
            }
            other => panic!("Expected ApproverResolutionFailed, got {other:?}"),
        }
    }

    #[rstest]
    #[case(ApproverKind::Finance, UserRole::Finance)]
    #[case(ApproverKind::Director, UserRole::Director)]
    #[tokio::test]
    async fn test_role_step_picks_lowest_identifier(
        #[case] kind: ApproverKind,
        #[case] role: UserRole,
    ) {
        let o = org().await;
        let first = o.store.add_user(o.org, role, None).await;
        let second = o.store.add_user(o.org, role, None).await;
        let expected = first.min(second);
        let resolver = ApproverResolver::new(o.store.clone());

        for _ in 0..3 {
            let approver = resolver
                .resolve(&Step::new(1, kind), o.employee, o.org)
                .await
                .unwrap();
            assert_eq!(approver, expected);
        }
    }

    #[rstest]
    #[case(ApproverKind::Finance, UserRole::Finance)]
    #[case(ApproverKind::Director, UserRole::Director)]
    #[tokio::test]
    async fn test_role_step_without_member_fails(
        #[case] kind: ApproverKind,
        #[case] role: UserRole,
    ) {
        let o = org().await;
        let resolver = ApproverResolver::new(o.store.clone());

        let err = resolver
            .resolve(&Step::new(1, kind), o.employee, o.org)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RoutingError::ApproverResolutionFailed {
                reason: ResolutionFailure::NoUserWithRole { role: r },
                ..
            } if r == role
        ));
    }

    #[tokio::test]
    async fn test_role_lookup_is_scoped_to_organization() {
        let o = org().await;
        let other_org = OrganizationId::new();
        o.store.add_user(other_org, UserRole::Finance, None).await;
        let resolver = ApproverResolver::new(o.store.clone());

        let err = resolver
            .resolve(&Step::new(1, ApproverKind::Finance), o.employee, o.org)
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_specific_user_step_returns_bound_user() {
        let o = org().await;
        let bound = UserId::new();
        let resolver = ApproverResolver::new(o.store.clone());
        let step = Step::new(1, ApproverKind::SpecificUser { user_id: bound });

        assert_eq!(
            resolver.resolve(&step, o.employee, o.org).await.unwrap(),
            bound
        );
    }
}
