use std::sync::Arc;

use identity_core::ids::UserId;
use identity_core::policy::{
    Actor, GroupKind, InMemoryGroupDirectory, InMemoryPolicyStore, Policy, PolicyError, PolicyFlags, PolicyManager,
    Right,
};

fn manager() -> PolicyManager {
    PolicyManager::new(Arc::new(InMemoryPolicyStore::new()))
}

fn manager_with_groups() -> (PolicyManager, Arc<InMemoryGroupDirectory>) {
    let groups = Arc::new(InMemoryGroupDirectory::new());
    let mgr = PolicyManager::new(Arc::new(InMemoryPolicyStore::new())).with_group_directory(groups.clone());
    (mgr, groups)
}

#[tokio::test]
async fn create_inherit_and_extend_scenario() -> anyhow::Result<()> {
    let mgr = manager();
    let u1 = UserId::new();
    let u2 = UserId::new();
    let u3 = UserId::new();

    let a = mgr
        .create(Some("base".into()), u1, identity_core::ids::PolicyId::NIL, None, PolicyFlags::default())
        .await?;

    mgr.grant_user_access(a.id(), u1, u2, Right::VIEW | Right::CHANGE).await?;
    mgr.update(a.clone()).await?;

    let b = mgr
        .create(
            Some("inherits-base".into()),
            UserId::NIL,
            a.id(),
            None,
            PolicyFlags { inherit: true, extend: false, sealed: false },
        )
        .await?;
    assert!(mgr.user_has_access(b.id(), u2, Right::VIEW | Right::CHANGE).await?);
    assert!(!mgr.user_has_access(b.id(), u3, Right::VIEW).await?);

    let c = mgr
        .create(
            Some("extends-base".into()),
            UserId::NIL,
            a.id(),
            None,
            PolicyFlags { inherit: false, extend: true, sealed: false },
        )
        .await?;
    mgr.grant_user_access(c.id(), u1, u2, Right::MOVE).await?;
    mgr.update(c.clone()).await?;
    assert!(mgr.user_has_access(c.id(), u2, Right::VIEW | Right::CHANGE | Right::MOVE).await?);

    Ok(())
}

#[tokio::test]
async fn grantor_cannot_exceed_own_rights() -> anyhow::Result<()> {
    let mgr = manager();
    let u1 = UserId::new();
    let u2 = UserId::new();
    let u3 = UserId::new();

    let a = mgr
        .create(Some("excess".into()), u1, identity_core::ids::PolicyId::NIL, None, PolicyFlags::default())
        .await?;
    mgr.grant_user_access(a.id(), u1, u2, Right::VIEW | Right::CHANGE).await?;
    mgr.update(a.clone()).await?;

    let result = mgr.grant_user_access(a.id(), u2, u3, Right::CHANGE).await;
    assert_eq!(result, Err(PolicyError::ExcessOfRights));
    assert!(!mgr.user_has_access(a.id(), u3, Right::CHANGE).await?);

    Ok(())
}

#[tokio::test]
async fn group_lineage_fallback_scenario() -> anyhow::Result<()> {
    let (mgr, groups) = manager_with_groups();
    let g1 = identity_core::ids::GroupId::new();
    let g2 = identity_core::ids::GroupId::new();
    let g3 = identity_core::ids::GroupId::new();
    groups.define_group(g1, GroupKind::Group, None);
    groups.define_group(g2, GroupKind::Group, Some(g1));
    groups.define_group(g3, GroupKind::Group, Some(g2));

    let u = UserId::new();
    groups.add_membership(
        u,
        identity_core::policy::GroupRef { id: g3, kind: GroupKind::Group },
    );

    let owner = UserId::new();
    let p = mgr
        .create(Some("lineage".into()), owner, identity_core::ids::PolicyId::NIL, None, PolicyFlags::default())
        .await?;
    mgr.grant_group_access(p.id(), owner, g1, Right::CREATE | Right::VIEW).await?;
    mgr.update(p.clone()).await?;

    assert!(mgr.has_group_rights(p.id(), g3, Right::CREATE | Right::VIEW).await?);
    assert!(mgr.user_has_access(p.id(), u, Right::CREATE | Right::VIEW).await?);

    let p2 = mgr
        .create(Some("lineage2".into()), owner, identity_core::ids::PolicyId::NIL, None, PolicyFlags::default())
        .await?;
    mgr.grant_group_access(p2.id(), owner, g2, Right::VIEW).await?;
    mgr.update(p2.clone()).await?;

    assert!(!mgr.has_group_rights(p2.id(), g1, Right::VIEW).await?);
    assert!(mgr.has_group_rights(p2.id(), g2, Right::VIEW).await?);
    assert!(mgr.has_group_rights(p2.id(), g3, Right::VIEW).await?);

    Ok(())
}

#[tokio::test]
async fn nil_ids_fail_with_specific_zero_id_errors() -> anyhow::Result<()> {
    let mgr = manager();
    let owner = UserId::new();
    let p = mgr
        .create(Some("zero-ids".into()), owner, identity_core::ids::PolicyId::NIL, None, PolicyFlags::default())
        .await?;

    let result = mgr.grant_user_access(p.id(), UserId::NIL, UserId::new(), Right::VIEW).await;
    assert_eq!(result, Err(PolicyError::ZeroGrantorId));

    let result = mgr.grant_user_access(p.id(), owner, UserId::NIL, Right::VIEW).await;
    assert_eq!(result, Err(PolicyError::ZeroAssigneeId));

    Ok(())
}

#[test]
fn inherit_and_extend_together_is_rejected() {
    let p = Policy::new(
        Some("bad".into()),
        None,
        None,
        UserId::NIL,
        identity_core::ids::PolicyId::new(),
        PolicyFlags { inherit: true, extend: true, sealed: false },
    );
    assert_eq!(p.validate(), Err(PolicyError::ForbiddenChange));
}

#[tokio::test]
async fn grant_then_revoke_then_update_restores_prior_observable_state() -> anyhow::Result<()> {
    let mgr = manager();
    let owner = UserId::new();
    let u2 = UserId::new();

    let p = mgr
        .create(Some("round-trip".into()), owner, identity_core::ids::PolicyId::NIL, None, PolicyFlags::default())
        .await?;
    assert!(!mgr.user_has_access(p.id(), u2, Right::VIEW).await?);

    mgr.grant_user_access(p.id(), owner, u2, Right::VIEW).await?;
    mgr.update(p.clone()).await?;
    assert!(mgr.user_has_access(p.id(), u2, Right::VIEW).await?);

    mgr.revoke_access(p.id(), owner, Actor::User(u2)).await?;
    mgr.update(p.clone()).await?;
    assert!(!mgr.user_has_access(p.id(), u2, Right::VIEW).await?);

    Ok(())
}

#[test]
fn actor_kind_matches_its_variant() {
    let u = Actor::User(UserId::new());
    assert_eq!(u.kind(), identity_core::policy::ActorKind::User);
}
