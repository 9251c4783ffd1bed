mod common;

use std::sync::Arc;

use common::{ctx, user, Fixture, ScriptedAccess, Step, ORG};
use library_elements::accesscontrol::{OrgRole, ScopedAccessControl, SignedInUser};
use library_elements::context::CancellationToken;
use library_elements::folder::{Folder, FolderScopeResolver};
use library_elements::libraryelements::{
    filter_by_permission, LibraryElementError, LibraryElementSummary, LibraryPanelScopeResolver,
};

async fn candidates(fixture: &Fixture, names: &[&str]) -> Vec<LibraryElementSummary> {
    let mut out = Vec::new();
    for name in names {
        out.push(fixture.panel(ORG, Some("team-a"), name, "text").await.summary());
    }
    out
}

fn uids(elements: &[LibraryElementSummary]) -> Vec<&str> {
    elements.iter().map(|e| e.uid.as_str()).collect()
}

#[tokio::test]
async fn failed_evaluation_skips_only_that_element() {
    let fixture = Fixture::new();
    let input = candidates(&fixture, &["valid-1", "problematic", "valid-2"]).await;
    let access = ScriptedAccess::new([Step::Allow, Step::Fail, Step::Allow]);
    let ctx = ctx(user(OrgRole::Viewer), "r1");

    let out = filter_by_permission(&access, &ctx, input).await.unwrap();

    assert_eq!(uids(&out), vec!["valid-1", "valid-2"]);
    assert_eq!(access.calls(), 3);
}

#[tokio::test]
async fn empty_input_gives_empty_output() {
    let access = ScriptedAccess::default();
    let ctx = ctx(user(OrgRole::Viewer), "r1");

    let out = filter_by_permission::<LibraryElementSummary>(&access, &ctx, Vec::new())
        .await
        .unwrap();

    assert!(out.is_empty());
    assert_eq!(access.calls(), 0);
}

#[tokio::test]
async fn all_allowed_returns_input_unchanged() {
    let fixture = Fixture::new();
    let input = candidates(&fixture, &["c", "a", "b"]).await;
    let access = ScriptedAccess::default();
    let ctx = ctx(user(OrgRole::Viewer), "r1");

    let out = filter_by_permission(&access, &ctx, input.clone()).await.unwrap();
    assert_eq!(out, input);
}

#[tokio::test]
async fn all_failed_returns_empty_without_error() {
    let fixture = Fixture::new();
    let input = candidates(&fixture, &["a", "b", "c"]).await;
    let access = ScriptedAccess::new([Step::Fail, Step::Fail, Step::Fail]);
    let ctx = ctx(user(OrgRole::Viewer), "r1");

    let out = filter_by_permission(&access, &ctx, input).await.unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn denial_and_failure_exclude_the_same_way() {
    let fixture = Fixture::new();
    let input = candidates(&fixture, &["one", "two", "three", "four"]).await;
    let ctx = ctx(user(OrgRole::Viewer), "r1");

    let failing = ScriptedAccess::new([Step::Allow, Step::Allow, Step::Fail, Step::Allow]);
    let denying = ScriptedAccess::new([Step::Allow, Step::Allow, Step::Deny, Step::Allow]);

    let with_failure = filter_by_permission(&failing, &ctx, input.clone()).await.unwrap();
    let with_denial = filter_by_permission(&denying, &ctx, input.clone()).await.unwrap();

    assert_eq!(with_failure, with_denial);
    assert_eq!(with_failure.len(), input.len() - 1);
    assert_eq!(uids(&with_failure), vec!["one", "two", "four"]);
}

#[tokio::test]
async fn output_is_an_ordered_subsequence() {
    let fixture = Fixture::new();
    let input = candidates(&fixture, &["p1", "p2", "p3", "p4", "p5", "p6"]).await;
    let ctx = ctx(user(OrgRole::Viewer), "r1");
    let scripts = [
        vec![Step::Deny, Step::Allow, Step::Fail, Step::Allow, Step::Deny, Step::Allow],
        vec![Step::Fail, Step::Fail, Step::Allow, Step::Deny, Step::Allow, Step::Fail],
        vec![Step::Allow, Step::Deny, Step::Deny, Step::Deny, Step::Deny, Step::Allow],
    ];

    for script in scripts {
        let access = ScriptedAccess::new(script);
        let out = filter_by_permission(&access, &ctx, input.clone()).await.unwrap();
        assert!(out.len() <= input.len());

        let mut remaining = input.iter();
        for element in &out {
            assert!(remaining.any(|candidate| candidate == element), "{} out of order", element.uid);
        }
    }
}

#[tokio::test]
async fn cancellation_is_the_only_error() {
    let fixture = Fixture::new();
    let input = candidates(&fixture, &["a", "b"]).await;
    let token = CancellationToken::new();
    let ctx = ctx(user(OrgRole::Viewer), "r1").with_cancellation(token.clone());
    let access = ScriptedAccess::default();

    token.cancel();
    let err = filter_by_permission(&access, &ctx, input).await.unwrap_err();
    assert!(matches!(err, LibraryElementError::Cancelled));
    assert_eq!(access.calls(), 0);
}

#[tokio::test]
async fn element_in_vanished_folder_is_skipped() {
    let fixture = Fixture::with_folders(vec![Folder::new(ORG, "team-a", "Team A", None)]);
    let kept = fixture.panel(ORG, Some("team-a"), "kept", "text").await;
    let orphan = fixture.panel(ORG, Some("deleted-folder"), "orphan", "text").await;
    let general = fixture.panel(ORG, None, "in general", "graph").await;

    let access = ScopedAccessControl::new()
        .with_resolver(Arc::new(FolderScopeResolver::new(Arc::clone(&fixture.folders))))
        .with_resolver(Arc::new(LibraryPanelScopeResolver::new(
            fixture.store.clone(),
            Arc::clone(&fixture.folders),
        )));
    let ctx = ctx(user(OrgRole::Viewer), "r1");

    let out = filter_by_permission(&access, &ctx, vec![kept.clone(), orphan, general.clone()])
        .await
        .unwrap();

    assert_eq!(out, vec![kept, general]);
    assert_eq!(fixture.directory.calls(), 1);
}

#[tokio::test]
async fn folder_grant_covers_nested_elements() {
    let fixture = Fixture::new();
    let nested = fixture.panel(ORG, Some("team-a-sub"), "nested", "text").await;
    let sibling = fixture.panel(ORG, Some("team-b"), "sibling", "text").await;

    let reader = SignedInUser::without_permissions(ORG, 20, "user-20")
        .grant("folders:read", "folders:*")
        .grant("library.panels:read", "folders:uid:team-a");
    let ctx = ctx(reader, "r1");

    let out = fixture
        .service
        .filter_by_permission(&ctx, vec![nested.clone(), sibling])
        .await
        .unwrap();

    assert_eq!(out, vec![nested]);
}
