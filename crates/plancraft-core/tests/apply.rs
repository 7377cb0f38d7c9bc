//! Apply builds over pending plans and existing working dirs

use std::sync::Arc;

use plancraft_config::{ApplyRequirement, UserConfig};
use plancraft_core::{
    BuildError, CommandName, CommentCommand, ProjectCommandBuilder, ProjectContext, PullStatus,
    WorkspaceLockCoordinator,
};
use plancraft_discovery::DiscoveryError;
use plancraft_test_utils::{builder, context, global_config, DirStructure, FakeVcs, FakeWorkingDir};
use pretty_assertions::assert_eq;

fn summary(contexts: &[ProjectContext]) -> Vec<(&str, &str, &str)> {
    contexts
        .iter()
        .map(|c| {
            (
                c.workspace.as_str(),
                c.repo_rel_dir.as_str(),
                c.project_name.as_str(),
            )
        })
        .collect()
}

async fn apply(
    pull_dir: &DirStructure,
    global_allow_all: bool,
    cmd: CommentCommand,
) -> Result<Vec<ProjectContext>, BuildError> {
    let (builder, _, working_dir) = builder(
        FakeVcs::new::<&str>(&[]),
        FakeWorkingDir::new(pull_dir.join("default")).with_pull_dir(pull_dir.path()),
        global_config(global_allow_all, false),
        UserConfig::default(),
    );
    let contexts = builder.build_apply_commands(&context(), &cmd).await?;
    assert_eq!(working_dir.clones(), 0);
    Ok(contexts)
}

#[tokio::test]
async fn apply_all_orders_by_workspace_then_dir() {
    let pull_dir = DirStructure::new()
        .with_file("staging/dir2/staging.tfplan", "")
        .with_file("default/dir2/default.tfplan", "")
        .with_file("staging/dir1/staging.tfplan", "")
        .with_file("default/dir1/default.tfplan", "");

    let contexts = apply(&pull_dir, false, CommentCommand::apply()).await.unwrap();
    assert_eq!(
        summary(&contexts),
        [
            ("default", "dir1", ""),
            ("default", "dir2", ""),
            ("staging", "dir1", ""),
            ("staging", "dir2", ""),
        ]
    );
    for c in &contexts {
        assert_eq!(c.command_name, CommandName::Apply);
        assert_eq!(c.steps.iter().map(|s| s.name()).collect::<Vec<_>>(), ["apply"]);
    }
}

#[tokio::test]
async fn plan_file_names_carry_project_names() {
    let config = "version: 3\nprojects:\n- name: infra/app\n  dir: app\n- name: db\n  dir: db\n";
    let pull_dir = DirStructure::new()
        .with_file("default/plancraft.yaml", config)
        .with_file("default/app/infra::app-default.tfplan", "")
        .with_file("default/db/db-default.tfplan", "");

    let contexts = apply(&pull_dir, false, CommentCommand::apply()).await.unwrap();
    assert_eq!(
        summary(&contexts),
        [("default", "app", "infra/app"), ("default", "db", "db")]
    );
    assert_eq!(contexts[0].plan_file_name(), "infra::app-default.tfplan");
    assert_eq!(contexts[0].repo_config_version, 3);
}

#[tokio::test]
async fn no_pull_dir_means_nothing_to_apply() {
    let (builder, _, _) = builder(
        FakeVcs::new::<&str>(&[]),
        FakeWorkingDir::new("/nonexistent"),
        global_config(false, false),
        UserConfig::default(),
    );
    let contexts = builder
        .build_apply_commands(&context(), &CommentCommand::apply())
        .await
        .unwrap();
    assert!(contexts.is_empty());
}

#[tokio::test]
async fn apply_one_dir_uses_the_existing_working_dir() {
    let pull_dir = DirStructure::new()
        .with_file("default/dir1/default.tfplan", "")
        .with_file("default/dir2/default.tfplan", "");

    let contexts = apply(&pull_dir, false, CommentCommand::apply().with_dir("dir2"))
        .await
        .unwrap();
    assert_eq!(summary(&contexts), [("default", "dir2", "")]);
}

#[tokio::test]
async fn apply_in_unplanned_workspace_asks_for_a_plan() {
    let pull_dir = DirStructure::new().with_file("default/dir1/default.tfplan", "");
    let err = apply(
        &pull_dir,
        false,
        CommentCommand::apply().with_dir("dir1").with_workspace("staging"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, BuildError::NoWorkingDir { .. }));
    assert!(err.is_user_error());
}

#[tokio::test]
async fn apply_only_accepts_declared_workspaces() {
    let pull_dir = DirStructure::new()
        .with_file(
            "other/plancraft.yaml",
            "version: 3\nprojects:\n- dir: dir1\n  workspace: a\n",
        )
        .with_file("other/dir1/other.tfplan", "");

    let err = apply(
        &pull_dir,
        false,
        CommentCommand::apply().with_dir("dir1").with_workspace("other"),
    )
    .await
    .unwrap_err();
    match &err {
        BuildError::Discovery(DiscoveryError::WorkspaceNotAllowed { workspace, allowed }) => {
            assert_eq!(workspace, "other");
            assert_eq!(allowed, &["a"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.to_string(),
        "running commands in workspace \"other\" is not allowed because this directory is only configured for the following workspaces: a"
    );
}

#[tokio::test]
async fn apply_all_waits_for_the_workspace_checkout() {
    let pull_dir = DirStructure::new().with_file("default/dir1/default.tfplan", "");
    let locker = WorkspaceLockCoordinator::new();
    let builder = ProjectCommandBuilder::new(
        Arc::new(FakeVcs::new::<&str>(&[])),
        Arc::new(FakeWorkingDir::new(pull_dir.join("default")).with_pull_dir(pull_dir.path())),
        locker.clone(),
        Arc::new(global_config(false, false)),
        UserConfig::default(),
    )
    .unwrap();
    let ctx = context();

    // Held by a plan that is re-cloning the default checkout.
    let guard = locker.try_lock("owner/repo", 1, "default", ".").unwrap();
    let err = builder
        .build_apply_commands(&ctx, &CommentCommand::apply())
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::WorkspaceLocked { .. }));
    assert!(err.is_retryable());

    drop(guard);
    let contexts = builder
        .build_apply_commands(&ctx, &CommentCommand::apply())
        .await
        .unwrap();
    assert_eq!(summary(&contexts), [("default", "dir1", "")]);
    assert_eq!(locker.held(), 0);
}

#[tokio::test]
async fn apply_requirements_follow_policy() {
    let config = "version: 3\nprojects:\n- dir: dir1\n  apply_requirements: [approved, mergeable]\n";
    let pull_dir = DirStructure::new()
        .with_file("default/plancraft.yaml", config)
        .with_file("default/dir1/default.tfplan", "");

    let contexts = apply(&pull_dir, true, CommentCommand::apply()).await.unwrap();
    assert_eq!(
        contexts[0].apply_requirements,
        [ApplyRequirement::Approved, ApplyRequirement::Mergeable]
    );

    let err = apply(&pull_dir, false, CommentCommand::apply()).await.unwrap_err();
    assert!(err.to_string().contains("apply_requirements"), "{err}");
}

#[tokio::test]
async fn contexts_carry_the_pull_request() {
    let pull_dir = DirStructure::new().with_file("default/dir1/default.tfplan", "");
    let (builder, _, _) = builder(
        FakeVcs::new::<&str>(&[]),
        FakeWorkingDir::new(pull_dir.join("default")).with_pull_dir(pull_dir.path()),
        global_config(false, false),
        UserConfig::default(),
    );
    let ctx = context().with_pull_status(PullStatus {
        approved: true,
        mergeable: false,
    });
    let contexts = builder
        .build_apply_commands(&ctx, &CommentCommand::apply())
        .await
        .unwrap();

    let c = &contexts[0];
    assert!(c.pull_status.approved);
    assert_eq!(c.pull.num, 1);
    assert_eq!(c.base_repo.full_name, "owner/repo");
    assert_eq!(c.head_repo, c.base_repo);
    assert_eq!(c.user.username, "user");

    let json = serde_json::to_value(c).unwrap();
    assert_eq!(json["command_name"], "apply");
    assert_eq!(json["repo_rel_dir"], "dir1");
    assert!(json.get("log").is_none());
}
