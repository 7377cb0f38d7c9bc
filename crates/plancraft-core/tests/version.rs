//! Tool version detection and version builds

use plancraft_config::{ToolVersion, UserConfig};
use plancraft_core::{CommandName, CommentCommand, ProjectContext};
use plancraft_test_utils::{builder, context, global_config, DirStructure, FakeVcs, FakeWorkingDir};
use pretty_assertions::assert_eq;

const PINNED: &str = "terraform {\n  required_version = \"= 1.5.7\"\n}\n";
const RANGE: &str = "terraform {\n  required_version = \">= 1.3, < 2.0\"\n}\n";

fn versions(contexts: &[ProjectContext]) -> Vec<Option<String>> {
    contexts
        .iter()
        .map(|c| c.terraform_version.as_ref().map(ToString::to_string))
        .collect()
}

async fn autoplan(repo: &DirStructure, modified: &[&str]) -> Vec<ProjectContext> {
    let (builder, _, _) = builder(
        FakeVcs::new(modified),
        FakeWorkingDir::new(repo.path()),
        global_config(false, false),
        UserConfig::default(),
    );
    builder.build_autoplan_commands(&context()).await.unwrap()
}

#[tokio::test]
async fn pinned_constraint_is_detected() {
    let repo = DirStructure::new()
        .with_file("pinned/versions.tf", PINNED)
        .with_file("ranged/versions.tf", RANGE)
        .with_file("bare/main.tf", "");

    let contexts = autoplan(
        &repo,
        &["bare/main.tf", "pinned/versions.tf", "ranged/versions.tf"],
    )
    .await;
    assert_eq!(
        versions(&contexts),
        [None, Some("1.5.7".to_string()), None]
    );
}

#[tokio::test]
async fn project_version_beats_detected_one() {
    let repo = DirStructure::new()
        .with_file("main.tf", PINNED)
        .with_config("version: 3\nprojects:\n- dir: .\n  terraform_version: v0.12.6\n");

    let contexts = autoplan(&repo, &["main.tf"]).await;
    assert_eq!(versions(&contexts), [Some("0.12.6".to_string())]);
    assert_eq!(
        contexts[0].terraform_version,
        Some("0.12.6".parse::<ToolVersion>().unwrap())
    );
}

#[tokio::test]
async fn malformed_constraint_is_ignored() {
    let repo = DirStructure::new()
        .with_file("main.tf", "terraform {\n  required_version = \"= one.two\"\n}\n");
    let contexts = autoplan(&repo, &["main.tf"]).await;
    assert_eq!(versions(&contexts), [None]);
}

#[tokio::test]
async fn version_all_covers_pending_plans() {
    let pull_dir = DirStructure::new()
        .with_file("default/dir1/main.tf", PINNED)
        .with_file("default/dir1/default.tfplan", "")
        .with_file("default/dir2/default.tfplan", "");
    let (builder, _, _) = builder(
        FakeVcs::new::<&str>(&[]),
        FakeWorkingDir::new(pull_dir.join("default")).with_pull_dir(pull_dir.path()),
        global_config(false, false),
        UserConfig::default(),
    );

    let contexts = builder
        .build_version_commands(&context(), &CommentCommand::version())
        .await
        .unwrap();
    assert_eq!(contexts.len(), 2);
    for c in &contexts {
        assert_eq!(c.command_name, CommandName::Version);
        assert_eq!(c.steps.iter().map(|s| s.name()).collect::<Vec<_>>(), ["version"]);
    }
    assert_eq!(versions(&contexts), [Some("1.5.7".to_string()), None]);
}

#[tokio::test]
async fn version_for_one_project() {
    let pull_dir = DirStructure::new()
        .with_file("default/plancraft.yaml", "version: 3\nprojects:\n- name: app\n  dir: app\n")
        .with_file("default/app/main.tf", PINNED);
    let (builder, _, _) = builder(
        FakeVcs::new::<&str>(&[]),
        FakeWorkingDir::new(pull_dir.join("default")).with_pull_dir(pull_dir.path()),
        global_config(false, true),
        UserConfig::default(),
    );

    let contexts = builder
        .build_version_commands(&context(), &CommentCommand::version().with_project("app"))
        .await
        .unwrap();
    assert_eq!(contexts.len(), 1, "no policy check follows a version context");
    assert_eq!(contexts[0].project_name, "app");
    assert_eq!(versions(&contexts), [Some("1.5.7".to_string())]);
}
