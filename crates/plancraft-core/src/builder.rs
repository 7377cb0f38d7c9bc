//! Project command builder
//!
//! Turns a pull request and a command into ordered [`ProjectContext`]s.
//!
//! # Operations
//!
//! - **Autoplan**: every project the changed files affect, excluding those
//!   with autoplan disabled
//! - **Plan**: all affected projects (a plan-all comment), or the project a
//!   dir, workspace or name selects
//! - **Apply** / **Version**: every pending plan in the pull dir, or the
//!   project selected in an existing checkout
//!
//! Each plan context is followed by a policy-check context when policy
//! checks are enabled for the project.

use std::path::PathBuf;
use std::sync::Arc;

use plancraft_config::{
    GlobalConfig, GlobalPolicyResolver, MergedProjectConfig, RepoConfig, RepoConfigResolver,
    ResolvedSettings, Step, ToolVersion, UserConfig, DEFAULT_REPO_REL_DIR, DEFAULT_WORKSPACE,
};
use plancraft_discovery::{
    check_changes_in_projects, check_dir_in_changes, projects_named, request_dir,
    select_projects, Candidate, ChangeSet, DiscoveryOptions, PendingPlanFinder, ProjectFinder,
    ProjectRequest, VersionDetector,
};
use tracing::{debug, info, info_span, instrument};

use crate::collaborators::{VcsClient, WorkingDir};
use crate::command::{CommandContext, CommandName, CommentCommand};
use crate::context::{escape_args, MetricsScope, ProjectContext};
use crate::error::{BuildError, Result};
use crate::locker::{WorkspaceLock, WorkspaceLockCoordinator};

/// A checkout with its config loaded, shared by every project of a build
struct Checkout<'a> {
    ctx: &'a CommandContext,
    cmd: &'a CommentCommand,
    repo_id: String,
    config_file: String,
    repo_dir: PathBuf,
    repo_cfg: Option<RepoConfig>,
}

/// Builds command contexts for pull requests
///
/// Holds the collaborators, the operator's policy and defaults, and the
/// shared lock table. Builds are independent; one builder serves any number
/// of concurrent calls.
#[derive(Debug)]
pub struct ProjectCommandBuilder<V, W> {
    vcs: Arc<V>,
    working_dir: Arc<W>,
    locker: WorkspaceLockCoordinator,
    global: Arc<GlobalConfig>,
    user: UserConfig,
    finder: ProjectFinder,
    pending: PendingPlanFinder,
    versions: VersionDetector,
    scope: MetricsScope,
}

impl<V: VcsClient, W: WorkingDir> ProjectCommandBuilder<V, W> {
    /// Create a builder
    ///
    /// # Errors
    ///
    /// [`BuildError::Discovery`] when the autoplan file list holds an
    /// invalid pattern.
    pub fn new(
        vcs: Arc<V>,
        working_dir: Arc<W>,
        locker: WorkspaceLockCoordinator,
        global: Arc<GlobalConfig>,
        user: UserConfig,
    ) -> Result<Self> {
        let finder = ProjectFinder::new(&user.autoplan_file_list)?;
        Ok(Self {
            vcs,
            working_dir,
            locker,
            global,
            user,
            finder,
            pending: PendingPlanFinder::new(),
            versions: VersionDetector::new(),
            scope: MetricsScope::default(),
        })
    }

    /// Record metrics under `scope` instead of the default prefix
    #[inline]
    #[must_use]
    pub fn with_scope(mut self, scope: MetricsScope) -> Self {
        self.scope = scope;
        self
    }

    /// Operator defaults in use
    #[inline]
    #[must_use]
    pub fn user_config(&self) -> &UserConfig {
        &self.user
    }

    /// Plan contexts for every project the pull request affects and that
    /// has autoplan enabled
    ///
    /// # Errors
    ///
    /// Any [`BuildError`]; nothing is returned on failure.
    #[instrument(
        level = "info",
        skip_all,
        err,
        fields(repo = %ctx.pull.base_repo.full_name, pull = ctx.pull.num)
    )]
    pub async fn build_autoplan_commands(
        &self,
        ctx: &CommandContext,
    ) -> Result<Vec<ProjectContext>> {
        let cmd = CommentCommand::plan();
        let contexts = self.build_all_commands_by_cfg(ctx, &cmd).await?;

        let (enabled, disabled): (Vec<_>, Vec<_>) =
            contexts.into_iter().partition(|c| c.autoplan_enabled);
        for c in disabled.iter().filter(|c| c.command_name == CommandName::Plan) {
            debug!("ignoring project {} because autoplan is disabled", c.display_name());
        }
        self.scope.increment("autoplan.builds");
        Ok(enabled)
    }

    /// Plan contexts for a comment: every affected project when the comment
    /// names no dir or project, otherwise the selected project(s)
    ///
    /// # Errors
    ///
    /// Any [`BuildError`]; a named project that is not configured is an
    /// error unless `silence_no_projects` is set.
    #[instrument(
        level = "info",
        skip_all,
        err,
        fields(repo = %ctx.pull.base_repo.full_name, pull = ctx.pull.num)
    )]
    pub async fn build_plan_commands(
        &self,
        ctx: &CommandContext,
        cmd: &CommentCommand,
    ) -> Result<Vec<ProjectContext>> {
        self.scope.increment("plan.builds");
        if !cmd.is_for_specific_project() {
            return self.build_all_commands_by_cfg(ctx, cmd).await;
        }
        self.build_project_plan_command(ctx, cmd).await
    }

    /// Apply contexts: every pending plan, or the selected project(s)
    ///
    /// # Errors
    ///
    /// Any [`BuildError`]; [`BuildError::NoWorkingDir`] when the selected
    /// workspace was never planned.
    #[instrument(
        level = "info",
        skip_all,
        err,
        fields(repo = %ctx.pull.base_repo.full_name, pull = ctx.pull.num)
    )]
    pub async fn build_apply_commands(
        &self,
        ctx: &CommandContext,
        cmd: &CommentCommand,
    ) -> Result<Vec<ProjectContext>> {
        self.scope.increment("apply.builds");
        if !cmd.is_for_specific_project() {
            return self
                .build_all_commands_by_plan(ctx, CommandName::Apply, cmd)
                .await;
        }
        self.build_project_command_in_working_dir(ctx, CommandName::Apply, cmd)
            .await
    }

    /// Version contexts, selected the same way as for apply
    ///
    /// # Errors
    ///
    /// See [`ProjectCommandBuilder::build_apply_commands`].
    #[instrument(
        level = "info",
        skip_all,
        err,
        fields(repo = %ctx.pull.base_repo.full_name, pull = ctx.pull.num)
    )]
    pub async fn build_version_commands(
        &self,
        ctx: &CommandContext,
        cmd: &CommentCommand,
    ) -> Result<Vec<ProjectContext>> {
        self.scope.increment("version.builds");
        if !cmd.is_for_specific_project() {
            return self
                .build_all_commands_by_plan(ctx, CommandName::Version, cmd)
                .await;
        }
        self.build_project_command_in_working_dir(ctx, CommandName::Version, cmd)
            .await
    }

    /// Plan contexts for every project the changed files affect
    async fn build_all_commands_by_cfg(
        &self,
        ctx: &CommandContext,
        cmd: &CommentCommand,
    ) -> Result<Vec<ProjectContext>> {
        let base_repo = ctx.base_repo();
        let config_file = self.global.repo_config_file(&base_repo.id());
        let resolver = RepoConfigResolver::new(config_file);

        let modified = self
            .vcs
            .get_modified_files(base_repo, &ctx.pull)
            .await
            .map_err(|e| BuildError::collaborator("getting modified files", e))?;
        info!("{} files were modified in this pull request", modified.len());

        if self.should_skip_clone(ctx, &resolver, &modified).await? {
            info!("skipping repo clone since no project was modified");
            self.scope.increment("clone_skipped");
            return Ok(Vec::new());
        }

        let _lock = self.lock(ctx, DEFAULT_WORKSPACE)?;
        let repo_dir = self
            .working_dir
            .clone_repo(&ctx.head_repo, &ctx.pull, DEFAULT_WORKSPACE)
            .await
            .map_err(|e| BuildError::collaborator("cloning repo", e))?;
        let changes =
            ChangeSet::new(&modified).with_untracked(self.untracked_files(ctx, DEFAULT_WORKSPACE).await?);

        let checkout = self.load_checkout(ctx, cmd, repo_dir)?;
        let policy = GlobalPolicyResolver::new(&self.global);
        let settings = policy.merge(&checkout.repo_id, checkout.repo_cfg.as_ref(), &self.user)?;

        let candidates = self.finder.discover(
            &changes,
            checkout.repo_cfg.as_ref(),
            &checkout.repo_dir,
            DiscoveryOptions {
                respect_autoplan_enabled: false,
                default_autodiscover: self.user.autodiscover_mode,
            },
        )?;
        info!(
            "{} projects are to be planned based on their when_modified config",
            candidates.len()
        );

        let mut contexts = Vec::new();
        for candidate in candidates {
            let merged = self.merge_candidate(&policy, &checkout, candidate)?;
            contexts.extend(self.build_contexts(&checkout, &settings, CommandName::Plan, &merged));
        }
        Ok(contexts)
    }

    /// Whether the config fetched without a clone shows that nothing needs
    /// planning
    async fn should_skip_clone(
        &self,
        ctx: &CommandContext,
        resolver: &RepoConfigResolver,
        modified: &[String],
    ) -> Result<bool> {
        if !self.user.skip_clone_no_changes
            || !self.vcs.supports_single_file_download(ctx.base_repo())
        {
            return Ok(false);
        }

        let Some(data) = self
            .vcs
            .get_file_content(&ctx.pull, resolver.file_name())
            .await
            .map_err(|e| BuildError::collaborator("downloading repo config", e))?
        else {
            debug!("no {} to download; cloning", resolver.file_name());
            return Ok(false);
        };
        let repo_cfg = resolver
            .parse(&data)
            .map_err(|e| BuildError::config(resolver.file_name(), e))?;

        if repo_cfg.autodiscover_enabled(self.user.autodiscover_mode) {
            debug!("autodiscover is enabled; cloning");
            return Ok(false);
        }
        if self.user.include_git_untracked_files {
            debug!("untracked files are included; cloning");
            return Ok(false);
        }

        let changes = ChangeSet::new(modified);
        let matching = self
            .finder
            .determine_projects_via_config(&changes, &repo_cfg, None, false)?;
        debug!("{} projects matched without cloning", matching.len());
        Ok(matching.is_empty())
    }

    /// Plan contexts for a comment naming a dir or project
    async fn build_project_plan_command(
        &self,
        ctx: &CommandContext,
        cmd: &CommentCommand,
    ) -> Result<Vec<ProjectContext>> {
        let workspace = cmd.workspace.as_deref().unwrap_or(DEFAULT_WORKSPACE);
        let dir = request_dir(cmd.repo_rel_dir.as_deref())?;

        let _lock = self.lock(ctx, workspace)?;
        let repo_dir = self
            .working_dir
            .clone_repo(&ctx.head_repo, &ctx.pull, workspace)
            .await
            .map_err(|e| BuildError::collaborator("cloning repo", e))?;
        let checkout = self.load_checkout(ctx, cmd, repo_dir)?;

        if self.user.restrict_file_list {
            let modified = self
                .vcs
                .get_modified_files(ctx.base_repo(), &ctx.pull)
                .await
                .map_err(|e| BuildError::collaborator("getting modified files", e))?;
            let changes =
                ChangeSet::new(&modified).with_untracked(self.untracked_files(ctx, workspace).await?);

            if cmd.repo_rel_dir.is_some() {
                check_dir_in_changes(&changes, &dir)?;
            }
            if let (Some(name), Some(repo_cfg)) =
                (cmd.project_name.as_deref(), checkout.repo_cfg.as_ref())
            {
                let projects = projects_named(repo_cfg, name, self.user.enable_regexp_cmd)?;
                if !projects.is_empty() {
                    check_changes_in_projects(&changes, &projects)?;
                }
            }
        }

        self.select_and_build(
            &checkout,
            CommandName::Plan,
            &dir,
            workspace,
            cmd.project_name.as_deref(),
        )
    }

    /// Apply or version contexts for a comment naming a dir or project,
    /// using the checkout a previous plan left behind
    async fn build_project_command_in_working_dir(
        &self,
        ctx: &CommandContext,
        command_name: CommandName,
        cmd: &CommentCommand,
    ) -> Result<Vec<ProjectContext>> {
        let workspace = cmd.workspace.as_deref().unwrap_or(DEFAULT_WORKSPACE);
        let dir = request_dir(cmd.repo_rel_dir.as_deref())?;

        let _lock = self.lock(ctx, workspace)?;
        let repo_dir = match self
            .working_dir
            .get_working_dir(ctx.base_repo(), &ctx.pull, workspace)
            .await
        {
            Ok(dir) => dir,
            Err(e) if e.is_not_found() => {
                return Err(BuildError::NoWorkingDir {
                    workspace: workspace.to_string(),
                })
            }
            Err(e) => return Err(BuildError::collaborator("getting working dir", e)),
        };
        let checkout = self.load_checkout(ctx, cmd, repo_dir)?;

        self.select_and_build(
            &checkout,
            command_name,
            &dir,
            workspace,
            cmd.project_name.as_deref(),
        )
    }

    /// Apply or version contexts for every pending plan of the pull request
    async fn build_all_commands_by_plan(
        &self,
        ctx: &CommandContext,
        command_name: CommandName,
        cmd: &CommentCommand,
    ) -> Result<Vec<ProjectContext>> {
        let pull_dir = match self.working_dir.get_pull_dir(ctx.base_repo(), &ctx.pull).await {
            Ok(dir) => dir,
            Err(e) if e.is_not_found() => {
                info!("no pull dir exists: there is nothing to {}", command_name);
                return Ok(Vec::new());
            }
            Err(e) => return Err(BuildError::collaborator("getting pull dir", e)),
        };

        let plans = self.pending.find(&pull_dir)?;
        info!("{} plans are pending", plans.len());

        let mut contexts = Vec::new();
        for plan in plans {
            let _lock = self.lock(ctx, &plan.workspace)?;
            let checkout = self.load_checkout(ctx, cmd, plan.repo_dir.clone())?;
            contexts.extend(self.select_and_build(
                &checkout,
                command_name,
                &plan.repo_rel_dir,
                &plan.workspace,
                plan.project_name.as_deref(),
            )?);
        }
        Ok(contexts)
    }

    /// Resolve a request against a checkout and build its contexts
    fn select_and_build(
        &self,
        checkout: &Checkout<'_>,
        command_name: CommandName,
        dir: &str,
        workspace: &str,
        project_name: Option<&str>,
    ) -> Result<Vec<ProjectContext>> {
        let policy = GlobalPolicyResolver::new(&self.global);
        let settings = policy.merge(&checkout.repo_id, checkout.repo_cfg.as_ref(), &self.user)?;

        let request = ProjectRequest {
            dir,
            workspace,
            project_name,
        };
        let candidates = match select_projects(
            checkout.repo_cfg.as_ref(),
            &checkout.config_file,
            &request,
            self.user.enable_regexp_cmd,
        ) {
            Ok(candidates) => candidates,
            Err(e) if e.is_not_configured() && self.user.silence_no_projects => {
                info!("silencing: {}", e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut contexts = Vec::new();
        for candidate in candidates {
            let merged = self.merge_candidate(&policy, checkout, candidate)?;
            contexts.extend(self.build_contexts(checkout, &settings, command_name, &merged));
        }
        Ok(contexts)
    }

    fn merge_candidate(
        &self,
        policy: &GlobalPolicyResolver<'_>,
        checkout: &Checkout<'_>,
        candidate: Candidate,
    ) -> Result<MergedProjectConfig> {
        let repo_cfg = checkout.repo_cfg.as_ref();
        let merged = match (candidate, repo_cfg) {
            (Candidate::Configured(project), Some(repo)) => {
                policy.merge_project(&checkout.repo_id, &project, repo)?
            }
            (Candidate::Configured(project), None) => policy.default_project(
                &checkout.repo_id,
                None,
                &project.dir,
                &project.workspace,
            )?,
            (Candidate::Unconfigured { dir, workspace }, _) => {
                policy.default_project(&checkout.repo_id, repo_cfg, &dir, &workspace)?
            }
        };
        Ok(merged)
    }

    /// The command's context, plus a policy-check context after a plan when
    /// policy checks are enabled
    fn build_contexts(
        &self,
        checkout: &Checkout<'_>,
        settings: &ResolvedSettings,
        command_name: CommandName,
        merged: &MergedProjectConfig,
    ) -> Vec<ProjectContext> {
        let abs_dir = checkout.repo_dir.join(&merged.repo_rel_dir);
        let version = self
            .versions
            .detect(merged.terraform_version.as_ref(), &abs_dir);

        let steps = match command_name {
            CommandName::Plan => merged.workflow.plan.steps.clone(),
            CommandName::Apply => merged.workflow.apply.steps.clone(),
            CommandName::PolicyCheck => merged.workflow.policy_check.steps.clone(),
            CommandName::Version => vec![Step::builtin("version")],
        };

        let mut contexts = vec![self.project_context(
            checkout,
            settings,
            command_name,
            merged,
            version.clone(),
            steps,
        )];
        if command_name == CommandName::Plan && merged.policy_check {
            contexts.push(self.project_context(
                checkout,
                settings,
                CommandName::PolicyCheck,
                merged,
                version,
                merged.workflow.policy_check.steps.clone(),
            ));
        }
        contexts
    }

    fn project_context(
        &self,
        checkout: &Checkout<'_>,
        settings: &ResolvedSettings,
        command_name: CommandName,
        merged: &MergedProjectConfig,
        terraform_version: Option<ToolVersion>,
        steps: Vec<Step>,
    ) -> ProjectContext {
        let ctx = checkout.ctx;
        let project_name = merged.name.clone().unwrap_or_default();

        let log = info_span!(
            "project",
            command = %command_name,
            dir = %merged.repo_rel_dir,
            workspace = %merged.workspace,
            project = %project_name,
        );
        let scope = self
            .scope
            .sub_scope("project")
            .tagged("command", command_name.to_string())
            .tagged("repo", ctx.base_repo().full_name.clone());
        scope.increment("contexts_built");

        ProjectContext {
            command_name,
            project_name,
            repo_rel_dir: merged.repo_rel_dir.clone(),
            workspace: merged.workspace.clone(),
            escaped_comment_args: escape_args(&checkout.cmd.flags),
            apply_requirements: merged.apply_requirements.clone(),
            automerge_enabled: settings.automerge,
            parallel_plan_enabled: settings.parallel_plan,
            parallel_apply_enabled: settings.parallel_apply,
            autoplan_enabled: merged.autoplan_enabled,
            terraform_version,
            workflow_name: merged.workflow.name.clone(),
            steps,
            policy_checks_enabled: merged.policy_check,
            repo_config_version: merged.repo_config_version,
            verbose: checkout.cmd.verbose,
            base_repo: ctx.base_repo().clone(),
            head_repo: ctx.head_repo.clone(),
            pull: ctx.pull.clone(),
            user: ctx.user.clone(),
            pull_status: ctx.pull_status,
            log,
            scope,
        }
    }

    fn load_checkout<'a>(
        &self,
        ctx: &'a CommandContext,
        cmd: &'a CommentCommand,
        repo_dir: PathBuf,
    ) -> Result<Checkout<'a>> {
        let repo_id = ctx.base_repo().id();
        let resolver = RepoConfigResolver::new(self.global.repo_config_file(&repo_id));
        let repo_cfg = resolver
            .resolve(&repo_dir)
            .map_err(|e| BuildError::config(resolver.file_name(), e))?;
        Ok(Checkout {
            ctx,
            cmd,
            repo_id,
            config_file: resolver.file_name().to_string(),
            repo_dir,
            repo_cfg,
        })
    }

    async fn untracked_files(&self, ctx: &CommandContext, workspace: &str) -> Result<Vec<String>> {
        if !self.user.include_git_untracked_files {
            return Ok(Vec::new());
        }
        let untracked = self
            .working_dir
            .get_git_untracked_files(ctx.base_repo(), &ctx.pull, workspace)
            .await
            .map_err(|e| BuildError::collaborator("listing untracked files", e))?;
        info!("{} untracked files are included", untracked.len());
        Ok(untracked)
    }

    /// Lock a workspace's whole checkout; every build that reads or clones
    /// it takes the same key
    fn lock(&self, ctx: &CommandContext, workspace: &str) -> Result<WorkspaceLock> {
        self.locker
            .try_lock(
                &ctx.base_repo().full_name,
                ctx.pull.num,
                workspace,
                DEFAULT_REPO_REL_DIR,
            )
            .ok_or_else(|| BuildError::WorkspaceLocked {
                workspace: workspace.to_string(),
                path: DEFAULT_REPO_REL_DIR.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockVcsClient, MockWorkingDir};
    use crate::models::{PullRequest, Repo, User};
    use plancraft_config::GlobalConfigArgs;

    fn ctx() -> CommandContext {
        CommandContext::new(
            PullRequest {
                num: 1,
                base_repo: Repo::new("owner/repo", "github.com"),
                ..PullRequest::default()
            },
            User::new("user"),
        )
    }

    fn builder(
        vcs: MockVcsClient,
        working_dir: MockWorkingDir,
        user: UserConfig,
    ) -> ProjectCommandBuilder<MockVcsClient, MockWorkingDir> {
        ProjectCommandBuilder::new(
            Arc::new(vcs),
            Arc::new(working_dir),
            WorkspaceLockCoordinator::new(),
            Arc::new(GlobalConfig::from_args(GlobalConfigArgs::default())),
            user,
        )
        .unwrap()
    }

    fn vcs_with(modified: &'static [&'static str], config: Option<&'static str>) -> MockVcsClient {
        let mut vcs = MockVcsClient::new();
        vcs.expect_get_modified_files()
            .returning(move |_, _| Ok(modified.iter().map(|s| (*s).to_string()).collect()));
        vcs.expect_supports_single_file_download().return_const(true);
        vcs.expect_get_file_content()
            .returning(move |_, _| Ok(config.map(|c| c.as_bytes().to_vec())));
        vcs
    }

    #[tokio::test]
    async fn skips_clone_when_config_matches_nothing() {
        let vcs = vcs_with(&["dir2/main.tf"], Some("version: 3\nprojects:\n- dir: dir1\n"));
        let mut working_dir = MockWorkingDir::new();
        working_dir.expect_clone_repo().never();

        let user = UserConfig::default().with_skip_clone_no_changes(true);
        let contexts = builder(vcs, working_dir, user)
            .build_autoplan_commands(&ctx())
            .await
            .unwrap();
        assert!(contexts.is_empty());
    }

    #[tokio::test]
    async fn clones_once_when_autodiscover_applies() {
        let checkout = tempfile::tempdir().unwrap();
        let root = checkout.path().to_path_buf();
        std::fs::write(root.join("plancraft.yaml"), "version: 3\nparallel_plan: true\n").unwrap();

        let vcs = vcs_with(&["README.md"], Some("version: 3\nparallel_plan: true\n"));
        let mut working_dir = MockWorkingDir::new();
        working_dir
            .expect_clone_repo()
            .times(1)
            .returning(move |_, _, _| Ok(root.clone()));

        let user = UserConfig::default().with_skip_clone_no_changes(true);
        let contexts = builder(vcs, working_dir, user)
            .build_autoplan_commands(&ctx())
            .await
            .unwrap();
        assert!(contexts.is_empty());
    }

    #[tokio::test]
    async fn clones_when_untracked_files_are_included() {
        let checkout = tempfile::tempdir().unwrap();
        let root = checkout.path().to_path_buf();
        std::fs::write(
            root.join("plancraft.yaml"),
            "version: 3\nprojects:\n- dir: dir1\n",
        )
        .unwrap();

        let vcs = vcs_with(&["dir2/main.tf"], Some("version: 3\nprojects:\n- dir: dir1\n"));
        let mut working_dir = MockWorkingDir::new();
        working_dir
            .expect_clone_repo()
            .times(1)
            .returning(move |_, _, _| Ok(root.clone()));
        working_dir
            .expect_get_git_untracked_files()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let user = UserConfig::default()
            .with_skip_clone_no_changes(true)
            .with_untracked_files(true);
        builder(vcs, working_dir, user)
            .build_autoplan_commands(&ctx())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn held_lock_fails_the_build() {
        let vcs = vcs_with(&["main.tf"], None);
        let mut working_dir = MockWorkingDir::new();
        working_dir.expect_clone_repo().never();

        let builder = builder(vcs, working_dir, UserConfig::default());
        let _held = builder
            .locker
            .try_lock("owner/repo", 1, DEFAULT_WORKSPACE, DEFAULT_REPO_REL_DIR)
            .unwrap();
        let err = builder.build_autoplan_commands(&ctx()).await.unwrap_err();
        assert!(matches!(err, BuildError::WorkspaceLocked { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn collaborator_failures_abort() {
        let mut vcs = MockVcsClient::new();
        vcs.expect_get_modified_files()
            .returning(|_, _| Err(crate::CollaboratorError::remote("rate limited")));
        let builder = builder(vcs, MockWorkingDir::new(), UserConfig::default());
        let err = builder.build_autoplan_commands(&ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "getting modified files: remote error: rate limited");
        assert!(!err.is_user_error());
    }

    #[tokio::test]
    async fn apply_without_plan_asks_for_one() {
        let mut working_dir = MockWorkingDir::new();
        working_dir
            .expect_get_working_dir()
            .returning(|_, _, _| Err(crate::CollaboratorError::NotFound("staging".into())));
        let builder = builder(MockVcsClient::new(), working_dir, UserConfig::default());
        let cmd = CommentCommand::apply().with_dir(".").with_workspace("staging");
        let err = builder.build_apply_commands(&ctx(), &cmd).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "no working directory found for workspace \"staging\": did you run plan?"
        );
    }
}
