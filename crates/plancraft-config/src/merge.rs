//! Folding operator policy, repo config and user defaults together
//!
//! Keys governed by `allowed_overrides` come from the repo only when the
//! operator allows it. Ungoverned repo-level keys (automerge, parallel plan,
//! parallel apply) take the repo's explicit value, then the operator's
//! default, then `false`.

use tracing::debug;

use crate::error::PolicyError;
use crate::global::{AllowedOverride, EffectiveRepoRule, GlobalConfig, PolicyMode};
use crate::repo::{ApplyRequirement, ProjectConfig, RepoConfig};
use crate::user::UserConfig;
use crate::version::ToolVersion;
use crate::workflow::Workflow;

/// Repo-level settings shared by every project of a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedSettings {
    /// Merge the pull request after a successful apply of every project
    pub automerge: bool,
    /// Projects may be planned in parallel
    pub parallel_plan: bool,
    /// Projects may be applied in parallel
    pub parallel_apply: bool,
}

/// Everything a project is built with after merging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedProjectConfig {
    /// Project name, if configured
    pub name: Option<String>,
    /// Repo-relative directory
    pub repo_rel_dir: String,
    /// Workspace
    pub workspace: String,
    /// Autoplan enabled
    pub autoplan_enabled: bool,
    /// Apply requirements
    pub apply_requirements: Vec<ApplyRequirement>,
    /// Workflow
    pub workflow: Workflow,
    /// Pinned tool version
    pub terraform_version: Option<ToolVersion>,
    /// Whether a policy check follows a plan
    pub policy_check: bool,
    /// Schema version of the repo config; 0 without one
    pub repo_config_version: u32,
}

/// Applies a [`GlobalConfig`] to repo configs
#[derive(Debug, Clone, Copy)]
pub struct GlobalPolicyResolver<'a> {
    global: &'a GlobalConfig,
}

impl<'a> GlobalPolicyResolver<'a> {
    /// Resolver over `global`
    #[inline]
    #[must_use]
    pub fn new(global: &'a GlobalConfig) -> Self {
        Self { global }
    }

    /// Validate `repo` against the policy for `repo_id` and resolve the
    /// repo-level settings.
    ///
    /// # Errors
    ///
    /// In strict mode, [`PolicyError::OverrideNotAllowed`] and
    /// [`PolicyError::CustomWorkflowsNotAllowed`]; in both modes,
    /// [`PolicyError::UndefinedWorkflow`].
    pub fn merge(
        &self,
        repo_id: &str,
        repo: Option<&RepoConfig>,
        user: &UserConfig,
    ) -> Result<ResolvedSettings, PolicyError> {
        if let Some(repo) = repo {
            self.validate(repo_id, repo)?;
        }
        Ok(ResolvedSettings {
            automerge: repo
                .and_then(|r| r.automerge)
                .unwrap_or(user.enable_automerge),
            parallel_plan: repo
                .and_then(|r| r.parallel_plan)
                .unwrap_or(user.enable_parallel_plan),
            parallel_apply: repo
                .and_then(|r| r.parallel_apply)
                .unwrap_or(user.enable_parallel_apply),
        })
    }

    /// Check `repo` against the policy for `repo_id`
    ///
    /// # Errors
    ///
    /// See [`GlobalPolicyResolver::merge`].
    pub fn validate(&self, repo_id: &str, repo: &RepoConfig) -> Result<(), PolicyError> {
        let rule = self.global.rules_for(repo_id);
        let strict = self.global.mode == PolicyMode::Strict;

        if strict && !repo.workflows.is_empty() && !rule.allow_custom_workflows {
            return Err(PolicyError::CustomWorkflowsNotAllowed);
        }

        for project in &repo.projects {
            if strict {
                check_override(
                    &rule,
                    project,
                    AllowedOverride::ApplyRequirements,
                    project
                        .apply_requirements
                        .as_ref()
                        .is_some_and(|v| *v != rule.apply_requirements),
                )?;
                check_override(
                    &rule,
                    project,
                    AllowedOverride::Workflow,
                    project.workflow.as_ref().is_some_and(|w| *w != rule.workflow),
                )?;
                check_override(
                    &rule,
                    project,
                    AllowedOverride::PolicyCheck,
                    project.policy_check.is_some_and(|p| p != rule.policy_check),
                )?;
            }
            self.resolve_workflow(&rule, project, repo)?;
        }
        Ok(())
    }

    /// Merge one configured project
    ///
    /// # Errors
    ///
    /// [`PolicyError::UndefinedWorkflow`] when the selected workflow exists
    /// neither in the repo (when allowed) nor on the server.
    pub fn merge_project(
        &self,
        repo_id: &str,
        project: &ProjectConfig,
        repo: &RepoConfig,
    ) -> Result<MergedProjectConfig, PolicyError> {
        let rule = self.global.rules_for(repo_id);

        let apply_requirements = match &project.apply_requirements {
            Some(reqs) if rule.allows(AllowedOverride::ApplyRequirements) => reqs.clone(),
            Some(_) => {
                debug!(dir = %project.dir, "ignoring apply_requirements: override not allowed");
                rule.apply_requirements.clone()
            }
            None => rule.apply_requirements.clone(),
        };

        let policy_check = match project.policy_check {
            Some(enabled) if rule.allows(AllowedOverride::PolicyCheck) => enabled,
            _ => rule.policy_check,
        };

        Ok(MergedProjectConfig {
            name: project.name.clone(),
            repo_rel_dir: project.dir.clone(),
            workspace: project.workspace.clone(),
            autoplan_enabled: project.autoplan.enabled,
            apply_requirements,
            workflow: self.resolve_workflow(&rule, project, repo)?,
            terraform_version: project.terraform_version.clone(),
            policy_check,
            repo_config_version: repo.version,
        })
    }

    /// Merged settings for a directory without a configured project
    ///
    /// # Errors
    ///
    /// [`PolicyError::UndefinedWorkflow`] when the operator's workflow for
    /// this repo is missing.
    pub fn default_project(
        &self,
        repo_id: &str,
        repo: Option<&RepoConfig>,
        repo_rel_dir: &str,
        workspace: &str,
    ) -> Result<MergedProjectConfig, PolicyError> {
        let rule = self.global.rules_for(repo_id);
        let workflow = self
            .global
            .workflow(&rule.workflow)
            .cloned()
            .ok_or_else(|| PolicyError::UndefinedWorkflow(rule.workflow.clone()))?;

        Ok(MergedProjectConfig {
            name: None,
            repo_rel_dir: repo_rel_dir.to_string(),
            workspace: workspace.to_string(),
            autoplan_enabled: true,
            apply_requirements: rule.apply_requirements,
            workflow,
            terraform_version: None,
            policy_check: rule.policy_check,
            repo_config_version: repo.map_or(0, |r| r.version),
        })
    }

    fn resolve_workflow(
        &self,
        rule: &EffectiveRepoRule,
        project: &ProjectConfig,
        repo: &RepoConfig,
    ) -> Result<Workflow, PolicyError> {
        let name = match &project.workflow {
            Some(name) if rule.allows(AllowedOverride::Workflow) => name,
            _ => &rule.workflow,
        };
        let repo_defined = rule
            .allow_custom_workflows
            .then(|| repo.workflows.get(name))
            .flatten();
        repo_defined
            .or_else(|| self.global.workflow(name))
            .cloned()
            .ok_or_else(|| PolicyError::UndefinedWorkflow(name.clone()))
    }
}

fn check_override(
    rule: &EffectiveRepoRule,
    project: &ProjectConfig,
    key: AllowedOverride,
    conflicts: bool,
) -> Result<(), PolicyError> {
    if conflicts && !rule.allows(key) {
        return Err(PolicyError::OverrideNotAllowed {
            key,
            dir: project.dir.clone(),
        });
    }
    Ok(())
}
