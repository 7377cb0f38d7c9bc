//! Server-side (global) policy
//!
//! The operator describes, per repository ID, which apply requirements and
//! workflow a project gets and which of those the repo may override. Rules
//! are evaluated in order and later matches override earlier ones, so a
//! catch-all `/.*/` rule first and specific repos after it is the usual shape.
//!
//! ```yaml
//! policy_mode: strict
//! repos:
//! - id: /.*/
//!   apply_requirements: [approved]
//! - id: github.com/acme/infra
//!   allowed_overrides: [workflow]
//!   allow_custom_workflows: true
//! workflows:
//!   audited:
//!     plan:
//!       steps: [init, plan]
//! ```

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::parser::{parse_workflows, RawWorkflow};
use crate::repo::{ApplyRequirement, DEFAULT_REPO_CONFIG_FILE};
use crate::workflow::{Workflow, DEFAULT_WORKFLOW_NAME};

/// Repo config keys the operator can allow a repo to override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedOverride {
    /// `apply_requirements`
    ApplyRequirements,
    /// `workflow`
    Workflow,
    /// `policy_check`
    PolicyCheck,
}

impl fmt::Display for AllowedOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ApplyRequirements => "apply_requirements",
            Self::Workflow => "workflow",
            Self::PolicyCheck => "policy_check",
        })
    }
}

/// How disallowed overrides are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Reject the repo config
    #[default]
    Strict,
    /// Keep the operator's value and carry on
    Permissive,
}

/// How a rule selects repositories
#[derive(Debug, Clone)]
pub enum RepoIdMatcher {
    /// Every repository
    All,
    /// Exact repo ID such as `github.com/owner/repo`
    Exact(String),
    /// `/regex/` form, matched against the whole repo ID
    Pattern(Regex),
}

impl RepoIdMatcher {
    /// Parse `id` from config: `/.../` is a regex, anything else is exact
    ///
    /// # Errors
    ///
    /// [`PolicyError::InvalidRepoPattern`] when the regex does not compile.
    pub fn parse(id: &str) -> Result<Self, PolicyError> {
        match id
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(".*") => Ok(Self::All),
            Some(pattern) => Regex::new(&format!("^(?:{pattern})$"))
                .map(Self::Pattern)
                .map_err(|source| PolicyError::InvalidRepoPattern {
                    pattern: id.to_string(),
                    source,
                }),
            _ => Ok(Self::Exact(id.to_string())),
        }
    }

    /// Whether `repo_id` is selected
    #[must_use]
    pub fn matches(&self, repo_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(id) => id == repo_id,
            Self::Pattern(re) => re.is_match(repo_id),
        }
    }
}

/// One `repos:` entry; unset fields leave earlier rules' values alone
#[derive(Debug, Clone)]
pub struct RepoRule {
    /// Which repositories this rule applies to
    pub id: RepoIdMatcher,
    /// Apply requirements for every project
    pub apply_requirements: Option<Vec<ApplyRequirement>>,
    /// Workflow name for every project
    pub workflow: Option<String>,
    /// Keys the repo config may override
    pub allowed_overrides: Option<Vec<AllowedOverride>>,
    /// Whether the repo may define `workflows:`
    pub allow_custom_workflows: Option<bool>,
    /// Whether policy checks run after plans
    pub policy_check: Option<bool>,
    /// Repo config file name for matching repos
    pub repo_config_file: Option<String>,
}

impl RepoRule {
    /// Rule with no settings
    #[must_use]
    pub fn new(id: RepoIdMatcher) -> Self {
        Self {
            id,
            apply_requirements: None,
            workflow: None,
            allowed_overrides: None,
            allow_custom_workflows: None,
            policy_check: None,
            repo_config_file: None,
        }
    }
}

/// Server flags the default rule is built from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalConfigArgs {
    /// Let every repo override every governed key and define workflows
    pub allow_all_repo_settings: bool,
    /// Run policy checks after plans
    pub policy_check_enabled: bool,
}

/// The folded result of every rule that matches one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveRepoRule {
    /// Apply requirements
    pub apply_requirements: Vec<ApplyRequirement>,
    /// Workflow name
    pub workflow: String,
    /// Overridable keys
    pub allowed_overrides: Vec<AllowedOverride>,
    /// Custom workflows allowed
    pub allow_custom_workflows: bool,
    /// Policy checks enabled
    pub policy_check: bool,
    /// Repo config file name
    pub repo_config_file: String,
}

impl EffectiveRepoRule {
    /// Whether the repo may override `key`
    #[inline]
    #[must_use]
    pub fn allows(&self, key: AllowedOverride) -> bool {
        self.allowed_overrides.contains(&key)
    }
}

/// Operator policy; built once at startup and shared read-only
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Rules, evaluated in order
    pub repos: Vec<RepoRule>,
    /// Server-side workflows; always contains `default`
    pub workflows: IndexMap<String, Workflow>,
    /// Strict or permissive override handling
    pub mode: PolicyMode,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGlobalConfig {
    policy_mode: Option<PolicyMode>,
    #[serde(default)]
    repos: Vec<RawRepoRule>,
    #[serde(default)]
    workflows: IndexMap<String, RawWorkflow>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRepoRule {
    id: String,
    apply_requirements: Option<Vec<ApplyRequirement>>,
    workflow: Option<String>,
    allowed_overrides: Option<Vec<AllowedOverride>>,
    allow_custom_workflows: Option<bool>,
    policy_check: Option<bool>,
    repo_config_file: Option<String>,
}

impl GlobalConfig {
    /// Policy made of the default `/.*/` rule only
    #[must_use]
    pub fn from_args(args: GlobalConfigArgs) -> Self {
        let mut default_rule = RepoRule::new(RepoIdMatcher::All);
        default_rule.apply_requirements = Some(Vec::new());
        default_rule.workflow = Some(DEFAULT_WORKFLOW_NAME.to_string());
        default_rule.allow_custom_workflows = Some(args.allow_all_repo_settings);
        default_rule.policy_check = Some(args.policy_check_enabled);
        default_rule.repo_config_file = Some(DEFAULT_REPO_CONFIG_FILE.to_string());
        default_rule.allowed_overrides = Some(if args.allow_all_repo_settings {
            vec![
                AllowedOverride::ApplyRequirements,
                AllowedOverride::Workflow,
                AllowedOverride::PolicyCheck,
            ]
        } else {
            Vec::new()
        });

        let mut workflows = IndexMap::new();
        workflows.insert(DEFAULT_WORKFLOW_NAME.to_string(), Workflow::default_workflow());

        Self {
            repos: vec![default_rule],
            workflows,
            mode: PolicyMode::default(),
        }
    }

    /// Default rule followed by the rules of a server-side config file
    ///
    /// # Errors
    ///
    /// [`PolicyError`] for malformed YAML, bad workflows or bad repo IDs, and
    /// when a rule names a workflow that is not defined.
    pub fn from_yaml(data: &[u8], args: GlobalConfigArgs) -> Result<Self, PolicyError> {
        let raw: RawGlobalConfig = serde_yaml::from_slice(data)
            .map_err(|e| PolicyError::InvalidGlobalConfig(e.to_string()))?;

        let mut config = Self::from_args(args);
        if let Some(mode) = raw.policy_mode {
            config.mode = mode;
        }

        let workflows = parse_workflows(raw.workflows)
            .map_err(|e| PolicyError::InvalidGlobalConfig(e.to_string()))?;
        config.workflows.extend(workflows);

        for rule in raw.repos {
            if let Some(workflow) = &rule.workflow {
                if !config.workflows.contains_key(workflow) {
                    return Err(PolicyError::UndefinedWorkflow(workflow.clone()));
                }
            }
            config.repos.push(RepoRule {
                id: RepoIdMatcher::parse(&rule.id)?,
                apply_requirements: rule.apply_requirements,
                workflow: rule.workflow,
                allowed_overrides: rule.allowed_overrides,
                allow_custom_workflows: rule.allow_custom_workflows,
                policy_check: rule.policy_check,
                repo_config_file: rule.repo_config_file,
            });
        }
        Ok(config)
    }

    /// Set the override mode
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: PolicyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Append a rule
    #[inline]
    #[must_use]
    pub fn with_rule(mut self, rule: RepoRule) -> Self {
        self.repos.push(rule);
        self
    }

    /// Add or replace a server-side workflow
    #[inline]
    #[must_use]
    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflows.insert(workflow.name.clone(), workflow);
        self
    }

    /// Fold every rule matching `repo_id`, later rules winning
    #[must_use]
    pub fn rules_for(&self, repo_id: &str) -> EffectiveRepoRule {
        let mut out = EffectiveRepoRule {
            apply_requirements: Vec::new(),
            workflow: DEFAULT_WORKFLOW_NAME.to_string(),
            allowed_overrides: Vec::new(),
            allow_custom_workflows: false,
            policy_check: false,
            repo_config_file: DEFAULT_REPO_CONFIG_FILE.to_string(),
        };
        for rule in self.repos.iter().filter(|r| r.id.matches(repo_id)) {
            if let Some(v) = &rule.apply_requirements {
                out.apply_requirements.clone_from(v);
            }
            if let Some(v) = &rule.workflow {
                out.workflow.clone_from(v);
            }
            if let Some(v) = &rule.allowed_overrides {
                out.allowed_overrides.clone_from(v);
            }
            if let Some(v) = rule.allow_custom_workflows {
                out.allow_custom_workflows = v;
            }
            if let Some(v) = rule.policy_check {
                out.policy_check = v;
            }
            if let Some(v) = &rule.repo_config_file {
                out.repo_config_file.clone_from(v);
            }
        }
        out
    }

    /// Repo config file name for `repo_id`
    #[must_use]
    pub fn repo_config_file(&self, repo_id: &str) -> String {
        self.rules_for(repo_id).repo_config_file
    }

    /// Server-side workflow by name
    #[must_use]
    pub fn workflow(&self, name: &str) -> Option<&Workflow> {
        self.workflows.get(name)
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::from_args(GlobalConfigArgs::default())
    }
}
