//! YAML parser for `plancraft.yaml`
//!
//! Parsing happens in two passes. serde decodes the document into raw
//! structs that mirror the file one-to-one (unknown keys are rejected), then
//! the raw structs are checked and converted into the model in
//! [`crate::repo`]. Steps are decoded from [`serde_yaml::Value`] because a
//! step is either a bare string or a single-key map.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;

use crate::error::ConfigError;
use crate::paths;
use crate::repo::{
    ApplyRequirement, AutoDiscoverConfig, AutoDiscoverMode, AutoplanConfig, ProjectConfig,
    RepoConfig, DEFAULT_WORKSPACE,
};
use crate::workflow::{Stage, Step, Workflow, BUILTIN_STEPS};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRepoConfig {
    version: Option<u32>,
    automerge: Option<bool>,
    parallel_plan: Option<bool>,
    parallel_apply: Option<bool>,
    autodiscover: Option<RawAutoDiscover>,
    #[serde(default)]
    projects: Vec<RawProject>,
    #[serde(default)]
    workflows: IndexMap<String, RawWorkflow>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAutoDiscover {
    mode: Option<String>,
    ignore_paths: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    name: Option<String>,
    dir: Option<String>,
    workspace: Option<String>,
    autoplan: Option<RawAutoplan>,
    apply_requirements: Option<Vec<String>>,
    terraform_version: Option<String>,
    workflow: Option<String>,
    policy_check: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAutoplan {
    enabled: Option<bool>,
    when_modified: Option<Vec<String>>,
}

/// A workflow as written in YAML; shared with the server-side config.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawWorkflow {
    plan: Option<RawStage>,
    apply: Option<RawStage>,
    policy_check: Option<RawStage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStage {
    #[serde(default)]
    steps: Vec<Value>,
}

/// Parse and validate repo config bytes
///
/// # Errors
///
/// Any [`ConfigError`]: the file is empty, is not valid YAML for the schema,
/// or breaks one of the [`RepoConfig::validate`] rules.
pub fn parse_repo_config(data: &[u8]) -> Result<RepoConfig, ConfigError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(ConfigError::Empty);
    }
    let raw: RawRepoConfig = serde_yaml::from_slice(data)?;
    let config = raw.into_config()?;
    config.validate()?;
    Ok(config)
}

impl RawRepoConfig {
    fn into_config(self) -> Result<RepoConfig, ConfigError> {
        let version = self.version.ok_or(ConfigError::MissingVersion)?;

        let autodiscover = self
            .autodiscover
            .map(|raw| -> Result<AutoDiscoverConfig, ConfigError> {
                Ok(AutoDiscoverConfig {
                    mode: raw.mode.as_deref().map(str::parse::<AutoDiscoverMode>).transpose()?,
                    ignore_paths: raw.ignore_paths.unwrap_or_default(),
                })
            })
            .transpose()?;

        let projects = self
            .projects
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_project(index))
            .collect::<Result<Vec<_>, _>>()?;

        let workflows = parse_workflows(self.workflows)?;

        Ok(RepoConfig {
            version,
            automerge: self.automerge,
            parallel_plan: self.parallel_plan,
            parallel_apply: self.parallel_apply,
            autodiscover,
            projects,
            workflows,
        })
    }
}

impl RawProject {
    fn into_project(self, index: usize) -> Result<ProjectConfig, ConfigError> {
        let dir = self.dir.ok_or(ConfigError::MissingDir { index })?;
        let dir = paths::normalize_repo_dir(&dir)?;

        let autoplan = self.autoplan.map_or_else(AutoplanConfig::default, |raw| AutoplanConfig {
            enabled: raw.enabled.unwrap_or(true),
            when_modified: raw.when_modified,
        });

        let apply_requirements = self
            .apply_requirements
            .map(|reqs| {
                reqs.iter()
                    .map(|r| r.parse::<ApplyRequirement>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let terraform_version = self
            .terraform_version
            .map(|value| {
                value
                    .parse()
                    .map_err(|source| ConfigError::InvalidVersion { value, source })
            })
            .transpose()?;

        Ok(ProjectConfig {
            name: self.name.filter(|n| !n.is_empty()),
            dir,
            workspace: self.workspace.unwrap_or_else(|| DEFAULT_WORKSPACE.to_string()),
            autoplan,
            apply_requirements,
            terraform_version,
            workflow: self.workflow,
            policy_check: self.policy_check,
        })
    }
}

/// Convert raw workflows, keeping file order
pub(crate) fn parse_workflows(
    raw: IndexMap<String, RawWorkflow>,
) -> Result<IndexMap<String, Workflow>, ConfigError> {
    raw.into_iter()
        .map(|(name, wf)| {
            let workflow = wf.into_workflow(&name)?;
            Ok((name, workflow))
        })
        .collect()
}

impl RawWorkflow {
    fn into_workflow(self, name: &str) -> Result<Workflow, ConfigError> {
        let stage = |raw: Option<RawStage>, fallback: fn() -> Stage| -> Result<Stage, ConfigError> {
            match raw {
                Some(raw) => Ok(Stage {
                    steps: raw
                        .steps
                        .iter()
                        .map(|v| parse_step(name, v))
                        .collect::<Result<_, _>>()?,
                }),
                None => Ok(fallback()),
            }
        };

        Ok(Workflow {
            name: name.to_string(),
            plan: stage(self.plan, Workflow::default_plan_stage)?,
            apply: stage(self.apply, Workflow::default_apply_stage)?,
            policy_check: stage(self.policy_check, Workflow::default_policy_check_stage)?,
        })
    }
}

fn parse_step(workflow: &str, value: &Value) -> Result<Step, ConfigError> {
    match value {
        Value::String(name) => builtin(workflow, name, Vec::new()),
        Value::Mapping(map) if map.len() == 1 => {
            let Some((Value::String(key), body)) = map.iter().next() else {
                return Err(ConfigError::invalid_step(workflow, "step keys must be strings"));
            };
            match key.as_str() {
                "run" => match body {
                    Value::String(command) => Ok(Step::Run {
                        command: command.clone(),
                    }),
                    _ => Err(ConfigError::invalid_step(workflow, "'run' must be a string")),
                },
                "env" => parse_env_step(workflow, body),
                other => {
                    let extra_args = match body {
                        Value::Mapping(args) => match args.get("extra_args") {
                            Some(Value::Sequence(items)) => items
                                .iter()
                                .map(|item| scalar(item).ok_or_else(|| {
                                    ConfigError::invalid_step(workflow, "extra_args must be strings")
                                }))
                                .collect::<Result<Vec<_>, _>>()?,
                            Some(_) => {
                                return Err(ConfigError::invalid_step(
                                    workflow,
                                    "extra_args must be a list",
                                ))
                            }
                            None => Vec::new(),
                        },
                        Value::Null => Vec::new(),
                        _ => {
                            return Err(ConfigError::invalid_step(
                                workflow,
                                format!("step {other:?} takes a map"),
                            ))
                        }
                    };
                    builtin(workflow, other, extra_args)
                }
            }
        }
        _ => Err(ConfigError::invalid_step(
            workflow,
            "a step is a name or a single-key map",
        )),
    }
}

fn builtin(workflow: &str, name: &str, extra_args: Vec<String>) -> Result<Step, ConfigError> {
    if !BUILTIN_STEPS.contains(&name) {
        return Err(ConfigError::invalid_step(
            workflow,
            format!("unknown step {name:?}"),
        ));
    }
    Ok(Step::Builtin {
        name: name.to_string(),
        extra_args,
    })
}

fn parse_env_step(workflow: &str, body: &Value) -> Result<Step, ConfigError> {
    let Value::Mapping(map) = body else {
        return Err(ConfigError::invalid_step(workflow, "'env' must be a map"));
    };
    let field = |key: &str| map.get(key).and_then(scalar);
    let name = field("name")
        .ok_or_else(|| ConfigError::invalid_step(workflow, "'env' requires a name"))?;
    let value = field("value");
    let command = field("command");
    if value.is_some() == command.is_some() {
        return Err(ConfigError::invalid_step(
            workflow,
            "'env' requires exactly one of value or command",
        ));
    }
    Ok(Step::Env {
        name,
        value,
        command,
    })
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
