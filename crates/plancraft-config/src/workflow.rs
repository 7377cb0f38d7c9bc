//! Workflows: the steps each command stage runs
//!
//! A workflow has three stages. Plan and apply are the obvious ones; the
//! policy-check stage runs after a plan when policy checks are enabled for
//! the project. Steps are data only; executing them is somebody else's job.

use serde::Serialize;

/// Name of the workflow every project uses unless told otherwise
pub const DEFAULT_WORKFLOW_NAME: &str = "default";

/// Built-in step names a workflow may reference directly
pub const BUILTIN_STEPS: &[&str] = &[
    "init",
    "plan",
    "apply",
    "show",
    "policy_check",
    "version",
    "import",
    "state_rm",
];

/// One step of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// A built-in step such as `init` or `plan`
    Builtin {
        /// Step name, one of [`BUILTIN_STEPS`]
        name: String,
        /// Extra arguments appended to the tool invocation
        #[serde(skip_serializing_if = "Vec::is_empty")]
        extra_args: Vec<String>,
    },
    /// An arbitrary shell command
    Run {
        /// Command line
        command: String,
    },
    /// Export an environment variable to the following steps
    Env {
        /// Variable name
        name: String,
        /// Literal value
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        /// Command whose output becomes the value
        #[serde(skip_serializing_if = "Option::is_none")]
        command: Option<String>,
    },
}

impl Step {
    /// A built-in step without extra args
    #[inline]
    #[must_use]
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::Builtin {
            name: name.into(),
            extra_args: Vec::new(),
        }
    }

    /// Step name (`run` and `env` for the non built-in kinds)
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin { name, .. } => name,
            Self::Run { .. } => "run",
            Self::Env { .. } => "env",
        }
    }
}

/// Ordered steps of one stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stage {
    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Stage {
    /// Stage made of built-in steps
    #[must_use]
    pub fn builtins(names: &[&str]) -> Self {
        Self {
            steps: names.iter().map(|n| Step::builtin(*n)).collect(),
        }
    }
}

/// A named workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workflow {
    /// Workflow name
    pub name: String,
    /// Steps run for `plan`
    pub plan: Stage,
    /// Steps run for `apply`
    pub apply: Stage,
    /// Steps run for policy checks after a plan
    pub policy_check: Stage,
}

impl Workflow {
    /// The workflow used when nothing else is configured
    #[must_use]
    pub fn default_workflow() -> Self {
        Self::named(DEFAULT_WORKFLOW_NAME)
    }

    /// A workflow with default stages under the given name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plan: Self::default_plan_stage(),
            apply: Self::default_apply_stage(),
            policy_check: Self::default_policy_check_stage(),
        }
    }

    /// `init`, `plan`
    #[must_use]
    pub fn default_plan_stage() -> Stage {
        Stage::builtins(&["init", "plan"])
    }

    /// `apply`
    #[must_use]
    pub fn default_apply_stage() -> Stage {
        Stage::builtins(&["apply"])
    }

    /// `show`, `policy_check`
    #[must_use]
    pub fn default_policy_check_stage() -> Stage {
        Stage::builtins(&["show", "policy_check"])
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::default_workflow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workflow_stages() {
        let wf = Workflow::default();
        assert_eq!(wf.name, "default");
        let plan: Vec<_> = wf.plan.steps.iter().map(Step::name).collect();
        assert_eq!(plan, ["init", "plan"]);
        let policy: Vec<_> = wf.policy_check.steps.iter().map(Step::name).collect();
        assert_eq!(policy, ["show", "policy_check"]);
    }
}
