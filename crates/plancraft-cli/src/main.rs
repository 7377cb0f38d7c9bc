//! plancraft: print the command contexts a pull request would produce
//!
//! Runs the project command builder against a local checkout. Changed files
//! are given on the command line; the contexts are printed as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use plancraft_config::{AutoDiscoverMode, GlobalConfig, GlobalConfigArgs, UserConfig};
use plancraft_core::{
    CommandContext, CommentCommand, ProjectCommandBuilder, PullRequest, Repo, User,
    WorkspaceLockCoordinator,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod local;

use local::{LocalChanges, LocalCheckout};

fn cli() -> Command {
    Command::new("plancraft")
        .version(clap::crate_version!())
        .about("Dry-run project command builds against a local checkout")
        .subcommand_required(true)
        .arg(
            Arg::new("repo-dir")
                .long("repo-dir")
                .global(true)
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Checkout to build against"),
        )
        .arg(
            Arg::new("pull-dir")
                .long("pull-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding one checkout per workspace, for apply and version"),
        )
        .arg(
            Arg::new("changed")
                .long("changed")
                .global(true)
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Repo-relative paths the pull request modifies"),
        )
        .arg(
            Arg::new("untracked")
                .long("untracked")
                .global(true)
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Untracked paths in the checkout"),
        )
        .arg(
            Arg::new("repo")
                .long("repo")
                .global(true)
                .default_value("local/repo")
                .help("Repository full name, owner/name"),
        )
        .arg(
            Arg::new("vcs-host")
                .long("vcs-host")
                .global(true)
                .default_value("local")
                .help("VCS host name global policy rules match against"),
        )
        .arg(
            Arg::new("global-config")
                .long("global-config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Server-side policy YAML"),
        )
        .arg(
            Arg::new("user-config")
                .long("user-config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Operator defaults YAML"),
        )
        .arg(flag("allow-all-repo-settings", "Let the repo override every setting"))
        .arg(flag("policy-check", "Run policy checks after plans"))
        .arg(flag("skip-clone-no-changes", "Skip the checkout when the config matches nothing"))
        .arg(flag("restrict-file-list", "Only plan dirs the pull request changes"))
        .arg(flag("silence-no-projects", "Return nothing when a project name is unknown"))
        .arg(flag("enable-regexp-cmd", "Treat project names as regular expressions"))
        .arg(
            Arg::new("autodiscover-mode")
                .long("autodiscover-mode")
                .global(true)
                .value_parser(value_parser!(AutoDiscoverMode))
                .help("Server default autodiscover mode: auto, enabled or disabled"),
        )
        .subcommand(Command::new("autoplan").about("Contexts for a newly pushed pull request"))
        .subcommand(targeted("plan", "Contexts for a plan comment"))
        .subcommand(targeted("apply", "Contexts for an apply comment"))
        .subcommand(targeted("version", "Contexts for a version comment"))
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .global(true)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn targeted(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(Arg::new("dir").short('d').long("dir").help("Repo-relative dir"))
        .arg(Arg::new("workspace").short('w').long("workspace").help("Workspace"))
        .arg(Arg::new("project").short('p').long("project").help("Project name"))
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Ask for verbose output"),
        )
        .arg(
            Arg::new("flags")
                .num_args(0..)
                .last(true)
                .help("Extra args passed to the tool"),
        )
}

fn strings(args: &ArgMatches, id: &str) -> Vec<String> {
    args.get_many::<String>(id)
        .map(|v| v.cloned().collect())
        .unwrap_or_default()
}

fn comment_command(base: CommentCommand, args: &ArgMatches) -> CommentCommand {
    let mut cmd = base
        .with_flags(strings(args, "flags"))
        .with_verbose(args.get_flag("verbose"));
    if let Some(dir) = args.get_one::<String>("dir") {
        cmd = cmd.with_dir(dir);
    }
    if let Some(workspace) = args.get_one::<String>("workspace") {
        cmd = cmd.with_workspace(workspace);
    }
    if let Some(project) = args.get_one::<String>("project") {
        cmd = cmd.with_project(project);
    }
    cmd
}

fn user_config(args: &ArgMatches) -> anyhow::Result<UserConfig> {
    let mut user = match args.get_one::<PathBuf>("user-config") {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("reading user config {}", path.display()))?;
            serde_yaml::from_slice(&data)
                .with_context(|| format!("parsing user config {}", path.display()))?
        }
        None => UserConfig::default(),
    };

    if args.get_flag("skip-clone-no-changes") {
        user = user.with_skip_clone_no_changes(true);
    }
    if args.get_flag("restrict-file-list") {
        user = user.with_restrict_file_list(true);
    }
    if args.get_flag("silence-no-projects") {
        user = user.with_silence_no_projects(true);
    }
    if args.get_flag("enable-regexp-cmd") {
        user = user.with_regexp_cmd(true);
    }
    if args.contains_id("untracked") {
        user = user.with_untracked_files(true);
    }
    if let Some(mode) = args.get_one::<AutoDiscoverMode>("autodiscover-mode") {
        user = user.with_autodiscover_mode(*mode);
    }
    Ok(user)
}

fn global_config(args: &ArgMatches) -> anyhow::Result<GlobalConfig> {
    let flags = GlobalConfigArgs {
        allow_all_repo_settings: args.get_flag("allow-all-repo-settings"),
        policy_check_enabled: args.get_flag("policy-check"),
    };
    match args.get_one::<PathBuf>("global-config") {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("reading global config {}", path.display()))?;
            GlobalConfig::from_yaml(&data, flags)
                .with_context(|| format!("parsing global config {}", path.display()))
        }
        None => Ok(GlobalConfig::from_args(flags)),
    }
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let repo_dir = matches
        .get_one::<PathBuf>("repo-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let repo = Repo::new(
        matches.get_one::<String>("repo").map_or("local/repo", String::as_str),
        matches.get_one::<String>("vcs-host").map_or("local", String::as_str),
    );
    let changed = strings(&matches, "changed");
    info!("{} files given as changed", changed.len());

    let vcs = LocalChanges::new(&repo_dir, changed);
    let working_dir = LocalCheckout::new(&repo_dir)
        .with_pull_dir(matches.get_one::<PathBuf>("pull-dir").cloned())
        .with_untracked(strings(&matches, "untracked"));

    let builder = ProjectCommandBuilder::new(
        Arc::new(vcs),
        Arc::new(working_dir),
        WorkspaceLockCoordinator::new(),
        Arc::new(global_config(&matches)?),
        user_config(&matches)?,
    )?;

    let ctx = CommandContext::new(
        PullRequest {
            num: 1,
            base_repo: repo,
            ..PullRequest::default()
        },
        User::new(std::env::var("USER").unwrap_or_else(|_| "local".to_string())),
    );

    let contexts = match matches.subcommand() {
        Some(("autoplan", _)) => builder.build_autoplan_commands(&ctx).await?,
        Some(("plan", args)) => {
            let cmd = comment_command(CommentCommand::plan(), args);
            builder.build_plan_commands(&ctx, &cmd).await?
        }
        Some(("apply", args)) => {
            let cmd = comment_command(CommentCommand::apply(), args);
            builder.build_apply_commands(&ctx, &cmd).await?
        }
        Some(("version", args)) => {
            let cmd = comment_command(CommentCommand::version(), args);
            builder.build_version_commands(&ctx, &cmd).await?
        }
        _ => anyhow::bail!("unknown command"),
    };

    info!("{} contexts built", contexts.len());
    println!("{}", serde_json::to_string_pretty(&contexts)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli().get_matches()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn plan_args_become_a_comment_command() {
        let matches = cli()
            .try_get_matches_from([
                "plancraft", "plan", "-d", "infra", "-w", "staging", "--verbose", "--", "-var",
                "x=1",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let cmd = comment_command(CommentCommand::plan(), args);
        assert_eq!(cmd.repo_rel_dir.as_deref(), Some("infra"));
        assert_eq!(cmd.workspace.as_deref(), Some("staging"));
        assert_eq!(cmd.flags, ["-var", "x=1"]);
        assert!(cmd.verbose);
    }

    #[test]
    fn flags_map_onto_user_config() {
        let matches = cli()
            .try_get_matches_from([
                "plancraft",
                "autoplan",
                "--restrict-file-list",
                "--autodiscover-mode",
                "disabled",
                "--untracked",
                "a.tf",
            ])
            .unwrap();
        let user = user_config(&matches).unwrap();
        assert!(user.restrict_file_list);
        assert!(user.include_git_untracked_files);
        assert_eq!(user.autodiscover_mode, AutoDiscoverMode::Disabled);
        assert!(!user.skip_clone_no_changes);
    }
}
