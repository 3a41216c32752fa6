//! Devflow - Development Workflow Automation
//!
//! Issue to branch to PR to review remediation, one command per step.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;

use devflow::adapters::{AssistantLauncher, GhClient, JiraClient, NullTracker};
use devflow::review::{AlwaysConfirm, FixOptions, Fixer, StdinConfirm, TriageEngine};
use devflow::todo::{StdinSource, TodoSession};
use devflow::{
    Config, DevflowError, HostClient, Orchestrator, Result, RunOptions, RunOutcome, TrackerClient,
};

#[derive(Parser)]
#[command(name = "devflow")]
#[command(version = "0.1.0")]
#[command(about = "Development workflow automation: issue to branch to PR to review fixes", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the task workflow for an issue key (re-run to resume)
    Run {
        /// Issue tracker key, e.g. PBI-123
        key: String,

        /// Skip all issue tracker calls (work fully local)
        #[arg(long)]
        skip_tracker: bool,

        /// Open the pull request as a draft
        #[arg(long)]
        draft: bool,

        /// Launch the AI assistant with the task context at the pause point
        #[arg(long)]
        assistant: bool,
    },

    /// Show or work the subtask list for a task
    Todo {
        /// Issue tracker key
        key: String,

        /// One-shot listing instead of the interactive session
        #[arg(short, long)]
        list: bool,
    },

    /// Pull request review triage and remediation
    Pr {
        #[command(subcommand)]
        action: PrAction,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum PrAction {
    /// Classify review comments and write the triage report
    Triage {
        /// Pull request number
        number: u64,
    },

    /// Apply the auto-fixable review comments
    Fix {
        /// Pull request number
        number: u64,

        /// Apply without per-item confirmation
        #[arg(long)]
        auto: bool,

        /// Show intended changes without writing, committing or replying
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the merged configuration (token redacted)
    Show,

    /// List the config file locations consulted
    Paths,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "devflow=debug,info"
    } else {
        "devflow=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let project = cli.project.canonicalize().unwrap_or(cli.project.clone());
    if !project.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project.display()
        );
        process::exit(1);
    }

    let code = match dispatch(&cli, &project) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red().bold());
            e.exit_code()
        }
    };
    process::exit(code);
}

fn dispatch(cli: &Cli, project: &PathBuf) -> Result<i32> {
    let config = Config::load(project)?;

    match &cli.command {
        Commands::Run {
            key,
            skip_tracker,
            draft,
            assistant,
        } => {
            let options = RunOptions {
                skip_tracker: *skip_tracker,
                draft: *draft,
                launch_assistant: *assistant,
            };
            let host = GhClient::new(project, &config.git)?;
            let launcher = AssistantLauncher::new(project);
            if options.skip_tracker {
                run_workflow(&NullTracker, &host, &launcher, &config, project, key, &options)
            } else {
                let tracker = JiraClient::new(&config.tracker)?;
                run_workflow(&tracker, &host, &launcher, &config, project, key, &options)
            }
        }

        Commands::Todo { key, list } => {
            let session = TodoSession::new(project, &config, key);
            if *list {
                session.list()?;
            } else {
                session.run(&mut StdinSource)?;
            }
            Ok(0)
        }

        Commands::Pr { action } => match action {
            PrAction::Triage { number } => {
                let host = GhClient::new(project, &config.git)?;
                let engine = TriageEngine::new(&host, &config, project);
                let report = engine.triage(*number)?;
                let counts = report.counts();
                println!(
                    "{} PR #{}: {} comments ({} auto-fixable, {} simple, {} complex, {} discussion)",
                    "✓".green(),
                    report.pr_number,
                    counts.total(),
                    counts.auto_fixable,
                    counts.simple,
                    counts.complex,
                    counts.discussion
                );
                println!(
                    "report written under .devflow/reviews/pr-{}/",
                    report.pr_number
                );
                Ok(0)
            }

            PrAction::Fix {
                number,
                auto,
                dry_run,
            } => {
                let host = GhClient::new(project, &config.git)?;
                let fixer = Fixer::new(&host, &config, project);
                let options = FixOptions {
                    auto: *auto,
                    dry_run: *dry_run,
                };
                let report = if *auto {
                    fixer.apply(*number, &options, &AlwaysConfirm)?
                } else {
                    fixer.apply(*number, &options, &StdinConfirm)?
                };
                report.print();
                Ok(report.exit_code())
            }
        },

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let mut shown = config.clone();
                if !shown.tracker.api_token.is_empty() {
                    shown.tracker.api_token = "<redacted>".to_string();
                }
                let rendered = toml::to_string_pretty(&shown)
                    .map_err(|e| DevflowError::config(format!("cannot render config: {e}")))?;
                println!("{rendered}");
                Ok(0)
            }
            ConfigAction::Paths => {
                for path in Config::candidate_paths(project) {
                    let marker = if path.exists() {
                        "✓".green()
                    } else {
                        "-".dimmed()
                    };
                    println!("{marker} {}", path.display());
                }
                Ok(0)
            }
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn run_workflow<T: TrackerClient, H: HostClient>(
    tracker: &T,
    host: &H,
    launcher: &AssistantLauncher,
    config: &Config,
    project: &PathBuf,
    key: &str,
    options: &RunOptions,
) -> Result<i32> {
    let orchestrator = Orchestrator::new(tracker, host, launcher, config, project);
    match orchestrator.run(key, options)? {
        RunOutcome::Paused {
            key,
            branch,
            context_dir,
        } => {
            println!("{} {key} ready for implementation", "✓".green());
            println!("  branch:  {branch}");
            println!("  context: {}", context_dir.display());
            println!(
                "\nImplement the task (see `devflow todo {key}`), then re-run \
                 `devflow run {key}` to open the pull request."
            );
            Ok(0)
        }
        RunOutcome::Completed {
            pr_url,
            tracker_updated,
        } => {
            println!("{} pull request: {pr_url}", "✓".green());
            if tracker_updated {
                println!("{} tracker moved to review", "✓".green());
            } else {
                println!("{} tracker status not updated", "-".yellow());
            }
            Ok(0)
        }
    }
}
