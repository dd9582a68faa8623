mod render;
mod report;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cfgladder_core::{
    Engine, Ledger, Logger, RepositorySync, RunOutcome, VersionStore, DEFAULT_COMMIT_PREFIX,
};
use cfgladder_fs::{config_root_from_env, default_log_dir, FsStorage, RunLogger};
use cfgladder_git::GitRepository;
use cfgladder_steps::{parse_ledger_file, MysqlCliConnector};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use render::{current_output_style, render_status_line, ConsoleLogger};
use report::{build_status_report, format_ledger_lines, format_status_lines};

const EMBEDDED_LEDGER: &str = include_str!("../ledger.toml");

#[derive(Parser, Debug)]
#[command(name = "cfgladder")]
#[command(about = "Replays versioned upgrade steps against a configuration tree", long_about = None)]
struct Cli {
    /// Configuration root; defaults to the parent of $ICPCONFIGROOT.
    #[arg(long, global = true)]
    config_root: Option<PathBuf>,
    /// Ledger file to use instead of the one built into the binary.
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Upgrade(UpgradeArgs),
    CheckVersion {
        label: String,
    },
    Status {
        #[arg(long)]
        json: bool,
    },
    Ledger,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct UpgradeArgs {
    /// Log directory; defaults to $ICPVARDIR/logs/upgrade.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_COMMIT_PREFIX)]
    commit_prefix: String,
    #[arg(long, default_value = "root")]
    db_user: String,
    #[arg(long, default_value_t = 3)]
    db_attempts: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl From<CliCompletionShell> for Shell {
    fn from(shell: CliCompletionShell) -> Self {
        match shell {
            CliCompletionShell::Bash => Shell::Bash,
            CliCompletionShell::Zsh => Shell::Zsh,
            CliCompletionShell::Fish => Shell::Fish,
            CliCompletionShell::Powershell => Shell::PowerShell,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let code = match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!(
                "{}",
                render_status_line(current_output_style(), "error", &format!("{err:#}"))
            );
            1
        }
    };
    std::process::exit(code);
}

fn run_cli(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Upgrade(args) => {
            run_upgrade(cli.config_root.as_deref(), cli.ledger.as_deref(), &args)
        }
        Commands::CheckVersion { label } => {
            let ledger = load_ledger(cli.ledger.as_deref())?;
            Ok(check_version(&ledger, &label))
        }
        Commands::Status { json } => {
            let ledger = load_ledger(cli.ledger.as_deref())?;
            let root = resolve_config_root(cli.config_root.as_deref())?;
            let style = current_output_style();
            let logger = ConsoleLogger::new(style);
            let storage = FsStorage::new(&root);
            let current = VersionStore::new(&storage, &logger, ledger.first_label()).peek()?;
            let report = build_status_report(&ledger, &root.display().to_string(), current);

            if json {
                let rendered = serde_json::to_string_pretty(&report)
                    .context("failed serializing status report")?;
                println!("{rendered}");
            } else {
                for line in format_status_lines(&report, style) {
                    println!("{line}");
                }
            }
            Ok(0)
        }
        Commands::Ledger => {
            let ledger = load_ledger(cli.ledger.as_deref())?;
            for line in format_ledger_lines(&ledger, current_output_style()) {
                println!("{line}");
            }
            Ok(0)
        }
        Commands::Completions { shell } => {
            let mut stdout = io::stdout();
            write_completions_script(shell, &mut stdout)?;
            Ok(0)
        }
    }
}

/// Runs the ledger against the configuration tree. Everything, including a
/// collaborator failure, ends up in the run log; the returned value is the
/// process exit status.
fn run_upgrade(
    config_root: Option<&Path>,
    ledger: Option<&Path>,
    args: &UpgradeArgs,
) -> Result<i32> {
    let log_dir = match &args.log_dir {
        Some(dir) => dir.clone(),
        None => default_log_dir()?,
    };
    let logger = RunLogger::create(&log_dir)?;

    match execute_upgrade(config_root, ledger, args, &logger) {
        Ok(outcome) => Ok(outcome.exit_code()),
        Err(err) => {
            logger.error(&format!("Upgrade aborted: {err:#}"));
            Ok(1)
        }
    }
}

fn execute_upgrade(
    config_root: Option<&Path>,
    ledger: Option<&Path>,
    args: &UpgradeArgs,
    logger: &dyn Logger,
) -> Result<RunOutcome> {
    let ledger = load_ledger(ledger)?;
    for warning in ledger.lint() {
        logger.info(&format!("Ledger warning: {warning}"));
    }

    let root = resolve_config_root(config_root)?;
    let storage = FsStorage::new(&root);
    let repository = GitRepository::discover(&root)?;
    let sync = RepositorySync::new(&repository).with_commit_prefix(args.commit_prefix.as_str());
    let connector =
        MysqlCliConnector::new(args.db_user.as_str()).with_max_attempts(args.db_attempts);

    Engine::new(&ledger, &storage, logger, &sync)
        .with_connector(&connector)
        .run()
}

fn check_version(ledger: &Ledger, label: &str) -> i32 {
    if ledger.latest_label() == label {
        0
    } else {
        1
    }
}

fn load_ledger(path: Option<&Path>) -> Result<Ledger> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("ledger-file: failed reading {}", path.display()))?;
            parse_ledger_file(&content)
                .with_context(|| format!("ledger-file: invalid ledger {}", path.display()))
        }
        None => {
            parse_ledger_file(EMBEDDED_LEDGER).context("ledger-file: built-in ledger is invalid")
        }
    }
}

fn resolve_config_root(config_root: Option<&Path>) -> Result<PathBuf> {
    match config_root {
        Some(root) => Ok(root.to_path_buf()),
        None => config_root_from_env(),
    }
}

fn write_completions_script<W: Write>(shell: CliCompletionShell, writer: &mut W) -> Result<()> {
    let mut command = Cli::command();
    let generator: Shell = shell.into();
    let mut generated = Vec::new();
    clap_complete::generate(generator, &mut command, "cfgladder", &mut generated);

    writer
        .write_all(&generated)
        .with_context(|| "failed writing generated completion script")
}

#[cfg(test)]
mod tests;
