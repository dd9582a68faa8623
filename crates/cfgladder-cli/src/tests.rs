use super::*;
use crate::render::OutputStyle;
use crate::report::PendingStep;
use clap::error::ErrorKind;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const TWO_STEP_LEDGER: &str = r#"
version = 1

[[entry]]
label = "1.0"
step = { kind = "noop" }

[[entry]]
label = "1.1"
step = { kind = "add-meta-element", tag = "configuresBlockGWAndArchiver", value = "false" }

[[entry]]
label = "2.0"
"#;

#[test]
fn cli_parses_upgrade_with_defaults() {
    let cli = Cli::try_parse_from(["cfgladder", "upgrade"]).expect("command must parse");

    match cli.command {
        Commands::Upgrade(args) => {
            assert_eq!(
                args,
                UpgradeArgs {
                    log_dir: None,
                    commit_prefix: "Config Upgrade".to_string(),
                    db_user: "root".to_string(),
                    db_attempts: 3,
                }
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
    assert!(cli.config_root.is_none());
    assert!(cli.ledger.is_none());
}

#[test]
fn cli_parses_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "cfgladder",
        "upgrade",
        "--config-root",
        "/srv/settings",
        "--ledger",
        "ladder.toml",
        "--commit-prefix",
        "Nightly Upgrade",
        "--db-attempts",
        "5",
    ])
    .expect("command must parse");

    assert_eq!(cli.config_root, Some(PathBuf::from("/srv/settings")));
    assert_eq!(cli.ledger, Some(PathBuf::from("ladder.toml")));
    match cli.command {
        Commands::Upgrade(args) => {
            assert_eq!(args.commit_prefix, "Nightly Upgrade");
            assert_eq!(args.db_attempts, 5);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_requires_label_for_check_version() {
    let err = Cli::try_parse_from(["cfgladder", "check-version"])
        .expect_err("missing label must fail");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn cli_parses_status_json_and_completion_shell() {
    let cli = Cli::try_parse_from(["cfgladder", "status", "--json"]).expect("command must parse");
    assert!(matches!(cli.command, Commands::Status { json: true }));

    let cli = Cli::try_parse_from(["cfgladder", "completions", "powershell"])
        .expect("command must parse");
    assert!(matches!(
        cli.command,
        Commands::Completions {
            shell: CliCompletionShell::Powershell
        }
    ));
}

#[test]
fn embedded_ledger_is_valid_and_clean() {
    let ledger = load_ledger(None).expect("embedded ledger must parse");
    assert_eq!(ledger.latest_label(), "25.2.2");
    assert!(ledger.lint().is_empty(), "warnings: {:?}", ledger.lint());
    assert!(ledger.entries()[ledger.len() - 1].is_terminal());
    assert_eq!(ledger.len(), 35);
    assert_eq!(ledger.first_label(), "6.0.0");
    for label in ["12.0.3", "15.0.0", "25.2.1", "25.2.1.1"] {
        assert!(ledger.index_of(label).is_some(), "ledger must carry {label}");
    }

    let pending = ledger
        .pending_from("25.2.0")
        .expect("25.2.0 must be on the ladder")
        .iter()
        .filter_map(|entry| entry.step().map(|step| step.name()))
        .collect::<Vec<_>>();
    assert_eq!(pending, vec!["noop", "set-remote-url", "edit-db-records"]);
}

#[test]
fn check_version_matches_only_latest_label() {
    let ledger = load_ledger(None).expect("embedded ledger must parse");
    assert_eq!(check_version(&ledger, "25.2.2"), 0);
    assert_eq!(check_version(&ledger, "25.2.0"), 1);
    assert_eq!(check_version(&ledger, "25.2.2 "), 1);
}

#[test]
fn load_ledger_reads_file_and_reports_path_on_error() {
    let root = test_cli_root();
    fs::create_dir_all(&root).expect("must create root");
    let good = root.join("ladder.toml");
    fs::write(&good, TWO_STEP_LEDGER).expect("must write ledger");
    let bad = root.join("broken.toml");
    fs::write(&bad, "[[entry]]\nlabel = \"1.0\"\nstep = { kind = \"noop\" }\n")
        .expect("must write ledger");

    let ledger = load_ledger(Some(good.as_path())).expect("file ledger must parse");
    assert_eq!(ledger.latest_label(), "2.0");

    let err = load_ledger(Some(bad.as_path())).expect_err("ledger without terminal must fail");
    let rendered = format!("{err:#}");
    assert!(rendered.contains("broken.toml"), "unexpected error: {rendered}");
    assert!(rendered.contains("invalid-ledger"), "unexpected error: {rendered}");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn status_report_lists_pending_steps_from_marker() {
    let ledger = parse_ledger_file(TWO_STEP_LEDGER).expect("must parse ledger");
    let report = build_status_report(&ledger, "/srv/settings", Some("1.1".to_string()));

    assert!(report.known_version);
    assert!(!report.up_to_date);
    assert_eq!(report.latest_version, "2.0");
    assert_eq!(
        report.pending,
        vec![PendingStep {
            label: "1.1".to_string(),
            step: "add-meta-element:configuresBlockGWAndArchiver".to_string(),
            resulting_version: "2.0".to_string(),
        }]
    );
    assert_eq!(
        format_status_lines(&report, OutputStyle::Plain),
        vec![
            "config root: /srv/settings".to_string(),
            "current version: 1.1".to_string(),
            "latest version: 2.0".to_string(),
            "1 upgrade step(s) pending".to_string(),
            "  1.1 add-meta-element:configuresBlockGWAndArchiver -> 2.0".to_string(),
        ]
    );
}

#[test]
fn status_report_without_marker_starts_at_first_entry() {
    let ledger = parse_ledger_file(TWO_STEP_LEDGER).expect("must parse ledger");
    let report = build_status_report(&ledger, "/srv/settings", None);

    assert!(report.known_version);
    assert_eq!(report.pending.len(), 2);
    assert_eq!(report.pending[0].label, "1.0");
}

#[test]
fn status_report_flags_unknown_and_latest_versions() {
    let ledger = parse_ledger_file(TWO_STEP_LEDGER).expect("must parse ledger");

    let unknown = build_status_report(&ledger, "/srv/settings", Some("0.9".to_string()));
    assert!(!unknown.known_version);
    assert!(!unknown.up_to_date);
    assert!(unknown.pending.is_empty());
    assert_eq!(
        format_status_lines(&unknown, OutputStyle::Plain).last(),
        Some(&"current version is not in the ledger; upgrade will fail".to_string())
    );

    let latest = build_status_report(&ledger, "/srv/settings", Some("2.0".to_string()));
    assert!(latest.up_to_date);
    assert_eq!(
        format_status_lines(&latest, OutputStyle::Plain).last(),
        Some(&"configuration is up to date".to_string())
    );
}

#[test]
fn status_report_serializes_for_json_output() {
    let ledger = parse_ledger_file(TWO_STEP_LEDGER).expect("must parse ledger");
    let report = build_status_report(&ledger, "/srv/settings", Some("1.1".to_string()));

    let value = serde_json::to_value(&report).expect("report must serialize");
    assert_eq!(value["current_version"], "1.1");
    assert_eq!(value["latest_version"], "2.0");
    assert_eq!(value["up_to_date"], false);
    assert_eq!(value["pending"][0]["resulting_version"], "2.0");
}

#[test]
fn ledger_lines_show_steps_targets_and_warnings() {
    let ledger = parse_ledger_file(
        r#"
[[entry]]
label = "1.0"
step = { kind = "noop" }

[[entry]]
label = "1.0"
step = { kind = "noop" }

[[entry]]
label = "10.0"
"#,
    )
    .expect("must parse ledger");

    assert_eq!(
        format_ledger_lines(&ledger, OutputStyle::Plain),
        vec![
            "1.0   noop -> 1.0".to_string(),
            "1.0   noop -> 10.0".to_string(),
            "10.0  (latest)".to_string(),
            "ledger label '1.0' appears more than once; runs match its first occurrence"
                .to_string(),
        ]
    );
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "configuration is up to date"),
        "configuration is up to date"
    );
}

#[test]
fn render_status_line_rich_includes_badge() {
    let rendered = render_status_line(OutputStyle::Rich, "warn", "ledger label repeated");
    assert!(rendered.contains("[WARN]"));
    assert!(rendered.ends_with(" ledger label repeated"));
}

#[test]
fn completions_script_names_binary() {
    let mut script = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut script)
        .expect("must write completion script");
    let script = String::from_utf8(script).expect("script must be UTF-8");
    assert!(script.contains("cfgladder"));
    assert!(script.contains("check-version"));
}

#[test]
fn execute_upgrade_commits_tags_and_pushes_each_step() {
    let fixture = ConfigRepoFixture::new("25.2.0");
    let logger = RunLogger::create(&fixture.root.join("logs"))
        .expect("must create logger")
        .quiet();

    let outcome = execute_upgrade(
        Some(fixture.work.as_path()),
        None,
        &default_upgrade_args(),
        &logger,
    )
    .expect("upgrade must run");

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            final_version: "25.2.2".to_string(),
            applied: 3,
        }
    );
    assert_eq!(
        fs::read_to_string(fixture.work.join("configurations/config_version.txt"))
            .expect("must read marker"),
        "25.2.2\n"
    );

    let tags = git_output(&fixture.work, &["tag", "--list"]);
    let tags = tags.lines().collect::<Vec<_>>();
    assert_eq!(
        tags,
        vec![
            "main_25.2.0_upgrade",
            "main_25.2.1.1_upgrade",
            "main_25.2.1_upgrade",
            "main_25.2.2",
        ]
    );
    assert_eq!(
        git_output(&fixture.origin, &["log", "-1", "--format=%s", "main"]),
        "Config Upgrade to 25.2.2"
    );
    assert_eq!(
        git_output(&fixture.root.join("common"), &["remote", "get-url", "origin"]),
        "https://gitlab.stfc.ac.uk/isisexperimentcontrols/common.git"
    );

    let dashboard = fs::read_to_string(fixture.work.join("configurations/dashboard.db"))
        .expect("must read dashboard.db");
    assert!(dashboard.contains("    field(CALC, \"A==1?BB:(DD==FF?EE:CC)\")\n    field(INDD,"));
    assert!(dashboard.contains("    field(EE, \"DAE Test\")"));
    assert!(dashboard.contains("    field(EE, \"Clock\")"));

    let log = fs::read_to_string(logger.log_file()).expect("must read run log");
    assert!(log.contains(" INFO: Config at initial version 25.2.0"));
    assert!(log.contains(" INFO: Finished upgrade. Now on version 25.2.2"));
}

#[test]
fn run_upgrade_logs_unknown_version_and_exits_negative() {
    let fixture = ConfigRepoFixture::new("1.0");
    let log_dir = fixture.root.join("logs");
    let args = UpgradeArgs {
        log_dir: Some(log_dir.clone()),
        ..default_upgrade_args()
    };

    let code = run_upgrade(Some(fixture.work.as_path()), None, &args).expect("run must report");
    assert_eq!(code, -1);

    let logs = fs::read_dir(&log_dir)
        .expect("log dir must exist")
        .map(|entry| entry.expect("must read log entry").path())
        .collect::<Vec<_>>();
    assert_eq!(logs.len(), 1);
    let log = fs::read_to_string(&logs[0]).expect("must read run log");
    assert!(log.contains("ERROR: Unknown version number 1.0"));
}

#[test]
fn run_upgrade_outside_repository_logs_and_exits_one() {
    let root = test_cli_root();
    let config = root.join("settings");
    fs::create_dir_all(config.join("configurations")).expect("must create config dir");
    let log_dir = root.join("logs");
    let args = UpgradeArgs {
        log_dir: Some(log_dir.clone()),
        ..default_upgrade_args()
    };

    let code = run_upgrade(Some(config.as_path()), None, &args).expect("run must report");
    assert_eq!(code, 1);

    let logs = fs::read_dir(&log_dir)
        .expect("log dir must exist")
        .map(|entry| entry.expect("must read log entry").path())
        .collect::<Vec<_>>();
    let log = fs::read_to_string(&logs[0]).expect("must read run log");
    assert!(log.contains("ERROR: Upgrade aborted:"));
    assert!(log.contains("is not under version control"));

    let _ = fs::remove_dir_all(&root);
}

const DASHBOARD_DB: &str = "record(calc, \"$(P)CS:DASHBOARD:BANNER:MIDDLE:_LCAL\") {\n    field(CALC, \"A==1?BB:CC\")\n}\n\nrecord(calc, \"$(P)CS:DASHBOARD:BANNER:MIDDLE:_VCAL\") {\n    field(CALC, \"A==1?BB:CC\")\n}\n";

fn default_upgrade_args() -> UpgradeArgs {
    UpgradeArgs {
        log_dir: None,
        commit_prefix: DEFAULT_COMMIT_PREFIX.to_string(),
        db_user: "root".to_string(),
        db_attempts: 1,
    }
}

struct ConfigRepoFixture {
    root: PathBuf,
    work: PathBuf,
    origin: PathBuf,
}

impl ConfigRepoFixture {
    fn new(marker: &str) -> Self {
        let root = test_cli_root();
        let work = root.join("work");
        let origin = root.join("origin.git");
        let common = root.join("common");
        fs::create_dir_all(work.join("configurations/configurations/beam"))
            .expect("must create config dir");
        fs::create_dir_all(&origin).expect("must create origin dir");
        fs::create_dir_all(&common).expect("must create common dir");

        git_run(&common, &["init"]);
        git_run(&common, &["remote", "add", "origin", "https://old.example.test/common.git"]);

        git_run(&origin, &["init", "--bare"]);
        git_run(&work, &["init"]);
        git_run(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git_run(&work, &["config", "user.name", "Cfgladder Tests"]);
        git_run(&work, &["config", "user.email", "cfgladder-tests@example.com"]);
        git_run(&work, &["config", "tag.gpgSign", "false"]);
        git_run(&work, &["config", "commit.gpgSign", "false"]);
        let origin_location = origin.to_string_lossy().to_string();
        git_run(&work, &["remote", "add", "origin", &origin_location]);

        fs::write(
            work.join("configurations/configurations/beam/meta.xml"),
            "<meta><description>beam</description></meta>",
        )
        .expect("must seed meta.xml");
        fs::write(work.join("configurations/dashboard.db"), DASHBOARD_DB)
            .expect("must seed dashboard.db");
        fs::write(
            work.join("configurations/config_version.txt"),
            format!("{marker}\n"),
        )
        .expect("must seed marker");
        git_run(&work, &["add", "."]);
        git_run(&work, &["commit", "-m", "initial configuration"]);

        Self { root, work, origin }
    }
}

impl Drop for ConfigRepoFixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn git_output(repo_root: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .expect("git command must execute");
    assert!(
        output.status.success(),
        "git command failed: git {}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .expect("git output must be UTF-8")
        .trim()
        .to_string()
}

fn git_run(repo_root: &Path, args: &[&str]) {
    let _ = git_output(repo_root, args);
}

static TEST_CLI_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_cli_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_CLI_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "cfgladder-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}
