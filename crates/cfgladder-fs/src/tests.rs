use super::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use cfgladder_core::{Logger, Storage, VersionStore};
use chrono::{Local, TimeZone};
use xmltree::{Element, XMLNode};

#[test]
fn read_lines_strips_trailing_whitespace() {
    let root = test_config_root();
    fs::create_dir_all(&root).expect("must create root");
    fs::write(root.join("globals.txt"), "A=1  \r\nB=2\n\nC=3\t\n").expect("must seed file");

    let storage = FsStorage::new(&root);
    let lines = storage
        .read_lines(Path::new("globals.txt"))
        .expect("must read lines");
    assert_eq!(lines, vec!["A=1", "B=2", "", "C=3"]);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn write_lines_creates_parents_and_terminates_each_line() {
    let root = test_config_root();
    let storage = FsStorage::new(&root);

    storage
        .write_lines(
            Path::new("configurations/nested/file.txt"),
            &["first".to_string(), "second".to_string()],
        )
        .expect("must write lines");

    let content = fs::read_to_string(root.join("configurations/nested/file.txt"))
        .expect("must read written file");
    assert_eq!(content, "first\nsecond\n");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn read_lines_of_missing_file_fails_with_path() {
    let root = test_config_root();
    let storage = FsStorage::new(&root);

    let err = storage
        .read_lines(Path::new("missing.txt"))
        .expect_err("missing file must fail");
    assert!(err.to_string().contains("missing.txt"), "unexpected error: {err}");
    assert!(!storage.exists(Path::new("missing.txt")));
}

#[test]
fn document_round_trip_keeps_declaration_on_its_own_line() {
    let root = test_config_root();
    fs::create_dir_all(root.join("configurations/beam")).expect("must create config dir");
    fs::write(
        root.join("configurations/beam/meta.xml"),
        "<?xml version=\"1.0\" ?>\n<meta><description>beamline</description></meta>\n",
    )
    .expect("must seed meta");

    let storage = FsStorage::new(&root);
    let path = ConfigLayout::meta_path(Path::new("configurations/beam"));
    let mut document = storage.read_document(&path).expect("must parse meta");
    assert_eq!(document.name, "meta");

    let mut extra = Element::new("synoptic");
    extra.children.push(XMLNode::Text("main".to_string()));
    document.children.push(XMLNode::Element(extra));
    storage
        .write_document(&path, &document)
        .expect("must write meta");

    let written = fs::read_to_string(root.join("configurations/beam/meta.xml"))
        .expect("must read meta");
    assert!(
        written.starts_with("<?xml version=\"1.0\" ?>\n<meta>"),
        "unexpected document: {written}"
    );
    assert!(written.ends_with("</meta>\n"), "unexpected document: {written}");

    let reparsed = storage.read_document(&path).expect("must reparse meta");
    let synoptic = reparsed.get_child("synoptic").expect("child must exist");
    assert_eq!(synoptic.get_text().as_deref(), Some("main"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn list_dir_returns_sorted_root_relative_paths() {
    let root = test_config_root();
    for name in ["zeta", "alpha", "mid"] {
        fs::create_dir_all(root.join(ConfigLayout::components_dir()).join(name))
            .expect("must create component");
    }

    let storage = FsStorage::new(&root);
    let entries = storage
        .list_dir(&ConfigLayout::components_dir())
        .expect("must list components");
    assert_eq!(
        entries,
        vec![
            PathBuf::from("configurations/components/alpha"),
            PathBuf::from("configurations/components/mid"),
            PathBuf::from("configurations/components/zeta"),
        ]
    );
    assert!(entries.iter().all(|entry| storage.is_dir(entry)));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn layout_keeps_configurations_and_components_under_icp_config_dir() {
    assert_eq!(
        ConfigLayout::configurations_dir(),
        PathBuf::from("configurations/configurations")
    );
    assert_eq!(
        ConfigLayout::components_dir(),
        PathBuf::from("configurations/components")
    );
    assert_eq!(
        ConfigLayout::synoptics_dir(),
        PathBuf::from("configurations/synoptics")
    );
    assert_eq!(
        ConfigLayout::device_screens_path(),
        PathBuf::from("configurations/devices/screens.xml")
    );
    assert!(ConfigLayout::version_marker_path().starts_with(ConfigLayout::icp_config_dir()));
}

#[test]
fn remove_dir_deletes_tree_and_tolerates_missing_folder() {
    let root = test_config_root();
    let folder = ConfigLayout::icp_config_dir().join("galil");
    fs::create_dir_all(root.join(&folder).join("settings")).expect("must create folder");
    fs::write(root.join(&folder).join("settings/axis.cmd"), "x\n").expect("must write file");

    let storage = FsStorage::new(&root);
    storage.remove_dir(&folder).expect("must remove folder");
    assert!(!storage.exists(&folder));
    storage
        .remove_dir(&folder)
        .expect("removing a missing folder must succeed");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn version_store_bootstraps_marker_file_on_disk() {
    let root = test_config_root();
    let storage = FsStorage::new(&root);
    let logger = RunLogger::create(&root.join("logs"))
        .expect("must create logger")
        .quiet();
    let versions = VersionStore::new(&storage, &logger, "6.0.0");

    assert_eq!(versions.read().expect("must bootstrap"), "6.0.0");
    let marker = fs::read_to_string(root.join(ConfigLayout::version_marker_path()))
        .expect("must read marker");
    assert_eq!(marker, "6.0.0\n");

    versions.write("7.0.0").expect("must write marker");
    assert_eq!(versions.read().expect("must read marker"), "7.0.0");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn run_logger_appends_prefixed_lines_to_timestamped_file() {
    let root = test_config_root();
    let started_at = Local
        .with_ymd_and_hms(2025, 3, 7, 9, 5, 0)
        .single()
        .expect("unambiguous local time");
    let logger = RunLogger::create_at(&root, started_at)
        .expect("must create logger")
        .quiet();

    assert_eq!(
        logger.log_file().file_name().and_then(|name| name.to_str()),
        Some("upgrade_2025_03_07__09_05.txt")
    );

    logger.info("Config at initial version 6.0.0");
    logger.error("Unknown version number 6.0.0");

    let content = fs::read_to_string(logger.log_file()).expect("must read log file");
    assert_eq!(
        content,
        " INFO: Config at initial version 6.0.0\nERROR: Unknown version number 6.0.0\n"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn console_line_is_plain_when_not_rich() {
    assert_eq!(
        logger::render_console_line(logger::Level::Error, "boom", false),
        "ERROR: boom"
    );
    let rich = logger::render_console_line(logger::Level::Info, "hello", true);
    assert!(rich.contains(" INFO"));
    assert!(rich.ends_with(": hello"));
    assert_ne!(rich, " INFO: hello");
}

#[test]
fn config_root_is_parent_of_icp_config_root() {
    std::env::set_var("ICPCONFIGROOT", "/instrument/settings/config/NDXTEST");
    let root = config_root_from_env().expect("must resolve config root");
    assert_eq!(root, PathBuf::from("/instrument/settings/config"));
}

static TEST_CONFIG_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_config_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_CONFIG_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "cfgladder-fs-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}
