use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;
use serde_json::json;

const EXIT_SUCCESS: i32 = 0;
const EXIT_MISSING_RECORDS: i32 = 4;
const EXIT_STORAGE_LIMIT: i32 = 5;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

struct Workspace {
    root: PathBuf,
    home_dir: PathBuf,
    cwd: PathBuf,
    out_dir: PathBuf,
    temp_dir: PathBuf,
}

impl Workspace {
    fn new(prefix: &str) -> Self {
        let root = unique_temp_dir(prefix);
        let workspace = Self {
            home_dir: root.join("home"),
            cwd: root.join("cwd"),
            out_dir: root.join("out"),
            temp_dir: root.join("tmp"),
            root,
        };
        for dir in [&workspace.home_dir, &workspace.cwd] {
            std::fs::create_dir_all(dir).expect("workspace dir should be creatable");
        }
        workspace
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_csdata"))
            .arg("--home-dir")
            .arg(&self.home_dir)
            .arg("--cwd")
            .arg(&self.cwd)
            .arg("--out-dir")
            .arg(&self.out_dir)
            .arg("--temp-dir")
            .arg(&self.temp_dir)
            .args(args)
            .output()
            .expect("command should execute")
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn write_fixture_db(path: &Path) {
    let connection = Connection::open(path).expect("fixture db should open");
    connection
        .execute_batch(
            "CREATE TABLE Studies (Study_ID INTEGER, Study_Name TEXT);
             CREATE TABLE CyberShake_Sites (CS_Site_ID INTEGER, CS_Short_Name TEXT);
             CREATE TABLE CyberShake_Runs (
                 Run_ID INTEGER, Site_ID INTEGER, Study_ID INTEGER, ERF_ID INTEGER,
                 Rup_Var_Scenario_ID INTEGER
             );
             CREATE TABLE CyberShake_Site_Ruptures (
                 CS_Site_ID INTEGER, ERF_ID INTEGER, Source_ID INTEGER, Rupture_ID INTEGER
             );
             CREATE TABLE Ruptures (
                 ERF_ID INTEGER, Source_ID INTEGER, Rupture_ID INTEGER, Source_Name TEXT,
                 Mag REAL, Prob REAL
             );
             CREATE TABLE Rupture_Variations (
                 ERF_ID INTEGER, Rup_Var_Scenario_ID INTEGER, Source_ID INTEGER,
                 Rupture_ID INTEGER, Rup_Var_ID INTEGER, Hypocenter_Lat REAL,
                 Hypocenter_Lon REAL, Hypocenter_Depth REAL
             );

             INSERT INTO Studies VALUES (1, 'Study 22.12 LF');
             INSERT INTO CyberShake_Sites VALUES (1, 'USC'), (2, 'PAS');
             INSERT INTO CyberShake_Runs VALUES (9306, 1, 1, 36, 4), (9307, 2, 1, 36, 4);
             INSERT INTO CyberShake_Site_Ruptures VALUES (1, 36, 12, 0), (2, 36, 12, 0);
             INSERT INTO Ruptures VALUES (36, 12, 0, 'San Andreas (Mojave)', 7.1, 0.0004);
             INSERT INTO Rupture_Variations VALUES
                 (36, 4, 12, 0, 144, 34.5, -118.1, 8.0),
                 (36, 4, 12, 0, 145, 34.6, -118.0, 9.5);",
        )
        .expect("fixture should load");
}

fn write_request(path: &Path) {
    let document = json!({
        "model": {"name": "Study 22.12 LF"},
        "products": {"name": "Seismograms"},
        "filters": [
            {"name": "Site Name", "filter_params": 1, "values": ["USC"]},
            {"name": "Magnitude", "filter_params": 3, "values": [6.5, 7.5], "sort": 1}
        ]
    });
    std::fs::write(path, document.to_string()).expect("request should be writable");
}

fn write_config(path: &Path, max_output_bytes: Option<u64>) {
    let mut config = String::from(
        "type = sqlite\ndb_path = cybershake.sqlite\nseismogram_url_prefix = https://data.example.org/cs\n",
    );
    if let Some(limit) = max_output_bytes {
        config.push_str(&format!("max_output_bytes = {limit}\n"));
    }
    std::fs::write(path, config).expect("config should be writable");
}

/// Little-endian record with a two-sample payload.
fn record(id: i32) -> Vec<u8> {
    let mut bytes = vec![0_u8; 56];
    bytes[32..36].copy_from_slice(&id.to_le_bytes());
    bytes[40..44].copy_from_slice(&2_i32.to_le_bytes());
    bytes.extend(std::iter::repeat_n(u8::try_from(id % 251).unwrap_or(0), 16));
    bytes
}

fn assert_exit(output: &Output, expected: i32) {
    assert_eq!(
        output.status.code(),
        Some(expected),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn build_and_execute(workspace: &Workspace, max_output_bytes: Option<u64>) -> Output {
    write_fixture_db(&workspace.cwd.join("cybershake.sqlite"));
    write_request(&workspace.cwd.join("usc.json"));
    write_config(&workspace.cwd.join("db.cfg"), max_output_bytes);

    let build = workspace.run(&["build", "--request", "usc.json", "--label", "run1"]);
    assert_exit(&build, EXIT_SUCCESS);
    let stdout = String::from_utf8_lossy(&build.stdout);
    assert!(stdout.contains("build: stage resolve_request"));
    assert!(stdout.contains("build: complete"));

    let query_path = workspace.out_dir.join("csdata.run1.query");
    let query = std::fs::read_to_string(&query_path).expect("query file should exist");
    assert!(query.contains("CyberShake_Sites.CS_Short_Name='USC'"));
    assert!(query.contains("sort = order by Ruptures.Mag asc"));
    assert!(query.contains("data_product = Seismograms"));

    let query_arg = query_path.display().to_string();
    workspace.run(&["execute", "--query", &query_arg, "--config", "db.cfg"])
}

#[test]
fn build_execute_collect_round_trip() {
    let workspace = Workspace::new("csdata-workflow");

    let execute = build_and_execute(&workspace, None);
    assert_exit(&execute, EXIT_SUCCESS);

    let results = std::fs::read_to_string(workspace.out_dir.join("csdata.run1.data"))
        .expect("results file should exist");
    let mut lines = results.lines();
    let header = lines.next().expect("results should have a header");
    assert!(header.starts_with("Study_Name,Run_ID,Site_Name,Source_ID,Rupture_ID,Rupture_Variation_ID"));
    assert_eq!(lines.count(), 2);

    let urls_path = workspace.out_dir.join("csdata.run1.urls");
    let urls = std::fs::read_to_string(&urls_path).expect("url list should exist");
    let url = "https://data.example.org/cs/USC/9306/Seismogram_USC_12_0.grm";
    assert!(
        urls == format!("{url} 144,145\n") || urls == format!("{url} 145,144\n"),
        "unexpected url list: {urls}"
    );

    let container = workspace
        .temp_dir
        .join("USC")
        .join("9306")
        .join("Seismogram_USC_12_0.grm");
    std::fs::create_dir_all(container.parent().expect("container should have a parent"))
        .expect("container dir should be creatable");
    std::fs::write(&container, [record(143), record(144), record(145)].concat())
        .expect("container should be writable");

    let urls_arg = urls_path.display().to_string();
    let collect = workspace.run(&["collect", "--urls", &urls_arg]);
    assert_exit(&collect, EXIT_SUCCESS);
    let stdout = String::from_utf8_lossy(&collect.stdout);
    assert!(stdout.contains("collect: container 1 of 1"));
    assert!(stdout.contains("collect: complete containers=1 records=2 removed_temp=1"));

    for id in [144, 145] {
        let output = workspace
            .out_dir
            .join(format!("Seismogram_USC_9306_12_0_{id}.grm"));
        assert_eq!(
            std::fs::read(&output).expect("record should be extracted"),
            record(id)
        );
    }
    assert!(
        !workspace
            .out_dir
            .join("Seismogram_USC_9306_12_0_143.grm")
            .exists()
    );
    assert!(!container.exists());
}

#[test]
fn execute_refuses_retrieval_over_storage_limit() {
    let workspace = Workspace::new("csdata-workflow-storage");

    let execute = build_and_execute(&workspace, Some(100_000));

    assert_exit(&execute, EXIT_STORAGE_LIMIT);
    let stderr = String::from_utf8_lossy(&execute.stderr);
    assert!(stderr.contains("execute: refused records=2 required_bytes=128112 limit_bytes=100000"));
    assert!(!workspace.out_dir.join("csdata.run1.urls").exists());
}

#[test]
fn collect_reports_missing_records() {
    let workspace = Workspace::new("csdata-workflow-missing");

    let execute = build_and_execute(&workspace, None);
    assert_exit(&execute, EXIT_SUCCESS);

    let container = workspace
        .temp_dir
        .join("USC")
        .join("9306")
        .join("Seismogram_USC_12_0.grm");
    std::fs::create_dir_all(container.parent().expect("container should have a parent"))
        .expect("container dir should be creatable");
    std::fs::write(&container, record(144)).expect("container should be writable");

    let urls_arg = workspace.out_dir.join("csdata.run1.urls").display().to_string();
    let collect = workspace.run(&["collect", "--urls", &urls_arg]);

    assert_exit(&collect, EXIT_MISSING_RECORDS);
    let stderr = String::from_utf8_lossy(&collect.stderr);
    assert!(stderr.contains("couldn't find rupture variation(s) 145"));
    assert!(
        !workspace
            .out_dir
            .join("Seismogram_USC_9306_12_0_144.grm")
            .exists()
    );
    assert!(container.exists());
}
