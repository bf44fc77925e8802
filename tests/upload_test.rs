mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::{DirectoryHop, ManualClock, MemoryFiles, ScriptedEngine, entries};
use impala_helper::{Helper, HelperConfig, HelperError, RemoteConfig};
use tempfile::TempDir;

const LOCATION: &str = "/user/analyst/clientes";

struct Fixture {
    engine: ScriptedEngine,
    files: MemoryFiles,
    local: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self { engine: ScriptedEngine::new(), files: MemoryFiles::new(), local: tempfile::tempdir().unwrap() }
    }

    fn config(&self) -> HelperConfig {
        let mut config = HelperConfig::new("host=impala.test");
        config.upload_root = Some("/user/analyst".into());
        config.max_retries = 0;
        config
    }

    fn helper(&self, config: HelperConfig) -> Helper {
        Helper::with_clock(config, self.engine.connector(), ManualClock::new())
            .unwrap()
            .with_files(Box::new(self.files.clone()))
    }

    fn csv(&self, content: &str) -> PathBuf {
        let path = self.local.path().join("clientes.csv");
        fs::write(&path, content).unwrap();
        path
    }
}

fn remote(landing: &Path) -> RemoteConfig {
    RemoteConfig {
        host: "edge.test".into(),
        user: Some("analyst".into()),
        port: 22,
        identity_file: None,
        landing_dir: landing.to_path_buf(),
        kerberos_principal: None,
        kerberos_password: None,
    }
}

#[test]
fn test_load_file_declares_text_table() {
    let fixture = Fixture::new();
    let csv = fixture.csv("ID,Nombre\n1,ana\n2,luis\n");
    let mut helper = fixture.helper(fixture.config());

    let location = helper.load_file(&csv, "clientes", ',').unwrap();

    assert_eq!(location, LOCATION);
    assert_eq!(
        fixture.files.content("/user/analyst/clientes/clientes.csv").as_deref(),
        Some("ID,Nombre\n1,ana\n2,luis\n")
    );
    assert_eq!(fixture.files.directories(), vec![LOCATION]);
    assert_eq!(
        fixture.engine.statements(),
        vec![
            "DROP TABLE IF EXISTS clientes PURGE".to_string(),
            format!(
                "CREATE EXTERNAL TABLE clientes (id STRING, nombre STRING) ROW FORMAT DELIMITED FIELDS TERMINATED BY ',' STORED AS TEXTFILE LOCATION '{LOCATION}' TBLPROPERTIES ('skip.header.line.count'='1')"
            ),
            "COMPUTE STATS clientes".to_string(),
        ]
    );
}

#[test]
fn test_load_file_replaces_previous_directory() {
    let fixture = Fixture::new();
    fixture.files.insert("/user/analyst/clientes/old.csv", "id\n9\n");
    let csv = fixture.csv("id\n1\n");
    let mut helper = fixture.helper(fixture.config());

    helper.load_file(&csv, "clientes", ',').unwrap();

    assert_eq!(fixture.files.removed(), vec![LOCATION]);
    assert!(fixture.files.content("/user/analyst/clientes/old.csv").is_none());
    assert!(fixture.files.content("/user/analyst/clientes/clientes.csv").is_some());
}

#[test]
fn test_load_file_through_hop_leaves_no_landing_copy() {
    let fixture = Fixture::new();
    let landing = tempfile::tempdir().unwrap();
    let csv = fixture.csv("id;saldo\n1;10.5\n");
    let mut config = fixture.config();
    config.remote = Some(remote(landing.path()));
    let hop = DirectoryHop::new();
    let mut helper = fixture.helper(config).with_hop(Box::new(hop.clone()));

    helper.load_file(&csv, "clientes", ';').unwrap();

    assert_eq!(
        fixture.files.content("/user/analyst/clientes/clientes.csv").as_deref(),
        Some("id;saldo\n1;10.5\n")
    );
    assert_eq!(hop.removes(), 1);
    assert_eq!(entries(landing.path()), 0);
    assert!(fixture.engine.statements()[1].contains("FIELDS TERMINATED BY ';'"));
}

#[test]
fn test_load_file_needs_a_header() {
    let fixture = Fixture::new();
    let csv = fixture.csv("");
    let mut helper = fixture.helper(fixture.config());

    let err = helper.load_file(&csv, "clientes", ',').unwrap_err();

    assert!(matches!(err, HelperError::InvalidArgument(_)));
    assert!(fixture.files.directories().is_empty());
    assert!(fixture.engine.statements().is_empty());
}

#[test]
fn test_load_file_rejects_quote_delimiter() {
    let fixture = Fixture::new();
    let csv = fixture.csv("id\n1\n");
    let mut helper = fixture.helper(fixture.config());

    let err = helper.load_file(&csv, "clientes", '\'').unwrap_err();

    assert!(matches!(err, HelperError::InvalidArgument(_)));
}

#[test]
fn test_load_file_without_filesystem_client() {
    let fixture = Fixture::new();
    let csv = fixture.csv("id\n1\n");
    let mut helper = Helper::with_clock(fixture.config(), fixture.engine.connector(), ManualClock::new()).unwrap();

    let err = helper.load_file(&csv, "clientes", ',').unwrap_err();

    assert!(matches!(err, HelperError::Config(_)));
    assert!(fixture.engine.statements().is_empty());
}
