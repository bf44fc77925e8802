mod common;

use std::fs;

use common::{Fault, ManualClock, ScriptedEngine, described, result};
use impala_helper::{ColumnType, Helper, HelperConfig, HelperError, SizeUnit, Value};

fn helper(engine: &ScriptedEngine) -> Helper {
    Helper::with_clock(HelperConfig::new("host=impala.test"), engine.connector(), ManualClock::new()).unwrap()
}

#[test]
fn test_invalid_config_is_rejected() {
    let engine = ScriptedEngine::new();
    let mut config = HelperConfig::new("host=impala.test");
    config.staging_file_size_gb = 2;

    let err = Helper::with_clock(config, engine.connector(), ManualClock::new()).err().unwrap();

    assert!(matches!(err, HelperError::Config(_)));
}

#[test]
fn test_count() {
    let engine = ScriptedEngine::new();
    engine.respond("SELECT count(*) FROM ventas", result(&["count(*)"], vec![vec![Value::Integer(1234)]]));
    let mut helper = helper(&engine);

    assert_eq!(helper.count("ventas").unwrap(), 1234);
}

#[test]
fn test_table_size_sums_files() {
    let engine = ScriptedEngine::new();
    engine.respond(
        "SHOW FILES IN ventas",
        result(
            &["path", "size", "partition"],
            vec![
                vec![Value::from("hdfs://nn/ventas/a.parq"), Value::from("512.00KB"), Value::from("")],
                vec![Value::from("hdfs://nn/ventas/b.parq"), Value::from("1.50MB"), Value::from("")],
            ],
        ),
    );
    let mut helper = helper(&engine);

    let size = helper.table_size("ventas", SizeUnit::MB).unwrap();

    assert!((size - 2.0).abs() < 1e-9);
}

#[test]
fn test_describe_reads_types() {
    let engine = ScriptedEngine::new();
    engine.respond("DESCRIBE ventas", described(&[("id", "bigint"), ("monto", "decimal(12,2)")]));
    let mut helper = helper(&engine);

    let columns = helper.describe("ventas").unwrap();

    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].column_type, ColumnType::BigInt);
    assert_eq!(columns[1].column_type, ColumnType::Decimal { precision: 12, scale: 2 });
    assert_eq!(columns[1].comment, None);
}

#[test]
fn test_describe_formatted_splits_columns_and_properties() {
    let engine = ScriptedEngine::new();
    let cells = |c: [&str; 3]| -> Vec<Value> {
        c.iter().map(|v| if *v == "NULL" { Value::Null } else { Value::from(*v) }).collect()
    };
    engine.respond(
        "DESCRIBE FORMATTED ventas",
        result(
            &["name", "type", "comment"],
            vec![
                cells(["# col_name", "data_type", "comment"]),
                cells(["", "NULL", "NULL"]),
                cells(["id", "bigint", "NULL"]),
                cells(["", "NULL", "NULL"]),
                cells(["# Detailed Table Information", "NULL", "NULL"]),
                cells(["Location:", "hdfs://nn/warehouse/ventas", "NULL"]),
                cells(["Table Parameters:", "NULL", "NULL"]),
                cells(["", "numRows", "1200"]),
            ],
        ),
    );
    let mut helper = helper(&engine);

    let description = helper.describe_formatted("ventas").unwrap();

    assert_eq!(description.columns.len(), 1);
    assert_eq!(description.columns[0].name, "id");
    assert_eq!(description.properties["Location"], "hdfs://nn/warehouse/ventas");
    assert_eq!(description.properties["numRows"], "1200");
}

#[test]
fn test_recreate_round_trips_through_copy() {
    let engine = ScriptedEngine::new();
    let mut helper = helper(&engine);

    helper.recreate("proceso.ventas").unwrap();

    assert_eq!(
        engine.statements(),
        vec![
            "DROP TABLE IF EXISTS ventas_recreate PURGE",
            "CREATE TABLE ventas_recreate STORED AS PARQUET AS SELECT * FROM proceso.ventas",
            "DROP TABLE IF EXISTS proceso.ventas PURGE",
            "CREATE TABLE proceso.ventas STORED AS PARQUET AS SELECT * FROM ventas_recreate",
            "DROP TABLE IF EXISTS ventas_recreate PURGE",
            "COMPUTE STATS proceso.ventas",
        ]
    );
}

#[test]
fn test_failed_restore_keeps_copy() {
    let engine = ScriptedEngine::new();
    engine.fail("CREATE TABLE proceso.ventas", Fault::Statement, 1);
    let mut config = HelperConfig::new("host=impala.test");
    config.max_retries = 0;
    let mut helper = Helper::with_clock(config, engine.connector(), ManualClock::new()).unwrap();

    let err = helper.recreate("proceso.ventas").unwrap_err();

    assert!(matches!(err, HelperError::Statement(_)));
    assert_eq!(engine.count_starting_with("DROP TABLE IF EXISTS ventas_recreate"), 1);
    assert_eq!(engine.count_starting_with("COMPUTE STATS"), 0);
}

#[test]
fn test_execute_folder_runs_subfolders_first() {
    let engine = ScriptedEngine::new();
    let mut helper = helper(&engine);
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("01_base")).unwrap();
    fs::write(dir.path().join("01_base").join("a.sql"), "CREATE TABLE base (id INT);").unwrap();
    fs::write(dir.path().join("b.SQL"), "INSERT INTO base VALUES (2);").unwrap();
    fs::write(dir.path().join("a.sql"), "INSERT INTO base VALUES (1);").unwrap();
    fs::write(dir.path().join("notes.txt"), "not sql").unwrap();

    helper.execute_folder(dir.path(), None).unwrap();

    assert_eq!(
        engine.statements(),
        vec![
            "CREATE TABLE base (id INT)",
            "INSERT INTO base VALUES (1)",
            "INSERT INTO base VALUES (2)",
        ]
    );
}

#[test]
fn test_execute_folder_needs_a_directory() {
    let engine = ScriptedEngine::new();
    let mut helper = helper(&engine);
    let dir = tempfile::tempdir().unwrap();

    let err = helper.execute_folder(&dir.path().join("missing"), None).unwrap_err();

    assert!(matches!(err, HelperError::Config(_)));
}
