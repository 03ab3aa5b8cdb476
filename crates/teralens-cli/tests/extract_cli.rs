use std::process::Command;

use tempfile::tempdir;

const SQL_SIMPLE: &str =
    "SELECT a.order_id FROM sales.orders a WHERE a.status = 'OPEN';";

/// Invalid SQL used to verify the two error modes.
const SQL_INVALID: &str = "SELECT FROM WHERE";

fn write_sql(dir: &tempfile::TempDir, name: &str, sql: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, sql).expect("write sql");
    path
}

#[test]
fn test_extract_file_to_stdout() {
    let dir = tempdir().expect("temp dir");
    let sql_path = write_sql(&dir, "simple.sql", SQL_SIMPLE);

    let output = Command::new(env!("CARGO_BIN_EXE_teralens"))
        .arg(sql_path.to_str().expect("sql path"))
        .output()
        .expect("run CLI");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(value["_tables"], serde_json::json!(["sales.orders"]));
    assert_eq!(
        value["_values"]["sales.orders"]["status"][0]["value"],
        serde_json::json!("OPEN")
    );
    assert_eq!(value["_meta"]["dialect"], serde_json::json!("teradata"));
}

#[test]
fn test_compact_output_is_single_line() {
    let dir = tempdir().expect("temp dir");
    let sql_path = write_sql(&dir, "simple.sql", SQL_SIMPLE);

    let output = Command::new(env!("CARGO_BIN_EXE_teralens"))
        .args(["--compact", sql_path.to_str().expect("sql path")])
        .output()
        .expect("run CLI");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim_end().lines().count(), 1);
}

#[test]
fn test_parse_failure_exits_nonzero_in_strict_mode() {
    let dir = tempdir().expect("temp dir");
    let sql_path = write_sql(&dir, "bad.sql", SQL_INVALID);

    let output = Command::new(env!("CARGO_BIN_EXE_teralens"))
        .arg(sql_path.to_str().expect("sql path"))
        .output()
        .expect("run CLI");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("parse error"), "stderr: {stderr}");
}

#[test]
fn test_soft_errors_envelope_exits_zero() {
    let dir = tempdir().expect("temp dir");
    let sql_path = write_sql(&dir, "bad.sql", SQL_INVALID);

    let output = Command::new(env!("CARGO_BIN_EXE_teralens"))
        .args(["--soft-errors", sql_path.to_str().expect("sql path")])
        .output()
        .expect("run CLI");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(value["type"], serde_json::json!("parse"));
    assert!(value["error"].as_str().unwrap().contains("parse error"));
}

#[test]
fn test_output_file_and_warning_echo() {
    let dir = tempdir().expect("temp dir");
    let sql_path = write_sql(&dir, "star.sql", "SELECT * FROM sales.orders;");
    let out_path = dir.path().join("report.json");

    let output = Command::new(env!("CARGO_BIN_EXE_teralens"))
        .args([
            "--output",
            out_path.to_str().expect("out path"),
            sql_path.to_str().expect("sql path"),
        ])
        .output()
        .expect("run CLI");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("select_star_used"), "stderr: {stderr}");

    let written = std::fs::read_to_string(&out_path).expect("report file");
    let value: serde_json::Value = serde_json::from_str(&written).expect("valid JSON");
    assert_eq!(value["_variables"]["sales.orders"], serde_json::json!(["*"]));
}

#[test]
fn test_multiple_files_aggregate_into_one_report() {
    let dir = tempdir().expect("temp dir");
    let first = write_sql(&dir, "a.sql", "SELECT o.x FROM sales.orders o;");
    let second = write_sql(&dir, "b.sql", "SELECT i.y FROM sales.order_items i;");

    let output = Command::new(env!("CARGO_BIN_EXE_teralens"))
        .args([
            first.to_str().expect("first path"),
            second.to_str().expect("second path"),
        ])
        .output()
        .expect("run CLI");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(
        value["_tables"],
        serde_json::json!(["sales.order_items", "sales.orders"])
    );
    assert_eq!(value["_meta"]["statements"], serde_json::json!(2));
}
