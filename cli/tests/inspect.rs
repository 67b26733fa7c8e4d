use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

#[test]
fn inspect_prints_sql_parameters_and_fields() {
    let root = assert_fs::TempDir::new().unwrap();
    root.child("orders/list.sql")
        .write_str("select id, total from orders where total > :min")
        .unwrap();
    root.child("tables.json")
        .write_str(
            r#"{"orders": {
                "id": {"type": "long", "nullable": false, "key": true},
                "total": {"type": "double"}
            }}"#,
        )
        .unwrap();

    Command::cargo_bin("sqlet")
        .unwrap()
        .args(["inspect", "--root"])
        .arg(root.path())
        .args(["--dialect", "postgres", "--tables"])
        .arg(root.child("tables.json").path())
        .arg("orders/list")
        .assert()
        .success()
        .stdout(predicate::str::contains("entity orders/list"))
        .stdout(predicate::str::contains("WHERE total > $1"))
        .stdout(predicate::str::contains("1. min string"))
        .stdout(predicate::str::contains("id: long, of orders, key, not null"));
}

#[test]
fn inspect_reports_missing_entities() {
    let root = assert_fs::TempDir::new().unwrap();

    Command::cargo_bin("sqlet")
        .unwrap()
        .args(["inspect", "--root"])
        .arg(root.path())
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load entity 'nope'"));
}
