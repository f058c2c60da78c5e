use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn tabpipe() -> Command {
    Command::cargo_bin("tabpipe").unwrap()
}

#[test]
fn test_transfer_file_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    fs::write(&input, "id,name\n1,a\n2,b\n3,c\n").unwrap();

    tabpipe()
        .args([
            "transfer",
            "--from-file",
            input.to_str().unwrap(),
            "--to-file",
            output.to_str().unwrap(),
            "--columns",
            "id,name",
            "--batch-size",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rows transferred: 3"));

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "id,name\n1,a\n2,b\n3,c\n"
    );
}

#[test]
fn test_schema_of_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.csv");
    fs::write(&input, "id,price\n1,2.5\n").unwrap();

    tabpipe()
        .args(["schema", "--file", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Int64"))
        .stdout(predicate::str::contains("Float64"));
}

#[test]
fn test_transfer_requires_one_source() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.csv");

    tabpipe()
        .args([
            "transfer",
            "--to-file",
            output.to_str().unwrap(),
            "--columns",
            "id",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from-table or --from-file"));
}

#[test]
fn test_strict_transfer_fails_on_bad_cell() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    fs::write(&input, "id\n1\n2\n3\n4\n5\nbad\n").unwrap();

    tabpipe()
        .args([
            "transfer",
            "--from-file",
            input.to_str().unwrap(),
            "--to-file",
            output.to_str().unwrap(),
            "--columns",
            "id",
            "--strict",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("DecodingError"));
}
