//! Integration tests for the `jdom` CLI binary.
//!
//! These run the real binary through `assert_cmd`, covering stdin/stdout
//! piping, file I/O, each subcommand and the error paths.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: path to the sample.json fixture.
fn sample_json_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sample.json")
}

/// Helper: path to the schema.json fixture, which references ./point.json.
fn schema_json_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/refs/schema.json")
}

fn jdom() -> Command {
    Command::cargo_bin("jdom").unwrap()
}

/// Helper: run the binary and parse its stdout as JSON.
fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "command failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// get
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn get_from_stdin() {
    jdom()
        .args(["get", "user.tags[1]"])
        .write_stdin(r#"{"user":{"tags":["a","b"]}}"#)
        .assert()
        .success()
        .stdout("\"b\"\n");
}

#[test]
fn get_subtree_from_file() {
    jdom()
        .args(["get", "-i", sample_json_path(), "dims"])
        .assert()
        .success()
        .stdout("{\"w\":3.5,\"h\":10}\n");
}

#[test]
fn get_quoted_segments() {
    jdom()
        .args(["get", "-i", sample_json_path(), "['odd.key']['[x]']"])
        .assert()
        .success()
        .stdout("true\n");
}

#[test]
fn get_as_decimal_from_string() {
    jdom()
        .args(["get", "-i", sample_json_path(), "price", "--as", "decimal"])
        .assert()
        .success()
        .stdout("19.99\n");
}

#[test]
fn get_as_date() {
    jdom()
        .args(["get", "-i", sample_json_path(), "released", "--as", "date"])
        .assert()
        .success()
        .stdout("2024-03-01T12:00:00Z\n");
}

#[test]
fn get_null_as_int_is_lenient_unless_strict() {
    jdom()
        .args(["get", "-i", sample_json_path(), "nothing", "--as", "int"])
        .assert()
        .success()
        .stdout("0\n");

    jdom()
        .args(["get", "-i", sample_json_path(), "nothing", "--as", "int", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read 'nothing' as int"));
}

#[test]
fn get_missing_path_fails() {
    jdom()
        .args(["get", "-i", sample_json_path(), "dims.depth"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing at 'dims.depth'"));
}

#[test]
fn get_rejects_unterminated_path() {
    jdom()
        .args(["get", "-i", sample_json_path(), "['odd.key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid path"));
}

#[test]
fn get_index_out_of_range_fails() {
    jdom()
        .args(["get", "-i", sample_json_path(), "tags[5]"])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// set
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn set_creates_intermediate_objects() {
    let value = stdout_json(
        jdom()
            .args(["set", "server.port", "8080"])
            .write_stdin(r#"{"name":"svc"}"#),
    );
    assert_eq!(value["server"]["port"], 8080);
    assert_eq!(value["name"], "svc");
}

#[test]
fn set_raw_stores_text() {
    jdom()
        .args(["set", "--raw", "note", "not json"])
        .write_stdin("{}")
        .assert()
        .success()
        .stdout("{\"note\":\"not json\"}\n");
}

#[test]
fn set_rejects_invalid_json_value() {
    jdom()
        .args(["set", "note", "not json"])
        .write_stdin("{}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--raw"));
}

#[test]
fn set_requires_an_object_root() {
    jdom()
        .args(["set", "a", "1"])
        .write_stdin("[1,2]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a JSON object"));
}

#[test]
fn set_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.json");
    jdom()
        .args(["set", "-i", sample_json_path(), "-o"])
        .arg(&out)
        .args(["stock", "7"])
        .assert()
        .success()
        .stdout("");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["stock"], 7);
    assert_eq!(written["name"], "Widget");
}

// ─────────────────────────────────────────────────────────────────────────────
// fmt
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn fmt_minifies_normalizes_doubles_and_keeps_order() {
    jdom()
        .arg("fmt")
        .write_stdin("{ \"z\": 1,\n  \"a\": [ 1.50, 2 ] }")
        .assert()
        .success()
        .stdout("{\"z\":1,\"a\":[1.5,2]}\n");
}

#[test]
fn fmt_indented() {
    jdom()
        .args(["fmt", "--indented"])
        .write_stdin(r#"{"a":[1],"b":{}}"#)
        .assert()
        .success()
        .stdout("{\n  \"a\": [\n    1\n  ],\n  \"b\": {}\n}\n");
}

#[test]
fn fmt_rejects_invalid_json() {
    jdom()
        .arg("fmt")
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn fmt_missing_input_file() {
    jdom()
        .args(["fmt", "-i", "/nonexistent/doc.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

// ─────────────────────────────────────────────────────────────────────────────
// refs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn refs_inlines_pointers_and_files() {
    let value = stdout_json(jdom().args(["refs", "-i", schema_json_path()]));

    assert_eq!(value["unit"], "cm");
    assert_eq!(value["items"][0]["unit"], "cm");
    assert_eq!(value["origin"]["x"], 0);
    assert_eq!(value["origin"]["label"], "origin");
    assert!(value["origin"].get("$ref").is_none());
}

#[test]
fn refs_without_url_resolver_leaves_remote_literal() {
    let value = stdout_json(jdom().args(["refs", "-i", schema_json_path()]));
    assert_eq!(value["remote"]["$ref"], "https://example.com/other.json");
}

#[test]
fn refs_missing_file_fails() {
    jdom()
        .args(["refs"])
        .write_stdin(r#"{"a":{"$ref":"./missing.json"}}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.json"));
}

#[test]
fn refs_dangling_pointer_fails() {
    jdom()
        .args(["refs"])
        .write_stdin(r##"{"a":{"$ref":"#/nope"}}"##)
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// keys
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn keys_of_root_in_order() {
    jdom()
        .arg("keys")
        .write_stdin(r#"{"b":1,"a":2,"c":3}"#)
        .assert()
        .success()
        .stdout("b\na\nc\n");
}

#[test]
fn keys_at_path() {
    jdom()
        .args(["keys", "-i", sample_json_path(), "dims"])
        .assert()
        .success()
        .stdout("w\nh\n");
}

#[test]
fn keys_of_non_object_fails() {
    jdom()
        .args(["keys", "-i", sample_json_path(), "tags"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an object"));
}

// ─────────────────────────────────────────────────────────────────────────────
// General
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn no_subcommand_shows_usage() {
    jdom()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn verbose_logs_to_stderr_only() {
    jdom()
        .args(["--verbose", "refs", "-i", schema_json_path()])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"unit\":\"cm\""))
        .stderr(predicate::str::contains("loading referenced file"));
}
