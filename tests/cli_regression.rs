// Regression tests for the hmr-spec binary.
// Requires: assert_cmd, predicates, tempfile in [dev-dependencies]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

const GOOD: &str = "# good\n---- App.html ----\n::0 <p>a</p>\n::1 <p>b</p>\n****\n::0 <p>a</p>\n::1 <p>b</p>\n";
const BAD: &str = "# bad\n---- App.html ----\n::0:oops\n";

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn hmr_spec() -> Command {
    let mut cmd = Command::cargo_bin("hmr-spec").unwrap();
    for var in ["APP", "DETAIL", "WATCH", "RC_HTTP", "E2E", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn cli_reports_miette_diagnostics_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(dir.path(), "bad.hmr", BAD);

    hmr_spec()
        .arg("compile")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(contains("hmr_spec::parse").or(contains("help:")));
}

#[test]
fn compile_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.hmr", GOOD);

    hmr_spec()
        .arg("compile")
        .arg(&good)
        .assert()
        .success()
        .stdout(contains("\"title\": \"good\"").and(contains("\"kind\": \"html\"")));
}

#[test]
fn compile_prints_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.hmr", GOOD);

    hmr_spec()
        .args(["compile", "--format", "yaml"])
        .arg(&good)
        .assert()
        .success()
        .stdout(contains("title: good"));
}

#[test]
fn outline_follows_detail() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.hmr", GOOD);

    hmr_spec()
        .arg("outline")
        .arg(&good)
        .assert()
        .success()
        .stdout(contains("good\n  after update 0\n  after update 1\n"));

    hmr_spec()
        .env("DETAIL", "0")
        .arg("outline")
        .arg(&good)
        .assert()
        .success()
        .stdout("good\n");

    hmr_spec()
        .args(["--detail", "2", "outline"])
        .arg(&good)
        .assert()
        .success()
        .stdout(contains("    step 0 (html)"));
}

#[test]
fn normalize_diffs_against_another_file() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.html", "<p>\n  same   text\n</p>");
    let b = write(dir.path(), "b.html", "<p>same text</p>");
    let c = write(dir.path(), "c.html", "<p>other</p>");

    hmr_spec()
        .arg("normalize")
        .arg(&a)
        .assert()
        .success()
        .stdout("<p> same text </p>\n");

    hmr_spec()
        .arg("normalize")
        .arg(&a)
        .arg("--against")
        .arg(&b)
        .assert()
        .failure()
        .stdout(contains("-<p> same text </p>").and(contains("+<p>same text</p>")));

    hmr_spec()
        .arg("normalize")
        .arg(&b)
        .arg("--against")
        .arg(&write(dir.path(), "b2.html", "<p>same text</p>\n"))
        .assert()
        .success();

    hmr_spec()
        .arg("normalize")
        .arg(&b)
        .arg("--against")
        .arg(&c)
        .assert()
        .failure();
}

#[test]
fn check_walks_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.hmr", GOOD);
    write(dir.path(), "notes.txt", "not a spec");

    hmr_spec()
        .arg("check")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(contains("✓ good.hmr (good)").and(contains("1 passed, 0 failed")));

    write(dir.path(), "bad.hmr", BAD);
    hmr_spec()
        .arg("check")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(contains("✗ bad.hmr").and(contains("1 passed, 1 failed")));
}
