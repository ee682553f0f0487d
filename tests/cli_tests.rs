//! Command-line behaviour of the `duplex-designer` binary.

use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const TABLE: &str = "# two targets sharing AACG/GGUUA at bridge 6, one off-target
name\tutr5_len\tcds_len\tutr3_len\tsequence
tx1\t0\t0\t36\tUUUGCAAUUCCAGGUUAGAACCCUAGAACGUCGCUC
tx2\t0\t0\t39\tUUAUUUGCAAUUCAAGGUUAGAACACUAGAACGUCGAUC
off\t0\t0\t44\tCAUUCGGUUAAGACAACUAAUACGCAUAAGCGUAACGAACCGCA
";

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn designer() -> Command {
    Command::cargo_bin("duplex-designer").unwrap()
}

fn design(table: &Path) -> Command {
    let mut cmd = designer();
    cmd.arg("design")
        .arg(table)
        .args(["--required", "tx1,tx2", "--excluded", "off", "--k3", "4", "--k5", "5"]);
    cmd
}

#[test]
fn test_design_tsv_lists_shared_grip() {
    let dir = TempDir::new().unwrap();
    let table = write_file(&dir, "transcripts.tsv", TABLE);

    design(&table)
        .args(["--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("id\torigin\tsequence"))
        .stdout(predicate::str::contains("AACG/GGUUA"));
}

#[test]
fn test_design_json_has_summary_and_passes() {
    let dir = TempDir::new().unwrap();
    let table = write_file(&dir, "transcripts.tsv", TABLE);

    let output = design(&table).args(["--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["summary"]["guides"].as_u64().unwrap() > 0);
    assert_eq!(json["passes"][0]["pass"], "build");
    assert_eq!(json["config"]["k3"], 4);
}

#[test]
fn test_design_with_explicit_passes() {
    let dir = TempDir::new().unwrap();
    let table = write_file(&dir, "transcripts.tsv", TABLE);

    design(&table)
        .args(["--passes", "build,cross-hybridize", "--drop-excluded"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cross-hybridize"))
        .stdout(predicate::str::contains("drop-excluded-binders"));
}

#[test]
fn test_design_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let table = write_file(&dir, "transcripts.tsv", TABLE);
    let config = write_file(&dir, "design.json", r#"{"k3": 4, "k5": 5, "max_distance": 12}"#);

    designer()
        .arg("design")
        .arg(&table)
        .args(["--required", "tx1,tx2", "--format", "json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_distance\": 12"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let table = write_file(&dir, "transcripts.tsv", TABLE);

    designer()
        .arg("design")
        .arg(&table)
        .args(["--required", "tx1,tx2", "--k3", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("k3"));
}

#[test]
fn test_unknown_transcript_is_reported() {
    let dir = TempDir::new().unwrap();
    let table = write_file(&dir, "transcripts.tsv", TABLE);

    designer()
        .arg("design")
        .arg(&table)
        .args(["--required", "tx1,missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'missing' is not in the table"));
}

#[test]
fn test_single_required_target_is_reported() {
    let dir = TempDir::new().unwrap();
    let table = write_file(&dir, "transcripts.tsv", TABLE);

    designer()
        .arg("grips")
        .arg(&table)
        .args(["--required", "tx1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("At least 2 required targets"));
}

#[test]
fn test_grips_text() {
    let dir = TempDir::new().unwrap();
    let table = write_file(&dir, "transcripts.csv", &TABLE.replace('\t', ","));

    designer()
        .arg("grips")
        .arg(&table)
        .args(["--required", "tx1,tx2", "--optional", "off", "--k3", "4", "--k5", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AACG/GGUUA"))
        .stdout(predicate::str::contains("bridge 6"));
}

#[test]
fn test_candidates_tsv() {
    designer()
        .args(["candidates", "--flank3", "ACGT", "--flank5", "UGC", "-n", "3"])
        .args(["--format", "tsv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("rank\tsequence\tgc\n"))
        .stdout(predicate::function(|out: &str| out.lines().count() == 4));
}

#[test]
fn test_candidates_reject_bad_flank() {
    designer()
        .args(["candidates", "--flank3", "ACG", "--flank5", "UGC"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid flanks"));
}
