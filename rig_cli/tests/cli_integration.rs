use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use assert_cmd::Command;
use tempfile::tempdir;

// Bench config: instantaneous ring test, everything else at defaults.
fn write_bench_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[serial]
poll_ms = 1

[illumination]
test_step_ms = 0

[sensor]
test_period_ms = 1
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn rig_cmd(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("rig_cli").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[test]
fn boot_banner_precedes_command_handling() {
    let dir = tempdir().unwrap();
    let cfg = write_bench_config(&dir);

    let assert = rig_cmd(&cfg)
        .args(["serve", "--sim"])
        .write_stdin("99\n")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "OK");
    assert_eq!(lines[1], "Ring Test Complete");
    assert_eq!(lines[2], "999");
}

#[test]
fn home_then_status_over_stdio() {
    let dir = tempdir().unwrap();
    let cfg = write_bench_config(&dir);

    rig_cmd(&cfg)
        .args(["serve", "--sim", "--no-boot"])
        .write_stdin("9\n13\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK:109"))
        .stdout(predicate::str::contains("STATUS:1,0.50,0.00"))
        .stdout(predicate::str::contains("OK:113"));
}

#[test]
fn full_liquid_handling_session() {
    let dir = tempdir().unwrap();
    let cfg = write_bench_config(&dir);

    let assert = rig_cmd(&cfg)
        .args(["serve", "--sim", "--no-boot"])
        .write_stdin("9\n10\n5.0\n11\n20.0\n13\n12\n50.0\n13\n")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        [
            "Homing pipette...",
            "OK:109",
            "OK:110",
            "OK:111",
            "STATUS:1,7.00,20.00",
            "OK:113",
            "ERROR: not enough volume in pipette",
            "ERR:112",
            "STATUS:1,7.00,20.00",
            "OK:113",
        ]
    );
}

#[rstest]
#[case("777\n", "-1")]
#[case("99\n", "999")]
#[case("7\n", "108")]
fn single_command_responses(#[case] input: &str, #[case] expected: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_bench_config(&dir);

    rig_cmd(&cfg)
        .args(["serve", "--sim", "--no-boot"])
        .write_stdin(input.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn motion_before_homing_is_flagged() {
    let dir = tempdir().unwrap();
    let cfg = write_bench_config(&dir);

    rig_cmd(&cfg)
        .args(["serve", "--sim", "--no-boot"])
        .write_stdin("10\n1.0\n13\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ERR:110"))
        .stdout(predicate::str::contains("STATUS:0,0.00,0.00"));
}

#[test]
fn self_check_runs_the_ring_test() {
    let dir = tempdir().unwrap();
    let cfg = write_bench_config(&dir);

    rig_cmd(&cfg)
        .args(["self-check", "--sim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ring Test Complete"));
}

#[test]
fn invalid_config_is_rejected_before_serving() {
    let dir = tempdir().unwrap();
    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[motion]\nsteps_per_mm = 0\n").unwrap();

    let mut cmd = Command::cargo_bin("rig_cli").unwrap();
    cmd.arg("--config")
        .arg(&bad)
        .args(["serve", "--sim"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("steps_per_mm"));
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("rig_cli").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("self-check"));
}
