use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn headless_run_prints_deterministic_rotations() {
    let mut cmd = Command::cargo_bin("vantage").expect("binary exists");
    cmd.arg("--headless").arg("--frames").arg("200");
    // 200 ticks: cube at 0.005 rad/tick lands on 1.0 rad per axis; torus
    // at -0.007 rad/tick lands on -1.4 rad, wrapped into [0, 2pi).
    cmd.assert()
        .success()
        .stdout(contains("Running 200 headless frame(s)"))
        .stdout(contains(" - cube rot=(1.000, 1.000, 1.000)"))
        .stdout(contains(" - torus rot=(4.883, 4.883, 4.883)"))
        .stdout(contains(" - terrain rot=(-1.571, 0.000, 0.000)"));
}

#[test]
fn zero_frames_leave_rotations_at_their_initial_values() {
    let mut cmd = Command::cargo_bin("vantage").expect("binary exists");
    cmd.arg("--headless").arg("--frames").arg("0");
    cmd.assert()
        .success()
        .stdout(contains(" - cube rot=(0.000, 0.000, 0.000)"));
}

#[test]
fn unknown_arguments_are_rejected() {
    let mut cmd = Command::cargo_bin("vantage").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert().failure();
}
