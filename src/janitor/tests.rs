//! Unit tests for the stray-container janitor.

use rstest::rstest;

use super::*;
use crate::environment::RUN_LABEL_KEY;
use crate::test_support::ScriptedRunner;

#[rstest]
fn janitor_config_trims_the_binary_path() {
    let cfg = JanitorConfig::new("  docker  ").expect("config should build");
    assert_eq!(cfg.docker_bin, "docker");
}

#[rstest]
#[case("")]
#[case("   ")]
fn janitor_config_rejects_blank_binary(#[case] docker_bin: &str) {
    let err = JanitorConfig::new(docker_bin).expect_err("expected invalid config");
    assert_eq!(
        err,
        JanitorError::InvalidConfig {
            field: String::from("docker_bin")
        }
    );
}

#[rstest]
fn sweep_removes_every_labelled_container() {
    let cfg = JanitorConfig::new(DEFAULT_DOCKER_BIN).expect("config");
    let runner = ScriptedRunner::new();

    // list (pre)
    runner.push_output(Some(0), "abc123\ndef456\n", "");
    // rm -f abc123, rm -f def456
    runner.push_success();
    runner.push_success();
    // list (post)
    runner.push_output(Some(0), "", "");

    let janitor = ContainerJanitor::new(cfg, runner.clone());
    let summary = janitor.sweep().expect("sweep should succeed");
    assert_eq!(
        summary,
        JanitorSummary {
            removed_containers: 2
        }
    );

    let removals = runner
        .invocations()
        .iter()
        .filter(|invocation| {
            invocation
                .args
                .first()
                .is_some_and(|arg| arg.to_string_lossy() == "rm")
        })
        .count();
    assert_eq!(removals, 2, "expected one removal per stray container");

    let listings = runner
        .invocations()
        .iter()
        .filter(|invocation| {
            invocation.command_string().contains(RUN_LABEL_KEY)
        })
        .count();
    assert_eq!(listings, 2, "expected a label-filtered list before and after");
}

#[rstest]
fn sweep_errors_when_containers_remain() {
    let cfg = JanitorConfig::new(DEFAULT_DOCKER_BIN).expect("config");
    let runner = ScriptedRunner::new();

    // list (pre): one stray
    runner.push_output(Some(0), "abc123\n", "");
    // rm -f succeeds but the container survives
    runner.push_success();
    // list (post): still present
    runner.push_output(Some(0), "abc123\n", "");

    let janitor = ContainerJanitor::new(cfg, runner);
    let err = janitor.sweep().expect_err("sweep should fail");
    let JanitorError::NotClean { message } = err else {
        panic!("expected NotClean, got {err:?}");
    };
    assert!(
        message.contains("abc123"),
        "expected remaining container ID, got: {message}"
    );
}

#[rstest]
fn sweep_surfaces_runtime_command_failures() {
    let cfg = JanitorConfig::new(DEFAULT_DOCKER_BIN).expect("config");
    let runner = ScriptedRunner::new();

    runner.push_failure(2, "permission denied");

    let janitor = ContainerJanitor::new(cfg, runner);
    let err = janitor.sweep().expect_err("sweep should fail");
    assert!(matches!(err, JanitorError::CommandFailure { .. }));
}

#[rstest]
fn sweep_surfaces_runner_failures() {
    let cfg = JanitorConfig::new(DEFAULT_DOCKER_BIN).expect("config");
    let runner = ScriptedRunner::new();

    let janitor = ContainerJanitor::new(cfg, runner);
    let err = janitor.sweep().expect_err("sweep should fail");
    assert!(matches!(err, JanitorError::Runner(_)));
}
