// ABOUTME: Integration tests for the CLI application
// ABOUTME: Runs the compiled binary against spec and context fixtures on disk

use std::process::{Command, Output};

mod common;
use common::{TestEnvironment, TestSpecBuilder, SAMPLE_CONTEXT_YAML};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_filter-builder"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_cli_help_command() {
    let output = run(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("render"));
}

#[test]
fn test_cli_version_command() {
    let output = run(&["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_validate_valid_spec() {
    let env = TestEnvironment::new();
    let spec = env.write_spec("ok", &TestSpecBuilder::template("name: {{data.foo}}"));

    let output = run(&["validate", spec.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("is valid"));
    assert!(stdout.contains("template"));
}

#[test]
fn test_cli_validate_malformed_template() {
    let env = TestEnvironment::new();
    let spec = env.write_spec("bad", &TestSpecBuilder::template("name: {{data.foo"));

    let output = run(&["validate", spec.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("compile"));
}

#[test]
fn test_cli_render_value() {
    let env = TestEnvironment::new();
    let spec = env.write_spec(
        "value",
        &TestSpecBuilder::template("name: [[requests.req1.Method]]\ntenant: [[var]]")
            .with_delimiters("[[", "]]"),
    );
    let context = env.write_file("ctx.yaml", SAMPLE_CONTEXT_YAML);

    // `var` is not in the context, so it must fail at render time
    let failed = run(&[
        "render",
        spec.to_str().unwrap(),
        "--context",
        context.to_str().unwrap(),
    ]);
    assert!(!failed.status.success());

    let spec = env.write_spec(
        "value",
        &TestSpecBuilder::template("name: [[requests.req1.Method]]\ntenant: [[data.tenant]]")
            .with_delimiters("[[", "]]"),
    );
    let output = run(&[
        "render",
        spec.to_str().unwrap(),
        "--context",
        context.to_str().unwrap(),
        "--var",
        "tenant=acme",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: GET"));
    assert!(stdout.contains("tenant: acme"));
}

#[test]
fn test_cli_render_response() {
    let env = TestEnvironment::new();
    let spec = env.write_spec(
        "response",
        &TestSpecBuilder::template(
            "statusCode: {{responses.backend.StatusCode}}\nbody: upstream failed\n",
        ),
    );
    let context = env.write_file("ctx.yaml", SAMPLE_CONTEXT_YAML);

    let output = run(&[
        "render",
        spec.to_str().unwrap(),
        "--context",
        context.to_str().unwrap(),
        "--kind",
        "response",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("statusCode: 502"));
    assert!(stdout.contains("body: upstream failed"));
}

#[test]
fn test_cli_render_request_from_source_namespace() {
    let env = TestEnvironment::new();
    let spec = env.write_spec("copy", &TestSpecBuilder::source_namespace("req1"));
    let context = env.write_file("ctx.yaml", SAMPLE_CONTEXT_YAML);

    let output = run(&[
        "render",
        spec.to_str().unwrap(),
        "--context",
        context.to_str().unwrap(),
        "--kind",
        "request",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("url: http://example.com/users"));
}
