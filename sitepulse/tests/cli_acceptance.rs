use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn storage_path(&self) -> PathBuf {
        self.xdg_data.join("sitepulse/storage.json")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("sitepulse");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let mut command = Command::new(assert_cmd::cargo::cargo_bin!("sitepulse"));

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute sitepulse: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    assert!(
        output.status.success(),
        "sitepulse {:?} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        args,
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn status_without_config_reports_missing_fields() {
    let env = CliTestEnv::new();
    let args = ["status"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let out = stdout(&output);
    assert!(out.contains("Site id:   (unset)"), "stdout: {out}");
    assert!(out.contains("Ready:     no (missing site_id, endpoint)"), "stdout: {out}");
    assert!(out.contains("Client id: (none yet)"), "stdout: {out}");
}

#[test]
fn status_reads_config_file_and_overrides() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[tracker]
siteId = "docs-site"
endpoint = "https://collect.example.com/api/event"
"#,
    );

    let args = ["status"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let out = stdout(&output);
    assert!(out.contains("Site id:   docs-site"), "stdout: {out}");
    assert!(out.contains("Ready:     yes"), "stdout: {out}");

    let args = ["status", "--site-id", "other-site", "--endpoint", ""];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let out = stdout(&output);
    assert!(out.contains("Site id:   other-site"), "stdout: {out}");
    assert!(out.contains("Ready:     no (missing endpoint)"), "stdout: {out}");
}

#[test]
fn client_id_persists_until_reset() {
    let env = CliTestEnv::new();

    let args = ["client-id"];
    let first = run_bin(&env, &args);
    assert_success(&args, &first);
    let second = run_bin(&env, &args);
    assert_success(&args, &second);

    let id = stdout(&first).trim().to_string();
    assert_eq!(id.len(), 36, "expected a UUID, got {id}");
    assert_eq!(stdout(&second).trim(), id);

    let stored = fs::read_to_string(env.storage_path()).expect("storage file should exist");
    assert!(stored.contains(&id));

    let args = ["client-id", "--reset"];
    let reset = run_bin(&env, &args);
    assert_success(&args, &reset);

    let args = ["client-id"];
    let third = run_bin(&env, &args);
    assert_success(&args, &third);
    assert_ne!(stdout(&third).trim(), id);
}

#[test]
fn event_with_empty_endpoint_is_suppressed() {
    let env = CliTestEnv::new();
    let args = [
        "event",
        "signup",
        "--url",
        "https://example.com/pricing",
        "--site-id",
        "docs-site",
        "--endpoint",
        "",
    ];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let out = stdout(&output);
    assert!(out.contains("Outcome:   suppressed: no endpoint configured"), "stdout: {out}");
    assert!(out.contains("Delivery:  0 dispatched, 0 delivered, 0 failed"), "stdout: {out}");

    // Resolving the client id for the envelope persists it
    assert!(env.storage_path().exists());
}

#[test]
fn event_with_empty_name_fails() {
    let env = CliTestEnv::new();
    let args = [
        "event",
        "",
        "--url",
        "https://example.com/",
        "--site-id",
        "docs-site",
        "--endpoint",
        "",
    ];
    let output = run_bin(&env, &args);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("rejected: empty event name"));
}

#[test]
fn page_view_with_invalid_url_fails() {
    let env = CliTestEnv::new();
    let args = ["page-view", "--url", "not a url", "--site-id", "docs-site"];
    let output = run_bin(&env, &args);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid page url"));
}

#[test]
fn zero_wait_secs_is_rejected() {
    let env = CliTestEnv::new();
    let args = [
        "event",
        "signup",
        "--url",
        "https://example.com/",
        "--site-id",
        "docs-site",
        "--endpoint",
        "https://collect.example.com/api/event",
        "--wait-secs",
        "0",
    ];
    let output = run_bin(&env, &args);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--wait-secs"));
    assert!(stdout(&output).is_empty());
}
