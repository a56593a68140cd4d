use aidaeon_core::{AssistantStatus, Database, UserStatus};
use serde_json::Value;
use std::ffi::OsString;
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

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("aidaeon/aidaeon.db")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("aidaeon");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }
}

fn run_cli(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("aidaeon"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute aidaeon: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "aidaeon {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

/// Run `aidaeon call` and parse its JSON output
fn call(env: &CliTestEnv, handler: &str, args: &str) -> Value {
    let argv = ["call", handler, "--args", args];
    let output = run_cli(env, &argv);
    assert_success(&argv, &output);
    serde_json::from_slice(&output.stdout).expect("call output should be JSON")
}

#[test]
fn call_creates_and_reads_documents() {
    let env = CliTestEnv::new();

    let user_id = call(
        &env,
        "users:create",
        r#"{"email": "a@x.com", "name": "A", "role": "user"}"#,
    );
    let user_id = user_id.as_str().expect("create returns an id").to_string();

    let assistant_id = call(
        &env,
        "assistants:create",
        &format!(r#"{{"name": "Ana", "type": "support", "createdBy": "{user_id}"}}"#),
    );
    let assistant_id = assistant_id.as_str().unwrap().to_string();

    let assistant = call(
        &env,
        "assistants:getById",
        &format!(r#"{{"id": "{assistant_id}"}}"#),
    );
    assert_eq!(assistant["status"], "inactive");

    call(
        &env,
        "users:softDelete",
        &format!(r#"{{"id": "{user_id}"}}"#),
    );

    assert!(env.db_path().exists(), "database should be created under XDG_DATA_HOME");

    let db = Database::open(&env.db_path()).expect("failed to open db");
    let user = db.get_user(&user_id).unwrap().expect("user persisted");
    assert_eq!(user.status, UserStatus::Inactive);
    let stored = db.get_assistant(&assistant_id).unwrap().unwrap();
    assert_eq!(stored.status, AssistantStatus::Inactive);
}

#[test]
fn call_reports_domain_errors() {
    let env = CliTestEnv::new();
    let args = r#"{"email": "dup@x.com", "name": "A", "role": "agent"}"#;
    call(&env, "users:create", args);

    let output = run_cli(&env, &["call", "users:create", "--args", args]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("already exists"),
        "unexpected stderr: {stderr}"
    );

    let output = run_cli(&env, &["call", "users:teleport"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown handler"));
}

#[test]
fn stats_and_info_work_on_seeded_database() {
    let env = CliTestEnv::new();

    let assistant_id = call(
        &env,
        "assistants:create",
        r#"{"name": "Ana", "type": "sales", "createdBy": "owner"}"#,
    );
    let conversation_id = call(
        &env,
        "conversations:create",
        &format!(
            r#"{{"assistantId": {assistant_id}, "platform": "webchat"}}"#
        ),
    );
    call(
        &env,
        "messages:create",
        &format!(
            r#"{{"conversationId": {conversation_id}, "sender": "user", "content": "oi"}}"#
        ),
    );

    let args = ["stats", "--format", "json", "--time-range", "today"];
    let output = run_cli(&env, &args);
    assert_success(&args, &output);
    let stats: Value = serde_json::from_slice(&output.stdout).expect("stats output should be JSON");
    assert_eq!(stats["timeRange"], "today");
    assert_eq!(stats["assistants"]["totalConversations"], 1);
    assert_eq!(stats["conversations"]["byPlatform"]["webchat"], 1);
    assert_eq!(stats["messages"]["total"], 1);

    let output = run_cli(&env, &["stats"]);
    assert_success(&["stats"], &output);
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("Conversations: 1"), "unexpected stats output:\n{text}");

    let output = run_cli(&env, &["info"]);
    assert_success(&["info"], &output);
    let info = String::from_utf8_lossy(&output.stdout);
    assert!(info.contains("Schema:        v1"));
    assert!(info.contains("messages:getContext"));
    assert!(info.contains("by_external_user"));
}

#[test]
fn config_overrides_database_path_and_counter_mode() {
    let env = CliTestEnv::new();
    let custom = env.home.join("custom/store.db");
    env.write_config(&format!(
        "[database]\npath = \"{}\"\n\n[store]\ncounter_mode = \"atomic\"\n",
        custom.display()
    ));

    let output = run_cli(&env, &["info"]);
    assert_success(&["info"], &output);
    let info = String::from_utf8_lossy(&output.stdout);
    assert!(info.contains("Atomic"), "unexpected info output:\n{info}");
    assert!(custom.exists());
    assert!(!env.db_path().exists());
}
