use std::io::Write;
use std::process::{Command, Stdio};

fn devopsbot() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_devopsbot"));
    for var in [
        "MODEL_ID",
        "JIRA_URL",
        "JIRA_USERNAME",
        "JIRA_API_TOKEN",
        "GITHUB_TOKEN",
        "GITHUB_SECRET",
        "WORKFLOW_ENGINE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = devopsbot().arg("init").current_dir(dir.path()).output().unwrap();
    assert!(
        output.status.success(),
        "devopsbot init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let content = std::fs::read_to_string(dir.path().join(".devopsbot.toml")).unwrap();
    assert!(content.contains("[jira]"));
    assert!(content.contains("[incident]"));

    let config: devopsbot_core::BotConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(config.workflow.engine, devopsbot_core::WorkflowEngine::Local);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".devopsbot.toml"), "# existing").unwrap();

    let output = devopsbot().arg("init").current_dir(dir.path()).output().unwrap();
    assert!(!output.status.success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".devopsbot.toml")).unwrap(),
        "# existing"
    );
}

#[test]
fn flow_show_prints_incident_graph() {
    let output = devopsbot().args(["flow", "show", "incident"]).output().unwrap();
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(graph["type"], "chain");
    assert_eq!(graph["steps"][0]["type"], "parallel");
    assert_eq!(graph["steps"][0]["result_path"], "$.parallelResults");
}

#[test]
fn flow_show_prints_kanban_choice() {
    let output = devopsbot().args(["flow", "show", "kanban"]).output().unwrap();
    assert!(output.status.success());

    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("jira-task-review"));
    assert!(text.contains("jira-subtask-split"));
}

#[test]
fn dry_run_trigger_does_not_need_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = devopsbot()
        .args(["--dry-run", "kanban", "trigger"])
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"Records":[{"Sns":{"Message":"{\"automationData\":{\"taskKey\":\"OPS-3\"}}"}}]}"#)
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "trigger failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["statusCode"], 200);
}

#[test]
fn missing_setting_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = devopsbot()
        .args(["kanban", "review", "OPS-1"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("JIRA_USERNAME"));
}
