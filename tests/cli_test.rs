use clap::Parser;
use fntest::HarnessError;
use fntest::cli::{self, Cli};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

// 输出捕获是进程级的，本文件的测试串行执行
static SERIAL: Mutex<()> = Mutex::const_new(());

const MANIFEST: &str = r#"
[project]
name = "demo"

[stages.dev]
[stages.dev.variables]
GREETING = "hello"

[[functions]]
path = "greet/echo"
handler = "builtin/echo.handler"
runtime = "nodejs4.3"

[[functions]]
path = "greet/delay"
handler = "builtin/delay.handler"
runtime = "nodejs4.3"

[[functions]]
path = "greet/fail"
handler = "builtin/fail.handler"
runtime = "nodejs4.3"

[[functions]]
path = "legacy/report"
handler = "legacy/report/main.handler"
runtime = "python2.7"
"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("fntest.toml"), MANIFEST).unwrap();

    let echo = dir.path().join("greet").join("echo");
    let delay = dir.path().join("greet").join("delay");
    let fail = dir.path().join("greet").join("fail");
    for d in [&echo, &delay, &fail] {
        fs::create_dir_all(d).unwrap();
    }
    fs::write(echo.join("event.json"), r#"{"name": "alice"}"#).unwrap();
    fs::write(delay.join("event.json"), r#"{"delay_ms": 10}"#).unwrap();
    fs::write(fail.join("event.json"), r#"{"message": "bad request"}"#).unwrap();

    dir
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("fntest").chain(args.iter().copied())).unwrap()
}

#[tokio::test]
async fn test_cli_runs_all_functions_and_writes_report() {
    let _serial = SERIAL.lock().await;
    let dir = project();
    let out = dir.path().join("reports").join("junit.xml");
    let project_dir = dir.path().to_str().unwrap();
    let out_path = out.to_str().unwrap();

    let cli = parse(&["test", "--all", "--project", project_dir, "--out", out_path]);
    let status = cli::execute(cli, Arc::new(fntest::builtin::registry()))
        .await
        .unwrap();

    // greet/fail 失败，所以退出码非零
    assert_eq!(status, 1);

    let xml = fs::read_to_string(&out).unwrap();
    assert_eq!(xml.matches("<testsuite ").count(), 4);
    assert_eq!(xml.matches("<testcase ").count(), 3);
    assert!(xml.contains("<system-out>{&quot;name&quot;:&quot;alice&quot;}\n</system-out>"));
    assert!(xml.contains("<system-out>waited 10ms\n</system-out>"));
    assert!(xml.contains("<failure message=\"Error: bad request\" type=\"Failed\"/>"));
    assert!(xml.contains("name=\"legacy/report\" tests=\"0\" failures=\"0\" errors=\"0\" skipped=\"1\""));
}

#[tokio::test]
async fn test_cli_selected_paths_succeed() {
    let _serial = SERIAL.lock().await;
    let dir = project();
    let project_dir = dir.path().to_str().unwrap();

    let cli = parse(&["test", "greet/echo", "greet/delay", "--project", project_dir]);
    let status = cli::execute(cli, Arc::new(fntest::builtin::registry()))
        .await
        .unwrap();

    assert_eq!(status, 0);
}

#[tokio::test]
async fn test_cli_requires_selection() {
    let _serial = SERIAL.lock().await;
    let dir = project();
    let project_dir = dir.path().to_str().unwrap();

    let cli = parse(&["test", "--project", project_dir]);
    let err = cli::execute(cli, Arc::new(fntest::builtin::registry()))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HarnessError>(),
        Some(HarnessError::NoFunctions)
    ));
}

#[tokio::test]
async fn test_cli_unknown_stage() {
    let _serial = SERIAL.lock().await;
    let dir = project();
    let project_dir = dir.path().to_str().unwrap();

    let cli = parse(&["test", "--all", "--stage", "prod", "--project", project_dir]);
    let err = cli::execute(cli, Arc::new(fntest::builtin::registry()))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HarnessError>(),
        Some(HarnessError::Config(_))
    ));
}
