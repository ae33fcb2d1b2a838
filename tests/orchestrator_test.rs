use fntest::handler::{Context, HandlerError, HandlerModule, ModuleRegistry, Returned};
use fntest::project::{FunctionDescriptor, TestConfig};
use fntest::capture::strip_ansi;
use fntest::runner::{
    ConsoleReporter, FailureKind, HandlerInvoker, Outcome, RunOptions, TestOrchestrator,
};
use fntest::{HarnessError, outln};
use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

// 输出捕获是进程级的，本文件的测试串行执行
static SERIAL: Mutex<()> = Mutex::const_new(());

type HandlerReturn = Result<Returned, HandlerError>;

fn orchestrator(registry: ModuleRegistry) -> TestOrchestrator {
    TestOrchestrator::new(HandlerInvoker::new(Arc::new(registry)))
}

/// 收集进度输出，供断言使用
#[derive(Clone, Default)]
struct SharedBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn text(&self) -> String {
        strip_ansi(&String::from_utf8_lossy(&self.0.lock().unwrap()))
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn function(id: &str, timeout_secs: u64) -> FunctionDescriptor {
    FunctionDescriptor::new(id, &format!("{}/index.handler", id))
        .unwrap()
        .with_timeout(Duration::from_secs(timeout_secs))
}

fn skip() -> TestConfig {
    TestConfig {
        skip: true,
        event: None,
    }
}

/// 1 秒后通过 context 成功
fn succeeds_in_one_second(event: Value, ctx: Context) -> HandlerReturn {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        ctx.succeed(event);
    });
    Ok(Returned::deferred())
}

/// 3 秒后才成功
fn hangs_three_seconds(_event: Value, ctx: Context) -> HandlerReturn {
    Ok(Returned::promise(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        outln!(ctx, "finished late");
        Ok(json!("late"))
    }))
}

fn throws(_event: Value, _ctx: Context) -> HandlerReturn {
    Err(HandlerError::named("TypeError", "Cannot read property 'id' of undefined"))
}

#[tokio::test(start_paused = true)]
async fn test_success_timeout_and_skip() {
    let _serial = SERIAL.lock().await;

    let loaded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loaded);

    let mut registry = ModuleRegistry::new();
    registry
        .register("a/index", HandlerModule::new().export("handler", succeeds_in_one_second))
        .register("b/index", HandlerModule::new().export("handler", hangs_three_seconds))
        .register_with("c/index", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerModule::new().export("handler", succeeds_in_one_second))
        });

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("junit.xml");
    let functions = vec![
        function("a", 5),
        function("b", 1),
        function("c", 5).with_test(skip()),
    ];

    let run = orchestrator(registry)
        .run(
            &functions,
            &RunOptions {
                output_path: Some(out.clone()),
            },
        )
        .await
        .unwrap();

    let records = run.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].identifier, "a");
    assert_eq!(records[0].outcome, Outcome::Succeeded);
    assert!(records[0].duration <= Duration::from_secs(5));
    assert_eq!(records[1].identifier, "b");
    assert_eq!(
        records[1].outcome,
        Outcome::TimedOut {
            timeout: Duration::from_secs(1)
        }
    );
    assert_eq!(records[2].identifier, "c");
    assert!(records[2].outcome.is_skipped());

    assert_eq!(run.succeeded(), 1);
    assert_eq!(run.failed(), 1);
    assert_eq!(run.skipped(), 1);
    assert_eq!(run.exit_code(), 1);
    assert!(run.is_finalized());

    // 被跳过的函数不会加载模块
    assert_eq!(loaded.load(Ordering::SeqCst), 0);

    assert_eq!(run.report_path.as_deref(), Some(out.as_path()));
    let xml = fs::read_to_string(&out).unwrap();
    assert!(xml.contains("<failure message=\"Timeout of 1 seconds exceeded\" type=\"Timeout\"/>"));
}

#[tokio::test]
async fn test_sync_failure_does_not_stop_the_run() {
    let _serial = SERIAL.lock().await;

    let mut registry = ModuleRegistry::new();
    registry
        .register("a/index", HandlerModule::new().export("handler", throws))
        .register(
            "c/index",
            HandlerModule::new().export("handler", |event: Value, ctx: Context| -> HandlerReturn {
                ctx.succeed(event);
                Ok(Returned::deferred())
            }),
        );

    // b 的模块不存在，d 的入口函数不存在
    let functions = vec![
        function("a", 5),
        function("b", 5),
        function("c", 5),
        FunctionDescriptor::new("d", "c/index.missing").unwrap(),
    ];

    let run = orchestrator(registry)
        .run(&functions, &RunOptions::default())
        .await
        .unwrap();

    let outcomes: Vec<&Outcome> = run.records().iter().map(|r| &r.outcome).collect();
    assert_eq!(
        outcomes,
        [
            &Outcome::failed(
                "TypeError: Cannot read property 'id' of undefined",
                FailureKind::Error
            ),
            &Outcome::failed("Cannot find module 'b/index'", FailureKind::Error),
            &Outcome::Succeeded,
            &Outcome::failed("Handler function c/index.missing not found", FailureKind::Error),
        ]
    );
    assert_eq!(run.total(), 4);
    assert_eq!(run.succeeded(), 1);
    assert_eq!(run.failed(), 3);
    assert_eq!(run.skipped(), 0);
}

#[tokio::test]
async fn test_non_executable_runtime_is_skipped() {
    let _serial = SERIAL.lock().await;

    let loaded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loaded);
    let mut registry = ModuleRegistry::new();
    registry.register_with("a/index", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(HandlerModule::new().export("handler", throws))
    });

    let functions = vec![
        function("a", 5).with_runtime("python2.7"),
        function("a", 5).with_runtime("java8"),
    ];
    let run = orchestrator(registry)
        .run(&functions, &RunOptions::default())
        .await
        .unwrap();

    assert!(run.records().iter().all(|r| r.outcome.is_skipped()));
    assert_eq!(run.skipped(), 2);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(loaded.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_output_is_captured_per_function() {
    let _serial = SERIAL.lock().await;

    let mut registry = ModuleRegistry::new();
    registry
        .register(
            "a/index",
            HandlerModule::new().export("handler", |_event: Value, ctx: Context| -> HandlerReturn {
                outln!(ctx, "\x1b[32mhello from a\x1b[0m");
                ctx.succeed(json!(null));
                Ok(Returned::deferred())
            }),
        )
        .register("b/index", HandlerModule::new().export("handler", hangs_three_seconds))
        .register(
            "c/index",
            HandlerModule::new().export("handler", |_event: Value, ctx: Context| -> HandlerReturn {
                let callback = ctx.callback();
                tokio::spawn(async move {
                    outln!(ctx, "c before");
                    // 足够让 b 的 promise 本来应该完成的时间过去
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    outln!(ctx, "c after");
                    callback.ok(json!(null));
                });
                Ok(Returned::deferred())
            }),
        );

    let functions = vec![function("a", 5), function("b", 1), function("c", 10)];
    let run = orchestrator(registry)
        .run(&functions, &RunOptions::default())
        .await
        .unwrap();

    let records = run.records();
    assert_eq!(records[0].output, "hello from a\n");
    // b 在超时后被放弃，迟到的输出不会出现在任何记录里
    assert_eq!(records[1].output, "");
    assert_eq!(records[2].output, "c before\nc after\n");
    assert_eq!(records[2].outcome, Outcome::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_late_output_of_timed_out_handler_is_not_attributed() {
    let _serial = SERIAL.lock().await;

    let mut registry = ModuleRegistry::new();
    registry
        .register(
            "a/index",
            HandlerModule::new().export("handler", |_event: Value, ctx: Context| -> HandlerReturn {
                // 自己 spawn 的任务在超时后还会继续运行
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    outln!(ctx, "late output from a");
                });
                Ok(Returned::deferred())
            }),
        )
        .register(
            "b/index",
            HandlerModule::new().export("handler", |_event: Value, ctx: Context| -> HandlerReturn {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    outln!(ctx, "b output");
                    ctx.succeed(json!(null));
                });
                Ok(Returned::deferred())
            }),
        );

    let functions = vec![function("a", 1), function("b", 5)];
    let run = orchestrator(registry)
        .run(&functions, &RunOptions::default())
        .await
        .unwrap();

    let records = run.records();
    assert_eq!(
        records[0].outcome,
        Outcome::TimedOut {
            timeout: Duration::from_secs(1)
        }
    );
    assert_eq!(records[0].output, "");
    assert_eq!(records[1].outcome, Outcome::Succeeded);
    assert_eq!(records[1].output, "b output\n");
}

#[tokio::test]
async fn test_only_context_output_is_captured() {
    let _serial = SERIAL.lock().await;

    let mut registry = ModuleRegistry::new();
    registry.register(
        "a/index",
        HandlerModule::new().export("handler", |_event: Value, ctx: Context| -> HandlerReturn {
            println!("plain println");
            writeln!(fntest::capture::stdout(), "unbound writer").unwrap();
            writeln!(ctx.stdout(), "context writer").unwrap();
            outln!(ctx, "context macro");
            ctx.succeed(json!(null));
            Ok(Returned::deferred())
        }),
    );

    let run = orchestrator(registry)
        .run(&[function("a", 5)], &RunOptions::default())
        .await
        .unwrap();

    assert_eq!(run.records()[0].output, "context writer\ncontext macro\n");
}

#[tokio::test]
async fn test_event_failure_is_reported_after_testing_line() {
    let _serial = SERIAL.lock().await;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("event.json"), "{ broken").unwrap();

    let progress = SharedBuffer::default();
    let orchestrator = TestOrchestrator::new(HandlerInvoker::new(Arc::new(ModuleRegistry::new())))
        .with_reporter(ConsoleReporter::new(false).with_writer(progress.clone()));

    orchestrator
        .run(&[function("bad", 5).in_directory(dir.path())], &RunOptions::default())
        .await
        .unwrap();

    let text = progress.text();
    let testing = text.find("Testing bad...").unwrap();
    let error = text.find(" ERROR  Failed to load event").unwrap();
    assert!(testing < error);
    assert!(text.contains("Tests completed: 0 succeeded / 1 failed / 0 skipped"));
}

#[tokio::test]
async fn test_event_file_is_passed_to_handler() {
    let _serial = SERIAL.lock().await;

    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good");
    let bad = dir.path().join("bad");
    fs::create_dir_all(&good).unwrap();
    fs::create_dir_all(&bad).unwrap();
    fs::write(good.join("input.json"), r#"{"user": "alice"}"#).unwrap();
    fs::write(bad.join("event.json"), "{ broken").unwrap();

    let mut registry = ModuleRegistry::new();
    registry.register(
        "good/index",
        HandlerModule::new().export("handler", |event: Value, ctx: Context| -> HandlerReturn {
            outln!(ctx, "user={}", event["user"].as_str().unwrap_or("?"));
            ctx.succeed(event);
            Ok(Returned::deferred())
        }),
    );

    let functions = vec![
        function("bad", 5).in_directory(&bad),
        function("good", 5)
            .in_directory(&good)
            .with_test(TestConfig {
                skip: false,
                event: Some("input.json".to_string()),
            }),
    ];
    let run = orchestrator(registry)
        .run(&functions, &RunOptions::default())
        .await
        .unwrap();

    let records = run.records();
    match &records[0].outcome {
        Outcome::Failed { message, kind, .. } => {
            assert!(message.starts_with("Failed to load event"));
            assert_eq!(*kind, FailureKind::Error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(records[1].outcome, Outcome::Succeeded);
    assert_eq!(records[1].output, "user=alice\n");
}

#[tokio::test]
async fn test_empty_selection_is_rejected() {
    let err = orchestrator(ModuleRegistry::new())
        .run(&[], &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::NoFunctions));
}

#[tokio::test]
async fn test_report_write_failure_keeps_counters() {
    let _serial = SERIAL.lock().await;

    let mut registry = ModuleRegistry::new();
    registry.register("a/index", HandlerModule::new().export("handler", throws));

    // 输出路径是一个目录，写入必然失败
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        output_path: Some(dir.path().to_path_buf()),
    };

    let err = orchestrator(registry)
        .run(&[function("a", 5), function("b", 5).with_test(skip())], &options)
        .await
        .unwrap_err();

    match err {
        HarnessError::ReportWrite { summary, .. } => {
            assert_eq!(summary.total, 2);
            assert_eq!(summary.failed, 1);
            assert_eq!(summary.skipped, 1);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
