use crate::capture;
use crate::project::{FunctionDescriptor, load_event};
use crate::report::JunitReport;
use crate::runner::invoker::HandlerInvoker;
use crate::runner::reporter::ConsoleReporter;
use crate::runner::types::{FailureKind, Outcome, SkipReason, TestRecord, TestRun};
use crate::{HarnessError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// 运行选项
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// JUnit 报告输出路径
    pub output_path: Option<PathBuf>,
}

/// 按顺序测试所有函数
///
/// 一次只调用一个 handler：输出捕获是进程级资源，不能并发。
pub struct TestOrchestrator {
    invoker: HandlerInvoker,
    reporter: ConsoleReporter,
}

impl TestOrchestrator {
    pub fn new(invoker: HandlerInvoker) -> Self {
        Self {
            invoker,
            reporter: ConsoleReporter::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: ConsoleReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// 测试所有函数，必要时写出 JUnit 报告
    ///
    /// 单个函数的失败只会记录在结果里；只有报告写入失败会返回错误，
    /// 错误中带着已经完成的统计。
    pub async fn run(&self, descriptors: &[FunctionDescriptor], options: &RunOptions) -> Result<TestRun> {
        if descriptors.is_empty() {
            return Err(HarnessError::NoFunctions);
        }

        let mut run = TestRun::new();
        for descriptor in descriptors {
            let record = self.test_one(descriptor).await;
            self.reporter.print_result(&record);
            run.record(record);
        }
        run.finalize();

        let summary = run.summary();
        self.reporter.print_summary(&summary);
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Test run finished"
        );

        if let Some(path) = &options.output_path {
            JunitReport::from_run(&run)
                .save(path)
                .map_err(|source| HarnessError::ReportWrite {
                    path: path.clone(),
                    source,
                    summary,
                })?;
            self.reporter.print_saved(path);
            run.report_path = Some(path.clone());
        }

        Ok(run)
    }

    /// 运行并返回退出码
    pub async fn run_to_status(&self, descriptors: &[FunctionDescriptor], options: &RunOptions) -> Result<u8> {
        Ok(self.run(descriptors, options).await?.exit_code())
    }

    async fn test_one(&self, descriptor: &FunctionDescriptor) -> TestRecord {
        if let Some(reason) = skip_reason(descriptor) {
            tracing::debug!(function = %descriptor.identifier, reason = %reason, "Skipping function");
            self.reporter.print_skipped(descriptor);
            return TestRecord::skipped(descriptor, reason);
        }

        self.reporter.print_testing(descriptor);

        let event = match load_event(descriptor) {
            Ok(event) => event,
            Err(e) => {
                let message = format!(
                    "Failed to load event {}: {}",
                    descriptor.event_path().display(),
                    e
                );
                return TestRecord::new(
                    descriptor,
                    Outcome::failed(message, FailureKind::Error),
                    Duration::ZERO,
                    String::new(),
                );
            }
        };

        let capture = match capture::begin() {
            Ok(capture) => capture,
            Err(e) => {
                return TestRecord::new(
                    descriptor,
                    Outcome::failed(e.to_string(), FailureKind::Error),
                    Duration::ZERO,
                    String::new(),
                );
            }
        };
        let invocation = self
            .invoker
            .invoke_with_output(descriptor, event, capture.stdout())
            .await;
        let output = capture.end();

        TestRecord::new(descriptor, invocation.outcome, invocation.duration, output)
    }
}

/// 运行时不可执行，或测试配置要求跳过
fn skip_reason(descriptor: &FunctionDescriptor) -> Option<SkipReason> {
    if !descriptor.runtime.is_executable() {
        Some(SkipReason::Runtime(descriptor.runtime.to_string()))
    } else if descriptor.skip_requested() {
        Some(SkipReason::Requested)
    } else {
        None
    }
}
