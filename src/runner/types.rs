use crate::project::FunctionDescriptor;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 失败类型，对应 JUnit failure 的 type 属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 加载失败或同步失败
    Error,
    /// handler 异步报告的错误
    Failed,
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Error => "Error",
            FailureKind::Failed => "Failed",
            FailureKind::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 跳过原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 运行时不能本地执行
    Runtime(String),
    /// 测试配置要求跳过
    Requested,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Runtime(runtime) => write!(f, "runtime {} is not executable", runtime),
            SkipReason::Requested => f.write_str("skip requested by test config"),
        }
    }
}

/// 单个函数的测试结论
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Skipped(SkipReason),
    Succeeded,
    TimedOut {
        timeout: Duration,
    },
    Failed {
        message: String,
        kind: FailureKind,
        /// 失败的同时也超过了超时时间
        overran: Option<Duration>,
    },
}

impl Outcome {
    pub fn failed(message: impl Into<String>, kind: FailureKind) -> Self {
        Outcome::Failed {
            message: message.into(),
            kind,
            overran: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    /// 计入 failed 计数（超时也算失败）
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::TimedOut { .. } | Outcome::Failed { .. })
    }

    /// 失败消息和类型；成功和跳过返回 None
    pub fn failure(&self) -> Option<(String, FailureKind)> {
        match self {
            Outcome::Skipped(_) | Outcome::Succeeded => None,
            Outcome::TimedOut { timeout } => {
                Some((timeout_message(*timeout), FailureKind::Timeout))
            }
            Outcome::Failed {
                message,
                kind,
                overran: None,
            } => Some((message.clone(), *kind)),
            Outcome::Failed {
                message,
                kind,
                overran: Some(timeout),
            } => Some((
                format!(
                    "{} (timeout of {} seconds also exceeded)",
                    message,
                    format_secs(*timeout)
                ),
                *kind,
            )),
        }
    }
}

pub fn timeout_message(timeout: Duration) -> String {
    format!("Timeout of {} seconds exceeded", format_secs(timeout))
}

/// 整数秒不带小数
fn format_secs(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        duration.as_secs().to_string()
    } else {
        format!("{:.3}", duration.as_secs_f64())
    }
}

/// 单个函数的执行记录
#[derive(Debug, Clone)]
pub struct TestRecord {
    /// 函数路径（如 "users/create"）
    pub identifier: String,

    /// handler 字符串
    pub handler: String,

    pub outcome: Outcome,

    /// 执行耗时
    pub duration: Duration,

    /// 捕获到的标准输出
    pub output: String,
}

impl TestRecord {
    pub fn new(
        descriptor: &FunctionDescriptor,
        outcome: Outcome,
        duration: Duration,
        output: String,
    ) -> Self {
        Self {
            identifier: descriptor.identifier.clone(),
            handler: descriptor.handler.clone(),
            outcome,
            duration,
            output,
        }
    }

    pub fn skipped(descriptor: &FunctionDescriptor, reason: SkipReason) -> Self {
        Self::new(
            descriptor,
            Outcome::Skipped(reason),
            Duration::ZERO,
            String::new(),
        )
    }
}

/// 一次测试运行的全部记录
///
/// 只由 orchestrator 的顺序循环追加；finalize 之后不再变化。
#[derive(Debug, Clone, Default)]
pub struct TestRun {
    records: Vec<TestRecord>,
    total: usize,
    succeeded: usize,
    failed: usize,
    finalized: bool,

    /// JUnit 报告的写入位置（如果写了）
    pub report_path: Option<PathBuf>,
}

impl TestRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条记录并更新计数
    pub fn record(&mut self, record: TestRecord) {
        debug_assert!(!self.finalized, "record appended to a finalized run");

        self.total += 1;
        if record.outcome.is_success() {
            self.succeeded += 1;
        } else if record.outcome.is_failure() {
            self.failed += 1;
        }
        self.records.push(record);
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn skipped(&self) -> usize {
        self.total - self.succeeded - self.failed
    }

    pub fn summary(&self) -> TestSummary {
        TestSummary {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped(),
            total_duration: self.records.iter().map(|r| r.duration).sum(),
        }
    }

    /// 进程退出码：有失败时非零
    pub fn exit_code(&self) -> u8 {
        if self.failed > 0 { 1 } else { 0 }
    }
}

/// 测试摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration: Duration,
}
