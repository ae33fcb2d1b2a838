use crate::project::FunctionDescriptor;
use crate::runner::types::{Outcome, TestRecord, TestSummary};
use colored::Colorize;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// 终端进度输出
pub struct ConsoleReporter {
    verbose: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            out: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// 把进度写到别处（默认是真正的标准输出）
    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.out = Mutex::new(Box::new(writer));
        self
    }

    fn line(&self, args: fmt::Arguments<'_>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "{}", args);
    }

    pub fn print_skipped(&self, descriptor: &FunctionDescriptor) {
        self.line(format_args!("Skipping {}", descriptor.identifier));
    }

    pub fn print_testing(&self, descriptor: &FunctionDescriptor) {
        self.line(format_args!("Testing {}...", descriptor.identifier));
    }

    /// 打印单个函数的结论
    pub fn print_result(&self, record: &TestRecord) {
        let message = record
            .outcome
            .failure()
            .map(|(message, _)| message)
            .unwrap_or_default();

        match &record.outcome {
            Outcome::Skipped(_) => return,
            Outcome::Succeeded => self.line(format_args!("{}", "Success!".green())),
            Outcome::TimedOut { .. } => {
                self.line(format_args!("{} {}", " TIMEOUT ".on_yellow().black(), message.yellow()));
            }
            Outcome::Failed { .. } => {
                self.line(format_args!("{} {}", " ERROR ".on_red().white(), message.red()));
            }
        }

        // verbose 模式或者失败时，显示捕获的输出
        if (self.verbose || record.outcome.is_failure()) && !record.output.is_empty() {
            for line in record.output.lines() {
                self.line(format_args!("   {}", line.dimmed()));
            }
        }
    }

    /// 打印测试摘要
    pub fn print_summary(&self, summary: &TestSummary) {
        self.line(format_args!(
            "Tests completed: {} / {} / {}",
            format!("{} succeeded", summary.succeeded).green(),
            format!("{} failed", summary.failed).red(),
            format!("{} skipped", summary.skipped).white()
        ));

        if self.verbose {
            self.line(format_args!(
                "  {}: {:.3}s",
                "Duration".bold(),
                summary.total_duration.as_secs_f64()
            ));
        }
    }

    pub fn print_saved(&self, path: &Path) {
        self.line(format_args!("Test results written to {}", path.display()));
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
