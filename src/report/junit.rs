//! JUnit XML 报告
//!
//! 每个函数一个 `<testsuite>`，每个 suite 至多一个名为 "should succeed"
//! 的 `<testcase>`；跳过的函数只有 suite，没有 case。

use crate::runner::types::{FailureKind, Outcome, TestRun};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CASE_NAME: &str = "should succeed";

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub classname: String,
    /// 秒
    pub time: f64,
    pub output: Option<String>,
    pub failures: Vec<Failure>,
}

impl TestCase {
    pub fn set_duration(&mut self, duration: Duration) -> &mut Self {
        self.time = duration.as_secs_f64();
        self
    }

    pub fn set_output(&mut self, output: impl Into<String>) -> &mut Self {
        self.output = Some(output.into());
        self
    }

    pub fn add_failure(&mut self, message: impl Into<String>, kind: impl Into<String>) -> &mut Self {
        self.failures.push(Failure {
            message: message.into(),
            kind: kind.into(),
        });
        self
    }

    fn is_error(failure: &Failure) -> bool {
        failure.kind == FailureKind::Error.as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestSuite {
    pub name: String,
    pub skipped: bool,
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn add_case(&mut self, name: impl Into<String>, classname: impl Into<String>) -> &mut TestCase {
        self.cases.push(TestCase {
            name: name.into(),
            classname: classname.into(),
            time: 0.0,
            output: None,
            failures: Vec::new(),
        });
        let last = self.cases.len() - 1;
        &mut self.cases[last]
    }

    pub fn mark_skipped(&mut self) -> &mut Self {
        self.skipped = true;
        self
    }

    fn time(&self) -> f64 {
        self.cases.iter().map(|c| c.time).sum()
    }

    fn failures(&self) -> usize {
        self.failure_entries().filter(|f| !TestCase::is_error(f)).count()
    }

    fn errors(&self) -> usize {
        self.failure_entries().filter(|f| TestCase::is_error(f)).count()
    }

    fn failure_entries(&self) -> impl Iterator<Item = &Failure> {
        self.cases.iter().flat_map(|c| &c.failures)
    }
}

/// 报告构建器
#[derive(Debug, Clone)]
pub struct JunitReport {
    suites: Vec<TestSuite>,
    timestamp: DateTime<Utc>,
}

impl Default for JunitReport {
    fn default() -> Self {
        Self::new()
    }
}

impl JunitReport {
    pub fn new() -> Self {
        Self {
            suites: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn add_suite(&mut self, name: impl Into<String>) -> &mut TestSuite {
        self.suites.push(TestSuite {
            name: name.into(),
            skipped: false,
            cases: Vec::new(),
        });
        let last = self.suites.len() - 1;
        &mut self.suites[last]
    }

    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    /// 按记录顺序把一次运行转成报告
    pub fn from_run(run: &TestRun) -> Self {
        let mut report = Self::new();

        for record in run.records() {
            let suite = report.add_suite(&record.identifier);
            if let Outcome::Skipped(_) = record.outcome {
                suite.mark_skipped();
                continue;
            }

            let case = suite.add_case(CASE_NAME, &record.handler);
            case.set_duration(record.duration).set_output(&record.output);
            if let Some((message, kind)) = record.outcome.failure() {
                case.add_failure(message, kind.as_str());
            }
        }

        report
    }

    pub fn serialize(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let tests: usize = self.suites.iter().map(|s| s.cases.len()).sum();
        let failures: usize = self.suites.iter().map(TestSuite::failures).sum();
        let errors: usize = self.suites.iter().map(TestSuite::errors).sum();
        let skipped = self.suites.iter().filter(|s| s.skipped).count();
        let time: f64 = self.suites.iter().map(TestSuite::time).sum();

        let _ = writeln!(
            xml,
            "<testsuites tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{}\">",
            tests, failures, errors, skipped, time
        );

        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        for suite in &self.suites {
            let _ = writeln!(
                xml,
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{}\" timestamp=\"{}\">",
                escape_attr(&suite.name),
                suite.cases.len(),
                suite.failures(),
                suite.errors(),
                usize::from(suite.skipped),
                suite.time(),
                timestamp
            );

            for case in &suite.cases {
                write_case(&mut xml, case);
            }

            xml.push_str("  </testsuite>\n");
        }

        xml.push_str("</testsuites>\n");
        xml
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }
}

fn write_case(xml: &mut String, case: &TestCase) {
    let _ = write!(
        xml,
        "    <testcase name=\"{}\" classname=\"{}\" time=\"{}\"",
        escape_attr(&case.name),
        escape_attr(&case.classname),
        case.time
    );

    if case.failures.is_empty() && case.output.is_none() {
        xml.push_str("/>\n");
        return;
    }
    xml.push_str(">\n");

    for failure in &case.failures {
        let _ = writeln!(
            xml,
            "      <failure message=\"{}\" type=\"{}\"/>",
            escape_attr(&failure.message),
            escape_attr(&failure.kind)
        );
    }

    if let Some(output) = &case.output {
        let _ = writeln!(xml, "      <system-out>{}</system-out>", escape_text(output));
    }

    xml.push_str("    </testcase>\n");
}

/// 属性值转义；换行和制表符写成字符引用，避免解析时被规范化成空格
pub fn escape_attr(text: &str) -> String {
    escape(text, true)
}

/// 元素文本转义；`\r` 写成字符引用，避免解析时被换成 `\n`
pub fn escape_text(text: &str) -> String {
    escape(text, false)
}

/// 丢弃 XML 1.0 不允许的控制字符
fn escape(text: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\r' => escaped.push_str("&#13;"),
            '\n' if attribute => escaped.push_str("&#10;"),
            '\t' if attribute => escaped.push_str("&#9;"),
            '\t' | '\n' => escaped.push(c),
            c if (c as u32) < 0x20 => {}
            c => escaped.push(c),
        }
    }
    escaped
}
