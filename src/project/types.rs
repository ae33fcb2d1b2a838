use crate::{HarnessError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// 运行时标签（如 "nodejs4.3"）
///
/// 只有 nodejs 系列的运行时可以在本地执行，其余一律跳过。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Runtime(String);

impl Runtime {
    const EXECUTABLE_FAMILY: &'static str = "nodejs";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_executable(&self) -> bool {
        self.0.starts_with(Self::EXECUTABLE_FAMILY)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Self::EXECUTABLE_FAMILY)
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 函数的测试配置（manifest 中的 `[functions.test]`）
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TestConfig {
    /// 是否跳过该函数
    #[serde(default)]
    pub skip: bool,

    /// 事件文件名，相对函数目录
    #[serde(default)]
    pub event: Option<String>,
}

impl TestConfig {
    pub const DEFAULT_EVENT_FILE: &'static str = "event.json";

    pub fn event_file(&self) -> &str {
        self.event.as_deref().unwrap_or(Self::DEFAULT_EVENT_FILE)
    }
}

/// `<module>.<symbol>` 形式的 handler 字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRef {
    pub module: String,
    pub symbol: String,
}

impl FromStr for HandlerRef {
    type Err = HarnessError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((module, symbol)) if !module.is_empty() && !symbol.is_empty() => Ok(Self {
                module: module.to_string(),
                symbol: symbol.to_string(),
            }),
            _ => Err(HarnessError::Config(format!(
                "Invalid handler '{}': expected <module>.<symbol>",
                s
            ))),
        }
    }
}

/// 一个待测试的函数
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    /// 项目内路径，如 "users/create"
    pub identifier: String,

    /// 原始 handler 字符串，如 "users/create/index.handler"
    pub handler: String,

    /// 模块路径（相对项目根目录）
    pub module: String,

    /// 入口函数名
    pub symbol: String,

    pub runtime: Runtime,

    /// 声明的超时时间
    pub timeout: Duration,

    /// 内存限制（MB），透传给 mock context
    pub memory_size: u32,

    pub test: Option<TestConfig>,

    /// 函数自己的目录，事件文件相对它解析
    pub directory: PathBuf,
}

impl FunctionDescriptor {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 6;
    pub const DEFAULT_MEMORY_SIZE: u32 = 1024;

    /// 用默认值创建描述符（nodejs 运行时，6 秒超时）
    pub fn new(identifier: impl Into<String>, handler: &str) -> Result<Self> {
        let HandlerRef { module, symbol } = handler.parse()?;
        let identifier = identifier.into();

        Ok(Self {
            directory: PathBuf::from(&identifier),
            identifier,
            handler: handler.to_string(),
            module,
            symbol,
            runtime: Runtime::default(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            memory_size: Self::DEFAULT_MEMORY_SIZE,
            test: None,
        })
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Runtime::new(runtime);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_test(mut self, test: TestConfig) -> Self {
        self.test = Some(test);
        self
    }

    pub fn in_directory(mut self, directory: impl AsRef<Path>) -> Self {
        self.directory = directory.as_ref().to_path_buf();
        self
    }

    /// 测试配置是否要求跳过
    pub fn skip_requested(&self) -> bool {
        self.test.as_ref().is_some_and(|t| t.skip)
    }

    /// 事件文件的完整路径
    pub fn event_path(&self) -> PathBuf {
        let file = self
            .test
            .as_ref()
            .map(TestConfig::event_file)
            .unwrap_or(TestConfig::DEFAULT_EVENT_FILE);
        self.directory.join(file)
    }
}
