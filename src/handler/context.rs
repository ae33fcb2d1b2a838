use crate::capture::Stdout;
use crate::handler::completion::Completion;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// handler 的执行结果
pub type HandlerResult = Result<Value, HandlerError>;

/// handler 报告的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// 错误名，默认 "Error"
    pub name: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::named("Error", message)
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::named("SyntaxError", err.to_string())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// 执行模式，显式传给 handler，替代进程级的环境变量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// 普通的本地调用
    #[default]
    Local,
    /// 由测试 harness 调用
    Test,
}

/// mock 运行时上下文
///
/// 可以随意 clone 并移动到其他任务中；第一次完成信号生效，
/// 之后的信号（包括超时之后到达的）会被丢弃。
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    function_name: String,
    function_version: String,
    invoked_function_arn: String,
    memory_limit_in_mb: u32,
    aws_request_id: String,
    log_group_name: String,
    log_stream_name: String,
    deadline: Instant,
    mode: ExecutionMode,
    stage: Option<String>,
    variables: HashMap<String, String>,
    stdout: Stdout,
    slot: Mutex<Option<oneshot::Sender<HandlerResult>>>,
}

impl Context {
    pub fn builder(function_name: impl Into<String>) -> ContextBuilder {
        ContextBuilder::new(function_name)
    }

    pub fn function_name(&self) -> &str {
        &self.inner.function_name
    }

    pub fn function_version(&self) -> &str {
        &self.inner.function_version
    }

    pub fn invoked_function_arn(&self) -> &str {
        &self.inner.invoked_function_arn
    }

    pub fn memory_limit_in_mb(&self) -> u32 {
        self.inner.memory_limit_in_mb
    }

    pub fn aws_request_id(&self) -> &str {
        &self.inner.aws_request_id
    }

    pub fn log_group_name(&self) -> &str {
        &self.inner.log_group_name
    }

    pub fn log_stream_name(&self) -> &str {
        &self.inner.log_stream_name
    }

    /// 距离超时还剩多少时间
    pub fn remaining_time(&self) -> Duration {
        self.inner.deadline.saturating_duration_since(Instant::now())
    }

    pub fn mode(&self) -> ExecutionMode {
        self.inner.mode
    }

    pub fn is_test(&self) -> bool {
        self.inner.mode == ExecutionMode::Test
    }

    pub fn stage(&self) -> Option<&str> {
        self.inner.stage.as_deref()
    }

    /// 当前阶段的变量
    pub fn variable(&self, key: &str) -> Option<&str> {
        self.inner.variables.get(key).map(String::as_str)
    }

    /// 本次调用的标准输出
    ///
    /// 测试期间写入会被捕获；调用超时之后再写会直接到终端。
    pub fn stdout(&self) -> Stdout {
        self.inner.stdout
    }

    /// 成功完成
    pub fn succeed(&self, value: Value) -> bool {
        self.done(Ok(value))
    }

    /// 以错误完成
    pub fn fail(&self, err: impl Into<HandlerError>) -> bool {
        self.done(Err(err.into()))
    }

    /// 提交完成信号，返回该信号是否被 harness 接收
    pub fn done(&self, result: HandlerResult) -> bool {
        let sender = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(sender) => {
                let accepted = sender.send(result).is_ok();
                if !accepted {
                    tracing::debug!(
                        function = %self.inner.function_name,
                        "Completion signal arrived after the harness stopped waiting"
                    );
                }
                accepted
            }
            None => {
                tracing::debug!(
                    function = %self.inner.function_name,
                    "Ignoring repeated completion signal"
                );
                false
            }
        }
    }

    /// 回调风格的完成句柄
    pub fn callback(&self) -> Callback {
        Callback { ctx: self.clone() }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("function_name", &self.inner.function_name)
            .field("aws_request_id", &self.inner.aws_request_id)
            .field("mode", &self.inner.mode)
            .finish_non_exhaustive()
    }
}

/// 回调风格的完成句柄，相当于 `callback(err, result)`
pub struct Callback {
    ctx: Context,
}

impl Callback {
    pub fn call(self, result: HandlerResult) -> bool {
        self.ctx.done(result)
    }

    pub fn ok(self, value: Value) -> bool {
        self.call(Ok(value))
    }

    pub fn err(self, err: impl Into<HandlerError>) -> bool {
        self.call(Err(err.into()))
    }
}

/// 上下文构建器
pub struct ContextBuilder {
    function_name: String,
    memory_limit_in_mb: u32,
    timeout: Duration,
    region: String,
    mode: ExecutionMode,
    stage: Option<String>,
    variables: HashMap<String, String>,
    stdout: Stdout,
}

impl ContextBuilder {
    const ACCOUNT_ID: &'static str = "123456789012";

    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            memory_limit_in_mb: 128,
            timeout: Duration::from_secs(3),
            region: "us-east-1".to_string(),
            mode: ExecutionMode::default(),
            stage: None,
            variables: HashMap::new(),
            stdout: Stdout::default(),
        }
    }

    pub fn memory_limit(mut self, mb: u32) -> Self {
        self.memory_limit_in_mb = mb;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn stdout(mut self, stdout: Stdout) -> Self {
        self.stdout = stdout;
        self
    }

    /// 构建上下文以及与之绑定的完成通道
    pub fn build(self) -> (Context, Completion) {
        let (tx, rx) = oneshot::channel();

        // ARN 和日志组名里不能出现 '/'
        let name = self.function_name.replace('/', "-");
        let alias = self.stage.as_deref().unwrap_or("$LATEST");
        let request_id = uuid::Uuid::new_v4().to_string();
        let log_stream_name = format!(
            "{}/[$LATEST]{}",
            chrono::Utc::now().format("%Y/%m/%d"),
            request_id.replace('-', "")
        );

        let inner = ContextInner {
            invoked_function_arn: format!(
                "arn:aws:lambda:{}:{}:function:{}:{}",
                self.region,
                Self::ACCOUNT_ID,
                name,
                alias
            ),
            log_group_name: format!("/aws/lambda/{}", name),
            log_stream_name,
            function_name: name,
            function_version: "$LATEST".to_string(),
            memory_limit_in_mb: self.memory_limit_in_mb,
            aws_request_id: request_id,
            deadline: Instant::now() + self.timeout,
            mode: self.mode,
            stage: self.stage,
            variables: self.variables,
            stdout: self.stdout,
            slot: Mutex::new(Some(tx)),
        };

        (
            Context {
                inner: Arc::new(inner),
            },
            Completion::new(rx),
        )
    }
}
