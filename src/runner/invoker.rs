use crate::capture::{self, Stdout};
use crate::handler::completion::panic_message;
use crate::handler::{Context, ExecutionMode, HandlerResult, ModuleLoader, Returned};
use crate::project::{FunctionDescriptor, Stage};
use crate::runner::types::{FailureKind, Outcome};
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// 一次调用的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub outcome: Outcome,
    pub duration: Duration,
}

/// 加载并调用单个 handler
///
/// 所有失败都在这里转成 `Outcome`，不会向上传播。
pub struct HandlerInvoker {
    loader: Arc<dyn ModuleLoader>,
    stage: Option<Stage>,
}

impl HandlerInvoker {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            stage: None,
        }
    }

    pub fn with_stage(mut self, stage: Option<Stage>) -> Self {
        self.stage = stage;
        self
    }

    /// 调用 handler，输出直接写到终端
    pub async fn invoke(&self, descriptor: &FunctionDescriptor, event: Value) -> Invocation {
        self.invoke_with_output(descriptor, event, capture::stdout()).await
    }

    /// 调用 handler，`ctx.stdout()` 是传入的输出句柄
    pub async fn invoke_with_output(
        &self,
        descriptor: &FunctionDescriptor,
        event: Value,
        output: Stdout,
    ) -> Invocation {
        // 开始计时（包含模块加载）
        let start = Instant::now();

        let module = match self.loader.load(&descriptor.module) {
            Ok(module) => module,
            Err(e) => {
                tracing::warn!(function = %descriptor.identifier, error = %e, "Module failed to load");
                return Invocation {
                    outcome: Outcome::failed(e.to_string(), FailureKind::Error),
                    duration: start.elapsed(),
                };
            }
        };

        let Some(handler) = module.get(&descriptor.symbol) else {
            return Invocation {
                outcome: Outcome::failed(
                    format!("Handler function {} not found", descriptor.handler),
                    FailureKind::Error,
                ),
                duration: start.elapsed(),
            };
        };

        let (ctx, mut completion) = self.context_for(descriptor).stdout(output).build();

        // 同步阶段：返回 Err 或 panic 都算同步失败
        match catch_unwind(AssertUnwindSafe(|| handler.call(event, ctx))) {
            Ok(Ok(Returned::Deferred)) => {}
            Ok(Ok(Returned::Promise(promise))) => completion.drive(promise),
            Ok(Err(e)) => {
                return Invocation {
                    outcome: Outcome::failed(e.to_string(), FailureKind::Error),
                    duration: start.elapsed(),
                };
            }
            Err(payload) => {
                return Invocation {
                    outcome: Outcome::failed(panic_message(payload.as_ref()), FailureKind::Error),
                    duration: start.elapsed(),
                };
            }
        }

        let waited = tokio::time::timeout(descriptor.timeout, completion.wait()).await;
        let duration = start.elapsed();

        match waited {
            Ok(result) => Invocation {
                outcome: classify(result, duration, descriptor.timeout),
                duration,
            },
            Err(_) => {
                tracing::debug!(function = %descriptor.identifier, "Stopped waiting at timeout");
                completion.abandon();
                Invocation {
                    outcome: Outcome::TimedOut {
                        timeout: descriptor.timeout,
                    },
                    duration,
                }
            }
        }
    }

    fn context_for(&self, descriptor: &FunctionDescriptor) -> crate::handler::ContextBuilder {
        let mut builder = Context::builder(&descriptor.identifier)
            .memory_limit(descriptor.memory_size)
            .timeout(descriptor.timeout)
            .mode(ExecutionMode::Test);

        if let Some(stage) = &self.stage {
            builder = builder
                .stage(&stage.name)
                .region(&stage.region)
                .variables(stage.variables.clone());
        }

        builder
    }
}

/// 超时优先于成功，但不覆盖失败
fn classify(result: HandlerResult, duration: Duration, timeout: Duration) -> Outcome {
    let overran = duration > timeout;

    match result {
        Ok(_) if overran => Outcome::TimedOut { timeout },
        Ok(_) => Outcome::Succeeded,
        Err(e) => Outcome::Failed {
            message: e.to_string(),
            kind: FailureKind::Failed,
            overran: overran.then_some(timeout),
        },
    }
}
