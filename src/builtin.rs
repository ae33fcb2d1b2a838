//! 内置的示例 handler
//!
//! `fntest` 二进制默认注册这些模块，manifest 里可以直接引用，例如
//! `handler = "builtin/echo.handler"`。三个模块分别演示 context、回调和
//! promise 三种完成方式。

use crate::handler::{Context, HandlerError, HandlerModule, ModuleRegistry, Returned};
use crate::outln;
use serde_json::Value;
use std::time::Duration;

pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry
        .register("builtin/echo", HandlerModule::new().export("handler", echo))
        .register("builtin/delay", HandlerModule::new().export("handler", delay))
        .register("builtin/fail", HandlerModule::new().export("handler", fail));
    registry
}

/// 打印事件并原样返回
fn echo(event: Value, ctx: Context) -> Result<Returned, HandlerError> {
    outln!(ctx, "{}", event);
    ctx.succeed(event);
    Ok(Returned::deferred())
}

/// 等待 `delay_ms` 毫秒后通过回调返回事件
fn delay(event: Value, ctx: Context) -> Result<Returned, HandlerError> {
    let delay_ms = event.get("delay_ms").and_then(Value::as_u64).unwrap_or(100);
    let callback = ctx.callback();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        outln!(ctx, "waited {}ms", delay_ms);
        callback.ok(event);
    });
    Ok(Returned::deferred())
}

/// 以事件中的 `message` 失败
fn fail(event: Value, _ctx: Context) -> Result<Returned, HandlerError> {
    let message = event
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Intentional failure")
        .to_string();

    Ok(Returned::promise(async move { Err(HandlerError::new(message)) }))
}
