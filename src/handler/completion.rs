//! 完成信号的统一抽象
//!
//! handler 可以用三种方式报告完成：返回 future（promise 风格）、调用
//! `ctx.callback()`（回调风格）、或者直接写 `ctx.succeed/fail/done`
//! （mock context 风格）。三者都归一到 [`Completion`]，调用方只看到
//! 一个 `HandlerResult`。

use crate::handler::context::{HandlerError, HandlerResult};
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::RecvError;
use tokio::task::{JoinError, JoinHandle};

/// promise 风格 handler 返回的 future
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

pub const NO_SIGNAL_MESSAGE: &str = "Handler exited without signaling completion";

/// 一次调用的完成通道
pub struct Completion {
    slot: oneshot::Receiver<HandlerResult>,
    slot_closed: bool,
    promise: Option<JoinHandle<HandlerResult>>,
}

enum Signal {
    Slot(Result<HandlerResult, RecvError>),
    Promise(Result<HandlerResult, JoinError>),
}

impl Completion {
    pub(crate) fn new(slot: oneshot::Receiver<HandlerResult>) -> Self {
        Self {
            slot,
            slot_closed: false,
            promise: None,
        }
    }

    /// 在 harness 自己的任务上驱动 handler 返回的 future
    pub fn drive(&mut self, promise: HandlerFuture) {
        self.promise = Some(tokio::spawn(promise));
    }

    /// 等待第一个完成信号
    pub async fn wait(&mut self) -> HandlerResult {
        loop {
            let signal = match self.promise.as_mut() {
                Some(promise) => tokio::select! {
                    slot = &mut self.slot, if !self.slot_closed => Signal::Slot(slot),
                    joined = promise => Signal::Promise(joined),
                },
                None if self.slot_closed => {
                    return Err(HandlerError::new(NO_SIGNAL_MESSAGE));
                }
                None => Signal::Slot((&mut self.slot).await),
            };

            match signal {
                Signal::Slot(Ok(result)) => return result,
                // 所有 Context 都已释放；如果还有 promise 在跑，继续等它
                Signal::Slot(Err(_)) => self.slot_closed = true,
                Signal::Promise(joined) => {
                    self.promise = None;
                    return from_join(joined);
                }
            }
        }
    }

    /// 放弃等待：终止 harness 驱动的 future
    ///
    /// handler 自己 spawn 的任务不受影响，它们之后的信号会被丢弃。
    pub fn abandon(self) {
        if let Some(promise) = self.promise {
            promise.abort();
        }
    }
}

fn from_join(joined: Result<HandlerResult, JoinError>) -> HandlerResult {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            Err(HandlerError::new(panic_message(payload.as_ref())))
        }
        Err(_) => Err(HandlerError::new("Handler future was cancelled")),
    }
}

/// 从 panic payload 中取出消息
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Handler panicked".to_string()
    }
}
