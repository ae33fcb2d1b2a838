//! harness 的进程级标准输出
//!
//! 每次拦截有一个递增的代号。handler 通过 `ctx.stdout()` 拿到绑定在本次
//! 调用代号上的 [`Stdout`]：代号仍是当前拦截时写进缓冲区，否则（拦截已经
//! 结束，或者已经换成下一个函数）写到终端。`println!` 和未绑定的
//! [`stdout()`] 始终写到终端，不会被捕获。

use crate::{HarnessError, Result};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

enum Target {
    Terminal,
    Buffer { generation: u64, bytes: Vec<u8> },
}

struct State {
    target: Target,
    next_generation: u64,
}

static STATE: Mutex<State> = Mutex::new(State {
    target: Target::Terminal,
    next_generation: 1,
});

fn state() -> MutexGuard<'static, State> {
    STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 切到新的缓冲区，返回本次拦截的代号；已经在捕获时报错
pub(crate) fn redirect() -> Result<u64> {
    let mut state = state();
    if matches!(state.target, Target::Buffer { .. }) {
        return Err(HarnessError::CaptureActive);
    }
    let generation = state.next_generation;
    state.next_generation += 1;
    state.target = Target::Buffer {
        generation,
        bytes: Vec::new(),
    };
    Ok(generation)
}

/// 切回终端，返回捕获到的字节
pub(crate) fn restore() -> Vec<u8> {
    match std::mem::replace(&mut state().target, Target::Terminal) {
        Target::Buffer { bytes, .. } => bytes,
        Target::Terminal => Vec::new(),
    }
}

#[cfg(test)]
pub(crate) fn is_redirected() -> bool {
    matches!(state().target, Target::Buffer { .. })
}

/// 标准输出的句柄
///
/// 默认值不绑定任何拦截，直接写终端。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stdout {
    generation: Option<u64>,
}

/// 未绑定的句柄，总是写到终端
pub fn stdout() -> Stdout {
    Stdout::default()
}

impl Stdout {
    pub(crate) fn bound(generation: u64) -> Self {
        Self {
            generation: Some(generation),
        }
    }

    /// 所属拦截仍然有效时返回它的缓冲区
    fn with_buffer<R>(&self, on_buffer: impl FnOnce(&mut Vec<u8>) -> R) -> Option<R> {
        let wanted = self.generation?;
        let mut state = state();
        match &mut state.target {
            Target::Buffer { generation, bytes } if *generation == wanted => Some(on_buffer(bytes)),
            _ => {
                tracing::debug!(generation = wanted, "Output after capture ended, writing to terminal");
                None
            }
        }
    }
}

impl Write for Stdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.with_buffer(|bytes| bytes.extend_from_slice(buf)) {
            Some(()) => Ok(buf.len()),
            None => io::stdout().write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.with_buffer(|bytes| bytes.extend_from_slice(buf)) {
            Some(()) => Ok(()),
            None => io::stdout().lock().write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.with_buffer(|_| ()) {
            Some(()) => Ok(()),
            None => io::stdout().flush(),
        }
    }
}

#[doc(hidden)]
pub fn _print(mut out: Stdout, args: fmt::Arguments<'_>) {
    let text = args.to_string();
    // 和 print! 一样忽略写失败
    let _ = out.write_all(text.as_bytes());
}

/// 写到本次调用的标准输出（测试期间会被捕获）
///
/// 第一个参数是 handler 拿到的 `Context`：`out!(ctx, "x = {}", x)`。
#[macro_export]
macro_rules! out {
    ($ctx:expr, $($arg:tt)*) => {
        $crate::capture::stream::_print($ctx.stdout(), format_args!($($arg)*))
    };
}

/// 同 `out!`，末尾加换行
#[macro_export]
macro_rules! outln {
    ($ctx:expr) => {
        $crate::capture::stream::_print($ctx.stdout(), format_args!("\n"))
    };
    ($ctx:expr, $($arg:tt)*) => {
        $crate::capture::stream::_print($ctx.stdout(), format_args!("{}\n", format_args!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_stdout_is_never_buffered() {
        let out = stdout();
        assert_eq!(out.generation, None);
        assert!(out.with_buffer(|_| ()).is_none());
    }
}
