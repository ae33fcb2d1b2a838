use crate::Result;
use crate::capture::ansi::strip_ansi;
use crate::capture::stream::{self, Stdout};

/// 开始拦截 harness 的标准输出
///
/// 同一时间只能有一个拦截，重复调用返回 `CaptureActive`。
pub fn begin() -> Result<CaptureHandle> {
    let generation = stream::redirect()?;
    Ok(CaptureHandle {
        generation,
        active: true,
    })
}

/// 一次拦截的句柄
///
/// `end` 之前被 drop（panic、提前返回）也会恢复终端输出。
#[must_use = "dropping the handle ends the capture and discards its output"]
pub struct CaptureHandle {
    generation: u64,
    active: bool,
}

impl CaptureHandle {
    /// 绑定在本次拦截上的输出句柄，交给被调用的 handler
    pub fn stdout(&self) -> Stdout {
        Stdout::bound(self.generation)
    }

    /// 结束拦截，返回去掉颜色码的文本
    pub fn end(mut self) -> String {
        self.active = false;
        let bytes = stream::restore();
        strip_ansi(&String::from_utf8_lossy(&bytes))
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if self.active {
            let discarded = stream::restore();
            tracing::debug!(bytes = discarded.len(), "Capture dropped before end");
        }
    }
}
