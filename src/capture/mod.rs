pub mod ansi;
pub mod interceptor;
pub mod stream;

pub use ansi::strip_ansi;
pub use interceptor::{CaptureHandle, begin};
pub use stream::{Stdout, stdout};
