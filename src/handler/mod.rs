pub mod completion;
pub mod context;
pub mod module;

pub use completion::{Completion, HandlerFuture};
pub use context::{Callback, Context, ContextBuilder, ExecutionMode, HandlerError, HandlerResult};
pub use module::{Handler, HandlerModule, LoadError, ModuleLoader, ModuleRegistry, Returned};
