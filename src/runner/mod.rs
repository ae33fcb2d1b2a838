pub mod invoker;
pub mod orchestrator;
pub mod reporter;
pub mod types;

pub use invoker::{HandlerInvoker, Invocation};
pub use orchestrator::{RunOptions, TestOrchestrator};
pub use reporter::ConsoleReporter;
pub use types::{FailureKind, Outcome, SkipReason, TestRecord, TestRun, TestSummary};
