pub mod builtin;
pub mod capture;
pub mod cli;
pub mod error;
pub mod handler;
pub mod logger;
pub mod project;
pub mod report;
pub mod runner;

// Re-export commonly used types
pub use error::{HarnessError, Result};
