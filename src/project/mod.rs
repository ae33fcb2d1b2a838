pub mod config;
pub mod discovery;
pub mod event;
pub mod types;

pub use config::{Project, ProjectLoader, ProjectManifest, Stage};
pub use discovery::{Selection, discover};
pub use event::load_event;
pub use types::{FunctionDescriptor, Runtime, TestConfig};
