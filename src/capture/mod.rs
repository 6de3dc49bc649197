//! Crash capture.
//!
//! Everything that turns a panic or a programmatic error into a stored
//! report file: the process-wide runtime snapshot, the report builder, and
//! the panic hook.

pub mod builder;
pub mod hook;
pub mod runtime;

// Re-export commonly used types
pub use builder::ReportBuilder;
pub use hook::install_panic_hook;
pub use runtime::RuntimeInfo;
