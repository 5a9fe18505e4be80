pub mod backends;
pub mod base;
pub mod catalog;
pub mod executor;
pub mod google;
pub mod messaging;
pub mod parser;
pub mod setup;
pub mod slack;

pub use base::{ExecutionContext, ToolCall, ToolResult};
pub use executor::ToolExecutor;
pub use setup::build_executor;
