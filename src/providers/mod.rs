pub mod base;
pub mod command;
pub mod registry;

pub use base::{Agent, TokenSender};
pub use command::CommandAgent;
pub use registry::AgentRegistry;
