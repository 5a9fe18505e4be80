pub mod approval;
pub mod compaction;
pub mod context;
#[path = "loop/mod.rs"]
pub mod agent_loop;
pub mod tools;

pub use agent_loop::{TurnEvent, TurnOutcome, TurnRequest, TurnRunner};
pub use approval::{ApprovalDecision, ApprovalStore};
