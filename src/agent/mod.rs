pub mod rag_tool;
pub mod runtime;
pub mod transcript;

pub use runtime::AgentRuntime;
