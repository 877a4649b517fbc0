pub mod mistral;
pub mod provider;
pub mod types;

pub use mistral::MistralProvider;
pub use provider::{ChatProvider, EmbeddingProvider};
pub use types::{Message, ToolCallRequest, Verification};
