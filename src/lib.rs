pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod ingest;
pub mod llm;
pub mod retrieval;
pub mod server;
pub mod state;
pub mod verify;
