// Public API for integration tests and potential library usage

pub mod api;
pub mod config;
pub mod error;
pub mod games;
pub mod llm;
pub mod manager;
pub mod registry;
pub mod session;
pub mod store;
