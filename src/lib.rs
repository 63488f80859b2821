pub mod client;
pub mod config;
pub mod domains;
pub mod error;
pub mod extraction;
pub mod interfaces;
pub mod providers;
pub mod runner;
pub mod server;
pub mod services;
pub mod tools;

pub use crate::client::QueryPilot;
pub use crate::config::Config;
pub use crate::domains::memory::{RagContext, SqlExamplePair};
pub use crate::domains::query::{QueryResponse, QueryResult};
pub use crate::error::{QueryPilotError, Result};
pub use crate::interfaces::providers::LlmTurn;
