pub mod conversation;
pub mod memory;
pub mod query;
