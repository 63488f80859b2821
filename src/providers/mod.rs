pub mod openai;
pub mod sqlite;
