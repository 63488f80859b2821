pub mod providers;
pub mod stores;
pub mod tools;
