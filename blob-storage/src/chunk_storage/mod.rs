pub mod local;
pub mod memory;
pub mod rocks;
pub mod store;
