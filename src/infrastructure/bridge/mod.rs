//! Event bridge adapters

pub mod in_memory;

pub use in_memory::InMemoryEventBridge;
