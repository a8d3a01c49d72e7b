//! Concrete adapters for the collaborator ports.

pub mod clock;
pub mod in_memory;
pub mod processor;
