pub mod command;
pub mod locker;
pub mod runtime;

// Trait-based abstractions for testability
pub mod executor;

pub use executor::{CommandExecutor, RealExecutor};
