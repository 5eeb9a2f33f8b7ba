//! Scenario testing with mandatory oracles.

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::{RendererFactory, World};

/// Verifies the final world state. Returns a description of the first
/// violated expectation.
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;
