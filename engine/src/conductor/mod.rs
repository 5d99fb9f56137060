//! Conductor System
//!
//! Sub-engines the router can delegate to (planning, research) and the
//! long-term memory they and the orchestrator draw on.

pub mod memory;
pub mod planner;
pub mod researcher;

pub use memory::{InMemoryStore, MemoryStore};
pub use planner::{Plan, Planner};
pub use researcher::{Researcher, SearchProvider};
