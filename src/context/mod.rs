//! Hierarchical context storage and event enrichment (spec §4.D).

mod engine;
mod store;

pub use engine::ContextEngine;
pub use store::{ContextScope, ContextStore};
