//! Pluggable collaborators the bus dispatches through but does not own the
//! implementation of: semantic routing, context enrichment's neighbors,
//! temporal logging, cluster relay, and reasoning hooks (spec §4.E-§4.G).

pub mod cluster;
pub mod reasoning;
pub mod semantic;
pub mod temporal;

pub use cluster::{ClusterRelay, SingleNodeRelay};
pub use reasoning::{LlmConnector, MockLlmConnector, ReasoningHook, UrgencyReasoningHook};
pub use semantic::{LexicalOverlapRouter, SemanticRouter};
pub use temporal::{InMemoryTemporalLog, TemporalLog};
