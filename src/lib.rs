//! # neurobus - in-process publish/subscribe event bus
//!
//! Topic-routed, priority-ordered event dispatch with wildcard and semantic
//! matching, per-handler error isolation, and optional seams for context
//! enrichment, temporal logging, cluster relay, and external reasoning.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use neurobus::{BusConfig, Event, NeuroBus};
//!
//! #[tokio::main]
//! async fn main() -> neurobus::Result<()> {
//!     let bus = NeuroBus::new(BusConfig::default());
//!     bus.start()?;
//!
//!     bus.subscribe("user.*")
//!         .priority(10)
//!         .handler(|event: &Event| {
//!             let topic = event.topic.clone();
//!             async move {
//!                 println!("saw {topic}");
//!                 Ok(())
//!             }
//!         })?;
//!
//!     bus.publish(Event::new("user.login")?).await?;
//!     bus.stop()?;
//!     Ok(())
//! }
//! ```
//!
//! There is no global bus singleton; construct as many [`NeuroBus`]
//! instances as the application needs. [`NeuroBus::run`] and
//! [`NeuroBus::scoped`] offer two different lifecycle-management styles
//! around `start`/`stop`.
//!
//! ## Seams
//!
//! The bus dispatches through several pluggable collaborators, each with a
//! lightweight default so the bus works standalone:
//!
//! - [`seams::SemanticRouter`] - free-text subscription matching
//! - [`context::ContextEngine`] - hierarchical context inheritance
//! - [`seams::TemporalLog`] - a record of recently dispatched events
//! - [`seams::ClusterRelay`] - cross-node event relay
//! - [`seams::ReasoningHook`] - external annotation before dispatch

pub mod bus;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod registry;
pub mod seams;
pub mod subscription;
pub mod topic;

pub use bus::{BusState, NeuroBus, PublishHandle, ScopedBus, SubscribeBuilder};
pub use config::BusConfig;
pub use dispatcher::{DispatchOutcome, DispatchReport, HandlerResult};
pub use error::{Error, Result};
pub use event::{DataMap, Event, EventBuilder};
pub use registry::{Registry, RegistryStats};
pub use subscription::{Filter, FnHandler, Handler, RoutingMode, Subscription, SubscriptionId};

pub use async_trait::async_trait;
pub use serde_json::Value;
