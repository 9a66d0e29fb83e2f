//! Seam for relaying events to other bus instances in a cluster (spec §4.F).
//!
//! Actual cross-process/cross-node transport is out of scope here (spec
//! Non-goals); this is the trait boundary plus a single-node default that
//! always reports itself as leader and never relays anywhere.

use async_trait::async_trait;

use crate::error::Result;
use crate::event::Event;

/// Relays events to peer bus instances and reports cluster membership.
#[async_trait]
pub trait ClusterRelay: Send + Sync {
    async fn relay(&self, event: &Event) -> Result<()>;

    /// Whether this node currently acts as leader for cluster-wide concerns
    /// (e.g. deduplicating relayed events).
    fn is_leader(&self) -> bool;

    fn node_count(&self) -> usize;
}

/// The default relay for a bus with no cluster configured: one node, always
/// leader, nothing ever leaves the process.
pub struct SingleNodeRelay;

#[async_trait]
impl ClusterRelay for SingleNodeRelay {
    async fn relay(&self, _event: &Event) -> Result<()> {
        Ok(())
    }

    fn is_leader(&self) -> bool {
        true
    }

    fn node_count(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_node_relay_is_always_leader() {
        let relay = SingleNodeRelay;
        assert!(relay.is_leader());
        assert_eq!(relay.node_count(), 1);
        relay.relay(&Event::new("test").unwrap()).await.unwrap();
    }
}
