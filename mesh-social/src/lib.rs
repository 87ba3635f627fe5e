//! Silent Mesh & Eternal Ledger (C10): separates automatic technical
//! neighbors from user-visible social contacts, stores offline messages
//! at watering-hole gateways, and runs the light-ping reachability probe.
//! C10 is a *consumer* of facade events, never a dependency the router
//! reads during routing decisions.

pub mod error;
pub mod ledger;
pub mod light_ping;
pub mod neighbors;
pub mod watering_hole;

pub use error::{Result, SocialError};
pub use ledger::{EternalLedger, LedgerNode};
pub use light_ping::{run_sweep, select_candidates, DeviceProfile, LightPingConfig, LightPingReport};
pub use neighbors::{PotentialContact, SocialGraph};
pub use watering_hole::{EnvelopeId, WateringHole, WateringHoleEnvelope};

/// Top-level facade composing the ledger (which survives reset), the
/// neighbor/contact graph, and the watering-hole queue (both of which do
/// not).
#[derive(Default)]
pub struct SilentMesh {
    pub ledger: EternalLedger,
    pub graph: SocialGraph,
    pub watering_hole: WateringHole,
}

impl SilentMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity reset: clears mesh neighbors, potential contacts, and the
    /// watering-hole queue, but never the Eternal Ledger.
    pub fn reset(&mut self) {
        self.graph.reset();
        self.watering_hole.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_crypto::Identity;

    #[test]
    fn reset_preserves_ledger_but_clears_social_state() {
        let mut mesh = SilentMesh::new();
        let n1 = Identity::generate().peer_id();
        let n2 = Identity::generate().peer_id();
        mesh.ledger.record_sighting_at(n1.clone(), None, None, None, true, 0);
        mesh.ledger.record_sighting_at(n2.clone(), None, None, None, true, 0);
        mesh.graph.mark_neighbor_seen(n1.clone());
        mesh.watering_hole.store_at("m".into(), n2.clone(), vec![], vec![], 0);

        mesh.reset();

        assert!(mesh.ledger.get(&n1).is_some());
        assert!(mesh.ledger.get(&n2).is_some());
        assert!(!mesh.graph.is_neighbor(&n1));
        assert!(mesh.watering_hole.is_empty());
    }
}
