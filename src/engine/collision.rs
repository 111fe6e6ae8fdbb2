//! Collision check among all on-wire packets (spec §4.7 step 10, §5).
//!
//! The spec names the step but leaves the exact geometric trigger
//! unspecified beyond "among all on-wire packets"; this crate resolves it
//! as a proximity check (packets within [`COLLISION_RADIUS`] of each other
//! anywhere on the network this tick), since wires cross visually even
//! though each wire's own capacity is 1. Documented as an open-question
//! resolution in DESIGN.md.

use crate::ids::PacketId;
use crate::packet::{MessengerType, PacketKind};
use crate::state::GameState;

const COLLISION_RADIUS: f32 = 10.0;
const TROJAN_SHOCKWAVE_NOISE: f32 = 0.5;

impl GameState {
    pub(crate) fn check_collisions(&mut self) {
        let on_wire: Vec<PacketId> = self
            .active_packets
            .iter()
            .filter(|p| p.active && p.current_wire.is_some())
            .map(|p| p.id)
            .collect();

        let mut colliding = Vec::new();
        for i in 0..on_wire.len() {
            for j in (i + 1)..on_wire.len() {
                let a = self.packet(on_wire[i]).expect("id from snapshot");
                let b = self.packet(on_wire[j]).expect("id from snapshot");
                if a.current_position.distance(&b.current_position) <= COLLISION_RADIUS {
                    colliding.push(on_wire[i]);
                    colliding.push(on_wire[j]);
                }
            }
        }
        colliding.sort_unstable_by_key(|id| id.0);
        colliding.dedup();
        for id in colliding {
            self.apply_shockwave(id);
        }
    }

    /// Applies the shockwave reaction from spec §4.4: Small messengers and
    /// Bit packets reverse and flag `retry_destination`; everyone else's
    /// movement vector is pushed by the shockwave; Trojans additionally
    /// gain extra noise.
    fn apply_shockwave(&mut self, id: PacketId) {
        let Some(packet) = self.packet_mut(id) else { return };
        match &packet.kind {
            PacketKind::Messenger { kind: MessengerType::Small } | PacketKind::Bit { .. } => {
                packet.reverse_on_wire();
                packet.retry_destination = true;
            }
            PacketKind::Trojan => {
                packet.noise_level += TROJAN_SHOCKWAVE_NOISE;
                packet.movement_vector = packet.movement_vector.scale(-1.0);
            }
            _ => {
                packet.movement_vector = packet.movement_vector.scale(-1.0);
            }
        }
    }
}
