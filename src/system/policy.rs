//! Per-system `processPacket` policies (spec §4.6): the shared default
//! algorithm plus the seven specialized overrides. Every policy is a plain
//! method on [`crate::state::GameState`] dispatching on [`super::SystemKind`],
//! following the teacher's "standalone default function invoked by variant
//! implementations" idiom (spec §9 design note) rather than a trait per kind.

use super::{SystemKind, SystemKindTag};
use crate::error::RuleLoss;
use crate::ids::{PacketId, PortId, SystemId};
use crate::packet::movement::{accel_profile_for_entry, confidential_occupancy_scale};
use crate::packet::{MessengerType, PacketKind, PacketType};
use crate::port::PortShape;
use crate::state::GameState;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Probability a Saboteur converts a zero-noise packet to a Trojan
/// (spec §4.6).
const SABOTEUR_TROJAN_CHANCE: f64 = 0.3;

impl GameState {
    /// `processInputs()` (spec §4.6): release every input-held packet and
    /// dispatch it to the owning system's policy. Landing coins are awarded
    /// once, at wire-arrival time (`transfer_wire_arrivals`), not here.
    pub(crate) fn process_inputs(&mut self, rng: &mut SmallRng) {
        let system_ids: Vec<SystemId> = self.level.systems.iter().map(|s| s.id).collect();
        for system_id in system_ids {
            self.release_and_process_inputs(system_id, rng);
        }
    }

    /// Storage→output flush (spec §4.7 step 9), run as its own pipeline
    /// phase after the second wire push so packets queued into storage
    /// during this tick's input processing drain on the *next* tick
    /// (spec §4.6 Distributor: "subsequent ticks drain them to outputs").
    pub(crate) fn flush_storage_to_outputs(&mut self, rng: &mut SmallRng) {
        let system_ids: Vec<SystemId> = self.level.systems.iter().map(|s| s.id).collect();
        for system_id in system_ids {
            self.flush_one_stored_packet(system_id, rng);
        }
    }

    fn release_and_process_inputs(&mut self, system_id: SystemId, rng: &mut SmallRng) {
        let Some(system) = self.level.system(system_id) else { return };
        if system.is_failed() {
            return;
        }
        let held: Vec<PortId> = system
            .input_ports
            .iter()
            .filter_map(|p| p.current_packet.map(|_| p.id))
            .collect();

        for port_id in held {
            let packet_id = match self
                .level
                .system_mut(system_id)
                .and_then(|s| s.port_mut(port_id))
                .and_then(|p| p.current_packet.take())
            {
                Some(id) => id,
                None => continue,
            };
            self.process_packet(system_id, packet_id, rng);
        }
    }

    fn process_packet(&mut self, system_id: SystemId, packet_id: PacketId, rng: &mut SmallRng) {
        let Some(tag) = self.level.system(system_id).map(|s| s.kind.tag()) else { return };
        match tag {
            SystemKindTag::Normal | SystemKindTag::AntiTrojan => {
                self.process_packet_default(system_id, packet_id, rng)
            }
            SystemKindTag::Reference => self.process_packet_reference(system_id, packet_id),
            SystemKindTag::Spy => self.process_packet_spy(system_id, packet_id, rng),
            SystemKindTag::Saboteur => self.process_packet_saboteur(system_id, packet_id, rng),
            SystemKindTag::Vpn => self.process_packet_vpn(system_id, packet_id, rng),
            SystemKindTag::Distributor => self.process_packet_distributor(system_id, packet_id, rng),
            SystemKindTag::Merger => self.process_packet_merger(system_id, packet_id, rng),
        }
    }

    /// The shared default algorithm (spec §4.6), used directly by Normal and
    /// AntiTrojan (whose only special behavior is the separate scan step)
    /// and as the tail call of Spy/VPN/Distributor's own policies.
    fn process_packet_default(&mut self, system_id: SystemId, packet_id: PacketId, rng: &mut SmallRng) {
        let speed = self.packet(packet_id).map(|p| p.movement_vector.magnitude()).unwrap_or(0.0);
        if speed > self.settings.speed_damage_threshold && !self.level.is_tutorial {
            // A system already recovering from speed damage that takes a
            // second hit fails permanently rather than resetting its timer
            // (spec's Active/Deactivated -> Failed transition names no
            // trigger beyond this escalation path).
            let already_deactivated = self
                .level
                .system(system_id)
                .map(|s| matches!(s.state, super::SystemState::Deactivated { .. }))
                .unwrap_or(false);
            if already_deactivated {
                self.fail_system(system_id);
            } else {
                if let Some(system) = self.level.system_mut(system_id) {
                    system.deactivate(self.settings.speed_damage_deactivation_time);
                }
                log::warn!("system {system_id} deactivated: speed damage from packet {packet_id}");
            }
            self.destroy_packet(packet_id, RuleLoss::DestroyedBySpeedDamage);
            return;
        }

        if self.packet(packet_id).map(|p| p.is_bulk()).unwrap_or(false) {
            self.apply_bulk_side_effects(system_id, rng);
        }

        if let Some(packet) = self.packet(packet_id) {
            if packet.kind.is_confidential() {
                let system_has_others = self.level.system(system_id).map(|s| !s.storage.is_empty()).unwrap_or(false);
                let scale = confidential_occupancy_scale(system_has_others);
                if let Some(packet) = self.packet_mut(packet_id) {
                    packet.movement_vector = packet.movement_vector.scale(scale);
                }
            }
        }

        self.route_or_store_or_destroy(system_id, packet_id, rng);
    }

    /// ReferenceSystem (spec §4.6): finalize delivery exactly once, never
    /// forward. Idempotent by construction — a packet's input-port slot is
    /// taken exactly once per tick, so this fires at most once per packet.
    pub(crate) fn process_packet_reference(&mut self, system_id: SystemId, packet_id: PacketId) {
        if let Some(packet) = self.packet_mut(packet_id) {
            packet.mark_delivered();
        }
        self.remove_packet(packet_id);
        if let Some(system) = self.level.system_mut(system_id) {
            if let SystemKind::Reference { delivered_count, .. } = &mut system.kind {
                *delivered_count += 1;
            }
        }
        self.delivered_count += 1;
        log::info!("packet {packet_id} delivered at reference system {system_id}");
    }

    /// SpySystem (spec §4.6): destroys confidential packets, reverts
    /// protected packets before falling through to Normal routing, and
    /// otherwise teleports with uniform probability to any Spy system in
    /// the level (including itself).
    fn process_packet_spy(&mut self, system_id: SystemId, packet_id: PacketId, rng: &mut SmallRng) {
        let is_confidential = self.packet(packet_id).map(|p| p.kind.is_confidential()).unwrap_or(false);
        if is_confidential {
            log::debug!("packet {packet_id} destroyed by spy system {system_id}");
            self.destroy_packet(packet_id, RuleLoss::DestroyedBySpy);
            return;
        }
        if let Some(packet) = self.packet_mut(packet_id) {
            if let PacketKind::Protected { current, original } = &mut packet.kind {
                *current = *original;
            }
        }

        let spies: Vec<SystemId> = self
            .level
            .systems
            .iter()
            .filter(|s| matches!(s.kind, SystemKind::Spy))
            .map(|s| s.id)
            .collect();
        let target = *spies.choose(rng).unwrap_or(&system_id);
        if target == system_id {
            self.process_packet_default(system_id, packet_id, rng);
            return;
        }

        let packet_type = match self.packet(packet_id) {
            Some(p) => p.packet_type(),
            None => return,
        };
        match self.select_output_port(target, packet_type, rng) {
            Some(port_id) => self.place_packet_on_output_port(target, port_id, packet_id, rng),
            None => {
                if self.level.system(target).map(|s| s.has_storage_space()).unwrap_or(false) {
                    if let Some(system) = self.level.system_mut(target) {
                        system.storage.push(packet_id);
                    }
                } else {
                    self.destroy_packet(packet_id, RuleLoss::NoRoute);
                }
            }
        }
    }

    /// SaboteurSystem (spec §4.6): reverts protected packets, forces or
    /// raises noise, rolls a trojan conversion, then routes to an
    /// *incompatible* output port when possible.
    fn process_packet_saboteur(&mut self, system_id: SystemId, packet_id: PacketId, rng: &mut SmallRng) {
        let mut convertible_to_trojan = true;
        if let Some(packet) = self.packet_mut(packet_id) {
            if let PacketKind::Protected { current, original } = &mut packet.kind {
                *current = *original;
                convertible_to_trojan = false;
            }
            if packet.noise_level == 0.0 {
                packet.noise_level = 1.0;
            }
        }
        if convertible_to_trojan && rng.gen_bool(SABOTEUR_TROJAN_CHANCE) {
            if let Some(packet) = self.packet_mut(packet_id) {
                packet.kind = PacketKind::Trojan;
            }
            log::debug!("packet {packet_id} converted to trojan by saboteur {system_id}");
        }

        let packet_type = match self.packet(packet_id) {
            Some(p) => p.packet_type(),
            None => return,
        };
        match self.select_incompatible_output_port(system_id, packet_type, rng) {
            Some(port_id) => self.place_packet_on_output_port(system_id, port_id, packet_id, rng),
            None => {
                if self.level.system(system_id).map(|s| s.has_storage_space()).unwrap_or(false) {
                    if let Some(system) = self.level.system_mut(system_id) {
                        system.storage.push(packet_id);
                    }
                } else {
                    self.destroy_packet(packet_id, RuleLoss::NoRoute);
                }
            }
        }
    }

    /// VPNSystem (spec §4.6): wraps messengers in Protected and confidential
    /// packets in ConfidentialProtected on the way in, then routes normally.
    /// Reversion on `fail()` is handled by [`crate::system::System::fail`]'s
    /// caller in the tick pipeline.
    fn process_packet_vpn(&mut self, system_id: SystemId, packet_id: PacketId, rng: &mut SmallRng) {
        if let Some(packet) = self.packet_mut(packet_id) {
            match &packet.kind {
                PacketKind::Messenger { kind } => {
                    let original = *kind;
                    packet.kind = PacketKind::Protected { current: original, original };
                    packet.size = packet.size * 2;
                }
                PacketKind::Confidential => {
                    packet.kind = PacketKind::ConfidentialProtected;
                    packet.size = PacketType::ConfidentialProtected.base_size();
                }
                _ => {}
            }
        }
        self.process_packet_default(system_id, packet_id, rng);
    }

    /// DistributorSystem (spec §4.6): unlimited storage; non-bulk packets
    /// route as Normal; bulk packets are split into bit packets after the
    /// usual bulk side effects.
    fn process_packet_distributor(&mut self, system_id: SystemId, packet_id: PacketId, rng: &mut SmallRng) {
        let is_bulk = self.packet(packet_id).map(|p| p.is_bulk()).unwrap_or(false);
        if !is_bulk {
            self.process_packet_default(system_id, packet_id, rng);
            return;
        }
        self.apply_bulk_side_effects(system_id, rng);
        self.split_bulk_into_bits(system_id, packet_id);
    }

    /// MergerSystem (spec §4.6): once a bit group reaches the original
    /// bulk's size, reassembles a bulk packet and routes it normally;
    /// non-bit packets fall through to the default algorithm.
    fn process_packet_merger(&mut self, system_id: SystemId, packet_id: PacketId, rng: &mut SmallRng) {
        let (bulk_id, color, original_size) = match self.packet(packet_id).map(|p| p.kind.clone()) {
            Some(PacketKind::Bit { bulk_packet_id, bulk_packet_color, bulk_group_size }) => {
                (bulk_packet_id, bulk_packet_color, bulk_group_size as usize)
            }
            _ => {
                self.process_packet_default(system_id, packet_id, rng);
                return;
            }
        };
        if let Some(system) = self.level.system_mut(system_id) {
            system.storage.push(packet_id);
        }

        let group: Vec<PacketId> = self
            .level
            .system(system_id)
            .map(|s| {
                s.storage
                    .iter()
                    .copied()
                    .filter(|id| {
                        matches!(
                            self.packet(*id).map(|p| p.kind.clone()),
                            Some(PacketKind::Bit { bulk_packet_id, .. }) if bulk_packet_id == bulk_id
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        if group.len() < original_size {
            return;
        }

        let (position, velocity) = self
            .packet(group[0])
            .map(|p| (p.current_position, p.movement_vector))
            .unwrap_or((crate::geometry::Point2D::new(0.0, 0.0), crate::geometry::Vec2D::ZERO));
        let bulk_type = if original_size >= 10 { PacketType::BulkLarge } else { PacketType::BulkSmall };
        let next_id = self.alloc_packet_id();
        let mut bulk_packet = crate::packet::Packet::from_type(next_id, bulk_type, position, position);
        bulk_packet.movement_vector = velocity;
        bulk_packet.current_position = position;
        self.active_packets.push(bulk_packet);

        if let Some(system) = self.level.system_mut(system_id) {
            system.storage.retain(|id| !group.contains(id));
        }
        for id in &group {
            self.destroy_packet(*id, RuleLoss::DestroyedByBulk);
        }
        log::info!("merger {system_id} reassembled bulk packet {next_id} from {} bits", group.len());
        let _ = color;
        self.process_packet_default(system_id, next_id, rng);
    }

    /// Splits a bulk packet into `size` bit packets sharing its id as
    /// `bulk_packet_id` and a common color, added directly to storage
    /// (spec §4.6 DistributorSystem).
    fn split_bulk_into_bits(&mut self, system_id: SystemId, packet_id: PacketId) {
        let Some(bulk) = self.packet(packet_id) else { return };
        let count = bulk.size;
        let position = bulk.current_position;
        let destination = bulk.destination_position;
        let color = (packet_id.0 % 8) as u8;

        let mut bits = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = self.alloc_packet_id();
            let bit = crate::packet::Packet::new_bit(id, packet_id, color, count, position, destination);
            bits.push(bit);
        }
        for bit in bits {
            let id = bit.id;
            self.active_packets.push(bit);
            if let Some(system) = self.level.system_mut(system_id) {
                system.storage.push(id);
            }
        }
        self.destroy_packet(packet_id, RuleLoss::DestroyedByBulk);
    }

    /// Bulk arrival side effect (spec §4.4, §4.6): destroy every other
    /// packet currently stored at the system and randomly mutate one port's
    /// shape.
    fn apply_bulk_side_effects(&mut self, system_id: SystemId, rng: &mut SmallRng) {
        let stored: Vec<PacketId> = self.level.system(system_id).map(|s| s.storage.clone()).unwrap_or_default();
        if let Some(system) = self.level.system_mut(system_id) {
            system.storage.clear();
        }
        for id in stored {
            self.destroy_packet(id, RuleLoss::DestroyedByBulk);
        }

        if let Some(system) = self.level.system_mut(system_id) {
            let port_count = system.input_ports.len() + system.output_ports.len();
            if port_count == 0 {
                return;
            }
            let idx = rng.gen_range(0..port_count);
            let port = if idx < system.input_ports.len() {
                &mut system.input_ports[idx]
            } else {
                &mut system.output_ports[idx - system.input_ports.len()]
            };
            let choices: Vec<PortShape> = [PortShape::Square, PortShape::Triangle, PortShape::Hexagon]
                .into_iter()
                .filter(|s| *s != port.shape)
                .collect();
            if let Some(new_shape) = choices.choose(rng) {
                port.shape = *new_shape;
            }
        }
    }

    /// Output-port priority selection (spec §4.6 step 4): empty + compatible
    /// first, then any empty port, both restricted to ports whose wire is
    /// active/non-destroyed and whose destination system is active and
    /// non-failed. Ties broken uniformly at random.
    fn select_output_port(&self, system_id: SystemId, packet_type: PacketType, rng: &mut SmallRng) -> Option<PortId> {
        let system = self.level.system(system_id)?;
        let mut compatible = Vec::new();
        let mut any_empty = Vec::new();
        for port in system.output_ports.iter() {
            if port.current_packet.is_some() {
                continue;
            }
            let Some(wire) = self.level.wire_from_output(port.id) else { continue };
            if !wire.active || wire.destroyed {
                continue;
            }
            let Some(dest) = self.level.system_owning_port(wire.destination_port) else { continue };
            if !dest.is_active() || dest.is_failed() {
                continue;
            }
            if port.is_compatible_with_packet(packet_type) {
                compatible.push(port.id);
            } else {
                any_empty.push(port.id);
            }
        }
        compatible.choose(rng).or_else(|| any_empty.choose(rng)).copied()
    }

    /// Saboteur's inverted priority (spec §4.6): the first *incompatible*
    /// output port reachable via an active wire to a live destination;
    /// falls back to any other empty port.
    fn select_incompatible_output_port(
        &self,
        system_id: SystemId,
        packet_type: PacketType,
        rng: &mut SmallRng,
    ) -> Option<PortId> {
        let system = self.level.system(system_id)?;
        let mut incompatible = Vec::new();
        let mut any_empty = Vec::new();
        for port in system.output_ports.iter() {
            if port.current_packet.is_some() {
                continue;
            }
            let Some(wire) = self.level.wire_from_output(port.id) else { continue };
            if !wire.active || wire.destroyed {
                continue;
            }
            let Some(dest) = self.level.system_owning_port(wire.destination_port) else { continue };
            if !dest.is_active() || dest.is_failed() {
                continue;
            }
            if port.is_compatible_with_packet(packet_type) {
                any_empty.push(port.id);
            } else {
                incompatible.push(port.id);
            }
        }
        incompatible.choose(rng).or_else(|| any_empty.choose(rng)).copied()
    }

    fn route_or_store_or_destroy(&mut self, system_id: SystemId, packet_id: PacketId, rng: &mut SmallRng) {
        let packet_type = match self.packet(packet_id) {
            Some(p) => p.packet_type(),
            None => return,
        };
        match self.select_output_port(system_id, packet_type, rng) {
            Some(port_id) => self.place_packet_on_output_port(system_id, port_id, packet_id, rng),
            None => {
                if self.level.system(system_id).map(|s| s.has_storage_space()).unwrap_or(false) {
                    if let Some(system) = self.level.system_mut(system_id) {
                        system.storage.push(packet_id);
                    }
                } else {
                    self.destroy_packet(packet_id, RuleLoss::NoRoute);
                }
            }
        }
    }

    /// Places a packet onto an output port: re-randomizes a Protected
    /// packet's current movement type for the new wire, records the entry
    /// acceleration profile from port compatibility, and applies the 2x
    /// exit-speed multiplier to messengers/protected packets exiting an
    /// incompatible port (spec §4.4, §4.6).
    pub(crate) fn place_packet_on_output_port(
        &mut self,
        system_id: SystemId,
        port_id: PortId,
        packet_id: PacketId,
        rng: &mut SmallRng,
    ) {
        let packet_type = self.packet(packet_id).map(|p| p.packet_type());
        let compatible = self
            .level
            .system(system_id)
            .and_then(|s| s.port(port_id))
            .zip(packet_type)
            .map(|(port, ty)| port.is_compatible_with_packet(ty))
            .unwrap_or(true);

        if let Some(packet) = self.packet_mut(packet_id) {
            if let PacketKind::Protected { current, .. } = &mut packet.kind {
                let cycle = MessengerType::Square.cycle();
                *current = *cycle.choose(rng).expect("cycle is non-empty");
            }
            let (profile, multiplier) = accel_profile_for_entry(&packet.kind, compatible);
            packet.entry_accel = profile;
            packet.base_speed *= multiplier;
            if !compatible && matches!(packet.kind, PacketKind::Messenger { .. } | PacketKind::Protected { .. }) {
                packet.base_speed *= 2.0;
            }
        }

        if let Some(system) = self.level.system_mut(system_id) {
            if let Some(port) = system.port_mut(port_id) {
                port.current_packet = Some(packet_id);
            }
        }
    }

    /// Storage→output flush (spec §4.7 step 9): at most one packet per
    /// system per tick.
    pub(crate) fn flush_one_stored_packet(&mut self, system_id: SystemId, rng: &mut SmallRng) {
        let Some(system) = self.level.system(system_id) else { return };
        if system.is_failed() || system.storage.is_empty() {
            return;
        }
        let packet_id = system.storage[0];
        let packet_type = match self.packet(packet_id) {
            Some(p) => p.packet_type(),
            None => {
                if let Some(system) = self.level.system_mut(system_id) {
                    system.storage.retain(|id| *id != packet_id);
                }
                return;
            }
        };
        if let Some(port_id) = self.select_output_port(system_id, packet_type, rng) {
            if let Some(system) = self.level.system_mut(system_id) {
                system.storage.retain(|id| *id != packet_id);
            }
            self.place_packet_on_output_port(system_id, port_id, packet_id, rng);
        }
    }

    /// Marks a packet lost and keeps it in `active_packets` for cleanup to
    /// count and remove, rather than removing it here mid-processing (spec
    /// §4.7 step 11 owns count/removal).
    pub(crate) fn destroy_packet(&mut self, packet_id: PacketId, reason: RuleLoss) {
        if let Some(packet) = self.packet_mut(packet_id) {
            packet.mark_lost(reason);
        }
    }

    /// Permanently fails a system (spec §4.6 state machine): every packet
    /// en route on a wire terminating here, and every packet held in an
    /// input port, is returned to its source (reversed); a VPN additionally
    /// reverts every protected packet it's holding back to its wrapped
    /// original. Callable by an external caller (e.g. an editor) as well as
    /// internally on repeated speed damage.
    pub fn fail_system(&mut self, system_id: SystemId) {
        let is_vpn = matches!(self.level.system(system_id).map(|s| &s.kind), Some(SystemKind::Vpn));

        let incoming_wires: Vec<PacketId> = self
            .level
            .wires
            .iter()
            .filter(|w| self.level.system_owning_port(w.destination_port).map(|s| s.id) == Some(system_id))
            .filter_map(|w| w.packet_on_wire)
            .collect();
        for packet_id in incoming_wires {
            if let Some(packet) = self.packet_mut(packet_id) {
                packet.reverse_on_wire();
            }
        }

        let held_inputs: Vec<(PortId, PacketId)> = self
            .level
            .system(system_id)
            .map(|s| s.input_ports.iter().filter_map(|p| p.current_packet.map(|pid| (p.id, pid))).collect())
            .unwrap_or_default();
        for (port_id, packet_id) in held_inputs {
            if let Some(system) = self.level.system_mut(system_id) {
                if let Some(port) = system.port_mut(port_id) {
                    port.current_packet = None;
                }
            }
            if let Some(wire) = self.level.wires.iter_mut().find(|w| w.destination_port == port_id) {
                wire.packet_on_wire = Some(packet_id);
            }
            if let Some(packet) = self.packet_mut(packet_id) {
                packet.reverse_on_wire();
            }
        }

        if is_vpn {
            self.revert_vpn_protected_packets(system_id);
        }

        if let Some(system) = self.level.system_mut(system_id) {
            system.fail();
        }
        log::warn!("system {system_id} failed permanently");
    }

    /// VPN-specific `fail()` side effect (spec §4.6): every Protected packet
    /// currently in storage or a port unwraps back to its original
    /// messenger type; ConfidentialProtected unwraps back to Confidential.
    fn revert_vpn_protected_packets(&mut self, system_id: SystemId) {
        let ids: Vec<PacketId> = self
            .level
            .system(system_id)
            .map(|s| {
                s.storage
                    .iter()
                    .copied()
                    .chain(s.input_ports.iter().chain(s.output_ports.iter()).filter_map(|p| p.current_packet))
                    .collect()
            })
            .unwrap_or_default();
        for packet_id in ids {
            if let Some(packet) = self.packet_mut(packet_id) {
                match packet.kind {
                    PacketKind::Protected { original, .. } => {
                        packet.kind = PacketKind::Messenger { kind: original };
                        packet.size = original.as_packet_type().base_size();
                    }
                    PacketKind::ConfidentialProtected => {
                        packet.kind = PacketKind::Confidential;
                        packet.size = PacketType::Confidential.base_size();
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;
    use crate::level::GameLevel;
    use crate::packet::Packet;
    use crate::state::{GameState, Settings};
    use crate::system::System;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(0)
    }

    fn lone_system(kind: SystemKind) -> GameState {
        let mut level = GameLevel::new("p", "Policy", 1000.0, 60.0);
        level.systems.push(System::new(SystemId(0), Point2D::new(0.0, 0.0), kind));
        GameState::new(level, Settings::default())
    }

    #[test]
    fn vpn_wraps_a_messenger_in_protected_and_doubles_its_size() {
        let mut state = lone_system(SystemKind::Vpn);
        let packet = Packet::new_messenger(PacketId(0), MessengerType::Square, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0));
        let original_size = packet.size;
        state.active_packets.push(packet);

        state.process_packet_vpn(SystemId(0), PacketId(0), &mut rng());

        let packet = state.packet(PacketId(0)).unwrap();
        assert!(matches!(packet.kind, PacketKind::Protected { original: MessengerType::Square, .. }));
        assert_eq!(packet.size, original_size * 2);
        assert_eq!(packet.coin_value, PacketType::SquareMessenger.base_coin_value(), "wrapping must not change the coin value");
    }

    #[test]
    fn vpn_wraps_confidential_into_confidential_protected() {
        let mut state = lone_system(SystemKind::Vpn);
        state.active_packets.push(Packet::new_confidential(PacketId(0), Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0)));

        state.process_packet_vpn(SystemId(0), PacketId(0), &mut rng());

        let packet = state.packet(PacketId(0)).unwrap();
        assert!(matches!(packet.kind, PacketKind::ConfidentialProtected));
        assert_eq!(packet.size, PacketType::ConfidentialProtected.base_size());
    }

    #[test]
    fn spy_destroys_a_confidential_packet() {
        let mut state = lone_system(SystemKind::Spy);
        state.active_packets.push(Packet::new_confidential(PacketId(0), Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0)));

        state.process_packet_spy(SystemId(0), PacketId(0), &mut rng());

        let packet = state.packet(PacketId(0)).unwrap();
        assert!(packet.is_lost());
        assert_eq!(packet.lost, Some(RuleLoss::DestroyedBySpy));
    }

    #[test]
    fn a_lone_spy_falls_through_to_default_routing_instead_of_teleporting_to_itself() {
        let mut state = lone_system(SystemKind::Spy);
        let packet = Packet::new_protected(PacketId(0), MessengerType::Square, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0));
        state.active_packets.push(packet);

        state.process_packet_spy(SystemId(0), PacketId(0), &mut rng());

        // No output ports and empty storage: default routing stores it rather
        // than teleporting back to the only spy in the level (itself).
        let packet = state.packet(PacketId(0)).unwrap();
        assert!(packet.active);
        assert!(state.level.system(SystemId(0)).unwrap().storage.contains(&PacketId(0)));
    }

    #[test]
    fn saboteur_reverts_a_protected_packet_and_forces_nonzero_noise() {
        let mut state = lone_system(SystemKind::Saboteur);
        let packet = Packet::new_protected(PacketId(0), MessengerType::Triangle, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0));
        state.active_packets.push(packet);

        state.process_packet_saboteur(SystemId(0), PacketId(0), &mut rng());

        let packet = state.packet(PacketId(0)).unwrap();
        assert!(matches!(packet.kind, PacketKind::Protected { current: MessengerType::Triangle, original: MessengerType::Triangle }));
        assert_eq!(packet.noise_level, 1.0);
    }

    #[test]
    fn merger_waits_until_a_full_bit_group_before_reassembling() {
        let mut state = lone_system(SystemKind::Merger);
        for i in 0..7u64 {
            state.active_packets.push(Packet::new_bit(PacketId(i), PacketId(100), 0, 8, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0)));
        }
        for i in 0..7u64 {
            state.process_packet_merger(SystemId(0), PacketId(i), &mut rng());
        }
        assert!(state.active_packets.iter().all(|p| matches!(p.kind, PacketKind::Bit { .. })), "not yet a full group of 8");

        state.active_packets.push(Packet::new_bit(PacketId(7), PacketId(100), 0, 8, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0)));
        state.process_packet_merger(SystemId(0), PacketId(7), &mut rng());

        assert!(state.active_packets.iter().any(|p| matches!(p.kind, PacketKind::BulkSmall)), "8 bits must reassemble into a BulkSmall");
        assert!(
            !state.active_packets.iter().any(|p| matches!(p.kind, PacketKind::Bit { .. }) && p.active),
            "consumed bits must not remain active"
        );
    }

    #[test]
    fn merger_does_not_prematurely_reassemble_a_ten_bit_bulklarge_group_at_eight() {
        let mut state = lone_system(SystemKind::Merger);
        for i in 0..8u64 {
            state.active_packets.push(Packet::new_bit(PacketId(i), PacketId(200), 0, 10, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0)));
        }
        for i in 0..8u64 {
            state.process_packet_merger(SystemId(0), PacketId(i), &mut rng());
        }
        assert!(
            !state.active_packets.iter().any(|p| p.is_bulk()),
            "a 10-bit group must not reassemble once only 8 bits have arrived"
        );
        assert_eq!(
            state.active_packets.iter().filter(|p| matches!(p.kind, PacketKind::Bit { .. }) && p.active).count(),
            8,
            "all 8 arrived bits must still be waiting in storage, none orphaned"
        );

        for i in 8..10u64 {
            state.active_packets.push(Packet::new_bit(PacketId(i), PacketId(200), 0, 10, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0)));
            state.process_packet_merger(SystemId(0), PacketId(i), &mut rng());
        }
        assert!(state.active_packets.iter().any(|p| matches!(p.kind, PacketKind::BulkLarge)), "10 bits must reassemble into a BulkLarge");
    }

    #[test]
    fn distributor_splits_a_bulk_packet_into_matching_bits() {
        let mut state = lone_system(SystemKind::Distributor);
        let bulk = Packet::new_bulk_small(PacketId(0), Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0));
        let expected_bits = bulk.size;
        state.active_packets.push(bulk);

        state.process_packet_distributor(SystemId(0), PacketId(0), &mut rng());

        let bit_count = state.active_packets.iter().filter(|p| matches!(p.kind, PacketKind::Bit { .. }) && p.active).count();
        assert_eq!(bit_count, expected_bits as usize);
        assert!(state.packet(PacketId(0)).map(|p| !p.active).unwrap_or(true), "the original bulk packet is consumed");
    }

    #[test]
    fn failing_a_vpn_reverts_its_stored_protected_packets() {
        let mut state = lone_system(SystemKind::Vpn);
        let packet = Packet::new_protected(PacketId(0), MessengerType::Triangle, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0));
        let original_size = packet.size;
        state.active_packets.push(packet);
        state.level.systems[0].storage.push(PacketId(0));

        state.fail_system(SystemId(0));

        let packet = state.packet(PacketId(0)).unwrap();
        assert!(matches!(packet.kind, PacketKind::Messenger { kind: MessengerType::Triangle }));
        assert_eq!(packet.size, original_size);
        assert!(state.level.system(SystemId(0)).unwrap().is_failed());
    }

    #[test]
    fn a_second_speed_damage_hit_while_deactivated_fails_the_system_permanently() {
        let mut state = lone_system(SystemKind::Normal);
        state.level.systems[0].deactivate(state.settings.speed_damage_deactivation_time);

        let mut fast_packet = Packet::new_messenger(PacketId(0), MessengerType::Square, Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0));
        fast_packet.movement_vector = crate::geometry::Vec2D::new(state.settings.speed_damage_threshold + 1.0, 0.0);
        state.active_packets.push(fast_packet);

        state.process_packet_default(SystemId(0), PacketId(0), &mut rng());

        assert!(state.level.system(SystemId(0)).unwrap().is_failed());
    }
}
