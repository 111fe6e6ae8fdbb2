//! The fixed per-tick pipeline (spec §4.7) and end-of-level/game-over
//! predicates (spec §4.8), both run from [`super::Engine::tick`] and
//! [`super::Engine::time_travel_to`].

use crate::error::{GameOverReason, RuleLoss};
use crate::geometry::Point2D;
use crate::ids::{PacketId, WireId};
use crate::packet::kind::MessengerType;
use crate::packet::movement::{advance_on_wire, confidential_protected_speed_scale};
use crate::packet::{PacketKind, PacketType};
use crate::state::GameState;
use crate::system::SystemKind;
use rand::rngs::SmallRng;

/// Distance from an on-wire packet to its destination port, in pixels,
/// counted as "arrived" (spec §4.3 step 2).
const ARRIVAL_DISTANCE: f32 = 5.0;

/// Minimum elapsed seconds before the non-tutorial early-completion guard
/// may fire (spec §4.8).
const EARLY_COMPLETION_MIN_ELAPSED: f32 = 5.0;

/// Grace period past `level_duration` before an unfinished level is forced
/// to a time-limit game over (spec §4.8).
const TIME_LIMIT_GRACE: f32 = 5.0;

impl GameState {
    /// Runs the eleven steps of spec §4.7 in order.
    pub(crate) fn run_tick(&mut self, dt: f32, rng: &mut SmallRng) {
        self.temporal_progress += dt;
        self.level_timer += dt;

        self.process_injections();

        for system in self.level.systems.iter_mut() {
            system.tick_deactivation(dt);
        }

        self.advance_wire_packets(dt);
        self.transfer_wire_arrivals();
        self.process_inputs(rng);
        self.run_anti_trojan_scan();
        self.push_output_ports_to_wires();
        self.flush_storage_to_outputs(rng);
        self.check_collisions();
        self.cleanup_and_evaluate();
    }

    /// Step 4: advance every on-wire packet's kinematics, then constrain it
    /// to the active path, marking it off-wire lost past the threshold
    /// (spec §4.3 `updatePacketMovement`).
    fn advance_wire_packets(&mut self, dt: f32) {
        let smooth = self.settings.smooth_wire_curves;
        let threshold = self.settings.off_wire_loss_threshold;
        let wire_ids: Vec<WireId> = self
            .level
            .active_wires()
            .filter_map(|w| w.packet_on_wire.map(|_| w.id))
            .collect();

        for wire_id in wire_ids {
            let packet_id = match self.level.wire(wire_id).and_then(|w| w.packet_on_wire) {
                Some(id) => id,
                None => continue,
            };
            if !self.packet(packet_id).map(|p| p.active).unwrap_or(false) {
                if let Some(wire) = self.level.wire_mut(wire_id) {
                    wire.packet_on_wire = None;
                }
                continue;
            }

            let (source, destination) = self.wire_endpoint_positions(wire_id);
            let path = match self.level.wire(wire_id) {
                Some(wire) => wire.path(source, destination, smooth),
                None => continue,
            };
            let mut speed = self.packet(packet_id).map(|p| p.base_speed).unwrap_or(0.0);
            let is_confidential_protected = self.packet(packet_id).map(|p| matches!(p.kind, PacketKind::ConfidentialProtected)).unwrap_or(false);
            if is_confidential_protected {
                let position = self.packet(packet_id).map(|p| p.current_position).unwrap_or(Point2D::new(0.0, 0.0));
                let nearest = self.nearest_on_network_distance(packet_id, position);
                speed *= confidential_protected_speed_scale(nearest, self.settings.confidential_protected_target_distance);
            }
            if let Some(packet) = self.packet_mut(packet_id) {
                advance_on_wire(packet, &path, dt, speed);
            }

            let current_position = match self.packet(packet_id) {
                Some(p) => p.current_position,
                None => continue,
            };
            let (closest, deviation, progress) = path.closest_point_on_path(current_position);
            if deviation > threshold {
                log::debug!("packet {packet_id} lost off-wire on {wire_id} (deviation {deviation:.1}px)");
                self.destroy_packet(packet_id, RuleLoss::OffWire);
            } else if let Some(packet) = self.packet_mut(packet_id) {
                packet.current_position = closest;
                packet.path_progress = progress;
            }
        }
    }

    /// Closest current position among every other active on-network packet
    /// (currently riding a wire), for ConfidentialProtected's target-distance
    /// maintenance (spec §4.4).
    fn nearest_on_network_distance(&self, packet_id: PacketId, position: Point2D) -> Option<f32> {
        self.active_packets
            .iter()
            .filter(|p| p.id != packet_id && p.active && p.current_wire.is_some())
            .map(|p| position.distance(&p.current_position))
            .fold(None, |closest, d| Some(closest.map_or(d, |c: f32| c.min(d))))
    }

    fn wire_endpoint_positions(&self, wire_id: WireId) -> (Point2D, Point2D) {
        let origin = Point2D::new(0.0, 0.0);
        let Some(wire) = self.level.wire(wire_id) else { return (origin, origin) };
        let source = self
            .level
            .system_owning_port(wire.source_port)
            .and_then(|s| s.port(wire.source_port))
            .map(|p| p.position)
            .unwrap_or(origin);
        let destination = self
            .level
            .system_owning_port(wire.destination_port)
            .and_then(|s| s.port(wire.destination_port))
            .map(|p| p.position)
            .unwrap_or(origin);
        (source, destination)
    }

    /// Step 5: first wire→port transfer pass. A packet that has reached its
    /// destination port moves off the wire into that port; reference
    /// destinations finalize delivery immediately instead of waiting in the
    /// port (spec §4.3 step 2).
    fn transfer_wire_arrivals(&mut self) {
        let wire_ids: Vec<WireId> = self
            .level
            .active_wires()
            .filter_map(|w| w.packet_on_wire.map(|_| w.id))
            .collect();

        for wire_id in wire_ids {
            let Some(packet_id) = self.level.wire(wire_id).and_then(|w| w.packet_on_wire) else { continue };
            let dest_port = match self.level.wire(wire_id) {
                Some(wire) => wire.destination_port,
                None => continue,
            };
            let dest_position = self
                .level
                .system_owning_port(dest_port)
                .and_then(|s| s.port(dest_port))
                .map(|p| p.position);
            let Some(dest_position) = dest_position else { continue };

            let arrived = self
                .packet(packet_id)
                .map(|p| p.current_position.distance(&dest_position) <= ARRIVAL_DISTANCE)
                .unwrap_or(false);
            if !arrived {
                continue;
            }
            let dest_slot_free = self
                .level
                .system_owning_port(dest_port)
                .and_then(|s| s.port(dest_port))
                .map(|p| p.current_packet.is_none())
                .unwrap_or(false);
            if !dest_slot_free {
                continue;
            }

            if let Some(wire) = self.level.wire_mut(wire_id) {
                wire.packet_on_wire = None;
            }
            if let Some(packet) = self.packet_mut(packet_id) {
                packet.current_wire = None;
                packet.coin_award_pending = true;
            }

            let dest_system_id = self.level.system_owning_port(dest_port).map(|s| s.id);
            let is_reference = dest_system_id
                .and_then(|id| self.level.system(id))
                .map(|s| matches!(s.kind, SystemKind::Reference { .. }))
                .unwrap_or(false);

            let coin_value = self.packet(packet_id).map(|p| p.coin_value);
            if let Some(value) = coin_value {
                if let Some(packet) = self.packet_mut(packet_id) {
                    if packet.coin_award_pending {
                        packet.coin_award_pending = false;
                        self.coins += value;
                    }
                }
            }

            if is_reference {
                if let Some(system_id) = dest_system_id {
                    self.process_packet_reference(system_id, packet_id);
                }
            } else if let Some(system) = dest_system_id.and_then(|id| self.level.system_mut(id)) {
                if let Some(port) = system.port_mut(dest_port) {
                    port.current_packet = Some(packet_id);
                }
            }
        }
    }

    /// Step 7: AntiTrojan scan. Every active Trojan within an active
    /// AntiTrojan system's scan radius is converted to a fresh
    /// SquareMessenger in place (spec §4.6).
    fn run_anti_trojan_scan(&mut self) {
        let scanners: Vec<(Point2D, f32)> = self
            .level
            .systems
            .iter()
            .filter_map(|s| match s.kind {
                SystemKind::AntiTrojan { scan_radius } if s.is_active() => Some((s.position, scan_radius)),
                _ => None,
            })
            .collect();
        if scanners.is_empty() {
            return;
        }

        let trojan_ids: Vec<PacketId> = self
            .active_packets
            .iter()
            .filter(|p| p.active && matches!(p.kind, PacketKind::Trojan))
            .map(|p| p.id)
            .collect();

        for packet_id in trojan_ids {
            let Some(position) = self.packet(packet_id).map(|p| p.current_position) else { continue };
            let in_range = scanners.iter().any(|(pos, radius)| position.distance(pos) <= *radius);
            if !in_range {
                continue;
            }
            if let Some(packet) = self.packet_mut(packet_id) {
                packet.kind = PacketKind::Messenger { kind: MessengerType::Square };
                packet.size = PacketType::SquareMessenger.base_size();
                packet.noise_level = 0.0;
            }
            log::debug!("packet {packet_id} converted from trojan by anti-trojan scan");
        }
    }

    /// Step 8: push any packet sitting in an output port onto its wire,
    /// recording entry kinematics and the bulk wire-passage counter
    /// (spec §4.3 step 1, §4.4 bulk wire-destruction rule).
    fn push_output_ports_to_wires(&mut self) {
        let wire_ids: Vec<WireId> = self.level.active_wires().filter(|w| w.can_accept_new_packet()).map(|w| w.id).collect();
        for wire_id in wire_ids {
            let Some((source_port, dest_port)) = self.level.wire(wire_id).map(|w| (w.source_port, w.destination_port)) else { continue };
            let packet_id = self
                .level
                .system_owning_port(source_port)
                .and_then(|s| s.port(source_port))
                .and_then(|p| p.current_packet);
            let Some(packet_id) = packet_id else { continue };

            if let Some(system) = self.level.system_owning_port_mut(source_port) {
                if let Some(port) = system.port_mut(source_port) {
                    port.current_packet = None;
                }
            }

            let origin = Point2D::new(0.0, 0.0);
            let source_pos = self
                .level
                .system_owning_port(source_port)
                .and_then(|s| s.port(source_port))
                .map(|p| p.position)
                .unwrap_or(origin);
            let dest_pos = self
                .level
                .system_owning_port(dest_port)
                .and_then(|s| s.port(dest_port))
                .map(|p| p.position)
                .unwrap_or(origin);
            let smooth = self.settings.smooth_wire_curves;
            let path = match self.level.wire(wire_id) {
                Some(wire) => wire.path(source_pos, dest_pos, smooth),
                None => continue,
            };
            let is_bulk = self.packet(packet_id).map(|p| p.is_bulk()).unwrap_or(false);

            if let Some(packet) = self.packet_mut(packet_id) {
                packet.current_wire = Some(wire_id);
                packet.path_progress = 0.0;
                packet.current_position = path.position_at_progress(0.0);
                packet.movement_vector = path.tangent_at_progress(0.0).scale(packet.base_speed);
                packet.travel_time = 0.0;
                packet.source_position = source_pos;
                packet.destination_position = dest_pos;
            }
            if let Some(wire) = self.level.wire_mut(wire_id) {
                wire.packet_on_wire = Some(packet_id);
                if is_bulk {
                    wire.record_bulk_passage();
                }
            }
        }
    }

    /// Step 11: mark any packet whose accumulated noise now exceeds its
    /// size as lost (spec §4.4), remove every packet that finished this
    /// tick (lost or delivered-and-already-removed), count losses once,
    /// clear dangling wire/port/storage references, then evaluate end
    /// conditions (spec §4.8).
    fn cleanup_and_evaluate(&mut self) {
        let noise_exceeded: Vec<PacketId> = self
            .active_packets
            .iter()
            .filter(|p| p.active && p.noise_level > p.size as f32)
            .map(|p| p.id)
            .collect();
        for packet_id in noise_exceeded {
            log::debug!("packet {packet_id} lost: noise exceeded size");
            self.destroy_packet(packet_id, RuleLoss::NoiseExceeded);
        }

        let finished: Vec<PacketId> = self.active_packets.iter().filter(|p| !p.active).map(|p| p.id).collect();
        for packet_id in &finished {
            self.lost_packets_count += 1;
            for wire in self.level.wires.iter_mut() {
                if wire.packet_on_wire == Some(*packet_id) {
                    wire.packet_on_wire = None;
                }
            }
            for system in self.level.systems.iter_mut() {
                for port in system.input_ports.iter_mut().chain(system.output_ports.iter_mut()) {
                    if port.current_packet == Some(*packet_id) {
                        port.current_packet = None;
                    }
                }
                system.storage.retain(|id| id != packet_id);
            }
        }
        self.active_packets.retain(|p| p.active);

        self.evaluate_end_conditions();
    }

    fn evaluate_end_conditions(&mut self) {
        if self.game_over || self.level_complete {
            return;
        }

        let loss_pct = self.packet_loss_percentage();
        if loss_pct > 50.0 {
            self.trigger_game_over(GameOverReason::ExcessivePacketLoss);
            return;
        }

        if self.level_timer > self.level.level_duration {
            let far_overtime = self.level_timer > self.level.level_duration + TIME_LIMIT_GRACE;
            if !self.active_packets.is_empty() || far_overtime {
                self.trigger_game_over(GameOverReason::TimeLimitExceeded);
                return;
            }
        }

        if !self.has_network_path_source_to_sink() {
            self.trigger_game_over(GameOverReason::NetworkDisconnected);
            return;
        }

        let system_count = self.level.systems.len();
        if system_count > 0 {
            let failed = self.level.systems.iter().filter(|s| s.is_failed()).count();
            let failed_pct = failed as f32 / system_count as f32 * 100.0;
            self.failed_systems_count_peak = self.failed_systems_count_peak.max(failed as u32);
            if failed_pct > self.settings.failed_systems_game_over_percent {
                self.trigger_game_over(GameOverReason::ExcessiveSystemFailures);
                return;
            }
        }

        let all_executed = self.level.all_injections_executed();
        let no_active_packets = self.active_packets.is_empty();
        if !(all_executed && no_active_packets && loss_pct <= 50.0) {
            return;
        }

        let timer_elapsed = self.level_timer >= self.level.level_duration;
        if self.level.is_tutorial {
            if timer_elapsed {
                self.finish_level();
            }
            return;
        }

        let early_completion = self.delivered_count >= 1 && self.level_timer >= EARLY_COMPLETION_MIN_ELAPSED;
        if timer_elapsed || early_completion {
            self.finish_level();
        }
    }

    fn finish_level(&mut self) {
        self.level_complete = true;
        log::info!("level {} complete", self.level.level_id);
    }

    fn trigger_game_over(&mut self, reason: GameOverReason) {
        self.game_over = true;
        self.last_game_over_reason = reason;
        log::warn!("game over for level {}: {reason}", self.level.level_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;
    use crate::ids::{PortId, SystemId};
    use crate::level::GameLevel;
    use crate::packet::Packet;
    use crate::port::{Port, PortShape};
    use crate::state::Settings;
    use crate::system::System;
    use crate::wire::WireConnection;

    fn two_system_level() -> GameLevel {
        let mut level = GameLevel::new("t", "Tick", 1000.0, 60.0);
        let mut src = System::new(SystemId(0), Point2D::new(0.0, 0.0), SystemKind::Reference { is_source: true, delivered_count: 0 });
        src.output_ports.push(Port::new(PortId(0), PortShape::Square, false, SystemId(0), Point2D::new(10.0, 0.0)));
        let mut dst = System::new(SystemId(1), Point2D::new(200.0, 0.0), SystemKind::Reference { is_source: false, delivered_count: 0 });
        dst.input_ports.push(Port::new(PortId(1), PortShape::Square, true, SystemId(1), Point2D::new(190.0, 0.0)));
        level.systems.push(src);
        level.systems.push(dst);
        level.wires.push(WireConnection::new(WireId(0), PortId(0), PortId(1), 200.0));
        level
    }

    #[test]
    fn cleanup_removes_a_lost_packet_and_counts_it_once() {
        let mut state = GameState::new(two_system_level(), Settings::default());
        let mut packet = Packet::new_messenger(PacketId(0), MessengerType::Square, Point2D::new(0.0, 0.0), Point2D::new(200.0, 0.0));
        packet.active = false;
        state.active_packets.push(packet);
        state.level.wires[0].packet_on_wire = Some(PacketId(0));

        state.cleanup_and_evaluate();

        assert!(state.active_packets.is_empty());
        assert_eq!(state.lost_packets_count, 1);
        assert!(state.level.wires[0].packet_on_wire.is_none());
    }

    #[test]
    fn cleanup_marks_a_packet_whose_noise_exceeds_its_size_as_lost() {
        let mut state = GameState::new(two_system_level(), Settings::default());
        let mut packet = Packet::new_trojan(PacketId(0), Point2D::new(0.0, 0.0), Point2D::new(200.0, 0.0));
        packet.noise_level = packet.size as f32 + 1.0;
        state.active_packets.push(packet);

        state.cleanup_and_evaluate();

        assert!(state.active_packets.is_empty());
        assert_eq!(state.lost_packets_count, 1);
    }

    #[test]
    fn excessive_packet_loss_ends_the_game() {
        let mut state = GameState::new(two_system_level(), Settings::default());
        state.total_injected_count = 4;
        state.lost_packets_count = 3;

        state.evaluate_end_conditions();

        assert!(state.game_over);
        assert_eq!(state.last_game_over_reason, GameOverReason::ExcessivePacketLoss);
    }

    #[test]
    fn disconnected_network_ends_the_game_before_timer_checks() {
        let mut state = GameState::new(two_system_level(), Settings::default());
        state.level.wires[0].destroyed = true;
        state.level.wires[0].active = false;

        state.evaluate_end_conditions();

        assert!(state.game_over);
        assert_eq!(state.last_game_over_reason, GameOverReason::NetworkDisconnected);
    }

    #[test]
    fn level_finishes_once_all_injections_are_done_and_time_elapses() {
        let mut state = GameState::new(two_system_level(), Settings::default());
        state.level.level_duration = 1.0;
        state.level_timer = 2.0;

        state.evaluate_end_conditions();

        assert!(state.level_complete);
        assert!(!state.game_over);
    }
}
