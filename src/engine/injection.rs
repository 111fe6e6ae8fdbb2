//! Scheduled packet injection (spec §4.7 step 2, §6 `PacketInjection`).

use crate::packet::Packet;
use crate::state::GameState;

impl GameState {
    /// Attempts to place every due, not-yet-executed injection onto its
    /// source system's outgoing wire: compatible ports first, then any
    /// connected port. Success marks the injection executed and adds the
    /// packet to `active_packets`; failure defers it to next tick
    /// (spec §4.7, §7 `PacketPlacementDeferred`).
    pub(crate) fn process_injections(&mut self) {
        let due: Vec<usize> = self
            .level
            .packet_schedule
            .iter()
            .enumerate()
            .filter(|(_, inj)| !inj.executed && inj.time <= self.temporal_progress)
            .map(|(i, _)| i)
            .collect();

        for idx in due {
            let (source_system, packet_type) = {
                let inj = &self.level.packet_schedule[idx];
                (inj.source_system, inj.packet_type)
            };
            if let Some(wire_id) = self.find_outgoing_wire_for_injection(source_system, packet_type) {
                let wire = self.level.wire(wire_id).expect("wire id resolved above");
                let origin = crate::geometry::Point2D::new(0.0, 0.0);
                let source_port = self
                    .level
                    .system(source_system)
                    .and_then(|s| s.port(wire.source_port))
                    .map(|p| p.position)
                    .unwrap_or(origin);
                let dest_port = self
                    .level
                    .system_owning_port(wire.destination_port)
                    .and_then(|s| s.port(wire.destination_port))
                    .map(|p| p.position)
                    .unwrap_or(origin);

                let id = self.alloc_packet_id();
                let mut packet = Packet::from_type(id, packet_type, source_port, dest_port);
                packet.current_wire = Some(wire_id);
                packet.path_progress = 0.0;
                packet.current_position = source_port;

                self.level.wire_mut(wire_id).expect("wire exists").packet_on_wire = Some(id);
                self.active_packets.push(packet);
                self.level.packet_schedule[idx].executed = true;
                self.total_injected_count += 1;
            }
            // else: defer, retried next tick.
        }
    }

    fn find_outgoing_wire_for_injection(
        &self,
        source_system: crate::ids::SystemId,
        packet_type: crate::packet::PacketType,
    ) -> Option<crate::ids::WireId> {
        let system = self.level.system(source_system)?;
        let mut fallback = None;
        for port in system.output_ports.iter() {
            if let Some(wire) = self.level.wire_from_output(port.id) {
                if !wire.can_accept_new_packet() {
                    continue;
                }
                if port.is_compatible_with_packet(packet_type) {
                    return Some(wire.id);
                }
                fallback.get_or_insert(wire.id);
            }
        }
        fallback
    }
}
