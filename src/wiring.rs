//! `WiringController`: editing-time wire operations on a [`GameState`]
//! (spec §4.9). Every rejection returns an [`EditingRejection`] with no
//! state change — mirrors the teacher's result-code error style
//! (`error.rs`) rather than panicking on a refused edit.

use crate::error::EditingRejection;
use crate::geometry::Point2D;
use crate::ids::{IdGen, PortId, SystemId, WireId};
use crate::state::GameState;
use crate::wire::WireConnection;

/// Coin cost of adding a bend to an existing wire (spec §4.9).
pub const ADD_BEND_COST: u32 = 1;

pub struct WiringController {
    wire_ids: IdGen,
}

impl WiringController {
    pub fn new() -> Self {
        Self { wire_ids: IdGen::default() }
    }

    /// `createWire(p1, p2)` (spec §4.9): validates distinct systems,
    /// opposite directions, both ports unconnected, no existing connection,
    /// the straight segment clears every uninvolved system's bounding box,
    /// and the length fits the remaining budget. Normalizes so the source
    /// is always the output port.
    pub fn create_wire(&mut self, state: &mut GameState, p1: PortId, p2: PortId) -> Result<WireId, EditingRejection> {
        let system1 = state.level.system_owning_port(p1).ok_or(EditingRejection::WireNotFound)?;
        let system2 = state.level.system_owning_port(p2).ok_or(EditingRejection::WireNotFound)?;
        if system1.id == system2.id {
            return Err(EditingRejection::SameSystem);
        }
        let port1 = system1.port(p1).expect("resolved above");
        let port2 = system2.port(p2).expect("resolved above");
        if port1.is_input == port2.is_input {
            return Err(EditingRejection::SameDirection);
        }
        if port1.is_connected || port2.is_connected {
            return Err(EditingRejection::PortAlreadyConnected);
        }
        let (source_port, dest_port, source_pos, dest_pos, source_system, dest_system) = if port1.is_input {
            (p2, p1, port2.position, port1.position, system2.id, system1.id)
        } else {
            (p1, p2, port1.position, port2.position, system1.id, system2.id)
        };
        if state
            .level
            .wires
            .iter()
            .any(|w| w.active && w.source_port == source_port && w.destination_port == dest_port)
        {
            return Err(EditingRejection::AlreadyConnected);
        }
        if self.segment_crosses_other_system(state, source_pos, dest_pos, source_system, dest_system) {
            return Err(EditingRejection::PassesOverSystem);
        }
        let wire_length = source_pos.distance(&dest_pos);
        if wire_length > state.remaining_wire_length {
            return Err(EditingRejection::InsufficientBudget);
        }

        let id = WireId(self.wire_ids.next());
        state.level.wires.push(WireConnection::new(id, source_port, dest_port, wire_length));
        if let Some(port) = state.level.system_owning_port_mut(source_port).and_then(|s| s.port_mut(source_port)) {
            port.is_connected = true;
        }
        if let Some(port) = state.level.system_owning_port_mut(dest_port).and_then(|s| s.port_mut(dest_port)) {
            port.is_connected = true;
        }
        state.remaining_wire_length -= wire_length;
        log::debug!("created wire {id} ({source_port}->{dest_port}), {wire_length:.1}px consumed");
        Ok(id)
    }

    /// `addBend(id, pos)` (spec §4.1, §4.9): refuses past the 3-bend cap or
    /// if the resulting length delta exceeds the remaining budget; costs
    /// one coin on success.
    pub fn add_bend(&mut self, state: &mut GameState, wire_id: WireId, pos: Point2D) -> Result<(), EditingRejection> {
        let (source, destination) = self.endpoint_positions(state, wire_id)?;
        let smooth = state.settings.smooth_wire_curves;
        let before = state.level.wire(wire_id).ok_or(EditingRejection::WireNotFound)?.wire_length;
        let wire = state.level.wire_mut(wire_id).ok_or(EditingRejection::WireNotFound)?;
        wire.add_bend(pos, source, destination, smooth)?;
        let after_path = wire.path(source, destination, smooth).total_length();
        let delta = after_path - before;
        if delta > state.remaining_wire_length {
            let wire = state.level.wire_mut(wire_id).expect("just resolved");
            wire.bends.pop();
            return Err(EditingRejection::InsufficientBudget);
        }
        state.level.wire_mut(wire_id).expect("just resolved").wire_length = after_path;
        state.remaining_wire_length -= delta;
        state.coins = state.coins.saturating_sub(ADD_BEND_COST);
        Ok(())
    }

    /// `moveBend(id, i, pos)` (spec §4.9): recomputes the length delta and
    /// deducts or refunds the remaining budget accordingly.
    pub fn move_bend(
        &mut self,
        state: &mut GameState,
        wire_id: WireId,
        index: usize,
        new_pos: Point2D,
    ) -> Result<(), EditingRejection> {
        let (source, destination) = self.endpoint_positions(state, wire_id)?;
        let (source_bbox, dest_bbox) = self.endpoint_bboxes(state, wire_id)?;
        let smooth = state.settings.smooth_wire_curves;
        let before = state.level.wire(wire_id).ok_or(EditingRejection::WireNotFound)?.wire_length;

        let wire = state.level.wire_mut(wire_id).ok_or(EditingRejection::WireNotFound)?;
        let saved = wire.bends.get(index).copied().ok_or(EditingRejection::BadBendIndex)?;
        wire.move_bend(index, new_pos, source_bbox, dest_bbox)?;
        let after = wire.path(source, destination, smooth).total_length();
        let delta = after - before;
        if delta > state.remaining_wire_length {
            let wire = state.level.wire_mut(wire_id).expect("just resolved");
            wire.bends[index] = saved;
            return Err(EditingRejection::InsufficientBudget);
        }
        state.level.wire_mut(wire_id).expect("just resolved").wire_length = after;
        state.remaining_wire_length -= delta;
        Ok(())
    }

    /// `removeWire(id)` (spec §4.9): restores its length to the budget and
    /// disconnects both ports.
    pub fn remove_wire(&mut self, state: &mut GameState, wire_id: WireId) -> Result<(), EditingRejection> {
        let wire = state.level.wire(wire_id).ok_or(EditingRejection::WireNotFound)?;
        let (source_port, dest_port, length) = (wire.source_port, wire.destination_port, wire.wire_length);
        if let Some(port) = state.level.system_owning_port_mut(source_port).and_then(|s| s.port_mut(source_port)) {
            port.is_connected = false;
        }
        if let Some(port) = state.level.system_owning_port_mut(dest_port).and_then(|s| s.port_mut(dest_port)) {
            port.is_connected = false;
        }
        if let Some(wire) = state.level.wire_mut(wire_id) {
            wire.active = false;
        }
        state.remaining_wire_length += length;
        Ok(())
    }

    /// `moveSystem(id, pos)` (spec §4.9): relocates, then verifies every
    /// incident wire still clears other systems and the resulting length
    /// delta fits the budget; reverts on failure. Editing-time only, and
    /// gated on a Sisyphus ability grant (spec §4.5): a system may not be
    /// moved unless `GameState::grant_sisyphus` was called for it first,
    /// and the grant is consumed whether the move succeeds or is rejected.
    pub fn move_system(&mut self, state: &mut GameState, system_id: SystemId, new_pos: Point2D) -> Result<(), EditingRejection> {
        let system = state.level.system(system_id).ok_or(EditingRejection::WireNotFound)?;
        let old_pos = system.position;
        if !system.sisyphus_enabled {
            return Err(EditingRejection::SystemNotMovable);
        }
        if let Some(system) = state.level.system_mut(system_id) {
            system.sisyphus_enabled = false;
        }
        let old_lengths: Vec<(WireId, f32)> = self.incident_wire_lengths(state, system_id);

        if let Some(system) = state.level.system_mut(system_id) {
            system.position = new_pos;
        }
        self.relocate_ports(state, system_id, new_pos - old_pos);

        let smooth = state.settings.smooth_wire_curves;
        let mut delta_total = 0.0;
        for (wire_id, old_len) in &old_lengths {
            let (source, destination) = match self.endpoint_positions(state, *wire_id) {
                Ok(v) => v,
                Err(e) => {
                    self.revert_system_move(state, system_id, old_pos);
                    return Err(e);
                }
            };
            let (a, b) = match self.wire_endpoint_systems(state, *wire_id) {
                Some(v) => v,
                None => continue,
            };
            if self.segment_crosses_other_system(state, source, destination, a, b) {
                self.revert_system_move(state, system_id, old_pos);
                return Err(EditingRejection::PassesOverSystem);
            }
            let smooth_path_len = state
                .level
                .wire(*wire_id)
                .map(|w| w.path(source, destination, smooth).total_length())
                .unwrap_or(*old_len);
            delta_total += smooth_path_len - old_len;
        }

        if delta_total > state.remaining_wire_length {
            self.revert_system_move(state, system_id, old_pos);
            return Err(EditingRejection::InsufficientBudget);
        }
        for (wire_id, old_len) in &old_lengths {
            let (source, destination) = self.endpoint_positions(state, *wire_id)?;
            if let Some(wire) = state.level.wire_mut(*wire_id) {
                wire.wire_length = wire.path(source, destination, smooth).total_length();
            }
            let _ = old_len;
        }
        state.remaining_wire_length -= delta_total;
        Ok(())
    }

    /// `mergeWires(id1, id2)` (spec §4.9): two wires sharing a common port
    /// combine into one direct wire between their non-shared endpoints;
    /// both originals are deactivated.
    pub fn merge_wires(&mut self, state: &mut GameState, wire1: WireId, wire2: WireId) -> Result<WireId, EditingRejection> {
        let (w1_src, w1_dst, w1_len) = {
            let w = state.level.wire(wire1).ok_or(EditingRejection::WireNotFound)?;
            (w.source_port, w.destination_port, w.wire_length)
        };
        let (w2_src, w2_dst, w2_len) = {
            let w = state.level.wire(wire2).ok_or(EditingRejection::WireNotFound)?;
            (w.source_port, w.destination_port, w.wire_length)
        };

        let (new_source, new_dest) = if w1_dst == w2_src {
            (w1_src, w2_dst)
        } else if w2_dst == w1_src {
            (w2_src, w1_dst)
        } else if w1_src == w2_src {
            (w1_dst, w2_dst)
        } else if w1_dst == w2_dst {
            (w1_src, w2_src)
        } else {
            return Err(EditingRejection::NoSharedPort);
        };

        if let Some(w) = state.level.wire_mut(wire1) {
            w.active = false;
        }
        if let Some(w) = state.level.wire_mut(wire2) {
            w.active = false;
        }
        let id = WireId(self.wire_ids.next());
        state.level.wires.push(WireConnection::new(id, new_source, new_dest, w1_len + w2_len));
        if let Some(port) = state.level.system_owning_port_mut(new_source).and_then(|s| s.port_mut(new_source)) {
            port.is_connected = true;
        }
        if let Some(port) = state.level.system_owning_port_mut(new_dest).and_then(|s| s.port_mut(new_dest)) {
            port.is_connected = true;
        }
        Ok(id)
    }

    fn endpoint_positions(&self, state: &GameState, wire_id: WireId) -> Result<(Point2D, Point2D), EditingRejection> {
        let wire = state.level.wire(wire_id).ok_or(EditingRejection::WireNotFound)?;
        let source = state
            .level
            .system_owning_port(wire.source_port)
            .and_then(|s| s.port(wire.source_port))
            .map(|p| p.position)
            .ok_or(EditingRejection::WireNotFound)?;
        let destination = state
            .level
            .system_owning_port(wire.destination_port)
            .and_then(|s| s.port(wire.destination_port))
            .map(|p| p.position)
            .ok_or(EditingRejection::WireNotFound)?;
        Ok((source, destination))
    }

    fn endpoint_bboxes(
        &self,
        state: &GameState,
        wire_id: WireId,
    ) -> Result<((Point2D, Point2D), (Point2D, Point2D)), EditingRejection> {
        let wire = state.level.wire(wire_id).ok_or(EditingRejection::WireNotFound)?;
        let source_sys = state.level.system_owning_port(wire.source_port).ok_or(EditingRejection::WireNotFound)?;
        let dest_sys = state.level.system_owning_port(wire.destination_port).ok_or(EditingRejection::WireNotFound)?;
        Ok((source_sys.bounding_box(30.0), dest_sys.bounding_box(30.0)))
    }

    fn wire_endpoint_systems(&self, state: &GameState, wire_id: WireId) -> Option<(SystemId, SystemId)> {
        let wire = state.level.wire(wire_id)?;
        let a = state.level.system_owning_port(wire.source_port)?.id;
        let b = state.level.system_owning_port(wire.destination_port)?.id;
        Some((a, b))
    }

    fn incident_wire_lengths(&self, state: &GameState, system_id: SystemId) -> Vec<(WireId, f32)> {
        let Some(system) = state.level.system(system_id) else { return Vec::new() };
        let port_ids: Vec<PortId> = system.input_ports.iter().chain(system.output_ports.iter()).map(|p| p.id).collect();
        state
            .level
            .active_wires()
            .filter(|w| port_ids.contains(&w.source_port) || port_ids.contains(&w.destination_port))
            .map(|w| (w.id, w.wire_length))
            .collect()
    }

    fn relocate_ports(&self, state: &mut GameState, system_id: SystemId, delta: crate::geometry::Vec2D) {
        if let Some(system) = state.level.system_mut(system_id) {
            for port in system.input_ports.iter_mut().chain(system.output_ports.iter_mut()) {
                port.position = port.position + delta;
            }
        }
    }

    fn revert_system_move(&self, state: &mut GameState, system_id: SystemId, old_pos: Point2D) {
        let current_pos = state.level.system(system_id).map(|s| s.position).unwrap_or(old_pos);
        let delta = old_pos - current_pos;
        if let Some(system) = state.level.system_mut(system_id) {
            system.position = old_pos;
        }
        self.relocate_ports(state, system_id, delta);
    }

    /// "Passes over a system" (spec §4.1, §4.9): true iff the straight
    /// segment between `a` and `b` intersects the bounding box of any
    /// system other than `exclude1`/`exclude2`.
    fn segment_crosses_other_system(
        &self,
        state: &GameState,
        a: Point2D,
        b: Point2D,
        exclude1: SystemId,
        exclude2: SystemId,
    ) -> bool {
        state.level.systems.iter().any(|s| {
            if s.id == exclude1 || s.id == exclude2 {
                return false;
            }
            segment_intersects_bbox(a, b, s.bounding_box(30.0))
        })
    }
}

impl Default for WiringController {
    fn default() -> Self {
        Self::new()
    }
}

fn segment_intersects_bbox(a: Point2D, b: Point2D, bbox: (Point2D, Point2D)) -> bool {
    let (min, max) = bbox;
    let steps = 20;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let p = a.lerp(&b, t);
        if p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SystemId;
    use crate::level::GameLevel;
    use crate::port::PortShape;
    use crate::state::Settings;
    use crate::system::{System, SystemKind};

    fn sample_level() -> GameLevel {
        let mut level = GameLevel::new("l1", "Test", 1000.0, 60.0);
        let mut source = System::new(SystemId(0), Point2D::new(0.0, 0.0), SystemKind::Reference { is_source: true, delivered_count: 0 });
        source.output_ports.push(crate::port::Port::new(PortId(0), PortShape::Square, false, SystemId(0), Point2D::new(10.0, 0.0)));
        let mut sink = System::new(SystemId(1), Point2D::new(200.0, 0.0), SystemKind::Reference { is_source: false, delivered_count: 0 });
        sink.input_ports.push(crate::port::Port::new(PortId(1), PortShape::Square, true, SystemId(1), Point2D::new(190.0, 0.0)));
        level.systems.push(source);
        level.systems.push(sink);
        level
    }

    #[test]
    fn create_wire_consumes_budget_and_connects_ports() {
        let mut state = GameState::new(sample_level(), Settings::default());
        let mut controller = WiringController::new();
        let before = state.remaining_wire_length;
        let wire_id = controller.create_wire(&mut state, PortId(0), PortId(1)).unwrap();
        assert!(state.remaining_wire_length < before);
        assert!(state.level.wire(wire_id).unwrap().active);
    }

    #[test]
    fn remove_wire_restores_budget() {
        let mut state = GameState::new(sample_level(), Settings::default());
        let mut controller = WiringController::new();
        let before = state.remaining_wire_length;
        let wire_id = controller.create_wire(&mut state, PortId(0), PortId(1)).unwrap();
        controller.remove_wire(&mut state, wire_id).unwrap();
        assert!((state.remaining_wire_length - before).abs() < 0.01);
    }

    #[test]
    fn create_wire_between_same_system_is_rejected() {
        let mut state = GameState::new(sample_level(), Settings::default());
        let mut controller = WiringController::new();
        let err = controller.create_wire(&mut state, PortId(0), PortId(0)).unwrap_err();
        assert_eq!(err, EditingRejection::SameSystem);
    }

    #[test]
    fn move_system_without_sisyphus_is_rejected() {
        let mut state = GameState::new(sample_level(), Settings::default());
        let mut controller = WiringController::new();
        let err = controller.move_system(&mut state, SystemId(0), Point2D::new(5.0, 5.0)).unwrap_err();
        assert_eq!(err, EditingRejection::SystemNotMovable);
        assert_eq!(state.level.system(SystemId(0)).unwrap().position, Point2D::new(0.0, 0.0));
    }

    #[test]
    fn granted_sisyphus_permits_exactly_one_move() {
        let mut state = GameState::new(sample_level(), Settings::default());
        let mut controller = WiringController::new();
        state.grant_sisyphus(SystemId(0));
        controller.move_system(&mut state, SystemId(0), Point2D::new(5.0, 5.0)).unwrap();
        assert_eq!(state.level.system(SystemId(0)).unwrap().position, Point2D::new(5.0, 5.0));
        let err = controller.move_system(&mut state, SystemId(0), Point2D::new(9.0, 9.0)).unwrap_err();
        assert_eq!(err, EditingRejection::SystemNotMovable);
    }
}
