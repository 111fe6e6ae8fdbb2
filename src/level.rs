//! The mutable graph: systems, wires, and the scheduled packet injections
//! (spec §3).

use crate::ids::{PortId, SystemId, WireId};
use crate::packet::PacketType;
use crate::system::System;
use crate::wire::WireConnection;

#[derive(Debug, Clone)]
pub struct PacketInjection {
    pub time: f32,
    pub packet_type: PacketType,
    pub source_system: SystemId,
    pub executed: bool,
}

impl PacketInjection {
    pub fn new(time: f32, packet_type: PacketType, source_system: SystemId) -> Self {
        Self { time, packet_type, source_system, executed: false }
    }
}

#[derive(Debug, Clone)]
pub struct GameLevel {
    pub level_id: String,
    pub name: String,
    pub description: String,
    pub initial_wire_length: f32,
    pub level_duration: f32,
    pub systems: Vec<System>,
    pub wires: Vec<WireConnection>,
    pub packet_schedule: Vec<PacketInjection>,
    /// Selects the tutorial carve-outs named in spec §9's open questions:
    /// speed-damage opt-out, undirected connectivity fallback, and
    /// unconditional timer-elapse completion.
    pub is_tutorial: bool,
}

impl GameLevel {
    pub fn new(level_id: impl Into<String>, name: impl Into<String>, initial_wire_length: f32, level_duration: f32) -> Self {
        Self {
            level_id: level_id.into(),
            name: name.into(),
            description: String::new(),
            initial_wire_length,
            level_duration,
            systems: Vec::new(),
            wires: Vec::new(),
            packet_schedule: Vec::new(),
            is_tutorial: false,
        }
    }

    pub fn system(&self, id: SystemId) -> Option<&System> {
        self.systems.iter().find(|s| s.id == id)
    }
    pub fn system_mut(&mut self, id: SystemId) -> Option<&mut System> {
        self.systems.iter_mut().find(|s| s.id == id)
    }
    pub fn system_index(&self, id: SystemId) -> Option<usize> {
        self.systems.iter().position(|s| s.id == id)
    }

    pub fn wire(&self, id: WireId) -> Option<&WireConnection> {
        self.wires.iter().find(|w| w.id == id)
    }
    pub fn wire_mut(&mut self, id: WireId) -> Option<&mut WireConnection> {
        self.wires.iter_mut().find(|w| w.id == id)
    }

    /// Finds the system owning `port_id`, if any.
    pub fn system_owning_port(&self, port_id: PortId) -> Option<&System> {
        self.systems.iter().find(|s| s.port(port_id).is_some())
    }
    pub fn system_owning_port_mut(&mut self, port_id: PortId) -> Option<&mut System> {
        self.systems.iter_mut().find(|s| s.port(port_id).is_some())
    }

    /// The wire, if any, whose source port is `port_id`.
    pub fn wire_from_output(&self, port_id: PortId) -> Option<&WireConnection> {
        self.wires.iter().find(|w| w.source_port == port_id)
    }

    pub fn active_wires(&self) -> impl Iterator<Item = &WireConnection> {
        self.wires.iter().filter(|w| w.active && !w.destroyed)
    }

    pub fn total_active_wire_length(&self) -> f32 {
        self.active_wires().map(|w| w.wire_length).sum()
    }

    pub fn all_injections_executed(&self) -> bool {
        self.packet_schedule.iter().all(|i| i.executed)
    }
}
