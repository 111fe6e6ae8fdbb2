//! System hierarchy: common header (ports, storage, activation state) plus
//! an eight-way [`SystemKind`] behavior tag (spec §3, §4.6).

pub mod policy;

use crate::geometry::Point2D;
use crate::ids::{PacketId, PortId, SystemId};
use crate::port::Port;
use serde::{Deserialize, Serialize};

pub const MAX_STORAGE: usize = 5;
pub const SPEED_DAMAGE_THRESHOLD: f32 = 150.0;
pub const SPEED_DAMAGE_DEACTIVATION_TIME: f32 = 10.0;
pub const DEFAULT_MAX_DEACTIVATION_TIME: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SystemState {
    Active,
    Deactivated { remaining: f32 },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemKindTag {
    Normal,
    Reference,
    Spy,
    Saboteur,
    Vpn,
    AntiTrojan,
    Distributor,
    Merger,
}

#[derive(Debug, Clone)]
pub enum SystemKind {
    Normal,
    /// `is_source` systems are bound to injections in the level's packet
    /// schedule; `delivered_count` increments once per finalized delivery.
    Reference { is_source: bool, delivered_count: u32 },
    Spy,
    Saboteur,
    Vpn,
    AntiTrojan { scan_radius: f32 },
    Distributor,
    Merger,
}

impl SystemKind {
    pub fn tag(&self) -> SystemKindTag {
        match self {
            SystemKind::Normal => SystemKindTag::Normal,
            SystemKind::Reference { .. } => SystemKindTag::Reference,
            SystemKind::Spy => SystemKindTag::Spy,
            SystemKind::Saboteur => SystemKindTag::Saboteur,
            SystemKind::Vpn => SystemKindTag::Vpn,
            SystemKind::AntiTrojan { .. } => SystemKindTag::AntiTrojan,
            SystemKind::Distributor => SystemKindTag::Distributor,
            SystemKind::Merger => SystemKindTag::Merger,
        }
    }
}

#[derive(Debug, Clone)]
pub struct System {
    pub id: SystemId,
    pub position: Point2D,
    pub input_ports: Vec<Port>,
    pub output_ports: Vec<Port>,
    pub storage: Vec<PacketId>,
    pub state: SystemState,
    pub max_deactivation_time: f32,
    pub indicator_visible: bool,
    pub kind: SystemKind,
    /// Set by a Sisyphus ability use (spec §4.5: "enables a system move,
    /// editing-time only"); `WiringController::move_system` consumes it on
    /// the next successful move and refuses the move otherwise.
    pub sisyphus_enabled: bool,
}

impl System {
    pub fn new(id: SystemId, position: Point2D, kind: SystemKind) -> Self {
        Self {
            id,
            position,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            storage: Vec::new(),
            state: SystemState::Active,
            max_deactivation_time: DEFAULT_MAX_DEACTIVATION_TIME,
            indicator_visible: true,
            kind,
            sisyphus_enabled: false,
        }
    }

    pub fn storage_capacity(&self) -> Option<usize> {
        match self.kind {
            SystemKind::Distributor => None,
            _ => Some(MAX_STORAGE),
        }
    }

    pub fn has_storage_space(&self) -> bool {
        match self.storage_capacity() {
            None => true,
            Some(cap) => self.storage.len() < cap,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SystemState::Active)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, SystemState::Failed)
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.input_ports
            .iter()
            .chain(self.output_ports.iter())
            .find(|p| p.id == id)
    }

    pub fn port_mut(&mut self, id: PortId) -> Option<&mut Port> {
        self.input_ports
            .iter_mut()
            .chain(self.output_ports.iter_mut())
            .find(|p| p.id == id)
    }

    pub fn bounding_box(&self, half_extent: f32) -> (Point2D, Point2D) {
        (
            Point2D::new(self.position.x - half_extent, self.position.y - half_extent),
            Point2D::new(self.position.x + half_extent, self.position.y + half_extent),
        )
    }

    /// Advance the deactivation timer by `dt`. Returns to `Active` once the
    /// timer elapses, unless `Failed` (permanent, spec §4.6).
    pub fn tick_deactivation(&mut self, dt: f32) {
        if let SystemState::Deactivated { remaining } = &mut self.state {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.state = SystemState::Active;
            }
        }
    }

    pub fn deactivate(&mut self, duration: f32) {
        if !self.is_failed() {
            self.state = SystemState::Deactivated { remaining: duration };
        }
    }

    pub fn fail(&mut self) {
        self.state = SystemState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributor_has_unbounded_storage() {
        let system = System::new(SystemId(0), Point2D::new(0.0, 0.0), SystemKind::Distributor);
        assert_eq!(system.storage_capacity(), None);
        assert!(system.has_storage_space());
    }

    #[test]
    fn normal_system_storage_caps_at_five() {
        let mut system = System::new(SystemId(0), Point2D::new(0.0, 0.0), SystemKind::Normal);
        for i in 0..5 {
            system.storage.push(PacketId(i));
        }
        assert!(!system.has_storage_space());
    }

    #[test]
    fn deactivation_timer_returns_to_active() {
        let mut system = System::new(SystemId(0), Point2D::new(0.0, 0.0), SystemKind::Normal);
        system.deactivate(10.0);
        system.tick_deactivation(9.0);
        assert!(!system.is_active());
        system.tick_deactivation(2.0);
        assert!(system.is_active());
    }

    #[test]
    fn failure_is_permanent() {
        let mut system = System::new(SystemId(0), Point2D::new(0.0, 0.0), SystemKind::Normal);
        system.fail();
        system.deactivate(1.0);
        assert!(system.is_failed());
    }
}
