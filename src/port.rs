//! Single-capacity typed port on a system (spec §4.2).

use crate::geometry::Point2D;
use crate::ids::{PacketId, PortId, SystemId};
use crate::packet::{Packet, PacketType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortShape {
    Square,
    Triangle,
    Hexagon,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub id: PortId,
    pub shape: PortShape,
    pub is_input: bool,
    pub parent_system: SystemId,
    pub position: Point2D,
    pub relative_offset: crate::geometry::Vec2D,
    pub is_connected: bool,
    pub current_packet: Option<PacketId>,
}

impl Port {
    pub fn new(id: PortId, shape: PortShape, is_input: bool, parent_system: SystemId, position: Point2D) -> Self {
        Self {
            id,
            shape,
            is_input,
            parent_system,
            position,
            relative_offset: crate::geometry::Vec2D::ZERO,
            is_connected: false,
            current_packet: None,
        }
    }

    /// Capacity predicate: a port accepts a packet iff it is empty and the
    /// packet is still active. Compatibility never refuses acceptance
    /// (spec §4.2) — only capacity does.
    pub fn can_accept_packet(&self, packet: &Packet) -> bool {
        self.current_packet.is_none() && packet.active
    }

    /// Compatibility predicate used only to select speed/acceleration
    /// profile and output-port priority, never to refuse movement
    /// (spec §4.2).
    pub fn is_compatible_with_packet(&self, packet_type: PacketType) -> bool {
        match packet_type {
            PacketType::SmallMessenger => self.shape == PortShape::Hexagon,
            PacketType::SquareMessenger => self.shape == PortShape::Square,
            PacketType::TriangleMessenger => self.shape == PortShape::Triangle,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SystemId;

    #[test]
    fn square_messenger_compatible_only_with_square_port() {
        let port = Port::new(PortId(0), PortShape::Square, true, SystemId(0), Point2D::new(0.0, 0.0));
        assert!(port.is_compatible_with_packet(PacketType::SquareMessenger));
        assert!(!port.is_compatible_with_packet(PacketType::TriangleMessenger));
    }

    #[test]
    fn non_messenger_types_are_always_compatible() {
        let port = Port::new(PortId(0), PortShape::Hexagon, true, SystemId(0), Point2D::new(0.0, 0.0));
        assert!(port.is_compatible_with_packet(PacketType::Confidential));
        assert!(port.is_compatible_with_packet(PacketType::BulkLarge));
        assert!(port.is_compatible_with_packet(PacketType::Trojan));
    }
}
