//! Directed, single-capacity edge between an output port and an input port
//! (spec §3, §4.3).

use crate::geometry::{Point2D, WireBend, WirePath};
use crate::ids::{PacketId, PortId, WireId};
use serde::{Deserialize, Serialize};

pub const MAX_BULK_PASSAGES: u32 = 3;
pub const MAX_BENDS: usize = 3;

#[derive(Debug, Clone)]
pub struct WireConnection {
    pub id: WireId,
    pub source_port: PortId,
    pub destination_port: PortId,
    pub bends: Vec<WireBend>,
    pub wire_length: f32,
    pub active: bool,
    pub destroyed: bool,
    pub bulk_packet_passages: u32,
    pub packet_on_wire: Option<PacketId>,
}

impl WireConnection {
    pub fn new(id: WireId, source_port: PortId, destination_port: PortId, wire_length: f32) -> Self {
        Self {
            id,
            source_port,
            destination_port,
            bends: Vec::new(),
            wire_length,
            active: true,
            destroyed: false,
            bulk_packet_passages: 0,
            packet_on_wire: None,
        }
    }

    pub fn can_accept_new_packet(&self) -> bool {
        self.active && !self.destroyed && self.packet_on_wire.is_none()
    }

    /// Build the path geometry for this wire given its endpoints and the
    /// level's smooth-curve setting (spec §4.1).
    pub fn path(&self, source: Point2D, destination: Point2D, smooth: bool) -> WirePath {
        WirePath::build(source, &self.bends, destination, smooth)
    }

    /// Record a bulk-packet entry; the wire is destroyed on its 3rd passage
    /// (spec §3, §4.4, §8 boundary test).
    pub fn record_bulk_passage(&mut self) {
        self.bulk_packet_passages += 1;
        if self.bulk_packet_passages >= MAX_BULK_PASSAGES {
            self.destroyed = true;
            self.active = false;
        }
    }

    /// Insert a bend, projected onto the closest current path segment.
    /// Budget is enforced by the caller (`WiringController`).
    pub fn add_bend(&mut self, pos: Point2D, source: Point2D, destination: Point2D, smooth: bool) -> Result<(), crate::error::EditingRejection> {
        if self.bends.len() >= MAX_BENDS {
            return Err(crate::error::EditingRejection::TooManyBends);
        }
        let path = self.path(source, destination, smooth);
        let (projected, segment_idx) = path.closest_segment_index(pos);
        let insert_at = segment_idx.min(self.bends.len());
        self.bends.insert(insert_at, WireBend::new(projected));
        Ok(())
    }

    /// Move a bend, keeping it outside both endpoint systems' bounding
    /// boxes; no other collision rule applies (spec §4.1, "permissive").
    pub fn move_bend(
        &mut self,
        index: usize,
        new_pos: Point2D,
        source_bbox: (Point2D, Point2D),
        dest_bbox: (Point2D, Point2D),
    ) -> Result<(), crate::error::EditingRejection> {
        let bend = self.bends.get_mut(index).ok_or(crate::error::EditingRejection::BadBendIndex)?;
        if inside_bbox(new_pos, source_bbox) || inside_bbox(new_pos, dest_bbox) {
            return Err(crate::error::EditingRejection::BendCollides);
        }
        bend.position = new_pos;
        Ok(())
    }
}

fn inside_bbox(p: Point2D, bbox: (Point2D, Point2D)) -> bool {
    let (min, max) = bbox;
    p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
}
