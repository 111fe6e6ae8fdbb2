//! Packet hierarchy: a common kinematic header plus a type-specific
//! [`PacketKind`] payload (spec §3, §4.4).

pub mod kind;
pub mod movement;

pub use kind::{MessengerType, PacketKind, PacketType};

use crate::error::RuleLoss;
use crate::geometry::{Point2D, Vec2D};
use crate::ids::{PacketId, WireId};

pub const DEFAULT_MAX_TRAVEL_TIME: f32 = 30.0;

/// Acceleration profile chosen at wire-entry time from port compatibility
/// (spec §4.4 Messenger/Protected/Bit rules). Constant while the packet
/// traverses the current wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelProfile {
    Constant,
    Accelerating,
    Decelerating,
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub id: PacketId,
    pub kind: PacketKind,
    pub size: u8,
    pub coin_value: u32,
    pub noise_level: f32,
    pub current_position: Point2D,
    pub movement_vector: Vec2D,
    pub base_speed: f32,
    pub active: bool,
    pub delivered: bool,
    pub lost: Option<RuleLoss>,
    pub travel_time: f32,
    pub max_travel_time: f32,
    pub path_progress: f32,
    pub current_wire: Option<WireId>,
    pub is_reversing: bool,
    pub retry_destination: bool,
    pub coin_award_pending: bool,
    pub source_position: Point2D,
    pub destination_position: Point2D,
    pub entry_accel: AccelProfile,
    /// distance travelled since the last perpendicular deflection, used by
    /// `BulkLarge`'s periodic deflection rule.
    pub distance_since_deflection: f32,
}

impl Packet {
    fn base_header(
        id: PacketId,
        kind: PacketKind,
        size: u8,
        coin_value: u32,
        source: Point2D,
        destination: Point2D,
        base_speed: f32,
    ) -> Self {
        Self {
            id,
            kind,
            size,
            coin_value,
            noise_level: 0.0,
            current_position: source,
            movement_vector: Vec2D::ZERO,
            base_speed,
            active: true,
            delivered: false,
            lost: None,
            travel_time: 0.0,
            max_travel_time: DEFAULT_MAX_TRAVEL_TIME,
            path_progress: 0.0,
            current_wire: None,
            is_reversing: false,
            retry_destination: false,
            coin_award_pending: false,
            source_position: source,
            destination_position: destination,
            entry_accel: AccelProfile::Constant,
            distance_since_deflection: 0.0,
        }
    }

    pub fn new_messenger(
        id: PacketId,
        kind: MessengerType,
        source: Point2D,
        destination: Point2D,
    ) -> Self {
        let ty = kind.as_packet_type();
        let speed = match kind {
            MessengerType::Square => 120.0,
            MessengerType::Triangle => 110.0,
            MessengerType::Small => 90.0,
        };
        Self::base_header(
            id,
            PacketKind::Messenger { kind },
            ty.base_size(),
            ty.base_coin_value(),
            source,
            destination,
            speed,
        )
    }

    pub fn new_confidential(id: PacketId, source: Point2D, destination: Point2D) -> Self {
        let ty = PacketType::Confidential;
        Self::base_header(
            id,
            PacketKind::Confidential,
            ty.base_size(),
            ty.base_coin_value(),
            source,
            destination,
            95.0,
        )
    }

    pub fn new_confidential_protected(id: PacketId, source: Point2D, destination: Point2D) -> Self {
        let ty = PacketType::ConfidentialProtected;
        Self::base_header(
            id,
            PacketKind::ConfidentialProtected,
            ty.base_size(),
            ty.base_coin_value(),
            source,
            destination,
            85.0,
        )
    }

    /// Wraps an existing messenger type into a `Protected` packet. Size is
    /// 2x the wrapped messenger's base size; coin value is fixed at 5
    /// (spec §3, §4.4).
    pub fn new_protected(id: PacketId, original: MessengerType, source: Point2D, destination: Point2D) -> Self {
        let wrapped_size = original.as_packet_type().base_size();
        Self::base_header(
            id,
            PacketKind::Protected {
                current: original,
                original,
            },
            wrapped_size * 2,
            PacketType::Protected.base_coin_value(),
            source,
            destination,
            100.0,
        )
    }

    pub fn new_bulk_small(id: PacketId, source: Point2D, destination: Point2D) -> Self {
        let ty = PacketType::BulkSmall;
        Self::base_header(id, PacketKind::BulkSmall, ty.base_size(), ty.base_coin_value(), source, destination, 100.0)
    }

    pub fn new_bulk_large(id: PacketId, source: Point2D, destination: Point2D) -> Self {
        let ty = PacketType::BulkLarge;
        Self::base_header(id, PacketKind::BulkLarge, ty.base_size(), ty.base_coin_value(), source, destination, 80.0)
    }

    pub fn new_bit(
        id: PacketId,
        bulk_packet_id: PacketId,
        bulk_packet_color: u8,
        bulk_group_size: u8,
        source: Point2D,
        destination: Point2D,
    ) -> Self {
        let ty = PacketType::Bit;
        Self::base_header(
            id,
            PacketKind::Bit { bulk_packet_id, bulk_packet_color, bulk_group_size },
            ty.base_size(),
            ty.base_coin_value(),
            source,
            destination,
            90.0,
        )
    }

    pub fn new_trojan(id: PacketId, source: Point2D, destination: Point2D) -> Self {
        let ty = PacketType::Trojan;
        let mut p = Self::base_header(id, PacketKind::Trojan, ty.base_size(), ty.base_coin_value(), source, destination, 100.0);
        p.noise_level = 1.0;
        p
    }

    pub fn packet_type(&self) -> PacketType {
        self.kind.packet_type()
    }

    /// Constructs an injectable packet from its flat [`PacketType`] (spec
    /// §6 `PacketInjection`). `Protected`/`Trojan`/`Bit` never appear in a
    /// level's schedule directly — they only arise mid-simulation (VPN
    /// wrapping, Saboteur conversion, Distributor splitting) — but a
    /// `Protected` entry is accepted here wrapping `Square` by default so
    /// the schedule format stays total over `PacketType`.
    pub fn from_type(id: PacketId, packet_type: PacketType, source: Point2D, destination: Point2D) -> Self {
        match packet_type {
            PacketType::SquareMessenger => Packet::new_messenger(id, MessengerType::Square, source, destination),
            PacketType::TriangleMessenger => Packet::new_messenger(id, MessengerType::Triangle, source, destination),
            PacketType::SmallMessenger => Packet::new_messenger(id, MessengerType::Small, source, destination),
            PacketType::Confidential => Packet::new_confidential(id, source, destination),
            PacketType::ConfidentialProtected => Packet::new_confidential_protected(id, source, destination),
            PacketType::BulkSmall => Packet::new_bulk_small(id, source, destination),
            PacketType::BulkLarge => Packet::new_bulk_large(id, source, destination),
            PacketType::Protected => Packet::new_protected(id, MessengerType::Square, source, destination),
            PacketType::Trojan => Packet::new_trojan(id, source, destination),
            PacketType::Bit => Packet::new_bit(id, id, 0, PacketType::BulkSmall.base_size(), source, destination),
        }
    }

    pub fn is_bulk(&self) -> bool {
        self.kind.is_bulk()
    }

    /// Common per-tick kinematic advance shared by every packet kind
    /// (spec §4.4): advance position, accumulate travel time, and apply the
    /// max-travel-time loss rule.
    pub fn update_position(&mut self, dt: f32) {
        self.current_position = self.current_position + self.movement_vector.scale(dt);
        self.travel_time += dt;
        if self.travel_time > self.max_travel_time {
            self.active = false;
            self.lost = Some(RuleLoss::TimedOut);
        }
    }

    /// Loss rule from spec §4.4: lost if flagged, inactive-without-delivery,
    /// timed out, or noise strictly exceeds size.
    pub fn is_lost(&self) -> bool {
        self.lost.is_some() || self.noise_level > self.size as f32 || (!self.active && !self.delivered)
    }

    pub fn mark_lost(&mut self, reason: RuleLoss) {
        if self.lost.is_none() {
            self.lost = Some(reason);
        }
        self.active = false;
    }

    pub fn mark_delivered(&mut self) {
        self.active = false;
        self.delivered = true;
    }

    /// Reverses progress on the current wire and swaps the notion of
    /// source/destination — used both by Small-messenger/Bit collision
    /// shockwaves and by `SystemFailure`'s `returnToSource` rule.
    pub fn reverse_on_wire(&mut self) {
        self.path_progress = 1.0 - self.path_progress;
        self.is_reversing = !self.is_reversing;
        std::mem::swap(&mut self.source_position, &mut self.destination_position);
    }
}
