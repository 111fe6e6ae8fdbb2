//! `PacketType`/`PacketKind`: the discriminated-union packet hierarchy
//! (spec §3, §4.4). A tagged enum with a shared header in [`super::Packet`],
//! following the teacher's `Action` enum idiom rather than deep inheritance
//! (spec §9 design note).

use serde::{Deserialize, Serialize};

/// The flat enumeration of packet types, with the fixed `(size, coin)` table
/// from spec §3. `Protected`'s size is derived at construction (2x the
/// wrapped messenger's base size) so it has no fixed entry here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    SquareMessenger,
    TriangleMessenger,
    SmallMessenger,
    Protected,
    Confidential,
    ConfidentialProtected,
    BulkSmall,
    BulkLarge,
    Trojan,
    Bit,
}

impl PacketType {
    pub fn display_name(&self) -> &'static str {
        match self {
            PacketType::SquareMessenger => "Square Messenger",
            PacketType::TriangleMessenger => "Triangle Messenger",
            PacketType::SmallMessenger => "Small Messenger",
            PacketType::Protected => "Protected",
            PacketType::Confidential => "Confidential",
            PacketType::ConfidentialProtected => "Confidential Protected",
            PacketType::BulkSmall => "Bulk (Small)",
            PacketType::BulkLarge => "Bulk (Large)",
            PacketType::Trojan => "Trojan",
            PacketType::Bit => "Bit",
        }
    }

    /// Base size from spec §3's table. `Protected` has no fixed base size —
    /// it is derived from the wrapped messenger at construction time.
    pub fn base_size(&self) -> u8 {
        match self {
            PacketType::SquareMessenger => 2,
            PacketType::TriangleMessenger => 3,
            PacketType::SmallMessenger => 1,
            PacketType::Protected => 0,
            PacketType::Confidential => 4,
            PacketType::ConfidentialProtected => 6,
            PacketType::BulkSmall => 8,
            PacketType::BulkLarge => 10,
            PacketType::Trojan => 2,
            PacketType::Bit => 1,
        }
    }

    pub fn base_coin_value(&self) -> u32 {
        match self {
            PacketType::SquareMessenger => 2,
            PacketType::TriangleMessenger => 3,
            PacketType::SmallMessenger => 1,
            PacketType::Protected => 5,
            PacketType::Confidential => 3,
            PacketType::ConfidentialProtected => 4,
            PacketType::BulkSmall => 8,
            PacketType::BulkLarge => 10,
            PacketType::Trojan => 0,
            PacketType::Bit => 0,
        }
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self, PacketType::BulkSmall | PacketType::BulkLarge)
    }

    pub fn is_messenger(&self) -> bool {
        matches!(
            self,
            PacketType::SquareMessenger | PacketType::TriangleMessenger | PacketType::SmallMessenger
        )
    }
}

/// The three messenger sub-types a `Protected` packet cycles through, and
/// that `Bit`/plain messenger packets carry directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessengerType {
    Square,
    Triangle,
    Small,
}

impl MessengerType {
    pub fn as_packet_type(&self) -> PacketType {
        match self {
            MessengerType::Square => PacketType::SquareMessenger,
            MessengerType::Triangle => PacketType::TriangleMessenger,
            MessengerType::Small => PacketType::SmallMessenger,
        }
    }

    pub fn cycle(&self) -> [MessengerType; 3] {
        [MessengerType::Square, MessengerType::Triangle, MessengerType::Small]
    }
}

/// The type-specific parameters carried alongside the common packet header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PacketKind {
    Messenger {
        kind: MessengerType,
    },
    Confidential,
    ConfidentialProtected,
    Protected {
        /// The messenger type this packet is currently emulating for
        /// speed/acceleration purposes; re-randomized on each new wire.
        current: MessengerType,
        /// The messenger type to revert to on VPN failure or Spy/Saboteur
        /// pass-through.
        original: MessengerType,
    },
    BulkSmall,
    BulkLarge,
    Bit {
        bulk_packet_id: crate::ids::PacketId,
        bulk_packet_color: u8,
        /// Size of the bulk packet this bit was split from (8 for
        /// BulkSmall, 10 for BulkLarge) — the Merger's reassembly
        /// threshold, carried per-bit since a standalone `Bit` has no
        /// other way to recover it once siblings start arriving.
        bulk_group_size: u8,
    },
    Trojan,
}

impl PacketKind {
    pub fn packet_type(&self) -> PacketType {
        match self {
            PacketKind::Messenger { kind } => kind.as_packet_type(),
            PacketKind::Confidential => PacketType::Confidential,
            PacketKind::ConfidentialProtected => PacketType::ConfidentialProtected,
            PacketKind::Protected { .. } => PacketType::Protected,
            PacketKind::BulkSmall => PacketType::BulkSmall,
            PacketKind::BulkLarge => PacketType::BulkLarge,
            PacketKind::Bit { .. } => PacketType::Bit,
            PacketKind::Trojan => PacketType::Trojan,
        }
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self, PacketKind::BulkSmall | PacketKind::BulkLarge)
    }

    pub fn is_confidential(&self) -> bool {
        matches!(self, PacketKind::Confidential | PacketKind::ConfidentialProtected)
    }
}
