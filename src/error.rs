//! Result-code style error kinds (spec §7). None of these are panics — the
//! tick loop only ever halts on [`GameOverReason`]; everything else is local
//! and the tick continues processing other packets/systems.

use std::fmt;

/// Why a wiring edit was refused. No state changes on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EditingRejection {
    #[error("wire endpoints belong to the same system")]
    SameSystem,
    #[error("both ports face the same direction")]
    SameDirection,
    #[error("a port in this pair is already connected")]
    PortAlreadyConnected,
    #[error("a wire between these ports already exists")]
    AlreadyConnected,
    #[error("wire would pass over another system")]
    PassesOverSystem,
    #[error("insufficient remaining wire length")]
    InsufficientBudget,
    #[error("wire not found")]
    WireNotFound,
    #[error("bend index out of range")]
    BadBendIndex,
    #[error("a wire already has the maximum of 3 bends")]
    TooManyBends,
    #[error("bend would move inside a system's bounding box")]
    BendCollides,
    #[error("the two wires do not share a common port")]
    NoSharedPort,
    #[error("system has no active Sisyphus ability use to permit a move")]
    SystemNotMovable,
}

/// Packet-level loss reasons (spec §4.4, §7). Not an error the engine
/// surfaces to a caller — it is recorded on the packet and counted once
/// during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleLoss {
    OffWire,
    TimedOut,
    NoiseExceeded,
    DestroyedBySpy,
    DestroyedByBulk,
    DestroyedByCollision,
    DestroyedBySpeedDamage,
    NoRoute,
}

impl fmt::Display for RuleLoss {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuleLoss::OffWire => write!(f, "packet deviated off its wire"),
            RuleLoss::TimedOut => write!(f, "packet exceeded max travel time"),
            RuleLoss::NoiseExceeded => write!(f, "packet noise reached its size"),
            RuleLoss::DestroyedBySpy => write!(f, "destroyed by spy system"),
            RuleLoss::DestroyedByBulk => write!(f, "destroyed by bulk packet arrival"),
            RuleLoss::DestroyedByCollision => write!(f, "destroyed by collision"),
            RuleLoss::DestroyedBySpeedDamage => write!(f, "destroyed entering a system at excessive speed"),
            RuleLoss::NoRoute => write!(f, "no available output route"),
        }
    }
}

/// Terminal reason the engine halted (spec §4.8, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum GameOverReason {
    #[default]
    None,
    ExcessivePacketLoss,
    TimeLimitExceeded,
    NetworkDisconnected,
    ExcessiveSystemFailures,
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameOverReason::None => write!(f, "NONE"),
            GameOverReason::ExcessivePacketLoss => write!(f, "EXCESSIVE_PACKET_LOSS"),
            GameOverReason::TimeLimitExceeded => write!(f, "TIME_LIMIT_EXCEEDED"),
            GameOverReason::NetworkDisconnected => write!(f, "NETWORK_DISCONNECTED"),
            GameOverReason::ExcessiveSystemFailures => write!(f, "EXCESSIVE_SYSTEM_FAILURES"),
        }
    }
}
