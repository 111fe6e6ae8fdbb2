//! Stable identifiers into the collections the [`crate::level::GameLevel`]
//! and [`crate::state::GameState`] own. Per the back-reference design note
//! (spec §9), systems/ports/wires/packets refer to each other by id, never
//! by direct handle — the level owns systems and wires, systems own ports,
//! and the engine's active-packet list owns packets until delivered or lost.

use std::fmt;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(SystemId);
id_type!(PortId);
id_type!(WireId);
id_type!(PacketId);

/// Monotonic id generator. The engine owns exactly one of each per level so
/// ids never collide within a run; replays reconstruct a level from scratch
/// so ids are reproducible across runs of the same level file.
#[derive(Debug, Clone, Default)]
pub struct IdGen(u64);

impl IdGen {
    pub fn next(&mut self) -> u64 {
        let id = self.0;
        self.0 += 1;
        id
    }
}
