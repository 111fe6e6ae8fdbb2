//! Deterministic, tick-based packet-routing network simulation engine.
//!
//! The engine owns a [`state::GameState`] (the mutable graph plus the
//! packet/economy ledger) and advances it through [`engine::Engine`]'s
//! fixed per-tick pipeline. Editing-time graph changes go through
//! [`wiring::WiringController`]; level files are parsed via [`dto`].

pub mod dto;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod level;
pub mod packet;
pub mod port;
pub mod state;
pub mod system;
pub mod wire;
pub mod wiring;

#[cfg(feature = "server")]
pub mod server;

pub use engine::Engine;
pub use error::{EditingRejection, GameOverReason, RuleLoss};
pub use level::GameLevel;
pub use state::{GameState, Settings};
pub use wiring::WiringController;
