//! The mutable simulation context (spec §3, §6).

use crate::error::GameOverReason;
use crate::ids::PacketId;
use crate::level::GameLevel;
use crate::packet::Packet;
use serde::{Deserialize, Serialize};

/// Recognized configuration options (spec §6), each with the spec's default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub off_wire_loss_threshold: f32,
    pub smooth_wire_curves: bool,
    pub failed_systems_game_over_percent: f32,
    pub speed_damage_threshold: f32,
    pub speed_damage_deactivation_time: f32,
    /// Open-question default (spec §9): ConfidentialProtected's
    /// best-effort target spacing from other on-network packets.
    pub confidential_protected_target_distance: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            off_wire_loss_threshold: 20.0,
            smooth_wire_curves: true,
            failed_systems_game_over_percent: 50.0,
            speed_damage_threshold: crate::system::SPEED_DAMAGE_THRESHOLD,
            speed_damage_deactivation_time: crate::system::SPEED_DAMAGE_DEACTIVATION_TIME,
            confidential_protected_target_distance: 60.0,
        }
    }
}

/// Snapshot of the level-start ledger, restored on restart/time-travel
/// (spec §6 "deterministic replay").
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelStartSnapshot {
    pub coins: u32,
    pub lost_packets_count: u32,
    pub remaining_wire_length: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationMode {
    Editing,
    Simulating,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub level: GameLevel,
    pub remaining_wire_length: f32,
    pub coins: u32,
    pub active_packets: Vec<Packet>,
    pub lost_packets_count: u32,
    pub total_injected_count: u32,
    pub level_timer: f32,
    pub temporal_progress: f32,
    pub paused: bool,
    pub game_over: bool,
    pub level_complete: bool,
    pub settings: Settings,
    pub last_game_over_reason: GameOverReason,
    pub level_start_snapshot: LevelStartSnapshot,
    pub mode: SimulationMode,
    pub failed_systems_count_peak: u32,
    pub delivered_count: u32,
    /// Monotonic source for every packet id allocated mid-simulation
    /// (injection, Distributor splits, Merger reassembly). Reset to 0 on
    /// restart so replays assign identical ids (spec §6 deterministic
    /// replay).
    pub next_packet_id: u64,
}

impl GameState {
    pub fn new(level: GameLevel, settings: Settings) -> Self {
        let remaining_wire_length = level.initial_wire_length - level.total_active_wire_length();
        let snapshot = LevelStartSnapshot {
            coins: 0,
            lost_packets_count: 0,
            remaining_wire_length,
        };
        Self {
            level,
            remaining_wire_length,
            coins: 0,
            active_packets: Vec::new(),
            lost_packets_count: 0,
            total_injected_count: 0,
            level_timer: 0.0,
            temporal_progress: 0.0,
            paused: false,
            game_over: false,
            level_complete: false,
            settings,
            last_game_over_reason: GameOverReason::None,
            level_start_snapshot: snapshot,
            mode: SimulationMode::Editing,
            failed_systems_count_peak: 0,
            delivered_count: 0,
            next_packet_id: 0,
        }
    }

    pub(crate) fn alloc_packet_id(&mut self) -> PacketId {
        let id = PacketId(self.next_packet_id);
        self.next_packet_id += 1;
        id
    }

    pub fn packet(&self, id: PacketId) -> Option<&Packet> {
        self.active_packets.iter().find(|p| p.id == id)
    }
    pub fn packet_mut(&mut self, id: PacketId) -> Option<&mut Packet> {
        self.active_packets.iter_mut().find(|p| p.id == id)
    }
    pub fn remove_packet(&mut self, id: PacketId) -> Option<Packet> {
        let idx = self.active_packets.iter().position(|p| p.id == id)?;
        Some(self.active_packets.remove(idx))
    }

    pub fn packet_loss_percentage(&self) -> f32 {
        if self.total_injected_count == 0 {
            0.0
        } else {
            (self.lost_packets_count as f32 / self.total_injected_count as f32) * 100.0
        }
    }

    pub fn enter_editing_mode(&mut self) {
        self.mode = SimulationMode::Editing;
    }

    pub fn enter_simulation_mode(&mut self) {
        self.mode = SimulationMode::Simulating;
        self.level_start_snapshot = LevelStartSnapshot {
            coins: self.coins,
            lost_packets_count: self.lost_packets_count,
            remaining_wire_length: self.remaining_wire_length,
        };
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Grants a system's Sisyphus ability use (spec §4.5): the next
    /// `WiringController::move_system` call against it is permitted and
    /// consumes the grant, win or lose.
    pub fn grant_sisyphus(&mut self, system_id: crate::ids::SystemId) {
        if let Some(system) = self.level.system_mut(system_id) {
            system.sisyphus_enabled = true;
        }
    }

    /// Restart the level from its start-of-level snapshot (spec §6, §9):
    /// clear active packets, executed flags, wire/port/storage occupancy,
    /// restore the three ledger fields, reset timers and flags.
    pub fn restart(&mut self) {
        self.active_packets.clear();
        self.total_injected_count = 0;
        for injection in self.level.packet_schedule.iter_mut() {
            injection.executed = false;
        }
        for wire in self.level.wires.iter_mut() {
            wire.packet_on_wire = None;
        }
        for system in self.level.systems.iter_mut() {
            system.storage.clear();
            for port in system.input_ports.iter_mut().chain(system.output_ports.iter_mut()) {
                port.current_packet = None;
            }
            system.state = crate::system::SystemState::Active;
            if let crate::system::SystemKind::Reference { delivered_count, .. } = &mut system.kind {
                *delivered_count = 0;
            }
        }
        self.next_packet_id = 0;
        self.coins = self.level_start_snapshot.coins;
        self.lost_packets_count = self.level_start_snapshot.lost_packets_count;
        self.remaining_wire_length = self.level_start_snapshot.remaining_wire_length;
        self.level_timer = 0.0;
        self.temporal_progress = 0.0;
        self.game_over = false;
        self.level_complete = false;
        self.delivered_count = 0;
        self.last_game_over_reason = GameOverReason::None;
    }
}
