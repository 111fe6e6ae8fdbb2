//! Tick controller: orchestrates the fixed per-tick pipeline (spec §4.7),
//! computes end-of-level/game-over predicates (spec §4.8), and provides
//! time-travel (spec §5, §9).

pub mod collision;
pub mod connectivity;
pub mod injection;
pub mod tick;

use crate::state::GameState;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Fixed substep used by rewind/fast-forward (spec §5, §9).
pub const TIME_TRAVEL_STEP: f32 = 0.1;

/// Owns the single seedable RNG used by every randomness site named in
/// spec §9 (spy teleport target, saboteur trojan-conversion roll, bulk
/// port-shape mutation, output-port tie-break), grounded on the teacher's
/// `Profile::rng` (`mccfr/profile.rs`), which seeds a `SmallRng` for
/// reproducible Monte-Carlo sampling.
pub struct Engine {
    rng: SmallRng,
    seed: u64,
}

impl Engine {
    pub fn new(seed: u64) -> Self {
        Self { rng: SmallRng::seed_from_u64(seed), seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Advance the simulation by one fixed tick of `dt` seconds.
    pub fn tick(&mut self, state: &mut GameState, dt: f32) {
        if state.paused || state.game_over || state.level_complete {
            return;
        }
        state.run_tick(dt, &mut self.rng);
    }

    pub fn set_paused(&mut self, state: &mut GameState, paused: bool) {
        state.set_paused(paused);
    }

    pub fn enter_editing_mode(&mut self, state: &mut GameState) {
        state.enter_editing_mode();
    }

    pub fn enter_simulation_mode(&mut self, state: &mut GameState) {
        state.enter_simulation_mode();
    }

    /// Rewind = reset + replay from t=0 up to `target` in fixed substeps;
    /// fast-forward = substep from the current time up to `target`. Both
    /// are driven between ticks, never inside one (spec §5).
    pub fn time_travel_to(&mut self, state: &mut GameState, target: f32) {
        if target < state.temporal_progress {
            self.rng = SmallRng::seed_from_u64(self.seed);
            state.restart();
        }
        while state.temporal_progress + TIME_TRAVEL_STEP <= target {
            if state.game_over || state.level_complete {
                return;
            }
            state.run_tick(TIME_TRAVEL_STEP, &mut self.rng);
        }
        if state.game_over || state.level_complete {
            return;
        }
        let remainder = target - state.temporal_progress;
        if remainder > 0.0 {
            state.run_tick(remainder, &mut self.rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::GameLevel;
    use crate::state::{GameState, Settings};

    #[test]
    fn time_travel_to_same_point_twice_is_a_no_op() {
        let level = GameLevel::new("l1", "Test", 500.0, 30.0);
        let mut state = GameState::new(level, Settings::default());
        let mut engine = Engine::new(7);
        engine.time_travel_to(&mut state, 2.0);
        let snapshot = state.temporal_progress;
        engine.time_travel_to(&mut state, 2.0);
        assert!((state.temporal_progress - snapshot).abs() < 1e-4);
    }
}
