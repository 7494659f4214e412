use crate::boxer::Boxer;
use crate::config::DifficultyConfig;
use crate::error::BoxingError;
use crate::sprite::state::CombatState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ==================== Ranges ====================
mod range {
    pub const MAX_X: f32 = 125.0;
    pub const MIN_Y: f32 = 25.0;
    pub const MAX_Y: f32 = 50.0;
    /// Too-close band the brain sometimes backs out of
    pub const CROWDED_X: std::ops::Range<f32> = 60.0..80.0;
}

// Per-tick chances, evaluated once per 60Hz simulation step
mod chance {
    pub const RETREAT_X_WHEN_HIT: f64 = 0.04;
    pub const RETREAT_Y_WHEN_HIT: f64 = 0.1;
    pub const TIRED: f64 = 0.02;
    pub const CROWDED_RETREAT: f64 = 0.1;
}

// Committed movement lengths, in ticks
mod ticks {
    pub const RETREAT_X_WHEN_HIT: u32 = 10;
    pub const RETREAT_Y_WHEN_HIT: u32 = 15;
    pub const Y_EXCURSION: u32 = 20;
    pub const CROWDED_RETREAT: u32 = 20;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vertical {
    Top,
    Bottom,
}

/// Decision policy for a CPU fighter.
///
/// Works only through the fighter's public moves and queries. Each tick
/// runs, in order: retreat after being hit, the tiredness roll, approach,
/// Y calibration, X calibration and finally the punch roll. Several of
/// these can move the fighter in the same tick.
#[derive(Debug, Clone)]
pub struct CpuBrain {
    rng: ChaCha8Rng,
    difficulty: DifficultyConfig,
    movement_x_chunk: u32,
    movement_y_chunk: u32,
    movement_x_hit_chunk: u32,
    movement_y_hit_chunk: u32,
    chosen_y: Option<Vertical>,
    tired: bool,
    tired_remaining_ms: f32,
}

impl CpuBrain {
    pub fn new(difficulty: DifficultyConfig, seed: u64) -> Self {
        CpuBrain {
            rng: ChaCha8Rng::seed_from_u64(seed),
            difficulty,
            movement_x_chunk: 0,
            movement_y_chunk: 0,
            movement_x_hit_chunk: 0,
            movement_y_hit_chunk: 0,
            chosen_y: None,
            tired: false,
            tired_remaining_ms: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.movement_x_chunk = 0;
        self.movement_y_chunk = 0;
        self.movement_x_hit_chunk = 0;
        self.movement_y_hit_chunk = 0;
        self.chosen_y = None;
        self.tired = false;
        self.tired_remaining_ms = 0.0;
    }

    pub fn is_tired(&self) -> bool {
        self.tired
    }

    /// `dt` in seconds, same as the fighter's update
    pub fn think(&mut self, boxer: &mut Boxer, dt: f32) -> Result<(), BoxingError> {
        self.recover(dt);

        self.move_away_x_if_hit(boxer, dt)?;
        self.move_away_y_if_hit(boxer, dt)?;
        self.roll_tired(boxer);

        if !self.tired && boxer.state() == CombatState::Idle && self.movement_x_hit_chunk == 0 {
            self.get_in_x_range(boxer, dt)?;
            self.get_in_y_range(boxer, dt)?;
        }

        self.get_over_minimum_y_range(boxer, dt)?;
        self.get_over_minimum_x_range(boxer, dt)?;

        if self.is_in_punching_range(boxer)? && self.rng.gen_bool(self.difficulty.punch_chance) {
            boxer.punch()?;
        }
        Ok(())
    }

    fn recover(&mut self, dt: f32) {
        if !self.tired {
            return;
        }
        self.tired_remaining_ms -= dt * 1000.0;
        if self.tired_remaining_ms <= 0.0 {
            self.tired = false;
            self.tired_remaining_ms = 0.0;
        }
    }

    fn roll_tired(&mut self, boxer: &Boxer) {
        let score = boxer.score();
        if self.tired || score < self.difficulty.tired_threshold || !self.rng.gen_bool(chance::TIRED)
        {
            return;
        }
        self.tired = true;
        self.tired_remaining_ms = match score {
            0..=49 => 250.0,
            50..=74 => 750.0,
            _ => 1000.0,
        };
    }

    fn move_away_x_if_hit(&mut self, boxer: &mut Boxer, dt: f32) -> Result<(), BoxingError> {
        if self.movement_x_hit_chunk == 0
            && self.movement_x_chunk == 0
            && boxer.state().is_hit()
            && self.rng.gen_bool(chance::RETREAT_X_WHEN_HIT)
        {
            self.movement_x_hit_chunk = ticks::RETREAT_X_WHEN_HIT;
            // being hit may wear the fighter out
            self.roll_tired(boxer);
        }

        if self.movement_x_hit_chunk > 0 && boxer.state() == CombatState::Idle {
            self.movement_x_hit_chunk -= 1;
            back_off(boxer, dt);
        }
        Ok(())
    }

    fn move_away_y_if_hit(&mut self, boxer: &mut Boxer, dt: f32) -> Result<(), BoxingError> {
        if self.movement_y_hit_chunk == 0
            && self.movement_y_chunk == 0
            && boxer.state().is_hit()
            && self.rng.gen_bool(chance::RETREAT_Y_WHEN_HIT)
        {
            self.movement_y_hit_chunk = ticks::RETREAT_Y_WHEN_HIT;
        }

        if self.movement_y_hit_chunk > 0 && boxer.state() == CombatState::Idle {
            self.movement_y_hit_chunk -= 1;
            if boxer.is_above_opponent()? {
                boxer.move_up(dt);
            } else {
                boxer.move_down(dt);
            }
        }
        Ok(())
    }

    fn get_in_x_range(&mut self, boxer: &mut Boxer, dt: f32) -> Result<(), BoxingError> {
        if boxer.x_distance_to_opponent()? > range::MAX_X {
            if boxer.is_facing_right() {
                boxer.move_right(dt);
            } else {
                boxer.move_left(dt);
            }
        }
        Ok(())
    }

    fn get_in_y_range(&mut self, boxer: &mut Boxer, dt: f32) -> Result<(), BoxingError> {
        if boxer.y_distance_to_opponent()? > range::MAX_Y {
            if boxer.is_above_opponent()? {
                boxer.move_down(dt);
            } else {
                boxer.move_up(dt);
            }
        }
        Ok(())
    }

    /// Standing exactly level with the opponent makes for a dull stand-off,
    /// so when aligned the brain commits to a short trip up or down
    fn get_over_minimum_y_range(&mut self, boxer: &mut Boxer, dt: f32) -> Result<(), BoxingError> {
        if boxer.state().is_hit() {
            self.movement_y_chunk = 0;
            self.chosen_y = None;
            return Ok(());
        }

        if boxer.y_distance_to_opponent()? <= range::MIN_Y
            && boxer.x_distance_to_opponent()? <= range::MAX_X
            && self.movement_y_chunk == 0
            && self.movement_y_hit_chunk == 0
            && boxer.state() == CombatState::Idle
        {
            self.chosen_y = Some(if self.rng.gen_bool(0.5) {
                Vertical::Top
            } else {
                Vertical::Bottom
            });
            self.movement_y_chunk = ticks::Y_EXCURSION;
        }

        if self.movement_y_chunk > 0 {
            self.movement_y_chunk -= 1;
            match self.chosen_y {
                Some(Vertical::Top) => boxer.move_up(dt),
                _ => boxer.move_down(dt),
            }
        }
        Ok(())
    }

    fn get_over_minimum_x_range(&mut self, boxer: &mut Boxer, dt: f32) -> Result<(), BoxingError> {
        if range::CROWDED_X.contains(&boxer.x_distance_to_opponent()?)
            && self.movement_x_chunk == 0
            && self.movement_x_hit_chunk == 0
            && boxer.state() == CombatState::Idle
            && self.rng.gen_bool(chance::CROWDED_RETREAT)
        {
            self.movement_x_chunk = ticks::CROWDED_RETREAT;
        }

        if self.movement_x_chunk > 0 {
            self.movement_x_chunk -= 1;
            back_off(boxer, dt);
        }
        Ok(())
    }

    fn is_in_punching_range(&self, boxer: &Boxer) -> Result<bool, BoxingError> {
        let y_distance = boxer.y_distance_to_opponent()?;
        Ok(boxer.x_distance_to_opponent()? <= range::MAX_X
            && y_distance <= range::MAX_Y
            && y_distance > range::MIN_Y)
    }
}

fn back_off(boxer: &mut Boxer, dt: f32) {
    if boxer.is_facing_right() {
        boxer.move_left(dt);
    } else {
        boxer.move_right(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxer::tests::{humans, place};
    use crate::boxer::SharedBoxer;
    use crate::config::Difficulty;
    use crate::sprite::state::Facing;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn preset(punch_chance: f64) -> DifficultyConfig {
        DifficultyConfig {
            punch_chance,
            ..Difficulty::Normal.preset()
        }
    }

    fn think(brain: &mut CpuBrain, boxer: &SharedBoxer) {
        brain.think(&mut boxer.borrow_mut(), DT).unwrap();
    }

    #[test]
    fn far_away_brain_closes_the_distance() {
        let (cpu, human) = humans();
        place(&cpu, 130.0, 100.0, Facing::Right);
        place(&human, 380.0, 280.0, Facing::Left);
        let mut brain = CpuBrain::new(preset(0.0), 1);

        think(&mut brain, &cpu);

        let position = cpu.borrow().position();
        assert_relative_eq!(position.x, 130.0 + 325.0 * DT, epsilon = 1e-3);
        assert_relative_eq!(position.y, 100.0 + 200.0 * DT, epsilon = 1e-3);
    }

    #[test]
    fn tired_brain_does_not_approach() {
        let (cpu, human) = humans();
        place(&cpu, 130.0, 100.0, Facing::Right);
        place(&human, 380.0, 280.0, Facing::Left);
        let mut brain = CpuBrain::new(preset(0.0), 1);
        brain.tired = true;
        brain.tired_remaining_ms = 250.0;

        think(&mut brain, &cpu);
        assert_eq!(cpu.borrow().position().x, 130.0);
        assert!(brain.is_tired());
    }

    #[test]
    fn tiredness_wears_off_after_its_duration() {
        let (cpu, human) = humans();
        place(&cpu, 130.0, 100.0, Facing::Right);
        place(&human, 380.0, 280.0, Facing::Left);
        let mut brain = CpuBrain::new(preset(0.0), 1);
        brain.tired = true;
        brain.tired_remaining_ms = 250.0;

        // 15 ticks = 250ms
        for _ in 0..14 {
            think(&mut brain, &cpu);
            assert!(brain.is_tired());
        }
        for _ in 0..2 {
            think(&mut brain, &cpu);
        }
        assert!(!brain.is_tired());
        assert!(cpu.borrow().position().x > 130.0);
    }

    #[test]
    fn low_score_never_tires() {
        let (cpu, _human) = humans();
        let mut brain = CpuBrain::new(preset(0.0), 3);
        for _ in 0..1_000 {
            brain.roll_tired(&cpu.borrow());
        }
        assert!(!brain.is_tired());
    }

    #[test]
    fn high_score_eventually_tires_for_its_band() {
        let (cpu, _human) = humans();
        cpu.borrow_mut().set_score(60);
        let mut brain = CpuBrain::new(preset(0.0), 3);
        for _ in 0..10_000 {
            brain.roll_tired(&cpu.borrow());
            if brain.is_tired() {
                break;
            }
        }
        assert!(brain.is_tired());
        assert_eq!(brain.tired_remaining_ms, 750.0);
    }

    #[test]
    fn punches_when_in_range() {
        let (cpu, human) = humans();
        // 30 apart vertically, 70 apart horizontally
        place(&cpu, 200.0, 200.0, Facing::Right);
        place(&human, 194.0, 170.0, Facing::Left);
        let mut brain = CpuBrain::new(preset(1.0), 5);

        think(&mut brain, &cpu);
        assert!(cpu.borrow().state().is_punching());
    }

    #[test]
    fn never_punches_out_of_range() {
        let (cpu, human) = humans();
        place(&cpu, 130.0, 100.0, Facing::Right);
        place(&human, 380.0, 280.0, Facing::Left);
        let mut brain = CpuBrain::new(preset(1.0), 5);

        for _ in 0..5 {
            think(&mut brain, &cpu);
        }
        assert_eq!(cpu.borrow().state(), CombatState::Idle);
    }

    #[test]
    fn level_stand_off_commits_to_a_vertical_excursion() {
        let (cpu, human) = humans();
        place(&cpu, 200.0, 200.0, Facing::Right);
        place(&human, 214.0, 200.0, Facing::Left);
        let mut brain = CpuBrain::new(preset(0.0), 9);

        think(&mut brain, &cpu);
        assert_eq!(brain.movement_y_chunk, ticks::Y_EXCURSION - 1);
        let y = cpu.borrow().position().y;
        match brain.chosen_y {
            Some(Vertical::Top) => assert!(y < 200.0),
            Some(Vertical::Bottom) => assert!(y > 200.0),
            None => panic!("no direction chosen"),
        }
    }

    #[test]
    fn being_hit_cancels_the_vertical_excursion() {
        let (cpu, _human) = humans();
        let mut brain = CpuBrain::new(preset(0.0), 9);
        brain.movement_y_chunk = 12;
        brain.chosen_y = Some(Vertical::Top);
        cpu.borrow_mut().set_state(CombatState::HitFromBottom);

        brain
            .get_over_minimum_y_range(&mut cpu.borrow_mut(), DT)
            .unwrap();
        assert_eq!(brain.movement_y_chunk, 0);
        assert_eq!(brain.chosen_y, None);
    }

    #[test]
    fn committed_retreat_drains_one_tick_at_a_time() {
        let (cpu, human) = humans();
        place(&cpu, 300.0, 200.0, Facing::Right);
        place(&human, 400.0, 290.0, Facing::Left);
        let mut brain = CpuBrain::new(preset(0.0), 9);
        brain.movement_x_chunk = 3;

        for expected in [2, 1, 0, 0] {
            brain
                .get_over_minimum_x_range(&mut cpu.borrow_mut(), DT)
                .unwrap();
            assert_eq!(brain.movement_x_chunk, expected);
        }
        assert_relative_eq!(
            cpu.borrow().position().x,
            300.0 - 3.0 * 325.0 * DT,
            epsilon = 1e-3
        );
    }

    #[test]
    fn reset_forgets_everything() {
        let mut brain = CpuBrain::new(preset(0.5), 9);
        brain.movement_x_hit_chunk = 4;
        brain.tired = true;
        brain.chosen_y = Some(Vertical::Bottom);
        brain.reset();

        assert_eq!(brain.movement_x_hit_chunk, 0);
        assert!(!brain.is_tired());
        assert_eq!(brain.chosen_y, None);
    }

    #[test]
    fn same_seed_same_fight() {
        let run = || {
            let (cpu, human) = humans();
            place(&cpu, 200.0, 200.0, Facing::Right);
            place(&human, 214.0, 200.0, Facing::Left);
            let mut brain = CpuBrain::new(preset(0.33), 42);
            let mut trace = Vec::new();
            for _ in 0..120 {
                think(&mut brain, &cpu);
                let cpu = cpu.borrow();
                trace.push((cpu.position(), cpu.state()));
            }
            trace
        };
        assert_eq!(run(), run());
    }
}
