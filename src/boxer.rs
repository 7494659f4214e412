use crate::audio::AudioSignal;
use crate::brain::CpuBrain;
use crate::config::{DifficultyConfig, FighterConfig, RING_INNER};
use crate::engine::input::Action;
use crate::engine::{is_colliding, Overlap, Point, Rect};
use crate::error::BoxingError;
use crate::game::{GameContext, MatchState};
use crate::sprite::animation::{AnimationPlayer, ClipView};
use crate::sprite::state::{AnimationEvent, AnimationStateMachine, CombatState, Facing, PunchKind};
use crate::sprite::{ClipTable, FrameTag, SpriteId};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

// ==================== Body ====================
mod body {
    pub const HEIGHT: f32 = 110.0;
    /// Sprite width with the arm fully extended
    pub const FULL_WIDTH: f32 = 134.0;
    /// Idle width, a little under the real one so fighters may overlap slightly
    pub const WIDTH: f32 = 58.0;
    pub const ACTUAL_WIDTH: f32 = 63.0;

    pub const SPEED_X: f32 = 325.0;
    pub const SPEED_Y: f32 = 200.0;
    pub const HIT_SPEED_X: f32 = 200.0;
    pub const HIT_SPEED_Y: f32 = 280.0;

    pub const HEAD_WIDTH: f32 = 45.0;
    pub const HEAD_HEIGHT: f32 = 36.0;
    pub const HEAD_TOP: f32 = 40.0;
    pub const HEAD_DISPLACEMENT: f32 = 9.0;

    pub const GLOVE_WIDTH: f32 = 36.0;
    pub const GLOVE_HEIGHT: f32 = 25.0;

    /// Margin the trailing edge must cross before a fighter turns around
    pub const FLIP_HYSTERESIS: f32 = 8.0;
    /// Hits landed at or under this center distance score double
    pub const CLOSE_RANGE: f32 = 80.0;

    pub const FAST_FORWARD: f32 = 2.0;
}

pub use body::{HEIGHT, WIDTH};

pub type SharedBoxer = Rc<RefCell<Boxer>>;

/// Every box another fighter can collide with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitboxes {
    pub body: Rect,
    pub head: Rect,
    pub top_glove: Rect,
    pub bottom_glove: Rect,
}

/// What a fighter reads off its opponent in one go, so the opponent is
/// borrowed once per query and never while it is being mutated
#[derive(Debug, Clone, Copy)]
struct OpponentView {
    boxes: Hitboxes,
    state: CombatState,
    x_center: f32,
    y_center: f32,
}

/// One fighter in the ring.
///
/// Owns its position, score and animation. The opponent is a non-owning
/// link set once by the match (`link_opponents`); every query that needs
/// the opponent fails with `PreconditionViolated` until then. A fighter
/// with a `CpuBrain` drives itself, one without reads the keyboard.
#[derive(Debug)]
pub struct Boxer {
    config: FighterConfig,
    x: f32,
    y: f32,
    score: u32,
    machine: AnimationStateMachine,
    animation: AnimationPlayer,
    clips: Rc<ClipTable>,
    /// Animation time scale, 2 while a hit reaction or reversed punch plays
    speed_multiplier: f32,
    /// Walking speed scale, from the difficulty preset
    movement_speed: f32,
    close_range_score_nerf: bool,
    opponent: Weak<RefCell<Boxer>>,
    brain: Option<CpuBrain>,
}

impl Boxer {
    pub fn human(config: FighterConfig, clips: Rc<ClipTable>) -> Self {
        let mut boxer = Boxer {
            config,
            x: config.x,
            y: config.y,
            score: 0,
            machine: AnimationStateMachine::new(),
            animation: AnimationPlayer::new(),
            clips,
            speed_multiplier: 1.0,
            movement_speed: 1.0,
            close_range_score_nerf: false,
            opponent: Weak::new(),
            brain: None,
        };
        boxer.reset();
        boxer
    }

    pub fn cpu(
        config: FighterConfig,
        clips: Rc<ClipTable>,
        difficulty: DifficultyConfig,
        seed: u64,
    ) -> Self {
        Boxer {
            movement_speed: difficulty.speed_multiplier,
            close_range_score_nerf: difficulty.close_range_score_nerf,
            brain: Some(CpuBrain::new(difficulty, seed)),
            ..Boxer::human(config, clips)
        }
    }

    pub fn shared(self) -> SharedBoxer {
        Rc::new(RefCell::new(self))
    }

    pub fn reset(&mut self) {
        self.x = self.config.x;
        self.y = self.config.y;
        self.score = 0;
        self.machine = AnimationStateMachine::new();
        self.speed_multiplier = 1.0;
        if let Some(brain) = self.brain.as_mut() {
            brain.reset();
        }
        self.sync_clip();
    }

    // ==================== Queries ====================
    pub fn state(&self) -> CombatState {
        self.machine.state()
    }

    pub fn facing(&self) -> Facing {
        self.machine.facing()
    }

    pub fn is_facing_right(&self) -> bool {
        self.facing() == Facing::Right
    }

    pub fn is_cpu(&self) -> bool {
        self.brain.is_some()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn position(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    pub fn color(&self) -> &'static str {
        self.config.color
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.speed_multiplier
    }

    pub fn sprite(&self) -> Result<SpriteId, BoxingError> {
        Ok(self.animation.frame()?.sprite)
    }

    pub fn body_box(&self) -> Rect {
        let left = self.body_left();
        Rect::from_edges(left, left + body::WIDTH, self.y, self.y + body::HEIGHT)
    }

    pub fn head_box(&self) -> Rect {
        let top = self.y + body::HEAD_TOP;
        let left = match self.facing() {
            Facing::Right => self.x + body::HEAD_DISPLACEMENT,
            Facing::Left => {
                self.x + body::FULL_WIDTH - body::HEAD_DISPLACEMENT - body::HEAD_WIDTH
            }
        };
        Rect::new(left, top, body::HEAD_WIDTH, body::HEAD_HEIGHT)
    }

    /// Glove position follows the current animation frame
    pub fn top_glove_box(&self) -> Result<Rect, BoxingError> {
        Ok(Rect::new(
            self.glove_left()?,
            self.y,
            body::GLOVE_WIDTH,
            body::GLOVE_HEIGHT,
        ))
    }

    pub fn bottom_glove_box(&self) -> Result<Rect, BoxingError> {
        Ok(Rect::new(
            self.glove_left()?,
            self.y + body::HEIGHT - body::GLOVE_HEIGHT,
            body::GLOVE_WIDTH,
            body::GLOVE_HEIGHT,
        ))
    }

    pub fn hitboxes(&self) -> Result<Hitboxes, BoxingError> {
        Ok(Hitboxes {
            body: self.body_box(),
            head: self.head_box(),
            top_glove: self.top_glove_box()?,
            bottom_glove: self.bottom_glove_box()?,
        })
    }

    pub fn x_center(&self) -> f32 {
        self.body_left() + (body::ACTUAL_WIDTH - body::WIDTH) + body::ACTUAL_WIDTH / 2.0
    }

    pub fn y_center(&self) -> f32 {
        self.y + body::HEIGHT / 2.0
    }

    pub fn x_distance_to_opponent(&self) -> Result<f32, BoxingError> {
        Ok((self.x_center() - self.opponent_view()?.x_center).abs())
    }

    pub fn y_distance_to_opponent(&self) -> Result<f32, BoxingError> {
        Ok((self.y_center() - self.opponent_view()?.y_center).abs())
    }

    pub fn is_above_opponent(&self) -> Result<bool, BoxingError> {
        Ok(self.y_center() < self.opponent_view()?.y_center)
    }

    fn body_left(&self) -> f32 {
        match self.facing() {
            Facing::Right => self.x,
            Facing::Left => self.x + body::FULL_WIDTH - body::WIDTH,
        }
    }

    fn glove_left(&self) -> Result<f32, BoxingError> {
        Ok(self.x + self.animation.frame()?.hitbox_offset_x)
    }

    // ==================== Opponent link ====================
    fn opponent(&self) -> Result<SharedBoxer, BoxingError> {
        self.opponent
            .upgrade()
            .ok_or(BoxingError::PreconditionViolated("opponent not linked"))
    }

    fn opponent_view(&self) -> Result<OpponentView, BoxingError> {
        let shared = self.opponent()?;
        let opponent = shared
            .try_borrow()
            .map_err(|_| BoxingError::InvalidState("opponent is already borrowed"))?;
        Ok(OpponentView {
            boxes: opponent.hitboxes()?,
            state: opponent.state(),
            x_center: opponent.x_center(),
            y_center: opponent.y_center(),
        })
    }

    // ==================== Commands ====================
    /// Starts a punch towards the opponent's half, only from idle
    pub fn punch(&mut self) -> Result<(), BoxingError> {
        if self.state() != CombatState::Idle {
            return Ok(());
        }
        let kind = if self.is_above_opponent()? {
            PunchKind::Bottom
        } else {
            PunchKind::Top
        };
        self.machine.on_event(AnimationEvent::PunchRequested(kind));
        self.sync_clip();
        Ok(())
    }

    /// Called by the opponent when one of its punches lands
    pub fn set_state(&mut self, state: CombatState) {
        let event = match state {
            CombatState::HitFromTop => AnimationEvent::HitTakenTop,
            CombatState::HitFromBottom => AnimationEvent::HitTakenBottom,
            CombatState::PunchingTop => AnimationEvent::PunchRequested(PunchKind::Top),
            CombatState::PunchingBottom => AnimationEvent::PunchRequested(PunchKind::Bottom),
            CombatState::Idle => AnimationEvent::ClipFinished,
        };
        self.machine.on_event(event);
        self.speed_multiplier = if state.is_hit() {
            body::FAST_FORWARD
        } else {
            1.0
        };
        self.sync_clip();
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.clamp_to_ring();
    }

    pub fn set_score(&mut self, score: u32) {
        self.score = score;
    }

    pub fn move_up(&mut self, dt: f32) {
        self.move_up_at(dt, body::SPEED_Y * self.movement_speed);
    }

    pub fn move_down(&mut self, dt: f32) {
        self.move_down_at(dt, body::SPEED_Y * self.movement_speed);
    }

    pub fn move_left(&mut self, dt: f32) {
        self.move_left_at(dt, body::SPEED_X * self.movement_speed);
    }

    pub fn move_right(&mut self, dt: f32) {
        self.move_right_at(dt, body::SPEED_X * self.movement_speed);
    }

    pub fn move_up_at(&mut self, dt: f32, speed: f32) {
        self.y -= speed * dt;
        self.clamp_to_ring();
    }

    pub fn move_down_at(&mut self, dt: f32, speed: f32) {
        self.y += speed * dt;
        self.clamp_to_ring();
    }

    pub fn move_left_at(&mut self, dt: f32, speed: f32) {
        self.x -= speed * dt;
        self.clamp_to_ring();
    }

    pub fn move_right_at(&mut self, dt: f32, speed: f32) {
        self.x += speed * dt;
        self.clamp_to_ring();
    }

    /// Moves one axis at a time and undoes an axis that would push the
    /// bodies further into each other, so fighters slide along each other
    /// and can always step out of an overlap
    pub fn move_with_body_collision(&mut self, dx: f32, dy: f32) -> Result<(), BoxingError> {
        let opponent_body = self.opponent_view()?.boxes.body;

        let previous_x = self.x;
        let overlap = self.body_box().overlap_area(&opponent_body);
        self.x += dx;
        self.clamp_to_ring();
        if self.body_box().overlap_area(&opponent_body) > overlap {
            self.x = previous_x;
        }

        let previous_y = self.y;
        let overlap = self.body_box().overlap_area(&opponent_body);
        self.y += dy;
        self.clamp_to_ring();
        if self.body_box().overlap_area(&opponent_body) > overlap {
            self.y = previous_y;
        }
        Ok(())
    }

    fn clamp_to_ring(&mut self) {
        let offset = self.body_left() - self.x;
        self.x = self.x.clamp(
            RING_INNER.left() - offset,
            RING_INNER.right() - body::WIDTH - offset,
        );
        self.y = self
            .y
            .clamp(RING_INNER.top(), RING_INNER.bottom() - body::HEIGHT);
    }

    // ==================== Update ====================
    /// One simulation tick, `dt` in seconds. Order matters: the hitbox used
    /// for hit resolution is the one of the frame shown *before* this
    /// tick's animation advance.
    pub fn update(&mut self, dt: f32, ctx: &dyn GameContext) -> Result<(), BoxingError> {
        self.pilot(dt, ctx)?;
        self.update_facing()?;
        self.update_hitting(ctx)?;
        self.update_knockback(dt);
        self.update_animation(dt);
        Ok(())
    }

    fn pilot(&mut self, dt: f32, ctx: &dyn GameContext) -> Result<(), BoxingError> {
        if let Some(mut brain) = self.brain.take() {
            let thought = match ctx.state() {
                MatchState::Playing | MatchState::Demo => brain.think(self, dt),
                _ => Ok(()),
            };
            self.brain = Some(brain);
            return thought;
        }

        if ctx.state() != MatchState::Playing {
            return Ok(());
        }
        let input = ctx.input();
        if input.just_pressed(Action::Punch) {
            self.punch()?;
        }
        if self.state().is_hit() {
            return Ok(());
        }

        let step_x = body::SPEED_X * self.movement_speed * dt;
        let step_y = body::SPEED_Y * self.movement_speed * dt;
        let mut dx = 0.0;
        let mut dy = 0.0;
        if input.is_down(Action::MoveUp) {
            dy -= step_y;
        }
        if input.is_down(Action::MoveDown) {
            dy += step_y;
        }
        if input.is_down(Action::MoveLeft) {
            dx -= step_x;
        }
        if input.is_down(Action::MoveRight) {
            dx += step_x;
        }
        self.move_with_body_collision(dx, dy)
    }

    fn update_facing(&mut self) -> Result<(), BoxingError> {
        if self.state() != CombatState::Idle {
            return Ok(());
        }
        let opponent_body = self.opponent_view()?.boxes.body;
        let own_body = self.body_box();

        let flipped = match self.facing() {
            Facing::Right if own_body.right() + body::FLIP_HYSTERESIS > opponent_body.right() => {
                self.x -= body::WIDTH;
                Some(Facing::Left)
            }
            Facing::Left if own_body.left() - body::FLIP_HYSTERESIS < opponent_body.left() => {
                self.x += body::WIDTH;
                Some(Facing::Right)
            }
            _ => None,
        };

        if let Some(facing) = flipped {
            self.machine.set_facing(facing);
            self.clamp_to_ring();
            self.sync_clip();
        }
        Ok(())
    }

    fn update_hitting(&mut self, ctx: &dyn GameContext) -> Result<(), BoxingError> {
        let kind = match self.state() {
            CombatState::PunchingTop => PunchKind::Top,
            CombatState::PunchingBottom => PunchKind::Bottom,
            _ => return Ok(()),
        };
        let opponent = self.opponent_view()?;
        // one exchange at a time
        if self.speed_multiplier != 1.0 || opponent.state.is_hit() {
            return Ok(());
        }

        let glove = match kind {
            PunchKind::Top => self.top_glove_box()?,
            PunchKind::Bottom => self.bottom_glove_box()?,
        };

        let blocked = [opponent.boxes.top_glove, opponent.boxes.bottom_glove]
            .iter()
            .any(|other| is_colliding(&glove, other, Overlap::Inclusive));
        // blocks away from an extend frame do not fast-forward, so they
        // keep blocking every tick the gloves touch
        if blocked {
            self.machine.on_event(AnimationEvent::HitBlocked);
            self.reverse_punch();
            ctx.emit(AudioSignal::GloveHit);
            return Ok(());
        }

        if is_colliding(&glove, &opponent.boxes.head, Overlap::Inclusive) {
            self.reverse_punch();
            let distance = (self.x_center() - opponent.x_center).abs();
            self.score += if distance <= body::CLOSE_RANGE && !self.close_range_score_nerf {
                2
            } else {
                1
            };

            let hit = match kind {
                PunchKind::Top => CombatState::HitFromTop,
                PunchKind::Bottom => CombatState::HitFromBottom,
            };
            self.opponent()?
                .try_borrow_mut()
                .map_err(|_| BoxingError::InvalidState("opponent is already borrowed"))?
                .set_state(hit);
            ctx.emit(AudioSignal::HeadHit);
        }
        Ok(())
    }

    /// Jumps an extending punch to its retract frame and plays the rest at
    /// double speed. No matching frame -> the punch plays out normally.
    fn reverse_punch(&mut self) {
        let Some(view) = self.animation.clip() else {
            return;
        };
        let index = self.animation.frame_index();
        let extending = view
            .frames()
            .get(index)
            .map_or(false, |frame| frame.tag == Some(FrameTag::Extend));
        if !extending {
            return;
        }
        if let Some(tail) = view
            .retract_index_for(index)
            .and_then(|retract| view.from_frame(retract))
        {
            self.animation.play(tail);
            self.speed_multiplier = body::FAST_FORWARD;
        }
    }

    fn update_knockback(&mut self, dt: f32) {
        match self.state() {
            CombatState::HitFromBottom => self.move_up_at(dt, body::HIT_SPEED_Y),
            CombatState::HitFromTop => self.move_down_at(dt, body::HIT_SPEED_Y),
            _ => return,
        }
        match self.facing() {
            Facing::Right => self.move_left_at(dt, body::HIT_SPEED_X),
            Facing::Left => self.move_right_at(dt, body::HIT_SPEED_X),
        }
    }

    fn update_animation(&mut self, dt: f32) {
        self.animation.update(dt * self.speed_multiplier);
        if self.animation.is_finished() {
            self.machine.on_event(AnimationEvent::ClipFinished);
            self.speed_multiplier = 1.0;
            self.sync_clip();
        }
    }

    /// Restarts the clip the state machine resolves to
    fn sync_clip(&mut self) {
        let id = self.machine.clip_id();
        self.animation.play(ClipView::full(self.clips.get(id)));
    }
}

/// Wires both fighters to each other, before the first update
pub fn link_opponents(one: &SharedBoxer, two: &SharedBoxer) {
    one.borrow_mut().opponent = Rc::downgrade(two);
    two.borrow_mut().opponent = Rc::downgrade(one);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::AudioBus;
    use crate::config::{Corner, Difficulty, P1_CONFIG, P2_CONFIG};
    use crate::engine::input::InputManager;
    use crate::game::RoundContext;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::cell::Cell;

    pub(crate) fn clips() -> Rc<ClipTable> {
        Rc::new(ClipTable::standard().unwrap())
    }

    pub(crate) fn linked_pair(one: Boxer, two: Boxer) -> (SharedBoxer, SharedBoxer) {
        let one = one.shared();
        let two = two.shared();
        link_opponents(&one, &two);
        (one, two)
    }

    pub(crate) fn humans() -> (SharedBoxer, SharedBoxer) {
        let clips = clips();
        linked_pair(
            Boxer::human(P1_CONFIG, Rc::clone(&clips)),
            Boxer::human(P2_CONFIG, clips),
        )
    }

    /// Puts a fighter somewhere with a given facing, without clamping games
    pub(crate) fn place(boxer: &SharedBoxer, x: f32, y: f32, facing: Facing) {
        let mut boxer = boxer.borrow_mut();
        boxer.machine.set_facing(facing);
        boxer.x = x;
        boxer.y = y;
        boxer.sync_clip();
    }

    /// Plays the current clip forward without any other per-tick logic
    pub(crate) fn advance_animation(boxer: &SharedBoxer, dt: f32) {
        boxer.borrow_mut().update_animation(dt);
    }

    fn counting_bus() -> (AudioBus, Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let bus = AudioBus::new();
        let glove = Rc::new(Cell::new(0));
        let head = Rc::new(Cell::new(0));
        let glove_hits = Rc::clone(&glove);
        let head_hits = Rc::clone(&head);
        bus.subscribe(AudioSignal::GloveHit, move || glove_hits.set(glove_hits.get() + 1));
        bus.subscribe(AudioSignal::HeadHit, move || head_hits.set(head_hits.get() + 1));
        (bus, glove, head)
    }

    fn tick(boxer: &SharedBoxer, dt: f32, input: &InputManager, bus: &AudioBus) {
        let ctx = RoundContext::new(MatchState::Playing, input, bus);
        boxer.borrow_mut().update(dt, &ctx).unwrap();
    }

    /// Attacker at (200, 200) facing right, defender facing left with its
    /// head in reach of the attacker's top glove
    fn landed_punch_at(defender_x: f32) -> (SharedBoxer, SharedBoxer, Rc<Cell<u32>>) {
        let (attacker, defender) = humans();
        place(&attacker, 200.0, 200.0, Facing::Right);
        place(&defender, defender_x, 170.0, Facing::Left);

        let input = InputManager::default();
        let (bus, _, head_hits) = counting_bus();

        attacker.borrow_mut().punch().unwrap();
        assert_eq!(attacker.borrow().state(), CombatState::PunchingTop);

        // wind up (0.045s) + first extend frame (0.03s) -> half reach
        tick(&attacker, 0.08, &input, &bus);
        assert_eq!(attacker.borrow().score(), 0);
        tick(&attacker, 0.0, &input, &bus);
        (attacker, defender, head_hits)
    }

    #[test]
    fn unlinked_fighter_reports_missing_opponent() {
        let boxer = Boxer::human(P1_CONFIG, clips());
        assert_eq!(
            boxer.x_distance_to_opponent(),
            Err(BoxingError::PreconditionViolated("opponent not linked"))
        );
        let mut boxer = boxer;
        assert_eq!(
            boxer.punch(),
            Err(BoxingError::PreconditionViolated("opponent not linked"))
        );
    }

    #[test]
    fn dropped_opponent_is_a_precondition_violation() {
        let one = Boxer::human(P1_CONFIG, clips()).shared();
        {
            let two = Boxer::human(P2_CONFIG, clips()).shared();
            link_opponents(&one, &two);
            assert!(one.borrow().x_distance_to_opponent().is_ok());
        }
        assert!(one.borrow().is_above_opponent().is_err());
    }

    #[test]
    fn reset_restores_the_spawn_configuration() {
        let (one, _two) = humans();
        {
            let mut one = one.borrow_mut();
            one.set_position(300.0, 250.0);
            one.set_score(42);
            one.set_state(CombatState::HitFromTop);
            one.reset();
        }
        let one = one.borrow();
        assert_eq!(one.position(), Point { x: 120.0, y: 98.0 });
        assert_eq!(one.score(), 0);
        assert_eq!(one.state(), CombatState::Idle);
        assert_eq!(one.facing(), Facing::Right);
        assert_eq!(one.speed_multiplier(), 1.0);
        assert_eq!(one.sprite(), Ok(crate::sprite::sprites::STANCE_01_RIGHT));
        assert_eq!(one.config.corner, Corner::One);
    }

    #[test]
    fn close_head_hit_scores_two() {
        let (attacker, defender, head_hits) = landed_punch_at(194.0);
        assert_relative_eq!(attacker.borrow().x_distance_to_opponent().unwrap(), 70.0);
        assert_eq!(attacker.borrow().score(), 2);
        assert_eq!(defender.borrow().state(), CombatState::HitFromTop);
        assert_eq!(head_hits.get(), 1);
    }

    #[test]
    fn distant_head_hit_scores_one() {
        let (attacker, defender, _) = landed_punch_at(214.0);
        assert_relative_eq!(attacker.borrow().x_distance_to_opponent().unwrap(), 90.0);
        assert_eq!(attacker.borrow().score(), 1);
        assert!(defender.borrow().state().is_hit());
    }

    #[test]
    fn close_range_nerf_scores_close_hits_as_one() {
        let clips = clips();
        let mut attacker = Boxer::human(P1_CONFIG, Rc::clone(&clips));
        attacker.close_range_score_nerf = Difficulty::Easy.preset().close_range_score_nerf;
        let (attacker, defender) = linked_pair(attacker, Boxer::human(P2_CONFIG, clips));
        place(&attacker, 200.0, 200.0, Facing::Right);
        place(&defender, 194.0, 170.0, Facing::Left);

        let input = InputManager::default();
        let (bus, _, _) = counting_bus();
        attacker.borrow_mut().punch().unwrap();
        tick(&attacker, 0.08, &input, &bus);
        tick(&attacker, 0.0, &input, &bus);

        assert_eq!(attacker.borrow().score(), 1);
    }

    #[test]
    fn landed_punch_splices_to_retract_at_double_speed() {
        let (attacker, _, _) = landed_punch_at(194.0);
        let attacker = attacker.borrow();
        assert_eq!(attacker.speed_multiplier(), 2.0);
        // half reach extend frame (2) reverses into half reach retract (4)
        assert_eq!(
            attacker.sprite(),
            Ok(crate::sprite::sprites::PUNCH_01_RIGHT_TOP)
        );
        assert_eq!(attacker.animation.clip().map(|view| view.frames().len()), Some(3));
        assert_eq!(attacker.state(), CombatState::PunchingTop);
    }

    #[test]
    fn no_second_hit_while_the_exchange_animates() {
        let (attacker, defender, head_hits) = landed_punch_at(194.0);
        let input = InputManager::default();
        let (bus, _, _) = counting_bus();
        tick(&attacker, 0.0, &input, &bus);
        tick(&attacker, 0.0, &input, &bus);

        assert_eq!(attacker.borrow().score(), 2);
        assert_eq!(head_hits.get(), 1);
        assert!(defender.borrow().state().is_hit());
    }

    #[test]
    fn glove_contact_is_a_block() {
        let (attacker, defender) = humans();
        place(&attacker, 200.0, 200.0, Facing::Right);
        // defender's bottom glove sits right where the attacker's top glove reaches
        place(&defender, 194.0, 115.0, Facing::Left);

        let input = InputManager::default();
        let (bus, glove_hits, head_hits) = counting_bus();
        attacker.borrow_mut().punch().unwrap();
        tick(&attacker, 0.08, &input, &bus);
        tick(&attacker, 0.0, &input, &bus);

        assert_eq!(glove_hits.get(), 1);
        assert_eq!(head_hits.get(), 0);
        assert_eq!(attacker.borrow().score(), 0);
        assert_eq!(attacker.borrow().speed_multiplier(), 2.0);
        assert_eq!(defender.borrow().state(), CombatState::Idle);
    }

    #[test]
    fn block_at_full_reach_keeps_blocking_at_normal_speed() {
        let (attacker, defender) = humans();
        place(&attacker, 200.0, 200.0, Facing::Right);
        // defender's bottom glove covers the attacker's fully extended top glove
        place(&defender, 240.0, 120.0, Facing::Left);

        let input = InputManager::default();
        let (bus, glove_hits, head_hits) = counting_bus();
        attacker.borrow_mut().punch().unwrap();
        // wind up, extend and half reach take 0.105s
        tick(&attacker, 0.12, &input, &bus);
        tick(&attacker, 0.0, &input, &bus);
        tick(&attacker, 0.0, &input, &bus);

        // the full reach frame has no retract twin, nothing to splice to
        assert_eq!(glove_hits.get(), 2);
        assert_eq!(head_hits.get(), 0);
        assert_eq!(attacker.borrow().speed_multiplier(), 1.0);
        assert_eq!(attacker.borrow().state(), CombatState::PunchingTop);
    }

    #[test]
    fn punch_aims_at_the_opponents_half() {
        let (one, two) = humans();
        place(&one, 200.0, 120.0, Facing::Right);
        place(&two, 300.0, 250.0, Facing::Left);
        one.borrow_mut().punch().unwrap();
        assert_eq!(one.borrow().state(), CombatState::PunchingBottom);

        two.borrow_mut().punch().unwrap();
        assert_eq!(two.borrow().state(), CombatState::PunchingTop);
    }

    #[test]
    fn punch_is_ignored_unless_idle() {
        let (one, _two) = humans();
        one.borrow_mut().set_state(CombatState::HitFromBottom);
        one.borrow_mut().punch().unwrap();
        assert_eq!(one.borrow().state(), CombatState::HitFromBottom);
    }

    #[test]
    fn hit_reaction_knocks_back_then_returns_to_idle() {
        let (one, _two) = humans();
        place(&one, 250.0, 200.0, Facing::Right);
        one.borrow_mut().set_state(CombatState::HitFromTop);
        assert_eq!(one.borrow().speed_multiplier(), 2.0);

        let input = InputManager::default();
        let bus = AudioBus::new();
        tick(&one, 0.1, &input, &bus);
        {
            let one = one.borrow();
            assert_relative_eq!(one.position().x, 230.0);
            assert_relative_eq!(one.position().y, 228.0);
        }

        // hit clip lasts 0.6s, at double speed 0.3s
        tick(&one, 0.25, &input, &bus);
        let one = one.borrow();
        assert_eq!(one.state(), CombatState::Idle);
        assert_eq!(one.speed_multiplier(), 1.0);
    }

    #[test]
    fn facing_flips_with_a_body_width_shift_once_past_the_opponent() {
        let (one, two) = humans();
        place(&one, 300.0, 200.0, Facing::Right);
        place(&two, 200.0, 200.0, Facing::Right);

        let input = InputManager::default();
        let bus = AudioBus::new();
        tick(&one, 0.0, &input, &bus);

        let one = one.borrow();
        assert_eq!(one.facing(), Facing::Left);
        assert_relative_eq!(one.position().x, 242.0);
        assert_eq!(one.sprite(), Ok(crate::sprite::sprites::STANCE_01_LEFT));
    }

    #[test]
    fn facing_does_not_flip_back_right_away() {
        let (one, two) = humans();
        place(&one, 300.0, 200.0, Facing::Right);
        place(&two, 200.0, 200.0, Facing::Right);

        let input = InputManager::default();
        let bus = AudioBus::new();
        tick(&one, 0.0, &input, &bus);
        tick(&one, 0.0, &input, &bus);
        assert_eq!(one.borrow().facing(), Facing::Left);
    }

    #[test]
    fn movement_is_continuous() {
        let (one, two) = humans();
        place(&one, 200.0, 200.0, Facing::Right);
        place(&two, 400.0, 100.0, Facing::Left);
        one.borrow_mut().move_right(0.001);
        assert_relative_eq!(one.borrow().position().x, 200.325);
    }

    #[test]
    fn ring_contains_every_move_sequence() {
        let (one, two) = humans();
        // opponent out of the way so only the ropes stop us
        place(&two, 5_000.0, 5_000.0, Facing::Left);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for facing in [Facing::Right, Facing::Left] {
            place(&one, 250.0, 200.0, facing);
            for _ in 0..2_000 {
                let dt = rng.gen_range(0.0..0.2);
                let mut boxer = one.borrow_mut();
                match rng.gen_range(0..5) {
                    0 => boxer.move_up(dt),
                    1 => boxer.move_down(dt),
                    2 => boxer.move_left(dt),
                    3 => boxer.move_right_at(dt, 2_000.0),
                    _ => boxer
                        .move_with_body_collision(
                            rng.gen_range(-90.0..90.0),
                            rng.gen_range(-90.0..90.0),
                        )
                        .unwrap(),
                }

                let body = boxer.body_box();
                assert!(body.left() >= RING_INNER.left());
                assert!(body.right() <= RING_INNER.right());
                assert!(body.top() >= RING_INNER.top());
                assert!(body.bottom() <= RING_INNER.bottom());
            }
        }
    }

    #[test]
    fn body_collision_blocks_one_axis_and_lets_the_other_slide() {
        let (one, two) = humans();
        place(&one, 200.0, 200.0, Facing::Right);
        // opponent body starts at 260
        place(&two, 184.0, 200.0, Facing::Left);

        one.borrow_mut().move_with_body_collision(10.0, 15.0).unwrap();
        let one = one.borrow();
        assert_relative_eq!(one.position().x, 200.0);
        assert_relative_eq!(one.position().y, 215.0);
    }

    #[test]
    fn overlapping_fighter_can_step_back_out() {
        let (one, two) = humans();
        place(&one, 200.0, 200.0, Facing::Right);
        // opponent body starts at 246, 12 into ours
        place(&two, 170.0, 200.0, Facing::Left);

        one.borrow_mut().move_with_body_collision(-10.0, -10.0).unwrap();
        assert_eq!(one.borrow().position(), Point { x: 190.0, y: 190.0 });
    }

    #[test]
    fn overlapping_fighter_cannot_push_deeper() {
        let (one, two) = humans();
        place(&one, 200.0, 200.0, Facing::Right);
        place(&two, 170.0, 200.0, Facing::Left);

        one.borrow_mut().move_with_body_collision(10.0, 0.0).unwrap();
        assert_eq!(one.borrow().position(), Point { x: 200.0, y: 200.0 });
    }

    #[test]
    fn human_moves_only_while_playing() {
        let (one, two) = humans();
        place(&one, 200.0, 200.0, Facing::Right);
        place(&two, 400.0, 290.0, Facing::Left);
        let mut input = InputManager::default();
        input.key_down("ArrowDown");
        let bus = AudioBus::new();

        let paused = RoundContext::new(MatchState::Paused, &input, &bus);
        one.borrow_mut().update(0.1, &paused).unwrap();
        assert_relative_eq!(one.borrow().position().y, 200.0);

        tick(&one, 0.1, &input, &bus);
        assert_relative_eq!(one.borrow().position().y, 220.0);
    }

    #[test]
    fn human_punches_on_the_press_edge() {
        let (one, two) = humans();
        place(&one, 200.0, 200.0, Facing::Right);
        place(&two, 400.0, 290.0, Facing::Left);
        let mut input = InputManager::default();
        input.key_down("Space");
        let bus = AudioBus::new();

        tick(&one, 0.0, &input, &bus);
        assert!(one.borrow().state().is_punching());
    }

    #[test]
    fn glove_boxes_follow_the_animation_frame() {
        let (one, two) = humans();
        place(&one, 200.0, 200.0, Facing::Right);
        place(&two, 400.0, 200.0, Facing::Left);
        assert_relative_eq!(one.borrow().top_glove_box().unwrap().left(), 227.0);

        one.borrow_mut().punch().unwrap();
        assert_relative_eq!(one.borrow().top_glove_box().unwrap().left(), 218.0);
        let bottom = one.borrow().bottom_glove_box().unwrap();
        assert_relative_eq!(bottom.top(), 285.0);
        assert_relative_eq!(bottom.bottom(), 310.0);
    }
}
