use crate::audio::web::WebAudioBackend;
use crate::audio::{AudioBus, AudioManager, AudioSignal};
use crate::boxer::{link_opponents, Boxer, Hitboxes, SharedBoxer};
use crate::browser;
use crate::config::{
    self, Difficulty, GameOptions, MemoryStorage, OptionsStorage, P1_CONFIG, P2_CONFIG,
};
use crate::engine::input::{Action, InputManager};
#[cfg(debug_assertions)]
use crate::engine::DebugDraw;
use crate::engine::{Game, Point, Rect, Renderer};
use crate::error::BoxingError;
use crate::sprite::state::{CombatState, Facing};
use crate::sprite::{ClipTable, SpriteId};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// ┌──────────────────────── Match State Flow ───────────────────────────┐
/// │  From      →  Trigger                       →  To                   │
/// ├─────────────────────────────────────────────────────────────────────┤
/// │  finished  →  start()                       →  playing              │
/// │  playing   →  pause()                       →  paused               │
/// │  paused    →  unpause()                     →  playing              │
/// │  playing   →  score >= 99 or clock at 0     →  finished (bell)      │
/// │  finished  →  15s without input             →  demo                 │
/// │  demo      →  score >= 99 or clock at 0     →  finished (in demo)   │
/// │  demo ctx  →  any key                       →  finished (real pair) │
/// │  any       →  enter_menu() / exit_menu(s)   →  menu / s             │
/// └─────────────────────────────────────────────────────────────────────┘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Menu,
    Playing,
    Paused,
    Finished,
    Demo,
}

/// What a fighter may see of the match it is in
pub trait GameContext {
    fn state(&self) -> MatchState;
    fn input(&self) -> &InputManager;
    fn emit(&self, signal: AudioSignal);
}

/// Per-tick context handed to both fighters
pub struct RoundContext<'a> {
    state: MatchState,
    input: &'a InputManager,
    audio: &'a AudioBus,
    muted: bool,
}

impl<'a> RoundContext<'a> {
    pub fn new(state: MatchState, input: &'a InputManager, audio: &'a AudioBus) -> Self {
        RoundContext {
            state,
            input,
            audio,
            muted: false,
        }
    }

    pub fn muted(self, muted: bool) -> Self {
        RoundContext { muted, ..self }
    }
}

impl GameContext for RoundContext<'_> {
    fn state(&self) -> MatchState {
        self.state
    }

    fn input(&self) -> &InputManager {
        self.input
    }

    fn emit(&self, signal: AudioSignal) {
        if !self.muted {
            self.audio.emit(signal);
        }
    }
}

/// Everything the renderer needs to know about one fighter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FighterView {
    pub sprite: SpriteId,
    pub position: Point,
    pub color: &'static str,
    pub score: u32,
    pub state: CombatState,
    pub facing: Facing,
    pub boxes: Hitboxes,
}

impl FighterView {
    fn of(boxer: &Boxer) -> Result<Self, BoxingError> {
        Ok(FighterView {
            sprite: boxer.sprite()?,
            position: boxer.position(),
            color: boxer.color(),
            score: boxer.score(),
            state: boxer.state(),
            facing: boxer.facing(),
            boxes: boxer.hitboxes()?,
        })
    }
}

// ==================== Match ====================
/// Owns both fighters and the round clock.
///
/// The real pair (human in corner one, CPU in corner two) is kept aside while
/// a demo pair of two CPUs fights, and swapped back in on `exit_demo`.
pub struct Match {
    state: MatchState,
    real_one: SharedBoxer,
    real_two: SharedBoxer,
    one: SharedBoxer,
    two: SharedBoxer,
    remaining_ms: f32,
    idle_ms: f32,
    in_demo: bool,
    difficulty: Difficulty,
    clips: Rc<ClipTable>,
    audio: Rc<AudioBus>,
    rng: ChaCha8Rng,
}

impl Match {
    pub fn new(difficulty: Difficulty, seed: u64) -> Result<Self, BoxingError> {
        let clips = Rc::new(ClipTable::standard()?);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let one = Boxer::human(P1_CONFIG, Rc::clone(&clips)).shared();
        let two = Boxer::cpu(
            P2_CONFIG,
            Rc::clone(&clips),
            difficulty.preset(),
            rng.gen(),
        )
        .shared();
        link_opponents(&one, &two);

        Ok(Match {
            state: MatchState::Finished,
            real_one: Rc::clone(&one),
            real_two: Rc::clone(&two),
            one,
            two,
            remaining_ms: config::ROUND_TIME_MS,
            idle_ms: 0.0,
            in_demo: false,
            difficulty,
            clips,
            audio: Rc::new(AudioBus::new()),
            rng,
        })
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn in_demo(&self) -> bool {
        self.in_demo
    }

    pub fn remaining_ms(&self) -> f32 {
        self.remaining_ms
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn audio(&self) -> &Rc<AudioBus> {
        &self.audio
    }

    pub fn fighter_one(&self) -> &SharedBoxer {
        &self.one
    }

    pub fn fighter_two(&self) -> &SharedBoxer {
        &self.two
    }

    pub fn fighters(&self) -> Result<[FighterView; 2], BoxingError> {
        Ok([
            FighterView::of(&self.one.borrow())?,
            FighterView::of(&self.two.borrow())?,
        ])
    }

    fn reset_fighters(&mut self) {
        self.one.borrow_mut().reset();
        self.two.borrow_mut().reset();
    }

    pub fn start(&mut self) {
        self.reset_fighters();
        self.state = MatchState::Playing;
        self.remaining_ms = config::ROUND_TIME_MS;
        log!("Fight!");
    }

    pub fn pause(&mut self) {
        if self.state == MatchState::Playing {
            self.state = MatchState::Paused;
            log!("Paused");
        }
    }

    pub fn unpause(&mut self) {
        if self.state == MatchState::Paused {
            self.state = MatchState::Playing;
            log!("Resumed");
        }
    }

    pub fn reset(&mut self) {
        self.reset_fighters();
        self.remaining_ms = config::ROUND_TIME_MS;
        self.state = MatchState::Finished;
        log!("Match reset");
    }

    /// Freezes the simulation for the options overlay, returns the state to
    /// hand back to `exit_menu`
    pub fn enter_menu(&mut self) -> MatchState {
        let previous = self.state;
        self.state = MatchState::Menu;
        previous
    }

    pub fn exit_menu(&mut self, previous: MatchState) {
        self.state = previous;
    }

    pub fn reset_idle_timer(&mut self) {
        self.idle_ms = 0.0;
    }

    /// Swaps in a fresh CPU opponent. A running demo keeps its own pair, the
    /// new opponent shows up once the demo ends.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.real_two = Boxer::cpu(
            P2_CONFIG,
            Rc::clone(&self.clips),
            difficulty.preset(),
            self.rng.gen(),
        )
        .shared();
        if !self.in_demo {
            self.two = Rc::clone(&self.real_two);
            link_opponents(&self.one, &self.two);
            self.reset_fighters();
        }
        log!("Difficulty set to {:?}", difficulty);
    }

    pub fn start_demo(&mut self) {
        let one = self.demo_fighter(P1_CONFIG);
        let two = self.demo_fighter(P2_CONFIG);
        link_opponents(&one, &two);
        self.one = one;
        self.two = two;
        self.reset_fighters();
        self.state = MatchState::Demo;
        self.in_demo = true;
        self.remaining_ms = config::ROUND_TIME_MS;
        log!("No input for a while, starting a demo round");
    }

    fn demo_fighter(&mut self, config: config::FighterConfig) -> SharedBoxer {
        let difficulty = Difficulty::ALL[self.rng.gen_range(0..Difficulty::ALL.len())];
        Boxer::cpu(
            config,
            Rc::clone(&self.clips),
            difficulty.preset(),
            self.rng.gen(),
        )
        .shared()
    }

    pub fn exit_demo(&mut self) {
        self.one = Rc::clone(&self.real_one);
        self.two = Rc::clone(&self.real_two);
        link_opponents(&self.one, &self.two);
        self.reset_fighters();
        self.remaining_ms = config::ROUND_TIME_MS;
        self.state = MatchState::Finished;
        self.in_demo = false;
        self.idle_ms = 0.0;
        log!("Demo over, back to the real fighters");
    }

    fn is_knockout(&self) -> bool {
        self.one.borrow().score() >= config::KNOCKOUT_SCORE
            || self.two.borrow().score() >= config::KNOCKOUT_SCORE
    }

    fn round_over(&self) -> bool {
        self.is_knockout() || self.remaining_ms <= 0.0
    }

    /// One tick of `delta_ms`. Corner two (the CPU) moves first so its
    /// decisions act on this tick's geometry.
    pub fn update(&mut self, delta_ms: f32, input: &InputManager) -> Result<(), BoxingError> {
        if self.in_demo && input.any_just_pressed() {
            self.exit_demo();
            return Ok(());
        }

        if matches!(self.state, MatchState::Playing | MatchState::Demo) {
            self.remaining_ms = (self.remaining_ms - delta_ms).max(0.0);
        }

        let frame_dt = match self.state {
            MatchState::Paused | MatchState::Menu => 0.0,
            _ => delta_ms / 1000.0,
        };

        let ctx = RoundContext::new(self.state, input, &self.audio).muted(self.in_demo);
        self.two.borrow_mut().update(frame_dt, &ctx)?;
        self.one.borrow_mut().update(frame_dt, &ctx)?;

        if self.state == MatchState::Playing && self.round_over() {
            ctx.emit(AudioSignal::RoundEnd);
            self.state = MatchState::Finished;
            log!(
                "Round over : {} - {}",
                self.one.borrow().score(),
                self.two.borrow().score()
            );
        }

        if self.state == MatchState::Finished {
            self.idle_ms += delta_ms;
            if self.idle_ms >= config::DEMO_INACTIVITY_TIMEOUT_MS {
                self.idle_ms = 0.0;
                self.start_demo();
            }
        }

        if self.state == MatchState::Demo && self.round_over() {
            self.state = MatchState::Finished;
            self.idle_ms = 0.0;
        }
        Ok(())
    }
}

/// m:ss, rounded up so the clock shows 0:00 only once time is really out
pub fn format_time(remaining_ms: f32) -> String {
    let seconds = (remaining_ms / 1000.0).ceil().max(0.0) as u32;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

// ==================== Browser game ====================
pub enum BoxingGame {
    /// Waiting for `initialize`
    Loading,
    Loaded(Arena),
}

pub struct Arena {
    game_match: Match,
    options: GameOptions,
    storage: Box<dyn OptionsStorage>,
    sound: Rc<Cell<bool>>,
    before_menu: Option<MatchState>,
}

impl BoxingGame {
    pub fn new() -> Self {
        BoxingGame::Loading
    }

    fn options_storage() -> Box<dyn OptionsStorage> {
        match browser::local_storage() {
            Ok(storage) => Box::new(storage),
            Err(err) => {
                log!("Options will not persist : {:#}", err);
                Box::new(MemoryStorage::default())
            }
        }
    }

    fn attach_audio(bus: &AudioBus, sound: &Rc<Cell<bool>>) {
        match browser::audio_context() {
            Ok(context) => {
                let sound = Rc::clone(sound);
                let manager = Rc::new(RefCell::new(AudioManager::new(
                    WebAudioBackend::new(context),
                    move || sound.get(),
                    || browser::now().unwrap_or_default(),
                )));
                AudioManager::attach(&manager, bus);
            }
            Err(err) => error!("Playing without sound : {:#}", err),
        }
    }
}

impl Default for BoxingGame {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Game for BoxingGame {
    async fn initialize(&self) -> Result<Box<dyn Game>> {
        match self {
            BoxingGame::Loading => {
                let mut storage = Self::options_storage();
                let options = GameOptions::load(storage.as_mut());
                let game_match = Match::new(options.difficulty, rand::random())?;
                let sound = Rc::new(Cell::new(options.sound));
                Self::attach_audio(game_match.audio(), &sound);
                log!("Ring ready, difficulty {:?}", options.difficulty);

                Ok(Box::new(BoxingGame::Loaded(Arena {
                    game_match,
                    options,
                    storage,
                    sound,
                    before_menu: None,
                })))
            }
            BoxingGame::Loaded(_) => Err(anyhow!("Game is already initialized")),
        }
    }

    fn update(&mut self, delta_ms: f32, input: &InputManager) {
        if let BoxingGame::Loaded(arena) = self {
            // the key that ends a demo does nothing else
            if !(arena.game_match.in_demo() && input.any_just_pressed()) {
                arena.handle_shell_input(input);
            }
            if let Err(err) = arena.game_match.update(delta_ms, input) {
                error!("Match update failed : {}", err);
            }
        }
    }

    fn draw(&self, renderer: &Renderer) {
        if let BoxingGame::Loaded(arena) = self {
            if let Err(err) = arena.draw(renderer) {
                error!("Could not draw the ring : {}", err);
            }
        }
    }
}

impl Arena {
    fn handle_shell_input(&mut self, input: &InputManager) {
        if input.any_just_pressed() {
            self.game_match.reset_idle_timer();
        }

        if input.just_pressed(Action::ToggleMenu) {
            match self.before_menu.take() {
                Some(previous) => self.game_match.exit_menu(previous),
                None => self.before_menu = Some(self.game_match.enter_menu()),
            }
        }
        if input.just_pressed(Action::CycleDifficulty) {
            self.options =
                GameOptions::set_difficulty(self.storage.as_mut(), self.options.difficulty.next());
            self.game_match.set_difficulty(self.options.difficulty);
        }
        if input.just_pressed(Action::ToggleSound) {
            self.options = GameOptions::set_sound(self.storage.as_mut(), !self.options.sound);
            self.sound.set(self.options.sound);
        }
        if self.game_match.state() == MatchState::Menu {
            return;
        }

        if input.just_pressed(Action::Reset) {
            self.game_match.reset();
        }
        if input.just_pressed(Action::Pause) {
            match self.game_match.state() {
                MatchState::Finished => self.game_match.start(),
                MatchState::Playing => self.game_match.pause(),
                MatchState::Paused => self.game_match.unpause(),
                _ => {}
            }
        }
    }

    fn draw(&self, renderer: &Renderer) -> Result<(), BoxingError> {
        let canvas = Rect::new(0.0, 0.0, config::CANVAS_WIDTH, config::CANVAS_HEIGHT);
        renderer.clear(&canvas);
        renderer.fill_rect(&canvas, config::BACKGROUND_COLOR);
        draw_ring(renderer);

        let [one, two] = self.game_match.fighters()?;
        // corner two behind, corner one in front
        draw_fighter(renderer, &two);
        draw_fighter(renderer, &one);

        renderer.fill_text(
            &one.score.to_string(),
            Point {
                x: config::P1_SCORE_X,
                y: config::SCORE_Y,
            },
            config::HUD_FONT,
            one.color,
        );
        renderer.fill_text(
            &two.score.to_string(),
            Point {
                x: config::P2_SCORE_X,
                y: config::SCORE_Y,
            },
            config::HUD_FONT,
            two.color,
        );
        renderer.fill_text(
            &format_time(self.game_match.remaining_ms()),
            Point {
                x: config::TIME_X,
                y: config::SCORE_Y,
            },
            config::HUD_FONT,
            config::TEXT_COLOR,
        );

        self.draw_overlay(renderer);
        Ok(())
    }

    fn draw_overlay(&self, renderer: &Renderer) {
        let lines: Vec<String> = match self.game_match.state() {
            MatchState::Menu => vec![
                "OPTIONS".to_string(),
                format!("F2 difficulty : {:?}", self.options.difficulty).to_lowercase(),
                format!("F3 sound : {}", if self.options.sound { "on" } else { "off" }),
                "F1 back".to_string(),
            ],
            MatchState::Paused => vec!["PAUSED".to_string()],
            MatchState::Finished if !self.game_match.in_demo() => {
                vec!["ENTER to fight".to_string()]
            }
            _ => return,
        };
        for (row, line) in lines.iter().enumerate() {
            renderer.fill_text(
                line,
                Point {
                    x: 200.0,
                    y: 445.0 + 24.0 * row as f32 - 24.0 * (lines.len() - 1) as f32,
                },
                config::MENU_FONT,
                config::TEXT_COLOR,
            );
        }
    }
}

fn draw_ring(renderer: &Renderer) {
    use config::ring;
    let left = ring::X - ring::VERTICAL_ROPE_WIDTH / 2.0;
    let right = ring::X + ring::WIDTH + ring::VERTICAL_ROPE_WIDTH / 2.0;
    let top = ring::Y - ring::HORIZONTAL_ROPE_WIDTH / 2.0;
    let bottom = ring::Y + ring::HEIGHT + ring::HORIZONTAL_ROPE_WIDTH / 2.0;

    for y in [top, bottom] {
        renderer.stroke_line(
            Point { x: ring::X, y },
            Point {
                x: ring::X + ring::WIDTH,
                y,
            },
            ring::HORIZONTAL_ROPE_WIDTH,
            ring::COLOR,
        );
    }
    for x in [left, right] {
        renderer.stroke_line(
            Point { x, y: ring::Y },
            Point {
                x,
                y: ring::Y + ring::HEIGHT,
            },
            ring::VERTICAL_ROPE_WIDTH,
            ring::COLOR,
        );
    }

    let corner_left = ring::X - ring::CORNER_WIDTH;
    let corner_right = ring::X + ring::WIDTH;
    let corner_top = ring::Y - ring::CORNER_HEIGHT;
    let corner_bottom = ring::Y + ring::HEIGHT;
    for (x, y) in [
        (corner_left, corner_top),
        (corner_left, corner_bottom),
        (corner_right, corner_top),
        (corner_right, corner_bottom),
    ] {
        renderer.fill_rect(
            &Rect::new(x, y, ring::CORNER_WIDTH, ring::CORNER_HEIGHT),
            ring::COLOR,
        );
    }
}

// Sprite bitmaps live outside this crate, fighters are drawn as their boxes
fn draw_fighter(renderer: &Renderer, fighter: &FighterView) {
    renderer.fill_rect(&fighter.boxes.body, fighter.color);
    renderer.fill_rect(&fighter.boxes.head, fighter.color);
    let glove = match fighter.state {
        CombatState::PunchingBottom => fighter.boxes.bottom_glove,
        _ => fighter.boxes.top_glove,
    };
    renderer.fill_rect(&glove, fighter.color);

    #[cfg(debug_assertions)]
    {
        fighter.boxes.head.draw_debug(renderer);
        fighter.boxes.top_glove.draw_debug(renderer);
        fighter.boxes.bottom_glove.draw_debug(renderer);
    }
}
