use crate::browser;
use anyhow::{anyhow, Result};
// ELI5: web assembly is a single threaded environment, so Rc RefCell > Mutex
use async_trait::async_trait;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use self::input::InputManager;

#[async_trait(?Send)]
pub trait Game {
    async fn initialize(&self) -> Result<Box<dyn Game>>;
    /// One fixed simulation step of `delta_ms`
    fn update(&mut self, delta_ms: f32, input: &InputManager);
    fn draw(&self, renderer: &Renderer);
}

// length of a simulation step in milliseconds
pub const FRAME_SIZE: f32 = 1.0 / 60.0 * 1000.0;

// ==================== Timing Gate ====================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDelta {
    pub delta_ms: f64,
    pub last_timestamp: f64,
}

/// Turns a monotonic clock reading into a delta the simulation can trust.
/// - first reading (no `last`) -> 0
/// - clock going backwards     -> 0, never negative
/// - long hitch (hidden tab)   -> capped at `max_delta_ms`
pub fn compute_delta(last: Option<f64>, now: f64, max_delta_ms: f64) -> FrameDelta {
    let delta_ms = match last {
        None => 0.0,
        Some(last) => (now - last).clamp(0.0, max_delta_ms),
    };
    FrameDelta {
        delta_ms,
        last_timestamp: now,
    }
}

// ==================== Game Loop ====================
pub struct GameLoop {
    last_frame: Option<f64>,
    accumulated_delta: f32,
    max_delta_ms: f64,
}

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

impl GameLoop {
    pub fn new(max_delta_ms: f64) -> Self {
        GameLoop {
            last_frame: None,
            accumulated_delta: 0.0,
            max_delta_ms,
        }
    }

    /// Feeds one animation frame timestamp in, returns how many fixed steps
    /// are due
    pub fn advance(&mut self, perf: f64) -> u32 {
        let FrameDelta {
            delta_ms,
            last_timestamp,
        } = compute_delta(self.last_frame, perf, self.max_delta_ms);
        self.last_frame = Some(last_timestamp);
        self.accumulated_delta += delta_ms as f32;

        let mut steps = 0;
        while self.accumulated_delta > FRAME_SIZE {
            self.accumulated_delta -= FRAME_SIZE;
            steps += 1;
        }
        steps
    }

    pub async fn start(game: impl Game + 'static) -> Result<()> {
        let mut input_events = input::prepare_input()?;
        let mut game = game.initialize().await?;
        let mut game_loop = GameLoop::new(crate::config::MAX_FRAME_DELTA_MS);
        let mut input = InputManager::default();
        let renderer = Renderer {
            context: browser::context()?,
        };
        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            input::process_input(&mut input, &mut input_events);
            for _ in 0..game_loop.advance(perf) {
                game.update(FRAME_SIZE, &input);
                // edges are seen by exactly one step
                input.flush();
            }
            game.draw(&renderer);
            if let Some(closure) = f.borrow().as_ref() {
                if let Err(err) = browser::request_animation_frame(closure) {
                    error!("GameLoop: could not schedule next frame : {:#?}", err);
                }
            }
        }));

        browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;

        Ok(())
    }
}

// ==================== Geometry ====================
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_edges(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Area shared with `other`, 0 when they only touch or are apart
    pub fn overlap_area(&self, other: &Rect) -> f32 {
        let width = self.right().min(other.right()) - self.left().max(other.left());
        let height = self.bottom().min(other.bottom()) - self.top().max(other.top());
        width.max(0.0) * height.max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Boxes sharing an edge do not collide
    Strict,
    /// Boxes sharing an edge collide
    Inclusive,
}

pub fn is_colliding(a: &Rect, b: &Rect, overlap: Overlap) -> bool {
    match overlap {
        Overlap::Strict => {
            a.right() > b.left()
                && a.left() < b.right()
                && a.bottom() > b.top()
                && a.top() < b.bottom()
        }
        Overlap::Inclusive => {
            a.right() >= b.left()
                && a.left() <= b.right()
                && a.bottom() >= b.top()
                && a.top() <= b.bottom()
        }
    }
}

// ==================== Renderer ====================
pub struct Renderer {
    context: CanvasRenderingContext2d,
}

impl Renderer {
    pub fn clear(&self, rect: &Rect) {
        self.context.clear_rect(
            rect.x.into(),
            rect.y.into(),
            rect.width.into(),
            rect.height.into(),
        );
    }

    pub fn fill_rect(&self, rect: &Rect, color: &str) {
        self.context.set_fill_style(&JsValue::from_str(color));
        self.context.fill_rect(
            rect.x.into(),
            rect.y.into(),
            rect.width.into(),
            rect.height.into(),
        );
    }

    pub fn stroke_rect(&self, rect: &Rect, color: &str) {
        self.context.set_stroke_style(&JsValue::from_str(color));
        self.context.set_line_width(1.0);
        self.context.stroke_rect(
            rect.x.into(),
            rect.y.into(),
            rect.width.into(),
            rect.height.into(),
        );
    }

    pub fn stroke_line(&self, from: Point, to: Point, width: f32, color: &str) {
        self.context.set_stroke_style(&JsValue::from_str(color));
        self.context.set_line_width(width.into());
        self.context.begin_path();
        self.context.move_to(from.x.into(), from.y.into());
        self.context.line_to(to.x.into(), to.y.into());
        self.context.stroke();
    }

    pub fn fill_text(&self, text: &str, position: Point, font: &str, color: &str) {
        self.context.set_font(font);
        self.context.set_fill_style(&JsValue::from_str(color));
        if let Err(err) = self
            .context
            .fill_text(text, position.x.into(), position.y.into())
        {
            error!("Could not draw text '{}' : {:#?}", text, err);
        }
    }
}

#[cfg(debug_assertions)]
pub trait DebugDraw {
    fn draw_debug(&self, renderer: &Renderer);
}

#[cfg(debug_assertions)]
impl DebugDraw for Rect {
    fn draw_debug(&self, renderer: &Renderer) {
        renderer.stroke_rect(self, "rgba(0, 0, 255, 0.6)");
    }
}

// ==================== Input ====================
/// Keyboard -> action translation. Raw key codes never leave this module,
/// the game only asks "is MoveUp down", "was Punch just pressed".
pub mod input {
    use crate::browser;
    use anyhow::Result;
    use futures::channel::mpsc::{unbounded, UnboundedReceiver};
    use std::collections::HashMap;
    use wasm_bindgen::JsCast;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Action {
        MoveUp,
        MoveDown,
        MoveLeft,
        MoveRight,
        Punch,
        Pause,
        Reset,
        ToggleMenu,
        CycleDifficulty,
        ToggleSound,
    }

    impl Action {
        pub const ALL: [Action; 10] = [
            Action::MoveUp,
            Action::MoveDown,
            Action::MoveLeft,
            Action::MoveRight,
            Action::Punch,
            Action::Pause,
            Action::Reset,
            Action::ToggleMenu,
            Action::CycleDifficulty,
            Action::ToggleSound,
        ];
    }

    #[derive(Debug, Clone)]
    pub struct KeyMapping(HashMap<String, Action>);

    impl KeyMapping {
        pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, Action)>) -> Self {
            KeyMapping(
                pairs
                    .into_iter()
                    .map(|(code, action)| (code.to_string(), action))
                    .collect(),
            )
        }

        pub fn action(&self, code: &str) -> Option<Action> {
            self.0.get(code).copied()
        }
    }

    impl Default for KeyMapping {
        fn default() -> Self {
            KeyMapping::new([
                ("KeyW", Action::MoveUp),
                ("ArrowUp", Action::MoveUp),
                ("KeyS", Action::MoveDown),
                ("ArrowDown", Action::MoveDown),
                ("KeyA", Action::MoveLeft),
                ("ArrowLeft", Action::MoveLeft),
                ("KeyD", Action::MoveRight),
                ("ArrowRight", Action::MoveRight),
                ("Space", Action::Punch),
                ("KeyF", Action::Punch),
                ("Enter", Action::Pause),
                ("KeyP", Action::Pause),
                ("Escape", Action::Reset),
                ("F1", Action::ToggleMenu),
                ("F2", Action::CycleDifficulty),
                ("F3", Action::ToggleSound),
            ])
        }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    struct ActionState {
        down: bool,
        just_pressed: bool,
        just_released: bool,
    }

    /// Held/edge state for every action. Edges live until the next `flush`.
    #[derive(Debug, Clone)]
    pub struct InputManager {
        mapping: KeyMapping,
        states: HashMap<Action, ActionState>,
    }

    impl Default for InputManager {
        fn default() -> Self {
            InputManager::new(KeyMapping::default())
        }
    }

    impl InputManager {
        pub fn new(mapping: KeyMapping) -> Self {
            InputManager {
                mapping,
                states: Action::ALL
                    .iter()
                    .map(|&action| (action, ActionState::default()))
                    .collect(),
            }
        }

        pub fn key_down(&mut self, code: &str) {
            if let Some(state) = self.state_for(code) {
                // held keys auto-repeat keydown, only the first one is an edge
                if !state.down {
                    *state = ActionState {
                        down: true,
                        just_pressed: true,
                        just_released: false,
                    };
                }
            }
        }

        pub fn key_up(&mut self, code: &str) {
            if let Some(state) = self.state_for(code) {
                if state.down {
                    *state = ActionState {
                        down: false,
                        just_pressed: false,
                        just_released: true,
                    };
                }
            }
        }

        pub fn flush(&mut self) {
            for state in self.states.values_mut() {
                state.just_pressed = false;
                state.just_released = false;
            }
        }

        /// Forget everything, used when the window loses focus and keyup
        /// events stop arriving
        pub fn release_all(&mut self) {
            for state in self.states.values_mut() {
                *state = ActionState::default();
            }
        }

        pub fn is_down(&self, action: Action) -> bool {
            self.states.get(&action).map_or(false, |state| state.down)
        }

        pub fn just_pressed(&self, action: Action) -> bool {
            self.states
                .get(&action)
                .map_or(false, |state| state.just_pressed)
        }

        pub fn just_released(&self, action: Action) -> bool {
            self.states
                .get(&action)
                .map_or(false, |state| state.just_released)
        }

        pub fn any_just_pressed(&self) -> bool {
            self.states.values().any(|state| state.just_pressed)
        }

        fn state_for(&mut self, code: &str) -> Option<&mut ActionState> {
            let action = self.mapping.action(code)?;
            self.states.get_mut(&action)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum InputEvent {
        KeyDown(String),
        KeyUp(String),
        Blur,
    }

    // keys the page would otherwise scroll or open help with
    const CAPTURED_KEYS: [&str; 8] = [
        "ArrowUp",
        "ArrowDown",
        "ArrowLeft",
        "ArrowRight",
        "Space",
        "F1",
        "F2",
        "F3",
    ];

    /// Hooks the window's keyboard and focus events into a channel the game
    /// loop drains once per frame
    pub fn prepare_input() -> Result<UnboundedReceiver<InputEvent>> {
        let (sender, receiver) = unbounded();
        let keyup_sender = sender.clone();
        let blur_sender = sender.clone();

        let onkeydown = browser::closure_wrap(Box::new(move |event: web_sys::KeyboardEvent| {
            let code = event.code();
            if CAPTURED_KEYS.contains(&code.as_str()) {
                event.prevent_default();
            }
            let _ = sender.unbounded_send(InputEvent::KeyDown(code));
        }) as Box<dyn FnMut(web_sys::KeyboardEvent)>);

        let onkeyup = browser::closure_wrap(Box::new(move |event: web_sys::KeyboardEvent| {
            let _ = keyup_sender.unbounded_send(InputEvent::KeyUp(event.code()));
        }) as Box<dyn FnMut(web_sys::KeyboardEvent)>);

        let onblur = browser::closure_wrap(Box::new(move |_event: web_sys::Event| {
            let _ = blur_sender.unbounded_send(InputEvent::Blur);
        }) as Box<dyn FnMut(web_sys::Event)>);

        let window = browser::window()?;
        window.set_onkeydown(Some(onkeydown.as_ref().unchecked_ref()));
        window.set_onkeyup(Some(onkeyup.as_ref().unchecked_ref()));
        window.set_onblur(Some(onblur.as_ref().unchecked_ref()));

        // listeners live as long as the page
        onkeydown.forget();
        onkeyup.forget();
        onblur.forget();

        Ok(receiver)
    }

    pub fn process_input(input: &mut InputManager, receiver: &mut UnboundedReceiver<InputEvent>) {
        // Err -> nothing queued, Ok(None) -> channel closed
        while let Ok(Some(event)) = receiver.try_next() {
            apply(input, event);
        }
    }

    pub fn apply(input: &mut InputManager, event: InputEvent) {
        match event {
            InputEvent::KeyDown(code) => input.key_down(&code),
            InputEvent::KeyUp(code) => input.key_up(&code),
            InputEvent::Blur => input.release_all(),
        }
    }

}
