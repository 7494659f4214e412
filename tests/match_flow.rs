use ring_boxing::audio::{AudioBackend, AudioManager};
use ring_boxing::config::{self, Difficulty};
use ring_boxing::engine::input::InputManager;
use ring_boxing::engine::FRAME_SIZE;
use ring_boxing::game::{Match, MatchState};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Default)]
struct Bells(u32);

impl AudioBackend for Bells {
    fn play_glove_hit(&mut self) {}

    fn play_head_hit(&mut self) {}

    fn play_round_end_bell(&mut self) {
        self.0 += 1;
    }
}

fn run_for(game: &mut Match, ms: f32, input: &mut InputManager) {
    let mut elapsed = 0.0;
    while elapsed < ms {
        game.update(FRAME_SIZE, input).unwrap();
        input.flush();
        elapsed += FRAME_SIZE;
    }
}

fn with_bells(game: &Match) -> Rc<RefCell<AudioManager<Bells>>> {
    let clock = Rc::new(Cell::new(0.0));
    let ticking = Rc::clone(&clock);
    let manager = Rc::new(RefCell::new(AudioManager::new(
        Bells::default(),
        || true,
        move || {
            // every signal arrives on a fresh millisecond window
            ticking.set(ticking.get() + 100.0);
            ticking.get()
        },
    )));
    AudioManager::attach(&manager, game.audio());
    manager
}

/// Ticks until the match leaves `state`, at most one round plus a second
fn run_while(game: &mut Match, state: MatchState, input: &mut InputManager) {
    let mut elapsed = 0.0;
    while game.state() == state && elapsed <= config::ROUND_TIME_MS + 1_000.0 {
        game.update(FRAME_SIZE, input).unwrap();
        input.flush();
        elapsed += FRAME_SIZE;
    }
}

#[test]
fn a_round_ends_with_one_bell_then_the_demo_takes_over() {
    let mut game = Match::new(Difficulty::Normal, 11).unwrap();
    let bells = with_bells(&game);
    let mut input = InputManager::default();

    game.start();
    run_while(&mut game, MatchState::Playing, &mut input);
    assert_eq!(game.state(), MatchState::Finished);
    assert_eq!(bells.borrow().backend().0, 1);

    run_for(&mut game, config::DEMO_INACTIVITY_TIMEOUT_MS + 100.0, &mut input);
    assert_eq!(game.state(), MatchState::Demo);
    assert!(game.fighter_one().borrow().is_cpu());

    // the demo plays out its own round without ringing
    run_while(&mut game, MatchState::Demo, &mut input);
    assert_eq!(game.state(), MatchState::Finished);
    assert!(game.in_demo());
    assert_eq!(bells.borrow().backend().0, 1);

    input.key_down("Space");
    game.update(FRAME_SIZE, &input).unwrap();
    assert!(!game.in_demo());
    assert!(!game.fighter_one().borrow().is_cpu());
    assert_eq!(game.remaining_ms(), config::ROUND_TIME_MS);
}

#[test]
fn pause_and_menu_hold_the_clock_until_a_knockout() {
    let mut game = Match::new(Difficulty::Hard, 5).unwrap();
    let mut input = InputManager::default();

    game.start();
    run_for(&mut game, 1_000.0, &mut input);
    let running = game.remaining_ms();
    assert!(running < config::ROUND_TIME_MS);

    game.pause();
    run_for(&mut game, 5_000.0, &mut input);
    assert_eq!(game.remaining_ms(), running);

    let previous = game.enter_menu();
    run_for(&mut game, 5_000.0, &mut input);
    game.exit_menu(previous);
    assert_eq!(game.state(), MatchState::Paused);
    assert_eq!(game.remaining_ms(), running);

    game.unpause();
    game.fighter_two()
        .borrow_mut()
        .set_score(config::KNOCKOUT_SCORE);
    game.update(FRAME_SIZE, &input).unwrap();
    assert_eq!(game.state(), MatchState::Finished);
    assert!(game.remaining_ms() > 0.0);
}

#[test]
fn held_keys_walk_the_human_fighter() {
    let mut game = Match::new(Difficulty::Easy, 8).unwrap();
    let mut input = InputManager::default();
    let start = game.fighter_one().borrow().position();

    game.start();
    input.key_down("KeyS");
    run_for(&mut game, 250.0, &mut input);
    let moved = game.fighter_one().borrow().position();
    assert!(moved.y > start.y);

    input.key_up("KeyS");
    run_for(&mut game, 100.0, &mut input);
    assert_eq!(game.fighter_one().borrow().position().y, moved.y);
}

#[test]
fn keys_do_nothing_before_the_round_starts() {
    let mut game = Match::new(Difficulty::Normal, 2).unwrap();
    let mut input = InputManager::default();
    let start = game.fighter_one().borrow().position();

    input.key_down("KeyD");
    run_for(&mut game, 500.0, &mut input);
    assert_eq!(game.fighter_one().borrow().position(), start);
    assert_eq!(game.fighter_one().borrow().score(), 0);
}

#[test]
fn difficulty_changes_survive_a_reset() {
    let mut game = Match::new(Difficulty::Easy, 21).unwrap();
    game.set_difficulty(Difficulty::Hard);
    game.start();
    game.reset();
    assert_eq!(game.difficulty(), Difficulty::Hard);
    assert_eq!(game.state(), MatchState::Finished);
    assert!(game.fighter_two().borrow().is_cpu());
}
