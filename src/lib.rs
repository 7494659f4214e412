use wasm_bindgen::prelude::*;
use wasm_bindgen::JsValue;

#[macro_use]
pub mod browser;
pub mod audio;
pub mod boxer;
pub mod brain;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod sprite;

use engine::GameLoop;
use game::BoxingGame;

// ==================== Main Functions ====================
/// Main entry for Webassembly module
/// - installs the panic hook
/// - hands a loading `BoxingGame` to the game loop, which initializes it
///   (options, match, audio) and starts ticking
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    // setup better panic messages for debugging
    console_error_panic_hook::set_once();

    // the loop has to await initialization, so it runs as a local task
    browser::spawn_local(async move {
        if let Err(err) = GameLoop::start(BoxingGame::new()).await {
            error!("Could not start the game : {:#?}", err);
        }
    });

    Ok(())
}
