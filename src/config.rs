use crate::engine::Rect;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CANVAS_WIDTH: f32 = 640.0;
pub const CANVAS_HEIGHT: f32 = 480.0;

// ==================== Ring ====================
// Outer rope rectangle, as drawn. Fighters live inside RING_INNER.
pub mod ring {
    pub const X: f32 = 107.0;
    pub const Y: f32 = 84.0;
    pub const WIDTH: f32 = 426.0;
    pub const HEIGHT: f32 = 330.0;
    pub const PADDING_HORIZONTAL: f32 = 13.0;
    pub const PADDING_VERTICAL: f32 = 14.0;
    pub const HORIZONTAL_ROPE_WIDTH: f32 = 14.0;
    pub const VERTICAL_ROPE_WIDTH: f32 = 18.0;
    pub const CORNER_WIDTH: f32 = 36.0;
    pub const CORNER_HEIGHT: f32 = 25.0;
    pub const COLOR: &str = "#be8733";
}

/// Every fighter's body box has to stay inside this rectangle
pub const RING_INNER: Rect = Rect {
    x: ring::X + ring::PADDING_HORIZONTAL,
    y: ring::Y + ring::PADDING_VERTICAL,
    width: ring::WIDTH - 2.0 * ring::PADDING_HORIZONTAL,
    height: ring::HEIGHT - 2.0 * ring::PADDING_VERTICAL,
};

// ==================== Match ====================
pub const ROUND_TIME_MS: f32 = 120_000.0;
pub const KNOCKOUT_SCORE: u32 = 99;
pub const DEMO_INACTIVITY_TIMEOUT_MS: f32 = 15_000.0;
pub const MAX_FRAME_DELTA_MS: f64 = 100.0;

pub const TEXT_COLOR: &str = "#0d3200";
pub const BACKGROUND_COLOR: &str = "#649335";

// HUD anchors, text baselines
pub const P1_SCORE_X: f32 = 137.0;
pub const P2_SCORE_X: f32 = 420.0;
pub const SCORE_Y: f32 = 40.0;
pub const TIME_X: f32 = 282.0;
pub const HUD_FONT: &str = "bold 32px monospace";
pub const MENU_FONT: &str = "20px monospace";

// ==================== Fighters ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    One,
    Two,
}

/// Spawn configuration, restored on every `reset()`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FighterConfig {
    pub corner: Corner,
    pub x: f32,
    pub y: f32,
    pub color: &'static str,
}

pub const P1_CONFIG: FighterConfig = FighterConfig {
    corner: Corner::One,
    x: RING_INNER.x,
    y: RING_INNER.y,
    color: "#d2d2d2",
};

// 134 (full width) - 58 (body width) = 76, 110 = body height
pub const P2_CONFIG: FighterConfig = FighterConfig {
    corner: Corner::Two,
    x: RING_INNER.x + RING_INNER.width - 76.0,
    y: RING_INNER.y + RING_INNER.height - 110.0,
    color: "#000",
};

// ==================== Difficulty ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

    pub fn next(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Normal,
            Difficulty::Normal => Difficulty::Hard,
            Difficulty::Hard => Difficulty::Easy,
        }
    }

    pub fn preset(self) -> DifficultyConfig {
        match self {
            Difficulty::Easy => DifficultyConfig {
                punch_chance: 0.25,
                speed_multiplier: 0.85,
                tired_threshold: 15,
                close_range_score_nerf: true,
            },
            Difficulty::Normal => DifficultyConfig {
                punch_chance: 0.33,
                speed_multiplier: 1.0,
                tired_threshold: 25,
                close_range_score_nerf: false,
            },
            Difficulty::Hard => DifficultyConfig {
                punch_chance: 0.5,
                speed_multiplier: 1.15,
                tired_threshold: 40,
                close_range_score_nerf: false,
            },
        }
    }
}

/// Tuning bundle handed to a CPU fighter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyConfig {
    /// Per-tick chance to throw a punch while in range
    pub punch_chance: f64,
    /// Scales the fighter's default movement speed
    pub speed_multiplier: f32,
    /// Score from which the fighter may start getting tired
    pub tired_threshold: u32,
    /// Close hits landed by this fighter score like long ones
    pub close_range_score_nerf: bool,
}

// ==================== Options ====================
pub const OPTIONS_STORAGE_KEY: &str = "ari-boxing-options";

/// Player-facing options, persisted as JSON in local storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameOptions {
    pub difficulty: Difficulty,
    pub sound: bool,
}

impl Default for GameOptions {
    fn default() -> Self {
        GameOptions {
            difficulty: Difficulty::Normal,
            sound: true,
        }
    }
}

/// Key/value store the options are written to. `web_sys::Storage` in the
/// browser, `MemoryStorage` when local storage is unavailable.
pub trait OptionsStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage(HashMap<String, String>);

impl OptionsStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }
}

impl GameOptions {
    /// Reads stored options over the defaults and writes the normalised
    /// result back. Anything unreadable falls back to the defaults.
    pub fn load<S: OptionsStorage + ?Sized>(storage: &mut S) -> Self {
        let options = storage
            .get_item(OPTIONS_STORAGE_KEY)
            .and_then(|raw| match serde_json::from_str::<GameOptions>(&raw) {
                Ok(options) => Some(options),
                Err(err) => {
                    log!("Ignoring stored options : {}", err);
                    None
                }
            })
            .unwrap_or_default();
        options.save(storage);
        options
    }

    pub fn save<S: OptionsStorage + ?Sized>(&self, storage: &mut S) {
        match serde_json::to_string(self) {
            Ok(json) => storage.set_item(OPTIONS_STORAGE_KEY, &json),
            Err(err) => error!("Could not serialize options : {}", err),
        }
    }

    pub fn set_difficulty<S: OptionsStorage + ?Sized>(
        storage: &mut S,
        difficulty: Difficulty,
    ) -> Self {
        let options = GameOptions {
            difficulty,
            ..Self::load(storage)
        };
        options.save(storage);
        options
    }

    pub fn set_sound<S: OptionsStorage + ?Sized>(storage: &mut S, sound: bool) -> Self {
        let options = GameOptions {
            sound,
            ..Self::load(storage)
        };
        options.save(storage);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_inner_bounds_are_inset_from_the_ropes() {
        assert_eq!(RING_INNER.left(), 120.0);
        assert_eq!(RING_INNER.right(), 520.0);
        assert_eq!(RING_INNER.top(), 98.0);
        assert_eq!(RING_INNER.bottom(), 400.0);
    }

    #[test]
    fn second_corner_spawns_bottom_right() {
        assert_eq!(P2_CONFIG.x, 444.0);
        assert_eq!(P2_CONFIG.y, 290.0);
    }

    #[test]
    fn missing_options_load_defaults_and_persist_them() {
        let mut storage = MemoryStorage::default();
        let options = GameOptions::load(&mut storage);

        assert_eq!(options, GameOptions::default());
        assert_eq!(
            storage.get_item(OPTIONS_STORAGE_KEY).as_deref(),
            Some(r#"{"difficulty":"normal","sound":true}"#)
        );
    }

    #[test]
    fn partial_options_merge_over_defaults() {
        let mut storage = MemoryStorage::default();
        storage.set_item(OPTIONS_STORAGE_KEY, r#"{"difficulty":"hard"}"#);

        let options = GameOptions::load(&mut storage);
        assert_eq!(options.difficulty, Difficulty::Hard);
        assert!(options.sound);
    }

    #[test]
    fn malformed_options_fall_back_to_defaults() {
        let mut storage = MemoryStorage::default();
        storage.set_item(OPTIONS_STORAGE_KEY, "not json {");

        assert_eq!(GameOptions::load(&mut storage), GameOptions::default());
    }

    #[test]
    fn setters_persist_immediately() {
        let mut storage = MemoryStorage::default();
        GameOptions::set_difficulty(&mut storage, Difficulty::Easy);
        let options = GameOptions::set_sound(&mut storage, false);

        assert_eq!(options.difficulty, Difficulty::Easy);
        assert_eq!(GameOptions::load(&mut storage), options);
    }

    #[test]
    fn difficulty_cycles_through_all_presets() {
        let mut difficulty = Difficulty::Easy;
        for expected in [Difficulty::Normal, Difficulty::Hard, Difficulty::Easy] {
            difficulty = difficulty.next();
            assert_eq!(difficulty, expected);
        }
        assert!(Difficulty::Hard.preset().punch_chance > Difficulty::Easy.preset().punch_chance);
    }
}
