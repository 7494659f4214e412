// ┌──────────────────────────────────────────────────────────────────────────┐
// │                         Sprite module layout                             │
// ├────────────────────┬─────────────────────────────────────────────────────┤
// │ mod.rs             │ frames, clips and the shared clip table             │
// │ animation.rs       │ AnimationPlayer : plays one clip against the clock  │
// │ state.rs           │ AnimationStateMachine : (facing, combat) -> ClipId  │
// └────────────────────┴─────────────────────────────────────────────────────┘
pub mod animation;
pub mod state;

use crate::error::BoxingError;
use std::rc::Rc;

/// Opaque handle to a sprite bitmap. The core never looks inside, the
/// renderer resolves the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteId(&'static str);

impl SpriteId {
    pub const fn new(name: &'static str) -> Self {
        SpriteId(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

pub mod sprites {
    use super::SpriteId;

    pub const STANCE_00_RIGHT: SpriteId = SpriteId::new("frame00Right");
    pub const STANCE_01_RIGHT: SpriteId = SpriteId::new("frame01Right");
    pub const STANCE_02_RIGHT: SpriteId = SpriteId::new("frame02Right");
    pub const STANCE_00_LEFT: SpriteId = SpriteId::new("frame00Left");
    pub const STANCE_01_LEFT: SpriteId = SpriteId::new("frame01Left");
    pub const STANCE_02_LEFT: SpriteId = SpriteId::new("frame02Left");

    pub const PUNCH_00_RIGHT_TOP: SpriteId = SpriteId::new("frame00PunchRightTop");
    pub const PUNCH_01_RIGHT_TOP: SpriteId = SpriteId::new("frame01PunchRightTop");
    pub const PUNCH_02_RIGHT_TOP: SpriteId = SpriteId::new("frame02PunchRightTop");
    pub const PUNCH_00_LEFT_TOP: SpriteId = SpriteId::new("frame00PunchLeftTop");
    pub const PUNCH_01_LEFT_TOP: SpriteId = SpriteId::new("frame01PunchLeftTop");
    pub const PUNCH_02_LEFT_TOP: SpriteId = SpriteId::new("frame02PunchLeftTop");

    pub const PUNCH_00_RIGHT_BOTTOM: SpriteId = SpriteId::new("frame00PunchRightBottom");
    pub const PUNCH_01_RIGHT_BOTTOM: SpriteId = SpriteId::new("frame01PunchRightBottom");
    pub const PUNCH_02_RIGHT_BOTTOM: SpriteId = SpriteId::new("frame02PunchRightBottom");
    pub const PUNCH_00_LEFT_BOTTOM: SpriteId = SpriteId::new("frame00PunchLeftBottom");
    pub const PUNCH_01_LEFT_BOTTOM: SpriteId = SpriteId::new("frame01PunchLeftBottom");
    pub const PUNCH_02_LEFT_BOTTOM: SpriteId = SpriteId::new("frame02PunchLeftBottom");
}

/// Marks frames a punch can be reversed from (extend) or into (retract)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    Extend,
    Retract,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    pub sprite: SpriteId,
    /// Horizontal glove offset from the fighter's x, already mirrored for
    /// left facing clips
    pub hitbox_offset_x: f32,
    /// Seconds this frame stays on screen
    pub duration: f32,
    pub tag: Option<FrameTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipId {
    IdleRight,
    IdleLeft,
    PunchTopRight,
    PunchTopLeft,
    PunchBottomRight,
    PunchBottomLeft,
    HitTopRight,
    HitTopLeft,
    HitBottomRight,
    HitBottomLeft,
}

impl ClipId {
    pub const ALL: [ClipId; 10] = [
        ClipId::IdleRight,
        ClipId::IdleLeft,
        ClipId::PunchTopRight,
        ClipId::PunchTopLeft,
        ClipId::PunchBottomRight,
        ClipId::PunchBottomLeft,
        ClipId::HitTopRight,
        ClipId::HitTopLeft,
        ClipId::HitBottomRight,
        ClipId::HitBottomLeft,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Immutable, shared between both fighters through the `ClipTable`
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    id: ClipId,
    looping: bool,
    frames: Vec<AnimationFrame>,
}

impl AnimationClip {
    pub fn new(
        id: ClipId,
        looping: bool,
        frames: Vec<AnimationFrame>,
    ) -> Result<Self, BoxingError> {
        if frames.is_empty() {
            return Err(BoxingError::EmptyClip(id));
        }
        // a zero length frame would spin the player forever on a looping clip
        if frames.iter().any(|frame| frame.duration <= 0.0) {
            return Err(BoxingError::InvalidFrameDuration(id));
        }
        Ok(AnimationClip {
            id,
            looping,
            frames,
        })
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }
}

// ==================== Clip data ====================
// Base frame length in seconds, every frame is a multiple of it
const ANIMATION_SPEED: f32 = 0.015;

mod glove {
    pub const CONTRACTED_RIGHT: f32 = 18.0;
    pub const DEFAULT_RIGHT: f32 = 27.0;
    pub const MIDDLE_RIGHT: f32 = 62.0;
    pub const FULL_RIGHT: f32 = 98.0;

    pub const CONTRACTED_LEFT: f32 = 80.0;
    pub const DEFAULT_LEFT: f32 = 71.0;
    pub const MIDDLE_LEFT: f32 = 40.0;
    pub const FULL_LEFT: f32 = 0.0;
}

const PUNCH_TAGS: [Option<FrameTag>; 7] = [
    None,
    Some(FrameTag::Extend),
    Some(FrameTag::Extend),
    Some(FrameTag::Extend),
    Some(FrameTag::Retract),
    Some(FrameTag::Retract),
    Some(FrameTag::Retract),
];

fn frame(sprite: SpriteId, ticks: f32, hitbox_offset_x: f32) -> AnimationFrame {
    AnimationFrame {
        sprite,
        hitbox_offset_x,
        duration: ANIMATION_SPEED * ticks,
        tag: None,
    }
}

fn tagged(mut frames: Vec<AnimationFrame>, tags: &[Option<FrameTag>]) -> Vec<AnimationFrame> {
    for (frame, tag) in frames.iter_mut().zip(tags) {
        frame.tag = *tag;
    }
    frames
}

/// Sprites making up one facing direction
struct Stance {
    idle: SpriteId,
    recoil: [SpriteId; 3],
    contracted: f32,
    default: f32,
    middle: f32,
    full: f32,
}

const RIGHT: Stance = Stance {
    idle: sprites::STANCE_01_RIGHT,
    recoil: [
        sprites::STANCE_00_RIGHT,
        sprites::STANCE_01_RIGHT,
        sprites::STANCE_02_RIGHT,
    ],
    contracted: glove::CONTRACTED_RIGHT,
    default: glove::DEFAULT_RIGHT,
    middle: glove::MIDDLE_RIGHT,
    full: glove::FULL_RIGHT,
};

const LEFT: Stance = Stance {
    idle: sprites::STANCE_01_LEFT,
    recoil: [
        sprites::STANCE_00_LEFT,
        sprites::STANCE_01_LEFT,
        sprites::STANCE_02_LEFT,
    ],
    contracted: glove::CONTRACTED_LEFT,
    default: glove::DEFAULT_LEFT,
    middle: glove::MIDDLE_LEFT,
    full: glove::FULL_LEFT,
};

fn idle_frames(stance: &Stance) -> Vec<AnimationFrame> {
    vec![frame(stance.idle, 1.0, stance.default)]
}

fn hit_frames(stance: &Stance) -> Vec<AnimationFrame> {
    vec![
        frame(stance.recoil[0], 14.0, stance.default),
        frame(stance.recoil[1], 6.0, stance.contracted),
        frame(stance.recoil[2], 20.0, stance.middle),
    ]
}

/// wind up -> extend -> full reach -> retract, mirrored sprite by sprite
fn punch_frames(stance: &Stance, arm: [SpriteId; 3]) -> Vec<AnimationFrame> {
    let [wind_up, half, full] = arm;
    tagged(
        vec![
            frame(wind_up, 3.0, stance.contracted),
            frame(stance.idle, 2.0, stance.default),
            frame(half, 2.0, stance.middle),
            frame(full, 6.0, stance.full),
            frame(half, 8.0, stance.middle),
            frame(stance.idle, 8.0, stance.default),
            frame(wind_up, 12.0, stance.contracted),
        ],
        &PUNCH_TAGS,
    )
}

fn standard_clip(id: ClipId) -> Result<AnimationClip, BoxingError> {
    use sprites::*;
    use ClipId::*;
    match id {
        IdleRight => AnimationClip::new(id, true, idle_frames(&RIGHT)),
        IdleLeft => AnimationClip::new(id, true, idle_frames(&LEFT)),
        PunchTopRight => AnimationClip::new(
            id,
            false,
            punch_frames(
                &RIGHT,
                [PUNCH_00_RIGHT_TOP, PUNCH_01_RIGHT_TOP, PUNCH_02_RIGHT_TOP],
            ),
        ),
        PunchTopLeft => AnimationClip::new(
            id,
            false,
            punch_frames(
                &LEFT,
                [PUNCH_00_LEFT_TOP, PUNCH_01_LEFT_TOP, PUNCH_02_LEFT_TOP],
            ),
        ),
        PunchBottomRight => AnimationClip::new(
            id,
            false,
            punch_frames(
                &RIGHT,
                [
                    PUNCH_00_RIGHT_BOTTOM,
                    PUNCH_01_RIGHT_BOTTOM,
                    PUNCH_02_RIGHT_BOTTOM,
                ],
            ),
        ),
        PunchBottomLeft => AnimationClip::new(
            id,
            false,
            punch_frames(
                &LEFT,
                [
                    PUNCH_00_LEFT_BOTTOM,
                    PUNCH_01_LEFT_BOTTOM,
                    PUNCH_02_LEFT_BOTTOM,
                ],
            ),
        ),
        HitTopRight | HitBottomRight => AnimationClip::new(id, false, hit_frames(&RIGHT)),
        HitTopLeft | HitBottomLeft => AnimationClip::new(id, false, hit_frames(&LEFT)),
    }
}

/// Lookup table of every clip, built once and shared (`Rc`) by both fighters
/// so nobody owns or mutates the canonical frame data.
#[derive(Debug)]
pub struct ClipTable {
    clips: Vec<Rc<AnimationClip>>,
}

impl ClipTable {
    pub fn standard() -> Result<Self, BoxingError> {
        let clips = ClipId::ALL
            .iter()
            .map(|&id| standard_clip(id).map(Rc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ClipTable { clips })
    }

    pub fn get(&self, id: ClipId) -> Rc<AnimationClip> {
        Rc::clone(&self.clips[id.index()])
    }
}
