//! Pure mapping from (facing, combat state) to the clip that should be
//! playing. No timers in here: the `AnimationPlayer` owns all timing and tells
//! us when a clip is done through `ClipFinished`.
use crate::sprite::ClipId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchKind {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombatState {
    #[default]
    Idle,
    PunchingTop,
    PunchingBottom,
    HitFromTop,
    HitFromBottom,
}

impl CombatState {
    pub fn is_punching(self) -> bool {
        matches!(self, CombatState::PunchingTop | CombatState::PunchingBottom)
    }

    pub fn is_hit(self) -> bool {
        matches!(self, CombatState::HitFromTop | CombatState::HitFromBottom)
    }
}

/// ┌──────────────── State Transition Flow ──────────────────┐
/// │  From State  →  Event               →  To State         │
/// ├─────────────────────────────────────────────────────────┤
/// │  any         →  PunchRequested(Top) →  PunchingTop      │
/// │  any         →  PunchRequested(Bot) →  PunchingBottom   │
/// │  any         →  HitTakenTop         →  HitFromTop       │
/// │  any         →  HitTakenBottom      →  HitFromBottom    │
/// │  any         →  HitBlocked          →  (unchanged)      │
/// │  any         →  ClipFinished        →  Idle             │
/// └─────────────────────────────────────────────────────────┘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationEvent {
    PunchRequested(PunchKind),
    HitTakenTop,
    HitTakenBottom,
    HitBlocked,
    ClipFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationStateMachine {
    facing: Facing,
    state: CombatState,
}

impl Default for AnimationStateMachine {
    fn default() -> Self {
        AnimationStateMachine {
            facing: Facing::Right,
            state: CombatState::Idle,
        }
    }
}

impl AnimationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the current machine and returns the next one
    pub fn transition(self, event: AnimationEvent) -> Self {
        use AnimationEvent::*;
        let state = match event {
            PunchRequested(PunchKind::Top) => CombatState::PunchingTop,
            PunchRequested(PunchKind::Bottom) => CombatState::PunchingBottom,
            // a hit always interrupts whatever punch was in flight
            HitTakenTop => CombatState::HitFromTop,
            HitTakenBottom => CombatState::HitFromBottom,
            // the fighter splices its own punch, the machine stays put
            HitBlocked => self.state,
            ClipFinished => CombatState::Idle,
        };
        AnimationStateMachine { state, ..self }
    }

    pub fn on_event(&mut self, event: AnimationEvent) {
        *self = self.transition(event);
    }

    pub fn set_facing(&mut self, facing: Facing) {
        self.facing = facing;
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn state(&self) -> CombatState {
        self.state
    }

    pub fn clip_id(&self) -> ClipId {
        use CombatState::*;
        match (self.state, self.facing) {
            (Idle, Facing::Right) => ClipId::IdleRight,
            (Idle, Facing::Left) => ClipId::IdleLeft,
            (PunchingTop, Facing::Right) => ClipId::PunchTopRight,
            (PunchingTop, Facing::Left) => ClipId::PunchTopLeft,
            (PunchingBottom, Facing::Right) => ClipId::PunchBottomRight,
            (PunchingBottom, Facing::Left) => ClipId::PunchBottomLeft,
            (HitFromTop, Facing::Right) => ClipId::HitTopRight,
            (HitFromTop, Facing::Left) => ClipId::HitTopLeft,
            (HitFromBottom, Facing::Right) => ClipId::HitBottomRight,
            (HitFromBottom, Facing::Left) => ClipId::HitBottomLeft,
        }
    }
}
