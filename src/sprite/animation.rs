use crate::error::BoxingError;
use crate::sprite::{AnimationClip, AnimationFrame, ClipId, FrameTag};
use std::rc::Rc;

/// A window onto a shared clip, starting at `start`.
///
/// The punch reversal splice needs "the same clip, but from frame N". Rather
/// than slicing the canonical frames we point at them from a later offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipView {
    clip: Rc<AnimationClip>,
    start: usize,
}

impl ClipView {
    pub fn full(clip: Rc<AnimationClip>) -> Self {
        ClipView { clip, start: 0 }
    }

    /// View starting `index` frames into this one, `None` past the end
    pub fn from_frame(&self, index: usize) -> Option<ClipView> {
        (index < self.frames().len()).then(|| ClipView {
            clip: Rc::clone(&self.clip),
            start: self.start + index,
        })
    }

    pub fn id(&self) -> ClipId {
        self.clip.id()
    }

    pub fn looping(&self) -> bool {
        self.clip.looping()
    }

    pub fn frames(&self) -> &[AnimationFrame] {
        &self.clip.frames()[self.start..]
    }

    /// For an `Extend` frame, the index of the next `Retract` frame showing
    /// the same sprite
    pub fn retract_index_for(&self, index: usize) -> Option<usize> {
        let frames = self.frames();
        let current = frames.get(index)?;
        if current.tag != Some(FrameTag::Extend) {
            return None;
        }
        frames
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, frame)| {
                frame.sprite == current.sprite && frame.tag == Some(FrameTag::Retract)
            })
            .map(|(i, _)| i)
    }
}

/// Plays one clip against elapsed time. All timing lives here, the state
/// machine only decides *which* clip.
#[derive(Debug, Default)]
pub struct AnimationPlayer {
    clip: Option<ClipView>,
    frame_index: usize,
    elapsed_in_frame: f32,
    finished: bool,
}

impl AnimationPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play(&mut self, clip: ClipView) {
        self.clip = Some(clip);
        self.frame_index = 0;
        self.elapsed_in_frame = 0.0;
        self.finished = false;
    }

    pub fn update(&mut self, dt: f32) {
        let Some(clip) = self.clip.as_ref() else {
            return;
        };
        if self.finished {
            return;
        }
        self.elapsed_in_frame += dt;

        // while, not if : a long frame hitch can skip several frames at once
        let frames = clip.frames();
        while !self.finished && self.elapsed_in_frame >= frames[self.frame_index].duration {
            self.elapsed_in_frame -= frames[self.frame_index].duration;
            if self.frame_index == frames.len() - 1 {
                if clip.looping() {
                    self.frame_index = 0;
                } else {
                    self.finished = true;
                }
            } else {
                self.frame_index += 1;
            }
        }
    }

    pub fn frame(&self) -> Result<&AnimationFrame, BoxingError> {
        self.clip
            .as_ref()
            .and_then(|clip| clip.frames().get(self.frame_index))
            .ok_or(BoxingError::InvalidState("no clip loaded"))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn clip(&self) -> Option<&ClipView> {
        self.clip.as_ref()
    }

    pub fn clip_id(&self) -> Option<ClipId> {
        self.clip.as_ref().map(ClipView::id)
    }
}
