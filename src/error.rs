use crate::sprite::ClipId;

/// Errors raised by the simulation core.
///
/// None of these are recoverable gameplay conditions: every one of them means
/// the core was driven in an order it does not support (no clip loaded, no
/// opponent linked) or was fed malformed clip data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoxingError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("precondition violated: {0}")]
    PreconditionViolated(&'static str),

    #[error("clip {0:?} has no frames")]
    EmptyClip(ClipId),

    #[error("clip {0:?} has a frame with a non-positive duration")]
    InvalidFrameDuration(ClipId),
}
