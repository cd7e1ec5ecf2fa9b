use thiserror::Error;

use crate::tree::FrameId;

/// Errors emitted when a structural edit of a [`FrameTree`](crate::FrameTree) is rejected.
///
/// A rejected edit never changes any frame and never notifies observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown frame: {0}")]
    UnknownFrame(FrameId),
    #[error("setting {reference} as reference of {frame} would create a loop")]
    ReferenceLoop { frame: FrameId, reference: FrameId },
    #[error("reference chain depth {depth} exceeds the configured maximum of {max}")]
    DepthExceeded { depth: usize, max: usize },
    #[error("{frame} is still the reference frame of {children} frame(s)")]
    FrameInUse { frame: FrameId, children: usize },
    #[error("frame limit ({0}) reached")]
    CapacityReached(usize),
    #[error("matrix has a null homogeneous coefficient or non-finite entries")]
    DegenerateMatrix,
}

pub type FrameResult<T> = Result<T, FrameError>;
