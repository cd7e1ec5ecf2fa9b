//! Hierarchical rigid-body coordinate frames
//!
//! A [`Frame`] is a translation plus a rotation relative to an optional
//! reference frame. Frames live in a [`FrameTree`] arena and refer to their
//! reference frame by [`FrameId`], so reference chains of any depth can be
//! walked to convert points and vectors between any two frames or the world.
//!
//! ```
//! use frame::{Frame, FrameTree};
//! use glam::{DQuat, DVec3};
//!
//! let mut tree = FrameTree::new();
//! let arm = tree.insert(Frame::from_position_orientation(DVec3::X, DQuat::IDENTITY))?;
//! let hand = tree.insert(Frame::new().with_reference_frame(Some(arm)))?;
//!
//! tree.get_mut(hand)?.set_translation(DVec3::new(2.0, 0.0, 0.0));
//! let world = tree.get(hand)?.inverse_coordinates_of(DVec3::ZERO);
//! assert_eq!(world, DVec3::new(3.0, 0.0, 0.0));
//! # Ok::<(), frame::FrameError>(())
//! ```
//!
//! Conventions: double precision, right-handed active rotations
//! (`rotation * v`), column-major 4x4 matrices (`M * p` with the
//! translation in the last column).
//!
//! Constraints and observers are held weakly and shared through `Rc`, so
//! frames are neither `Send` nor `Sync`. A tree is meant to be driven from a
//! single thread; observers must not modify frames from their callback.

mod config;
mod constraint;
mod edit;
mod error;
mod frame;
pub mod math;
mod observer;
mod tree;
mod view;

pub use config::FrameTreeConfig;
pub use constraint::{
    AxisPlaneConstraint, Constraint, ConstraintSpace, RotationConstraint, TranslationConstraint,
};
pub use edit::FrameMut;
pub use error::{FrameError, FrameResult};
pub use frame::Frame;
pub use observer::FrameObserver;
pub use tree::{FrameId, FrameTree};
pub use view::{Ancestors, FrameRef};

// Re-export for convenience
pub use glam;
