//! Read-only frame queries that walk the reference chain
//!
//! Naming follows two axes:
//!
//! - `*coordinates_of*` converts points (rotation and translation),
//!   `*transform_of*` converts vectors (rotation only, length preserving).
//! - No prefix converts between this frame and the world, `*_in` / `*_from`
//!   convert to / from any other frame, and `local_*` (on [`Frame`]) converts
//!   between this frame and its reference frame only.
//!
//! Each conversion composed with its inverse gives back its input.

use std::fmt;
use std::ops::Deref;

use glam::{DMat4, DQuat, DVec3};

use crate::frame::Frame;
use crate::tree::{FrameId, FrameTree};

/// Read-only view of a frame inside its [`FrameTree`]
#[derive(Clone, Copy)]
pub struct FrameRef<'a> {
    tree: &'a FrameTree,
    id: FrameId,
    frame: &'a Frame,
}

impl fmt::Debug for FrameRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRef")
            .field("id", &self.id)
            .field("frame", self.frame)
            .finish()
    }
}

impl<'a> Deref for FrameRef<'a> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        self.frame
    }
}

impl<'a> FrameRef<'a> {
    pub(crate) fn new(tree: &'a FrameTree, id: FrameId, frame: &'a Frame) -> Self {
        Self { tree, id, frame }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn tree(&self) -> &'a FrameTree {
        self.tree
    }

    /// The underlying frame, with the tree's lifetime
    pub fn frame(&self) -> &'a Frame {
        self.frame
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// View of the reference frame, `None` when defined in world coordinates
    pub fn reference(&self) -> Option<FrameRef<'a>> {
        let id = self.frame.reference_frame()?;
        self.tree.get(id).ok()
    }

    /// This frame followed by its reference frame, its reference frame's
    /// reference frame, and so on up to the world
    pub fn ancestors(&self) -> Ancestors<'a> {
        Ancestors {
            next: Some(*self),
        }
    }

    /// Number of frames between this one and the world
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// Whether making `candidate` the reference frame of this frame would
    /// create a loop, i.e. this frame is `candidate` or one of its ancestors.
    pub fn would_create_loop(&self, candidate: Option<FrameId>) -> bool {
        self.tree.would_create_loop(self.id, candidate)
    }

    /// Same tree and same frame
    fn is(&self, other: &FrameRef<'_>) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }

    // ========================================================================
    // World position and orientation
    // ========================================================================

    /// Position in world coordinates
    pub fn position(&self) -> DVec3 {
        self.inverse_coordinates_of(DVec3::ZERO)
    }

    /// Orientation in world coordinates
    pub fn orientation(&self) -> DQuat {
        self.ancestors()
            .fold(DQuat::IDENTITY, |q, frame| frame.rotation() * q)
    }

    /// World transform as a homogeneous matrix, column-major like [`Frame::matrix`]
    pub fn world_matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.orientation(), self.position())
    }

    /// Inverse of the world transform, as a new world-rooted frame without
    /// constraint or observers
    pub fn world_inverse(&self) -> Frame {
        let inverse = self.orientation().inverse();
        Frame::from_position_orientation(-(inverse * self.position()), inverse)
    }

    // ========================================================================
    // Points
    // ========================================================================

    /// World point -> point in this frame
    pub fn coordinates_of(&self, src: DVec3) -> DVec3 {
        self.descend_from(None, src, Frame::local_coordinates_of)
    }

    /// Point in this frame -> world point
    pub fn inverse_coordinates_of(&self, src: DVec3) -> DVec3 {
        self.ancestors()
            .fold(src, |p, frame| frame.local_inverse_coordinates_of(p))
    }

    /// Point in this frame -> point in `target` (`None` is the world)
    pub fn coordinates_of_in(&self, src: DVec3, target: Option<&FrameRef<'_>>) -> DVec3 {
        self.ascend_to(
            target,
            src,
            Frame::local_inverse_coordinates_of,
            |target, world| target.coordinates_of(world),
        )
    }

    /// Point in `source` (`None` is the world) -> point in this frame
    pub fn coordinates_of_from(&self, src: DVec3, source: Option<&FrameRef<'_>>) -> DVec3 {
        match source {
            Some(source) if self.is(source) => src,
            Some(source) if self.has_ancestor(source) => {
                self.descend_from(Some(source.id), src, Frame::local_coordinates_of)
            }
            Some(source) => self.coordinates_of(source.inverse_coordinates_of(src)),
            None => self.coordinates_of(src),
        }
    }

    // ========================================================================
    // Vectors
    // ========================================================================

    /// World vector -> vector in this frame
    pub fn transform_of(&self, src: DVec3) -> DVec3 {
        self.descend_from(None, src, Frame::local_transform_of)
    }

    /// Vector in this frame -> world vector
    pub fn inverse_transform_of(&self, src: DVec3) -> DVec3 {
        self.ancestors()
            .fold(src, |v, frame| frame.local_inverse_transform_of(v))
    }

    /// Vector in this frame -> vector in `target` (`None` is the world)
    pub fn transform_of_in(&self, src: DVec3, target: Option<&FrameRef<'_>>) -> DVec3 {
        self.ascend_to(
            target,
            src,
            Frame::local_inverse_transform_of,
            |target, world| target.transform_of(world),
        )
    }

    /// Vector in `source` (`None` is the world) -> vector in this frame
    pub fn transform_of_from(&self, src: DVec3, source: Option<&FrameRef<'_>>) -> DVec3 {
        match source {
            Some(source) if self.is(source) => src,
            Some(source) if self.has_ancestor(source) => {
                self.descend_from(Some(source.id), src, Frame::local_transform_of)
            }
            Some(source) => self.transform_of(source.inverse_transform_of(src)),
            None => self.transform_of(src),
        }
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn has_ancestor(&self, other: &FrameRef<'_>) -> bool {
        self.ancestors().skip(1).any(|frame| frame.is(other))
    }

    /// Walk up from this frame, applying `step` until `target` is reached.
    /// When `target` is not an ancestor the value ends up in world space and
    /// `enter` brings it into `target`.
    fn ascend_to(
        &self,
        target: Option<&FrameRef<'_>>,
        src: DVec3,
        step: fn(&Frame, DVec3) -> DVec3,
        enter: fn(&FrameRef<'_>, DVec3) -> DVec3,
    ) -> DVec3 {
        let mut value = src;
        for frame in self.ancestors() {
            if target.is_some_and(|target| frame.is(target)) {
                return value;
            }
            value = step(frame.frame, value);
        }
        match target {
            Some(target) => enter(target, value),
            None => value,
        }
    }

    /// Apply `step` from the frame just below `ancestor` (the world when
    /// `None`) down to this frame.
    fn descend_from(
        &self,
        ancestor: Option<FrameId>,
        src: DVec3,
        step: fn(&Frame, DVec3) -> DVec3,
    ) -> DVec3 {
        let chain: Vec<&Frame> = self
            .ancestors()
            .take_while(|frame| Some(frame.id) != ancestor)
            .map(|frame| frame.frame)
            .collect();
        chain.into_iter().rev().fold(src, |value, frame| step(frame, value))
    }
}

/// Iterator over a frame and its ancestors, see [`FrameRef::ancestors`]
pub struct Ancestors<'a> {
    next: Option<FrameRef<'a>>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = FrameRef<'a>;

    fn next(&mut self) -> Option<FrameRef<'a>> {
        let current = self.next.take()?;
        self.next = current.reference();
        Some(current)
    }
}
