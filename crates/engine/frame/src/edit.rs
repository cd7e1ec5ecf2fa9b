//! Frame mutators that need the reference chain or the constraint
//!
//! [`FrameMut`] is handed out by [`FrameTree::get_mut`](crate::FrameTree::get_mut).
//! It forwards the plain local mutators of [`Frame`] and adds:
//!
//! - world-space setters (`set_position`, `set_orientation`, ...),
//! - `*_with_constraint` variants that pass the proposed delta through the
//!   frame's [`Constraint`](crate::Constraint) and write the applied value back,
//! - geometric helpers (`rotate_around_point`, `align_with_frame`,
//!   `project_on_line`),
//! - reference frame reassignment with loop detection.
//!
//! Every call commits its whole change before notifying observers, once.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use glam::{DMat4, DQuat, DVec3};

use crate::constraint::Constraint;
use crate::error::FrameResult;
use crate::frame::Frame;
use crate::math::{axis_angle, normalize_rotation, unit_direction};
use crate::observer::FrameObserver;
use crate::tree::{FrameId, FrameTree};
use crate::view::FrameRef;

const AXES: [DVec3; 3] = [DVec3::X, DVec3::Y, DVec3::Z];

/// Mutable view of a frame inside its [`FrameTree`]
pub struct FrameMut<'a> {
    tree: &'a mut FrameTree,
    id: FrameId,
}

impl fmt::Debug for FrameMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameMut")
            .field("id", &self.id)
            .field("frame", self.tree.slot(self.id))
            .finish()
    }
}

impl Deref for FrameMut<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        self.tree.slot(self.id)
    }
}

impl<'a> FrameMut<'a> {
    pub(crate) fn new(tree: &'a mut FrameTree, id: FrameId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Read-only view, for world queries in the middle of an edit
    pub fn view(&self) -> FrameRef<'_> {
        FrameRef::new(&*self.tree, self.id, self.tree.slot(self.id))
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.tree.slot_mut(self.id)
    }

    // ========================================================================
    // Local state (forwarded to Frame)
    // ========================================================================

    pub fn set_translation(&mut self, translation: DVec3) {
        self.frame_mut().set_translation(translation);
    }

    pub fn set_rotation(&mut self, rotation: DQuat) {
        self.frame_mut().set_rotation(rotation);
    }

    pub fn set_translation_and_rotation(&mut self, translation: DVec3, rotation: DQuat) {
        self.frame_mut().set_translation_and_rotation(translation, rotation);
    }

    /// Unconstrained translation, `delta` in reference frame coordinates
    pub fn translate(&mut self, delta: DVec3) {
        self.frame_mut().translate(delta);
    }

    /// Unconstrained rotation, `delta` in the frame's own axes
    pub fn rotate(&mut self, delta: DQuat) {
        self.frame_mut().rotate(delta);
    }

    pub fn set_from_matrix(&mut self, m: &DMat4) -> FrameResult<()> {
        self.frame_mut().set_from_matrix(m)
    }

    pub fn set_constraint<C: Constraint + 'static>(&mut self, constraint: &Rc<C>) {
        self.frame_mut().set_constraint(constraint);
    }

    pub fn clear_constraint(&mut self) {
        self.frame_mut().clear_constraint();
    }

    pub fn add_observer<O: FrameObserver + 'static>(&mut self, observer: &Rc<O>) {
        self.frame_mut().add_observer(observer);
    }

    pub fn remove_observer<O: FrameObserver + 'static>(&mut self, observer: &Rc<O>) -> bool {
        self.frame_mut().remove_observer(observer)
    }

    pub fn clear_observers(&mut self) {
        self.frame_mut().clear_observers();
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Make `reference` the frame in which this frame's translation and
    /// rotation are expressed (`None` for the world).
    ///
    /// Local values are kept, so the world position usually changes. The
    /// assignment is rejected without any change when `reference` is not in
    /// the tree, when it would create a loop, or when it would exceed the
    /// configured depth. Re-assigning the current reference is a no-op that
    /// does not notify observers.
    pub fn set_reference_frame(&mut self, reference: Option<FrameId>) -> FrameResult<()> {
        self.tree.check_reference(Some(self.id), reference)?;
        if self.reference_frame() == reference {
            return Ok(());
        }
        tracing::debug!("Reference of {} set to {:?}", self.id, reference);
        self.frame_mut().set_reference_unchecked(reference);
        Ok(())
    }

    // ========================================================================
    // World position and orientation
    // ========================================================================

    /// Set the world position, ignoring the constraint
    pub fn set_position(&mut self, position: DVec3) {
        let translation = self.point_in_reference(position);
        self.frame_mut().set_translation(translation);
    }

    /// Set the world orientation, ignoring the constraint
    pub fn set_orientation(&mut self, orientation: DQuat) {
        let rotation = self.rotation_in_reference(orientation);
        self.frame_mut().set_rotation(rotation);
    }

    /// Set world position and orientation with a single notification
    pub fn set_position_and_orientation(&mut self, position: DVec3, orientation: DQuat) {
        let translation = self.point_in_reference(position);
        let rotation = self.rotation_in_reference(orientation);
        self.frame_mut().set_translation_and_rotation(translation, rotation);
    }

    /// Move towards world `position` as far as the constraint allows and
    /// write the reached world position back.
    pub fn set_position_with_constraint(&mut self, position: &mut DVec3) {
        let mut translation = self.point_in_reference(*position);
        self.set_translation_with_constraint(&mut translation);
        *position = self.view().position();
    }

    /// Turn towards world `orientation` as far as the constraint allows and
    /// write the reached world orientation back.
    pub fn set_orientation_with_constraint(&mut self, orientation: &mut DQuat) {
        let mut rotation = self.rotation_in_reference(*orientation);
        self.set_rotation_with_constraint(&mut rotation);
        *orientation = self.view().orientation();
    }

    pub fn set_position_and_orientation_with_constraint(
        &mut self,
        position: &mut DVec3,
        orientation: &mut DQuat,
    ) {
        let mut translation = self.point_in_reference(*position);
        let mut rotation = self.rotation_in_reference(*orientation);
        self.set_translation_and_rotation_with_constraint(&mut translation, &mut rotation);
        let view = self.view();
        *position = view.position();
        *orientation = view.orientation();
    }

    // ========================================================================
    // Constrained local mutators
    // ========================================================================

    /// Constrained [`translate`](Self::translate): the filtered delta is
    /// applied and written back into `delta`.
    pub fn translate_with_constraint(&mut self, delta: &mut DVec3) {
        let filtered = self.filter_translation(*delta);
        self.frame_mut().translate(filtered);
        *delta = filtered;
    }

    /// Constrained [`rotate`](Self::rotate): the filtered delta is applied
    /// and written back into `delta`.
    pub fn rotate_with_constraint(&mut self, delta: &mut DQuat) {
        let filtered = self.filter_rotation(*delta);
        self.frame_mut().rotate(filtered);
        *delta = filtered;
    }

    /// Move towards local `translation` through the constraint; the reached
    /// translation is written back.
    pub fn set_translation_with_constraint(&mut self, translation: &mut DVec3) {
        let delta = self.filter_translation(*translation - self.translation());
        let reached = self.translation() + delta;
        self.frame_mut().set_translation(reached);
        *translation = reached;
    }

    /// Turn towards local `rotation` through the constraint; the reached
    /// rotation is written back.
    pub fn set_rotation_with_constraint(&mut self, rotation: &mut DQuat) {
        let delta = self.filter_rotation(self.rotation().inverse() * *rotation);
        let reached = self.rotation() * delta;
        self.frame_mut().set_rotation(reached);
        *rotation = self.rotation();
    }

    pub fn set_translation_and_rotation_with_constraint(
        &mut self,
        translation: &mut DVec3,
        rotation: &mut DQuat,
    ) {
        let delta_t = self.filter_translation(*translation - self.translation());
        let delta_q = self.filter_rotation(self.rotation().inverse() * *rotation);
        let (t, q) = (self.translation() + delta_t, self.rotation() * delta_q);
        self.frame_mut().set_translation_and_rotation(t, q);
        *translation = self.translation();
        *rotation = self.rotation();
    }

    // ========================================================================
    // Geometric helpers
    // ========================================================================

    /// Rotate by `rotation` (in the frame's own axes) around the world
    /// `point`, which keeps its world position.
    pub fn rotate_around_point(&mut self, rotation: DQuat, point: DVec3) {
        let (translation, rotation) = self.around_point(rotation, point);
        self.frame_mut().set_translation_and_rotation(translation, rotation);
    }

    /// Constrained [`rotate_around_point`](Self::rotate_around_point).
    ///
    /// The rotation is filtered first, then the translation that keeps
    /// `point` in place is filtered as a translation delta (the constraint
    /// sees the frame as it was before the call). The applied rotation is
    /// written back.
    pub fn rotate_around_point_with_constraint(&mut self, rotation: &mut DQuat, point: DVec3) {
        let filtered = self.filter_rotation(*rotation);
        let (translation, new_rotation) = self.around_point(filtered, point);
        let delta = self.filter_translation(translation - self.translation());
        let translation = self.translation() + delta;
        self.frame_mut()
            .set_translation_and_rotation(translation, new_rotation);
        *rotation = filtered;
    }

    /// Rotate, and optionally move, so that the frame's axes line up with
    /// those of `other` (world axes when `None`).
    ///
    /// The pair of axes (one from each frame) that are closest to parallel
    /// is aligned first, provided the absolute cosine of their angle is at
    /// least `threshold`; a second pair is then aligned under the same
    /// condition. With `move_to_frame`, the frame is also translated so that
    /// `other`'s origin keeps the local coordinates it had before the
    /// rotation. Observers are notified once.
    pub fn align_with_frame(
        &mut self,
        other: Option<FrameId>,
        move_to_frame: bool,
        threshold: f64,
    ) -> FrameResult<()> {
        let (targets, center) = match other {
            Some(id) => {
                let other = self.tree.get(id)?;
                (AXES.map(|axis| other.inverse_transform_of(axis)), other.position())
            }
            None => (AXES, DVec3::ZERO),
        };

        let view = self.view();
        let old_orientation = view.orientation();
        let old_position = view.position();
        let mut orientation = old_orientation;

        let (target, own) = closest_axes(&targets, &AXES.map(|axis| orientation * axis));
        let cosine = targets[target].dot(orientation * AXES[own]);
        if cosine.abs() >= threshold {
            orientation = alignment(targets[target], orientation * AXES[own]) * orientation;

            // Align a second axis around the first one
            let next = orientation * AXES[(own + 1) % 3];
            let (target, _) = closest_axes(&targets, &[next]);
            if targets[target].dot(next).abs() >= threshold {
                orientation = alignment(targets[target], next) * orientation;
            }
        }

        let translation = if move_to_frame {
            let local_center = old_orientation.inverse() * (center - old_position);
            self.point_in_reference(center - orientation * local_center)
        } else {
            self.translation()
        };
        let rotation = self.rotation_in_reference(orientation);
        self.frame_mut().set_translation_and_rotation(translation, rotation);
        Ok(())
    }

    /// Move the frame's world position onto its orthogonal projection on the
    /// world line through `origin` along `direction`.
    ///
    /// `direction` does not need to be unit length; a zero direction defines
    /// no line and leaves the frame untouched.
    pub fn project_on_line(&mut self, origin: DVec3, direction: DVec3) {
        let Some(direction) = unit_direction(direction) else {
            tracing::warn!("Cannot project {} on a line with null direction", self.id);
            return;
        };
        let position = self.view().position();
        let projected = origin + direction * (position - origin).dot(direction);
        self.set_position(projected);
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// World point expressed in the reference frame
    fn point_in_reference(&self, world: DVec3) -> DVec3 {
        match self.view().reference() {
            Some(reference) => reference.coordinates_of(world),
            None => world,
        }
    }

    /// World orientation expressed relative to the reference frame
    fn rotation_in_reference(&self, world: DQuat) -> DQuat {
        match self.view().reference() {
            Some(reference) => reference.orientation().inverse() * world,
            None => world,
        }
    }

    fn filter_translation(&self, delta: DVec3) -> DVec3 {
        match self.constraint() {
            Some(constraint) => constraint.constrain_translation(delta, self.view()),
            None => delta,
        }
    }

    fn filter_rotation(&self, delta: DQuat) -> DQuat {
        let delta = normalize_rotation(delta);
        match self.constraint() {
            Some(constraint) => {
                normalize_rotation(constraint.constrain_rotation(delta, self.view()))
            }
            None => delta,
        }
    }

    /// Local (translation, rotation) after rotating by `rotation` around the
    /// world `point`
    fn around_point(&self, rotation: DQuat, point: DVec3) -> (DVec3, DQuat) {
        let view = self.view();
        let old_orientation = view.orientation();
        let new_rotation = normalize_rotation(self.rotation() * rotation);
        let new_orientation = match view.reference() {
            Some(reference) => reference.orientation() * new_rotation,
            None => new_rotation,
        };

        // Same motion expressed as a world-space rotation
        let world_rotation = new_orientation * old_orientation.inverse();
        let position = point + world_rotation * (view.position() - point);
        (self.point_in_reference(position), new_rotation)
    }
}

/// Indices (target, own) of the most parallel pair of axes
fn closest_axes(targets: &[DVec3; 3], own: &[DVec3]) -> (usize, usize) {
    let mut best = (0, 0);
    let mut max = -1.0;
    for (i, target) in targets.iter().enumerate() {
        for (j, axis) in own.iter().enumerate() {
            let projection = target.dot(*axis).abs();
            if projection > max {
                max = projection;
                best = (i, j);
            }
        }
    }
    best
}

/// Shortest world rotation bringing `current` onto `target` or onto
/// `-target`, whichever is closer
fn alignment(target: DVec3, current: DVec3) -> DQuat {
    let target = if target.dot(current) < 0.0 { -target } else { target };
    let axis = current.cross(target);
    let angle = axis.length().min(1.0).asin();
    axis_angle(axis, angle)
}
