//! Frame value type: local transform, local conversions and matrices
//!
//! A [`Frame`] is a coordinate system defined by a translation and then a
//! rotation around the translated origin, both relative to an optional
//! reference frame. This module only deals with the *local* level (frame ↔
//! reference frame). Anything that needs the whole reference chain lives on
//! [`FrameRef`](crate::FrameRef) / [`FrameMut`](crate::FrameMut).

use std::fmt;
use std::rc::{Rc, Weak};

use glam::{DMat4, DQuat, DVec3};

use crate::constraint::Constraint;
use crate::error::{FrameError, FrameResult};
use crate::math::{normalize_rotation, EPSILON};
use crate::observer::{FrameObserver, ObserverSet};
use crate::tree::FrameId;

/// Rigid coordinate system, optionally defined relative to a reference frame.
///
/// Every mutator commits the new state first and then notifies the frame's
/// observers exactly once.
///
/// # Examples
///
/// ```
/// use frame::Frame;
/// use glam::{DQuat, DVec3};
///
/// let mut frame = Frame::new();
/// frame.set_translation(DVec3::new(0.5, 0.0, 0.0));
/// frame.rotate(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));
///
/// // Local X axis now points along the reference frame's Y axis
/// let x = frame.local_inverse_transform_of(DVec3::X);
/// assert!(x.abs_diff_eq(DVec3::Y, 1e-12));
/// ```
pub struct Frame {
    translation: DVec3,
    rotation: DQuat,
    reference_frame: Option<FrameId>,
    constraint: Option<Weak<dyn Constraint>>,
    observers: ObserverSet,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies translation, rotation, reference frame and constraint.
/// Observers are not copied: they registered with the source frame.
impl Clone for Frame {
    fn clone(&self) -> Self {
        Self {
            translation: self.translation,
            rotation: self.rotation,
            reference_frame: self.reference_frame,
            constraint: self.constraint.clone(),
            observers: ObserverSet::default(),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("translation", &self.translation)
            .field("rotation", &self.rotation)
            .field("reference_frame", &self.reference_frame)
            .field("constrained", &self.constraint().is_some())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Frame {
    /// Identity frame defined in the world coordinate system
    pub fn new() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            reference_frame: None,
            constraint: None,
            observers: ObserverSet::default(),
        }
    }

    /// World-rooted frame at `position` with `orientation`
    pub fn from_position_orientation(position: DVec3, orientation: DQuat) -> Self {
        Self {
            translation: position,
            rotation: normalize_rotation(orientation),
            ..Self::new()
        }
    }

    /// World-rooted frame decoded from a homogeneous matrix, see [`Frame::set_from_matrix`]
    pub fn from_matrix(m: &DMat4) -> FrameResult<Self> {
        let (translation, rotation) = decompose(m)?;
        Ok(Self::from_position_orientation(translation, rotation))
    }

    /// Builder-style reference frame assignment, validated when the frame is
    /// inserted into a [`FrameTree`](crate::FrameTree).
    pub fn with_reference_frame(mut self, reference: Option<FrameId>) -> Self {
        self.reference_frame = reference;
        self
    }

    // ========================================================================
    // Local state
    // ========================================================================

    /// Translation relative to the reference frame
    pub fn translation(&self) -> DVec3 {
        self.translation
    }

    /// Rotation relative to the reference frame
    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    /// Frame in which translation and rotation are expressed; `None` is the world
    pub fn reference_frame(&self) -> Option<FrameId> {
        self.reference_frame
    }

    pub fn set_translation(&mut self, translation: DVec3) {
        self.translation = translation;
        self.modified();
    }

    /// Set the local rotation, normalizing it first
    pub fn set_rotation(&mut self, rotation: DQuat) {
        self.rotation = normalize_rotation(rotation);
        self.modified();
    }

    /// Set both local values with a single notification
    pub fn set_translation_and_rotation(&mut self, translation: DVec3, rotation: DQuat) {
        self.translation = translation;
        self.rotation = normalize_rotation(rotation);
        self.modified();
    }

    /// Unconstrained translation; `delta` is expressed in the reference frame
    pub fn translate(&mut self, delta: DVec3) {
        self.translation += delta;
        self.modified();
    }

    /// Unconstrained rotation; `delta` is expressed in the frame's own axes
    pub fn rotate(&mut self, delta: DQuat) {
        self.rotation = normalize_rotation(self.rotation * delta);
        self.modified();
    }

    // ========================================================================
    // Constraint and observers
    // ========================================================================

    /// Live constraint, if any. A dropped constraint reads as `None`.
    pub fn constraint(&self) -> Option<Rc<dyn Constraint>> {
        self.constraint.as_ref().and_then(Weak::upgrade)
    }

    /// Attach `constraint` without taking ownership of it
    pub fn set_constraint<C: Constraint + 'static>(&mut self, constraint: &Rc<C>) {
        let weak = Rc::downgrade(constraint);
        self.constraint = Some(weak as Weak<dyn Constraint>);
    }

    pub fn clear_constraint(&mut self) {
        self.constraint = None;
    }

    /// Register `observer`; registering the same observer twice has no effect
    pub fn add_observer<O: FrameObserver + 'static>(&mut self, observer: &Rc<O>) {
        self.observers.insert(observer);
    }

    /// Unregister `observer`, returning whether it was registered
    pub fn remove_observer<O: FrameObserver + 'static>(&mut self, observer: &Rc<O>) -> bool {
        self.observers.remove(observer)
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    /// Number of live observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // ========================================================================
    // Local conversions (frame <-> reference frame)
    // ========================================================================

    /// Point in the reference frame -> point in this frame
    pub fn local_coordinates_of(&self, src: DVec3) -> DVec3 {
        self.rotation.inverse() * (src - self.translation)
    }

    /// Point in this frame -> point in the reference frame
    pub fn local_inverse_coordinates_of(&self, src: DVec3) -> DVec3 {
        self.rotation * src + self.translation
    }

    /// Vector in the reference frame -> vector in this frame
    pub fn local_transform_of(&self, src: DVec3) -> DVec3 {
        self.rotation.inverse() * src
    }

    /// Vector in this frame -> vector in the reference frame
    pub fn local_inverse_transform_of(&self, src: DVec3) -> DVec3 {
        self.rotation * src
    }

    // ========================================================================
    // Matrices and inversion
    // ========================================================================

    /// Local transform as a homogeneous matrix: rotation first, then translation.
    ///
    /// glam matrices are column-major, so `matrix().to_cols_array()` is the
    /// 16-value layout a GL model-view stack expects (translation at 12..15).
    /// Multiplying the reference frame's matrix by this one composes the chain.
    pub fn matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// Overwrite translation and rotation from a homogeneous matrix.
    ///
    /// The matrix is divided by its homogeneous coefficient and any scale in
    /// the upper 3x3 block is discarded. Rejects a (near) zero coefficient or
    /// non-finite entries without touching the frame.
    pub fn set_from_matrix(&mut self, m: &DMat4) -> FrameResult<()> {
        let (translation, rotation) = decompose(m)?;
        self.set_translation_and_rotation(translation, rotation);
        Ok(())
    }

    /// Inverse of the local transform, as a new world-rooted frame without
    /// constraint or observers
    pub fn inverse(&self) -> Frame {
        let inverse = self.rotation.inverse();
        Frame::from_position_orientation(-(inverse * self.translation), inverse)
    }

    pub(crate) fn set_reference_unchecked(&mut self, reference: Option<FrameId>) {
        self.reference_frame = reference;
        self.modified();
    }

    pub(crate) fn modified(&mut self) {
        self.observers.notify();
    }
}

fn decompose(m: &DMat4) -> FrameResult<(DVec3, DQuat)> {
    let w = m.w_axis.w;
    if !m.is_finite() || w.abs() < EPSILON {
        tracing::warn!("Rejecting degenerate frame matrix {:?}", m);
        return Err(FrameError::DegenerateMatrix);
    }
    let (_scale, rotation, translation) = m.mul_scalar(1.0 / w).to_scale_rotation_translation();
    Ok((translation, normalize_rotation(rotation)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::f64::consts::FRAC_PI_2;

    #[derive(Default)]
    struct Counter(Cell<usize>);

    impl FrameObserver for Counter {
        fn on_frame_modified(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_default_is_identity() {
        let frame = Frame::default();
        assert_eq!(frame.translation(), DVec3::ZERO);
        assert_eq!(frame.rotation(), DQuat::IDENTITY);
        assert_eq!(frame.reference_frame(), None);
        assert!(frame.constraint().is_none());
        assert_eq!(frame.matrix(), DMat4::IDENTITY);
    }

    #[test]
    fn test_local_round_trips() {
        let frame = Frame::from_position_orientation(
            DVec3::new(1.0, -2.0, 0.5),
            DQuat::from_euler(glam::EulerRot::YXZ, 0.3, -1.1, 2.0),
        );
        let p = DVec3::new(3.0, 4.0, -5.0);

        let back = frame.local_inverse_coordinates_of(frame.local_coordinates_of(p));
        assert!(back.abs_diff_eq(p, 1e-12));
        let back = frame.local_coordinates_of(frame.local_inverse_coordinates_of(p));
        assert!(back.abs_diff_eq(p, 1e-12));

        let v = frame.local_transform_of(p);
        assert!((v.length() - p.length()).abs() < 1e-12);
        assert!(frame.local_inverse_transform_of(v).abs_diff_eq(p, 1e-12));
    }

    #[test]
    fn test_rotate_composes_in_local_axes() {
        let mut frame = Frame::from_position_orientation(DVec3::ZERO, DQuat::from_rotation_z(FRAC_PI_2));
        frame.rotate(DQuat::from_rotation_x(FRAC_PI_2));

        // Expected composition: existing rotation first, then the delta in local axes
        let expected = DQuat::from_rotation_z(FRAC_PI_2) * DQuat::from_rotation_x(FRAC_PI_2);
        assert!(frame.rotation().abs_diff_eq(expected, 1e-12));
        assert!(frame.rotation().is_normalized());
    }

    #[test]
    fn test_set_rotation_normalizes() {
        let mut frame = Frame::new();
        frame.set_rotation(DQuat::from_xyzw(0.0, 0.0, 0.0, 3.0));
        assert_eq!(frame.rotation(), DQuat::IDENTITY);

        frame.set_rotation(DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert_eq!(frame.rotation(), DQuat::IDENTITY);
    }

    #[test]
    fn test_each_mutation_notifies_once() {
        let counter = Rc::new(Counter::default());
        let mut frame = Frame::new();
        frame.add_observer(&counter);

        frame.set_translation(DVec3::X);
        frame.set_rotation(DQuat::from_rotation_y(0.2));
        frame.set_translation_and_rotation(DVec3::Y, DQuat::IDENTITY);
        frame.translate(DVec3::Z);
        frame.rotate(DQuat::from_rotation_x(0.1));
        assert_eq!(counter.0.get(), 5);

        assert!(frame.remove_observer(&counter));
        frame.translate(DVec3::Z);
        assert_eq!(counter.0.get(), 5);
    }

    #[test]
    fn test_matrix_layout() {
        let frame = Frame::from_position_orientation(
            DVec3::new(1.0, 2.0, 3.0),
            DQuat::from_rotation_z(FRAC_PI_2),
        );
        let cols = frame.matrix().to_cols_array();
        assert_eq!(&cols[12..16], &[1.0, 2.0, 3.0, 1.0]);
        // First column is the image of local X: world Y
        assert!((cols[0]).abs() < 1e-12);
        assert!((cols[1] - 1.0).abs() < 1e-12);

        let p = DVec3::new(0.5, -1.0, 2.0);
        let via_matrix = frame.matrix().transform_point3(p);
        assert!(via_matrix.abs_diff_eq(frame.local_inverse_coordinates_of(p), 1e-12));
    }

    #[test]
    fn test_set_from_matrix() {
        let source = Frame::from_position_orientation(
            DVec3::new(-4.0, 0.5, 9.0),
            DQuat::from_rotation_y(0.7) * DQuat::from_rotation_x(-0.2),
        );
        // Homogeneous scaling must not matter
        let m = source.matrix() * 2.0;

        let mut frame = Frame::new();
        frame.set_from_matrix(&m).unwrap();
        assert!(frame.translation().abs_diff_eq(source.translation(), 1e-9));
        assert!(frame.matrix().abs_diff_eq(source.matrix(), 1e-9));

        let decoded = Frame::from_matrix(&source.matrix()).unwrap();
        assert!(decoded.matrix().abs_diff_eq(source.matrix(), 1e-9));
    }

    #[test]
    fn test_degenerate_matrix_rejected() {
        let counter = Rc::new(Counter::default());
        let mut frame = Frame::from_position_orientation(DVec3::X, DQuat::IDENTITY);
        frame.add_observer(&counter);

        let mut m = DMat4::IDENTITY;
        m.w_axis.w = 0.0;
        assert_eq!(frame.set_from_matrix(&m), Err(FrameError::DegenerateMatrix));
        assert_eq!(frame.translation(), DVec3::X);
        assert_eq!(counter.0.get(), 0);
    }

    #[test]
    fn test_inverse() {
        let frame = Frame::from_position_orientation(
            DVec3::new(1.0, 2.0, 3.0),
            DQuat::from_rotation_z(FRAC_PI_2),
        );
        let inverse = frame.inverse();
        assert!(inverse.reference_frame().is_none());
        assert!((frame.matrix() * inverse.matrix()).abs_diff_eq(DMat4::IDENTITY, 1e-12));

        let p = DVec3::new(-2.0, 0.0, 7.0);
        assert!(inverse
            .local_inverse_coordinates_of(p)
            .abs_diff_eq(frame.local_coordinates_of(p), 1e-12));
    }

    #[test]
    fn test_clone_drops_observers() {
        let counter = Rc::new(Counter::default());
        let mut frame = Frame::new().with_reference_frame(Some(FrameId::new(3, 0)));
        frame.add_observer(&counter);

        let mut copy = frame.clone();
        assert_eq!(copy.reference_frame(), frame.reference_frame());
        assert_eq!(copy.observer_count(), 0);
        copy.translate(DVec3::X);
        assert_eq!(counter.0.get(), 0);
    }

    #[test]
    fn test_dropped_constraint_reads_as_none() {
        struct Frozen;
        impl Constraint for Frozen {}

        let mut frame = Frame::new();
        {
            let constraint = Rc::new(Frozen);
            frame.set_constraint(&constraint);
            assert!(frame.constraint().is_some());
        }
        assert!(frame.constraint().is_none());
    }
}
