//! Displacement constraints
//!
//! A [`Constraint`] filters the translation and rotation deltas proposed to a
//! frame before they are committed. Frames only hold a weak handle to their
//! constraint, so one constraint can be shared by many frames and dropping it
//! makes those frames unconstrained again.
//!
//! [`AxisPlaneConstraint`] covers the usual cases: restrict translation to an
//! axis or a plane and rotation to an axis, with directions given either in
//! the frame's local axes or in world space.

use glam::{DQuat, DVec3};

use crate::math::{axis_angle, project_on_axis, project_on_plane};
use crate::view::FrameRef;

/// Filter applied to a proposed displacement before it is committed.
///
/// Both methods default to the identity filter. Implementations must map a
/// zero delta to a zero delta; they only receive a read-only view of the
/// frame and therefore cannot modify it.
pub trait Constraint {
    /// Filter a translation delta, expressed in the coordinate system of the
    /// frame's reference frame (world when it has none).
    fn constrain_translation(&self, translation: DVec3, _frame: FrameRef<'_>) -> DVec3 {
        translation
    }

    /// Filter a rotation delta, expressed in the frame's local axes.
    fn constrain_rotation(&self, rotation: DQuat, _frame: FrameRef<'_>) -> DQuat {
        rotation
    }
}

/// Coordinate system in which an [`AxisPlaneConstraint`]'s directions are given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstraintSpace {
    /// Directions are expressed in the constrained frame's local axes
    #[default]
    Local,
    /// Directions are expressed in world coordinates
    World,
}

/// Allowed translations
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TranslationConstraint {
    #[default]
    Free,
    /// Only along this direction
    Axis(DVec3),
    /// Only inside the plane with this normal
    Plane(DVec3),
    Forbidden,
}

/// Allowed rotations
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RotationConstraint {
    #[default]
    Free,
    /// Only around this direction
    Axis(DVec3),
    Forbidden,
}

/// Constraint restricting motion to an axis or a plane.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use frame::{AxisPlaneConstraint, Frame, FrameTree, TranslationConstraint};
/// use glam::DVec3;
///
/// let mut tree = FrameTree::new();
/// let id = tree.insert(Frame::new()).unwrap();
///
/// // Slide along world X only
/// let constraint = Rc::new(AxisPlaneConstraint::world().with_translation(TranslationConstraint::Axis(DVec3::X)));
/// tree.get_mut(id).unwrap().set_constraint(&constraint);
///
/// let mut delta = DVec3::new(1.0, 2.0, 0.0);
/// tree.get_mut(id).unwrap().translate_with_constraint(&mut delta);
/// assert_eq!(delta, DVec3::new(1.0, 0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisPlaneConstraint {
    pub space: ConstraintSpace,
    pub translation: TranslationConstraint,
    pub rotation: RotationConstraint,
}

impl AxisPlaneConstraint {
    /// Unrestricted constraint with directions in local axes
    pub fn local() -> Self {
        Self {
            space: ConstraintSpace::Local,
            ..Default::default()
        }
    }

    /// Unrestricted constraint with directions in world space
    pub fn world() -> Self {
        Self {
            space: ConstraintSpace::World,
            ..Default::default()
        }
    }

    pub fn with_translation(mut self, translation: TranslationConstraint) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: RotationConstraint) -> Self {
        self.rotation = rotation;
        self
    }

    /// Express a translation direction in the frame's reference coordinates
    fn translation_direction(&self, dir: DVec3, frame: &FrameRef<'_>) -> DVec3 {
        match self.space {
            ConstraintSpace::Local => frame.rotation() * dir,
            ConstraintSpace::World => match frame.reference() {
                Some(reference) => reference.transform_of(dir),
                None => dir,
            },
        }
    }

    /// Express a rotation axis in the frame's local axes
    fn rotation_axis(&self, dir: DVec3, frame: &FrameRef<'_>) -> DVec3 {
        match self.space {
            ConstraintSpace::Local => dir,
            ConstraintSpace::World => frame.transform_of(dir),
        }
    }
}

impl Constraint for AxisPlaneConstraint {
    fn constrain_translation(&self, translation: DVec3, frame: FrameRef<'_>) -> DVec3 {
        match self.translation {
            TranslationConstraint::Free => translation,
            TranslationConstraint::Axis(dir) => {
                project_on_axis(translation, self.translation_direction(dir, &frame))
            }
            TranslationConstraint::Plane(normal) => {
                project_on_plane(translation, self.translation_direction(normal, &frame))
            }
            TranslationConstraint::Forbidden => DVec3::ZERO,
        }
    }

    fn constrain_rotation(&self, rotation: DQuat, frame: FrameRef<'_>) -> DQuat {
        match self.rotation {
            RotationConstraint::Free => rotation,
            RotationConstraint::Axis(dir) => {
                // Keep only the rotation component around the axis
                let axis = self.rotation_axis(dir, &frame);
                let imaginary = project_on_axis(rotation.xyz(), axis);
                let angle = 2.0 * rotation.w.clamp(-1.0, 1.0).acos();
                axis_angle(imaginary, angle)
            }
            RotationConstraint::Forbidden => DQuat::IDENTITY,
        }
    }
}
