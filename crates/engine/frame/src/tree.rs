//! Frame storage and hierarchy bookkeeping
//!
//! Frames reference each other through [`FrameId`] handles into a
//! [`FrameTree`]. The tree owns the frames; a reference between two frames is
//! a plain index with no ownership attached. Every structural edit goes
//! through the tree so the reference relation stays acyclic and never points
//! at a removed frame.

use std::fmt;

use crate::config::FrameTreeConfig;
use crate::edit::FrameMut;
use crate::error::{FrameError, FrameResult};
use crate::frame::Frame;
use crate::view::FrameRef;

/// Handle to a frame stored in a [`FrameTree`]
///
/// A slot index plus the generation of that slot when the frame was
/// inserted. Removing a frame bumps its slot's generation, so the old handle
/// stops resolving even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId {
    index: u32,
    generation: u32,
}

impl FrameId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the owning tree
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    frame: Option<Frame>,
}

/// Arena of frames forming a forest rooted in the world coordinate system.
///
/// Slots of removed frames are reused under a new generation, so a stale
/// [`FrameId`] resolves to `UnknownFrame` rather than to the frame that took
/// its slot. A slot whose generation counter is exhausted is retired. Handles are not tied to a particular tree:
/// using an id from another tree is a logic error that is not detected.
///
/// # Examples
///
/// ```
/// use frame::{Frame, FrameTree};
/// use glam::DVec3;
///
/// let mut tree = FrameTree::new();
/// let arm = tree.insert(Frame::new()).unwrap();
/// let hand = tree
///     .insert(Frame::from_position_orientation(DVec3::X, Default::default()).with_reference_frame(Some(arm)))
///     .unwrap();
///
/// tree.get_mut(arm).unwrap().set_translation(DVec3::new(2.0, 0.0, 0.0));
/// assert_eq!(tree.get(hand).unwrap().position(), DVec3::new(3.0, 0.0, 0.0));
/// ```
#[derive(Debug)]
pub struct FrameTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    config: FrameTreeConfig,
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTree {
    /// Create an empty tree with default configuration
    pub fn new() -> Self {
        Self::with_config(FrameTreeConfig::default())
    }

    pub fn with_config(config: FrameTreeConfig) -> Self {
        Self {
            slots: Vec::with_capacity(config.capacity),
            free: Vec::new(),
            len: 0,
            config,
        }
    }

    pub fn config(&self) -> &FrameTreeConfig {
        &self.config
    }

    // ========================================================================
    // Frame Management
    // ========================================================================

    /// Add a frame and return its handle.
    ///
    /// The frame's reference frame, if any, must already be in the tree.
    pub fn insert(&mut self, frame: Frame) -> FrameResult<FrameId> {
        if self.len >= self.config.max_frames {
            tracing::warn!("Frame limit ({}) reached", self.config.max_frames);
            return Err(FrameError::CapacityReached(self.config.max_frames));
        }
        self.check_reference(None, frame.reference_frame())?;

        let id = match self.free.pop() {
            Some(index) => FrameId::new(index, self.slots[index as usize].generation),
            None => {
                let Ok(index) = u32::try_from(self.slots.len()) else {
                    tracing::warn!("Frame slots exhausted ({})", self.slots.len());
                    return Err(FrameError::CapacityReached(self.slots.len()));
                };
                self.slots.push(Slot::default());
                FrameId::new(index, 0)
            }
        };
        tracing::debug!("Inserting {} with reference {:?}", id, frame.reference_frame());
        self.slots[id.index()].frame = Some(frame);
        self.len += 1;
        Ok(id)
    }

    /// Remove a frame and hand it back to the caller.
    ///
    /// Fails with [`FrameError::FrameInUse`] while other frames still use it
    /// as their reference frame: they must be re-parented or removed first.
    pub fn remove(&mut self, id: FrameId) -> FrameResult<Frame> {
        if !self.contains(id) {
            return Err(FrameError::UnknownFrame(id));
        }
        let children = self.children(id).len();
        if children > 0 {
            tracing::warn!("Refusing to remove {} while {} frame(s) reference it", id, children);
            return Err(FrameError::FrameInUse { frame: id, children });
        }

        tracing::debug!("Removing {}", id);
        let slot = &mut self.slots[id.index()];
        let frame = slot.frame.take().ok_or(FrameError::UnknownFrame(id))?;
        self.len -= 1;
        match slot.generation.checked_add(1) {
            Some(generation) => {
                slot.generation = generation;
                self.free.push(id.index);
            }
            None => tracing::debug!("Retiring slot {} after its last generation", id.index),
        }
        Ok(frame)
    }

    pub fn contains(&self, id: FrameId) -> bool {
        self.frame(id).is_some()
    }

    /// Number of frames in the tree
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handles of all frames, in slot order
    pub fn ids(&self) -> impl Iterator<Item = FrameId> + '_ {
        (0u32..)
            .zip(&self.slots)
            .filter(|(_, slot)| slot.frame.is_some())
            .map(|(index, slot)| FrameId::new(index, slot.generation))
    }

    /// Frames whose reference frame is `id`
    pub fn children(&self, id: FrameId) -> Vec<FrameId> {
        self.ids()
            .filter(|&child| {
                self.frame(child)
                    .is_some_and(|frame| frame.reference_frame() == Some(id))
            })
            .collect()
    }

    /// Read-only view of a frame
    pub fn get(&self, id: FrameId) -> FrameResult<FrameRef<'_>> {
        match self.frame(id) {
            Some(frame) => Ok(FrameRef::new(self, id, frame)),
            None => Err(FrameError::UnknownFrame(id)),
        }
    }

    /// Mutable view of a frame
    pub fn get_mut(&mut self, id: FrameId) -> FrameResult<FrameMut<'_>> {
        if !self.contains(id) {
            return Err(FrameError::UnknownFrame(id));
        }
        Ok(FrameMut::new(self, id))
    }

    // ========================================================================
    // Internal
    // ========================================================================

    pub(crate) fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.frame.as_ref())
    }

    /// Frame behind a handle that was validated when its view was created
    pub(crate) fn slot(&self, id: FrameId) -> &Frame {
        match self.slots.get(id.index()) {
            Some(Slot {
                generation,
                frame: Some(frame),
            }) if *generation == id.generation => frame,
            _ => unreachable!("{} was removed while a view on it was alive", id),
        }
    }

    pub(crate) fn slot_mut(&mut self, id: FrameId) -> &mut Frame {
        match self.slots.get_mut(id.index()) {
            Some(Slot {
                generation,
                frame: Some(frame),
            }) if *generation == id.generation => frame,
            _ => unreachable!("{} was removed while a view on it was alive", id),
        }
    }

    /// True when `frame` is `candidate` or one of its ancestors
    pub(crate) fn would_create_loop(&self, frame: FrameId, candidate: Option<FrameId>) -> bool {
        let mut current = candidate;
        while let Some(id) = current {
            if id == frame {
                return true;
            }
            current = self.frame(id).and_then(Frame::reference_frame);
        }
        false
    }

    /// Number of ancestors of `id`
    pub(crate) fn depth_of(&self, id: FrameId) -> usize {
        let mut depth = 0;
        let mut current = self.frame(id).and_then(Frame::reference_frame);
        while let Some(parent) = current {
            depth += 1;
            current = self.frame(parent).and_then(Frame::reference_frame);
        }
        depth
    }

    /// Longest reference path from a descendant of `id` up to `id`
    fn subtree_height(&self, id: FrameId) -> usize {
        self.ids()
            .filter_map(|other| {
                let mut distance = 0;
                let mut current = Some(other);
                while let Some(node) = current {
                    if node == id {
                        return Some(distance);
                    }
                    distance += 1;
                    current = self.frame(node).and_then(Frame::reference_frame);
                }
                None
            })
            .max()
            .unwrap_or(0)
    }

    /// Validate `reference` as the new reference frame of `frame`
    /// (`None` for a frame not yet inserted).
    pub(crate) fn check_reference(
        &self,
        frame: Option<FrameId>,
        reference: Option<FrameId>,
    ) -> FrameResult<()> {
        let Some(reference) = reference else {
            return Ok(());
        };
        if !self.contains(reference) {
            return Err(FrameError::UnknownFrame(reference));
        }
        if let Some(frame) = frame {
            if self.would_create_loop(frame, Some(reference)) {
                tracing::warn!(
                    "Setting {} as reference of {} would create a loop in the frame hierarchy",
                    reference,
                    frame
                );
                return Err(FrameError::ReferenceLoop { frame, reference });
            }
        }
        if let Some(max) = self.config.max_depth {
            let below = frame.map_or(0, |frame| self.subtree_height(frame));
            let depth = self.depth_of(reference) + 1 + below;
            if depth > max {
                tracing::warn!("Reference chain depth {} exceeds maximum {}", depth, max);
                return Err(FrameError::DepthExceeded { depth, max });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn chain(tree: &mut FrameTree, length: usize) -> Vec<FrameId> {
        let mut ids = Vec::new();
        let mut parent = None;
        for _ in 0..length {
            let id = tree
                .insert(Frame::new().with_reference_frame(parent))
                .unwrap();
            ids.push(id);
            parent = Some(id);
        }
        ids
    }

    #[test]
    fn test_insert_and_get() {
        let mut tree = FrameTree::new();
        assert!(tree.is_empty());

        let id = tree
            .insert(Frame::from_position_orientation(DVec3::Y, Default::default()))
            .unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.contains(id));
        assert_eq!(tree.get(id).unwrap().translation(), DVec3::Y);
    }

    #[test]
    fn test_insert_unknown_reference() {
        let mut tree = FrameTree::new();
        let bogus = FrameId::new(7, 0);
        let result = tree.insert(Frame::new().with_reference_frame(Some(bogus)));
        assert_eq!(result, Err(FrameError::UnknownFrame(bogus)));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_children_and_depth() {
        let mut tree = FrameTree::new();
        let ids = chain(&mut tree, 4);
        let sibling = tree
            .insert(Frame::new().with_reference_frame(Some(ids[0])))
            .unwrap();

        let mut children = tree.children(ids[0]);
        children.sort();
        assert_eq!(children, vec![ids[1], sibling]);
        assert_eq!(tree.depth_of(ids[0]), 0);
        assert_eq!(tree.depth_of(ids[3]), 3);
        assert_eq!(tree.subtree_height(ids[0]), 3);
        assert_eq!(tree.subtree_height(ids[3]), 0);
    }

    #[test]
    fn test_would_create_loop() {
        let mut tree = FrameTree::new();
        let ids = chain(&mut tree, 3);

        assert!(tree.would_create_loop(ids[0], Some(ids[0])));
        assert!(tree.would_create_loop(ids[0], Some(ids[2])));
        assert!(!tree.would_create_loop(ids[2], Some(ids[0])));
        assert!(!tree.would_create_loop(ids[0], None));
    }

    #[test]
    fn test_remove_referenced_frame_rejected() {
        let mut tree = FrameTree::new();
        let ids = chain(&mut tree, 2);

        assert_eq!(
            tree.remove(ids[0]).unwrap_err(),
            FrameError::FrameInUse { frame: ids[0], children: 1 }
        );
        assert!(tree.remove(ids[1]).is_ok());
        assert!(tree.remove(ids[0]).is_ok());
        assert!(tree.is_empty());
        assert_eq!(tree.get(ids[0]).unwrap_err(), FrameError::UnknownFrame(ids[0]));
    }

    #[test]
    fn test_reused_slot_gets_new_generation() {
        let mut tree = FrameTree::new();
        let first = tree.insert(Frame::new()).unwrap();
        tree.remove(first).unwrap();
        let second = tree
            .insert(Frame::from_position_orientation(DVec3::X, Default::default()))
            .unwrap();

        assert_eq!(second.index(), first.index());
        assert_eq!(second.generation(), first.generation() + 1);
        assert_ne!(first, second);
        assert!(!tree.contains(first));
        assert_eq!(tree.get(first).unwrap_err(), FrameError::UnknownFrame(first));
        assert_eq!(tree.get(second).unwrap().translation(), DVec3::X);
        assert_eq!(tree.ids().collect::<Vec<_>>(), vec![second]);
    }

    #[test]
    fn test_churn_does_not_grow_slots() {
        let mut tree = FrameTree::new();
        let anchor = tree.insert(Frame::new()).unwrap();
        for _ in 0..1000 {
            let id = tree
                .insert(Frame::new().with_reference_frame(Some(anchor)))
                .unwrap();
            tree.remove(id).unwrap();
        }
        assert_eq!(tree.slots.len(), 2);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_exhausted_slot_is_retired() {
        let mut tree = FrameTree::new();
        let id = tree.insert(Frame::new()).unwrap();
        tree.slots[id.index()].generation = u32::MAX;
        let last = FrameId::new(id.index, u32::MAX);
        tree.remove(last).unwrap();

        let next = tree.insert(Frame::new()).unwrap();
        assert_ne!(next.index(), last.index());
        assert!(!tree.contains(last));
    }

    #[test]
    fn test_capacity_reached() {
        let mut tree = FrameTree::with_config(FrameTreeConfig {
            max_frames: 2,
            ..Default::default()
        });
        tree.insert(Frame::new()).unwrap();
        tree.insert(Frame::new()).unwrap();
        assert_eq!(tree.insert(Frame::new()), Err(FrameError::CapacityReached(2)));
    }

    #[test]
    fn test_max_depth() {
        let mut tree = FrameTree::with_config(FrameTreeConfig {
            max_depth: Some(2),
            ..Default::default()
        });
        let ids = chain(&mut tree, 3);
        let result = tree.insert(Frame::new().with_reference_frame(Some(ids[2])));
        assert_eq!(result, Err(FrameError::DepthExceeded { depth: 3, max: 2 }));
    }
}
