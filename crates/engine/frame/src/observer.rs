//! Modification observers
//!
//! Frames hold their observers weakly: an observer lives as long as whoever
//! created it keeps the `Rc` around, and a dropped observer is silently
//! skipped (and pruned) on the next notification.

use std::rc::{Rc, Weak};

/// Receives a notification after every committed modification of a frame.
///
/// Notification happens while the owning [`FrameTree`](crate::FrameTree) is
/// mutably borrowed, so an observer cannot mutate the tree that notifies it.
/// Observers needing to react with further edits should record the event
/// (e.g. in a `Cell`) and act once the current mutation has returned.
pub trait FrameObserver {
    fn on_frame_modified(&self);
}

/// Set of weak observer handles, deduplicated by allocation.
#[derive(Default)]
pub(crate) struct ObserverSet {
    observers: Vec<Weak<dyn FrameObserver>>,
}

impl ObserverSet {
    pub fn insert<O: FrameObserver + 'static>(&mut self, observer: &Rc<O>) {
        if self.position(Rc::as_ptr(observer) as *const ()).is_some() {
            return;
        }
        let weak = Rc::downgrade(observer);
        self.observers.push(weak);
    }

    pub fn remove<O: FrameObserver + 'static>(&mut self, observer: &Rc<O>) -> bool {
        match self.position(Rc::as_ptr(observer) as *const ()) {
            Some(index) => {
                self.observers.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    /// Number of observers that are still alive
    pub fn len(&self) -> usize {
        self.observers.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Notify every live observer once and drop the dead ones
    pub fn notify(&mut self) {
        self.observers.retain(|w| w.strong_count() > 0);
        tracing::trace!("Notifying {} frame observer(s)", self.observers.len());
        for observer in self.observers.iter().filter_map(Weak::upgrade) {
            observer.on_frame_modified();
        }
    }

    fn position(&self, ptr: *const ()) -> Option<usize> {
        self.observers
            .iter()
            .position(|w| Weak::as_ptr(w) as *const () == ptr)
    }
}
