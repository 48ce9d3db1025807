use image::RgbaImage;
use std::sync::{Arc, Mutex, PoisonError};

/// Publish point between the compositor and everything that displays its
/// output. The render loop is the single writer; any number of readers pull
/// the latest complete frame at their own pace. Publishing swaps an `Arc`,
/// so a reader never observes a partially drawn frame and a snapshot it
/// already holds is never mutated underneath it.
#[derive(Clone)]
pub struct SharedFrame {
    slot: Arc<Mutex<Arc<RgbaImage>>>,
}

impl SharedFrame {
    pub fn new(initial: RgbaImage) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Arc::new(initial))),
        }
    }

    /// Publish a finished frame, replacing whatever readers will see next.
    pub fn publish(&self, frame: RgbaImage) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(frame);
    }

    /// The most recently published frame.
    pub fn latest(&self) -> Arc<RgbaImage> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
