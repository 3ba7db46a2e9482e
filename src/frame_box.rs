// Single-slot, latest-wins hand-off between the frame producer and the
// present loop. A put never blocks and never queues: an unconsumed frame is
// simply replaced.

use std::sync::{Arc, Mutex, PoisonError};

use crate::types::Frame;

/// Cheap to clone; every clone points at the same slot.
#[derive(Clone, Default)]
pub struct FrameBox {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl FrameBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, discarding any pending one.
    pub fn put(&self, frame: Frame) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.replace(frame).is_some() {
            log::trace!("frame box: replaced an unconsumed frame");
        }
    }

    /// Take the pending frame (if any) and leave the slot empty.
    pub fn take_and_clear(&self) -> Option<Frame> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_yields_nothing() {
        let b = FrameBox::new();
        assert!(b.take_and_clear().is_none());
        assert!(b.is_empty());
    }

    #[test]
    fn second_put_wins() {
        let b = FrameBox::new();
        b.put(Frame::solid(1, 1, [1, 1, 1]));
        b.put(Frame::solid(1, 1, [2, 2, 2]));
        assert_eq!(b.take_and_clear().unwrap().data, vec![2, 2, 2]);
        assert!(b.take_and_clear().is_none());
    }

    #[test]
    fn clones_share_the_slot() {
        let producer = FrameBox::new();
        let consumer = producer.clone();
        producer.put(Frame::solid(2, 1, [9, 9, 9]));
        assert!(!consumer.is_empty());
        assert_eq!(consumer.take_and_clear().unwrap().width, 2);
        assert!(producer.is_empty());
    }

    #[test]
    fn put_from_another_thread() {
        let b = FrameBox::new();
        let tx = b.clone();
        std::thread::spawn(move || tx.put(Frame::solid(3, 3, [0, 0, 0])))
            .join()
            .unwrap();
        assert_eq!(b.take_and_clear().unwrap().height, 3);
    }
}
