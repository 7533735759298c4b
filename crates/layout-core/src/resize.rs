//! Resize observation.
//!
//! A [`ResizeSource`] reports the content-box height of a rendered region
//! whenever it changes. Notifications arrive from the layout pipeline, not
//! synchronously with the change that caused them.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub u64);

/// Receives the observed region's height in pixels.
pub type ResizeCallback = Arc<dyn Fn(f32) + Send + Sync>;

pub trait ResizeSource {
    /// Start reporting height changes of `region` to `callback`.
    fn observe(&self, region: RegionId, callback: ResizeCallback) -> ObserverId;

    /// Stop reporting to `observer`. Unknown observers are ignored.
    fn disconnect(&self, observer: ObserverId);
}

impl<S: ResizeSource + ?Sized> ResizeSource for &S {
    fn observe(&self, region: RegionId, callback: ResizeCallback) -> ObserverId {
        (**self).observe(region, callback)
    }

    fn disconnect(&self, observer: ObserverId) {
        (**self).disconnect(observer)
    }
}

impl<S: ResizeSource + ?Sized> ResizeSource for Arc<S> {
    fn observe(&self, region: RegionId, callback: ResizeCallback) -> ObserverId {
        (**self).observe(region, callback)
    }

    fn disconnect(&self, observer: ObserverId) {
        (**self).disconnect(observer)
    }
}

#[derive(Default)]
struct QueueState {
    next_observer: u64,
    observers: BTreeMap<ObserverId, (RegionId, ResizeCallback)>,
    heights: HashMap<RegionId, f32>,
    pending: VecDeque<(ObserverId, f32)>,
}

/// Host-driven resize source.
///
/// The host records layout results with [`set_height`](Self::set_height) and
/// later calls [`flush`](Self::flush) to deliver them, the way a browser runs
/// resize observers after layout. Notifications queued for an observer that
/// disconnects before the flush are dropped.
#[derive(Default)]
pub struct QueuedResizeSource {
    state: Mutex<QueueState>,
}

impl QueuedResizeSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a new height for `region`. Observers are notified on the next
    /// flush, and only if the height actually changed.
    pub fn set_height(&self, region: RegionId, height_px: f32) {
        let mut state = self.lock();
        if state.heights.insert(region, height_px) == Some(height_px) {
            return;
        }

        let targets: Vec<ObserverId> = state
            .observers
            .iter()
            .filter(|(_, (observed, _))| *observed == region)
            .map(|(id, _)| *id)
            .collect();
        state.pending.extend(targets.into_iter().map(|id| (id, height_px)));
    }

    /// Deliver every queued notification. Returns how many were delivered.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let mut state = self.lock();
            let pending: Vec<_> = state.pending.drain(..).collect();
            let batch: Vec<(ResizeCallback, f32)> = pending
                .into_iter()
                .filter_map(|(id, height)| {
                    state.observers.get(&id).map(|(_, cb)| (Arc::clone(cb), height))
                })
                .collect();
            drop(state);

            if batch.is_empty() {
                return delivered;
            }

            // Callbacks run without the lock so they may touch the source.
            for (callback, height) in batch {
                callback(height);
                delivered += 1;
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }
}

impl ResizeSource for QueuedResizeSource {
    fn observe(&self, region: RegionId, callback: ResizeCallback) -> ObserverId {
        let mut state = self.lock();
        state.next_observer += 1;
        let id = ObserverId(state.next_observer);

        state.observers.insert(id, (region, callback));
        // A fresh observer always gets the current size once.
        if let Some(height) = state.heights.get(&region).copied() {
            state.pending.push_back((id, height));
        }
        id
    }

    fn disconnect(&self, observer: ObserverId) {
        let mut state = self.lock();
        state.observers.remove(&observer);
        state.pending.retain(|(id, _)| *id != observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, ResizeCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let callback: ResizeCallback = Arc::new(move |_height: f32| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn notifications_wait_for_flush() {
        let source = QueuedResizeSource::new();
        let (count, callback) = counter();
        source.observe(RegionId(1), callback);

        source.set_height(RegionId(1), 120.0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(source.pending_count(), 1);

        assert_eq!(source.flush(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unchanged_height_is_not_reported() {
        let source = QueuedResizeSource::new();
        let (count, callback) = counter();
        source.observe(RegionId(1), callback);

        source.set_height(RegionId(1), 120.0);
        source.set_height(RegionId(1), 120.0);
        source.flush();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn new_observer_receives_current_height() {
        let source = QueuedResizeSource::new();
        source.set_height(RegionId(7), 80.0);

        let (count, callback) = counter();
        source.observe(RegionId(7), callback);
        assert_eq!(source.flush(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn other_regions_are_not_reported() {
        let source = QueuedResizeSource::new();
        let (count, callback) = counter();
        source.observe(RegionId(1), callback);

        source.set_height(RegionId(2), 500.0);
        assert_eq!(source.flush(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disconnect_drops_pending_notifications() {
        let source = QueuedResizeSource::new();
        let (count, callback) = counter();
        let id = source.observe(RegionId(1), callback);

        source.set_height(RegionId(1), 300.0);
        source.disconnect(id);

        assert_eq!(source.flush(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(source.observer_count(), 0);
    }
}
