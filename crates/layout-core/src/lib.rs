//! Layout measurements that drive collapse/expand affordances.
//!
//! [`OverflowDetector`] watches one rendered region and reports whether its
//! content has grown to a height budget, so the view can decide whether to
//! show a "show more" control.

pub mod resize;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use resize::{ObserverId, QueuedResizeSource, RegionId, ResizeCallback, ResizeSource};

/// Whether a measured height reaches the threshold.
///
/// The height is rounded to a whole pixel first so sub-pixel layout jitter
/// around the threshold does not flip the result back and forth.
pub fn exceeds_threshold(measured_px: f32, threshold_px: f32) -> bool {
    measured_px.round() >= threshold_px
}

/// Live overflow flag shared between a detector and its readers.
#[derive(Debug, Clone, Default)]
pub struct OverflowSignal {
    overflowing: Arc<AtomicBool>,
}

impl OverflowSignal {
    pub fn get(&self) -> bool {
        self.overflowing.load(Ordering::Acquire)
    }

    fn set(&self, overflowing: bool) {
        self.overflowing.store(overflowing, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Observation {
    region: RegionId,
    threshold_px: f32,
    observer: ObserverId,
}

/// Tracks at most one observed region at a time.
///
/// The signal starts `false` and follows resize notifications from then on.
/// Changing the region or threshold detaches the old observer before a new
/// one is attached; dropping the detector detaches as well.
pub struct OverflowDetector<S: ResizeSource> {
    source: S,
    signal: OverflowSignal,
    active: Option<Observation>,
}

impl<S: ResizeSource> OverflowDetector<S> {
    pub fn new(source: S) -> Self {
        Self { source, signal: OverflowSignal::default(), active: None }
    }

    /// Observe `region` against `threshold_px`.
    ///
    /// Calling again with the same region and threshold keeps the existing
    /// observer. A `None` region detaches and leaves the signal as it was.
    pub fn observe(&mut self, region: Option<RegionId>, threshold_px: f32) -> OverflowSignal {
        if let (Some(active), Some(region)) = (self.active, region) {
            if active.region == region && active.threshold_px == threshold_px {
                return self.signal.clone();
            }
        }

        self.detach();

        let Some(region) = region else {
            return self.signal.clone();
        };

        let signal = self.signal.clone();
        let callback: ResizeCallback = Arc::new(move |height_px: f32| {
            signal.set(exceeds_threshold(height_px, threshold_px));
        });
        let observer = self.source.observe(region, callback);
        tracing::trace!(?region, ?observer, threshold_px, "observing region height");

        self.active = Some(Observation { region, threshold_px, observer });
        self.signal.clone()
    }

    /// Stop observing. The signal keeps its last value.
    pub fn detach(&mut self) {
        if let Some(active) = self.active.take() {
            self.source.disconnect(active.observer);
            tracing::trace!(region = ?active.region, observer = ?active.observer, "detached");
        }
    }

    pub fn is_observing(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_overflowing(&self) -> bool {
        self.signal.get()
    }
}

impl<S: ResizeSource> Drop for OverflowDetector<S> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION: RegionId = RegionId(1);

    #[test]
    fn threshold_is_inclusive() {
        assert!(exceeds_threshold(300.0, 300.0));
        assert!(!exceeds_threshold(299.0, 300.0));
    }

    #[test]
    fn measurement_is_rounded_before_comparison() {
        assert!(exceeds_threshold(299.5, 300.0));
        assert!(!exceeds_threshold(299.4, 300.0));
        assert!(!exceeds_threshold(f32::NAN, 300.0));
    }

    #[test]
    fn signal_starts_false_until_first_measurement() {
        let source = QueuedResizeSource::new();
        source.set_height(REGION, 900.0);

        let mut detector = OverflowDetector::new(&source);
        let signal = detector.observe(Some(REGION), 300.0);
        assert!(!signal.get());

        source.flush();
        assert!(signal.get());
    }

    #[test]
    fn signal_follows_height_changes() {
        let source = QueuedResizeSource::new();
        let mut detector = OverflowDetector::new(&source);
        let signal = detector.observe(Some(REGION), 300.0);

        source.set_height(REGION, 300.0);
        source.flush();
        assert!(signal.get());

        source.set_height(REGION, 299.0);
        source.flush();
        assert!(!signal.get());
    }

    #[test]
    fn same_region_and_threshold_keeps_one_observer() {
        let source = QueuedResizeSource::new();
        let mut detector = OverflowDetector::new(&source);

        detector.observe(Some(REGION), 300.0);
        detector.observe(Some(REGION), 300.0);
        assert_eq!(source.observer_count(), 1);
    }

    #[test]
    fn threshold_change_replaces_observer() {
        let source = QueuedResizeSource::new();
        source.set_height(REGION, 250.0);

        let mut detector = OverflowDetector::new(&source);
        let signal = detector.observe(Some(REGION), 300.0);
        source.flush();
        assert!(!signal.get());

        detector.observe(Some(REGION), 200.0);
        assert_eq!(source.observer_count(), 1);
        source.flush();
        assert!(signal.get());
    }

    #[test]
    fn region_change_ignores_the_old_region() {
        let source = QueuedResizeSource::new();
        let other = RegionId(2);

        let mut detector = OverflowDetector::new(&source);
        let signal = detector.observe(Some(REGION), 300.0);
        detector.observe(Some(other), 300.0);

        source.set_height(REGION, 1000.0);
        source.flush();
        assert!(!signal.get());

        source.set_height(other, 400.0);
        source.flush();
        assert!(signal.get());
    }

    #[test]
    fn missing_region_observes_nothing() {
        let source = QueuedResizeSource::new();
        let mut detector = OverflowDetector::new(&source);

        let signal = detector.observe(None, 300.0);
        assert!(!detector.is_observing());
        assert_eq!(source.observer_count(), 0);
        assert!(!signal.get());
    }

    #[test]
    fn dropping_detector_disconnects_observer() {
        let source = QueuedResizeSource::new();
        {
            let mut detector = OverflowDetector::new(&source);
            detector.observe(Some(REGION), 300.0);
            assert_eq!(source.observer_count(), 1);
        }
        assert_eq!(source.observer_count(), 0);
    }

    #[test]
    fn signal_keeps_last_value_after_detach() {
        let source = Arc::new(QueuedResizeSource::new());
        let mut detector = OverflowDetector::new(Arc::clone(&source));
        let signal = detector.observe(Some(REGION), 100.0);

        source.set_height(REGION, 150.0);
        source.flush();
        detector.detach();

        source.set_height(REGION, 50.0);
        source.flush();
        assert!(signal.get());
        assert!(detector.is_overflowing());
    }
}
