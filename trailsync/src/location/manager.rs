//! Location update manager.
//!
//! Owns the tracking lifecycle, the accuracy/distance filters, and the
//! pending queue with ordered, retryable delivery to a [`LocationSink`].
//!
//! # Lifecycle
//!
//! ```text
//! Inactive --[start_tracking: permission + initial fix + subscribe]--> Active
//! Active   --[stop_tracking: cancel subscription]--------------------> Inactive
//! ```
//!
//! Queue draining (`Idle`/`Flushing`) is orthogonal to tracking: samples
//! left in the queue after `stop_tracking` are delivered by the next flush.
//!
//! # Concurrency
//!
//! Session state sits behind a `parking_lot::Mutex` that is only taken in
//! short synchronous sections, never across an `.await`. The only
//! suspension points are calls into the position source and the sink.
//! Subscription callbacks spawn delivery as detached tasks so the source is
//! never blocked by the network.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;

use super::policy::TrackingPolicy;
use super::queue::{EntryId, PendingQueue, QueuedSample};
use super::sample::{LocationUpdate, PositionSample};
use super::sink::{DeliveryError, LocationSink};
use super::source::{
    AccuracyHint, PositionSource, SampleCallback, SubscriptionHandle, SubscriptionOptions,
};
use super::stats::{DeliveryStats, DeliveryStatsSnapshot};

/// Drain state of the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushState {
    /// No flush loop is running.
    #[default]
    Idle,
    /// A flush loop is draining the queue.
    Flushing,
}

/// Mutable state of the tracking session.
#[derive(Debug, Default)]
struct TrackingSession {
    /// Live subscription; tracking is active iff this is set.
    subscription: Option<SubscriptionHandle>,
    last_accepted: Option<PositionSample>,
    pending: PendingQueue,
    flush: FlushState,
}

struct ManagerInner {
    source: Arc<dyn PositionSource>,
    sink: Arc<dyn LocationSink>,
    policy: TrackingPolicy,
    session: Mutex<TrackingSession>,
    /// Serializes start/stop so racing starts subscribe once.
    lifecycle: tokio::sync::Mutex<()>,
    stats: DeliveryStats,
}

/// Resets the flush state on every exit from the flush loop, including the
/// flush future being dropped mid-delivery.
struct FlushGuard<'a> {
    session: &'a Mutex<TrackingSession>,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().flush = FlushState::Idle;
    }
}

/// Tracking manager handle.
///
/// Cloning is cheap and every clone shares the same session, so the
/// composition root builds one manager and hands clones to each consumer.
///
/// # Example
///
/// ```ignore
/// let manager = LocationUpdateManager::new(source, sink);
///
/// if manager.start_tracking().await {
///     // samples now flow source -> filters -> queue -> sink
/// }
///
/// // App returned to foreground: push the current fix ahead of the backlog
/// manager.force_send_current().await;
/// ```
#[derive(Clone)]
pub struct LocationUpdateManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for LocationUpdateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationUpdateManager")
            .field("policy", &self.inner.policy)
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl LocationUpdateManager {
    /// Create a manager with the reference tracking policy.
    pub fn new(source: Arc<dyn PositionSource>, sink: Arc<dyn LocationSink>) -> Self {
        Self::with_policy(source, sink, TrackingPolicy::default())
    }

    /// Create a manager with a custom tracking policy.
    pub fn with_policy(
        source: Arc<dyn PositionSource>,
        sink: Arc<dyn LocationSink>,
        policy: TrackingPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                source,
                sink,
                policy,
                session: Mutex::new(TrackingSession::default()),
                lifecycle: tokio::sync::Mutex::new(()),
                stats: DeliveryStats::new(),
            }),
        }
    }

    fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Request foreground permission, then background permission.
    ///
    /// A background denial is logged and does not fail the call. Returns
    /// whether foreground permission is granted.
    pub async fn request_permissions(&self) -> bool {
        if !self.inner.source.request_foreground_permission().await {
            tracing::info!("Foreground location permission denied");
            return false;
        }

        if !self.inner.source.request_background_permission().await {
            tracing::info!("Background location permission denied, tracking in foreground only");
        }

        true
    }

    /// Whether foreground permission is currently granted. Never prompts.
    pub async fn has_permission(&self) -> bool {
        self.inner.source.has_foreground_permission().await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start continuous tracking.
    ///
    /// Returns `true` if tracking is active on return. Calling this while
    /// already active returns `true` without touching the source. Any
    /// failure leaves the manager inactive.
    pub async fn start_tracking(&self) -> bool {
        let _lifecycle = self.inner.lifecycle.lock().await;

        if self.is_active() {
            return true;
        }

        if !self.has_permission().await && !self.request_permissions().await {
            tracing::warn!("Location permission not granted, tracking not started");
            return false;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "No async runtime available for location delivery");
                return false;
            }
        };

        let initial = match self
            .inner
            .source
            .get_current_position(AccuracyHint::High)
            .await
        {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to obtain initial position");
                return false;
            }
        };

        if self.accept(initial) {
            let manager = self.clone();
            runtime.spawn(async move { manager.flush_queue().await });
        }

        let options = SubscriptionOptions {
            min_distance_meters: self.inner.policy.min_distance_meters,
            min_interval: self.inner.policy.update_interval,
        };
        let callback = subscription_callback(Arc::downgrade(&self.inner), runtime);

        let handle = match self.inner.source.subscribe(options, callback) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to subscribe to position updates");
                return false;
            }
        };

        self.inner.session.lock().subscription = Some(handle);

        tracing::info!(
            min_distance_m = options.min_distance_meters,
            interval_ms = options.min_interval.as_millis() as u64,
            "Location tracking started"
        );
        true
    }

    /// Stop continuous tracking.
    ///
    /// The pending queue is kept and an in-flight flush runs to completion.
    pub async fn stop_tracking(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;

        let handle = self.inner.session.lock().subscription.take();
        if let Some(handle) = handle {
            handle.cancel();
            tracing::info!(
                pending = self.queue_size(),
                "Location tracking stopped"
            );
        }
    }

    // =========================================================================
    // Sample intake
    // =========================================================================

    /// Entry point for subscription samples: accuracy filter, then
    /// [`process_location`](Self::process_location).
    pub async fn handle_location_update(&self, sample: PositionSample) {
        if self.intake(sample) {
            self.flush_queue().await;
        }
    }

    /// Distance filter, enqueue, and flush.
    ///
    /// The first sample is always accepted. Later samples are accepted when
    /// at least the policy's minimum distance from the last accepted one.
    pub async fn process_location(&self, sample: PositionSample) {
        if self.accept(sample) {
            self.flush_queue().await;
        }
    }

    /// Deliver `sample` ahead of everything already queued.
    ///
    /// Bypasses the distance filter and makes `sample` the new reference
    /// for it. Used when the app returns to foreground.
    pub async fn send_location_now(&self, sample: PositionSample) {
        let queued = {
            let mut session = self.inner.session.lock();
            session.last_accepted = Some(sample);
            session.pending.push_front(sample);
            session.pending.len()
        };
        self.inner.stats.sample_accepted();

        tracing::debug!(
            lat = sample.latitude,
            lon = sample.longitude,
            queued,
            "Force-sending location"
        );

        self.flush_queue().await;
    }

    /// Fetch the current position and force-send it.
    ///
    /// Returns false when no position could be obtained.
    pub async fn force_send_current(&self) -> bool {
        match self.get_current_location().await {
            Some(sample) => {
                self.send_location_now(sample).await;
                true
            }
            None => false,
        }
    }

    /// One-shot position fix. Does not prompt for permission or touch the
    /// queue; any failure yields `None`.
    pub async fn get_current_location(&self) -> Option<PositionSample> {
        if !self.has_permission().await {
            tracing::debug!("Location permission not granted, no current position");
            return None;
        }

        match self
            .inner
            .source
            .get_current_position(AccuracyHint::Balanced)
            .await
        {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get current position");
                None
            }
        }
    }

    /// Accuracy filter, then [`accept`](Self::accept).
    ///
    /// Synchronous so a subscription callback can enqueue in emission order.
    fn intake(&self, sample: PositionSample) -> bool {
        let threshold = self.inner.policy.accuracy_threshold_meters;
        if sample.is_less_accurate_than(threshold) {
            self.inner.stats.rejected_by_accuracy();
            tracing::debug!(
                accuracy_m = sample.accuracy_meters,
                threshold_m = threshold,
                "Discarding inaccurate position sample"
            );
            return false;
        }

        self.accept(sample)
    }

    /// Apply the distance filter and enqueue on acceptance.
    fn accept(&self, sample: PositionSample) -> bool {
        let mut session = self.inner.session.lock();

        if let Some(last) = session.last_accepted {
            let distance = last.distance_to(&sample);
            if distance < self.inner.policy.min_distance_meters {
                self.inner.stats.rejected_by_distance();
                tracing::trace!(
                    distance_m = format!("{:.1}", distance),
                    "Position sample within minimum distance, skipped"
                );
                return false;
            }
        }

        session.pending.push_back(sample);
        session.last_accepted = Some(sample);
        self.inner.stats.sample_accepted();

        tracing::debug!(
            lat = sample.latitude,
            lon = sample.longitude,
            queued = session.pending.len(),
            "Position sample accepted"
        );
        true
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Drain the pending queue in order.
    ///
    /// Returns immediately if another flush is running; that loop picks up
    /// anything queued meanwhile. Stops at the first transient failure.
    async fn flush_queue(&self) {
        if !self.begin_flush() {
            return;
        }
        let _guard = FlushGuard {
            session: &self.inner.session,
        };

        while let Some(head) = self.head() {
            let update = LocationUpdate::from(&head.sample);

            match self.inner.sink.send_location_update(&update).await {
                Ok(()) => self.complete(head),
                Err(e) if e.is_permanent() => self.discard(head.id, &e),
                Err(e) => {
                    self.halt(&e);
                    break;
                }
            }
        }
    }

    fn begin_flush(&self) -> bool {
        let mut session = self.inner.session.lock();
        if session.flush == FlushState::Flushing {
            return false;
        }
        session.flush = FlushState::Flushing;
        true
    }

    fn head(&self) -> Option<QueuedSample> {
        self.inner.session.lock().pending.front()
    }

    fn complete(&self, entry: QueuedSample) {
        let remaining = {
            let mut session = self.inner.session.lock();
            session.pending.remove(entry.id);
            session.last_accepted = Some(entry.sample);
            session.pending.len()
        };
        self.inner.stats.update_delivered();
        tracing::debug!(remaining, "Location update delivered");
    }

    fn discard(&self, id: EntryId, error: &DeliveryError) {
        let remaining = {
            let mut session = self.inner.session.lock();
            session.pending.remove(id);
            session.pending.len()
        };
        self.inner.stats.update_discarded();
        tracing::warn!(
            error = %error,
            remaining,
            "Location update rejected permanently, discarding"
        );
    }

    fn halt(&self, error: &DeliveryError) {
        let (trimmed, remaining) = {
            let mut session = self.inner.session.lock();
            let trimmed = session
                .pending
                .trim_overflow(self.inner.policy.queue_soft_cap, self.inner.policy.queue_trim_to);
            (trimmed, session.pending.len())
        };
        self.inner.stats.transient_failure();
        if trimmed > 0 {
            self.inner.stats.entries_trimmed(trimmed);
        }
        tracing::warn!(
            error = %error,
            remaining,
            trimmed,
            "Location delivery failed, will retry on next update"
        );
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Whether a subscription is live.
    pub fn is_active(&self) -> bool {
        self.inner.session.lock().subscription.is_some()
    }

    /// Number of samples awaiting delivery.
    pub fn queue_size(&self) -> usize {
        self.inner.session.lock().pending.len()
    }

    /// Queued samples in delivery order.
    pub fn pending_samples(&self) -> Vec<PositionSample> {
        self.inner.session.lock().pending.samples()
    }

    /// Reference sample for the distance filter.
    pub fn last_accepted(&self) -> Option<PositionSample> {
        self.inner.session.lock().last_accepted
    }

    /// Current drain state.
    pub fn flush_state(&self) -> FlushState {
        self.inner.session.lock().flush
    }

    /// Delivery counters.
    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Filter and queue settings in effect.
    pub fn policy(&self) -> &TrackingPolicy {
        &self.inner.policy
    }
}

/// Build the subscription callback.
///
/// Filtering and enqueueing happen on the caller's thread, so the queue
/// follows emission order; only the flush is spawned. Holds only a weak
/// reference so the source keeping the callback never keeps the manager
/// alive.
fn subscription_callback(inner: Weak<ManagerInner>, runtime: Handle) -> SampleCallback {
    Arc::new(move |sample: PositionSample| {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let manager = LocationUpdateManager::from_inner(inner);
        if manager.intake(sample) {
            runtime.spawn(async move {
                manager.flush_queue().await;
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{MockSink, MockSource};
    use super::*;
    use std::time::Duration;

    const A: (f64, f64) = (40.0, -75.0);
    const B: (f64, f64) = (40.01, -75.0);
    const C: (f64, f64) = (40.02, -75.0);
    const X: (f64, f64) = (41.0, -75.0);

    fn at(coords: (f64, f64)) -> PositionSample {
        PositionSample::new(coords.0, coords.1)
    }

    fn manager_with(source: &Arc<MockSource>, sink: &Arc<MockSink>) -> LocationUpdateManager {
        LocationUpdateManager::new(source.clone(), sink.clone())
    }

    /// Let detached delivery tasks run.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // -------------------------------------------------------------------------
    // Filtering
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_first_sample_always_accepted() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Status { code: 503 }));
        let manager = manager_with(&source, &sink);

        manager.process_location(at((-33.86, 151.21))).await;

        assert_eq!(manager.queue_size(), 1);
        assert_eq!(manager.last_accepted(), Some(at((-33.86, 151.21))));
    }

    #[tokio::test]
    async fn test_worked_distance_example() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Transport("offline".into())));
        let manager = manager_with(&source, &sink);

        manager.process_location(at((40.0000, -75.0))).await;
        // ~22.2 m from the first sample
        manager.process_location(at((40.0002, -75.0))).await;
        assert_eq!(manager.queue_size(), 1);
        assert_eq!(manager.last_accepted(), Some(at((40.0000, -75.0))));

        // ~44.4 m from the still-current reference
        manager.process_location(at((40.0004, -75.0))).await;
        assert_eq!(manager.queue_size(), 2);
        assert_eq!(manager.stats().rejected_distance, 1);
    }

    #[tokio::test]
    async fn test_accuracy_filter_drops_before_distance() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Status { code: 500 }));
        let manager = manager_with(&source, &sink);

        manager
            .handle_location_update(PositionSample::with_accuracy(10.0, 10.0, 250.0))
            .await;
        assert_eq!(manager.queue_size(), 0);
        assert_eq!(manager.last_accepted(), None);
        assert_eq!(manager.stats().rejected_accuracy, 1);
        assert!(sink.calls().is_empty());

        manager
            .handle_location_update(PositionSample::with_accuracy(10.0, 10.0, 20.0))
            .await;
        assert_eq!(manager.queue_size(), 1);
    }

    #[tokio::test]
    async fn test_missing_accuracy_passes_filter() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        manager.handle_location_update(at(A)).await;

        assert_eq!(sink.calls().len(), 1);
    }

    // -------------------------------------------------------------------------
    // Delivery
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_fifo_delivery() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        manager.process_location(at(A)).await;
        manager.process_location(at(B)).await;
        manager.process_location(at(C)).await;

        assert_eq!(sink.latitudes(), vec![A.0, B.0, C.0]);
        assert_eq!(manager.queue_size(), 0);
        assert_eq!(manager.stats().delivered, 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_skips_sample() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Transport("down".into())));
        let manager = manager_with(&source, &sink);

        // Build [A, B] while the sink is down
        manager.process_location(at(A)).await;
        manager.process_location(at(B)).await;
        assert_eq!(manager.pending_samples(), vec![at(A), at(B)]);
        sink.clear_calls();

        sink.script(vec![Err(DeliveryError::Status { code: 404 }), Ok(())]);
        manager.flush_queue().await;

        assert_eq!(sink.latitudes(), vec![A.0, B.0]);
        assert_eq!(manager.queue_size(), 0);
        assert_eq!(manager.stats().discarded, 1);
        assert_eq!(manager.last_accepted(), Some(at(B)));
    }

    #[tokio::test]
    async fn test_transient_failure_halts_flush() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Status { code: 500 }));
        let manager = manager_with(&source, &sink);

        manager.process_location(at(A)).await;
        manager.process_location(at(B)).await;
        sink.clear_calls();

        manager.flush_queue().await;

        assert_eq!(sink.latitudes(), vec![A.0], "B must not be attempted");
        assert_eq!(manager.pending_samples(), vec![at(A), at(B)]);
        assert_eq!(manager.flush_state(), FlushState::Idle);
    }

    #[tokio::test]
    async fn test_queue_resumes_after_recovery() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Status { code: 502 }));
        let manager = manager_with(&source, &sink);

        manager.process_location(at(A)).await;
        manager.process_location(at(B)).await;
        assert_eq!(manager.queue_size(), 2);

        sink.set_default(Ok(()));
        manager.process_location(at(C)).await;

        assert_eq!(manager.queue_size(), 0);
        assert_eq!(&sink.latitudes()[sink.calls().len() - 3..], &[A.0, B.0, C.0]);
    }

    #[tokio::test]
    async fn test_overflow_trims_to_newest_five() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Status { code: 503 }));
        let manager = manager_with(&source, &sink);

        for i in 0..10 {
            manager
                .process_location(at((40.0 + i as f64 * 0.01, -75.0)))
                .await;
        }
        assert_eq!(manager.queue_size(), 10, "at the cap nothing is trimmed");

        manager.process_location(at((40.10, -75.0))).await;

        let kept: Vec<f64> = manager
            .pending_samples()
            .iter()
            .map(|s| (s.latitude * 100.0).round() / 100.0)
            .collect();
        assert_eq!(kept, vec![40.06, 40.07, 40.08, 40.09, 40.10]);
        assert_eq!(manager.stats().trimmed, 6);
    }

    #[tokio::test]
    async fn test_reentrant_flush_is_single_loop() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::gated());
        let manager = manager_with(&source, &sink);

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.process_location(at(A)).await })
        };
        while sink.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(manager.flush_state(), FlushState::Flushing);

        // Returns as soon as B is queued; the running loop owns delivery
        manager.process_location(at(B)).await;
        assert_eq!(manager.queue_size(), 2);
        assert_eq!(sink.calls().len(), 1);

        sink.release(2);
        first.await.unwrap();

        assert_eq!(sink.latitudes(), vec![A.0, B.0]);
        assert_eq!(sink.max_in_flight(), 1);
        assert_eq!(manager.queue_size(), 0);
        assert_eq!(manager.flush_state(), FlushState::Idle);
    }

    #[tokio::test]
    async fn test_dropped_flush_resets_state() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::gated());
        let manager = manager_with(&source, &sink);

        let task = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.process_location(at(A)).await })
        };
        while sink.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;

        assert_eq!(manager.flush_state(), FlushState::Idle);
        assert_eq!(manager.queue_size(), 1, "undelivered sample stays queued");
    }

    // -------------------------------------------------------------------------
    // Force send
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_send_location_now_takes_head_of_line() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Status { code: 500 }));
        let manager = manager_with(&source, &sink);

        manager.process_location(at(A)).await;
        manager.process_location(at(B)).await;
        sink.clear_calls();

        manager.send_location_now(at(X)).await;

        assert_eq!(manager.pending_samples(), vec![at(X), at(A), at(B)]);
        assert_eq!(manager.last_accepted(), Some(at(X)));
        assert_eq!(sink.latitudes(), vec![X.0], "X is attempted first");
    }

    #[tokio::test]
    async fn test_send_location_now_bypasses_distance_filter() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        manager.process_location(at(A)).await;
        manager.send_location_now(at((40.00001, -75.0))).await;

        assert_eq!(sink.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_force_send_current_uses_source_fix() {
        let source = Arc::new(MockSource::granted(at(X)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(manager.force_send_current().await);
        assert_eq!(sink.latitudes(), vec![X.0]);
    }

    #[tokio::test]
    async fn test_force_send_current_without_permission() {
        let source = Arc::new(MockSource::denied());
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(!manager.force_send_current().await);
        assert!(sink.calls().is_empty());
        assert_eq!(source.foreground_requests(), 0, "must not prompt");
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_tracking_is_idempotent() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(manager.start_tracking().await);
        assert!(manager.start_tracking().await);

        assert!(manager.is_active());
        assert_eq!(source.permission_checks(), 1);
        assert_eq!(source.position_requests(), 1);
        assert_eq!(source.subscriptions(), 1);

        settle().await;
        assert_eq!(sink.latitudes(), vec![A.0], "initial fix is delivered");
    }

    #[tokio::test]
    async fn test_start_requests_permission_when_missing() {
        let source = Arc::new(MockSource::prompt_grants(at(A)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(manager.start_tracking().await);
        assert_eq!(source.foreground_requests(), 1);
        assert_eq!(source.background_requests(), 1);
    }

    #[tokio::test]
    async fn test_start_fails_without_permission() {
        let source = Arc::new(MockSource::denied());
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(!manager.start_tracking().await);
        assert!(!manager.is_active());
        assert_eq!(source.background_requests(), 0);
        assert_eq!(source.position_requests(), 0);
    }

    #[tokio::test]
    async fn test_background_denial_does_not_fail_permissions() {
        let source = Arc::new(MockSource::prompt_grants(at(A)));
        source.set_background_grant(false);
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(manager.request_permissions().await);
        assert_eq!(manager.queue_size(), 0);
    }

    #[tokio::test]
    async fn test_start_fails_when_fix_fails() {
        let source = Arc::new(MockSource::granted(at(A)));
        source.fail_position();
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(!manager.start_tracking().await);
        assert!(!manager.is_active());
        assert_eq!(source.subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_start_fails_when_subscribe_fails() {
        let source = Arc::new(MockSource::granted(at(A)));
        source.fail_subscribe();
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(!manager.start_tracking().await);
        assert!(!manager.is_active());
    }

    #[tokio::test]
    async fn test_subscription_samples_flow_to_sink() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(manager.start_tracking().await);
        settle().await;

        let options = source.last_options().unwrap();
        assert_eq!(options.min_distance_meters, 30.0);
        assert_eq!(options.min_interval, Duration::from_millis(30_000));

        source.emit(at(B));
        source.emit(PositionSample::with_accuracy(C.0, C.1, 500.0));
        settle().await;

        assert_eq!(sink.latitudes(), vec![A.0, B.0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_callback_burst_queues_in_emission_order() {
        let source = Arc::new(MockSource::granted(at((0.0, 0.0))));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Status { code: 503 }));
        let policy = TrackingPolicy {
            queue_soft_cap: 10_000,
            ..TrackingPolicy::default()
        };
        let manager = LocationUpdateManager::with_policy(source.clone(), sink.clone(), policy);
        assert!(manager.start_tracking().await);

        // 0.001 deg of latitude is ~111 m, so every sample passes the filter
        let mut latitude = 0.0;
        for _ in 0..50 {
            for _ in 0..20 {
                latitude += 0.001;
                source.emit(at((latitude, 0.0)));
            }
            tokio::task::yield_now().await;
        }
        settle().await;

        let queued: Vec<f64> = manager
            .pending_samples()
            .iter()
            .map(|s| s.latitude)
            .collect();
        assert_eq!(queued.len(), 1001);
        let out_of_order = queued.windows(2).filter(|w| w[0] >= w[1]).count();
        assert_eq!(out_of_order, 0, "queue order differs from emission order");
    }

    #[tokio::test]
    async fn test_stop_tracking_cancels_and_keeps_queue() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::failing_with(DeliveryError::Status { code: 500 }));
        let manager = manager_with(&source, &sink);

        assert!(manager.start_tracking().await);
        settle().await;
        assert_eq!(manager.queue_size(), 1);

        manager.stop_tracking().await;
        assert!(!manager.is_active());
        assert!(source.subscription_cancelled());
        assert_eq!(manager.queue_size(), 1);

        // Second stop is a no-op
        manager.stop_tracking().await;
        assert!(!manager.is_active());
    }

    #[tokio::test]
    async fn test_restart_after_stop_subscribes_again() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert!(manager.start_tracking().await);
        manager.stop_tracking().await;
        assert!(manager.start_tracking().await);

        assert_eq!(source.subscriptions(), 2);
    }

    #[tokio::test]
    async fn test_callback_after_manager_dropped_is_ignored() {
        let source = Arc::new(MockSource::granted(at(A)));
        let sink = Arc::new(MockSink::succeeding());
        {
            let manager = manager_with(&source, &sink);
            assert!(manager.start_tracking().await);
            settle().await;
        }
        sink.clear_calls();

        source.emit(at(B));
        settle().await;

        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_current_location() {
        let source = Arc::new(MockSource::granted(at(X)));
        let sink = Arc::new(MockSink::succeeding());
        let manager = manager_with(&source, &sink);

        assert_eq!(manager.get_current_location().await, Some(at(X)));
        assert_eq!(manager.queue_size(), 0);
        assert_eq!(manager.last_accepted(), None);

        source.fail_position();
        assert_eq!(manager.get_current_location().await, None);
    }

    mod property_tests {
        use super::*;
        use crate::geo::distance_meters;
        use crate::location::MIN_DISTANCE_METERS;
        use proptest::prelude::*;

        fn run<F: std::future::Future>(future: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(future)
        }

        proptest! {
            #[test]
            fn test_accepted_samples_respect_min_distance(
                steps in proptest::collection::vec((-0.001..0.001_f64, -0.001..0.001_f64), 1..40)
            ) {
                let delivered = run(async {
                    let source = Arc::new(MockSource::granted(at(A)));
                    let sink = Arc::new(MockSink::succeeding());
                    let manager = manager_with(&source, &sink);

                    let mut position = A;
                    for (dlat, dlon) in &steps {
                        position = (position.0 + dlat, position.1 + dlon);
                        manager.process_location(at(position)).await;
                    }

                    let stats = manager.stats();
                    assert_eq!(stats.accepted + stats.rejected_distance, steps.len() as u64);
                    sink.calls()
                });

                prop_assert!(!delivered.is_empty(), "first sample must be accepted");
                for pair in delivered.windows(2) {
                    let d = distance_meters(
                        (pair[0].latitude, pair[0].longitude),
                        (pair[1].latitude, pair[1].longitude),
                    );
                    prop_assert!(d >= MIN_DISTANCE_METERS, "accepted samples {}m apart", d);
                }
            }
        }
    }
}
