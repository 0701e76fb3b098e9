//! Scriptable position source and sink for manager tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::sample::{LocationUpdate, PositionSample};
use super::sink::{DeliveryError, LocationSink};
use super::source::{
    AccuracyHint, PositionSource, SampleCallback, SourceError, SubscriptionHandle,
    SubscriptionOptions,
};

/// Position source with switchable permissions and call counters.
pub struct MockSource {
    foreground_granted: AtomicBool,
    prompt_grants_foreground: AtomicBool,
    background_grant: AtomicBool,
    position: Mutex<Result<PositionSample, SourceError>>,
    subscribe_fails: AtomicBool,
    callback: Mutex<Option<SampleCallback>>,
    token: Mutex<Option<CancellationToken>>,
    options: Mutex<Option<SubscriptionOptions>>,
    permission_checks: AtomicUsize,
    foreground_requests: AtomicUsize,
    background_requests: AtomicUsize,
    position_requests: AtomicUsize,
    subscriptions: AtomicUsize,
}

impl MockSource {
    fn build(granted: bool, prompt_grants: bool, position: PositionSample) -> Self {
        Self {
            foreground_granted: AtomicBool::new(granted),
            prompt_grants_foreground: AtomicBool::new(prompt_grants),
            background_grant: AtomicBool::new(true),
            position: Mutex::new(Ok(position)),
            subscribe_fails: AtomicBool::new(false),
            callback: Mutex::new(None),
            token: Mutex::new(None),
            options: Mutex::new(None),
            permission_checks: AtomicUsize::new(0),
            foreground_requests: AtomicUsize::new(0),
            background_requests: AtomicUsize::new(0),
            position_requests: AtomicUsize::new(0),
            subscriptions: AtomicUsize::new(0),
        }
    }

    /// Permission already granted; fixes return `position`.
    pub fn granted(position: PositionSample) -> Self {
        Self::build(true, true, position)
    }

    /// Permission missing but granted when prompted.
    pub fn prompt_grants(position: PositionSample) -> Self {
        Self::build(false, true, position)
    }

    /// Permission missing and denied when prompted.
    pub fn denied() -> Self {
        Self::build(false, false, PositionSample::new(0.0, 0.0))
    }

    pub fn set_background_grant(&self, granted: bool) {
        self.background_grant.store(granted, Ordering::SeqCst);
    }

    pub fn fail_position(&self) {
        *self.position.lock() = Err(SourceError::Unavailable("mock".to_string()));
    }

    pub fn fail_subscribe(&self) {
        self.subscribe_fails.store(true, Ordering::SeqCst);
    }

    /// Invoke the subscription callback, as the platform would.
    pub fn emit(&self, sample: PositionSample) {
        let callback = self.callback.lock().clone();
        let cancelled = self
            .token
            .lock()
            .as_ref()
            .map_or(true, CancellationToken::is_cancelled);
        if let Some(callback) = callback {
            if !cancelled {
                callback(sample);
            }
        }
    }

    pub fn subscription_cancelled(&self) -> bool {
        self.token
            .lock()
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    pub fn last_options(&self) -> Option<SubscriptionOptions> {
        *self.options.lock()
    }

    pub fn permission_checks(&self) -> usize {
        self.permission_checks.load(Ordering::SeqCst)
    }

    pub fn foreground_requests(&self) -> usize {
        self.foreground_requests.load(Ordering::SeqCst)
    }

    pub fn background_requests(&self) -> usize {
        self.background_requests.load(Ordering::SeqCst)
    }

    pub fn position_requests(&self) -> usize {
        self.position_requests.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl PositionSource for MockSource {
    fn has_foreground_permission(&self) -> BoxFuture<'_, bool> {
        self.permission_checks.fetch_add(1, Ordering::SeqCst);
        let granted = self.foreground_granted.load(Ordering::SeqCst);
        async move { granted }.boxed()
    }

    fn request_foreground_permission(&self) -> BoxFuture<'_, bool> {
        self.foreground_requests.fetch_add(1, Ordering::SeqCst);
        if self.prompt_grants_foreground.load(Ordering::SeqCst) {
            self.foreground_granted.store(true, Ordering::SeqCst);
        }
        let granted = self.foreground_granted.load(Ordering::SeqCst);
        async move { granted }.boxed()
    }

    fn request_background_permission(&self) -> BoxFuture<'_, bool> {
        self.background_requests.fetch_add(1, Ordering::SeqCst);
        let granted = self.background_grant.load(Ordering::SeqCst);
        async move { granted }.boxed()
    }

    fn get_current_position(
        &self,
        _accuracy: AccuracyHint,
    ) -> BoxFuture<'_, Result<PositionSample, SourceError>> {
        self.position_requests.fetch_add(1, Ordering::SeqCst);
        let result = self.position.lock().clone();
        async move { result }.boxed()
    }

    fn subscribe(
        &self,
        options: SubscriptionOptions,
        on_sample: SampleCallback,
    ) -> Result<SubscriptionHandle, SourceError> {
        if self.subscribe_fails.load(Ordering::SeqCst) {
            return Err(SourceError::Subscription("mock".to_string()));
        }
        self.subscriptions.fetch_add(1, Ordering::SeqCst);

        let (handle, token) = SubscriptionHandle::new();
        *self.callback.lock() = Some(on_sample);
        *self.token.lock() = Some(token);
        *self.options.lock() = Some(options);
        Ok(handle)
    }
}

/// Sink that records every attempt and answers from a script.
pub struct MockSink {
    calls: Mutex<Vec<LocationUpdate>>,
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    default: Mutex<Result<(), DeliveryError>>,
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSink {
    fn build(default: Result<(), DeliveryError>, gate: Option<Semaphore>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            gate,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::build(Ok(()), None)
    }

    pub fn failing_with(error: DeliveryError) -> Self {
        Self::build(Err(error), None)
    }

    /// Succeeds, but every call waits for a permit from [`release`](Self::release).
    pub fn gated() -> Self {
        Self::build(Ok(()), Some(Semaphore::new(0)))
    }

    /// Queue responses consumed before the default applies.
    pub fn script(&self, responses: Vec<Result<(), DeliveryError>>) {
        self.script.lock().extend(responses);
    }

    pub fn set_default(&self, response: Result<(), DeliveryError>) {
        *self.default.lock() = response;
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> Vec<LocationUpdate> {
        self.calls.lock().clone()
    }

    pub fn latitudes(&self) -> Vec<f64> {
        self.calls.lock().iter().map(|u| u.latitude).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl LocationSink for MockSink {
    fn send_location_update<'a>(
        &'a self,
        update: &'a LocationUpdate,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        async move {
            self.calls.lock().push(*update);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let scripted = self.script.lock().pop_front();
            scripted.unwrap_or_else(|| self.default.lock().clone())
        }
        .boxed()
    }
}
