use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::config::MonitorConfiguration;
use crate::models::error::MonitorError;
use crate::models::reading::LoudnessReading;
use crate::models::session_info::SessionInfo;
use crate::models::state::MonitorState;
use crate::processing::loudness::LoudnessEstimator;
use crate::session::capture_session::{CaptureSession, SamplerOwner, SamplingTimer, TickOutcome};
use crate::session::reading_slot::ReadingSlot;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::monitor_delegate::MonitorDelegate;
use crate::traits::sample_stream::SampleStream;

/// Mutable state shared with the sampler thread, protected by `parking_lot::Mutex`.
struct SharedState<S: SampleStream> {
    state: MonitorState,
    session: Option<CaptureSession<S>>,
}

impl<S: SampleStream> SharedState<S> {
    /// Close the open session and go idle without releasing the lock.
    ///
    /// Only safe on the session's own sampler thread, where closing skips the join.
    fn close_session(&mut self, slot: &ReadingSlot) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };
        session.close();
        self.state = MonitorState::Idle;
        slot.reset();
        true
    }
}

/// Live loudness monitor.
///
/// Acquires and releases the microphone in lockstep with the activation
/// signal and drives periodic sampling while active:
/// ```text
/// set_activation(true)  → [CaptureProvider] → SampleStream
/// every period          → read_frame → LoudnessEstimator → ReadingSlot
/// set_activation(false) → close stream, reading back to IDLE
/// ```
///
/// All methods take `&self`; share it behind an `Arc`. Dropping the monitor
/// deactivates it. At most one stream is open at a time: the monitor reports
/// `Idle` only once the previous stream has been closed.
pub struct MonitorSession<P: CaptureProvider> {
    provider: P,
    config: MonitorConfiguration,
    estimator: LoudnessEstimator,
    shared: Arc<Mutex<SharedState<P::Stream>>>,
    slot: ReadingSlot,
    delegate: Option<Arc<dyn MonitorDelegate>>,
    owner: SamplerOwner,

    // Serializes activate/deactivate so a slow permission prompt cannot race a stop.
    lifecycle: Mutex<()>,
}

impl<P: CaptureProvider> MonitorSession<P> {
    /// Validate `config` and build an idle monitor.
    pub fn new(provider: P, config: MonitorConfiguration) -> Result<Self, MonitorError> {
        config.validate().map_err(MonitorError::ConfigurationFailed)?;
        let bands = config.tier_bands().map_err(MonitorError::ConfigurationFailed)?;
        let estimator = LoudnessEstimator::new(config.calibration, bands);
        Ok(Self::build(provider, config, estimator))
    }

    pub fn with_defaults(provider: P) -> Self {
        let config = MonitorConfiguration::default();
        Self::build(provider, config, LoudnessEstimator::default())
    }

    fn build(provider: P, config: MonitorConfiguration, estimator: LoudnessEstimator) -> Self {
        Self {
            provider,
            config,
            estimator,
            shared: Arc::new(Mutex::new(SharedState {
                state: MonitorState::Idle,
                session: None,
            })),
            slot: ReadingSlot::new(),
            delegate: None,
            owner: SamplerOwner::next(),
            lifecycle: Mutex::new(()),
        }
    }

    /// Register the delegate. Takes effect from the next activation.
    pub fn set_delegate(&mut self, delegate: Arc<dyn MonitorDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &MonitorConfiguration {
        &self.config
    }

    pub fn estimator(&self) -> &LoudnessEstimator {
        &self.estimator
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn state(&self) -> MonitorState {
        self.shared.lock().state.clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.lock().state.is_capturing()
    }

    /// Latest published reading; `LoudnessReading::IDLE` while not capturing.
    pub fn current_reading(&self) -> LoudnessReading {
        self.slot.reading()
    }

    /// Ticks published by the current session.
    pub fn readings_published(&self) -> u64 {
        self.slot.sequence()
    }

    /// A cloneable handle to the published reading, for lock-free polling.
    pub fn reading_slot(&self) -> ReadingSlot {
        self.slot.clone()
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.shared.lock().session.as_ref().map(|s| s.info().clone())
    }

    /// Inbound activation signal. Only edges cause transitions.
    pub fn set_activation(&self, active: bool) -> Result<(), MonitorError> {
        if active {
            self.activate()
        } else {
            self.deactivate();
            Ok(())
        }
    }

    /// Flip activation, as bound to the monitor hotkey. Returns whether the
    /// monitor is now capturing.
    pub fn toggle(&self) -> Result<bool, MonitorError> {
        if self.is_capturing() {
            self.deactivate();
            Ok(false)
        } else {
            self.activate()?;
            Ok(true)
        }
    }

    /// Request the microphone and start sampling. Transitions: idle → capturing.
    ///
    /// A no-op while a session is already open. On failure the monitor stays
    /// idle, the delegate receives `on_error`, and the error is returned.
    pub fn activate(&self) -> Result<(), MonitorError> {
        if self.owner.is_current() {
            // The lifecycle lock may be held by a thread joining this sampler.
            return if self.is_capturing() {
                Ok(())
            } else {
                let reason = "cannot activate from this monitor's sampler callback";
                Err(MonitorError::Unknown(reason.into()))
            };
        }

        let _lifecycle = self.lifecycle.lock();

        if self.shared.lock().session.is_some() {
            log::debug!("Activation ignored: already capturing");
            return Ok(());
        }

        let window_size = self.config.window_size;
        let stream = match self.provider.request_capture(window_size) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Microphone request failed: {}", e);
                self.notify_error(&e);
                return Err(e);
            }
        };

        let period_ms = self.config.sample_period_ms;
        let info = SessionInfo::new(self.provider.device_info(), period_ms, window_size);
        let session_id = info.id;
        let state = MonitorState::Capturing {
            session_id,
            since: info.opened_at,
        };

        {
            let mut shared = self.shared.lock();
            let mut session = CaptureSession::open(info, stream);

            // The sampler blocks on `shared` until this block releases it.
            let tick = tick_fn(
                Arc::clone(&self.shared),
                self.slot.clone(),
                self.estimator.clone(),
                self.delegate.clone(),
                session_id,
            );
            let timer = SamplingTimer::spawn(self.owner, self.config.sample_period(), tick);
            match timer {
                Ok(timer) => session.attach_timer(timer),
                Err(e) => {
                    drop(shared);
                    session.close();
                    log::error!("Failed to start sampling: {}", e);
                    self.notify_error(&e);
                    return Err(e);
                }
            }

            self.slot.reset();
            shared.session = Some(session);
            shared.state = state.clone();
        }

        log::info!(
            "Capturing from '{}' (session {}, every {}ms, window {})",
            self.provider.device_info().name,
            session_id,
            period_ms,
            window_size
        );
        self.notify_state(&state);
        Ok(())
    }

    /// Stop sampling and release the microphone. Transitions: capturing → idle.
    ///
    /// Idempotent. When this returns, the stream is closed, no further tick
    /// fires for the closed session and the reading is back to
    /// `LoudnessReading::IDLE`.
    pub fn deactivate(&self) {
        if self.owner.is_current() {
            self.teardown_from_sampler();
            return;
        }
        let _lifecycle = self.lifecycle.lock();
        self.teardown();
    }

    fn teardown(&self) {
        let session = {
            let mut shared = self.shared.lock();
            let session = shared.session.take();
            if session.is_some() {
                shared.state = MonitorState::Idle;
                self.slot.reset();
            }
            session
        };

        // Closed outside `shared`: the join waits for a tick that may be blocked on it.
        // The lifecycle lock held by the caller keeps a new activation out until then.
        let Some(mut session) = session else {
            return;
        };
        session.close();
        log::info!("Microphone released");
        self.notify_state(&MonitorState::Idle);
    }

    /// Teardown requested from one of this monitor's own delegate callbacks.
    ///
    /// The lifecycle lock is not taken, so the stream is closed while `shared`
    /// is held; the timer skips joining its own thread.
    fn teardown_from_sampler(&self) {
        let closed = self.shared.lock().close_session(&self.slot);
        if closed {
            log::info!("Microphone released");
            self.notify_state(&MonitorState::Idle);
        }
    }

    fn notify_state(&self, state: &MonitorState) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(state);
        }
    }

    fn notify_error(&self, error: &MonitorError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }
}

impl<P: CaptureProvider> Drop for MonitorSession<P> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn tick_fn<S: SampleStream + 'static>(
    shared: Arc<Mutex<SharedState<S>>>,
    slot: ReadingSlot,
    estimator: LoudnessEstimator,
    delegate: Option<Arc<dyn MonitorDelegate>>,
    session_id: Uuid,
) -> impl FnMut() -> TickOutcome + Send + 'static {
    move || sample_tick(&shared, &slot, &estimator, delegate.as_deref(), session_id)
}

/// One sampling tick for `session_id`.
///
/// A tick that finds its session gone is a silent no-op that ends the loop.
fn sample_tick<S: SampleStream>(
    shared: &Mutex<SharedState<S>>,
    slot: &ReadingSlot,
    estimator: &LoudnessEstimator,
    delegate: Option<&dyn MonitorDelegate>,
    session_id: Uuid,
) -> TickOutcome {
    let mut guard = shared.lock();
    let result = match guard.session.as_mut() {
        Some(session) if session.id() == session_id => session.sample(estimator),
        _ => return TickOutcome::Stop,
    };

    match result {
        Ok((reading, sequence)) => {
            // Published under the lock so a concurrent teardown's reset always wins.
            slot.publish(reading, sequence);
            drop(guard);
            log::debug!(
                "Tick {}: {} ({})",
                sequence,
                reading.magnitude,
                reading.tier.label()
            );
            if let Some(delegate) = delegate {
                delegate.on_reading_updated(&reading);
            }
            TickOutcome::Continue
        }
        Err(MonitorError::DeviceLost) => {
            log::warn!("Capture device lost, closing session {}", session_id);
            // Idle is published only once the stream is closed.
            guard.close_session(slot);
            drop(guard);
            if let Some(delegate) = delegate {
                delegate.on_error(&MonitorError::DeviceLost);
                delegate.on_state_changed(&MonitorState::Idle);
            }
            TickOutcome::Stop
        }
        Err(e) => {
            drop(guard);
            log::warn!("Skipping tick: {}", e);
            TickOutcome::Continue
        }
    }
}
