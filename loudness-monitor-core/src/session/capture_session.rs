use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use crate::models::error::MonitorError;
use crate::models::reading::LoudnessReading;
use crate::models::session_info::SessionInfo;
use crate::processing::loudness::LoudnessEstimator;
use crate::traits::sample_stream::SampleStream;

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SAMPLER_OWNER: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Identifies the monitor a sampler thread belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SamplerOwner(u64);

impl SamplerOwner {
    pub(crate) fn next() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether the caller runs on a sampler thread spawned for this owner,
    /// e.g. inside one of its delegate callbacks.
    pub(crate) fn is_current(self) -> bool {
        SAMPLER_OWNER.with(Cell::get) == Some(self.0)
    }
}

/// What the sampler loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    Stop,
}

/// Wakes the sampler immediately on stop instead of letting it sleep out the period.
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    /// Block until `deadline` or until stopped. Returns true if stopped.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.condvar.wait_until(&mut stopped, deadline).timed_out() {
                return *stopped;
            }
        }
        true
    }
}

/// Periodic sampling timer running on a dedicated thread.
///
/// Ticks are strictly sequential and follow a fixed deadline schedule. Once
/// [`SamplingTimer::stop`] returns, no further tick fires.
pub(crate) struct SamplingTimer {
    signal: Arc<StopSignal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SamplingTimer {
    pub(crate) fn spawn<F>(
        owner: SamplerOwner,
        period: Duration,
        mut tick: F,
    ) -> Result<Self, MonitorError>
    where
        F: FnMut() -> TickOutcome + Send + 'static,
    {
        let signal = Arc::new(StopSignal::new());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name("loudness-sampler".into())
            .spawn(move || {
                SAMPLER_OWNER.with(|flag| flag.set(Some(owner.0)));
                let mut deadline = Instant::now() + period;
                loop {
                    if thread_signal.wait_until(deadline) {
                        break;
                    }
                    if tick() == TickOutcome::Stop {
                        break;
                    }
                    deadline += period;
                    let now = Instant::now();
                    if deadline <= now {
                        // Fell behind; skip missed ticks rather than bursting.
                        deadline = now + period;
                    }
                }
            })
            .map_err(|e| {
                MonitorError::Unknown(format!("failed to spawn sampler thread: {}", e))
            })?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Cancel the timer and wait for an in-flight tick to finish.
    ///
    /// On the timer's own thread the join is skipped; the loop exits as soon
    /// as the current tick returns.
    pub(crate) fn stop(&mut self) {
        self.signal.stop();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("Sampler thread panicked");
        }
    }
}

impl Drop for SamplingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One open microphone acquisition.
///
/// Owns the stream and its sampling timer. Closing stops the timer first,
/// then closes the stream; both happen at most once.
pub struct CaptureSession<S: SampleStream> {
    info: SessionInfo,
    stream: S,
    timer: Option<SamplingTimer>,
    ticks: u64,
    closed: bool,
}

impl<S: SampleStream> CaptureSession<S> {
    pub(crate) fn open(info: SessionInfo, stream: S) -> Self {
        Self {
            info,
            stream,
            timer: None,
            ticks: 0,
            closed: false,
        }
    }

    pub(crate) fn attach_timer(&mut self, timer: SamplingTimer) {
        self.timer = Some(timer);
    }

    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read one frame and estimate it. Returns the reading and its tick sequence.
    pub(crate) fn sample(
        &mut self,
        estimator: &LoudnessEstimator,
    ) -> Result<(LoudnessReading, u64), MonitorError> {
        let frame = self.stream.read_frame()?;
        self.ticks += 1;
        Ok((estimator.estimate(&frame), self.ticks))
    }

    /// Stop the timer, then release the stream. Idempotent.
    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        self.stream.close();
        self.closed = true;
        log::info!(
            "Closed capture session {} after {} ticks",
            self.info.id,
            self.ticks
        );
    }
}

impl<S: SampleStream> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}
