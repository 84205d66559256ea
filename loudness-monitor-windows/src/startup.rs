//! Bounded wait for a capture thread to open its device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use loudness_monitor_core::models::error::MonitorError;

/// Result a capture thread reports once its device is open, or failed to open.
pub(crate) type StartupReport = Result<(), MonitorError>;

/// Wait up to `timeout` for the capture thread's startup report.
///
/// On success the handle is returned for the stream to own. On a reported
/// failure the thread is joined; it is already exiting. On timeout the thread
/// is told to stop and detached, since it may be stuck inside a driver call.
pub(crate) fn await_startup(
    ready: &Receiver<StartupReport>,
    handle: JoinHandle<()>,
    running: &AtomicBool,
    timeout: Duration,
) -> Result<JoinHandle<()>, MonitorError> {
    match ready.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            Err(e)
        }
        Err(RecvTimeoutError::Disconnected) => {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            Err(MonitorError::Unknown("capture thread exited during startup".into()))
        }
        Err(RecvTimeoutError::Timeout) => {
            running.store(false, Ordering::SeqCst);
            log::warn!("Microphone did not open within {:?}, giving up", timeout);
            drop(handle);
            Err(MonitorError::AccessUnavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    fn spawn_reporting(
        delay: Duration,
        report: Option<StartupReport>,
    ) -> (Receiver<StartupReport>, JoinHandle<()>) {
        let (tx, rx) = mpsc::sync_channel(1);
        let handle = thread::spawn(move || {
            thread::sleep(delay);
            if let Some(report) = report {
                let _ = tx.try_send(report);
            }
        });
        (rx, handle)
    }

    #[test]
    fn ready_thread_is_handed_back() {
        let running = AtomicBool::new(true);
        let (rx, handle) = spawn_reporting(Duration::ZERO, Some(Ok(())));

        let handle = await_startup(&rx, handle, &running, Duration::from_secs(2)).unwrap();
        assert!(running.load(Ordering::SeqCst));
        handle.join().unwrap();
    }

    #[test]
    fn reported_failure_is_returned() {
        let running = AtomicBool::new(true);
        let (rx, handle) = spawn_reporting(Duration::ZERO, Some(Err(MonitorError::AccessDenied)));

        let result = await_startup(&rx, handle, &running, Duration::from_secs(2));
        assert_eq!(result.unwrap_err(), MonitorError::AccessDenied);
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn stuck_thread_does_not_block_past_the_timeout() {
        let running = AtomicBool::new(true);
        let (rx, handle) = spawn_reporting(Duration::from_secs(3), Some(Ok(())));

        let started = Instant::now();
        let result = await_startup(&rx, handle, &running, Duration::from_millis(50));

        assert_eq!(result.unwrap_err(), MonitorError::AccessUnavailable);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn silent_exit_is_an_error() {
        let running = AtomicBool::new(true);
        let (rx, handle) = spawn_reporting(Duration::ZERO, None);

        let result = await_startup(&rx, handle, &running, Duration::from_secs(2));
        assert!(matches!(result, Err(MonitorError::Unknown(_))));
    }
}
