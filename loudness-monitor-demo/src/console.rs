//! Terminal rendering of monitor events.

use std::io::{self, Write};

use parking_lot::Mutex;

use loudness_monitor_core::{
    Calibration, LoudnessReading, MonitorDelegate, MonitorError, MonitorState, SeverityTier,
};

const BAR_WIDTH: usize = 30;

const ACCESS_DENIED_NOTICE: &str =
    "Microphone access was denied. Allow it in your privacy settings, then press m to retry.";
const ACCESS_UNAVAILABLE_NOTICE: &str =
    "No microphone is available. Connect one, then press m to retry.";

/// How readings are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    /// One redrawn meter line, optionally tier-colored.
    Meter { color: bool },
    /// One JSON object per reading.
    Json,
}

/// Prints the live reading while the monitor is capturing.
pub struct ConsoleDelegate {
    calibration: Calibration,
    style: OutputStyle,
    // A meter line is on screen without a trailing newline.
    line_open: Mutex<bool>,
}

impl ConsoleDelegate {
    pub fn new(calibration: Calibration, style: OutputStyle) -> Self {
        Self {
            calibration,
            style,
            line_open: Mutex::new(false),
        }
    }

    /// Print a full line, closing any open meter line first.
    fn print_line(&self, text: &str) {
        let mut line_open = self.line_open.lock();
        let mut out = io::stdout().lock();
        if *line_open {
            let _ = writeln!(out);
            *line_open = false;
        }
        let _ = writeln!(out, "{}", text);
    }
}

impl MonitorDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: &MonitorState) {
        match state {
            MonitorState::Capturing { session_id, .. } => {
                log::debug!("Session {} started", session_id);
                self.print_line("Monitoring on. Press m to stop.");
            }
            MonitorState::Idle => self.print_line("Monitoring off. Press m to start."),
        }
    }

    fn on_reading_updated(&self, reading: &LoudnessReading) {
        match self.style {
            OutputStyle::Json => match serde_json::to_string(reading) {
                Ok(json) => self.print_line(&json),
                Err(e) => log::warn!("Failed to encode reading: {}", e),
            },
            OutputStyle::Meter { color } => {
                let mut line_open = self.line_open.lock();
                let mut out = io::stdout().lock();
                let _ = write!(out, "\r\x1b[2K{}", render_meter(reading, &self.calibration, color));
                let _ = out.flush();
                *line_open = true;
            }
        }
    }

    fn on_error(&self, error: &MonitorError) {
        match error {
            MonitorError::AccessDenied => self.print_line(ACCESS_DENIED_NOTICE),
            MonitorError::AccessUnavailable => self.print_line(ACCESS_UNAVAILABLE_NOTICE),
            MonitorError::DeviceLost => self.print_line("The microphone was disconnected."),
            other => self.print_line(&format!("Monitor error: {}", other)),
        }
    }
}

/// `[LOUD    ]  87 dB  ██████████████████████░░░░░░░░`
pub fn render_meter(reading: &LoudnessReading, calibration: &Calibration, color: bool) -> String {
    let filled = (calibration.fill_ratio(reading.magnitude) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
    let label = format!("[{:<8}]", reading.tier.label().to_uppercase());

    if color {
        let code = tier_color(reading.tier);
        format!("\x1b[{}m{} {:>3} dB  {}\x1b[0m", code, label, reading.magnitude, bar)
    } else {
        format!("{} {:>3} dB  {}", label, reading.magnitude, bar)
    }
}

/// ANSI SGR color parameters for a tier.
fn tier_color(tier: SeverityTier) -> &'static str {
    match tier {
        SeverityTier::Quiet => "32",
        SeverityTier::Moderate => "33",
        SeverityTier::Loud => "38;5;208",
        SeverityTier::Critical => "1;31",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_at_floor_is_empty() {
        let reading = LoudnessReading::new(50, SeverityTier::Quiet);
        let line = render_meter(&reading, &Calibration::default(), false);
        assert!(line.starts_with("[QUIET   ]  50 dB"));
        assert!(!line.contains('█'));
    }

    #[test]
    fn meter_at_ceiling_is_full() {
        let reading = LoudnessReading::new(100, SeverityTier::Critical);
        let line = render_meter(&reading, &Calibration::default(), false);
        assert!(line.contains("100 dB"));
        assert_eq!(line.matches('█').count(), BAR_WIDTH);
    }

    #[test]
    fn meter_fills_proportionally() {
        let reading = LoudnessReading::new(75, SeverityTier::Moderate);
        let line = render_meter(&reading, &Calibration::default(), false);
        assert_eq!(line.matches('█').count(), BAR_WIDTH / 2);
        assert_eq!(line.matches('░').count(), BAR_WIDTH / 2);
    }

    #[test]
    fn color_wraps_and_resets() {
        let reading = LoudnessReading::new(93, SeverityTier::Critical);
        let line = render_meter(&reading, &Calibration::default(), true);
        assert!(line.starts_with("\x1b[1;31m"));
        assert!(line.ends_with("\x1b[0m"));
    }
}
