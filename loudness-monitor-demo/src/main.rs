//! Console loudness display for a bingo caller.
//!
//! Usage:
//!   loudness-monitor                          # Default microphone (Windows)
//!   loudness-monitor --synthetic --signal ramp  # Scripted signal, no hardware
//!   loudness-monitor --config monitor.json    # Calibration and period from JSON
//!
//! Press `m` then Enter to toggle monitoring, `q` to quit.

mod console;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use loudness_monitor_core::{
    AudioSource, CaptureProvider, MonitorConfiguration, MonitorError, MonitorSession,
    SyntheticProvider, SyntheticSignal,
};

use console::{ConsoleDelegate, OutputStyle};

#[derive(Parser, Debug)]
#[command(
    name = "loudness-monitor",
    version,
    about = "Live microphone loudness display with severity tiers"
)]
struct Args {
    /// JSON configuration file (sample period, window, calibration, device)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use a scripted signal instead of the microphone
    #[arg(long)]
    synthetic: bool,

    /// Signal played by the synthetic microphone
    #[arg(long, value_enum, default_value_t = SignalArg::Ramp)]
    signal: SignalArg,

    /// Start monitoring immediately instead of waiting for `m`
    #[arg(long)]
    start: bool,

    /// Print one JSON reading per line
    #[arg(long)]
    json: bool,

    /// Disable tier colors
    #[arg(long)]
    no_color: bool,

    /// List microphones and exit
    #[arg(long)]
    list_devices: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum SignalArg {
    Silence,
    Quiet,
    Moderate,
    Loud,
    FullScale,
    Ramp,
}

impl SignalArg {
    fn signal(self) -> SyntheticSignal {
        match self {
            Self::Silence => SyntheticSignal::Silence,
            Self::Quiet => SyntheticSignal::Square { amplitude: 0.0005 },
            Self::Moderate => SyntheticSignal::Square { amplitude: 0.003 },
            Self::Loud => SyntheticSignal::Square { amplitude: 0.02 },
            Self::FullScale => SyntheticSignal::FullScale,
            // Quiet to saturated over 40 ticks.
            Self::Ramp => SyntheticSignal::Ramp {
                from: 0.0002,
                to: 1.0,
                frames: 40,
            },
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("loudness-monitor: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), MonitorError> {
    if args.list_devices {
        for device in list_devices(args)? {
            let marker = if device.is_default { "*" } else { " " };
            println!("{} {}  {}", marker, device.name, device.id);
        }
        return Ok(());
    }

    let config = match args.config {
        Some(ref path) => MonitorConfiguration::from_path(path)?,
        None => MonitorConfiguration::default(),
    };

    if args.synthetic {
        let provider = SyntheticProvider::new(args.signal.signal());
        return monitor_loop(MonitorSession::new(provider, config)?, args);
    }
    run_microphone(config, args)
}

/// Devices the selected source would capture from.
fn list_devices(args: &Args) -> Result<Vec<AudioSource>, MonitorError> {
    if args.synthetic {
        return Ok(vec![SyntheticProvider::new(args.signal.signal()).device_info()]);
    }
    microphone_devices(args)
}

#[cfg(target_os = "windows")]
fn microphone_devices(_args: &Args) -> Result<Vec<AudioSource>, MonitorError> {
    loudness_monitor_windows::WasapiMicProvider::list_devices()
}

#[cfg(not(target_os = "windows"))]
fn microphone_devices(args: &Args) -> Result<Vec<AudioSource>, MonitorError> {
    Ok(vec![SyntheticProvider::new(args.signal.signal()).device_info()])
}

#[cfg(target_os = "windows")]
fn run_microphone(config: MonitorConfiguration, args: &Args) -> Result<(), MonitorError> {
    let provider = loudness_monitor_windows::WasapiMicProvider::from_config(&config)?;
    monitor_loop(MonitorSession::new(provider, config)?, args)
}

#[cfg(not(target_os = "windows"))]
fn run_microphone(config: MonitorConfiguration, args: &Args) -> Result<(), MonitorError> {
    log::warn!("No microphone backend on this platform, using the synthetic signal");
    let provider = SyntheticProvider::new(args.signal.signal());
    monitor_loop(MonitorSession::new(provider, config)?, args)
}

fn monitor_loop<P: CaptureProvider>(
    mut monitor: MonitorSession<P>,
    args: &Args,
) -> Result<(), MonitorError> {
    let style = if args.json {
        OutputStyle::Json
    } else {
        OutputStyle::Meter { color: !args.no_color }
    };
    monitor.set_delegate(Arc::new(ConsoleDelegate::new(monitor.config().calibration, style)));

    let device = monitor.provider().device_info();
    println!("Microphone: {}", device.name);
    println!("Press m then Enter to toggle monitoring, q to quit.");

    if args.start {
        // Failures are already reported to the console by the delegate.
        let _ = monitor.set_activation(true);
    }

    for line in io::stdin().lock().lines() {
        let line = line.map_err(|e| MonitorError::Unknown(format!("stdin: {}", e)))?;
        match line.trim() {
            "m" | "M" => {
                if let Err(e) = monitor.toggle() {
                    log::debug!("Toggle failed: {}", e);
                }
            }
            "q" | "Q" => break,
            "" => {}
            other => println!("Unknown command '{}'. Press m to toggle, q to quit.", other),
        }
    }

    monitor.deactivate();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use loudness_monitor_core::{LoudnessEstimator, SampleEncoding, SampleFrame, SeverityTier};

    fn tier_for(arg: SignalArg) -> SeverityTier {
        let amplitude = arg.signal().amplitude(0);
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect();
        let frame = SampleFrame::from_normalized(SampleEncoding::Float32, &samples);
        LoudnessEstimator::default().estimate(&frame).tier
    }

    #[test]
    fn named_signals_land_in_their_tiers() {
        assert_eq!(tier_for(SignalArg::Silence), SeverityTier::Quiet);
        assert_eq!(tier_for(SignalArg::Quiet), SeverityTier::Quiet);
        assert_eq!(tier_for(SignalArg::Moderate), SeverityTier::Moderate);
        assert_eq!(tier_for(SignalArg::Loud), SeverityTier::Loud);
        assert_eq!(tier_for(SignalArg::FullScale), SeverityTier::Critical);
    }

    #[test]
    fn parses_synthetic_flags() {
        let args = Args::parse_from([
            "loudness-monitor",
            "--synthetic",
            "--signal",
            "full-scale",
            "--json",
        ]);
        assert!(args.synthetic);
        assert_eq!(args.signal, SignalArg::FullScale);
        assert!(args.json);
        assert!(args.config.is_none());
    }

    #[test]
    fn synthetic_device_listing_ignores_the_microphone() {
        let args = Args::parse_from(["loudness-monitor", "--synthetic", "--list-devices"]);
        assert!(args.list_devices);

        let devices = list_devices(&args).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "synthetic");
        assert!(devices[0].is_default);
    }
}
