use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{select, Receiver};

use audio_rx_core::{AudioRx, CaptureConfig, CaptureProvider, StopEvent, ToneSettings, ToneSource};
use audio_rx_cpal::permissions::require_microphone_permission;
use audio_rx_cpal::{list_input_devices, CpalMicCapture, PlaybackController};

use crate::RecordArgs;

/// Extra time allowed for the stop event after a manual stop returned.
const STOP_EVENT_WAIT: Duration = Duration::from_secs(5);

/// Load `--config` (or defaults) and apply the individual flag overrides.
pub fn build_config(args: &RecordArgs) -> Result<CaptureConfig> {
    let mut config = match &args.config {
        Some(path) => CaptureConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CaptureConfig::default(),
    };

    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(channels) = args.channels {
        config.num_channels = channels;
    }
    if let Some(depth) = args.byte_depth {
        config.byte_depth = depth;
    }
    if let Some(secs) = args.max_duration {
        config.max_duration_secs = secs;
    }
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if args.no_file {
        config.record_to_file = false;
    }
    config.report_volume |= args.volume;
    config.report_frame_data |= args.frames;
    config.write_metadata |= args.metadata;

    Ok(config)
}

pub fn record(args: &RecordArgs) -> Result<()> {
    let config = build_config(args)?;

    if args.tone {
        let tone = ToneSource::new(ToneSettings {
            frequency_hz: args.tone_frequency,
            ..Default::default()
        });
        return run_session(AudioRx::new(tone), config);
    }

    // Permission first, then the core, then observers.
    require_microphone_permission().context("microphone access is not available")?;
    let mic = match &args.device {
        Some(name) => CpalMicCapture::with_device(name.clone()),
        None => CpalMicCapture::default_device(),
    };
    run_session(AudioRx::new(mic), config)
}

fn run_session<P: CaptureProvider + 'static>(mut rx: AudioRx<P>, config: CaptureConfig) -> Result<()> {
    rx.init(config).context("invalid capture configuration")?;
    let stops = register_observers(&rx);

    rx.start().context("failed to start recording")?;
    log::info!("recording from {}", rx.device_info().name);
    println!("Recording... press Enter to stop");

    let enter = wait_for_enter();
    let event = select! {
        recv(stops) -> event => event.context("session ended without a stop event")?,
        recv(enter) -> _ => {
            rx.stop().context("failed to stop recording")?;
            stops
                .recv_timeout(STOP_EVENT_WAIT)
                .context("no stop event after stopping")?
        }
    };

    println!();
    println!("{}", event.to_json());
    let diagnostics = serde_json::to_string_pretty(&rx.diagnostics())?;
    log::debug!("diagnostics: {}", diagnostics);
    Ok(())
}

fn register_observers<P: CaptureProvider + 'static>(rx: &AudioRx<P>) -> Receiver<StopEvent> {
    rx.on_volume(|event| {
        print!("\r{:>7.1} dBFS {:<48}", event.dbfs, meter(event.dbfs));
        let _ = io::stdout().flush();
    });
    rx.on_frame_data(|event| {
        log::debug!("frame {} first sample {:?} ({} base64 chars)", event.sequence, event.first_sample, event.data.len());
    });
    rx.on_error(|error| log::warn!("{}", error));

    let (tx, stops) = crossbeam_channel::bounded(1);
    rx.on_stop(move |event| {
        let _ = tx.try_send(event.clone());
    });
    stops
}

/// Fires once a line is read from stdin. Never fires on EOF.
fn wait_for_enter() -> Receiver<()> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        if matches!(io::stdin().read_line(&mut line), Ok(n) if n > 0) {
            let _ = tx.send(());
        }
    });
    rx
}

/// Bar for a level between -60 dBFS and 0.
fn meter(dbfs: f64) -> String {
    let filled = (((dbfs + 60.0) / 60.0).clamp(0.0, 1.0) * 48.0).round() as usize;
    "#".repeat(filled)
}

pub fn list_devices() -> Result<()> {
    let devices = list_input_devices().context("failed to list input devices")?;
    if devices.is_empty() {
        println!("No input devices found");
    }
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!("{} {}", marker, device.name);
    }
    Ok(())
}

pub fn play(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    let mut controller = PlaybackController::new();
    controller.load(path)?;
    controller.play()?;

    while controller.is_playing() {
        thread::sleep(Duration::from_millis(50));
    }
    controller.release();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands};
    use clap::Parser;

    fn record_args(argv: &[&str]) -> RecordArgs {
        let cli = Cli::try_parse_from(std::iter::once("audio-rx").chain(argv.iter().copied())).unwrap();
        match cli.command {
            Commands::Record(args) => args,
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let args = record_args(&["record", "--sample-rate", "16000", "--byte-depth", "1", "--volume", "--no-file"]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.byte_depth, 1);
        assert!(config.report_volume);
        assert!(!config.record_to_file);
        assert_eq!(config.num_channels, 1);
    }

    #[test]
    fn flags_override_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx.json");
        std::fs::write(
            &path,
            r#"{"sampleRate": 22050, "numChannels": 2, "byteDepth": 2, "maxDuration": 3,
                "recordToFile": true, "reportVolume": false, "reportFrameData": true}"#,
        )
        .unwrap();

        let args = record_args(&["record", "--config", path.to_str().unwrap(), "--max-duration", "1.5"]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.num_channels, 2);
        assert!(config.report_frame_data);
        assert_eq!(config.max_duration_secs, 1.5);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let args = record_args(&["record", "--config", "/nonexistent/rx.json"]);
        let err = build_config(&args).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }

    #[test]
    fn device_and_tone_conflict() {
        let argv = ["audio-rx", "record", "--tone", "--device", "USB"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn meter_scales_between_floor_and_full_scale() {
        assert_eq!(meter(-96.0), "");
        assert_eq!(meter(-30.0).len(), 24);
        assert_eq!(meter(0.0).len(), 48);
    }
}
