mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use audio_rx_core::storage::metadata;
use audio_rx_core::{
    CaptureConfig, CaptureError, CaptureSession, CaptureState, FrameDataMode, StopCode, ToneSettings, FILE_PATH_NA,
};
use common::{config, flood, read_wav, tone, tone_with, BrokenDevice, Recorder};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn start_then_stop_emits_one_normal_stop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session.start(config(&path)).unwrap();
    assert_eq!(session.state(), CaptureState::Recording);
    thread::sleep(Duration::from_millis(200));
    session.stop().unwrap();

    assert_eq!(session.state(), CaptureState::Stopped(StopCode::Normal));
    let stops = recorder.stops.lock().clone();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].code, StopCode::Normal);
    assert_eq!(stops[0].file_path.as_deref(), Some(path.as_path()));

    let summary = session.last_recording().unwrap();
    let (samples, spec) = read_wav(&path);
    assert_eq!(samples as u64, summary.sample_count());
    assert!(samples > 0);
    assert_eq!(spec.sample_rate, 8000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
}

#[test]
fn immediate_stop_still_finalizes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blink.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session.start(config(&path)).unwrap();
    session.stop().unwrap();

    assert_eq!(recorder.stops.lock().len(), 1);
    assert!(hound::WavReader::open(&path).is_ok());
}

#[test]
fn stop_when_idle_is_noop() {
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    assert!(session.stop().is_ok());
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(recorder.stops.lock().is_empty());
}

#[test]
fn second_start_is_rejected_without_disturbing_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("first.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session.start(config(&path)).unwrap();
    let other = config(&dir.path().join("second.wav"));
    assert_eq!(session.start(other), Err(CaptureError::AlreadyRecording));
    assert_eq!(session.state(), CaptureState::Recording);

    thread::sleep(Duration::from_millis(100));
    session.stop().unwrap();

    let stops = recorder.stops.lock().clone();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].code, StopCode::Normal);
    assert!(!dir.path().join("second.wav").exists());
    assert!(read_wav(&path).0 > 0);
}

#[test]
fn invalid_config_is_rejected() {
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder);

    for bad in [
        CaptureConfig { sample_rate: 0, ..Default::default() },
        CaptureConfig { byte_depth: 3, ..Default::default() },
        CaptureConfig { num_channels: 6, ..Default::default() },
        CaptureConfig { max_duration_secs: 0.0, ..Default::default() },
        CaptureConfig { max_duration_secs: f64::NAN, ..Default::default() },
    ] {
        assert!(matches!(session.start(bad), Err(CaptureError::InvalidConfig(_))));
    }
    assert_eq!(session.state(), CaptureState::Idle);
}

#[test]
fn timeout_writes_exactly_the_configured_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timed.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session
        .start(CaptureConfig { max_duration_secs: 1.0, ..config(&path) })
        .unwrap();
    let stop = recorder.wait_for_stop(WAIT);

    assert_eq!(stop.code, StopCode::Timeout);
    assert_eq!(stop.file_path.as_deref(), Some(path.as_path()));
    assert_eq!(session.state(), CaptureState::Stopped(StopCode::Timeout));
    assert_eq!(read_wav(&path).0, 8000);

    // The tone is paced in real time, so the stop lands near the 1 s mark.
    let cfg = config(&path);
    let slack = cfg.frame_period() + cfg.poll_interval();
    let elapsed = session.elapsed();
    assert!(
        elapsed >= Duration::from_secs(1) - slack && elapsed <= Duration::from_secs(1) + slack,
        "stopped after {:?}",
        elapsed
    );

    // Already stopped: nothing more happens.
    session.stop().unwrap();
    assert_eq!(recorder.stops.lock().len(), 1);
}

#[test]
fn stereo_8_bit_round_trip_matches_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo8.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    let cfg = CaptureConfig {
        sample_rate: 11025,
        num_channels: 2,
        byte_depth: 1,
        max_duration_secs: 0.5,
        ..config(&path)
    };
    session.start(cfg.clone()).unwrap();
    assert_eq!(recorder.wait_for_stop(WAIT).code, StopCode::Timeout);

    let (samples, spec) = read_wav(&path);
    assert_eq!(spec.sample_rate, 11025);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.bits_per_sample, 8);

    let expected = 11025.0 * 0.5;
    let frame = cfg.frame_sample_count() as f64;
    assert!((samples as f64 - expected).abs() <= frame);
}

#[test]
fn frames_are_contiguous_and_metered() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    let cfg = CaptureConfig {
        report_volume: true,
        report_frame_data: true,
        ..config(&dir.path().join("frames.wav"))
    };
    session.start(cfg.clone()).unwrap();
    thread::sleep(Duration::from_millis(300));
    session.stop().unwrap();

    let sequences = recorder.frame_sequences();
    assert!(sequences.len() >= 5);
    assert_eq!(sequences, (0..sequences.len() as u64).collect::<Vec<_>>());

    for frame in recorder.frames.lock().iter() {
        assert_eq!(frame.decode().unwrap().len(), cfg.frame_bytes());
    }

    // 0.5 amplitude sine: 20·log10(0.5/√2)
    let volumes = recorder.volumes.lock().clone();
    assert_eq!(volumes.len(), sequences.len());
    for volume in &volumes {
        assert_abs_diff_eq!(volume.dbfs, -9.03, epsilon = 0.5);
    }
    assert!(recorder.errors.lock().is_empty());
    assert_eq!(session.diagnostics().frames_processed, sequences.len() as u64);
}

#[test]
fn silence_reports_the_volume_floor() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::new());
    let source = tone_with(ToneSettings { amplitude: 0.0, ..Default::default() });
    let mut session = CaptureSession::new(source, recorder.clone());

    session
        .start(CaptureConfig { report_volume: true, ..config(&dir.path().join("quiet.wav")) })
        .unwrap();
    thread::sleep(Duration::from_millis(150));
    session.stop().unwrap();

    let volumes = recorder.volumes.lock().clone();
    assert!(!volumes.is_empty());
    assert!(volumes.iter().all(|v| v.dbfs == -96.0));
}

#[test]
fn first_sample_mode_sends_one_packet() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session
        .start(CaptureConfig {
            num_channels: 2,
            report_frame_data: true,
            frame_data_mode: FrameDataMode::FirstSample,
            ..config(&dir.path().join("first.wav"))
        })
        .unwrap();
    thread::sleep(Duration::from_millis(150));
    session.stop().unwrap();

    let frames = recorder.frames.lock().clone();
    assert!(!frames.is_empty());
    for frame in frames {
        let payload = frame.decode().unwrap();
        assert_eq!(payload.len(), 4);
        let first = i16::from_le_bytes([payload[0], payload[1]]) as i32;
        assert_eq!(frame.first_sample, Some(first));
    }
}

#[test]
fn leading_frames_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session
        .start(CaptureConfig {
            report_frame_data: true,
            skip_leading_frames: 2,
            ..config(&dir.path().join("skip.wav"))
        })
        .unwrap();
    thread::sleep(Duration::from_millis(200));
    session.stop().unwrap();

    assert_eq!(recorder.frame_sequences().first(), Some(&2));
}

#[test]
fn skipped_frames_do_not_count_toward_duration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skip-timed.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session
        .start(CaptureConfig {
            max_duration_secs: 0.25,
            skip_leading_frames: 2,
            report_volume: true,
            ..config(&path)
        })
        .unwrap();
    assert_eq!(recorder.wait_for_stop(WAIT).code, StopCode::Timeout);

    // 0.25 s at 8 kHz, on top of the two skipped 160-sample frames.
    assert_eq!(read_wav(&path).0, 2000);
    let volumes = recorder.volumes.lock().clone();
    assert_eq!(volumes.first().map(|v| v.sequence), Some(2));
    assert_eq!(volumes.len(), 2000 / 160);
    assert_eq!(session.diagnostics().bytes_written, 4000);
}

#[test]
fn overruns_keep_every_counted_sample_in_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lossy.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(flood(), recorder.clone());

    let cfg = CaptureConfig {
        max_duration_secs: 0.25,
        ring_buffer_secs: 0.001,
        overrun_escalation_threshold: 1_000_000,
        ..config(&path)
    };
    session.start(cfg).unwrap();
    assert_eq!(recorder.wait_for_stop(WAIT).code, StopCode::Timeout);

    assert!(session.diagnostics().overrun_count > 0);
    assert_eq!(read_wav(&path).0, 2000);
}

#[test]
fn sustained_overruns_escalate_to_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flooded.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(flood(), recorder.clone());

    let cfg = CaptureConfig {
        ring_buffer_secs: 0.001,
        overrun_escalation_threshold: 3,
        report_frame_data: true,
        ..config(&path)
    };
    session.start(cfg).unwrap();
    let stop = recorder.wait_for_stop(WAIT);

    assert_eq!(stop.code, StopCode::Error);
    assert_eq!(stop.file_path, None);
    assert_eq!(stop.file_path_or_na(), FILE_PATH_NA);

    let errors = recorder.errors.lock().clone();
    assert!(errors.iter().any(|e| matches!(e, CaptureError::BufferOverrun { .. })));
    assert!(matches!(errors.last(), Some(CaptureError::DeviceError(_))));
    assert!(session.diagnostics().overrun_count > 0);

    // Lost frames leave gaps in the sequence.
    let sequences = recorder.frame_sequences();
    assert!(!sequences.is_empty());
    assert!(*sequences.last().unwrap() + 1 > sequences.len() as u64);

    // Truncated file is still valid.
    assert!(hound::WavReader::open(&path).is_ok());
}

#[test]
fn device_failure_stops_with_error_and_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unplugged.wav");
    let recorder = Arc::new(Recorder::new());
    let source = tone_with(ToneSettings { fail_after_chunks: Some(5), ..Default::default() });
    let mut session = CaptureSession::new(source, recorder.clone());

    session.start(config(&path)).unwrap();
    let stop = recorder.wait_for_stop(WAIT);

    assert_eq!(stop.code, StopCode::Error);
    assert_eq!(
        stop.to_json(),
        r#"{"code":"STOP_CODE_ERROR","filePath":"FILE_PATH_NA"}"#
    );
    assert!(recorder
        .errors
        .lock()
        .iter()
        .any(|e| matches!(e, CaptureError::DeviceError(_))));

    // 5 chunks of 80 samples at most, all written before the failure
    let (samples, _) = read_wav(&path);
    assert!(samples <= 400);
}

#[test]
fn unwritable_path_fails_with_file_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    let result = session.start(config(&blocker.join("nested").join("out.wav")));
    assert!(matches!(result, Err(CaptureError::FileOpenError(_))));
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(recorder.stops.lock().is_empty());
}

#[test]
fn device_open_failure_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(BrokenDevice, recorder.clone());

    let result = session.start(config(&path));
    assert!(matches!(result, Err(CaptureError::DeviceError(_))));
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(!path.exists());
}

#[test]
fn without_file_stop_reports_no_path() {
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session
        .start(CaptureConfig { record_to_file: false, ..Default::default() })
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    session.stop().unwrap();

    let stop = recorder.stops.lock()[0].clone();
    assert_eq!(stop.code, StopCode::Normal);
    assert_eq!(stop.file_path_or_na(), FILE_PATH_NA);
    assert!(session.last_recording().is_none());
}

#[test]
fn metadata_sidecar_describes_the_recording() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.wav");
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    session
        .start(CaptureConfig {
            max_duration_secs: 0.25,
            write_metadata: true,
            ..config(&path)
        })
        .unwrap();
    recorder.wait_for_stop(WAIT);

    let meta = metadata::read_metadata(&path).unwrap();
    let summary = session.last_recording().unwrap();
    assert_eq!(meta.stop_code, StopCode::Timeout);
    assert_eq!(meta.data_bytes, 2000 * 2);
    assert_eq!(meta.sample_rate, 8000);
    assert_eq!(meta.bits_per_sample, 16);
    assert_eq!(meta.checksum, summary.checksum);
    assert_abs_diff_eq!(meta.duration_secs, 0.25, epsilon = 1e-9);
}

#[test]
fn session_can_record_again_after_stopping() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::new());
    let mut session = CaptureSession::new(tone(), recorder.clone());

    for name in ["one.wav", "two.wav"] {
        session.start(config(&dir.path().join(name))).unwrap();
        thread::sleep(Duration::from_millis(60));
        session.stop().unwrap();
    }

    let stops = recorder.stops.lock().clone();
    assert_eq!(stops.len(), 2);
    assert!(stops.iter().all(|s| s.code == StopCode::Normal));
    assert!(dir.path().join("two.wav").exists());
}
