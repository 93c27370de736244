//! Recording into a real directory with an external encoder command.

#![cfg(unix)]

use looprec_core::{
    CommandCapture, CoreError, Orchestrator, RecorderConfig, SegmentNamer, StopSignal, VolumeDir,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn encoder(script: &str) -> CommandCapture {
    CommandCapture::new("sh", vec!["-c".to_string(), script.to_string()])
}

fn config(path: &Path) -> RecorderConfig {
    RecorderConfig::new(path)
        .segment_duration(Duration::from_secs(5))
        .threshold_bytes(0)
        .segment_gap(Duration::from_millis(10))
        .poll_interval(Duration::from_millis(10))
}

fn is_sealed_segment(name: &str) -> bool {
    !name.starts_with('.') && name.ends_with(".h264")
}

fn stop_after_segments(dir: PathBuf, count: usize, stop: StopSignal) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(20);
        loop {
            let segments = fs::read_dir(&dir)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .filter(|e| is_sealed_segment(&e.file_name().to_string_lossy()))
                        .count()
                })
                .unwrap_or(0);
            if segments >= count || Instant::now() > deadline {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        stop.trigger();
    })
}

#[test]
fn records_segments_with_encoder_command() {
    let temp = tempdir().unwrap();
    let dir = VolumeDir::open(temp.path(), true).unwrap();
    let stop = StopSignal::new();

    let watcher = stop_after_segments(temp.path().to_path_buf(), 2, stop.clone());
    let mut orchestrator = Orchestrator::new(
        config(temp.path()),
        dir.volume(),
        encoder("printf frames > {output}"),
    )
    .unwrap();
    let summary = orchestrator.run(&stop).unwrap();
    watcher.join().unwrap();

    assert!(summary.segments_sealed >= 2);
    let set = orchestrator.retention_set();
    assert_eq!(set.len() as u64, summary.segments_sealed);
    assert!(set.iter().all(|s| s.size_bytes() == Some(6)));
    assert!(set.iter().all(|s| s.path().exists()));
}

#[test]
fn stop_signals_encoder_through_stdin() {
    let temp = tempdir().unwrap();
    let dir = VolumeDir::open(temp.path(), true).unwrap();
    let stop = StopSignal::new();

    // The encoder records until it reads the finish key
    let source = encoder("printf partial > {output}; read key; printf done >> {output}");
    let mut orchestrator = Orchestrator::new(config(temp.path()), dir.volume(), source).unwrap();

    let trigger = {
        let stop = stop.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            stop.trigger();
        })
    };
    let summary = orchestrator.run(&stop).unwrap();
    trigger.join().unwrap();

    assert_eq!(summary.segments_sealed, 1);
    let set = orchestrator.retention_set();
    let segment = set.newest().unwrap();
    assert_eq!(fs::read_to_string(segment.path()).unwrap(), "partialdone");
    let name = segment.path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(is_sealed_segment(&name));
}

#[test]
fn kept_partials_stay_unsealed_across_restart() {
    let temp = tempdir().unwrap();
    let namer = SegmentNamer::new("loop_", ".h264");

    {
        let dir = VolumeDir::open(temp.path(), true).unwrap();
        let mut orchestrator = Orchestrator::new(
            config(temp.path())
                .max_consecutive_failures(1)
                .discard_failed_segments(false),
            dir.volume(),
            encoder("printf broken > {output}; exit 3"),
        )
        .unwrap();
        let err = orchestrator.run(&StopSignal::new()).unwrap_err();
        assert!(matches!(err, CoreError::RepeatedCaptureFailure { .. }));
    }

    let names: Vec<String> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".h264"))
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|name| !is_sealed_segment(name)));

    let dir = VolumeDir::open(temp.path(), true).unwrap();
    let recovered = dir.recover(&namer).unwrap();
    assert!(recovered.set.is_empty());
    assert_eq!(recovered.newest_id, None);
}

#[test]
fn restart_recovers_segments_in_order() {
    let temp = tempdir().unwrap();
    let namer = SegmentNamer::new("loop_", ".h264");

    let first_run = {
        let dir = VolumeDir::open(temp.path(), true).unwrap();
        let stop = StopSignal::new();
        let watcher = stop_after_segments(temp.path().to_path_buf(), 3, stop.clone());
        let mut orchestrator = Orchestrator::new(
            config(temp.path()),
            dir.volume(),
            encoder("printf 0123456789 > {output}"),
        )
        .unwrap();
        let summary = orchestrator.run(&stop).unwrap();
        watcher.join().unwrap();
        summary
    };

    let dir = VolumeDir::open(temp.path(), true).unwrap();
    let recovered = dir.recover(&namer).unwrap();
    assert_eq!(recovered.set.len() as u64, first_run.segments_sealed);
    assert_eq!(recovered.newest_id, first_run.last_segment);
    assert_eq!(recovered.set.total_bytes(), 10 * first_run.segments_sealed);

    let ids: Vec<_> = recovered.set.iter().map(|s| s.id().clone()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn missing_encoder_ends_run_after_repeated_failures() {
    let temp = tempdir().unwrap();
    let dir = VolumeDir::open(temp.path(), true).unwrap();

    let mut orchestrator = Orchestrator::new(
        config(temp.path()).max_consecutive_failures(1),
        dir.volume(),
        CommandCapture::new("/nonexistent/encoder", vec!["{output}".to_string()]),
    )
    .unwrap();
    let err = orchestrator.run(&StopSignal::new()).unwrap_err();

    assert!(matches!(err, CoreError::RepeatedCaptureFailure { attempts: 2, .. }));
    assert!(orchestrator.retention_set().is_empty());
}

#[test]
fn second_recorder_is_locked_out() {
    let temp = tempdir().unwrap();
    let _dir = VolumeDir::open(temp.path(), true).unwrap();

    let err = VolumeDir::open(temp.path(), true).unwrap_err();
    assert!(matches!(err, CoreError::VolumeLocked { .. }));
}
