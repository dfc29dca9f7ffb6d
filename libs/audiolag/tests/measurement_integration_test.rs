// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end runs against the simulated DUT.

use std::sync::Arc;
use std::time::Duration;

use audiolag::core::INVALID_SAMPLE;
use audiolag::sim::{DutModel, SimulatedGpio, SimulatedPcm};
use audiolag::{CancelToken, MeasurementMethod, Rig, RigConfig, RunStatus, TransportKind};
use tempfile::TempDir;

fn config(dir: &TempDir, measurements: usize) -> RigConfig {
    let mut config = RigConfig::default();
    config.counts.measurements = measurements;
    config.counts.calibration_measurements = 4;
    config.timing.start_interval_s = 0.1;
    config.timing.minimum_interval_s = 0.02;
    config.output_dir = dir.path().to_path_buf();
    config
}

fn rig_with(config: RigConfig, gpio: SimulatedGpio, dut: DutModel) -> Rig {
    let gpio = Arc::new(gpio);
    gpio.connect_dut(config.pins.line_out, config.pins.line_in, dut);
    let pcm = Arc::new(SimulatedPcm::new(gpio.clone()));
    Rig::new(config, gpio, pcm).unwrap()
}

#[test]
fn test_line_level_fixed_30ms_dut() {
    let dir = TempDir::new().unwrap();
    let rig = rig_with(
        config(&dir, 5),
        SimulatedGpio::new(),
        DutModel::with_latency(Duration::from_millis(30)),
    );

    let report = rig
        .run(
            TransportKind::LineLevel,
            MeasurementMethod::Measure,
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.series.capacity(), 5);
    assert_eq!(report.valid_count(), 5);
    for sample in report.series.samples() {
        assert!((29_000..=31_000).contains(&sample), "sample {}", sample);
    }

    // 0.1, then 0.03 + 0.03/i: 0.06, 0.045, 0.04, 0.0375
    let intervals: Vec<f64> = report.intervals.iter().map(|d| d.as_secs_f64()).collect();
    assert!((intervals[0] - 0.1).abs() < 1e-9);
    for pair in intervals[1..].windows(2) {
        assert!(pair[1] <= pair[0] + 1e-6, "intervals {:?}", intervals);
    }
    let last = intervals[4];
    assert!((0.03..=0.04).contains(&last), "last interval {}", last);

    let stats = report.stats;
    assert_eq!(stats.valid_count(), 5);
    assert!(stats.min_latency_us() <= stats.avg_latency_us());
    assert!(stats.avg_latency_us() <= stats.max_latency_us());
}

#[test]
fn test_tick_wraparound_drops_one_sample() {
    let dir = TempDir::new().unwrap();
    // First signal leaves ~10ms before the counter wraps and returns after.
    let rig = rig_with(
        config(&dir, 5),
        SimulatedGpio::starting_at(u32::MAX - 10_000),
        DutModel::with_latency(Duration::from_millis(30)),
    );

    let report = rig
        .run(
            TransportKind::LineLevel,
            MeasurementMethod::Measure,
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(report.rejected_samples, 1);
    assert_eq!(report.valid_count(), 4);
    assert_eq!(report.series.slots()[4], INVALID_SAMPLE);
    for sample in report.series.samples() {
        assert!((29_000..=31_000).contains(&sample), "sample {}", sample);
    }
}

#[test]
fn test_bouncing_return_edge_commits_once() {
    let dir = TempDir::new().unwrap();
    let rig = rig_with(
        config(&dir, 5),
        SimulatedGpio::new(),
        DutModel::with_latency(Duration::from_millis(10))
            .bouncing(3, Duration::from_micros(200)),
    );

    let report = rig
        .run(
            TransportKind::LineLevel,
            MeasurementMethod::Measure,
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(report.valid_count(), 5);
    assert_eq!(report.ignored_edges, 15);
    for sample in report.series.samples() {
        assert!((9_000..=11_000).contains(&sample), "sample {}", sample);
    }
}

#[test]
fn test_usb_measurement_through_pcm() {
    let dir = TempDir::new().unwrap();
    let rig = rig_with(
        config(&dir, 4),
        SimulatedGpio::new(),
        DutModel::with_latency(Duration::from_millis(20)),
    );

    let (report, path) = rig
        .measure(TransportKind::UsbPcm, &CancelToken::new())
        .unwrap();

    assert_eq!(report.valid_count(), 4);
    assert_eq!(report.stream_format.channels, 2);
    assert_eq!(report.stream_format.sample_rate, 44_100);
    for sample in report.series.samples() {
        // Start tick is read after the first period write, a few us late.
        assert!((19_000..=20_000).contains(&sample), "sample {}", sample);
    }

    let content = std::fs::read_to_string(path.unwrap()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines[0],
        "LATENCY_IN_MICROS,DUT_INPUT,DUT_OUTPUT,BUFFER_SIZE,SAMPLE_RATE,CHANNELS"
    );
    assert_eq!(lines.len(), 5);
    assert!(lines[1].ends_with(",USB IN,LINE OUT,256,44100,2"));
}

#[test]
fn test_silent_dut_persists_sentinels() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir, 3);
    cfg.timing.start_interval_s = 0.01;
    let gpio = Arc::new(SimulatedGpio::new());
    let pcm = Arc::new(SimulatedPcm::new(gpio.clone()));
    let rig = Rig::new(cfg, gpio, pcm).unwrap();

    let (report, path) = rig
        .measure(TransportKind::LineLevel, &CancelToken::new())
        .unwrap();
    assert_eq!(report.valid_count(), 0);

    let content = std::fs::read_to_string(path.unwrap()).unwrap();
    let rows: Vec<&str> = content.lines().skip(1).collect();
    assert_eq!(rows, vec!["-1,LINE IN,LINE OUT,0,0,0"; 3]);
}

#[test]
fn test_cancel_mid_run() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir, 50);
    cfg.timing.start_interval_s = 0.05;
    let rig = rig_with(
        cfg,
        SimulatedGpio::new(),
        DutModel::with_latency(Duration::from_millis(5)),
    );

    let cancel = CancelToken::new();
    let canceller = {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            cancel.cancel();
        })
    };

    let (report, path) = rig.measure(TransportKind::LineLevel, &cancel).unwrap();
    canceller.join().unwrap();

    match report.status {
        RunStatus::Cancelled {
            completed_iterations,
        } => assert!(completed_iterations < 50),
        RunStatus::Completed => panic!("run was not cancelled"),
    }
    assert!(path.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
