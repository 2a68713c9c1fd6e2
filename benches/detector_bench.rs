use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use drone_hub::anomaly::{DiscrepancyWindow, detect_threshold};
use drone_hub::telemetry::Reading;

fn sample(ts_offset: f64, temperature: f64) -> Reading {
    Reading {
        sensor_id: "drone_1_env".into(),
        drone_id: None,
        timestamp: None,
        temperature: Some(temperature),
        pressure: Some(1000.0 + ts_offset),
        altitude: Some(100.0),
        humidity: Some(40.0),
        motor_energies: Some(vec![10.0, 20.0, 30.0, 40.0]),
    }
}

fn threshold_bench(c: &mut Criterion) {
    let reading = sample(0.0, 21.0);
    c.bench_function("detect_threshold", |b| {
        b.iter(|| detect_threshold(black_box(&reading)))
    });
}

fn discrepancy_scan_bench(c: &mut Criterion) {
    // Window loaded at the sensor cadence: ~40 entries inside 2 seconds.
    let mut window = DiscrepancyWindow::new();
    for i in 0..40 {
        window.insert(i as f64 * 0.05, sample(i as f64, 20.0 + (i % 7) as f64));
    }
    c.bench_function("discrepancy_scan", |b| b.iter(|| black_box(&window).scan()));
}

criterion_group!(benches, threshold_bench, discrepancy_scan_bench);
criterion_main!(benches);
