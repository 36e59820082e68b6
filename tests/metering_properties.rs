use approx::assert_abs_diff_eq;
use mixbus::dsp::{db_to_linear, linear_to_db};
use mixbus::{MeteringConfig, MeteringPipeline};
use rand::Rng;

fn pipeline() -> MeteringPipeline {
    MeteringPipeline::new(MeteringConfig::default(), 48000)
}

#[test]
fn test_db_round_trip() {
    let mut db = -60.0f32;
    while db <= 12.0 {
        assert_abs_diff_eq!(linear_to_db(db_to_linear(db)), db, epsilon = 1e-3);
        db += 0.25;
    }
}

#[test]
fn test_true_peak_never_below_sample_peak() {
    let mut rng = rand::thread_rng();
    let mut pipeline = pipeline();
    for _ in 0..50 {
        let len = rng.gen_range(2..2048) * 2;
        let samples: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let snapshot = pipeline.process_audio(&samples, 2);
        assert!(snapshot.levels.true_peak_db >= snapshot.levels.peak_db);
        assert!(snapshot.loudness.true_peak >= snapshot.levels.peak_hold_db - 1e-6);
    }
}

#[test]
fn test_correlation_stays_in_bounds() {
    let mut rng = rand::thread_rng();
    let mut pipeline = pipeline();
    for _ in 0..50 {
        let frames = rng.gen_range(1..1024);
        let mix: f32 = rng.gen_range(-1.0..1.0);
        let samples: Vec<f32> = (0..frames)
            .flat_map(|_| {
                let left: f32 = rng.gen_range(-1.0..1.0);
                let noise: f32 = rng.gen_range(-1.0..1.0);
                [left, mix * left + (1.0 - mix.abs()) * noise]
            })
            .collect();
        let correlation = pipeline.process_audio(&samples, 2).loudness.phase_correlation;
        assert!((-1.0..=1.0).contains(&correlation), "correlation {}", correlation);
    }
}

#[test]
fn test_integrated_window_capped() {
    let config = MeteringConfig {
        integrated_window_secs: 1.0,
        ..MeteringConfig::default()
    };
    let mut pipeline = MeteringPipeline::new(config, 1000);

    // Two seconds of loud audio, then one second of quiet: only the quiet remains
    for _ in 0..2 {
        pipeline.process_audio(&vec![1.0; 1000], 1);
    }
    for _ in 0..4 {
        pipeline.process_audio(&vec![0.1; 250], 1);
    }
    let snapshot = pipeline.latest_snapshot().unwrap();
    assert_abs_diff_eq!(snapshot.loudness.integrated_lufs, -20.0, epsilon = 1e-3);
    assert_abs_diff_eq!(snapshot.loudness.relative_lu, 3.0, epsilon = 1e-3);
}

#[test]
fn test_reset_clears_integrated_and_holds() {
    let mut pipeline = pipeline();
    pipeline.process_audio(&[0.9; 256], 1);
    pipeline.reset_meters();
    let snapshot = pipeline.process_audio(&[0.1; 256], 1);
    assert_abs_diff_eq!(snapshot.levels.peak_hold_db, -20.0, epsilon = 1e-3);
    assert_abs_diff_eq!(snapshot.loudness.integrated_lufs, -20.0, epsilon = 1e-3);
    assert_abs_diff_eq!(snapshot.loudness.headroom, 20.0, epsilon = 1e-3);
}

#[test]
fn test_snapshot_serializes() {
    let mut pipeline = pipeline();
    let snapshot = pipeline.process_audio(&[0.25, -0.25, 0.5, -0.5], 2);
    let json = serde_json::to_value(&*snapshot).unwrap();
    assert!(json["loudness"]["phase_correlation"].is_number());
    assert_eq!(json["spectrum_bins"].as_array().unwrap().len(), 1024);
}
