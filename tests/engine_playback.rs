mod common;

use approx::assert_abs_diff_eq;
use common::{constant_wav, engine, render, sine_wav};
use mixbus::{create_engine, AudioEvent, EngineConfig, MeteringPipeline};
use std::sync::Arc;

const SR: u32 = 44100;

#[test]
fn test_play_without_buffer_fails() {
    let (_engine, mut controller) = engine(SR, 2);
    assert!(!controller.play_audio(9, 0.0, 0.0, 0.0));
    assert!(!controller.is_playing(9));
}

#[test]
fn test_garbage_file_is_rejected() {
    let (_engine, mut controller) = engine(SR, 2);
    assert!(!controller.load_audio_file(1, b"definitely not audio".to_vec()));
    assert!(!controller.has_track(1));
    // Other tracks are unaffected
    assert!(controller.load_audio_file(2, sine_wav(440.0, 0.5, 0.1, SR)));
    assert!(controller.play_audio(2, 0.0, 0.0, 0.0));
}

#[test]
fn test_decoded_buffer_matches_source() {
    let (_engine, mut controller) = engine(SR, 2);
    assert!(controller.load_audio_file(1, sine_wav(1000.0, 0.5, 2.0, SR)));
    assert_abs_diff_eq!(controller.track_duration(1).unwrap(), 2.0, epsilon = 1e-6);
}

#[test]
fn test_stop_is_idempotent() {
    let (mut engine, mut controller) = engine(SR, 2);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 1.0, SR));
    assert!(controller.play_audio(1, 0.0, 0.0, 0.0));
    render(&mut engine, 512);
    assert_eq!(engine.active_voice_count(), 1);

    controller.stop_audio(1);
    controller.stop_audio(1);
    render(&mut engine, 512);
    assert_eq!(engine.active_voice_count(), 0);
    assert!(!controller.is_playing(1));
    assert!(controller.registry().get(1).is_none());
}

#[test]
fn test_replay_replaces_source() {
    let (mut engine, mut controller) = engine(SR, 2);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 1.0, SR));
    assert!(controller.play_audio(1, 0.0, 0.0, 0.0));
    assert!(controller.play_audio(1, 0.5, 0.0, 0.0));
    render(&mut engine, 256);
    assert_eq!(engine.active_voice_count(), 1);
    assert_eq!(controller.play_state(1).unwrap().current_offset, 0.5);
}

#[test]
fn test_stop_all_clears_everything() {
    let (mut engine, mut controller) = engine(SR, 2);
    for id in 1..=3 {
        controller.load_audio_file(id, sine_wav(220.0 * id as f32, 0.2, 1.0, SR));
        assert!(controller.play_audio(id, 0.0, 0.0, 0.0));
    }
    render(&mut engine, 512);
    assert_eq!(engine.active_voice_count(), 3);

    controller.stop_all_audio();
    let output = render(&mut engine, 512);
    assert_eq!(engine.active_voice_count(), 0);
    assert!(controller.active_tracks().is_empty());
    assert!(controller.registry().is_empty());
    assert!(output.iter().all(|s| *s == 0.0));

    // Safe to repeat
    controller.stop_all_audio();
}

#[test]
fn test_source_ends_naturally() {
    let (mut engine, mut controller) = engine(SR, 2);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 0.01, SR));
    controller.play_audio(1, 0.0, 0.0, 0.0);
    render(&mut engine, 2048);

    let events = controller.poll_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, AudioEvent::SourceEnded { track_id: 1, .. })));
    assert!(!controller.is_playing(1));
    assert!(controller.registry().get(1).is_none());

    // Stopping a finished track is a no-op
    controller.stop_audio(1);
}

#[test]
fn test_loop_region_applied_at_play() {
    let (mut engine, mut controller) = engine(SR, 1);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 0.1, SR));
    controller.set_loop_region(0.0, 0.01, true);
    assert!(controller.play_audio(1, 0.0, 0.0, 0.0));

    // 0.1 s of audio with a 10 ms loop: several wraps, never ends
    render(&mut engine, 4410);
    controller.poll_events();
    let state = controller.play_state(1).unwrap();
    assert!(state.is_playing);
    assert!(state.loop_count >= 9);
    let position = controller.track_position(1).unwrap();
    assert!((0.0..=0.01).contains(&position));

    // Editing the loop does not touch the running source
    controller.set_loop_region(0.0, 0.0, false);
    assert_eq!(controller.play_state(1).unwrap().loop_bounds, Some((0.0, 0.01)));
}

#[test]
fn test_loop_region_clamping() {
    let (_engine, mut controller) = engine(SR, 2);
    let region = controller.set_loop_region(-5.0, 3.0, true);
    assert_eq!((region.start, region.end), (0.0, 3.0));
    let region = controller.set_loop_region(10.0, 2.0, true);
    assert_eq!(region.end, 10.0);

    assert!(!controller.toggle_loop());
    let region = controller.get_loop_region();
    assert!(!region.enabled);
    assert_eq!(region.start, 10.0);
}

#[test]
fn test_position_follows_engine_clock() {
    let (mut engine, mut controller) = engine(SR, 2);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 3.0, SR));
    controller.play_audio(1, 0.5, 0.0, 0.0);
    render(&mut engine, SR as usize);
    assert_abs_diff_eq!(controller.track_position(1).unwrap(), 1.5, epsilon = 0.02);
}

#[test]
fn test_waveform_cached() {
    let (_engine, mut controller) = engine(SR, 2);
    controller.load_audio_file(1, sine_wav(1000.0, 0.5, 2.0, SR));
    let first = controller.get_waveform_data(1, 1024).unwrap();
    let second = controller.get_waveform_data(1, 1024).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 1024);
    assert!(first.iter().all(|m| *m <= 0.5 + 1e-6));
    assert!(controller.get_waveform_data(42, 1024).is_none());
}

#[test]
fn test_setters_are_no_ops_when_stopped() {
    let (_engine, mut controller) = engine(SR, 2);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 1.0, SR));
    assert!(!controller.set_track_volume(1, -6.0));
    assert!(!controller.set_track_pan(1, 0.5));
    assert!(!controller.set_track_input_gain(1, 3.0));
    assert!(!controller.set_stereo_width(1, 50.0));
    assert!(!controller.set_phase_flip(1, true));

    // Cached settings apply on the next play
    assert!(controller.play_audio(1, 0.0, -6.0, 0.5));
    let stage = controller.registry().get(1).unwrap();
    assert!(stage.phase_flipped());
    assert_abs_diff_eq!(stage.input_gain_db(), 3.0, epsilon = 1e-4);
    assert_abs_diff_eq!(stage.stereo_width_percent(), 50.0, epsilon = 1e-4);
    assert_abs_diff_eq!(stage.pan(), 0.5);
}

#[test]
fn test_gain_pan_and_phase_on_output() {
    let (mut engine, mut controller) = engine(48000, 2);
    controller.load_audio_file(1, constant_wav(0.5, 48000, 2, 48000));
    assert!(controller.play_audio(1, 0.0, 0.0, 0.0));
    let output = render(&mut engine, 256);
    // Centre pan leaves a stereo source untouched
    assert_abs_diff_eq!(output[100], 0.5, epsilon = 1e-5);
    assert_abs_diff_eq!(output[101], 0.5, epsilon = 1e-5);

    assert!(controller.set_phase_flip(1, true));
    let output = render(&mut engine, 256);
    assert_abs_diff_eq!(output[100], -0.5, epsilon = 1e-5);

    // Hard right folds the left channel into the right
    assert!(controller.set_phase_flip(1, false));
    assert!(controller.set_track_pan(1, 1.0));
    assert!(controller.set_track_volume(1, -6.0206));
    let output = render(&mut engine, 256);
    assert_abs_diff_eq!(output[100], 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(output[101], 0.5, epsilon = 1e-4);
}

#[test]
fn test_input_gain_is_pre_fader() {
    let (mut engine, mut controller) = engine(48000, 1);
    controller.load_audio_file(1, constant_wav(0.5, 48000, 1, 48000));
    controller.play_audio(1, 0.0, -6.0206, 0.0);
    controller.set_track_input_gain(1, 6.0206);
    let output = render(&mut engine, 128);
    assert_abs_diff_eq!(output[64], 0.5, epsilon = 1e-4);
}

#[test]
fn test_smooth_volume_ramps() {
    let (mut engine, mut controller) = engine(48000, 1);
    controller.load_audio_file(1, constant_wav(1.0, 48000, 1, 48000));
    controller.play_audio(1, 0.0, 0.0, 0.0);
    render(&mut engine, 512);

    assert!(controller.set_track_volume_smooth(1, -120.0));
    // 30 ms ramp = 1440 frames
    let output = render(&mut engine, 2048);
    assert!(output[0] > 0.99);
    assert!(output[700] > 0.4 && output[700] < 0.6);
    assert!(output[2000] < 1e-3);
    // No sample-to-sample step bigger than the ramp slope
    assert!(output.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-3));
}

#[test]
fn test_plugin_chain_hot_swap() {
    let (mut engine, mut controller) = engine(48000, 1);
    controller.load_audio_file(1, constant_wav(0.5, 48000, 1, 48000));
    assert!(!controller.set_plugin_chain(7, &["eq"]));

    controller.play_audio(1, 0.0, 0.0, 0.0);
    assert!(controller.set_plugin_chain(1, &["meter", "utility", "unknown-thing"]));
    let output = render(&mut engine, 256);
    assert_abs_diff_eq!(output[200], 0.5, epsilon = 1e-6);
    assert!(controller.poll_events().is_empty());
}

#[test]
fn test_one_khz_sine_scenario() {
    let config = EngineConfig::default();
    let (mut engine, mut controller) = create_engine(SR, 2, &config);
    assert!(controller.load_audio_file(1, sine_wav(1000.0, 0.5, 2.0, SR)));
    assert!(controller.play_audio(1, 0.0, 0.0, 0.0));

    let mut pipeline =
        MeteringPipeline::new(config.metering.clone(), SR).with_registry(controller.registry().clone());
    controller.start_metering(&mut pipeline).unwrap();

    render(&mut engine, 8192);
    assert!(pipeline.pump() >= 1);
    let snapshot = pipeline.latest_snapshot().unwrap();

    assert_abs_diff_eq!(snapshot.levels.peak_db, -6.02, epsilon = 0.05);
    for peak in &snapshot.levels.channel_peak_db {
        assert_abs_diff_eq!(*peak, -6.02, epsilon = 0.05);
    }
    assert!(snapshot.loudness.true_peak >= snapshot.levels.peak_db);
    assert_abs_diff_eq!(snapshot.loudness.phase_correlation, 1.0, epsilon = 1e-6);
    let track = snapshot.per_track_metrics.get(&1).unwrap();
    assert_abs_diff_eq!(track.peak_db, -6.02, epsilon = 0.05);
    assert!(pipeline.get_audio_levels().is_some());

    controller.stop_metering(&mut pipeline);
    assert!(pipeline.get_audio_levels().is_none());
}

#[test]
fn test_stop_with_full_command_queue_keeps_state() {
    let config = EngineConfig {
        command_queue_capacity: 2,
        ..EngineConfig::default()
    };
    let (mut engine, mut controller) = create_engine(SR, 2, &config);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 1.0, SR));
    assert!(controller.play_audio(1, 0.0, 0.0, 0.0));
    render(&mut engine, 256);

    // Fill the queue
    controller.set_metronome_volume(0.2);
    controller.set_metronome_volume(0.3);
    assert!(!controller.stop_audio(1));
    controller.stop_all_audio();
    assert!(controller.is_playing(1));
    assert!(controller.registry().contains(1));

    render(&mut engine, 256);
    assert_eq!(engine.active_voice_count(), 1);

    // Once the queue drains the stop goes through
    assert!(controller.stop_audio(1));
    render(&mut engine, 256);
    assert_eq!(engine.active_voice_count(), 0);
    assert!(!controller.is_playing(1));
    assert!(!controller.registry().contains(1));
}

#[test]
fn test_stopped_voice_is_freed_on_control_thread() {
    let (mut engine, mut controller) = engine(SR, 2);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 1.0, SR));
    controller.play_audio(1, 0.0, 0.0, 0.0);
    render(&mut engine, 256);

    assert!(controller.set_plugin_chain(1, &["delay"]));
    render(&mut engine, 256);
    // The replaced chain comes back
    assert_eq!(controller.collect_retired(), 1);

    controller.stop_audio(1);
    render(&mut engine, 256);
    assert_eq!(controller.collect_retired(), 1);
    assert_eq!(controller.collect_retired(), 0);
}

#[test]
fn test_remove_track_releases_buffer() {
    let (mut engine, mut controller) = engine(SR, 2);
    controller.load_audio_file(1, sine_wav(440.0, 0.5, 1.0, SR));
    controller.get_waveform_data(1, 256);
    assert!(controller.play_audio(1, 0.0, 0.0, 0.0));
    render(&mut engine, 256);
    let buffer = Arc::downgrade(&controller.track_buffer(1).unwrap());

    assert!(controller.remove_track(1));
    assert!(!controller.has_track(1));
    assert!(!controller.is_playing(1));
    assert!(controller.registry().get(1).is_none());
    assert!(controller.get_waveform_data(1, 256).is_none());
    assert!(!controller.play_audio(1, 0.0, 0.0, 0.0));

    // The audio thread still holds the voice until the stop is processed
    render(&mut engine, 256);
    controller.poll_events();
    assert!(buffer.upgrade().is_none());

    assert!(!controller.remove_track(1));
}
