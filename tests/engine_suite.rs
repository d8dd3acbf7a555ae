use crossterm::event::{KeyCode, KeyModifiers};
use emphasis_field::app::{build_hud, handle_key, KeyOutcome, UiState};
use emphasis_field::audio::{AtomicSpectrum, SpectrumAnalyzer, BIN_COUNT, FFT_SIZE};
use emphasis_field::bands::BandLayout;
use emphasis_field::engine::{FrameClock, Visualizer};
use emphasis_field::params::{ColorPatch, Palette, ParamKey, DARK_BACKGROUND, LIGHT_BACKGROUND};
use emphasis_field::color::Rgb;
use emphasis_field::spectrum::{SpectrumSource, StaticSpectrum};
use glam::Vec2;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: f32 = 1.0 / 60.0;

fn visualizer() -> Visualizer {
    Visualizer::new(BandLayout::Three, 120, 80, 99)
}

// ── Lifecycle ──────────────────────────────────────────────────────────────

#[test]
fn start_and_stop_are_idempotent() {
    let mut vis = visualizer();
    assert!(!vis.is_running());
    assert!(!vis.tick(Instant::now()), "stopped visualizer must not tick");

    vis.start();
    vis.start();
    assert!(vis.is_running());
    assert!(vis.tick(Instant::now()));

    vis.stop();
    vis.stop();
    assert!(!vis.is_running());
    assert!(!vis.tick(Instant::now()));
}

#[test]
fn render_static_paints_without_advancing() {
    let mut vis = visualizer();
    vis.set_control_params(&[(ParamKey::Drift, 100.0), (ParamKey::Attack, 80.0)]);
    let mut spec = StaticSpectrum::silent(48_000, 1024);
    spec.fill_range(20.0, 16_000.0, 200);
    vis.set_audio_source(Some(Box::new(spec)));
    for _ in 0..10 {
        vis.step(FRAME);
    }
    let amps = vis.display_amplitudes().to_vec();
    let offsets: Vec<Vec2> = (0..3).map(|i| vis.drift().offset(i)).collect();
    let frame = vis.pixels().to_vec();

    let painted = vis.render_static().to_vec();
    assert_eq!(painted, frame);
    assert_eq!(vis.display_amplitudes(), amps.as_slice());
    let after: Vec<Vec2> = (0..3).map(|i| vis.drift().offset(i)).collect();
    assert_eq!(after, offsets);
}

#[test]
fn frame_clock_clamps_stalls() {
    let mut clock = FrameClock::default();
    let t0 = Instant::now();
    assert_eq!(clock.tick(t0), 0.0);
    let dt = clock.tick(t0 + Duration::from_millis(16));
    assert!((dt - 0.016).abs() < 1e-4);
    assert!((clock.tick(t0 + Duration::from_secs(3)) - 0.1).abs() < 1e-6);
    // Time going backwards is a zero step.
    assert_eq!(clock.tick(t0), 0.0);
}

#[test]
fn paused_repaint_respects_a_shrunken_drift_radius() {
    let mut vis = Visualizer::new(BandLayout::Three, 1000, 1000, 17);
    vis.set_control_params(&[(ParamKey::Drift, 100.0), (ParamKey::Anchor, 0.0)]);
    let pinned = vis.drift().effective_radius(100.0, 100.0);
    let mut far = false;
    for _ in 0..6000 {
        vis.step(FRAME);
        if (0..3).any(|i| vis.drift().offset(i).length() > pinned * 1.5) {
            far = true;
            break;
        }
    }
    assert!(far, "drift=100 should roam past the pinned radius");

    vis.stop();
    vis.set_control_params(&[(ParamKey::Anchor, 100.0)]);
    vis.render_static();
    for (i, v) in vis.visuals().iter().enumerate() {
        assert!(vis.drift().offset(i).length() <= pinned + 1e-3);
        let home = vis.anchor_positions()[i] / 100.0 * Vec2::splat(1000.0);
        assert!((v.center - home).length() <= pinned + 1e-3, "band {i} painted at {:?}", v.center);
    }

    vis.set_control_params(&[(ParamKey::Anchor, 0.0)]);
    vis.resize(200, 200);
    vis.render_static();
    let radius = vis.drift().effective_radius(100.0, 0.0);
    assert!((radius - 44.0).abs() < 1e-3);
    for i in 0..3 {
        assert!(vis.drift().offset(i).length() <= radius + 1e-3);
    }
}

// ── Control surface ────────────────────────────────────────────────────────

#[test]
fn control_params_merge_between_frames() {
    let mut vis = visualizer();
    vis.set_control_params(&[(ParamKey::Drift, 10.0)]);
    vis.step(FRAME);
    vis.set_control_params(&[(ParamKey::Overlap, 90.0)]);
    let p = vis.control_params();
    assert_eq!(p.drift, 10.0);
    assert_eq!(p.overlap, 90.0);
    assert_eq!(p.anchor, 50.0);
}

#[test]
fn color_patches_merge_and_ignore_unknown_bands() {
    let mut vis = visualizer();
    let before = vis.colors().clone();
    vis.set_control_colors(&ColorPatch {
        bands: vec![(1, Rgb::new(1, 2, 3)), (9, Rgb::new(4, 5, 6))],
        background: None,
    });
    assert_eq!(vis.colors().band(0), before.band(0));
    assert_eq!(vis.colors().band(1), Rgb::new(1, 2, 3));
    assert_eq!(vis.colors().band(2), before.band(2));
    assert_eq!(vis.colors().background, DARK_BACKGROUND);
}

#[test]
fn palettes_cycle_through_all_bands() {
    let mut vis = Visualizer::new(BandLayout::Five, 50, 50, 1);
    vis.colors_mut().apply_palette(Palette::Lagoon);
    assert_eq!(vis.colors().bands.to_vec(), Palette::Lagoon.colors().to_vec());
    assert_eq!(Palette::Citrus.next(), Palette::Ember);
}

#[test]
fn stages_run_emphasis_then_smoothing_then_compression() {
    let mut spec = StaticSpectrum::silent(48_000, 1024);
    spec.fill_range(20.0, 250.0, 255);
    let mut vis = visualizer();
    vis.set_audio_source(Some(Box::new(spec)));
    vis.set_control_params(&[
        (ParamKey::LowEmphasis, 25.0),
        (ParamKey::Attack, 100.0),
        (ParamKey::Compression, 100.0),
    ]);

    let k = 1.0 - (-0.05f32).exp();
    // Emphasis halves the loud low band before the smoother sees it.
    let first = 0.5 * k;
    vis.step(FRAME);
    let display = vis.display_amplitudes();
    assert!((display[0] - (0.4 + 0.2 * first)).abs() < 1e-4, "{display:?}");
    assert!((display[0] - 0.4049).abs() < 1e-4);
    assert!((display[1] - 0.4).abs() < 1e-6);
    assert!((display[2] - 0.4).abs() < 1e-6);

    // Compression is applied to the output only; the smoother keeps its own state.
    let second = first + (0.5 - first) * k;
    vis.step(FRAME);
    assert!((vis.display_amplitudes()[0] - (0.4 + 0.2 * second)).abs() < 1e-4);
}

#[test]
fn each_band_reads_its_own_emphasis_group() {
    let mut vis = Visualizer::new(BandLayout::Five, 80, 60, 2);
    vis.set_audio_source(Some(Box::new(StaticSpectrum::new(48_000, vec![102; 1024]))));
    vis.set_control_params(&[
        (ParamKey::LowEmphasis, 0.0),
        (ParamKey::MidEmphasis, 100.0),
        (ParamKey::HighEmphasis, 50.0),
    ]);
    vis.step(FRAME);
    let display = vis.display_amplitudes();
    let expected = [0.0f32, 0.0, 0.8, 0.4, 0.4];
    for (i, (&got, &want)) in display.iter().zip(&expected).enumerate() {
        assert!((got - want).abs() < 1e-4, "band {i}: {got} vs {want}");
    }

    let mut vis = visualizer();
    vis.set_audio_source(Some(Box::new(StaticSpectrum::new(48_000, vec![102; 1024]))));
    vis.set_control_params(&[(ParamKey::LowEmphasis, 100.0), (ParamKey::HighEmphasis, 0.0)]);
    vis.step(FRAME);
    let display = vis.display_amplitudes();
    assert!((display[0] - 0.8).abs() < 1e-4);
    assert!((display[1] - 0.4).abs() < 1e-4);
    assert!(display[2].abs() < 1e-6);
}

// ── Position surface ───────────────────────────────────────────────────────

#[test]
fn anchors_are_seeded_and_in_the_inner_area() {
    let a = visualizer();
    let b = visualizer();
    assert_eq!(a.anchor_positions(), b.anchor_positions());
    assert_eq!(a.anchor_positions().len(), 3);
    for p in a.anchor_positions() {
        assert!((15.0..=85.0).contains(&p.x) && (15.0..=85.0).contains(&p.y), "{p:?}");
    }
    let c = Visualizer::new(BandLayout::Three, 120, 80, 100);
    assert_ne!(a.anchor_positions(), c.anchor_positions());
}

#[test]
fn anchor_updates_clamp_and_skip_unknown_bands() {
    let mut vis = visualizer();
    let before = vis.anchor_positions().to_vec();
    vis.set_anchor_positions(&[
        (0, Vec2::new(-20.0, 150.0)),
        (2, Vec2::new(10.0, 90.0)),
        (7, Vec2::new(50.0, 50.0)),
        (1, Vec2::new(f32::NAN, 3.0)),
    ]);
    let after = vis.anchor_positions();
    assert_eq!(after[0], Vec2::new(0.0, 100.0));
    assert_eq!(after[1], before[1]);
    assert_eq!(after[2], Vec2::new(10.0, 90.0));
}

#[test]
fn anchors_map_to_viewport_pixels() {
    let mut vis = Visualizer::new(BandLayout::Three, 200, 100, 5);
    vis.set_control_params(&[(ParamKey::Drift, 0.0)]);
    vis.set_anchor_positions(&[(0, Vec2::new(25.0, 50.0))]);
    vis.step(FRAME);
    assert_eq!(vis.visuals()[0].center, Vec2::new(50.0, 50.0));
}

// ── Viewport ───────────────────────────────────────────────────────────────

#[test]
fn resize_reallocates_and_rescales_drift() {
    let mut vis = visualizer();
    vis.step(FRAME);
    assert_eq!(vis.pixels().len(), 120 * 80 * 4);

    vis.resize(300, 200);
    assert_eq!(vis.size(), (300, 200));
    assert!((vis.drift().config().max_radius_px - 44.0).abs() < 1e-3);
    vis.step(FRAME);
    assert_eq!(vis.pixels().len(), 300 * 200 * 4);
}

#[test]
fn instances_do_not_share_state() {
    let mut a = visualizer();
    let mut b = visualizer();
    a.set_control_params(&[(ParamKey::Drift, 100.0)]);
    for _ in 0..30 {
        a.step(FRAME);
        b.step(FRAME);
    }
    assert_eq!(b.control_params().drift, 50.0);
    assert_ne!(a.drift().offset(0), b.drift().offset(0));
}

// ── Audio source ───────────────────────────────────────────────────────────

#[test]
fn atomic_spectrum_is_silent_until_first_store() {
    let spectrum = Arc::new(AtomicSpectrum::new(48_000, BIN_COUNT));
    let mut vis = visualizer();
    vis.set_audio_source(Some(Box::new(Arc::clone(&spectrum))));
    vis.step(FRAME);
    assert!(!spectrum.is_ready());
    assert!(vis.raw_amplitudes().iter().all(|&a| a == 0.0));

    spectrum.store(&vec![255; BIN_COUNT]);
    assert!(spectrum.is_ready());
    vis.step(FRAME);
    assert!(vis.raw_amplitudes().iter().all(|&a| a > 0.99));

    spectrum.set_ready(false);
    vis.step(FRAME);
    assert!(vis.raw_amplitudes().iter().all(|&a| a == 0.0));
}

#[test]
fn analyzer_finds_a_low_tone() {
    let sr = 48_000.0f32;
    let window: Vec<f32> = (0..FFT_SIZE)
        .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / sr).sin() * 0.8)
        .collect();
    let mut analyzer = SpectrumAnalyzer::new();
    let mut bins = vec![0u8; BIN_COUNT];
    // Let the temporal smoothing settle.
    for _ in 0..40 {
        analyzer.process(&window, &mut bins);
    }
    let spec = StaticSpectrum::new(48_000, bins);
    let mut vis = visualizer();
    vis.set_audio_source(Some(Box::new(spec)));
    vis.step(FRAME);
    let raw = vis.raw_amplitudes();
    assert!(raw[0] > raw[2], "low {} vs high {}", raw[0], raw[2]);
    assert!(raw[0] > 0.3);
}

// ── Interactive controls ───────────────────────────────────────────────────

#[test]
fn arrows_select_and_nudge_parameters() {
    let mut vis = visualizer();
    let mut ui = UiState::default();
    assert_eq!(handle_key(KeyCode::Down, KeyModifiers::NONE, &mut ui, &mut vis), KeyOutcome::Continue);
    assert_eq!(ui.selected, ParamKey::Decay);
    handle_key(KeyCode::Right, KeyModifiers::NONE, &mut ui, &mut vis);
    assert_eq!(vis.control_params().decay, 5.0);
    handle_key(KeyCode::Right, KeyModifiers::SHIFT, &mut ui, &mut vis);
    assert_eq!(vis.control_params().decay, 6.0);
    for _ in 0..5 {
        handle_key(KeyCode::Left, KeyModifiers::NONE, &mut ui, &mut vis);
    }
    assert_eq!(vis.control_params().decay, 0.0);
    handle_key(KeyCode::Up, KeyModifiers::NONE, &mut ui, &mut vis);
    handle_key(KeyCode::Up, KeyModifiers::NONE, &mut ui, &mut vis);
    assert_eq!(ui.selected, ParamKey::Compression);
}

#[test]
fn space_pauses_and_resumes() {
    let mut vis = visualizer();
    vis.start();
    let mut ui = UiState::default();
    handle_key(KeyCode::Char(' '), KeyModifiers::NONE, &mut ui, &mut vis);
    assert!(ui.paused);
    assert!(!vis.is_running());
    handle_key(KeyCode::Char(' '), KeyModifiers::NONE, &mut ui, &mut vis);
    assert!(!ui.paused);
    assert!(vis.is_running());
}

#[test]
fn toggles_and_quit() {
    let mut vis = visualizer();
    let mut ui = UiState::default();

    handle_key(KeyCode::Char('b'), KeyModifiers::NONE, &mut ui, &mut vis);
    assert_eq!(vis.colors().background, LIGHT_BACKGROUND);
    handle_key(KeyCode::Char('b'), KeyModifiers::NONE, &mut ui, &mut vis);
    assert_eq!(vis.colors().background, DARK_BACKGROUND);

    handle_key(KeyCode::Char('c'), KeyModifiers::NONE, &mut ui, &mut vis);
    assert_eq!(ui.palette, Palette::Lagoon);
    assert_eq!(vis.colors().band(0), Palette::Lagoon.colors()[0]);

    let before = vis.anchor_positions().to_vec();
    handle_key(KeyCode::Char('r'), KeyModifiers::NONE, &mut ui, &mut vis);
    assert_ne!(vis.anchor_positions(), before.as_slice());

    handle_key(KeyCode::Char('g'), KeyModifiers::NONE, &mut ui, &mut vis);
    assert_eq!(vis.grain_intensity(), 25.0);
    vis.set_grain_intensity(100.0);
    handle_key(KeyCode::Char('g'), KeyModifiers::NONE, &mut ui, &mut vis);
    assert_eq!(vis.grain_intensity(), 0.0);

    assert_eq!(handle_key(KeyCode::Char('i'), KeyModifiers::NONE, &mut ui, &mut vis), KeyOutcome::Relayout);
    assert!(!ui.show_hud);
    handle_key(KeyCode::Char('?'), KeyModifiers::NONE, &mut ui, &mut vis);
    assert!(ui.show_help);

    assert_eq!(handle_key(KeyCode::Char('q'), KeyModifiers::NONE, &mut ui, &mut vis), KeyOutcome::Quit);
    assert_eq!(handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL, &mut ui, &mut vis), KeyOutcome::Quit);
}

#[test]
fn hud_names_the_selected_parameter() {
    let mut vis = visualizer();
    vis.set_control_params(&[(ParamKey::FieldScale, 42.0)]);
    vis.step(FRAME);
    let ui = UiState {
        selected: ParamKey::FieldScale,
        ..UiState::default()
    };
    let (hud, highlight) = build_hud(&ui, &vis, 59.9, false, "halfblock");
    let first = hud.lines().next().unwrap_or_default();
    assert!(first.starts_with("Field Scale:  42"), "{first}");
    assert!(hud.contains("Audio: waiting"));
    assert!(hud.contains("low"));
    assert_eq!(highlight, Some(0));
}
