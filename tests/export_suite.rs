#[allow(dead_code)]
#[path = "../src/bin/export_field.rs"]
mod export_field;

use clap::Parser;
use emphasis_field::audio::{AtomicSpectrum, BIN_COUNT};
use emphasis_field::bands::BandLayout;
use emphasis_field::params::{ParamKey, LIGHT_BACKGROUND};
use std::path::PathBuf;
use std::sync::Arc;

/// Minimal RIFF/WAVE with a 16-byte fmt chunk.
fn wav_bytes(format: u16, channels: u16, sample_rate: u32, bits: u16, data: &[u8]) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&format.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    out
}

fn pcm16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn tone(sample_rate: u32, hz: f32, seconds: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * seconds) as usize;
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / sample_rate as f32).sin() * 0.7)
        .collect()
}

#[test]
fn parse_args_defaults_are_stable() {
    let args = export_field::Cli::try_parse_from(["export_field", "--audio", "input.wav"])
        .expect("parse should succeed");

    assert_eq!(args.audio, PathBuf::from("input.wav"));
    assert_eq!(args.out, PathBuf::from("field.mp4"));
    assert_eq!(args.format, export_field::OutputFormat::Mp4);
    assert_eq!(args.width, 640);
    assert_eq!(args.height, 360);
    assert_eq!(args.fps, 30);
    assert_eq!(args.duration, None);
    assert_eq!(args.bands, BandLayout::Three);
    assert!(args.set.is_empty());
}

#[test]
fn parse_args_overrides_work() {
    let args = export_field::Cli::try_parse_from([
        "export_field",
        "--audio",
        "song.wav",
        "--out",
        "clips/out.rgba",
        "--format",
        "rgba",
        "--width",
        "320",
        "--height",
        "180",
        "--fps",
        "24",
        "--duration",
        "12.5",
        "--seed",
        "7",
        "--bands",
        "five",
        "--set",
        "drift=0",
        "--set",
        "fieldScale=80",
        "--background",
        "light",
        "--grain",
        "40",
    ])
    .expect("parse should succeed");

    assert_eq!(args.out, PathBuf::from("clips/out.rgba"));
    assert_eq!(args.format, export_field::OutputFormat::Rgba);
    assert_eq!((args.width, args.height, args.fps), (320, 180, 24));
    assert_eq!(args.duration, Some(12.5));
    assert_eq!(args.seed, 7);
    assert_eq!(args.bands, BandLayout::Five);
    assert_eq!(args.set, vec![(ParamKey::Drift, 0.0), (ParamKey::FieldScale, 80.0)]);
    assert_eq!(args.background, Some(LIGHT_BACKGROUND));
    assert_eq!(args.grain, Some(40.0));
}

#[test]
fn validate_rejects_degenerate_output() {
    let cases = [
        (vec!["--fps", "0"], "--fps"),
        (vec!["--width", "0"], "--width"),
        (vec!["--height", "0"], "--height"),
        (vec!["--duration", "0"], "--duration"),
        (vec!["--grain", "250"], "--grain"),
    ];
    for (extra, flag) in cases {
        let mut argv = vec!["export_field", "--audio", "song.wav"];
        argv.extend(extra);
        let args = export_field::Cli::try_parse_from(argv).expect("parse should succeed");
        let err = export_field::validate_args(&args).expect_err("validation must fail");
        assert!(err.to_string().contains(flag), "{err}");
    }
}

#[test]
fn duration_and_frame_math_is_deterministic() {
    assert!((export_field::compute_export_duration(30.0, None) - 30.0).abs() < 1e-6);
    assert!((export_field::compute_export_duration(30.0, Some(12.25)) - 12.25).abs() < 1e-6);
    assert!((export_field::compute_export_duration(5.0, Some(10.0)) - 5.0).abs() < 1e-6);
    assert_eq!(export_field::compute_export_duration(-1.0, None), 0.0);

    assert_eq!(export_field::compute_frame_count(2.0, 60), 120);
    assert_eq!(export_field::compute_frame_count(2.999, 30), 89);
    assert_eq!(export_field::compute_frame_count(0.01, 60), 1);
    assert_eq!(export_field::compute_frame_count(0.0, 30), 1);
}

#[test]
fn wav_pcm16_stereo_is_downmixed() {
    let data = pcm16(&[16384, -16384, 32767, 32767, -32768, 0]);
    let bytes = wav_bytes(1, 2, 44_100, 16, &data);
    let (sr, mono) = export_field::decode_wav_mono_f32(&bytes).expect("decode should succeed");
    assert_eq!(sr, 44_100);
    assert_eq!(mono.len(), 3);
    assert!(mono[0].abs() < 1e-6);
    assert!((mono[1] - 32767.0 / 32768.0).abs() < 1e-6);
    assert!((mono[2] + 0.5).abs() < 1e-6);
}

#[test]
fn wav_float32_mono_passes_through() {
    let data: Vec<u8> = [0.25f32, -0.75].iter().flat_map(|s| s.to_le_bytes()).collect();
    let bytes = wav_bytes(3, 1, 48_000, 32, &data);
    let (sr, mono) = export_field::decode_wav_mono_f32(&bytes).expect("decode should succeed");
    assert_eq!(sr, 48_000);
    assert_eq!(mono, vec![0.25f32, -0.75]);
}

#[test]
fn wav_decoder_rejects_bad_input() {
    use export_field::WavError;
    assert!(matches!(export_field::decode_wav_mono_f32(b"RIFF"), Err(WavError::TooSmall)));

    let mut bytes = wav_bytes(1, 1, 8_000, 16, &pcm16(&[0; 8]));
    bytes[0..4].copy_from_slice(b"RIFX");
    assert!(matches!(export_field::decode_wav_mono_f32(&bytes), Err(WavError::NotRiff)));

    let bytes = wav_bytes(1, 1, 8_000, 24, &[0; 24]);
    assert!(matches!(
        export_field::decode_wav_mono_f32(&bytes),
        Err(WavError::Unsupported { format: 1, bits: 24 })
    ));

    let mut bytes = wav_bytes(1, 1, 8_000, 16, &pcm16(&[0; 8]));
    bytes[36..40].copy_from_slice(b"junk");
    assert!(matches!(export_field::decode_wav_mono_f32(&bytes), Err(WavError::MissingData)));
}

#[test]
fn read_wav_reports_missing_files() {
    let path = std::env::temp_dir().join(format!("emphasis_field_{}_absent.wav", std::process::id()));
    assert!(export_field::read_wav_mono_f32(&path).is_err());
}

fn render_rgba(seed: u64, frames: usize) -> Vec<u8> {
    let seed_arg = seed.to_string();
    let args = export_field::Cli::try_parse_from([
        "export_field",
        "--audio",
        "unused.wav",
        "--format",
        "rgba",
        "--width",
        "48",
        "--height",
        "32",
        "--fps",
        "30",
        "--seed",
        seed_arg.as_str(),
        "--set",
        "drift=80",
        "--grain",
        "50",
    ])
    .expect("parse should succeed");
    let spectrum = Arc::new(AtomicSpectrum::new(48_000, BIN_COUNT));
    let mut vis = export_field::build_visualizer(&args, Arc::clone(&spectrum)).expect("build should succeed");
    let samples = tone(48_000, 120.0, 1.0);
    let mut sink = Vec::new();
    export_field::render_frames(&mut vis, &spectrum, &samples, 48_000, args.fps, frames, &mut sink)
        .expect("render should succeed");
    sink
}

#[test]
fn rgba_export_is_deterministic_per_seed() {
    let a = render_rgba(11, 12);
    assert_eq!(a.len(), 48 * 32 * 4 * 12);
    assert_eq!(a, render_rgba(11, 12));
    assert_ne!(a, render_rgba(12, 12));
}

#[test]
fn export_applies_flags_over_defaults() {
    let args = export_field::Cli::try_parse_from([
        "export_field",
        "--audio",
        "unused.wav",
        "--bands",
        "5",
        "--set",
        "overlap=10",
        "--background",
        "light",
    ])
    .expect("parse should succeed");
    let vis = export_field::build_visualizer(&args, Arc::new(AtomicSpectrum::new(48_000, BIN_COUNT)))
        .expect("build should succeed");
    assert!(vis.is_running());
    assert!(vis.has_audio_source());
    assert_eq!(vis.bands().len(), 5);
    assert_eq!(vis.control_params().overlap, 10.0);
    assert!(vis.is_light_background());
    assert_eq!(vis.size(), (640, 360));
}
