use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use emphasis_field::audio::{AtomicSpectrum, SpectrumAnalyzer, BIN_COUNT, FFT_SIZE};
use emphasis_field::bands::BandLayout;
use emphasis_field::color::Rgb;
use emphasis_field::engine::Visualizer;
use emphasis_field::field::GrainTexture;
use emphasis_field::params::{parse_param_assignment, ParamKey};
use emphasis_field::prefs::AppPrefs;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT: &str = "field.mp4";
const DEFAULT_SEED: u64 = 0xF1E1_D2026;
const GRAIN_TILE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// H.264 + AAC through ffmpeg.
    Mp4,
    /// Headerless RGBA8 frames, back to back.
    Rgba,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "export_field",
    version,
    about = "Offline emphasis field export (WAV input -> MP4 or raw RGBA frames)"
)]
pub(crate) struct Cli {
    #[arg(long, value_name = "WAV")]
    pub(crate) audio: PathBuf,

    #[arg(long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    pub(crate) out: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Mp4)]
    pub(crate) format: OutputFormat,

    #[arg(long, default_value_t = 640)]
    pub(crate) width: usize,

    #[arg(long, default_value_t = 360)]
    pub(crate) height: usize,

    #[arg(long, default_value_t = 30)]
    pub(crate) fps: u32,

    #[arg(long, value_name = "SECONDS")]
    pub(crate) duration: Option<f32>,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub(crate) seed: u64,

    #[arg(long, value_enum, default_value_t = BandLayout::Three)]
    pub(crate) bands: BandLayout,

    /// Start from a saved prefs file; flags below still win.
    #[arg(long)]
    pub(crate) prefs: Option<PathBuf>,

    #[arg(long = "set", value_parser = parse_set)]
    pub(crate) set: Vec<(ParamKey, f32)>,

    #[arg(long, value_parser = parse_background)]
    pub(crate) background: Option<Rgb>,

    #[arg(long)]
    pub(crate) grain: Option<f32>,
}

#[derive(Debug, Error)]
pub(crate) enum WavError {
    #[error("wav too small")]
    TooSmall,
    #[error("not a RIFF/WAVE file")]
    NotRiff,
    #[error("invalid fmt chunk")]
    BadFmt,
    #[error("missing data chunk")]
    MissingData,
    #[error("unsupported wav format: audio_format={format} bits={bits} (supported: PCM16, Float32)")]
    Unsupported { format: u16, bits: u16 },
}

fn parse_set(raw: &str) -> std::result::Result<(ParamKey, f32), String> {
    parse_param_assignment(raw).ok_or_else(|| format!("expected <param>=<0..100>, got {raw:?}"))
}

fn parse_background(raw: &str) -> std::result::Result<Rgb, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "dark" => Ok(emphasis_field::params::DARK_BACKGROUND),
        "light" => Ok(emphasis_field::params::LIGHT_BACKGROUND),
        other => Rgb::parse_hex(other).map_err(|e| e.to_string()),
    }
}

pub(crate) fn compute_export_duration(audio_duration_s: f32, duration_cap_s: Option<f32>) -> f32 {
    let base = audio_duration_s.max(0.0);
    match duration_cap_s {
        Some(cap) => base.min(cap.max(0.0)),
        None => base,
    }
}

pub(crate) fn compute_frame_count(duration_s: f32, fps: u32) -> usize {
    ((duration_s.max(0.0) * fps as f32).floor() as usize).max(1)
}

pub(crate) fn validate_args(args: &Cli) -> Result<()> {
    if args.width == 0 {
        bail!("--width must be >= 1");
    }
    if args.height == 0 {
        bail!("--height must be >= 1");
    }
    if args.fps == 0 {
        bail!("--fps must be >= 1");
    }
    if let Some(cap) = args.duration {
        if !(cap > 0.0) {
            bail!("--duration must be > 0 seconds");
        }
    }
    if let Some(g) = args.grain {
        if !(0.0..=100.0).contains(&g) {
            bail!("--grain must be within 0..100");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    run(Cli::parse())
}

fn run(args: Cli) -> Result<()> {
    validate_args(&args)?;
    if args.format == OutputFormat::Mp4 {
        ensure_ffmpeg_available()?;
    }

    let (sample_rate_hz, samples) = read_wav_mono_f32(&args.audio)
        .with_context(|| format!("read wav {}", args.audio.display()))?;
    if samples.is_empty() {
        bail!("wav had no samples");
    }

    let audio_duration_s = samples.len() as f32 / sample_rate_hz as f32;
    let export_duration_s = compute_export_duration(audio_duration_s, args.duration);
    let frame_count = compute_frame_count(export_duration_s, args.fps);
    let encoded_duration_s = frame_count as f32 / args.fps as f32;

    let spectrum = Arc::new(AtomicSpectrum::new(sample_rate_hz, BIN_COUNT));
    let mut vis = build_visualizer(&args, Arc::clone(&spectrum))?;

    let parent = match args.out.parent() {
        Some(p) if p != Path::new("") => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create output directory {}", parent.display()))?;

    tracing::info!(
        frames = frame_count,
        fps = args.fps,
        width = args.width,
        height = args.height,
        seed = args.seed,
        "exporting"
    );

    match args.format {
        OutputFormat::Mp4 => {
            let mut ffmpeg = spawn_ffmpeg(&args.audio, &args.out, args.width, args.height, args.fps, encoded_duration_s)?;
            let mut ffmpeg_in = ffmpeg
                .stdin
                .take()
                .context("failed to open ffmpeg stdin for rawvideo input")?;
            render_frames(&mut vis, &spectrum, &samples, sample_rate_hz, args.fps, frame_count, &mut ffmpeg_in)?;
            drop(ffmpeg_in);
            let status = ffmpeg.wait().context("wait for ffmpeg")?;
            if !status.success() {
                bail!("ffmpeg exited with status {status}");
            }
        }
        OutputFormat::Rgba => {
            let file = File::create(&args.out).with_context(|| format!("create {}", args.out.display()))?;
            let mut sink = BufWriter::new(file);
            render_frames(&mut vis, &spectrum, &samples, sample_rate_hz, args.fps, frame_count, &mut sink)?;
            sink.flush().context("flush raw frames")?;
        }
    }

    println!(
        "exported {} frames @ {} fps ({}x{}, {:.3}s) -> {}",
        frame_count,
        args.fps,
        args.width,
        args.height,
        encoded_duration_s,
        args.out.display()
    );
    Ok(())
}

pub(crate) fn build_visualizer(args: &Cli, spectrum: Arc<AtomicSpectrum>) -> Result<Visualizer> {
    let mut prefs = match &args.prefs {
        Some(path) => AppPrefs::load(Some(path.as_path())).with_context(|| format!("load prefs {}", path.display()))?,
        None => AppPrefs::default(),
    };
    prefs.params.extend(args.set.iter().copied());
    if args.background.is_some() {
        prefs.background = args.background;
    }
    if args.grain.is_some() {
        prefs.grain = args.grain;
    }

    let mut vis = Visualizer::new(args.bands, args.width, args.height, args.seed);
    prefs.apply_to(&mut vis);
    vis.set_grain_texture(Some(GrainTexture::generate(GRAIN_TILE, args.seed)));
    vis.set_audio_source(Some(Box::new(spectrum)));
    vis.start();
    Ok(vis)
}

/// Analyze the audio ending at each frame's timestamp, step the field by one
/// frame period and write the RGBA buffer.
pub(crate) fn render_frames(
    vis: &mut Visualizer,
    spectrum: &AtomicSpectrum,
    samples: &[f32],
    sample_rate_hz: u32,
    fps: u32,
    frame_count: usize,
    sink: &mut dyn Write,
) -> Result<()> {
    let mut analyzer = SpectrumAnalyzer::new();
    let mut window = vec![0.0f32; FFT_SIZE];
    let mut bins = vec![0u8; BIN_COUNT];
    let fps_f = fps.max(1) as f32;
    let dt = 1.0 / fps_f;
    let sr = sample_rate_hz as f32;
    let progress_every = (fps as usize * 5).max(1);

    for frame in 0..frame_count {
        let t = frame as f32 / fps_f;
        let sample_end = ((t * sr).floor() as usize).min(samples.len());
        fill_window(samples, sample_end, &mut window);
        analyzer.process(&window, &mut bins);
        spectrum.store(&bins);

        let pixels = vis.step(dt);
        sink.write_all(pixels).context("write frame")?;

        if (frame + 1) % progress_every == 0 {
            tracing::info!(frame = frame + 1, total = frame_count, "progress");
        }
    }
    Ok(())
}

fn fill_window(samples: &[f32], sample_end: usize, out: &mut [f32]) {
    out.fill(0.0);
    let end = sample_end.min(samples.len());
    let src = &samples[end.saturating_sub(out.len())..end];
    let offset = out.len() - src.len();
    out[offset..].copy_from_slice(src);
}

fn ensure_ffmpeg_available() -> Result<()> {
    match Command::new("ffmpeg")
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            bail!("ffmpeg not found in PATH (install ffmpeg or use --format rgba)")
        }
        Err(err) => Err(anyhow!("failed to run ffmpeg: {err}")),
    }
}

fn spawn_ffmpeg(
    audio_path: &Path,
    out_path: &Path,
    width: usize,
    height: usize,
    fps: u32,
    duration_s: f32,
) -> Result<std::process::Child> {
    let size = format!("{width}x{height}");
    let rate = fps.to_string();
    let duration = format!("{duration_s:.6}");
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
        .args(["-video_size", size.as_str(), "-framerate", rate.as_str(), "-i", "-"])
        .arg("-i")
        .arg(audio_path)
        .args(["-map", "0:v:0", "-map", "1:a:0"])
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac"])
        .args(["-t", duration.as_str(), "-shortest", "-movflags", "+faststart"])
        .arg(out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    cmd.spawn()
        .with_context(|| format!("spawn ffmpeg for output {}", out_path.display()))
}

pub(crate) fn read_wav_mono_f32(path: &Path) -> Result<(u32, Vec<f32>)> {
    let bytes = fs::read(path)?;
    Ok(decode_wav_mono_f32(&bytes)?)
}

/// PCM16 or Float32 RIFF/WAVE, downmixed to mono.
pub(crate) fn decode_wav_mono_f32(bytes: &[u8]) -> std::result::Result<(u32, Vec<f32>), WavError> {
    if bytes.len() < 44 {
        return Err(WavError::TooSmall);
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::NotRiff);
    }

    let le16 = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
    let le32 = |o: usize| u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);

    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut data: Option<&[u8]> = None;
    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = le32(pos + 4) as usize;
        let start = pos + 8;
        let end = start.saturating_add(size);
        if end > bytes.len() {
            break;
        }
        if id == b"fmt " {
            if size < 16 {
                return Err(WavError::BadFmt);
            }
            fmt = Some((le16(start), le16(start + 2), le32(start + 4), le16(start + 14)));
        } else if id == b"data" {
            data = Some(&bytes[start..end]);
        }
        pos = end + (size % 2);
    }

    let (format, channels, sample_rate, bits) = fmt.ok_or(WavError::BadFmt)?;
    let data = data.ok_or(WavError::MissingData)?;
    if channels == 0 || sample_rate == 0 {
        return Err(WavError::BadFmt);
    }
    let ch = channels as usize;

    let decoded: Vec<f32> = match (format, bits) {
        (1, 16) => data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
        (3, 32) => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        _ => return Err(WavError::Unsupported { format, bits }),
    };

    let mono = decoded
        .chunks_exact(ch)
        .map(|frame| (frame.iter().sum::<f32>() / ch as f32).clamp(-1.0, 1.0))
        .collect();
    Ok((sample_rate, mono))
}
