use crate::spectrum::SpectrumSource;
use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const FFT_SIZE: usize = 2048;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;
const TIME_SMOOTHING: f32 = 0.8;
const HOP: usize = 512;

/// Windowed FFT producing byte-scaled bin energies (0..=255) over a dB range.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    buf: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let hann = (0..FFT_SIZE)
            .map(|i| 0.5 - 0.5 * ((2.0 * PI * i as f32) / (FFT_SIZE as f32)).cos())
            .collect();
        Self {
            fft,
            hann,
            buf: vec![Complex { re: 0.0, im: 0.0 }; FFT_SIZE],
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    /// Analyze the newest `FFT_SIZE` samples of `window` (zero-padded on the left when short).
    pub fn process(&mut self, window: &[f32], out: &mut [u8]) {
        let tail = &window[window.len().saturating_sub(FFT_SIZE)..];
        let pad = FFT_SIZE - tail.len();
        for (i, c) in self.buf.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { tail[i - pad] };
            c.re = s * self.hann[i];
            c.im = 0.0;
        }

        self.fft.process(&mut self.buf);

        let scale = 1.0 / FFT_SIZE as f32;
        for (i, slot) in out.iter_mut().enumerate().take(BIN_COUNT) {
            let c = self.buf[i];
            let mag = (c.re * c.re + c.im * c.im).sqrt() * scale;
            let s = self.smoothed[i] * TIME_SMOOTHING + mag * (1.0 - TIME_SMOOTHING);
            self.smoothed[i] = s;
            *slot = db_to_byte(20.0 * s.max(1e-12).log10());
        }
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn db_to_byte(db: f32) -> u8 {
    let t = (db - MIN_DB) / (MAX_DB - MIN_DB);
    (t.clamp(0.0, 1.0) * 255.0) as u8
}

/// Latest spectrum snapshot shared between the analyzer thread and the frame loop.
pub struct AtomicSpectrum {
    seq: AtomicU64,
    bins: Box<[AtomicU8]>,
    sample_rate_hz: AtomicU32,
    ready: AtomicBool,
}

impl AtomicSpectrum {
    pub fn new(sample_rate_hz: u32, bin_count: usize) -> Self {
        Self {
            seq: AtomicU64::new(0),
            bins: (0..bin_count).map(|_| AtomicU8::new(0)).collect(),
            sample_rate_hz: AtomicU32::new(sample_rate_hz),
            ready: AtomicBool::new(false),
        }
    }

    pub fn store(&self, bins: &[u8]) {
        self.seq.fetch_add(1, Ordering::Release); // odd => write in progress
        for (dst, &src) in self.bins.iter().zip(bins) {
            dst.store(src, Ordering::Relaxed);
        }
        self.seq.fetch_add(1, Ordering::Release); // even => stable
        if !self.ready.swap(true, Ordering::AcqRel) {
            tracing::info!(bins = self.bins.len(), "audio spectrum ready");
        }
    }

    /// Force the ready flag, e.g. when a host resumes or suspends capture.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }
}

impl SpectrumSource for AtomicSpectrum {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz.load(Ordering::Relaxed)
    }

    fn read_bins(&self, out: &mut Vec<u8>) -> bool {
        out.resize(self.bins.len(), 0);
        loop {
            let v1 = self.seq.load(Ordering::Acquire);
            if v1 & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            for (dst, src) in out.iter_mut().zip(self.bins.iter()) {
                *dst = src.load(Ordering::Relaxed);
            }
            let v2 = self.seq.load(Ordering::Acquire);
            if v1 == v2 {
                return v1 > 0;
            }
        }
    }
}

pub fn list_input_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("enumerate input devices")?;

    let mut out = io::stdout();
    writeln!(out, "Input devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

/// Live microphone capture feeding an analyzer thread.
pub struct AudioSystem {
    _stream: cpal::Stream,
    stop: Arc<AtomicBool>,
    analyzer_handle: Option<thread::JoinHandle<()>>,
    spectrum: Arc<AtomicSpectrum>,
    pub sample_rate_hz: u32,
}

impl AudioSystem {
    pub fn new(device_query: Option<&str>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = select_input_device(&host, device_query)?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let supported = device
            .default_input_config()
            .context("get default input config")?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.clone().into();
        tracing::info!(device = %device_name, sample_rate_hz, channels, "opening input stream");

        let rb = HeapRb::<f32>::new((sample_rate_hz as usize).saturating_mul(2));
        let (mut prod, mut cons) = rb.split();

        let stop = Arc::new(AtomicBool::new(false));
        let spectrum = Arc::new(AtomicSpectrum::new(sample_rate_hz, BIN_COUNT));
        let spectrum_for_thread = Arc::clone(&spectrum);
        let stop_for_thread = Arc::clone(&stop);

        let err_fn = |err| tracing::warn!("audio stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            )?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };

        stream.play().context("start input stream")?;

        let analyzer_handle = thread::spawn(move || {
            analyze_loop(&mut cons, &stop_for_thread, &spectrum_for_thread)
        });

        Ok(Self {
            _stream: stream,
            stop,
            analyzer_handle: Some(analyzer_handle),
            spectrum,
            sample_rate_hz,
        })
    }

    pub fn spectrum(&self) -> Arc<AtomicSpectrum> {
        Arc::clone(&self.spectrum)
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.analyzer_handle.take() {
            let _ = h.join();
        }
        tracing::debug!("audio analyzer stopped");
    }
}

fn select_input_device(host: &cpal::Host, device_query: Option<&str>) -> anyhow::Result<cpal::Device> {
    let devices = host
        .input_devices()
        .context("enumerate input devices")?
        .collect::<Vec<_>>();

    if let Some(want) = device_query.map(|s| s.to_lowercase()) {
        return devices
            .into_iter()
            .find(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&want))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("no input device matching: {want}"));
    }

    host.default_input_device()
        .ok_or_else(|| anyhow!("no default input device found"))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut ringbuf::HeapProd<f32>,
) {
    let channels = channels.max(1);
    for frame in data.chunks(channels) {
        let acc: f32 = frame.iter().map(|s| s.to_float_sample()).sum();
        let _ = prod.try_push(acc / channels as f32);
    }
}

fn analyze_loop(cons: &mut ringbuf::HeapCons<f32>, stop: &AtomicBool, spectrum: &AtomicSpectrum) {
    let mut analyzer = SpectrumAnalyzer::new();
    let mut ring = vec![0.0f32; FFT_SIZE];
    let mut window = vec![0.0f32; FFT_SIZE];
    let mut bins = vec![0u8; BIN_COUNT];
    let mut write_pos = 0usize;
    let mut filled = 0usize;
    let mut since_last = 0usize;

    while !stop.load(Ordering::Relaxed) {
        let mut got_any = false;
        while let Some(s) = cons.try_pop() {
            got_any = true;
            ring[write_pos] = s;
            write_pos = (write_pos + 1) % FFT_SIZE;
            filled = (filled + 1).min(FFT_SIZE);
            since_last += 1;
            if filled == FFT_SIZE && since_last >= HOP {
                since_last = 0;
                for (i, slot) in window.iter_mut().enumerate() {
                    *slot = ring[(write_pos + i) % FFT_SIZE];
                }
                analyzer.process(&window, &mut bins);
                spectrum.store(&bins);
            }
        }

        if !got_any {
            thread::sleep(Duration::from_millis(1));
        }
    }
}
