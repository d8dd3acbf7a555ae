use crate::bands::Band;
use std::sync::Arc;

/// Provider of frequency-bin energies in 0..=255 units.
///
/// Only queried once `is_ready` reports true; capture backends may start suspended.
pub trait SpectrumSource {
    fn is_ready(&self) -> bool;
    fn sample_rate_hz(&self) -> u32;
    /// Copy the newest snapshot into `out`. Returns false when nothing is available.
    fn read_bins(&self, out: &mut Vec<u8>) -> bool;
}

impl<T: SpectrumSource + ?Sized> SpectrumSource for Arc<T> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn sample_rate_hz(&self) -> u32 {
        (**self).sample_rate_hz()
    }

    fn read_bins(&self, out: &mut Vec<u8>) -> bool {
        (**self).read_bins(out)
    }
}

/// Fixed bin snapshot, mostly for tests and offline tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSpectrum {
    pub sample_rate_hz: u32,
    pub bins: Vec<u8>,
    pub ready: bool,
}

impl StaticSpectrum {
    pub fn new(sample_rate_hz: u32, bins: Vec<u8>) -> Self {
        Self {
            sample_rate_hz,
            bins,
            ready: true,
        }
    }

    pub fn silent(sample_rate_hz: u32, bin_count: usize) -> Self {
        Self::new(sample_rate_hz, vec![0; bin_count])
    }

    /// Set every bin covering `[min_hz, max_hz)` to `energy`.
    pub fn fill_range(&mut self, min_hz: f32, max_hz: f32, energy: u8) {
        if let Some((lo, hi)) = bin_range(min_hz, max_hz, self.sample_rate_hz, self.bins.len()) {
            self.bins[lo..hi].fill(energy);
        }
    }
}

impl SpectrumSource for StaticSpectrum {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn read_bins(&self, out: &mut Vec<u8>) -> bool {
        out.clear();
        out.extend_from_slice(&self.bins);
        true
    }
}

/// Bin index range `[lo, hi)` covering a frequency band, or `None` if it is narrower
/// than one bin.
pub fn bin_range(min_hz: f32, max_hz: f32, sample_rate_hz: u32, bin_count: usize) -> Option<(usize, usize)> {
    if bin_count == 0 || sample_rate_hz == 0 {
        return None;
    }
    let nyquist = sample_rate_hz as f32 * 0.5;
    let bin_hz = nyquist / bin_count as f32;
    let lo = (min_hz.max(0.0) / bin_hz).floor() as usize;
    let hi = ((max_hz.max(0.0) / bin_hz).floor() as usize).min(bin_count);
    (lo < hi).then_some((lo, hi))
}

/// Mean bin energy of one band, normalized to [0, 1].
pub fn band_amplitude(bins: &[u8], sample_rate_hz: u32, band: &Band) -> f32 {
    let Some((lo, hi)) = bin_range(band.min_hz, band.max_hz, sample_rate_hz, bins.len()) else {
        return 0.0;
    };
    let sum: u32 = bins[lo..hi].iter().map(|&b| b as u32).sum();
    (sum as f32 / (hi - lo) as f32 / 255.0).clamp(0.0, 1.0)
}

/// Turns the latest bin snapshot into one raw amplitude per band.
pub struct SpectrumSampler {
    scratch: Vec<u8>,
    amplitudes: Vec<f32>,
}

impl SpectrumSampler {
    pub fn new() -> Self {
        Self {
            scratch: Vec::new(),
            amplitudes: Vec::new(),
        }
    }

    /// Reads the source without mutating it. A missing or not-ready source yields silence.
    pub fn sample(&mut self, source: Option<&dyn SpectrumSource>, bands: &[Band]) -> &[f32] {
        self.amplitudes.clear();
        self.amplitudes.resize(bands.len(), 0.0);

        let Some(source) = source else {
            return &self.amplitudes;
        };
        if !source.is_ready() || !source.read_bins(&mut self.scratch) {
            return &self.amplitudes;
        }

        let sr = source.sample_rate_hz();
        for (slot, band) in self.amplitudes.iter_mut().zip(bands) {
            *slot = band_amplitude(&self.scratch, sr, band);
        }
        &self.amplitudes
    }
}

impl Default for SpectrumSampler {
    fn default() -> Self {
        Self::new()
    }
}
