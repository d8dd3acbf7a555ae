use crate::bands::{Band, BandLayout};
use crate::color::is_light_background;
use crate::drift::{DriftConfig, DriftEngine};
use crate::field::{BandVisual, FieldRenderer, GrainTexture, RenderProfile};
use crate::params::{ColorPatch, ColorState, ControlParams, ParamKey};
use crate::shaping::{compression, emphasis};
use crate::smoothing::{TemporalSmoother, MAX_FRAME_DT};
use crate::spectrum::{SpectrumSampler, SpectrumSource};
use glam::Vec2;
use std::time::Instant;

/// Elapsed time between ticks, clamped so stalls never produce a huge step.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Seconds since the previous tick; zero on the first tick after a reset.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = match self.last {
            Some(prev) => now.saturating_duration_since(prev).as_secs_f32(),
            None => 0.0,
        };
        self.last = Some(now);
        dt.clamp(0.0, MAX_FRAME_DT)
    }
}

/// One visualizer instance. Owns every piece of per-frame state, so several
/// instances can run side by side.
pub struct Visualizer {
    layout: BandLayout,
    params: ControlParams,
    colors: ColorState,
    anchors: Vec<Vec2>,
    source: Option<Box<dyn SpectrumSource>>,
    sampler: SpectrumSampler,
    smoother: TemporalSmoother,
    drift: DriftEngine,
    renderer: FieldRenderer,
    rng: fastrand::Rng,
    clock: FrameClock,
    running: bool,
    raw: Vec<f32>,
    display: Vec<f32>,
    visuals: Vec<BandVisual>,
}

impl Visualizer {
    pub fn new(layout: BandLayout, w: usize, h: usize, seed: u64) -> Self {
        let bands = layout.bands();
        let mut v = Self {
            layout,
            params: ControlParams::default(),
            colors: ColorState::for_bands(bands),
            anchors: Vec::new(),
            source: None,
            sampler: SpectrumSampler::new(),
            smoother: TemporalSmoother::new(bands.len()),
            drift: DriftEngine::new(bands.len(), DriftConfig::for_viewport(w, h)),
            renderer: FieldRenderer::new(w, h),
            rng: fastrand::Rng::with_seed(seed),
            clock: FrameClock::default(),
            running: false,
            raw: vec![0.0; bands.len()],
            display: vec![0.0; bands.len()],
            visuals: Vec::with_capacity(bands.len()),
        };
        v.randomize_anchors();
        v
    }

    pub fn layout(&self) -> BandLayout {
        self.layout
    }

    pub fn bands(&self) -> &'static [Band] {
        self.layout.bands()
    }

    pub fn set_audio_source(&mut self, source: Option<Box<dyn SpectrumSource>>) {
        self.source = source;
    }

    pub fn has_audio_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn control_params(&self) -> &ControlParams {
        &self.params
    }

    /// Merge-update; takes effect on the next frame.
    pub fn set_control_params(&mut self, patch: &[(ParamKey, f32)]) {
        self.params.apply(patch);
    }

    pub fn colors(&self) -> &ColorState {
        &self.colors
    }

    pub fn set_control_colors(&mut self, patch: &ColorPatch) {
        self.colors.apply(patch);
    }

    pub fn colors_mut(&mut self) -> &mut ColorState {
        &mut self.colors
    }

    pub fn set_grain_intensity(&mut self, intensity: f32) {
        self.renderer.set_grain_intensity(intensity);
    }

    pub fn grain_intensity(&self) -> f32 {
        self.renderer.grain_intensity()
    }

    pub fn set_grain_texture(&mut self, texture: Option<GrainTexture>) {
        self.renderer.set_grain_texture(texture);
    }

    /// Anchors in normalized 0..100 coordinates, one per band.
    pub fn anchor_positions(&self) -> &[Vec2] {
        &self.anchors
    }

    /// Merge-update anchors by band index. Values are clamped to 0..100.
    pub fn set_anchor_positions(&mut self, anchors: &[(usize, Vec2)]) {
        for &(idx, pos) in anchors {
            if let Some(slot) = self.anchors.get_mut(idx) {
                if pos.is_finite() {
                    *slot = pos.clamp(Vec2::ZERO, Vec2::splat(100.0));
                }
            }
        }
    }

    pub fn randomize_anchors(&mut self) {
        let n = self.bands().len();
        let rng = &mut self.rng;
        self.anchors = (0..n)
            .map(|_| Vec2::new(15.0 + rng.f32() * 70.0, 15.0 + rng.f32() * 70.0))
            .collect();
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        if self.renderer.size() == (w, h) {
            return;
        }
        tracing::debug!(w, h, "viewport resized");
        self.renderer.resize(w, h);
        self.drift.set_config(DriftConfig::for_viewport(w, h));
    }

    pub fn size(&self) -> (usize, usize) {
        self.renderer.size()
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.clock.reset();
        tracing::info!("visualizer started");
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        tracing::info!("visualizer stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance and paint one frame. Returns false (and does nothing) while stopped.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        let dt = self.clock.tick(now);
        self.step(dt);
        true
    }

    /// Advance the simulation by `dt` seconds (clamped) and paint.
    pub fn step(&mut self, dt: f32) -> &[u8] {
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_DT) } else { 0.0 };
        let bands = self.layout.bands();

        let raw = self.sampler.sample(self.source.as_deref(), bands);
        self.raw.clear();
        self.raw.extend_from_slice(raw);

        let emphasized: Vec<f32> = self
            .raw
            .iter()
            .zip(bands)
            .map(|(&a, band)| emphasis(a, self.params.emphasis_for(band.group)))
            .collect();
        let smoothed = self.smoother.step(&emphasized, &self.params, dt);

        self.display.clear();
        self.display
            .extend(smoothed.iter().map(|&a| compression(a, self.params.compression)));

        self.drift
            .step(self.params.drift, self.params.anchor, dt, &mut self.rng);

        self.paint()
    }

    /// Paint the current state without advancing time (used while paused).
    pub fn render_static(&mut self) -> &[u8] {
        self.paint()
    }

    fn paint(&mut self) -> &[u8] {
        // Controls or the viewport may have shrunk the radius since the last step.
        self.drift.constrain(self.params.drift, self.params.anchor);
        let (w, h) = self.renderer.size();
        let light = is_light_background(self.colors.background);
        let profile = RenderProfile::for_background(light);
        let min_side = w.min(h) as f32;
        let dims = Vec2::new(w as f32, h as f32);

        self.visuals.clear();
        for i in 0..self.layout.bands().len() {
            let anchor = self.anchors.get(i).copied().unwrap_or(Vec2::splat(50.0));
            let center = anchor / 100.0 * dims + self.drift.offset(i);
            let amplitude = self.display.get(i).copied().unwrap_or(0.0);
            self.visuals.push(BandVisual::compute(
                amplitude,
                center,
                self.colors.band(i),
                &self.params,
                &profile,
                min_side,
            ));
        }

        self.renderer
            .render(&self.visuals, self.colors.background, &profile)
    }

    pub fn pixels(&self) -> &[u8] {
        self.renderer.pixels()
    }

    pub fn visuals(&self) -> &[BandVisual] {
        &self.visuals
    }

    pub fn raw_amplitudes(&self) -> &[f32] {
        &self.raw
    }

    /// Smoothed and compressed values that drive the visuals.
    pub fn display_amplitudes(&self) -> &[f32] {
        &self.display
    }

    pub fn drift(&self) -> &DriftEngine {
        &self.drift
    }

    pub fn is_light_background(&self) -> bool {
        is_light_background(self.colors.background)
    }
}
