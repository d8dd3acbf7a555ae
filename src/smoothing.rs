use crate::params::ControlParams;
use crate::shaping::{clamp_param, clamp_unit};

/// Largest simulation step; longer stalls are treated as this long.
pub const MAX_FRAME_DT: f32 = 0.1;

/// Per-frame rates derived from the attack/decay/inertia controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingRates {
    pub attack: f32,
    pub decay: f32,
    pub inertia_mul: f32,
}

impl SmoothingRates {
    pub fn from_params(params: &ControlParams) -> Self {
        let attack = clamp_param(params.attack) / 100.0;
        let decay = clamp_param(params.decay) / 100.0;
        let inertia = clamp_param(params.inertia) / 100.0;
        Self {
            attack: 1.0 - attack * 0.95,
            decay: 1.0 - decay * 0.98,
            inertia_mul: 1.0 - inertia * 0.9,
        }
    }

    /// Effective rate for a move from `current` toward `target`.
    pub fn effective_rate(&self, current: f32, target: f32) -> f32 {
        let base = if target > current {
            self.attack
        } else {
            self.decay
        };
        base * self.inertia_mul
    }
}

/// Frame-rate independent exponential factor; `rate = 1` is one 60 Hz time constant.
///
/// A rate of 1 (no attack/decay, no inertia) means "no smoothing" and returns 1.
/// A zero-length step never moves state, whatever the rate.
pub fn smoothing_factor(rate: f32, dt: f32) -> f32 {
    if !(dt > 0.0) {
        return 0.0;
    }
    if rate >= 1.0 {
        return 1.0;
    }
    let dt = dt.min(MAX_FRAME_DT);
    1.0 - (-rate.max(0.0) * dt * 60.0).exp()
}

/// Asymmetric attack/decay follower, one lane per band.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalSmoother {
    values: Vec<f32>,
}

impl TemporalSmoother {
    pub fn new(bands: usize) -> Self {
        Self {
            values: vec![0.0; bands],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn reset(&mut self, bands: usize) {
        self.values.clear();
        self.values.resize(bands, 0.0);
    }

    /// Move every lane toward its target. Missing targets count as silence.
    pub fn step(&mut self, targets: &[f32], params: &ControlParams, dt: f32) -> &[f32] {
        let rates = SmoothingRates::from_params(params);
        for (i, current) in self.values.iter_mut().enumerate() {
            let target = clamp_unit(targets.get(i).copied().unwrap_or(0.0));
            let k = smoothing_factor(rates.effective_rate(*current, target), dt);
            *current = clamp_unit(*current + (target - *current) * k);
        }
        &self.values
    }
}
