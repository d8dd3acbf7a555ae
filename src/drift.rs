use crate::shaping::clamp_param;
use glam::Vec2;

/// Offsets already on the boundary are left untouched.
const CONSTRAIN_SLACK_PX: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftConfig {
    /// Roaming radius at drift=100, in pixels.
    pub max_radius_px: f32,
    /// Speed cap at drift=100, in pixels per second.
    pub max_speed_px: f32,
    /// Brownian acceleration at drift=100, in pixels per second squared.
    pub impulse_px: f32,
    /// Fraction of the radius removed at anchor=100.
    pub anchor_reduction: f32,
    /// Velocity multiplier per 60 Hz frame.
    pub friction: f32,
    /// Fraction of the radius where the restoring pull starts.
    pub soft_fraction: f32,
    /// Restoring acceleration per pixel of overshoot, per second squared.
    pub soft_stiffness: f32,
    /// Share of the normal velocity kept after hitting the boundary.
    pub restitution: f32,
    /// Offset multiplier per 60 Hz frame while returning to the anchor.
    pub return_damping: f32,
    pub snap_epsilon: f32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self::with_radius(120.0)
    }
}

impl DriftConfig {
    pub fn with_radius(max_radius_px: f32) -> Self {
        let max_radius_px = max_radius_px.max(0.0);
        let max_speed_px = max_radius_px * 0.6;
        Self {
            max_radius_px,
            max_speed_px,
            impulse_px: max_speed_px * 4.0,
            anchor_reduction: 0.8,
            friction: 0.92,
            soft_fraction: 0.7,
            soft_stiffness: 8.0,
            restitution: 0.5,
            return_damping: 0.85,
            snap_epsilon: 0.01,
        }
    }

    /// Scale the roaming radius to the smaller viewport side.
    pub fn for_viewport(w: usize, h: usize) -> Self {
        Self::with_radius(w.min(h) as f32 * 0.22)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftPhase {
    /// Sitting exactly on the anchor.
    Anchored,
    /// Free Brownian wandering inside the boundary.
    Roaming,
    /// Drift was switched off; easing back to the anchor.
    Returning,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftState {
    pub offset: Vec2,
    pub velocity: Vec2,
    pub phase: DriftPhase,
}

impl Default for DriftState {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            velocity: Vec2::ZERO,
            phase: DriftPhase::Anchored,
        }
    }
}

/// Bounded random-walk offsets, one lane per band.
#[derive(Debug, Clone)]
pub struct DriftEngine {
    config: DriftConfig,
    states: Vec<DriftState>,
}

impl DriftEngine {
    pub fn new(bands: usize, config: DriftConfig) -> Self {
        Self {
            config,
            states: vec![DriftState::default(); bands],
        }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// New limits apply from the next step; the hard boundary pulls offsets back in.
    pub fn set_config(&mut self, config: DriftConfig) {
        self.config = config;
    }

    pub fn states(&self) -> &[DriftState] {
        &self.states
    }

    pub fn offset(&self, band: usize) -> Vec2 {
        self.states.get(band).map(|s| s.offset).unwrap_or(Vec2::ZERO)
    }

    pub fn reset(&mut self, bands: usize) {
        self.states.clear();
        self.states.resize(bands, DriftState::default());
    }

    pub fn max_radius(&self, drift: f32) -> f32 {
        self.config.max_radius_px * (clamp_param(drift) / 100.0)
    }

    pub fn effective_radius(&self, drift: f32, anchor: f32) -> f32 {
        let stability = clamp_param(anchor) / 100.0;
        self.max_radius(drift) * (1.0 - stability * self.config.anchor_reduction)
    }

    /// Pull roaming offsets back inside the current radius without advancing
    /// time. Lanes easing home are left alone.
    pub fn constrain(&mut self, drift: f32, anchor: f32) {
        if clamp_param(drift) <= 0.0 {
            return;
        }
        let radius = self.effective_radius(drift, anchor);
        let max_speed = self.config.max_speed_px * (clamp_param(drift) / 100.0);
        for state in &mut self.states {
            if state.phase == DriftPhase::Returning {
                continue;
            }
            let dist = state.offset.length();
            if dist > radius + CONSTRAIN_SLACK_PX {
                state.offset *= radius / dist;
                state.velocity = state.velocity.clamp_length_max(max_speed);
            }
        }
    }

    pub fn step(&mut self, drift: f32, anchor: f32, dt: f32, rng: &mut fastrand::Rng) {
        let dt = dt.max(0.0);
        let amount = clamp_param(drift) / 100.0;
        let radius = self.effective_radius(drift, anchor);
        let cfg = self.config;

        for state in &mut self.states {
            if amount <= 0.0 {
                step_return(state, &cfg, dt);
            } else {
                step_roam(state, &cfg, amount, radius, dt, rng);
            }
        }
    }
}

fn step_return(state: &mut DriftState, cfg: &DriftConfig, dt: f32) {
    state.velocity = Vec2::ZERO;
    if state.phase == DriftPhase::Anchored {
        state.offset = Vec2::ZERO;
        return;
    }
    state.phase = DriftPhase::Returning;
    state.offset *= cfg.return_damping.powf(dt * 60.0);
    if state.offset.length() < cfg.snap_epsilon {
        state.offset = Vec2::ZERO;
        state.phase = DriftPhase::Anchored;
    }
}

fn step_roam(
    state: &mut DriftState,
    cfg: &DriftConfig,
    amount: f32,
    radius: f32,
    dt: f32,
    rng: &mut fastrand::Rng,
) {
    state.phase = DriftPhase::Roaming;
    if radius <= f32::EPSILON {
        state.offset = Vec2::ZERO;
        state.velocity = Vec2::ZERO;
        return;
    }

    let kick = Vec2::new(rng.f32() * 2.0 - 1.0, rng.f32() * 2.0 - 1.0);
    state.velocity += kick * cfg.impulse_px * amount * dt;
    state.velocity *= cfg.friction.powf(dt * 60.0);
    state.velocity = state.velocity.clamp_length_max(cfg.max_speed_px * amount);

    state.offset += state.velocity * dt;

    let dist = state.offset.length();
    let soft = radius * cfg.soft_fraction;
    if dist > soft && dist > f32::EPSILON {
        let inward = -state.offset / dist;
        state.velocity += inward * (dist - soft) * cfg.soft_stiffness * dt;
    }

    if dist > radius {
        let normal = state.offset / dist;
        state.offset = normal * radius;
        let outward = state.velocity.dot(normal);
        if outward > 0.0 {
            state.velocity -= normal * outward * (1.0 + cfg.restitution);
        }
    }
}
