//! Layered radial-gradient compositing of the band emphasis blobs.

use crate::color::{boost_for_background, Rgb};
use crate::params::ControlParams;
use crate::shaping::{clamp_param, clamp_unit};
use glam::Vec2;

/// Expansion curve exponent; < 1 makes low-to-mid amplitudes grow faster.
pub const GAMMA: f32 = 0.6;

const MID_STOP: f32 = 0.55;
const OVERLAP_BOOST: f32 = 0.3;
const GRAIN_MAX_OPACITY: f32 = 0.5;
const GRAIN_TINT: f32 = 0.08;
const GRAIN_DRIFT_PX: Vec2 = Vec2::new(37.0, 23.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Lightens; used over dark backgrounds.
    Screen,
    /// Darkens; used over light backgrounds.
    Multiply,
}

/// Operating ranges for one background class. Radii are fractions of the
/// smaller viewport side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderProfile {
    pub light: bool,
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_opacity: f32,
    pub max_opacity: f32,
    pub blend: BlendMode,
}

impl RenderProfile {
    pub fn for_background(light: bool) -> Self {
        if light {
            Self {
                light,
                min_radius: 0.08,
                max_radius: 0.42,
                min_opacity: 0.35,
                max_opacity: 1.0,
                blend: BlendMode::Multiply,
            }
        } else {
            Self {
                light,
                min_radius: 0.06,
                max_radius: 0.32,
                min_opacity: 0.18,
                max_opacity: 0.85,
                blend: BlendMode::Screen,
            }
        }
    }
}

/// 0 -> x0.3, 50 -> x1, 100 -> x2, linear in between.
pub fn field_scale_multiplier(field_scale: f32) -> f32 {
    let fs = clamp_param(field_scale);
    if fs <= 50.0 {
        0.3 + (fs / 50.0) * 0.7
    } else {
        1.0 + (fs - 50.0) / 50.0
    }
}

/// Everything needed to paint one band this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandVisual {
    pub center: Vec2,
    pub radius: f32,
    pub opacity: f32,
    pub center_alpha: f32,
    pub mid_alpha: f32,
    pub color: Rgb,
    pub amplitude: f32,
}

impl BandVisual {
    pub fn compute(
        amplitude: f32,
        center: Vec2,
        color: Rgb,
        params: &ControlParams,
        profile: &RenderProfile,
        min_side: f32,
    ) -> Self {
        let a = clamp_unit(amplitude);
        let curve = a.powf(GAMMA);
        let scale = field_scale_multiplier(params.field_scale) * min_side.max(0.0);
        let min_r = profile.min_radius * scale;
        let max_r = profile.max_radius * scale;
        let radius = min_r + (max_r - min_r) * curve;

        let boost = clamp_param(params.overlap) / 100.0 * OVERLAP_BOOST;
        let opacity = (profile.min_opacity + (profile.max_opacity - profile.min_opacity) * curve + boost)
            .min(profile.max_opacity);

        let (center_alpha, mid_alpha) = if profile.light {
            (1.0, opacity * 0.6)
        } else {
            (opacity, opacity * 0.45)
        };

        Self {
            center,
            radius,
            opacity,
            center_alpha,
            mid_alpha,
            color: boost_for_background(color, profile.light),
            amplitude: a,
        }
    }

    /// Gradient alpha at normalized distance `t` from the center.
    pub fn alpha_at(&self, t: f32) -> f32 {
        if t >= 1.0 {
            0.0
        } else if t <= MID_STOP {
            lerp(self.center_alpha, self.mid_alpha, t / MID_STOP)
        } else {
            lerp(self.mid_alpha, 0.0, (t - MID_STOP) / (1.0 - MID_STOP))
        }
    }
}

/// Tileable luma texture in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct GrainTexture {
    w: usize,
    h: usize,
    luma: Vec<f32>,
}

impl GrainTexture {
    pub fn generate(size: usize, seed: u64) -> Self {
        let size = size.max(1);
        let mut rng = fastrand::Rng::with_seed(seed);
        let luma = (0..size * size)
            .map(|_| (rng.f32() + rng.f32()) * 0.5)
            .collect();
        Self {
            w: size,
            h: size,
            luma,
        }
    }

    pub fn from_luma(w: usize, h: usize, bytes: &[u8]) -> Option<Self> {
        if w == 0 || h == 0 || bytes.len() < w * h {
            return None;
        }
        Some(Self {
            w,
            h,
            luma: bytes[..w * h].iter().map(|&b| b as f32 / 255.0).collect(),
        })
    }

    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let xi = (x.floor() as i64).rem_euclid(self.w as i64) as usize;
        let yi = (y.floor() as i64).rem_euclid(self.h as i64) as usize;
        self.luma[yi * self.w + xi]
    }
}

/// Software canvas for the field. Stateless between frames apart from its buffers.
pub struct FieldRenderer {
    w: usize,
    h: usize,
    canvas: Vec<[f32; 3]>,
    pixels: Vec<u8>,
    grain: Option<GrainTexture>,
    grain_intensity: f32,
}

impl FieldRenderer {
    pub fn new(w: usize, h: usize) -> Self {
        let mut r = Self {
            w: 0,
            h: 0,
            canvas: Vec::new(),
            pixels: Vec::new(),
            grain: None,
            grain_intensity: 0.0,
        };
        r.resize(w, h);
        r
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        let n = w.saturating_mul(h);
        self.canvas.clear();
        self.canvas.resize(n, [0.0; 3]);
        self.pixels.clear();
        self.pixels.resize(n.saturating_mul(4), 255);
    }

    pub fn size(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn set_grain_texture(&mut self, texture: Option<GrainTexture>) {
        self.grain = texture;
    }

    pub fn set_grain_intensity(&mut self, intensity: f32) {
        self.grain_intensity = clamp_param(intensity);
    }

    pub fn grain_intensity(&self) -> f32 {
        self.grain_intensity
    }

    /// Paint one frame and return the RGBA buffer.
    pub fn render(&mut self, visuals: &[BandVisual], background: Rgb, profile: &RenderProfile) -> &[u8] {
        let bg = background.to_unit();
        self.canvas.fill(bg);

        for (idx, v) in visuals.iter().enumerate() {
            self.composite_band(v, profile.blend);
            if self.grain_intensity > 0.0 && self.grain.is_some() {
                self.grain_band(v, idx);
            }
        }

        for (px, c) in self.pixels.chunks_exact_mut(4).zip(&self.canvas) {
            px[0] = to_u8(c[0]);
            px[1] = to_u8(c[1]);
            px[2] = to_u8(c[2]);
            px[3] = 255;
        }
        &self.pixels
    }

    fn composite_band(&mut self, v: &BandVisual, blend: BlendMode) {
        let Some((x0, y0, x1, y1)) = bounds_for(v, self.w, self.h) else {
            return;
        };
        let src = v.color.to_unit();
        let inv_r = 1.0 / v.radius;
        for y in y0..y1 {
            for x in x0..x1 {
                let d = (Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - v.center).length();
                let a = v.alpha_at(d * inv_r);
                if a <= 0.0 {
                    continue;
                }
                let dst = &mut self.canvas[y * self.w + x];
                for ch in 0..3 {
                    let blended = match blend {
                        BlendMode::Screen => 1.0 - (1.0 - dst[ch]) * (1.0 - src[ch]),
                        BlendMode::Multiply => dst[ch] * src[ch],
                    };
                    dst[ch] += (blended - dst[ch]) * a;
                }
            }
        }
    }

    fn grain_band(&mut self, v: &BandVisual, idx: usize) {
        let Some(grain) = self.grain.as_ref() else {
            return;
        };
        let Some((x0, y0, x1, y1)) = bounds_for(v, self.w, self.h) else {
            return;
        };
        let amount = self.grain_intensity / 100.0;
        let opacity = (amount * GRAIN_MAX_OPACITY).min(GRAIN_MAX_OPACITY);
        let tint = amount * GRAIN_TINT;
        let shift = GRAIN_DRIFT_PX * (v.amplitude + idx as f32 * 0.37);
        let src = v.color.to_unit();
        let r2 = v.radius * v.radius;

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if (p - v.center).length_squared() > r2 {
                    continue;
                }
                let g = grain.sample(p.x + shift.x, p.y + shift.y);
                let dst = &mut self.canvas[y * self.w + x];
                for ch in 0..3 {
                    let lit = soft_light(dst[ch], g);
                    dst[ch] += (lit - dst[ch]) * opacity;
                    dst[ch] += (src[ch] - dst[ch]) * tint;
                }
            }
        }
    }
}

fn bounds_for(v: &BandVisual, w: usize, h: usize) -> Option<(usize, usize, usize, usize)> {
    if w == 0 || h == 0 || !(v.radius > 0.0) || !v.center.is_finite() {
        return None;
    }
    let x0 = (v.center.x - v.radius).floor().max(0.0) as usize;
    let y0 = (v.center.y - v.radius).floor().max(0.0) as usize;
    let x1 = ((v.center.x + v.radius).ceil().max(0.0) as usize).min(w);
    let y1 = ((v.center.y + v.radius).ceil().max(0.0) as usize).min(h);
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

/// W3C soft-light: darkens below 0.5, lightens above, never multiplies to black.
pub fn soft_light(dst: f32, src: f32) -> f32 {
    if src <= 0.5 {
        dst - (1.0 - 2.0 * src) * dst * (1.0 - dst)
    } else {
        let d = if dst <= 0.25 {
            ((16.0 * dst - 12.0) * dst + 4.0) * dst
        } else {
            dst.sqrt()
        };
        dst + (2.0 * src - 1.0) * (d - dst)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
