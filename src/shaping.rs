//! Per-band gain and dynamic-range shaping.
//!
//! Both transforms are pure. The engine applies them as
//! emphasis -> temporal smoothing -> compression, so compression only ever
//! acts on the display value and never fights the attack/decay curve.

/// Amplitude gain around a neutral point of 50 (x1). 0 mutes, 100 doubles.
pub fn emphasis(amplitude: f32, emphasis: f32) -> f32 {
    let a = clamp_unit(amplitude);
    let e = clamp_param(emphasis);
    clamp_unit(a * (e / 50.0))
}

/// Soft pull toward 0.5. At 100 the value moves 80% of the way to the midpoint.
pub fn compression(amplitude: f32, compression: f32) -> f32 {
    let a = clamp_unit(amplitude);
    let c = clamp_param(compression);
    clamp_unit(a + (0.5 - a) * (c / 100.0) * 0.8)
}

/// Clamp to [0, 1]; NaN maps to 0.
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Clamp to the control range [0, 100]; NaN maps to 0.
pub fn clamp_param(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}
