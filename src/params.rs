use crate::bands::{Band, EmphasisGroup};
use crate::color::Rgb;
use crate::shaping::clamp_param;

pub const PARAM_COUNT: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKey {
    Attack,
    Decay,
    Inertia,
    Drift,
    FieldScale,
    Overlap,
    Anchor,
    LowEmphasis,
    MidEmphasis,
    HighEmphasis,
    Compression,
}

impl ParamKey {
    pub const fn all() -> [Self; PARAM_COUNT] {
        [
            Self::Attack,
            Self::Decay,
            Self::Inertia,
            Self::Drift,
            Self::FieldScale,
            Self::Overlap,
            Self::Anchor,
            Self::LowEmphasis,
            Self::MidEmphasis,
            Self::HighEmphasis,
            Self::Compression,
        ]
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "attack" => Some(Self::Attack),
            "decay" => Some(Self::Decay),
            "inertia" => Some(Self::Inertia),
            "drift" => Some(Self::Drift),
            "fieldscale" | "scale" => Some(Self::FieldScale),
            "overlap" => Some(Self::Overlap),
            "anchor" => Some(Self::Anchor),
            "lowemphasis" | "low" => Some(Self::LowEmphasis),
            "midemphasis" | "mid" => Some(Self::MidEmphasis),
            "highemphasis" | "high" => Some(Self::HighEmphasis),
            "compression" => Some(Self::Compression),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Decay => "decay",
            Self::Inertia => "inertia",
            Self::Drift => "drift",
            Self::FieldScale => "fieldScale",
            Self::Overlap => "overlap",
            Self::Anchor => "anchor",
            Self::LowEmphasis => "lowEmphasis",
            Self::MidEmphasis => "midEmphasis",
            Self::HighEmphasis => "highEmphasis",
            Self::Compression => "compression",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Attack => "Attack",
            Self::Decay => "Decay",
            Self::Inertia => "Inertia",
            Self::Drift => "Drift",
            Self::FieldScale => "Field Scale",
            Self::Overlap => "Overlap",
            Self::Anchor => "Anchor",
            Self::LowEmphasis => "Low Emph",
            Self::MidEmphasis => "Mid Emph",
            Self::HighEmphasis => "High Emph",
            Self::Compression => "Compression",
        }
    }

    pub fn next(self) -> Self {
        let all = Self::all();
        let idx = all.iter().position(|k| *k == self).unwrap_or(0);
        all[(idx + 1) % all.len()]
    }

    pub fn prev(self) -> Self {
        let all = Self::all();
        let idx = all.iter().position(|k| *k == self).unwrap_or(0);
        all[(idx + all.len() - 1) % all.len()]
    }
}

/// The eleven user controls, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParams {
    pub attack: f32,
    pub decay: f32,
    pub inertia: f32,
    pub drift: f32,
    pub field_scale: f32,
    pub overlap: f32,
    pub anchor: f32,
    pub low_emphasis: f32,
    pub mid_emphasis: f32,
    pub high_emphasis: f32,
    pub compression: f32,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            attack: 0.0,
            decay: 0.0,
            inertia: 0.0,
            drift: 50.0,
            field_scale: 0.0,
            overlap: 50.0,
            anchor: 50.0,
            low_emphasis: 50.0,
            mid_emphasis: 50.0,
            high_emphasis: 50.0,
            compression: 0.0,
        }
    }
}

impl ControlParams {
    pub fn get(&self, key: ParamKey) -> f32 {
        match key {
            ParamKey::Attack => self.attack,
            ParamKey::Decay => self.decay,
            ParamKey::Inertia => self.inertia,
            ParamKey::Drift => self.drift,
            ParamKey::FieldScale => self.field_scale,
            ParamKey::Overlap => self.overlap,
            ParamKey::Anchor => self.anchor,
            ParamKey::LowEmphasis => self.low_emphasis,
            ParamKey::MidEmphasis => self.mid_emphasis,
            ParamKey::HighEmphasis => self.high_emphasis,
            ParamKey::Compression => self.compression,
        }
    }

    /// Store a value, clamped to [0, 100].
    pub fn set(&mut self, key: ParamKey, value: f32) {
        let v = clamp_param(value);
        let slot = match key {
            ParamKey::Attack => &mut self.attack,
            ParamKey::Decay => &mut self.decay,
            ParamKey::Inertia => &mut self.inertia,
            ParamKey::Drift => &mut self.drift,
            ParamKey::FieldScale => &mut self.field_scale,
            ParamKey::Overlap => &mut self.overlap,
            ParamKey::Anchor => &mut self.anchor,
            ParamKey::LowEmphasis => &mut self.low_emphasis,
            ParamKey::MidEmphasis => &mut self.mid_emphasis,
            ParamKey::HighEmphasis => &mut self.high_emphasis,
            ParamKey::Compression => &mut self.compression,
        };
        *slot = v;
    }

    /// Merge: keys absent from `patch` keep their value.
    pub fn apply(&mut self, patch: &[(ParamKey, f32)]) {
        for &(key, value) in patch {
            self.set(key, value);
        }
    }

    pub fn emphasis_for(&self, group: EmphasisGroup) -> f32 {
        match group {
            EmphasisGroup::Low => self.low_emphasis,
            EmphasisGroup::Mid => self.mid_emphasis,
            EmphasisGroup::High => self.high_emphasis,
        }
    }
}

/// Parse `key=value` as used by `--set` and prefs files.
pub fn parse_param_assignment(raw: &str) -> Option<(ParamKey, f32)> {
    let (k, v) = raw.split_once('=')?;
    let key = ParamKey::parse(k)?;
    let value = v.trim().parse::<f32>().ok()?;
    value.is_finite().then_some((key, clamp_param(value)))
}

pub const DARK_BACKGROUND: Rgb = Rgb::new(0x1a, 0x1a, 0x2e);
pub const LIGHT_BACKGROUND: Rgb = Rgb::new(0xf5, 0xf5, 0xf5);

/// Band colors plus the background they are composited over.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorState {
    pub bands: Vec<Rgb>,
    pub background: Rgb,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorPatch {
    pub bands: Vec<(usize, Rgb)>,
    pub background: Option<Rgb>,
}

impl ColorState {
    pub fn for_bands(bands: &[Band]) -> Self {
        let palette = Palette::Ember.colors();
        Self {
            bands: (0..bands.len()).map(|i| palette[i % palette.len()]).collect(),
            background: DARK_BACKGROUND,
        }
    }

    /// Band color, falling back to white for bands without an entry.
    pub fn band(&self, index: usize) -> Rgb {
        self.bands.get(index).copied().unwrap_or(Rgb::new(255, 255, 255))
    }

    pub fn apply(&mut self, patch: &ColorPatch) {
        for &(idx, color) in &patch.bands {
            if let Some(slot) = self.bands.get_mut(idx) {
                *slot = color;
            }
        }
        if let Some(bg) = patch.background {
            self.background = bg;
        }
    }

    pub fn apply_palette(&mut self, palette: Palette) {
        let colors = palette.colors();
        for (i, slot) in self.bands.iter_mut().enumerate() {
            *slot = colors[i % colors.len()];
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Ember,
    Lagoon,
    Orchid,
    Citrus,
}

impl Palette {
    pub fn next(self) -> Self {
        match self {
            Self::Ember => Self::Lagoon,
            Self::Lagoon => Self::Orchid,
            Self::Orchid => Self::Citrus,
            Self::Citrus => Self::Ember,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ember => "Ember",
            Self::Lagoon => "Lagoon",
            Self::Orchid => "Orchid",
            Self::Citrus => "Citrus",
        }
    }

    pub fn colors(self) -> [Rgb; 5] {
        match self {
            Self::Ember => [
                Rgb::new(0xff, 0x4d, 0x6d),
                Rgb::new(0xff, 0xa6, 0x2b),
                Rgb::new(0x4c, 0xc9, 0xf0),
                Rgb::new(0x9b, 0x5d, 0xe5),
                Rgb::new(0x80, 0xff, 0xdb),
            ],
            Self::Lagoon => [
                Rgb::new(0x00, 0xb4, 0xd8),
                Rgb::new(0x48, 0xca, 0xe4),
                Rgb::new(0x90, 0xe0, 0xef),
                Rgb::new(0x00, 0x77, 0xb6),
                Rgb::new(0xca, 0xf0, 0xf8),
            ],
            Self::Orchid => [
                Rgb::new(0xf7, 0x25, 0x85),
                Rgb::new(0xb5, 0x17, 0x9e),
                Rgb::new(0x72, 0x09, 0xb7),
                Rgb::new(0x43, 0x61, 0xee),
                Rgb::new(0x4c, 0xc9, 0xf0),
            ],
            Self::Citrus => [
                Rgb::new(0xf9, 0xc7, 0x4f),
                Rgb::new(0x90, 0xbe, 0x6d),
                Rgb::new(0xf9, 0x84, 0x4a),
                Rgb::new(0x43, 0xaa, 0x8b),
                Rgb::new(0xf9, 0x41, 0x44),
            ],
        }
    }
}
