use crate::bands::BandLayout;
use crate::color::Rgb;
use crate::engine::Visualizer;
use crate::params::{ColorPatch, ParamKey};
use crate::shaping::clamp_param;
use glam::Vec2;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persisted visualizer state. Every field is optional so a partial file only
/// overrides what it names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppPrefs {
    pub params: Vec<(ParamKey, f32)>,
    /// Band colors keyed by band id, so they survive a layout change.
    pub colors: Vec<(String, Rgb)>,
    pub background: Option<Rgb>,
    pub anchors: Vec<(String, Vec2)>,
    pub grain: Option<f32>,
    pub bands: Option<BandLayout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefsError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl AppPrefs {
    pub fn load(path: Option<&Path>) -> Result<Self, PrefsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = match std::fs::read_to_string(path) {
            Ok(v) => v,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(PrefsError::Io(err.to_string())),
        };
        let prefs = Self::parse(&text)?;
        tracing::info!(path = %path.display(), "loaded prefs");
        Ok(prefs)
    }

    pub fn parse(text: &str) -> Result<Self, PrefsError> {
        let mut prefs = Self::default();
        for (line_idx, raw) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let err = |message: String| PrefsError::Parse {
                line: line_no,
                message,
            };
            let Some((key_raw, value_raw)) = line.split_once('=') else {
                return Err(err("expected <key>=<value>".to_string()));
            };
            let key = key_raw.trim();
            let value = value_raw.trim();

            if let Some(name) = key.strip_prefix("param.") {
                let Some(param) = ParamKey::parse(name) else {
                    continue;
                };
                let v = parse_number(value).ok_or_else(|| err(format!("{key} must be a number")))?;
                upsert(&mut prefs.params, param, clamp_param(v));
            } else if let Some(band) = key.strip_prefix("color.") {
                let color = Rgb::parse_hex(value).map_err(|e| err(format!("{key}: {e}")))?;
                upsert(&mut prefs.colors, band.trim().to_ascii_lowercase(), color);
            } else if let Some(band) = key.strip_prefix("anchor.") {
                let pos = parse_point(value).ok_or_else(|| err(format!("{key} must be <x>,<y>")))?;
                upsert(&mut prefs.anchors, band.trim().to_ascii_lowercase(), pos);
            } else {
                match key {
                    "background" => {
                        prefs.background =
                            Some(Rgb::parse_hex(value).map_err(|e| err(format!("background: {e}")))?);
                    }
                    "grain" => {
                        let v = parse_number(value).ok_or_else(|| err("grain must be a number".to_string()))?;
                        prefs.grain = Some(clamp_param(v));
                    }
                    "bands" => {
                        prefs.bands = Some(
                            BandLayout::parse(value)
                                .ok_or_else(|| err("bands must be three or five".to_string()))?,
                        );
                    }
                    _ => {}
                }
            }
        }
        Ok(prefs)
    }

    pub fn to_text(&self) -> String {
        let mut body = String::from("# emphasis_field prefs v1\n");
        if let Some(layout) = self.bands {
            let _ = writeln!(body, "bands={}", layout.as_str());
        }
        for (key, value) in &self.params {
            let _ = writeln!(body, "param.{}={}", key.as_str(), value);
        }
        if let Some(bg) = self.background {
            let _ = writeln!(body, "background={bg}");
        }
        for (band, color) in &self.colors {
            let _ = writeln!(body, "color.{band}={color}");
        }
        for (band, pos) in &self.anchors {
            let _ = writeln!(body, "anchor.{band}={},{}", pos.x, pos.y);
        }
        if let Some(grain) = self.grain {
            let _ = writeln!(body, "grain={grain}");
        }
        body
    }

    pub fn save(&self, path: Option<&Path>) -> Result<(), PrefsError> {
        let Some(path) = path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PrefsError::Io(e.to_string()))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.to_text()).map_err(|e| PrefsError::Io(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| PrefsError::Io(e.to_string()))?;
        tracing::info!(path = %path.display(), "saved prefs");
        Ok(())
    }

    /// Snapshot everything worth restoring from a running visualizer.
    pub fn capture(vis: &Visualizer) -> Self {
        let bands = vis.bands();
        let params = vis.control_params();
        let colors = vis.colors();
        Self {
            params: ParamKey::all().iter().map(|&k| (k, params.get(k))).collect(),
            colors: bands
                .iter()
                .enumerate()
                .map(|(i, b)| (b.id.to_string(), colors.band(i)))
                .collect(),
            background: Some(colors.background),
            anchors: bands
                .iter()
                .zip(vis.anchor_positions())
                .map(|(b, &p)| (b.id.to_string(), p))
                .collect(),
            grain: Some(vis.grain_intensity()),
            bands: Some(vis.layout()),
        }
    }

    /// Push stored values into `vis`. Entries naming bands the current layout
    /// lacks are skipped, logged and returned.
    pub fn apply_to(&self, vis: &mut Visualizer) -> Vec<String> {
        let layout = vis.layout();
        let mut skipped = Vec::new();
        let mut resolve = |id: &str| {
            let idx = layout.index_of(id);
            if idx.is_none() && !skipped.iter().any(|s: &String| s == id) {
                tracing::warn!(band = id, layout = layout.as_str(), "no such band in layout; ignoring");
                skipped.push(id.to_string());
            }
            idx
        };

        let bands = self
            .colors
            .iter()
            .filter_map(|(id, c)| resolve(id).map(|i| (i, *c)))
            .collect();
        let anchors: Vec<(usize, Vec2)> = self
            .anchors
            .iter()
            .filter_map(|(id, p)| resolve(id).map(|i| (i, *p)))
            .collect();

        vis.set_control_params(&self.params);
        vis.set_control_colors(&ColorPatch {
            bands,
            background: self.background,
        });
        vis.set_anchor_positions(&anchors);
        if let Some(grain) = self.grain {
            vis.set_grain_intensity(grain);
        }
        skipped
    }
}

pub fn config_dir() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("emphasis_field"));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".config").join("emphasis_field"))
}

pub fn prefs_storage_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("prefs.txt"))
}

fn upsert<K: PartialEq, V>(list: &mut Vec<(K, V)>, key: K, value: V) {
    if let Some(slot) = list.iter_mut().find(|(k, _)| *k == key) {
        slot.1 = value;
    } else {
        list.push((key, value));
    }
}

fn parse_number(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_point(raw: &str) -> Option<Vec2> {
    let (x, y) = raw.split_once(',')?;
    let p = Vec2::new(parse_number(x)?, parse_number(y)?);
    Some(p.clamp(Vec2::ZERO, Vec2::splat(100.0)))
}
