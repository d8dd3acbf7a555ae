use crate::bands::BandLayout;
use crate::color::Rgb;
use crate::params::{parse_param_assignment, ParamKey, DARK_BACKGROUND, LIGHT_BACKGROUND};
use crate::prefs::{self, AppPrefs};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "emphasis-field", version, about = "Audio-reactive color field for the terminal")]
pub struct Config {
    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    #[arg(long, value_enum, default_value_t = RendererMode::HalfBlock)]
    pub renderer: RendererMode,

    /// Band layout; falls back to the saved layout, then `three`.
    #[arg(long, value_enum)]
    pub bands: Option<BandLayout>,

    /// `dark`, `light` or a `#rrggbb` color.
    #[arg(long, value_parser = parse_background)]
    pub background: Option<Rgb>,

    /// Band color override, e.g. `--color low=#ff0044`. Repeatable.
    #[arg(long = "color", value_parser = parse_color_arg)]
    pub colors: Vec<(String, Rgb)>,

    /// Parameter override, e.g. `--set drift=80`. Repeatable.
    #[arg(long = "set", value_parser = parse_set_arg)]
    pub set: Vec<(ParamKey, f32)>,

    #[arg(long)]
    pub grain: Option<f32>,

    /// Seed for anchors, drift and grain. Defaults to the clock.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub prefs: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_prefs: bool,

    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererMode {
    #[value(alias = "ansi", alias = "text")]
    Ascii,
    #[value(name = "half-block", alias = "halfblock", alias = "half_block", alias = "hb")]
    HalfBlock,
}

impl Config {
    pub fn prefs_path(&self) -> Option<PathBuf> {
        if self.no_prefs {
            return None;
        }
        self.prefs.clone().or_else(prefs::prefs_storage_path)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| prefs::config_dir().map(|d| d.join("emphasis_field.log")))
    }

    /// Layer CLI flags over stored prefs. Flags always win.
    pub fn overlay(&self, mut base: AppPrefs) -> AppPrefs {
        for &(key, value) in &self.set {
            match base.params.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => base.params.push((key, value)),
            }
        }
        for (band, color) in &self.colors {
            match base.colors.iter_mut().find(|(b, _)| b == band) {
                Some(slot) => slot.1 = *color,
                None => base.colors.push((band.clone(), *color)),
            }
        }
        if self.background.is_some() {
            base.background = self.background;
        }
        if let Some(grain) = self.grain {
            base.grain = Some(grain.clamp(0.0, 100.0));
        }
        if self.bands.is_some() {
            base.bands = self.bands;
        }
        base
    }
}

fn parse_background(raw: &str) -> Result<Rgb, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "dark" => Ok(DARK_BACKGROUND),
        "light" => Ok(LIGHT_BACKGROUND),
        other => Rgb::parse_hex(other).map_err(|e| e.to_string()),
    }
}

fn parse_color_arg(raw: &str) -> Result<(String, Rgb), String> {
    let (band, hex) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <band>=#rrggbb, got {raw:?}"))?;
    let band = band.trim().to_ascii_lowercase();
    if band.is_empty() {
        return Err("band name is empty".to_string());
    }
    let color = Rgb::parse_hex(hex).map_err(|e| e.to_string())?;
    Ok((band, color))
}

fn parse_set_arg(raw: &str) -> Result<(ParamKey, f32), String> {
    parse_param_assignment(raw).ok_or_else(|| {
        let names: Vec<&str> = ParamKey::all().iter().map(|k| k.as_str()).collect();
        format!("expected <param>=<0..100> with param one of {}", names.join(", "))
    })
}
