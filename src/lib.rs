pub mod app;
pub mod audio;
pub mod bands;
pub mod color;
pub mod config;
pub mod drift;
pub mod engine;
pub mod field;
pub mod params;
pub mod prefs;
pub mod render;
pub mod shaping;
pub mod smoothing;
pub mod spectrum;
pub mod terminal;
