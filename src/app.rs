use crate::audio::AudioSystem;
use crate::bands::BandLayout;
use crate::config::Config;
use crate::engine::Visualizer;
use crate::field::GrainTexture;
use crate::params::{Palette, ParamKey, DARK_BACKGROUND, LIGHT_BACKGROUND};
use crate::prefs::AppPrefs;
use crate::render::{renderer_for, Frame, Renderer};
use crate::spectrum::SpectrumSource;
use crate::terminal::TerminalGuard;
use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io::{stdout, BufWriter};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

const GRAIN_TILE: usize = 64;
const GRAIN_STEPS: [f32; 5] = [0.0, 25.0, 50.0, 75.0, 100.0];

/// Interactive state that lives outside the visualizer.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub selected: ParamKey,
    pub palette: Palette,
    pub paused: bool,
    pub show_hud: bool,
    pub show_help: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            selected: ParamKey::Attack,
            palette: Palette::Ember,
            paused: false,
            show_hud: true,
            show_help: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    /// HUD visibility changed; the field must be resized.
    Relayout,
    Quit,
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    init_logging(cfg.log_path().as_deref())?;

    let prefs_path = cfg.prefs_path();
    let stored = match AppPrefs::load(prefs_path.as_deref()) {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!("ignoring unreadable prefs: {err}");
            AppPrefs::default()
        }
    };
    let prefs = cfg.overlay(stored);

    let seed = cfg.seed.unwrap_or_else(clock_seed);
    tracing::info!(seed, renderer = ?cfg.renderer, fps = cfg.fps, "starting");

    let layout = prefs.bands.unwrap_or(BandLayout::Three);
    let mut vis = Visualizer::new(layout, 1, 1, seed);
    prefs.apply_to(&mut vis);
    vis.set_grain_texture(Some(GrainTexture::generate(GRAIN_TILE, seed ^ 0x9e37_79b9)));

    let audio = match AudioSystem::new(cfg.device.as_deref()) {
        Ok(a) => Some(a),
        Err(err) => {
            tracing::warn!("audio unavailable, running silent: {err:#}");
            None
        }
    };
    if let Some(a) = &audio {
        vis.set_audio_source(Some(Box::new(a.spectrum())));
    }

    let mut term = TerminalGuard::new()?;
    let mut out = BufWriter::new(stdout());
    let mut renderer = renderer_for(cfg.renderer);
    let mut ui = UiState::default();

    let mut last_size = term.size()?;
    if last_size.0 < 4 || last_size.1 < 2 {
        anyhow::bail!("terminal too small (need at least 4x2, got {}x{})", last_size.0, last_size.1);
    }
    let mut hud_rows = hud_rows_for(last_size.1, ui.show_hud);
    resize_field(&mut vis, &*renderer, last_size, hud_rows);

    vis.start();
    let mut fps = FpsCounter::new();
    let frame_budget = Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32);

    loop {
        let now = Instant::now();

        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    match handle_key(k.code, k.modifiers, &mut ui, &mut vis) {
                        KeyOutcome::Quit => {
                            vis.stop();
                            term.restore();
                            save_prefs(&vis, prefs_path.as_deref());
                            return Ok(());
                        }
                        KeyOutcome::Relayout => {
                            hud_rows = hud_rows_for(last_size.1, ui.show_hud);
                            resize_field(&mut vis, &*renderer, last_size, hud_rows);
                        }
                        KeyOutcome::Continue => {}
                    }
                }
                Event::Resize(c, r) => {
                    last_size = (c, r);
                    hud_rows = hud_rows_for(r, ui.show_hud);
                    resize_field(&mut vis, &*renderer, last_size, hud_rows);
                }
                _ => {}
            }
        }

        // Some terminals drop resize events.
        let sz = term.size()?;
        if sz != last_size {
            last_size = sz;
            hud_rows = hud_rows_for(sz.1, ui.show_hud);
            resize_field(&mut vis, &*renderer, last_size, hud_rows);
        }

        if ui.paused {
            vis.render_static();
        } else {
            vis.tick(now);
        }

        let audio_ready = vis.has_audio_source()
            && audio.as_ref().is_some_and(|a| a.spectrum().is_ready());
        let (hud, highlight) = if ui.show_hud {
            build_hud(&ui, &vis, fps.fps(), audio_ready, renderer.name())
        } else {
            (String::new(), None)
        };

        let (term_cols, term_rows) = last_size;
        let visual_rows = term_rows.saturating_sub(hud_rows).max(1);
        let (w, h) = vis.size();
        let frame = Frame {
            term_cols,
            term_rows,
            visual_rows,
            pixel_width: w,
            pixel_height: h,
            pixels_rgba: vis.pixels(),
            hud: &hud,
            hud_rows,
            hud_highlight: highlight,
            overlay: ui.show_help.then_some(help_text()),
            sync_updates: cfg.sync_updates,
        };
        renderer.render(&frame, &mut out)?;
        fps.tick();

        let elapsed = now.elapsed();
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }
    }
}

fn init_logging(path: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let Some(path) = path else {
        // Nowhere to write without corrupting the screen.
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_env_filter(filter)
        .with_ansi(false)
        .init();
    Ok(())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed)
}

fn save_prefs(vis: &Visualizer, path: Option<&Path>) {
    if let Err(err) = AppPrefs::capture(vis).save(path) {
        tracing::warn!("failed to save prefs: {err}");
    }
}

fn hud_rows_for(term_rows: u16, show_hud: bool) -> u16 {
    if !show_hud || term_rows <= 1 {
        return 0;
    }
    (term_rows - 1).min(2)
}

fn resize_field(vis: &mut Visualizer, renderer: &dyn Renderer, size: (u16, u16), hud_rows: u16) {
    let (px_x, px_y) = renderer.pixels_per_cell();
    let visual_rows = size.1.saturating_sub(hud_rows).max(1);
    vis.resize(size.0 as usize * px_x, visual_rows as usize * px_y);
}

/// Apply one key press. Left/right nudge the selected parameter by 5, or by 1
/// with shift held.
pub fn handle_key(code: KeyCode, mods: KeyModifiers, ui: &mut UiState, vis: &mut Visualizer) -> KeyOutcome {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return KeyOutcome::Quit;
    }
    let step = if mods.contains(KeyModifiers::SHIFT) { 1.0 } else { 5.0 };

    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => return KeyOutcome::Quit,
        KeyCode::Up => ui.selected = ui.selected.prev(),
        KeyCode::Down => ui.selected = ui.selected.next(),
        KeyCode::Left | KeyCode::Right => {
            let sign = if code == KeyCode::Left { -1.0 } else { 1.0 };
            let current = vis.control_params().get(ui.selected);
            vis.set_control_params(&[(ui.selected, current + sign * step)]);
        }
        KeyCode::Char(' ') => {
            ui.paused = !ui.paused;
            if ui.paused {
                vis.stop();
            } else {
                vis.start();
            }
        }
        KeyCode::Char('b') | KeyCode::Char('B') => {
            let next = if vis.is_light_background() {
                DARK_BACKGROUND
            } else {
                LIGHT_BACKGROUND
            };
            vis.colors_mut().background = next;
        }
        KeyCode::Char('c') | KeyCode::Char('C') => {
            ui.palette = ui.palette.next();
            vis.colors_mut().apply_palette(ui.palette);
        }
        KeyCode::Char('r') | KeyCode::Char('R') => vis.randomize_anchors(),
        KeyCode::Char('g') | KeyCode::Char('G') => {
            let current = vis.grain_intensity();
            let next = GRAIN_STEPS
                .iter()
                .copied()
                .find(|&g| g > current + 0.5)
                .unwrap_or(GRAIN_STEPS[0]);
            vis.set_grain_intensity(next);
        }
        KeyCode::Char('i') | KeyCode::Char('I') => {
            ui.show_hud = !ui.show_hud;
            return KeyOutcome::Relayout;
        }
        KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::F(1) => {
            ui.show_help = !ui.show_help;
        }
        _ => {}
    }
    KeyOutcome::Continue
}

/// Two HUD lines: the selected parameter, then status. Returns the line to highlight.
pub fn build_hud(
    ui: &UiState,
    vis: &Visualizer,
    fps: f32,
    audio_ready: bool,
    renderer_name: &str,
) -> (String, Option<usize>) {
    let params = vis.control_params();
    let levels: Vec<String> = vis
        .bands()
        .iter()
        .zip(vis.display_amplitudes())
        .map(|(b, a)| format!("{} {:>3.0}", b.id, a * 100.0))
        .collect();
    let selected = format!(
        "{}: {:>3.0}  [{} / {}]",
        ui.selected.label(),
        params.get(ui.selected),
        ui.selected.prev().label(),
        ui.selected.next().label(),
    );
    let status = format!(
        "{} | Palette: {} | Grain: {:.0} | Audio: {} | {} | FPS: {:>4.1} | ?: help",
        levels.join("  "),
        ui.palette.label(),
        vis.grain_intensity(),
        if audio_ready { "live" } else { "waiting" },
        if ui.paused { "paused" } else { renderer_name },
        fps,
    );
    (format!("{selected}\n{status}"), Some(0))
}

pub fn help_text() -> &'static str {
    "Emphasis Field keys\n\
up/down  select parameter\n\
left/right  adjust by 5 (shift: by 1)\n\
space  pause / resume\n\
b  toggle dark / light background\n\
c  cycle palette\n\
r  new random anchors\n\
g  cycle grain 0/25/50/75/100\n\
i  show/hide HUD\n\
? or h or F1  toggle this help\n\
q or esc  save and quit"
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let dt = self.last.elapsed().as_secs_f32();
        if dt >= 0.5 {
            self.fps = self.frames as f32 / dt;
            self.frames = 0;
            self.last = Instant::now();
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
