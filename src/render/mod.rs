mod ascii;
mod halfblock;

pub use ascii::AsciiRenderer;
pub use halfblock::HalfBlockRenderer;

use crate::config::RendererMode;
use std::io::Write;

/// One terminal frame: the field pixels plus the text that sits around them.
pub struct Frame<'a> {
    pub term_cols: u16,
    pub term_rows: u16,
    /// Rows given to the field; the HUD takes the rest.
    pub visual_rows: u16,
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub pixels_rgba: &'a [u8],
    pub hud: &'a str,
    pub hud_rows: u16,
    /// HUD line drawn in reverse video (the selected parameter).
    pub hud_highlight: Option<usize>,
    pub overlay: Option<&'a str>,
    pub sync_updates: bool,
}

pub trait Renderer {
    fn name(&self) -> &'static str;
    /// Field pixels per terminal cell, as (x, y).
    fn pixels_per_cell(&self) -> (usize, usize);
    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}

pub fn renderer_for(mode: RendererMode) -> Box<dyn Renderer> {
    match mode {
        RendererMode::HalfBlock => Box::new(HalfBlockRenderer::new()),
        RendererMode::Ascii => Box::new(AsciiRenderer::new()),
    }
}

/// Rec. 601 luma in 0..=255.
pub fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

pub fn write_fg_rgb(out: &mut dyn Write, r: u8, g: u8, b: u8) -> std::io::Result<()> {
    write!(out, "\x1b[38;2;{r};{g};{b}m")
}

/// Validate the frame against `px_per_col` x `px_per_row` cells and emit the
/// frame prologue. Returns `(cols, visual_rows, w, h)` or `None` when there is
/// nothing sensible to draw.
pub fn text_frame_begin(
    frame: &Frame<'_>,
    px_per_col: usize,
    px_per_row: usize,
    out: &mut dyn Write,
) -> anyhow::Result<Option<(usize, usize, usize, usize)>> {
    let cols = frame.term_cols as usize;
    let visual_rows = frame.visual_rows as usize;
    let (w, h) = (frame.pixel_width, frame.pixel_height);
    if cols == 0 || visual_rows == 0 || w == 0 || h == 0 {
        return Ok(None);
    }
    if w != cols * px_per_col || h != visual_rows * px_per_row {
        tracing::debug!(cols, visual_rows, w, h, "frame size mismatch; skipping");
        return Ok(None);
    }
    if frame.pixels_rgba.len() < w * h * 4 {
        return Ok(None);
    }

    if frame.sync_updates {
        out.write_all(b"\x1b[?2026h")?;
    }
    // Home, reset, autowrap off while full-width rows are painted.
    out.write_all(b"\x1b[H\x1b[0m\x1b[?7l")?;
    Ok(Some((cols, visual_rows, w, h)))
}

/// HUD, overlay, autowrap restore and sync end.
pub fn text_frame_end(
    frame: &Frame<'_>,
    cols: usize,
    visual_rows: usize,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    write_hud(frame, cols, visual_rows, out)?;
    if let Some(text) = frame.overlay {
        draw_overlay_popup(out, frame.term_cols, frame.term_rows, text)?;
    }
    out.write_all(b"\x1b[?7h")?;
    if frame.sync_updates {
        out.write_all(b"\x1b[?2026l")?;
    }
    out.flush()?;
    Ok(())
}

fn write_hud(frame: &Frame<'_>, cols: usize, visual_rows: usize, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut lines = frame.hud.lines();
    for i in 0..frame.hud_rows as usize {
        write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", visual_rows + i + 1)?;
        let Some(line) = lines.next() else {
            continue;
        };
        let clipped: String = line.chars().take(cols).collect();
        if frame.hud_highlight == Some(i) {
            write!(out, "\x1b[7m{clipped}\x1b[27m")?;
        } else {
            out.write_all(clipped.as_bytes())?;
        }
    }
    Ok(())
}

/// Centered boxed text over a dimmed backdrop. The first line is the title.
pub fn draw_overlay_popup(out: &mut dyn Write, term_cols: u16, term_rows: u16, text: &str) -> anyhow::Result<()> {
    let cols = term_cols as usize;
    let rows = term_rows as usize;
    if text.trim().is_empty() || cols < 8 || rows < 4 {
        return Ok(());
    }

    let max_inner = cols - 6;
    let lines: Vec<String> = text
        .lines()
        .flat_map(|raw| wrap_chars(raw, max_inner))
        .collect();

    let inner_w = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(1)
        .clamp(1, max_inner);
    let box_w = inner_w + 4;
    let body_h = lines.len().min(rows.saturating_sub(3).max(1));
    let box_h = body_h + 2;
    let left = (cols - box_w) / 2 + 1;
    let top = rows.saturating_sub(box_h) / 2 + 1;
    let edge = format!("+{}+", "-".repeat(box_w - 2));

    out.write_all(b"\x1b[0m\x1b[38;2;220;224;236m\x1b[48;2;8;8;16m")?;
    for row in 1..=rows {
        write!(out, "\x1b[{row};1H\x1b[2K")?;
    }

    write!(out, "\x1b[{top};{left}H{edge}")?;
    for (i, line) in lines.iter().take(body_h).enumerate() {
        let row = top + 1 + i;
        let pad = inner_w.saturating_sub(line.chars().count());
        if i == 0 {
            write!(out, "\x1b[{row};{left}H| \x1b[1m{line}\x1b[22m{} |", " ".repeat(pad))?;
        } else {
            write!(out, "\x1b[{row};{left}H| {line}{} |", " ".repeat(pad))?;
        }
    }
    write!(out, "\x1b[{};{left}H{edge}\x1b[0m", top + box_h - 1)?;
    Ok(())
}

fn wrap_chars(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|c| c.iter().collect())
        .collect()
}
