use crate::render::{luma_u8, text_frame_begin, text_frame_end, write_fg_rgb, Frame, Renderer};
use std::io::Write;

/// Dark to bright.
const RAMP: &[u8] = b" .:-=+*%#@";

/// One pixel per cell, glyph picked by luma and tinted with the pixel color.
pub struct AsciiRenderer {
    last_fg: Option<(u8, u8, u8)>,
}

impl AsciiRenderer {
    pub fn new() -> Self {
        Self { last_fg: None }
    }
}

impl Default for AsciiRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for AsciiRenderer {
    fn name(&self) -> &'static str {
        "ascii"
    }

    fn pixels_per_cell(&self) -> (usize, usize) {
        (1, 1)
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((cols, visual_rows, w, _h)) = text_frame_begin(frame, 1, 1, out)? else {
            return Ok(());
        };
        self.last_fg = None;

        let mut line = Vec::with_capacity(cols * 4);
        for y in 0..visual_rows {
            line.clear();
            for x in 0..cols {
                let i = (y * w + x) * 4;
                let (r, g, b) = (frame.pixels_rgba[i], frame.pixels_rgba[i + 1], frame.pixels_rgba[i + 2]);
                if self.last_fg != Some((r, g, b)) {
                    write_fg_rgb(&mut line, r, g, b)?;
                    self.last_fg = Some((r, g, b));
                }
                let ramp_idx = luma_u8(r, g, b) as usize * (RAMP.len() - 1) / 255;
                line.push(RAMP[ramp_idx]);
            }
            out.write_all(&line)?;
            out.write_all(b"\r\n")?;
        }

        text_frame_end(frame, cols, visual_rows, out)
    }
}
