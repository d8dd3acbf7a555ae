use anyhow::Context;
use crossterm::{cursor, execute, terminal};
use std::io::{stdout, Write};

/// Raw mode plus alternate screen for the lifetime of the value.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // From here on Drop undoes whatever setup succeeded.
        let guard = Self { active: true };
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            terminal::Clear(terminal::ClearType::All),
            cursor::Hide
        )
        .context("prepare alternate screen")?;
        Ok(guard)
    }

    /// Current (cols, rows).
    pub fn size(&self) -> anyhow::Result<(u16, u16)> {
        terminal::size().context("query terminal size")
    }

    pub fn restore(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        let _ = terminal::disable_raw_mode();
        let mut out = stdout();
        // Sync output, autowrap and SGR may have been left in any state by a renderer.
        let _ = out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = execute!(out, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = out.flush();
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
