//! Terminal host: raw-mode setup, half-block frame output and the event loop.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::style::{Color as TermColor, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use crate::app::{App, Control};
use crate::color::Color;
use crate::graphics::Framebuffer;
use crate::render::Surface;
use crate::schedule::Clock;

/// Upper pixel in the foreground, lower pixel in the background
const HALF_BLOCK: char = '▀';

/// Longest the loop blocks on input while no frame is scheduled
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Puts the terminal into full-screen raw mode and restores it on drop
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture, Hide, Clear(ClearType::All)) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, Show, DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Terminal size in cells
pub fn initial_size() -> (u16, u16) {
    if let Some(size) = termsize::get() {
        if size.cols > 0 && size.rows > 0 {
            return (size.cols, size.rows);
        }
    }
    crossterm::terminal::size().unwrap_or_else(|e| {
        log::warn!("could not query terminal size ({e}), assuming 80x24");
        (80, 24)
    })
}

fn term_color(color: &Color) -> TermColor {
    let (r, g, b) = color.as_rgb8();
    TermColor::Rgb { r, g, b }
}

/// Writes frames as rows of half-block cells
pub struct TerminalSurface<W: Write> {
    out: W,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        TerminalSurface { out }
    }

    #[cfg(test)]
    fn writer(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn present(&mut self, frame: &Framebuffer, overlay: &[String]) -> io::Result<()> {
        let rows = frame.height() / 2;
        let mut current: Option<(TermColor, TermColor)> = None;

        for row in 0..rows {
            queue!(self.out, MoveTo(0, row as u16))?;
            for x in 0..frame.width() {
                let top = term_color(&frame.get(x, row * 2));
                let bottom = term_color(&frame.get(x, row * 2 + 1));
                // Only emit colour changes
                match current {
                    Some((fg, bg)) if fg == top && bg == bottom => {}
                    Some((fg, _)) if fg == top => queue!(self.out, SetBackgroundColor(bottom))?,
                    Some((_, bg)) if bg == bottom => queue!(self.out, SetForegroundColor(top))?,
                    _ => queue!(self.out, SetForegroundColor(top), SetBackgroundColor(bottom))?,
                }
                current = Some((top, bottom));
                queue!(self.out, Print(HALF_BLOCK))?;
            }
        }

        for (row, line) in overlay.iter().enumerate().take(rows) {
            let text: String = line.chars().take(frame.width()).collect();
            queue!(
                self.out,
                MoveTo(0, row as u16),
                SetForegroundColor(TermColor::White),
                SetBackgroundColor(TermColor::Black),
                Print(text)
            )?;
        }

        queue!(self.out, ResetColor)?;
        self.out.flush()
    }
}

/// Drives the app until a quit key arrives
pub fn run<S: Surface, C: Clock>(app: &mut App<S, C>) -> io::Result<()> {
    app.start();
    loop {
        let timeout = app.time_until_next_frame().unwrap_or(IDLE_POLL);
        if event::poll(timeout)? {
            let event = event::read()?;
            if app.handle_event(&event) == Control::Quit {
                break;
            }
        }
        app.run_frame_if_due();
    }
    app.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(frame: &Framebuffer, overlay: &[String]) -> String {
        let mut surface = TerminalSurface::new(Vec::new());
        surface.present(frame, overlay).unwrap();
        String::from_utf8(surface.writer().clone()).unwrap()
    }

    #[test]
    fn one_cell_per_two_pixel_rows() {
        let frame = Framebuffer::new(3, 4);
        let text = output(&frame, &[]);
        assert_eq!(text.matches(HALF_BLOCK).count(), 6);
    }

    #[test]
    fn colours_are_not_repeated() {
        let mut frame = Framebuffer::new(4, 2);
        for x in 0..4 {
            frame.set(x, 0, Color::WHITE);
        }
        let text = output(&frame, &[]);
        // 38;2 sets the foreground, 48;2 the background
        assert_eq!(text.matches("38;2;255;255;255").count(), 1);
        assert_eq!(text.matches("48;2;0;0;0").count(), 1);
    }

    #[test]
    fn overlay_is_clipped_to_the_frame() {
        let frame = Framebuffer::new(5, 2);
        let text = output(&frame, &["FPS: 60.00".to_string(), "dropped".to_string()]);
        assert!(text.contains("FPS: "));
        assert!(!text.contains("FPS: 6"));
        assert!(!text.contains("dropped"));
    }
}
