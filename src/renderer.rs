//! Terminal renderer for the Mode 7 line log using crossterm.
//!
//! Draws the wrapped tail of the screen model into the content area and
//! emits minimal commands: only cells that changed since the previous frame
//! are rewritten, and foreground colour codes only on transitions. The
//! bottom terminal row belongs to the status bar, which previews the line
//! being typed or recalled.

use crate::decoder::TextColor;
use crate::screen::{Glyph, Mode7Screen};
use crossterm::{
    cursor, execute, queue,
    style::{self, Attribute, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use std::io::{self, Write};

/// What an untouched cell shows.
const BLANK: Glyph = Glyph {
    ch: ' ',
    color: TextColor::White,
};

/// Convert a Mode 7 colour to crossterm's (bright) palette.
fn to_crossterm_color(color: TextColor) -> style::Color {
    match color {
        TextColor::Red => style::Color::Red,
        TextColor::Green => style::Color::Green,
        TextColor::Yellow => style::Color::Yellow,
        TextColor::Blue => style::Color::Blue,
        TextColor::Magenta => style::Color::Magenta,
        TextColor::Cyan => style::Color::Cyan,
        TextColor::White => style::Color::White,
    }
}

/// Emit one glyph, changing the foreground colour only on transitions.
fn emit_glyph(
    stdout: &mut io::Stdout,
    glyph: &Glyph,
    last_fg: &mut Option<TextColor>,
) -> io::Result<()> {
    if *last_fg != Some(glyph.color) {
        queue!(stdout, SetForegroundColor(to_crossterm_color(glyph.color)))?;
        *last_fg = Some(glyph.color);
    }
    queue!(stdout, style::Print(glyph.ch))?;
    Ok(())
}

/// The terminal renderer.
pub struct Renderer {
    /// Previous frame's content cells for differential rendering.
    prev_cells: Vec<Vec<Glyph>>,
    /// Terminal dimensions; the content area is one row shorter.
    width: usize,
    height: usize,
    /// Whether we need a full redraw.
    force_redraw: bool,
}

impl Renderer {
    /// Create a new renderer for the given terminal dimensions.
    pub fn new(width: usize, height: usize) -> Self {
        let content_height = height.saturating_sub(1);
        Self {
            prev_cells: vec![vec![BLANK; width]; content_height],
            width,
            height,
            force_redraw: true,
        }
    }

    /// Resize the renderer (forces a full redraw).
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.prev_cells = vec![vec![BLANK; width]; height.saturating_sub(1)];
        self.force_redraw = true;
    }

    /// Render the screen model, only updating changed cells, and park the
    /// hardware cursor at the end of the last line.
    pub fn render(&mut self, screen: &Mode7Screen) -> io::Result<()> {
        let mut stdout = io::stdout();

        // Hide cursor during rendering to avoid flicker
        queue!(stdout, cursor::Hide)?;

        let content_height = self.height.saturating_sub(1);
        let rows = screen.wrapped_rows();
        let skip = rows.len().saturating_sub(content_height);
        let visible = &rows[skip..];

        // Target frame: the visible tail, padded to the content grid.
        let mut frame = vec![vec![BLANK; self.width]; content_height];
        for (r, row) in visible.iter().enumerate() {
            for (c, glyph) in row.iter().take(self.width).enumerate() {
                frame[r][c] = *glyph;
            }
        }

        if self.force_redraw {
            queue!(
                stdout,
                terminal::Clear(ClearType::All),
                cursor::MoveTo(0, 0),
                SetBackgroundColor(style::Color::Black)
            )?;

            let mut last_fg = None;
            for (r, row) in frame.iter().enumerate() {
                queue!(stdout, cursor::MoveTo(0, r as u16))?;
                for glyph in row {
                    emit_glyph(&mut stdout, glyph, &mut last_fg)?;
                }
            }

            queue!(stdout, style::ResetColor)?;
            self.prev_cells = frame;
            self.force_redraw = false;
        } else {
            // Differential rendering: only rewrite changed cells
            let mut last_fg = None;
            let mut last_pos: Option<(usize, usize)> = None;
            let mut touched = false;

            for r in 0..content_height.min(self.prev_cells.len()) {
                for c in 0..self.width.min(self.prev_cells[r].len()) {
                    let cell = frame[r][c];
                    if cell == self.prev_cells[r][c] {
                        continue;
                    }
                    if !touched {
                        queue!(stdout, SetBackgroundColor(style::Color::Black))?;
                        touched = true;
                    }
                    // Move only when not already at the expected position
                    if last_pos != Some((r, c)) {
                        queue!(stdout, cursor::MoveTo(c as u16, r as u16))?;
                    }
                    emit_glyph(&mut stdout, &cell, &mut last_fg)?;
                    last_pos = Some((r, c + 1));
                    self.prev_cells[r][c] = cell;
                }
            }

            if touched {
                queue!(stdout, style::ResetColor)?;
            }
        }

        // Park the cursor at the end of the newest line
        let cursor_row = visible.len().saturating_sub(1);
        let cursor_col = visible
            .last()
            .map(|row| row.len())
            .unwrap_or(0)
            .min(self.width.saturating_sub(1));
        queue!(
            stdout,
            cursor::MoveTo(cursor_col as u16, cursor_row as u16),
            cursor::Show
        )?;

        stdout.flush()?;
        Ok(())
    }

    /// Initialize the terminal for raw mode rendering.
    pub fn init() -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), cursor::Show)?;
        Ok(())
    }

    /// Restore the terminal to its original state.
    pub fn cleanup() -> io::Result<()> {
        execute!(io::stdout(), style::ResetColor, cursor::Show)?;
        terminal::disable_raw_mode()?;
        Ok(())
    }
}

/// Input preview bar on the bottom terminal row.
///
/// Shows the line being typed, or the history entry being browsed; an empty
/// selection hides the bar entirely.
pub struct StatusBar {
    text: String,
    /// Whether the bottom row needs repainting.
    dirty: bool,
}

impl StatusBar {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            dirty: true,
        }
    }

    /// Replace the preview text; empty text hides the bar.
    pub fn set_text(&mut self, text: &str) {
        if self.text != text {
            self.text.clear();
            self.text.push_str(text);
            self.dirty = true;
        }
    }

    /// Force a repaint on the next render (after a resize or full clear).
    pub fn force_redraw(&mut self) {
        self.dirty = true;
    }

    /// Repaint the bottom row if the text changed since the last call.
    /// Leaves the hardware cursor where the content renderer parked it.
    pub fn render(&mut self, width: usize, height: usize) -> io::Result<()> {
        if !self.dirty || height == 0 {
            return Ok(());
        }

        let mut stdout = io::stdout();
        let bar_row = (height - 1) as u16;

        queue!(
            stdout,
            cursor::SavePosition,
            cursor::Hide,
            cursor::MoveTo(0, bar_row)
        )?;

        if self.text.is_empty() {
            queue!(stdout, terminal::Clear(ClearType::CurrentLine))?;
        } else {
            queue!(
                stdout,
                SetBackgroundColor(style::Color::DarkBlue),
                SetForegroundColor(style::Color::White),
                SetAttribute(Attribute::Bold),
            )?;

            // Pad or truncate to fill the row. Truncation is by characters,
            // not bytes: the preview can carry multi-byte replacement chars.
            let display: String = self.text.chars().take(width).collect();
            let shown = display.chars().count();
            queue!(stdout, style::Print(display))?;
            let padding = width.saturating_sub(shown);
            if padding > 0 {
                queue!(stdout, style::Print(" ".repeat(padding)))?;
            }

            queue!(stdout, style::ResetColor, SetAttribute(Attribute::Reset))?;
        }

        queue!(stdout, cursor::RestorePosition, cursor::Show)?;
        stdout.flush()?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bar_truncates_by_characters() {
        let mut bar = StatusBar::new();
        // Multi-byte replacement characters straddling the cut point.
        bar.set_text("ab\u{FFFD}\u{FFFD}cd");
        bar.render(3, 4).unwrap();
        bar.set_text("\u{FFFD}\u{FFFD}\u{FFFD}");
        bar.render(2, 4).unwrap();
    }
}
