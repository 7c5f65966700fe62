//! Display model: the log of coloured lines a decoded byte stream builds up.
//!
//! Owns the rendered text and applies decoder effects in arrival order. The
//! model is presentation-free; the renderer turns it into terminal rows via
//! `wrapped_rows`.

use crate::decoder::{Effect, TextColor};

/// Mode 7 text is 40 columns wide; longer lines wrap for display.
pub const MODE7_COLUMNS: usize = 40;

/// Retained line cap; the oldest line is discarded beyond this.
const SCROLLBACK_LINES: usize = 500;

/// Per-line glyph cap; inserts beyond this are dropped until the next line.
const MAX_LINE_GLYPHS: usize = 1000;

/// One display cell: a character and the colour it was inserted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub ch: char,
    pub color: TextColor,
}

/// The accumulated display text.
pub struct Mode7Screen {
    /// Never empty; the last line is the insertion point.
    lines: Vec<Vec<Glyph>>,
    /// Drawing colour for newly inserted glyphs. Maintained from colour
    /// effects only; independent of the decoder's own threaded colour.
    color: TextColor,
}

impl Mode7Screen {
    pub fn new() -> Self {
        Self {
            lines: vec![Vec::new()],
            color: TextColor::default(),
        }
    }

    /// Apply one decoded effect.
    pub fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Insert(ch) => {
                let glyph = Glyph {
                    ch,
                    color: self.color,
                };
                if let Some(line) = self.lines.last_mut() {
                    // A line that never sees a CR must not grow without bound.
                    if line.len() < MAX_LINE_GLYPHS {
                        line.push(glyph);
                    }
                }
            }
            Effect::SetColor(color) => self.color = color,
            Effect::ResetColor => self.color = TextColor::White,
            Effect::NewLine => {
                self.lines.push(Vec::new());
                if self.lines.len() > SCROLLBACK_LINES {
                    self.lines.remove(0);
                }
            }
            Effect::DeletePrevious => {
                // Deletion stops at the start of the line; lines never join.
                if let Some(line) = self.lines.last_mut() {
                    line.pop();
                }
            }
        }
    }

    /// The log as display rows, each at most [`MODE7_COLUMNS`] glyphs wide.
    /// An empty line still occupies one blank row.
    pub fn wrapped_rows(&self) -> Vec<&[Glyph]> {
        let mut rows = Vec::new();
        for line in &self.lines {
            if line.is_empty() {
                rows.push(&line[..]);
            } else {
                for chunk in line.chunks(MODE7_COLUMNS) {
                    rows.push(chunk);
                }
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(row: &[Glyph]) -> String {
        row.iter().map(|g| g.ch).collect()
    }

    #[test]
    fn test_fresh_screen_has_one_blank_row() {
        let screen = Mode7Screen::new();
        let rows = screen.wrapped_rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_empty());
    }

    #[test]
    fn test_insert_uses_current_color() {
        let mut screen = Mode7Screen::new();
        screen.apply(Effect::SetColor(TextColor::Green));
        screen.apply(Effect::Insert('A'));
        let rows = screen.wrapped_rows();
        assert_eq!(
            rows[0],
            &[Glyph {
                ch: 'A',
                color: TextColor::Green
            }]
        );
    }

    #[test]
    fn test_reset_color_returns_to_white() {
        let mut screen = Mode7Screen::new();
        screen.apply(Effect::SetColor(TextColor::Blue));
        screen.apply(Effect::ResetColor);
        screen.apply(Effect::Insert('x'));
        assert_eq!(screen.wrapped_rows()[0][0].color, TextColor::White);
    }

    #[test]
    fn test_new_line_appends_blank_rows() {
        let mut screen = Mode7Screen::new();
        screen.apply(Effect::Insert('a'));
        screen.apply(Effect::NewLine);
        screen.apply(Effect::NewLine);
        let rows = screen.wrapped_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(text_of(rows[0]), "a");
        assert!(rows[1].is_empty());
        assert!(rows[2].is_empty());
    }

    #[test]
    fn test_delete_previous_stops_at_line_start() {
        let mut screen = Mode7Screen::new();
        screen.apply(Effect::Insert('a'));
        screen.apply(Effect::Insert('b'));
        screen.apply(Effect::DeletePrevious);
        assert_eq!(text_of(screen.wrapped_rows()[0]), "a");

        screen.apply(Effect::DeletePrevious);
        screen.apply(Effect::DeletePrevious);
        let rows = screen.wrapped_rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_empty());
    }

    #[test]
    fn test_delete_previous_never_joins_lines() {
        let mut screen = Mode7Screen::new();
        screen.apply(Effect::Insert('a'));
        screen.apply(Effect::NewLine);
        screen.apply(Effect::DeletePrevious);
        let rows = screen.wrapped_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(text_of(rows[0]), "a");
        assert!(rows[1].is_empty());
    }

    #[test]
    fn test_long_line_wraps_at_display_width() {
        let mut screen = Mode7Screen::new();
        for _ in 0..45 {
            screen.apply(Effect::Insert('x'));
        }
        let rows = screen.wrapped_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), MODE7_COLUMNS);
        assert_eq!(rows[1].len(), 5);
    }

    #[test]
    fn test_line_length_is_bounded() {
        let mut screen = Mode7Screen::new();
        for _ in 0..MAX_LINE_GLYPHS + 50 {
            screen.apply(Effect::Insert('x'));
        }
        let glyphs: usize = screen.wrapped_rows().iter().map(|row| row.len()).sum();
        assert_eq!(glyphs, MAX_LINE_GLYPHS);

        // The next line accepts text again.
        screen.apply(Effect::NewLine);
        screen.apply(Effect::Insert('y'));
        assert_eq!(screen.wrapped_rows().last().unwrap().len(), 1);
    }

    #[test]
    fn test_scrollback_is_bounded() {
        let mut screen = Mode7Screen::new();
        screen.apply(Effect::Insert('a'));
        for _ in 0..SCROLLBACK_LINES + 100 {
            screen.apply(Effect::NewLine);
        }
        let rows = screen.wrapped_rows();
        assert_eq!(rows.len(), SCROLLBACK_LINES);
        // The earliest line (holding 'a') was discarded.
        assert!(rows.iter().all(|row| row.is_empty()));
    }
}
