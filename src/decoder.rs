//! Mode 7 byte-stream decoder: classifies incoming serial bytes into display effects.
//!
//! The BBC Micro's teletext mode drives the display with single-byte codes:
//! alpha colour controls (129-135), printable text, and a handful of motion
//! controls. Decoding is a pure function of (current colour, byte); the
//! `Mode7Decoder` wrapper threads the colour between calls.

/// Printable text range, inclusive. 126 maps to the teletext divide sign,
/// not tilde, and is not treated as text.
const TEXT_FIRST: u8 = 20;
const TEXT_LAST: u8 = 125;
const LINE_FEED: u8 = 10;
const CARRIAGE_RETURN: u8 = 13;
const DELETE: u8 = 127;

/// The seven Mode 7 text colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Default for TextColor {
    fn default() -> Self {
        TextColor::White
    }
}

impl TextColor {
    /// Map an alpha colour control code (129..=135) to its colour.
    pub fn from_code(code: u8) -> Option<TextColor> {
        match code {
            129 => Some(TextColor::Red),
            130 => Some(TextColor::Green),
            131 => Some(TextColor::Yellow),
            132 => Some(TextColor::Blue),
            133 => Some(TextColor::Magenta),
            134 => Some(TextColor::Cyan),
            135 => Some(TextColor::White),
            _ => None,
        }
    }
}

/// What the display must do in response to one decoded byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Append a character in the current colour.
    Insert(char),
    /// Switch the drawing colour for subsequent characters.
    SetColor(TextColor),
    /// Reset the drawing colour to white.
    ResetColor,
    /// Start a new display line.
    NewLine,
    /// Remove the most recently inserted character, if any.
    DeletePrevious,
}

/// Classify one byte against the current colour.
///
/// Returns the colour to carry into the next call plus the effect the display
/// should apply, or `None` for bytes the protocol does not handle (those are
/// dropped, never an error). Line feed resets the colour to white rather than
/// moving the cursor; the Beeb sends CR alone for end-of-line, so LF only
/// ever arrives as a colour-state flush.
pub fn step(color: TextColor, byte: u8) -> (TextColor, Option<Effect>) {
    if let Some(c) = TextColor::from_code(byte) {
        return (c, Some(Effect::SetColor(c)));
    }
    match byte {
        TEXT_FIRST..=TEXT_LAST => (color, Some(Effect::Insert(byte as char))),
        LINE_FEED => (TextColor::White, Some(Effect::ResetColor)),
        CARRIAGE_RETURN => (color, Some(Effect::NewLine)),
        DELETE => (color, Some(Effect::DeletePrevious)),
        _ => {
            log::trace!("ignoring unhandled byte {:#04x}", byte);
            (color, None)
        }
    }
}

/// Stateful wrapper around [`step`], owning the threaded colour.
#[derive(Debug, Clone)]
pub struct Mode7Decoder {
    color: TextColor,
}

impl Mode7Decoder {
    pub fn new() -> Self {
        Self {
            color: TextColor::default(),
        }
    }

    /// Decode one incoming byte, updating the carried colour.
    pub fn decode(&mut self, byte: u8) -> Option<Effect> {
        let (color, effect) = step(self.color, byte);
        self.color = color;
        effect
    }

    /// Colour the next inserted character would take.
    #[allow(dead_code)]
    pub fn color(&self) -> TextColor {
        self.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_range_inserts() {
        let mut decoder = Mode7Decoder::new();
        for byte in TEXT_FIRST..=TEXT_LAST {
            assert_eq!(decoder.decode(byte), Some(Effect::Insert(byte as char)));
            assert_eq!(decoder.color(), TextColor::White);
        }
    }

    #[test]
    fn test_color_code_mapping() {
        let expected = [
            (129, TextColor::Red),
            (130, TextColor::Green),
            (131, TextColor::Yellow),
            (132, TextColor::Blue),
            (133, TextColor::Magenta),
            (134, TextColor::Cyan),
            (135, TextColor::White),
        ];
        for (code, color) in expected {
            let mut decoder = Mode7Decoder::new();
            assert_eq!(decoder.decode(code), Some(Effect::SetColor(color)));
            assert_eq!(decoder.color(), color);
        }
    }

    #[test]
    fn test_color_persists_across_characters() {
        let mut decoder = Mode7Decoder::new();
        decoder.decode(130);
        assert_eq!(decoder.decode(b'A'), Some(Effect::Insert('A')));
        assert_eq!(decoder.color(), TextColor::Green);
        assert_eq!(decoder.decode(b'B'), Some(Effect::Insert('B')));
        assert_eq!(decoder.color(), TextColor::Green);
    }

    #[test]
    fn test_line_feed_always_resets_color() {
        let mut decoder = Mode7Decoder::new();
        decoder.decode(132);
        assert_eq!(decoder.decode(LINE_FEED), Some(Effect::ResetColor));
        assert_eq!(decoder.color(), TextColor::White);
        // Already white: still a reset, not a no-op.
        assert_eq!(decoder.decode(LINE_FEED), Some(Effect::ResetColor));
        assert_eq!(decoder.color(), TextColor::White);
    }

    #[test]
    fn test_carriage_return_starts_new_line() {
        let mut decoder = Mode7Decoder::new();
        decoder.decode(134);
        assert_eq!(decoder.decode(CARRIAGE_RETURN), Some(Effect::NewLine));
        // The colour survives the line break.
        assert_eq!(decoder.color(), TextColor::Cyan);
    }

    #[test]
    fn test_delete_emits_delete_previous() {
        let mut decoder = Mode7Decoder::new();
        assert_eq!(decoder.decode(DELETE), Some(Effect::DeletePrevious));
    }

    #[test]
    fn test_unhandled_bytes_are_dropped() {
        for byte in 0..=255u8 {
            let handled = (TEXT_FIRST..=TEXT_LAST).contains(&byte)
                || (129..=135).contains(&byte)
                || byte == LINE_FEED
                || byte == CARRIAGE_RETURN
                || byte == DELETE;
            if handled {
                continue;
            }
            let mut decoder = Mode7Decoder::new();
            assert_eq!(decoder.decode(byte), None, "byte {} should be dropped", byte);
            assert_eq!(decoder.color(), TextColor::White);
        }
    }

    #[test]
    fn test_range_boundaries() {
        let mut decoder = Mode7Decoder::new();
        assert_eq!(decoder.decode(19), None);
        assert_eq!(decoder.decode(20), Some(Effect::Insert('\u{14}')));
        assert_eq!(decoder.decode(125), Some(Effect::Insert('}')));
        assert_eq!(decoder.decode(126), None);
        assert_eq!(decoder.decode(128), None);
        assert_eq!(decoder.decode(136), None);
    }

    #[test]
    fn test_step_threads_color_without_hidden_state() {
        assert_eq!(
            step(TextColor::Green, b'A'),
            (TextColor::Green, Some(Effect::Insert('A')))
        );
        // Same inputs, same outputs.
        assert_eq!(
            step(TextColor::Green, b'A'),
            (TextColor::Green, Some(Effect::Insert('A')))
        );
        assert_eq!(
            step(TextColor::White, 129),
            (TextColor::Red, Some(Effect::SetColor(TextColor::Red)))
        );
    }
}
