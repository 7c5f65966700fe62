//! Sent-line history: record a fresh line or browse previously sent ones.
//!
//! The controller is either recording into an uncommitted working buffer or
//! browsing stored entries, never both. Slot 0 of the log is a permanent
//! empty sentinel standing for "fresh line", so browsing indices start at 1
//! and newly committed lines are inserted just behind the sentinel
//! (newest first).

/// Appended to every committed line; the remote end treats CR as end-of-line.
const LINE_TERMINATOR: u8 = b'\r';

/// Which of the two mutually exclusive activities the controller is in.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    /// Composing a new line; `pending` holds the uncommitted bytes.
    Editing { pending: Vec<u8> },
    /// Viewing a stored entry; `index` is always >= 1 and in bounds.
    Browsing { index: usize },
}

/// History of committed input lines plus the in-progress working buffer.
///
/// All operations are total: boundary navigation and keys typed while
/// browsing are no-ops, never errors.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    /// `entries[0]` is the permanent empty sentinel; entries never shrink.
    entries: Vec<Vec<u8>>,
    mode: Mode,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self {
            entries: vec![Vec::new()],
            mode: Mode::Editing {
                pending: Vec::new(),
            },
        }
    }

    /// Append a typed byte to the working buffer. Dropped while browsing:
    /// scrolling and recording are mutually exclusive.
    pub fn record_char(&mut self, code: u8) {
        match &mut self.mode {
            Mode::Editing { pending } => pending.push(code),
            Mode::Browsing { .. } => {
                log::trace!("dropping typed byte {:#04x} while browsing", code);
            }
        }
    }

    /// Move the selection one entry older. Returns the newly selected entry,
    /// or `None` when gated (working buffer non-empty) or already at the
    /// oldest entry.
    pub fn scroll_up(&mut self) -> Option<&[u8]> {
        let index = match &self.mode {
            Mode::Editing { pending } if pending.is_empty() => 0,
            Mode::Editing { .. } => return None,
            Mode::Browsing { index } => *index,
        };
        let next = index + 1;
        if next >= self.entries.len() {
            return None;
        }
        self.mode = Mode::Browsing { index: next };
        Some(&self.entries[next])
    }

    /// Move the selection one entry newer. Stepping off the newest stored
    /// entry returns to the fresh slot (an empty working buffer); at the
    /// fresh slot this is a no-op.
    pub fn scroll_down(&mut self) -> Option<&[u8]> {
        let index = match &self.mode {
            Mode::Browsing { index } => *index,
            Mode::Editing { .. } => return None,
        };
        let next = index - 1;
        if next == 0 {
            self.mode = Mode::Editing {
                pending: Vec::new(),
            };
        } else {
            self.mode = Mode::Browsing { index: next };
        }
        Some(&self.entries[next])
    }

    /// The line currently selected for preview or commit: the stored entry
    /// while browsing, the live working buffer while editing.
    pub fn selected(&self) -> &[u8] {
        match &self.mode {
            Mode::Editing { pending } => pending,
            Mode::Browsing { index } => &self.entries[*index],
        }
    }

    /// Finalize the selected line for transmission.
    ///
    /// Returns its bytes plus a trailing CR. A non-empty working buffer is
    /// folded into the log behind the sentinel; committing a recalled entry
    /// stores nothing new. Either way the selection returns to the fresh
    /// slot.
    pub fn commit(&mut self) -> Vec<u8> {
        let mut line = self.selected().to_vec();
        line.push(LINE_TERMINATOR);

        let prior = std::mem::replace(
            &mut self.mode,
            Mode::Editing {
                pending: Vec::new(),
            },
        );
        if let Mode::Editing { pending } = prior {
            if !pending.is_empty() {
                self.entries.insert(1, pending);
            }
        }
        line
    }

    /// Stored slots, counting the permanent sentinel at 0.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
