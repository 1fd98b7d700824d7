//! Change log watermark.

use chrono::{DateTime, Utc};

/// Creation time of the last change entry the poller observed.
///
/// `None` means nothing has been observed yet and the next query fetches the
/// whole log. The value never moves backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    last_seen: Option<DateTime<Utc>>,
}

impl Cursor {
    /// Creates an unset cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the watermark, if any entry was observed.
    #[must_use]
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Moves the watermark to `created_at` unless that would move it back.
    ///
    /// Returns true if the watermark changed.
    pub fn advance(&mut self, created_at: DateTime<Utc>) -> bool {
        match self.last_seen {
            Some(current) if current >= created_at => false,
            _ => {
                self.last_seen = Some(created_at);
                true
            }
        }
    }
}
