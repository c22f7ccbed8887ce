//! Cursor-based readers over a collector buffer

use super::CollectorBuffer;
use crate::models::{Cursor, Pack};

/// Incremental reader with a private cursor
///
/// A reader never borrows the buffer it reads; every read takes the buffer
/// explicitly so several readers can share one buffer on the consumer
/// thread.
///
/// Clearing reads shift the buffer under every other reader. A second
/// reader's cursor then points into the shifted buffer and may skip
/// entries. Share a buffer between readers only if at most one of them
/// clears.
#[derive(Debug, Clone, Default)]
pub struct Stream {
    cursor: Cursor,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a known position
    pub fn with_cursor(cursor: Cursor) -> Self {
        Self { cursor }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Read the whole buffer
    ///
    /// With `clear`, the buffer is emptied and the cursor reset to zero.
    pub fn read_all(&mut self, buffer: &mut CollectorBuffer, clear: bool) -> Pack {
        let pack = Pack {
            logs: buffer.logs().to_vec(),
            stats: buffer.stats().to_vec(),
        };
        if clear {
            buffer.clear();
            self.cursor = Cursor::default();
        } else {
            self.cursor = Cursor {
                log_index: pack.logs.len(),
                stat_index: pack.stats.len(),
            };
        }
        pack
    }

    /// Read the entries appended since this reader's last read
    ///
    /// With `clear`, the prefix consumed by earlier reads is removed from
    /// the buffer first. Entries returned now stay buffered until the next
    /// clearing read.
    pub fn read_rest(&mut self, buffer: &mut CollectorBuffer, clear: bool) -> Pack {
        // Another reader may have shortened the buffer
        let log_start = self.cursor.log_index.min(buffer.logs().len());
        let stat_start = self.cursor.stat_index.min(buffer.stats().len());

        let pack = Pack {
            logs: buffer.logs()[log_start..].to_vec(),
            stats: buffer.stats()[stat_start..].to_vec(),
        };

        if clear {
            buffer.remove_prefix(log_start, stat_start);
        }
        self.cursor = Cursor {
            log_index: buffer.logs().len(),
            stat_index: buffer.stats().len(),
        };
        pack
    }
}
