//! Byte sources: the raw input behind the line cache.
//!
//! A [`ByteSource`] exposes a contiguous, append-only view of the input bytes. Two
//! variants exist:
//!
//! - [`MappedSource`]: a fixed input (regular file, memory mapped when large, or the
//!   decompressed contents of a compressed file). Never grows.
//! - [`StreamSource`]: a pipe or other sequential input read in chunks into an
//!   append-only backing store. Grows until its feed reports end of input.
//!
//! Offsets handed out by a source stay valid for its whole lifetime: bytes are only
//! ever appended, never moved or removed.
//!
//! The trait's provided methods implement the scanning primitives the cache needs
//! (newline lookup, line counting, windowed pattern search) on top of the few
//! variant-specific operations.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::pattern::SearchPattern;
use bstr::ByteSlice;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

pub mod compression;
pub mod factory;
pub mod feed;
pub mod mapped;
pub mod stream;
pub mod validation;

pub use factory::SourceFactory;
pub use feed::{spawn_pump, ChannelFeed, Chunk, Feed, ReaderFeed};
pub use mapped::{MappedBytes, MappedSource};
pub use stream::{StreamOptions, StreamSource};

/// Default number of bytes pulled from a stream per read.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes scanned between two cancellation checks.
pub const SCAN_WINDOW: usize = 1024 * 1024;

/// Optional early-stop conditions for [`ByteSource::total_line_count`].
///
/// A count that stopped early is never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountLimit {
    /// Stop once at least this many lines have been seen
    pub lines: Option<u64>,
    /// Stop once at least this many bytes are materialized
    pub offset: Option<u64>,
}

impl CountLimit {
    /// Count everything, reading to end of input.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn lines(lines: u64) -> Self {
        Self {
            lines: Some(lines),
            offset: None,
        }
    }

    pub fn offset(offset: u64) -> Self {
        Self {
            lines: None,
            offset: Some(offset),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.lines.is_none() && self.offset.is_none()
    }

    pub(crate) fn reached(&self, lines: u64, size: u64) -> bool {
        self.lines.is_some_and(|stop| lines >= stop) || self.offset.is_some_and(|stop| size >= stop)
    }
}

/// Contiguous, append-only view over the input bytes.
pub trait ByteSource: Send {
    /// All bytes materialized so far.
    fn data(&self) -> &[u8];

    /// False once the end of the input has been observed. Never flips back to true.
    fn more_data_possible(&self) -> bool;

    /// Append at most one chunk from the underlying input.
    ///
    /// With `wait == false` this returns `Ok(0)` when nothing is ready yet, leaving
    /// `more_data_possible()` untouched. Reaching end of input returns `Ok(0)` and
    /// clears `more_data_possible()`. Fixed sources always return `Ok(0)`.
    fn read_block(&mut self, wait: bool) -> Result<usize>;

    /// Path of an on-disk file holding exactly these bytes, if there is one.
    fn file_path(&self) -> Option<&Path>;

    /// Number of lines in the input; a final line without trailing newline counts.
    ///
    /// Reads the remaining input unless `limit` stops it early. The full count is
    /// cached once end of input is known.
    fn total_line_count(&mut self, limit: CountLimit, cancel: &CancelToken) -> Result<u64>;

    /// Number of bytes materialized so far.
    fn size(&self) -> u64 {
        self.data().len() as u64
    }

    fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Materialized bytes in `range`, clamped to the current size.
    fn slice(&self, range: Range<u64>) -> &[u8] {
        let data = self.data();
        let end = (range.end as usize).min(data.len());
        let start = (range.start as usize).min(end);
        &data[start..end]
    }

    fn byte_at(&self, offset: u64) -> Option<u8> {
        self.data().get(offset as usize).copied()
    }

    /// Block for the next chunk, polling `cancel` between attempts.
    ///
    /// Returns false once end of input is reached.
    fn pull(&mut self, cancel: &CancelToken) -> Result<bool> {
        loop {
            cancel.check()?;
            if self.read_block(true)? > 0 {
                return Ok(true);
            }
            if !self.more_data_possible() {
                return Ok(false);
            }
        }
    }

    /// Read until at least `offset` bytes are materialized or input ends.
    fn ensure_materialized(&mut self, offset: u64, cancel: &CancelToken) -> Result<()> {
        while self.size() < offset && self.more_data_possible() {
            if !self.pull(cancel)? {
                break;
            }
        }
        Ok(())
    }

    /// Offset of the first `needle` at or after `from`.
    ///
    /// On a growing source a miss triggers non-blocking reads; the search resumes at
    /// the start of the last incomplete line so a needle is never split. Returns
    /// `None` when the needle is absent from everything readable right now.
    fn index_of(&mut self, needle: &[u8], from: u64) -> Result<Option<u64>> {
        let mut from = from as usize;
        loop {
            let data = self.data();
            if from <= data.len() {
                let found = if needle.len() == 1 {
                    memchr::memchr(needle[0], &data[from..])
                } else {
                    data[from..].find(needle)
                };
                if let Some(pos) = found {
                    return Ok(Some((from + pos) as u64));
                }
            }
            if !self.more_data_possible() {
                return Ok(None);
            }
            let tail = line_start(data, data.len());
            from = from.max(tail);
            if self.read_block(false)? == 0 {
                return Ok(None);
            }
        }
    }

    /// Offset of the last `needle` that ends at or before `before`.
    fn rindex_of(&self, needle: &[u8], before: u64) -> Option<u64> {
        let data = self.data();
        let end = (before as usize).min(data.len());
        let haystack = &data[..end];
        let found = if needle.len() == 1 {
            memchr::memrchr(needle[0], haystack)
        } else {
            haystack.rfind(needle)
        };
        found.map(|pos| pos as u64)
    }

    /// Number of newlines strictly before `offset`, i.e. the 0-based index of the
    /// line starting at `offset`.
    fn count_lines_upto(&mut self, offset: u64, cancel: &CancelToken) -> Result<u64> {
        self.ensure_materialized(offset, cancel)?;
        let data = self.data();
        let end = (offset as usize).min(data.len());
        count_newlines(&data[..end], cancel)
    }

    /// Start offset of the first match at or after `from`.
    ///
    /// Only complete lines are scanned while more data may arrive. Blocks for more
    /// input as needed; interruptible through `cancel`.
    fn find_pattern(
        &mut self,
        pattern: &SearchPattern,
        from: u64,
        cancel: &CancelToken,
    ) -> Result<Option<u64>> {
        let mut from = from as usize;
        loop {
            let data = self.data();
            let more = self.more_data_possible();
            let complete = if more {
                line_start(data, data.len())
            } else {
                data.len()
            };

            let mut at = from;
            while at < complete {
                cancel.check()?;
                let end = window_end(data, at, complete);
                if let Some(found) = pattern.find_at(&data[..end], at)? {
                    return Ok(Some(found.start as u64));
                }
                at = end;
            }
            from = from.max(complete);

            if !more {
                return Ok(None);
            }
            self.pull(cancel)?;
        }
    }

    /// Start offset of the last match that begins before `before`.
    ///
    /// `before` is expected to be a line start so that no candidate crosses it.
    fn rfind_pattern(
        &self,
        pattern: &SearchPattern,
        before: u64,
        cancel: &CancelToken,
    ) -> Result<Option<u64>> {
        let data = self.data();
        let mut end = (before as usize).min(data.len());
        while end > 0 {
            cancel.check()?;
            let start = if end <= SCAN_WINDOW {
                0
            } else {
                line_start(data, end - SCAN_WINDOW)
            };
            if let Some(found) = pattern.rfind_from(&data[..end], start)? {
                return Ok(Some(found as u64));
            }
            end = start;
        }
        Ok(None)
    }

    /// Read the input to its end and write every byte to `sink`.
    fn copy_all_to(&mut self, sink: &mut dyn Write, cancel: &CancelToken) -> Result<u64> {
        while self.more_data_possible() {
            if !self.pull(cancel)? {
                break;
            }
        }
        let data = self.data();
        for block in data.chunks(DEFAULT_CHUNK_SIZE) {
            cancel.check()?;
            sink.write_all(block)?;
        }
        sink.flush()?;
        Ok(data.len() as u64)
    }
}

/// Position right after the last `\n` in `data[..pos]`, or 0.
pub(crate) fn line_start(data: &[u8], pos: usize) -> usize {
    let pos = pos.min(data.len());
    memchr::memrchr(b'\n', &data[..pos]).map_or(0, |nl| nl + 1)
}

/// Count `\n` bytes, polling `cancel` once per scan window.
pub(crate) fn count_newlines(data: &[u8], cancel: &CancelToken) -> Result<u64> {
    let mut total = 0u64;
    for window in data.chunks(SCAN_WINDOW) {
        cancel.check()?;
        total += memchr::memchr_iter(b'\n', window).count() as u64;
    }
    Ok(total)
}

/// 1 when a non-empty input does not end with a newline.
pub(crate) fn partial_tail(data: &[u8]) -> u64 {
    match data.last() {
        Some(b'\n') | None => 0,
        Some(_) => 1,
    }
}

/// End of the scan window starting at `at`: the first line boundary past
/// `at + SCAN_WINDOW`, capped at `limit`.
fn window_end(data: &[u8], at: usize, limit: usize) -> usize {
    let target = at.saturating_add(SCAN_WINDOW);
    if target >= limit {
        return limit;
    }
    memchr::memchr(b'\n', &data[target..limit]).map_or(limit, |nl| target + nl + 1)
}
