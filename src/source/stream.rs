//! Growing byte source for pipes and other sequential inputs.
//!
//! Chunks pulled from a [`Feed`] are appended to a backing store. The store starts in
//! memory and spills to an unnamed temporary file once it outgrows
//! [`StreamOptions::spill_threshold`]; the spill file is memory mapped and grown in
//! place. The operating system reclaims an unnamed temp file when its last handle
//! closes, so nothing is left behind even if the process dies.

use crate::cancel::CancelToken;
use crate::error::{ColvError, Result};
use crate::source::feed::{Chunk, Feed, ReaderFeed};
use crate::source::{count_newlines, partial_tail, ByteSource, CountLimit, DEFAULT_CHUNK_SIZE};
use memmap2::MmapMut;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Tuning knobs for a [`StreamSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Maximum bytes appended per read
    pub chunk_size: usize,
    /// In-memory size above which the store moves to a temp file
    pub spill_threshold: usize,
    /// Directory for the spill file; the system temp dir when unset
    pub spill_dir: Option<PathBuf>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            spill_threshold: 50 * 1024 * 1024,
            spill_dir: None,
        }
    }
}

#[derive(Debug)]
enum BackingStore {
    Memory(Vec<u8>),
    Spilled(SpillFile),
}

impl BackingStore {
    fn as_bytes(&self) -> &[u8] {
        match self {
            BackingStore::Memory(vec) => vec,
            BackingStore::Spilled(spill) => spill.as_bytes(),
        }
    }
}

/// Memory mapped temp file with a logical length below its mapped capacity.
#[derive(Debug)]
struct SpillFile {
    file: File,
    map: MmapMut,
    len: usize,
}

impl SpillFile {
    fn create(initial: &[u8], capacity: usize, dir: Option<&Path>) -> Result<Self> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir),
            None => tempfile::tempfile(),
        }
        .map_err(|e| ColvError::file_error("Failed to create spill file", e))?;

        let capacity = capacity.max(initial.len()).max(1);
        file.set_len(capacity as u64)
            .map_err(|e| ColvError::file_error("Failed to size spill file", e))?;
        let mut map = Self::map(&file)?;
        map[..initial.len()].copy_from_slice(initial);

        Ok(Self {
            file,
            map,
            len: initial.len(),
        })
    }

    fn map(file: &File) -> Result<MmapMut> {
        // SAFETY: the file is unnamed and owned by this store; nothing else can
        // truncate or write it while the mapping is alive.
        unsafe { MmapMut::map_mut(file) }
            .map_err(|e| ColvError::memory_mapping(format!("Failed to map spill file: {e}")))
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self.len + bytes.len();
        if needed > self.map.len() {
            let capacity = needed.max(self.map.len().saturating_mul(2));
            self.file
                .set_len(capacity as u64)
                .map_err(|e| ColvError::file_error("Failed to grow spill file", e))?;
            self.map = Self::map(&self.file)?;
            log::debug!("spill file grown to {} bytes", capacity);
        }
        self.map[self.len..needed].copy_from_slice(bytes);
        self.len = needed;
        Ok(())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.map[..self.len]
    }
}

/// Byte source that grows as its feed delivers data.
pub struct StreamSource {
    feed: Box<dyn Feed>,
    store: BackingStore,
    more: bool,
    options: StreamOptions,
    line_count: Option<u64>,
}

impl StreamSource {
    pub fn new(feed: impl Feed + 'static, options: StreamOptions) -> Self {
        Self {
            feed: Box::new(feed),
            store: BackingStore::Memory(Vec::new()),
            more: true,
            options,
            line_count: None,
        }
    }

    /// Stream over a blocking reader with default options.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::new(ReaderFeed::new(reader), StreamOptions::default())
    }

    /// True once the backing store lives in a temp file.
    pub fn is_spilled(&self) -> bool {
        matches!(self.store, BackingStore::Spilled(_))
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.store {
            BackingStore::Memory(vec) if vec.len() + bytes.len() > self.options.spill_threshold => {
                let mut spill = SpillFile::create(
                    vec,
                    (vec.len() + bytes.len()).saturating_mul(2),
                    self.options.spill_dir.as_deref(),
                )?;
                spill.append(bytes)?;
                log::info!("stream spilled to disk after {} bytes", spill.len);
                self.store = BackingStore::Spilled(spill);
            }
            BackingStore::Memory(vec) => vec.extend_from_slice(bytes),
            BackingStore::Spilled(spill) => spill.append(bytes)?,
        }
        Ok(())
    }
}

impl ByteSource for StreamSource {
    fn data(&self) -> &[u8] {
        self.store.as_bytes()
    }

    fn more_data_possible(&self) -> bool {
        self.more
    }

    fn read_block(&mut self, wait: bool) -> Result<usize> {
        if !self.more {
            return Ok(0);
        }
        let chunk = self
            .feed
            .next_chunk(self.options.chunk_size, wait)
            .map_err(|e| ColvError::file_error("Failed to read input stream", e))?;
        match chunk {
            Chunk::Data(bytes) => {
                self.append(&bytes)?;
                Ok(bytes.len())
            }
            Chunk::Pending => Ok(0),
            Chunk::Eof => {
                self.more = false;
                log::debug!("end of stream after {} bytes", self.size());
                Ok(0)
            }
        }
    }

    fn file_path(&self) -> Option<&Path> {
        None
    }

    fn total_line_count(&mut self, limit: CountLimit, cancel: &CancelToken) -> Result<u64> {
        if let Some(count) = self.line_count {
            return Ok(count);
        }

        let mut lines = count_newlines(self.data(), cancel)?;
        while self.more {
            if limit.reached(lines, self.size()) {
                return Ok(lines);
            }
            let before = self.data().len();
            if !self.pull(cancel)? {
                break;
            }
            lines += count_newlines(&self.data()[before..], cancel)?;
        }

        let total = lines + partial_tail(self.data());
        if limit.is_unbounded() {
            self.line_count = Some(total);
        }
        Ok(total)
    }
}
