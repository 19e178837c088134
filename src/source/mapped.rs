//! Fixed-size byte source.
//!
//! Small files are read into memory, large ones are memory mapped, and compressed
//! inputs are served from their decompressed bytes. The contents never change once
//! the source is built, so the line count is computed at most once.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::source::{count_newlines, partial_tail, ByteSource, CountLimit};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Storage strategy behind a [`MappedSource`].
#[derive(Debug)]
pub enum MappedBytes {
    /// Content loaded entirely into memory
    InMemory(Vec<u8>),
    /// Content accessed via memory mapping
    MemoryMapped(Mmap),
    /// Decompressed content in an unnamed temp file, memory mapped.
    /// The file handle keeps the storage alive for the mapping.
    Decompressed { mmap: Mmap, _spill: File },
}

impl MappedBytes {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MappedBytes::InMemory(vec) => vec.as_slice(),
            MappedBytes::MemoryMapped(mmap) => &mmap[..],
            MappedBytes::Decompressed { mmap, .. } => &mmap[..],
        }
    }

    /// Short name of the strategy, shown in the status line and logs.
    pub fn strategy_name(&self) -> &'static str {
        match self {
            MappedBytes::InMemory(_) => "memory",
            MappedBytes::MemoryMapped(_) => "mmap",
            MappedBytes::Decompressed { .. } => "decompressed",
        }
    }
}

/// Byte source over an input whose contents are fully known up front.
#[derive(Debug)]
pub struct MappedSource {
    bytes: MappedBytes,
    /// Set only when the bytes are exactly the contents of this file
    path: Option<PathBuf>,
    line_count: Option<u64>,
}

impl MappedSource {
    /// Wrap `bytes`. Pass `path` only when the bytes mirror that file on disk.
    pub fn new(bytes: MappedBytes, path: Option<PathBuf>) -> Self {
        Self {
            bytes,
            path,
            line_count: None,
        }
    }

    /// In-memory source without a backing file.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::new(MappedBytes::InMemory(data.into()), None)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.bytes.strategy_name()
    }
}

impl ByteSource for MappedSource {
    fn data(&self) -> &[u8] {
        self.bytes.as_bytes()
    }

    fn more_data_possible(&self) -> bool {
        false
    }

    fn read_block(&mut self, _wait: bool) -> Result<usize> {
        Ok(0)
    }

    fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn total_line_count(&mut self, _limit: CountLimit, cancel: &CancelToken) -> Result<u64> {
        if let Some(count) = self.line_count {
            return Ok(count);
        }
        let data = self.bytes.as_bytes();
        let count = count_newlines(data, cancel)? + partial_tail(data);
        self.line_count = Some(count);
        Ok(count)
    }
}
