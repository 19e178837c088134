//! Picks the right byte source for an input.
//!
//! # Strategy Selection
//! - Files < 50MB: read into memory
//! - Files ≥ 50MB: memory mapped
//! - Compressed files: decompressed first (see [`compression`](super::compression))
//! - Standard input or any other reader: a [`StreamSource`] fed by a pump thread

use crate::error::{ColvError, Result};
use crate::source::compression::{decompress, detect_compression};
use crate::source::feed::spawn_pump;
use crate::source::mapped::{MappedBytes, MappedSource};
use crate::source::stream::{StreamOptions, StreamSource};
use crate::source::validation::validate_file_path;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::thread::JoinHandle;

pub struct SourceFactory;

impl SourceFactory {
    /// Files smaller than this are loaded into memory instead of mapped.
    const MEMORY_THRESHOLD: u64 = 50 * 1024 * 1024;

    /// Open a file on disk as a fixed source.
    ///
    /// # Errors
    /// * Validation errors (missing path, directory, unreadable)
    /// * Decompression failures
    /// * Memory mapping failures
    pub async fn open(path: &Path) -> Result<MappedSource> {
        validate_file_path(path)?;

        let compression = detect_compression(path).await?;
        if compression.is_compressed() {
            let bytes = decompress(path, compression).await?;
            return Ok(MappedSource::new(bytes, None));
        }

        let mut file = File::open(path).map_err(|e| {
            ColvError::file_error(format!("Failed to open file: {}", path.display()), e)
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| ColvError::file_error("Failed to get file metadata", e))?
            .len();

        let bytes = if file_size < Self::MEMORY_THRESHOLD {
            let mut content = Vec::with_capacity(file_size as usize);
            file.read_to_end(&mut content)
                .map_err(|e| ColvError::file_error("Failed to read file", e))?;
            MappedBytes::InMemory(content)
        } else {
            // SAFETY: the mapping is read-only; a concurrent writer can change the
            // bytes but the view never outlives the mapping.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                ColvError::memory_mapping(format!(
                    "Failed to memory map {}: {e}",
                    path.display()
                ))
            })?;
            if let Err(e) = mmap.advise(memmap2::Advice::Sequential) {
                log::warn!("madvise failed for {}: {}", path.display(), e);
            }
            MappedBytes::MemoryMapped(mmap)
        };

        log::info!(
            "opened {} ({} bytes, {})",
            path.display(),
            file_size,
            bytes.strategy_name()
        );
        Ok(MappedSource::new(bytes, Some(path.to_path_buf())))
    }

    /// Stream `reader` through a background pump thread.
    ///
    /// `on_ready` is invoked from the pump thread whenever a chunk becomes available.
    pub fn stream<R, F>(reader: R, options: StreamOptions, on_ready: F) -> (StreamSource, JoinHandle<()>)
    where
        R: Read + Send + 'static,
        F: Fn() + Send + 'static,
    {
        let (feed, pump) = spawn_pump(reader, options.chunk_size, on_ready);
        (StreamSource::new(feed, options), pump)
    }

    /// Stream standard input.
    pub fn stdin<F>(options: StreamOptions, on_ready: F) -> (StreamSource, JoinHandle<()>)
    where
        F: Fn() + Send + 'static,
    {
        log::info!("reading standard input");
        Self::stream(std::io::stdin(), options, on_ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::source::{ByteSource, CountLimit};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn small_file_is_loaded_into_memory() {
        let file = create_test_file(b"a 1\nb 2\n");
        let source = SourceFactory::open(file.path()).await.unwrap();
        assert_eq!(source.strategy_name(), "memory");
        assert_eq!(source.data(), b"a 1\nb 2\n");
        assert_eq!(source.file_path(), Some(file.path()));
    }

    #[tokio::test]
    async fn empty_file_opens() {
        let file = create_test_file(b"");
        let mut source = SourceFactory::open(file.path()).await.unwrap();
        assert!(source.is_empty());
        assert_eq!(
            source
                .total_line_count(CountLimit::unbounded(), &CancelToken::new())
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SourceFactory::open(&dir.path().join("absent.log")).await;
        assert!(matches!(result, Err(ColvError::FileNotFound { .. })));
    }

    #[test]
    fn stream_reads_through_pump() {
        let cancel = CancelToken::new();
        let (mut source, pump) = SourceFactory::stream(
            std::io::Cursor::new(b"x\ny\nz".to_vec()),
            StreamOptions {
                chunk_size: 2,
                ..StreamOptions::default()
            },
            || {},
        );
        assert_eq!(
            source.total_line_count(CountLimit::unbounded(), &cancel).unwrap(),
            3
        );
        assert!(!source.more_data_possible());
        pump.join().unwrap();
    }
}
