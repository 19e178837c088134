//! Compression detection and transparent decompression.
//!
//! Compressed inputs are fully decompressed before viewing: into memory when the
//! compressed file is small, otherwise into an unnamed temp file that is then memory
//! mapped. Either way the result is served by a fixed [`MappedSource`].
//!
//! [`MappedSource`]: crate::source::MappedSource

use crate::error::{ColvError, Result};
use crate::source::mapped::MappedBytes;
use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder, ZstdDecoder};
use memmap2::Mmap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Compressed files below this size are decompressed into memory.
pub const MEMORY_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl CompressionType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Detect the compression of `path` from its magic bytes, falling back to the
/// file extension.
///
/// # Magic Numbers Used
/// - Gzip: `1f 8b`
/// - Bzip2: `42 5a 68` ("BZh")
/// - XZ: `fd 37 7a 58 5a 00`
/// - Zstd: `28 b5 2f fd`
pub async fn detect_compression(path: &Path) -> Result<CompressionType> {
    let mut file = File::open(path)
        .await
        .map_err(|e| ColvError::file_error(format!("Failed to open {}", path.display()), e))?;
    let mut magic = [0u8; 8];
    let read = file.read(&mut magic).await.unwrap_or(0);

    Ok(detect_by_magic(&magic[..read])
        .or_else(|| detect_by_extension(path))
        .unwrap_or(CompressionType::None))
}

fn detect_by_magic(magic: &[u8]) -> Option<CompressionType> {
    if magic.starts_with(&[0x1f, 0x8b]) {
        Some(CompressionType::Gzip)
    } else if magic.starts_with(&[0x42, 0x5a, 0x68]) {
        Some(CompressionType::Bzip2)
    } else if magic.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        Some(CompressionType::Zstd)
    } else if magic.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
        Some(CompressionType::Xz)
    } else {
        None
    }
}

fn detect_by_extension(path: &Path) -> Option<CompressionType> {
    let ext = path.extension()?.to_str()?;
    match ext.to_lowercase().as_str() {
        "gz" => Some(CompressionType::Gzip),
        "bz2" => Some(CompressionType::Bzip2),
        "xz" => Some(CompressionType::Xz),
        "zst" | "zstd" => Some(CompressionType::Zstd),
        _ => None,
    }
}

/// Decompress `path` into bytes a [`MappedSource`](crate::source::MappedSource) can serve.
pub async fn decompress(path: &Path, compression: CompressionType) -> Result<MappedBytes> {
    let compressed_size = tokio::fs::metadata(path)
        .await
        .map_err(|e| ColvError::file_error("Failed to read compressed file metadata", e))?
        .len();

    if compressed_size < MEMORY_THRESHOLD {
        let data = decompress_to_memory(path, compression).await?;
        log::info!(
            "decompressed {} ({}) into memory: {} bytes",
            path.display(),
            compression.name(),
            data.len()
        );
        return Ok(MappedBytes::InMemory(data));
    }

    let spill = decompress_to_spill(path, compression).await?;
    // SAFETY: the spill file is unnamed and only written above, before mapping.
    let mmap = unsafe { Mmap::map(&spill) }.map_err(|e| {
        ColvError::memory_mapping(format!("Failed to map decompressed data: {e}"))
    })?;
    log::info!(
        "decompressed {} ({}) to temp file: {} bytes",
        path.display(),
        compression.name(),
        mmap.len()
    );
    Ok(MappedBytes::Decompressed { mmap, _spill: spill })
}

async fn decoder_for(
    path: &Path,
    compression: CompressionType,
) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    let file = File::open(path)
        .await
        .map_err(|e| ColvError::file_error("Failed to open compressed file", e))?;
    let file = BufReader::new(file);

    Ok(match compression {
        CompressionType::Gzip => Box::new(GzipDecoder::new(file)),
        CompressionType::Bzip2 => Box::new(BzDecoder::new(file)),
        CompressionType::Xz => Box::new(XzDecoder::new(file)),
        CompressionType::Zstd => Box::new(ZstdDecoder::new(file)),
        CompressionType::None => Box::new(file),
    })
}

async fn decompress_to_memory(path: &Path, compression: CompressionType) -> Result<Vec<u8>> {
    let mut decoder = decoder_for(path, compression).await?;
    let mut data = Vec::new();
    decoder
        .read_to_end(&mut data)
        .await
        .map_err(|e| ColvError::compression(format!("Failed to decompress file: {e}")))?;
    Ok(data)
}

async fn decompress_to_spill(path: &Path, compression: CompressionType) -> Result<std::fs::File> {
    let mut decoder = decoder_for(path, compression).await?;

    let spill = tempfile::tempfile().map_err(|e| ColvError::file_error("Failed to create temp file", e))?;
    let handle = spill
        .try_clone()
        .map_err(|e| ColvError::file_error("Failed to clone temp file handle", e))?;
    let mut writer = BufWriter::new(File::from_std(handle));

    tokio::io::copy(&mut decoder, &mut writer)
        .await
        .map_err(|e| ColvError::compression(format!("Failed to decompress file: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ColvError::file_error("Failed to flush temp file", e))?;

    Ok(spill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_detect_magic_numbers() {
        assert_eq!(detect_by_magic(&[0x1f, 0x8b, 0x08]), Some(CompressionType::Gzip));
        assert_eq!(detect_by_magic(&[0x42, 0x5a, 0x68, 0x39]), Some(CompressionType::Bzip2));
        assert_eq!(
            detect_by_magic(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
            Some(CompressionType::Xz)
        );
        assert_eq!(detect_by_magic(&[0x28, 0xb5, 0x2f, 0xfd]), Some(CompressionType::Zstd));
        assert_eq!(detect_by_magic(b"plain text"), None);
        assert_eq!(detect_by_magic(&[]), None);
    }

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(detect_by_extension(Path::new("a.log.gz")), Some(CompressionType::Gzip));
        assert_eq!(detect_by_extension(Path::new("a.BZ2")), Some(CompressionType::Bzip2));
        assert_eq!(detect_by_extension(Path::new("a.zstd")), Some(CompressionType::Zstd));
        assert_eq!(detect_by_extension(Path::new("a.log")), None);
        assert!(CompressionType::Xz.is_compressed());
        assert!(!CompressionType::None.is_compressed());
    }

    #[tokio::test]
    async fn test_gzip_round_trip_into_memory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("events.log.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"ts level msg\n1 INFO up\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert_eq!(detect_compression(&path).await.unwrap(), CompressionType::Gzip);
        let bytes = decompress(&path, CompressionType::Gzip).await.unwrap();
        assert_eq!(bytes.as_bytes(), b"ts level msg\n1 INFO up\n");
        assert_eq!(bytes.strategy_name(), "memory");
    }

    #[tokio::test]
    async fn test_corrupt_gzip_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.gz");
        std::fs::write(&path, [0x1f, 0x8b, 0x08, 0x00, 0x01, 0x02]).unwrap();

        let err = decompress(&path, CompressionType::Gzip).await.unwrap_err();
        assert!(matches!(err, ColvError::CompressionError { .. }));
    }

    #[tokio::test]
    async fn test_spill_decompression_maps_contents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("big.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        for i in 0..1000 {
            writeln!(encoder, "{i} row").unwrap();
        }
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let spill = decompress_to_spill(&path, CompressionType::Gzip).await.unwrap();
        let mmap = unsafe { Mmap::map(&spill).unwrap() };
        assert!(mmap.starts_with(b"0 row\n1 row\n"));
        assert!(mmap.ends_with(b"999 row\n"));
    }
}
