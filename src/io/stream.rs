//! Positioned file access shared by all format backends.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "mmap")]
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::util::{Error, Result};

/// How a file session is opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Existing file, no writes
    #[default]
    ReadOnly,
    /// Existing file, read and write; a missing file is created
    ReadWrite,
    /// Create or truncate, then read and write
    Truncate,
}

/// Random access stream over one file.
///
/// Read-only sessions may be memory mapped; every other mode goes through
/// a locked file handle.
pub struct FileStream {
    path: PathBuf,
    mode: FileMode,
    inner: StreamInner,
    size: u64,
}

enum StreamInner {
    /// Memory-mapped file (read-only sessions)
    #[cfg(feature = "mmap")]
    Mmap(Mmap),
    /// Plain file handle
    File(Mutex<File>),
}

fn map_open_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::FileNotFound(path.to_path_buf())
    } else {
        Error::Io(e)
    }
}

impl FileStream {
    /// Open with memory mapping enabled for read-only sessions.
    pub fn open(path: impl AsRef<Path>, mode: FileMode) -> Result<Self> {
        Self::open_opts(path, mode, true)
    }

    /// Open a file. `ReadWrite` on a missing file behaves as `Truncate`.
    pub fn open_opts(path: impl AsRef<Path>, mode: FileMode, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let mode = match mode {
            FileMode::ReadWrite if !path.exists() => FileMode::Truncate,
            m => m,
        };

        let file = match mode {
            FileMode::ReadOnly => File::open(path),
            FileMode::ReadWrite => OpenOptions::new().read(true).write(true).open(path),
            FileMode::Truncate => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
        }
        .map_err(|e| map_open_error(path, e))?;

        let size = file.metadata()?.len();
        let inner = Self::make_inner(file, mode, use_mmap && size > 0)?;

        tracing::debug!(path = %path.display(), ?mode, size, "opened file");

        Ok(Self {
            path: path.to_path_buf(),
            mode,
            inner,
            size,
        })
    }

    #[cfg(feature = "mmap")]
    fn make_inner(file: File, mode: FileMode, use_mmap: bool) -> Result<StreamInner> {
        if use_mmap && mode == FileMode::ReadOnly {
            // Safety: the map is read-only and lives no longer than this stream.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            Ok(StreamInner::Mmap(mmap))
        } else {
            Ok(StreamInner::File(Mutex::new(file)))
        }
    }

    #[cfg(not(feature = "mmap"))]
    fn make_inner(file: File, _mode: FileMode, _use_mmap: bool) -> Result<StreamInner> {
        Ok(StreamInner::File(Mutex::new(file)))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective mode after resolving `ReadWrite` on a missing file.
    #[inline]
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Current file size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// True when reads come from a memory map.
    pub fn is_mapped(&self) -> bool {
        match &self.inner {
            #[cfg(feature = "mmap")]
            StreamInner::Mmap(_) => true,
            StreamInner::File(_) => false,
        }
    }

    fn check_range(&self, pos: u64, len: usize) -> Result<()> {
        let end = pos.checked_add(len as u64);
        match end {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::corrupt(
                &self.path,
                format!(
                    "unexpected end of file: need {} bytes at offset {}, file has {}",
                    len, pos, self.size
                ),
            )),
        }
    }

    /// Fill `buf` from offset `pos`. Reading past the end is a corrupt file.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(pos, buf.len())?;
        match &self.inner {
            #[cfg(feature = "mmap")]
            StreamInner::Mmap(mmap) => {
                let start = pos as usize;
                buf.copy_from_slice(&mmap[start..start + buf.len()]);
                Ok(())
            }
            StreamInner::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }

    /// Read `len` bytes at `pos`.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Whole file as UTF-8 text.
    pub fn read_to_string(&self) -> Result<String> {
        let bytes = self.read_bytes(0, self.size as usize)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::corrupt(&self.path, format!("invalid UTF-8: {}", e)))
    }

    fn writable(&self) -> Result<&Mutex<File>> {
        match &self.inner {
            StreamInner::File(file) if self.mode != FileMode::ReadOnly => Ok(file),
            _ => Err(Error::ReadOnly(self.path.clone())),
        }
    }

    /// Write `data` at offset `pos`, growing the file as needed.
    pub fn write_at(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        {
            let mut f = self.writable()?.lock();
            f.seek(SeekFrom::Start(pos))?;
            f.write_all(data)?;
        }
        self.size = self.size.max(pos + data.len() as u64);
        Ok(())
    }

    /// Append `data` at the end of the file.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.write_at(self.size, data)
    }

    /// Truncate or zero-extend the file.
    pub fn set_len(&mut self, len: u64) -> Result<()> {
        self.writable()?.lock().set_len(len)?;
        self.size = len;
        Ok(())
    }

    /// Flush pending writes to disk.
    pub fn flush(&mut self) -> Result<()> {
        if let StreamInner::File(file) = &self.inner {
            file.lock().flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("size", &self.size)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
