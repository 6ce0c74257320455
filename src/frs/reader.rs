//! Byte access to an open results file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;
use parking_lot::Mutex;

use crate::util::{Error, Result};

/// Input stream over one results file.
/// Supports both memory-mapped and buffered I/O modes.
pub struct FrsStreams {
    inner: StreamsInner,
    size: u64,
}

enum StreamsInner {
    /// Memory-mapped file (preferred for large files)
    Mmap { file: File, map: Mmap },
    /// Buffered file access (fallback)
    File(Mutex<File>),
}

impl FrsStreams {
    /// Open a file for reading with memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true)
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size == 0 {
            return Err(Error::UnexpectedEof(0));
        }

        let inner = if use_mmap {
            // Safety: the file is opened read-only; writers only ever append
            let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            StreamsInner::Mmap { file, map }
        } else {
            StreamsInner::File(Mutex::new(file))
        };

        Ok(Self { inner, size })
    }

    /// Current file size as seen by this stream.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Re-stat the file, remapping if it has grown. Returns the new size.
    pub fn refresh(&mut self) -> Result<u64> {
        let size = match &mut self.inner {
            StreamsInner::Mmap { file, map } => {
                let size = file.metadata()?.len();
                if size != self.size {
                    // Safety: see open_opts
                    *map = unsafe { Mmap::map(&*file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
                }
                size
            }
            StreamsInner::File(file) => file.lock().metadata()?.len(),
        };
        self.size = size;
        Ok(size)
    }

    /// Read the bytes from `pos` up to `pos + buf.len()`, clamped at the end
    /// of file. Returns the number of bytes copied.
    pub fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        if pos >= self.size {
            return Ok(0);
        }
        let len = buf.len().min((self.size - pos) as usize);
        match &self.inner {
            StreamsInner::Mmap { map, .. } => {
                let start = pos as usize;
                buf[..len].copy_from_slice(&map[start..start + len]);
            }
            StreamsInner::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(&mut buf[..len])?;
            }
        }
        Ok(len)
    }

    /// Read exactly `buf.len()` bytes at `pos`.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        if pos + buf.len() as u64 > self.size {
            return Err(Error::UnexpectedEof(pos + buf.len() as u64));
        }
        self.read_at(pos, buf).map(|_| ())
    }

    /// Read `len` bytes at `pos` into a new buffer.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read from the start of the file until `done` accepts the prefix read
    /// so far, growing the window geometrically. Used to pull in the text
    /// header without knowing its length.
    pub fn read_prefix_until(&self, mut done: impl FnMut(&[u8]) -> bool) -> Result<Vec<u8>> {
        if let StreamsInner::Mmap { map, .. } = &self.inner {
            return Ok(map[..self.size as usize].to_vec());
        }
        let mut window = 64 * 1024u64;
        loop {
            let len = window.min(self.size) as usize;
            let buf = self.read_bytes(0, len)?;
            if len as u64 == self.size || done(&buf) {
                return Ok(buf);
            }
            window *= 4;
        }
    }

    /// Borrow the mapped bytes, if memory mapped.
    pub fn mapped(&self) -> Option<&[u8]> {
        match &self.inner {
            StreamsInner::Mmap { map, .. } => Some(&map[..self.size as usize]),
            StreamsInner::File(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_missing_file() {
        let err = FrsStreams::open("/definitely/not/here.frs").err().unwrap();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_read_modes_agree() {
        let f = temp_file(b"0123456789");
        for mmap in [true, false] {
            let s = FrsStreams::open_opts(f.path(), mmap).unwrap();
            assert_eq!(s.size(), 10);
            assert_eq!(s.read_bytes(2, 3).unwrap(), b"234");

            let mut buf = [0u8; 4];
            assert_eq!(s.read_at(8, &mut buf).unwrap(), 2);
            assert_eq!(&buf[..2], b"89");
            assert_eq!(s.read_at(20, &mut buf).unwrap(), 0);
            assert!(s.read_into(8, &mut buf).is_err());
        }
    }

    #[test]
    fn test_refresh_sees_appended_bytes() {
        let mut f = temp_file(b"abc");
        let mut s = FrsStreams::open_opts(f.path(), true).unwrap();
        f.write_all(b"def").unwrap();
        f.flush().unwrap();
        assert_eq!(s.refresh().unwrap(), 6);
        assert_eq!(s.read_bytes(3, 3).unwrap(), b"def");
    }
}
