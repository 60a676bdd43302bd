//! Positional reads of committed values.
//!
//! Values are never copied into the index; readers fetch them from the log
//! on demand. `ValueReader` owns its own read-only handle to the log file so
//! reads never move the writer's cursor and never share its lock. Reads are
//! positional, so one reader can be shared across threads.

use logdb_core::RecordLocation;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Read-only handle for fetching values by location.
#[derive(Debug)]
pub struct ValueReader {
    file: File,
    path: PathBuf,
}

impl ValueReader {
    /// Open a read-only handle on the log at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(ValueReader {
            file: File::open(path)?,
            path: path.to_path_buf(),
        })
    }

    /// Read the value stored at `location`.
    pub fn read(&self, location: RecordLocation) -> io::Result<Vec<u8>> {
        let len = location.len as usize;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("cannot reserve {} bytes for value", len),
            )
        })?;
        buf.resize(len, 0);
        read_exact_at(&self.file, &mut buf, location.offset)?;
        Ok(buf)
    }

    /// Path of the log this reader was opened on
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
