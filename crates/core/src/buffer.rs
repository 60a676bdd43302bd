//! Reference-counted byte buffers for keys and values
//!
//! A [`Buffer`] is a handle onto a contiguous byte span. Handles share their
//! storage through an `Arc`; cloning a handle (or calling [`Buffer::retain`])
//! adds an owner, and releasing or dropping one removes it. Storage is freed,
//! or its release callback invoked, exactly once when the last owner goes.
//!
//! # Release strategies
//!
//! | Constructor | Storage | On last release |
//! |-------------|---------|-----------------|
//! | [`Buffer::copy_from`] | owned `Vec<u8>` | memory freed |
//! | [`Buffer::direct`] | caller-owned value, no copy | callback receives the owner |
//! | [`Buffer::from_raw_parts`] | caller memory by pointer | callback receives the pointer |
//! | [`Buffer::retain`] / `Clone` | shared with the source | count decremented |
//!
//! # Append
//!
//! [`Buffer::append`] grows owned storage in place when the handle is the sole
//! owner. Otherwise it reallocates a private copy for this handle, so other
//! owners keep observing the bytes they were handed.

use std::fmt;
use std::slice;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Bytes owned outside the buffer, handed back through a callback.
trait ExternalBytes: Send + Sync {
    fn bytes(&self) -> &[u8];
}

struct External<T, F>
where
    T: AsRef<[u8]> + Send + Sync,
    F: FnOnce(T) + Send + Sync,
{
    owner: Option<T>,
    release: Option<F>,
}

impl<T, F> ExternalBytes for External<T, F>
where
    T: AsRef<[u8]> + Send + Sync,
    F: FnOnce(T) + Send + Sync,
{
    fn bytes(&self) -> &[u8] {
        match &self.owner {
            Some(owner) => owner.as_ref(),
            None => &[],
        }
    }
}

impl<T, F> Drop for External<T, F>
where
    T: AsRef<[u8]> + Send + Sync,
    F: FnOnce(T) + Send + Sync,
{
    fn drop(&mut self) {
        if let (Some(owner), Some(release)) = (self.owner.take(), self.release.take()) {
            release(owner);
        }
    }
}

/// Memory addressed by raw pointer, see [`Buffer::from_raw_parts`].
struct RawSpan {
    ptr: *const u8,
    len: usize,
}

// SAFETY: the caller of `Buffer::from_raw_parts` guarantees the span stays
// valid and unmutated until the release callback runs; we only read it.
unsafe impl Send for RawSpan {}
unsafe impl Sync for RawSpan {}

impl AsRef<[u8]> for RawSpan {
    fn as_ref(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: see `Buffer::from_raw_parts`.
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

enum Storage {
    Owned(Vec<u8>),
    External(Box<dyn ExternalBytes>),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(vec) => vec,
            Storage::External(ext) => ext.bytes(),
        }
    }
}

/// Reference-counted handle onto a byte span.
///
/// A released handle keeps existing as a value but every accessor returns
/// [`Error::UseAfterFree`]. Releasing twice is a no-op.
pub struct Buffer {
    inner: Option<Arc<Storage>>,
}

impl Buffer {
    /// Allocate owned storage and copy `bytes` into it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if memory cannot be reserved.
    pub fn copy_from(bytes: &[u8]) -> Result<Buffer> {
        let mut vec = Vec::new();
        vec.try_reserve_exact(bytes.len())
            .map_err(|_| Error::Allocation {
                requested: bytes.len(),
            })?;
        vec.extend_from_slice(bytes);
        Ok(Buffer::from_vec(vec))
    }

    /// Take ownership of `vec` without copying.
    pub fn from_vec(vec: Vec<u8>) -> Buffer {
        Buffer {
            inner: Some(Arc::new(Storage::Owned(vec))),
        }
    }

    /// Wrap caller-owned bytes without copying.
    ///
    /// `release` is invoked exactly once, with `owner`, when the last handle
    /// sharing this storage is released.
    pub fn direct<T, F>(owner: T, release: F) -> Buffer
    where
        T: AsRef<[u8]> + Send + Sync + 'static,
        F: FnOnce(T) + Send + Sync + 'static,
    {
        let external = External {
            owner: Some(owner),
            release: Some(release),
        };
        Buffer {
            inner: Some(Arc::new(Storage::External(Box::new(external)))),
        }
    }

    /// Wrap memory addressed by a raw pointer without copying.
    ///
    /// `release` receives `(ptr, len)` exactly once when the last handle is
    /// released.
    ///
    /// # Safety
    ///
    /// Unless `len` is zero, `ptr` must be valid for reads of `len` bytes, and
    /// the memory must not be mutated or freed until `release` has been called.
    pub unsafe fn from_raw_parts<F>(ptr: *const u8, len: usize, release: F) -> Buffer
    where
        F: FnOnce(*const u8, usize) + Send + Sync + 'static,
    {
        Buffer::direct(RawSpan { ptr, len }, move |span: RawSpan| {
            release(span.ptr, span.len)
        })
    }

    /// New logical owner of the same storage; the reference count grows by one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterFree`] if this handle was released.
    pub fn retain(&self) -> Result<Buffer> {
        let inner = self.inner.as_ref().ok_or(Error::UseAfterFree)?;
        Ok(Buffer {
            inner: Some(Arc::clone(inner)),
        })
    }

    /// Length in bytes.
    pub fn len(&self) -> Result<usize> {
        Ok(self.data()?.len())
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Borrow the bytes.
    pub fn data(&self) -> Result<&[u8]> {
        self.inner
            .as_deref()
            .map(Storage::bytes)
            .ok_or(Error::UseAfterFree)
    }

    /// Copy the bytes into a fresh `Vec`.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(self.data()?.to_vec())
    }

    /// Concatenate `other`'s bytes onto this buffer.
    ///
    /// Grows in place when this handle is the sole owner of owned storage;
    /// otherwise reallocates a private copy for this handle. Appending a
    /// buffer to a retained copy of itself is allowed.
    ///
    /// # Errors
    ///
    /// - [`Error::UseAfterFree`] if either handle was released
    /// - [`Error::Allocation`] if the combined length overflows or memory
    ///   cannot be reserved
    pub fn append(&mut self, other: &Buffer) -> Result<()> {
        let tail = other.data()?;
        let own_len = self.len()?;
        let total = own_len
            .checked_add(tail.len())
            .ok_or(Error::Allocation {
                requested: usize::MAX,
            })?;

        let arc = self.inner.as_mut().ok_or(Error::UseAfterFree)?;
        if let Some(Storage::Owned(vec)) = Arc::get_mut(arc) {
            vec.try_reserve(tail.len())
                .map_err(|_| Error::Allocation { requested: total })?;
            vec.extend_from_slice(tail);
            return Ok(());
        }

        let mut grown = Vec::new();
        grown
            .try_reserve_exact(total)
            .map_err(|_| Error::Allocation { requested: total })?;
        grown.extend_from_slice(arc.bytes());
        grown.extend_from_slice(tail);
        *arc = Arc::new(Storage::Owned(grown));
        Ok(())
    }

    /// Drop this handle's ownership. Idempotent.
    pub fn release(&mut self) {
        self.inner = None;
    }

    /// True once this handle has been released.
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Number of handles sharing this storage; zero once released.
    pub fn ref_count(&self) -> usize {
        self.inner.as_ref().map_or(0, Arc::strong_count)
    }

    /// True if both handles share the same storage.
    pub fn shares_storage_with(&self, other: &Buffer) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Clone for Buffer {
    /// Same as [`Buffer::retain`]; cloning a released handle yields a released handle.
    fn clone(&self) -> Self {
        Buffer {
            inner: self.inner.clone(),
        }
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        match (self.data(), other.data()) {
            (Ok(a), Ok(b)) => a == b,
            (Err(_), Err(_)) => true,
            _ => false,
        }
    }
}

impl Eq for Buffer {}

impl PartialEq<[u8]> for Buffer {
    fn eq(&self, other: &[u8]) -> bool {
        matches!(self.data(), Ok(bytes) if bytes == other)
    }
}

impl PartialEq<&[u8]> for Buffer {
    fn eq(&self, other: &&[u8]) -> bool {
        *self == **other
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data() {
            Ok(bytes) => f
                .debug_struct("Buffer")
                .field("len", &bytes.len())
                .field("refs", &self.ref_count())
                .field("bytes", &String::from_utf8_lossy(&bytes[..bytes.len().min(32)]))
                .finish(),
            Err(_) => f.write_str("Buffer(<released>)"),
        }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(vec: Vec<u8>) -> Self {
        Buffer::from_vec(vec)
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Buffer::from_vec(bytes.to_vec())
    }
}

impl From<&str> for Buffer {
    fn from(s: &str) -> Self {
        Buffer::from(s.as_bytes())
    }
}
