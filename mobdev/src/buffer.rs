//! Fixed-capacity byte store with a high-water size
//!
//! The store owns `capacity` zero-filled bytes allocated up front. Only the
//! prefix `[0, size)` is ever readable; `size` is raised by writes that end
//! past it and never lowered.
//!
//! `BufferStore` does no locking of its own. `Device` keeps it behind an
//! `AccessLock`, which serializes every access.

use crate::error::DeviceError;

/// Per-device storage: fixed capacity plus the high-water mark of written bytes
pub struct BufferStore {
    data: Box<[u8]>,
    size: usize,
}

impl BufferStore {
    /// Allocate a zero-filled store of `capacity` bytes
    ///
    /// # Errors
    /// `AllocationFailed` if the memory cannot be reserved. `index` is only
    /// used to label the error.
    pub fn allocate(index: usize, capacity: usize) -> Result<Self, DeviceError> {
        let mut data = Vec::new();
        if data.try_reserve_exact(capacity).is_err() {
            log::warn!("failed to alloc {capacity} bytes for device {index}");
            return Err(DeviceError::AllocationFailed {
                index,
                bytes: capacity,
            });
        }
        data.resize(capacity, 0);
        Ok(Self {
            data: data.into_boxed_slice(),
            size: 0,
        })
    }

    /// Fixed capacity in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current high-water size
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Valid bytes starting at `offset`, at most `len` of them
    ///
    /// Returns an empty slice when `offset >= size`: there is nothing more
    /// to read, which is not an error.
    #[must_use]
    pub fn read_at(&self, offset: usize, len: usize) -> &[u8] {
        if offset >= self.size {
            return &[];
        }
        let count = len.min(self.size - offset);
        #[allow(clippy::indexing_slicing)]
        &self.data[offset..offset + count]
    }

    /// Copy `src` into the store at `offset`, raising `size` if needed
    ///
    /// Returns the number of bytes written, always `src.len()`.
    ///
    /// # Errors
    /// `CapacityExceeded` if `offset + src.len() > capacity`. Nothing is
    /// modified in that case.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<usize, DeviceError> {
        let end = check_capacity(offset, src.len(), self.capacity())?;
        #[allow(clippy::indexing_slicing)]
        self.data[offset..end].copy_from_slice(src);
        if end > self.size {
            self.size = end;
        }
        Ok(src.len())
    }
}

/// End offset of a `len`-byte write at `offset`, if it fits in `capacity`
///
/// # Errors
/// `CapacityExceeded` when the write would end past `capacity`.
pub fn check_capacity(offset: usize, len: usize, capacity: usize) -> Result<usize, DeviceError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(end),
        _ => Err(DeviceError::CapacityExceeded {
            offset,
            len,
            capacity,
        }),
    }
}

impl std::fmt::Debug for BufferStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferStore")
            .field("capacity", &self.capacity())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty_and_zeroed() {
        let store = BufferStore::allocate(0, 16).unwrap();
        assert_eq!(store.capacity(), 16);
        assert_eq!(store.size(), 0);
        assert!(store.read_at(0, 16).is_empty());
        assert!(store.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_and_read() {
        let mut store = BufferStore::allocate(0, 32).unwrap();
        assert_eq!(store.write_at(0, b"hello").unwrap(), 5);
        assert_eq!(store.write_at(5, b" world").unwrap(), 6);

        assert_eq!(store.size(), 11);
        assert_eq!(store.read_at(0, 64), b"hello world");
        assert_eq!(store.read_at(6, 3), b"wor");
    }

    #[test]
    fn test_read_past_size_is_empty() {
        let mut store = BufferStore::allocate(0, 32).unwrap();
        store.write_at(0, b"abc").unwrap();
        assert!(store.read_at(3, 10).is_empty());
        assert!(store.read_at(31, 10).is_empty());
        assert!(store.read_at(usize::MAX, 10).is_empty());
    }

    #[test]
    fn test_overwrite_inside_size_keeps_size() {
        let mut store = BufferStore::allocate(0, 32).unwrap();
        store.write_at(0, b"0123456789").unwrap();
        store.write_at(2, b"ab").unwrap();
        assert_eq!(store.size(), 10);
        assert_eq!(store.read_at(0, 10), b"01ab456789");
    }

    #[test]
    fn test_write_past_size_leaves_zero_hole() {
        let mut store = BufferStore::allocate(0, 32).unwrap();
        store.write_at(4, b"xy").unwrap();
        assert_eq!(store.size(), 6);
        assert_eq!(store.read_at(0, 6), b"\0\0\0\0xy");
    }

    #[test]
    fn test_write_exactly_to_capacity() {
        let mut store = BufferStore::allocate(0, 8).unwrap();
        assert_eq!(store.write_at(4, b"WXYZ").unwrap(), 4);
        assert_eq!(store.size(), 8);
    }

    #[test]
    fn test_write_beyond_capacity_fails_without_change() {
        let mut store = BufferStore::allocate(0, 8).unwrap();
        store.write_at(0, b"abcd").unwrap();

        let err = store.write_at(5, b"WXYZ").unwrap_err();
        assert_eq!(
            err,
            DeviceError::CapacityExceeded {
                offset: 5,
                len: 4,
                capacity: 8
            }
        );
        assert_eq!(store.size(), 4);
        assert_eq!(store.read_at(0, 8), b"abcd");
    }

    #[test]
    fn test_check_capacity_overflow() {
        assert!(check_capacity(usize::MAX, 2, 1024).is_err());
        assert_eq!(check_capacity(1000, 24, 1024).unwrap(), 1024);
    }
}
