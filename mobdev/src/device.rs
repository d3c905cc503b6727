//! One logical device: a buffer store behind an access lock
//!
//! Operations take the caller's offset and return the new one; the offset
//! itself belongs to the open handle, not to the device.
//!
//! # Thread Safety
//!
//! `Device` is shared between handles through `Arc`. Every access to the
//! buffer or its size goes through the device's `AccessLock`, so two
//! operations on the same device never observe or change them concurrently.
//! Operations on different devices are independent.
//!
//! Reads additionally wait on the write-ready gate before taking the lock.
//! Writes and seeks never wait on the gate.

use crate::access_lock::AccessLock;
use crate::buffer::{check_capacity, BufferStore};
use crate::error::DeviceError;
use crate::gate::WriteReadyGate;
use crate::interrupt::Interrupt;

/// Reference point of a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// `delta` is the new offset
    Set,
    /// Relative to the caller's current offset
    Cur,
    /// Relative to the device's current size
    End,
}

pub struct Device {
    index: usize,
    name: String,
    capacity: usize,
    /// `None` once the device has been torn down
    store: AccessLock<Option<BufferStore>>,
    gate: WriteReadyGate,
}

impl Device {
    /// Allocate the device buffer
    ///
    /// # Errors
    /// `AllocationFailed` if the buffer cannot be allocated.
    pub fn new(
        index: usize,
        name: String,
        capacity: usize,
        gate: WriteReadyGate,
    ) -> Result<Self, DeviceError> {
        let store = BufferStore::allocate(index, capacity)?;
        Ok(Self {
            index,
            name,
            capacity,
            store: AccessLock::new(Some(store)),
            gate,
        })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Node name, e.g. `mobdev_0`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn gate(&self) -> &WriteReadyGate {
        &self.gate
    }

    /// Read into `buf` from `offset`
    ///
    /// Waits for the write-ready gate, then for the access lock. Returns the
    /// number of bytes copied; 0 when `offset` is at or past the size.
    ///
    /// # Errors
    /// - `Interrupted` if either wait is interrupted
    /// - `DeviceGone` if the device was torn down
    pub async fn read(
        &self,
        offset: usize,
        buf: &mut [u8],
        interrupt: &Interrupt,
    ) -> Result<usize, DeviceError> {
        self.gate.wait(interrupt).await?;

        let slot = self.store.lock_interruptible(interrupt).await?;
        let store = slot.as_ref().ok_or(DeviceError::DeviceGone { index: self.index })?;

        let data = store.read_at(offset, buf.len());
        #[allow(clippy::indexing_slicing)]
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    /// Write `data` at `offset`
    ///
    /// Opens the write-ready gate once the data is in place.
    ///
    /// # Errors
    /// - `CapacityExceeded` if `offset + data.len()` is past the capacity
    /// - `Interrupted` if the lock wait is interrupted
    /// - `DeviceGone` if the device was torn down
    pub async fn write(
        &self,
        offset: usize,
        data: &[u8],
        interrupt: &Interrupt,
    ) -> Result<usize, DeviceError> {
        if let Err(e) = check_capacity(offset, data.len(), self.capacity) {
            log::warn!("{}: failed, wrong buffer size: {e}", self.name);
            return Err(e);
        }

        let written = {
            let mut slot = self.store.lock_interruptible(interrupt).await?;
            let store = slot
                .as_mut()
                .ok_or(DeviceError::DeviceGone { index: self.index })?;
            store.write_at(offset, data)?
        };

        self.gate.signal();
        Ok(written)
    }

    /// Compute a new offset for the caller
    ///
    /// Only `Whence::End` takes the lock, and only to read the size.
    ///
    /// # Errors
    /// - `OutOfRange` if the result is negative or not below the capacity
    /// - `Interrupted` / `DeviceGone` for `Whence::End`
    pub async fn seek(
        &self,
        current: usize,
        delta: i64,
        whence: Whence,
        interrupt: &Interrupt,
    ) -> Result<usize, DeviceError> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => current,
            Whence::End => self.size(interrupt).await?,
        };
        let base = i64::try_from(base).unwrap_or(i64::MAX);
        let target = base.checked_add(delta).ok_or(DeviceError::OutOfRange {
            offset: if delta < 0 { i64::MIN } else { i64::MAX },
        })?;

        match usize::try_from(target) {
            Ok(offset) if offset < self.capacity => Ok(offset),
            _ => Err(DeviceError::OutOfRange { offset: target }),
        }
    }

    /// Current size, waiting for the lock
    ///
    /// # Errors
    /// `Interrupted` or `DeviceGone`.
    pub async fn size(&self, interrupt: &Interrupt) -> Result<usize, DeviceError> {
        let slot = self.store.lock_interruptible(interrupt).await?;
        slot.as_ref()
            .map(BufferStore::size)
            .ok_or(DeviceError::DeviceGone { index: self.index })
    }

    /// Current size, only if the lock is free right now
    ///
    /// # Errors
    /// `Busy` if the lock is held, `DeviceGone` after teardown.
    pub fn try_size(&self) -> Result<usize, DeviceError> {
        let slot = self
            .store
            .try_lock()
            .ok_or(DeviceError::Busy { index: self.index })?;
        slot.as_ref()
            .map(BufferStore::size)
            .ok_or(DeviceError::DeviceGone { index: self.index })
    }

    /// Wait out any current holder of the lock, then free the buffer
    ///
    /// Handles that still reference the device get `DeviceGone` afterwards.
    pub(crate) async fn teardown(&self) {
        let mut slot = self.store.lock().await;
        if slot.take().is_none() {
            log::warn!("{}: teardown of an already torn down device", self.name);
        }
    }

    /// Free the buffer of a device nobody else can reach yet
    pub(crate) fn teardown_unshared(&self) {
        if let Some(mut slot) = self.store.try_lock() {
            slot.take();
        }
    }

    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> Option<tokio::sync::MutexGuard<'_, Option<BufferStore>>> {
        self.store.try_lock()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Device(index={}, name={}, capacity={}, lock={:?})",
            self.index, self.name, self.capacity, self.store
        )
    }
}
