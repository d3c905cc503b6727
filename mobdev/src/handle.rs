//! Open handle: one caller session bound to one device
//!
//! The handle owns the file position. Device operations receive it and
//! return the new value; the handle stores it only when the operation
//! succeeds, so a failed seek or write leaves the position untouched.
//!
//! # Thread Safety
//!
//! Operations take `&mut self`: a handle is used by one task at a time, like
//! a file description without shared offsets. Any number of handles may be
//! open on the same device concurrently; they are serialized by the device's
//! access lock.

use std::fmt;
use std::sync::Arc;

use crate::device::{Device, Whence};
use crate::error::DeviceError;
use crate::interrupt::Interrupt;

pub struct OpenHandle {
    device: Arc<Device>,
    pos: usize,
    interrupt: Interrupt,
}

impl OpenHandle {
    pub(crate) fn new(device: Arc<Device>, interrupt: Interrupt) -> Self {
        log::trace!("{}: open", device.name());
        Self {
            device,
            pos: 0,
            interrupt,
        }
    }

    #[must_use]
    pub fn device_index(&self) -> usize {
        self.device.index()
    }

    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Current file position
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The interrupt that aborts this handle's waits
    #[must_use]
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Read up to `buf.len()` bytes at the current position
    ///
    /// Blocks until some write has opened the gate. Returns the number of
    /// bytes read, 0 once the position has reached the device size.
    ///
    /// # Errors
    /// `Interrupted` or `DeviceGone`; the position is unchanged.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let n = self.device.read(self.pos, buf, &self.interrupt).await?;
        self.pos += n;
        Ok(n)
    }

    /// Write `data` at the current position
    ///
    /// # Errors
    /// `CapacityExceeded`, `Interrupted` or `DeviceGone`; the position is
    /// unchanged.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, DeviceError> {
        let n = self.device.write(self.pos, data, &self.interrupt).await?;
        self.pos += n;
        Ok(n)
    }

    /// Move the position; returns the new position
    ///
    /// # Errors
    /// `OutOfRange` if the result is negative or not below the capacity;
    /// `Interrupted` or `DeviceGone` for `Whence::End`. The position is
    /// unchanged on error.
    pub async fn seek(&mut self, delta: i64, whence: Whence) -> Result<usize, DeviceError> {
        let pos = self
            .device
            .seek(self.pos, delta, whence, &self.interrupt)
            .await?;
        self.pos = pos;
        Ok(pos)
    }

    /// Close the handle
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        log::trace!("{}: release at pos {}", self.device.name(), self.pos);
    }
}

impl fmt::Debug for OpenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OpenHandle(device={}, pos={}, {:?})",
            self.device.name(),
            self.pos,
            self.interrupt
        )
    }
}
