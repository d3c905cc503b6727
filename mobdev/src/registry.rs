//! Device registry - the ordered set of devices created at init
//!
//! Devices are created together and destroyed together, in reverse order of
//! creation. A failure half-way through creation unwinds the devices created
//! so far before the error is returned.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{DriverConfig, GateScope};
use crate::device::Device;
use crate::error::DeviceError;
use crate::gate::WriteReadyGate;
use crate::host::DeviceHost;

pub struct DeviceRegistry {
    devices: Vec<Arc<Device>>,
}

impl DeviceRegistry {
    /// Allocate and register `config.device_count` devices, in order
    ///
    /// # Errors
    /// `AllocationFailed` or `RegistrationFailed` from the first device that
    /// could not be set up. Every device created before it has been
    /// unregistered and freed, in reverse order, by the time this returns.
    pub fn create_all<H>(config: &DriverConfig, host: &H) -> Result<Self, DeviceError>
    where
        H: DeviceHost + ?Sized,
    {
        let shared_gate = WriteReadyGate::new(&config.device_name);
        let mut partial = PartialRegistry {
            host,
            devices: Vec::with_capacity(config.device_count),
        };

        for index in 0..config.device_count {
            let name = config.node_name(index);
            let gate = match config.gate_scope {
                GateScope::Shared => shared_gate.clone(),
                GateScope::PerDevice => WriteReadyGate::new(&name),
            };

            let device = Device::new(index, name, config.capacity, gate).inspect_err(|e| {
                warn!("error adding device {index}: {e}");
            })?;

            if let Err(reason) = host.register_device(index, device.name()) {
                warn!("error registering device {index}: {reason}");
                device.teardown_unshared();
                return Err(DeviceError::RegistrationFailed { index, reason });
            }
            debug!("registered {}", device.name());
            partial.devices.push(Arc::new(device));
        }

        info!(
            "created {} device(s) of {} bytes",
            partial.devices.len(),
            config.capacity
        );
        Ok(partial.commit())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device at `index`
    ///
    /// # Panics
    /// The index space is fixed at creation; an index outside it is a caller
    /// bug.
    #[must_use]
    pub fn get(&self, index: usize) -> &Arc<Device> {
        self.devices.get(index).unwrap_or_else(|| {
            panic!(
                "device index {index} out of range (registry has {})",
                self.devices.len()
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    /// Distinct write-ready gates used by the devices
    #[must_use]
    pub fn gates(&self) -> Vec<WriteReadyGate> {
        let mut gates: Vec<WriteReadyGate> = Vec::new();
        for device in &self.devices {
            if !gates.iter().any(|g| g.same_latch(device.gate())) {
                gates.push(device.gate().clone());
            }
        }
        gates
    }

    /// Tear down every device in reverse creation order
    ///
    /// Each device is unregistered, then its lock is acquired once so that
    /// any operation in progress finishes before the buffer is freed. Gates
    /// must have been released first, or a reader blocked on one would keep
    /// waiting.
    pub async fn destroy_all<H>(self, host: &H)
    where
        H: DeviceHost + ?Sized,
    {
        for device in self.devices.iter().rev() {
            host.unregister_device(device.index(), device.name());
            device.teardown().await;
            debug!("destroyed {}", device.name());
        }
        info!("destroyed {} device(s)", self.devices.len());
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.devices.iter()).finish()
    }
}

/// Devices created so far during `create_all`
///
/// Dropping it without `commit` unwinds: devices are unregistered and freed
/// in reverse order.
struct PartialRegistry<'a, H: DeviceHost + ?Sized> {
    host: &'a H,
    devices: Vec<Arc<Device>>,
}

impl<H: DeviceHost + ?Sized> PartialRegistry<'_, H> {
    fn commit(mut self) -> DeviceRegistry {
        DeviceRegistry {
            devices: std::mem::take(&mut self.devices),
        }
    }
}

impl<H: DeviceHost + ?Sized> Drop for PartialRegistry<'_, H> {
    fn drop(&mut self) {
        if self.devices.is_empty() {
            return;
        }
        warn!("unwinding {} device(s)", self.devices.len());
        while let Some(device) = self.devices.pop() {
            self.host.unregister_device(device.index(), device.name());
            // Nothing outside this function has seen the device yet
            device.teardown_unshared();
        }
    }
}
