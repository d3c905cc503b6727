//! Driver lifecycle
//!
//! `Driver::init` corresponds to loading the driver: devices are created and
//! registered, then the status entry is published. `Driver::exit` unloads it:
//! the status entry goes first, then every gate is forced open so no reader
//! stays blocked, then the devices are destroyed.

use tracing::{info, warn};

use crate::config::DriverConfig;
use crate::error::{DeviceError, InitError};
use crate::handle::OpenHandle;
use crate::host::DeviceHost;
use crate::interrupt::Interrupt;
use crate::registry::DeviceRegistry;
use crate::status::{self, DeviceStatus};

pub struct Driver<H: DeviceHost> {
    config: DriverConfig,
    host: H,
    registry: DeviceRegistry,
}

impl<H: DeviceHost> Driver<H> {
    /// Create and register all devices, then the status entry
    ///
    /// A status entry that cannot be created is only logged.
    ///
    /// # Errors
    /// `InitError::Config` for an invalid configuration; `InitError::Device`
    /// if a device could not be created, after everything created so far has
    /// been unwound.
    pub fn init(config: DriverConfig, host: H) -> Result<Self, InitError> {
        config.validate()?;
        let registry = DeviceRegistry::create_all(&config, &host)?;

        if let Err(e) = host.create_status_entry(&config.status_entry) {
            warn!("status entry '{}' not created: {e}", config.status_entry);
        }

        info!(
            "{} init done: {} device(s), gate scope {:?}",
            config.device_name, config.device_count, config.gate_scope
        );
        Ok(Self {
            config,
            host,
            registry,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn device_count(&self) -> usize {
        self.registry.len()
    }

    /// Open device `index` with a fresh interrupt
    ///
    /// # Panics
    /// If `index` is not below `device_count()`.
    #[must_use]
    pub fn open(&self, index: usize) -> OpenHandle {
        self.open_with_interrupt(index, Interrupt::new())
    }

    /// Open device `index`; raising `interrupt` aborts the handle's waits
    ///
    /// # Panics
    /// If `index` is not below `device_count()`.
    #[must_use]
    pub fn open_with_interrupt(&self, index: usize, interrupt: Interrupt) -> OpenHandle {
        OpenHandle::new(self.registry.get(index).clone(), interrupt)
    }

    /// Sizes of all devices, or `Busy` if any device is locked
    ///
    /// # Errors
    /// See `status::snapshot`.
    pub fn status(&self) -> Result<Vec<DeviceStatus>, DeviceError> {
        status::snapshot(&self.registry)
    }

    /// The status entry text
    ///
    /// # Errors
    /// See `status::snapshot`.
    pub fn status_report(&self) -> Result<String, DeviceError> {
        let statuses = self.status()?;
        Ok(status::render(
            &statuses,
            &self.config.status_label,
            &self.config.device_name,
        ))
    }

    /// Unload the driver and hand back the host
    pub async fn exit(self) -> H {
        info!("{} exit", self.config.device_name);
        self.host.remove_status_entry(&self.config.status_entry);

        for gate in self.registry.gates() {
            gate.force_release();
        }

        self.registry.destroy_all(&self.host).await;
        self.host
    }
}

impl<H: DeviceHost> std::fmt::Debug for Driver<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
