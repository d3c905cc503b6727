pub mod access_lock;
pub mod buffer;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod gate;
pub mod handle;
pub mod host;
pub mod interrupt;
pub mod registry;
pub mod status;

// Re-export the driver surface for convenience
pub use driver::Driver;
pub use handle::OpenHandle;
pub use device::{Device, Whence};

// Re-export configuration
pub use config::{DriverConfig, GateScope, DATA_MAX_SIZE};

// Re-export error types
pub use error::{ConfigError, DeviceError, HostError, InitError};

// Re-export synchronization primitives
pub use gate::{LatchState, WriteReadyGate};
pub use interrupt::Interrupt;

// Re-export host types
pub use host::{DeviceHost, HostEvent, MemHost};

pub use registry::DeviceRegistry;
pub use status::DeviceStatus;
