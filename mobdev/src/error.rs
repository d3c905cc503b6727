//! Error types for device operations and configuration

use std::fmt;

/// Errno values reported through `errno()`
pub mod errno {
    pub const EFAULT: i32 = 14;
    pub const EBUSY: i32 = 16;
    pub const ENOMEM: i32 = 12;
    pub const EINVAL: i32 = 22;
    pub const EFBIG: i32 = 27;
    pub const ENODEV: i32 = 19;
    /// Kernel-internal "restart the syscall" code returned on signals
    pub const ERESTARTSYS: i32 = 512;
}

/// Errors returned by device, registry and status operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A write would end past the fixed buffer capacity
    CapacityExceeded {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    /// A seek would land before 0 or at/after the capacity
    OutOfRange { offset: i64 },
    /// A blocking wait was abandoned because the caller was interrupted
    Interrupted,
    /// The status snapshot found a device lock held
    Busy { index: usize },
    /// The buffer of a device could not be allocated
    AllocationFailed { index: usize, bytes: usize },
    /// The host refused to register a device
    RegistrationFailed { index: usize, reason: HostError },
    /// The device was torn down while a handle still referenced it
    DeviceGone { index: usize },
}

impl DeviceError {
    /// Negative-errno style code, as the driver would return it to user space
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::CapacityExceeded { .. } => -errno::EFBIG,
            Self::OutOfRange { offset } if *offset < 0 => -errno::EINVAL,
            Self::OutOfRange { .. } => -errno::EFBIG,
            Self::Interrupted => -errno::ERESTARTSYS,
            Self::Busy { .. } => -errno::EBUSY,
            Self::AllocationFailed { .. } => -errno::ENOMEM,
            Self::RegistrationFailed { reason, .. } => -reason.errno,
            Self::DeviceGone { .. } => -errno::EFAULT,
        }
    }

    /// Whether the caller may simply try the operation again later
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Interrupted | Self::Busy { .. })
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "write of {len} bytes at offset {offset} exceeds capacity {capacity}"
            ),
            Self::OutOfRange { offset } => write!(f, "offset {offset} is out of range"),
            Self::Interrupted => write!(f, "wait interrupted"),
            Self::Busy { index } => write!(f, "device {index} is busy"),
            Self::AllocationFailed { index, bytes } => {
                write!(f, "failed to allocate {bytes} bytes for device {index}")
            }
            Self::RegistrationFailed { index, reason } => {
                write!(f, "failed to register device {index}: {reason}")
            }
            Self::DeviceGone { index } => write!(f, "device {index} has been torn down"),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RegistrationFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Failure reported by a `DeviceHost`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    /// Positive errno describing the failure
    pub errno: i32,
    pub message: String,
}

impl HostError {
    #[must_use]
    pub fn new(errno: i32, message: impl Into<String>) -> Self {
        Self {
            errno,
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.message, self.errno)
    }
}

impl std::error::Error for HostError {}

/// Errors in driver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// At least one device is required
    NoDevices,
    /// Buffers must hold at least one byte
    ZeroCapacity,
    /// An environment variable held a value that could not be parsed
    InvalidValue { var: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevices => write!(f, "device count must be at least 1"),
            Self::ZeroCapacity => write!(f, "buffer capacity must be at least 1 byte"),
            Self::InvalidValue { var, value } => write!(f, "invalid value for {var}: '{value}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors from `Driver::init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    Config(ConfigError),
    Device(DeviceError),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::Device(e) => write!(f, "device setup failed: {e}"),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Device(e) => Some(e),
        }
    }
}

impl From<ConfigError> for InitError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<DeviceError> for InitError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}
