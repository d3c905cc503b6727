//! Driver configuration

use crate::error::ConfigError;

/// Default buffer capacity of every device, in bytes
pub const DATA_MAX_SIZE: usize = 1024;

/// How the write-ready gate is shared between devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateScope {
    /// One gate for all devices: a write to any device unblocks reads on all
    #[default]
    Shared,
    /// One gate per device
    PerDevice,
}

impl std::str::FromStr for GateScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "per-device" | "per_device" => Ok(Self::PerDevice),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub device_count: usize,
    /// Capacity of each device buffer
    pub capacity: usize,
    /// Node base name; device `i` is `{device_name}_{i}`
    pub device_name: String,
    /// Name of the status entry
    pub status_entry: String,
    /// Prefix of each status line
    pub status_label: String,
    pub gate_scope: GateScope,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            device_count: 1,
            capacity: DATA_MAX_SIZE,
            device_name: "mobdev".to_string(),
            status_entry: "mobdev_simple".to_string(),
            status_label: "Mobdev".to_string(),
            gate_scope: GateScope::Shared,
        }
    }
}

impl DriverConfig {
    #[must_use]
    pub fn with_device_count(mut self, device_count: usize) -> Self {
        self.device_count = device_count;
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_gate_scope(mut self, gate_scope: GateScope) -> Self {
        self.gate_scope = gate_scope;
        self
    }

    /// Defaults overridden by `MOBDEV_DEVICES`, `MOBDEV_CAPACITY` and
    /// `MOBDEV_GATE` (`shared` or `per-device`)
    ///
    /// # Errors
    /// `InvalidValue` for an unparsable variable, or any `validate` error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like `from_env`, reading variables through `lookup`
    ///
    /// # Errors
    /// See `from_env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup("MOBDEV_DEVICES") {
            config.device_count = parse_var("MOBDEV_DEVICES", &value)?;
        }
        if let Some(value) = lookup("MOBDEV_CAPACITY") {
            config.capacity = parse_var("MOBDEV_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("MOBDEV_GATE") {
            config.gate_scope = parse_var("MOBDEV_GATE", &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// `NoDevices` or `ZeroCapacity`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_count == 0 {
            return Err(ConfigError::NoDevices);
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    /// Node name of device `index`
    #[must_use]
    pub fn node_name(&self, index: usize) -> String {
        format!("{}_{index}", self.device_name)
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}
