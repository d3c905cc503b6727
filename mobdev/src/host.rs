//! Registration with the host system
//!
//! The driver core does not know how device nodes or the status entry are
//! made visible; it asks a `DeviceHost`. `MemHost` keeps everything in memory
//! and can be told to fail, which is what tests and the command-line tool use.

use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::error::{errno, HostError};

/// Host-side registration plumbing
///
/// Calls happen only from driver init and exit, never concurrently with
/// device operations.
pub trait DeviceHost: Send + Sync {
    /// Make device `index` visible under `name`
    ///
    /// # Errors
    /// Any failure aborts driver init and unwinds the devices created so far.
    fn register_device(&self, index: usize, name: &str) -> Result<(), HostError>;

    /// Remove a device registered by `register_device`
    fn unregister_device(&self, index: usize, name: &str);

    /// Publish the read-only status entry
    ///
    /// # Errors
    /// A failure is logged by the driver and otherwise ignored.
    fn create_status_entry(&self, name: &str) -> Result<(), HostError>;

    /// Remove the status entry; must be harmless if it was never created
    fn remove_status_entry(&self, name: &str);
}

#[derive(Default)]
struct MemHostState {
    nodes: BTreeMap<usize, String>,
    status_entries: Vec<String>,
    /// Every register/unregister call in order, for inspection
    journal: Vec<HostEvent>,
    fail_register_at: Option<usize>,
    fail_status_entry: bool,
}

/// A call observed by `MemHost`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Registered(usize),
    Unregistered(usize),
}

/// In-memory `DeviceHost`
#[derive(Default)]
pub struct MemHost {
    state: Mutex<MemHostState>,
}

impl MemHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `register_device` fail for `index`
    #[must_use]
    pub fn failing_at(index: usize) -> Self {
        let host = Self::new();
        host.state.lock().fail_register_at = Some(index);
        host
    }

    /// Make `create_status_entry` fail
    #[must_use]
    pub fn without_status_entry() -> Self {
        let host = Self::new();
        host.state.lock().fail_status_entry = true;
        host
    }

    /// Names of registered nodes, by index
    #[must_use]
    pub fn nodes(&self) -> Vec<(usize, String)> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .map(|(index, name)| (*index, name.clone()))
            .collect()
    }

    #[must_use]
    pub fn has_status_entry(&self, name: &str) -> bool {
        self.state.lock().status_entries.iter().any(|e| e == name)
    }

    #[must_use]
    pub fn journal(&self) -> Vec<HostEvent> {
        self.state.lock().journal.clone()
    }
}

impl DeviceHost for MemHost {
    fn register_device(&self, index: usize, name: &str) -> Result<(), HostError> {
        let mut state = self.state.lock();
        if state.fail_register_at == Some(index) {
            return Err(HostError::new(errno::ENODEV, format!("cannot create {name}")));
        }
        if state.nodes.contains_key(&index) {
            return Err(HostError::new(errno::EBUSY, format!("{name} already exists")));
        }
        state.nodes.insert(index, name.to_string());
        state.journal.push(HostEvent::Registered(index));
        Ok(())
    }

    fn unregister_device(&self, index: usize, name: &str) {
        let mut state = self.state.lock();
        if state.nodes.remove(&index).is_none() {
            log::warn!("host: unregister of unknown device {index} ({name})");
        }
        state.journal.push(HostEvent::Unregistered(index));
    }

    fn create_status_entry(&self, name: &str) -> Result<(), HostError> {
        let mut state = self.state.lock();
        if state.fail_status_entry {
            return Err(HostError::new(errno::ENOMEM, format!("cannot create {name}")));
        }
        state.status_entries.push(name.to_string());
        Ok(())
    }

    fn remove_status_entry(&self, name: &str) {
        self.state.lock().status_entries.retain(|e| e != name);
    }
}

impl<H: DeviceHost + ?Sized> DeviceHost for std::sync::Arc<H> {
    fn register_device(&self, index: usize, name: &str) -> Result<(), HostError> {
        (**self).register_device(index, name)
    }

    fn unregister_device(&self, index: usize, name: &str) {
        (**self).unregister_device(index, name);
    }

    fn create_status_entry(&self, name: &str) -> Result<(), HostError> {
        (**self).create_status_entry(name)
    }

    fn remove_status_entry(&self, name: &str) {
        (**self).remove_status_entry(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let host = MemHost::new();
        host.register_device(0, "mobdev_0").unwrap();
        host.register_device(1, "mobdev_1").unwrap();
        assert_eq!(
            host.nodes(),
            vec![(0, "mobdev_0".to_string()), (1, "mobdev_1".to_string())]
        );

        host.unregister_device(0, "mobdev_0");
        assert_eq!(host.nodes(), vec![(1, "mobdev_1".to_string())]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let host = MemHost::new();
        host.register_device(0, "mobdev_0").unwrap();
        let err = host.register_device(0, "mobdev_0").unwrap_err();
        assert_eq!(err.errno, errno::EBUSY);
    }

    #[test]
    fn test_injected_failure() {
        let host = MemHost::failing_at(1);
        host.register_device(0, "mobdev_0").unwrap();
        assert!(host.register_device(1, "mobdev_1").is_err());
    }

    #[test]
    fn test_status_entry() {
        let host = MemHost::new();
        host.create_status_entry("mobdev_simple").unwrap();
        assert!(host.has_status_entry("mobdev_simple"));
        host.remove_status_entry("mobdev_simple");
        host.remove_status_entry("mobdev_simple");
        assert!(!host.has_status_entry("mobdev_simple"));

        let failing = MemHost::without_status_entry();
        assert!(failing.create_status_entry("mobdev_simple").is_err());
    }
}
