//! Status reporter
//!
//! Produces the read-only status text. The scan never waits: it tries each
//! device lock in turn and abandons the whole report with `Busy` as soon as
//! one is held, so callers get either a full snapshot or nothing.

use std::fmt::Write as _;

use crate::error::DeviceError;
use crate::registry::DeviceRegistry;

/// Size of one device at snapshot time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub index: usize,
    pub size: usize,
}

/// Sizes of all devices, in index order
///
/// # Errors
/// `Busy` naming the first device whose lock was held; `DeviceGone` if the
/// registry is being torn down.
pub fn snapshot(registry: &DeviceRegistry) -> Result<Vec<DeviceStatus>, DeviceError> {
    registry
        .iter()
        .map(|device| {
            let size = device.try_size().inspect_err(|e| {
                if matches!(e, DeviceError::Busy { .. }) {
                    log::info!("failed status read, {} busy", device.name());
                }
            })?;
            Ok(DeviceStatus {
                index: device.index(),
                size,
            })
        })
        .collect()
}

/// Render a snapshot as status text
///
/// One `"{label}_{index}, size = {size}"` line per device, then a trailer
/// naming `device_name`.
#[must_use]
pub fn render(statuses: &[DeviceStatus], label: &str, device_name: &str) -> String {
    let mut out = String::new();
    for status in statuses {
        let _ = writeln!(out, "{label}_{}, size = {}", status.index, status.size);
    }
    let _ = writeln!(out, "Finished {device_name} status report");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::host::MemHost;
    use crate::interrupt::Interrupt;

    #[tokio::test]
    async fn test_snapshot_in_index_order() {
        let host = MemHost::new();
        let config = DriverConfig::default().with_device_count(3);
        let registry = DeviceRegistry::create_all(&config, &host).unwrap();
        let intr = Interrupt::new();
        registry.get(2).write(0, b"abcd", &intr).await.unwrap();
        registry.get(0).write(5, b"x", &intr).await.unwrap();

        assert_eq!(
            snapshot(&registry).unwrap(),
            vec![
                DeviceStatus { index: 0, size: 6 },
                DeviceStatus { index: 1, size: 0 },
                DeviceStatus { index: 2, size: 4 },
            ]
        );
    }

    #[tokio::test]
    async fn test_snapshot_busy_when_any_device_locked() {
        let host = MemHost::new();
        let config = DriverConfig::default().with_device_count(3);
        let registry = DeviceRegistry::create_all(&config, &host).unwrap();

        let held = registry.get(1).hold_lock().unwrap();
        assert_eq!(snapshot(&registry), Err(DeviceError::Busy { index: 1 }));
        drop(held);

        assert_eq!(snapshot(&registry).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_reports_first_busy_device() {
        let host = MemHost::new();
        let config = DriverConfig::default().with_device_count(3);
        let registry = DeviceRegistry::create_all(&config, &host).unwrap();

        let _held2 = registry.get(2).hold_lock().unwrap();
        let _held0 = registry.get(0).hold_lock().unwrap();
        assert_eq!(snapshot(&registry), Err(DeviceError::Busy { index: 0 }));
    }

    #[test]
    fn test_render() {
        let statuses = [
            DeviceStatus { index: 0, size: 10 },
            DeviceStatus { index: 1, size: 0 },
        ];
        assert_eq!(
            render(&statuses, "Mobdev", "mobdev"),
            "Mobdev_0, size = 10\nMobdev_1, size = 0\nFinished mobdev status report\n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[], "X", "x"), "Finished x status report\n");
    }
}
