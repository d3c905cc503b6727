//! Interactive session: descriptors opened on a driver, one command at a time

use std::collections::BTreeMap;
use std::time::Duration;

use mobdev::{DeviceError, DeviceHost, Driver, OpenHandle};
use tracing::debug;

use crate::command::{Command, HELP};

/// What the caller should do after a command
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

pub struct Session<H: DeviceHost> {
    driver: Driver<H>,
    handles: BTreeMap<usize, OpenHandle>,
    next_fd: usize,
    read_timeout: Duration,
}

impl<H: DeviceHost> Session<H> {
    #[must_use]
    pub fn new(driver: Driver<H>, read_timeout: Duration) -> Self {
        Self {
            driver,
            handles: BTreeMap::new(),
            next_fd: 3,
            read_timeout,
        }
    }

    /// Run one command
    ///
    /// # Errors
    /// A message for the user; the session stays usable.
    pub async fn execute(&mut self, command: Command) -> Result<Outcome, String> {
        let output = match command {
            Command::Open { device } => {
                if device >= self.driver.device_count() {
                    return Err(format!(
                        "no device {device} (have {})",
                        self.driver.device_count()
                    ));
                }
                let fd = self.next_fd;
                self.next_fd += 1;
                self.handles.insert(fd, self.driver.open(device));
                format!("fd {fd} -> {}", self.driver.config().node_name(device))
            }
            Command::Close { fd } => {
                self.handles
                    .remove(&fd)
                    .ok_or_else(|| bad_fd(fd))?
                    .release();
                format!("closed {fd}")
            }
            Command::Read { fd, len } => {
                let timeout = self.read_timeout;
                let handle = self.handle(fd)?;
                // A device never returns more than its capacity
                let mut buf = vec![0u8; len.min(handle.device().capacity())];
                let n = read_with_timeout(handle, &mut buf, timeout)
                    .await
                    .map_err(describe)?;
                format!("{n} bytes: {:?}", String::from_utf8_lossy(&buf[..n]))
            }
            Command::Write { fd, data } => {
                let handle = self.handle(fd)?;
                let n = handle.write(&data).await.map_err(describe)?;
                format!("wrote {n} bytes, pos {}", handle.position())
            }
            Command::Seek { fd, whence, delta } => {
                let handle = self.handle(fd)?;
                let pos = handle.seek(delta, whence).await.map_err(describe)?;
                format!("pos {pos}")
            }
            Command::Status => self.driver.status_report().map_err(describe)?,
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Continue(output))
    }

    /// Close every descriptor and unload the driver
    pub async fn shutdown(self) -> H {
        debug!("closing {} descriptor(s)", self.handles.len());
        drop(self.handles);
        self.driver.exit().await
    }

    fn handle(&mut self, fd: usize) -> Result<&mut OpenHandle, String> {
        self.handles.get_mut(&fd).ok_or_else(|| bad_fd(fd))
    }
}

/// Read, interrupting the handle if the read is still blocked after `timeout`
async fn read_with_timeout(
    handle: &mut OpenHandle,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<usize, DeviceError> {
    let interrupt = handle.interrupt().clone();
    let timer = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            interrupt.raise();
        })
    };

    let result = handle.read(buf).await;
    timer.abort();
    // The timer may be raising right now; clear only once it has stopped
    let _ = timer.await;
    interrupt.clear();
    result
}

fn bad_fd(fd: usize) -> String {
    format!("bad descriptor {fd}")
}

fn describe(e: DeviceError) -> String {
    let hint = match &e {
        DeviceError::Interrupted => " (no write yet? try again)",
        DeviceError::Busy { .. } => " (try again)",
        _ => "",
    };
    format!("{e} [{}]{hint}", e.errno())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobdev::{DriverConfig, MemHost};

    fn session() -> Session<MemHost> {
        let config = DriverConfig::default().with_device_count(2).with_capacity(32);
        let driver = Driver::init(config, MemHost::new()).unwrap();
        Session::new(driver, Duration::from_millis(50))
    }

    async fn run(session: &mut Session<MemHost>, line: &str) -> Result<String, String> {
        let command = crate::command::parse(line)?.expect("non-empty line");
        match session.execute(command).await? {
            Outcome::Continue(output) => Ok(output),
            Outcome::Quit => Ok("quit".to_string()),
        }
    }

    #[tokio::test]
    async fn test_write_seek_read() {
        let mut s = session();
        assert_eq!(run(&mut s, "open 1").await.unwrap(), "fd 3 -> mobdev_1");
        assert_eq!(
            run(&mut s, "write 3 hello").await.unwrap(),
            "wrote 5 bytes, pos 5"
        );
        assert_eq!(run(&mut s, "seek 3 set 1").await.unwrap(), "pos 1");
        assert_eq!(
            run(&mut s, "read 3 10").await.unwrap(),
            "4 bytes: \"ello\""
        );
        assert_eq!(
            run(&mut s, "status").await.unwrap(),
            "Mobdev_0, size = 0\nMobdev_1, size = 5\nFinished mobdev status report\n"
        );
        s.shutdown().await;
    }

    #[tokio::test]
    async fn test_blocked_read_times_out_and_can_retry() {
        let mut s = session();
        run(&mut s, "open 0").await.unwrap();

        let err = run(&mut s, "read 3 4").await.unwrap_err();
        assert!(err.contains("interrupted"), "{err}");

        run(&mut s, "open 0").await.unwrap();
        run(&mut s, "write 4 abc").await.unwrap();
        assert_eq!(run(&mut s, "read 3 4").await.unwrap(), "3 bytes: \"abc\"");
    }

    #[tokio::test]
    async fn test_read_len_is_capped_at_capacity() {
        let mut s = session();
        run(&mut s, "open 0").await.unwrap();
        run(&mut s, "write 3 abc").await.unwrap();
        run(&mut s, "seek 3 set 0").await.unwrap();
        assert_eq!(
            run(&mut s, &format!("read 3 {}", usize::MAX)).await.unwrap(),
            "3 bytes: \"abc\""
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_read_leaves_interrupt_cleared() {
        let mut s = session();
        run(&mut s, "open 1").await.unwrap();
        for _ in 0..3 {
            assert!(run(&mut s, "read 3 4").await.is_err());
            assert!(!s.handles[&3].interrupt().is_raised());
        }
    }

    #[tokio::test]
    async fn test_errors_keep_session_usable() {
        let mut s = session();
        assert!(run(&mut s, "open 9").await.is_err());
        assert!(run(&mut s, "read 7 1").await.is_err());
        run(&mut s, "open 0").await.unwrap();
        let err = run(&mut s, "seek 3 set 32").await.unwrap_err();
        assert!(err.contains("[-27]"), "{err}");
        assert_eq!(run(&mut s, "close 3").await.unwrap(), "closed 3");
        assert!(run(&mut s, "close 3").await.is_err());
        assert_eq!(run(&mut s, "quit").await.unwrap(), "quit");
    }
}
