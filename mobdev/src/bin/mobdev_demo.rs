//! Driver demo
//!
//! One reader per device blocks until the first line is written; each line
//! typed on stdin is appended to the next device in turn. An empty line ends
//! the input, prints the status report and unloads the driver.
//!
//! `MOBDEV_DEVICES`, `MOBDEV_CAPACITY` and `MOBDEV_GATE` configure the driver,
//! `RUST_LOG` the logging.

use mobdev::{DeviceError, Driver, DriverConfig, MemHost, OpenHandle, Whence};
use std::io::{self, BufRead};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = DriverConfig::from_env()?;
    let driver = Driver::init(config, MemHost::new())?;
    let count = driver.device_count();

    let mut reader_tasks = Vec::with_capacity(count);
    for index in 0..count {
        let mut handle = driver.open(index);
        reader_tasks.push(tokio::spawn(async move {
            read_once(&format!("r{index}"), &mut handle).await;
        }));
    }

    let mut writers: Vec<OpenHandle> = (0..count).map(|index| driver.open(index)).collect();

    println!("Enter text (empty line to quit):");
    let lines: Vec<String> = tokio::task::spawn_blocking(|| {
        io::stdin()
            .lock()
            .lines()
            .map_while(Result::ok)
            .take_while(|line| !line.trim().is_empty())
            .collect()
    })
    .await?;

    for (n, line) in lines.iter().enumerate() {
        let writer = &mut writers[n % count];
        match append(writer, line.as_bytes()).await {
            Ok(written) => println!("(w{}) wrote {written} bytes", writer.device_index()),
            Err(e) => eprintln!("(w{}) Error: {e} ({})", writer.device_index(), e.errno()),
        }
    }

    match driver.status_report() {
        Ok(report) => print!("{report}"),
        Err(e) => eprintln!("status: {e}"),
    }

    drop(writers);
    driver.exit().await;
    for task in reader_tasks {
        task.await?;
    }

    println!("All tasks completed");
    Ok(())
}

/// Write `data` at the current end of the device
async fn append(writer: &mut OpenHandle, data: &[u8]) -> Result<usize, DeviceError> {
    writer.seek(0, Whence::End).await?;
    writer.write(data).await
}

async fn read_once(name: &str, handle: &mut OpenHandle) {
    let mut buf = [0u8; 64];
    match handle.read(&mut buf).await {
        Ok(0) => println!("({name}) nothing to read"),
        Ok(n) => println!("({name}): {}", String::from_utf8_lossy(&buf[..n])),
        Err(e) => eprintln!("({name}) Error: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_to_full_device_reports_error() {
        let config = DriverConfig::default().with_capacity(4);
        let driver = Driver::init(config, MemHost::new()).unwrap();
        let mut writer = driver.open(0);

        assert_eq!(append(&mut writer, b"abcd").await, Ok(4));
        let err = append(&mut writer, b"e").await.unwrap_err();
        assert_eq!(err, DeviceError::OutOfRange { offset: 4 });

        // The driver is still usable and unloads normally
        assert_eq!(driver.status().unwrap()[0].size, 4);
        drop(writer);
        driver.exit().await;
    }
}
