//! `mobdevctl`: drive an in-memory mobdev driver with line commands
//!
//! The driver is configured from `MOBDEV_DEVICES`, `MOBDEV_CAPACITY` and
//! `MOBDEV_GATE`; `MOBDEVCTL_READ_TIMEOUT_MS` bounds how long a read may block.

use std::time::Duration;

use cli::{parse, Outcome, Session};
use mobdev::{Driver, DriverConfig, MemHost};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match DriverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };
    let read_timeout = std::env::var("MOBDEVCTL_READ_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_READ_TIMEOUT_MS);

    let driver = match Driver::init(config, MemHost::new()) {
        Ok(driver) => driver,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let mut session = Session::new(driver, Duration::from_millis(read_timeout));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin: {e}");
                break;
            }
        };
        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };
        match session.execute(command).await {
            Ok(Outcome::Continue(output)) => println!("{}", output.trim_end()),
            Ok(Outcome::Quit) => break,
            Err(e) => eprintln!("error: {e}"),
        }
    }

    session.shutdown().await;
    info!("Program completed");
}
