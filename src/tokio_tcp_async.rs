//! Provides an asynchronous client for Heatmiser thermostats built on Tokio.
//!
//! This module is suitable for applications built on the Tokio runtime.
//!
//! # Example
//!
//! ```no_run
//! use heatmiser_lib::tokio_tcp_async::Thermostat;
//! use heatmiser_lib::protocol::RunMode;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), heatmiser_lib::Error> {
//!     let mut thermostat = Thermostat::new("192.168.1.100", 1234);
//!     thermostat.set_timeout(Duration::from_secs(2));
//!
//!     let status = thermostat.read_device().await?;
//!     println!("Status: {:?}", status);
//!
//!     thermostat.set_run_mode(RunMode::FrostProtection).await?;
//!     Ok(())
//! }
//! ```

use crate::protocol::frame::{self, LENGTH_PREFIX};
use crate::protocol::*;
use crate::tcp::{DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::{Error, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// The main struct for interacting asynchronously with a thermostat using Tokio.
///
/// Each request opens its own connection. Failed round trips are repeated
/// up to the configured number of retries; rejected intents are not.
#[derive(Debug)]
pub struct Thermostat {
    host: String,
    port: u16,
    pin: u16,
    io_timeout: Duration,
    profile: Option<DeviceProfile>,
    retries: u8,
}

macro_rules! request_with_retry {
    ($self:ident, $request_bytes:expr) => {{
        'retry_block: {
            for t in 0..$self.retries {
                match $self.send_and_receive($request_bytes).await {
                    Ok(reply_bytes) => match decode_response(&reply_bytes) {
                        Ok(result) => break 'retry_block Ok(result),
                        Err(err) => {
                            log::trace!(
                                "Failed try {} of {}, repeating ({err})",
                                t + 1,
                                $self.retries
                            );
                        }
                    },
                    Err(err) => {
                        log::trace!(
                            "Failed try {} of {}, repeating ({err})",
                            t + 1,
                            $self.retries
                        );
                    }
                }
            }
            decode_response(&$self.send_and_receive($request_bytes).await?)
        }
    }};
}

async fn with_timeout<T>(
    timeout: Duration,
    future: impl std::future::Future<Output = std::io::Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(Error::from_io)
}

impl Thermostat {
    /// Creates a client for the thermostat at `host` using the default port.
    pub fn new(host: &str, pin: u16) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            pin,
            io_timeout: DEFAULT_TIMEOUT,
            profile: None,
            retries: 0,
        }
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    /// sets the number of retries for a failed round trip
    pub fn set_retry(&mut self, n_retries: u8) {
        self.retries = n_retries;
    }

    /// Sets the timeout for connecting and for each read or write.
    pub fn set_timeout(&mut self, timeout: Duration) {
        log::trace!("set timeout to {timeout:?}");
        self.io_timeout = timeout;
    }

    /// Model and schedule mode learned from the last successful read.
    pub fn profile(&self) -> Option<DeviceProfile> {
        self.profile
    }

    async fn send_and_receive(&self, tx_buffer: &[u8]) -> Result<Vec<u8>> {
        log::trace!("connect to {}:{}", self.host, self.port);
        let mut stream = with_timeout(
            self.io_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await?;

        log::trace!("write bytes: {tx_buffer:02X?}");
        with_timeout(self.io_timeout, stream.write_all(tx_buffer)).await?;

        let mut prefix = [0u8; LENGTH_PREFIX];
        with_timeout(self.io_timeout, stream.read_exact(&mut prefix)).await?;
        let length = frame::declared_length(&prefix).max(LENGTH_PREFIX);
        let mut rx_buffer = vec![0; length];
        rx_buffer[..LENGTH_PREFIX].copy_from_slice(&prefix);
        with_timeout(
            self.io_timeout,
            stream.read_exact(&mut rx_buffer[LENGTH_PREFIX..]),
        )
        .await?;

        log::trace!("receive_bytes: {rx_buffer:02X?}");
        Ok(rx_buffer)
    }

    async fn exchange(&mut self, tx_buffer: &[u8]) -> Result<DeviceState> {
        let state = request_with_retry!(self, tx_buffer)?;
        self.profile = Some(state.profile());
        Ok(state)
    }

    /// Asynchronously reads and decodes the full device status.
    pub async fn read_device(&mut self) -> Result<DeviceState> {
        log::trace!("read device");
        self.exchange(&frame::read_request(self.pin)).await
    }

    /// Writes the changes in one frame and returns the status the device answers with.
    ///
    /// **Note:** the device is read first when its model is not known yet.
    pub async fn write_changes(&mut self, changes: &[StatusChange]) -> Result<DeviceState> {
        if changes.is_empty() {
            return Err(Error::unsupported_value("intent", "no changes to write"));
        }
        let profile = match self.profile {
            Some(profile) => profile,
            None => self.read_device().await?.profile(),
        };
        let entries = translate(changes, &profile)?;
        self.exchange(&frame::write_request(self.pin, &entries)?)
            .await
    }

    pub async fn write_device(&mut self, intent: &WriteIntent) -> Result<DeviceState> {
        self.write_changes(intent.changes()).await
    }

    pub async fn set_time(&mut self, time: chrono::NaiveDateTime) -> Result<DeviceState> {
        log::trace!("set time to {time}");
        self.write_changes(&[StatusChange::Time(time)]).await
    }

    pub async fn set_run_mode(&mut self, mode: RunMode) -> Result<DeviceState> {
        log::trace!("set run mode to {mode:?}");
        self.write_changes(&[StatusChange::RunMode(mode)]).await
    }

    pub async fn set_target(
        &mut self,
        target: u8,
        hold_minutes: Option<u16>,
    ) -> Result<DeviceState> {
        log::trace!("set target to {target} hold={hold_minutes:?}");
        self.write_changes(&[StatusChange::Heating {
            target: Some(target),
            hold_minutes,
        }])
        .await
    }
}
