use crate::protocol::frame::{self, LENGTH_PREFIX};
use crate::protocol::*;
use crate::{Error, Result};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// TCP port the thermostats listen on.
pub const DEFAULT_PORT: u16 = 8068;
/// Deadline for connecting and for each read or write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Reads exactly one frame, using its length prefix to know where it ends.
pub(crate) fn read_frame(stream: &mut impl Read) -> std::io::Result<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX];
    stream.read_exact(&mut prefix)?;
    let length = frame::declared_length(&prefix).max(LENGTH_PREFIX);
    let mut rx_buffer = vec![0; length];
    rx_buffer[..LENGTH_PREFIX].copy_from_slice(&prefix);
    stream.read_exact(&mut rx_buffer[LENGTH_PREFIX..])?;
    Ok(rx_buffer)
}

/// Synchronous client for one thermostat; every request opens its own connection.
#[derive(Debug)]
pub struct Thermostat {
    host: String,
    port: u16,
    pin: u16,
    timeout: Duration,
    profile: Option<DeviceProfile>,
}

impl Thermostat {
    pub fn new(host: &str, pin: u16) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            pin,
            timeout: DEFAULT_TIMEOUT,
            profile: None,
        }
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        log::trace!("set timeout to {timeout:?}");
        self.timeout = timeout;
    }

    /// Model and schedule mode learned from the last successful read.
    pub fn profile(&self) -> Option<DeviceProfile> {
        self.profile
    }

    fn resolve(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                Error::Connection(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("cannot resolve '{}'", self.host),
                ))
            })
    }

    fn send_and_receive(&self, tx_buffer: &[u8]) -> Result<Vec<u8>> {
        let addr = self.resolve()?;
        log::trace!("connect to {addr}");
        let mut stream = TcpStream::connect_timeout(&addr, self.timeout).map_err(Error::from_io)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        log::trace!("write bytes: {tx_buffer:02X?}");
        stream.write_all(tx_buffer).map_err(Error::from_io)?;
        let rx_buffer = read_frame(&mut stream).map_err(Error::from_io)?;
        log::trace!("receive_bytes: {rx_buffer:02X?}");
        Ok(rx_buffer)
    }

    fn exchange(&mut self, tx_buffer: &[u8]) -> Result<DeviceState> {
        let state = decode_response(&self.send_and_receive(tx_buffer)?)?;
        self.profile = Some(state.profile());
        Ok(state)
    }

    /// Reads and decodes the full device status.
    pub fn read_device(&mut self) -> Result<DeviceState> {
        log::trace!("read device");
        self.exchange(&frame::read_request(self.pin))
    }

    fn resolved_profile(&mut self) -> Result<DeviceProfile> {
        match self.profile {
            Some(profile) => Ok(profile),
            None => {
                log::debug!("model unknown, reading device first");
                Ok(self.read_device()?.profile())
            }
        }
    }

    /// Writes the changes in one frame and returns the status the device answers with.
    ///
    /// The device is read first when its model is not known yet. An empty
    /// change list is rejected without connecting.
    pub fn write_changes(&mut self, changes: &[StatusChange]) -> Result<DeviceState> {
        if changes.is_empty() {
            return Err(Error::unsupported_value("intent", "no changes to write"));
        }
        let profile = self.resolved_profile()?;
        let entries = translate(changes, &profile)?;
        log::trace!("write {} entries", entries.len());
        self.exchange(&frame::write_request(self.pin, &entries)?)
    }

    pub fn write_device(&mut self, intent: &WriteIntent) -> Result<DeviceState> {
        self.write_changes(intent.changes())
    }

    pub fn set_time(&mut self, time: chrono::NaiveDateTime) -> Result<DeviceState> {
        self.write_changes(&[StatusChange::Time(time)])
    }

    pub fn set_run_mode(&mut self, mode: RunMode) -> Result<DeviceState> {
        self.write_changes(&[StatusChange::RunMode(mode)])
    }

    pub fn set_target(&mut self, target: u8, hold_minutes: Option<u16>) -> Result<DeviceState> {
        self.write_changes(&[StatusChange::Heating {
            target: Some(target),
            hold_minutes,
        }])
    }
}
