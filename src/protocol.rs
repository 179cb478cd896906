//! Binary protocol of the Heatmiser Wi-Fi thermostats.
//!
//! A read is a [`frame::read_request`] answered by a response frame carrying
//! the device control block (DCB), which [`DeviceState::decode`] turns into a
//! status snapshot. A write translates [`StatusChange`]s into sparse
//! [`DcbEntry`]s for the model at hand and sends them in one
//! [`frame::write_request`]; the device answers with the updated DCB.

pub mod crc;
pub mod dcb;
pub mod frame;
pub mod write;

pub use dcb::{
    DeviceModel, DeviceProfile, DeviceState, RunMode, ScheduleMode, SensorSelection,
    TemperatureUnit, Vendor,
};
pub use frame::{ResponseFrame, READ_ACK, READ_OPCODE, WRITE_OPCODE};
pub use write::{
    translate, ComfortSlot, DcbEntry, Holiday, HotWaterState, StatusChange, TimerSlot,
    WriteIntent,
};

use crate::Result;

/// Validates a complete response and decodes the DCB it carries.
pub fn decode_response(rx_buffer: &[u8]) -> Result<DeviceState> {
    let frame = ResponseFrame::parse(rx_buffer)?;
    DeviceState::decode(frame.dcb)
}
