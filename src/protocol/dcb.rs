use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Epoch of every year byte stored by the thermostat.
pub const YEAR_EPOCH: i32 = 2000;

/// Raw temperature reading reported for a sensor that is not connected.
const SENSOR_ABSENT: u16 = 0xFFFF;

/// A fixed position inside the device control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub width: usize,
}

impl Field {
    pub const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// First offset past the end of the field.
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }

    /// The same field moved `by` bytes towards the end of the block.
    pub const fn shifted(&self, by: usize) -> Self {
        Self::new(self.offset + by, self.width)
    }

    fn u8(&self, dcb: &[u8]) -> u8 {
        dcb[self.offset]
    }

    fn u16(&self, dcb: &[u8]) -> u16 {
        u16::from_le_bytes([dcb[self.offset], dcb[self.offset + 1]])
    }

    fn flag(&self, dcb: &[u8]) -> bool {
        self.u8(dcb) != 0
    }

    fn temperature(&self, dcb: &[u8]) -> Option<f32> {
        match self.u16(dcb) {
            SENSOR_ABSENT => None,
            raw => Some(f32::from(raw) / 10.0),
        }
    }
}

/// Byte layout of the device control block as returned by a full read.
pub mod layout {
    use super::Field;

    pub const LENGTH: Field = Field::new(0, 2);
    pub const VENDOR: Field = Field::new(2, 1);
    pub const VERSION: Field = Field::new(3, 1);
    pub const MODEL: Field = Field::new(4, 1);
    pub const TEMPERATURE_UNIT: Field = Field::new(5, 1);
    pub const SWITCH_DIFFERENTIAL: Field = Field::new(6, 1);
    pub const FROST_PROTECTION: Field = Field::new(7, 1);
    pub const CALIBRATION_OFFSET: Field = Field::new(8, 2);
    pub const OUTPUT_DELAY: Field = Field::new(10, 1);
    pub const KEY_LOCK_LIMIT: Field = Field::new(11, 1);
    pub const SENSOR_SELECTION: Field = Field::new(13, 1);
    pub const OPTIMUM_START: Field = Field::new(14, 1);
    pub const RATE_OF_CHANGE: Field = Field::new(15, 1);
    pub const SCHEDULE_MODE: Field = Field::new(16, 1);
    pub const FROST_PROTECT_TARGET: Field = Field::new(17, 1);
    pub const SET_ROOM_TARGET: Field = Field::new(18, 1);
    pub const FLOOR_MAX_LIMIT: Field = Field::new(19, 1);
    pub const FLOOR_MAX_ENABLED: Field = Field::new(20, 1);
    pub const DEVICE_ON: Field = Field::new(21, 1);
    pub const KEY_LOCK: Field = Field::new(22, 1);
    pub const RUN_MODE: Field = Field::new(23, 1);
    pub const AWAY_MODE: Field = Field::new(24, 1);
    /// Year, month, day, hour and minute of the holiday return.
    pub const HOLIDAY_RETURN: Field = Field::new(25, 5);
    pub const HOLIDAY_ENABLED: Field = Field::new(30, 1);
    pub const HOLD_MINUTES: Field = Field::new(31, 2);
    pub const REMOTE_AIR_TEMPERATURE: Field = Field::new(33, 2);
    pub const FLOOR_TEMPERATURE: Field = Field::new(35, 2);
    pub const BUILT_IN_AIR_TEMPERATURE: Field = Field::new(37, 2);
    pub const ERROR_CODE: Field = Field::new(39, 1);
    pub const HEATING_ON: Field = Field::new(40, 1);
    pub const BOOST_MINUTES: Field = Field::new(41, 2);
    /// Only present on the hot water model.
    pub const HOT_WATER_ON: Field = Field::new(43, 1);
    /// Year, month, day, weekday, hour, minute and second.
    pub const CURRENT_TIME: Field = Field::new(41, 7);
    /// Bytes the hot water model inserts in front of the current time.
    pub const HOT_WATER_TIME_SHIFT: usize = 3;
}

/// Thermostat variant reported in the DCB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeviceModel {
    /// DT: basic thermostat.
    Dt,
    /// DT-E: basic thermostat with floor limit.
    DtE,
    /// PRT: programmable thermostat.
    Prt,
    /// PRT-E: programmable thermostat with floor limit.
    PrtE,
    /// PRTHW: programmable thermostat with hot water control.
    PrtHw,
    /// TM1: hot water timer.
    Tm1,
}

impl DeviceModel {
    pub fn decode(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Dt),
            1 => Ok(Self::DtE),
            2 => Ok(Self::Prt),
            3 => Ok(Self::PrtE),
            4 => Ok(Self::PrtHw),
            5 => Ok(Self::Tm1),
            _ => Err(Error::UnknownModel(value)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dt => "DT",
            Self::DtE => "DT-E",
            Self::Prt => "PRT",
            Self::PrtE => "PRT-E",
            Self::PrtHw => "PRTHW",
            Self::Tm1 => "TM1",
        }
    }

    /// Models that control a heating zone; the timer has no run mode or target.
    pub fn has_heating(&self) -> bool {
        !matches!(self, Self::Tm1)
    }

    pub fn has_floor_limit(&self) -> bool {
        matches!(self, Self::DtE | Self::PrtE)
    }

    /// Models with a hot water output, which also carry away mode and boost.
    pub fn has_hot_water(&self) -> bool {
        matches!(self, Self::PrtHw | Self::Tm1)
    }

    /// Models with a weekly comfort level program.
    pub fn is_programmable(&self) -> bool {
        matches!(self, Self::Prt | Self::PrtE | Self::PrtHw)
    }

    pub fn has_hot_water_timer(&self) -> bool {
        matches!(self, Self::PrtHw | Self::Tm1)
    }

    fn time_field(&self) -> Field {
        match self {
            Self::PrtHw => layout::CURRENT_TIME.shifted(layout::HOT_WATER_TIME_SHIFT),
            _ => layout::CURRENT_TIME,
        }
    }

    /// Smallest DCB that holds every field decoded for this model.
    fn min_dcb_length(&self) -> usize {
        self.time_field().end()
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Vendor {
    Heatmiser,
    Oem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SensorSelection {
    BuiltInOnly,
    RemoteOnly,
    FloorOnly,
    BuiltInAndFloor,
    RemoteAndFloor,
}

/// Whether the weekly program is split in weekdays/weekend or has seven days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScheduleMode {
    FiveTwo,
    SevenDay,
}

impl ScheduleMode {
    /// Number of day entries a weekly program must carry in this mode.
    pub fn days(&self) -> usize {
        match self {
            Self::FiveTwo => 2,
            Self::SevenDay => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunMode {
    Heating,
    FrostProtection,
}

impl RunMode {
    pub fn encode(&self) -> u8 {
        match self {
            Self::Heating => 0,
            Self::FrostProtection => 1,
        }
    }
}

macro_rules! decode_enum {
    ($dcb:expr, $field:expr, $name:literal, [$($variant:expr),+ $(,)?]) => {{
        let value = $field.u8($dcb);
        [$($variant),+]
            .get(usize::from(value))
            .copied()
            .ok_or(Error::InvalidValue { field: $name, value })
    }};
}

fn decode_date_time(dcb: &[u8], field: Field) -> Option<NaiveDateTime> {
    let at = |n: usize| u32::from(dcb[field.offset + n]);
    // weekday at position 3 is implied by the date
    NaiveDate::from_ymd_opt(YEAR_EPOCH + at(0) as i32, at(1), at(2))?.and_hms_opt(
        at(4),
        at(5),
        at(6),
    )
}

fn decode_holiday_return(dcb: &[u8]) -> Option<NaiveDateTime> {
    let at = |n: usize| u32::from(dcb[layout::HOLIDAY_RETURN.offset + n]);
    NaiveDate::from_ymd_opt(YEAR_EPOCH + at(0) as i32, at(1), at(2))?.and_hms_opt(at(3), at(4), 0)
}

/// Snapshot of the full device status decoded from one read.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceState {
    pub vendor: Vendor,
    pub model: DeviceModel,
    pub version: f32,
    pub temperature_unit: TemperatureUnit,
    pub switch_differential: f32,
    pub frost_protection: bool,
    pub calibration_offset: u16,
    pub output_delay: u8,
    pub key_lock_limit: u8,
    pub sensor_selection: SensorSelection,
    pub optimum_start: u8,
    pub rate_of_change: u8,
    pub schedule_mode: ScheduleMode,
    pub frost_protect_target: u8,
    pub set_room_target: u8,
    pub floor_max_limit: u8,
    pub floor_max_limit_enabled: bool,
    pub device_on: bool,
    pub key_lock: bool,
    pub run_mode: RunMode,
    pub away_mode: bool,
    pub holiday_enabled: bool,
    pub holiday_return: Option<NaiveDateTime>,
    pub hold_minutes: u16,
    /// `None` when the sensor is not connected.
    pub remote_air_temperature: Option<f32>,
    pub floor_temperature: Option<f32>,
    pub built_in_air_temperature: Option<f32>,
    pub error_code: u8,
    pub heating_on: bool,
    pub boost_minutes: u16,
    /// Always `false` on models without hot water.
    pub hot_water_on: bool,
    pub current_time: NaiveDateTime,
}

impl DeviceState {
    /// Decodes the DCB carried by a read response.
    pub fn decode(dcb: &[u8]) -> Result<Self> {
        if dcb.len() < layout::MODEL.end() {
            log::warn!("DCB too short - received={}", dcb.len());
            return Err(Error::LengthMismatch {
                declared: layout::MODEL.end(),
                actual: dcb.len(),
            });
        }
        let declared = usize::from(layout::LENGTH.u16(dcb));
        if declared != dcb.len() {
            log::warn!(
                "Incorrect DCB length - declared={} received={}",
                declared,
                dcb.len()
            );
            return Err(Error::LengthMismatch {
                declared,
                actual: dcb.len(),
            });
        }
        let model = DeviceModel::decode(layout::MODEL.u8(dcb))?;
        if dcb.len() < model.min_dcb_length() {
            log::warn!(
                "DCB too short for {} - required={} received={}",
                model,
                model.min_dcb_length(),
                dcb.len()
            );
            return Err(Error::LengthMismatch {
                declared: model.min_dcb_length(),
                actual: dcb.len(),
            });
        }

        let mut version = layout::VERSION.u8(dcb);
        if model != DeviceModel::PrtHw {
            version &= 0x7F;
        }
        let holiday_enabled = layout::HOLIDAY_ENABLED.flag(dcb);
        let holiday_return = if holiday_enabled {
            Some(decode_holiday_return(dcb).ok_or(Error::InvalidDateTime("holiday_return"))?)
        } else {
            None
        };
        let current_time = decode_date_time(dcb, model.time_field())
            .ok_or(Error::InvalidDateTime("current_time"))?;

        let state = Self {
            vendor: decode_enum!(dcb, layout::VENDOR, "vendor", [Vendor::Heatmiser, Vendor::Oem])?,
            model,
            version: f32::from(version) / 10.0,
            temperature_unit: decode_enum!(
                dcb,
                layout::TEMPERATURE_UNIT,
                "temperature_unit",
                [TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit]
            )?,
            switch_differential: f32::from(layout::SWITCH_DIFFERENTIAL.u8(dcb)) / 2.0,
            frost_protection: layout::FROST_PROTECTION.flag(dcb),
            calibration_offset: layout::CALIBRATION_OFFSET.u16(dcb),
            output_delay: layout::OUTPUT_DELAY.u8(dcb),
            key_lock_limit: layout::KEY_LOCK_LIMIT.u8(dcb),
            sensor_selection: decode_enum!(
                dcb,
                layout::SENSOR_SELECTION,
                "sensor_selection",
                [
                    SensorSelection::BuiltInOnly,
                    SensorSelection::RemoteOnly,
                    SensorSelection::FloorOnly,
                    SensorSelection::BuiltInAndFloor,
                    SensorSelection::RemoteAndFloor,
                ]
            )?,
            optimum_start: layout::OPTIMUM_START.u8(dcb),
            rate_of_change: layout::RATE_OF_CHANGE.u8(dcb),
            schedule_mode: decode_enum!(
                dcb,
                layout::SCHEDULE_MODE,
                "schedule_mode",
                [ScheduleMode::FiveTwo, ScheduleMode::SevenDay]
            )?,
            frost_protect_target: layout::FROST_PROTECT_TARGET.u8(dcb),
            set_room_target: layout::SET_ROOM_TARGET.u8(dcb),
            floor_max_limit: layout::FLOOR_MAX_LIMIT.u8(dcb),
            floor_max_limit_enabled: layout::FLOOR_MAX_ENABLED.flag(dcb),
            device_on: layout::DEVICE_ON.flag(dcb),
            key_lock: layout::KEY_LOCK.flag(dcb),
            run_mode: decode_enum!(
                dcb,
                layout::RUN_MODE,
                "run_mode",
                [RunMode::Heating, RunMode::FrostProtection]
            )?,
            away_mode: layout::AWAY_MODE.flag(dcb),
            holiday_enabled,
            holiday_return,
            hold_minutes: layout::HOLD_MINUTES.u16(dcb),
            remote_air_temperature: layout::REMOTE_AIR_TEMPERATURE.temperature(dcb),
            floor_temperature: layout::FLOOR_TEMPERATURE.temperature(dcb),
            built_in_air_temperature: layout::BUILT_IN_AIR_TEMPERATURE.temperature(dcb),
            error_code: layout::ERROR_CODE.u8(dcb),
            heating_on: layout::HEATING_ON.flag(dcb),
            boost_minutes: layout::BOOST_MINUTES.u16(dcb),
            hot_water_on: model == DeviceModel::PrtHw && layout::HOT_WATER_ON.flag(dcb),
            current_time,
        };
        log::trace!("decoded DCB: {:?}", state);
        Ok(state)
    }

    /// The model capabilities and schedule layout needed to translate writes.
    pub fn profile(&self) -> DeviceProfile {
        DeviceProfile {
            model: self.model,
            schedule_mode: self.schedule_mode,
        }
    }
}

/// What a write needs to know about the device, resolved by a previous read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    pub model: DeviceModel,
    pub schedule_mode: ScheduleMode,
}

impl DeviceProfile {
    pub fn new(model: DeviceModel, schedule_mode: ScheduleMode) -> Self {
        Self {
            model,
            schedule_mode,
        }
    }
}
