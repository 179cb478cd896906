//! Translation of status changes into sparse DCB write entries.
//!
//! Changes come either typed, as [`StatusChange`] values, or untyped, as a
//! [`WriteIntent`] parsed from a JSON object such as
//! `{"heating": {"target": 20, "hold": 30}, "runmode": "frost"}`.
//! Either way they are only translatable together with the [`DeviceProfile`]
//! of the connected thermostat, and translation fails as a whole when any
//! single change is rejected.

use super::dcb::{DeviceModel, DeviceProfile, RunMode, ScheduleMode, YEAR_EPOCH};
use crate::{Error, Result};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde_json::{Map, Value};

/// Write addresses, which differ from the positions the same values occupy in a read.
mod address {
    pub const FROST_PROTECT_TARGET: u16 = 17;
    pub const HEATING_TARGET: u16 = 18;
    pub const FLOOR_MAX_LIMIT: u16 = 19;
    pub const DEVICE_ON: u16 = 21;
    pub const KEY_LOCK: u16 = 22;
    pub const RUN_MODE: u16 = 23;
    pub const HOLIDAY: u16 = 24;
    pub const HOT_WATER_BOOST: u16 = 25;
    pub const AWAY_MODE: u16 = 31;
    pub const HOLD_MINUTES: u16 = 32;
    pub const HOT_WATER_STATE: u16 = 42;
    pub const CURRENT_TIME: u16 = 43;
}

/// Placement of one weekly program in the write address space.
struct ProgramLayout {
    five_two_base: u16,
    seven_day_base: u16,
    day_stride: u16,
}

impl ProgramLayout {
    fn position(&self, mode: ScheduleMode, day: usize) -> u16 {
        let base = match mode {
            ScheduleMode::FiveTwo => self.five_two_base,
            ScheduleMode::SevenDay => self.seven_day_base,
        };
        base + self.day_stride * day as u16
    }
}

const COMFORT_PROGRAM: ProgramLayout = ProgramLayout {
    five_two_base: 47,
    seven_day_base: 103,
    day_stride: 12,
};

const TIMER_PROGRAM: ProgramLayout = ProgramLayout {
    five_two_base: 71,
    seven_day_base: 187,
    day_stride: 16,
};

/// Slots per program day.
pub const SLOTS_PER_DAY: usize = 4;
/// Hour value marking a program slot as unused.
const UNUSED_HOUR: u8 = 24;
const UNUSED_COMFORT_SLOT: [u8; 3] = [UNUSED_HOUR, 0, 16];
const UNUSED_TIMER_SLOT: [u8; 4] = [UNUSED_HOUR, 0, UNUSED_HOUR, 0];

/// One sparse write: `value` stored at `position` of the DCB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcbEntry {
    pub position: u16,
    pub value: Vec<u8>,
}

impl DcbEntry {
    pub fn new(position: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            position,
            value: value.into(),
        }
    }

    fn byte(position: u16, value: u8) -> Self {
        Self::new(position, [value])
    }

    fn flag(position: u16, value: bool) -> Self {
        Self::byte(position, u8::from(value))
    }

    fn word(position: u16, value: u16) -> Self {
        Self::new(position, value.to_le_bytes())
    }

    /// Appends `[position:2][length:1][value]` to a write payload.
    pub(crate) fn encode_into(&self, buffer: &mut Vec<u8>) -> Result<()> {
        let length =
            u8::try_from(self.value.len()).map_err(|_| Error::FrameTooLong(self.value.len()))?;
        buffer.extend_from_slice(&self.position.to_le_bytes());
        buffer.push(length);
        buffer.extend_from_slice(&self.value);
        Ok(())
    }
}

/// Requested hot water output; the device distinguishes "on", "off" and "leave as is".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HotWaterState {
    #[default]
    Unchanged,
    On,
    Off,
}

impl HotWaterState {
    fn encode(&self) -> u8 {
        match self {
            Self::Unchanged => 0,
            Self::On => 1,
            Self::Off => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holiday {
    Cancel,
    ReturnAt(NaiveDateTime),
}

/// A comfort level program slot: from `time` on, heat to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComfortSlot {
    pub time: NaiveTime,
    pub target: u8,
}

/// A hot water program slot switching on at `on` and off at `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSlot {
    pub on: NaiveTime,
    pub off: NaiveTime,
}

/// A single writable field together with its requested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Time(NaiveDateTime),
    Enabled(bool),
    KeyLock(bool),
    Holiday(Holiday),
    RunMode(RunMode),
    AwayMode(bool),
    FrostProtect {
        target: u8,
    },
    FloorLimit {
        floor_max: u8,
    },
    Heating {
        target: Option<u8>,
        hold_minutes: Option<u16>,
    },
    HotWater {
        boost_minutes: Option<u16>,
        state: HotWaterState,
    },
    /// One day group per entry; up to [`SLOTS_PER_DAY`] slots each.
    Comfort(Vec<Vec<ComfortSlot>>),
    Timer(Vec<Vec<TimerSlot>>),
}

impl StatusChange {
    /// Name of the intent key this change is written as.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Time(_) => "time",
            Self::Enabled(_) => "enabled",
            Self::KeyLock(_) => "keylock",
            Self::Holiday(_) => "holiday",
            Self::RunMode(_) => "runmode",
            Self::AwayMode(_) => "awaymode",
            Self::FrostProtect { .. } => "frostprotect",
            Self::FloorLimit { .. } => "floorlimit",
            Self::Heating { .. } => "heating",
            Self::HotWater { .. } => "hotwater",
            Self::Comfort(_) => "comfort",
            Self::Timer(_) => "timer",
        }
    }

    pub fn is_supported_by(&self, model: DeviceModel) -> bool {
        match self {
            Self::Time(_)
            | Self::Enabled(_)
            | Self::KeyLock(_)
            | Self::Holiday(_)
            | Self::FrostProtect { .. } => true,
            Self::RunMode(_) | Self::Heating { .. } => model.has_heating(),
            Self::AwayMode(_) | Self::HotWater { .. } => model.has_hot_water(),
            Self::FloorLimit { .. } => model.has_floor_limit(),
            Self::Comfort(_) => model.is_programmable(),
            Self::Timer(_) => model.has_hot_water_timer(),
        }
    }

    /// Appends the entries for this change, in address order of its parts.
    fn encode(&self, profile: &DeviceProfile, entries: &mut Vec<DcbEntry>) -> Result<()> {
        if !self.is_supported_by(profile.model) {
            log::warn!("{} cannot be written to {}", self.field(), profile.model);
            return Err(Error::NotSupportedByModel {
                field: self.field(),
                model: profile.model,
            });
        }
        match self {
            Self::Time(time) => entries.push(DcbEntry::new(
                address::CURRENT_TIME,
                encode_date_time(time)?,
            )),
            Self::Enabled(on) => entries.push(DcbEntry::flag(address::DEVICE_ON, *on)),
            Self::KeyLock(on) => entries.push(DcbEntry::flag(address::KEY_LOCK, *on)),
            Self::Holiday(Holiday::Cancel) => entries.push(DcbEntry::byte(address::HOLIDAY, 0)),
            Self::Holiday(Holiday::ReturnAt(time)) => {
                let mut value = encode_date_time(time)?;
                // year, month, day, hour, minute
                value.remove(3);
                value.truncate(5);
                entries.push(DcbEntry::new(address::HOLIDAY, value));
            }
            Self::RunMode(mode) => entries.push(DcbEntry::byte(address::RUN_MODE, mode.encode())),
            Self::AwayMode(away) => entries.push(DcbEntry::flag(address::AWAY_MODE, *away)),
            Self::FrostProtect { target } => {
                entries.push(DcbEntry::byte(address::FROST_PROTECT_TARGET, *target))
            }
            Self::FloorLimit { floor_max } => {
                entries.push(DcbEntry::byte(address::FLOOR_MAX_LIMIT, *floor_max))
            }
            Self::Heating {
                target,
                hold_minutes,
            } => {
                if let Some(target) = target {
                    entries.push(DcbEntry::byte(address::HEATING_TARGET, *target));
                }
                if let Some(minutes) = hold_minutes {
                    entries.push(DcbEntry::word(address::HOLD_MINUTES, *minutes));
                }
            }
            Self::HotWater {
                boost_minutes,
                state,
            } => {
                if let Some(minutes) = boost_minutes {
                    entries.push(DcbEntry::word(address::HOT_WATER_BOOST, *minutes));
                }
                entries.push(DcbEntry::byte(address::HOT_WATER_STATE, state.encode()));
            }
            Self::Comfort(days) => {
                check_days(self.field(), profile.schedule_mode, days.len())?;
                for (day, slots) in days.iter().enumerate() {
                    let value = encode_program_day(
                        self.field(),
                        slots.as_slice(),
                        UNUSED_COMFORT_SLOT,
                        |s| {
                            let [hour, minute] = encode_time(&s.time);
                            [hour, minute, s.target]
                        },
                    )?;
                    entries.push(DcbEntry::new(
                        COMFORT_PROGRAM.position(profile.schedule_mode, day),
                        value,
                    ));
                }
            }
            Self::Timer(days) => {
                check_days(self.field(), profile.schedule_mode, days.len())?;
                for (day, slots) in days.iter().enumerate() {
                    let value = encode_program_day(
                        self.field(),
                        slots.as_slice(),
                        UNUSED_TIMER_SLOT,
                        |s| {
                            let [on_hour, on_minute] = encode_time(&s.on);
                            let [off_hour, off_minute] = encode_time(&s.off);
                            [on_hour, on_minute, off_hour, off_minute]
                        },
                    )?;
                    entries.push(DcbEntry::new(
                        TIMER_PROGRAM.position(profile.schedule_mode, day),
                        value,
                    ));
                }
            }
        }
        Ok(())
    }
}

fn encode_date_time(time: &NaiveDateTime) -> Result<Vec<u8>> {
    let year = time.year() - YEAR_EPOCH;
    let year = u8::try_from(year).map_err(|_| {
        Error::unsupported_value("time", format!("year {} out of range", time.year()))
    })?;
    Ok(vec![
        year,
        time.month() as u8,
        time.day() as u8,
        // Monday = 1 .. Sunday = 7
        time.weekday().number_from_monday() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    ])
}

fn encode_time(time: &NaiveTime) -> [u8; 2] {
    [time.hour() as u8, time.minute() as u8]
}

fn check_days(field: &'static str, mode: ScheduleMode, actual: usize) -> Result<()> {
    if actual != mode.days() {
        log::warn!(
            "Incorrect number of days for {} program - expected={} received={}",
            field,
            mode.days(),
            actual
        );
        return Err(Error::ScheduleLengthMismatch {
            field,
            expected: mode.days(),
            actual,
        });
    }
    Ok(())
}

/// Lays out one program day as [`SLOTS_PER_DAY`] fixed-width slots, filling the rest with `unused`.
fn encode_program_day<S, const N: usize>(
    field: &'static str,
    slots: &[S],
    unused: [u8; N],
    encode_slot: impl Fn(&S) -> [u8; N],
) -> Result<Vec<u8>> {
    if slots.len() > SLOTS_PER_DAY {
        return Err(Error::unsupported_value(
            field,
            format!("{} slots in one day, at most {}", slots.len(), SLOTS_PER_DAY),
        ));
    }
    let mut value = Vec::with_capacity(SLOTS_PER_DAY * N);
    for slot in 0..SLOTS_PER_DAY {
        match slots.get(slot) {
            Some(s) => value.extend_from_slice(&encode_slot(s)),
            None => value.extend_from_slice(&unused),
        }
    }
    Ok(value)
}

/// Translates changes into entries for one write frame, keeping their order.
///
/// Fails when nothing would be written.
pub fn translate(changes: &[StatusChange], profile: &DeviceProfile) -> Result<Vec<DcbEntry>> {
    let mut entries = Vec::new();
    for change in changes {
        change.encode(profile, &mut entries)?;
    }
    if entries.is_empty() {
        log::warn!("No entries to write for {} change(s)", changes.len());
        return Err(Error::unsupported_value("intent", "no changes to write"));
    }
    log::debug!(
        "translated {} change(s) into {} entries for {}",
        changes.len(),
        entries.len(),
        profile.model
    );
    Ok(entries)
}

/// An untyped, ordered set of named changes.
///
/// Parsing checks field names and value types only. Model support and
/// program lengths are checked by [`WriteIntent::translate`] against the
/// profile of the connected device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteIntent {
    changes: Vec<StatusChange>,
}

impl WriteIntent {
    pub fn new(changes: Vec<StatusChange>) -> Self {
        Self { changes }
    }

    pub fn changes(&self) -> &[StatusChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Parses a JSON object, keeping the order in which its keys were written.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::unsupported_value("intent", "expected a JSON object"))?;
        let mut changes = Vec::with_capacity(object.len());
        for (key, value) in object {
            changes.push(parse_change(key, value)?);
        }
        Ok(Self { changes })
    }

    /// Entries for one write frame to a device described by `profile`.
    pub fn translate(&self, profile: &DeviceProfile) -> Result<Vec<DcbEntry>> {
        translate(&self.changes, profile)
    }
}

impl std::str::FromStr for WriteIntent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|err| Error::unsupported_value("intent", err.to_string()))?;
        Self::from_json(&value)
    }
}

impl From<Vec<StatusChange>> for WriteIntent {
    fn from(changes: Vec<StatusChange>) -> Self {
        Self::new(changes)
    }
}

fn invalid(field: &str, value: &Value) -> Error {
    Error::unsupported_value(field, format!("{value}"))
}

fn as_bool(field: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| invalid(field, value))
}

fn as_u8(field: &str, value: &Value) -> Result<u8> {
    value
        .as_u64()
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| invalid(field, value))
}

fn as_u16(field: &str, value: &Value) -> Result<u16> {
    value
        .as_u64()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| invalid(field, value))
}

fn as_object<'a>(field: &str, value: &'a Value) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| invalid(field, value))
}

fn as_array<'a>(field: &str, value: &'a Value) -> Result<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| invalid(field, value))
}

fn as_date_time(field: &str, value: &Value) -> Result<NaiveDateTime> {
    let text = value.as_str().ok_or_else(|| invalid(field, value))?;
    parse_date_time(text).map_err(|_| invalid(field, value))
}

fn as_time(field: &str, value: &Value) -> Result<NaiveTime> {
    let text = value.as_str().ok_or_else(|| invalid(field, value))?;
    NaiveTime::parse_from_str(text, "%H:%M").map_err(|_| invalid(field, value))
}

/// Accepts `2013-12-25T19:38:01` as well as `2013-12-25 19:38:01`.
pub fn parse_date_time(text: &str) -> std::result::Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
}

fn parse_run_mode(field: &str, value: &Value) -> Result<RunMode> {
    match value.as_str() {
        Some("heating") => Ok(RunMode::Heating),
        Some("frost") | Some("frost_protection") => Ok(RunMode::FrostProtection),
        _ => Err(Error::unsupported_value(
            field,
            format!("{value} is not one of [heating, frost_protection]"),
        )),
    }
}

fn parse_away_mode(field: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(away) => Ok(*away),
        Value::String(s) if s == "away" => Ok(true),
        Value::String(s) if s == "home" => Ok(false),
        _ => Err(invalid(field, value)),
    }
}

fn parse_days<S>(
    field: &str,
    value: &Value,
    parse_slot: impl Fn(&Map<String, Value>) -> Result<S>,
) -> Result<Vec<Vec<S>>> {
    as_array(field, value)?
        .iter()
        .map(|day| -> Result<Vec<S>> {
            as_array(field, day)?
                .iter()
                .map(|slot| parse_slot(as_object(field, slot)?))
                .collect()
        })
        .collect()
}

fn required<'a>(field: &str, object: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    object
        .get(key)
        .ok_or_else(|| Error::unsupported_value(field, format!("missing '{key}'")))
}

/// Rejects members of a change object other than `known`, naming the first offender.
fn check_members(field: &str, object: &Map<String, Value>, known: &[&str]) -> Result<()> {
    match object.keys().find(|key| !known.contains(&key.as_str())) {
        Some(key) => {
            log::warn!("Unsupported item for writing: {}.{}", field, key);
            Err(Error::UnsupportedField(format!("{field}.{key}")))
        }
        None => Ok(()),
    }
}

fn nothing_to_write(field: &str) -> Error {
    Error::unsupported_value(field, "no value to write")
}

/// A change object restricted to the members in `known`.
fn change_object<'a>(
    field: &str,
    value: &'a Value,
    known: &[&str],
) -> Result<&'a Map<String, Value>> {
    let object = as_object(field, value)?;
    check_members(field, object, known)?;
    Ok(object)
}

/// Parses one named change.
fn parse_change(key: &str, value: &Value) -> Result<StatusChange> {
    let change = match key {
        "time" => StatusChange::Time(as_date_time(key, value)?),
        "enabled" => StatusChange::Enabled(as_bool(key, value)?),
        "keylock" => StatusChange::KeyLock(as_bool(key, value)?),
        "holiday" => {
            let holiday = change_object(key, value, &["enabled", "time"])?;
            let enabled = holiday.get("enabled").map(|v| as_bool(key, v)).transpose()?;
            match (enabled, holiday.get("time")) {
                (Some(false), _) => StatusChange::Holiday(Holiday::Cancel),
                (_, Some(time)) => {
                    StatusChange::Holiday(Holiday::ReturnAt(as_date_time(key, time)?))
                }
                (Some(true), None) => {
                    return Err(Error::unsupported_value(key, "missing return 'time'"))
                }
                (None, None) => return Err(nothing_to_write(key)),
            }
        }
        "runmode" | "run_mode" => StatusChange::RunMode(parse_run_mode(key, value)?),
        "awaymode" | "away_mode" => StatusChange::AwayMode(parse_away_mode(key, value)?),
        "frostprotect" => {
            let frost_protect = change_object(key, value, &["target"])?;
            StatusChange::FrostProtect {
                target: as_u8(key, required(key, frost_protect, "target")?)?,
            }
        }
        "floorlimit" => {
            let floor_limit = change_object(key, value, &["floormax"])?;
            StatusChange::FloorLimit {
                floor_max: as_u8(key, required(key, floor_limit, "floormax")?)?,
            }
        }
        "heating" => {
            let heating = change_object(key, value, &["target", "hold"])?;
            let target = heating.get("target").map(|v| as_u8(key, v)).transpose()?;
            let hold_minutes = heating.get("hold").map(|v| as_u16(key, v)).transpose()?;
            if target.is_none() && hold_minutes.is_none() {
                return Err(nothing_to_write(key));
            }
            StatusChange::Heating {
                target,
                hold_minutes,
            }
        }
        "hotwater" => {
            let hot_water = change_object(key, value, &["boost", "on"])?;
            if hot_water.is_empty() {
                return Err(nothing_to_write(key));
            }
            StatusChange::HotWater {
                boost_minutes: hot_water.get("boost").map(|v| as_u16(key, v)).transpose()?,
                state: match hot_water.get("on") {
                    Some(on) if as_bool(key, on)? => HotWaterState::On,
                    Some(_) => HotWaterState::Off,
                    None => HotWaterState::Unchanged,
                },
            }
        }
        "comfort" => StatusChange::Comfort(parse_days(key, value, |slot| {
            check_members(key, slot, &["time", "target"])?;
            Ok(ComfortSlot {
                time: as_time(key, required(key, slot, "time")?)?,
                target: as_u8(key, required(key, slot, "target")?)?,
            })
        })?),
        "timer" => StatusChange::Timer(parse_days(key, value, |slot| {
            check_members(key, slot, &["on", "off"])?;
            Ok(TimerSlot {
                on: as_time(key, required(key, slot, "on")?)?,
                off: as_time(key, required(key, slot, "off")?)?,
            })
        })?),
        _ => {
            log::warn!("Unsupported item for writing: {}", key);
            return Err(Error::UnsupportedField(key.to_string()));
        }
    };
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::write_request;
    use chrono::NaiveDate;
    use serde_json::json;

    const PIN: u16 = 1234;

    fn prt_e() -> DeviceProfile {
        DeviceProfile::new(DeviceModel::PrtE, ScheduleMode::SevenDay)
    }

    fn frame(intent: Value, profile: &DeviceProfile) -> Result<Vec<u8>> {
        let entries = WriteIntent::from_json(&intent)?.translate(profile)?;
        write_request(PIN, &entries)
    }

    fn hhmm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn set_time_frame() {
        let time = NaiveDate::from_ymd_opt(2013, 12, 25)
            .unwrap()
            .and_hms_opt(19, 38, 1)
            .unwrap();
        let entries = translate(&[StatusChange::Time(time)], &prt_e()).unwrap();
        assert_eq!(
            write_request(PIN, &entries).unwrap(),
            [
                0xA3, 0x12, 0x00, 0xD2, 0x04, 0x01, 0x2B, 0x00, 0x07, 0x0D, 0x0C, 0x19, 0x03, 0x13,
                0x26, 0x01, 0x3E, 0x1C
            ]
        );
        assert_eq!(
            frame(json!({ "time": "2013-12-25T19:38:01" }), &prt_e()).unwrap(),
            write_request(PIN, &entries).unwrap()
        );
    }

    #[test]
    fn sunday_is_day_seven() {
        let sunday = NaiveDate::from_ymd_opt(2013, 12, 29)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let entries = translate(&[StatusChange::Time(sunday)], &prt_e()).unwrap();
        assert_eq!(entries[0].value[3], 7);
    }

    #[test]
    fn run_mode_frame() {
        assert_eq!(
            frame(json!({ "runmode": "frost_protection" }), &prt_e()).unwrap(),
            [0xA3, 0x0C, 0x00, 0xD2, 0x04, 0x01, 0x17, 0x00, 0x01, 0x01, 0x38, 0xDC]
        );
        assert_eq!(
            frame(json!({ "run_mode": "frost" }), &prt_e()).unwrap(),
            frame(json!({ "runmode": "frost_protection" }), &prt_e()).unwrap()
        );
    }

    #[test]
    fn run_mode_rejects_unknown_value() {
        assert!(matches!(
            frame(json!({ "runmode": "cooling" }), &prt_e()),
            Err(Error::UnsupportedValue { field, .. }) if field == "runmode"
        ));
    }

    #[test]
    fn hold_and_floor_limit_frame_keeps_declared_order() {
        let intent = json!({
            "heating": { "target": 20, "hold": 30 },
            "floorlimit": { "floormax": 23 }
        });
        assert_eq!(
            frame(intent, &prt_e()).unwrap(),
            [
                0xA3, 0x15, 0x00, 0xD2, 0x04, 0x03, 0x12, 0x00, 0x01, 0x14, 0x20, 0x00, 0x02, 0x1E,
                0x00, 0x13, 0x00, 0x01, 0x17, 0x6C, 0xC1
            ]
        );
    }

    #[test]
    fn unknown_field_is_named() {
        let result = WriteIntent::from_json(&json!({ "enabled": true, "units": "F" }));
        assert!(matches!(result, Err(Error::UnsupportedField(key)) if key == "units"));
    }

    #[test]
    fn fractional_temperature_is_rejected() {
        assert!(matches!(
            WriteIntent::from_json(&json!({ "heating": { "target": 20.5 } })),
            Err(Error::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn floor_limit_requires_capable_model() {
        let profile = DeviceProfile::new(DeviceModel::Prt, ScheduleMode::SevenDay);
        assert!(matches!(
            frame(json!({ "floorlimit": { "floormax": 23 } }), &profile),
            Err(Error::NotSupportedByModel {
                field: "floorlimit",
                model: DeviceModel::Prt
            })
        ));
    }

    #[test]
    fn timer_model_has_no_heating() {
        let profile = DeviceProfile::new(DeviceModel::Tm1, ScheduleMode::FiveTwo);
        assert!(matches!(
            translate(&[StatusChange::RunMode(RunMode::Heating)], &profile),
            Err(Error::NotSupportedByModel { field: "runmode", .. })
        ));
        assert!(matches!(
            frame(json!({ "heating": { "target": 20 } }), &profile),
            Err(Error::NotSupportedByModel { field: "heating", .. })
        ));
    }

    #[test]
    fn rejected_change_produces_no_entries() {
        let changes = [
            StatusChange::KeyLock(true),
            StatusChange::AwayMode(true),
        ];
        assert!(translate(&changes, &prt_e()).is_err());
    }

    #[test]
    fn away_mode_accepts_symbolic_value() {
        let profile = DeviceProfile::new(DeviceModel::PrtHw, ScheduleMode::FiveTwo);
        let intent = WriteIntent::from_json(&json!({ "awaymode": "away" })).unwrap();
        assert_eq!(
            intent.translate(&profile).unwrap(),
            [DcbEntry::new(31, [1])]
        );
        let intent = WriteIntent::from_json(&json!({ "away_mode": false })).unwrap();
        assert_eq!(
            intent.translate(&profile).unwrap(),
            [DcbEntry::new(31, [0])]
        );
        assert!(WriteIntent::from_json(&json!({ "awaymode": "maybe" })).is_err());
    }

    #[test]
    fn hot_water_state_encoding() {
        let profile = DeviceProfile::new(DeviceModel::PrtHw, ScheduleMode::FiveTwo);
        let translate_json = |intent: Value| {
            WriteIntent::from_json(&intent)
                .unwrap()
                .translate(&profile)
                .unwrap()
        };
        assert_eq!(
            translate_json(json!({ "hotwater": { "boost": 90, "on": true } })),
            [DcbEntry::new(25, [90, 0]), DcbEntry::new(42, [1])]
        );
        assert_eq!(
            translate_json(json!({ "hotwater": { "on": false } })),
            [DcbEntry::new(42, [2])]
        );
        assert_eq!(
            translate_json(json!({ "hotwater": { "boost": 30 } })),
            [DcbEntry::new(25, [30, 0]), DcbEntry::new(42, [0])]
        );
    }

    #[test]
    fn unknown_member_of_change_is_named() {
        let rejected = |intent: Value| match WriteIntent::from_json(&intent) {
            Err(Error::UnsupportedField(key)) => key,
            other => panic!("unexpected result {other:?}"),
        };
        assert_eq!(rejected(json!({ "heating": { "temp": 20 } })), "heating.temp");
        assert_eq!(
            rejected(json!({ "heating": { "target": 20, "hold": 30, "boost": 5 } })),
            "heating.boost"
        );
        assert_eq!(rejected(json!({ "frostprotect": { "tgt": 9 } })), "frostprotect.tgt");
        assert_eq!(rejected(json!({ "floorlimit": { "max": 23 } })), "floorlimit.max");
        assert_eq!(rejected(json!({ "hotwater": { "state": "on" } })), "hotwater.state");
        assert_eq!(
            rejected(json!({ "holiday": { "until": "2014-01-06T17:30:00" } })),
            "holiday.until"
        );
        assert_eq!(
            rejected(json!({ "comfort": [[{ "time": "07:00", "target": 21, "temp": 1 }]] })),
            "comfort.temp"
        );
    }

    #[test]
    fn change_without_value_is_rejected() {
        for intent in [
            json!({ "heating": {} }),
            json!({ "frostprotect": {} }),
            json!({ "floorlimit": {} }),
            json!({ "hotwater": {} }),
            json!({ "holiday": {} }),
            json!({ "holiday": { "enabled": true } }),
        ] {
            assert!(
                matches!(
                    WriteIntent::from_json(&intent),
                    Err(Error::UnsupportedValue { .. })
                ),
                "{intent} was accepted"
            );
        }
    }

    #[test]
    fn holiday_with_time_and_enabled_flag() {
        let intent = WriteIntent::from_json(&json!({
            "holiday": { "enabled": true, "time": "2014-01-06T17:30:00" }
        }))
        .unwrap();
        assert_eq!(
            intent.translate(&prt_e()).unwrap(),
            [DcbEntry::new(24, [14, 1, 6, 17, 30])]
        );
    }

    #[test]
    fn nothing_to_write_is_rejected() {
        assert!(matches!(
            translate(&[], &prt_e()),
            Err(Error::UnsupportedValue { .. })
        ));
        let no_op = StatusChange::Heating {
            target: None,
            hold_minutes: None,
        };
        assert!(matches!(
            translate(&[no_op], &prt_e()),
            Err(Error::UnsupportedValue { .. })
        ));
        let empty = WriteIntent::from_json(&json!({})).unwrap();
        assert!(empty.is_empty());
        assert!(empty.translate(&prt_e()).is_err());
    }

    #[test]
    fn boolean_and_target_entries() {
        let entries = WriteIntent::from_json(&json!({
            "enabled": false,
            "keylock": true,
            "frostprotect": { "target": 9 }
        }))
        .unwrap()
        .translate(&prt_e())
        .unwrap();
        assert_eq!(
            entries,
            [
                DcbEntry::new(21, [0]),
                DcbEntry::new(22, [1]),
                DcbEntry::new(17, [9])
            ]
        );
    }

    #[test]
    fn holiday_entries() {
        let back = NaiveDate::from_ymd_opt(2014, 1, 6)
            .unwrap()
            .and_hms_opt(17, 30, 0)
            .unwrap();
        let entries = translate(
            &[
                StatusChange::Holiday(Holiday::ReturnAt(back)),
                StatusChange::Holiday(Holiday::Cancel),
            ],
            &prt_e(),
        )
        .unwrap();
        assert_eq!(
            entries,
            [
                DcbEntry::new(24, [14, 1, 6, 17, 30]),
                DcbEntry::new(24, [0])
            ]
        );
    }

    #[test]
    fn comfort_schedule_in_seven_day_mode_needs_seven_days() {
        let day = json!([{ "time": "07:00", "target": 21 }]);
        let result = frame(json!({ "comfort": [day, day, day] }), &prt_e());
        assert!(matches!(
            result,
            Err(Error::ScheduleLengthMismatch {
                field: "comfort",
                expected: 7,
                actual: 3
            })
        ));
    }

    #[test]
    fn comfort_schedule_fills_unused_slots() {
        let profile = DeviceProfile::new(DeviceModel::Prt, ScheduleMode::FiveTwo);
        let weekday = vec![
            ComfortSlot {
                time: hhmm(6, 30),
                target: 21,
            },
            ComfortSlot {
                time: hhmm(22, 0),
                target: 16,
            },
        ];
        let entries = translate(&[StatusChange::Comfort(vec![weekday, vec![]])], &profile).unwrap();
        assert_eq!(
            entries,
            [
                DcbEntry::new(47, [6, 30, 21, 22, 0, 16, 24, 0, 16, 24, 0, 16]),
                DcbEntry::new(59, [24, 0, 16, 24, 0, 16, 24, 0, 16, 24, 0, 16]),
            ]
        );
    }

    #[test]
    fn timer_schedule_uses_seven_day_layout() {
        let profile = DeviceProfile::new(DeviceModel::PrtHw, ScheduleMode::SevenDay);
        let day = json!([{ "on": "06:00", "off": "08:15" }]);
        let intent = json!({ "timer": [day, day, day, day, day, day, day] });
        let entries = WriteIntent::from_json(&intent)
            .unwrap()
            .translate(&profile)
            .unwrap();
        assert_eq!(entries.len(), 7);
        assert_eq!(entries[0].position, 187);
        assert_eq!(entries[6].position, 187 + 6 * 16);
        assert_eq!(
            entries[0].value,
            [6, 0, 8, 15, 24, 0, 24, 0, 24, 0, 24, 0, 24, 0, 24, 0]
        );
    }

    #[test]
    fn too_many_slots_per_day_is_rejected() {
        let profile = DeviceProfile::new(DeviceModel::Prt, ScheduleMode::FiveTwo);
        let slot = ComfortSlot {
            time: hhmm(6, 0),
            target: 20,
        };
        let result = translate(
            &[StatusChange::Comfort(vec![vec![slot; 5], vec![]])],
            &profile,
        );
        assert!(matches!(result, Err(Error::UnsupportedValue { .. })));
    }

    #[test]
    fn intent_parses_from_text() {
        let intent: WriteIntent = r#"{"keylock": true}"#.parse().unwrap();
        assert_eq!(intent.changes(), [StatusChange::KeyLock(true)]);
        assert!("[1, 2]".parse::<WriteIntent>().is_err());
    }
}
