use anyhow::{Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use heatmiser_lib::protocol::{
    DeviceState, Holiday, HotWaterState, RunMode, StatusChange, WriteIntent,
};
use heatmiser_lib::tcp::Thermostat;
use log::*;
use std::{fmt, ops::Deref, panic};

mod commandline;
mod daemon;
mod mqtt;

use commandline::{CliArgs, CliCommands, HotWaterArg, RunModeArg};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

/// Human readable status block shared by the one-shot commands and the console daemon.
struct StatusReport<'a>(&'a DeviceState);

impl fmt::Display for StatusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.0;
        writeln!(f, "Model:            {} ({:?})", state.model, state.vendor)?;
        writeln!(f, "Version:          {}", state.version)?;
        writeln!(f, "Enabled:          {}", state.device_on)?;
        writeln!(f, "Key lock:         {}", state.key_lock)?;
        writeln!(f, "Run mode:         {:?}", state.run_mode)?;
        writeln!(f, "Schedule:         {:?}", state.schedule_mode)?;
        writeln!(f, "Unit:             {:?}", state.temperature_unit)?;
        writeln!(f, "Room target:      {}", state.set_room_target)?;
        writeln!(f, "Frost target:     {}", state.frost_protect_target)?;
        writeln!(f, "Hold minutes:     {}", state.hold_minutes)?;
        writeln!(f, "Built-in air:     {}", Reading(state.built_in_air_temperature))?;
        writeln!(f, "Remote air:       {}", Reading(state.remote_air_temperature))?;
        writeln!(f, "Floor:            {}", Reading(state.floor_temperature))?;
        writeln!(f, "Heating:          {}", state.heating_on)?;
        if state.model.has_hot_water() {
            writeln!(f, "Hot water:        {}", state.hot_water_on)?;
            writeln!(f, "Boost minutes:    {}", state.boost_minutes)?;
            writeln!(f, "Away:             {}", state.away_mode)?;
        }
        if let Some(until) = state.holiday_return {
            writeln!(f, "Holiday until:    {until}")?;
        }
        if state.error_code != 0 {
            writeln!(f, "Error code:       {:#04X}", state.error_code)?;
        }
        writeln!(f, "Device time:      {}", state.current_time)
    }
}

/// A temperature reading, or a dash for a sensor that is not connected.
struct Reading(Option<f32>);

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value:.1}"),
            None => write!(f, "-"),
        }
    }
}

fn print_state(state: &DeviceState) {
    print!("{}", StatusReport(state));
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let mut thermostat = Thermostat::new(&args.host, args.pin);
    thermostat.set_port(args.port);
    thermostat.set_timeout(args.timeout);

    let change = match args.command {
        CliCommands::Status => {
            let state = thermostat
                .read_device()
                .with_context(|| format!("Cannot read status from '{}'", args.host))?;
            print_state(&state);
            return Ok(());
        }
        CliCommands::Daemon { output, interval } => {
            return daemon::run(thermostat, output, interval);
        }
        CliCommands::Write { json } => {
            let intent: WriteIntent = json
                .parse()
                .with_context(|| format!("Cannot parse write request '{json}'"))?;
            let state = thermostat
                .write_device(&intent)
                .with_context(|| "Cannot write to thermostat")?;
            print_state(&state);
            return Ok(());
        }
        CliCommands::SetTime { time } => {
            StatusChange::Time(time.unwrap_or_else(|| chrono::Local::now().naive_local()))
        }
        CliCommands::SetTarget { temperature, hold } => StatusChange::Heating {
            target: Some(temperature),
            hold_minutes: hold,
        },
        CliCommands::Hold { minutes } => StatusChange::Heating {
            target: None,
            hold_minutes: Some(minutes),
        },
        CliCommands::RunMode { mode } => StatusChange::RunMode(match mode {
            RunModeArg::Heating => RunMode::Heating,
            RunModeArg::Frost => RunMode::FrostProtection,
        }),
        CliCommands::Away { enable } => StatusChange::AwayMode(enable),
        CliCommands::KeyLock { enable } => StatusChange::KeyLock(enable),
        CliCommands::Power { enable } => StatusChange::Enabled(enable),
        CliCommands::FrostProtect { temperature } => StatusChange::FrostProtect {
            target: temperature,
        },
        CliCommands::FloorMax { temperature } => StatusChange::FloorLimit {
            floor_max: temperature,
        },
        CliCommands::HotWater { state, boost } => StatusChange::HotWater {
            boost_minutes: boost,
            state: match state {
                HotWaterArg::On => HotWaterState::On,
                HotWaterArg::Off => HotWaterState::Off,
                HotWaterArg::Keep => HotWaterState::Unchanged,
            },
        },
        CliCommands::Holiday { until } => {
            StatusChange::Holiday(until.map_or(Holiday::Cancel, Holiday::ReturnAt))
        }
    };

    let field = change.field();
    let state = thermostat
        .write_changes(&[change])
        .with_context(|| format!("Cannot write '{field}' to thermostat"))?;
    print_state(&state);

    Ok(())
}
