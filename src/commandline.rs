use crate::mqtt;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::time::Duration;

fn parse_date_time(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    heatmiser_lib::protocol::write::parse_date_time(value)
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum RunModeArg {
    Heating,
    Frost,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum HotWaterArg {
    On,
    Off,
    /// Only change the boost time
    Keep,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Show the full thermostat status: model, temperatures, targets, modes and clock
    Status,
    /// Set the thermostat clock (defaults to the local time of this machine)
    SetTime {
        /// Date and time, e.g. "2013-12-25T19:38:01"
        #[clap(value_parser = parse_date_time)]
        time: Option<NaiveDateTime>,
    },
    /// Set the heating target temperature
    SetTarget {
        /// Target temperature in the thermostat's unit
        temperature: u8,
        /// Hold the target for this many minutes
        #[clap(long)]
        hold: Option<u16>,
    },
    /// Hold the current target temperature for some minutes (0 cancels)
    Hold { minutes: u16 },
    /// Switch between heating and frost protection
    RunMode {
        #[clap(value_enum)]
        mode: RunModeArg,
    },
    /// Enable or disable away mode (hot water models)
    Away {
        /// Enable away mode. If this flag is not present, it will be disabled.
        #[clap(long, short, action)]
        enable: bool,
    },
    /// Enable or disable the key lock
    KeyLock {
        /// Lock the keys. If this flag is not present, they will be unlocked.
        #[clap(long, short, action)]
        enable: bool,
    },
    /// Switch the thermostat on or off
    Power {
        /// Switch the thermostat on. If this flag is not present, it will be switched off.
        #[clap(long, short, action)]
        enable: bool,
    },
    /// Set the frost protection temperature
    FrostProtect { temperature: u8 },
    /// Set the floor temperature limit (floor limit models)
    FloorMax { temperature: u8 },
    /// Control the hot water output (hot water models)
    HotWater {
        #[clap(value_enum)]
        state: HotWaterArg,
        /// Boost the hot water for this many minutes
        #[clap(long)]
        boost: Option<u16>,
    },
    /// Set a holiday return date, or cancel the holiday when no date is given
    Holiday {
        /// Return date and time, e.g. "2014-01-06T17:30:00"
        #[clap(value_parser = parse_date_time)]
        until: Option<NaiveDateTime>,
    },
    /// Write a JSON status change, e.g. '{"heating": {"target": 20, "hold": 30}}'
    Write { json: String },
    /// Run in daemon mode, periodically reading the thermostat and outputting its status
    Daemon {
        /// Output destination for the status
        #[command(subcommand)]
        output: DaemonOutput,
        /// Interval for reading the status (e.g., "10s", "1m")
        #[clap(long, short, value_parser = humantime::parse_duration, default_value = "60s")]
        interval: Duration,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, PartialEq)]
pub enum MqttFormat {
    Simple,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DaemonOutput {
    /// Continuously read the status and print it to the standard output (console).
    Console,
    /// Continuously read the status and publish it to an MQTT broker.
    Mqtt {
        /// The configuration file for the MQTT broker
        #[arg(long, default_value_t = mqtt::MqttConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
        /// Output format for MQTT messages
        #[arg(long, value_enum, default_value_t = MqttFormat::Simple)]
        format: MqttFormat,
    },
}

const fn about_text() -> &'static str {
    "heatmiser wifi thermostat command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Host name or IP address of the thermostat
    #[arg(long)]
    pub host: String,

    /// TCP port of the thermostat
    #[arg(short, long, default_value_t = heatmiser_lib::tcp::DEFAULT_PORT)]
    pub port: u16,

    /// Access pin configured on the thermostat
    #[arg(long, default_value_t = 0)]
    pub pin: u16,

    #[command(subcommand)]
    pub command: CliCommands,

    /// Timeout for connecting and for each network read/write (e.g., "500ms", "3s")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "3s")]
    pub timeout: Duration,
}
