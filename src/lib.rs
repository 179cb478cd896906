#![cfg_attr(docsrs, feature(doc_cfg))]
//! # heatmiser_lib
//!
//! This crate provides a library for talking to Heatmiser Wi-Fi thermostats
//! (DT, DT-E, PRT, PRT-E, PRTHW and TM1) over their binary TCP protocol.
//! It offers both synchronous and asynchronous clients for communication.
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the `heatmiser` command-line tool.
//!
//! ### Client Features
//! - The **synchronous** client in [`tcp`] is always available and only uses the standard library.
//! - `tokio-tcp-async`: Enables the **asynchronous** client using `tokio`.
//!
//! ### Utility Features
//! - `serde`: Enables `serde` support for serializing/deserializing decoded device state.
//! - `bin-dependencies`: Enables all features required by the `heatmiser` binary executable.

/// Contains error types for the library.
mod error;
/// Defines the communication protocol of the thermostats.
pub mod protocol;

pub use error::{Error, Result};

/// Synchronous client for thermostat communication.
pub mod tcp;

/// Asynchronous client for thermostat communication.
#[cfg_attr(docsrs, doc(cfg(feature = "tokio-tcp-async")))]
#[cfg(feature = "tokio-tcp-async")]
pub mod tokio_tcp_async;
